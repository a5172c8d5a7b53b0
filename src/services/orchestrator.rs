// src/services/orchestrator.rs
use crate::errors::StarcrazeError;
use crate::models::*;
use crate::services::GenerativeApi;
use crate::services::gemini::{ImageSynthesis, TextGeneration};
use crate::services::templates::{self, STORY_KEY};
use log::{error, info, warn};
use std::sync::Arc;
use std::time::Instant;

pub const RANDOM_PROMPT_FALLBACK: &str = "A majestic lion wearing a crown, oil painting style.";
pub const NEGATIVE_PROMPT_FALLBACK: &str = "blurry, low quality, text, watermark, bad anatomy, deformed";

const ENHANCE_FAILED: &str = "Failed to communicate with the AI. Please try again in a moment.";
const DESCRIBE_FAILED: &str =
    "Failed to analyze the image. The file might be corrupted or in an unsupported format.";
const RESTYLE_FAILED: &str = "Failed to apply style. Please try again.";
const STORY_FAILED: &str =
    "Failed to generate the story. The AI may be experiencing issues or the request was filtered.";
const MASTER_PROMPT_FAILED: &str =
    "Failed to prepare the image prompt. The AI may be experiencing issues.";
const SYNTHESIS_FAILED: &str =
    "Failed to generate the final image. The request may have been filtered for safety reasons.";

/// Aspect ratios the image endpoint accepts.
pub const SUPPORTED_IMAGE_RATIOS: [&str; 5] = ["1:1", "4:3", "3:4", "16:9", "9:16"];

/// Maps a raw ratio onto one the image endpoint supports, falling back to square.
pub fn supported_image_ratio(raw: &str) -> &'static str {
    SUPPORTED_IMAGE_RATIOS
        .iter()
        .find(|supported| **supported == raw)
        .copied()
        .unwrap_or("1:1")
}

/// Runs one operation per user action: validate, build the instruction, call
/// the provider once, normalise the answer.
pub struct Orchestrator {
    api: Arc<dyn GenerativeApi>,
}

impl Orchestrator {
    pub fn new(api: Arc<dyn GenerativeApi>) -> Self {
        Self { api }
    }

    pub async fn execute(&self, request: &GenerationRequest) -> Result<GenerationResult, StarcrazeError> {
        let start = Instant::now();
        let result = match request.kind {
            OperationKind::EnhancePrompt => self.enhance_prompt(request).await.map(GenerationResult::Text),
            OperationKind::DescribeImage => self.describe_image(request).await.map(GenerationResult::Text),
            OperationKind::RestylePrompt => self.restyle_prompt(request).await.map(GenerationResult::Text),
            OperationKind::StoryPrompts => self.story_prompts(request).await.map(GenerationResult::Sequence),
            OperationKind::SynthesizeImages => {
                self.synthesize_images(request).await.map(GenerationResult::Images)
            }
            OperationKind::RandomPrompt => Ok(GenerationResult::Text(self.random_prompt().await)),
            OperationKind::SuggestNegative => {
                self.suggest_negative(request).await.map(GenerationResult::Text)
            }
        };

        if result.is_ok() {
            info!("{} completed in {}ms", request.kind, start.elapsed().as_millis());
        }
        result
    }

    pub async fn enhance_prompt(&self, request: &GenerationRequest) -> Result<String, StarcrazeError> {
        let idea = require_text(&request.subject, "Please enter a prompt idea or upload an image.")?;
        let options = &request.options;
        let instruction = templates::enhance(
            idea,
            options.model,
            options.length,
            options.aspect_ratio,
            options.mode,
            request.negative.as_deref(),
        );

        self.text(TextGeneration::new(instruction, None), request.kind, ENHANCE_FAILED)
            .await
    }

    pub async fn describe_image(&self, request: &GenerationRequest) -> Result<String, StarcrazeError> {
        let media = require_media(&request.media, "Please enter a prompt idea or upload an image.")?;
        let options = &request.options;
        let instruction =
            templates::describe_image(options.model, options.aspect_ratio, request.negative.as_deref());

        self.text(
            TextGeneration::new(instruction, Some(media.clone())),
            request.kind,
            DESCRIBE_FAILED,
        )
        .await
    }

    pub async fn restyle_prompt(&self, request: &GenerationRequest) -> Result<String, StarcrazeError> {
        let base = require_text(&request.subject, "Generate a prompt before applying a style.")?;
        let options = &request.options;
        let instruction = templates::restyle(
            base,
            options.prompt_style,
            options.model,
            request.negative.as_deref(),
        );

        self.text(TextGeneration::new(instruction, None), request.kind, RESTYLE_FAILED)
            .await
    }

    pub async fn story_prompts(&self, request: &GenerationRequest) -> Result<Vec<String>, StarcrazeError> {
        let media = require_media(&request.media, "Please upload an image to set the story's style.")?;
        let description = require_text(&request.subject, "Please provide a story description.")?;
        let frame_count = request.options.frame_count;
        if !(MIN_STORY_FRAMES..=MAX_STORY_FRAMES).contains(&frame_count) {
            return Err(StarcrazeError::Validation(format!(
                "A story has between {} and {} frames.",
                MIN_STORY_FRAMES, MAX_STORY_FRAMES
            )));
        }

        let instruction = templates::story(description, frame_count, request.options.model);
        let raw = self
            .text(
                TextGeneration::new(instruction, Some(media.clone())),
                request.kind,
                STORY_FAILED,
            )
            .await?;

        parse_story(&raw, frame_count).map_err(|e| {
            error!("{}: {}", request.kind, e);
            StarcrazeError::Operation(STORY_FAILED.to_string())
        })
    }

    pub async fn synthesize_images(
        &self,
        request: &GenerationRequest,
    ) -> Result<Vec<GeneratedImage>, StarcrazeError> {
        let idea = require_text(&request.subject, "Please enter a description for the image.")?;
        let options = &request.options;
        let quantity = options.quantity;
        if !(MIN_IMAGE_QUANTITY..=MAX_IMAGE_QUANTITY).contains(&quantity) {
            return Err(StarcrazeError::Validation(format!(
                "Between {} and {} images can be generated at once.",
                MIN_IMAGE_QUANTITY, MAX_IMAGE_QUANTITY
            )));
        }

        let instruction =
            templates::master_prompt(idea, options.image_style, options.detail_level, options.mode);
        let master_prompt = self
            .text(
                TextGeneration::new(instruction, request.media.clone()),
                request.kind,
                MASTER_PROMPT_FAILED,
            )
            .await?;

        let prompt = match &request.negative {
            Some(negative) => format!("{} | Negative prompt: {}", master_prompt, negative),
            None => master_prompt,
        };
        let synthesis = ImageSynthesis {
            prompt,
            count: quantity,
            aspect_ratio: supported_image_ratio(options.aspect_ratio.raw()).to_string(),
        };

        let images = self.api.generate_images(synthesis).await.map_err(|e| {
            error!("{}: image synthesis failed: {}", request.kind, e);
            StarcrazeError::Operation(SYNTHESIS_FAILED.to_string())
        })?;

        if images.is_empty() || images.len() > quantity as usize {
            error!(
                "{}: expected 1..={} images, provider returned {}",
                request.kind,
                quantity,
                images.len()
            );
            return Err(StarcrazeError::Operation(SYNTHESIS_FAILED.to_string()));
        }

        Ok(images.into_iter().map(GeneratedImage::jpeg).collect())
    }

    /// Never fails: provider trouble yields a canned idea.
    pub async fn random_prompt(&self) -> String {
        let request = TextGeneration::new(templates::random_prompt(), None);
        match self.api.generate_text(request).await {
            Ok(text) => {
                let idea = text.trim().replace('"', "");
                if idea.is_empty() {
                    warn!("random_prompt: empty answer, using fallback");
                    RANDOM_PROMPT_FALLBACK.to_string()
                } else {
                    idea
                }
            }
            Err(e) => {
                warn!("random_prompt failed, using fallback: {}", e);
                RANDOM_PROMPT_FALLBACK.to_string()
            }
        }
    }

    /// Fails only on missing input; provider trouble yields a canned list.
    pub async fn suggest_negative(&self, request: &GenerationRequest) -> Result<String, StarcrazeError> {
        if request.subject.trim().is_empty() && request.media.is_none() {
            return Err(StarcrazeError::Validation(
                "Please enter a description or upload a reference image first.".to_string(),
            ));
        }

        let instruction = templates::negative_prompt(request.subject.trim());
        let generation = TextGeneration::new(instruction, request.media.clone());
        match self.api.generate_text(generation).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => {
                warn!("suggest_negative: empty answer, using fallback");
                Ok(NEGATIVE_PROMPT_FALLBACK.to_string())
            }
            Err(e) => {
                warn!("suggest_negative failed, using fallback: {}", e);
                Ok(NEGATIVE_PROMPT_FALLBACK.to_string())
            }
        }
    }

    /// One text call. Any failure is logged in full and replaced by `failure`.
    async fn text(
        &self,
        generation: TextGeneration,
        kind: OperationKind,
        failure: &str,
    ) -> Result<String, StarcrazeError> {
        match self.api.generate_text(generation).await {
            Ok(text) if !text.trim().is_empty() => Ok(text.trim().to_string()),
            Ok(_) => {
                error!("{}: provider returned empty text", kind);
                Err(StarcrazeError::Operation(failure.to_string()))
            }
            Err(e) => {
                error!("{}: {}", kind, e);
                Err(StarcrazeError::Operation(failure.to_string()))
            }
        }
    }
}

fn require_text<'a>(text: &'a str, message: &str) -> Result<&'a str, StarcrazeError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(StarcrazeError::Validation(message.to_string()));
    }
    Ok(text)
}

fn require_media<'a>(
    media: &'a Option<MediaAttachment>,
    message: &str,
) -> Result<&'a MediaAttachment, StarcrazeError> {
    media
        .as_ref()
        .ok_or_else(|| StarcrazeError::Validation(message.to_string()))
}

/// Parses `{"storyPrompts": [..]}` and insists on exactly `frame_count` strings.
pub fn parse_story(raw: &str, frame_count: u8) -> Result<Vec<String>, StarcrazeError> {
    let data: serde_json::Value = serde_json::from_str(raw)
        .map_err(|e| StarcrazeError::Provider(format!("Failed to parse story JSON: {}", e)))?;

    let items = data[STORY_KEY]
        .as_array()
        .ok_or_else(|| StarcrazeError::Provider(format!("Missing {} array", STORY_KEY)))?;

    let prompts = items
        .iter()
        .map(|item| {
            item.as_str()
                .map(|s| s.to_string())
                .ok_or_else(|| StarcrazeError::Provider("Story prompt is not a string".to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if prompts.len() != frame_count as usize {
        return Err(StarcrazeError::Provider(format!(
            "Expected {} story prompts, got {}",
            frame_count,
            prompts.len()
        )));
    }

    Ok(prompts)
}
