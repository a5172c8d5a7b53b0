// src/session.rs
//! Per-session UI state: the three views, their options and results, and one
//! pending/error slot per operation family.

use crate::errors::StarcrazeError;
use crate::models::*;
use chrono::{DateTime, Utc};
use log::debug;
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

pub const DEFAULT_PROMPT_IDEA: &str =
    "A hyper-detailed portrait of a cyborg samurai in a neon-lit Tokyo street, cinematic lighting.";
pub const DEFAULT_STORY_DESCRIPTION: &str =
    "A hero discovers a hidden power and confronts a shadow lurking in the city.";
pub const DEFAULT_STUDIO_PROMPT: &str = "A stunning castle on a cliff by the sea, evening sun.";

/// Identifies one in-flight request. Ids come from a per-session counter and
/// are never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ticket {
    pub kind: OperationKind,
    pub id: u64,
}

static IDLE: FamilyState = FamilyState {
    pending: false,
    error: None,
    in_flight: None,
};

#[derive(Debug, Clone, Default, Serialize)]
pub struct FamilyState {
    pub pending: bool,
    pub error: Option<String>,
    #[serde(skip)]
    in_flight: Option<u64>,
}

/// What the prompt view is working from: typed text or an uploaded image.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Subject {
    Text { text: String },
    Image {
        attachment: MediaAttachment,
        caption: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptView {
    pub subject: Subject,
    pub model: AiModel,
    pub length: PromptLength,
    pub aspect_ratio: AspectRatio,
    pub mode: PromptMode,
    pub negative: NegativeConstraint,
    pub generated_prompt: Option<String>,
}

impl Default for PromptView {
    fn default() -> Self {
        Self {
            subject: Subject::Text {
                text: DEFAULT_PROMPT_IDEA.to_string(),
            },
            model: AiModel::MidJourney,
            length: PromptLength::Medium,
            aspect_ratio: AspectRatio::SixteenNine,
            mode: PromptMode::Enhanced,
            negative: NegativeConstraint::default(),
            generated_prompt: None,
        }
    }
}

impl PromptView {
    /// Typing replaces any attached image.
    pub fn set_text(&mut self, text: impl Into<String>) {
        self.subject = Subject::Text { text: text.into() };
    }

    /// Attaching an image replaces the typed text and the previous result.
    pub fn attach(&mut self, attachment: MediaAttachment) {
        self.subject = Subject::Image {
            attachment,
            caption: None,
        };
        self.generated_prompt = None;
    }

    pub fn clear_attachment(&mut self) {
        if matches!(self.subject, Subject::Image { .. }) {
            self.subject = Subject::Text { text: String::new() };
        }
    }

    pub fn text(&self) -> Option<&str> {
        match &self.subject {
            Subject::Text { text } => Some(text),
            Subject::Image { .. } => None,
        }
    }

    pub fn attachment(&self) -> Option<&MediaAttachment> {
        match &self.subject {
            Subject::Image { attachment, .. } => Some(attachment),
            Subject::Text { .. } => None,
        }
    }

    fn options(&self) -> GenerationOptions {
        GenerationOptions {
            model: self.model,
            length: self.length,
            aspect_ratio: self.aspect_ratio,
            mode: self.mode,
            ..GenerationOptions::default()
        }
    }

    /// Describes the attached image if there is one, otherwise enhances the text.
    pub fn generate_request(&self) -> GenerationRequest {
        match &self.subject {
            Subject::Image { attachment, .. } => {
                GenerationRequest::new(OperationKind::DescribeImage, self.options())
                    .with_media(Some(attachment.clone()))
                    .with_negative(self.negative.effective())
            }
            Subject::Text { text } => GenerationRequest::new(OperationKind::EnhancePrompt, self.options())
                .with_subject(text.clone())
                .with_negative(self.negative.effective()),
        }
    }

    pub fn restyle_request(&self, style: PromptStyle) -> GenerationRequest {
        let mut options = self.options();
        options.prompt_style = style;
        GenerationRequest::new(OperationKind::RestylePrompt, options)
            .with_subject(self.generated_prompt.clone().unwrap_or_default())
            .with_negative(self.negative.effective())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StoryView {
    pub attachment: Option<MediaAttachment>,
    pub description: String,
    pub frame_count: u8,
    pub model: AiModel,
    pub prompts: Vec<String>,
}

impl Default for StoryView {
    fn default() -> Self {
        Self {
            attachment: None,
            description: DEFAULT_STORY_DESCRIPTION.to_string(),
            frame_count: 3,
            model: AiModel::MidJourney,
            prompts: Vec::new(),
        }
    }
}

impl StoryView {
    pub fn attach(&mut self, attachment: MediaAttachment) {
        self.attachment = Some(attachment);
        self.prompts.clear();
    }

    pub fn set_frame_count(&mut self, frame_count: u8) -> Result<(), StarcrazeError> {
        if !(MIN_STORY_FRAMES..=MAX_STORY_FRAMES).contains(&frame_count) {
            return Err(StarcrazeError::Validation(format!(
                "Frame count must be between {} and {}",
                MIN_STORY_FRAMES, MAX_STORY_FRAMES
            )));
        }
        self.frame_count = frame_count;
        Ok(())
    }

    pub fn generate_request(&self) -> GenerationRequest {
        let options = GenerationOptions {
            model: self.model,
            frame_count: self.frame_count,
            ..GenerationOptions::default()
        };
        GenerationRequest::new(OperationKind::StoryPrompts, options)
            .with_subject(self.description.clone())
            .with_media(self.attachment.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StudioView {
    pub prompt: String,
    pub attachment: Option<MediaAttachment>,
    pub style: ImageStyle,
    pub aspect_ratio: AspectRatio,
    pub detail_level: DetailLevel,
    pub quantity: u8,
    pub mode: PromptMode,
    pub negative: NegativeConstraint,
    pub images: Vec<GeneratedImage>,
    pub last_detail_level: Option<DetailLevel>,
}

impl Default for StudioView {
    fn default() -> Self {
        Self {
            prompt: DEFAULT_STUDIO_PROMPT.to_string(),
            attachment: None,
            style: ImageStyle::Cinematic,
            aspect_ratio: AspectRatio::SixteenNine,
            detail_level: DetailLevel::High,
            quantity: 1,
            mode: PromptMode::Enhanced,
            negative: NegativeConstraint::default(),
            images: Vec::new(),
            last_detail_level: None,
        }
    }
}

impl StudioView {
    pub fn set_quantity(&mut self, quantity: u8) -> Result<(), StarcrazeError> {
        if !(MIN_IMAGE_QUANTITY..=MAX_IMAGE_QUANTITY).contains(&quantity) {
            return Err(StarcrazeError::Validation(format!(
                "Quantity must be between {} and {}",
                MIN_IMAGE_QUANTITY, MAX_IMAGE_QUANTITY
            )));
        }
        self.quantity = quantity;
        Ok(())
    }

    /// `detail_override` re-runs at a different detail level without changing
    /// the selected one (used for "upscale to Ultra").
    pub fn generate_request(&self, detail_override: Option<DetailLevel>) -> GenerationRequest {
        let options = GenerationOptions {
            image_style: self.style,
            aspect_ratio: self.aspect_ratio,
            detail_level: detail_override.unwrap_or(self.detail_level),
            quantity: self.quantity,
            mode: self.mode,
            ..GenerationOptions::default()
        };
        GenerationRequest::new(OperationKind::SynthesizeImages, options)
            .with_subject(self.prompt.clone())
            .with_media(self.attachment.clone())
            .with_negative(self.negative.effective())
    }

    pub fn random_prompt_request(&self) -> GenerationRequest {
        GenerationRequest::new(OperationKind::RandomPrompt, GenerationOptions::default())
    }

    pub fn negative_request(&self) -> GenerationRequest {
        GenerationRequest::new(OperationKind::SuggestNegative, GenerationOptions::default())
            .with_subject(self.prompt.clone())
            .with_media(self.attachment.clone())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub view: View,
    pub prompt: PromptView,
    pub story: StoryView,
    pub studio: StudioView,
    pub operations: BTreeMap<OperationKind, FamilyState>,
    #[serde(skip)]
    next_ticket: u64,
}

impl Session {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            view: View::Prompt,
            prompt: PromptView::default(),
            story: StoryView::default(),
            studio: StudioView::default(),
            operations: OperationKind::ALL
                .iter()
                .map(|kind| (*kind, FamilyState::default()))
                .collect(),
            next_ticket: 0,
        }
    }

    pub fn family(&self, kind: OperationKind) -> &FamilyState {
        self.operations.get(&kind).unwrap_or(&IDLE)
    }

    fn family_mut(&mut self, kind: OperationKind) -> &mut FamilyState {
        self.operations.entry(kind).or_default()
    }

    /// The pending operation of `view`, if any. A view runs at most one
    /// operation at a time since its families share inputs and results.
    pub fn pending_in(&self, view: View) -> Option<OperationKind> {
        OperationKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.view() == view && self.family(*kind).pending)
    }

    /// Refuses edits to a view while one of its operations is in flight.
    pub fn ensure_idle(&self, view: View) -> Result<(), StarcrazeError> {
        match self.pending_in(view) {
            Some(kind) => Err(StarcrazeError::Busy(kind.to_string())),
            None => Ok(()),
        }
    }

    /// Marks `kind` pending and hands out a ticket. Refuses while any
    /// operation of the same view is pending; nothing is queued.
    pub fn begin(&mut self, kind: OperationKind) -> Result<Ticket, StarcrazeError> {
        self.ensure_idle(kind.view())?;

        self.next_ticket += 1;
        let id = self.next_ticket;
        let family = self.family_mut(kind);
        family.pending = true;
        family.error = None;
        family.in_flight = Some(id);

        self.clear_result(kind);
        Ok(Ticket { kind, id })
    }

    /// Releases the family if `ticket` is still the one in flight. Returns
    /// false for a stale ticket, whose outcome must be dropped.
    fn finish(&mut self, ticket: Ticket) -> bool {
        let family = self.family_mut(ticket.kind);
        if family.in_flight != Some(ticket.id) {
            debug!("Dropping stale {} outcome (ticket {})", ticket.kind, ticket.id);
            return false;
        }
        family.in_flight = None;
        family.pending = false;
        true
    }

    /// Applies an operation outcome. Exactly one of result or error is stored.
    pub fn settle(
        &mut self,
        ticket: Ticket,
        outcome: Result<GenerationResult, StarcrazeError>,
    ) -> bool {
        if !self.finish(ticket) {
            return false;
        }

        match outcome {
            Ok(result) => self.apply_result(ticket.kind, result),
            Err(err) => self.family_mut(ticket.kind).error = Some(err.to_string()),
        }
        true
    }

    fn apply_result(&mut self, kind: OperationKind, result: GenerationResult) {
        match (kind, result) {
            (OperationKind::EnhancePrompt | OperationKind::RestylePrompt, GenerationResult::Text(text)) => {
                self.prompt.generated_prompt = Some(text);
            }
            (OperationKind::DescribeImage, GenerationResult::Text(text)) => {
                if let Subject::Image { attachment, caption } = &mut self.prompt.subject {
                    *caption = Some(format!(
                        "Prompt generated from uploaded image: {}",
                        attachment.file_name
                    ));
                }
                self.prompt.generated_prompt = Some(text);
            }
            (OperationKind::StoryPrompts, GenerationResult::Sequence(prompts)) => {
                self.story.prompts = prompts;
            }
            (OperationKind::SynthesizeImages, GenerationResult::Images(images)) => {
                self.studio.images = images;
            }
            (OperationKind::RandomPrompt, GenerationResult::Text(text)) => {
                self.studio.prompt = text;
            }
            (OperationKind::SuggestNegative, GenerationResult::Text(text)) => {
                self.studio.negative = NegativeConstraint {
                    enabled: true,
                    text,
                };
            }
            (kind, _) => {
                self.family_mut(kind).error = Some("Unexpected result shape.".to_string());
            }
        }
    }

    /// Records the detail level a successful studio run used.
    pub fn note_detail_level(&mut self, detail_level: DetailLevel) {
        self.studio.last_detail_level = Some(detail_level);
    }

    fn clear_result(&mut self, kind: OperationKind) {
        match kind {
            OperationKind::EnhancePrompt | OperationKind::DescribeImage => {
                self.prompt.generated_prompt = None;
            }
            OperationKind::StoryPrompts => self.story.prompts.clear(),
            OperationKind::SynthesizeImages => self.studio.images.clear(),
            // Restyle and the suggestions overwrite their target on success only.
            OperationKind::RestylePrompt
            | OperationKind::RandomPrompt
            | OperationKind::SuggestNegative => {}
        }
    }

    pub fn dismiss_error(&mut self, kind: OperationKind) {
        self.family_mut(kind).error = None;
    }

    /// Leaving the story or studio view discards it. The prompt view keeps
    /// its idea and result; only its in-flight requests are cancelled.
    pub fn switch_view(&mut self, view: View) {
        if view == self.view {
            return;
        }
        match self.view {
            View::Prompt => self.cancel_pending(View::Prompt),
            left => self.reset_view(left),
        }
        self.view = view;
    }

    fn cancel_pending(&mut self, view: View) {
        for kind in OperationKind::ALL.iter().filter(|kind| kind.view() == view) {
            let family = self.family_mut(*kind);
            family.pending = false;
            family.in_flight = None;
        }
    }

    pub fn reset_view(&mut self, view: View) {
        match view {
            View::Prompt => self.prompt = PromptView::default(),
            View::Story => self.story = StoryView::default(),
            View::Studio => self.studio = StudioView::default(),
        }
        for kind in OperationKind::ALL.iter().filter(|kind| kind.view() == view) {
            *self.family_mut(*kind) = FamilyState::default();
        }
    }
}
