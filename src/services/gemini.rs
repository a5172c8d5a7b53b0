// src/services/gemini.rs
use crate::config::Config;
use crate::errors::StarcrazeError;
use crate::models::MediaAttachment;
use crate::services::templates::Instruction;
use async_trait::async_trait;
use base64::{Engine as _, engine::general_purpose};
use log::debug;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Instant;

/// A text-generation call: system instruction, optional inline image, user text.
#[derive(Debug, Clone)]
pub struct TextGeneration {
    pub instruction: Instruction,
    pub media: Option<MediaAttachment>,
}

impl TextGeneration {
    pub fn new(instruction: Instruction, media: Option<MediaAttachment>) -> Self {
        Self { instruction, media }
    }
}

/// An image-synthesis call.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageSynthesis {
    pub prompt: String,
    pub count: u8,
    pub aspect_ratio: String,
}

/// The upstream generative API. Injected so tests can stand in for the network.
#[async_trait]
pub trait GenerativeApi: Send + Sync {
    /// Returns the raw text of the first candidate. With a response schema set
    /// the text is expected to be JSON.
    async fn generate_text(&self, request: TextGeneration) -> Result<String, StarcrazeError>;

    /// Returns the decoded bytes of every generated image, in order.
    async fn generate_images(&self, request: ImageSynthesis) -> Result<Vec<Vec<u8>>, StarcrazeError>;
}

pub struct GeminiClient {
    api_key: String,
    api_base: String,
    text_model: String,
    image_model: String,
    client: Client,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            api_key: config.api_key.clone(),
            api_base: config.api_base.clone(),
            text_model: config.text_model.clone(),
            image_model: config.image_model.clone(),
            client: Client::new(),
        }
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{}:{}", self.api_base, model, method)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<Value, StarcrazeError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| StarcrazeError::Provider(format!("Gemini request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(StarcrazeError::Provider(format!(
                "Gemini error ({}): {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| StarcrazeError::Provider(format!("Failed to parse Gemini response: {}", e)))
    }
}

pub fn text_request_body(request: &TextGeneration) -> Value {
    let instruction = &request.instruction;

    let mut parts = Vec::new();
    if let Some(media) = &request.media {
        parts.push(json!({
            "inlineData": {
                "mimeType": media.media_type.mime(),
                "data": media.base64_payload()
            }
        }));
    }
    parts.push(json!({ "text": instruction.user_text }));

    let mut generation_config = json!({ "temperature": instruction.temperature });
    if let Some(top_p) = instruction.top_p {
        generation_config["topP"] = json!(top_p);
    }
    if let Some(schema) = &instruction.response_schema {
        generation_config["responseMimeType"] = json!("application/json");
        generation_config["responseSchema"] = schema.clone();
    }

    json!({
        "systemInstruction": { "parts": [{ "text": instruction.system }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": generation_config
    })
}

/// Concatenated text parts of the first candidate.
pub fn extract_text(result: &Value) -> Result<String, StarcrazeError> {
    let parts = result["candidates"][0]["content"]["parts"]
        .as_array()
        .ok_or_else(|| {
            let reason = result["promptFeedback"]["blockReason"]
                .as_str()
                .or_else(|| result["candidates"][0]["finishReason"].as_str())
                .unwrap_or("no candidates");
            StarcrazeError::Provider(format!("No content in Gemini response: {}", reason))
        })?;

    let text: String = parts.iter().filter_map(|p| p["text"].as_str()).collect();
    if text.is_empty() {
        return Err(StarcrazeError::Provider("No text in Gemini response".to_string()));
    }
    Ok(text)
}

pub fn image_request_body(request: &ImageSynthesis) -> Value {
    json!({
        "instances": [{ "prompt": request.prompt }],
        "parameters": {
            "sampleCount": request.count,
            "aspectRatio": request.aspect_ratio,
            "outputOptions": { "mimeType": "image/jpeg" }
        }
    })
}

pub fn extract_images(result: &Value) -> Result<Vec<Vec<u8>>, StarcrazeError> {
    let predictions = match result["predictions"].as_array() {
        Some(predictions) => predictions,
        None => return Ok(Vec::new()),
    };

    predictions
        .iter()
        .filter_map(|p| p["bytesBase64Encoded"].as_str())
        .map(|b64| {
            general_purpose::STANDARD
                .decode(b64)
                .map_err(|e| StarcrazeError::Provider(format!("Failed to decode image: {}", e)))
        })
        .collect()
}

#[async_trait]
impl GenerativeApi for GeminiClient {
    async fn generate_text(&self, request: TextGeneration) -> Result<String, StarcrazeError> {
        let start = Instant::now();
        let url = self.endpoint(&self.text_model, "generateContent");
        let result = self.post(&url, &text_request_body(&request)).await?;
        let text = extract_text(&result)?;

        debug!(
            "{} answered in {}ms ({} chars)",
            self.text_model,
            start.elapsed().as_millis(),
            text.len()
        );
        Ok(text)
    }

    async fn generate_images(&self, request: ImageSynthesis) -> Result<Vec<Vec<u8>>, StarcrazeError> {
        let start = Instant::now();
        let url = self.endpoint(&self.image_model, "predict");
        let result = self.post(&url, &image_request_body(&request)).await?;
        let images = extract_images(&result)?;

        debug!(
            "{} returned {} image(s) in {}ms",
            self.image_model,
            images.len(),
            start.elapsed().as_millis()
        );
        Ok(images)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{AiModel, MediaType};
    use crate::services::templates;
    use bytes::Bytes;

    fn attachment() -> MediaAttachment {
        MediaAttachment {
            file_name: "seed.png".to_string(),
            media_type: MediaType::Png,
            payload: Bytes::from_static(b"\x89PNG"),
            size: 4,
            preview: String::new(),
        }
    }

    #[test]
    fn text_body_puts_media_before_text() {
        let request = TextGeneration::new(templates::story("quest", 2, AiModel::Dalle3), Some(attachment()));
        let body = text_request_body(&request);

        let parts = body["contents"][0]["parts"].as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[0]["inlineData"]["data"], "iVBORw==");
        assert!(parts[1]["text"].as_str().unwrap().contains("quest"));
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
        assert!(body["generationConfig"]["topP"].is_null());
    }

    #[test]
    fn extracts_and_joins_candidate_text() {
        let response = json!({
            "candidates": [{ "content": { "parts": [{ "text": "hello " }, { "text": "world" }] } }]
        });
        assert_eq!(extract_text(&response).unwrap(), "hello world");
    }

    #[test]
    fn blocked_response_is_a_provider_error() {
        let response = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = extract_text(&response).unwrap_err();
        assert_eq!(
            err,
            StarcrazeError::Provider("No content in Gemini response: SAFETY".to_string())
        );
    }

    #[test]
    fn image_body_and_response() {
        let body = image_request_body(&ImageSynthesis {
            prompt: "castle".to_string(),
            count: 2,
            aspect_ratio: "16:9".to_string(),
        });
        assert_eq!(body["parameters"]["sampleCount"], 2);
        assert_eq!(body["parameters"]["aspectRatio"], "16:9");

        let response = json!({
            "predictions": [
                { "bytesBase64Encoded": "AQID", "mimeType": "image/jpeg" },
                { "bytesBase64Encoded": "BAU=", "mimeType": "image/jpeg" }
            ]
        });
        assert_eq!(extract_images(&response).unwrap(), vec![vec![1, 2, 3], vec![4, 5]]);
        assert!(extract_images(&json!({})).unwrap().is_empty());
    }
}
