// src/errors.rs
use actix_web::{HttpResponse, ResponseError};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StarcrazeError {
    #[error("{0}")]
    Validation(String),

    #[error("Media error: {0}")]
    Media(String),

    /// Upstream failure. The message carries provider detail and is only logged.
    #[error("Provider error: {0}")]
    Provider(String),

    /// Generic, user-facing failure of a single operation.
    #[error("{0}")]
    Operation(String),

    #[error("Operation already in progress: {0}")]
    Busy(String),

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ResponseError for StarcrazeError {
    fn error_response(&self) -> HttpResponse {
        match self {
            StarcrazeError::Validation(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Validation error",
                "message": self.to_string()
            })),
            StarcrazeError::Media(_) => HttpResponse::BadRequest().json(serde_json::json!({
                "error": "Media error",
                "message": self.to_string()
            })),
            // Provider detail never leaves the process.
            StarcrazeError::Provider(_) => {
                HttpResponse::ServiceUnavailable().json(serde_json::json!({
                    "error": "AI service error",
                    "message": "The AI service is unavailable. Please try again in a moment."
                }))
            }
            StarcrazeError::Operation(_) => HttpResponse::BadGateway().json(serde_json::json!({
                "error": "Operation failed",
                "message": self.to_string()
            })),
            StarcrazeError::Busy(_) => HttpResponse::Conflict().json(serde_json::json!({
                "error": "Busy",
                "message": self.to_string()
            })),
            StarcrazeError::SessionNotFound(_) | StarcrazeError::NotFound(_) => {
                HttpResponse::NotFound().json(serde_json::json!({
                    "error": "Not found",
                    "message": self.to_string()
                }))
            }
            StarcrazeError::Config(_) => {
                HttpResponse::InternalServerError().json(serde_json::json!({
                    "error": "Configuration error",
                    "message": self.to_string()
                }))
            }
        }
    }
}
