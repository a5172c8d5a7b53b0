// src/config.rs
use crate::errors::StarcrazeError;
use std::path::PathBuf;

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

#[derive(Debug, Clone)]
pub struct Config {
    pub api_key: String,
    pub bind: String,
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub static_dir: Option<PathBuf>,
}

impl Config {
    /// Reads the process environment. A missing credential is an error.
    pub fn from_env() -> Result<Self, StarcrazeError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, StarcrazeError> {
        let read = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let api_key = read("GEMINI_API_KEY")
            .or_else(|| read("API_KEY"))
            .ok_or_else(|| {
                StarcrazeError::Config("GEMINI_API_KEY (or API_KEY) must be set".to_string())
            })?;

        Ok(Self {
            api_key,
            bind: read("STARCRAZE_BIND").unwrap_or_else(|| DEFAULT_BIND.to_string()),
            api_base: read("STARCRAZE_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            text_model: read("STARCRAZE_TEXT_MODEL")
                .unwrap_or_else(|| DEFAULT_TEXT_MODEL.to_string()),
            image_model: read("STARCRAZE_IMAGE_MODEL")
                .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
            static_dir: read("STARCRAZE_STATIC_DIR").map(PathBuf::from),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn missing_credential_is_fatal() {
        let err = Config::from_lookup(lookup(&[])).unwrap_err();
        assert!(matches!(err, StarcrazeError::Config(_)));

        let err = Config::from_lookup(lookup(&[("GEMINI_API_KEY", "  ")])).unwrap_err();
        assert!(matches!(err, StarcrazeError::Config(_)));
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "secret")])).unwrap();
        assert_eq!(config.api_key, "secret");
        assert_eq!(config.bind, DEFAULT_BIND);
        assert_eq!(config.api_base, DEFAULT_API_BASE);
        assert_eq!(config.text_model, DEFAULT_TEXT_MODEL);
        assert_eq!(config.image_model, DEFAULT_IMAGE_MODEL);
        assert!(config.static_dir.is_none());
    }

    #[test]
    fn overrides_are_honoured() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "primary"),
            ("API_KEY", "secondary"),
            ("STARCRAZE_API_BASE", "http://localhost:9000/v1/"),
            ("STARCRAZE_STATIC_DIR", "./web"),
        ]))
        .unwrap();
        assert_eq!(config.api_key, "primary");
        assert_eq!(config.api_base, "http://localhost:9000/v1");
        assert_eq!(config.static_dir, Some(PathBuf::from("./web")));
    }
}
