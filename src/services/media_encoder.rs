// src/services/media_encoder.rs
use crate::errors::StarcrazeError;
use crate::models::{MediaAttachment, MediaType};
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use image::{GenericImageView, ImageFormat as ImgFormat};

pub const PREVIEW_MAX_SIZE: u32 = 512;

pub struct MediaEncoder {
    preview_max_size: u32,
}

impl MediaEncoder {
    pub fn new() -> Self {
        Self {
            preview_max_size: PREVIEW_MAX_SIZE,
        }
    }

    /// Turns an uploaded file into an attachment. The payload is kept as
    /// uploaded; only the preview is re-encoded.
    pub fn encode(&self, file_name: &str, data: Bytes) -> Result<MediaAttachment, StarcrazeError> {
        if data.is_empty() {
            return Err(StarcrazeError::Media(format!("{} is empty", file_name)));
        }

        let media_type = self.detect_media_type(&data)?;
        let preview = self.preview(&data, media_type)?;

        Ok(MediaAttachment {
            file_name: file_name.to_string(),
            media_type,
            size: data.len(),
            payload: data,
            preview,
        })
    }

    pub fn detect_media_type(&self, data: &[u8]) -> Result<MediaType, StarcrazeError> {
        let format = image::guess_format(data)
            .map_err(|e| StarcrazeError::Media(format!("Unrecognized image data: {}", e)))?;

        match format {
            ImgFormat::Png => Ok(MediaType::Png),
            ImgFormat::Jpeg => Ok(MediaType::Jpeg),
            ImgFormat::WebP => Ok(MediaType::Webp),
            other => Err(StarcrazeError::Media(format!(
                "Unsupported image type {:?}; use PNG, JPEG or WEBP",
                other
            ))),
        }
    }

    /// Data URL for display. Small images are passed through untouched,
    /// larger ones are scaled down and re-encoded as PNG.
    pub fn preview(&self, data: &[u8], media_type: MediaType) -> Result<String, StarcrazeError> {
        let img = image::load_from_memory(data)
            .map_err(|e| StarcrazeError::Media(format!("Failed to read image: {}", e)))?;

        let (width, height) = img.dimensions();
        let max_size = self.preview_max_size;

        if width <= max_size && height <= max_size {
            return Ok(data_url(media_type.mime(), data));
        }

        let ratio = (max_size as f32 / width.max(height) as f32).min(1.0);
        let new_width = ((width as f32 * ratio) as u32).max(1);
        let new_height = ((height as f32 * ratio) as u32).max(1);

        let resized = img.resize(new_width, new_height, image::imageops::FilterType::Lanczos3);

        let mut output = Vec::new();
        resized
            .write_to(&mut std::io::Cursor::new(&mut output), ImgFormat::Png)
            .map_err(|e| StarcrazeError::Media(format!("Failed to encode preview: {}", e)))?;

        Ok(data_url(MediaType::Png.mime(), &output))
    }
}

fn data_url(mime: &str, data: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(data))
}
