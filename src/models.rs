// src/models.rs
use base64::{Engine as _, engine::general_purpose};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use uuid::Uuid;

pub const MIN_STORY_FRAMES: u8 = 1;
pub const MAX_STORY_FRAMES: u8 = 9;
pub const MIN_IMAGE_QUANTITY: u8 = 1;
pub const MAX_IMAGE_QUANTITY: u8 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AiModel {
    #[serde(rename = "MidJourney")]
    MidJourney,
    #[serde(rename = "DALL-E 3")]
    Dalle3,
    #[serde(rename = "Stable Diffusion")]
    StableDiffusion,
}

impl AiModel {
    pub const ALL: [AiModel; 3] = [AiModel::MidJourney, AiModel::Dalle3, AiModel::StableDiffusion];

    pub fn label(&self) -> &'static str {
        match self {
            AiModel::MidJourney => "MidJourney",
            AiModel::Dalle3 => "DALL-E 3",
            AiModel::StableDiffusion => "Stable Diffusion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptLength {
    Short,
    Medium,
    Long,
}

impl PromptLength {
    pub const ALL: [PromptLength; 3] = [PromptLength::Short, PromptLength::Medium, PromptLength::Long];

    pub fn label(&self) -> &'static str {
        match self {
            PromptLength::Short => "Short (1-2 sentences)",
            PromptLength::Medium => "Medium (3-4 sentences)",
            PromptLength::Long => "Long (5+ sentences)",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromptStyle {
    Cinematic,
    Photorealistic,
    #[serde(rename = "Fantasy Art")]
    FantasyArt,
    Cyberpunk,
    Anime,
    Watercolor,
    #[serde(rename = "Oil Painting")]
    OilPainting,
    Steampunk,
    Minimalist,
    #[serde(rename = "Art Deco")]
    ArtDeco,
    Gothic,
    Synthwave,
    Impressionism,
    Surrealism,
    #[serde(rename = "Concept Art")]
    ConceptArt,
    #[serde(rename = "Low Poly")]
    LowPoly,
    #[serde(rename = "Pixel Art")]
    PixelArt,
    Graffiti,
    Cartoon,
    Infographic,
    #[serde(rename = "Vintage Photo")]
    VintagePhoto,
}

impl PromptStyle {
    pub const ALL: [PromptStyle; 21] = [
        PromptStyle::Cinematic,
        PromptStyle::Photorealistic,
        PromptStyle::FantasyArt,
        PromptStyle::Cyberpunk,
        PromptStyle::Anime,
        PromptStyle::Watercolor,
        PromptStyle::OilPainting,
        PromptStyle::Steampunk,
        PromptStyle::Minimalist,
        PromptStyle::ArtDeco,
        PromptStyle::Gothic,
        PromptStyle::Synthwave,
        PromptStyle::Impressionism,
        PromptStyle::Surrealism,
        PromptStyle::ConceptArt,
        PromptStyle::LowPoly,
        PromptStyle::PixelArt,
        PromptStyle::Graffiti,
        PromptStyle::Cartoon,
        PromptStyle::Infographic,
        PromptStyle::VintagePhoto,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            PromptStyle::Cinematic => "Cinematic",
            PromptStyle::Photorealistic => "Photorealistic",
            PromptStyle::FantasyArt => "Fantasy Art",
            PromptStyle::Cyberpunk => "Cyberpunk",
            PromptStyle::Anime => "Anime",
            PromptStyle::Watercolor => "Watercolor",
            PromptStyle::OilPainting => "Oil Painting",
            PromptStyle::Steampunk => "Steampunk",
            PromptStyle::Minimalist => "Minimalist",
            PromptStyle::ArtDeco => "Art Deco",
            PromptStyle::Gothic => "Gothic",
            PromptStyle::Synthwave => "Synthwave",
            PromptStyle::Impressionism => "Impressionism",
            PromptStyle::Surrealism => "Surrealism",
            PromptStyle::ConceptArt => "Concept Art",
            PromptStyle::LowPoly => "Low Poly",
            PromptStyle::PixelArt => "Pixel Art",
            PromptStyle::Graffiti => "Graffiti",
            PromptStyle::Cartoon => "Cartoon",
            PromptStyle::Infographic => "Infographic",
            PromptStyle::VintagePhoto => "Vintage Photo",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ImageStyle {
    Cinematic,
    Photorealistic,
    #[serde(rename = "Anime / Manga")]
    AnimeManga,
    #[serde(rename = "Fantasy Art")]
    FantasyArt,
    Cyberpunk,
    Steampunk,
    Watercolor,
    #[serde(rename = "Oil Painting")]
    OilPainting,
    Krita,
    Minimalist,
    #[serde(rename = "Art Deco")]
    ArtDeco,
    Gothic,
    Synthwave,
    Impressionism,
    Surrealism,
    #[serde(rename = "Concept Art")]
    ConceptArt,
    #[serde(rename = "Low Poly")]
    LowPoly,
    #[serde(rename = "Pixel Art")]
    PixelArt,
    Graffiti,
    #[serde(rename = "Vintage Photo")]
    VintagePhoto,
    Abstract,
    #[serde(rename = "3D Render")]
    Render3d,
    #[serde(rename = "Logo Design")]
    LogoDesign,
}

impl ImageStyle {
    pub const ALL: [ImageStyle; 23] = [
        ImageStyle::Cinematic,
        ImageStyle::Photorealistic,
        ImageStyle::AnimeManga,
        ImageStyle::FantasyArt,
        ImageStyle::Cyberpunk,
        ImageStyle::Steampunk,
        ImageStyle::Watercolor,
        ImageStyle::OilPainting,
        ImageStyle::Krita,
        ImageStyle::Minimalist,
        ImageStyle::ArtDeco,
        ImageStyle::Gothic,
        ImageStyle::Synthwave,
        ImageStyle::Impressionism,
        ImageStyle::Surrealism,
        ImageStyle::ConceptArt,
        ImageStyle::LowPoly,
        ImageStyle::PixelArt,
        ImageStyle::Graffiti,
        ImageStyle::VintagePhoto,
        ImageStyle::Abstract,
        ImageStyle::Render3d,
        ImageStyle::LogoDesign,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ImageStyle::Cinematic => "Cinematic",
            ImageStyle::Photorealistic => "Photorealistic",
            ImageStyle::AnimeManga => "Anime / Manga",
            ImageStyle::FantasyArt => "Fantasy Art",
            ImageStyle::Cyberpunk => "Cyberpunk",
            ImageStyle::Steampunk => "Steampunk",
            ImageStyle::Watercolor => "Watercolor",
            ImageStyle::OilPainting => "Oil Painting",
            ImageStyle::Krita => "Krita",
            ImageStyle::Minimalist => "Minimalist",
            ImageStyle::ArtDeco => "Art Deco",
            ImageStyle::Gothic => "Gothic",
            ImageStyle::Synthwave => "Synthwave",
            ImageStyle::Impressionism => "Impressionism",
            ImageStyle::Surrealism => "Surrealism",
            ImageStyle::ConceptArt => "Concept Art",
            ImageStyle::LowPoly => "Low Poly",
            ImageStyle::PixelArt => "Pixel Art",
            ImageStyle::Graffiti => "Graffiti",
            ImageStyle::VintagePhoto => "Vintage Photo",
            ImageStyle::Abstract => "Abstract",
            ImageStyle::Render3d => "3D Render",
            ImageStyle::LogoDesign => "Logo Design",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    SixteenNine,
    #[serde(rename = "1:1")]
    OneOne,
    #[serde(rename = "9:16")]
    NineSixteen,
    #[serde(rename = "4:3")]
    FourThree,
    #[serde(rename = "3:2")]
    ThreeTwo,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::SixteenNine,
        AspectRatio::OneOne,
        AspectRatio::NineSixteen,
        AspectRatio::FourThree,
        AspectRatio::ThreeTwo,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            AspectRatio::SixteenNine => "16:9 (Widescreen)",
            AspectRatio::OneOne => "1:1 (Square)",
            AspectRatio::NineSixteen => "9:16 (Portrait)",
            AspectRatio::FourThree => "4:3 (Standard)",
            AspectRatio::ThreeTwo => "3:2 (Photo)",
        }
    }

    /// The bare `w:h` token, as written into prompts (`--ar 16:9`).
    pub fn raw(&self) -> &'static str {
        self.label().split(' ').next().unwrap_or("1:1")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetailLevel {
    Standard,
    High,
    Ultra,
}

impl DetailLevel {
    pub const ALL: [DetailLevel; 3] = [DetailLevel::Standard, DetailLevel::High, DetailLevel::Ultra];

    pub fn label(&self) -> &'static str {
        match self {
            DetailLevel::Standard => "Standard",
            DetailLevel::High => "High",
            DetailLevel::Ultra => "4K / Ultra",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptMode {
    Normal,
    Enhanced,
}

impl PromptMode {
    pub const ALL: [PromptMode; 2] = [PromptMode::Normal, PromptMode::Enhanced];

    pub fn label(&self) -> &'static str {
        match self {
            PromptMode::Normal => "Normal",
            PromptMode::Enhanced => "Enhanced",
        }
    }
}

macro_rules! display_label {
    ($($ty:ty),*) => {
        $(
            impl fmt::Display for $ty {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.label())
                }
            }
        )*
    };
}

display_label!(AiModel, PromptLength, PromptStyle, ImageStyle, AspectRatio, DetailLevel, PromptMode);

/// The seven request kinds. Each one is also an operation family with its own
/// pending flag, error and result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    EnhancePrompt,
    DescribeImage,
    RestylePrompt,
    StoryPrompts,
    SynthesizeImages,
    RandomPrompt,
    SuggestNegative,
}

impl OperationKind {
    pub const ALL: [OperationKind; 7] = [
        OperationKind::EnhancePrompt,
        OperationKind::DescribeImage,
        OperationKind::RestylePrompt,
        OperationKind::StoryPrompts,
        OperationKind::SynthesizeImages,
        OperationKind::RandomPrompt,
        OperationKind::SuggestNegative,
    ];

    pub fn view(&self) -> View {
        match self {
            OperationKind::EnhancePrompt
            | OperationKind::DescribeImage
            | OperationKind::RestylePrompt => View::Prompt,
            OperationKind::StoryPrompts => View::Story,
            OperationKind::SynthesizeImages
            | OperationKind::RandomPrompt
            | OperationKind::SuggestNegative => View::Studio,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OperationKind::EnhancePrompt => "enhance_prompt",
            OperationKind::DescribeImage => "describe_image",
            OperationKind::RestylePrompt => "restyle_prompt",
            OperationKind::StoryPrompts => "story_prompts",
            OperationKind::SynthesizeImages => "synthesize_images",
            OperationKind::RandomPrompt => "random_prompt",
            OperationKind::SuggestNegative => "suggest_negative",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum View {
    Prompt,
    Story,
    Studio,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaType {
    #[serde(rename = "image/png")]
    Png,
    #[serde(rename = "image/jpeg")]
    Jpeg,
    #[serde(rename = "image/webp")]
    Webp,
}

impl MediaType {
    pub fn mime(&self) -> &'static str {
        match self {
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
            MediaType::Webp => "image/webp",
        }
    }
}

/// An uploaded image, ready to be sent inline to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct MediaAttachment {
    pub file_name: String,
    pub media_type: MediaType,
    #[serde(skip)]
    pub payload: Bytes,
    pub size: usize,
    pub preview: String,
}

impl MediaAttachment {
    pub fn base64_payload(&self) -> String {
        general_purpose::STANDARD.encode(&self.payload)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NegativeConstraint {
    pub enabled: bool,
    pub text: String,
}

impl NegativeConstraint {
    /// The text to send, if the constraint is switched on and non-blank.
    pub fn effective(&self) -> Option<String> {
        let text = self.text.trim();
        (self.enabled && !text.is_empty()).then(|| text.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationOptions {
    pub model: AiModel,
    pub length: PromptLength,
    pub prompt_style: PromptStyle,
    pub image_style: ImageStyle,
    pub aspect_ratio: AspectRatio,
    pub detail_level: DetailLevel,
    pub mode: PromptMode,
    pub frame_count: u8,
    pub quantity: u8,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            model: AiModel::MidJourney,
            length: PromptLength::Medium,
            prompt_style: PromptStyle::Cinematic,
            image_style: ImageStyle::Cinematic,
            aspect_ratio: AspectRatio::SixteenNine,
            detail_level: DetailLevel::High,
            mode: PromptMode::Enhanced,
            frame_count: 3,
            quantity: 1,
        }
    }
}

/// One user action's worth of input. Built per action and never mutated.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub kind: OperationKind,
    pub subject: String,
    pub media: Option<MediaAttachment>,
    pub options: GenerationOptions,
    pub negative: Option<String>,
}

impl GenerationRequest {
    pub fn new(kind: OperationKind, options: GenerationOptions) -> Self {
        Self {
            kind,
            subject: String::new(),
            media: None,
            options,
            negative: None,
        }
    }

    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }

    pub fn with_media(mut self, media: Option<MediaAttachment>) -> Self {
        self.media = media;
        self
    }

    pub fn with_negative(mut self, negative: Option<String>) -> Self {
        self.negative = negative;
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct GeneratedImage {
    pub id: Uuid,
    pub mime_type: String,
    #[serde(rename = "data_base64", serialize_with = "serialize_base64")]
    pub data: Bytes,
    pub created_at: DateTime<Utc>,
}

impl GeneratedImage {
    pub fn jpeg(data: Vec<u8>) -> Self {
        Self {
            id: Uuid::new_v4(),
            mime_type: "image/jpeg".to_string(),
            data: Bytes::from(data),
            created_at: Utc::now(),
        }
    }

    /// Download name, stamped with the creation time in unix millis.
    pub fn download_name(&self) -> String {
        format!("starcraze-studio-{}.jpg", self.created_at.timestamp_millis())
    }
}

fn serialize_base64<S: Serializer>(data: &Bytes, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&general_purpose::STANDARD.encode(data))
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum GenerationResult {
    Text(String),
    Sequence(Vec<String>),
    Images(Vec<GeneratedImage>),
}

impl GenerationResult {
    pub fn into_text(self) -> Option<String> {
        match self {
            GenerationResult::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_sequence(self) -> Option<Vec<String>> {
        match self {
            GenerationResult::Sequence(items) => Some(items),
            _ => None,
        }
    }

    pub fn into_images(self) -> Option<Vec<GeneratedImage>> {
        match self {
            GenerationResult::Images(images) => Some(images),
            _ => None,
        }
    }
}

/// Every closed option set, for populating pickers.
#[derive(Debug, Serialize)]
pub struct OptionCatalog {
    pub models: Vec<AiModel>,
    pub lengths: Vec<PromptLength>,
    pub prompt_styles: Vec<PromptStyle>,
    pub image_styles: Vec<ImageStyle>,
    pub aspect_ratios: Vec<AspectRatio>,
    pub detail_levels: Vec<DetailLevel>,
    pub modes: Vec<PromptMode>,
    pub story_frames: (u8, u8),
    pub image_quantity: (u8, u8),
}

impl OptionCatalog {
    pub fn new() -> Self {
        Self {
            models: AiModel::ALL.to_vec(),
            lengths: PromptLength::ALL.to_vec(),
            prompt_styles: PromptStyle::ALL.to_vec(),
            image_styles: ImageStyle::ALL.to_vec(),
            aspect_ratios: AspectRatio::ALL.to_vec(),
            detail_levels: DetailLevel::ALL.to_vec(),
            modes: PromptMode::ALL.to_vec(),
            story_frames: (MIN_STORY_FRAMES, MAX_STORY_FRAMES),
            image_quantity: (MIN_IMAGE_QUANTITY, MAX_IMAGE_QUANTITY),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn closed_sets_have_expected_sizes() {
        assert_eq!(PromptStyle::ALL.len(), 21);
        assert_eq!(ImageStyle::ALL.len(), 23);
        assert_eq!(AspectRatio::ALL.len(), 5);
    }

    #[test]
    fn style_wire_names_match_labels() {
        for style in ImageStyle::ALL {
            let json = serde_json::to_value(style).unwrap();
            assert_eq!(json, serde_json::Value::String(style.label().to_string()));
        }
        for style in PromptStyle::ALL {
            let json = serde_json::to_value(style).unwrap();
            assert_eq!(json, serde_json::Value::String(style.label().to_string()));
        }
    }

    #[test]
    fn unknown_option_values_are_rejected() {
        assert!(serde_json::from_str::<AiModel>("\"Firefly\"").is_err());
        assert!(serde_json::from_str::<AspectRatio>("\"21:9\"").is_err());
        assert!(serde_json::from_str::<DetailLevel>("\"extreme\"").is_err());
    }

    #[test]
    fn raw_aspect_ratio_drops_the_description() {
        assert_eq!(AspectRatio::SixteenNine.raw(), "16:9");
        assert_eq!(AspectRatio::ThreeTwo.raw(), "3:2");
    }

    #[test]
    fn negative_constraint_only_applies_when_enabled_and_non_blank() {
        let mut negative = NegativeConstraint {
            enabled: false,
            text: "blurry".to_string(),
        };
        assert_eq!(negative.effective(), None);

        negative.enabled = true;
        assert_eq!(negative.effective().as_deref(), Some("blurry"));

        negative.text = "   ".to_string();
        assert_eq!(negative.effective(), None);
    }

    #[test]
    fn download_name_is_stable_per_image() {
        let image = GeneratedImage::jpeg(vec![0xff, 0xd8]);
        let name = image.download_name();
        assert_eq!(name, image.download_name());
        assert_eq!(
            name,
            format!("starcraze-studio-{}.jpg", image.created_at.timestamp_millis())
        );
    }

    #[test]
    fn every_operation_belongs_to_one_view() {
        let studio: Vec<_> = OperationKind::ALL
            .iter()
            .filter(|kind| kind.view() == View::Studio)
            .collect();
        assert_eq!(studio.len(), 3);
        assert_eq!(OperationKind::StoryPrompts.view(), View::Story);
    }
}
