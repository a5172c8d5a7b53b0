// src/services/templates.rs
//! Instruction text for every operation. Everything here is a pure function of
//! the selected options; nothing talks to the network.

use crate::models::{AiModel, AspectRatio, DetailLevel, ImageStyle, PromptLength, PromptMode, PromptStyle};
use serde_json::{Value, json};

/// System instruction plus the user-facing text block of one request.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub system: String,
    pub user_text: String,
    pub temperature: f32,
    pub top_p: Option<f32>,
    pub response_schema: Option<Value>,
}

impl Instruction {
    fn new(system: String, user_text: String, temperature: f32) -> Self {
        Self {
            system,
            user_text,
            temperature,
            top_p: None,
            response_schema: None,
        }
    }

    fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }
}

/// Syntax rules for one target model's prompt dialect.
pub fn dialect_rules(model: AiModel, aspect_ratio: AspectRatio, negative: Option<&str>) -> String {
    let ratio = aspect_ratio.raw();
    match model {
        AiModel::MidJourney => {
            let mut rules = format!(
                "- Write in MidJourney syntax: a dense descriptive phrase followed by parameters.\n\
                 - End the prompt with the aspect ratio parameter \"--ar {ratio}\". Add \"--style raw\" or \"--v 6.0\" where they help."
            );
            if let Some(negative) = negative {
                rules.push_str(&format!("\n- Exclude unwanted elements with \"--no {negative}\"."));
            }
            rules
        }
        AiModel::Dalle3 => {
            let mut rules = format!(
                "- Write for DALL-E 3 in descriptive, natural-language sentences. Do not use parameter flags.\n\
                 - Describe the {ratio} framing naturally in the text (for example \"a wide {ratio} composition\")."
            );
            if let Some(negative) = negative {
                rules.push_str(&format!(
                    "\n- Weave the absence of these elements into the description: {negative}."
                ));
            }
            rules
        }
        AiModel::StableDiffusion => {
            let mut rules = format!(
                "- Write for Stable Diffusion as comma-separated keywords. Emphasize important terms with parentheses, like (masterpiece, best quality).\n\
                 - Describe the {ratio} aspect ratio textually as a keyword."
            );
            if let Some(negative) = negative {
                rules.push_str(&format!(
                    "\n- After the main prompt add a separate section \"Negative prompt: {negative}\"."
                ));
            }
            rules
        }
    }
}

pub fn enhance(
    idea: &str,
    model: AiModel,
    length: PromptLength,
    aspect_ratio: AspectRatio,
    mode: PromptMode,
    negative: Option<&str>,
) -> Instruction {
    let dialect = dialect_rules(model, aspect_ratio, negative);
    let system = match mode {
        PromptMode::Enhanced => format!(
            "You are a world-class AI prompt engineer specializing in vivid, detailed and effective prompts for generative image models. \
             Take the user's simple idea and transform it into a high-quality, detailed prompt tailored for {model}.\n\n\
             RULES:\n\
             - Return ONLY the final prompt as a single block of text.\n\
             - Do NOT include explanations, preambles, or markdown formatting like ```.\n\
             - Creative elaboration is welcome: add subject detail, lighting, composition and mood.\n\
             {dialect}\n\
             - Incorporate the aspect ratio and any negative prompt using the target model's syntax."
        ),
        PromptMode::Normal => format!(
            "You are an AI prompt assistant. Take the user's idea and formulate it into a clear and concise prompt for {model}.\n\n\
             RULES:\n\
             - Return ONLY the final prompt.\n\
             - Do NOT add creative details that are not in the original idea.\n\
             {dialect}"
        ),
    };

    let mut user_text = format!(
        "Base Idea: \"{idea}\"\nTarget Model: \"{model}\"\nDesired Length: \"{length}\"\nAspect Ratio: \"{}\"\n",
        aspect_ratio.raw()
    );
    if let Some(negative) = negative {
        user_text.push_str(&format!("Negative Prompt: \"{negative}\"\n"));
    }
    user_text.push_str("\nGenerate the prompt based on the system instructions.");

    Instruction::new(system, user_text, 0.8).top_p(0.95)
}

pub fn describe_image(model: AiModel, aspect_ratio: AspectRatio, negative: Option<&str>) -> Instruction {
    let dialect = dialect_rules(model, aspect_ratio, negative);
    let system = format!(
        "You are an expert image analyst and AI prompt engineer. Analyze the provided image and write a highly descriptive, \
         artistic prompt that could recreate or reimagine it with a generative model.\n\n\
         RULES:\n\
         - Describe the main subject, setting, style, lighting and color palette in detail.\n\
         {dialect}\n\
         - Return ONLY the final, complete prompt as a single block of text.\n\
         - Do NOT include a preamble like \"Here is the prompt:\" or markdown.\n\
         - Be creative and inspiring."
    );

    let mut user_text = format!(
        "Analyze this image and generate a prompt for the {model} model with an aspect ratio of {}.",
        aspect_ratio.raw()
    );
    if let Some(negative) = negative {
        user_text.push_str(&format!(" Incorporate this negative prompt: \"{negative}\"."));
    }
    user_text.push_str(" Follow the system instructions.");

    Instruction::new(system, user_text, 0.7)
}

pub fn restyle(base_prompt: &str, style: PromptStyle, model: AiModel, negative: Option<&str>) -> Instruction {
    let system = format!(
        "You are an AI prompt stylist. Rewrite a base prompt for a generative image model so it matches a specific artistic style.\n\n\
         RULES:\n\
         - Adhere strictly to the syntax preferred by {model}.\n\
         - Keep the core subject of the base prompt.\n\
         - Infuse keywords, artists and techniques relevant to the '{style}' style.\n\
         - Preserve any negative prompt and format it for the target model (e.g. \"--no ...\" for MidJourney, \"Negative prompt: ...\" for Stable Diffusion).\n\
         - Preserve any aspect ratio parameters (like --ar) already in the base prompt.\n\
         - Return ONLY the rewritten prompt. No preambles, explanations or markdown."
    );

    let mut user_text = format!(
        "Base Prompt: \"{base_prompt}\"\nRequested Style: \"{style}\"\nTarget Model: \"{model}\"\n"
    );
    if let Some(negative) = negative {
        user_text.push_str(&format!("Negative Prompt to preserve: \"{negative}\"\n"));
    }
    user_text.push_str("\nRewrite the prompt based on the system instructions.");

    Instruction::new(system, user_text, 0.85).top_p(0.95)
}

pub const STORY_KEY: &str = "storyPrompts";

pub fn story(description: &str, frame_count: u8, model: AiModel) -> Instruction {
    let model_hint = match model {
        AiModel::MidJourney => "Include MidJourney parameters such as --ar 16:9 in every prompt.",
        AiModel::Dalle3 => "Write every prompt as natural-language sentences.",
        AiModel::StableDiffusion => "Write every prompt as comma-separated keywords with (emphasis) where useful.",
    };
    let system = format!(
        "You are a creative storyteller and AI prompt engineer. Generate a sequence of prompts for a generative image model that tells a story.\n\
         1. Analyze the provided image for its subject, artistic style, color palette and mood. Keep that style in every prompt.\n\
         2. Read the user's story description to understand the narrative.\n\
         3. Generate exactly {frame_count} prompts that form a sequential story. Each prompt is one clear step of the narrative.\n\
         4. Vary scene, action or camera angle between prompts (close-up shot, wide angle, from behind) to show progression.\n\
         5. Tailor the syntax for {model}. {model_hint}\n\
         6. Return a JSON object with a single key \"{STORY_KEY}\" holding an array of strings.\n\
         7. Do NOT include any other text, explanations or markdown."
    );
    let user_text = format!(
        "Story Description: \"{description}\". Generate exactly {frame_count} story prompts for the {model} model. Follow the system instructions precisely."
    );

    let mut instruction = Instruction::new(system, user_text, 0.85);
    instruction.response_schema = Some(story_schema(frame_count));
    instruction
}

pub fn story_schema(frame_count: u8) -> Value {
    json!({
        "type": "OBJECT",
        "properties": {
            STORY_KEY: {
                "type": "ARRAY",
                "description": format!("An array of exactly {} prompt strings.", frame_count),
                "items": { "type": "STRING" }
            }
        },
        "required": [STORY_KEY]
    })
}

pub fn detail_instruction(detail_level: DetailLevel) -> &'static str {
    match detail_level {
        DetailLevel::Ultra => {
            "The user wants maximum quality and detail. Add hyper-realistic, photorealistic and intricate details. \
             Use phrases like '4k resolution', '8k', 'sharp focus', 'insanely detailed', 'masterpiece quality'."
        }
        DetailLevel::High => {
            "The user wants high detail. Add realistic and intricate details. Use phrases like 'sharp focus', 'highly detailed'."
        }
        DetailLevel::Standard => {
            "The user wants a standard level of detail. Focus on a clean, artistic composition without excessive micro-details."
        }
    }
}

pub fn master_prompt(idea: &str, style: ImageStyle, detail_level: DetailLevel, mode: PromptMode) -> Instruction {
    let preamble = match mode {
        PromptMode::Enhanced => {
            "You are a world-class AI prompt engineer for a powerful text-to-image model called 'Imagen'. \
             Creatively expand the user's idea, style and parameters into a single, cohesive, hyper-detailed master prompt. \
             Add your own creative details to make the image more interesting and visually stunning."
        }
        PromptMode::Normal => {
            "You are an AI prompt engineer for 'Imagen'. Format the user's idea and style into a clear and effective prompt. \
             Stick closely to the user's original idea."
        }
    };
    let detail = detail_instruction(detail_level);
    let system = format!(
        "{preamble}\n\n\
         RULES:\n\
         - The prompt must be a single, rich paragraph.\n\
         - Describe the subject, environment, lighting, colors and composition in vivid detail.\n\
         - Incorporate keywords and artistic nuances relevant to the selected style: \"{style}\".\n\
         - {detail}\n\
         - If a reference image is provided, weave its key elements (subject, mood, style) into the prompt.\n\
         - The prompt must NOT contain negative prompt instructions; those are handled separately.\n\
         - Return ONLY the final prompt text. No explanations, preambles or markdown."
    );
    let user_text = format!(
        "User's Idea: \"{idea}\". Style: \"{style}\". Detail Level: {detail_level}. Create the master prompt based on these inputs and the system instructions."
    );

    Instruction::new(system, user_text, 0.8)
}

pub fn random_prompt() -> Instruction {
    let system = "You are a creative muse. Generate a single, compelling and visually interesting idea for an AI image, as a short phrase or sentence.\n\n\
         RULES:\n\
         - Return ONLY the idea as a single line of text.\n\
         - Do NOT include explanations, preambles or markdown.\n\
         - Be creative and varied: fantastical, futuristic, abstract or surreal.\n\
         - Example outputs: \"A glass apple in the center of a swirling galaxy.\", \"A city built on the back of a giant turtle.\", \"The library of lost memories.\""
        .to_string();

    Instruction::new(system, "Generate a creative image prompt.".to_string(), 1.0).top_p(1.0)
}

pub fn negative_prompt(idea: &str) -> Instruction {
    let system = "You are an expert prompt engineer for text-to-image models. Generate a concise, comma-separated list of negative prompt keywords \
         for the user's idea or reference image, to help avoid common visual artifacts and unwanted elements.\n\n\
         RULES:\n\
         - Analyze the prompt idea (and the image if provided).\n\
         - Include generally useful keywords such as 'blurry, low quality, text, watermark, signature, ugly, deformed, extra limbs'.\n\
         - If the subject is a person, add anatomy keywords like 'disfigured, missing fingers, extra fingers, bad anatomy'.\n\
         - For landscapes, use fewer anatomy-related keywords.\n\
         - Return ONLY the comma-separated keywords as a single line of text.\n\
         - Do NOT include explanations, preambles or markdown."
        .to_string();
    let user_text = format!("User's Idea: \"{idea}\". Generate a suitable negative prompt.");

    Instruction::new(system, user_text, 0.5)
}
