//! Shared constants/setters for things
//!

use std::time::Duration;

/// Largest base image we accept, 5 MiB.
pub const MAX_BASE_IMAGE_BYTES: usize = 5 * 1024 * 1024;

/// Request body limit for the JSON boundaries; base64 inflates the image by a third.
pub const MAX_REQUEST_BODY_BYTES: usize = MAX_BASE_IMAGE_BYTES * 3 / 2 + 64 * 1024;

/// Media types a base image may be declared as.
pub const ACCEPTED_MEDIA_TYPES: [&str; 3] = ["image/png", "image/jpeg", "image/webp"];

/// Default OpenAI API base, without the trailing slash.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// Model used for the style analysis.
pub const DEFAULT_VISION_MODEL: &str = "gpt-4o";

/// Model used for image edits.
pub const DEFAULT_IMAGE_MODEL: &str = "gpt-image-1";

/// Output size requested from the image model.
pub const IMAGE_SIZE: &str = "1024x1024";

/// Token ceiling for the style analysis reply.
pub const STYLE_ANALYSIS_MAX_TOKENS: u32 = 400;

/// Upstream timeout for the style analysis.
pub const ANALYZE_TIMEOUT: Duration = Duration::from_secs(30);

/// Upstream timeout for a single image edit.
pub const GENERATE_TIMEOUT: Duration = Duration::from_secs(60);

/// Instruction sent next to the base image when asking for a style description.
pub const STYLE_ANALYSIS_INSTRUCTION: &str = "Describe this cartoon character art style in 3 sentences. Focus on: line thickness, coloring technique (flat/gradient/cell shading), character proportions, overall aesthetic, and any distinctive visual features. Be specific and technical so an AI image generator can replicate it.";

/// Used when the vision model answers with no text.
pub const FALLBACK_STYLE_DESCRIPTION: &str =
    "flat vector cartoon style with clean black outlines, cell shading, and cute proportions";

/// Error text for a missing API key.
pub const NOT_CONFIGURED_MESSAGE: &str = "OPENAI_API_KEY not set in environment variables";

/// Variation counts offered by the studio.
pub const COUNT_CHOICES: [u32; 5] = [1, 3, 5, 10, 20];

/// Count selected when the studio starts.
pub const DEFAULT_COUNT: u32 = 3;

/// Hard ceiling on variations per run.
pub const MAX_COUNT: u32 = 20;

/// Rough price of one generated image, in US dollars.
pub const COST_PER_IMAGE_USD: f64 = 0.042;

#[cfg(test)]
/// Style description used across tests
pub const TEST_STYLE: &str = "flat cel-shaded cartoon";
