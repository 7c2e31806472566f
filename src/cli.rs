//! CLI parser
use clap::Parser;
use std::num::NonZeroU16;

use crate::constants::{DEFAULT_IMAGE_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_VISION_MODEL};

#[derive(Parser, Debug)]
/// CLI Options
pub struct CliOptions {
    #[clap(long, help = "Enable debug logging", env = "MONKEYGEN_DEBUG")]
    /// Enable debug logging. Env: MONKEYGEN_DEBUG
    pub debug: bool,
    #[clap(long, short, default_value = "9000", env = "MONKEYGEN_PORT")]
    /// http listener, defaults to `9000`.
    /// Env: MONKEYGEN_PORT
    pub port: NonZeroU16,
    #[clap(
        long,
        short,
        default_value = "127.0.0.1",
        env = "MONKEYGEN_LISTEN_ADDRESS"
    )]
    /// Listen address, defaults to `127.0.0.1`.
    /// Env: MONKEYGEN_LISTEN_ADDRESS
    pub listen_address: String,

    #[clap(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    /// OpenAI API key. Without it every generation request reports the service
    /// as not configured.
    /// Env: OPENAI_API_KEY
    pub openai_api_key: Option<String>,

    #[clap(long, default_value = DEFAULT_OPENAI_BASE_URL, env = "OPENAI_BASE_URL")]
    /// OpenAI API base URL.
    /// Env: OPENAI_BASE_URL
    pub openai_base_url: String,

    #[clap(long, default_value = DEFAULT_VISION_MODEL)]
    /// Model used to describe the base image's art style
    pub vision_model: String,

    #[clap(long, default_value = DEFAULT_IMAGE_MODEL)]
    /// Model used to edit the base image
    pub image_model: String,

    #[clap(long, env = "MONKEYGEN_SEED")]
    /// Seed for trait sampling, for reproducible prompts.
    /// Env: MONKEYGEN_SEED
    pub seed: Option<u64>,
}
