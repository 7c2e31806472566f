//! Config handling

use std::time::Duration;

use tracing::log::LevelFilter;
use url::Url;

use crate::cli::CliOptions;
use crate::constants::{ANALYZE_TIMEOUT, GENERATE_TIMEOUT};
use crate::error::MonkeyGenError;

/// Sets up logging based on the debug flag
pub fn setup_logging(debug: bool) -> Result<(), Box<std::io::Error>> {
    let level = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut logger = simple_logger::SimpleLogger::new().with_level(level);
    if !debug {
        logger = logger
            .with_module_level("tracing", LevelFilter::Warn)
            .with_module_level("rustls", LevelFilter::Info)
            .with_module_level("hyper_util", LevelFilter::Info)
            .with_module_level("reqwest", LevelFilter::Info)
            .with_module_level("h2", LevelFilter::Info);
    }
    logger.init().map_err(|err| {
        eprintln!("Failed to initialize logger: {}", err);
        Box::new(std::io::Error::other(err))
    })
}

/// How to reach the OpenAI API.
#[derive(Clone)]
pub struct UpstreamConfig {
    /// API key; `None` makes every upstream call fail as not configured
    pub api_key: Option<String>,
    /// API base, e.g. `https://api.openai.com/v1`
    pub base_url: Url,
    /// Model used for the style analysis
    pub vision_model: String,
    /// Model used for image edits
    pub image_model: String,
    /// Timeout of one style analysis call
    pub analyze_timeout: Duration,
    /// Timeout of one image edit call
    pub generate_timeout: Duration,
}

impl std::fmt::Debug for UpstreamConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UpstreamConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("base_url", &self.base_url.as_str())
            .field("vision_model", &self.vision_model)
            .field("image_model", &self.image_model)
            .finish()
    }
}

impl UpstreamConfig {
    /// Builds the config, treating a blank key as no key.
    pub fn new(
        api_key: Option<&str>,
        base_url: &str,
        vision_model: &str,
        image_model: &str,
    ) -> Result<Self, MonkeyGenError> {
        let base_url = Url::parse(base_url.trim_end_matches('/')).map_err(|err| {
            MonkeyGenError::InternalServerError(format!("Invalid upstream base URL: {err}"))
        })?;
        Ok(Self {
            api_key: api_key
                .map(str::trim)
                .filter(|key| !key.is_empty())
                .map(str::to_string),
            base_url,
            vision_model: vision_model.to_string(),
            image_model: image_model.to_string(),
            analyze_timeout: ANALYZE_TIMEOUT,
            generate_timeout: GENERATE_TIMEOUT,
        })
    }

    /// Full URL of an API path such as `chat/completions`.
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}

impl TryFrom<&CliOptions> for UpstreamConfig {
    type Error = MonkeyGenError;

    fn try_from(cli: &CliOptions) -> Result<Self, Self::Error> {
        Self::new(
            cli.openai_api_key.as_deref(),
            &cli.openai_base_url,
            &cli.vision_model,
            &cli.image_model,
        )
    }
}
