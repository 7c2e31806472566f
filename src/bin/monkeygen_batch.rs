use anyhow::{Context, Result, anyhow};
use clap::Parser;
use monkeygen::base_image::BaseImage;
use monkeygen::config::{UpstreamConfig, setup_logging};
use monkeygen::constants::{
    DEFAULT_COUNT, DEFAULT_IMAGE_MODEL, DEFAULT_OPENAI_BASE_URL, DEFAULT_VISION_MODEL, MAX_COUNT,
};
use monkeygen::gallery::{Gallery, GeneratedImage, download_filename, estimated_cost_usd};
use monkeygen::openai::OpenAiClient;
use monkeygen::orchestrator::{Orchestrator, RunRequest};
use monkeygen::trait_pool::{TraitCategory, default_active};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Generate NFT monkey variations from one base image.
///
/// Minimal UX:
///   monkeygen_batch monkey.png --count 5
#[derive(Parser, Debug)]
#[command(name = "monkeygen_batch")]
#[command(about = "Generate a batch of NFT monkey variations from one base image")]
struct Args {
    /// Base image (PNG, JPG or WebP, max 5MB)
    image: PathBuf,

    /// Number of variations
    #[arg(
        long,
        short,
        default_value_t = DEFAULT_COUNT,
        value_parser = clap::value_parser!(u32).range(1..=i64::from(MAX_COUNT))
    )]
    count: u32,

    /// Comma separated trait categories, e.g. `hat,fur`. Defaults to all but earring
    #[arg(long, value_delimiter = ',')]
    traits: Vec<TraitCategory>,

    /// Free text appended to every prompt
    #[arg(long)]
    extra_prompt: Option<String>,

    /// Output directory, files are written as <dir>/nft-NNN.png
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    /// Seed for trait sampling
    #[arg(long, env = "MONKEYGEN_SEED")]
    seed: Option<u64>,

    /// OpenAI API key
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    openai_api_key: Option<String>,

    /// OpenAI API base URL
    #[arg(long, default_value = DEFAULT_OPENAI_BASE_URL, env = "OPENAI_BASE_URL")]
    openai_base_url: String,

    /// Model used for the style analysis
    #[arg(long, default_value = DEFAULT_VISION_MODEL)]
    vision_model: String,

    /// Model used for the image edits
    #[arg(long, default_value = DEFAULT_IMAGE_MODEL)]
    image_model: String,

    /// Enable debug logging
    #[arg(long, env = "MONKEYGEN_DEBUG")]
    debug: bool,
}

fn save_outcome(out_dir: &Path, index: u32, bytes: &[u8]) -> Result<PathBuf> {
    let path = out_dir.join(download_filename(index));
    fs::write(&path, bytes).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(path)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    setup_logging(args.debug).map_err(|err| anyhow!("Failed to set up logging: {err}"))?;

    let bytes = fs::read(&args.image)
        .with_context(|| format!("Failed to read {}", args.image.display()))?;
    let image = BaseImage::new(bytes, None)
        .with_context(|| format!("Unusable base image {}", args.image.display()))?;
    let config = UpstreamConfig::new(
        args.openai_api_key.as_deref(),
        &args.openai_base_url,
        &args.vision_model,
        &args.image_model,
    )?;
    fs::create_dir_all(&args.out_dir)
        .with_context(|| format!("Failed to create {}", args.out_dir.display()))?;

    let client = Arc::new(OpenAiClient::new(config));
    let orchestrator = Orchestrator::new(client.clone(), client.clone());
    let active = if args.traits.is_empty() {
        default_active()
    } else {
        args.traits.iter().copied().collect()
    };
    let rng = StdRng::seed_from_u64(args.seed.unwrap_or_else(rand::random));
    let mut run = orchestrator.run(
        RunRequest {
            image: Arc::new(image),
            count: args.count,
            active,
            extra_prompt: args
                .extra_prompt
                .map(|text| text.trim().to_string())
                .filter(|text| !text.is_empty()),
            cached_style: None,
        },
        rng,
    );

    eprintln!("{}", run.progress().status);
    let style = run
        .ensure_style()
        .await
        .context("Style analysis failed, nothing was generated")?
        .to_string();
    eprintln!("Style: {style}");

    let mut gallery = Gallery::new();
    while let Some(attempt) = run.begin_attempt()? {
        eprintln!("{}", run.progress().status);
        let outcome = run.finish_attempt(attempt).await;
        eprintln!("{}", run.progress().status);

        let bytes = match &outcome.image {
            Some(GeneratedImage::Inline(bytes)) => Some(bytes.clone()),
            Some(GeneratedImage::Remote(url)) => match client.fetch_remote(url).await {
                Ok(bytes) => Some(bytes),
                Err(err) => {
                    eprintln!("Could not download #{:03}: {err}", outcome.index);
                    None
                }
            },
            None => None,
        };
        if let Some(bytes) = bytes {
            let path = save_outcome(&args.out_dir, outcome.index, &bytes)?;
            eprintln!("Saved: {}", path.display());
        }
        gallery.record(outcome)?;
    }

    let failed = gallery
        .outcomes()
        .iter()
        .filter(|outcome| !outcome.succeeded())
        .map(|outcome| format!("#{:03}", outcome.index))
        .collect::<Vec<_>>();
    eprintln!(
        "Generated {}/{} (estimated cost ${:.2})",
        gallery.succeeded(),
        args.count,
        estimated_cost_usd(gallery.succeeded())
    );
    if !failed.is_empty() {
        eprintln!("Failed: {}", failed.join(", "));
    }
    Ok(())
}
