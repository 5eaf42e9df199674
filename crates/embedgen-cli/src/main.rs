mod config;
mod fetch;

use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use embedgen_core::{
    to_pgvector_literal, BackendSettings, Embedding, EmbeddingGenerator, EmbeddingRequest,
    GeneratorOptions, ImageSource, ModelName, ModelRegistry,
};

use crate::config::{Config, OutputFormat};
use crate::fetch::HttpFetcher;

#[derive(Parser)]
#[command(
    name = "embedgen",
    version,
    about = "Create text and image embeddings for vector database columns"
)]
struct Cli {
    /// Don't print embeddings
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Output format for embeddings
    #[arg(short, long, global = true)]
    format: Option<CliFormat>,

    /// Truncate vectors to N dimensions and re-normalize
    #[arg(short, long, global = true)]
    dimensions: Option<usize>,

    /// Directory for downloaded images (default: working directory)
    #[arg(long, global = true)]
    download_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed one or more texts
    Text {
        /// Texts to embed
        #[arg(required = true)]
        texts: Vec<String>,

        /// Text model
        #[arg(short, long, default_value = "clip-ViT-B-32")]
        model: CliModel,
    },

    /// Embed images from local files and/or URLs
    Image {
        /// Local image file, repeatable; embedded before any --url
        #[arg(short, long, required_unless_present = "url")]
        path: Vec<PathBuf>,

        /// Remote image URL, repeatable; downloaded before embedding
        #[arg(short, long)]
        url: Vec<String>,

        /// Image model
        #[arg(short, long, default_value = "clip-ViT-B-32")]
        model: CliModel,
    },

    /// Run the demo requests configured in [demo]
    Demo,

    /// Show current configuration
    Config,
}

#[derive(Clone, Copy, ValueEnum)]
enum CliModel {
    #[value(name = "clip-ViT-B-32")]
    ClipVitB32,
    #[value(name = "imgbeddings")]
    Imgbeddings,
}

impl From<CliModel> for ModelName {
    fn from(val: CliModel) -> Self {
        match val {
            CliModel::ClipVitB32 => ModelName::ClipVitB32,
            CliModel::Imgbeddings => ModelName::Imgbeddings,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum CliFormat {
    Json,
    Pgvector,
}

impl From<CliFormat> for OutputFormat {
    fn from(val: CliFormat) -> Self {
        match val {
            CliFormat::Json => OutputFormat::Json,
            CliFormat::Pgvector => OutputFormat::Pgvector,
        }
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing_subscriber::filter::LevelFilter::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let mut cfg = config::load_config()?;
    apply_overrides(&mut cfg, &cli);
    cfg.validate()?;

    match cli.command {
        Commands::Text { texts, model } => cmd_text(&cfg, &texts, model.into()),
        Commands::Image { path, url, model } => {
            cmd_images(&cfg, &image_sources(path, url), model.into())
        }
        Commands::Demo => cmd_demo(&cfg),
        Commands::Config => cmd_config(&cfg),
    }
}

/// Command-line flags win over the config file.
fn apply_overrides(cfg: &mut Config, cli: &Cli) {
    if cli.quiet {
        cfg.output.show = false;
    }
    if let Some(format) = cli.format {
        cfg.output.format = format.into();
    }
    if cli.dimensions.is_some() {
        cfg.output.dimensions = cli.dimensions;
    }
    if cli.download_dir.is_some() {
        cfg.download.dir = cli.download_dir.clone();
    }
}

fn build_registry(cfg: &Config) -> ModelRegistry {
    let mut settings = BackendSettings::default();
    if let Some(dir) = &cfg.models.cache_dir {
        settings.cache_dir = Some(dir.clone());
    }
    settings.show_download_progress = cfg.models.show_download_progress;
    ModelRegistry::new(settings)
}

fn generator_options(cfg: &Config) -> GeneratorOptions {
    GeneratorOptions {
        download_dir: cfg.download.dir.clone(),
        dimensions: cfg.output.dimensions,
    }
}

/// JSON output goes through the generator; pgvector literals are printed
/// afterwards, one per line.
fn show_json(cfg: &Config) -> bool {
    cfg.output.show && cfg.output.format == OutputFormat::Json
}

fn emit_pgvector<'a, W: Write>(
    out: &mut W,
    cfg: &Config,
    vectors: impl IntoIterator<Item = &'a Embedding>,
) -> Result<()> {
    if !cfg.output.show || cfg.output.format != OutputFormat::Pgvector {
        return Ok(());
    }
    for v in vectors {
        writeln!(out, "{}", to_pgvector_literal(v))?;
    }
    out.flush()?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn cmd_text(cfg: &Config, texts: &[String], model: ModelName) -> Result<()> {
    if !model.supports_text() {
        bail!("{model} cannot embed text, use {}", ModelName::ClipVitB32);
    }
    let registry = build_registry(cfg);
    let fetcher = HttpFetcher::new(Duration::from_secs(cfg.download.timeout_secs));
    let mut generator = EmbeddingGenerator::new(&registry, &fetcher, io::stdout().lock())
        .with_options(generator_options(cfg));

    let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
    let vectors = generator
        .create_text_embeddings(&refs, model.as_str(), show_json(cfg))
        .context("text embedding failed")?
        .unwrap_or_default();
    info!(count = vectors.len(), model = %model, "text embedded");

    emit_pgvector(&mut generator.into_output(), cfg, &vectors)
}

fn image_sources(paths: Vec<PathBuf>, urls: Vec<String>) -> Vec<ImageSource> {
    paths
        .into_iter()
        .map(|path| ImageSource::LocalPath { path })
        .chain(urls.into_iter().map(|url| ImageSource::RemoteUrl { url }))
        .collect()
}

fn cmd_images(cfg: &Config, sources: &[ImageSource], model: ModelName) -> Result<()> {
    let registry = build_registry(cfg);
    let fetcher = HttpFetcher::new(Duration::from_secs(cfg.download.timeout_secs));
    let mut generator = EmbeddingGenerator::new(&registry, &fetcher, io::stdout().lock())
        .with_options(generator_options(cfg));

    let vectors = generator
        .create_image_embeddings(sources, model.as_str(), show_json(cfg))
        .context("image embedding failed")?
        .unwrap_or_default();
    info!(count = vectors.len(), model = %model, "images embedded");

    emit_pgvector(&mut generator.into_output(), cfg, &vectors)
}

fn cmd_requests(cfg: &Config, requests: &[EmbeddingRequest]) -> Result<()> {
    let registry = build_registry(cfg);
    let fetcher = HttpFetcher::new(Duration::from_secs(cfg.download.timeout_secs));
    let mut generator = EmbeddingGenerator::new(&registry, &fetcher, io::stdout().lock())
        .with_options(generator_options(cfg));

    let mut vectors = Vec::new();
    for request in requests {
        let reports = generator
            .generate(request, show_json(cfg))
            .with_context(|| format!("embedding request failed: {}", describe(request)))?;
        for report in reports {
            info!(
                model = %report.model_name,
                size = report.embedding_size,
                "embedding created"
            );
            vectors.push(report.embedding);
        }
    }

    emit_pgvector(&mut generator.into_output(), cfg, &vectors)
}

fn describe(request: &EmbeddingRequest) -> String {
    match request {
        EmbeddingRequest::Text { model_name, .. } => format!("text via {model_name}"),
        EmbeddingRequest::Image {
            source: ImageSource::LocalPath { path },
            model_name,
        } => format!("{} via {model_name}", path.display()),
        EmbeddingRequest::Image {
            source: ImageSource::RemoteUrl { url },
            model_name,
        } => format!("{url} via {model_name}"),
    }
}

fn demo_requests(cfg: &Config) -> Result<Vec<EmbeddingRequest>> {
    let demo = &cfg.demo;
    let mut requests = Vec::new();

    if demo.text {
        requests.push(EmbeddingRequest::Text {
            text: demo.sample_text.clone(),
            model_name: ModelName::ClipVitB32,
        });
    }

    if demo.image {
        let source = ImageSource::from_options(
            demo.local_image_path.as_deref(),
            demo.remote_image_url.as_deref(),
        )
        .context("demo.image is enabled but neither local_image_path nor remote_image_url is set")?;
        let model_name = demo
            .image_model()
            .with_context(|| format!("invalid demo.image_option {}", demo.image_option))?;
        requests.push(EmbeddingRequest::Image { source, model_name });
    }

    Ok(requests)
}

fn cmd_demo(cfg: &Config) -> Result<()> {
    let requests = demo_requests(cfg)?;
    if requests.is_empty() {
        println!("Nothing to run: enable demo.text or demo.image in the config.");
        return Ok(());
    }
    cmd_requests(cfg, &requests)
}

fn cmd_config(cfg: &Config) -> Result<()> {
    let registry = build_registry(cfg);
    println!("Config: {}", config::show_config_path());
    println!();
    println!("[demo]");
    println!("  text = {}", cfg.demo.text);
    println!("  image = {}", cfg.demo.image);
    println!("  image_option = {}", cfg.demo.image_option);
    println!("  sample_text = {}", cfg.demo.sample_text);
    if let Some(ref url) = cfg.demo.remote_image_url {
        println!("  remote_image_url = {url}");
    }
    if let Some(ref path) = cfg.demo.local_image_path {
        println!("  local_image_path = {}", path.display());
    }
    println!();
    println!("[output]");
    println!("  show = {}", cfg.output.show);
    println!(
        "  format = {}",
        match cfg.output.format {
            OutputFormat::Json => "json",
            OutputFormat::Pgvector => "pgvector",
        }
    );
    if let Some(dims) = cfg.output.dimensions {
        println!("  dimensions = {dims}");
    }
    println!();
    println!("[models]");
    println!(
        "  cache_dir = {}",
        registry
            .settings()
            .cache_dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(backend default)".into())
    );
    println!(
        "  show_download_progress = {}",
        cfg.models.show_download_progress
    );
    let available: Vec<String> = registry.available().iter().map(|m| m.to_string()).collect();
    println!(
        "  available = {}",
        if available.is_empty() {
            "(none, rebuild with --features embeddings or imgbeddings)".to_string()
        } else {
            available.join(", ")
        }
    );
    println!();
    println!("[download]");
    println!(
        "  dir = {}",
        cfg.download
            .dir
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(working directory)".into())
    );
    println!("  timeout_secs = {}", cfg.download.timeout_secs);
    Ok(())
}
