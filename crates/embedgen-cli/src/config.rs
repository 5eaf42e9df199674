//! Configuration loading from TOML files.
//!
//! Lookup order:
//! 1. `$EMBEDGEN_CONFIG` environment variable
//! 2. `~/.config/embedgen/config.toml`
//! 3. Built-in defaults (everything is optional)

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use embedgen_core::ModelName;
use serde::Deserialize;

pub const SAMPLE_TEXT: &str =
    "How can I create vector embeddings using the pgvector extension for PostgreSQL?";
pub const SAMPLE_IMAGE_URL: &str =
    "https://codeskulptor-demos.commondatastorage.googleapis.com/descent/person_right.png";

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub demo: DemoConfig,
    pub output: OutputConfig,
    pub models: ModelsConfig,
    pub download: DownloadConfig,
}

/// Switches and sample inputs for `embedgen demo`.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DemoConfig {
    /// Run the text request.
    pub text: bool,
    /// Run the image request.
    pub image: bool,
    /// Image backend: 1 = clip-ViT-B-32, 2 = imgbeddings.
    pub image_option: u8,
    pub sample_text: String,
    pub remote_image_url: Option<String>,
    /// Takes precedence over `remote_image_url` when set.
    pub local_image_path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Json,
    Pgvector,
}

/// What gets printed.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Print embeddings (`{"embedding": ...}`).
    pub show: bool,
    pub format: OutputFormat,
    /// Reduce vectors to this many dimensions before printing.
    pub dimensions: Option<usize>,
}

/// Model weight cache.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Default: platform cache dir.
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

/// Remote image downloads.
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Default: the working directory.
    pub dir: Option<PathBuf>,
    pub timeout_secs: u64,
}

// --- Defaults ---

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            text: false,
            image: true,
            image_option: 1,
            sample_text: SAMPLE_TEXT.into(),
            remote_image_url: Some(SAMPLE_IMAGE_URL.into()),
            local_image_path: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            show: true,
            format: OutputFormat::Json,
            dimensions: None,
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            cache_dir: None,
            show_download_progress: true,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            dir: None,
            timeout_secs: 60,
        }
    }
}

impl DemoConfig {
    pub fn image_model(&self) -> Option<ModelName> {
        ModelName::from_image_option(self.image_option)
    }
}

impl Config {
    /// Reject values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.demo.image_model().is_none() {
            bail!(
                "demo.image_option must be 1 (clip-ViT-B-32) or 2 (imgbeddings), got {}",
                self.demo.image_option
            );
        }
        if self.output.dimensions == Some(0) {
            bail!("output.dimensions must be greater than zero");
        }
        if self.download.timeout_secs == 0 {
            bail!("download.timeout_secs must be greater than zero");
        }
        Ok(())
    }
}

/// Load config from disk. Returns defaults if no config file exists.
pub fn load_config() -> Result<Config> {
    let path = config_path();

    if let Some(p) = &path {
        if p.exists() {
            let content =
                std::fs::read_to_string(p).with_context(|| format!("reading {}", p.display()))?;
            let config: Config =
                toml::from_str(&content).with_context(|| format!("parsing {}", p.display()))?;
            config
                .validate()
                .with_context(|| format!("validating {}", p.display()))?;
            return Ok(config);
        }
    }

    Ok(Config::default())
}

/// Resolve the config file path.
fn config_path() -> Option<PathBuf> {
    // 1. Environment variable
    if let Ok(p) = std::env::var("EMBEDGEN_CONFIG") {
        return Some(PathBuf::from(p));
    }

    // 2. ~/.config/embedgen/config.toml
    if let Some(home) = dirs_home() {
        let p = home.join(".config").join("embedgen").join("config.toml");
        return Some(p);
    }

    None
}

fn dirs_home() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}

/// Show the active config path (for `embedgen config`).
pub fn show_config_path() -> String {
    match config_path() {
        Some(p) if p.exists() => format!("{} (loaded)", p.display()),
        Some(p) => format!("{} (not found, using defaults)", p.display()),
        None => "no config path resolved (using defaults)".into(),
    }
}
