use std::path::PathBuf;

use tracing::info;

use crate::encoder::{Encoder, EncoderFactory};
use crate::error::{EmbedError, EmbedResult};
use crate::model::ModelName;

/// Where backends keep downloaded weights and how loudly they fetch them.
#[derive(Debug, Clone)]
pub struct BackendSettings {
    /// Model cache. `None` leaves the choice to the backend library.
    pub cache_dir: Option<PathBuf>,
    pub show_download_progress: bool,
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            cache_dir: default_cache_dir(),
            show_download_progress: true,
        }
    }
}

#[cfg(any(feature = "embeddings", feature = "imgbeddings"))]
fn default_cache_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "embedgen").map(|d| d.cache_dir().join("models"))
}

#[cfg(not(any(feature = "embeddings", feature = "imgbeddings")))]
fn default_cache_dir() -> Option<PathBuf> {
    None
}

/// Production factory: maps each model name to the backend compiled in.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    settings: BackendSettings,
}

impl ModelRegistry {
    pub fn new(settings: BackendSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BackendSettings {
        &self.settings
    }

    /// Model names whose backend is available in this build.
    pub fn available(&self) -> Vec<ModelName> {
        ModelName::ALL
            .into_iter()
            .filter(|m| feature_for(*m).1)
            .collect()
    }
}

fn feature_for(model: ModelName) -> (&'static str, bool) {
    match model {
        ModelName::ClipVitB32 => ("embeddings", cfg!(feature = "embeddings")),
        ModelName::Imgbeddings => ("imgbeddings", cfg!(feature = "imgbeddings")),
    }
}

impl EncoderFactory for ModelRegistry {
    fn load(&self, model: ModelName) -> EmbedResult<Box<dyn Encoder>> {
        let (feature, enabled) = feature_for(model);
        if !enabled {
            return Err(EmbedError::BackendUnavailable {
                model: model.to_string(),
                feature,
            });
        }
        info!(model = %model, "instantiating encoder");
        match model {
            #[cfg(feature = "embeddings")]
            ModelName::ClipVitB32 => Ok(Box::new(crate::fastembed_encoder::ClipEncoder::new(
                self.settings.clone(),
            ))),
            #[cfg(feature = "imgbeddings")]
            ModelName::Imgbeddings => Ok(Box::new(
                crate::imgbeddings_encoder::ImgbeddingsEncoder::new(&self.settings)?,
            )),
            #[allow(unreachable_patterns)]
            _ => Err(EmbedError::BackendUnavailable {
                model: model.to_string(),
                feature,
            }),
        }
    }
}
