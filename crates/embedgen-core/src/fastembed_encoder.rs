use std::path::Path;
use std::sync::{Mutex, OnceLock};

use fastembed::{
    EmbeddingModel, ImageEmbedding, ImageEmbeddingModel, ImageInitOptions, InitOptions,
    TextEmbedding,
};
use tracing::debug;

use crate::embedding::Embedding;
use crate::encoder::Encoder;
use crate::error::{EmbedError, EmbedResult};
use crate::model::ModelName;
use crate::registry::BackendSettings;

/// CLIP ViT-B/32 through fastembed. The text and vision towers are loaded
/// lazily and independently, so a text-only call never pulls image weights.
pub struct ClipEncoder {
    settings: BackendSettings,
    text: OnceLock<TextEmbedding>,
    image: OnceLock<ImageEmbedding>,
    init_lock: Mutex<()>,
}

impl ClipEncoder {
    pub fn new(settings: BackendSettings) -> Self {
        Self {
            settings,
            text: OnceLock::new(),
            image: OnceLock::new(),
            init_lock: Mutex::new(()),
        }
    }

    fn text_model(&self) -> EmbedResult<&TextEmbedding> {
        if let Some(m) = self.text.get() {
            return Ok(m);
        }
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(m) = self.text.get() {
            return Ok(m);
        }
        debug!("loading CLIP text model");
        let mut options = InitOptions::new(EmbeddingModel::ClipVitB32)
            .with_show_download_progress(self.settings.show_download_progress);
        if let Some(dir) = &self.settings.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }
        let model = TextEmbedding::try_new(options)
            .map_err(|e| EmbedError::Embedding(format!("failed to init text model: {e}")))?;
        Ok(self.text.get_or_init(|| model))
    }

    fn image_model(&self) -> EmbedResult<&ImageEmbedding> {
        if let Some(m) = self.image.get() {
            return Ok(m);
        }
        let _guard = self.init_lock.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(m) = self.image.get() {
            return Ok(m);
        }
        debug!("loading CLIP vision model");
        let mut options = ImageInitOptions::new(ImageEmbeddingModel::ClipVitB32)
            .with_show_download_progress(self.settings.show_download_progress);
        if let Some(dir) = &self.settings.cache_dir {
            options = options.with_cache_dir(dir.clone());
        }
        let model = ImageEmbedding::try_new(options)
            .map_err(|e| EmbedError::Embedding(format!("failed to init image model: {e}")))?;
        Ok(self.image.get_or_init(|| model))
    }
}

impl Encoder for ClipEncoder {
    fn encode_text(&self, texts: &[&str]) -> EmbedResult<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let model = self.text_model()?;
        model
            .embed(texts.to_vec(), None)
            .map_err(|e| EmbedError::Embedding(e.to_string()))
    }

    fn encode_image(&self, image: &Path) -> EmbedResult<Embedding> {
        let model = self.image_model()?;
        let results = model
            .embed(vec![image], None)
            .map_err(|e| EmbedError::Embedding(e.to_string()))?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| EmbedError::Embedding("empty embedding result".into()))
    }

    fn dimensions(&self) -> usize {
        ModelName::ClipVitB32.dimensions()
    }
}
