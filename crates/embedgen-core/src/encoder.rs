use std::path::Path;

use crate::embedding::Embedding;
use crate::error::EmbedResult;
use crate::model::ModelName;

/// A pretrained model that turns text or images into vectors.
pub trait Encoder: Send + Sync {
    fn encode_text(&self, texts: &[&str]) -> EmbedResult<Vec<Embedding>>;
    fn encode_image(&self, image: &Path) -> EmbedResult<Embedding>;
    fn dimensions(&self) -> usize;
}

/// Instantiates the encoder behind a model name.
pub trait EncoderFactory {
    fn load(&self, model: ModelName) -> EmbedResult<Box<dyn Encoder>>;
}

/// Places a remote image on the local filesystem.
pub trait ImageFetcher {
    fn download(&self, url: &str, dest: &Path) -> EmbedResult<()>;
}
