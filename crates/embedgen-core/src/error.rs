use thiserror::Error;

#[derive(Debug, Error)]
pub enum EmbedError {
    #[error("unsupported model: {0}")]
    UnsupportedModel(String),

    #[error("no image given: pass a local path or a remote URL")]
    MissingImage,

    #[error("invalid image URL: {0}")]
    InvalidUrl(String),

    #[error("download failed: {0}")]
    Download(String),

    #[error("image decode error: {0}")]
    ImageDecode(#[from] image::ImageError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("embedding error: {0}")]
    Embedding(String),

    #[error("{model} does not support {capability}")]
    Unsupported {
        model: String,
        capability: &'static str,
    },

    #[error("{model} backend not enabled, rebuild with `--features {feature}`")]
    BackendUnavailable {
        model: String,
        feature: &'static str,
    },
}

pub type EmbedResult<T> = Result<T, EmbedError>;
