pub mod display;
pub mod embedding;
pub mod encoder;
pub mod error;
#[cfg(feature = "embeddings")]
pub mod fastembed_encoder;
pub mod generator;
#[cfg(feature = "imgbeddings")]
pub mod imgbeddings_encoder;
pub mod model;
pub mod preprocess;
pub mod registry;
pub mod request;

pub use embedding::{reduce_dimensions, to_pgvector_literal, Embedding, EmbeddingReport};
pub use encoder::{Encoder, EncoderFactory, ImageFetcher};
pub use error::{EmbedError, EmbedResult};
#[cfg(feature = "embeddings")]
pub use fastembed_encoder::ClipEncoder;
pub use generator::{EmbeddingGenerator, GeneratorOptions};
#[cfg(feature = "imgbeddings")]
pub use imgbeddings_encoder::ImgbeddingsEncoder;
pub use model::ModelName;
pub use registry::{BackendSettings, ModelRegistry};
pub use request::{derive_file_name, EmbeddingRequest, ImageSource};
