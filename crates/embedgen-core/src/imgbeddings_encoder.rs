//! imgbeddings: the CLIP ViT-B/32 vision tower exported to ONNX.
//!
//! The model file comes from the `minimaxir/imgbeddings` Hugging Face repo.
//! The ONNX Runtime library is loaded dynamically (`ORT_DYLIB_PATH`).

use std::path::Path;

use hf_hub::api::sync::ApiBuilder;
use ndarray::Array4;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Tensor;
use tracing::debug;

use crate::embedding::Embedding;
use crate::encoder::Encoder;
use crate::error::{EmbedError, EmbedResult};
use crate::model::ModelName;
use crate::preprocess::{load_clip_pixel_values, CLIP_IMAGE_SIZE};
use crate::registry::BackendSettings;

const HF_REPO: &str = "minimaxir/imgbeddings";
const MODEL_FILE: &str = "patch32_v1.onnx";
const INPUT_NAME: &str = "pixel_values";
const OUTPUT_NAME: &str = "embeddings";

pub struct ImgbeddingsEncoder {
    session: Session,
}

impl ImgbeddingsEncoder {
    pub fn new(settings: &BackendSettings) -> EmbedResult<Self> {
        let mut builder = ApiBuilder::new().with_progress(settings.show_download_progress);
        if let Some(dir) = &settings.cache_dir {
            builder = builder.with_cache_dir(dir.clone());
        }
        let api = builder
            .build()
            .map_err(|e| EmbedError::Embedding(format!("hf-hub: {e}")))?;
        let model_path = api
            .model(HF_REPO.to_string())
            .get(MODEL_FILE)
            .map_err(|e| EmbedError::Embedding(format!("fetching {HF_REPO}/{MODEL_FILE}: {e}")))?;
        debug!(path = %model_path.display(), "loading imgbeddings model");

        let session = Session::builder()
            .and_then(|b| b.with_optimization_level(GraphOptimizationLevel::Level3))
            .and_then(|b| b.commit_from_file(&model_path))
            .map_err(ort_err)?;
        Ok(Self { session })
    }
}

impl Encoder for ImgbeddingsEncoder {
    fn encode_text(&self, _texts: &[&str]) -> EmbedResult<Vec<Embedding>> {
        Err(EmbedError::Unsupported {
            model: ModelName::Imgbeddings.to_string(),
            capability: "text input",
        })
    }

    fn encode_image(&self, image: &Path) -> EmbedResult<Embedding> {
        let size = CLIP_IMAGE_SIZE as usize;
        let pixels = load_clip_pixel_values(image)?;
        let array = Array4::from_shape_vec((1, 3, size, size), pixels)
            .map_err(|e| EmbedError::Embedding(e.to_string()))?;
        let input = Tensor::from_array(array).map_err(ort_err)?;

        let outputs = self
            .session
            .run(ort::inputs![INPUT_NAME => input].map_err(ort_err)?)
            .map_err(ort_err)?;
        let tensor = outputs[OUTPUT_NAME]
            .try_extract_tensor::<f32>()
            .map_err(ort_err)?;
        Ok(tensor.iter().copied().collect())
    }

    fn dimensions(&self) -> usize {
        ModelName::Imgbeddings.dimensions()
    }
}

fn ort_err(e: ort::Error) -> EmbedError {
    EmbedError::Embedding(format!("onnx runtime: {e}"))
}
