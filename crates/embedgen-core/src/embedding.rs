use serde::{Deserialize, Serialize};

use crate::model::ModelName;

pub type Embedding = Vec<f32>;

/// One produced vector plus what made it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingReport {
    pub embedding_size: usize,
    pub model_name: ModelName,
    pub embedding: Embedding,
}

impl EmbeddingReport {
    pub fn new(model_name: ModelName, embedding: Embedding) -> Self {
        Self {
            embedding_size: embedding.len(),
            model_name,
            embedding,
        }
    }
}

pub fn l2_normalize(mut v: Embedding) -> Embedding {
    let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut v {
            *x /= norm;
        }
    }
    v
}

/// Keep the first `dims` components and rescale to unit length.
/// Vectors already at or below `dims` are returned untouched.
pub fn reduce_dimensions(mut v: Embedding, dims: usize) -> Embedding {
    if dims == 0 || v.len() <= dims {
        return v;
    }
    v.truncate(dims);
    l2_normalize(v)
}

/// Text form accepted by a pgvector `vector` column: `[0.1,0.2,...]`.
pub fn to_pgvector_literal(v: &[f32]) -> String {
    let parts: Vec<String> = v.iter().map(|x| x.to_string()).collect();
    format!("[{}]", parts.join(","))
}
