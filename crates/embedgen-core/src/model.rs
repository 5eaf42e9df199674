use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::EmbedError;

/// Pretrained backends addressable by name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ModelName {
    /// Multi-modal CLIP ViT-B/32: text and images share one 512-d space.
    #[serde(rename = "clip-ViT-B-32")]
    ClipVitB32,
    /// Image-only CLIP ViT-B/32 vision tower exported by imgbeddings, 768-d.
    #[serde(rename = "imgbeddings")]
    Imgbeddings,
}

impl ModelName {
    pub const ALL: [ModelName; 2] = [ModelName::ClipVitB32, ModelName::Imgbeddings];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ClipVitB32 => "clip-ViT-B-32",
            Self::Imgbeddings => "imgbeddings",
        }
    }

    pub fn supports_text(&self) -> bool {
        matches!(self, Self::ClipVitB32)
    }

    pub fn dimensions(&self) -> usize {
        match self {
            Self::ClipVitB32 => 512,
            Self::Imgbeddings => 768,
        }
    }

    /// Image backend selector used by the demo routine (1 or 2).
    pub fn from_image_option(option: u8) -> Option<Self> {
        match option {
            1 => Some(Self::ClipVitB32),
            2 => Some(Self::Imgbeddings),
            _ => None,
        }
    }
}

impl fmt::Display for ModelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// Literal identifiers are matched exactly, case included.
impl std::str::FromStr for ModelName {
    type Err = EmbedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| EmbedError::UnsupportedModel(s.to_string()))
    }
}
