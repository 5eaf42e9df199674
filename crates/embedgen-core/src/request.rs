use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{EmbedError, EmbedResult};
use crate::model::ModelName;

/// Where an image comes from. A local path always wins over a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ImageSource {
    LocalPath { path: PathBuf },
    RemoteUrl { url: String },
}

impl ImageSource {
    /// Pick the source from the two optional inputs. `None` when neither is set.
    pub fn from_options(local_path: Option<&Path>, remote_url: Option<&str>) -> Option<Self> {
        match (local_path, remote_url) {
            (Some(path), _) => Some(Self::LocalPath {
                path: path.to_path_buf(),
            }),
            (None, Some(url)) => Some(Self::RemoteUrl {
                url: url.to_string(),
            }),
            (None, None) => None,
        }
    }

    /// The inverse of [`ImageSource::from_options`].
    pub fn as_options(&self) -> (Option<&Path>, Option<&str>) {
        match self {
            Self::LocalPath { path } => (Some(path.as_path()), None),
            Self::RemoteUrl { url } => (None, Some(url.as_str())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EmbeddingRequest {
    Text { text: String, model_name: ModelName },
    Image { source: ImageSource, model_name: ModelName },
}

/// Local file name a download of `url` is saved under: the base name of the
/// URL path. Query string and fragment are ignored, nothing is percent-decoded.
pub fn derive_file_name(url: &str) -> EmbedResult<String> {
    let parsed = Url::parse(url).map_err(|e| EmbedError::InvalidUrl(format!("{url}: {e}")))?;
    let name = parsed
        .path_segments()
        .and_then(|segments| segments.last())
        .unwrap_or_default();
    if name.is_empty() || name == "." || name == ".." {
        return Err(EmbedError::InvalidUrl(format!(
            "{url}: path has no file name"
        )));
    }
    Ok(name.to_string())
}
