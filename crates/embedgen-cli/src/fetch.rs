//! HTTP download of remote images.

use std::fs::{self, File};
use std::io;
use std::path::Path;
use std::time::Duration;

use embedgen_core::{EmbedError, EmbedResult, ImageFetcher};
use tracing::{debug, warn};

pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
        }
    }
}

impl ImageFetcher for HttpFetcher {
    fn download(&self, url: &str, dest: &Path) -> EmbedResult<()> {
        // ureq reports 4xx/5xx as errors.
        let response = self
            .agent
            .get(url)
            .call()
            .map_err(|e| EmbedError::Download(format!("{url}: {e}")))?;
        debug!(
            url,
            status = response.status(),
            content_type = response.content_type(),
            "download started"
        );

        if let Some(parent) = dest.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let mut file = File::create(dest)?;
        let mut reader = response.into_reader();
        if let Err(e) = io::copy(&mut reader, &mut file) {
            drop(file);
            if let Err(rm) = fs::remove_file(dest) {
                warn!(path = %dest.display(), "could not remove partial download: {rm}");
            }
            return Err(EmbedError::Download(format!("{url}: {e}")));
        }
        Ok(())
    }
}
