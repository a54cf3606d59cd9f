//! Per-iteration code files

use std::path::PathBuf;

use eyre::{Context, Result};
use tracing::{debug, info};

use crate::config::ImproveConfig;

/// Writes each iteration's extracted code to `{dir}/{prefix}{iteration}.{extension}`
#[derive(Debug, Clone)]
pub struct ArtifactWriter {
    dir: PathBuf,
    prefix: String,
    extension: String,
}

impl ArtifactWriter {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>, extension: impl Into<String>) -> Self {
        let extension: String = extension.into();
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn from_config(config: &ImproveConfig) -> Self {
        Self::new(&config.output_dir, &config.file_prefix, &config.file_extension)
    }

    /// Path of the file for `iteration`
    pub fn path_for(&self, iteration: u32) -> PathBuf {
        let name = if self.extension.is_empty() {
            format!("{}{}", self.prefix, iteration)
        } else {
            format!("{}{}.{}", self.prefix, iteration, self.extension)
        };
        self.dir.join(name)
    }

    /// Write `code` for `iteration`, replacing any earlier file
    pub async fn write(&self, iteration: u32, code: &str) -> Result<PathBuf> {
        let path = self.path_for(iteration);
        debug!(?path, code_len = code.len(), "ArtifactWriter::write: called");

        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create output directory {}", self.dir.display()))?;
        tokio::fs::write(&path, code)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;

        info!("Saved updated code to {}", path.display());
        Ok(path)
    }
}
