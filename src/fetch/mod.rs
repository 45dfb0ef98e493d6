//! Orchestration of the external yt-dlp process: building the argument list,
//! running and watching the process, reading its output and falling back
//! across credential sources.

pub mod error;
pub mod fallback;
pub mod guard;
pub mod info;
pub mod intent;
pub mod parser;
pub mod plan;
pub mod runner;
pub mod site;

use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub use error::{Diagnosis, ProcessError};
pub use fallback::{download_with_fallback, FallbackFailure, FallbackSuccess, Strategy};
pub use intent::{Browser, CredentialSource, DownloadIntent, MediaFormat, Quality};
pub use parser::ProgressEvent;
pub use runner::{AttemptRunner, ProcessRunner, RunOutput};

#[derive(Debug, Error)]
#[error("cannot create output directory {}: {source}", .path.display())]
pub struct DirectoryError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

/// Create the directory and its parents; an existing directory is fine
pub async fn ensure_output_dir(path: &Path) -> Result<(), DirectoryError> {
    tokio::fs::create_dir_all(path)
        .await
        .map_err(|source| DirectoryError {
            path: path.to_path_buf(),
            source,
        })
}

/// `<base>/Audio|Video/<site>`, where `base` defaults to the user's
/// Downloads folder
pub fn default_output_dir(base: Option<&Path>, audio_only: bool, url: &Url) -> PathBuf {
    let base = base
        .map(Path::to_path_buf)
        .or_else(dirs::download_dir)
        .or_else(|| dirs::home_dir().map(|h| h.join("Downloads")))
        .unwrap_or_else(|| PathBuf::from("."));
    let kind = if audio_only { "Audio" } else { "Video" };
    base.join(kind).join(site::site_slug(url))
}
