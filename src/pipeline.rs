//! Download-and-register pipeline run for each accepted request.

use std::path::{Path, PathBuf};

use path_absolutize::Absolutize;
use thiserror::Error;

use crate::soundpad::{Soundboard, SoundpadError};
use crate::util;
use crate::ytdlp::{VideoProvider, YtDlpError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Failed to fetch video metadata: {0}")]
    Metadata(#[source] YtDlpError),

    #[error("This video has no muxed streams")]
    NoMuxedStreams,

    #[error("Failed to prepare output directory {}: {source}", .dir.display())]
    OutputDir {
        dir: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Download failed: {0}")]
    Download(#[source] YtDlpError),

    #[error("Failed to resolve {}: {source}", .path.display())]
    Resolve {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("An error occurred while adding {} to Soundpad: {source}", .path.display())]
    Register {
        path: PathBuf,
        #[source]
        source: SoundpadError,
    },
}

/// A file that was downloaded and registered.
#[derive(Debug)]
pub struct Registered {
    pub title: String,
    pub path: PathBuf,
}

pub async fn download_and_register(
    video_id: &str,
    provider: &dyn VideoProvider,
    soundboard: &dyn Soundboard,
    output_dir: &Path,
) -> Result<Registered, PipelineError> {
    let meta = provider
        .metadata(video_id)
        .await
        .map_err(PipelineError::Metadata)?;
    let title = util::sanitize_title(&meta.title);

    let format = meta.best_muxed().ok_or(PipelineError::NoMuxedStreams)?;
    log::info!(
        "[DOWNLOAD] Selected format {} ({}, {}p)",
        format.format_id,
        format.ext,
        format.height.unwrap_or(0)
    );

    tokio::fs::create_dir_all(output_dir)
        .await
        .map_err(|source| PipelineError::OutputDir {
            dir: output_dir.to_path_buf(),
            source,
        })?;

    let path = output_dir.join(format!("{}.{}", title, format.ext));
    log::info!("[DOWNLOAD] Downloading {}...", title);
    provider
        .download(video_id, format, &path)
        .await
        .map_err(PipelineError::Download)?;
    log::info!("[DOWNLOAD] Video saved as: '{}'", path.display());

    let full_path = path
        .absolutize()
        .map_err(|source| PipelineError::Resolve {
            path: path.clone(),
            source,
        })?
        .into_owned();

    soundboard
        .add_sound(&full_path)
        .await
        .map_err(|source| PipelineError::Register {
            path: full_path.clone(),
            source,
        })?;

    Ok(Registered {
        title,
        path: full_path,
    })
}

/// Runs the pipeline and logs its outcome; nothing is returned to the caller.
pub async fn process(
    video_id: &str,
    provider: &dyn VideoProvider,
    soundboard: &dyn Soundboard,
    output_dir: &Path,
) {
    log::info!("[DOWNLOAD] Attempting download of {}...", video_id);
    match download_and_register(video_id, provider, soundboard, output_dir).await {
        Ok(done) => log::info!(
            "[SOUNDPAD] {} added to Soundpad successfully ({})",
            done.path.display(),
            done.title
        ),
        Err(e) => log::error!("[DOWNLOAD] {}", e),
    }
    log::info!("-----------------------");
}
