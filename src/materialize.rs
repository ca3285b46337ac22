//! Turns a finished artifact into a local file.
//!
//! The retrieval URL is derived from the artifact id alone. No existence
//! check is made before fetching; a missing artifact shows up as a failed
//! download, never as a job failure.

use futures::StreamExt;
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::artifact::ArtifactId;
use crate::config::ServiceConfig;
use crate::error::{Result, ReelforgeError};

pub const DOWNLOAD_PATH: &str = "/download-result";

#[derive(Clone, Debug)]
pub struct ResultMaterializer {
    client: Client,
    base_url: String,
}

impl ResultMaterializer {
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// `<base>/download-result/<id>`; pure, so it can be called any number of times.
    pub fn download_url(&self, id: &ArtifactId) -> String {
        format!("{}{}/{}", self.base_url, DOWNLOAD_PATH, id)
    }

    /// Stream the artifact into `dest_dir` under the final component of `filename`.
    pub async fn save(&self, id: &ArtifactId, filename: &str, dest_dir: &Path) -> Result<PathBuf> {
        let name = basename_from_path(filename).unwrap_or_else(|| default_name(id));
        let target = dest_dir.join(&name);
        let temp_path = dest_dir.join(format!("{}.tmp", name));

        fs::create_dir_all(dest_dir).await?;

        let url = self.download_url(id);
        info!(url = %url, file = %name, "Downloading result");

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ReelforgeError::Download(e.to_string()))?;

        if !response.status().is_success() {
            warn!(status = response.status().as_u16(), "Result download rejected");
            return Err(ReelforgeError::Download(format!(
                "Failed to download {}: HTTP {}",
                name,
                response.status()
            )));
        }

        let written = match write_then_rename(response, &temp_path, &target).await {
            Ok(written) => written,
            Err(e) => {
                discard_temp(&temp_path).await;
                return Err(e);
            }
        };
        debug!(bytes = written, "Result written to {}", target.display());

        Ok(target)
    }
}

async fn write_then_rename(response: reqwest::Response, temp_path: &Path, target: &Path) -> Result<u64> {
    let mut file = fs::File::create(temp_path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(|e| ReelforgeError::Download(e.to_string()))?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    drop(file);

    fs::rename(temp_path, target).await?;
    Ok(written)
}

/// A failed save leaves no partial file behind.
async fn discard_temp(temp_path: &Path) {
    if let Err(e) = fs::remove_file(temp_path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(error = %e, "Failed to remove {}", temp_path.display());
        }
    }
}

/// Last component of a server-side path, if it has one.
pub fn basename_from_path(path: &str) -> Option<String> {
    path.rsplit(['/', '\\'])
        .next()
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "." && *name != "..")
        .map(str::to_string)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if idx > 0 => &name[..idx],
        _ => name,
    }
}

/// `<stem>_audio.<format>` for audio pulled out of a local upload.
pub fn audio_name_for_local(file_name: &str, format: &str) -> String {
    let base = basename_from_path(file_name).unwrap_or_default();
    let stem = strip_extension(&base);
    let stem = if stem.is_empty() { "audio" } else { stem };
    format!("{}_audio.{}", stem, format)
}

pub fn youtube_video_name(server_path: Option<&str>, id: &ArtifactId) -> String {
    server_path
        .and_then(basename_from_path)
        .unwrap_or_else(|| format!("youtube_video_{}.mp4", id))
}

pub fn extracted_audio_name(server_path: Option<&str>, id: &ArtifactId) -> String {
    server_path
        .and_then(basename_from_path)
        .unwrap_or_else(|| format!("extracted_audio_{}.mp3", id))
}

/// Audio from an Instagram video is named after the downloaded video.
pub fn instagram_audio_name(video_path: Option<&str>, format: &str) -> String {
    let stem = video_path
        .and_then(basename_from_path)
        .map(|name| strip_extension(&name).to_string())
        .filter(|stem| !stem.is_empty())
        .unwrap_or_else(|| "instagram_video".to_string());
    format!("{}_audio.{}", stem, format)
}

pub fn short_video_name(server_path: Option<&str>, id: &ArtifactId) -> String {
    server_path.and_then(basename_from_path).unwrap_or_else(|| {
        let prefix: String = id.as_str().chars().take(8).collect();
        format!("created_short_{}.mp4", prefix)
    })
}

pub fn default_name(id: &ArtifactId) -> String {
    format!("download_{}", id)
}
