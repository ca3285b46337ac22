// Transfer layer
//
// One network call per logical action against the conversion service:
// - types: wire payloads and the compose option model
// - progress: byte-level upload progress reporting
// - http: reqwest-backed client
//
// Nothing here retries. Every failure surfaces once to the caller.

pub mod types;
pub mod progress;
pub mod http;

use async_trait::async_trait;

pub use types::*;
pub use progress::{ProgressFn, ProgressTracker};
pub use http::HttpTransferClient;

use crate::artifact::{ArtifactId, ArtifactReference, LocalFile};
use crate::error::Result;

/// Calls the conversion service exposes.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TransferClient: Send + Sync {
    /// Send a local file; `on_progress` sees non-decreasing percentages ending at 100 on success
    async fn upload(&self, file: LocalFile, on_progress: Option<ProgressFn>) -> Result<ArtifactReference>;

    /// Extract the audio track of a stored video
    async fn extract_audio(&self, source: ArtifactId) -> Result<ArtifactReference>;

    /// Have the service download a video from a public URL
    async fn fetch_remote_video(&self, url: String, source: RemoteSource) -> Result<ArtifactReference>;

    /// Compose a video from stored images and an audio track
    async fn compose_video(&self, request: ComposeRequest) -> Result<ArtifactReference>;
}
