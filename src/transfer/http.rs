use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client, Response};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactReference, LocalFile};
use crate::config::ServiceConfig;
use crate::error::{Result, ReelforgeError};
use super::progress::{counting_stream, ProgressTracker};
use super::{
    ComposeRequest, CreateVideoResponse, DownloadYouTubeRequest, ErrorBody, ExtractAudioRequest,
    ExtractAudioResponse, ProgressFn, RemoteSource, RemoteVideoResponse, TransferClient,
    UploadFileResponse,
};

pub const UPLOAD_PATH: &str = "/uploadfile/";
pub const EXTRACT_AUDIO_PATH: &str = "/extract-audio/";
pub const YOUTUBE_PATH: &str = "/download-youtube-video/";
pub const INSTAGRAM_PATH: &str = "/download-instagram-video/";
pub const COMPOSE_PATH: &str = "/create-video-from-images/";

pub const INSTAGRAM_NOT_IMPLEMENTED: &str =
    "Instagram download feature not yet implemented on the backend.";

/// reqwest-backed client for the conversion service.
#[derive(Clone, Debug)]
pub struct HttpTransferClient {
    client: Client,
    base_url: String,
}

impl HttpTransferClient {
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

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<T: DeserializeOwned, B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<T> {
        let url = self.build_url(path);
        debug!(url = %url, "Sending JSON request");

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(body)
            .send()
            .await
            .map_err(network_error)?;

        read_response(response).await
    }
}

/// The call never produced a response.
fn network_error(err: reqwest::Error) -> ReelforgeError {
    warn!("Request did not complete: {}", err);
    ReelforgeError::Network(err.to_string())
}

async fn read_response<T: DeserializeOwned>(response: Response) -> Result<T> {
    let status = response.status();

    if !status.is_success() {
        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .ok()
            .and_then(|body| body.best_message())
            .unwrap_or_else(|| format!("Request failed with status {}", status.as_u16()));
        warn!(status = status.as_u16(), "Service rejected request: {}", message);
        return Err(ReelforgeError::Transfer {
            status: Some(status.as_u16()),
            message,
        });
    }

    response.json::<T>().await.map_err(|e| {
        warn!("Could not decode service response: {}", e);
        ReelforgeError::Transfer {
            status: Some(status.as_u16()),
            message: "Unexpected response from the conversion service.".to_string(),
        }
    })
}

#[async_trait]
impl TransferClient for HttpTransferClient {
    async fn upload(&self, file: LocalFile, on_progress: Option<ProgressFn>) -> Result<ArtifactReference> {
        let kind = file.kind.ok_or_else(|| {
            ReelforgeError::Validation(format!("{} is not a supported media file.", file.name))
        })?;

        info!(file = %file.name, size = file.size, "Uploading file");

        let handle = tokio::fs::File::open(&file.path)
            .await
            .map_err(|_| ReelforgeError::FileNotFound(file.path.display().to_string()))?;

        let tracker = Arc::new(Mutex::new(ProgressTracker::new(file.size, on_progress)));
        let body = Body::wrap_stream(counting_stream(handle, tracker.clone()));
        let form = Form::new().part(
            "file",
            Part::stream_with_length(body, file.size).file_name(file.name.clone()),
        );

        let url = self.build_url(UPLOAD_PATH);
        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .multipart(form)
            .send()
            .await
            .map_err(network_error)?;

        let uploaded: UploadFileResponse = read_response(response).await?;

        if let Ok(mut tracker) = tracker.lock() {
            tracker.finish();
        }

        info!(file_id = %uploaded.file_id, "Upload completed");

        let name = if uploaded.filename.is_empty() {
            file.name.clone()
        } else {
            uploaded.filename
        };
        Ok(ArtifactReference::new(uploaded.file_id, kind)
            .with_path(uploaded.file_path)
            .with_name(name))
    }

    async fn extract_audio(&self, source: ArtifactId) -> Result<ArtifactReference> {
        info!(file_id = %source, "Requesting audio extraction");

        let request = ExtractAudioRequest {
            file_id: source.to_string(),
        };
        let extracted: ExtractAudioResponse = self.post_json(EXTRACT_AUDIO_PATH, &request).await?;

        info!(audio_id = %extracted.audio_file_uuid, "Audio extraction completed");
        Ok(ArtifactReference::new(extracted.audio_file_uuid, ArtifactKind::Audio)
            .with_path(extracted.audio_file_path))
    }

    async fn fetch_remote_video(&self, url: String, source: RemoteSource) -> Result<ArtifactReference> {
        let fetched: RemoteVideoResponse = match source {
            RemoteSource::YouTube => {
                info!(url = %url, "Requesting YouTube download");
                let request = DownloadYouTubeRequest { youtube_url: url };
                self.post_json(YOUTUBE_PATH, &request).await?
            }
            RemoteSource::Instagram => {
                // The service has no working handler behind INSTAGRAM_PATH yet.
                warn!(url = %url, "Instagram download requested but the service does not support it");
                return Err(ReelforgeError::NotImplemented(INSTAGRAM_NOT_IMPLEMENTED.to_string()));
            }
        };

        info!(file_id = %fetched.file_id, "Remote video stored by service");
        Ok(ArtifactReference::new(fetched.file_id, ArtifactKind::Video)
            .with_path(fetched.video_file_path))
    }

    async fn compose_video(&self, request: ComposeRequest) -> Result<ArtifactReference> {
        request.options.validate()?;

        info!(
            images = request.image_ids.len(),
            audio_id = %request.audio_id,
            "Requesting video composition"
        );

        let payload = request.to_wire(chrono::Utc::now().timestamp_millis());
        let created: CreateVideoResponse = self.post_json(COMPOSE_PATH, &payload).await?;

        info!(video_id = %created.video_file_uuid, "Video composition completed");
        Ok(ArtifactReference::new(created.video_file_uuid, ArtifactKind::Video)
            .with_path(created.video_file_path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transfer::ComposeOptions;
    use mockito::Matcher;
    use serde_json::json;
    use std::io::Write;

    fn client_for(url: &str) -> HttpTransferClient {
        let config = ServiceConfig {
            base_url: format!("{}/", url),
            timeout_secs: 5,
            user_agent: "reelforge-test".to_string(),
        };
        HttpTransferClient::new(&config).unwrap()
    }

    fn temp_video(bytes: usize) -> (tempfile::TempDir, LocalFile) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("myvideo.mp4");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![b'v'; bytes]).unwrap();
        let local = LocalFile {
            path,
            name: "myvideo.mp4".to_string(),
            size: bytes as u64,
            kind: Some(ArtifactKind::Video),
        };
        (dir, local)
    }

    #[tokio::test]
    async fn test_upload_reports_progress_and_returns_reference() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", UPLOAD_PATH)
            .match_body(Matcher::Regex(r#"name="file"; filename="myvideo.mp4""#.to_string()))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "message": "File uploaded",
                    "file_id": "abc123",
                    "file_path": "uploads/abc123.mp4",
                    "filename": "myvideo.mp4"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let (_dir, file) = temp_video(200 * 1024);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let progress: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));

        let reference = client_for(&server.url())
            .upload(file, Some(progress))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reference.id, ArtifactId::new("abc123"));
        assert_eq!(reference.kind, ArtifactKind::Video);
        assert_eq!(reference.name.as_deref(), Some("myvideo.mp4"));

        let seen = seen.lock().unwrap().clone();
        assert!(seen.windows(2).all(|w| w[0] <= w[1]));
        assert_eq!(seen.last(), Some(&100));
    }

    #[tokio::test]
    async fn test_upload_failure_carries_server_detail() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", UPLOAD_PATH)
            .with_status(413)
            .with_header("content-type", "application/json")
            .with_body(r#"{"detail": "File too large. Maximum size is 50MB."}"#)
            .create_async()
            .await;

        let (_dir, file) = temp_video(1024);
        let err = client_for(&server.url()).upload(file, None).await.unwrap_err();

        match err {
            ReelforgeError::Transfer { status, message } => {
                assert_eq!(status, Some(413));
                assert_eq!(message, "File too large. Maximum size is 50MB.");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_extract_audio_posts_file_id() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", EXTRACT_AUDIO_PATH)
            .match_body(Matcher::Json(json!({"file_id": "abc123"})))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "message": "Audio extracted",
                    "audio_file_uuid": "def456",
                    "audio_file_path": "results/def456.mp3"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let reference = client_for(&server.url())
            .extract_audio(ArtifactId::new("abc123"))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reference.id.as_str(), "def456");
        assert_eq!(reference.kind, ArtifactKind::Audio);
        assert_eq!(reference.path.as_deref(), Some("results/def456.mp3"));
    }

    #[tokio::test]
    async fn test_non_json_error_uses_generic_message() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", EXTRACT_AUDIO_PATH)
            .with_status(502)
            .with_body("<html>Bad Gateway</html>")
            .create_async()
            .await;

        let err = client_for(&server.url())
            .extract_audio(ArtifactId::new("abc123"))
            .await
            .unwrap_err();
        assert_eq!(err.user_message(), "Request failed with status 502");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_network_error() {
        let client = client_for("http://127.0.0.1:9");
        let err = client.extract_audio(ArtifactId::new("abc123")).await.unwrap_err();
        assert!(matches!(err, ReelforgeError::Network(_)), "{:?}", err);
    }

    #[tokio::test]
    async fn test_youtube_fetch_posts_url() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", YOUTUBE_PATH)
            .match_body(Matcher::Json(
                json!({"youtube_url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ"}),
            ))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "message": "Downloaded",
                    "file_id": "vid789",
                    "video_file_path": "downloads/Never Gonna Give You Up.mp4"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let reference = client_for(&server.url())
            .fetch_remote_video(
                "https://www.youtube.com/watch?v=dQw4w9WgXcQ".to_string(),
                RemoteSource::YouTube,
            )
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(reference.id.as_str(), "vid789");
        assert_eq!(reference.kind, ArtifactKind::Video);
    }

    #[tokio::test]
    async fn test_instagram_always_fails_without_calling_service() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", INSTAGRAM_PATH)
            .expect(0)
            .create_async()
            .await;

        let err = client_for(&server.url())
            .fetch_remote_video("https://instagram.com/reel/abc".to_string(), RemoteSource::Instagram)
            .await
            .unwrap_err();

        mock.assert_async().await;
        assert!(matches!(err, ReelforgeError::NotImplemented(_)));
        assert_eq!(err.user_message(), INSTAGRAM_NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn test_compose_sends_ordered_image_ids() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", COMPOSE_PATH)
            .match_body(Matcher::PartialJson(json!({
                "image_file_ids": ["i1", "i2", "i3"],
                "audio_file_id": "a1",
                "fps": 24,
                "video_aspect_ratio": "16:9"
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!({
                    "message": "Created",
                    "video_file_uuid": "0123456789abcdef",
                    "video_file_path": "results/short.mp4"
                })
                .to_string(),
            )
            .create_async()
            .await;

        let request = ComposeRequest {
            image_ids: vec!["i1".into(), "i2".into(), "i3".into()],
            audio_id: "a1".into(),
            options: ComposeOptions::default(),
        };
        let reference = client_for(&server.url()).compose_video(request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(reference.id.as_str(), "0123456789abcdef");
    }

    #[tokio::test]
    async fn test_compose_rejects_out_of_range_options_before_sending() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("POST", COMPOSE_PATH).expect(0).create_async().await;

        let mut options = ComposeOptions::default();
        options.display_duration_secs = 42.0;
        let request = ComposeRequest {
            image_ids: vec!["i1".into()],
            audio_id: "a1".into(),
            options,
        };

        let err = client_for(&server.url()).compose_video(request).await.unwrap_err();
        mock.assert_async().await;
        assert!(err.is_validation());
    }
}
