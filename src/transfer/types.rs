use serde::{Deserialize, Serialize};
use std::fmt;

use crate::artifact::ArtifactId;
use crate::config::ComposeConfig;
use crate::error::Result;
use crate::validate;

/// `POST /uploadfile/` response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadFileResponse {
    #[serde(default)]
    pub message: String,
    pub file_id: String,
    #[serde(default)]
    pub file_path: String,
    #[serde(default)]
    pub filename: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractAudioRequest {
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtractAudioResponse {
    #[serde(default)]
    pub message: String,
    pub audio_file_uuid: String,
    #[serde(default)]
    pub audio_file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadYouTubeRequest {
    pub youtube_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadInstagramRequest {
    pub instagram_url: String,
}

/// Response of both remote-video endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteVideoResponse {
    #[serde(default)]
    pub message: String,
    pub file_id: String,
    #[serde(default)]
    pub video_file_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoRequest {
    pub image_file_ids: Vec<String>,
    pub audio_file_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_filename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_display_duration: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transition_duration: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub music_segment_start_time: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_segment_duration_from_music: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,
    pub texts: Option<Vec<TextOverlay>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_aspect_ratio: Option<AspectRatio>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enable_image_animations: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateVideoResponse {
    #[serde(default)]
    pub message: String,
    pub video_file_uuid: String,
    #[serde(default)]
    pub video_file_path: String,
}

/// Error payload. FastAPI sends `detail` as a string, or as a list of
/// `{msg, ...}` objects for request validation failures.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<serde_json::Value>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    pub fn best_message(&self) -> Option<String> {
        let detail = match &self.detail {
            Some(serde_json::Value::String(s)) if !s.trim().is_empty() => Some(s.clone()),
            Some(serde_json::Value::Array(items)) => items
                .iter()
                .find_map(|item| item.get("msg").and_then(|m| m.as_str()))
                .map(str::to_string),
            _ => None,
        };
        detail.or_else(|| self.message.clone().filter(|m| !m.trim().is_empty()))
    }
}

/// Platform a remote video is fetched from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteSource {
    YouTube,
    Instagram,
}

impl fmt::Display for RemoteSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::YouTube => f.write_str("YouTube"),
            Self::Instagram => f.write_str("Instagram"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AspectRatio {
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "1:1")]
    Square,
}

impl AspectRatio {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "16:9" => Some(Self::Landscape),
            "9:16" => Some(Self::Portrait),
            "1:1" => Some(Self::Square),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayStyle {
    Minimal,
    #[serde(rename = "Meme Style")]
    MemeStyle,
    Dynamic,
    Retro,
}

impl OverlayStyle {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(['-', '_'], " ").as_str() {
            "minimal" => Some(Self::Minimal),
            "meme" | "meme style" => Some(Self::MemeStyle),
            "dynamic" => Some(Self::Dynamic),
            "retro" => Some(Self::Retro),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    Center,
    Bottom,
}

impl TextPosition {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "top" => Some(Self::Top),
            "center" | "centre" => Some(Self::Center),
            "bottom" => Some(Self::Bottom),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextOverlay {
    pub text: String,
    pub style: Option<OverlayStyle>,
    /// Image the text is pinned to; `None` shows it over the whole video
    pub image_index: Option<usize>,
    pub position: Option<TextPosition>,
}

impl TextOverlay {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            style: None,
            image_index: None,
            position: None,
        }
    }

    /// One overlay per text. Unpinned texts run over the whole video;
    /// with `per_image` the nth text is pinned to the nth image.
    pub fn from_texts(
        texts: Vec<String>,
        style: OverlayStyle,
        position: TextPosition,
        per_image: bool,
    ) -> Vec<Self> {
        texts
            .into_iter()
            .enumerate()
            .map(|(index, text)| Self {
                text,
                style: Some(style),
                image_index: per_image.then_some(index),
                position: Some(position),
            })
            .collect()
    }
}

/// Settings for composing a video from still images.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeOptions {
    pub display_duration_secs: f32,
    pub transition_duration_secs: f32,
    pub frame_rate: u32,
    pub aspect_ratio: AspectRatio,
    pub text_overlays: Vec<TextOverlay>,
    pub animations_enabled: bool,
    pub output_filename: Option<String>,
    pub audio_start_secs: Option<f32>,
    pub audio_duration_secs: Option<f32>,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self::from_config(&ComposeConfig::default())
    }
}

impl ComposeOptions {
    pub fn from_config(config: &ComposeConfig) -> Self {
        Self {
            display_duration_secs: config.image_display_duration,
            transition_duration_secs: config.transition_duration,
            frame_rate: config.fps,
            aspect_ratio: config.aspect_ratio,
            text_overlays: Vec::new(),
            animations_enabled: config.enable_animations,
            output_filename: None,
            audio_start_secs: None,
            audio_duration_secs: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        validate::check_compose_options(self)
    }
}

/// Everything the compose endpoint needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ComposeRequest {
    pub image_ids: Vec<ArtifactId>,
    pub audio_id: ArtifactId,
    pub options: ComposeOptions,
}

fn one_decimal(value: f32) -> f32 {
    (value * 10.0).round() / 10.0
}

impl ComposeRequest {
    /// Build the wire payload. `now_millis` seeds the default output name.
    pub fn to_wire(&self, now_millis: i64) -> CreateVideoRequest {
        let texts: Vec<TextOverlay> = self
            .options
            .text_overlays
            .iter()
            .filter(|overlay| !overlay.text.trim().is_empty())
            .cloned()
            .collect();

        let output_filename = self
            .options
            .output_filename
            .clone()
            .unwrap_or_else(|| format!("short_video_{}.mp4", now_millis));

        CreateVideoRequest {
            image_file_ids: self.image_ids.iter().map(|id| id.to_string()).collect(),
            audio_file_id: self.audio_id.to_string(),
            output_filename: Some(output_filename),
            image_display_duration: Some(one_decimal(self.options.display_duration_secs)),
            transition_duration: Some(one_decimal(self.options.transition_duration_secs)),
            music_segment_start_time: self.options.audio_start_secs,
            audio_segment_duration_from_music: self.options.audio_duration_secs,
            fps: Some(self.options.frame_rate),
            texts: if texts.is_empty() { None } else { Some(texts) },
            video_aspect_ratio: Some(self.options.aspect_ratio),
            enable_image_animations: Some(self.options.animations_enabled),
        }
    }
}
