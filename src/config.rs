use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use crate::error::{Result, ReelforgeError};
use crate::transfer::{AspectRatio, OverlayStyle, TextPosition};

/// Environment variable selecting the conversion service base URL.
pub const BASE_URL_ENV: &str = "REELFORGE_API_BASE_URL";

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub compose: ComposeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Base URL of the conversion service
    pub base_url: String,
    /// Request timeout in seconds; downloads and compositions can be slow
    pub timeout_secs: u64,
    /// User agent sent with every request
    pub user_agent: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    /// Largest video accepted for upload, in megabytes
    pub max_video_size_mb: u64,
    /// Largest image accepted into a shorts batch, in megabytes
    pub max_image_size_mb: u64,
    /// Largest background audio file, in megabytes
    pub max_audio_size_mb: u64,
    /// Maximum number of images in one shorts batch
    pub max_batch_images: usize,
    /// What to do when an addition would overflow the batch
    pub batch_overflow: BatchOverflowPolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchOverflowPolicy {
    /// Reject the whole addition and leave the batch unchanged
    RejectAll,
    /// Accept files up to the remaining capacity and report the rest
    Truncate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ComposeConfig {
    /// Seconds each image is held on screen
    pub image_display_duration: f32,
    /// Seconds of crossfade between images
    pub transition_duration: f32,
    /// Output frame rate
    pub fps: u32,
    pub aspect_ratio: AspectRatio,
    pub enable_animations: bool,
    /// Style applied to overlay text given on the command line
    pub text_style: OverlayStyle,
    pub text_position: TextPosition,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Reuse a previous upload of the same local file
    pub enabled: bool,
    pub dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory results are saved into
    pub dir: PathBuf,
    /// Extension used when naming extracted audio
    pub audio_format: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000".to_string(),
            timeout_secs: 600,
            user_agent: format!("reelforge/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_video_size_mb: 50,
            max_image_size_mb: 10,
            max_audio_size_mb: 20,
            max_batch_images: 5,
            batch_overflow: BatchOverflowPolicy::RejectAll,
        }
    }
}

impl Default for ComposeConfig {
    fn default() -> Self {
        Self {
            image_display_duration: 3.0,
            transition_duration: 0.5,
            fps: 24,
            aspect_ratio: AspectRatio::Landscape,
            enable_animations: false,
            text_style: OverlayStyle::MemeStyle,
            text_position: TextPosition::Center,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: PathBuf::from(".reelforge").join("cache"),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("."),
            audio_format: "mp3".to_string(),
        }
    }
}

impl LimitsConfig {
    pub fn max_video_bytes(&self) -> u64 {
        self.max_video_size_mb * MB
    }

    pub fn max_image_bytes(&self) -> u64 {
        self.max_image_size_mb * MB
    }

    pub fn max_audio_bytes(&self) -> u64 {
        self.max_audio_size_mb * MB
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ReelforgeError::Config(format!("Failed to read config file: {}", e)))?;

        toml::from_str(&content)
            .map_err(|e| ReelforgeError::Config(format!("Failed to parse config file: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ReelforgeError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| ReelforgeError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Apply `REELFORGE_API_BASE_URL` on top of whatever was loaded.
    pub fn apply_env_overrides(&mut self) {
        self.apply_base_url_override(std::env::var(BASE_URL_ENV).ok());
    }

    fn apply_base_url_override(&mut self, value: Option<String>) {
        if let Some(url) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            self.service.base_url = url;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_service_limits() {
        let config = Config::default();
        assert_eq!(config.service.base_url, "http://127.0.0.1:8000");
        assert_eq!(config.limits.max_batch_images, 5);
        assert_eq!(config.limits.max_image_bytes(), 10 * 1024 * 1024);
        assert_eq!(config.limits.max_video_bytes(), 50 * 1024 * 1024);
        assert_eq!(config.compose.fps, 24);
    }

    #[test]
    fn test_roundtrip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reelforge.toml");

        let mut config = Config::default();
        config.limits.batch_overflow = BatchOverflowPolicy::Truncate;
        config.compose.aspect_ratio = AspectRatio::Portrait;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.limits.batch_overflow, BatchOverflowPolicy::Truncate);
        assert_eq!(loaded.compose.aspect_ratio, AspectRatio::Portrait);
    }

    #[test]
    fn test_partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            [service]
            base_url = "https://convert.example.com"
            timeout_secs = 30
            user_agent = "test"
            "#,
        )
        .unwrap();
        assert_eq!(config.service.base_url, "https://convert.example.com");
        assert_eq!(config.limits.max_audio_size_mb, 20);
    }

    #[test]
    fn test_partial_section_keeps_field_defaults() {
        let config: Config = toml::from_str(
            r#"
            [limits]
            max_batch_images = 3

            [compose]
            fps = 30
            "#,
        )
        .unwrap();
        assert_eq!(config.limits.max_batch_images, 3);
        assert_eq!(config.limits.max_video_size_mb, 50);
        assert_eq!(config.limits.batch_overflow, BatchOverflowPolicy::RejectAll);
        assert_eq!(config.compose.fps, 30);
        assert_eq!(config.compose.image_display_duration, 3.0);
        assert_eq!(config.service.timeout_secs, 600);
    }

    #[test]
    fn test_base_url_override_ignores_blank_values() {
        let mut config = Config::default();
        config.apply_base_url_override(Some("   ".to_string()));
        assert_eq!(config.service.base_url, "http://127.0.0.1:8000");

        config.apply_base_url_override(Some("http://10.0.0.2:9000".to_string()));
        assert_eq!(config.service.base_url, "http://10.0.0.2:9000");
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = Config::from_file("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ReelforgeError::Config(_)));
    }
}
