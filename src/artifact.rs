use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{Result, ReelforgeError};

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "mov", "avi", "m4v"];
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];

/// Opaque identifier the conversion service assigns to a stored file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArtifactId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Video,
    Audio,
    Image,
}

impl ArtifactKind {
    /// Infer the kind from a file extension, case-insensitively.
    pub fn from_extension(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Video)
        } else if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Image)
        } else if AUDIO_EXTENSIONS.contains(&ext.as_str()) {
            Some(Self::Audio)
        } else {
            None
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Video => "video",
            Self::Audio => "audio",
            Self::Image => "image",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A file held by the conversion service. Never mutated once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactReference {
    pub id: ArtifactId,
    pub kind: ArtifactKind,
    /// Server-side path, when the service reported one
    pub path: Option<String>,
    /// Display filename hint, when the service reported one
    pub name: Option<String>,
}

impl ArtifactReference {
    pub fn new(id: impl Into<String>, kind: ArtifactKind) -> Self {
        Self {
            id: ArtifactId::new(id),
            kind,
            path: None,
            name: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// A local file selected for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub path: PathBuf,
    pub name: String,
    pub size: u64,
    pub kind: Option<ArtifactKind>,
}

impl LocalFile {
    /// Stat a file on disk and describe it.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let metadata = fs::metadata(path)
            .await
            .map_err(|_| ReelforgeError::FileNotFound(path.display().to_string()))?;

        if !metadata.is_file() {
            return Err(ReelforgeError::Validation(format!(
                "{} is not a regular file",
                path.display()
            )));
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Self {
            path: path.to_path_buf(),
            name,
            size: metadata.len(),
            kind: ArtifactKind::from_extension(path),
        })
    }

    /// File name without its final extension.
    pub fn stem(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => &self.name,
        }
    }

    pub fn size_mb(&self) -> f64 {
        self.size as f64 / 1024.0 / 1024.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;

    #[test]
    fn test_kind_from_extension() {
        assert_eq!(ArtifactKind::from_extension(Path::new("clip.MKV")), Some(ArtifactKind::Video));
        assert_eq!(ArtifactKind::from_extension(Path::new("a/b/photo.jpeg")), Some(ArtifactKind::Image));
        assert_eq!(ArtifactKind::from_extension(Path::new("song.wav")), Some(ArtifactKind::Audio));
        assert_eq!(ArtifactKind::from_extension(Path::new("notes.txt")), None);
        assert_eq!(ArtifactKind::from_extension(Path::new("noext")), None);
    }

    #[tokio::test]
    async fn test_open_describes_file() {
        let temp = assert_fs::TempDir::new().unwrap();
        let file = temp.child("holiday.trip.mp4");
        file.write_binary(&[0u8; 2048]).unwrap();

        let local = LocalFile::open(file.path()).await.unwrap();
        assert_eq!(local.name, "holiday.trip.mp4");
        assert_eq!(local.stem(), "holiday.trip");
        assert_eq!(local.size, 2048);
        assert_eq!(local.kind, Some(ArtifactKind::Video));
    }

    #[tokio::test]
    async fn test_open_missing_file() {
        let err = tokio_test::assert_err!(LocalFile::open("/no/such/video.mp4").await);
        assert!(matches!(err, ReelforgeError::FileNotFound(_)));
    }

    #[test]
    fn test_stem_without_extension() {
        let local = LocalFile {
            path: PathBuf::from(".hidden"),
            name: ".hidden".to_string(),
            size: 0,
            kind: None,
        };
        assert_eq!(local.stem(), ".hidden");
    }
}
