//! Input gates run before any request leaves the client.
//!
//! Everything here is synchronous and side-effect free: a failure is a
//! [`ReelforgeError::Validation`] and no transfer is attempted.

use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

use crate::artifact::{ArtifactKind, LocalFile};
use crate::error::{Result, ReelforgeError};
use crate::transfer::{ComposeOptions, RemoteSource};

pub const MIN_DISPLAY_DURATION_SECS: f32 = 1.0;
pub const MAX_DISPLAY_DURATION_SECS: f32 = 10.0;
pub const MIN_TRANSITION_SECS: f32 = 0.0;
pub const MAX_TRANSITION_SECS: f32 = 3.0;

fn youtube_pattern() -> &'static Regex {
    static YOUTUBE_RE: OnceLock<Regex> = OnceLock::new();
    YOUTUBE_RE.get_or_init(|| {
        Regex::new(r"^https?://(www\.)?youtube\.com/(watch\?v=|shorts/)[a-zA-Z0-9_-]{11}([&?].*)?$")
            .expect("youtube url pattern compiles")
    })
}

fn instagram_pattern() -> &'static Regex {
    static INSTAGRAM_RE: OnceLock<Regex> = OnceLock::new();
    INSTAGRAM_RE.get_or_init(|| {
        Regex::new(r"^(https?://)?(www\.)?instagram\.com/(p|reel|tv|stories)/[a-zA-Z0-9_-]+")
            .expect("instagram url pattern compiles")
    })
}

pub fn is_youtube_url(url: &str) -> bool {
    youtube_pattern().is_match(url)
}

pub fn is_instagram_url(url: &str) -> bool {
    instagram_pattern().is_match(url)
}

pub fn validate_youtube_url(url: &str) -> Result<()> {
    validate_remote_url(url, RemoteSource::YouTube)
}

pub fn validate_instagram_url(url: &str) -> Result<()> {
    validate_remote_url(url, RemoteSource::Instagram)
}

/// Check a candidate URL against the structural pattern of its platform.
pub fn validate_remote_url(url: &str, source: RemoteSource) -> Result<()> {
    let url = url.trim();
    if url.is_empty() {
        return Err(ReelforgeError::Validation(format!(
            "Please enter a {} video URL.",
            source
        )));
    }

    let valid = match source {
        RemoteSource::YouTube => is_youtube_url(url),
        RemoteSource::Instagram => is_instagram_url(url),
    };

    if valid {
        Ok(())
    } else {
        Err(ReelforgeError::Validation(format!(
            "Please enter a valid {} URL.",
            source
        )))
    }
}

/// What an Instagram link points at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstagramMediaKind {
    Post,
    Reel,
    Igtv,
    Story,
}

impl fmt::Display for InstagramMediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Post => "Post",
            Self::Reel => "Reel",
            Self::Igtv => "IGTV",
            Self::Story => "Story",
        };
        f.write_str(label)
    }
}

/// Classify a valid Instagram URL by its path segment.
pub fn describe_instagram_url(url: &str) -> Result<InstagramMediaKind> {
    validate_instagram_url(url)?;

    let kind = if url.contains("/reel/") {
        InstagramMediaKind::Reel
    } else if url.contains("/tv/") {
        InstagramMediaKind::Igtv
    } else if url.contains("/stories/") {
        InstagramMediaKind::Story
    } else {
        InstagramMediaKind::Post
    };
    Ok(kind)
}

/// Reject a file above `max_bytes`.
pub fn check_file_size(file: &LocalFile, max_bytes: u64) -> Result<()> {
    if file.size > max_bytes {
        return Err(ReelforgeError::Validation(format!(
            "{} is over {}MB.",
            file.name,
            max_bytes / (1024 * 1024)
        )));
    }
    Ok(())
}

/// Reject a file whose extension does not match the slot it was given for.
pub fn check_file_kind(file: &LocalFile, expected: ArtifactKind) -> Result<()> {
    match file.kind {
        Some(kind) if kind == expected => Ok(()),
        _ => Err(ReelforgeError::Validation(format!(
            "{} is not a supported {} file.",
            file.name, expected
        ))),
    }
}

pub fn check_compose_options(options: &ComposeOptions) -> Result<()> {
    let display = options.display_duration_secs;
    if !(MIN_DISPLAY_DURATION_SECS..=MAX_DISPLAY_DURATION_SECS).contains(&display) {
        return Err(ReelforgeError::Validation(format!(
            "Image display duration must be between {} and {} seconds.",
            MIN_DISPLAY_DURATION_SECS, MAX_DISPLAY_DURATION_SECS
        )));
    }

    let transition = options.transition_duration_secs;
    if !(MIN_TRANSITION_SECS..=MAX_TRANSITION_SECS).contains(&transition) {
        return Err(ReelforgeError::Validation(format!(
            "Transition duration must be between {} and {} seconds.",
            MIN_TRANSITION_SECS, MAX_TRANSITION_SECS
        )));
    }

    if options.frame_rate == 0 {
        return Err(ReelforgeError::Validation(
            "Frame rate must be greater than zero.".to_string(),
        ));
    }

    if let Some(start) = options.audio_start_secs {
        if start < 0.0 {
            return Err(ReelforgeError::Validation(
                "Music start time cannot be negative.".to_string(),
            ));
        }
    }

    Ok(())
}
