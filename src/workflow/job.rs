use serde::Serialize;
use std::fmt;
use uuid::Uuid;

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactReference, LocalFile};
use crate::transfer::{ComposeRequest, RemoteSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    Upload,
    FetchRemote,
    ExtractAudio,
    Compose,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Upload => "Upload",
            Self::FetchRemote => "Remote video download",
            Self::ExtractAudio => "Audio extraction",
            Self::Compose => "Video composition",
        };
        f.write_str(label)
    }
}

/// One step of a job together with the input it needs.
#[derive(Debug, Clone, PartialEq)]
pub enum StepSpec {
    /// `expected` is the only kind the slot accepts
    Upload { file: LocalFile, expected: ArtifactKind },
    FetchRemote { url: String, source: RemoteSource },
    /// `None` takes the artifact produced by the previous step
    ExtractAudio { source: Option<ArtifactId> },
    Compose(ComposeRequest),
}

impl StepSpec {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Upload { .. } => StepKind::Upload,
            Self::FetchRemote { .. } => StepKind::FetchRemote,
            Self::ExtractAudio { .. } => StepKind::ExtractAudio,
            Self::Compose(_) => StepKind::Compose,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

/// Slice of the 0-100 range owned by one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgressBand {
    pub start: u8,
    pub end: u8,
}

impl ProgressBand {
    /// Equal-width band for step `index` of `total`; the last band always ends at 100.
    pub fn for_step(index: usize, total: usize) -> Self {
        let total = total.max(1);
        let index = index.min(total - 1);
        Self {
            start: (index * 100 / total) as u8,
            end: ((index + 1) * 100 / total) as u8,
        }
    }

    fn width(&self) -> u8 {
        self.end.saturating_sub(self.start)
    }

    /// Shown when a step without byte-level progress begins.
    pub fn entry_marker(&self) -> u8 {
        self.start + self.width() / 5
    }

    /// Map a step-local percentage into the band, stopping short of its end.
    pub fn scale(&self, percent: u8) -> u8 {
        let width = self.width() as u32;
        let scaled = self.start as u32 + percent.min(100) as u32 * width / 100;
        let ceiling = if width > 0 { self.end - 1 } else { self.end };
        (scaled as u8).min(ceiling)
    }
}

/// Observable state of the current (or last) job of an orchestrator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct JobDescriptor {
    pub job_id: Option<Uuid>,
    pub steps: Vec<StepKind>,
    pub current_step: Option<usize>,
    pub status: JobStatus,
    pub progress: u8,
    pub error: Option<String>,
    /// Artifacts of every step, populated only once the job succeeded
    pub artifacts: Vec<ArtifactReference>,
}

impl Default for JobDescriptor {
    fn default() -> Self {
        Self::idle()
    }
}

impl JobDescriptor {
    pub fn idle() -> Self {
        Self {
            job_id: None,
            steps: Vec::new(),
            current_step: None,
            status: JobStatus::Idle,
            progress: 0,
            error: None,
            artifacts: Vec::new(),
        }
    }

    pub(crate) fn begin(job_id: Uuid, steps: Vec<StepKind>) -> Self {
        Self {
            job_id: Some(job_id),
            steps,
            current_step: None,
            status: JobStatus::Running,
            progress: 0,
            error: None,
            artifacts: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.status == JobStatus::Running
    }

    pub fn current_step_kind(&self) -> Option<StepKind> {
        self.current_step.and_then(|i| self.steps.get(i).copied())
    }

    /// Final artifact, available only after success.
    pub fn result(&self) -> Option<&ArtifactReference> {
        if self.status == JobStatus::Succeeded {
            self.artifacts.last()
        } else {
            None
        }
    }

    /// Raise progress to `value`. Returns whether anything changed.
    pub(crate) fn advance(&mut self, value: u8) -> bool {
        if !self.is_running() || value <= self.progress {
            return false;
        }
        self.progress = value.min(100);
        true
    }

    pub(crate) fn enter_step(&mut self, index: usize, marker: u8) {
        self.current_step = Some(index);
        self.advance(marker);
    }

    pub(crate) fn succeed(&mut self, artifacts: Vec<ArtifactReference>) {
        self.status = JobStatus::Succeeded;
        self.progress = 100;
        self.error = None;
        self.artifacts = artifacts;
    }

    pub(crate) fn fail(&mut self, message: String) {
        self.status = JobStatus::Failed;
        self.error = Some(message);
        self.artifacts.clear();
    }
}

/// What a successful job produced, in step order.
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub job_id: Uuid,
    pub artifacts: Vec<ArtifactReference>,
}

impl JobOutcome {
    pub fn result(&self) -> Option<&ArtifactReference> {
        self.artifacts.last()
    }

    /// Last artifact of the given kind.
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&ArtifactReference> {
        self.artifacts.iter().rev().find(|a| a.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_step_bands() {
        let first = ProgressBand::for_step(0, 2);
        let second = ProgressBand::for_step(1, 2);
        assert_eq!((first.start, first.end), (0, 50));
        assert_eq!((second.start, second.end), (50, 100));
        assert_eq!(first.entry_marker(), 10);
        assert_eq!(second.entry_marker(), 60);
    }

    #[test]
    fn test_scale_stays_inside_band() {
        let band = ProgressBand::for_step(0, 2);
        assert_eq!(band.scale(0), 0);
        assert_eq!(band.scale(50), 25);
        assert_eq!(band.scale(100), 49);

        let last = ProgressBand::for_step(0, 1);
        assert_eq!(last.scale(100), 99);
    }

    #[test]
    fn test_three_step_bands_cover_range() {
        let bands: Vec<_> = (0..3).map(|i| ProgressBand::for_step(i, 3)).collect();
        assert_eq!(bands[0].start, 0);
        assert_eq!(bands[0].end, bands[1].start);
        assert_eq!(bands[1].end, bands[2].start);
        assert_eq!(bands[2].end, 100);
    }

    #[test]
    fn test_progress_only_moves_forward_while_running() {
        let mut job = JobDescriptor::begin(Uuid::new_v4(), vec![StepKind::Upload]);
        assert!(job.advance(30));
        assert!(!job.advance(20));
        assert_eq!(job.progress, 30);

        job.fail("boom".to_string());
        assert!(!job.advance(90));
        assert_eq!(job.progress, 30);
        assert!(job.result().is_none());
    }

    #[test]
    fn test_result_only_after_success() {
        let mut job = JobDescriptor::begin(Uuid::new_v4(), vec![StepKind::ExtractAudio]);
        assert!(job.result().is_none());
        job.succeed(vec![ArtifactReference::new("def456", ArtifactKind::Audio)]);
        assert_eq!(job.progress, 100);
        assert_eq!(job.result().unwrap().id.as_str(), "def456");
    }
}
