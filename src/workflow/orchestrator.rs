use std::sync::Arc;
use tokio::sync::watch;
use tracing::{info, warn};
use uuid::Uuid;

use crate::artifact::{ArtifactKind, ArtifactReference, LocalFile};
use crate::cache::UploadCache;
use crate::config::LimitsConfig;
use crate::error::{Result, ReelforgeError};
use crate::transfer::{ProgressFn, TransferClient};
use crate::validate;
use super::job::{JobDescriptor, JobOutcome, ProgressBand, StepKind, StepSpec};
use super::notify::{Notification, Notifier};

/// Runs one job at a time, step by step, publishing its state to observers.
pub struct JobOrchestrator {
    client: Arc<dyn TransferClient>,
    notifier: Arc<dyn Notifier>,
    cache: Option<Arc<UploadCache>>,
    limits: LimitsConfig,
    state: Arc<watch::Sender<JobDescriptor>>,
}

impl JobOrchestrator {
    pub fn new(client: Arc<dyn TransferClient>, notifier: Arc<dyn Notifier>) -> Self {
        let (state, _) = watch::channel(JobDescriptor::idle());
        Self {
            client,
            notifier,
            cache: None,
            limits: LimitsConfig::default(),
            state: Arc::new(state),
        }
    }

    pub fn with_upload_cache(mut self, cache: Arc<UploadCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_limits(mut self, limits: LimitsConfig) -> Self {
        self.limits = limits;
        self
    }

    pub fn subscribe(&self) -> watch::Receiver<JobDescriptor> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> JobDescriptor {
        self.state.borrow().clone()
    }

    pub fn is_running(&self) -> bool {
        self.state.borrow().is_running()
    }

    /// Run `steps` to completion. Rejected with a validation error, without
    /// touching the current state, when inputs are missing or a job is running.
    pub async fn start(&self, steps: Vec<StepSpec>) -> Result<JobOutcome> {
        if let Err(err) = self.validate_steps(&steps) {
            self.notifier
                .notify(Notification::error("Invalid input", err.user_message()));
            return Err(err);
        }

        let job_id = Uuid::new_v4();
        let kinds: Vec<StepKind> = steps.iter().map(StepSpec::kind).collect();
        if !self.claim(job_id, kinds) {
            let err = ReelforgeError::Validation(
                "A job is already running. Wait for it to finish.".to_string(),
            );
            self.notifier
                .notify(Notification::error("Busy", err.user_message()));
            return Err(err);
        }

        let _interrupted = InterruptGuard {
            state: &self.state,
            job_id,
        };
        info!(job_id = %job_id, steps = steps.len(), "Job started");

        let total = steps.len();
        let mut produced: Vec<ArtifactReference> = Vec::with_capacity(total);
        let mut uploaded: Vec<LocalFile> = Vec::new();

        for (index, step) in steps.into_iter().enumerate() {
            let kind = step.kind();
            let band = ProgressBand::for_step(index, total);
            let marker = match kind {
                StepKind::Upload => band.start,
                _ => band.entry_marker(),
            };
            self.state.send_modify(|job| job.enter_step(index, marker));

            let outcome = self.run_step(step, produced.last(), band, &mut uploaded).await;
            match outcome {
                Ok(artifact) => {
                    info!(job_id = %job_id, step = %kind, artifact_id = %artifact.id, "Step completed");
                    let notification = step_succeeded(kind, &artifact);
                    produced.push(artifact);

                    if index + 1 == total {
                        let artifacts = produced.clone();
                        self.state.send_modify(|job| job.succeed(artifacts));
                    } else {
                        self.state.send_modify(|job| {
                            job.advance(band.end);
                        });
                    }
                    self.notifier.notify(notification);
                }
                Err(err) => {
                    return Err(self.fail(job_id, kind, err, &uploaded));
                }
            }
        }

        info!(job_id = %job_id, "Job succeeded");
        Ok(JobOutcome {
            job_id,
            artifacts: produced,
        })
    }

    /// Atomically move from a non-running state to a fresh running job.
    fn claim(&self, job_id: Uuid, kinds: Vec<StepKind>) -> bool {
        let mut claimed = false;
        self.state.send_if_modified(|job| {
            if job.is_running() {
                return false;
            }
            *job = JobDescriptor::begin(job_id, kinds);
            claimed = true;
            true
        });
        claimed
    }

    fn fail(&self, job_id: Uuid, step: StepKind, err: ReelforgeError, uploaded: &[LocalFile]) -> ReelforgeError {
        let message = err.user_message();
        warn!(job_id = %job_id, step = %step, "Job failed: {}", err);

        if let Some(cache) = &self.cache {
            for file in uploaded {
                if let Err(e) = cache.invalidate(file) {
                    warn!("Could not invalidate cached upload of {}: {}", file.name, e);
                }
            }
        }

        self.state.send_modify(|job| job.fail(message.clone()));
        self.notifier
            .notify(Notification::error(format!("{} failed", step), message));

        ReelforgeError::StepFailed {
            step,
            source: Box::new(err),
        }
    }

    async fn run_step(
        &self,
        step: StepSpec,
        previous: Option<&ArtifactReference>,
        band: ProgressBand,
        uploaded: &mut Vec<LocalFile>,
    ) -> Result<ArtifactReference> {
        match step {
            StepSpec::Upload { file, .. } => {
                uploaded.push(file.clone());

                if let Some(cache) = &self.cache {
                    if let Some(hit) = cache.lookup(&file) {
                        info!(file = %file.name, artifact_id = %hit.id, "Reusing previous upload");
                        self.notifier.notify(Notification::info(
                            "Using previously uploaded file.",
                            format!("File ID: {}", hit.id),
                        ));
                        return Ok(hit);
                    }
                }

                self.notifier
                    .notify(Notification::info("Uploading...", file.name.clone()));

                let state = self.state.clone();
                let on_progress: ProgressFn = Arc::new(move |percent| {
                    let value = band.scale(percent);
                    state.send_if_modified(|job| job.advance(value));
                });

                let artifact = self.client.upload(file.clone(), Some(on_progress)).await?;

                if let Some(cache) = &self.cache {
                    if let Err(e) = cache.store(&file, &artifact) {
                        warn!("Could not cache upload of {}: {}", file.name, e);
                    }
                }
                Ok(artifact)
            }
            StepSpec::FetchRemote { url, source } => {
                self.notifier.notify(Notification::info(
                    format!("Downloading {} video...", source),
                    "This may take a moment.",
                ));
                self.client.fetch_remote_video(url.trim().to_string(), source).await
            }
            StepSpec::ExtractAudio { source } => {
                let source = source
                    .or_else(|| previous.map(|p| p.id.clone()))
                    .ok_or_else(|| {
                        ReelforgeError::Validation("No video available to extract audio from.".to_string())
                    })?;
                self.notifier
                    .notify(Notification::info("Extracting audio...", "This may take a moment."));
                self.client.extract_audio(source).await
            }
            StepSpec::Compose(request) => {
                self.notifier.notify(Notification::info(
                    "Creating video...",
                    format!("{} images", request.image_ids.len()),
                ));
                self.client.compose_video(request).await
            }
        }
    }

    fn validate_steps(&self, steps: &[StepSpec]) -> Result<()> {
        if steps.is_empty() {
            return Err(ReelforgeError::Validation(
                "Nothing to do: the job has no steps.".to_string(),
            ));
        }

        for (index, step) in steps.iter().enumerate() {
            match step {
                StepSpec::Upload { file, expected } => self.check_upload(file, *expected)?,
                StepSpec::FetchRemote { url, source } => {
                    validate::validate_remote_url(url, *source)?
                }
                StepSpec::ExtractAudio { source: None } if index == 0 => {
                    return Err(ReelforgeError::Validation(
                        "Please select a video file first.".to_string(),
                    ));
                }
                StepSpec::ExtractAudio { .. } => {}
                StepSpec::Compose(request) => {
                    if request.image_ids.is_empty() {
                        return Err(ReelforgeError::Validation(
                            "Please upload images first.".to_string(),
                        ));
                    }
                    if request.audio_id.as_str().trim().is_empty() {
                        return Err(ReelforgeError::Validation(
                            "Please upload background audio first.".to_string(),
                        ));
                    }
                    request.options.validate()?;
                }
            }
        }
        Ok(())
    }

    fn check_upload(&self, file: &LocalFile, expected: ArtifactKind) -> Result<()> {
        validate::check_file_kind(file, expected)?;
        let ceiling = match expected {
            ArtifactKind::Video => self.limits.max_video_bytes(),
            ArtifactKind::Audio => self.limits.max_audio_bytes(),
            ArtifactKind::Image => self.limits.max_image_bytes(),
        };
        validate::check_file_size(file, ceiling)
    }
}

pub const JOB_INTERRUPTED: &str = "Job interrupted";

/// Fails the claimed job if `start` is dropped or unwinds before settling.
struct InterruptGuard<'a> {
    state: &'a watch::Sender<JobDescriptor>,
    job_id: Uuid,
}

impl Drop for InterruptGuard<'_> {
    fn drop(&mut self) {
        let job_id = self.job_id;
        let failed = self.state.send_if_modified(|job| {
            if job.job_id != Some(job_id) || !job.is_running() {
                return false;
            }
            job.fail(JOB_INTERRUPTED.to_string());
            true
        });
        if failed {
            warn!(job_id = %job_id, "Job abandoned before it settled");
        }
    }
}

fn step_succeeded(kind: StepKind, artifact: &ArtifactReference) -> Notification {
    let title = match kind {
        StepKind::Upload => "Uploaded successfully!",
        StepKind::FetchRemote => "Video downloaded to server!",
        StepKind::ExtractAudio => "Audio extracted successfully!",
        StepKind::Compose => "Video created successfully!",
    };
    Notification::success(title, format!("File ID: {}", artifact.id))
}
