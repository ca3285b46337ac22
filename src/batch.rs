//! Image batch for the shorts flow.
//!
//! Every accepted file starts its own upload right away; entries settle
//! independently and in any order. Removing an entry releases its preview
//! and makes the batch ignore whatever its upload later returns.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use crate::artifact::{ArtifactId, ArtifactKind, ArtifactReference, LocalFile};
use crate::config::{BatchOverflowPolicy, LimitsConfig};
use crate::error::{Result, ReelforgeError};
use crate::transfer::{ProgressFn, TransferClient};
use crate::validate::{check_file_kind, check_file_size};
use crate::workflow::{Notification, Notifier};

pub type EntryId = u64;

#[derive(Debug, Clone, PartialEq)]
pub enum UploadState {
    Pending,
    Uploading(u8),
    Uploaded(ArtifactReference),
    Failed(String),
}

impl UploadState {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Uploaded(_) | Self::Failed(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchEntry {
    pub id: EntryId,
    pub file: LocalFile,
    pub state: UploadState,
}

/// A file that was not admitted into the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Rejection {
    pub file_name: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AddOutcome {
    pub accepted: Vec<EntryId>,
    pub rejected: Vec<Rejection>,
}

/// Counts live previews so leaks are observable.
#[derive(Debug, Clone, Default)]
pub struct PreviewRegistry {
    live: Arc<AtomicUsize>,
}

impl PreviewRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn acquire(&self, file: &LocalFile) -> PreviewHandle {
        self.live.fetch_add(1, Ordering::SeqCst);
        PreviewHandle {
            path: file.path.clone(),
            live: self.live.clone(),
            released: false,
        }
    }

    pub fn live_count(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }
}

/// Preview of one selected file, owned by the entry that created it.
/// Released exactly once, explicitly or on drop.
#[derive(Debug)]
pub struct PreviewHandle {
    path: PathBuf,
    live: Arc<AtomicUsize>,
    released: bool,
}

impl PreviewHandle {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn release(mut self) {
        self.release_once();
    }

    fn release_once(&mut self) {
        if !self.released {
            self.released = true;
            self.live.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

impl Drop for PreviewHandle {
    fn drop(&mut self) {
        self.release_once();
    }
}

struct Slot {
    entry: BatchEntry,
    preview: Option<PreviewHandle>,
}

#[derive(Default)]
struct BatchState {
    next_id: EntryId,
    slots: Vec<Slot>,
}

fn lock_state(state: &Mutex<BatchState>) -> Result<MutexGuard<'_, BatchState>> {
    state
        .lock()
        .map_err(|_| ReelforgeError::Validation("Upload batch state is unavailable.".to_string()))
}

pub struct UploadBatch {
    client: Arc<dyn TransferClient>,
    notifier: Arc<dyn Notifier>,
    limits: LimitsConfig,
    previews: PreviewRegistry,
    state: Arc<Mutex<BatchState>>,
    tasks: Mutex<JoinSet<()>>,
}

impl UploadBatch {
    pub fn new(
        client: Arc<dyn TransferClient>,
        limits: LimitsConfig,
        notifier: Arc<dyn Notifier>,
        previews: PreviewRegistry,
    ) -> Self {
        Self {
            client,
            notifier,
            limits,
            previews,
            state: Arc::new(Mutex::new(BatchState::default())),
            tasks: Mutex::new(JoinSet::new()),
        }
    }

    /// Admit `files` and start uploading each accepted one.
    ///
    /// The count limit is checked against existing plus proposed files.
    /// Under `reject_all` an overflowing addition fails as a whole and the
    /// batch is left untouched; under `truncate` only what fits is admitted.
    pub fn add_files(&self, files: Vec<LocalFile>) -> Result<AddOutcome> {
        let max = self.limits.max_batch_images;
        let mut outcome = AddOutcome::default();
        let mut admitted = Vec::new();

        {
            let mut state = lock_state(&self.state)?;
            let existing = state.slots.len();
            let mut candidates = files;

            if existing + candidates.len() > max {
                let message = format!(
                    "You can select up to {} images. {} already selected.",
                    max, existing
                );
                match self.limits.batch_overflow {
                    BatchOverflowPolicy::RejectAll => {
                        drop(state);
                        self.notifier
                            .notify(Notification::error("Too many images", message.clone()));
                        return Err(ReelforgeError::Validation(message));
                    }
                    BatchOverflowPolicy::Truncate => {
                        let capacity = max.saturating_sub(existing);
                        for dropped in candidates.split_off(capacity.min(candidates.len())) {
                            outcome.rejected.push(Rejection {
                                file_name: dropped.name,
                                reason: message.clone(),
                            });
                        }
                    }
                }
            }

            for file in candidates {
                let checked = check_file_kind(&file, ArtifactKind::Image)
                    .and_then(|_| check_file_size(&file, self.limits.max_image_bytes()));
                if let Err(e) = checked {
                    outcome.rejected.push(Rejection {
                        file_name: file.name.clone(),
                        reason: e.user_message(),
                    });
                    continue;
                }

                let id = state.next_id;
                state.next_id += 1;
                let preview = self.previews.acquire(&file);
                state.slots.push(Slot {
                    entry: BatchEntry {
                        id,
                        file: file.clone(),
                        state: UploadState::Pending,
                    },
                    preview: Some(preview),
                });
                outcome.accepted.push(id);
                admitted.push((id, file));
            }
        }

        for rejection in &outcome.rejected {
            warn!(file = %rejection.file_name, "Rejected from batch: {}", rejection.reason);
            self.notifier
                .notify(Notification::error("File rejected", rejection.reason.clone()));
        }

        for (id, file) in admitted {
            self.spawn_upload(id, file)?;
        }

        Ok(outcome)
    }

    fn spawn_upload(&self, id: EntryId, file: LocalFile) -> Result<()> {
        let client = self.client.clone();
        let notifier = self.notifier.clone();
        let state = self.state.clone();

        let progress_state = state.clone();
        let on_progress: ProgressFn = Arc::new(move |percent| {
            update_entry(&progress_state, id, |entry| {
                if matches!(entry.state, UploadState::Pending | UploadState::Uploading(_)) {
                    entry.state = UploadState::Uploading(percent);
                }
            });
        });

        let mut tasks = self
            .tasks
            .lock()
            .map_err(|_| ReelforgeError::Validation("Upload batch state is unavailable.".to_string()))?;

        // Reap settled uploads so a long session does not accumulate them
        while let Some(done) = tasks.try_join_next() {
            if let Err(e) = done {
                warn!("Batch upload task ended abnormally: {}", e);
            }
        }

        tasks.spawn(async move {
            update_entry(&state, id, |entry| entry.state = UploadState::Uploading(0));
            let name = file.name.clone();
            let result = client.upload(file, Some(on_progress)).await;

            let still_present = update_entry(&state, id, |entry| {
                entry.state = match &result {
                    Ok(artifact) => UploadState::Uploaded(artifact.clone()),
                    Err(e) => UploadState::Failed(e.user_message()),
                };
            });

            if !still_present {
                debug!(entry = id, "Entry removed before upload settled, result discarded");
                return;
            }

            match result {
                Ok(artifact) => {
                    info!(file = %name, id = %artifact.id, "Batch upload finished");
                    notifier.notify(Notification::success("Image uploaded", name));
                }
                Err(e) => {
                    warn!(file = %name, "Batch upload failed: {}", e);
                    notifier.notify(Notification::error(
                        "Upload failed",
                        format!("{}: {}", name, e.user_message()),
                    ));
                }
            }
        });

        Ok(())
    }

    /// Drop an entry. Returns false if it was already gone.
    pub fn remove(&self, id: EntryId) -> bool {
        let slot = match lock_state(&self.state) {
            Ok(mut state) => state
                .slots
                .iter()
                .position(|slot| slot.entry.id == id)
                .map(|index| state.slots.remove(index)),
            Err(_) => None,
        };

        match slot {
            Some(mut slot) => {
                if let Some(preview) = slot.preview.take() {
                    preview.release();
                }
                debug!(entry = id, "Removed batch entry");
                true
            }
            None => false,
        }
    }

    pub fn entries(&self) -> Vec<BatchEntry> {
        lock_state(&self.state)
            .map(|state| state.slots.iter().map(|slot| slot.entry.clone()).collect())
            .unwrap_or_default()
    }

    /// Ids of uploaded entries, in selection order.
    pub fn uploaded_ids(&self) -> Vec<ArtifactId> {
        self.entries()
            .into_iter()
            .filter_map(|entry| match entry.state {
                UploadState::Uploaded(artifact) => Some(artifact.id),
                _ => None,
            })
            .collect()
    }

    pub fn is_uploading(&self) -> bool {
        self.entries().iter().any(|entry| !entry.state.is_settled())
    }

    pub fn len(&self) -> usize {
        lock_state(&self.state).map(|s| s.slots.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until every upload started so far has settled.
    pub async fn wait_idle(&self) {
        loop {
            let mut pending = match self.tasks.lock() {
                Ok(mut tasks) => std::mem::take(&mut *tasks),
                Err(_) => return,
            };
            if pending.is_empty() {
                return;
            }
            while let Some(joined) = pending.join_next().await {
                if let Err(e) = joined {
                    warn!("Batch upload task ended abnormally: {}", e);
                }
            }
        }
    }

    /// Remove every entry, releasing all previews.
    pub fn reset(&self) {
        let slots = match lock_state(&self.state) {
            Ok(mut state) => std::mem::take(&mut state.slots),
            Err(_) => return,
        };
        let count = slots.len();
        for mut slot in slots {
            if let Some(preview) = slot.preview.take() {
                preview.release();
            }
        }
        debug!("Cleared {} batch entries", count);
    }
}

/// Apply `f` to entry `id` if it is still in the batch.
fn update_entry(state: &Mutex<BatchState>, id: EntryId, f: impl FnOnce(&mut BatchEntry)) -> bool {
    let Ok(mut state) = state.lock() else {
        return false;
    };
    match state.slots.iter_mut().find(|slot| slot.entry.id == id) {
        Some(slot) => {
            f(&mut slot.entry);
            true
        }
        None => false,
    }
}
