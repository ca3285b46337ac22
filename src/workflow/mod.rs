// Job orchestration
//
// A job is an ordered list of steps, each one Transfer Client call:
// - job: step specs, status, progress bands and the observable descriptor
// - orchestrator: runs one job at a time and publishes its state
// - plan: step lists for the upload, remote and shorts flows
// - notify: the seam through which user-facing messages leave the engine

pub mod job;
pub mod orchestrator;
pub mod plan;
pub mod notify;

pub use job::*;
pub use orchestrator::JobOrchestrator;
pub use notify::{MemoryNotifier, Notification, NotificationLevel, Notifier, TracingNotifier};
