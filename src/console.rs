//! Terminal rendering of notifications and job progress.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, Metadata};

use crate::workflow::{JobDescriptor, JobStatus, Notification, NotificationLevel, Notifier};

/// Log target of notification records. They are printed directly, so the
/// console log layer skips them and only the file log keeps them.
pub const NOTIFY_TARGET: &str = "reelforge::notify";

/// Filter for the console log layer.
pub fn is_console_event(meta: &Metadata<'_>) -> bool {
    meta.target() != NOTIFY_TARGET
}

/// Prints notifications above any active progress bars.
#[derive(Clone, Default)]
pub struct ConsoleNotifier {
    multi: MultiProgress,
}

impl ConsoleNotifier {
    pub fn new(multi: MultiProgress) -> Self {
        Self { multi }
    }

    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

fn render(notification: &Notification) -> String {
    let marker = match notification.level {
        NotificationLevel::Info => "i",
        NotificationLevel::Success => "✓",
        NotificationLevel::Error => "✗",
    };
    if notification.description.is_empty() {
        format!("{} {}", marker, notification.title)
    } else {
        format!("{} {}: {}", marker, notification.title, notification.description)
    }
}

impl Notifier for ConsoleNotifier {
    fn notify(&self, notification: Notification) {
        match notification.level {
            NotificationLevel::Error => {
                error!(target: NOTIFY_TARGET, title = %notification.title, "{}", notification.description)
            }
            _ => info!(target: NOTIFY_TARGET, title = %notification.title, "{}", notification.description),
        }
        let line = render(&notification);
        self.multi.suspend(|| println!("{}", line));
    }
}

/// Progress bar fed from an orchestrator's job state.
pub struct JobProgress {
    bar: ProgressBar,
    task: JoinHandle<()>,
}

impl JobProgress {
    pub fn attach(multi: &MultiProgress, mut state: watch::Receiver<JobDescriptor>) -> Self {
        let bar = multi.add(ProgressBar::new(100));
        if let Ok(style) = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
        {
            bar.set_style(style.progress_chars("#>-"));
        }

        let tracked = bar.clone();
        let task = tokio::spawn(async move {
            loop {
                {
                    let job = state.borrow_and_update();
                    if job.is_running() {
                        tracked.set_position(job.progress as u64);
                        if let Some(step) = job.current_step_kind() {
                            tracked.set_message(step.to_string());
                        }
                    }
                }
                if state.changed().await.is_err() {
                    debug!("Job state channel closed");
                    break;
                }
            }
        });

        Self { bar, task }
    }

    /// Stop tracking and remove the bar, for jobs that never started.
    pub fn clear(self) {
        self.task.abort();
        self.bar.finish_and_clear();
    }

    /// Stop tracking and leave the bar showing how the job ended.
    pub fn finish(self, job: &JobDescriptor) {
        self.task.abort();
        match job.status {
            JobStatus::Succeeded => {
                self.bar.set_position(100);
                self.bar.finish_with_message("Done");
            }
            _ => {
                let reason = job.error.clone().unwrap_or_else(|| "Stopped".to_string());
                self.bar.abandon_with_message(reason);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::filter::filter_fn;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::{fmt, Layer};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedBuf {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    #[test]
    fn test_notifications_skip_console_log_layer() {
        let console_buf = SharedBuf::default();
        let file_buf = SharedBuf::default();
        let console_writer = console_buf.clone();
        let file_writer = file_buf.clone();

        let subscriber = tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(move || console_writer.clone())
                    .with_filter(filter_fn(is_console_event)),
            )
            .with(fmt::layer().with_ansi(false).with_writer(move || file_writer.clone()));

        tracing::subscriber::with_default(subscriber, || {
            ConsoleNotifier::default().notify(Notification::error("Upload failed", "clip.mp4 is over 50MB."));
            info!("engine message");
        });

        let console = console_buf.text();
        let file = file_buf.text();
        assert!(console.contains("engine message"));
        assert!(!console.contains("clip.mp4 is over 50MB."));
        assert!(file.contains("clip.mp4 is over 50MB."));
        assert!(file.contains("engine message"));
    }

    #[test]
    fn test_render_notification() {
        let line = render(&Notification::error("Upload failed", "clip.mp4 is over 50MB."));
        assert_eq!(line, "✗ Upload failed: clip.mp4 is over 50MB.");
        assert_eq!(render(&Notification::success("Done", "")), "✓ Done");
    }
}
