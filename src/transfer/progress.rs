use futures::{Stream, TryStreamExt};
use std::io;
use std::sync::{Arc, Mutex};
use tokio::fs::File;
use tokio_util::io::ReaderStream;

/// Receives whole-number upload percentages.
pub type ProgressFn = Arc<dyn Fn(u8) + Send + Sync>;

/// Converts byte counts into a non-decreasing percentage sequence.
pub struct ProgressTracker {
    total: u64,
    sent: u64,
    last: Option<u8>,
    callback: Option<ProgressFn>,
}

impl ProgressTracker {
    pub fn new(total: u64, callback: Option<ProgressFn>) -> Self {
        Self {
            total,
            sent: 0,
            last: None,
            callback,
        }
    }

    pub fn record(&mut self, bytes: usize) {
        self.sent = self.sent.saturating_add(bytes as u64);
        if self.total == 0 {
            return;
        }
        let percent = ((self.sent.saturating_mul(100) + self.total / 2) / self.total).min(100) as u8;
        self.emit(percent);
    }

    /// Report 100 if it has not been reported yet.
    pub fn finish(&mut self) {
        self.emit(100);
    }

    pub fn last_reported(&self) -> Option<u8> {
        self.last
    }

    fn emit(&mut self, percent: u8) {
        if self.last.is_some_and(|last| percent <= last) {
            return;
        }
        self.last = Some(percent);
        if let Some(callback) = &self.callback {
            callback(percent);
        }
    }
}

/// Stream a file's bytes, counting each chunk into `tracker` as it is read.
pub fn counting_stream(
    file: File,
    tracker: Arc<Mutex<ProgressTracker>>,
) -> impl Stream<Item = io::Result<bytes::Bytes>> + Send + 'static {
    ReaderStream::new(file).inspect_ok(move |chunk| {
        if let Ok(mut tracker) = tracker.lock() {
            tracker.record(chunk.len());
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::StreamExt;
    use std::io::Write;

    fn recording() -> (ProgressFn, Arc<Mutex<Vec<u8>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressFn = Arc::new(move |p| sink.lock().unwrap().push(p));
        (callback, seen)
    }

    #[test]
    fn test_percentages_never_decrease_and_end_at_100() {
        let (callback, seen) = recording();
        let mut tracker = ProgressTracker::new(1000, Some(callback));
        for _ in 0..7 {
            tracker.record(150);
        }
        tracker.finish();
        tracker.finish();

        let seen = seen.lock().unwrap().clone();
        assert!(seen.windows(2).all(|w| w[0] < w[1]), "{:?}", seen);
        assert_eq!(seen.last(), Some(&100));
        assert_eq!(seen.iter().filter(|p| **p == 100).count(), 1);
    }

    #[test]
    fn test_empty_file_reports_only_completion() {
        let (callback, seen) = recording();
        let mut tracker = ProgressTracker::new(0, Some(callback));
        tracker.record(0);
        assert!(seen.lock().unwrap().is_empty());
        tracker.finish();
        assert_eq!(*seen.lock().unwrap(), vec![100]);
    }

    #[tokio::test]
    async fn test_counting_stream_reports_bytes_read() {
        let mut temp = tempfile::NamedTempFile::new().unwrap();
        temp.write_all(&vec![7u8; 64 * 1024]).unwrap();

        let (callback, seen) = recording();
        let tracker = Arc::new(Mutex::new(ProgressTracker::new(64 * 1024, Some(callback))));
        let file = File::open(temp.path()).await.unwrap();

        let total: usize = counting_stream(file, tracker.clone())
            .map(|chunk| chunk.unwrap().len())
            .fold(0, |acc, n| async move { acc + n })
            .await;

        assert_eq!(total, 64 * 1024);
        assert_eq!(tracker.lock().unwrap().last_reported(), Some(100));
        assert!(!seen.lock().unwrap().is_empty());
    }
}
