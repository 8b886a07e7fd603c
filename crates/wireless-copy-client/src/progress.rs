// SPDX-License-Identifier: AGPL-3.0
// Wireless File Copy Client - Upload progress sampling

use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default spacing between progress observations
pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(1);

/// Receives progress observations while a body is being sent
pub trait ProgressSink: Send + Sync {
    fn observe(&self, bytes_so_far: u64, total_label: &str);
}

/// Discards every observation
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn observe(&self, _bytes_so_far: u64, _total_label: &str) {}
}

/// Counts bytes as chunks are handed to the transport and forwards a
/// running total to the sink at most once per interval.
///
/// The first observation is due one interval after the sampler is created;
/// a transfer shorter than that produces none.
pub struct ProgressSampler {
    sink: Arc<dyn ProgressSink>,
    interval: Duration,
    total_label: String,
    sent: u64,
    last_emit: Instant,
}

impl ProgressSampler {
    pub fn new(sink: Arc<dyn ProgressSink>, interval: Duration, total_label: String) -> Self {
        Self {
            sink,
            interval,
            total_label,
            sent: 0,
            last_emit: Instant::now(),
        }
    }

    pub fn record(&mut self, chunk_len: usize) {
        self.sent += chunk_len as u64;
        if self.last_emit.elapsed() >= self.interval {
            self.last_emit = Instant::now();
            self.sink.observe(self.sent, &self.total_label);
        }
    }

    pub fn bytes_sent(&self) -> u64 {
        self.sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(u64, String)>>);

    impl ProgressSink for Recorder {
        fn observe(&self, bytes_so_far: u64, total_label: &str) {
            self.0
                .lock()
                .unwrap()
                .push((bytes_so_far, total_label.to_string()));
        }
    }

    #[test]
    fn test_burst_within_interval_emits_nothing() {
        let recorder = Arc::new(Recorder::default());
        let mut sampler =
            ProgressSampler::new(recorder.clone(), Duration::from_secs(1), "24 kB".into());

        for _ in 0..3 {
            sampler.record(8192);
        }

        assert_eq!(sampler.bytes_sent(), 24576);
        assert!(recorder.0.lock().unwrap().is_empty());
    }

    #[test]
    fn test_zero_interval_emits_every_chunk() {
        let recorder = Arc::new(Recorder::default());
        let mut sampler = ProgressSampler::new(recorder.clone(), Duration::ZERO, "10 B".into());

        sampler.record(4);
        sampler.record(6);

        let seen = recorder.0.lock().unwrap();
        assert_eq!(
            *seen,
            vec![(4, "10 B".to_string()), (10, "10 B".to_string())]
        );
    }

    #[test]
    fn test_emits_once_interval_has_elapsed() {
        let recorder = Arc::new(Recorder::default());
        let mut sampler =
            ProgressSampler::new(recorder.clone(), Duration::from_millis(20), "1 kB".into());

        sampler.record(100);
        std::thread::sleep(Duration::from_millis(30));
        sampler.record(100);
        sampler.record(100);

        assert_eq!(*recorder.0.lock().unwrap(), vec![(200, "1 kB".to_string())]);
    }
}
