//! Sample windowing for inference.
//!
//! Samples are kept in a fixed-capacity sliding window. A stride scheduler
//! decides, from the running sample count, when the window is handed to
//! feature extraction: first when it fills, then every `step_len` samples.

use crate::transport::types::Sample;
use thiserror::Error;

/// Fixed-capacity FIFO of the most recent samples.
///
/// Backed by a vector of twice the capacity; the live window is always a
/// contiguous tail, compacted once every `capacity` pushes.
#[derive(Debug, Clone)]
pub struct WindowBuffer {
    capacity: usize,
    samples: Vec<Sample>,
    start: usize,
}

impl WindowBuffer {
    /// Create an empty buffer holding at most `capacity` samples.
    pub fn new(capacity: usize) -> Result<Self, WindowError> {
        if capacity == 0 {
            return Err(WindowError::ZeroWindow);
        }
        Ok(Self {
            capacity,
            samples: Vec::with_capacity(2 * capacity),
            start: 0,
        })
    }

    /// Append a sample, evicting the oldest one when full.
    pub fn push(&mut self, sample: Sample) {
        if self.samples.len() == 2 * self.capacity {
            self.samples.drain(..self.start);
            self.start = 0;
        }
        self.samples.push(sample);
        if self.samples.len() - self.start > self.capacity {
            self.start += 1;
        }
    }

    /// Current contents, oldest first.
    pub fn snapshot(&self) -> &[Sample] {
        &self.samples[self.start..]
    }

    /// Number of samples currently held.
    pub fn len(&self) -> usize {
        self.samples.len() - self.start
    }

    /// True before the first push.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// True once `capacity` samples are held.
    pub fn is_full(&self) -> bool {
        self.len() == self.capacity
    }

    /// Maximum number of samples held.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Decides which sample counts trigger an inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrideScheduler {
    win_len: usize,
    step_len: usize,
}

impl StrideScheduler {
    /// Scheduler for windows of `win_len` samples taken every `step_len`.
    pub fn new(win_len: usize, step_len: usize) -> Result<Self, WindowError> {
        if win_len == 0 {
            return Err(WindowError::ZeroWindow);
        }
        if step_len == 0 {
            return Err(WindowError::ZeroStep);
        }
        Ok(Self { win_len, step_len })
    }

    /// True when `count` samples have been ingested and a window is due.
    pub fn should_infer(&self, count: u64) -> bool {
        let win_len = self.win_len as u64;
        count >= win_len && (count - win_len) % self.step_len as u64 == 0
    }

    /// Window length in samples.
    pub fn win_len(&self) -> usize {
        self.win_len
    }

    /// Samples between consecutive windows.
    pub fn step_len(&self) -> usize {
        self.step_len
    }
}

/// Start/end index pairs of every full window over `len` recorded samples.
pub fn sliding_windows(
    len: usize,
    win_len: usize,
    step_len: usize,
) -> impl Iterator<Item = (usize, usize)> {
    let last_start = if win_len == 0 || len < win_len {
        None
    } else {
        Some(len - win_len)
    };
    (0..)
        .step_by(step_len.max(1))
        .take_while(move |start| last_start.is_some_and(|last| *start <= last))
        .map(move |start| (start, start + win_len))
}

/// Window geometry errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("window length must be at least one sample")]
    ZeroWindow,
    #[error("step length must be at least one sample")]
    ZeroStep,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(i: usize) -> Sample {
        Sample::new(i as f64, i as f64, 0.0, 0.0)
    }

    #[test]
    fn test_buffer_evicts_oldest() {
        let mut buffer = WindowBuffer::new(3).unwrap();
        for i in 0..5 {
            buffer.push(sample(i));
        }

        assert_eq!(buffer.len(), 3);
        assert!(buffer.is_full());
        let ts: Vec<f64> = buffer.snapshot().iter().map(|s| s.timestamp).collect();
        assert_eq!(ts, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_snapshot_does_not_mutate() {
        let mut buffer = WindowBuffer::new(4).unwrap();
        buffer.push(sample(1));
        buffer.push(sample(2));

        let first = buffer.snapshot();
        let second = buffer.snapshot();
        assert_eq!(first, second);
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_buffer_keeps_order_across_compaction() {
        let mut buffer = WindowBuffer::new(3).unwrap();
        for i in 0..20 {
            buffer.push(sample(i));
            let expected: Vec<f64> = (i.saturating_sub(2)..=i).map(|t| t as f64).collect();
            let ts: Vec<f64> = buffer.snapshot().iter().map(|s| s.timestamp).collect();
            assert_eq!(ts, expected);
        }
        assert_eq!(buffer.len(), 3);
        assert!(buffer.samples.capacity() <= 6);
    }

    #[test]
    fn test_zero_geometry_rejected() {
        assert_eq!(WindowBuffer::new(0).unwrap_err(), WindowError::ZeroWindow);
        assert_eq!(StrideScheduler::new(25, 0).unwrap_err(), WindowError::ZeroStep);
        assert_eq!(StrideScheduler::new(0, 5).unwrap_err(), WindowError::ZeroWindow);
    }

    #[test]
    fn test_first_trigger_when_window_fills() {
        let scheduler = StrideScheduler::new(25, 5).unwrap();
        assert!(!scheduler.should_infer(24));
        assert!(scheduler.should_infer(25));
        assert!(!scheduler.should_infer(26));
        assert!(scheduler.should_infer(30));
        assert!(scheduler.should_infer(35));
    }

    #[test]
    fn test_trigger_count_matches_formula() {
        for (win_len, step_len) in [(25, 5), (10, 3), (1, 1), (7, 7), (4, 10)] {
            let scheduler = StrideScheduler::new(win_len, step_len).unwrap();
            for n in win_len..(win_len + 60) {
                let triggers = (1..=n as u64).filter(|&c| scheduler.should_infer(c)).count();
                assert_eq!(triggers, (n - win_len) / step_len + 1, "win={win_len} step={step_len} n={n}");
            }
        }
    }

    #[test]
    fn test_sliding_windows() {
        let windows: Vec<_> = sliding_windows(12, 5, 3).collect();
        assert_eq!(windows, vec![(0, 5), (3, 8), (6, 11)]);

        assert_eq!(sliding_windows(4, 5, 1).count(), 0);
        assert_eq!(sliding_windows(5, 5, 1).collect::<Vec<_>>(), vec![(0, 5)]);
    }
}
