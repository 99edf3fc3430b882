//! Session statistics for the detector.
//!
//! Counters are atomics so the transport side and the engine can share one
//! log; totals are persisted across runs for `fallwatch status`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

/// Running counters for the current session.
#[derive(Debug)]
pub struct StatsLog {
    /// Inbound messages received from the transport
    messages_received: AtomicU64,
    /// Messages dropped before reaching the window
    messages_rejected: AtomicU64,
    /// Messages accepted with at least one defaulted field
    fields_defaulted: AtomicU64,
    /// Samples pushed into the window
    samples_ingested: AtomicU64,
    /// Completed inferences
    inferences: AtomicU64,
    /// Inferences labelled Fall
    falls_classified: AtomicU64,
    alerts_fired: AtomicU64,
    alerts_suppressed: AtomicU64,
    /// Inference cycles that ended in an error
    inference_errors: AtomicU64,
    /// Set once a defaulted field has been reported this session; not persisted
    defaulted_reported: AtomicBool,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl StatsLog {
    /// Create an in-memory log starting from zero.
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            messages_rejected: AtomicU64::new(0),
            fields_defaulted: AtomicU64::new(0),
            samples_ingested: AtomicU64::new(0),
            inferences: AtomicU64::new(0),
            falls_classified: AtomicU64::new(0),
            alerts_fired: AtomicU64::new(0),
            alerts_suppressed: AtomicU64::new(0),
            inference_errors: AtomicU64::new(0),
            defaulted_reported: AtomicBool::new(false),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a log that continues from, and saves to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);

        if let Err(e) = log.load() {
            tracing::warn!("Could not load previous session statistics: {e}");
        }

        log
    }

    /// Record an inbound message.
    pub fn record_message(&self) {
        self.messages_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a message dropped before reaching the window.
    pub fn record_rejected(&self) {
        self.messages_rejected.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns true the first time a defaulted field is seen this session.
    pub fn record_defaulted(&self) -> bool {
        self.fields_defaulted.fetch_add(1, Ordering::Relaxed);
        !self.defaulted_reported.swap(true, Ordering::Relaxed)
    }

    /// Record a sample pushed into the window.
    pub fn record_sample(&self) {
        self.samples_ingested.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed inference and whether it was labelled Fall.
    pub fn record_inference(&self, fall: bool) {
        self.inferences.fetch_add(1, Ordering::Relaxed);
        if fall {
            self.falls_classified.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Record a fired alert.
    pub fn record_alert_fired(&self) {
        self.alerts_fired.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a Fall suppressed by the cooldown.
    pub fn record_alert_suppressed(&self) {
        self.alerts_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    /// Record an inference cycle that ended in an error.
    pub fn record_inference_error(&self) {
        self.inference_errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Get current statistics.
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            messages_rejected: self.messages_rejected.load(Ordering::Relaxed),
            fields_defaulted: self.fields_defaulted.load(Ordering::Relaxed),
            samples_ingested: self.samples_ingested.load(Ordering::Relaxed),
            inferences: self.inferences.load(Ordering::Relaxed),
            falls_classified: self.falls_classified.load(Ordering::Relaxed),
            alerts_fired: self.alerts_fired.load(Ordering::Relaxed),
            alerts_suppressed: self.alerts_suppressed.load(Ordering::Relaxed),
            inference_errors: self.inference_errors.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Summary for display at shutdown.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Session Statistics:\n\
             - Messages received: {}\n\
             - Messages rejected: {}\n\
             - Messages with defaulted fields: {}\n\
             - Samples ingested: {}\n\
             - Inferences: {} ({} classified as fall)\n\
             - Inference errors: {}\n\
             - Alerts fired: {}\n\
             - Alerts suppressed by cooldown: {}\n\
             - Session duration: {} seconds",
            stats.messages_received,
            stats.messages_rejected,
            stats.fields_defaulted,
            stats.samples_ingested,
            stats.inferences,
            stats.falls_classified,
            stats.inference_errors,
            stats.alerts_fired,
            stats.alerts_suppressed,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let stats = self.stats();
            let persisted = PersistedStats {
                messages_received: stats.messages_received,
                messages_rejected: stats.messages_rejected,
                fields_defaulted: stats.fields_defaulted,
                samples_ingested: stats.samples_ingested,
                inferences: stats.inferences,
                falls_classified: stats.falls_classified,
                alerts_fired: stats.alerts_fired,
                alerts_suppressed: stats.alerts_suppressed,
                inference_errors: stats.inference_errors,
                last_updated: Utc::now(),
            };

            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;

            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let content = std::fs::read_to_string(path)?;
                let persisted: PersistedStats =
                    serde_json::from_str(&content).map_err(std::io::Error::other)?;

                self.messages_received
                    .store(persisted.messages_received, Ordering::Relaxed);
                self.messages_rejected
                    .store(persisted.messages_rejected, Ordering::Relaxed);
                self.fields_defaulted
                    .store(persisted.fields_defaulted, Ordering::Relaxed);
                self.samples_ingested
                    .store(persisted.samples_ingested, Ordering::Relaxed);
                self.inferences.store(persisted.inferences, Ordering::Relaxed);
                self.falls_classified
                    .store(persisted.falls_classified, Ordering::Relaxed);
                self.alerts_fired
                    .store(persisted.alerts_fired, Ordering::Relaxed);
                self.alerts_suppressed
                    .store(persisted.alerts_suppressed, Ordering::Relaxed);
                self.inference_errors
                    .store(persisted.inference_errors, Ordering::Relaxed);
            }
        }
        Ok(())
    }

    /// Reset all counters, including the persisted totals on the next save.
    pub fn reset(&self) {
        for counter in [
            &self.messages_received,
            &self.messages_rejected,
            &self.fields_defaulted,
            &self.samples_ingested,
            &self.inferences,
            &self.falls_classified,
            &self.alerts_fired,
            &self.alerts_suppressed,
            &self.inference_errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        self.defaulted_reported.store(false, Ordering::Relaxed);
    }
}

impl Default for StatsLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone)]
pub struct SessionStats {
    pub messages_received: u64,
    pub messages_rejected: u64,
    pub fields_defaulted: u64,
    pub samples_ingested: u64,
    pub inferences: u64,
    pub falls_classified: u64,
    pub alerts_fired: u64,
    pub alerts_suppressed: u64,
    pub inference_errors: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedStats {
    messages_received: u64,
    messages_rejected: u64,
    #[serde(default)]
    fields_defaulted: u64,
    samples_ingested: u64,
    inferences: u64,
    falls_classified: u64,
    alerts_fired: u64,
    alerts_suppressed: u64,
    #[serde(default)]
    inference_errors: u64,
    last_updated: DateTime<Utc>,
}

/// Thread-safe shared stats log.
pub type SharedStatsLog = Arc<StatsLog>;

/// Create a shared in-memory log.
pub fn create_shared_stats() -> SharedStatsLog {
    Arc::new(StatsLog::new())
}

/// Create a shared log persisted at `path`.
pub fn create_shared_stats_with_persistence(path: PathBuf) -> SharedStatsLog {
    Arc::new(StatsLog::with_persistence(path))
}
