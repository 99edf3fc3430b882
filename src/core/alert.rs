//! Alert gating and persistence.
//!
//! The gate turns a stream of labels into alert decisions, suppressing
//! repeats for a cooldown period after every fired alert. Fired alerts are
//! appended to a plain-text log, one `<unix-seconds>,fall` line each.

use crate::core::classifier::Label;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File name of the alert log inside the log directory.
pub const ALERT_LOG_FILE: &str = "alerts.log";

/// Gate state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GateState {
    Idle,
    /// An alert fired at `since` and further alerts are held back
    Cooldown { since: f64 },
}

/// Result of evaluating one classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertDecision {
    /// Alert emitted
    Fired,
    /// Fall seen while cooling down
    Suppressed,
    /// Nothing to alert on
    None,
}

/// Cooldown state machine for fall alerts.
#[derive(Debug, Clone)]
pub struct AlertGate {
    cooldown_seconds: f64,
    state: GateState,
}

impl AlertGate {
    /// Create an idle gate with the given cooldown.
    pub fn new(cooldown_seconds: f64) -> Self {
        Self {
            cooldown_seconds,
            state: GateState::Idle,
        }
    }

    /// Evaluate `label` observed at `now` (seconds).
    pub fn evaluate(&mut self, label: Label, now: f64) -> AlertDecision {
        if let GateState::Cooldown { since } = self.state {
            if now - since > self.cooldown_seconds {
                self.state = GateState::Idle;
            } else if label == Label::Fall {
                return AlertDecision::Suppressed;
            } else {
                return AlertDecision::None;
            }
        }

        match label {
            Label::Fall => {
                self.state = GateState::Cooldown { since: now };
                AlertDecision::Fired
            }
            Label::Normal => AlertDecision::None,
        }
    }

    /// Current gate state.
    pub fn state(&self) -> GateState {
        self.state
    }

    /// Time of the last fired alert, or negative infinity before the first.
    pub fn last_alert(&self) -> f64 {
        match self.state {
            GateState::Cooldown { since } => since,
            GateState::Idle => f64::NEG_INFINITY,
        }
    }

    /// Configured cooldown in seconds.
    pub fn cooldown_seconds(&self) -> f64 {
        self.cooldown_seconds
    }
}

/// Append-only alert log.
#[derive(Debug, Clone)]
pub struct AlertLogger {
    dir: PathBuf,
}

impl AlertLogger {
    /// Logger writing `alerts.log` under `dir`.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Full path of the alert log file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(ALERT_LOG_FILE)
    }

    /// Append one alert line, creating the directory if needed.
    pub fn append(&self, timestamp_secs: i64) -> Result<(), AlertLogError> {
        std::fs::create_dir_all(&self.dir).map_err(|source| AlertLogError::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let path = self.path();
        let write = |path: &Path| -> std::io::Result<()> {
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{timestamp_secs},fall")?;
            file.flush()
        };
        write(&path).map_err(|source| AlertLogError::Write { path, source })
    }

    /// Timestamps of all recorded alerts, oldest first.
    pub fn read_alerts(&self) -> Result<Vec<i64>, AlertLogError> {
        let path = self.path();
        let content = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => return Err(AlertLogError::Read { path, source }),
        };

        Ok(content
            .lines()
            .filter_map(|line| line.split(',').next()?.trim().parse().ok())
            .collect())
    }
}

#[derive(Debug, Error)]
pub enum AlertLogError {
    #[error("could not create alert log directory {path:?}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not write alert log {path:?}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("could not read alert log {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
}
