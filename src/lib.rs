//! Fallwatch - streaming fall detection from accelerometer samples.
//!
//! Samples arrive one message at a time over a pub/sub transport. Each
//! sample is pushed into a sliding window; whenever the stride scheduler
//! says a window is due, a fixed 27-value feature vector is extracted and
//! handed to an externally trained classifier. Fall classifications pass
//! through a cooldown gate before an alert is raised and logged.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Fallwatch Agent                         │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Transport  │──▶│  Windowing  │──▶│  Features   │       │
//! │  │ (MQTT/file) │   │  (stride)   │   │ (27 stats)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │                                              │              │
//! │                                              ▼              │
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Alert Log  │◀──│ Alert Gate  │◀──│ Classifier  │       │
//! │  │ (append)    │   │ (cooldown)  │   │ (artifact)  │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use fallwatch_agent::{config::Config, core, stats, transport};
//! use std::sync::atomic::AtomicBool;
//! use transport::Transport;
//!
//! let config = Config::load(&Config::default_path()).expect("config");
//! let model = core::LinearModel::load(&config.model.path).expect("model");
//! let classifier = core::FallClassifier::new(model).expect("classifier");
//! let mut engine =
//!     core::StreamEngine::new(&config, classifier, stats::create_shared_stats()).expect("engine");
//!
//! let receiver = transport::ReplayTransport::stdin(config.transport.queue_capacity)
//!     .start()
//!     .expect("transport");
//! transport::drive(&receiver, &mut engine, &AtomicBool::new(true));
//! ```

pub mod config;
pub mod core;
pub mod stats;
pub mod transport;

// Re-export key types at crate root for convenience
pub use config::{Config, MissingFieldPolicy};
pub use core::{
    extract, AlertDecision, AlertGate, AlertLogger, Clock, FallClassifier, FeatureVector, Label,
    LinearModel, StreamEngine, StrideScheduler, WindowBuffer, FEATURE_NAMES,
};
pub use stats::{SharedStatsLog, StatsLog};
pub use transport::{drive, Sample, StreamHandler, Transport, TransportEvent};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
