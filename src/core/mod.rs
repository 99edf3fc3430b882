//! Core functionality for the Fallwatch agent.
//!
//! This module contains:
//! - Sample windowing and stride scheduling
//! - Feature extraction from sample windows
//! - Classifier binding and fall labelling
//! - Alert gating and the alert log
//! - The per-stream engine tying them together
//! - Feature dataset export from recordings

pub mod alert;
pub mod classifier;
pub mod dataset;
pub mod engine;
pub mod features;
pub mod windowing;

// Re-export commonly used types
pub use alert::{AlertDecision, AlertGate, AlertLogError, AlertLogger, GateState};
pub use classifier::{
    ClassificationResult, ClassifierError, ClassifierPort, FallClassifier, Label, LinearModel,
};
pub use dataset::{read_recording, write_feature_csv, DatasetError};
pub use engine::{Clock, EngineError, InferenceReport, StreamEngine};
pub use features::{extract, FeatureVector, SeriesStats, FEATURE_COUNT, FEATURE_NAMES};
pub use windowing::{sliding_windows, StrideScheduler, WindowBuffer, WindowError};
