//! Per-sample streaming pipeline.
//!
//! One [`StreamEngine`] owns everything a single sensor stream needs: the
//! sample window, the running sample count, the bound classifier and the
//! alert gate. Each inbound sample is processed to completion before the
//! next one is accepted.

use crate::config::{Config, MissingFieldPolicy};
use crate::core::alert::{AlertDecision, AlertGate, AlertLogError, AlertLogger};
use crate::core::classifier::{ClassifierError, ClassifierPort, FallClassifier, Label};
use crate::core::features::extract;
use crate::core::windowing::{StrideScheduler, WindowBuffer, WindowError};
use crate::stats::SharedStatsLog;
use crate::transport::types::{MessageError, Sample};
use crate::transport::StreamHandler;
use chrono::{DateTime, Local, Utc};
use std::io::{Stdout, Write};
use thiserror::Error;

/// Console line printed when an alert fires.
pub const ALERT_BANNER: &str = "*** ALERT: Possible fall detected!";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Window(#[from] WindowError),

    #[error("rejected message: {0}")]
    Message(#[from] MessageError),

    #[error("classification failed: {0}")]
    Classifier(#[from] ClassifierError),

    #[error("alert was raised but not recorded: {0}")]
    AlertLog(#[from] AlertLogError),

    #[error("console output failed: {0}")]
    Console(#[from] std::io::Error),
}

/// Source of the "current time" used for gating and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Clock {
    /// Wall-clock time at processing, for live streams
    #[default]
    Wall,
    /// The sample's own timestamp, for replaying recordings
    Sample,
}

impl Clock {
    pub fn now(&self, sample: &Sample) -> DateTime<Utc> {
        match self {
            Clock::Wall => Utc::now(),
            Clock::Sample => from_epoch_secs(sample.timestamp),
        }
    }
}

fn from_epoch_secs(secs: f64) -> DateTime<Utc> {
    if !secs.is_finite() {
        return DateTime::<Utc>::default();
    }
    let whole = secs.floor();
    let nanos = (((secs - whole) * 1e9) as u32).min(999_999_999);
    DateTime::<Utc>::from_timestamp(whole as i64, nanos).unwrap_or_default()
}

fn epoch_secs(at: DateTime<Utc>) -> f64 {
    at.timestamp() as f64 + f64::from(at.timestamp_subsec_nanos()) * 1e-9
}

/// Outcome of one completed inference.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceReport {
    pub at: DateTime<Utc>,
    pub label: Label,
    pub probability: f64,
    pub alert: AlertDecision,
}

impl InferenceReport {
    /// The per-inference console line, `[HH:MM:SS] <Normal|FALL> p=<p>`.
    pub fn console_line(&self) -> String {
        format!(
            "[{}] {} p={:.2}",
            self.at.with_timezone(&Local).format("%H:%M:%S"),
            self.label,
            self.probability
        )
    }
}

/// Streaming fall detector for a single sensor.
pub struct StreamEngine<C, W = Stdout> {
    window: WindowBuffer,
    scheduler: StrideScheduler,
    /// Samples ingested since the engine was created
    sample_count: u64,
    classifier: FallClassifier<C>,
    gate: AlertGate,
    logger: AlertLogger,
    policy: MissingFieldPolicy,
    clock: Clock,
    stats: SharedStatsLog,
    out: W,
}

impl<C: ClassifierPort> StreamEngine<C, Stdout> {
    /// Engine reporting to standard output.
    pub fn new(
        config: &Config,
        classifier: FallClassifier<C>,
        stats: SharedStatsLog,
    ) -> Result<Self, EngineError> {
        Self::with_output(config, classifier, stats, std::io::stdout())
    }
}

impl<C: ClassifierPort, W: Write> StreamEngine<C, W> {
    /// Engine reporting to `out`.
    pub fn with_output(
        config: &Config,
        classifier: FallClassifier<C>,
        stats: SharedStatsLog,
        out: W,
    ) -> Result<Self, EngineError> {
        let win_len = config.stream.win_len();
        let step_len = config.stream.step_len();

        Ok(Self {
            window: WindowBuffer::new(win_len)?,
            scheduler: StrideScheduler::new(win_len, step_len)?,
            sample_count: 0,
            classifier,
            gate: AlertGate::new(config.logic.alert_cooldown_seconds),
            logger: AlertLogger::new(&config.logging.dir),
            policy: config.stream.missing_fields,
            clock: Clock::Wall,
            stats,
            out,
        })
    }

    /// Use `clock` for cooldowns and reports.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    /// Run one sample through the pipeline.
    ///
    /// Returns the inference report when this sample completed a window.
    /// The classification line is written before gating, so an alert-log
    /// failure still leaves the classification reported.
    pub fn process_sample(
        &mut self,
        sample: Sample,
        now: DateTime<Utc>,
    ) -> Result<Option<InferenceReport>, EngineError> {
        self.window.push(sample);
        self.sample_count += 1;
        self.stats.record_sample();

        if !self.scheduler.should_infer(self.sample_count) {
            return Ok(None);
        }

        let Some(features) = extract(self.window.snapshot()) else {
            return Ok(None);
        };

        let result = self.classifier.classify(&features).map_err(|e| {
            self.stats.record_inference_error();
            e
        })?;
        self.stats.record_inference(result.label == Label::Fall);

        let mut report = InferenceReport {
            at: now,
            label: result.label,
            probability: result.probability,
            alert: AlertDecision::None,
        };
        writeln!(self.out, "{}", report.console_line())?;

        report.alert = self.gate.evaluate(result.label, epoch_secs(now));
        match report.alert {
            AlertDecision::Fired => {
                writeln!(self.out, "{ALERT_BANNER}")?;
                self.stats.record_alert_fired();
                tracing::warn!(
                    probability = result.probability,
                    at = %now.to_rfc3339(),
                    "Fall alert raised"
                );
                self.logger.append(now.timestamp())?;
            }
            AlertDecision::Suppressed => {
                self.stats.record_alert_suppressed();
                tracing::debug!(
                    probability = result.probability,
                    cooldown_secs = self.gate.cooldown_seconds(),
                    "Fall alert suppressed by cooldown"
                );
            }
            AlertDecision::None => {}
        }
        self.out.flush()?;

        Ok(Some(report))
    }

    /// Total samples ingested by this engine.
    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    pub fn gate(&self) -> &AlertGate {
        &self.gate
    }

    pub fn logger(&self) -> &AlertLogger {
        &self.logger
    }

    pub fn output(&self) -> &W {
        &self.out
    }

    pub fn stats(&self) -> &SharedStatsLog {
        &self.stats
    }
}

impl<C: ClassifierPort, W: Write> StreamHandler for StreamEngine<C, W> {
    type Error = EngineError;

    fn handle_connect(&mut self) {
        tracing::info!(
            win_len = self.scheduler.win_len(),
            step_len = self.scheduler.step_len(),
            "Stream connected"
        );
    }

    fn handle_message(&mut self, payload: &[u8]) -> Result<(), EngineError> {
        self.stats.record_message();

        let sample = Sample::from_json(payload, self.policy).map_err(|e| {
            self.stats.record_rejected();
            e
        })?;
        if sample.defaulted && self.stats.record_defaulted() {
            tracing::warn!(
                "Inbound message is missing fields; substituting 0.0 (further occurrences are only counted)"
            );
        }

        let now = self.clock.now(&sample);
        self.process_sample(sample, now)?;
        Ok(())
    }

    fn handle_disconnect(&mut self, reason: Option<&str>) {
        match reason {
            Some(reason) => tracing::warn!(reason, samples = self.sample_count, "Stream disconnected"),
            None => tracing::info!(samples = self.sample_count, "Stream ended"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::features::FeatureVector;
    use crate::stats::create_shared_stats;
    use std::collections::VecDeque;

    /// Classifier returning a scripted sequence of fall probabilities.
    struct Scripted {
        labels: Vec<String>,
        script: VecDeque<f64>,
    }

    impl Scripted {
        fn new(script: &[f64]) -> Self {
            Self {
                labels: vec!["Normal".to_string(), "Fall".to_string()],
                script: script.iter().copied().collect(),
            }
        }
    }

    impl ClassifierPort for Scripted {
        fn class_labels(&self) -> &[String] {
            &self.labels
        }

        fn predict_proba(&mut self, _: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
            let p = self
                .script
                .pop_front()
                .ok_or_else(|| ClassifierError::InvalidOutput("script exhausted".to_string()))?;
            Ok(vec![1.0 - p, p])
        }
    }

    fn config(dir: &std::path::Path, rate: f64, window: f64, step: f64, cooldown: f64) -> Config {
        let mut config = Config::default();
        config.stream.sample_rate_hz = rate;
        config.stream.window_seconds = window;
        config.stream.step_seconds = step;
        config.logic.alert_cooldown_seconds = cooldown;
        config.logging.dir = dir.join("logs");
        config
    }

    fn engine(config: &Config, script: &[f64]) -> StreamEngine<Scripted, Vec<u8>> {
        let classifier = FallClassifier::new(Scripted::new(script)).unwrap();
        StreamEngine::with_output(config, classifier, create_shared_stats(), Vec::new()).unwrap()
    }

    fn at(secs: f64) -> DateTime<Utc> {
        from_epoch_secs(secs)
    }

    #[test]
    fn test_scripted_cooldown_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let cooldown = 5.0;
        let config = config(dir.path(), 1.0, 1.0, 1.0, cooldown);
        let mut engine = engine(&config, &[0.9, 0.9, 0.1, 0.9]);

        let times = [0.0, 1.0, cooldown + 2.0, cooldown + 3.0];
        let decisions: Vec<AlertDecision> = times
            .iter()
            .map(|&t| {
                engine
                    .process_sample(Sample::new(t, 0.0, 0.0, 9.8), at(t))
                    .unwrap()
                    .unwrap()
                    .alert
            })
            .collect();

        assert_eq!(
            decisions,
            vec![
                AlertDecision::Fired,
                AlertDecision::Suppressed,
                AlertDecision::None,
                AlertDecision::Fired
            ]
        );
        assert_eq!(engine.logger().read_alerts().unwrap(), vec![0, 8]);
    }

    #[test]
    fn test_inference_waits_for_full_window_then_strides() {
        let dir = tempfile::tempdir().unwrap();
        // 10 Hz, 1 s window, 0.3 s step -> win_len 10, step_len 3
        let config = config(dir.path(), 10.0, 1.0, 0.3, 5.0);
        let mut engine = engine(&config, &[0.1; 16]);

        let mut inferred_at = Vec::new();
        for i in 0..25u64 {
            let report = engine
                .process_sample(Sample::new(i as f64, 0.0, 0.0, 9.8), at(i as f64))
                .unwrap();
            if report.is_some() {
                inferred_at.push(engine.sample_count());
            }
        }
        assert_eq!(inferred_at, vec![10, 13, 16, 19, 22, 25]);
        assert_eq!(engine.stats().stats().inferences, 6);
    }

    #[test]
    fn test_console_output() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 1.0, 1.0, 1.0, 5.0);
        let mut engine = engine(&config, &[0.25, 0.875]);

        engine.process_sample(Sample::new(0.0, 0.0, 0.0, 9.8), at(100.0)).unwrap();
        engine.process_sample(Sample::new(1.0, 0.0, 0.0, 9.8), at(101.0)).unwrap();

        let output = String::from_utf8(engine.output().clone()).unwrap();
        let lines: Vec<&str> = output.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with('['));
        assert!(lines[0].ends_with("] Normal p=0.25"));
        assert_eq!(lines[0].len(), "[00:00:00] Normal p=0.25".len());
        assert!(lines[1].ends_with("] FALL p=0.88"));
        assert_eq!(lines[2], ALERT_BANNER);
    }

    #[test]
    fn test_classifier_error_propagates() {
        let dir = tempfile::tempdir().unwrap();
        let config = config(dir.path(), 1.0, 1.0, 1.0, 5.0);
        let mut engine = engine(&config, &[]);

        let err = engine
            .process_sample(Sample::new(0.0, 0.0, 0.0, 9.8), at(0.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::Classifier(_)));
        assert_eq!(engine.stats().stats().inference_errors, 1);
        assert_eq!(engine.sample_count(), 1);
    }

    #[test]
    fn test_alert_log_failure_is_surfaced() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, "not a directory").unwrap();

        let mut config = config(dir.path(), 1.0, 1.0, 1.0, 5.0);
        config.logging.dir = blocker.join("logs");
        let mut engine = engine(&config, &[0.9]);

        let err = engine
            .process_sample(Sample::new(0.0, 0.0, 0.0, 9.8), at(0.0))
            .unwrap_err();
        assert!(matches!(err, EngineError::AlertLog(_)));

        // The classification was still reported
        let output = String::from_utf8(engine.output().clone()).unwrap();
        assert!(output.contains("FALL p=0.90"));
        assert_eq!(engine.stats().stats().alerts_fired, 1);
    }

    #[test]
    fn test_handle_message_counts_rejections() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config(dir.path(), 1.0, 2.0, 1.0, 5.0);
        config.stream.missing_fields = MissingFieldPolicy::Reject;
        let mut engine = engine(&config, &[0.1]);

        assert!(engine.handle_message(b"{oops").is_err());
        assert!(engine.handle_message(br#"{"ts": 1, "ax": 0, "ay": 0}"#).is_err());
        engine
            .handle_message(br#"{"ts": 1, "ax": 0, "ay": 0, "az": 9.8}"#)
            .unwrap();

        let stats = engine.stats().stats();
        assert_eq!(stats.messages_received, 3);
        assert_eq!(stats.messages_rejected, 2);
        assert_eq!(engine.sample_count(), 1);
    }

    #[test]
    fn test_sample_clock_uses_message_timestamp() {
        let sample = Sample::new(1_700_000_000.25, 0.0, 0.0, 0.0);
        let now = Clock::Sample.now(&sample);
        assert_eq!(now.timestamp(), 1_700_000_000);
        assert!((epoch_secs(now) - 1_700_000_000.25).abs() < 1e-6);
    }
}
