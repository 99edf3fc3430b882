//! Demonstration of the Fallwatch pipeline on a synthetic stream.
//!
//! This example shows how to:
//! 1. Build a classifier artifact in memory
//! 2. Bind it to the fall class and check its feature schema
//! 3. Feed samples through the stream engine
//! 4. Observe classifications, alerts and cooldown suppression
//!
//! Run with: cargo run --example replay_demo

use fallwatch_agent::{
    config::Config,
    core::{
        classifier::Scaler, Clock, FallClassifier, LinearModel, StreamEngine, FEATURE_COUNT,
        FEATURE_NAMES,
    },
    stats::create_shared_stats,
    StreamHandler,
};

const G: f64 = 9.80665;

fn main() {
    println!("Fallwatch - Replay Demo");
    println!("=======================");
    println!();

    let log_dir = std::env::temp_dir().join("fallwatch-demo");
    let mut config = Config::default();
    config.logging.dir = log_dir.clone();
    config.logic.alert_cooldown_seconds = 3.0;

    // Free-fall dips push towards Fall, impacts add a little more evidence.
    let mut coefficients = vec![0.0; FEATURE_COUNT];
    coefficients[25] = 1.0;
    coefficients[26] = 4.0;
    let model = LinearModel {
        classes: vec!["Fall".to_string(), "Normal".to_string()],
        feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        scaler: Scaler {
            mean: vec![0.0; FEATURE_COUNT],
            scale: vec![1.0; FEATURE_COUNT],
        },
        // classes[1] is Normal, so evidence for a fall lowers the decision value
        coefficients: coefficients.iter().map(|c| -c).collect(),
        intercept: 3.0,
    };

    let classifier = match FallClassifier::new(model) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Classifier rejected: {e}");
            return;
        }
    };

    let stats = create_shared_stats();
    let mut engine = match StreamEngine::new(&config, classifier, stats.clone()) {
        Ok(engine) => engine.with_clock(Clock::Sample),
        Err(e) => {
            eprintln!("Could not start engine: {e}");
            return;
        }
    };

    println!(
        "Streaming 12 s at {} Hz (window {} samples, step {} samples)",
        config.stream.sample_rate_hz,
        config.stream.win_len(),
        config.stream.step_len()
    );
    println!("Falls are simulated at t=3s, t=4s and t=9s");
    println!();

    let start = chrono::Utc::now().timestamp() as f64;
    let rate = config.stream.sample_rate_hz;
    let falls = [3.0, 4.0, 9.0];
    for i in 0..(12.0 * rate) as usize {
        let t = i as f64 / rate;
        let (ax, az) = if in_burst(t, &falls, 0.0, 0.12) {
            (0.5, 0.1 * G) // free fall
        } else if in_burst(t, &falls, 0.12, 0.2) {
            (4.0, 2.2 * G) // impact
        } else {
            (0.05 * (t * 7.0).sin(), G + 0.1 * (t * 3.0).cos())
        };

        let message = format!(
            "{{\"ts\": {}, \"ax\": {ax}, \"ay\": 0.0, \"az\": {az}}}",
            start + t
        );
        if let Err(e) = engine.handle_message(message.as_bytes()) {
            eprintln!("Inference failed: {e}");
        }
    }

    println!();
    println!("{}", stats.summary());
    println!();
    println!("Alerts appended to {:?}", engine.logger().path());
}

/// Whether `t` lies in `[s + from, s + to)` for any start `s`.
fn in_burst(t: f64, starts: &[f64], from: f64, to: f64) -> bool {
    starts.iter().any(|s| t >= s + from && t < s + to)
}
