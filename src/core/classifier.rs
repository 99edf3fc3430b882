//! Fall classification over feature vectors.
//!
//! A [`ClassifierPort`] is any trained model that maps a [`FeatureVector`] to
//! probabilities aligned with its class labels. [`FallClassifier`] binds a port
//! at startup, checking that it knows the `Fall` class and was trained on the
//! same feature schema, and reduces its output to a [`ClassificationResult`].

use crate::core::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use thiserror::Error;

/// Class label the alerting logic keys on.
pub const FALL_CLASS: &str = "Fall";

/// Probability at or above which a window is labelled a fall.
pub const FALL_THRESHOLD: f64 = 0.5;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid classifier artifact: {0}")]
    InvalidArtifact(String),

    #[error("Classifier has no 'Fall' class (classes: {0:?})")]
    MissingFallClass(Vec<String>),

    #[error("Feature schema mismatch: model expects {expected:?}, extractor produces {actual:?}")]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Invalid classifier output: {0}")]
    InvalidOutput(String),
}

/// Externally trained classifier.
pub trait ClassifierPort {
    /// Class labels, in the order probabilities are returned.
    fn class_labels(&self) -> &[String];

    /// Feature columns the model was trained on, if the artifact records them.
    fn feature_names(&self) -> Option<&[String]> {
        None
    }

    /// Per-class probabilities aligned with [`ClassifierPort::class_labels`].
    fn predict_proba(&mut self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError>;
}

impl<C: ClassifierPort + ?Sized> ClassifierPort for Box<C> {
    fn class_labels(&self) -> &[String] {
        (**self).class_labels()
    }

    fn feature_names(&self) -> Option<&[String]> {
        (**self).feature_names()
    }

    fn predict_proba(&mut self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        (**self).predict_proba(features)
    }
}

/// Outcome label of one inference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Label {
    Normal,
    Fall,
}

impl Label {
    pub fn from_probability(p: f64) -> Self {
        if p >= FALL_THRESHOLD {
            Label::Fall
        } else {
            Label::Normal
        }
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Normal => write!(f, "Normal"),
            Label::Fall => write!(f, "FALL"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub label: Label,
    /// The model's probability for the `Fall` class
    pub probability: f64,
}

/// A classifier port bound to the fall class.
pub struct FallClassifier<C> {
    port: C,
    fall_index: usize,
}

impl<C: ClassifierPort> FallClassifier<C> {
    /// Bind `port`, failing if it lacks the `Fall` class or its feature
    /// schema differs from the extractor's.
    pub fn new(port: C) -> Result<Self, ClassifierError> {
        let labels = port.class_labels();
        let fall_index = labels
            .iter()
            .position(|label| label == FALL_CLASS)
            .ok_or_else(|| ClassifierError::MissingFallClass(labels.to_vec()))?;

        if let Some(names) = port.feature_names() {
            check_schema(names)?;
        } else {
            tracing::warn!("Classifier does not record its feature schema; skipping schema check");
        }

        tracing::debug!(classes = ?labels, fall_index, "Classifier bound");
        Ok(Self { port, fall_index })
    }

    pub fn classify(&mut self, features: &FeatureVector) -> Result<ClassificationResult, ClassifierError> {
        let proba = self.port.predict_proba(features)?;
        let classes = self.port.class_labels().len();
        if proba.len() != classes {
            return Err(ClassifierError::InvalidOutput(format!(
                "expected {classes} probabilities, got {}",
                proba.len()
            )));
        }

        let probability = proba[self.fall_index];
        if !(0.0..=1.0).contains(&probability) {
            return Err(ClassifierError::InvalidOutput(format!(
                "fall probability {probability} outside [0, 1]"
            )));
        }

        Ok(ClassificationResult {
            label: Label::from_probability(probability),
            probability,
        })
    }

    pub fn class_labels(&self) -> &[String] {
        self.port.class_labels()
    }
}

fn check_schema(names: &[String]) -> Result<(), ClassifierError> {
    let matches = names.len() == FEATURE_COUNT
        && names.iter().zip(FEATURE_NAMES.iter()).all(|(a, b)| a == b);
    if matches {
        Ok(())
    } else {
        Err(ClassifierError::SchemaMismatch {
            expected: names.to_vec(),
            actual: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
        })
    }
}

/// Standardization applied before the linear model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scaler {
    pub mean: Vec<f64>,
    pub scale: Vec<f64>,
}

/// Standardized binary logistic model, stored as JSON.
///
/// The probability of `classes[1]` is `sigmoid(w · z + b)` with
/// `z = (x - mean) / scale`; `classes[0]` gets the complement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinearModel {
    pub classes: Vec<String>,
    pub feature_names: Vec<String>,
    pub scaler: Scaler,
    pub coefficients: Vec<f64>,
    pub intercept: f64,
}

impl LinearModel {
    /// Load and validate a model artifact.
    pub fn load(path: &Path) -> Result<Self, ClassifierError> {
        let content = std::fs::read_to_string(path)?;
        let model: LinearModel = serde_json::from_str(&content)?;
        model.validate()?;
        tracing::info!(path = %path.display(), classes = ?model.classes, "Loaded classifier artifact");
        Ok(model)
    }

    fn validate(&self) -> Result<(), ClassifierError> {
        if self.classes.len() != 2 {
            return Err(ClassifierError::InvalidArtifact(format!(
                "expected 2 classes, found {}",
                self.classes.len()
            )));
        }
        let n = self.feature_names.len();
        for (what, len) in [
            ("scaler.mean", self.scaler.mean.len()),
            ("scaler.scale", self.scaler.scale.len()),
            ("coefficients", self.coefficients.len()),
        ] {
            if len != n {
                return Err(ClassifierError::InvalidArtifact(format!(
                    "{what} has {len} entries, feature_names has {n}"
                )));
            }
        }
        Ok(())
    }

    fn decision(&self, x: &[f64]) -> f64 {
        let terms = x
            .iter()
            .zip(&self.coefficients)
            .zip(self.scaler.mean.iter().zip(&self.scaler.scale));
        terms.fold(self.intercept, |z, ((&value, &weight), (&mean, &scale))| {
            let scale = if scale == 0.0 { 1.0 } else { scale };
            z + weight * (value - mean) / scale
        })
    }
}

impl ClassifierPort for LinearModel {
    fn class_labels(&self) -> &[String] {
        &self.classes
    }

    fn feature_names(&self) -> Option<&[String]> {
        Some(&self.feature_names)
    }

    fn predict_proba(&mut self, features: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
        // Models built in memory skip `load`
        self.validate()?;
        let x = features.values();
        if x.len() != self.coefficients.len() {
            return Err(ClassifierError::InvalidOutput(format!(
                "model takes {} features, got {}",
                self.coefficients.len(),
                x.len()
            )));
        }
        let z = self.decision(&x);
        if !z.is_finite() {
            return Err(ClassifierError::InvalidOutput(format!("decision value {z}")));
        }
        let p = 1.0 / (1.0 + (-z).exp());
        Ok(vec![1.0 - p, p])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Vec<String> {
        FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
    }

    /// Logistic model that keys on the dip count only.
    fn dip_model() -> LinearModel {
        let mut coefficients = vec![0.0; FEATURE_COUNT];
        coefficients[26] = 4.0;
        LinearModel {
            classes: vec!["Fall".to_string(), "Normal".to_string()],
            feature_names: schema(),
            scaler: Scaler {
                mean: vec![0.0; FEATURE_COUNT],
                scale: vec![1.0; FEATURE_COUNT],
            },
            // Negated so that dips push towards classes[0] = Fall
            coefficients: coefficients.iter().map(|c| -c).collect(),
            intercept: 2.0,
        }
    }

    struct Fixed {
        labels: Vec<String>,
        proba: Vec<f64>,
    }

    impl ClassifierPort for Fixed {
        fn class_labels(&self) -> &[String] {
            &self.labels
        }

        fn predict_proba(&mut self, _: &FeatureVector) -> Result<Vec<f64>, ClassifierError> {
            Ok(self.proba.clone())
        }
    }

    #[test]
    fn test_label_threshold() {
        assert_eq!(Label::from_probability(0.5), Label::Fall);
        assert_eq!(Label::from_probability(0.4999), Label::Normal);
        assert_eq!(Label::Fall.to_string(), "FALL");
        assert_eq!(Label::Normal.to_string(), "Normal");
    }

    #[test]
    fn test_missing_fall_class_is_fatal() {
        let port = Fixed {
            labels: vec!["fall".to_string(), "Normal".to_string()],
            proba: vec![0.5, 0.5],
        };
        assert!(matches!(
            FallClassifier::new(port),
            Err(ClassifierError::MissingFallClass(_))
        ));
    }

    #[test]
    fn test_schema_mismatch_is_fatal() {
        let mut model = dip_model();
        model.feature_names.swap(0, 1);
        assert!(matches!(
            FallClassifier::new(model),
            Err(ClassifierError::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_reads_fall_probability_by_label() {
        let port = Fixed {
            labels: vec!["Normal".to_string(), "Fall".to_string()],
            proba: vec![0.3, 0.7],
        };
        let mut classifier = FallClassifier::new(port).unwrap();
        let result = classifier.classify(&FeatureVector::default()).unwrap();
        assert_eq!(result.label, Label::Fall);
        assert!((result.probability - 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_out_of_range_output_rejected() {
        let port = Fixed {
            labels: vec!["Fall".to_string(), "Normal".to_string()],
            proba: vec![1.2, -0.2],
        };
        let mut classifier = FallClassifier::new(port).unwrap();
        assert!(matches!(
            classifier.classify(&FeatureVector::default()),
            Err(ClassifierError::InvalidOutput(_))
        ));

        let port = Fixed {
            labels: vec!["Fall".to_string(), "Normal".to_string()],
            proba: vec![0.9],
        };
        let mut classifier = FallClassifier::new(port).unwrap();
        assert!(classifier.classify(&FeatureVector::default()).is_err());
    }

    #[test]
    fn test_linear_model_probabilities() {
        let mut classifier = FallClassifier::new(dip_model()).unwrap();

        let quiet = FeatureVector::default();
        let result = classifier.classify(&quiet).unwrap();
        // z = 2 -> p(Normal) = sigmoid(2)
        assert_eq!(result.label, Label::Normal);
        assert!((result.probability - (1.0 - 1.0 / (1.0 + (-2.0f64).exp()))).abs() < 1e-12);

        let falling = FeatureVector {
            count_dips: 3,
            ..FeatureVector::default()
        };
        let result = classifier.classify(&falling).unwrap();
        assert_eq!(result.label, Label::Fall);
        assert!(result.probability > 0.99);
    }

    #[test]
    fn test_zero_scale_treated_as_unit() {
        let mut model = dip_model();
        model.scaler.scale = vec![0.0; FEATURE_COUNT];
        let features = FeatureVector {
            count_dips: 1,
            ..FeatureVector::default()
        };
        let proba = model.predict_proba(&features).unwrap();
        assert!(proba.iter().all(|p| p.is_finite()));
        assert!((proba[0] + proba[1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_scaler_is_an_error_not_a_panic() {
        let mut model = dip_model();
        model.scaler.mean.truncate(3);
        model.scaler.scale.truncate(3);

        let mut classifier = FallClassifier::new(model).unwrap();
        assert!(matches!(
            classifier.classify(&FeatureVector::default()),
            Err(ClassifierError::InvalidArtifact(_))
        ));
    }

    #[test]
    fn test_load_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        std::fs::write(&path, serde_json::to_string(&dip_model()).unwrap()).unwrap();

        let model = LinearModel::load(&path).unwrap();
        assert_eq!(model.classes, vec!["Fall", "Normal"]);
        assert_eq!(model.feature_names.len(), FEATURE_COUNT);
    }

    #[test]
    fn test_load_rejects_inconsistent_artifact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("model.json");
        let mut model = dip_model();
        model.coefficients.pop();
        std::fs::write(&path, serde_json::to_string(&model).unwrap()).unwrap();

        assert!(matches!(
            LinearModel::load(&path),
            Err(ClassifierError::InvalidArtifact(_))
        ));
    }
}
