//! Accelerometer sample type and inbound message parsing.

use crate::config::MissingFieldPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

/// A single tri-axis accelerometer reading.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Sender-side timestamp in seconds
    pub timestamp: f64,
    pub ax: f64,
    pub ay: f64,
    pub az: f64,
    /// Whether any field was missing and replaced by 0.0
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub defaulted: bool,
}

impl Sample {
    pub fn new(timestamp: f64, ax: f64, ay: f64, az: f64) -> Self {
        Self {
            timestamp,
            ax,
            ay,
            az,
            defaulted: false,
        }
    }

    /// Euclidean norm of the three axes.
    pub fn magnitude(&self) -> f64 {
        (self.ax * self.ax + self.ay * self.ay + self.az * self.az).sqrt()
    }

    /// Parse an inbound `{ts, ax, ay, az}` JSON message.
    ///
    /// Payloads that are not a JSON object, or whose fields hold non-numeric
    /// values, are always rejected. Absent (or `null`) fields are handled
    /// according to `policy`.
    pub fn from_json(payload: &[u8], policy: MissingFieldPolicy) -> Result<Self, MessageError> {
        let value: Value =
            serde_json::from_slice(payload).map_err(|e| MessageError::Malformed(e.to_string()))?;
        let object = value
            .as_object()
            .ok_or_else(|| MessageError::Malformed("expected a JSON object".to_string()))?;

        let mut defaulted = false;
        let mut field = |name: &'static str| -> Result<f64, MessageError> {
            match read_number(object, name)? {
                Some(v) => Ok(v),
                None => match policy {
                    MissingFieldPolicy::Default => {
                        defaulted = true;
                        Ok(0.0)
                    }
                    MissingFieldPolicy::Reject => Err(MessageError::MissingField(name)),
                },
            }
        };

        let timestamp = field("ts")?;
        let ax = field("ax")?;
        let ay = field("ay")?;
        let az = field("az")?;

        Ok(Self {
            timestamp,
            ax,
            ay,
            az,
            defaulted,
        })
    }
}

fn read_number(object: &Map<String, Value>, name: &'static str) -> Result<Option<f64>, MessageError> {
    match object.get(name) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| MessageError::Malformed(format!("field '{name}' is not a number"))),
    }
}

/// Reasons an inbound message is dropped before reaching the window.
#[derive(Debug, Error)]
pub enum MessageError {
    #[error("malformed message: {0}")]
    Malformed(String),
    #[error("message is missing field '{0}'")]
    MissingField(&'static str),
}
