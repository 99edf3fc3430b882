//! Feature datasets from recorded sample streams.
//!
//! Recordings use the same JSON-lines format as the live feed. Windows are cut
//! with the live window and step lengths and run through the live extractor,
//! so exported rows carry exactly the columns a deployed model receives.

use crate::config::MissingFieldPolicy;
use crate::core::features::{extract, FEATURE_NAMES};
use crate::core::windowing::sliding_windows;
use crate::transport::types::{MessageError, Sample};
use std::io::{BufRead, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatasetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("line {line}: {source}")]
    Message { line: usize, source: MessageError },
}

/// Parse every non-blank line of a recording.
pub fn read_recording<R: BufRead>(
    reader: R,
    policy: MissingFieldPolicy,
) -> Result<Vec<Sample>, DatasetError> {
    let mut samples = Vec::new();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample = Sample::from_json(line.trim().as_bytes(), policy)
            .map_err(|source| DatasetError::Message {
                line: index + 1,
                source,
            })?;
        samples.push(sample);
    }
    Ok(samples)
}

/// Write one CSV row per full window; returns the number of rows.
pub fn write_feature_csv<W: Write>(
    samples: &[Sample],
    win_len: usize,
    step_len: usize,
    label: Option<&str>,
    out: W,
) -> Result<usize, DatasetError> {
    let mut writer = csv::Writer::from_writer(out);

    let mut header: Vec<&str> = FEATURE_NAMES.to_vec();
    if label.is_some() {
        header.push("label");
    }
    writer.write_record(&header)?;

    let mut rows = 0;
    for (start, end) in sliding_windows(samples.len(), win_len, step_len) {
        let Some(features) = extract(&samples[start..end]) else {
            continue;
        };
        let mut record: Vec<String> = features.values().iter().map(f64::to_string).collect();
        if let Some(label) = label {
            record.push(label.to_string());
        }
        writer.write_record(&record)?;
        rows += 1;
    }

    writer.flush()?;
    Ok(rows)
}
