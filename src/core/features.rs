//! Feature computation from sample windows.
//!
//! Every window is reduced to the same 27-value vector: five statistics for
//! each of the ax, ay, az, magnitude and jerk series, followed by peak and dip
//! counts of the magnitude. The names and ordering in [`FEATURE_NAMES`] are
//! the column schema classifier artifacts are trained against.

use crate::transport::types::Sample;
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

/// Standard gravity in m/s².
pub const STANDARD_GRAVITY: f64 = 9.80665;

/// Magnitudes above this count as impact peaks.
pub const PEAK_THRESHOLD: f64 = 1.5 * STANDARD_GRAVITY;

/// Magnitudes below this count as free-fall dips.
pub const DIP_THRESHOLD: f64 = 0.5 * STANDARD_GRAVITY;

/// Number of entries in a feature vector.
pub const FEATURE_COUNT: usize = 27;

/// Column names, in vector order.
#[rustfmt::skip]
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "ax_mean", "ax_std", "ax_min", "ax_max", "ax_range",
    "ay_mean", "ay_std", "ay_min", "ay_max", "ay_range",
    "az_mean", "az_std", "az_min", "az_max", "az_range",
    "mag_mean", "mag_std", "mag_min", "mag_max", "mag_range",
    "jerk_mean", "jerk_std", "jerk_min", "jerk_max", "jerk_range",
    "count_peaks",
    "count_dips",
];

/// Summary statistics of one derived series.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub mean: f64,
    /// Population standard deviation
    pub std: f64,
    pub min: f64,
    pub max: f64,
    /// `max - min`
    pub range: f64,
}

impl SeriesStats {
    fn from_values(values: &[f64]) -> Self {
        let mean = values.mean();
        let std = values.population_std_dev();
        let min = Statistics::min(values);
        let max = Statistics::max(values);
        Self {
            mean,
            std,
            min,
            max,
            range: max - min,
        }
    }

    fn as_array(&self) -> [f64; 5] {
        [self.mean, self.std, self.min, self.max, self.range]
    }
}

/// All features computed for one window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub ax: SeriesStats,
    pub ay: SeriesStats,
    pub az: SeriesStats,
    pub mag: SeriesStats,
    pub jerk: SeriesStats,
    /// Samples with magnitude above 1.5 g
    pub count_peaks: u32,
    /// Samples with magnitude below 0.5 g
    pub count_dips: u32,
}

impl FeatureVector {
    /// Values in [`FEATURE_NAMES`] order.
    pub fn values(&self) -> [f64; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        for (i, series) in [self.ax, self.ay, self.az, self.mag, self.jerk]
            .iter()
            .enumerate()
        {
            out[i * 5..i * 5 + 5].copy_from_slice(&series.as_array());
        }
        out[25] = self.count_peaks as f64;
        out[26] = self.count_dips as f64;
        out
    }

    /// `(name, value)` pairs in schema order.
    pub fn named(&self) -> impl Iterator<Item = (&'static str, f64)> {
        FEATURE_NAMES.into_iter().zip(self.values())
    }

    /// Look up a single feature by column name.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.named().find(|(n, _)| *n == name).map(|(_, v)| v)
    }
}

/// Compute the feature vector of a window, oldest sample first.
///
/// Returns `None` for an empty window.
pub fn extract(window: &[Sample]) -> Option<FeatureVector> {
    if window.is_empty() {
        return None;
    }

    let ax: Vec<f64> = window.iter().map(|s| s.ax).collect();
    let ay: Vec<f64> = window.iter().map(|s| s.ay).collect();
    let az: Vec<f64> = window.iter().map(|s| s.az).collect();
    let mag: Vec<f64> = window.iter().map(Sample::magnitude).collect();
    let jerk = jerk_series(&mag);

    let count_peaks = mag.iter().filter(|&&m| m > PEAK_THRESHOLD).count() as u32;
    let count_dips = mag.iter().filter(|&&m| m < DIP_THRESHOLD).count() as u32;

    Some(FeatureVector {
        ax: SeriesStats::from_values(&ax),
        ay: SeriesStats::from_values(&ay),
        az: SeriesStats::from_values(&az),
        mag: SeriesStats::from_values(&mag),
        jerk: SeriesStats::from_values(&jerk),
        count_peaks,
        count_dips,
    })
}

/// First difference of the magnitude; the first sample is its own predecessor.
fn jerk_series(mag: &[f64]) -> Vec<f64> {
    let mut jerk = Vec::with_capacity(mag.len());
    if !mag.is_empty() {
        jerk.push(0.0);
    }
    jerk.extend(mag.windows(2).map(|pair| pair[1] - pair[0]));
    jerk
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn still_window(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(i as f64 * 0.04, 0.0, 0.0, STANDARD_GRAVITY))
            .collect()
    }

    #[test]
    fn test_schema_shape() {
        assert_eq!(FEATURE_NAMES.len(), 27);
        let features = extract(&still_window(3)).unwrap();
        assert_eq!(features.values().len(), 27);
        assert_eq!(features.named().count(), 27);
        assert_eq!(FEATURE_NAMES[0], "ax_mean");
        assert_eq!(FEATURE_NAMES[24], "jerk_range");
        assert_eq!(FEATURE_NAMES[26], "count_dips");
    }

    #[test]
    fn test_constant_window() {
        let features = extract(&still_window(25)).unwrap();

        assert!((features.mag.mean - STANDARD_GRAVITY).abs() < EPS);
        assert!((features.mag.min - STANDARD_GRAVITY).abs() < EPS);
        assert_eq!(features.jerk, SeriesStats::default());
        for series in [features.ax, features.ay, features.az, features.mag] {
            assert!(series.std.abs() < EPS);
            assert_eq!(series.range, 0.0);
        }
        assert_eq!(features.count_peaks, 0);
        assert_eq!(features.count_dips, 0);
    }

    #[test]
    fn test_single_sample_window() {
        let window = [Sample::new(0.0, 1.0, -2.0, 3.0)];
        let features = extract(&window).unwrap();

        assert_eq!(features.ax.mean, 1.0);
        assert_eq!(features.ay.min, -2.0);
        for series in [features.ax, features.ay, features.az, features.mag, features.jerk] {
            assert_eq!(series.std, 0.0);
            assert_eq!(series.range, 0.0);
        }
        assert_eq!(features.jerk.max, 0.0);
    }

    #[test]
    fn test_empty_window_has_no_features() {
        assert!(extract(&[]).is_none());
    }

    #[test]
    fn test_population_std_and_jerk() {
        // Magnitudes 1, 3, 3, 7 along a single axis
        let window: Vec<Sample> = [1.0, 3.0, 3.0, 7.0]
            .iter()
            .map(|&x| Sample::new(0.0, x, 0.0, 0.0))
            .collect();
        let features = extract(&window).unwrap();

        assert!((features.ax.mean - 3.5).abs() < EPS);
        // Population variance: (6.25 + 0.25 + 0.25 + 12.25) / 4 = 4.75
        assert!((features.ax.std - 4.75f64.sqrt()).abs() < EPS);
        assert_eq!(features.ax.range, 6.0);

        // Jerk series 0, 2, 0, 4
        assert!((features.jerk.mean - 1.5).abs() < EPS);
        assert_eq!(features.jerk.min, 0.0);
        assert_eq!(features.jerk.max, 4.0);
    }

    #[test]
    fn test_peaks_and_dips() {
        let mut window = still_window(10);
        window[3].az = 2.0 * STANDARD_GRAVITY; // impact
        window[4].az = 0.1 * STANDARD_GRAVITY; // free fall
        window[5].az = 0.2 * STANDARD_GRAVITY; // free fall
        window[6].az = 1.4 * STANDARD_GRAVITY;

        let features = extract(&window).unwrap();
        assert_eq!(features.count_peaks, 1);
        assert_eq!(features.count_dips, 2);
        assert_eq!(features.get("count_peaks"), Some(1.0));
        assert_eq!(features.get("count_dips"), Some(2.0));
    }

    #[test]
    fn test_extract_is_deterministic() {
        let window: Vec<Sample> = (0..25)
            .map(|i| {
                let t = i as f64;
                Sample::new(t, (t * 0.7).sin(), (t * 1.3).cos(), 9.8 + (t * 0.2).sin())
            })
            .collect();
        let a = extract(&window).unwrap();
        let b = extract(&window.clone()).unwrap();
        assert_eq!(a.values(), b.values());
    }

    #[test]
    fn test_get_unknown_name() {
        let features = extract(&still_window(2)).unwrap();
        assert_eq!(features.get("mag_mean"), Some(features.mag.mean));
        assert_eq!(features.get("gyro_mean"), None);
    }
}
