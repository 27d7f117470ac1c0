use serde::Serialize;

use crate::waveform::{AnalysisError, DecodedWaveform, ScaleFactors};

/// One channel's samples in volts.
#[derive(Clone, Debug, Serialize)]
pub struct VoltageSeries {
    pub samples: Vec<f64>,
    pub min: f64,
    pub max: f64,
    /// Seconds between samples as reported by the scope.
    pub x_increment: f64,
}

impl VoltageSeries {
    /// Build a series from samples already in volts.
    pub fn from_volts(samples: Vec<f64>, x_increment: f64) -> Result<Self, AnalysisError> {
        if samples.is_empty() {
            return Err(AnalysisError::EmptyWaveform);
        }
        let (min, max) = samples
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
                (lo.min(v), hi.max(v))
            });
        Ok(Self {
            samples,
            min,
            max,
            x_increment,
        })
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn peak_to_peak(&self) -> f64 {
        self.max - self.min
    }

    /// Sample-indexed time axis, shared by every channel of one acquisition.
    pub fn time_axis(&self) -> impl Iterator<Item = f64> + '_ {
        (0..self.samples.len()).map(|i| i as f64)
    }

    pub fn duration_seconds(&self) -> f64 {
        self.samples.len() as f64 * self.x_increment
    }
}

/// Map raw 8-bit counts to volts: `(s - y_offset) * y_mult + y_zero`.
pub fn to_volts(sample_bytes: &[u8], scale: &ScaleFactors) -> Result<VoltageSeries, AnalysisError> {
    let samples = sample_bytes
        .iter()
        .map(|&s| (f64::from(s) - scale.y_offset) * scale.y_mult + scale.y_zero)
        .collect();
    VoltageSeries::from_volts(samples, scale.x_increment)
}

pub fn convert(decoded: &DecodedWaveform, scale: &ScaleFactors) -> Result<VoltageSeries, AnalysisError> {
    to_volts(&decoded.sample_bytes, scale)
}
