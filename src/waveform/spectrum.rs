use rustfft::{num_complex::Complex64, FftPlanner};
use serde::Serialize;

use crate::waveform::{AnalysisError, VoltageSeries};

/// Fundamental of a channel pair and the phase of the second relative to the first.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SpectralResult {
    pub dominant_frequency_hz: f64,
    /// In `[0, 360)`.
    pub phase_shift_deg: f64,
    pub bin_index: usize,
    pub bin_resolution_hz: f64,
}

/// Computes dominant frequency and inter-channel phase at a fixed sample rate.
pub struct SpectralAnalyzer {
    sample_rate_hz: f64,
}

impl SpectralAnalyzer {
    pub fn with_sample_rate(sample_rate_hz: f64) -> Result<Self, AnalysisError> {
        if !(sample_rate_hz > 0.0) {
            return Err(AnalysisError::InvalidSampleRate);
        }
        Ok(Self { sample_rate_hz })
    }

    /// Analyze `b` against `a`.
    ///
    /// The peak bin is picked from `a` alone and reused for `b`, so phase is
    /// always read at one bin. An all-DC input lands on bin 0 and reports 0 Hz.
    pub fn analyze(
        &self,
        a: &VoltageSeries,
        b: &VoltageSeries,
    ) -> Result<SpectralResult, AnalysisError> {
        if a.is_empty() || b.is_empty() {
            return Err(AnalysisError::EmptyWaveform);
        }
        if a.len() != b.len() {
            return Err(AnalysisError::LengthMismatch {
                expected: a.len(),
                actual: b.len(),
            });
        }
        let n = a.len();
        let mut planner = FftPlanner::<f64>::new();
        let fft = planner.plan_fft_forward(n);
        let transform = |series: &VoltageSeries| {
            let mut buffer: Vec<Complex64> = series
                .samples
                .iter()
                .map(|&v| Complex64::new(v, 0.0))
                .collect();
            fft.process(&mut buffer);
            buffer
        };
        let spectrum_a = transform(a);
        let spectrum_b = transform(b);

        let bin_index = peak_bin(&spectrum_a[..(n / 2).max(1)]);
        let bin_resolution_hz = self.sample_rate_hz / n as f64;
        let phase = (spectrum_b[bin_index].arg() - spectrum_a[bin_index].arg()).to_degrees();
        Ok(SpectralResult {
            dominant_frequency_hz: bin_index as f64 * bin_resolution_hz,
            phase_shift_deg: wrap_degrees(phase),
            bin_index,
            bin_resolution_hz,
        })
    }
}

/// First bin of maximum magnitude.
fn peak_bin(bins: &[Complex64]) -> usize {
    bins.iter()
        .enumerate()
        .fold((0, f64::NEG_INFINITY), |(best, best_mag), (idx, c)| {
            let mag = c.norm();
            if mag > best_mag {
                (idx, mag)
            } else {
                (best, best_mag)
            }
        })
        .0
}

/// Fold a difference of two angles, each in (-180, 180], into `[0, 360)`.
fn wrap_degrees(deg: f64) -> f64 {
    let mut wrapped = if deg < 0.0 { deg + 360.0 } else { deg };
    if wrapped >= 360.0 {
        wrapped -= 360.0;
    }
    wrapped
}
