use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::types::ChannelId;
use crate::waveform::{AnalysisError, SpectralResult, VoltageSeries};

/// Closed acceptance interval; both ends pass.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub low: f64,
    pub high: f64,
}

impl Bounds {
    pub fn new(low: f64, high: f64) -> Self {
        Self { low, high }
    }

    pub fn contains(&self, value: f64) -> bool {
        self.low <= value && value <= self.high
    }

    pub fn is_ordered(&self) -> bool {
        self.low <= self.high
    }
}

/// Everything `decode_and_evaluate` needs to judge one acquisition.
#[derive(Clone, Debug, PartialEq)]
pub struct Thresholds {
    pub sample_rate_hz: f64,
    pub pk_pk: BTreeMap<ChannelId, Bounds>,
    pub phase_reference: ChannelId,
    pub phase_target: ChannelId,
    pub frequency_hz: Bounds,
    pub phase_deg: Bounds,
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct ChannelVerdict {
    pub peak_to_peak: f64,
    pub bounds: Bounds,
    pub passed: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Verdict {
    pub channels: BTreeMap<ChannelId, ChannelVerdict>,
    pub frequency_phase_passed: bool,
    pub passed: bool,
}

/// Judge peak-to-peak per channel and the frequency/phase pair.
pub fn evaluate(
    series: &BTreeMap<ChannelId, VoltageSeries>,
    spectral: &SpectralResult,
    thresholds: &Thresholds,
) -> Result<Verdict, AnalysisError> {
    let mut channels = BTreeMap::new();
    for (&channel, bounds) in &thresholds.pk_pk {
        let peak_to_peak = series
            .get(&channel)
            .ok_or(AnalysisError::MissingChannel(channel))?
            .peak_to_peak();
        channels.insert(
            channel,
            ChannelVerdict {
                peak_to_peak,
                bounds: *bounds,
                passed: bounds.contains(peak_to_peak),
            },
        );
    }
    let frequency_phase_passed = thresholds
        .frequency_hz
        .contains(spectral.dominant_frequency_hz)
        && thresholds.phase_deg.contains(spectral.phase_shift_deg);
    let passed = frequency_phase_passed && channels.values().all(|c| c.passed);
    Ok(Verdict {
        channels,
        frequency_phase_passed,
        passed,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series_with_pk_pk(pk_pk: f64) -> VoltageSeries {
        VoltageSeries::from_volts(vec![0.0, pk_pk, 0.5 * pk_pk], 1.0).unwrap()
    }

    fn spectral(freq: f64, phase: f64) -> SpectralResult {
        SpectralResult {
            dominant_frequency_hz: freq,
            phase_shift_deg: phase,
            bin_index: freq as usize,
            bin_resolution_hz: 1.0,
        }
    }

    fn thresholds(low: f64, high: f64) -> Thresholds {
        Thresholds {
            sample_rate_hz: 2000.0,
            pk_pk: BTreeMap::from([(1, Bounds::new(low, high))]),
            phase_reference: 1,
            phase_target: 1,
            frequency_hz: Bounds::new(9.0, 11.0),
            phase_deg: Bounds::new(178.0, 181.0),
        }
    }

    fn verdict_for(pk_pk: f64) -> Verdict {
        let series = BTreeMap::from([(1, series_with_pk_pk(pk_pk))]);
        evaluate(&series, &spectral(10.0, 180.0), &thresholds(0.5, 0.54)).unwrap()
    }

    #[test]
    fn bounds_are_inclusive() {
        assert!(verdict_for(0.5).passed);
        assert!(verdict_for(0.54).passed);
        assert!(!verdict_for(0.5 - 1e-9).passed);
        assert!(!verdict_for(0.54 + 1e-9).passed);
    }

    #[test]
    fn frequency_and_phase_must_both_hold() {
        let series = BTreeMap::from([(1, series_with_pk_pk(0.52))]);
        let t = thresholds(0.5, 0.54);
        let good = evaluate(&series, &spectral(10.0, 180.0), &t).unwrap();
        assert!(good.frequency_phase_passed && good.passed);
        let bad_phase = evaluate(&series, &spectral(10.0, 90.0), &t).unwrap();
        assert!(!bad_phase.frequency_phase_passed);
        assert!(bad_phase.channels[&1].passed);
        assert!(!bad_phase.passed);
        let bad_freq = evaluate(&series, &spectral(12.0, 180.0), &t).unwrap();
        assert!(!bad_freq.passed);
    }

    #[test]
    fn one_failing_channel_fails_overall() {
        let series = BTreeMap::from([(1, series_with_pk_pk(0.52)), (2, series_with_pk_pk(3.0))]);
        let mut t = thresholds(0.5, 0.54);
        t.pk_pk.insert(2, Bounds::new(0.5, 0.54));
        let verdict = evaluate(&series, &spectral(10.0, 180.0), &t).unwrap();
        assert!(verdict.channels[&1].passed);
        assert!(!verdict.channels[&2].passed);
        assert!(!verdict.passed);
    }

    #[test]
    fn missing_channel_is_reported() {
        let series = BTreeMap::new();
        let err = evaluate(&series, &spectral(10.0, 180.0), &thresholds(0.5, 0.54)).unwrap_err();
        assert!(matches!(err, AnalysisError::MissingChannel(1)));
    }
}
