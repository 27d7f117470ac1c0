use std::collections::{BTreeMap, BTreeSet};

use log::{info, warn};
use serde::Serialize;

use crate::bench::WaveformSource;
use crate::types::ChannelId;
use crate::waveform::convert::convert;
use crate::waveform::decode::{decode, RawCapture};
use crate::waveform::error::AnalysisError;
use crate::waveform::evaluate::{evaluate, Thresholds, Verdict};
use crate::waveform::spectrum::{SpectralAnalyzer, SpectralResult};
use crate::waveform::VoltageSeries;

/// Outcome of one capture cycle, handed to the reporting layer.
#[derive(Clone, Debug, Serialize)]
pub struct Evaluation {
    pub series: BTreeMap<ChannelId, VoltageSeries>,
    pub spectral: SpectralResult,
    pub verdict: Verdict,
}

/// Evaluation without the raw sample vectors.
#[derive(Clone, Debug, Serialize)]
pub struct EvaluationSummary {
    pub dominant_frequency_hz: f64,
    pub phase_shift_deg: f64,
    pub verdict: Verdict,
}

impl Evaluation {
    pub fn summary(&self) -> EvaluationSummary {
        EvaluationSummary {
            dominant_frequency_hz: self.spectral.dominant_frequency_hz,
            phase_shift_deg: self.spectral.phase_shift_deg,
            verdict: self.verdict.clone(),
        }
    }
}

/// Decode every capture, convert to volts, analyze the phase pair, and judge.
///
/// A decode or conversion failure aborts with the offending channel attached.
pub fn decode_and_evaluate(
    captures: &BTreeMap<ChannelId, RawCapture>,
    thresholds: &Thresholds,
) -> Result<Evaluation, AnalysisError> {
    let series = captures
        .iter()
        .map(|(&channel, capture)| {
            decode(&capture.block)
                .and_then(|decoded| convert(&decoded, &capture.scale))
                .map(|volts| (channel, volts))
                .map_err(|err| err.on_channel(channel))
        })
        .collect::<Result<BTreeMap<_, _>, _>>()?;

    let reference = series
        .get(&thresholds.phase_reference)
        .ok_or(AnalysisError::MissingChannel(thresholds.phase_reference))?;
    let target = series
        .get(&thresholds.phase_target)
        .ok_or(AnalysisError::MissingChannel(thresholds.phase_target))?;
    let analyzer = SpectralAnalyzer::with_sample_rate(thresholds.sample_rate_hz)?;
    let spectral = analyzer.analyze(reference, target)?;
    let verdict = evaluate(&series, &spectral, thresholds)?;

    for (channel, check) in &verdict.channels {
        if !check.passed {
            warn!(
                "channel {channel} peak-to-peak {:.4} V outside [{}, {}]",
                check.peak_to_peak, check.bounds.low, check.bounds.high
            );
        }
    }
    info!(
        "frequency {:.2} Hz, phase {:.2} deg, verdict {}",
        spectral.dominant_frequency_hz,
        spectral.phase_shift_deg,
        if verdict.passed { "PASS" } else { "FAIL" }
    );
    Ok(Evaluation {
        series,
        spectral,
        verdict,
    })
}

/// Captures the configured channels from a scope and evaluates them.
pub struct CurrentTest<S: WaveformSource> {
    source: S,
    thresholds: Thresholds,
}

impl<S: WaveformSource> CurrentTest<S> {
    pub fn new(source: S, thresholds: Thresholds) -> Self {
        Self { source, thresholds }
    }

    /// Channels judged or used for phase, in ascending order.
    pub fn channels(&self) -> Vec<ChannelId> {
        let mut set: BTreeSet<ChannelId> = self.thresholds.pk_pk.keys().copied().collect();
        set.insert(self.thresholds.phase_reference);
        set.insert(self.thresholds.phase_target);
        set.into_iter().collect()
    }

    pub fn acquire(&mut self) -> Result<BTreeMap<ChannelId, RawCapture>, AnalysisError> {
        self.channels()
            .into_iter()
            .map(|channel| {
                self.source
                    .capture(channel)
                    .map(|capture| (channel, capture))
                    .map_err(|err| AnalysisError::from(err).on_channel(channel))
            })
            .collect()
    }

    pub fn run(&mut self) -> Result<Evaluation, AnalysisError> {
        let captures = self.acquire()?;
        decode_and_evaluate(&captures, &self.thresholds)
    }
}
