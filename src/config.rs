// src/config.rs
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::fault::SeekParams;
use crate::types::{ChannelId, Polarity};
use crate::waveform::{Bounds, Thresholds};

/// Peak-to-peak acceptance window for one scope channel.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChannelLimits {
    pub channel: ChannelId,
    pub label: String,
    pub min_pk_pk: f64,
    pub max_pk_pk: f64,
}

impl ChannelLimits {
    fn new(channel: ChannelId, label: &str, min_pk_pk: f64, max_pk_pk: f64) -> Self {
        Self {
            channel,
            label: label.to_string(),
            min_pk_pk,
            max_pk_pk,
        }
    }
}

/// Fault-output procedure settings. Voltages are magnitudes; the polarities
/// say which way the rail and the status pin point.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FaultConfig {
    pub nominal_rail: f64,
    /// Where the seek starts; the fault never trips above this, so skip ahead.
    pub start_magnitude: f64,
    pub rail_polarity: Polarity,
    pub status_polarity: Polarity,
    pub assert_threshold: f64,
    pub deassert_threshold: f64,
    pub step: f64,
    /// Below this the fault bit won't toggle at all.
    pub safety_floor: f64,
    pub rail_ceiling: f64,
    pub settle_tolerance: f64,
    pub max_settle_polls: usize,
    pub dwell_ms: u64,
}

impl Default for FaultConfig {
    fn default() -> Self {
        Self {
            nominal_rail: 15.0,
            start_magnitude: 10.0,
            rail_polarity: Polarity::Negative,
            status_polarity: Polarity::Positive,
            assert_threshold: 1.0,
            deassert_threshold: 13.5,
            step: 0.25,
            safety_floor: 1.0,
            rail_ceiling: 15.0,
            settle_tolerance: 0.02,
            max_settle_polls: 10,
            dwell_ms: 0,
        }
    }
}

impl FaultConfig {
    pub fn seek_params(&self) -> SeekParams {
        SeekParams {
            assertion_threshold: self.assert_threshold,
            step: self.step,
            safety_floor: self.safety_floor,
            settle_tolerance: self.settle_tolerance,
            max_settle_polls: self.max_settle_polls,
            dwell: Duration::from_millis(self.dwell_ms),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.step > 0.0) {
            bail!("fault.step must be positive, got {}", self.step);
        }
        if !(self.settle_tolerance > 0.0) {
            bail!("fault.settle_tolerance must be positive");
        }
        if self.max_settle_polls == 0 {
            bail!("fault.max_settle_polls must be at least 1");
        }
        if self.safety_floor > self.start_magnitude {
            bail!(
                "fault.start_magnitude {} is below the safety floor {}",
                self.start_magnitude,
                self.safety_floor
            );
        }
        if self.rail_ceiling < self.safety_floor {
            bail!("fault.rail_ceiling is below fault.safety_floor");
        }
        Ok(())
    }
}

/// Full acceptance configuration, loadable from JSON.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AcceptanceConfig {
    pub sample_rate_hz: f64,
    pub channels: Vec<ChannelLimits>,
    pub phase_reference: ChannelId,
    pub phase_target: ChannelId,
    pub frequency_hz: Bounds,
    pub phase_deg: Bounds,
    pub fault: FaultConfig,
    pub plot_path: Option<PathBuf>,
}

impl Default for AcceptanceConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 2000.0,
            channels: vec![
                ChannelLimits::new(1, "IOUT 1", 0.50, 0.54),
                ChannelLimits::new(2, "IOUT 2", 0.50, 0.54),
                ChannelLimits::new(3, "SIGNAL GEN", 20.0, 22.0),
            ],
            phase_reference: 1,
            phase_target: 2,
            frequency_hz: Bounds::new(9.0, 11.0),
            phase_deg: Bounds::new(178.0, 181.0),
            fault: FaultConfig::default(),
            plot_path: None,
        }
    }
}

impl AcceptanceConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        let config: Self = serde_json::from_str(&text)
            .with_context(|| format!("parsing config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate_hz > 0.0) {
            bail!("sample_rate_hz must be positive, got {}", self.sample_rate_hz);
        }
        for limits in &self.channels {
            if limits.min_pk_pk > limits.max_pk_pk {
                bail!("channel {} has inverted peak-to-peak bounds", limits.channel);
            }
        }
        if !self.frequency_hz.is_ordered() || !self.phase_deg.is_ordered() {
            bail!("frequency/phase bounds are inverted");
        }
        self.fault.validate()
    }

    pub fn thresholds(&self) -> Thresholds {
        Thresholds {
            sample_rate_hz: self.sample_rate_hz,
            pk_pk: self
                .channels
                .iter()
                .map(|c| (c.channel, Bounds::new(c.min_pk_pk, c.max_pk_pk)))
                .collect(),
            phase_reference: self.phase_reference,
            phase_target: self.phase_target,
            frequency_hz: self.frequency_hz,
            phase_deg: self.phase_deg,
        }
    }

    pub fn labels(&self) -> BTreeMap<ChannelId, String> {
        self.channels
            .iter()
            .map(|c| (c.channel, c.label.clone()))
            .collect()
    }
}
