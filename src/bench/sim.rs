// src/bench/sim.rs
// Simulated instruments, used by the binary's simulation mode and by tests.
use std::cell::Cell;
use std::collections::BTreeMap;
use std::f64::consts::PI;
use std::rc::Rc;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::bench::{Actuator, InstrumentError, StatusProbe, Stimulus, WaveformSource};
use crate::types::{ChannelId, Polarity};
use crate::waveform::{RawCapture, ScaleFactors};

/// Counts either side of mid-scale a full-amplitude sine occupies.
const SCOPE_HALF_SPAN_COUNTS: f64 = 100.0;
const SCOPE_MID_SCALE: f64 = 127.5;

fn jitter(rng: &mut StdRng, amplitude: f64) -> f64 {
    if amplitude > 0.0 {
        rng.gen_range(-amplitude..=amplitude)
    } else {
        0.0
    }
}

/// Bipolar supply rail whose output is shared with the simulated DUT.
pub struct SimulatedRail {
    output: Rc<Cell<f64>>,
    target: f64,
    lag_polls: usize,
    pending: usize,
    stuck: bool,
    noise: f64,
    rng: StdRng,
    commands: usize,
}

impl SimulatedRail {
    pub fn new(initial: f64) -> Self {
        Self {
            output: Rc::new(Cell::new(initial)),
            target: initial,
            lag_polls: 0,
            pending: 0,
            stuck: false,
            noise: 0.0,
            rng: StdRng::seed_from_u64(0),
            commands: 0,
        }
    }

    /// Readback keeps reporting the old level for `polls` reads after a change.
    pub fn with_lag(mut self, polls: usize) -> Self {
        self.lag_polls = polls;
        self
    }

    /// Uniform readback noise of `+-amplitude` volts.
    pub fn with_noise(mut self, amplitude: f64, seed: u64) -> Self {
        self.noise = amplitude;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Ignore every command.
    pub fn stuck(mut self) -> Self {
        self.stuck = true;
        self
    }

    pub fn output(&self) -> Rc<Cell<f64>> {
        Rc::clone(&self.output)
    }

    /// Number of setpoint commands received.
    pub fn commands(&self) -> usize {
        self.commands
    }
}

impl Actuator for SimulatedRail {
    fn set_setpoint(&mut self, value: f64) -> Result<(), InstrumentError> {
        if !value.is_finite() {
            return Err(InstrumentError::Fault {
                instrument: "rail",
                message: format!("refusing setpoint {value}"),
            });
        }
        self.commands += 1;
        if self.stuck || value == self.target {
            return Ok(());
        }
        self.target = value;
        self.pending = self.lag_polls;
        if self.pending == 0 {
            self.output.set(value);
        }
        Ok(())
    }

    fn read_setpoint(&mut self) -> Result<f64, InstrumentError> {
        if !self.stuck {
            if self.pending == 0 {
                self.output.set(self.target);
            } else {
                self.pending -= 1;
            }
        }
        Ok(self.output.get() + jitter(&mut self.rng, self.noise))
    }
}

/// Open-emitter fault pin: high while the rail magnitude holds, low once it sags.
pub struct SimulatedFaultPin {
    rail: Rc<Cell<f64>>,
    trip_magnitude: f64,
    asserted_level: f64,
    deasserted_level: f64,
}

impl SimulatedFaultPin {
    pub fn new(rail: Rc<Cell<f64>>, trip_magnitude: f64) -> Self {
        Self {
            rail,
            trip_magnitude,
            asserted_level: 0.2,
            deasserted_level: 13.8,
        }
    }

    pub fn with_levels(mut self, asserted: f64, deasserted: f64) -> Self {
        self.asserted_level = asserted;
        self.deasserted_level = deasserted;
        self
    }
}

impl StatusProbe for SimulatedFaultPin {
    fn read(&mut self) -> Result<f64, InstrumentError> {
        if self.rail.get().abs() < self.trip_magnitude {
            Ok(self.asserted_level)
        } else {
            Ok(self.deasserted_level)
        }
    }
}

/// Records the stimulus polarities it was asked to drive.
#[derive(Default)]
pub struct SimulatedGenerator {
    applied: Vec<Polarity>,
}

impl SimulatedGenerator {
    pub fn applied(&self) -> &[Polarity] {
        &self.applied
    }
}

impl Stimulus for SimulatedGenerator {
    fn apply(&mut self, polarity: Polarity) -> Result<(), InstrumentError> {
        self.applied.push(polarity);
        Ok(())
    }
}

#[derive(Clone, Copy, Debug)]
pub struct ScopeChannel {
    pub peak_to_peak: f64,
    pub inverted: bool,
}

/// Scope that synthesizes a sine per channel in the 8-bit block format.
pub struct SimulatedScope {
    sample_rate_hz: f64,
    tone_hz: f64,
    record_length: usize,
    channels: BTreeMap<ChannelId, ScopeChannel>,
    noise_counts: f64,
    rng: StdRng,
}

impl SimulatedScope {
    pub fn new(sample_rate_hz: f64, tone_hz: f64, record_length: usize) -> Self {
        Self {
            sample_rate_hz,
            tone_hz,
            record_length,
            channels: BTreeMap::new(),
            noise_counts: 0.0,
            rng: StdRng::seed_from_u64(0),
        }
    }

    pub fn with_channel(mut self, channel: ChannelId, peak_to_peak: f64, inverted: bool) -> Self {
        self.channels.insert(
            channel,
            ScopeChannel {
                peak_to_peak,
                inverted,
            },
        );
        self
    }

    pub fn with_noise(mut self, counts: f64, seed: u64) -> Self {
        self.noise_counts = counts;
        self.rng = StdRng::seed_from_u64(seed);
        self
    }
}

impl WaveformSource for SimulatedScope {
    fn capture(&mut self, channel: ChannelId) -> Result<RawCapture, InstrumentError> {
        let config = *self
            .channels
            .get(&channel)
            .ok_or(InstrumentError::Unavailable("scope channel"))?;
        let sign = if config.inverted { -1.0 } else { 1.0 };
        let digits = format!("{}", self.record_length);
        let mut block = Vec::with_capacity(self.record_length + digits.len() + 3);
        block.push(b'#');
        block.push(digits.len() as u8);
        block.extend(digits.bytes());
        for i in 0..self.record_length {
            let phase = 2.0 * PI * self.tone_hz * i as f64 / self.sample_rate_hz;
            let counts = SCOPE_MID_SCALE
                + sign * SCOPE_HALF_SPAN_COUNTS * phase.sin()
                + jitter(&mut self.rng, self.noise_counts);
            block.push(counts.round().clamp(0.0, 255.0) as u8);
        }
        block.push(b'\n');
        Ok(RawCapture::new(
            block,
            ScaleFactors {
                y_mult: config.peak_to_peak / (2.0 * SCOPE_HALF_SPAN_COUNTS),
                y_zero: 0.0,
                y_offset: SCOPE_MID_SCALE,
                x_increment: 1.0 / self.sample_rate_hz,
            },
        ))
    }
}

/// A DCCT test bench wired the way the acceptance procedures expect.
pub struct SimulatedBench {
    pub rail: SimulatedRail,
    pub fault_pin: SimulatedFaultPin,
    pub generator: SimulatedGenerator,
    pub scope: SimulatedScope,
}

impl SimulatedBench {
    /// Healthy unit: -15 V rail, fault trips below 4.5 V, outputs in antiphase.
    pub fn healthy(sample_rate_hz: f64, seed: u64) -> Self {
        let rail = SimulatedRail::new(-15.0).with_lag(1).with_noise(0.005, seed);
        let fault_pin = SimulatedFaultPin::new(rail.output(), 4.5);
        let scope = SimulatedScope::new(sample_rate_hz, 10.0, 2000)
            .with_channel(1, 0.52, false)
            .with_channel(2, 0.52, true)
            .with_channel(3, 21.0, false)
            .with_noise(0.4, seed);
        Self {
            rail,
            fault_pin,
            generator: SimulatedGenerator::default(),
            scope,
        }
    }
}
