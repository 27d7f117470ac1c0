// src/bench/mod.rs
// Collaborator seams between the acceptance core and the bench instruments.
pub mod sim;

use std::collections::VecDeque;

use thiserror::Error;

use crate::types::{ChannelId, Polarity};
use crate::waveform::RawCapture;

pub use sim::{SimulatedBench, SimulatedFaultPin, SimulatedGenerator, SimulatedRail, SimulatedScope};

#[derive(Debug, Error)]
pub enum InstrumentError {
    #[error("{instrument}: {message}")]
    Fault {
        instrument: &'static str,
        message: String,
    },
    #[error("{0} is not available")]
    Unavailable(&'static str),
}

/// Programmable bipolar supply rail.
pub trait Actuator {
    fn set_setpoint(&mut self, value: f64) -> Result<(), InstrumentError>;
    /// Measured output; may lag the last commanded value.
    fn read_setpoint(&mut self) -> Result<f64, InstrumentError>;
}

/// Voltmeter on the DUT's fault status pin.
pub trait StatusProbe {
    fn read(&mut self) -> Result<f64, InstrumentError>;
}

/// Oscilloscope-like capture device.
pub trait WaveformSource {
    fn capture(&mut self, channel: ChannelId) -> Result<RawCapture, InstrumentError>;
}

/// Signal generator driving the DUT's sense input.
pub trait Stimulus {
    fn apply(&mut self, polarity: Polarity) -> Result<(), InstrumentError>;
}

impl<T: Actuator + ?Sized> Actuator for &mut T {
    fn set_setpoint(&mut self, value: f64) -> Result<(), InstrumentError> {
        (**self).set_setpoint(value)
    }
    fn read_setpoint(&mut self) -> Result<f64, InstrumentError> {
        (**self).read_setpoint()
    }
}

impl<T: StatusProbe + ?Sized> StatusProbe for &mut T {
    fn read(&mut self) -> Result<f64, InstrumentError> {
        (**self).read()
    }
}

/// Negates every value passing through the wrapped instrument.
///
/// Lets a caller run the seek against an inverted rail or status pin without
/// the seek loop knowing about it.
pub struct Inverted<T>(pub T);

impl<T: Actuator> Actuator for Inverted<T> {
    fn set_setpoint(&mut self, value: f64) -> Result<(), InstrumentError> {
        self.0.set_setpoint(-value)
    }
    fn read_setpoint(&mut self) -> Result<f64, InstrumentError> {
        self.0.read_setpoint().map(|v| -v)
    }
}

impl<T: StatusProbe> StatusProbe for Inverted<T> {
    fn read(&mut self) -> Result<f64, InstrumentError> {
        self.0.read().map(|v| -v)
    }
}

/// In-memory capture source useful for tests and deterministic playback.
pub struct ReplaySource {
    queue: VecDeque<(ChannelId, RawCapture)>,
}

impl ReplaySource {
    pub fn new(captures: impl IntoIterator<Item = (ChannelId, RawCapture)>) -> Self {
        Self {
            queue: captures.into_iter().collect(),
        }
    }
}

impl WaveformSource for ReplaySource {
    fn capture(&mut self, channel: ChannelId) -> Result<RawCapture, InstrumentError> {
        let idx = self
            .queue
            .iter()
            .position(|(id, _)| *id == channel)
            .ok_or(InstrumentError::Unavailable("replay channel"))?;
        self.queue
            .remove(idx)
            .map(|(_, capture)| capture)
            .ok_or(InstrumentError::Unavailable("replay channel"))
    }
}
