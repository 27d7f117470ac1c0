use thiserror::Error;

use crate::bench::InstrumentError;

#[derive(Debug, Error)]
pub enum SeekError {
    #[error(
        "actuator did not settle at {setpoint:.3} after {polls} polls (last readback {readback:.3})"
    )]
    ActuatorUnresponsive {
        setpoint: f64,
        readback: f64,
        polls: usize,
    },
    #[error("invalid seek parameters: {0}")]
    InvalidParams(String),
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
}
