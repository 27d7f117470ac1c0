use std::thread;
use std::time::Duration;

use log::{debug, info, warn};
use serde::Serialize;

use crate::bench::{Actuator, StatusProbe};
use crate::fault::SeekError;
use crate::types::Polarity;

/// Slack for floating-point accumulation when comparing against the floor.
const FLOOR_EPSILON: f64 = 1e-9;

/// Knobs for one threshold seek. Magnitudes are in the direction's frame.
#[derive(Clone, Debug, PartialEq)]
pub struct SeekParams {
    pub assertion_threshold: f64,
    pub step: f64,
    pub safety_floor: f64,
    pub settle_tolerance: f64,
    pub max_settle_polls: usize,
    /// Pause before every instrument read.
    pub dwell: Duration,
}

impl Default for SeekParams {
    fn default() -> Self {
        Self {
            assertion_threshold: 1.0,
            step: 0.25,
            safety_floor: 1.0,
            settle_tolerance: 0.02,
            max_settle_polls: 10,
            dwell: Duration::ZERO,
        }
    }
}

impl SeekParams {
    /// Reject settings that would stall the loop or walk the rail away from zero.
    pub fn validate(&self) -> Result<(), SeekError> {
        let invalid = |what: String| Err(SeekError::InvalidParams(what));
        if !(self.step.is_finite() && self.step > 0.0) {
            return invalid(format!("step must be positive and finite, got {}", self.step));
        }
        if !self.safety_floor.is_finite() {
            return invalid(format!("safety floor must be finite, got {}", self.safety_floor));
        }
        if !self.assertion_threshold.is_finite() {
            return invalid(format!(
                "assertion threshold must be finite, got {}",
                self.assertion_threshold
            ));
        }
        if !(self.settle_tolerance.is_finite() && self.settle_tolerance > 0.0) {
            return invalid(format!(
                "settle tolerance must be positive and finite, got {}",
                self.settle_tolerance
            ));
        }
        if self.max_settle_polls == 0 {
            return invalid("max settle polls must be at least 1".to_string());
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeekOutcome {
    Asserted,
    /// The rail reached the safety floor before the status signal asserted.
    TimedOut,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SeekPhase {
    Init,
    Stepping,
    Settling,
    Asserted,
    TimedOut,
}

/// Live state of one seek call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SeekState {
    pub phase: SeekPhase,
    pub setpoint: f64,
    pub readback: f64,
    pub status_signal: f64,
    pub direction: Polarity,
    pub iterations: usize,
}

impl SeekState {
    fn magnitude(&self) -> f64 {
        self.direction.sign() * self.setpoint
    }

    fn enter(&mut self, phase: SeekPhase) {
        debug!("seek {:?} -> {:?}", self.phase, phase);
        self.phase = phase;
    }

    fn finish(mut self, outcome: SeekOutcome) -> SeekResult {
        self.enter(match outcome {
            SeekOutcome::Asserted => SeekPhase::Asserted,
            SeekOutcome::TimedOut => SeekPhase::TimedOut,
        });
        SeekResult {
            final_setpoint: self.setpoint,
            final_readback: self.readback,
            final_status_signal: self.status_signal,
            outcome,
            iterations: self.iterations,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct SeekResult {
    pub final_setpoint: f64,
    pub final_readback: f64,
    pub final_status_signal: f64,
    pub outcome: SeekOutcome,
    /// Setpoint steps commanded.
    pub iterations: usize,
}

/// Steps a rail toward zero until a status signal drops to its assertion threshold.
///
/// Polarity lives only in `direction`: the loop works on `sign * value`, so an
/// inverted rail and probe (see [`crate::bench::Inverted`]) give the same
/// magnitudes as the upright run.
pub struct ThresholdSeeker<A, P> {
    actuator: A,
    probe: P,
    params: SeekParams,
}

impl<A: Actuator, P: StatusProbe> ThresholdSeeker<A, P> {
    pub fn new(actuator: A, probe: P, params: SeekParams) -> Self {
        Self {
            actuator,
            probe,
            params,
        }
    }

    pub fn seek(&mut self, direction: Polarity) -> Result<SeekResult, SeekError> {
        self.params.validate()?;
        let sign = direction.sign();
        let start = self.actuator.read_setpoint()?;
        let mut state = SeekState {
            phase: SeekPhase::Init,
            setpoint: start,
            readback: start,
            status_signal: f64::NAN,
            direction,
            iterations: 0,
        };
        info!("seek {direction:?} from {start:.3}");

        loop {
            state.enter(SeekPhase::Stepping);
            self.dwell();
            state.status_signal = self.probe.read()?;
            debug!(
                "step {}: rail {:.3}, status {:.3}",
                state.iterations, state.readback, state.status_signal
            );
            if sign * state.status_signal <= self.params.assertion_threshold {
                info!(
                    "status asserted at rail {:.3} after {} steps",
                    state.readback, state.iterations
                );
                return Ok(state.finish(SeekOutcome::Asserted));
            }
            let next = state.setpoint - sign * self.params.step;
            if sign * next < self.params.safety_floor - FLOOR_EPSILON {
                warn!(
                    "rail reached safety floor {:.3} at {:.3} without assertion",
                    self.params.safety_floor, state.setpoint
                );
                return Ok(state.finish(SeekOutcome::TimedOut));
            }
            state.enter(SeekPhase::Settling);
            state.setpoint = next;
            state.iterations += 1;
            state.readback = self.settle(next)?;
            debug_assert!(state.magnitude() >= self.params.safety_floor - FLOOR_EPSILON);
        }
    }

    /// Command `setpoint` and poll readback until it is within tolerance.
    pub fn settle(&mut self, setpoint: f64) -> Result<f64, SeekError> {
        self.params.validate()?;
        let polls = self.params.max_settle_polls;
        let mut readback = f64::NAN;
        self.actuator.set_setpoint(setpoint)?;
        for poll in 1..=polls {
            self.dwell();
            readback = self.actuator.read_setpoint()?;
            if (readback - setpoint).abs() <= self.params.settle_tolerance {
                return Ok(readback);
            }
            if poll < polls {
                warn!("rail readback {readback:.3} != {setpoint:.3}, re-commanding");
                self.actuator.set_setpoint(setpoint)?;
            }
        }
        Err(SeekError::ActuatorUnresponsive {
            setpoint,
            readback,
            polls,
        })
    }

    fn dwell(&self) {
        if !self.params.dwell.is_zero() {
            thread::sleep(self.params.dwell);
        }
    }
}

/// One-shot seek over borrowed instruments.
pub fn seek_threshold<A: Actuator, P: StatusProbe>(
    actuator: &mut A,
    probe: &mut P,
    direction: Polarity,
    params: &SeekParams,
) -> Result<SeekResult, SeekError> {
    ThresholdSeeker::new(actuator, probe, params.clone()).seek(direction)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{Inverted, InstrumentError, SimulatedFaultPin, SimulatedRail};

    fn rig(start: f64, trip: f64) -> (SimulatedRail, SimulatedFaultPin) {
        let rail = SimulatedRail::new(start);
        let pin = SimulatedFaultPin::new(rail.output(), trip);
        (rail, pin)
    }

    #[test]
    fn asserts_when_status_drops() {
        let (mut rail, mut pin) = rig(10.0, 4.5);
        let result =
            seek_threshold(&mut rail, &mut pin, Polarity::Positive, &SeekParams::default()).unwrap();
        assert_eq!(result.outcome, SeekOutcome::Asserted);
        assert!((result.final_setpoint - 4.25).abs() < 1e-9);
        assert!(result.final_status_signal <= 1.0);
        assert_eq!(result.iterations, 23);
    }

    #[test]
    fn already_asserted_status_stops_before_stepping() {
        let (mut rail, mut pin) = rig(10.0, 12.0);
        let result =
            seek_threshold(&mut rail, &mut pin, Polarity::Positive, &SeekParams::default()).unwrap();
        assert_eq!(result.outcome, SeekOutcome::Asserted);
        assert_eq!(result.iterations, 0);
        assert_eq!(result.final_setpoint, 10.0);
    }

    #[test]
    fn terminates_within_thirty_six_steps_from_any_start() {
        let mut start = 1.0;
        while start <= 10.0 {
            // trip below the floor: the pin never asserts
            let (mut rail, mut pin) = rig(start, 0.5);
            let result =
                seek_threshold(&mut rail, &mut pin, Polarity::Positive, &SeekParams::default())
                    .unwrap();
            assert_eq!(result.outcome, SeekOutcome::TimedOut, "start {start}");
            assert!(result.iterations <= 36, "start {start}: {}", result.iterations);
            assert!(result.final_setpoint >= 1.0 - 1e-9);
            start += 0.1;
        }
        let (mut rail, mut pin) = rig(10.0, 0.5);
        let result =
            seek_threshold(&mut rail, &mut pin, Polarity::Positive, &SeekParams::default()).unwrap();
        assert_eq!(result.iterations, 36);
        assert!((result.final_setpoint - 1.0).abs() < 1e-9);
    }

    #[test]
    fn inverted_rail_and_probe_give_same_magnitudes() {
        let params = SeekParams::default();
        let (mut rail, mut pin) = rig(10.0, 6.3);
        let upright = seek_threshold(&mut rail, &mut pin, Polarity::Positive, &params).unwrap();

        let (rail, pin) = rig(10.0, 6.3);
        let mut rail = Inverted(rail);
        let mut pin = Inverted(pin);
        let inverted = seek_threshold(&mut rail, &mut pin, Polarity::Negative, &params).unwrap();

        assert_eq!(inverted.outcome, upright.outcome);
        assert_eq!(inverted.iterations, upright.iterations);
        assert!((inverted.final_setpoint.abs() - upright.final_setpoint.abs()).abs() < 1e-12);
        assert!((inverted.final_readback.abs() - upright.final_readback.abs()).abs() < 1e-12);
        assert!(
            (inverted.final_status_signal.abs() - upright.final_status_signal.abs()).abs() < 1e-12
        );
        assert!(inverted.final_setpoint < 0.0);
    }

    #[test]
    fn negative_rail_with_inverted_probe_times_out_symmetrically() {
        let params = SeekParams::default();
        let (mut rail, mut pin) = rig(7.0, 0.0);
        let upright = seek_threshold(&mut rail, &mut pin, Polarity::Positive, &params).unwrap();
        let (rail, pin) = rig(7.0, 0.0);
        let inverted = seek_threshold(
            &mut Inverted(rail),
            &mut Inverted(pin),
            Polarity::Negative,
            &params,
        )
        .unwrap();
        assert_eq!(upright.outcome, SeekOutcome::TimedOut);
        assert_eq!(inverted.outcome, SeekOutcome::TimedOut);
        assert_eq!(inverted.iterations, upright.iterations);
    }

    #[test]
    fn lagging_rail_settles_after_retries() {
        let mut rail = SimulatedRail::new(10.0).with_lag(3);
        let mut pin = SimulatedFaultPin::new(rail.output(), 9.6);
        let result =
            seek_threshold(&mut rail, &mut pin, Polarity::Positive, &SeekParams::default()).unwrap();
        assert_eq!(result.outcome, SeekOutcome::Asserted);
        assert!((result.final_readback - 9.5).abs() < 1e-9);
    }

    #[test]
    fn stuck_rail_is_reported_unresponsive() {
        let mut rail = SimulatedRail::new(10.0).stuck();
        let mut pin = SimulatedFaultPin::new(rail.output(), 4.5);
        let params = SeekParams {
            max_settle_polls: 4,
            ..SeekParams::default()
        };
        let err = seek_threshold(&mut rail, &mut pin, Polarity::Positive, &params).unwrap_err();
        match err {
            SeekError::ActuatorUnresponsive {
                setpoint,
                readback,
                polls,
            } => {
                assert!((setpoint - 9.75).abs() < 1e-9);
                assert_eq!(readback, 10.0);
                assert_eq!(polls, 4);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(rail.commands(), 4);
    }

    #[test]
    fn bad_params_are_rejected_before_touching_the_rail() {
        let base = SeekParams::default();
        let bad = [
            SeekParams {
                step: 0.0,
                ..base.clone()
            },
            SeekParams {
                step: -0.25,
                ..base.clone()
            },
            SeekParams {
                step: f64::NAN,
                ..base.clone()
            },
            SeekParams {
                safety_floor: f64::INFINITY,
                ..base.clone()
            },
            SeekParams {
                settle_tolerance: 0.0,
                ..base.clone()
            },
            SeekParams {
                max_settle_polls: 0,
                ..base.clone()
            },
        ];
        for params in bad {
            let (mut rail, mut pin) = rig(10.0, 0.5);
            let err =
                seek_threshold(&mut rail, &mut pin, Polarity::Positive, &params).unwrap_err();
            assert!(matches!(err, SeekError::InvalidParams(_)), "{params:?}");
            assert_eq!(rail.commands(), 0);
            assert_eq!(rail.output().get(), 10.0);
        }
    }

    #[test]
    fn settle_rejects_bad_params_too() {
        let (rail, pin) = rig(10.0, 0.5);
        let params = SeekParams {
            step: -1.0,
            ..SeekParams::default()
        };
        let mut seeker = ThresholdSeeker::new(rail, pin, params);
        assert!(matches!(seeker.settle(9.0), Err(SeekError::InvalidParams(_))));
    }

    struct DeadProbe;
    impl StatusProbe for DeadProbe {
        fn read(&mut self) -> Result<f64, InstrumentError> {
            Err(InstrumentError::Unavailable("dmm"))
        }
    }

    #[test]
    fn probe_failure_propagates() {
        let mut rail = SimulatedRail::new(10.0);
        let err = seek_threshold(&mut rail, &mut DeadProbe, Polarity::Positive, &SeekParams::default())
            .unwrap_err();
        assert!(matches!(err, SeekError::Instrument(InstrumentError::Unavailable("dmm"))));
    }
}
