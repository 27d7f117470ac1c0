// src/fault/mod.rs
pub mod error;
pub mod procedure;
pub mod seek;

pub use error::SeekError;
pub use procedure::{AssertionCheck, FaultTest, FaultTestReport};
pub use seek::{
    seek_threshold, SeekOutcome, SeekParams, SeekPhase, SeekResult, SeekState, ThresholdSeeker,
};
