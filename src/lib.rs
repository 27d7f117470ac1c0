//! Acceptance testing core for DCCT modules: waveform capture analysis and
//! fault-output threshold seeking, behind injected instrument handles.
pub mod bench;
pub mod config;
pub mod fault;
pub mod types;
pub mod waveform;

pub use config::{AcceptanceConfig, ChannelLimits, FaultConfig};
pub use fault::{seek_threshold, FaultTest, FaultTestReport, SeekOutcome, SeekParams, SeekResult};
pub use types::{ChannelId, Polarity};
pub use waveform::{decode_and_evaluate, CurrentTest, Evaluation, Thresholds, Verdict};
