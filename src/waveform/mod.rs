// src/waveform/mod.rs
// Capture decoding, unit conversion, spectral analysis and pass/fail judgement.
pub mod convert;
pub mod decode;
pub mod error;
pub mod evaluate;
pub mod pipeline;
pub mod plot;
pub mod spectrum;

pub use convert::{to_volts, VoltageSeries};
pub use decode::{decode, DecodedWaveform, RawCapture, ScaleFactors};
pub use error::AnalysisError;
pub use evaluate::{evaluate, Bounds, ChannelVerdict, Thresholds, Verdict};
pub use pipeline::{decode_and_evaluate, CurrentTest, Evaluation, EvaluationSummary};
pub use plot::{render_evaluation_png, PlotStyle};
pub use spectrum::{SpectralAnalyzer, SpectralResult};
