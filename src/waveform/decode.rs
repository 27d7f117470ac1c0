use serde::{Deserialize, Serialize};

use crate::waveform::AnalysisError;

/// Prefix bytes preceding the self-describing header count.
const PREFIX_LEN: usize = 2;

/// Vertical and horizontal scaling reported by the scope with each capture.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScaleFactors {
    pub y_mult: f64,
    pub y_zero: f64,
    pub y_offset: f64,
    pub x_increment: f64,
}

impl ScaleFactors {
    /// Raw counts pass through unchanged; one sample per second.
    pub fn unity() -> Self {
        Self {
            y_mult: 1.0,
            y_zero: 0.0,
            y_offset: 0.0,
            x_increment: 1.0,
        }
    }
}

/// One channel's binary block exactly as the scope returned it.
#[derive(Clone, Debug, PartialEq)]
pub struct RawCapture {
    pub block: Vec<u8>,
    pub scale: ScaleFactors,
}

impl RawCapture {
    pub fn new(block: Vec<u8>, scale: ScaleFactors) -> Self {
        Self { block, scale }
    }
}

/// A capture split into its header and payload.
#[derive(Clone, Debug, PartialEq)]
pub struct DecodedWaveform {
    pub header_length: usize,
    pub header_bytes: Vec<u8>,
    pub sample_bytes: Vec<u8>,
}

/// Split a raw block into header and samples.
///
/// `block[1]` counts the header bytes that follow the two-byte prefix. The last
/// byte of the block is a framing terminator and is never part of the payload.
pub fn decode(block: &[u8]) -> Result<DecodedWaveform, AnalysisError> {
    if block.len() < PREFIX_LEN {
        return Err(AnalysisError::MalformedCapture {
            header_length: PREFIX_LEN,
            block_length: block.len(),
        });
    }
    let header_length = PREFIX_LEN + block[1] as usize;
    if header_length > block.len() - 1 {
        return Err(AnalysisError::MalformedCapture {
            header_length,
            block_length: block.len(),
        });
    }
    Ok(DecodedWaveform {
        header_length,
        header_bytes: block[..header_length].to_vec(),
        sample_bytes: block[header_length..block.len() - 1].to_vec(),
    })
}
