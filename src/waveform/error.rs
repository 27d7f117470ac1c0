use thiserror::Error;

use crate::bench::InstrumentError;
use crate::types::ChannelId;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("malformed capture: header claims {header_length} bytes but block has {block_length}")]
    MalformedCapture {
        header_length: usize,
        block_length: usize,
    },
    #[error("capture holds no samples")]
    EmptyWaveform,
    #[error("series length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
    #[error("sample rate must be greater than zero")]
    InvalidSampleRate,
    #[error("no capture for channel {0}")]
    MissingChannel(ChannelId),
    #[error("channel {channel}: {source}")]
    Channel {
        channel: ChannelId,
        #[source]
        source: Box<AnalysisError>,
    },
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    #[error("failed to render plot: {0}")]
    Plot(String),
}

impl AnalysisError {
    pub(crate) fn on_channel(self, channel: ChannelId) -> Self {
        AnalysisError::Channel {
            channel,
            source: Box::new(self),
        }
    }
}

impl<E: std::error::Error + Send + Sync + 'static> From<plotters::drawing::DrawingAreaErrorKind<E>>
    for AnalysisError
{
    fn from(value: plotters::drawing::DrawingAreaErrorKind<E>) -> Self {
        AnalysisError::Plot(format!("{value:?}"))
    }
}

impl From<image::ImageError> for AnalysisError {
    fn from(value: image::ImageError) -> Self {
        AnalysisError::Plot(value.to_string())
    }
}
