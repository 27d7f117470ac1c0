// src/types.rs
use serde::{Deserialize, Serialize};

/// Scope channel number as printed on the front panel (1-based).
pub type ChannelId = u8;

/// Sign of a bipolar quantity: a supply rail, a status pin, a stimulus pulse.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    Negative,
}

impl Polarity {
    pub fn sign(self) -> f64 {
        match self {
            Polarity::Positive => 1.0,
            Polarity::Negative => -1.0,
        }
    }

    pub fn inverted(self) -> Self {
        match self {
            Polarity::Positive => Polarity::Negative,
            Polarity::Negative => Polarity::Positive,
        }
    }

    /// Map a magnitude onto this polarity.
    pub fn apply(self, magnitude: f64) -> f64 {
        self.sign() * magnitude
    }
}
