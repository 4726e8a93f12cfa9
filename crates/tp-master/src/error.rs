//! Error type for player operations.

use thiserror::Error;
use tp_audio::AudioError;
use tp_engine::CapacityError;
use tp_formats::FormatError;

use crate::state::TransportState;

#[derive(Debug, Error)]
pub enum PlayerError {
    /// Unsupported or corrupt module data
    #[error(transparent)]
    Format(#[from] FormatError),
    #[error("{op} is not allowed while {state}")]
    InvalidStateTransition {
        op: &'static str,
        state: TransportState,
    },
    #[error("audio device error: {0}")]
    Device(#[from] AudioError),
    #[error("no module loaded")]
    NotLoaded,
    #[error("unsupported sample rate {0} Hz")]
    InvalidSampleRate(u32),
    #[error("{0}")]
    ChannelCapacity(CapacityError),
    #[error("no order entry or sequence {0}")]
    InvalidPosition(usize),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}
