//! Playback engine for the trackplay module player.
//!
//! Advances a [`Sequencer`] tick by tick over an immutable [`tp_ir::Module`],
//! applies row commands to a fixed [`VoiceBank`] and mixes the voices into
//! 16-bit stereo [`Frame`]s. Nothing on the render path allocates.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod channel;
mod envelope_state;
mod event_queue;
mod frame;
pub mod frequency;
mod info;
mod mixer;
mod scan;
mod sequencer;
mod voice_bank;

pub use channel::{ChannelState, TickParams};
pub use envelope_state::EnvelopeCursor;
pub use event_queue::{EventQueue, QUEUE_CAPACITY};
pub use frame::Frame;
pub use frequency::{note_to_increment, note_to_period, period_to_increment};
pub use info::{ChannelInfo, FrameInfo, INFO_VALUES};
pub use mixer::{CapacityError, Engine, EngineConfig, Interpolation, RenderStatus};
pub use scan::{scan_sequences, SequenceInfo};
pub use sequencer::{Sequencer, MIN_BPM};
pub use voice_bank::VoiceBank;
