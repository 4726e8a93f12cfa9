//! Module data model for trackplay.
//!
//! Format parsers emit a [`Module`] and the playback engine consumes it
//! read-only. Designed to be `no_std` compatible with the `alloc` crate.

#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

mod effects;
mod event;
mod instrument;
mod module;
mod pattern;
mod sample;

pub use effects::{Effect, VolumeCommand};
pub use event::{Event, EventPayload, EventTarget};
pub use instrument::{AutoVibrato, Envelope, EnvelopePoint, Instrument, NUM_KEYS};
pub use module::{ChannelSettings, FrequencyMode, Module, MAX_CHANNELS};
pub use pattern::{Cell, Note, Pattern};
pub use sample::{LoopType, Sample, SampleData};
