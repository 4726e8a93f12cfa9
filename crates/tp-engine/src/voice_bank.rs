//! Fixed-size bank of channel voices.

use alloc::vec::Vec;
use tp_ir::{ChannelSettings, Module, MAX_CHANNELS};

use crate::channel::ChannelState;
use crate::info::FrameInfo;

/// One voice per module channel, allocated once for the engine's lifetime.
///
/// Loading or restarting resets voices in place; the bank never grows.
#[derive(Clone, Debug)]
pub struct VoiceBank {
    voices: Vec<ChannelState>,
}

impl VoiceBank {
    /// Allocate `capacity` voices (1 to [`MAX_CHANNELS`]).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.clamp(1, MAX_CHANNELS);
        let mut voices = Vec::with_capacity(capacity);
        voices.resize_with(capacity, ChannelState::new);
        Self { voices }
    }

    /// Number of voice slots.
    pub fn capacity(&self) -> usize {
        self.voices.len()
    }

    /// Reset every voice to the module's channel settings. Slots the module
    /// does not use get the defaults and stay silent.
    pub fn reset(&mut self, module: Option<&Module>) {
        let defaults = ChannelSettings::default();
        for (i, voice) in self.voices.iter_mut().enumerate() {
            let settings = module
                .and_then(|m| m.channels.get(i))
                .unwrap_or(&defaults);
            voice.reset(settings);
        }
    }

    /// Stop every voice.
    pub fn silence(&mut self) {
        for voice in &mut self.voices {
            voice.stop();
        }
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ChannelState> {
        self.voices.get_mut(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ChannelState> {
        self.voices.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut ChannelState> {
        self.voices.iter_mut()
    }

    /// Number of voices currently sounding.
    pub fn active_count(&self) -> usize {
        self.voices.iter().filter(|v| v.is_playing()).count()
    }

    /// Copy every voice's telemetry into the snapshot.
    pub fn fill_info(&self, info: &mut FrameInfo) {
        for (slot, voice) in info.channels.iter_mut().zip(&self.voices) {
            *slot = voice.info();
        }
    }
}
