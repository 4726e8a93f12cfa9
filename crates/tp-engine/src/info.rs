//! Telemetry snapshot of transport and channel state.

use heapless::Vec;
use tp_ir::MAX_CHANNELS;

/// Number of transport values in [`FrameInfo::values`].
pub const INFO_VALUES: usize = 7;

/// Per-channel telemetry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ChannelInfo {
    /// Volume after envelopes, fadeout and global volume (0-64)
    pub final_volume: u8,
    /// 1-based instrument number, 0 if none
    pub instrument: u8,
    /// Last key played
    pub key: u8,
    /// Panning (0-255)
    pub pan: u8,
    /// Current period
    pub period: u32,
    /// Channel volume (0-64)
    pub volume: u8,
}

/// Point-in-time copy of the transport position and every voice slot.
///
/// Captured when a tick completes, before the position advances.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct FrameInfo {
    pub order: usize,
    /// Pattern index at `order`
    pub pattern: usize,
    pub row: u16,
    /// Rows in the current pattern
    pub num_rows: u16,
    /// Tick within the row
    pub frame: u16,
    pub speed: u8,
    pub bpm: u8,
    /// Elapsed play time in milliseconds
    pub time_ms: u64,
    /// Times the song wrapped around
    pub loop_count: u32,
    /// One entry per voice slot; unused slots stay zero
    pub channels: Vec<ChannelInfo, MAX_CHANNELS>,
}

impl FrameInfo {
    /// Empty snapshot with `capacity` zeroed channel slots.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut info = Self::default();
        info.reset_channels(capacity);
        info
    }

    /// Zero the channel slots, keeping `capacity` of them.
    pub fn reset_channels(&mut self, capacity: usize) {
        self.channels.clear();
        for _ in 0..capacity.min(MAX_CHANNELS) {
            // Capacity is bounded above
            let _ = self.channels.push(ChannelInfo::default());
        }
    }

    /// `[order, pattern, row, num_rows, frame, speed, bpm]`.
    pub fn values(&self) -> [i32; INFO_VALUES] {
        [
            self.order as i32,
            self.pattern as i32,
            self.row as i32,
            self.num_rows as i32,
            self.frame as i32,
            self.speed as i32,
            self.bpm as i32,
        ]
    }
}
