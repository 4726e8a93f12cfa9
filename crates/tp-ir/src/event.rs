//! Channel and global commands decoded from pattern rows.

use crate::effects::{Effect, VolumeCommand};
use crate::pattern::Note;

/// A command produced by decoding one pattern cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Event {
    /// Where the event is routed
    pub target: EventTarget,
    /// What the event does
    pub payload: EventPayload,
}

impl Event {
    /// Create a new event.
    pub const fn new(target: EventTarget, payload: EventPayload) -> Self {
        Self { target, payload }
    }
}

/// Where an event is routed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventTarget {
    /// Tracker channel
    Channel(u8),
    /// Transport (speed, tempo, order flow, global volume)
    Global,
}

/// What an event does.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventPayload {
    // === Note events ===
    /// Trigger a note (instrument 0 = keep the channel's instrument)
    NoteOn { note: u8, instrument: u8 },
    /// Release the note (key off)
    NoteOff,
    /// Set portamento target (TonePorta + note: don't trigger, just set target)
    PortaTarget { note: u8, instrument: u8 },
    /// Instrument number without a note: reload default volume and panning
    Instrument(u8),
    /// Note (or key off, or bare instrument) held back until the given tick
    DelayedNote { note: Note, instrument: u8, ticks: u8 },

    // === Channel commands ===
    /// Volume column command
    Volume(VolumeCommand),
    /// A tracker effect command
    Effect(Effect),

    // === Transport ===
    /// Set speed (ticks per row)
    SetSpeed(u8),
    /// Set tempo in BPM
    SetTempo(u8),
    /// Continue at the given order after this row
    PositionJump(u8),
    /// Continue at the given row of the next order after this row
    PatternBreak(u8),
    /// Repeat the current row n extra times
    PatternDelay(u8),
    /// Pattern loop on the given channel (0 = set loop start)
    PatternLoop { channel: u8, count: u8 },
    /// Set global volume (0-64)
    SetGlobalVolume(u8),
    /// Global volume slide per tick
    GlobalVolumeSlide(i8),
}
