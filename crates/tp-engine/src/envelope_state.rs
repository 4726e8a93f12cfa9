//! Runtime position within an instrument envelope.

use tp_ir::Envelope;

/// Playback cursor for one instrument envelope.
///
/// The cursor counts ticks. It holds on the sustain point while the key
/// is down and jumps from the loop end back to the loop start.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EnvelopeCursor {
    tick: u16,
}

impl EnvelopeCursor {
    /// Create a cursor at the first point.
    pub const fn new() -> Self {
        Self { tick: 0 }
    }

    /// Rewind to the first point.
    pub fn reset(&mut self) {
        self.tick = 0;
    }

    /// Current tick position.
    pub fn position(&self) -> u16 {
        self.tick
    }

    /// Jump to an absolute tick (FastTracker II `Lxx`).
    pub fn set_position(&mut self, tick: u16) {
        self.tick = tick;
    }

    /// Envelope value at the cursor.
    pub fn value(&self, envelope: &Envelope) -> i8 {
        envelope.value_at(self.tick)
    }

    /// Whether the cursor is past the last point.
    pub fn is_finished(&self, envelope: &Envelope) -> bool {
        envelope
            .points
            .last()
            .map_or(true, |last| self.tick >= last.tick)
    }

    /// Advance one tick.
    pub fn advance(&mut self, envelope: &Envelope, key_on: bool) {
        if envelope.points.len() < 2 {
            return;
        }
        if key_on && envelope.point_tick(envelope.sustain) == Some(self.tick) {
            return;
        }

        if let (Some(start), Some(end)) = (
            envelope.point_tick(envelope.loop_start),
            envelope.point_tick(envelope.loop_end),
        ) {
            if self.tick >= end {
                self.tick = start;
                return;
            }
        }

        let last = envelope.points.last().map_or(0, |p| p.tick);
        self.tick = self.tick.saturating_add(1).min(last);
    }
}
