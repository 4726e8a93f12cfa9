//! Decoding of pattern rows into channel and global commands.

use heapless::Vec;
use tp_ir::{Cell, Effect, Event, EventPayload, EventTarget, Module, Note, VolumeCommand, MAX_CHANNELS};

/// Upper bound on events one row can produce: three per channel.
pub const QUEUE_CAPACITY: usize = MAX_CHANNELS * 3;

/// Events decoded from the current row.
///
/// Fixed capacity so decoding on the render path never allocates.
#[derive(Clone, Debug, Default)]
pub struct EventQueue {
    events: Vec<Event, QUEUE_CAPACITY>,
}

impl EventQueue {
    /// Create a new empty event queue.
    pub const fn new() -> Self {
        Self { events: Vec::new() }
    }

    /// Push an event. Returns false if the queue is full.
    pub fn push(&mut self, event: Event) -> bool {
        self.events.push(event).is_ok()
    }

    /// Clear all events.
    pub fn clear(&mut self) {
        self.events.clear();
    }

    /// Returns true if the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Returns the number of events in the queue.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Events in the order they were decoded.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter()
    }

    /// Get an event by index.
    pub fn get(&self, index: usize) -> Option<&Event> {
        self.events.get(index)
    }

    /// Replace the queue contents with the commands of one row.
    ///
    /// Per cell the note command comes first, then the volume column, then
    /// the effect, so effects see the note they belong to.
    pub fn decode_row(&mut self, module: &Module, order: usize, row: u16) {
        self.events.clear();
        let Some(pattern) = module.pattern_at(order) else {
            return;
        };
        for (ch, cell) in pattern.row(row).iter().enumerate() {
            self.decode_cell(cell, ch as u8);
        }
    }

    fn decode_cell(&mut self, cell: &Cell, ch: u8) {
        let target = EventTarget::Channel(ch);
        let delay = match cell.effect {
            Effect::NoteDelay(ticks) if ticks > 0 => Some(ticks),
            _ => None,
        };
        let porta = cell.effect.is_tone_porta() || matches!(cell.volume, VolumeCommand::TonePorta(_));

        let note = match (cell.note, delay) {
            (Note::None, _) if cell.instrument == 0 => None,
            (note, Some(ticks)) => Some(EventPayload::DelayedNote {
                note,
                instrument: cell.instrument,
                ticks,
            }),
            (Note::On(note), None) if porta => Some(EventPayload::PortaTarget {
                note,
                instrument: cell.instrument,
            }),
            (Note::On(note), None) => Some(EventPayload::NoteOn {
                note,
                instrument: cell.instrument,
            }),
            (Note::Off, None) => Some(EventPayload::NoteOff),
            (Note::None, None) => Some(EventPayload::Instrument(cell.instrument)),
        };
        if let Some(payload) = note {
            self.push(Event::new(target, payload));
        }

        if cell.volume != VolumeCommand::None {
            self.push(Event::new(target, EventPayload::Volume(cell.volume)));
        }

        let global = match cell.effect {
            Effect::None | Effect::NoteDelay(_) => return,
            Effect::SetSpeed(s) => EventPayload::SetSpeed(s),
            Effect::SetTempo(t) => EventPayload::SetTempo(t),
            Effect::PositionJump(o) => EventPayload::PositionJump(o),
            Effect::PatternBreak(r) => EventPayload::PatternBreak(r),
            Effect::PatternDelay(d) => EventPayload::PatternDelay(d),
            Effect::PatternLoop(count) => EventPayload::PatternLoop { channel: ch, count },
            Effect::SetGlobalVolume(v) => EventPayload::SetGlobalVolume(v),
            Effect::GlobalVolumeSlide(s) => EventPayload::GlobalVolumeSlide(s),
            effect => {
                self.push(Event::new(target, EventPayload::Effect(effect)));
                return;
            }
        };
        self.push(Event::new(EventTarget::Global, global));
    }
}
