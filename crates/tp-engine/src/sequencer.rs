//! Transport position: order, row and tick, advanced one tick at a time.

use alloc::vec::Vec;
use tp_ir::{EventPayload, Module, MAX_CHANNELS};

/// Slowest tempo a module can set.
pub const MIN_BPM: u8 = 32;

/// Per-channel pattern loop (`E6x`) state.
#[derive(Clone, Copy, Debug, Default)]
struct PatternLoop {
    row: u16,
    remaining: u8,
}

/// Owns the transport position and the tick clock.
///
/// A tick lasts `sample_rate * 2.5 / bpm` frames and every `speed` ticks
/// the row advances. Order transitions into a row that was already played
/// (or past the end of the order list) count as a song loop.
#[derive(Clone, Debug)]
pub struct Sequencer {
    order: usize,
    row: u16,
    /// Tick within the row, including pattern delay repeats
    tick: u16,
    speed: u8,
    bpm: u8,
    pattern_delay: u8,
    jump: Option<usize>,
    break_row: Option<u16>,
    loop_jump: Option<u16>,
    loops: [PatternLoop; MAX_CHANNELS],
    /// Start of each order entry in `visited`
    row_offsets: Vec<usize>,
    visited: Vec<bool>,
    loop_count: u32,
    ended: bool,
    frame_remainder: u64,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            order: 0,
            row: 0,
            tick: 0,
            speed: 6,
            bpm: 125,
            pattern_delay: 0,
            jump: None,
            break_row: None,
            loop_jump: None,
            loops: [PatternLoop::default(); MAX_CHANNELS],
            row_offsets: Vec::new(),
            visited: Vec::new(),
            loop_count: 0,
            ended: false,
            frame_remainder: 0,
        }
    }

    /// Prime the sequencer for a module, starting at `order`.
    ///
    /// Allocates the visited-row map; call outside the render path.
    pub fn reset(&mut self, module: &Module, order: usize) {
        self.row_offsets.clear();
        let mut total = 0;
        for index in 0..module.order.len() {
            self.row_offsets.push(total);
            total += rows_at(module, index) as usize;
        }
        self.visited.clear();
        self.visited.resize(total, false);

        self.speed = module.initial_speed.max(1);
        self.bpm = module.initial_tempo.max(MIN_BPM);
        self.loop_count = 0;
        self.frame_remainder = 0;
        self.ended = module.order.is_empty();
        self.jump_to(order.min(module.order.len().saturating_sub(1)), 0);
    }

    /// Jump to the first row of an order entry, keeping speed and tempo.
    /// Returns false if the entry does not exist.
    pub fn set_position(&mut self, module: &Module, order: usize) -> bool {
        if order >= module.order.len() || self.row_offsets.len() != module.order.len() {
            return false;
        }
        self.visited.fill(false);
        self.ended = false;
        self.jump_to(order, 0);
        true
    }

    fn jump_to(&mut self, order: usize, row: u16) {
        self.order = order;
        self.row = row;
        self.tick = 0;
        self.pattern_delay = 0;
        self.jump = None;
        self.break_row = None;
        self.loop_jump = None;
        self.loops = [PatternLoop::default(); MAX_CHANNELS];
        self.mark_visited();
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn row(&self) -> u16 {
        self.row
    }

    /// Tick within the current row.
    pub fn tick(&self) -> u16 {
        self.tick
    }

    pub fn speed(&self) -> u8 {
        self.speed
    }

    pub fn bpm(&self) -> u8 {
        self.bpm
    }

    /// Number of times the song has wrapped or looped back.
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    /// True once the song ended with looping disabled.
    pub fn is_ended(&self) -> bool {
        self.ended
    }

    /// Pattern played at the current order entry.
    pub fn pattern_index(&self, module: &Module) -> Option<usize> {
        module.order.get(self.order).map(|&p| p as usize)
    }

    /// Rows in the current pattern.
    pub fn num_rows(&self, module: &Module) -> u16 {
        rows_at(module, self.order)
    }

    /// Apply a transport command decoded on the first tick of a row.
    pub fn apply(&mut self, payload: &EventPayload) {
        match *payload {
            EventPayload::SetSpeed(speed) if speed > 0 => self.speed = speed,
            EventPayload::SetTempo(bpm) if bpm >= MIN_BPM => {
                // The remainder is in units of the old denominator
                self.frame_remainder = self.frame_remainder * bpm as u64 / self.bpm as u64;
                self.bpm = bpm;
            }
            EventPayload::PositionJump(order) => self.jump = Some(order as usize),
            EventPayload::PatternBreak(row) => self.break_row = Some(row as u16),
            EventPayload::PatternDelay(ticks) if self.pattern_delay == 0 => {
                self.pattern_delay = ticks;
            }
            EventPayload::PatternLoop { channel, count } => {
                let Some(state) = self.loops.get_mut(channel as usize) else {
                    return;
                };
                if count == 0 {
                    state.row = self.row;
                } else if state.remaining == 0 {
                    state.remaining = count;
                    self.loop_jump = Some(state.row);
                } else {
                    state.remaining -= 1;
                    if state.remaining > 0 {
                        self.loop_jump = Some(state.row);
                    }
                }
            }
            _ => {}
        }
    }

    /// Frames in the next tick, carrying the fractional part forward.
    ///
    /// Never more than `max_tick_frames(sample_rate)`.
    pub fn frames_for_tick(&mut self, sample_rate: u32) -> usize {
        let numerator = sample_rate as u64 * 5 + self.frame_remainder;
        let denominator = 2 * self.bpm.max(MIN_BPM) as u64;
        self.frame_remainder = numerator % denominator;
        ((numerator / denominator) as usize).max(1)
    }

    /// Upper bound of [`Sequencer::frames_for_tick`] at any tempo.
    pub fn max_tick_frames(sample_rate: u32) -> usize {
        sample_rate as usize * 5 / (2 * MIN_BPM as usize) + 1
    }

    /// Move to the next tick. Returns false once the song has ended.
    pub fn advance(&mut self, module: &Module, loop_enabled: bool) -> bool {
        if self.ended {
            return false;
        }
        self.tick += 1;
        let row_ticks = self.speed as u16 * (1 + self.pattern_delay as u16);
        if self.tick < row_ticks {
            return true;
        }
        self.tick = 0;
        self.pattern_delay = 0;
        self.next_row(module, loop_enabled)
    }

    fn next_row(&mut self, module: &Module, loop_enabled: bool) -> bool {
        if let Some(row) = self.loop_jump.take() {
            self.jump = None;
            self.break_row = None;
            self.row = row;
            self.mark_visited();
            return true;
        }

        if self.jump.is_some() || self.break_row.is_some() {
            let order = self.jump.take().unwrap_or(self.order + 1);
            let row = self.break_row.take().unwrap_or(0);
            return self.enter_order(module, order, row, loop_enabled);
        }

        let next = self.row + 1;
        if next < self.num_rows(module) {
            self.row = next;
            self.mark_visited();
            true
        } else {
            self.enter_order(module, self.order + 1, 0, loop_enabled)
        }
    }

    fn enter_order(&mut self, module: &Module, order: usize, row: u16, loop_enabled: bool) -> bool {
        let len = module.order.len();
        let wrapped = order >= len;
        let order = if wrapped {
            if module.restart_position < len { module.restart_position } else { 0 }
        } else {
            order
        };
        let row = if wrapped || row >= rows_at(module, order) { 0 } else { row };

        if wrapped || self.is_visited(order, row) {
            self.loop_count += 1;
            if !loop_enabled {
                self.ended = true;
                return false;
            }
            self.visited.fill(false);
        }
        self.jump_to(order, row);
        true
    }

    fn visited_index(&self, order: usize, row: u16) -> Option<usize> {
        self.row_offsets.get(order).map(|start| start + row as usize)
    }

    fn is_visited(&self, order: usize, row: u16) -> bool {
        self.visited_index(order, row)
            .and_then(|i| self.visited.get(i))
            .copied()
            .unwrap_or(false)
    }

    fn mark_visited(&mut self) {
        if let Some(slot) = self
            .visited_index(self.order, self.row)
            .and_then(|i| self.visited.get_mut(i))
        {
            *slot = true;
        }
    }
}

/// Rows of the pattern at an order entry (at least one).
fn rows_at(module: &Module, order: usize) -> u16 {
    module.pattern_at(order).map_or(1, |p| p.rows.max(1))
}
