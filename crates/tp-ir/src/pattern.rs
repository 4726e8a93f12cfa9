//! Pattern grid: rows of cells, one cell per channel.

use alloc::vec::Vec;
use crate::effects::{Effect, VolumeCommand};

/// Note column of a cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Note {
    #[default]
    None,
    /// Key number 0-119; key 48 (C-4) plays a sample at its base rate
    On(u8),
    /// Key off (FastTracker II `===`)
    Off,
}

/// One channel's entry on one row.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Cell {
    pub note: Note,
    /// 1-based instrument number, 0 for none
    pub instrument: u8,
    pub volume: VolumeCommand,
    pub effect: Effect,
}

impl Cell {
    pub const fn empty() -> Self {
        Self {
            note: Note::None,
            instrument: 0,
            volume: VolumeCommand::None,
            effect: Effect::None,
        }
    }
}

/// Row-major grid of `rows * channels` cells.
#[derive(Clone, Debug)]
pub struct Pattern {
    /// 1 to 256 rows
    pub rows: u16,
    pub channels: u8,
    pub data: Vec<Cell>,
}

impl Pattern {
    pub fn new(rows: u16, channels: u8) -> Self {
        Self {
            rows,
            channels,
            data: alloc::vec![Cell::empty(); rows as usize * channels as usize],
        }
    }

    fn index(&self, row: u16, channel: u8) -> usize {
        debug_assert!(row < self.rows && channel < self.channels);
        row as usize * self.channels as usize + channel as usize
    }

    pub fn cell(&self, row: u16, channel: u8) -> &Cell {
        &self.data[self.index(row, channel)]
    }

    pub fn cell_mut(&mut self, row: u16, channel: u8) -> &mut Cell {
        let index = self.index(row, channel);
        &mut self.data[index]
    }

    /// Cells of one row, or an empty slice past the last row.
    pub fn row(&self, row: u16) -> &[Cell] {
        let start = row as usize * self.channels as usize;
        self.data.get(start..start + self.channels as usize).unwrap_or(&[])
    }
}
