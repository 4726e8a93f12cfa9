//! In-memory module builders shared by the integration tests.

#![allow(dead_code)]

use std::io::Cursor;

use tp_audio::NullOutput;
use tp_master::{PlayerConfig, Session};

pub const SAMPLE_RATE: u32 = 8000;

/// A ProTracker cell: period, 1-based sample, effect command and parameter.
#[derive(Clone, Copy)]
pub struct ModCell {
    pub period: u16,
    pub sample: u8,
    pub effect: u8,
    pub param: u8,
}

impl ModCell {
    pub fn note(period: u16, sample: u8) -> Self {
        Self { period, sample, effect: 0, param: 0 }
    }

    pub fn effect(effect: u8, param: u8) -> Self {
        Self { period: 0, sample: 0, effect, param }
    }

    fn bytes(self) -> [u8; 4] {
        [
            (self.sample & 0xF0) | (self.period >> 8) as u8 & 0x0F,
            self.period as u8,
            (self.sample << 4) | (self.effect & 0x0F),
            self.param,
        ]
    }
}

/// 4-channel `M.K.` module with `patterns` 64-row patterns, the given order
/// list and one looping 128-byte square wave sample.
/// `cells` are `(pattern, row, channel, cell)`.
pub fn build_mod(title: &str, order: &[u8], patterns: usize, cells: &[(usize, usize, usize, ModCell)]) -> Vec<u8> {
    let mut data = vec![0u8; 1084];
    data[..title.len().min(20)].copy_from_slice(&title.as_bytes()[..title.len().min(20)]);
    let header = &mut data[20..50];
    header[..6].copy_from_slice(b"square");
    header[22..24].copy_from_slice(&64u16.to_be_bytes());
    header[25] = 64;
    header[26..28].copy_from_slice(&0u16.to_be_bytes());
    header[28..30].copy_from_slice(&64u16.to_be_bytes());
    data[950] = order.len() as u8;
    data[951] = 0;
    data[952..952 + order.len()].copy_from_slice(order);
    data[1080..1084].copy_from_slice(b"M.K.");

    data.resize(1084 + patterns * 1024, 0);
    for &(pattern, row, channel, cell) in cells {
        let offset = 1084 + pattern * 1024 + row * 16 + channel * 4;
        data[offset..offset + 4].copy_from_slice(&cell.bytes());
    }
    data.extend((0..128).map(|i| if i < 64 { 0x60u8 } else { 0xA0 }));
    data
}

/// The two-pattern song: order `[0, 1]`, speed 6, bpm 125, a note on
/// every channel at the top of each pattern.
pub fn two_pattern_song() -> Vec<u8> {
    let mut cells = Vec::new();
    for pattern in 0..2 {
        for channel in 0..4 {
            cells.push((pattern, 0, channel, ModCell::note(428, 1)));
        }
    }
    build_mod("two patterns", &[0, 1], 2, &cells)
}

pub fn null_config() -> PlayerConfig {
    PlayerConfig {
        sample_rate: SAMPLE_RATE,
        backend: tp_audio::Backend::Null,
        ..PlayerConfig::default()
    }
}

/// Initialised session on a null output.
pub fn session() -> Session {
    let mut session = Session::new(null_config());
    assert!(session.init_with_output(Box::new(NullOutput::new(SAMPLE_RATE, 100))));
    session
}

/// Initialised session with `data` loaded.
pub fn loaded(data: &[u8]) -> Session {
    let mut session = session();
    assert!(session.load_from_source(Cursor::new(data)));
    session
}
