//! Sample data types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

/// A sample definition.
#[derive(Clone, Debug)]
pub struct Sample {
    /// Sample name
    pub name: ArrayString<32>,
    /// Audio data
    pub data: SampleData,
    /// Loop start position (in frames)
    pub loop_start: u32,
    /// Loop end position (in frames, exclusive)
    pub loop_end: u32,
    /// Loop type
    pub loop_type: LoopType,
    /// Default volume (0-64)
    pub default_volume: u8,
    /// Default panning (0-255), used by formats with per-sample panning
    pub default_pan: Option<u8>,
    /// Finetune in 1/128 semitone steps
    pub finetune: i8,
    /// Transpose in semitones applied to every key
    pub relative_note: i8,
}

impl Default for Sample {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            data: SampleData::Mono8(Vec::new()),
            loop_start: 0,
            loop_end: 0,
            loop_type: LoopType::None,
            default_volume: 64,
            default_pan: None,
            finetune: 0,
            relative_note: 0,
        }
    }
}

impl Sample {
    /// Create a new empty sample.
    pub fn new(name: &str) -> Self {
        let mut sample = Self::default();
        crate::module::push_truncated(&mut sample.name, name);
        sample
    }

    /// Get the length of the sample in frames.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the sample has no data.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns true if the sample has a loop.
    pub fn has_loop(&self) -> bool {
        self.loop_type != LoopType::None && self.loop_end > self.loop_start
    }
}

/// Sample audio data.
#[derive(Clone, Debug)]
pub enum SampleData {
    /// 8-bit mono samples
    Mono8(Vec<i8>),
    /// 16-bit mono samples
    Mono16(Vec<i16>),
    /// 8-bit stereo samples (left, right)
    Stereo8(Vec<i8>, Vec<i8>),
    /// 16-bit stereo samples (left, right)
    Stereo16(Vec<i16>, Vec<i16>),
}

impl SampleData {
    /// Get the number of sample frames.
    pub fn len(&self) -> usize {
        match self {
            SampleData::Mono8(v) => v.len(),
            SampleData::Mono16(v) => v.len(),
            SampleData::Stereo8(l, _) => l.len(),
            SampleData::Stereo16(l, _) => l.len(),
        }
    }

    /// Returns true if empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of channels in the sample data.
    pub fn num_channels(&self) -> u16 {
        match self {
            SampleData::Mono8(_) | SampleData::Mono16(_) => 1,
            SampleData::Stereo8(_, _) | SampleData::Stereo16(_, _) => 2,
        }
    }

    /// Get a mono sample value at position (as i16).
    /// For stereo, returns the left channel.
    pub fn get_mono(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) => v.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Mono16(v) => v.get(pos).copied().unwrap_or(0),
            SampleData::Stereo8(l, _) => l.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Stereo16(l, _) => l.get(pos).copied().unwrap_or(0),
        }
    }

    /// Get a sample from the right channel (returns left for mono).
    pub fn get_right(&self, pos: usize) -> i16 {
        match self {
            SampleData::Mono8(v) => v.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Mono16(v) => v.get(pos).copied().unwrap_or(0),
            SampleData::Stereo8(_, r) => r.get(pos).copied().unwrap_or(0) as i16 * 256,
            SampleData::Stereo16(_, r) => r.get(pos).copied().unwrap_or(0),
        }
    }

    /// Get a linearly interpolated mono sample value.
    ///
    /// `pos_fixed` is a 16.16 fixed-point position. Blends between the two
    /// nearest sample values using the fractional part.
    pub fn get_mono_interpolated(&self, pos_fixed: u64) -> i16 {
        let (idx, frac) = split_fixed(pos_fixed);
        lerp(self.get_mono(idx), self.get_mono(idx + 1), frac)
    }

    /// Linearly interpolated right channel (left for mono).
    pub fn get_right_interpolated(&self, pos_fixed: u64) -> i16 {
        let (idx, frac) = split_fixed(pos_fixed);
        lerp(self.get_right(idx), self.get_right(idx + 1), frac)
    }
}

fn split_fixed(pos_fixed: u64) -> (usize, i64) {
    ((pos_fixed >> 16) as usize, (pos_fixed & 0xFFFF) as i64)
}

fn lerp(a: i16, b: i16, frac: i64) -> i16 {
    let (a, b) = (a as i64, b as i64);
    (a + (((b - a) * frac) >> 16)) as i16
}

/// Sample loop type.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LoopType {
    /// No loop
    #[default]
    None,
    /// Forward loop
    Forward,
    /// Ping-pong (bidirectional) loop
    PingPong,
}
