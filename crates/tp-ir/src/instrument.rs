//! Instrument and envelope types.

use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::sample::Sample;

/// Number of keys an instrument maps to samples.
pub const NUM_KEYS: usize = 120;

/// An instrument definition. Owns its samples.
#[derive(Clone, Debug)]
pub struct Instrument {
    /// Instrument name
    pub name: ArrayString<32>,
    /// Samples owned by this instrument
    pub samples: Vec<Sample>,
    /// Sample mapping: key (0-119) -> index into `samples`
    pub sample_map: [u8; NUM_KEYS],
    /// Volume envelope
    pub volume_envelope: Option<Envelope>,
    /// Panning envelope
    pub panning_envelope: Option<Envelope>,
    /// Fadeout speed applied after key off (0 = no fade)
    pub fadeout: u16,
    /// Auto-vibrato settings
    pub vibrato: AutoVibrato,
}

impl Default for Instrument {
    fn default() -> Self {
        Self {
            name: ArrayString::new(),
            samples: Vec::new(),
            sample_map: [0; NUM_KEYS],
            volume_envelope: None,
            panning_envelope: None,
            fadeout: 0,
            vibrato: AutoVibrato::default(),
        }
    }
}

impl Instrument {
    /// Create a new instrument with default settings.
    pub fn new(name: &str) -> Self {
        let mut inst = Self::default();
        crate::module::push_truncated(&mut inst.name, name);
        inst
    }

    /// Create an instrument holding one sample mapped to every key.
    pub fn with_sample(name: &str, sample: Sample) -> Self {
        let mut inst = Self::new(name);
        inst.samples.push(sample);
        inst
    }

    /// Sample played for the given key, if any.
    pub fn sample_for_key(&self, key: u8) -> Option<(usize, &Sample)> {
        let index = *self.sample_map.get(key as usize)? as usize;
        self.samples.get(index).map(|s| (index, s))
    }
}

/// Auto-vibrato settings (FastTracker II instruments).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct AutoVibrato {
    /// Waveform (0=sine, 1=square, 2=ramp down, 3=ramp up)
    pub waveform: u8,
    /// Ticks until full depth is reached
    pub sweep: u8,
    /// Depth
    pub depth: u8,
    /// Phase increment per tick
    pub rate: u8,
}

/// An envelope (volume or panning).
#[derive(Clone, Debug, Default)]
pub struct Envelope {
    /// Envelope points, ticks strictly increasing
    pub points: Vec<EnvelopePoint>,
    /// Sustain point index (None = no sustain)
    pub sustain: Option<u8>,
    /// Loop start point index (None = no loop)
    pub loop_start: Option<u8>,
    /// Loop end point index
    pub loop_end: Option<u8>,
    /// Is the envelope enabled?
    pub enabled: bool,
}

impl Envelope {
    /// Create a new empty envelope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a point to the envelope.
    pub fn add_point(&mut self, tick: u16, value: i8) {
        self.points.push(EnvelopePoint { tick, value });
    }

    /// Tick position of the point with the given index.
    pub fn point_tick(&self, index: Option<u8>) -> Option<u16> {
        index.and_then(|i| self.points.get(i as usize)).map(|p| p.tick)
    }

    /// Get the interpolated value at a given tick.
    pub fn value_at(&self, tick: u16) -> i8 {
        if self.points.is_empty() {
            return 0;
        }

        let mut prev = &self.points[0];
        for point in &self.points {
            if point.tick > tick {
                if point.tick == prev.tick {
                    return point.value;
                }
                let t = tick.saturating_sub(prev.tick) as i32;
                let d = (point.tick - prev.tick) as i32;
                let v = prev.value as i32 + (point.value as i32 - prev.value as i32) * t / d;
                return v as i8;
            }
            prev = point;
        }

        // Past the last point
        prev.value
    }
}

/// A point in an envelope.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EnvelopePoint {
    /// Tick position
    pub tick: u16,
    /// Value (0-64; 32 is center for panning)
    pub value: i8,
}
