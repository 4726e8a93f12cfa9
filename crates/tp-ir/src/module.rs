//! The loaded module: patterns, order list and instruments.

use alloc::string::String;
use alloc::vec::Vec;
use arrayvec::ArrayString;

use crate::instrument::Instrument;
use crate::pattern::Pattern;

/// Upper bound on channels (and voices) any module or engine may use.
pub const MAX_CHANNELS: usize = 64;

/// How note periods map to playback frequency.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FrequencyMode {
    /// Amiga periods limited to the three ProTracker octaves (113..=856).
    #[default]
    ProTracker,
    /// Amiga periods over the full 10-octave range (FastTracker II Amiga table).
    Amiga,
    /// FastTracker II linear periods (64 units per semitone).
    Linear,
}

/// Per-channel defaults.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChannelSettings {
    /// Initial panning (0 = left, 128 = center, 255 = right)
    pub initial_pan: u8,
    /// Initial channel volume (0-64)
    pub initial_volume: u8,
}

impl Default for ChannelSettings {
    fn default() -> Self {
        Self { initial_pan: 128, initial_volume: 64 }
    }
}

/// A parsed module. Immutable once a loader hands it over.
#[derive(Clone, Debug)]
pub struct Module {
    /// Song title
    pub title: ArrayString<32>,
    /// Short format identifier, e.g. `M.K.` or `XM`
    pub format: ArrayString<16>,
    /// Human readable module type, e.g. `ProTracker M.K.`
    pub module_type: String,
    /// Free-form comment, if the format carries one
    pub comment: Option<String>,
    /// Initial speed (ticks per row)
    pub initial_speed: u8,
    /// Initial tempo in BPM
    pub initial_tempo: u8,
    /// Global volume (0-64)
    pub global_volume: u8,
    /// Order index playback wraps to when looping
    pub restart_position: usize,
    /// Period table
    pub frequency_mode: FrequencyMode,
    /// Per-channel settings; the length is the module's channel count
    pub channels: Vec<ChannelSettings>,
    /// Order list: pattern indices in playback order
    pub order: Vec<u8>,
    /// Patterns
    pub patterns: Vec<Pattern>,
    /// Instruments (instrument number N in a cell refers to index N - 1)
    pub instruments: Vec<Instrument>,
}

impl Default for Module {
    fn default() -> Self {
        Self {
            title: ArrayString::new(),
            format: ArrayString::new(),
            module_type: String::new(),
            comment: None,
            initial_speed: 6,
            initial_tempo: 125,
            global_volume: 64,
            restart_position: 0,
            frequency_mode: FrequencyMode::ProTracker,
            channels: Vec::new(),
            order: Vec::new(),
            patterns: Vec::new(),
            instruments: Vec::new(),
        }
    }
}

impl Module {
    /// Create an empty module.
    pub fn new(title: &str) -> Self {
        let mut module = Self::default();
        push_truncated(&mut module.title, title);
        module
    }

    /// Create a module with Amiga-style hard panning (L R R L ...).
    pub fn with_channels(title: &str, num_channels: u8) -> Self {
        let mut module = Self::new(title);
        for i in 0..num_channels {
            let initial_pan = match i % 4 {
                0 | 3 => 0,
                _ => 255,
            };
            module.channels.push(ChannelSettings { initial_pan, initial_volume: 64 });
        }
        module
    }

    /// Number of channels the module uses.
    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    /// Pattern played at the given order position.
    pub fn pattern_at(&self, order: usize) -> Option<&Pattern> {
        let index = *self.order.get(order)?;
        self.patterns.get(index as usize)
    }

    /// Total number of samples across all instruments.
    pub fn num_samples(&self) -> usize {
        self.instruments.iter().map(|inst| inst.samples.len()).sum()
    }

    /// First order entry that references a pattern the module does not have.
    pub fn missing_pattern(&self) -> Option<(usize, u8)> {
        self.order
            .iter()
            .enumerate()
            .find(|(_, &p)| p as usize >= self.patterns.len())
            .map(|(i, &p)| (i, p))
    }

    /// Set the format identifier.
    pub fn set_format(&mut self, format: &str) {
        self.format.clear();
        push_truncated(&mut self.format, format);
    }
}

/// Push as much of `s` as fits, respecting char boundaries.
pub(crate) fn push_truncated<const N: usize>(dst: &mut ArrayString<N>, s: &str) {
    for c in s.chars() {
        if dst.try_push(c).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amiga_panning_layout() {
        let module = Module::with_channels("test", 8);
        let pans: Vec<u8> = module.channels.iter().map(|c| c.initial_pan).collect();
        assert_eq!(pans, [0, 255, 255, 0, 0, 255, 255, 0]);
    }

    #[test]
    fn long_title_is_truncated() {
        let module = Module::new("a title that is much longer than thirty-two characters");
        assert_eq!(module.title.len(), 32);
    }

    #[test]
    fn missing_pattern_reports_first_bad_entry() {
        let mut module = Module::with_channels("t", 4);
        module.patterns.push(Pattern::new(64, 4));
        module.order = alloc::vec![0, 0, 3, 5];
        assert_eq!(module.missing_pattern(), Some((2, 3)));
        module.order.truncate(2);
        assert_eq!(module.missing_pattern(), None);
    }

    #[test]
    fn pattern_at_follows_order() {
        let mut module = Module::with_channels("t", 4);
        module.patterns.push(Pattern::new(64, 4));
        module.patterns.push(Pattern::new(32, 4));
        module.order = alloc::vec![1, 0];
        assert_eq!(module.pattern_at(0).map(|p| p.rows), Some(32));
        assert_eq!(module.pattern_at(1).map(|p| p.rows), Some(64));
        assert!(module.pattern_at(2).is_none());
    }
}
