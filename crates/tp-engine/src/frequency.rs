//! Note, period and frequency conversion for sample playback.
//!
//! Periods are kept in FastTracker II units: four times the classic Amiga
//! period, so key 48 (C-4) is period 1712 in the Amiga tables and 4608 in
//! the linear table. Both play a sample at its base rate of 8363 Hz.

use libm::{exp2f, roundf};
use tp_ir::FrequencyMode;

/// Sample rate that plays a sample at its recorded pitch on key 48.
pub const BASE_RATE: u32 = 8363;

/// Key that plays a sample at [`BASE_RATE`].
pub const REFERENCE_KEY: u8 = 48;

/// Amiga period of the reference key, in internal units.
const REFERENCE_PERIOD: u32 = 1712;

/// Linear period of the reference key.
const LINEAR_REFERENCE: i32 = 4608;

/// Lowest allowed period in ProTracker mode (B-3, Amiga period 113).
pub const PROTRACKER_MIN: u32 = 113 * 4;

/// Highest allowed period in ProTracker mode (C-1, Amiga period 856).
pub const PROTRACKER_MAX: u32 = 856 * 4;

const EXTENDED_MIN: u32 = 1;
const EXTENDED_MAX: u32 = 32000;

/// Amiga periods for keys 36-47, C-1 to B-1 in ProTracker notation.
const BASE_PERIODS: [u16; 12] = [856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453];

/// Period for a key (0-119) and finetune (1/128 semitone).
pub fn note_to_period(mode: FrequencyMode, key: u8, finetune: i8) -> u32 {
    match mode {
        FrequencyMode::Linear => {
            let period = 7680 - key as i32 * 64 - finetune as i32 / 2;
            period.max(1) as u32
        }
        FrequencyMode::ProTracker | FrequencyMode::Amiga => {
            let offset = key as i32 - 36;
            let semitone = offset.rem_euclid(12) as usize;
            let octave = offset.div_euclid(12);
            let base = BASE_PERIODS[semitone] as u32 * 4;
            let period = if octave >= 0 {
                base >> octave as u32
            } else {
                base << (-octave) as u32
            };
            if finetune == 0 {
                return period.max(1);
            }
            let tuned = period as f32 * exp2f(-(finetune as f32) / 1536.0);
            (roundf(tuned) as u32).max(1)
        }
    }
}

/// Allowed period range for slides.
pub fn period_limits(mode: FrequencyMode) -> (u32, u32) {
    match mode {
        FrequencyMode::ProTracker => (PROTRACKER_MIN, PROTRACKER_MAX),
        FrequencyMode::Amiga | FrequencyMode::Linear => (EXTENDED_MIN, EXTENDED_MAX),
    }
}

/// Clamp a period to the range of the frequency mode.
pub fn clamp_period(mode: FrequencyMode, period: i32) -> u32 {
    let (min, max) = period_limits(mode);
    period.clamp(min as i32, max as i32) as u32
}

/// Convert a period to a 16.16 fixed-point increment at the output rate.
pub fn period_to_increment(mode: FrequencyMode, period: u32, sample_rate: u32) -> u32 {
    if period == 0 || sample_rate == 0 {
        return 0;
    }
    match mode {
        FrequencyMode::Linear => {
            let exponent = (LINEAR_REFERENCE - period as i32) as f32 / 768.0;
            let freq = BASE_RATE as f32 * exp2f(exponent);
            (freq * 65536.0 / sample_rate as f32) as u32
        }
        FrequencyMode::ProTracker | FrequencyMode::Amiga => {
            let num = BASE_RATE as u64 * REFERENCE_PERIOD as u64 * 65536;
            (num / (period as u64 * sample_rate as u64)).min(u32::MAX as u64) as u32
        }
    }
}

/// Compute the 16.16 fixed-point increment for a key played without finetune.
pub fn note_to_increment(mode: FrequencyMode, key: u8, sample_rate: u32) -> u32 {
    period_to_increment(mode, note_to_period(mode, key, 0), sample_rate)
}

/// Period distance of `semitones` above the given key, for arpeggio.
pub fn semitone_offset(mode: FrequencyMode, key: u8, finetune: i8, semitones: u8) -> i32 {
    let upper = key.saturating_add(semitones).min(119);
    note_to_period(mode, upper, finetune) as i32 - note_to_period(mode, key, finetune) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_RATE: u32 = 44100;
    const MODES: [FrequencyMode; 3] =
        [FrequencyMode::ProTracker, FrequencyMode::Amiga, FrequencyMode::Linear];

    fn base_increment() -> u32 {
        (BASE_RATE as u64 * 65536 / SAMPLE_RATE as u64) as u32
    }

    #[test]
    fn reference_key_gives_base_rate() {
        for mode in MODES {
            let inc = note_to_increment(mode, REFERENCE_KEY, SAMPLE_RATE);
            assert!((inc as i64 - base_increment() as i64).abs() <= 1, "{:?}", mode);
        }
    }

    #[test]
    fn amiga_periods_follow_the_table() {
        assert_eq!(note_to_period(FrequencyMode::Amiga, 36, 0), 856 * 4);
        assert_eq!(note_to_period(FrequencyMode::Amiga, 48, 0), 1712);
        assert_eq!(note_to_period(FrequencyMode::Amiga, 49, 0), 404 * 4);
        assert_eq!(note_to_period(FrequencyMode::Amiga, 60, 0), 856);
    }

    #[test]
    fn linear_period_is_64_units_per_semitone() {
        assert_eq!(note_to_period(FrequencyMode::Linear, 48, 0), 4608);
        assert_eq!(note_to_period(FrequencyMode::Linear, 49, 0), 4544);
        assert_eq!(note_to_period(FrequencyMode::Linear, 48, 64), 4576);
    }

    #[test]
    fn octave_up_doubles_increment() {
        for mode in MODES {
            let base = note_to_increment(mode, 48, SAMPLE_RATE);
            let up = note_to_increment(mode, 60, SAMPLE_RATE);
            assert!((up as i64 - base as i64 * 2).abs() <= 2, "{:?}", mode);
        }
    }

    #[test]
    fn negative_finetune_lowers_pitch() {
        let plain = note_to_period(FrequencyMode::ProTracker, 48, 0);
        let flat = note_to_period(FrequencyMode::ProTracker, 48, -64);
        let sharp = note_to_period(FrequencyMode::ProTracker, 48, 64);
        assert!(flat > plain);
        assert!(sharp < plain);
    }

    #[test]
    fn protracker_clamp() {
        assert_eq!(clamp_period(FrequencyMode::ProTracker, 100), PROTRACKER_MIN);
        assert_eq!(clamp_period(FrequencyMode::ProTracker, 5000), PROTRACKER_MAX);
        assert_eq!(clamp_period(FrequencyMode::Amiga, 100), 100);
        assert_eq!(clamp_period(FrequencyMode::Linear, -5), 1);
    }

    #[test]
    fn zero_inputs_give_zero_increment() {
        assert_eq!(period_to_increment(FrequencyMode::Amiga, 0, SAMPLE_RATE), 0);
        assert_eq!(period_to_increment(FrequencyMode::Linear, 4608, 0), 0);
    }

    #[test]
    fn arpeggio_offset_is_negative_going_up() {
        let off = semitone_offset(FrequencyMode::Linear, 48, 0, 12);
        assert_eq!(off, -768);
        assert!(semitone_offset(FrequencyMode::Amiga, 48, 0, 7) < 0);
    }
}
