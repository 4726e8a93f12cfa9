//! Audio frame type.

/// A stereo audio frame (16-bit integer).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Frame {
    pub left: i16,
    pub right: i16,
}

impl Frame {
    /// Create a silent frame.
    pub const fn silence() -> Self {
        Self { left: 0, right: 0 }
    }

    /// Create a mono frame (same value for both channels).
    pub const fn mono(value: i16) -> Self {
        Self {
            left: value,
            right: value,
        }
    }

    /// Build a frame from 32-bit accumulators, clamping to the 16-bit range.
    pub fn from_accumulator(left: i32, right: i32) -> Self {
        Self {
            left: left.clamp(-32768, 32767) as i16,
            right: right.clamp(-32768, 32767) as i16,
        }
    }

    /// Mix another frame into this one.
    pub fn mix(&mut self, other: Frame) {
        *self = Self::from_accumulator(
            self.left as i32 + other.left as i32,
            self.right as i32 + other.right as i32,
        );
    }

    /// Left and right as normalized floats, for float output devices.
    pub fn to_f32(self) -> (f32, f32) {
        (self.left as f32 / 32768.0, self.right as f32 / 32768.0)
    }
}
