//! Audio output trait and error types.

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tp_engine::Frame;

/// Error type for audio operations.
#[derive(Debug, Error)]
pub enum AudioError {
    #[error("no audio output device available")]
    NoDevice,
    #[error("device init error: {0}")]
    DeviceInit(String),
    #[error("stream create error: {0}")]
    StreamCreate(String),
    #[error("playback error: {0}")]
    Playback(String),
    /// The device stopped consuming frames
    #[error("output stalled for {0:?}")]
    Stalled(Duration),
    /// Reported asynchronously by the device stream
    #[error("stream error: {0}")]
    Stream(String),
}

/// Which output implementation to open.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// System audio device
    #[default]
    Cpal,
    /// Discards frames; for headless runs and tests
    Null,
}

/// Counters maintained by the render side.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct OutputStats {
    pub frames_played: u64,
    /// Callbacks that ran out of queued frames while not paused
    pub underruns: u64,
}

/// Trait for audio output backends.
///
/// Writes are non-blocking; the device pulls frames on its own thread.
pub trait AudioOutput {
    /// Get the sample rate.
    fn sample_rate(&self) -> u32;

    /// Frames the output queue can hold.
    fn capacity(&self) -> usize;

    /// Frames written but not yet played.
    fn queued(&self) -> usize;

    /// Queue as many frames as fit. Returns how many were taken.
    fn write(&mut self, frames: &[Frame]) -> usize;

    /// Start pulling frames.
    fn start(&mut self) -> Result<(), AudioError>;

    /// Stop pulling frames and drop what is queued.
    fn stop(&mut self) -> Result<(), AudioError>;

    /// Emit silence while paused, keeping queued frames.
    fn set_paused(&mut self, paused: bool);

    /// Error latched by the device since the last call.
    fn take_error(&mut self) -> Option<AudioError>;

    fn stats(&self) -> OutputStats;

    /// Queue all of `frames`, waiting for room. Fails if the device takes
    /// nothing for `timeout`.
    fn write_all(&mut self, mut frames: &[Frame], timeout: Duration) -> Result<(), AudioError> {
        let mut last_progress = Instant::now();
        while !frames.is_empty() {
            if let Some(err) = self.take_error() {
                return Err(err);
            }
            let written = self.write(frames);
            if written > 0 {
                frames = &frames[written..];
                last_progress = Instant::now();
                continue;
            }
            if last_progress.elapsed() >= timeout {
                return Err(AudioError::Stalled(timeout));
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    /// Wait until the queue has played out or `timeout` passes.
    /// Returns true if the queue emptied.
    fn drain(&mut self, timeout: Duration) -> bool {
        let start = Instant::now();
        while self.queued() > 0 {
            if start.elapsed() >= timeout {
                return false;
            }
            std::thread::sleep(Duration::from_millis(1));
        }
        true
    }
}
