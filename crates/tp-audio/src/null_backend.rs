//! Output that plays frames into the void, for headless runs and tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tp_engine::Frame;

use crate::traits::{AudioError, AudioOutput, OutputStats};

/// Accepts every frame immediately.
///
/// A shared fault flag simulates a device failure: while it is set, writes
/// are refused and the failure is reported once through `take_error`.
#[derive(Debug)]
pub struct NullOutput {
    sample_rate: u32,
    capacity: usize,
    running: bool,
    paused: bool,
    fault: Arc<AtomicBool>,
    reported: bool,
    stats: OutputStats,
}

impl NullOutput {
    pub fn new(sample_rate: u32, buffer_ms: u32) -> Self {
        Self {
            sample_rate,
            capacity: (sample_rate as usize * buffer_ms as usize / 1000).max(1),
            running: false,
            paused: false,
            fault: Arc::new(AtomicBool::new(false)),
            reported: false,
            stats: OutputStats::default(),
        }
    }

    /// Handle for injecting a device fault from outside.
    pub fn fault_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.fault)
    }

    fn faulted(&self) -> bool {
        self.fault.load(Ordering::Relaxed)
    }
}

impl AudioOutput for NullOutput {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn queued(&self) -> usize {
        0
    }

    fn write(&mut self, frames: &[Frame]) -> usize {
        if self.faulted() {
            return 0;
        }
        if self.running && !self.paused {
            self.stats.frames_played += frames.len() as u64;
        }
        frames.len()
    }

    fn start(&mut self) -> Result<(), AudioError> {
        if self.faulted() {
            return Err(AudioError::Playback("null device faulted".into()));
        }
        self.running = true;
        self.paused = false;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), AudioError> {
        self.running = false;
        Ok(())
    }

    fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    fn take_error(&mut self) -> Option<AudioError> {
        if !self.faulted() {
            self.reported = false;
            return None;
        }
        if self.reported {
            return None;
        }
        self.reported = true;
        Some(AudioError::Stream("null device faulted".into()))
    }

    fn stats(&self) -> OutputStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn counts_played_frames() {
        let mut out = NullOutput::new(48000, 100);
        assert_eq!(out.capacity(), 4800);
        out.start().unwrap();
        assert_eq!(out.write(&[Frame::silence(); 32]), 32);
        out.set_paused(true);
        out.write(&[Frame::silence(); 32]);
        assert_eq!(out.stats().frames_played, 32);
        assert!(out.drain(Duration::from_millis(10)));
    }

    #[test]
    fn fault_is_reported_once() {
        let mut out = NullOutput::new(44100, 100);
        let fault = out.fault_handle();
        fault.store(true, Ordering::Relaxed);
        assert!(matches!(out.take_error(), Some(AudioError::Stream(_))));
        assert!(out.take_error().is_none());
        assert!(out.start().is_err());
    }

    #[test]
    fn write_all_fails_on_fault() {
        let mut out = NullOutput::new(44100, 100);
        out.fault_handle().store(true, Ordering::Relaxed);
        let err = out
            .write_all(&[Frame::silence(); 8], Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, AudioError::Stream(_)));
        // Once reported, a stuck device times out
        let err = out
            .write_all(&[Frame::silence(); 8], Duration::from_millis(5))
            .unwrap_err();
        assert!(matches!(err, AudioError::Stalled(_)));
    }
}
