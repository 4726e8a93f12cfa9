//! Flag and status-code surface over [`Controller`] for polling front ends.

use std::io::Read;

use tp_audio::AudioOutput;

use crate::{Controller, PlayerConfig, PlayerError, TickStatus, TransportState, INFO_VALUES};

/// `tick` status: keep polling.
pub const TICK_CONTINUE: i32 = 0;
/// `tick` status: the song ended and playback stopped.
pub const TICK_END_OF_SONG: i32 = 1;
/// `tick` status: the tick was rejected or the device failed.
pub const TICK_FAILED: i32 = -1;

/// Per-channel telemetry as parallel arrays, one slot per voice.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ChannelArrays {
    pub final_volumes: Vec<i32>,
    pub instruments: Vec<i32>,
    pub keys: Vec<i32>,
    pub pans: Vec<i32>,
    pub periods: Vec<i32>,
    pub volumes: Vec<i32>,
}

impl ChannelArrays {
    pub fn new(capacity: usize) -> Self {
        Self {
            final_volumes: vec![0; capacity],
            instruments: vec![0; capacity],
            keys: vec![0; capacity],
            pans: vec![0; capacity],
            periods: vec![0; capacity],
            volumes: vec![0; capacity],
        }
    }

    pub fn len(&self) -> usize {
        self.final_volumes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.final_volumes.is_empty()
    }
}

/// An explicit player handle with boolean and status-code returns.
///
/// Errors are logged and folded into the return value; use
/// [`Session::controller`] for the typed results.
pub struct Session {
    controller: Controller,
}

/// Log a rejected operation and turn it into `None`.
fn ok_or_log<T>(op: &str, result: Result<T, PlayerError>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            match &err {
                PlayerError::InvalidStateTransition { .. } | PlayerError::NotLoaded => {
                    log::debug!("{op}: {err}")
                }
                _ => log::warn!("{op} failed: {err}"),
            }
            None
        }
    }
}

impl Session {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            controller: Controller::new(config),
        }
    }

    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut Controller {
        &mut self.controller
    }

    pub fn state(&self) -> TransportState {
        self.controller.state()
    }

    pub fn init_player(&mut self) -> bool {
        ok_or_log("init_player", self.controller.init_player()).is_some()
    }

    /// Initialise with a caller-supplied output.
    pub fn init_with_output(&mut self, output: Box<dyn AudioOutput>) -> bool {
        ok_or_log("init_player", self.controller.init_with_output(output)).is_some()
    }

    pub fn load_from_source(&mut self, source: impl Read) -> bool {
        ok_or_log("load", self.controller.load_from_reader(source)).is_some()
    }

    pub fn start_module(&mut self) -> bool {
        ok_or_log("start", self.controller.start()).is_some()
    }

    /// Returns the resulting paused flag.
    pub fn pause(&mut self, paused: bool) -> bool {
        ok_or_log("pause", self.controller.pause(paused))
            .unwrap_or(self.state() == TransportState::Paused)
    }

    /// `TICK_CONTINUE`, `TICK_END_OF_SONG` or `TICK_FAILED`. While paused
    /// nothing is rendered and the result is `TICK_CONTINUE`.
    pub fn tick(&mut self, loop_enabled: bool) -> i32 {
        if self.state() == TransportState::Paused {
            return TICK_CONTINUE;
        }
        match ok_or_log("tick", self.controller.tick(loop_enabled)) {
            Some(TickStatus::Continue) => TICK_CONTINUE,
            Some(TickStatus::EndOfSong) => TICK_END_OF_SONG,
            None => TICK_FAILED,
        }
    }

    pub fn stop_module(&mut self) {
        ok_or_log("stop", self.controller.stop());
    }

    pub fn restart_module(&mut self) -> bool {
        ok_or_log("restart", self.controller.restart()).is_some()
    }

    pub fn release_module(&mut self) {
        ok_or_log("release", self.controller.release());
    }

    pub fn end_player(&mut self) {
        ok_or_log("end_player", self.controller.end_player());
    }

    pub fn deinit_player(&mut self) {
        ok_or_log("deinit_player", self.controller.deinit_player());
    }

    pub fn module_name(&self) -> Option<String> {
        self.controller.module_name().ok()
    }

    pub fn module_type(&self) -> Option<String> {
        self.controller.module_type().ok()
    }

    pub fn comment(&self) -> Option<String> {
        self.controller.comment().ok().flatten()
    }

    pub fn supported_formats() -> &'static [&'static str] {
        tp_formats::supported_formats()
    }

    pub fn instruments(&self) -> Option<Vec<String>> {
        self.controller.instruments().ok()
    }

    /// Elapsed play time in milliseconds, or -1 outside playback.
    pub fn time(&self) -> i64 {
        self.controller.time_ms().map_or(-1, |ms| ms as i64)
    }

    /// Per-channel arrays sized for this player.
    pub fn channel_arrays(&self) -> ChannelArrays {
        ChannelArrays::new(self.controller.capacity())
    }

    /// Fill `values` with `[order, pattern, row, num_rows, frame, speed,
    /// bpm]` and `channels` with one entry per voice slot. Slots beyond the
    /// arrays' length are skipped. Returns false outside playback.
    pub fn get_info(&self, values: &mut [i32; INFO_VALUES], channels: &mut ChannelArrays) -> bool {
        let Ok(info) = self.controller.snapshot() else {
            return false;
        };
        *values = info.values();
        for (i, ch) in info.channels.iter().enumerate().take(channels.len()) {
            channels.final_volumes[i] = ch.final_volume as i32;
            channels.instruments[i] = ch.instrument as i32;
            channels.keys[i] = ch.key as i32;
            channels.pans[i] = ch.pan as i32;
            channels.periods[i] = ch.period as i32;
            channels.volumes[i] = ch.volume as i32;
        }
        true
    }

    pub fn version() -> &'static str {
        crate::VERSION
    }

    /// `[duration_ms, length, patterns, channels, instruments, samples,
    /// sequences, current_sequence]`, or `None` with no module.
    pub fn module_vars(&self) -> Option<[i64; 8]> {
        self.controller.module_vars().ok().map(|v| v.to_array())
    }

    pub fn set_sequence(&mut self, index: usize) -> bool {
        ok_or_log("set_sequence", self.controller.set_sequence(index)).is_some()
    }

    pub fn set_position(&mut self, order: usize) -> bool {
        ok_or_log("set_position", self.controller.set_position(order)).is_some()
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}
