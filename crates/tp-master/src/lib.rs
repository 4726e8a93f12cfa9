//! Transport controller for the trackplay module player.
//!
//! [`Controller`] owns the engine and the output session and enforces the
//! player lifecycle. [`Session`] wraps it in the flag and status-code
//! surface used by polling front ends.

mod config;
mod error;
mod session;
mod state;
mod wav;

use std::io::Read;
use std::sync::Arc;
use std::time::Duration;

use tp_engine::{Engine, RenderStatus};

pub use config::{ConfigError, PlayerConfig, SAMPLE_RATES};
pub use error::PlayerError;
pub use session::{ChannelArrays, Session, TICK_CONTINUE, TICK_END_OF_SONG, TICK_FAILED};
pub use state::TransportState;
pub use tp_audio::{AudioError, AudioOutput, Backend, NullOutput, OutputStats};
pub use tp_engine::{ChannelInfo, Frame, FrameInfo, Interpolation, SequenceInfo, INFO_VALUES};
pub use tp_formats::{supported_formats, FormatError};
pub use tp_ir::Module;
pub use wav::{frames_to_wav, render_frames, render_to_wav, write_wav, RenderOptions};

/// Crate version reported to front ends.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Result of one `tick`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickStatus {
    Continue,
    /// The song ended; the controller is now `Stopped`.
    EndOfSong,
}

/// Module-wide figures, per sequence where noted.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ModuleVars {
    /// Duration of the current sequence
    pub duration_ms: u64,
    /// Order list length
    pub length: usize,
    pub patterns: usize,
    pub channels: usize,
    pub instruments: usize,
    pub samples: usize,
    pub sequences: usize,
    pub current_sequence: usize,
}

impl ModuleVars {
    /// `[duration_ms, length, patterns, channels, instruments, samples,
    /// sequences, current_sequence]`.
    pub fn to_array(&self) -> [i64; 8] {
        [
            self.duration_ms as i64,
            self.length as i64,
            self.patterns as i64,
            self.channels as i64,
            self.instruments as i64,
            self.samples as i64,
            self.sequences as i64,
            self.current_sequence as i64,
        ]
    }
}

/// Owns one engine and one output session and moves them through the
/// player lifecycle.
///
/// The controller is the only writer of the transport position: `tick`
/// renders one sequencer tick on the calling thread and queues the PCM for
/// the device callback, which never sees the module.
pub struct Controller {
    config: PlayerConfig,
    state: TransportState,
    engine: Option<Engine>,
    output: Option<Box<dyn AudioOutput>>,
    sequences: Vec<SequenceInfo>,
    current_sequence: usize,
}

impl Controller {
    pub fn new(config: PlayerConfig) -> Self {
        Self {
            config,
            state: TransportState::Uninitialized,
            engine: None,
            output: None,
            sequences: Vec::new(),
            current_sequence: 0,
        }
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn state(&self) -> TransportState {
        self.state
    }

    fn transition_error(&self, op: &'static str) -> PlayerError {
        log::warn!("rejected {op} while {}", self.state);
        PlayerError::InvalidStateTransition {
            op,
            state: self.state,
        }
    }

    fn require(&self, op: &'static str, allowed: &[TransportState]) -> Result<(), PlayerError> {
        if allowed.contains(&self.state) {
            Ok(())
        } else {
            Err(self.transition_error(op))
        }
    }

    fn set_state(&mut self, state: TransportState) {
        log::debug!("transport {} -> {}", self.state, state);
        self.state = state;
    }

    // --- Lifecycle ---

    /// Open the configured output and allocate the voice bank.
    pub fn init_player(&mut self) -> Result<(), PlayerError> {
        self.require("init_player", &[TransportState::Uninitialized])?;
        self.check_sample_rate()?;
        let output = tp_audio::open_output(
            self.config.backend,
            self.config.sample_rate,
            self.config.buffer_ms,
        )?;
        self.init_with_output(output)
    }

    /// Like [`Controller::init_player`] with a caller-supplied output.
    pub fn init_with_output(&mut self, output: Box<dyn AudioOutput>) -> Result<(), PlayerError> {
        self.require("init_player", &[TransportState::Uninitialized])?;
        self.check_sample_rate()?;
        let rate = output.sample_rate();
        let engine = Engine::new(self.config.engine_config(rate));
        log::info!(
            "player initialised: {rate} Hz, {} voices, {:?} interpolation",
            engine.capacity(),
            self.config.interpolation
        );
        self.engine = Some(engine);
        self.output = Some(output);
        self.set_state(TransportState::Initialized);
        Ok(())
    }

    fn check_sample_rate(&self) -> Result<(), PlayerError> {
        if SAMPLE_RATES.contains(&self.config.sample_rate) {
            Ok(())
        } else {
            Err(PlayerError::InvalidSampleRate(self.config.sample_rate))
        }
    }

    /// Close the output and free the voice bank.
    pub fn deinit_player(&mut self) -> Result<(), PlayerError> {
        self.require(
            "deinit_player",
            &[TransportState::Initialized, TransportState::Released],
        )?;
        self.engine = None;
        self.output = None;
        self.set_state(TransportState::Uninitialized);
        Ok(())
    }

    /// Parse and install a module, replacing the current one.
    ///
    /// On failure the previous module and state stay in place.
    pub fn load(&mut self, data: &[u8]) -> Result<(), PlayerError> {
        self.require(
            "load",
            &[
                TransportState::Initialized,
                TransportState::Released,
                TransportState::Loaded,
                TransportState::Stopped,
            ],
        )?;
        let module = tp_formats::load(data)?;
        self.install(Arc::new(module))
    }

    /// Read a whole byte source and load it.
    pub fn load_from_reader(&mut self, mut reader: impl Read) -> Result<(), PlayerError> {
        // Check the state before consuming the source
        self.require(
            "load",
            &[
                TransportState::Initialized,
                TransportState::Released,
                TransportState::Loaded,
                TransportState::Stopped,
            ],
        )?;
        let mut data = Vec::new();
        reader.read_to_end(&mut data)?;
        self.load(&data)
    }

    fn install(&mut self, module: Arc<Module>) -> Result<(), PlayerError> {
        let engine = self.engine.as_mut().ok_or(PlayerError::NotLoaded)?;
        let sequences = tp_engine::scan_sequences(&module);
        engine.load(Arc::clone(&module)).map_err(PlayerError::ChannelCapacity)?;
        log::info!(
            "loaded \"{}\" ({}), {} channels, {} sequences",
            module.title,
            module.module_type,
            module.num_channels(),
            sequences.len()
        );
        self.sequences = sequences;
        self.current_sequence = 0;
        self.set_state(TransportState::Loaded);
        Ok(())
    }

    /// Begin playback at the entry of the current sequence.
    pub fn start(&mut self) -> Result<(), PlayerError> {
        self.require("start", &[TransportState::Loaded, TransportState::Stopped])?;
        self.begin_playback()
    }

    /// Start again after a stop, from the top.
    pub fn restart(&mut self) -> Result<(), PlayerError> {
        self.require("restart", &[TransportState::Stopped])?;
        self.begin_playback()
    }

    fn begin_playback(&mut self) -> Result<(), PlayerError> {
        let entry = self.current_entry();
        let (Some(engine), Some(output)) = (self.engine.as_mut(), self.output.as_mut()) else {
            return Err(PlayerError::NotLoaded);
        };
        engine.set_start_order(entry);
        if !engine.start() {
            return Err(PlayerError::NotLoaded);
        }
        if let Err(err) = output.start() {
            engine.stop();
            log::error!("cannot start output: {err}");
            return Err(err.into());
        }
        log::info!("playback started at order {entry}");
        self.set_state(TransportState::Playing);
        Ok(())
    }

    /// Pause or resume. Returns the resulting paused flag; asking for the
    /// flag already in effect changes nothing.
    pub fn pause(&mut self, paused: bool) -> Result<bool, PlayerError> {
        self.require("pause", &[TransportState::Playing, TransportState::Paused])?;
        if paused == (self.state == TransportState::Paused) {
            return Ok(paused);
        }
        if let Some(engine) = self.engine.as_mut() {
            engine.set_paused(paused);
        }
        if let Some(output) = self.output.as_mut() {
            output.set_paused(paused);
        }
        self.set_state(if paused {
            TransportState::Paused
        } else {
            TransportState::Playing
        });
        Ok(paused)
    }

    /// Stop playback and silence the voices. The module stays loaded.
    pub fn stop(&mut self) -> Result<(), PlayerError> {
        self.require("stop", &[TransportState::Playing, TransportState::Paused])?;
        self.halt();
        self.set_state(TransportState::Stopped);
        Ok(())
    }

    /// End the replay from any playback state, back to `Loaded`.
    pub fn end_player(&mut self) -> Result<(), PlayerError> {
        self.require(
            "end_player",
            &[
                TransportState::Playing,
                TransportState::Paused,
                TransportState::Stopped,
            ],
        )?;
        self.halt();
        self.set_state(TransportState::Loaded);
        Ok(())
    }

    /// Free the module.
    pub fn release(&mut self) -> Result<(), PlayerError> {
        self.require("release", &[TransportState::Loaded, TransportState::Stopped])?;
        if let Some(engine) = self.engine.as_mut() {
            engine.unload();
        }
        self.sequences.clear();
        self.current_sequence = 0;
        self.set_state(TransportState::Released);
        Ok(())
    }

    fn halt(&mut self) {
        if let Some(engine) = self.engine.as_mut() {
            engine.stop();
        }
        if let Some(output) = self.output.as_mut() {
            if let Err(err) = output.stop() {
                log::warn!("output stop failed: {err}");
            }
        }
    }

    /// Render one sequencer tick and queue it for the device.
    ///
    /// When the song ends with `loop_enabled` false, waits for the queued
    /// audio to play out and moves to `Stopped`.
    pub fn tick(&mut self, loop_enabled: bool) -> Result<TickStatus, PlayerError> {
        self.require("tick", &[TransportState::Playing])?;
        let write_timeout = Duration::from_millis(self.config.write_timeout_ms);
        let (Some(engine), Some(output)) = (self.engine.as_mut(), self.output.as_mut()) else {
            return Err(PlayerError::NotLoaded);
        };
        if let Some(err) = output.take_error() {
            log::error!("output device failed: {err}");
            return Err(err.into());
        }

        engine.set_loop(loop_enabled);
        let status = engine.play_tick();
        if let Err(err) = output.write_all(engine.last_tick(), write_timeout) {
            log::error!("output write failed: {err}");
            return Err(err.into());
        }

        match status {
            RenderStatus::EndOfSong => {
                let drain = Duration::from_millis(self.config.drain_timeout_ms);
                if !output.drain(drain) {
                    log::warn!("output did not drain within {drain:?}");
                }
                log::info!("end of song after {} ms", engine.time_ms());
                self.halt();
                self.set_state(TransportState::Stopped);
                Ok(TickStatus::EndOfSong)
            }
            RenderStatus::Continue | RenderStatus::Silent => Ok(TickStatus::Continue),
        }
    }

    // --- Queries ---

    /// The installed module.
    pub fn module(&self) -> Result<&Arc<Module>, PlayerError> {
        self.engine
            .as_ref()
            .and_then(|e| e.module())
            .ok_or(PlayerError::NotLoaded)
    }

    pub fn module_name(&self) -> Result<String, PlayerError> {
        Ok(self.module()?.title.to_string())
    }

    pub fn module_type(&self) -> Result<String, PlayerError> {
        Ok(self.module()?.module_type.clone())
    }

    /// Module comment, if the format carries one.
    pub fn comment(&self) -> Result<Option<String>, PlayerError> {
        Ok(self.module()?.comment.clone())
    }

    /// Instrument names as `"%02X name"` with 1-based ids.
    pub fn instruments(&self) -> Result<Vec<String>, PlayerError> {
        Ok(self
            .module()?
            .instruments
            .iter()
            .enumerate()
            .map(|(i, ins)| format!("{:02X} {}", i + 1, ins.name))
            .collect())
    }

    /// Elapsed play time in milliseconds.
    pub fn time_ms(&self) -> Result<u64, PlayerError> {
        self.require("time", &[TransportState::Playing, TransportState::Paused])?;
        self.engine
            .as_ref()
            .map(Engine::time_ms)
            .ok_or(PlayerError::NotLoaded)
    }

    /// Snapshot of the last completed tick.
    pub fn snapshot(&self) -> Result<&FrameInfo, PlayerError> {
        self.require("get_info", &[TransportState::Playing, TransportState::Paused])?;
        self.engine
            .as_ref()
            .map(Engine::snapshot)
            .ok_or(PlayerError::NotLoaded)
    }

    /// Voice slots, fixed at initialisation. Zero before `init_player`.
    pub fn capacity(&self) -> usize {
        self.engine.as_ref().map_or(0, Engine::capacity)
    }

    pub fn sample_rate(&self) -> Option<u32> {
        self.engine.as_ref().map(Engine::sample_rate)
    }

    pub fn output_stats(&self) -> Option<OutputStats> {
        self.output.as_ref().map(|o| o.stats())
    }

    pub fn sequences(&self) -> &[SequenceInfo] {
        &self.sequences
    }

    fn current_entry(&self) -> usize {
        self.sequences
            .get(self.current_sequence)
            .map_or(0, |s| s.entry)
    }

    pub fn module_vars(&self) -> Result<ModuleVars, PlayerError> {
        let module = self.module()?;
        Ok(ModuleVars {
            duration_ms: self
                .sequences
                .get(self.current_sequence)
                .map_or(0, |s| s.duration_ms),
            length: module.order.len(),
            patterns: module.patterns.len(),
            channels: module.num_channels(),
            instruments: module.instruments.len(),
            samples: module.num_samples(),
            sequences: self.sequences.len(),
            current_sequence: self.current_sequence,
        })
    }

    /// Select a sub-song. While playing, jumps to its entry.
    pub fn set_sequence(&mut self, index: usize) -> Result<(), PlayerError> {
        self.module()?;
        let entry = self
            .sequences
            .get(index)
            .map(|s| s.entry)
            .ok_or(PlayerError::InvalidPosition(index))?;
        self.current_sequence = index;
        if let Some(engine) = self.engine.as_mut() {
            engine.set_start_order(entry);
            if self.state.is_active() {
                engine.set_position(entry);
            }
        }
        log::debug!("sequence {index} selected (order {entry})");
        Ok(())
    }

    /// Jump to an order entry while playing or paused.
    pub fn set_position(&mut self, order: usize) -> Result<(), PlayerError> {
        self.require("set_position", &[TransportState::Playing, TransportState::Paused])?;
        let moved = self
            .engine
            .as_mut()
            .is_some_and(|engine| engine.set_position(order));
        if moved {
            Ok(())
        } else {
            Err(PlayerError::InvalidPosition(order))
        }
    }
}

impl Default for Controller {
    fn default() -> Self {
        Self::new(PlayerConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tp_audio::{Backend, NullOutput};

    fn null_config() -> PlayerConfig {
        PlayerConfig {
            sample_rate: 8000,
            backend: Backend::Null,
            voices: 8,
            ..PlayerConfig::default()
        }
    }

    fn ready() -> Controller {
        let mut controller = Controller::new(null_config());
        controller.init_player().unwrap();
        controller
    }

    #[test]
    fn init_rejects_unsupported_rate() {
        let mut controller = Controller::new(PlayerConfig {
            sample_rate: 11025,
            ..null_config()
        });
        assert!(matches!(
            controller.init_player(),
            Err(PlayerError::InvalidSampleRate(11025))
        ));
        assert_eq!(controller.state(), TransportState::Uninitialized);
        assert_eq!(controller.capacity(), 0);
    }

    #[test]
    fn start_before_init_is_rejected() {
        let mut controller = Controller::new(null_config());
        assert!(matches!(
            controller.start(),
            Err(PlayerError::InvalidStateTransition { op: "start", .. })
        ));
        assert_eq!(controller.state(), TransportState::Uninitialized);
    }

    #[test]
    fn queries_need_a_module() {
        let controller = ready();
        assert!(matches!(controller.module_name(), Err(PlayerError::NotLoaded)));
        assert!(matches!(controller.instruments(), Err(PlayerError::NotLoaded)));
        assert!(matches!(controller.module_vars(), Err(PlayerError::NotLoaded)));
    }

    #[test]
    fn garbage_load_is_unsupported() {
        let mut controller = ready();
        let err = controller.load(&[0u8; 2048]).unwrap_err();
        assert!(matches!(err, PlayerError::Format(FormatError::Unsupported)));
        assert_eq!(controller.state(), TransportState::Initialized);
    }

    #[test]
    fn deinit_only_from_initialized() {
        let mut controller = ready();
        controller.deinit_player().unwrap();
        assert_eq!(controller.state(), TransportState::Uninitialized);
        assert!(controller.deinit_player().is_err());
        assert!(controller.init_with_output(Box::new(NullOutput::new(8000, 100))).is_ok());
    }
}
