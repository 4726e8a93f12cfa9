//! Main playback engine: sequencer-driven mixing of the voice bank.

use alloc::sync::Arc;
use alloc::vec::Vec;
use core::fmt;
use core::mem;
use tp_ir::{EventPayload, EventTarget, Module, MAX_CHANNELS};

use crate::channel::TickParams;
use crate::event_queue::EventQueue;
use crate::frame::Frame;
use crate::info::FrameInfo;
use crate::sequencer::Sequencer;
use crate::voice_bank::VoiceBank;

/// Sample interpolation used when resampling voices.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Interpolation {
    Nearest,
    #[default]
    Linear,
}

/// Fixed engine parameters, chosen once at initialisation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EngineConfig {
    pub sample_rate: u32,
    /// Voice slots (1 to 64)
    pub voices: usize,
    pub interpolation: Interpolation,
    /// Stereo separation in percent
    pub stereo_separation: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 48000,
            voices: MAX_CHANNELS,
            interpolation: Interpolation::Linear,
            stereo_separation: 70,
        }
    }
}

/// Outcome of a render call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RenderStatus {
    /// Frames were produced and the song continues.
    Continue,
    /// The last tick of the song has been rendered (loop disabled).
    EndOfSong,
    /// Nothing is playing; the output is silence.
    Silent,
}

/// The module needs more channels than the engine has voices.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CapacityError {
    pub needed: usize,
    pub capacity: usize,
}

impl fmt::Display for CapacityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "module needs {} channels, engine has {} voices",
            self.needed, self.capacity
        )
    }
}

/// Run a render path closure, aborting on heap allocation when built with
/// `alloc_check`.
#[cfg(feature = "alloc_check")]
fn realtime<T>(f: impl FnOnce() -> T) -> T {
    assert_no_alloc::assert_no_alloc(f)
}

#[cfg(not(feature = "alloc_check"))]
fn realtime<T>(f: impl FnOnce() -> T) -> T {
    f()
}

/// The playback engine.
///
/// Owns the voice bank and sequencer for one module at a time. Buffers are
/// sized in [`Engine::new`]; loading, starting and rendering reuse them.
pub struct Engine {
    config: EngineConfig,
    module: Option<Arc<Module>>,
    voices: VoiceBank,
    sequencer: Sequencer,
    queue: EventQueue,
    /// One tick of output for [`Engine::play_tick`]
    tick_buffer: Vec<Frame>,
    tick_len: usize,
    /// Frames of the current tick still to be mixed
    frames_left: usize,
    /// Length of the current tick
    tick_frames: usize,
    global_volume: u8,
    global_slide: i8,
    running: bool,
    paused: bool,
    loop_enabled: bool,
    start_order: usize,
    frames_played: u64,
    info: FrameInfo,
}

impl Engine {
    pub fn new(config: EngineConfig) -> Self {
        let config = EngineConfig {
            sample_rate: config.sample_rate.max(1),
            voices: config.voices.clamp(1, MAX_CHANNELS),
            ..config
        };
        // One spare frame on top of the longest tick
        let max_tick = Sequencer::max_tick_frames(config.sample_rate) + 1;
        let mut tick_buffer = Vec::with_capacity(max_tick);
        tick_buffer.resize(max_tick, Frame::silence());

        Self {
            voices: VoiceBank::new(config.voices),
            info: FrameInfo::with_capacity(config.voices),
            config,
            module: None,
            sequencer: Sequencer::new(),
            queue: EventQueue::new(),
            tick_buffer,
            tick_len: 0,
            frames_left: 0,
            tick_frames: 0,
            global_volume: 64,
            global_slide: 0,
            running: false,
            paused: false,
            loop_enabled: false,
            start_order: 0,
            frames_played: 0,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Number of voice slots.
    pub fn capacity(&self) -> usize {
        self.voices.capacity()
    }

    /// Install a module, replacing the current one. Playback is stopped.
    ///
    /// On error the engine is left unchanged.
    pub fn load(&mut self, module: Arc<Module>) -> Result<Option<Arc<Module>>, CapacityError> {
        let needed = module.num_channels();
        if needed > self.capacity() {
            return Err(CapacityError {
                needed,
                capacity: self.capacity(),
            });
        }
        self.running = false;
        self.paused = false;
        self.start_order = 0;
        self.sequencer.reset(&module, 0);
        self.voices.reset(Some(&module));
        self.info.reset_channels(self.capacity());
        Ok(self.module.replace(module))
    }

    /// Drop the module. Returns it so the caller decides where it is freed.
    pub fn unload(&mut self) -> Option<Arc<Module>> {
        self.running = false;
        self.paused = false;
        self.frames_left = 0;
        self.tick_len = 0;
        self.voices.reset(None);
        self.info.reset_channels(self.capacity());
        self.module.take()
    }

    pub fn module(&self) -> Option<&Arc<Module>> {
        self.module.as_ref()
    }

    /// Prime the sequencer at the start order and begin playback.
    /// Returns false if no module is loaded.
    pub fn start(&mut self) -> bool {
        let Some(module) = self.module.as_deref() else {
            return false;
        };
        self.sequencer.reset(module, self.start_order);
        self.voices.reset(Some(module));
        self.queue.clear();
        self.global_volume = module.global_volume.min(64);
        self.global_slide = 0;
        self.frames_left = 0;
        self.tick_frames = 0;
        self.tick_len = 0;
        self.frames_played = 0;
        self.info.reset_channels(self.voices.capacity());
        self.running = true;
        self.paused = false;
        true
    }

    /// Stop playback and silence every voice. The module stays loaded.
    pub fn stop(&mut self) {
        self.running = false;
        self.paused = false;
        self.frames_left = 0;
        self.tick_len = 0;
        self.voices.silence();
    }

    /// Hold or release the voices. The position is kept exactly.
    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused && self.running;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Whether the song wraps to its restart position instead of ending.
    pub fn set_loop(&mut self, enabled: bool) {
        self.loop_enabled = enabled;
    }

    /// Order entry used by the next [`Engine::start`].
    pub fn set_start_order(&mut self, order: usize) {
        self.start_order = order;
    }

    /// Jump to the first row of an order entry while playing.
    pub fn set_position(&mut self, order: usize) -> bool {
        let Some(module) = self.module.as_deref() else {
            return false;
        };
        if !self.running || !self.sequencer.set_position(module, order) {
            return false;
        }
        self.frames_left = 0;
        true
    }

    /// Current sequencer position.
    pub fn sequencer(&self) -> &Sequencer {
        &self.sequencer
    }

    pub fn voices(&self) -> &VoiceBank {
        &self.voices
    }

    /// Snapshot captured at the end of the last rendered tick.
    pub fn snapshot(&self) -> &FrameInfo {
        &self.info
    }

    /// Elapsed play time in milliseconds.
    pub fn time_ms(&self) -> u64 {
        self.frames_played * 1000 / self.config.sample_rate as u64
    }

    /// Output of the last [`Engine::play_tick`].
    pub fn last_tick(&self) -> &[Frame] {
        &self.tick_buffer[..self.tick_len]
    }

    fn is_active(&self) -> bool {
        self.running && !self.paused && self.module.is_some()
    }

    /// Fill `out` with audio, crossing as many tick boundaries as needed.
    ///
    /// Frames past the end of the song, and every frame while stopped,
    /// paused or unloaded, are silence.
    pub fn render(&mut self, out: &mut [Frame]) -> RenderStatus {
        realtime(|| self.render_block(out))
    }

    fn render_block(&mut self, out: &mut [Frame]) -> RenderStatus {
        let Some(module) = self.module.clone().filter(|_| self.is_active()) else {
            out.fill(Frame::silence());
            return RenderStatus::Silent;
        };

        let mut written = 0;
        while written < out.len() {
            if self.frames_left == 0 {
                if self.sequencer.is_ended() {
                    break;
                }
                self.begin_tick(&module);
            }
            let count = self.frames_left.min(out.len() - written);
            self.mix_into(&module, &mut out[written..written + count]);
            written += count;
            self.frames_left -= count;
            if self.frames_left == 0 {
                self.finish_tick(&module);
            }
        }
        out[written..].fill(Frame::silence());
        self.status()
    }

    /// Render exactly one tick (or the rest of a partly rendered one) into
    /// the internal buffer, readable through [`Engine::last_tick`].
    pub fn play_tick(&mut self) -> RenderStatus {
        realtime(|| self.render_tick())
    }

    fn render_tick(&mut self) -> RenderStatus {
        self.tick_len = 0;
        let Some(module) = self.module.clone().filter(|_| self.is_active()) else {
            return RenderStatus::Silent;
        };
        if self.frames_left == 0 {
            if self.sequencer.is_ended() {
                return RenderStatus::EndOfSong;
            }
            self.begin_tick(&module);
        }

        let count = self.frames_left.min(self.tick_buffer.len());
        let mut buffer = mem::take(&mut self.tick_buffer);
        self.mix_into(&module, &mut buffer[..count]);
        self.tick_buffer = buffer;
        self.tick_len = count;
        // Whatever did not fit is mixed by the next call
        self.frames_left -= count;
        if self.frames_left > 0 {
            return RenderStatus::Continue;
        }
        self.finish_tick(&module);
        self.status()
    }

    fn status(&self) -> RenderStatus {
        if self.sequencer.is_ended() {
            RenderStatus::EndOfSong
        } else {
            RenderStatus::Continue
        }
    }

    /// Apply the row's commands (on tick 0) and per-tick effects.
    fn begin_tick(&mut self, module: &Module) {
        let tick = self.sequencer.tick();
        if tick == 0 {
            self.global_slide = 0;
            for voice in self.voices.iter_mut() {
                voice.begin_row();
            }
            self.queue
                .decode_row(module, self.sequencer.order(), self.sequencer.row());
            for event in self.queue.iter() {
                match event.target {
                    EventTarget::Channel(ch) => {
                        if let Some(voice) = self.voices.get_mut(ch as usize) {
                            voice.apply_event(&event.payload, module);
                        }
                    }
                    EventTarget::Global => match event.payload {
                        EventPayload::SetGlobalVolume(volume) => self.global_volume = volume.min(64),
                        EventPayload::GlobalVolumeSlide(slide) => self.global_slide = slide,
                        ref payload => self.sequencer.apply(payload),
                    },
                }
            }
        } else if self.global_slide != 0 {
            self.global_volume = (self.global_volume as i16 + self.global_slide as i16).clamp(0, 64) as u8;
        }

        let params = TickParams {
            sample_rate: self.config.sample_rate,
            global_volume: self.global_volume,
            separation: self.config.stereo_separation,
        };
        for voice in self.voices.iter_mut() {
            voice.process_tick(tick, module, &params);
        }

        self.tick_frames = self.sequencer.frames_for_tick(self.config.sample_rate);
        self.frames_left = self.tick_frames;
    }

    fn mix_into(&mut self, module: &Module, out: &mut [Frame]) {
        out.fill(Frame::silence());
        let interpolation = self.config.interpolation;
        for voice in self.voices.iter_mut() {
            let Some(sample) = voice.current_sample(module) else {
                continue;
            };
            for frame in out.iter_mut() {
                if !voice.is_playing() {
                    break;
                }
                let (left, right) = voice.mix(sample, interpolation);
                *frame = Frame::from_accumulator(frame.left as i32 + left, frame.right as i32 + right);
            }
        }
    }

    /// Capture telemetry for the finished tick, then advance the position.
    fn finish_tick(&mut self, module: &Module) {
        self.frames_played += self.tick_frames as u64;
        self.info.order = self.sequencer.order();
        self.info.pattern = self.sequencer.pattern_index(module).unwrap_or(0);
        self.info.row = self.sequencer.row();
        self.info.num_rows = self.sequencer.num_rows(module);
        self.info.frame = self.sequencer.tick();
        self.info.speed = self.sequencer.speed();
        self.info.bpm = self.sequencer.bpm();
        self.info.time_ms = self.time_ms();
        self.info.loop_count = self.sequencer.loop_count();
        self.voices.fill_info(&mut self.info);
        self.sequencer.advance(module, self.loop_enabled);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tp_ir::{Cell, Effect, Instrument, Note, Pattern, Sample, SampleData, VolumeCommand};

    fn square_sample() -> Sample {
        let mut sample = Sample::new("square");
        sample.data = SampleData::Mono8((0..64).map(|i| if i < 32 { 100 } else { -100 }).collect());
        sample.loop_start = 0;
        sample.loop_end = 64;
        sample.loop_type = tp_ir::LoopType::Forward;
        sample.default_volume = 64;
        sample
    }

    fn test_module(patterns: usize, rows: u16) -> Module {
        let mut module = Module::with_channels("engine", 4);
        for _ in 0..patterns {
            module.patterns.push(Pattern::new(rows, 4));
        }
        module.order = (0..patterns as u8).collect();
        module.instruments.push(Instrument::with_sample("square", square_sample()));
        *module.patterns[0].cell_mut(0, 0) = Cell {
            note: Note::On(48),
            instrument: 1,
            volume: VolumeCommand::None,
            effect: Effect::None,
        };
        module
    }

    fn engine_with(module: Module) -> Engine {
        let mut engine = Engine::new(EngineConfig {
            sample_rate: 8000,
            voices: 8,
            ..EngineConfig::default()
        });
        engine.load(Arc::new(module)).unwrap();
        engine
    }

    #[test]
    fn silent_when_not_started() {
        let mut engine = engine_with(test_module(1, 4));
        let mut out = [Frame::mono(7); 32];
        assert_eq!(engine.render(&mut out), RenderStatus::Silent);
        assert!(out.iter().all(|f| *f == Frame::silence()));
    }

    #[test]
    fn render_produces_audio() {
        let mut engine = engine_with(test_module(1, 4));
        assert!(engine.start());
        let mut out = [Frame::silence(); 256];
        assert_eq!(engine.render(&mut out), RenderStatus::Continue);
        assert!(out.iter().any(|f| f.left != 0));
    }

    #[test]
    fn render_spans_tick_boundaries() {
        let mut engine = engine_with(test_module(1, 4));
        engine.start();
        // 8000 * 2.5 / 125 = 160 frames per tick
        let mut out = [Frame::silence(); 500];
        engine.render(&mut out);
        assert_eq!(engine.snapshot().frame, 2);
        assert_eq!(engine.sequencer().tick(), 3);
    }

    #[test]
    fn play_tick_renders_one_tick() {
        let mut engine = engine_with(test_module(1, 4));
        engine.start();
        assert_eq!(engine.play_tick(), RenderStatus::Continue);
        assert_eq!(engine.last_tick().len(), 160);
        assert_eq!(engine.snapshot().row, 0);
        assert_eq!(engine.time_ms(), 20);
    }

    fn tempo_change_module() -> Module {
        let mut module = test_module(2, 4);
        let tempos = [255, 32, 97, 255, 33, 180, 32, 125];
        for (i, &bpm) in tempos.iter().enumerate() {
            let cell = module.patterns[i / 4].cell_mut((i % 4) as u16, 1);
            cell.effect = Effect::SetTempo(bpm);
        }
        module
    }

    #[test]
    fn tick_lengths_follow_tempo_changes() {
        let mut ticks = engine_with(tempo_change_module());
        ticks.start();
        let mut stream = Vec::new();
        while ticks.play_tick() == RenderStatus::Continue {
            let bpm = ticks.snapshot().bpm as usize;
            let exact = 8000 * 5 / (2 * bpm);
            let len = ticks.last_tick().len();
            assert!(len == exact || len == exact + 1, "bpm {bpm}: {len} frames");
            stream.extend_from_slice(ticks.last_tick());
        }
        stream.extend_from_slice(ticks.last_tick());
        assert_eq!(ticks.time_ms(), stream.len() as u64 * 1000 / 8000);

        let mut blocks = engine_with(tempo_change_module());
        blocks.start();
        let mut rendered = vec![Frame::mono(9); stream.len() + 100];
        for chunk in rendered.chunks_mut(777) {
            blocks.render(chunk);
        }
        assert_eq!(&rendered[..stream.len()], &stream[..]);
        assert!(rendered[stream.len()..].iter().all(|f| *f == Frame::silence()));
    }

    #[test]
    fn paused_engine_holds_position() {
        let mut engine = engine_with(test_module(1, 4));
        engine.start();
        for _ in 0..5 {
            engine.play_tick();
        }
        let before = engine.snapshot().clone();
        engine.set_paused(true);
        let mut out = [Frame::mono(1); 64];
        assert_eq!(engine.render(&mut out), RenderStatus::Silent);
        assert_eq!(engine.play_tick(), RenderStatus::Silent);
        engine.set_paused(false);
        assert_eq!(engine.snapshot(), &before);
        engine.play_tick();
        assert_eq!((engine.snapshot().row, engine.snapshot().frame), (0, 5));
        assert_eq!(engine.sequencer().row(), 1);
    }

    #[test]
    fn song_ends_without_loop() {
        let mut engine = engine_with(test_module(1, 2));
        engine.start();
        let statuses: Vec<_> = (0..13).map(|_| engine.play_tick()).collect();
        assert_eq!(statuses[10], RenderStatus::Continue);
        assert_eq!(statuses[11], RenderStatus::EndOfSong);
        assert_eq!(statuses[12], RenderStatus::EndOfSong);
        assert!(engine.last_tick().is_empty());
    }

    #[test]
    fn looping_song_keeps_playing() {
        let mut engine = engine_with(test_module(1, 2));
        engine.set_loop(true);
        engine.start();
        for _ in 0..50 {
            assert_eq!(engine.play_tick(), RenderStatus::Continue);
        }
        assert!(engine.snapshot().loop_count >= 3);
    }

    #[test]
    fn load_rejects_too_many_channels() {
        let mut engine = Engine::new(EngineConfig {
            voices: 2,
            ..EngineConfig::default()
        });
        let err = engine.load(Arc::new(test_module(1, 4))).unwrap_err();
        assert_eq!(err, CapacityError { needed: 4, capacity: 2 });
        assert!(engine.module().is_none());
    }

    #[test]
    fn global_volume_scales_output() {
        let mut loud = test_module(1, 4);
        loud.global_volume = 64;
        let mut quiet = loud.clone();
        quiet.global_volume = 16;

        let peak = |module: Module| {
            let mut engine = engine_with(module);
            engine.start();
            engine.play_tick();
            engine.last_tick().iter().map(|f| f.left.unsigned_abs()).max().unwrap_or(0)
        };
        assert!(peak(loud) > peak(quiet));
    }

    #[test]
    fn stop_silences_voices() {
        let mut engine = engine_with(test_module(1, 4));
        engine.start();
        engine.play_tick();
        assert!(engine.voices().active_count() > 0);
        engine.stop();
        assert_eq!(engine.voices().active_count(), 0);
        assert_eq!(engine.render(&mut [Frame::mono(3); 8]), RenderStatus::Silent);
        assert!(engine.start());
    }
}
