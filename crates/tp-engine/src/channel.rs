//! Channel state for tracker playback.

use tp_ir::{
    ChannelSettings, Effect, EventPayload, FrequencyMode, LoopType, Module, Note, Sample,
    VolumeCommand,
};

use crate::envelope_state::EnvelopeCursor;
use crate::frequency::{clamp_period, note_to_period, period_to_increment, semitone_offset};
use crate::info::ChannelInfo;
use crate::mixer::Interpolation;

/// Fadeout level of a voice that has not been released.
const FADEOUT_FULL: u32 = 32768;

/// Shift applied after multiplying a sample value by its gain (0-4096).
/// One bit above the gain scale leaves headroom for summing voices.
const MIX_SHIFT: u32 = 13;

/// ProTracker vibrato table: one half period of a sine, 0-255.
const SINE_TABLE: [u8; 32] = [
    0, 24, 49, 74, 97, 120, 141, 161, 180, 197, 212, 224, 235, 244, 250, 253, 255, 253, 250, 244,
    235, 224, 212, 197, 180, 161, 141, 120, 97, 74, 49, 24,
];

/// Output parameters that apply to every voice on a tick.
#[derive(Clone, Copy, Debug)]
pub struct TickParams {
    pub sample_rate: u32,
    /// Global volume (0-64)
    pub global_volume: u8,
    /// Stereo separation in percent
    pub separation: u8,
}

/// A note held back by a note delay.
#[derive(Clone, Copy, Debug)]
struct PendingNote {
    note: Note,
    instrument: u8,
    tick: u8,
    volume: Option<u8>,
}

/// Mixing state for a single tracker channel.
#[derive(Clone, Debug)]
pub struct ChannelState {
    /// Current instrument (index into the module's instruments)
    pub(crate) instrument: Option<usize>,
    /// Current sample (index into the instrument's samples)
    pub(crate) sample: Option<usize>,
    /// Position in the sample (16.16 fixed-point)
    pub(crate) position: u64,
    /// Playback increment (16.16 fixed-point)
    pub(crate) increment: u32,
    /// Is the voice sounding?
    pub(crate) playing: bool,
    /// Ping-pong direction (true = forward)
    forward: bool,

    // Pitch
    /// Key from the pattern
    pub(crate) key: u8,
    /// Key after the sample's relative note
    real_key: u8,
    /// Finetune in 1/128 semitone
    finetune: i8,
    /// Current period (FastTracker II units)
    pub(crate) period: u32,
    /// Tone portamento target
    target_period: u32,
    /// Tone portamento speed
    porta_speed: u8,

    /// Volume (0-64)
    pub(crate) volume: u8,
    /// Panning (0 = left, 255 = right)
    pub(crate) pan: u8,

    // Row state
    effect: Effect,
    volume_command: VolumeCommand,
    /// A note was triggered on the current row
    triggered: bool,
    pending: Option<PendingNote>,

    // Effect memory
    vibrato_speed: u8,
    vibrato_depth: u8,
    vibrato_waveform: u8,
    vibrato_phase: u8,
    tremolo_speed: u8,
    tremolo_depth: u8,
    tremolo_waveform: u8,
    tremolo_phase: u8,
    porta_up_memory: u8,
    porta_down_memory: u8,
    volume_slide_memory: i8,
    panning_slide_memory: i8,
    offset_memory: u8,
    retrigger_interval: u8,
    retrigger_volume: u8,
    retrigger_count: u8,
    tremor: (u8, u8),
    tremor_count: u8,
    tremor_muted: bool,

    // Per-tick modulation
    period_offset: i32,
    volume_offset: i32,

    // Instrument state
    key_on: bool,
    fadeout: u32,
    volume_envelope: EnvelopeCursor,
    panning_envelope: EnvelopeCursor,
    autovibrato_phase: u8,
    autovibrato_sweep: u16,

    // Output
    /// Combined volume after envelope, fadeout and global volume (0-4096)
    pub(crate) final_volume: u32,
    /// Panning after the panning envelope
    pub(crate) final_pan: u8,
    left_gain: i32,
    right_gain: i32,
}

impl Default for ChannelState {
    fn default() -> Self {
        Self::new()
    }
}

impl ChannelState {
    /// Create a silent channel state.
    pub const fn new() -> Self {
        Self {
            instrument: None,
            sample: None,
            position: 0,
            increment: 0,
            playing: false,
            forward: true,
            key: 0,
            real_key: 0,
            finetune: 0,
            period: 0,
            target_period: 0,
            porta_speed: 0,
            volume: 64,
            pan: 128,
            effect: Effect::None,
            volume_command: VolumeCommand::None,
            triggered: false,
            pending: None,
            vibrato_speed: 0,
            vibrato_depth: 0,
            vibrato_waveform: 0,
            vibrato_phase: 0,
            tremolo_speed: 0,
            tremolo_depth: 0,
            tremolo_waveform: 0,
            tremolo_phase: 0,
            porta_up_memory: 0,
            porta_down_memory: 0,
            volume_slide_memory: 0,
            panning_slide_memory: 0,
            offset_memory: 0,
            retrigger_interval: 0,
            retrigger_volume: 0,
            retrigger_count: 0,
            tremor: (1, 1),
            tremor_count: 0,
            tremor_muted: false,
            period_offset: 0,
            volume_offset: 0,
            key_on: false,
            fadeout: FADEOUT_FULL,
            volume_envelope: EnvelopeCursor::new(),
            panning_envelope: EnvelopeCursor::new(),
            autovibrato_phase: 0,
            autovibrato_sweep: 0,
            final_volume: 0,
            final_pan: 128,
            left_gain: 0,
            right_gain: 0,
        }
    }

    /// Return to the power-on state with the channel's initial settings.
    pub fn reset(&mut self, settings: &ChannelSettings) {
        *self = Self::new();
        self.pan = settings.initial_pan;
        self.final_pan = settings.initial_pan;
        self.volume = settings.initial_volume.min(64);
    }

    /// Is the voice currently sounding?
    pub fn is_playing(&self) -> bool {
        self.playing
    }

    /// Silence the voice without touching its effect memory.
    pub fn stop(&mut self) {
        self.playing = false;
        self.final_volume = 0;
        self.left_gain = 0;
        self.right_gain = 0;
    }

    /// Sample currently bound to the voice.
    pub fn current_sample<'m>(&self, module: &'m Module) -> Option<&'m Sample> {
        let inst = module.instruments.get(self.instrument?)?;
        inst.samples.get(self.sample?)
    }

    /// Clear row-scoped effect state before a new row's commands arrive.
    pub fn begin_row(&mut self) {
        self.effect = Effect::None;
        self.volume_command = VolumeCommand::None;
        self.triggered = false;
        self.pending = None;
        self.tremor_muted = false;
    }

    /// Apply a command decoded from the current row.
    pub fn apply_event(&mut self, payload: &EventPayload, module: &Module) {
        match *payload {
            EventPayload::NoteOn { note, instrument } => self.trigger(note, instrument, module),
            EventPayload::PortaTarget { note, instrument } => {
                self.set_porta_target(note, instrument, module)
            }
            EventPayload::NoteOff => self.key_off(module),
            EventPayload::Instrument(instrument) => self.set_instrument(instrument, module),
            EventPayload::DelayedNote { note, instrument, ticks } => {
                self.pending = Some(PendingNote { note, instrument, tick: ticks, volume: None });
            }
            EventPayload::Volume(cmd) => self.apply_volume_command(cmd),
            EventPayload::Effect(effect) => self.apply_row_effect(effect, module),
            _ => {}
        }
    }

    /// Select an instrument by its 1-based number. Returns false if the
    /// number refers to no instrument, which silences the channel.
    fn select_instrument(&mut self, instrument: u8, module: &Module) -> bool {
        if instrument == 0 {
            return self.instrument.is_some();
        }
        let index = instrument as usize - 1;
        if index < module.instruments.len() {
            self.instrument = Some(index);
            true
        } else {
            self.instrument = None;
            self.stop();
            false
        }
    }

    /// Trigger a note.
    fn trigger(&mut self, key: u8, instrument: u8, module: &Module) {
        self.key = key;
        self.triggered = true;
        if !self.select_instrument(instrument, module) {
            self.stop();
            return;
        }
        let Some(inst) = self.instrument.and_then(|i| module.instruments.get(i)) else {
            return;
        };
        let Some((index, sample)) = inst.sample_for_key(key) else {
            self.stop();
            return;
        };

        self.sample = Some(index);
        self.real_key = (key as i16 + sample.relative_note as i16).clamp(0, 119) as u8;
        self.finetune = sample.finetune;
        self.period = note_to_period(module.frequency_mode, self.real_key, self.finetune);
        if instrument != 0 {
            self.load_defaults(sample);
        }
        self.position = 0;
        self.forward = true;
        self.playing = !sample.is_empty();
        self.restart_instrument();
        if self.vibrato_waveform & 4 == 0 {
            self.vibrato_phase = 0;
        }
        if self.tremolo_waveform & 4 == 0 {
            self.tremolo_phase = 0;
        }
        self.retrigger_count = 0;
        self.tremor_count = 0;
    }

    /// Note with tone portamento: slide toward the note instead of playing it.
    fn set_porta_target(&mut self, key: u8, instrument: u8, module: &Module) {
        if self.period == 0 || self.sample.is_none() {
            self.trigger(key, instrument, module);
            return;
        }
        if instrument != 0 && self.select_instrument(instrument, module) {
            if let Some(sample) = self.current_sample(module) {
                self.load_defaults(sample);
            }
            self.restart_instrument();
        }
        let relative = self.current_sample(module).map_or(0, |s| s.relative_note);
        let real_key = (key as i16 + relative as i16).clamp(0, 119) as u8;
        self.key = key;
        self.real_key = real_key;
        self.target_period = note_to_period(module.frequency_mode, real_key, self.finetune);
    }

    /// Instrument number without a note: reload the sample defaults and
    /// restart the envelopes, keep the sample playing.
    fn set_instrument(&mut self, instrument: u8, module: &Module) {
        if !self.select_instrument(instrument, module) {
            return;
        }
        let defaults = self
            .instrument
            .and_then(|i| module.instruments.get(i))
            .and_then(|inst| inst.sample_for_key(self.key))
            .map(|(_, sample)| sample);
        if let Some(sample) = defaults {
            self.load_defaults(sample);
        }
        self.restart_instrument();
    }

    fn load_defaults(&mut self, sample: &Sample) {
        self.volume = sample.default_volume.min(64);
        if let Some(pan) = sample.default_pan {
            self.pan = pan;
        }
    }

    fn restart_instrument(&mut self) {
        self.key_on = true;
        self.fadeout = FADEOUT_FULL;
        self.volume_envelope.reset();
        self.panning_envelope.reset();
        self.autovibrato_phase = 0;
        self.autovibrato_sweep = 0;
    }

    /// Release the note. Without a volume envelope the note is cut.
    fn key_off(&mut self, module: &Module) {
        self.key_on = false;
        let has_envelope = self
            .instrument
            .and_then(|i| module.instruments.get(i))
            .and_then(|inst| inst.volume_envelope.as_ref())
            .is_some_and(|env| env.enabled);
        if !has_envelope {
            self.volume = 0;
        }
    }

    fn apply_volume_command(&mut self, cmd: VolumeCommand) {
        self.volume_command = cmd;
        match cmd {
            VolumeCommand::Volume(v) => match &mut self.pending {
                Some(pending) => pending.volume = Some(v.min(64)),
                None => self.volume = v.min(64),
            },
            VolumeCommand::FineVolSlideDown(x) => self.slide_volume(-(x as i32)),
            VolumeCommand::FineVolSlideUp(x) => self.slide_volume(x as i32),
            VolumeCommand::VibratoSpeed(x) if x != 0 => self.vibrato_speed = x,
            VolumeCommand::Vibrato(x) if x != 0 => self.vibrato_depth = x,
            VolumeCommand::Panning(p) => self.pan = p,
            VolumeCommand::TonePorta(x) if x != 0 => self.porta_speed = x,
            _ => {}
        }
    }

    /// Apply an effect on the first tick of its row.
    fn apply_row_effect(&mut self, effect: Effect, module: &Module) {
        let mode = module.frequency_mode;
        self.effect = effect;
        match effect {
            Effect::PortaUp(p) if p != 0 => self.porta_up_memory = p,
            Effect::PortaDown(p) if p != 0 => self.porta_down_memory = p,
            Effect::TonePorta(p) if p != 0 => self.porta_speed = p,
            Effect::Vibrato { speed, depth } => {
                if speed != 0 {
                    self.vibrato_speed = speed;
                }
                if depth != 0 {
                    self.vibrato_depth = depth;
                }
            }
            Effect::Tremolo { speed, depth } => {
                if speed != 0 {
                    self.tremolo_speed = speed;
                }
                if depth != 0 {
                    self.tremolo_depth = depth;
                }
            }
            Effect::TonePortaVolSlide(s) | Effect::VibratoVolSlide(s) | Effect::VolumeSlide(s) => {
                // ProTracker has no slide memory; a zero parameter does nothing
                if s != 0 || mode == FrequencyMode::ProTracker {
                    self.volume_slide_memory = s;
                }
            }
            Effect::SetPan(p) => self.pan = p,
            Effect::SampleOffset(o) => {
                if o != 0 {
                    self.offset_memory = o;
                }
                if self.triggered {
                    self.apply_sample_offset(module);
                }
            }
            Effect::SetVolume(v) => self.volume = v.min(64),
            Effect::FinePortaUp(p) => self.slide_period(-(p as i32) * 4, mode),
            Effect::FinePortaDown(p) => self.slide_period(p as i32 * 4, mode),
            Effect::ExtraFinePortaUp(p) => self.slide_period(-(p as i32), mode),
            Effect::ExtraFinePortaDown(p) => self.slide_period(p as i32, mode),
            Effect::SetVibratoWaveform(w) => self.vibrato_waveform = w,
            Effect::SetTremoloWaveform(w) => self.tremolo_waveform = w,
            Effect::SetFinetune(ft) => {
                self.finetune = ft.saturating_mul(16);
                if self.triggered {
                    self.period = note_to_period(mode, self.real_key, self.finetune);
                }
            }
            Effect::SetPanPosition(p) => self.pan = (p & 0x0F) * 17,
            Effect::FineVolumeSlideUp(v) => self.slide_volume(v as i32),
            Effect::FineVolumeSlideDown(v) => self.slide_volume(-(v as i32)),
            Effect::NoteCut(0) => self.volume = 0,
            Effect::KeyOff(0) => self.key_off(module),
            Effect::SetEnvelopePosition(p) => {
                self.volume_envelope.set_position(p as u16);
                self.panning_envelope.set_position(p as u16);
            }
            Effect::PanningSlide(s) if s != 0 => self.panning_slide_memory = s,
            Effect::Retrigger { interval, volume_change } => {
                if interval != 0 {
                    self.retrigger_interval = interval;
                }
                if volume_change != 0 {
                    self.retrigger_volume = volume_change;
                }
            }
            Effect::Tremor { on, off } => self.tremor = (on.max(1), off.max(1)),
            _ => {}
        }
    }

    fn apply_sample_offset(&mut self, module: &Module) {
        let offset = (self.offset_memory as u64) << 8;
        let len = self.current_sample(module).map_or(0, |s| s.len() as u64);
        if offset >= len {
            self.stop();
        } else {
            self.position = offset << 16;
        }
    }

    /// Run one tick: delayed notes, per-tick effects, envelopes, and the
    /// final increment and gains used by [`ChannelState::mix`].
    pub fn process_tick(&mut self, tick: u16, module: &Module, params: &TickParams) {
        if let Some(pending) = self.pending {
            if tick == pending.tick as u16 {
                self.pending = None;
                self.play_pending(pending, module);
            }
        }

        self.period_offset = 0;
        self.volume_offset = 0;
        if let Effect::Arpeggio { x, y } = self.effect {
            let semitones = match tick % 3 {
                0 => 0,
                1 => x,
                _ => y,
            };
            if semitones != 0 {
                self.period_offset =
                    semitone_offset(module.frequency_mode, self.real_key, self.finetune, semitones);
            }
        }
        if tick > 0 {
            self.run_tick_effects(tick, module);
        }
        self.update_output(module, params);
    }

    fn play_pending(&mut self, pending: PendingNote, module: &Module) {
        match pending.note {
            Note::On(key) => self.trigger(key, pending.instrument, module),
            Note::Off => self.key_off(module),
            Note::None if pending.instrument != 0 => self.set_instrument(pending.instrument, module),
            Note::None => {}
        }
        if let Some(volume) = pending.volume {
            self.volume = volume;
        }
    }

    fn run_tick_effects(&mut self, tick: u16, module: &Module) {
        let mode = module.frequency_mode;
        match self.effect {
            Effect::PortaUp(_) => self.slide_period(-(self.porta_up_memory as i32) * 4, mode),
            Effect::PortaDown(_) => self.slide_period(self.porta_down_memory as i32 * 4, mode),
            Effect::TonePorta(_) => self.tone_porta(),
            Effect::Vibrato { .. } => self.vibrato(),
            Effect::TonePortaVolSlide(_) => {
                self.tone_porta();
                self.slide_volume(self.volume_slide_memory as i32);
            }
            Effect::VibratoVolSlide(_) => {
                self.vibrato();
                self.slide_volume(self.volume_slide_memory as i32);
            }
            Effect::Tremolo { .. } => self.tremolo(),
            Effect::VolumeSlide(_) => self.slide_volume(self.volume_slide_memory as i32),
            Effect::RetriggerNote(x) if x > 0 && tick % x as u16 == 0 => self.retrigger(),
            Effect::NoteCut(t) if t as u16 == tick => self.volume = 0,
            Effect::KeyOff(t) if t as u16 == tick => self.key_off(module),
            Effect::PanningSlide(_) => self.slide_pan(self.panning_slide_memory as i32),
            Effect::Retrigger { .. } => self.multi_retrigger(),
            Effect::Tremor { .. } => {
                let (on, off) = self.tremor;
                self.tremor_muted = self.tremor_count >= on;
                self.tremor_count = (self.tremor_count + 1) % (on + off);
            }
            _ => {}
        }

        match self.volume_command {
            VolumeCommand::VolumeSlideDown(x) => self.slide_volume(-(x as i32)),
            VolumeCommand::VolumeSlideUp(x) => self.slide_volume(x as i32),
            VolumeCommand::Vibrato(_) if !matches!(self.effect, Effect::Vibrato { .. }) => {
                self.vibrato()
            }
            VolumeCommand::PanSlideLeft(x) => self.slide_pan(-(x as i32)),
            VolumeCommand::PanSlideRight(x) => self.slide_pan(x as i32),
            VolumeCommand::TonePorta(_) if !self.effect.is_tone_porta() => self.tone_porta(),
            _ => {}
        }
    }

    fn slide_volume(&mut self, delta: i32) {
        self.volume = (self.volume as i32 + delta).clamp(0, 64) as u8;
    }

    fn slide_pan(&mut self, delta: i32) {
        self.pan = (self.pan as i32 + delta).clamp(0, 255) as u8;
    }

    fn slide_period(&mut self, delta: i32, mode: FrequencyMode) {
        if self.period > 0 {
            self.period = clamp_period(mode, self.period as i32 + delta);
        }
    }

    fn tone_porta(&mut self) {
        if self.target_period == 0 || self.period == 0 {
            return;
        }
        let step = self.porta_speed as u32 * 4;
        self.period = if self.period < self.target_period {
            (self.period + step).min(self.target_period)
        } else {
            self.period.saturating_sub(step).max(self.target_period)
        };
    }

    fn vibrato(&mut self) {
        let wave = waveform_value(self.vibrato_waveform, self.vibrato_phase);
        self.period_offset = (wave * self.vibrato_depth as i32) >> 5;
        self.vibrato_phase = (self.vibrato_phase + self.vibrato_speed) & 0x3F;
    }

    fn tremolo(&mut self) {
        let wave = waveform_value(self.tremolo_waveform, self.tremolo_phase);
        self.volume_offset = (wave * self.tremolo_depth as i32) >> 6;
        self.tremolo_phase = (self.tremolo_phase + self.tremolo_speed) & 0x3F;
    }

    fn retrigger(&mut self) {
        if self.sample.is_some() && self.period > 0 {
            self.position = 0;
            self.forward = true;
            self.playing = true;
        }
    }

    /// FastTracker II `Rxy`: retrigger every x ticks and change the volume.
    fn multi_retrigger(&mut self) {
        if self.retrigger_interval == 0 {
            return;
        }
        self.retrigger_count += 1;
        if self.retrigger_count < self.retrigger_interval {
            return;
        }
        self.retrigger_count = 0;
        let v = self.volume as i32;
        let volume = match self.retrigger_volume {
            1..=5 => v - (1 << (self.retrigger_volume - 1)),
            6 => v * 2 / 3,
            7 => v / 2,
            9..=0xD => v + (1 << (self.retrigger_volume - 9)),
            0xE => v * 3 / 2,
            0xF => v * 2,
            _ => v,
        };
        self.volume = volume.clamp(0, 64) as u8;
        self.retrigger();
    }

    fn update_output(&mut self, module: &Module, params: &TickParams) {
        let mode = module.frequency_mode;
        let mut env_volume = 64i32;
        let mut env_pan = 32i32;
        let mut autovibrato = 0i32;

        if let Some(inst) = self.instrument.and_then(|i| module.instruments.get(i)) {
            if let Some(env) = inst.volume_envelope.as_ref().filter(|e| e.enabled) {
                env_volume = (self.volume_envelope.value(env) as i32).clamp(0, 64);
                self.volume_envelope.advance(env, self.key_on);
            }
            if let Some(env) = inst.panning_envelope.as_ref().filter(|e| e.enabled) {
                env_pan = (self.panning_envelope.value(env) as i32).clamp(0, 64);
                self.panning_envelope.advance(env, self.key_on);
            }
            if !self.key_on {
                self.fadeout = self.fadeout.saturating_sub(inst.fadeout as u32);
            }

            let av = inst.vibrato;
            if av.depth != 0 && av.rate != 0 {
                let sweep = if av.sweep == 0 {
                    256
                } else {
                    (self.autovibrato_sweep as i32 * 256 / av.sweep as i32).min(256)
                };
                let wave = autovibrato_value(av.waveform, self.autovibrato_phase);
                autovibrato = (wave * av.depth as i32 * sweep) >> 14;
                self.autovibrato_phase = self.autovibrato_phase.wrapping_add(av.rate);
                if self.autovibrato_sweep < av.sweep as u16 {
                    self.autovibrato_sweep += 1;
                }
            }
        }

        if self.playing && self.period > 0 {
            let period = (self.period as i32 + self.period_offset + autovibrato).max(1) as u32;
            self.increment = period_to_increment(mode, period, params.sample_rate);
        }

        let volume = (self.volume as i32 + self.volume_offset).clamp(0, 64) as u64;
        let product = volume
            * env_volume as u64
            * self.fadeout as u64
            * params.global_volume.min(64) as u64;
        self.final_volume = if self.tremor_muted { 0 } else { (product >> 21) as u32 };

        let pan = self.pan as i32;
        let swing = 128 - (pan - 128).abs();
        self.final_pan = (pan + (env_pan - 32) * swing / 32).clamp(0, 255) as u8;

        let separated = 128 + (self.final_pan as i32 - 128) * params.separation.min(100) as i32 / 100;
        let gain = self.final_volume as i32;
        self.right_gain = (gain * separated) >> 8;
        self.left_gain = (gain * (256 - separated)) >> 8;
    }

    /// Render one output frame from the voice and advance its position.
    pub fn mix(&mut self, sample: &Sample, interpolation: Interpolation) -> (i32, i32) {
        let (left, right) = match interpolation {
            Interpolation::Nearest => {
                let index = (self.position >> 16) as usize;
                (sample.data.get_mono(index), sample.data.get_right(index))
            }
            Interpolation::Linear => (
                sample.data.get_mono_interpolated(self.position),
                sample.data.get_right_interpolated(self.position),
            ),
        };
        let out = (
            (left as i32 * self.left_gain) >> MIX_SHIFT,
            (right as i32 * self.right_gain) >> MIX_SHIFT,
        );
        self.advance_position(sample);
        out
    }

    fn advance_position(&mut self, sample: &Sample) {
        let step = self.increment as i64;
        let mut pos = self.position as i64 + if self.forward { step } else { -step };
        let start = (sample.loop_start as i64) << 16;
        let end = (sample.loop_end as i64) << 16;

        match sample.loop_type {
            _ if !sample.has_loop() => {
                if pos >= (sample.len() as i64) << 16 {
                    self.playing = false;
                }
            }
            LoopType::Forward => {
                if pos >= end {
                    pos = start + (pos - end) % (end - start);
                }
            }
            LoopType::PingPong => {
                let len = end - start;
                if self.forward && pos >= end {
                    pos = end - 1 - (pos - end) % len;
                    self.forward = false;
                } else if !self.forward && pos < start {
                    pos = start + (start - pos) % len;
                    self.forward = true;
                }
            }
            LoopType::None => {}
        }
        self.position = pos.max(0) as u64;
    }

    /// Telemetry for this channel.
    pub fn info(&self) -> ChannelInfo {
        ChannelInfo {
            final_volume: if self.playing { (self.final_volume >> 6) as u8 } else { 0 },
            instrument: self.instrument.map_or(0, |i| (i + 1).min(255) as u8),
            key: self.key,
            pan: self.final_pan,
            period: self.period,
            volume: self.volume,
        }
    }
}

/// ProTracker waveforms: 0 sine, 1 ramp down, 2 square (3 as square).
/// `phase` runs 0-63; the result is -255..=255.
fn waveform_value(waveform: u8, phase: u8) -> i32 {
    let pos = (phase & 0x1F) as i32;
    let negative = phase & 0x20 != 0;
    let magnitude = match waveform & 3 {
        0 => SINE_TABLE[pos as usize] as i32,
        1 if negative => 255 - pos * 8,
        1 => pos * 8,
        _ => 255,
    };
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

/// FastTracker II auto-vibrato waveforms over a 0-255 phase:
/// 0 sine, 1 square, 2 ramp down, 3 ramp up.
fn autovibrato_value(waveform: u8, phase: u8) -> i32 {
    match waveform & 3 {
        0 => waveform_value(0, phase >> 2),
        1 if phase < 128 => 255,
        1 => -255,
        2 => 255 - phase as i32 * 2,
        _ => phase as i32 * 2 - 255,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tp_ir::{Envelope, Instrument, SampleData};

    const PARAMS: TickParams = TickParams { sample_rate: 44100, global_volume: 64, separation: 100 };

    fn module_with(sample: Sample) -> Module {
        let mut module = Module::with_channels("test", 4);
        module.instruments.push(Instrument::with_sample("inst", sample));
        module
    }

    fn square_sample(len: usize) -> Sample {
        let mut sample = Sample::new("square");
        sample.data = SampleData::Mono8((0..len).map(|i| if i % 2 == 0 { 64 } else { -64 }).collect());
        sample
    }

    fn playing_channel(module: &Module) -> ChannelState {
        let mut ch = ChannelState::new();
        ch.reset(&module.channels[0]);
        ch.apply_event(&EventPayload::NoteOn { note: 48, instrument: 1 }, module);
        ch.process_tick(0, module, &PARAMS);
        ch
    }

    #[test]
    fn trigger_sets_period_and_increment() {
        let module = module_with(square_sample(1000));
        let ch = playing_channel(&module);
        assert!(ch.is_playing());
        assert_eq!(ch.period, 1712);
        assert_eq!(ch.increment, (8363u64 * 65536 / 44100) as u32);
        assert_eq!(ch.info().instrument, 1);
        assert_eq!(ch.info().final_volume, 64);
    }

    #[test]
    fn missing_instrument_silences() {
        let module = module_with(square_sample(100));
        let mut ch = playing_channel(&module);
        ch.begin_row();
        ch.apply_event(&EventPayload::NoteOn { note: 48, instrument: 9 }, &module);
        assert!(!ch.is_playing());
        assert_eq!(ch.info().instrument, 0);
    }

    #[test]
    fn volume_slide_runs_after_first_tick() {
        let module = module_with(square_sample(1000));
        let mut ch = playing_channel(&module);
        ch.begin_row();
        ch.apply_event(&EventPayload::Effect(Effect::VolumeSlide(-4)), &module);
        for tick in 0..6 {
            ch.process_tick(tick, &module, &PARAMS);
        }
        assert_eq!(ch.volume, 64 - 5 * 4);
    }

    #[test]
    fn porta_up_clamps_in_protracker_mode() {
        let module = module_with(square_sample(1000));
        let mut ch = playing_channel(&module);
        ch.begin_row();
        ch.apply_event(&EventPayload::Effect(Effect::PortaUp(0xFF)), &module);
        for tick in 0..6 {
            ch.process_tick(tick, &module, &PARAMS);
        }
        assert_eq!(ch.period, crate::frequency::PROTRACKER_MIN);
    }

    #[test]
    fn tone_porta_stops_at_target() {
        let module = module_with(square_sample(1000));
        let mut ch = playing_channel(&module);
        ch.begin_row();
        ch.apply_event(&EventPayload::PortaTarget { note: 49, instrument: 0 }, &module);
        ch.apply_event(&EventPayload::Effect(Effect::TonePorta(0x40)), &module);
        for tick in 0..6 {
            ch.process_tick(tick, &module, &PARAMS);
        }
        assert_eq!(ch.period, 404 * 4);
        assert_eq!(ch.key, 49);
    }

    #[test]
    fn sample_offset_past_end_stops_voice() {
        let module = module_with(square_sample(200));
        let mut ch = ChannelState::new();
        ch.apply_event(&EventPayload::NoteOn { note: 48, instrument: 1 }, &module);
        ch.apply_event(&EventPayload::Effect(Effect::SampleOffset(2)), &module);
        assert!(!ch.is_playing());
    }

    #[test]
    fn sample_offset_moves_position() {
        let module = module_with(square_sample(1000));
        let mut ch = ChannelState::new();
        ch.apply_event(&EventPayload::NoteOn { note: 48, instrument: 1 }, &module);
        ch.apply_event(&EventPayload::Effect(Effect::SampleOffset(2)), &module);
        assert_eq!(ch.position >> 16, 512);
    }

    fn hold_effect(ch: &mut ChannelState, module: &Module, effect: Effect, rows: usize) {
        for _ in 0..rows {
            ch.begin_row();
            ch.apply_event(&EventPayload::Effect(effect), module);
            for tick in 0..6 {
                ch.process_tick(tick, module, &PARAMS);
            }
        }
    }

    #[test]
    fn retrigger_without_interval_is_inert() {
        let module = module_with(square_sample(100_000));
        let mut ch = playing_channel(&module);
        let effect = Effect::Retrigger { interval: 0, volume_change: 8 };
        hold_effect(&mut ch, &module, effect, 60);
        assert_eq!(ch.retrigger_count, 0);
        assert_eq!(ch.volume, 64);
        assert!(ch.is_playing());
    }

    #[test]
    fn retrigger_held_for_many_rows_keeps_counting() {
        let module = module_with(square_sample(100_000));
        let mut ch = playing_channel(&module);
        let effect = Effect::Retrigger { interval: 3, volume_change: 1 };
        hold_effect(&mut ch, &module, effect, 60);
        assert!(ch.retrigger_count < 3);
        assert_eq!(ch.volume, 0);
    }

    #[test]
    fn key_off_without_envelope_cuts() {
        let module = module_with(square_sample(1000));
        let mut ch = playing_channel(&module);
        ch.apply_event(&EventPayload::NoteOff, &module);
        assert_eq!(ch.volume, 0);
    }

    #[test]
    fn key_off_with_envelope_fades_out() {
        let mut module = module_with(square_sample(1000));
        let mut env = Envelope::new();
        env.add_point(0, 64);
        env.add_point(10, 64);
        env.enabled = true;
        module.instruments[0].volume_envelope = Some(env);
        module.instruments[0].fadeout = 4096;

        let mut ch = playing_channel(&module);
        ch.apply_event(&EventPayload::NoteOff, &module);
        assert_eq!(ch.volume, 64);
        ch.process_tick(1, &module, &PARAMS);
        assert_eq!(ch.fadeout, FADEOUT_FULL - 4096);
        for tick in 2..20 {
            ch.process_tick(tick, &module, &PARAMS);
        }
        assert_eq!(ch.final_volume, 0);
    }

    #[test]
    fn delayed_note_waits_for_its_tick() {
        let module = module_with(square_sample(1000));
        let mut ch = ChannelState::new();
        ch.begin_row();
        ch.apply_event(
            &EventPayload::DelayedNote { note: Note::On(48), instrument: 1, ticks: 3 },
            &module,
        );
        ch.apply_event(&EventPayload::Volume(VolumeCommand::Volume(20)), &module);
        ch.process_tick(0, &module, &PARAMS);
        ch.process_tick(2, &module, &PARAMS);
        assert!(!ch.is_playing());
        ch.process_tick(3, &module, &PARAMS);
        assert!(ch.is_playing());
        assert_eq!(ch.volume, 20);
    }

    #[test]
    fn forward_loop_wraps_position() {
        let mut sample = square_sample(100);
        sample.loop_start = 50;
        sample.loop_end = 100;
        sample.loop_type = LoopType::Forward;
        let mut ch = ChannelState::new();
        ch.playing = true;
        ch.increment = 30 << 16;
        ch.position = 90 << 16;
        ch.advance_position(&sample);
        assert_eq!(ch.position >> 16, 70);
        assert!(ch.is_playing());
    }

    #[test]
    fn ping_pong_loop_reverses() {
        let mut sample = square_sample(100);
        sample.loop_start = 50;
        sample.loop_end = 100;
        sample.loop_type = LoopType::PingPong;
        let mut ch = ChannelState::new();
        ch.playing = true;
        ch.increment = 10 << 16;
        ch.position = 95 << 16;
        ch.advance_position(&sample);
        assert!(!ch.forward);
        assert!(ch.position >> 16 < 100);
        ch.position = 52 << 16;
        ch.advance_position(&sample);
        assert!(ch.forward);
        assert_eq!(ch.position >> 16, 58);
    }

    #[test]
    fn unlooped_sample_ends() {
        let sample = square_sample(10);
        let mut ch = ChannelState::new();
        ch.playing = true;
        ch.increment = 4 << 16;
        ch.position = 8 << 16;
        ch.advance_position(&sample);
        assert!(!ch.is_playing());
    }

    #[test]
    fn hard_left_pan_only_feeds_left() {
        let module = module_with(square_sample(1000));
        let mut ch = playing_channel(&module);
        let sample = &module.instruments[0].samples[0];
        let (left, right) = ch.mix(sample, Interpolation::Nearest);
        assert!(left > 0);
        assert_eq!(right, 0);
    }

    #[test]
    fn vibrato_modulates_period_offset_only() {
        let module = module_with(square_sample(1000));
        let mut ch = playing_channel(&module);
        let base_increment = ch.increment;
        ch.begin_row();
        ch.apply_event(&EventPayload::Effect(Effect::Vibrato { speed: 8, depth: 8 }), &module);
        ch.process_tick(0, &module, &PARAMS);
        ch.process_tick(1, &module, &PARAMS);
        ch.process_tick(2, &module, &PARAMS);
        assert_eq!(ch.period, 1712);
        assert_ne!(ch.increment, base_increment);
    }

    #[test]
    fn waveforms_are_bounded() {
        for waveform in 0..4 {
            for phase in 0..64 {
                assert!(waveform_value(waveform, phase).abs() <= 255);
            }
        }
        assert_eq!(waveform_value(0, 16), 255);
        assert_eq!(waveform_value(0, 48), -255);
        assert_eq!(autovibrato_value(3, 0), -255);
    }
}
