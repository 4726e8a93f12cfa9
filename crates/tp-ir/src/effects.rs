//! Effect command types for tracker patterns.

/// Volume column command (FastTracker II).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum VolumeCommand {
    #[default]
    None,
    /// Set volume (0-64)
    Volume(u8),
    VolumeSlideDown(u8),
    VolumeSlideUp(u8),
    FineVolSlideDown(u8),
    FineVolSlideUp(u8),
    /// Set vibrato speed (shares memory with the effect column)
    VibratoSpeed(u8),
    /// Vibrato with the given depth
    Vibrato(u8),
    /// Set panning (0-255)
    Panning(u8),
    PanSlideLeft(u8),
    PanSlideRight(u8),
    /// Tone portamento (speed already scaled to effect-column units)
    TonePorta(u8),
}

/// Effect column command.
///
/// Covers the ProTracker command set plus the FastTracker II extensions.
/// A zero parameter on a slide means "reuse the channel's last value".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Effect {
    #[default]
    None,

    // === Arpeggio & Portamento ===
    /// Arpeggio: cycle between note, note+x, note+y each tick
    Arpeggio { x: u8, y: u8 },
    /// Slide pitch up by amount per tick
    PortaUp(u8),
    /// Slide pitch down by amount per tick
    PortaDown(u8),
    /// Slide toward target note
    TonePorta(u8),
    /// Vibrato with speed and depth
    Vibrato { speed: u8, depth: u8 },
    /// Tone portamento + volume slide
    TonePortaVolSlide(i8),
    /// Vibrato + volume slide
    VibratoVolSlide(i8),

    // === Tremolo & Volume ===
    /// Tremolo (volume oscillation)
    Tremolo { speed: u8, depth: u8 },
    /// Set channel panning (0-255)
    SetPan(u8),
    /// Set sample offset (in 256-frame units)
    SampleOffset(u8),
    /// Volume slide up/down per tick
    VolumeSlide(i8),
    /// Jump to order position
    PositionJump(u8),
    /// Set channel volume (0-64)
    SetVolume(u8),
    /// Break to row in next pattern
    PatternBreak(u8),

    // === Extended effects (Exy) ===
    /// Fine porta up (once per row)
    FinePortaUp(u8),
    /// Fine porta down (once per row)
    FinePortaDown(u8),
    /// Set vibrato waveform (0=sine, 1=ramp, 2=square; +4 = no retrigger)
    SetVibratoWaveform(u8),
    /// Set finetune (-8 to +7)
    SetFinetune(i8),
    /// Pattern loop (0=set start, n=loop n times)
    PatternLoop(u8),
    /// Set tremolo waveform
    SetTremoloWaveform(u8),
    /// Coarse panning (0-15)
    SetPanPosition(u8),
    /// Retrigger note every n ticks
    RetriggerNote(u8),
    /// Fine volume slide up (once per row)
    FineVolumeSlideUp(u8),
    /// Fine volume slide down (once per row)
    FineVolumeSlideDown(u8),
    /// Cut note after n ticks
    NoteCut(u8),
    /// Delay note by n ticks
    NoteDelay(u8),
    /// Delay pattern by n rows
    PatternDelay(u8),

    // === Speed & Tempo ===
    /// Set ticks per row (speed)
    SetSpeed(u8),
    /// Set BPM tempo
    SetTempo(u8),

    // === FastTracker II ===
    /// Set global volume (0-64)
    SetGlobalVolume(u8),
    /// Global volume slide
    GlobalVolumeSlide(i8),
    /// Release the note after n ticks
    KeyOff(u8),
    /// Set envelope position (ticks)
    SetEnvelopePosition(u8),
    /// Panning slide (positive = right)
    PanningSlide(i8),
    /// Retrigger with volume change
    Retrigger { interval: u8, volume_change: u8 },
    /// Tremor (on/off volume gating, in ticks)
    Tremor { on: u8, off: u8 },
    /// Extra fine porta up
    ExtraFinePortaUp(u8),
    /// Extra fine porta down
    ExtraFinePortaDown(u8),
}

impl Effect {
    /// Returns true if this effect sets up a tone portamento instead of
    /// triggering the note on its row.
    pub fn is_tone_porta(&self) -> bool {
        matches!(self, Effect::TonePorta(_) | Effect::TonePortaVolSlide(_))
    }
}
