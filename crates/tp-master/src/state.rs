//! Transport state of the controller.

use std::fmt;

/// Lifecycle state of a [`crate::Controller`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum TransportState {
    /// No output session, no voices
    #[default]
    Uninitialized,
    /// Output open and voices allocated, nothing loaded yet
    Initialized,
    /// A module is installed and ready to start
    Loaded,
    Playing,
    Paused,
    /// Playback stopped; the module stays installed for a restart
    Stopped,
    /// The module was released. Accepts the same operations as
    /// `Initialized`.
    Released,
}

impl TransportState {
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Loaded => "loaded",
            Self::Playing => "playing",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
            Self::Released => "released",
        }
    }

    /// Whether the sequencer is primed (playing or paused).
    pub fn is_active(self) -> bool {
        matches!(self, Self::Playing | Self::Paused)
    }
}

impl fmt::Display for TransportState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
