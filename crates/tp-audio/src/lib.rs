//! Audio output backends for the trackplay module player.

mod cpal_backend;
mod null_backend;
mod traits;

pub use cpal_backend::CpalOutput;
pub use null_backend::NullOutput;
pub use traits::{AudioError, AudioOutput, Backend, OutputStats};

/// Open an output of the given kind.
pub fn open_output(
    backend: Backend,
    sample_rate: u32,
    buffer_ms: u32,
) -> Result<Box<dyn AudioOutput>, AudioError> {
    log::debug!("opening {backend:?} output at {sample_rate} Hz");
    Ok(match backend {
        Backend::Cpal => Box::new(CpalOutput::open(sample_rate, buffer_ms)?),
        Backend::Null => Box::new(NullOutput::new(sample_rate, buffer_ms)),
    })
}
