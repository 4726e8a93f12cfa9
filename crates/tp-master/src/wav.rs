//! Offline rendering to 16-bit stereo WAV.

use std::io::Write;
use std::sync::Arc;

use tp_engine::{scan_sequences, Engine, EngineConfig, Frame, RenderStatus};
use tp_ir::Module;

use crate::PlayerError;

pub fn write_wav(w: &mut impl Write, frames: &[Frame], sample_rate: u32) -> std::io::Result<()> {
    let num_channels: u16 = 2;
    let bits_per_sample: u16 = 16;
    let block_align = num_channels * (bits_per_sample / 8);
    let data_size = frames.len() as u32 * block_align as u32;

    write_riff_header(w, data_size)?;
    write_fmt_chunk(w, num_channels, sample_rate, block_align, bits_per_sample)?;
    write_data_chunk(w, frames, data_size)
}

pub fn frames_to_wav(frames: &[Frame], sample_rate: u32) -> Vec<u8> {
    let mut buf = Vec::with_capacity(44 + frames.len() * 4);
    // Writing into a Vec cannot fail
    let _ = write_wav(&mut buf, frames, sample_rate);
    buf
}

/// Which part of a module to render offline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RenderOptions {
    /// Sub-song index, as listed by `scan_sequences`
    pub sequence: usize,
    /// Wrap at the end of the song; only the frame limit stops the render
    pub loop_song: bool,
}

/// Play a module without a device, up to `max_frames`.
pub fn render_frames(
    module: Arc<Module>,
    config: EngineConfig,
    options: RenderOptions,
    max_frames: usize,
) -> Result<Vec<Frame>, PlayerError> {
    let entry = scan_sequences(&module)
        .get(options.sequence)
        .map(|s| s.entry)
        .ok_or(PlayerError::InvalidPosition(options.sequence))?;
    let mut engine = Engine::new(config);
    engine.load(module).map_err(PlayerError::ChannelCapacity)?;
    engine.set_loop(options.loop_song);
    engine.set_start_order(entry);
    engine.start();

    let mut frames = Vec::with_capacity(max_frames.min(config.sample_rate as usize * 600));
    while frames.len() < max_frames {
        // Render tick by tick so the song end is frame exact
        let status = engine.play_tick();
        let tick = engine.last_tick();
        let take = tick.len().min(max_frames - frames.len());
        frames.extend_from_slice(&tick[..take]);
        if status != RenderStatus::Continue {
            break;
        }
    }
    Ok(frames)
}

/// Render at most `max_seconds` of a module and write it as WAV.
/// Returns the number of frames written.
pub fn render_to_wav(
    module: Arc<Module>,
    config: EngineConfig,
    options: RenderOptions,
    max_seconds: u32,
    w: &mut impl Write,
) -> Result<usize, PlayerError> {
    let max_frames = config.sample_rate as usize * max_seconds as usize;
    let frames = render_frames(module, config, options, max_frames)?;
    write_wav(w, &frames, config.sample_rate)?;
    Ok(frames.len())
}

fn write_riff_header(w: &mut impl Write, data_size: u32) -> std::io::Result<()> {
    w.write_all(b"RIFF")?;
    w.write_all(&(36 + data_size).to_le_bytes())?;
    w.write_all(b"WAVE")
}

fn write_fmt_chunk(
    w: &mut impl Write,
    num_channels: u16,
    sample_rate: u32,
    block_align: u16,
    bits_per_sample: u16,
) -> std::io::Result<()> {
    w.write_all(b"fmt ")?;
    w.write_all(&16u32.to_le_bytes())?;
    w.write_all(&1u16.to_le_bytes())?;
    w.write_all(&num_channels.to_le_bytes())?;
    w.write_all(&sample_rate.to_le_bytes())?;
    w.write_all(&(sample_rate * block_align as u32).to_le_bytes())?;
    w.write_all(&block_align.to_le_bytes())?;
    w.write_all(&bits_per_sample.to_le_bytes())
}

fn write_data_chunk(w: &mut impl Write, frames: &[Frame], data_size: u32) -> std::io::Result<()> {
    w.write_all(b"data")?;
    w.write_all(&data_size.to_le_bytes())?;
    for frame in frames {
        w.write_all(&frame.left.to_le_bytes())?;
        w.write_all(&frame.right.to_le_bytes())?;
    }
    Ok(())
}
