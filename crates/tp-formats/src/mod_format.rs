//! ProTracker MOD format parser (31-sample variants).

use binrw::BinRead;
use std::io::Cursor;
use tp_ir::{Cell, Instrument, LoopType, Module, Note, Pattern, Sample, SampleData, VolumeCommand};

use crate::effect_parser::parse_effect;
use crate::{parse_string, Corruption, FormatError};

const SIGNATURE_OFFSET: usize = 1080;
const PATTERN_OFFSET: usize = 1084;
const NUM_SAMPLES: usize = 31;
const ROWS: u16 = 64;

/// Sample header as stored at offset 20 + 30 * n.
#[derive(BinRead, Debug)]
#[br(big)]
struct SampleHeader {
    name: [u8; 22],
    /// Length in 16-bit words
    length: u16,
    finetune: u8,
    volume: u8,
    /// Loop start in words
    loop_start: u16,
    /// Loop length in words
    loop_length: u16,
}

/// Channel count and tracker name for a signature at offset 1080.
fn identify(sig: &[u8]) -> Option<(u8, &'static str)> {
    match sig {
        b"M.K." | b"M!K!" | b"M&K!" => Some((4, "ProTracker")),
        b"N.T." => Some((4, "NoiseTracker")),
        b"FLT4" => Some((4, "StarTrekker")),
        b"OCTA" | b"CD81" => Some((8, "Octalyser")),
        [d, b'C', b'H', b'N'] if (b'1'..=b'9').contains(d) => Some((d - b'0', "FastTracker")),
        [a, b, b'C', b'H'] if a.is_ascii_digit() && b.is_ascii_digit() => {
            let channels = (a - b'0') * 10 + (b - b'0');
            (10..=32).contains(&channels).then_some((channels, "FastTracker"))
        }
        _ => None,
    }
}

/// Returns true if the data carries a recognised MOD signature.
pub(crate) fn detect(data: &[u8]) -> bool {
    data.get(SIGNATURE_OFFSET..PATTERN_OFFSET)
        .and_then(identify)
        .is_some()
}

/// Load a MOD file from bytes.
pub fn load_mod(data: &[u8]) -> Result<Module, FormatError> {
    let sig = data
        .get(SIGNATURE_OFFSET..PATTERN_OFFSET)
        .ok_or(FormatError::Unsupported)?;
    let (num_channels, tracker) = identify(sig).ok_or(FormatError::Unsupported)?;

    let title = parse_string(&data[0..20]);
    let mut module = Module::with_channels(&title, num_channels);
    let sig_str = String::from_utf8_lossy(sig);
    module.set_format(&sig_str);
    module.module_type = format!("{} {}", tracker, sig_str);

    // Sample headers (31 samples, starting at offset 20)
    let mut headers = Vec::with_capacity(NUM_SAMPLES);
    for i in 0..NUM_SAMPLES {
        let offset = 20 + i * 30;
        let header = SampleHeader::read(&mut Cursor::new(&data[offset..offset + 30]))
            .map_err(|_| Corruption::UnexpectedEof("sample header"))?;
        headers.push(header);
    }

    let song_length = data[950] as usize;
    if song_length == 0 {
        return Err(Corruption::EmptyOrderList.into());
    }
    if song_length > 128 {
        return Err(Corruption::Header("song length").into());
    }
    let restart = data[951] as usize;
    if restart < song_length {
        module.restart_position = restart;
    }

    let orders = &data[952..952 + 128];
    module.order = orders[..song_length].to_vec();

    // Every pattern up to the highest index in the full table is stored
    let num_patterns = orders.iter().max().copied().unwrap_or(0) as usize + 1;
    let pattern_size = ROWS as usize * num_channels as usize * 4;
    for pat_idx in 0..num_patterns {
        let offset = PATTERN_OFFSET + pat_idx * pattern_size;
        let bytes = data
            .get(offset..offset + pattern_size)
            .ok_or(Corruption::UnexpectedEof("pattern data"))?;
        module.patterns.push(parse_pattern(bytes, num_channels));
    }

    // Sample data follows the patterns in header order
    let mut sample_offset = PATTERN_OFFSET + num_patterns * pattern_size;
    for (i, header) in headers.iter().enumerate() {
        let mut sample = parse_sample_header(header);
        let len = header.length as usize * 2;
        let bytes = data
            .get(sample_offset..sample_offset + len)
            .ok_or(Corruption::ShortSample { instrument: i, sample: 0 })?;
        sample.data = SampleData::Mono8(bytes.iter().map(|&b| b as i8).collect());
        sanitize_loop(&mut sample);
        sample_offset += len;

        let name = sample.name;
        module.instruments.push(Instrument::with_sample(&name, sample));
    }

    Ok(module)
}

fn parse_sample_header(header: &SampleHeader) -> Sample {
    let mut sample = Sample::new(&parse_string(&header.name));
    sample.default_volume = header.volume.min(64);

    // Finetune nibble is a signed eighth of a semitone
    let nibble = (header.finetune & 0x0F) as i8;
    let finetune = if nibble > 7 { nibble - 16 } else { nibble };
    sample.finetune = finetune * 16;

    let loop_length = header.loop_length as u32 * 2;
    if loop_length > 2 {
        sample.loop_start = header.loop_start as u32 * 2;
        sample.loop_end = sample.loop_start + loop_length;
        sample.loop_type = LoopType::Forward;
    }
    sample
}

/// Clamp loop points to the real sample length.
///
/// Some trackers stored the loop start in bytes rather than words; if the
/// loop only fits with a halved start, use that.
fn sanitize_loop(sample: &mut Sample) {
    if sample.loop_type == LoopType::None {
        return;
    }
    let len = sample.len() as u32;
    let loop_length = sample.loop_end - sample.loop_start;
    if sample.loop_end > len && sample.loop_start / 2 + loop_length <= len {
        sample.loop_start /= 2;
        sample.loop_end = sample.loop_start + loop_length;
    }
    sample.loop_end = sample.loop_end.min(len);
    if sample.loop_start >= sample.loop_end || sample.loop_end - sample.loop_start < 4 {
        sample.loop_type = LoopType::None;
        sample.loop_start = 0;
        sample.loop_end = 0;
    }
}

/// Parse a pattern.
fn parse_pattern(data: &[u8], num_channels: u8) -> Pattern {
    let mut pattern = Pattern::new(ROWS, num_channels);
    for (i, bytes) in data.chunks_exact(4).enumerate() {
        let row = (i / num_channels as usize) as u16;
        let ch = (i % num_channels as usize) as u8;
        *pattern.cell_mut(row, ch) = parse_cell(bytes);
    }
    pattern
}

/// Parse a single pattern cell (4 bytes).
fn parse_cell(data: &[u8]) -> Cell {
    // Byte 0: upper 4 bits of sample number, upper 4 bits of period
    // Byte 1: lower 8 bits of period
    // Byte 2: lower 4 bits of sample number, effect command
    // Byte 3: effect parameter
    let sample_hi = data[0] & 0xF0;
    let period = (((data[0] & 0x0F) as u16) << 8) | data[1] as u16;
    let sample_lo = (data[2] & 0xF0) >> 4;

    Cell {
        note: period_to_note(period),
        instrument: sample_hi | sample_lo,
        volume: VolumeCommand::None,
        effect: parse_effect(data[2] & 0x0F, data[3]),
    }
}

/// Convert an Amiga period to a key number (period 428 = key 48).
fn period_to_note(period: u16) -> Note {
    if period == 0 {
        return Note::None;
    }

    const PERIODS: [u16; 36] = [
        856, 808, 762, 720, 678, 640, 604, 570, 538, 508, 480, 453, // Octave 1
        428, 404, 381, 360, 339, 320, 302, 285, 269, 254, 240, 226, // Octave 2
        214, 202, 190, 180, 170, 160, 151, 143, 135, 127, 120, 113, // Octave 3
    ];

    let best = PERIODS
        .iter()
        .enumerate()
        .min_by_key(|(_, &p)| (period as i32 - p as i32).unsigned_abs())
        .map_or(0, |(i, _)| i);

    Note::On((best + 36) as u8)
}
