//! FastTracker II XM format parser.

use binrw::BinRead;
use std::io::Cursor;
use tp_ir::{
    AutoVibrato, Cell, Envelope, FrequencyMode, Instrument, LoopType, Module, Note, Pattern,
    Sample, SampleData, VolumeCommand, MAX_CHANNELS,
};

use crate::effect_parser::parse_xm_effect;
use crate::reader::ByteReader;
use crate::{parse_string, Corruption, FormatError};

const MAGIC: &[u8; 17] = b"Extended Module: ";
/// Offset of the header-size field; the header size counts from here.
const HEADER_SIZE_OFFSET: usize = 60;
const KEY_OFF: u8 = 97;
const MAX_ENVELOPE_POINTS: usize = 12;

/// Fixed module header.
#[derive(BinRead, Debug)]
#[br(little, magic = b"Extended Module: ")]
struct XmHeader {
    name: [u8; 20],
    _marker: u8,
    tracker: [u8; 20],
    version: u16,
    header_size: u32,
    song_length: u16,
    restart_position: u16,
    channels: u16,
    patterns: u16,
    instruments: u16,
    flags: u16,
    default_speed: u16,
    default_bpm: u16,
    orders: [u8; 256],
}

/// Per-sample header (40 bytes).
#[derive(BinRead, Debug)]
#[br(little)]
struct XmSampleHeader {
    /// Length in bytes
    length: u32,
    loop_start: u32,
    loop_length: u32,
    volume: u8,
    finetune: i8,
    /// Bits 0-1: loop type, bit 4: 16-bit data
    kind: u8,
    panning: u8,
    relative_note: i8,
    _reserved: u8,
    name: [u8; 22],
}

impl XmSampleHeader {
    fn is_16bit(&self) -> bool {
        self.kind & 0x10 != 0
    }
}

/// Returns true if the data starts with the XM magic.
pub(crate) fn detect(data: &[u8]) -> bool {
    data.starts_with(MAGIC)
}

/// Load an XM file from bytes.
pub fn load_xm(data: &[u8]) -> Result<Module, FormatError> {
    if !detect(data) {
        return Err(FormatError::Unsupported);
    }
    let header = XmHeader::read(&mut Cursor::new(data))
        .map_err(|_| Corruption::UnexpectedEof("module header"))?;
    if header.version < 0x0104 {
        log::warn!("XM version {:#06x} predates the 1.04 layout", header.version);
        return Err(FormatError::Unsupported);
    }
    if header.channels == 0 || header.channels as usize > MAX_CHANNELS {
        return Err(Corruption::ChannelCount(header.channels).into());
    }
    if header.song_length == 0 {
        return Err(Corruption::EmptyOrderList.into());
    }
    if header.song_length > 256 {
        return Err(Corruption::Header("song length").into());
    }
    if header.instruments > 128 {
        return Err(Corruption::Header("instrument count").into());
    }

    let num_channels = header.channels as u8;
    let mut module = Module::new(&parse_string(&header.name));
    module.set_format("XM");
    let tracker = parse_string(&header.tracker);
    module.module_type = format!(
        "FastTracker II XM {}.{:02} ({})",
        header.version >> 8,
        header.version & 0xFF,
        tracker
    );
    module.channels = vec![Default::default(); num_channels as usize];
    module.frequency_mode = if header.flags & 1 != 0 {
        FrequencyMode::Linear
    } else {
        FrequencyMode::Amiga
    };
    module.initial_speed = match header.default_speed {
        1..=31 => header.default_speed as u8,
        _ => 6,
    };
    module.initial_tempo = match header.default_bpm {
        32..=255 => header.default_bpm as u8,
        _ => 125,
    };
    module.order = header.orders[..header.song_length as usize].to_vec();
    if (header.restart_position as usize) < module.order.len() {
        module.restart_position = header.restart_position as usize;
    }

    let mut r = ByteReader::new(data);
    r.seek(HEADER_SIZE_OFFSET + header.header_size as usize);

    for _ in 0..header.patterns {
        module.patterns.push(read_pattern(&mut r, num_channels)?);
    }

    for index in 0..header.instruments as usize {
        module.instruments.push(read_instrument(&mut r, index)?);
    }

    Ok(module)
}

fn read_pattern(r: &mut ByteReader<'_>, num_channels: u8) -> Result<Pattern, FormatError> {
    let start = r.pos();
    let header_length = r.read_u32_le("pattern header")? as usize;
    let _packing = r.read_u8("pattern header")?;
    let rows = r.read_u16_le("pattern header")?;
    let packed_size = r.read_u16_le("pattern header")? as usize;
    r.seek(start + header_length.max(9));

    if rows > 256 {
        return Err(Corruption::Header("pattern rows").into());
    }
    let rows = if rows == 0 { 64 } else { rows };
    let mut pattern = Pattern::new(rows, num_channels);
    if packed_size == 0 {
        return Ok(pattern);
    }

    let packed = r.read_bytes(packed_size, "pattern data")?;
    let mut bytes = packed.iter().copied();
    for row in 0..rows {
        for ch in 0..num_channels {
            *pattern.cell_mut(row, ch) = unpack_cell(&mut bytes)?;
        }
    }
    Ok(pattern)
}

/// Decode one packed cell. The high bit of the first byte marks a
/// compressed cell whose low bits say which fields follow.
fn unpack_cell(bytes: &mut impl Iterator<Item = u8>) -> Result<Cell, FormatError> {
    let mut next = || bytes.next().ok_or(Corruption::UnexpectedEof("pattern data"));
    let first = next()?;
    let (note, instrument, volume, cmd, param) = if first & 0x80 != 0 {
        let mut field = |bit: u8| -> Result<u8, Corruption> {
            if first & bit != 0 { next() } else { Ok(0) }
        };
        (field(0x01)?, field(0x02)?, field(0x04)?, field(0x08)?, field(0x10)?)
    } else {
        (first, next()?, next()?, next()?, next()?)
    };

    Ok(Cell {
        note: match note {
            1..=96 => Note::On(note - 1),
            KEY_OFF => Note::Off,
            _ => Note::None,
        },
        instrument,
        volume: parse_volume_column(volume),
        effect: parse_xm_effect(cmd, param),
    })
}

/// Parse a volume-column byte.
fn parse_volume_column(v: u8) -> VolumeCommand {
    let x = v & 0x0F;
    match v {
        0x10..=0x50 => VolumeCommand::Volume(v - 0x10),
        0x60..=0x6F => VolumeCommand::VolumeSlideDown(x),
        0x70..=0x7F => VolumeCommand::VolumeSlideUp(x),
        0x80..=0x8F => VolumeCommand::FineVolSlideDown(x),
        0x90..=0x9F => VolumeCommand::FineVolSlideUp(x),
        0xA0..=0xAF => VolumeCommand::VibratoSpeed(x),
        0xB0..=0xBF => VolumeCommand::Vibrato(x),
        0xC0..=0xCF => VolumeCommand::Panning(x << 4),
        0xD0..=0xDF => VolumeCommand::PanSlideLeft(x),
        0xE0..=0xEF => VolumeCommand::PanSlideRight(x),
        0xF0..=0xFF => VolumeCommand::TonePorta(x << 4),
        _ => VolumeCommand::None,
    }
}

fn read_instrument(r: &mut ByteReader<'_>, index: usize) -> Result<Instrument, FormatError> {
    let start = r.pos();
    let header_size = r.read_u32_le("instrument header")? as usize;
    let name = parse_string(r.read_bytes(22, "instrument header")?);
    let _kind = r.read_u8("instrument header")?;
    let num_samples = r.read_u16_le("instrument header")? as usize;

    let mut inst = Instrument::new(&name);
    if num_samples == 0 {
        r.seek(start + header_size.max(29));
        return Ok(inst);
    }
    if num_samples > 16 {
        return Err(Corruption::Header("samples per instrument").into());
    }

    let _sample_header_size = r.read_u32_le("instrument header")?;
    let keymap = r.read_bytes(96, "instrument header")?;
    let volume_points = r.read_bytes(48, "instrument header")?;
    let panning_points = r.read_bytes(48, "instrument header")?;
    let ext = r.read_bytes(14, "instrument header")?;
    let fadeout = r.read_u16_le("instrument header")?;
    r.seek(start + header_size.max(r.pos() - start));

    inst.sample_map[..96].copy_from_slice(keymap);
    // [vol pts, pan pts, vol sus, vol loop start, vol loop end,
    //  pan sus, pan loop start, pan loop end, vol type, pan type,
    //  vib type, vib sweep, vib depth, vib rate]
    inst.volume_envelope = parse_envelope(volume_points, ext[0], ext[2], ext[3], ext[4], ext[8]);
    inst.panning_envelope = parse_envelope(panning_points, ext[1], ext[5], ext[6], ext[7], ext[9]);
    inst.vibrato = AutoVibrato { waveform: ext[10], sweep: ext[11], depth: ext[12], rate: ext[13] };
    inst.fadeout = fadeout;

    let mut headers = Vec::with_capacity(num_samples);
    for _ in 0..num_samples {
        let bytes = r.read_bytes(40, "sample header")?;
        let header = XmSampleHeader::read(&mut Cursor::new(bytes))
            .map_err(|_| Corruption::UnexpectedEof("sample header"))?;
        headers.push(header);
    }

    for (sample_index, header) in headers.iter().enumerate() {
        let bytes = r
            .read_bytes(header.length as usize, "sample data")
            .map_err(|_| Corruption::ShortSample { instrument: index, sample: sample_index })?;
        inst.samples.push(build_sample(header, bytes));
    }

    Ok(inst)
}

fn parse_envelope(
    points: &[u8],
    count: u8,
    sustain: u8,
    loop_start: u8,
    loop_end: u8,
    flags: u8,
) -> Option<Envelope> {
    let count = (count as usize).min(MAX_ENVELOPE_POINTS);
    if flags & 1 == 0 || count == 0 {
        return None;
    }
    let mut env = Envelope::new();
    for p in points.chunks_exact(4).take(count) {
        let tick = u16::from_le_bytes([p[0], p[1]]);
        let value = u16::from_le_bytes([p[2], p[3]]).min(64) as i8;
        env.add_point(tick, value);
    }
    let valid = |i: u8| ((i as usize) < count).then_some(i);
    env.enabled = true;
    if flags & 2 != 0 {
        env.sustain = valid(sustain);
    }
    if flags & 4 != 0 && loop_start <= loop_end {
        env.loop_start = valid(loop_start);
        env.loop_end = valid(loop_end);
    }
    Some(env)
}

fn build_sample(header: &XmSampleHeader, bytes: &[u8]) -> Sample {
    let mut sample = Sample::new(&parse_string(&header.name));
    sample.default_volume = header.volume.min(64);
    sample.default_pan = Some(header.panning);
    sample.finetune = header.finetune;
    sample.relative_note = header.relative_note;

    let (data, frame_bytes) = if header.is_16bit() {
        (SampleData::Mono16(decode_delta16(bytes)), 2)
    } else {
        (SampleData::Mono8(decode_delta8(bytes)), 1)
    };
    sample.data = data;

    let len = sample.len() as u32;
    let loop_start = (header.loop_start / frame_bytes).min(len);
    let loop_end = ((header.loop_start + header.loop_length) / frame_bytes).min(len);
    sample.loop_type = match header.kind & 0x03 {
        _ if loop_end <= loop_start => LoopType::None,
        1 => LoopType::Forward,
        2 | 3 => LoopType::PingPong,
        _ => LoopType::None,
    };
    if sample.loop_type != LoopType::None {
        sample.loop_start = loop_start;
        sample.loop_end = loop_end;
    }
    sample
}

fn decode_delta8(bytes: &[u8]) -> Vec<i8> {
    let mut acc = 0i8;
    bytes
        .iter()
        .map(|&b| {
            acc = acc.wrapping_add(b as i8);
            acc
        })
        .collect()
}

fn decode_delta16(bytes: &[u8]) -> Vec<i16> {
    let mut acc = 0i16;
    bytes
        .chunks_exact(2)
        .map(|b| {
            acc = acc.wrapping_add(i16::from_le_bytes([b[0], b[1]]));
            acc
        })
        .collect()
}
