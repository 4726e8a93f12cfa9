//! Module parsers for trackplay.
//!
//! Parses ProTracker-family MOD and FastTracker II XM files into a
//! [`tp_ir::Module`]. Parsing is pure: a loader either hands back a
//! complete module or an error, never a partial one.

mod effect_parser;
mod mod_format;
mod reader;
mod xm_format;

use tp_ir::Module;

pub use mod_format::load_mod;
pub use xm_format::load_xm;

/// Error type for format parsing.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// No loader recognises the signature
    #[error("unsupported module format")]
    Unsupported,
    /// The signature was recognised but the contents are invalid
    #[error("corrupt module: {0}")]
    Corrupt(#[from] Corruption),
}

/// What made a recognised module invalid.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum Corruption {
    #[error("unexpected end of data in {0}")]
    UnexpectedEof(&'static str),
    #[error("order {order} references missing pattern {pattern}")]
    MissingPattern { order: usize, pattern: u8 },
    #[error("instrument {instrument} sample {sample} is shorter than declared")]
    ShortSample { instrument: usize, sample: usize },
    #[error("empty order list")]
    EmptyOrderList,
    #[error("invalid channel count {0}")]
    ChannelCount(u16),
    #[error("invalid header field: {0}")]
    Header(&'static str),
}

/// One entry of the loader table.
struct Loader {
    name: &'static str,
    detect: fn(&[u8]) -> bool,
    load: fn(&[u8]) -> Result<Module, FormatError>,
}

static LOADERS: &[Loader] = &[
    Loader { name: "FastTracker II", detect: xm_format::detect, load: load_xm },
    Loader { name: "ProTracker", detect: mod_format::detect, load: load_mod },
];

/// Signatures and identifiers of every format the loaders recognise.
pub const SUPPORTED_FORMATS: &[&str] = &[
    "M.K.", "M!K!", "M&K!", "N.T.", "FLT4", "OCTA", "CD81", "xCHN", "xxCH", "XM",
];

/// Static list of recognised format identifiers.
pub fn supported_formats() -> &'static [&'static str] {
    SUPPORTED_FORMATS
}

/// Check the data against every loader and parse it with the first match.
pub fn load(data: &[u8]) -> Result<Module, FormatError> {
    let loader = LOADERS
        .iter()
        .find(|l| (l.detect)(data))
        .ok_or(FormatError::Unsupported)?;
    log::debug!("detected {} module ({} bytes)", loader.name, data.len());
    let module = (loader.load)(data)?;
    if let Some((order, pattern)) = module.missing_pattern() {
        return Err(Corruption::MissingPattern { order, pattern }.into());
    }
    Ok(module)
}

/// Parse a fixed-width, NUL-padded name field.
pub(crate) fn parse_string(data: &[u8]) -> String {
    let end = data.iter().position(|&b| b == 0).unwrap_or(data.len());
    String::from_utf8_lossy(&data[..end]).trim().to_string()
}
