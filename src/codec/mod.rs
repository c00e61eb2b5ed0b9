//! Binary track codec
//!
//! Tracks travel between nodes and clients as base64 strings of a versioned
//! big-endian message. The layout is:
//!
//! ```text
//! u32     header     bit 30 = versioned flag, low 30 bits = body size
//! u8      version    only present when the versioned flag is set
//! utf     title
//! utf     author
//! i64     length
//! utf     identifier
//! bool    isStream
//! ?utf    uri        version >= 2
//! ?utf    artworkUrl version >= 3
//! ?utf    isrc       version >= 3
//! utf     sourceName
//! ?utf*   details    everything up to body end - 8
//! i64     position   always the last 8 bytes of the body
//! ```
//!
//! `utf` is a u16 length followed by UTF-8 bytes, `?utf` is a presence byte
//! followed by a `utf` when present.

pub mod decoder;
pub mod encoder;

pub use decoder::{decode_track, TrackDecoder};
pub use encoder::{encode_track, TrackEncoder};

/// Header flag marking a message that carries an explicit version byte
pub const TRACK_INFO_VERSIONED: u32 = 1 << 30;

/// Header bits holding the body size
pub const TRACK_INFO_SIZE_MASK: u32 = TRACK_INFO_VERSIONED - 1;

/// Version written by the encoder
pub const TRACK_INFO_VERSION: u8 = 3;

/// Size of the header in bytes
pub const HEADER_SIZE: usize = 4;

/// Size of the trailing position field in bytes
pub const POSITION_SIZE: usize = 8;

/// Longest string a u16 length prefix can describe
pub const MAX_UTF_LENGTH: usize = u16::MAX as usize;

/// Detail entry overriding seekability to `true`
pub const SEEKABLE_SENTINEL_TRUE: &str = "__seekable:1";

/// Detail entry overriding seekability to `false`
pub const SEEKABLE_SENTINEL_FALSE: &str = "__seekable:0";

/// Map a sentinel detail back to the seekability it encodes
pub(crate) fn parse_seekable_sentinel(entry: &str) -> Option<bool> {
    match entry {
        SEEKABLE_SENTINEL_TRUE => Some(true),
        SEEKABLE_SENTINEL_FALSE => Some(false),
        _ => None,
    }
}

pub(crate) fn seekable_sentinel(seekable: bool) -> &'static str {
    if seekable {
        SEEKABLE_SENTINEL_TRUE
    } else {
        SEEKABLE_SENTINEL_FALSE
    }
}
