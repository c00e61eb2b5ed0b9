//! Track encoder
//!
//! Always writes the newest format version with the versioned flag set.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::{BufMut, BytesMut};

use crate::codec::{
    parse_seekable_sentinel, seekable_sentinel, MAX_UTF_LENGTH, TRACK_INFO_SIZE_MASK,
    TRACK_INFO_VERSION, TRACK_INFO_VERSIONED,
};
use crate::error::EncodeError;
use crate::protocol::TrackInfo;

/// Track encoder reusing its body buffer between calls
pub struct TrackEncoder {
    /// Body buffer (reused to avoid allocations)
    body: BytesMut,
}

impl Default for TrackEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackEncoder {
    pub fn new() -> Self {
        Self {
            body: BytesMut::with_capacity(256),
        }
    }

    /// Encode a track and its details into the raw message bytes
    pub fn encode_bytes(
        &mut self,
        info: &TrackInfo,
        details: &[Option<String>],
    ) -> Result<Vec<u8>, EncodeError> {
        self.body.clear();

        self.body.put_u8(TRACK_INFO_VERSION);
        self.write_utf("title", &info.title)?;
        self.write_utf("author", &info.author)?;
        self.body.put_i64(info.length_ms);
        self.write_utf("identifier", &info.identifier)?;
        self.body.put_u8(info.is_stream as u8);
        self.write_nullable_utf("uri", info.uri.as_deref())?;
        self.write_nullable_utf("artworkUrl", info.artwork_url.as_deref())?;
        self.write_nullable_utf("isrc", info.isrc.as_deref())?;
        self.write_utf("sourceName", &info.source_name)?;

        for entry in details {
            self.write_nullable_utf("details", entry.as_deref())?;
        }
        if needs_seekable_sentinel(info, details) {
            self.write_nullable_utf("details", Some(seekable_sentinel(info.is_seekable)))?;
        }

        self.body.put_i64(info.position_ms);

        let body_len = self.body.len();
        if body_len > TRACK_INFO_SIZE_MASK as usize {
            return Err(EncodeError::BodyTooLarge(body_len));
        }

        let mut message = Vec::with_capacity(4 + body_len);
        message.put_u32(TRACK_INFO_VERSIONED | body_len as u32);
        message.put_slice(&self.body);
        Ok(message)
    }

    /// Encode a track and its details into a base64 string
    pub fn encode(
        &mut self,
        info: &TrackInfo,
        details: &[Option<String>],
    ) -> Result<String, EncodeError> {
        let message = self.encode_bytes(info, details)?;
        Ok(STANDARD.encode(message))
    }

    fn write_utf(&mut self, field: &'static str, value: &str) -> Result<(), EncodeError> {
        let len = value.len();
        if len > MAX_UTF_LENGTH {
            return Err(EncodeError::FieldTooLong { field, len });
        }
        self.body.put_u16(len as u16);
        self.body.put_slice(value.as_bytes());
        Ok(())
    }

    fn write_nullable_utf(
        &mut self,
        field: &'static str,
        value: Option<&str>,
    ) -> Result<(), EncodeError> {
        match value {
            Some(value) => {
                self.body.put_u8(1);
                self.write_utf(field, value)
            }
            None => {
                self.body.put_u8(0);
                Ok(())
            }
        }
    }
}

/// Whether the seekability must be spelled out in the details region
///
/// Needed when it differs from `!isStream`, or when the caller's own last
/// non-null detail would otherwise be read back as an override.
fn needs_seekable_sentinel(info: &TrackInfo, details: &[Option<String>]) -> bool {
    if info.is_seekable != info.default_seekable() {
        return true;
    }
    details
        .iter()
        .rev()
        .find_map(|entry| entry.as_deref())
        .and_then(parse_seekable_sentinel)
        .is_some()
}

/// Encode a track with a fresh encoder
pub fn encode_track(info: &TrackInfo, details: &[Option<String>]) -> Result<String, EncodeError> {
    TrackEncoder::new().encode(info, details)
}
