//! Track decoder
//!
//! Every read is bounded by the body size declared in the header. The only
//! region that tolerates damage is the details region, which stops at the
//! first entry that does not fit.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Buf;
use serde_json::Map;

use crate::codec::{
    parse_seekable_sentinel, HEADER_SIZE, POSITION_SIZE, TRACK_INFO_SIZE_MASK,
    TRACK_INFO_VERSIONED,
};
use crate::error::DecodeError;
use crate::protocol::{TrackInfo, TrackRecord};

/// Bounded big-endian reader over a byte slice
struct Reader<'a> {
    buf: &'a [u8],
    len: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            len: buf.len(),
        }
    }

    /// Bytes consumed so far
    fn offset(&self) -> usize {
        self.len - self.buf.remaining()
    }

    fn remaining(&self) -> usize {
        self.buf.remaining()
    }

    fn ensure(&self, needed: usize) -> Result<(), DecodeError> {
        if self.buf.remaining() < needed {
            return Err(DecodeError::UnexpectedEof {
                needed,
                remaining: self.buf.remaining(),
            });
        }
        Ok(())
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        self.ensure(1)?;
        Ok(self.buf.get_u8())
    }

    fn read_bool(&mut self) -> Result<bool, DecodeError> {
        Ok(self.read_u8()? != 0)
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        self.ensure(4)?;
        Ok(self.buf.get_u32())
    }

    fn read_i64(&mut self) -> Result<i64, DecodeError> {
        self.ensure(8)?;
        Ok(self.buf.get_i64())
    }

    fn read_utf(&mut self, field: &'static str) -> Result<String, DecodeError> {
        self.ensure(2)?;
        let len = self.buf.get_u16() as usize;
        self.ensure(len)?;
        let (text, rest) = self.buf.split_at(len);
        let text = std::str::from_utf8(text).map_err(|_| DecodeError::InvalidUtf8(field))?;
        self.buf = rest;
        Ok(text.to_string())
    }

    fn read_nullable_utf(&mut self, field: &'static str) -> Result<Option<String>, DecodeError> {
        if self.read_bool()? {
            self.read_utf(field).map(Some)
        } else {
            Ok(None)
        }
    }
}

/// Decoder for a single encoded track message
pub struct TrackDecoder<'a> {
    bytes: &'a [u8],
}

impl<'a> TrackDecoder<'a> {
    pub fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    /// Decode the message into its info and details
    pub fn decode(&self) -> Result<(TrackInfo, Vec<Option<String>>), DecodeError> {
        if self.bytes.is_empty() {
            return Err(DecodeError::Empty);
        }

        let header = Reader::new(self.bytes).read_u32()?;
        let versioned = header & TRACK_INFO_VERSIONED != 0;
        let body_size = (header & TRACK_INFO_SIZE_MASK) as usize;
        let message_end = HEADER_SIZE + body_size;
        if message_end > self.bytes.len() {
            return Err(DecodeError::BodySize {
                declared: body_size,
                available: self.bytes.len() - HEADER_SIZE,
            });
        }

        let message = &self.bytes[..message_end];
        let mut reader = Reader::new(message);
        reader.read_u32()?;

        let version = if versioned { reader.read_u8()? } else { 1 };

        let title = reader.read_utf("title")?;
        let author = reader.read_utf("author")?;
        let length_ms = reader.read_i64()?;
        let identifier = reader.read_utf("identifier")?;
        let is_stream = reader.read_bool()?;
        let uri = if version >= 2 {
            reader.read_nullable_utf("uri")?
        } else {
            None
        };
        let (artwork_url, isrc) = if version >= 3 {
            (
                reader.read_nullable_utf("artworkUrl")?,
                reader.read_nullable_utf("isrc")?,
            )
        } else {
            (None, None)
        };
        let source_name = reader.read_utf("sourceName")?;

        // Position lives at a fixed offset from the end, independent of how
        // much of the details region actually parsed.
        let details_start = reader.offset();
        let position_offset = message_end
            .checked_sub(POSITION_SIZE)
            .filter(|offset| *offset >= details_start)
            .ok_or(DecodeError::FieldOverrun)?;

        let (details, seekable_override) =
            parse_details(&message[details_start..position_offset]);

        let position_ms = Reader::new(&message[position_offset..]).read_i64()?;

        let info = TrackInfo {
            identifier,
            is_seekable: seekable_override.unwrap_or(!is_stream),
            author,
            length_ms,
            is_stream,
            position_ms,
            title,
            uri,
            artwork_url,
            isrc,
            source_name,
        };

        Ok((info, details))
    }
}

/// Parse the details region, keeping whatever decodes before a truncation
fn parse_details(region: &[u8]) -> (Vec<Option<String>>, Option<bool>) {
    let mut reader = Reader::new(region);
    let mut details = Vec::new();

    while reader.remaining() > 0 {
        match reader.read_nullable_utf("details") {
            Ok(entry) => details.push(entry),
            Err(e) => {
                tracing::debug!(
                    "Details region truncated after {} entries: {}",
                    details.len(),
                    e
                );
                break;
            }
        }
    }

    while matches!(details.last(), Some(None)) {
        details.pop();
    }

    let seekable_override = details
        .last()
        .and_then(|entry| entry.as_deref())
        .and_then(parse_seekable_sentinel);
    if seekable_override.is_some() {
        details.pop();
    }

    (details, seekable_override)
}

/// Decode a base64 track string into a full record
pub fn decode_track(encoded: &str) -> Result<TrackRecord, DecodeError> {
    if encoded.is_empty() {
        return Err(DecodeError::Empty);
    }

    let bytes = STANDARD.decode(encoded)?;
    let (info, details) = TrackDecoder::new(&bytes).decode()?;

    Ok(TrackRecord {
        encoded: encoded.to_string(),
        info,
        details,
        plugin_info: Map::new(),
        user_data: Map::new(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::{BufMut, BytesMut};

    const RICK_ROLL: &str = "QAAAjQIAJVJpY2sgQXN0bGV5IC0gTmV2ZXIgR29ubmEgR2l2ZSBZb3UgVXAADlJpY2tBc3RsZXlWRVZPAAAAAAADPCAAC2RRdzR3OVdnWGNRAAEAK2h0dHBzOi8vd3d3LnlvdXR1YmUuY29tL3dhdGNoP3Y9ZFF3NHc5V2dYY1EAB3lvdXR1YmUAAAAAAAAAAA==";

    fn put_utf(buf: &mut BytesMut, value: &str) {
        buf.put_u16(value.len() as u16);
        buf.put_slice(value.as_bytes());
    }

    fn put_nullable(buf: &mut BytesMut, value: Option<&str>) {
        match value {
            Some(v) => {
                buf.put_u8(1);
                put_utf(buf, v);
            }
            None => buf.put_u8(0),
        }
    }

    /// Hand-built message; `version = None` produces a legacy unversioned one
    fn build(version: Option<u8>, is_stream: bool, details: &[u8], position: i64) -> Vec<u8> {
        let mut body = BytesMut::new();
        if let Some(v) = version {
            body.put_u8(v);
        }
        put_utf(&mut body, "title");
        put_utf(&mut body, "author");
        body.put_i64(90_000);
        put_utf(&mut body, "id");
        body.put_u8(is_stream as u8);
        let effective = version.unwrap_or(1);
        if effective >= 2 {
            put_nullable(&mut body, Some("https://example.com/track"));
        }
        if effective >= 3 {
            put_nullable(&mut body, Some("https://example.com/art.png"));
            put_nullable(&mut body, None);
        }
        put_utf(&mut body, "stub");
        body.put_slice(details);
        body.put_i64(position);

        let mut header = body.len() as u32;
        if version.is_some() {
            header |= TRACK_INFO_VERSIONED;
        }
        let mut out = BytesMut::new();
        out.put_u32(header);
        out.put_slice(&body);
        out.to_vec()
    }

    fn details_bytes(entries: &[Option<&str>]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for entry in entries {
            put_nullable(&mut buf, *entry);
        }
        buf.to_vec()
    }

    fn decode_bytes(bytes: &[u8]) -> Result<(TrackInfo, Vec<Option<String>>), DecodeError> {
        TrackDecoder::new(bytes).decode()
    }

    #[test]
    fn test_decode_known_track() {
        let record = decode_track(RICK_ROLL).unwrap();
        assert_eq!(record.info.title, "Rick Astley - Never Gonna Give You Up");
        assert_eq!(record.info.author, "RickAstleyVEVO");
        assert_eq!(record.info.length_ms, 212_000);
        assert_eq!(record.info.identifier, "dQw4w9WgXcQ");
        assert!(!record.info.is_stream);
        assert!(record.info.is_seekable);
        assert_eq!(
            record.info.uri.as_deref(),
            Some("https://www.youtube.com/watch?v=dQw4w9WgXcQ")
        );
        assert_eq!(record.info.artwork_url, None);
        assert_eq!(record.info.isrc, None);
        assert_eq!(record.info.source_name, "youtube");
        assert_eq!(record.info.position_ms, 0);
        assert!(record.details.is_empty());
        assert_eq!(record.encoded, RICK_ROLL);
    }

    #[test]
    fn test_legacy_unversioned_payload() {
        let mut body = BytesMut::new();
        put_utf(&mut body, "old");
        put_utf(&mut body, "timer");
        body.put_i64(5_000);
        put_utf(&mut body, "legacy-id");
        body.put_u8(1);
        put_utf(&mut body, "local");
        body.put_i64(1_234);
        let mut bytes = BytesMut::new();
        bytes.put_u32(body.len() as u32);
        bytes.put_slice(&body);

        let (info, details) = decode_bytes(&bytes).unwrap();
        assert_eq!(info.title, "old");
        assert_eq!(info.identifier, "legacy-id");
        assert!(info.is_stream);
        assert!(!info.is_seekable);
        assert_eq!(info.uri, None);
        assert_eq!(info.artwork_url, None);
        assert_eq!(info.isrc, None);
        assert_eq!(info.source_name, "local");
        assert_eq!(info.position_ms, 1_234);
        assert!(details.is_empty());
    }

    #[test]
    fn test_versioned_v1_payload_skips_optional_fields() {
        let bytes = build(Some(1), false, &[], 77);
        let (info, _) = decode_bytes(&bytes).unwrap();
        assert_eq!(info.uri, None);
        assert_eq!(info.artwork_url, None);
        assert_eq!(info.isrc, None);
        assert!(info.is_seekable);
        assert_eq!(info.position_ms, 77);
    }

    #[test]
    fn test_v3_payload_reads_artwork_and_isrc() {
        let bytes = build(Some(3), false, &[], 0);
        let (info, _) = decode_bytes(&bytes).unwrap();
        assert_eq!(info.uri.as_deref(), Some("https://example.com/track"));
        assert_eq!(info.artwork_url.as_deref(), Some("https://example.com/art.png"));
        assert_eq!(info.isrc, None);
    }

    #[test]
    fn test_details_keep_empty_strings_and_inner_nulls() {
        let details = details_bytes(&[Some(""), None, Some("extra"), None, None]);
        let bytes = build(Some(3), false, &details, 10);
        let (info, details) = decode_bytes(&bytes).unwrap();
        assert_eq!(
            details,
            vec![Some(String::new()), None, Some("extra".to_string())]
        );
        assert_eq!(info.position_ms, 10);
    }

    #[test]
    fn test_sentinel_overrides_seekable() {
        let details = details_bytes(&[Some("keep"), Some("__seekable:0")]);
        let bytes = build(Some(3), false, &details, 0);
        let (info, details) = decode_bytes(&bytes).unwrap();
        assert!(!info.is_stream);
        assert!(!info.is_seekable);
        assert_eq!(details, vec![Some("keep".to_string())]);

        let details = details_bytes(&[Some("__seekable:1"), None]);
        let bytes = build(Some(3), true, &details, 0);
        let (info, details) = decode_bytes(&bytes).unwrap();
        assert!(info.is_stream);
        assert!(info.is_seekable);
        assert!(details.is_empty());
    }

    #[test]
    fn test_sentinel_only_counts_when_last() {
        let details = details_bytes(&[Some("__seekable:0"), Some("after")]);
        let bytes = build(Some(3), false, &details, 0);
        let (info, details) = decode_bytes(&bytes).unwrap();
        assert!(info.is_seekable);
        assert_eq!(details.len(), 2);
    }

    #[test]
    fn test_truncated_details_keep_prefix_and_position() {
        let mut region = details_bytes(&[Some("first"), Some("second")]);
        // Cut the second entry in half
        region.truncate(region.len() - 3);
        let bytes = build(Some(3), false, &region, 4_242);
        let (info, details) = decode_bytes(&bytes).unwrap();
        assert_eq!(details, vec![Some("first".to_string())]);
        assert_eq!(info.position_ms, 4_242);
    }

    #[test]
    fn test_truncation_at_every_offset_never_fails() {
        let region = details_bytes(&[Some("alpha"), None, Some("beta"), Some("__seekable:1")]);
        for cut in 0..=region.len() {
            let bytes = build(Some(3), true, &region[..cut], -9);
            let (info, _) = decode_bytes(&bytes)
                .unwrap_or_else(|e| panic!("cut at {} failed: {}", cut, e));
            assert_eq!(info.position_ms, -9);
            assert_eq!(info.title, "title");
        }
    }

    #[test]
    fn test_empty_input_fails() {
        assert!(matches!(decode_track(""), Err(DecodeError::Empty)));
        assert!(matches!(decode_bytes(&[]), Err(DecodeError::Empty)));
    }

    #[test]
    fn test_invalid_base64_fails() {
        assert!(matches!(decode_track("not base64!"), Err(DecodeError::Base64(_))));
    }

    #[test]
    fn test_declared_size_past_buffer_fails() {
        let mut bytes = build(Some(3), false, &[], 0);
        bytes.truncate(bytes.len() - 1);
        assert!(matches!(decode_bytes(&bytes), Err(DecodeError::BodySize { .. })));
    }

    #[test]
    fn test_fields_overrunning_position_fail() {
        let mut body = BytesMut::new();
        body.put_u8(3);
        put_utf(&mut body, "title");
        let mut bytes = BytesMut::new();
        bytes.put_u32(TRACK_INFO_VERSIONED | body.len() as u32);
        bytes.put_slice(&body);
        assert!(matches!(
            decode_bytes(&bytes),
            Err(DecodeError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn test_short_position_is_an_overrun() {
        let mut bytes = build(Some(3), false, &[], 0);
        // Drop half of the position and shrink the declared size to match
        bytes.truncate(bytes.len() - 4);
        let size = (bytes.len() - HEADER_SIZE) as u32;
        bytes[..4].copy_from_slice(&(TRACK_INFO_VERSIONED | size).to_be_bytes());
        assert!(matches!(decode_bytes(&bytes), Err(DecodeError::FieldOverrun)));
    }

    #[test]
    fn test_header_only_fails() {
        assert!(decode_bytes(&[0x40, 0, 0]).is_err());
        assert!(decode_bytes(&[0x40, 0, 0, 0]).is_err());
    }

    #[test]
    fn test_trailing_garbage_is_ignored() {
        let mut bytes = build(Some(3), false, &[], 5);
        bytes.extend_from_slice(&[0xde, 0xad]);
        let (info, _) = decode_bytes(&bytes).unwrap();
        assert_eq!(info.position_ms, 5);
    }
}
