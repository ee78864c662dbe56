//! Record framing for the telemetry stream.
//!
//! [`RecordCodec`] splits the byte stream into newline-terminated records.
//! Unlike a plain line codec, an oversized line is not a stream error: it is
//! skipped up to its terminating newline and reported as
//! [`Record::Oversized`], and the stream continues with the next record.

use bytes::{Buf, BytesMut};
use tokio_util::codec::Decoder;

use crate::options::DEFAULT_MAX_LINE_LENGTH;

/// One framed unit of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    /// A complete line, without its terminator.
    Line(String),
    /// A line longer than the cap that was dropped.
    Oversized {
        /// Bytes seen before the terminator (or end of stream).
        len: usize,
    },
}

/// Newline framing with a bounded buffer.
///
/// `\n` terminates a record and a preceding `\r` is stripped. Invalid UTF-8
/// is replaced rather than rejected. A trailing unterminated line is emitted
/// at end of stream.
#[derive(Debug, Clone)]
pub struct RecordCodec {
    max_length: usize,
    /// Where to resume scanning for `\n`.
    next_index: usize,
    /// Bytes dropped so far from an oversized line.
    discarding: Option<usize>,
}

impl Default for RecordCodec {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_LINE_LENGTH)
    }
}

impl RecordCodec {
    /// Create a codec that drops lines longer than `max_length` bytes.
    pub fn new(max_length: usize) -> Self {
        Self {
            max_length,
            next_index: 0,
            discarding: None,
        }
    }

    /// The configured line cap.
    pub fn max_length(&self) -> usize {
        self.max_length
    }

    fn line(&self, bytes: &[u8]) -> Record {
        let bytes = bytes.strip_suffix(b"\r").unwrap_or(bytes);
        if bytes.len() > self.max_length {
            return Record::Oversized { len: bytes.len() };
        }
        Record::Line(String::from_utf8_lossy(bytes).into_owned())
    }
}

impl Decoder for RecordCodec {
    type Item = Record;
    type Error = std::io::Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Record>, Self::Error> {
        let newline = buf[self.next_index..]
            .iter()
            .position(|b| *b == b'\n')
            .map(|offset| self.next_index + offset);

        match (self.discarding, newline) {
            (Some(dropped), Some(index)) => {
                buf.advance(index + 1);
                self.next_index = 0;
                self.discarding = None;
                Ok(Some(Record::Oversized {
                    len: dropped + index,
                }))
            }
            (Some(dropped), None) => {
                let len = buf.len();
                buf.advance(len);
                self.next_index = 0;
                self.discarding = Some(dropped + len);
                Ok(None)
            }
            (None, Some(index)) => {
                let line = buf.split_to(index + 1);
                self.next_index = 0;
                Ok(Some(self.line(&line[..index])))
            }
            (None, None) if buf.len() > self.max_length => {
                self.discarding = Some(buf.len());
                buf.clear();
                self.next_index = 0;
                Ok(None)
            }
            (None, None) => {
                self.next_index = buf.len();
                Ok(None)
            }
        }
    }

    fn decode_eof(&mut self, buf: &mut BytesMut) -> Result<Option<Record>, Self::Error> {
        if let Some(record) = self.decode(buf)? {
            return Ok(Some(record));
        }
        self.next_index = 0;
        if let Some(dropped) = self.discarding.take() {
            buf.clear();
            return Ok(Some(Record::Oversized { len: dropped }));
        }
        if buf.is_empty() {
            return Ok(None);
        }
        let rest = buf.split();
        Ok(Some(self.line(&rest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(codec: &mut RecordCodec, input: &[u8]) -> Vec<Record> {
        let mut buf = BytesMut::from(input);
        let mut out = Vec::new();
        while let Some(record) = codec.decode(&mut buf).unwrap() {
            out.push(record);
        }
        while let Some(record) = codec.decode_eof(&mut buf).unwrap() {
            out.push(record);
        }
        out
    }

    #[test]
    fn test_splits_lines() {
        let mut codec = RecordCodec::default();
        let records = decode_all(&mut codec, b"T:1,V:2,B:3\r\nT:4,V:5,B:6\n\nlast");
        assert_eq!(
            records,
            vec![
                Record::Line("T:1,V:2,B:3".into()),
                Record::Line("T:4,V:5,B:6".into()),
                Record::Line(String::new()),
                Record::Line("last".into()),
            ]
        );
    }

    #[test]
    fn test_partial_line_waits_for_terminator() {
        let mut codec = RecordCodec::default();
        let mut buf = BytesMut::from(&b"T:1,V:"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        buf.extend_from_slice(b"2,B:3\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Record::Line("T:1,V:2,B:3".into()))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn test_oversized_line_is_skipped() {
        let mut codec = RecordCodec::new(8);
        let mut buf = BytesMut::from(&b"0123456789ab"[..]);
        assert_eq!(codec.decode(&mut buf).unwrap(), None);
        assert!(buf.is_empty());

        buf.extend_from_slice(b"cdef\nok\n");
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Record::Oversized { len: 16 })
        );
        assert_eq!(
            codec.decode(&mut buf).unwrap(),
            Some(Record::Line("ok".into()))
        );
    }

    #[test]
    fn test_oversized_complete_line() {
        let mut codec = RecordCodec::new(4);
        let records = decode_all(&mut codec, b"abcdef\nabc\n");
        assert_eq!(
            records,
            vec![Record::Oversized { len: 6 }, Record::Line("abc".into())]
        );
    }

    #[test]
    fn test_oversized_at_eof() {
        let mut codec = RecordCodec::new(4);
        let records = decode_all(&mut codec, b"abcdefgh");
        assert_eq!(records, vec![Record::Oversized { len: 8 }]);
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut codec = RecordCodec::default();
        let records = decode_all(&mut codec, b"T:1,\xFF,B:3\n");
        assert_eq!(records, vec![Record::Line("T:1,\u{FFFD},B:3".into())]);
    }
}
