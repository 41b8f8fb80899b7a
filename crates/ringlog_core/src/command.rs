//! Control commands carried inside the record stream.

use crate::error::{CoreError, CoreResult};
use crate::record::Record;
use std::fmt;
use std::str::FromStr;

/// Reserved prefix that turns a line into a seek command.
///
/// A command line looks like `AESDCHAR_IOCSEEKTO:<record_index>,<intra_offset>\n`.
pub const SEEKTO_PREFIX: &[u8] = b"AESDCHAR_IOCSEEKTO:";

/// A `(record_index, intra_offset)` address into the retained window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SeekTo {
    /// Logical record index, 0 = oldest retained record.
    pub record_index: usize,
    /// Byte offset inside that record.
    pub intra_offset: usize,
}

impl SeekTo {
    /// Creates an address.
    #[must_use]
    pub const fn new(record_index: usize, intra_offset: usize) -> Self {
        Self {
            record_index,
            intra_offset,
        }
    }

    /// Parses the payload that follows [`SEEKTO_PREFIX`].
    ///
    /// A trailing `\n` or `\r\n` and whitespace around each number are
    /// ignored.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Protocol`] if the payload is not two unsigned
    /// decimal integers separated by a comma.
    pub fn parse_payload(payload: &[u8]) -> CoreResult<Self> {
        let text = std::str::from_utf8(payload)
            .map_err(|_| CoreError::protocol("seek payload is not valid UTF-8"))?;
        let text = text.trim_end_matches(['\n', '\r']);

        let (index, offset) = text
            .split_once(',')
            .ok_or_else(|| CoreError::protocol(format!("expected <index>,<offset>, got {text:?}")))?;

        Ok(Self {
            record_index: parse_number(index, "record index")?,
            intra_offset: parse_number(offset, "intra-record offset")?,
        })
    }

    /// Renders the command line a client sends, terminator included.
    pub fn to_line(&self) -> Vec<u8> {
        let mut line = SEEKTO_PREFIX.to_vec();
        line.extend_from_slice(format!("{},{}\n", self.record_index, self.intra_offset).as_bytes());
        line
    }
}

fn parse_number(field: &str, what: &str) -> CoreResult<usize> {
    let field = field.trim();
    if field.is_empty() || !field.bytes().all(|b| b.is_ascii_digit()) {
        return Err(CoreError::protocol(format!(
            "{what} must be an unsigned decimal integer, got {field:?}"
        )));
    }
    field
        .parse()
        .map_err(|_| CoreError::protocol(format!("{what} {field:?} is out of range")))
}

impl fmt::Display for SeekTo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.record_index, self.intra_offset)
    }
}

impl FromStr for SeekTo {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_payload(s.as_bytes())
    }
}

/// What a completed inbound record asks for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Inbound {
    /// Store the record, then answer with the whole log.
    Append(Record),
    /// Do not store anything; answer with the log tail from this address.
    Seek(SeekTo),
}

impl Inbound {
    /// Classifies a completed record.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Protocol`] if the record carries the command
    /// prefix but a malformed payload.
    pub fn classify(record: Record) -> CoreResult<Self> {
        match record.as_bytes().strip_prefix(SEEKTO_PREFIX) {
            Some(payload) => SeekTo::parse_payload(payload).map(Inbound::Seek),
            None => Ok(Inbound::Append(record)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_record_is_append() {
        let inbound = Inbound::classify(Record::from("hello\n")).unwrap();
        assert_eq!(inbound, Inbound::Append(Record::from("hello\n")));
    }

    #[test]
    fn prefixed_record_is_seek() {
        let inbound = Inbound::classify(Record::from("AESDCHAR_IOCSEEKTO:2,15\n")).unwrap();
        assert_eq!(inbound, Inbound::Seek(SeekTo::new(2, 15)));
    }

    #[test]
    fn tolerates_crlf_and_spaces() {
        let seek = SeekTo::parse_payload(b" 1 , 3\r\n").unwrap();
        assert_eq!(seek, SeekTo::new(1, 3));
    }

    #[test]
    fn malformed_payloads_rejected() {
        for payload in [&b"1\n"[..], b"a,1\n", b"1,\n", b"-1,2\n", b"1,2,3\n", b"\xff,1\n"] {
            let result = SeekTo::parse_payload(payload);
            assert!(
                matches!(result, Err(CoreError::Protocol { .. })),
                "payload {payload:?} should be rejected"
            );
        }
    }

    #[test]
    fn overflowing_number_rejected() {
        let result = SeekTo::parse_payload(b"99999999999999999999999999,0\n");
        assert!(matches!(result, Err(CoreError::Protocol { .. })));
    }

    #[test]
    fn to_line_round_trips() {
        let seek = SeekTo::new(7, 42);
        let inbound = Inbound::classify(Record::from(seek.to_line())).unwrap();
        assert_eq!(inbound, Inbound::Seek(seek));
        assert_eq!(seek.to_string(), "7,42");
        assert_eq!("7,42".parse::<SeekTo>().unwrap(), seek);
    }
}
