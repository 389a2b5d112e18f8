//! Trace and span identifiers
//!
//! Identifiers are stored in the span table as lowercase hex strings. Parsing
//! accepts any width up to the full identifier size; rendering is always fixed
//! width and zero padded so that the rendered form matches what the table holds.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Errors produced while parsing hex identifiers
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IdParseError {
    #[error("identifier is empty")]
    Empty,

    #[error("identifier `{0}` is longer than {1} hex characters")]
    TooLong(String, usize),

    #[error("identifier `{0}` is not valid hex")]
    InvalidHex(String),
}

/// 128-bit trace identifier split into its high and low halves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct TraceId {
    pub high: u64,
    pub low: u64,
}

impl TraceId {
    pub fn new(high: u64, low: u64) -> Self {
        Self { high, low }
    }

    /// Big-endian wire representation (high half first)
    pub fn to_bytes(&self) -> [u8; 16] {
        let mut out = [0u8; 16];
        out[..8].copy_from_slice(&self.high.to_be_bytes());
        out[8..].copy_from_slice(&self.low.to_be_bytes());
        out
    }

    /// Parse the big-endian wire representation
    ///
    /// Shorter inputs are treated as left-padded with zeros.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, IdParseError> {
        if bytes.len() > 16 {
            return Err(IdParseError::TooLong(format!("{:?}", bytes), 16));
        }
        let mut buf = [0u8; 16];
        buf[16 - bytes.len()..].copy_from_slice(bytes);
        let (high, low) = buf.split_at(8);
        Ok(Self {
            high: u64::from_be_bytes(high.try_into().unwrap_or_default()),
            low: u64::from_be_bytes(low.try_into().unwrap_or_default()),
        })
    }
}

impl fmt::Display for TraceId {
    // Both halves are always written, even when the high half is zero.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}{:016x}", self.high, self.low)
    }
}

impl FromStr for TraceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdParseError::Empty);
        }
        if s.len() > 32 {
            return Err(IdParseError::TooLong(s.to_string(), 32));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::InvalidHex(s.to_string()));
        }
        let parse = |part: &str| {
            u64::from_str_radix(part, 16).map_err(|_| IdParseError::InvalidHex(s.to_string()))
        };
        if s.len() > 16 {
            let split = s.len() - 16;
            Ok(Self {
                high: parse(&s[..split])?,
                low: parse(&s[split..])?,
            })
        } else {
            Ok(Self {
                high: 0,
                low: parse(s)?,
            })
        }
    }
}

/// 64-bit span identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct SpanId(pub u64);

impl SpanId {
    pub fn to_bytes(&self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl fmt::Display for SpanId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl FromStr for SpanId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() {
            return Err(IdParseError::Empty);
        }
        if s.len() > 16 {
            return Err(IdParseError::TooLong(s.to_string(), 16));
        }
        if !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(IdParseError::InvalidHex(s.to_string()));
        }
        u64::from_str_radix(s, 16)
            .map(SpanId)
            .map_err(|_| IdParseError::InvalidHex(s.to_string()))
    }
}
