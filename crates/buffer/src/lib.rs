//! # Buffer - growable byte store for succinct records
//!
//! Every encoded artefact of the engine (block content, enum tables,
//! chapter/verse tables, versification tables) lives in a [`ByteBuffer`].
//! The buffer keeps a logical `length` that may be smaller than its backing
//! capacity; bytes past `length` are never observable through the API.
//!
//! ## Integer codec ("nByte")
//!
//! Unsigned integers are written 7 bits per byte, low-order group first.
//! Non-terminal bytes carry the raw group (`< 128`), the terminal byte carries
//! `128 + group`:
//!
//! ```text
//! 5      -> [0x85]
//! 300    -> [0x2C, 0x82]          (300 = 44 + 2 * 128)
//! 16384  -> [0x00, 0x00, 0x81]
//! ```
//!
//! At most 4 bytes are used, so values must be `< 128^4`.
//!
//! ## Counted strings
//!
//! ```text
//! [len: u8][utf8 bytes; len]
//! ```
//!
//! ## Persisted form
//!
//! A buffer persists as the standard base64 encoding of exactly its first
//! `length` bytes.
//!
//! ## Example
//!
//! ```rust
//! use buffer::ByteBuffer;
//!
//! let mut b = ByteBuffer::new();
//! b.push_nbyte(300).unwrap();
//! b.push_counted_string("λόγος").unwrap();
//! assert_eq!(b.nbyte(0).unwrap(), 300);
//! assert_eq!(b.counted_string(2).unwrap(), "λόγος");
//! ```

use base64::{engine::general_purpose::STANDARD, Engine as _};
use thiserror::Error;

/// Initial capacity used by [`ByteBuffer::new`].
pub const DEFAULT_CAPACITY: usize = 1024;

/// Upper bound on how much a single growth step adds to the capacity.
pub const DEFAULT_MAX_GROWTH: usize = 16 * 1024;

/// Largest value the integer codec accepts, exclusive (`128^4`).
pub const NBYTE_LIMIT: u32 = 1 << 28;

/// Longest string (in UTF-8 bytes) a counted string can hold.
pub const MAX_COUNTED_STRING: usize = 255;

/// Mask selecting the record length from a self-describing record header.
pub const RECORD_LENGTH_MASK: u8 = 0x3F;

/// Errors raised by [`ByteBuffer`] operations.
///
/// Every failing operation leaves the buffer exactly as it was.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum BufferError {
    /// A read or write touched bytes outside `[0, length)`.
    #[error("position {pos} (+{len}) out of range for buffer of length {length}")]
    OutOfRange { pos: usize, len: usize, length: usize },

    /// The integer codec cannot represent the value in 4 bytes.
    #[error("value {0} cannot be encoded in at most 4 bytes")]
    NByteOverflow(u32),

    /// A variable-length integer did not terminate within 4 bytes.
    #[error("unterminated variable-length integer at position {0}")]
    Unterminated(usize),

    /// A counted string exceeded 255 bytes.
    #[error("counted string of {0} bytes exceeds {MAX_COUNTED_STRING}")]
    StringTooLong(usize),

    /// A counted string did not hold valid UTF-8.
    #[error("invalid utf-8 in counted string at position {0}")]
    InvalidUtf8(usize),

    /// A record header declared a zero length.
    #[error("zero-length record at position {0}")]
    EmptyRecord(usize),

    /// The persisted base64 text could not be decoded.
    #[error("invalid base64: {0}")]
    Base64(String),
}

pub type Result<T> = std::result::Result<T, BufferError>;

/// Growable byte store with bounds-checked access and the succinct codecs.
#[derive(Clone)]
pub struct ByteBuffer {
    /// Backing storage; its length is the current capacity.
    data: Vec<u8>,
    /// Logical length.
    length: usize,
    /// Cap on a single growth step.
    max_growth: usize,
}

impl ByteBuffer {
    /// Creates an empty buffer with [`DEFAULT_CAPACITY`].
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Creates an empty buffer sized for roughly `capacity` bytes.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::with_growth(capacity, DEFAULT_MAX_GROWTH)
    }

    /// Creates an empty buffer with an explicit capacity hint and growth cap.
    pub fn with_growth(capacity: usize, max_growth: usize) -> Self {
        Self {
            data: vec![0u8; capacity.max(1)],
            length: 0,
            max_growth: max_growth.max(1),
        }
    }

    /// Wraps existing bytes; the buffer length is `bytes.len()`.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let length = bytes.len();
        Self {
            data: bytes,
            length,
            max_growth: DEFAULT_MAX_GROWTH,
        }
    }

    /// Decodes a buffer from its persisted base64 form.
    pub fn from_base64(text: &str) -> Result<Self> {
        let bytes = STANDARD
            .decode(text)
            .map_err(|e| BufferError::Base64(e.to_string()))?;
        Ok(Self::from_bytes(bytes))
    }

    /// Returns the persisted base64 form of the first `length` bytes.
    #[must_use]
    pub fn to_base64(&self) -> String {
        STANDARD.encode(self.as_slice())
    }

    /// Logical length in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.length
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }

    /// Current backing capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// The logical contents.
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.length]
    }

    /// Resets the logical length to zero. Capacity is kept.
    pub fn clear(&mut self) {
        self.length = 0;
    }

    /// Shrinks the backing capacity to exactly `length`.
    pub fn trim(&mut self) {
        self.data.truncate(self.length);
        self.data.shrink_to_fit();
    }

    /// Truncates the logical length. Used to roll back a partially written record.
    pub fn truncate(&mut self, length: usize) {
        if length < self.length {
            self.length = length;
        }
    }

    // ---- Single bytes ----

    pub fn push_byte(&mut self, value: u8) {
        self.ensure_capacity(self.length + 1);
        self.data[self.length] = value;
        self.length += 1;
    }

    pub fn byte(&self, pos: usize) -> Result<u8> {
        self.check_range(pos, 1)?;
        Ok(self.data[pos])
    }

    pub fn set_byte(&mut self, pos: usize, value: u8) -> Result<()> {
        self.check_range(pos, 1)?;
        self.data[pos] = value;
        Ok(())
    }

    // ---- Byte ranges ----

    pub fn push_bytes(&mut self, values: &[u8]) {
        self.ensure_capacity(self.length + values.len());
        self.data[self.length..self.length + values.len()].copy_from_slice(values);
        self.length += values.len();
    }

    pub fn bytes(&self, pos: usize, len: usize) -> Result<&[u8]> {
        self.check_range(pos, len)?;
        Ok(&self.data[pos..pos + len])
    }

    pub fn set_bytes(&mut self, pos: usize, values: &[u8]) -> Result<()> {
        self.check_range(pos, values.len())?;
        self.data[pos..pos + values.len()].copy_from_slice(values);
        Ok(())
    }

    // ---- Variable-length integers ----

    /// Number of bytes `value` occupies in the integer codec.
    pub fn nbyte_length(value: u32) -> Result<usize> {
        match value {
            0..=0x7F => Ok(1),
            0x80..=0x3FFF => Ok(2),
            0x4000..=0x1F_FFFF => Ok(3),
            0x20_0000..=0x0FFF_FFFF => Ok(4),
            _ => Err(BufferError::NByteOverflow(value)),
        }
    }

    pub fn push_nbyte(&mut self, value: u32) -> Result<()> {
        let n = Self::nbyte_length(value)?;
        let mut v = value;
        for _ in 1..n {
            self.push_byte((v & 0x7F) as u8);
            v >>= 7;
        }
        self.push_byte(0x80 | v as u8);
        Ok(())
    }

    /// Decodes the integer starting at `pos`.
    pub fn nbyte(&self, pos: usize) -> Result<u32> {
        self.nbyte_with_length(pos).map(|(v, _)| v)
    }

    /// Decodes the integer at `pos`, also returning how many bytes it used.
    pub fn nbyte_with_length(&self, pos: usize) -> Result<(u32, usize)> {
        let mut value: u32 = 0;
        for i in 0..4 {
            let b = self.byte(pos + i)?;
            if b >= 0x80 {
                value |= u32::from(b & 0x7F) << (7 * i);
                return Ok((value, i + 1));
            }
            value |= u32::from(b) << (7 * i);
        }
        Err(BufferError::Unterminated(pos))
    }

    /// Pushes every value in order. Nothing is written if any value is out of range.
    pub fn push_nbytes(&mut self, values: &[u32]) -> Result<()> {
        for &v in values {
            Self::nbyte_length(v)?;
        }
        for &v in values {
            self.push_nbyte(v)?;
        }
        Ok(())
    }

    /// Decodes `count` consecutive integers starting at `pos`.
    pub fn nbytes(&self, pos: usize, count: usize) -> Result<Vec<u32>> {
        let mut out = Vec::with_capacity(count);
        let mut p = pos;
        for _ in 0..count {
            let (v, n) = self.nbyte_with_length(p)?;
            out.push(v);
            p += n;
        }
        Ok(out)
    }

    // ---- Counted strings ----

    pub fn push_counted_string(&mut self, s: &str) -> Result<()> {
        let bytes = s.as_bytes();
        if bytes.len() > MAX_COUNTED_STRING {
            return Err(BufferError::StringTooLong(bytes.len()));
        }
        self.ensure_capacity(self.length + 1 + bytes.len());
        self.push_byte(bytes.len() as u8);
        self.push_bytes(bytes);
        Ok(())
    }

    pub fn counted_string(&self, pos: usize) -> Result<&str> {
        let len = self.byte(pos)? as usize;
        let raw = self.bytes(pos + 1, len)?;
        std::str::from_utf8(raw).map_err(|_| BufferError::InvalidUtf8(pos))
    }

    // ---- Splicing ----

    /// Removes the self-describing record at `pos`. Its length is read from
    /// the low 6 bits of the header byte.
    pub fn delete_item(&mut self, pos: usize) -> Result<()> {
        let len = (self.byte(pos)? & RECORD_LENGTH_MASK) as usize;
        if len == 0 {
            return Err(BufferError::EmptyRecord(pos));
        }
        self.check_range(pos, len)?;
        self.data.copy_within(pos + len..self.length, pos);
        self.length -= len;
        Ok(())
    }

    /// Inserts the contents of `other` at `pos`, shifting later bytes right.
    /// `pos == len()` appends.
    pub fn insert(&mut self, pos: usize, other: &ByteBuffer) -> Result<()> {
        if pos > self.length {
            return Err(BufferError::OutOfRange {
                pos,
                len: 0,
                length: self.length,
            });
        }
        let n = other.len();
        self.ensure_capacity(self.length + n);
        self.data.copy_within(pos..self.length, pos + n);
        self.data[pos..pos + n].copy_from_slice(other.as_slice());
        self.length += n;
        Ok(())
    }

    // ---- Internal helpers ----

    fn check_range(&self, pos: usize, len: usize) -> Result<()> {
        match pos.checked_add(len) {
            Some(end) if end <= self.length => Ok(()),
            _ => Err(BufferError::OutOfRange {
                pos,
                len,
                length: self.length,
            }),
        }
    }

    /// Grows geometrically: at least doubles, but never by more than
    /// `max_growth` beyond what is required.
    fn ensure_capacity(&mut self, required: usize) {
        let cap = self.data.len();
        if required <= cap {
            return;
        }
        let doubled = cap.saturating_mul(2).min(cap + self.max_growth);
        let new_cap = doubled.max(required);
        self.data.resize(new_cap, 0);
    }
}

impl Default for ByteBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for ByteBuffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for ByteBuffer {}

impl std::fmt::Debug for ByteBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ByteBuffer")
            .field("length", &self.length)
            .field("capacity", &self.data.len())
            .finish()
    }
}
