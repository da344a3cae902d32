/// Token presence bitset.
///
/// Bit `i` is set when the `wordLike` string with index `i` occurs in the
/// indexed sequence. Persisted as a big-endian hexadecimal number, so bit 0
/// is the lowest bit of the last hex digit.
use anyhow::{bail, Context, Result};

#[derive(Debug, Clone, Default)]
pub struct PresenceSet {
    /// Little-endian: byte 0 holds bits 0..8.
    bits: Vec<u8>,
}

impl PresenceSet {
    /// An empty set with room for `len` indices.
    pub fn with_len(len: usize) -> Self {
        Self {
            bits: vec![0; len.div_ceil(8)],
        }
    }

    pub fn insert(&mut self, index: u32) {
        let byte_idx = (index / 8) as usize;
        let bit_offset = (index % 8) as u8;
        if byte_idx >= self.bits.len() {
            self.bits.resize(byte_idx + 1, 0);
        }
        self.bits[byte_idx] |= 1 << bit_offset;
    }

    #[must_use]
    pub fn contains(&self, index: u32) -> bool {
        let byte_idx = (index / 8) as usize;
        let bit_offset = (index % 8) as u8;
        self.bits
            .get(byte_idx)
            .is_some_and(|b| (b >> bit_offset) & 1 == 1)
    }

    /// Number of set bits.
    #[must_use]
    pub fn count(&self) -> usize {
        self.bits.iter().map(|b| b.count_ones() as usize).sum()
    }

    /// Set indices in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.bits.iter().enumerate().flat_map(|(i, &b)| {
            (0..8u32)
                .filter(move |bit| (b >> bit) & 1 == 1)
                .map(move |bit| i as u32 * 8 + bit)
        })
    }

    /// `0x` followed by the set as a hex number without leading zeros.
    #[must_use]
    pub fn to_hex(&self) -> String {
        let big_endian: Vec<u8> = self.bits.iter().rev().copied().collect();
        let digits = hex::encode(big_endian);
        let trimmed = digits.trim_start_matches('0');
        if trimmed.is_empty() {
            "0x0".to_string()
        } else {
            format!("0x{}", trimmed)
        }
    }

    pub fn from_hex(text: &str) -> Result<Self> {
        let Some(digits) = text.strip_prefix("0x") else {
            bail!("presence set '{}' lacks 0x prefix", text);
        };
        let padded = if digits.len() % 2 == 1 {
            format!("0{}", digits)
        } else {
            digits.to_string()
        };
        let mut bits =
            hex::decode(&padded).with_context(|| format!("invalid presence set '{}'", text))?;
        bits.reverse();
        Ok(Self { bits })
    }

    fn significant(&self) -> &[u8] {
        let end = self.bits.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
        &self.bits[..end]
    }
}

/// Sets are equal when the same bits are set, whatever their sizing.
impl PartialEq for PresenceSet {
    fn eq(&self, other: &Self) -> bool {
        self.significant() == other.significant()
    }
}

impl Eq for PresenceSet {}
