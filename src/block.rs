//! Single-partition Elias-Fano codec.
//!
//! A block encodes one non-decreasing run of `u64` values relative to its
//! minimum (the *floor*). Each shifted value `v - floor` is split into `l`
//! low bits, stored densely in a packed array, and a high part, stored in a
//! unary gap stream: the j-th value contributes a set bit at position
//! `((v_j - floor) >> l) + j`. With `range = max - min + 1`, choosing
//! `l = floor(log2(range / n))` balances the two streams at roughly
//! `n * l + n + range / 2^l` total bits, which is within a constant of the
//! information-theoretic minimum for a monotone run.
//!
//! Duplicates are allowed: repeated values map to consecutive set bits
//! because the bit position depends on the index `j`, not just the value.
//!
//! The block's wire form is a 40-byte header ([`EFBlockMetadata`]) followed
//! by the low-bit words and the high-bit words, all little-endian.

use crate::bits::{floor_log2, next_one_at_or_after, select_one};
use crate::bitstream::{BitReader, BitWriter};
use crate::error::{Error, Result};

/// Fixed-size header describing one Elias-Fano block on the wire.
///
/// Serialized as 40 bytes: `n_elem` (u32), `l` (u8), three filler bytes,
/// then `floor`, `low_words`, `high_words`, `high_bits_len` (u64 each),
/// all little-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EFBlockMetadata {
    /// Number of values encoded in the block.
    pub n_elem: u32,
    /// Number of low bits stored per value.
    pub l: u8,
    /// Minimum value in the block; values are stored as `value - floor`.
    pub floor: u64,
    /// Number of 64-bit words in the low-bit payload.
    pub low_words: u64,
    /// Number of 64-bit words in the high-bit payload.
    pub high_words: u64,
    /// Exact number of meaningful bits in the high-bit payload.
    pub high_bits_len: u64,
}

impl EFBlockMetadata {
    /// Serialized size of the header in bytes.
    pub const BYTES: usize = 40;

    /// Append the 40-byte little-endian header to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.n_elem.to_le_bytes());
        out.push(self.l);
        out.extend_from_slice(&[0u8; 3]);
        out.extend_from_slice(&self.floor.to_le_bytes());
        out.extend_from_slice(&self.low_words.to_le_bytes());
        out.extend_from_slice(&self.high_words.to_le_bytes());
        out.extend_from_slice(&self.high_bits_len.to_le_bytes());
    }

    /// Parse a 40-byte little-endian header from the front of `bytes`.
    pub fn read_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::BYTES {
            return Err(Error::InvalidEncoding(format!(
                "block header truncated: {} bytes, need {}",
                bytes.len(),
                Self::BYTES
            )));
        }
        let n_elem = u32::from_le_bytes(bytes[0..4].try_into().unwrap());
        let l = bytes[4];
        let floor = u64::from_le_bytes(bytes[8..16].try_into().unwrap());
        let low_words = u64::from_le_bytes(bytes[16..24].try_into().unwrap());
        let high_words = u64::from_le_bytes(bytes[24..32].try_into().unwrap());
        let high_bits_len = u64::from_le_bytes(bytes[32..40].try_into().unwrap());

        let meta = Self {
            n_elem,
            l,
            floor,
            low_words,
            high_words,
            high_bits_len,
        };
        meta.validate()?;
        Ok(meta)
    }

    /// Check the internal consistency of a parsed header.
    fn validate(&self) -> Result<()> {
        if self.n_elem == 0 {
            return Err(Error::InvalidEncoding("block header with n_elem = 0".into()));
        }
        if self.l > 63 {
            return Err(Error::InvalidEncoding(format!(
                "low bit width {} out of range",
                self.l
            )));
        }
        let expect_low = expected_low_words(self.n_elem, self.l);
        if self.low_words != expect_low {
            return Err(Error::InvalidEncoding(format!(
                "low_words {} does not match n_elem {} at width {}",
                self.low_words, self.n_elem, self.l
            )));
        }
        if self.high_bits_len < u64::from(self.n_elem) {
            return Err(Error::InvalidEncoding(format!(
                "high_bits_len {} shorter than n_elem {}",
                self.high_bits_len, self.n_elem
            )));
        }
        if self.high_words != self.high_bits_len.div_ceil(64) {
            return Err(Error::InvalidEncoding(format!(
                "high_words {} does not match high_bits_len {}",
                self.high_words, self.high_bits_len
            )));
        }
        Ok(())
    }

    /// Serialized size of the whole block (header + payloads) in bytes.
    #[must_use]
    pub fn block_bytes(&self) -> usize {
        Self::BYTES + 8 * (self.low_words + self.high_words) as usize
    }
}

/// Number of low-payload words for `n_elem` values at `l` bits each.
#[inline]
fn expected_low_words(n_elem: u32, l: u8) -> u64 {
    (u64::from(n_elem) * u64::from(l)).div_ceil(64)
}

/// One Elias-Fano encoded partition: header plus low/high word arrays.
#[derive(Debug, Clone)]
pub struct EFBlock {
    /// Block header.
    pub meta: EFBlockMetadata,
    low: Vec<u64>,
    high: Vec<u64>,
}

impl EFBlock {
    /// Encode a non-decreasing run of values.
    ///
    /// The caller (the sequence builder) is responsible for ordering; an
    /// empty run is rejected.
    pub fn new(values: &[u64]) -> Result<Self> {
        let n = values.len();
        if n == 0 {
            return Err(Error::EmptyBlock);
        }
        debug_assert!(values.windows(2).all(|w| w[0] <= w[1]));

        let floor = values[0];
        let range = values[n - 1] - floor + 1;

        // l = floor(log2(range / n)) when the quotient is >= 1, else 0.
        let quotient = range / n as u64;
        let l = if quotient >= 1 {
            floor_log2(quotient) as u8
        } else {
            0
        };

        // Low bits, densely packed.
        let mut writer = BitWriter::new();
        for &v in values {
            writer.put(v - floor, u32::from(l));
        }
        let low = writer.into_words();

        // High bits: the j-th value sets bit ((v_j - floor) >> l) + j.
        let range_hi = if l > 0 { range.div_ceil(1u64 << l) } else { range };
        let high_bits_len = n as u64 + range_hi;
        let high_words = high_bits_len.div_ceil(64);
        let mut high = vec![0u64; high_words as usize];
        for (i, &v) in values.iter().enumerate() {
            let pos = (((v - floor) >> l) + i as u64) as usize;
            high[pos / 64] |= 1u64 << (pos % 64);
        }

        Ok(Self {
            meta: EFBlockMetadata {
                n_elem: n as u32,
                l,
                floor,
                low_words: low.len() as u64,
                high_words,
                high_bits_len,
            },
            low,
            high,
        })
    }

    /// Number of values in the block.
    #[must_use]
    pub fn len(&self) -> usize {
        self.meta.n_elem as usize
    }

    /// Always false: empty blocks cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Serialized size of the block in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        self.meta.block_bytes()
    }

    /// Decode the whole block back into its values.
    pub fn decode(&self) -> Vec<u64> {
        let n = self.len();
        let l = u32::from(self.meta.l);
        let mut reader = BitReader::new(&self.low);
        let mut out = Vec::with_capacity(n);
        let mut pos = 0usize;
        for i in 0..n {
            let lo = reader.get(l);
            // A constructed or validated block has exactly n_elem set bits.
            let Some(p) = next_one_at_or_after(&self.high, pos) else {
                debug_assert!(false, "high stream exhausted before n_elem ones");
                break;
            };
            let hi = (p - i) as u64;
            out.push(self.meta.floor + ((hi << l) | lo));
            pos = p + 1;
        }
        out
    }

    /// Return the value of 0-based rank `r` within the block.
    pub fn at(&self, r: usize) -> Result<u64> {
        if r >= self.len() {
            return Err(Error::IndexOutOfBounds(r));
        }
        let l = u32::from(self.meta.l);

        let mut reader = BitReader::new(&self.low);
        reader.scan(r * l as usize);
        let lo = reader.get(l);

        let pos = select_one(&self.high, r).ok_or(Error::InvalidSelection(r))?;
        let hi = (pos - r) as u64;
        Ok(self.meta.floor + ((hi << l) | lo))
    }

    /// Test whether `v` occurs in the block.
    pub fn contains(&self, v: u64) -> bool {
        if v < self.meta.floor {
            return false;
        }
        let l = u32::from(self.meta.l);
        let shifted = v - self.meta.floor;
        let hi_star = shifted >> l;
        let lo_star = if l == 0 { 0 } else { shifted & ((1u64 << l) - 1) };

        // Values' high parts never reach range_hi = high_bits_len - n_elem.
        let range_hi = self.meta.high_bits_len - u64::from(self.meta.n_elem);
        if hi_star >= range_hi {
            return false;
        }

        // Walk the unary stream until the high part reaches hi_star; check
        // the low field of every candidate (duplicates are consecutive).
        let mut reader = BitReader::new(&self.low);
        let mut pos = 0usize;
        for j in 0..self.len() {
            let Some(p) = next_one_at_or_after(&self.high, pos) else {
                return false;
            };
            let hi = (p - j) as u64;
            if hi > hi_star {
                return false;
            }
            if hi == hi_star {
                reader.scan(j * l as usize);
                if reader.get(l) == lo_star {
                    return true;
                }
            }
            pos = p + 1;
        }
        false
    }

    /// Append the block's wire form (header, low words, high words) to `out`.
    pub fn write_to(&self, out: &mut Vec<u8>) {
        self.meta.write_to(out);
        for &w in &self.low {
            out.extend_from_slice(&w.to_le_bytes());
        }
        for &w in &self.high {
            out.extend_from_slice(&w.to_le_bytes());
        }
    }

    /// Parse one block from the front of `bytes`, returning it together
    /// with the number of bytes consumed.
    pub fn read_from(bytes: &[u8]) -> Result<(Self, usize)> {
        let meta = EFBlockMetadata::read_from(bytes)?;

        // Bound the payload against the input before allocating anything,
        // so a hostile header cannot trigger an allocation bomb.
        let total = EFBlockMetadata::BYTES as u64 + 8 * (meta.low_words + meta.high_words);
        if (bytes.len() as u64) < total {
            return Err(Error::InvalidEncoding(format!(
                "block payload truncated: {} bytes, need {}",
                bytes.len(),
                total
            )));
        }
        let total = total as usize;

        let mut off = EFBlockMetadata::BYTES;
        let mut read_words = |count: u64| -> Vec<u64> {
            let mut words = Vec::with_capacity(count as usize);
            for _ in 0..count {
                words.push(u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap()));
                off += 8;
            }
            words
        };
        let low = read_words(meta.low_words);
        let high = read_words(meta.high_words);

        // The unary stream must carry exactly one set bit per element, all
        // within the declared length; decode relies on this.
        let ones: u64 = high.iter().map(|w| u64::from(w.count_ones())).sum();
        if ones != u64::from(meta.n_elem) {
            return Err(Error::InvalidEncoding(format!(
                "high stream has {} set bits, expected {}",
                ones, meta.n_elem
            )));
        }
        let tail = meta.high_words * 64 - meta.high_bits_len;
        if tail > 0 {
            let last = high.last().copied().unwrap_or(0);
            if last >> (64 - tail as u32) != 0 {
                return Err(Error::InvalidEncoding(
                    "set bits beyond high_bits_len".into(),
                ));
            }
        }

        Ok((Self { meta, low, high }, total))
    }
}
