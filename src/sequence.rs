//! Partitioned Elias-Fano container for sorted `u64` sequences.
//!
//! Plain Elias-Fano picks a single low-bit width from the *global* universe
//! size. When a sequence is locally clustered (posting lists, neighbor
//! lists, sorted keys), encoding fixed-size partitions against their own
//! local universe compresses better and keeps random access cheap: a sparse
//! directory maps each block to its byte offset and last value, so `get`
//! touches one block and `contains` binary-searches the directory first.
//!
//! A [`Sequence`] is immutable once built. All queries take `&self` and are
//! pure functions of the underlying bytes, so shared references may be used
//! freely across threads.
//!
//! # Wire format
//!
//! ```text
//! offset  size          content
//! 0       4             magic "PPEF"
//! 4       4             version (u32 LE) = 1
//! 8       8             n_elem (u64 LE)
//! 16      4             block_size (u32 LE)
//! 20      4             reserved = 0
//! 24      8             n_blocks (u64 LE)
//! 32      8             payload_offset (u64 LE) = 40 + 16 * n_blocks
//! 40      8 * n_blocks  block_last[] (u64 LE)
//! ...     8 * n_blocks  block_offset[] (u64 LE, relative to payload start)
//! ...                   concatenated blocks (40-byte header + low + high)
//! ```

use std::path::Path;

use crate::block::{EFBlock, EFBlockMetadata};
use crate::error::{Error, Result};

/// File magic, ASCII `"PPEF"`.
pub const MAGIC: [u8; 4] = *b"PPEF";

/// Current serialization format version.
pub const VERSION: u32 = 1;

/// Default partition width.
pub const DEFAULT_BLOCK_SIZE: u32 = 256;

/// Fixed 40-byte file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SequenceMetadata {
    /// File magic; always `"PPEF"`.
    pub magic: [u8; 4],
    /// Format version; always 1.
    pub version: u32,
    /// Total number of encoded values.
    pub n_elem: u64,
    /// Partition width used at build time.
    pub block_size: u32,
    /// Reserved; zero.
    pub reserved: u32,
    /// Number of blocks, `ceil(n_elem / block_size)`.
    pub n_blocks: u64,
    /// Byte offset from the file start to the first block header.
    pub payload_offset: u64,
}

impl SequenceMetadata {
    /// Serialized size of the header in bytes.
    pub const BYTES: usize = 40;

    fn new(n_elem: u64, block_size: u32, n_blocks: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            n_elem,
            block_size,
            reserved: 0,
            n_blocks,
            payload_offset: Self::BYTES as u64 + 16 * n_blocks,
        }
    }

    fn write_to(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.magic);
        out.extend_from_slice(&self.version.to_le_bytes());
        out.extend_from_slice(&self.n_elem.to_le_bytes());
        out.extend_from_slice(&self.block_size.to_le_bytes());
        out.extend_from_slice(&self.reserved.to_le_bytes());
        out.extend_from_slice(&self.n_blocks.to_le_bytes());
        out.extend_from_slice(&self.payload_offset.to_le_bytes());
    }

    fn read_from(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < Self::BYTES {
            return Err(Error::InvalidEncoding(format!(
                "header truncated: {} bytes, need {}",
                bytes.len(),
                Self::BYTES
            )));
        }
        let magic: [u8; 4] = bytes[0..4].try_into().unwrap();
        if magic != MAGIC {
            return Err(Error::InvalidEncoding("bad magic".into()));
        }
        let version = u32::from_le_bytes(bytes[4..8].try_into().unwrap());
        if version != VERSION {
            return Err(Error::InvalidEncoding(format!(
                "unsupported version {version}"
            )));
        }
        Ok(Self {
            magic,
            version,
            n_elem: u64::from_le_bytes(bytes[8..16].try_into().unwrap()),
            block_size: u32::from_le_bytes(bytes[16..20].try_into().unwrap()),
            reserved: u32::from_le_bytes(bytes[20..24].try_into().unwrap()),
            n_blocks: u64::from_le_bytes(bytes[24..32].try_into().unwrap()),
            payload_offset: u64::from_le_bytes(bytes[32..40].try_into().unwrap()),
        })
    }
}

/// A compressed, random-accessible, non-decreasing sequence of `u64`.
#[derive(Clone)]
pub struct Sequence {
    meta: SequenceMetadata,
    /// Largest value in each block.
    block_last: Vec<u64>,
    /// Byte offset of each block from the start of the payload.
    block_offset: Vec<u64>,
    /// Concatenated serialized blocks.
    payload: Vec<u8>,
}

impl std::fmt::Debug for Sequence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sequence")
            .field("n_elem", &self.meta.n_elem)
            .field("block_size", &self.meta.block_size)
            .field("n_blocks", &self.meta.n_blocks)
            .field("payload_bytes", &self.payload.len())
            .finish()
    }
}

impl Sequence {
    /// Compress a non-decreasing slice with the default block size (256).
    pub fn new(values: &[u64]) -> Result<Self> {
        Self::with_block_size(values, DEFAULT_BLOCK_SIZE)
    }

    /// Compress a non-decreasing slice, partitioning into runs of
    /// `block_size` values (the last run may be shorter).
    ///
    /// `block_size` is clamped to at least 1. Returns
    /// [`Error::NotMonotone`] if the input is not non-decreasing.
    pub fn with_block_size(values: &[u64], block_size: u32) -> Result<Self> {
        let block_size = block_size.max(1);
        if let Some(i) = values.windows(2).position(|w| w[0] > w[1]) {
            return Err(Error::NotMonotone { index: i + 1 });
        }

        let n_elem = values.len() as u64;
        let n_blocks = n_elem.div_ceil(u64::from(block_size));
        let mut block_last = Vec::with_capacity(n_blocks as usize);
        let mut block_offset = Vec::with_capacity(n_blocks as usize);
        let mut payload = Vec::new();

        for chunk in values.chunks(block_size as usize) {
            let blk = EFBlock::new(chunk)?;
            block_offset.push(payload.len() as u64);
            block_last.push(chunk[chunk.len() - 1]);
            blk.write_to(&mut payload);
        }

        Ok(Self {
            meta: SequenceMetadata::new(n_elem, block_size, n_blocks),
            block_last,
            block_offset,
            payload,
        })
    }

    /// Number of encoded values.
    #[must_use]
    pub fn len(&self) -> u64 {
        self.meta.n_elem
    }

    /// True if no values are encoded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.meta.n_elem == 0
    }

    /// Partition width used at build time.
    #[must_use]
    pub fn block_size(&self) -> u32 {
        self.meta.block_size
    }

    /// Number of blocks.
    #[must_use]
    pub fn n_blocks(&self) -> u64 {
        self.meta.n_blocks
    }

    /// Read-only view of the file header.
    #[must_use]
    pub fn meta(&self) -> &SequenceMetadata {
        &self.meta
    }

    /// Largest value stored in block `b`.
    pub(crate) fn block_last(&self, b: usize) -> Option<u64> {
        self.block_last.get(b).copied()
    }

    /// Serialized size in bytes.
    #[must_use]
    pub fn size_bytes(&self) -> usize {
        SequenceMetadata::BYTES + 16 * self.block_last.len() + self.payload.len()
    }

    /// Parse and return block `b` from the payload.
    pub(crate) fn block(&self, b: usize) -> Result<EFBlock> {
        let off = *self
            .block_offset
            .get(b)
            .ok_or(Error::BlockOutOfBounds(b))? as usize;
        let (blk, _) = EFBlock::read_from(&self.payload[off..])?;
        Ok(blk)
    }

    /// Decode the whole sequence back into a vector.
    pub fn decode(&self) -> Result<Vec<u64>> {
        let mut out = Vec::with_capacity(self.meta.n_elem as usize);
        for b in 0..self.meta.n_blocks as usize {
            out.extend(self.block(b)?.decode());
        }
        Ok(out)
    }

    /// Decode the values of block `b`.
    pub fn decode_block(&self, b: u64) -> Result<Vec<u64>> {
        if b >= self.meta.n_blocks {
            return Err(Error::BlockOutOfBounds(b as usize));
        }
        Ok(self.block(b as usize)?.decode())
    }

    /// Random access: return the `i`-th value.
    pub fn get(&self, i: u64) -> Result<u64> {
        if i >= self.meta.n_elem {
            return Err(Error::IndexOutOfBounds(i as usize));
        }
        let b = (i / u64::from(self.meta.block_size)) as usize;
        let r = (i % u64::from(self.meta.block_size)) as usize;
        self.block(b)?.at(r)
    }

    /// Membership test.
    ///
    /// Binary-searches the block directory for the first block whose last
    /// value is at least `v`, then probes that single block.
    pub fn contains(&self, v: u64) -> Result<bool> {
        let b = self.block_last.partition_point(|&last| last < v);
        if b == self.block_last.len() {
            return Ok(false);
        }
        // Cheap reject on the block header alone before parsing payloads.
        let off = self.block_offset[b] as usize;
        let meta = EFBlockMetadata::read_from(&self.payload[off..])?;
        if v < meta.floor {
            return Ok(false);
        }
        Ok(self.block(b)?.contains(v))
    }

    /// Iterate over the values, decoding one block at a time.
    #[must_use]
    pub fn iter(&self) -> Values<'_> {
        Values {
            seq: self,
            block: 0,
            decoded: Vec::new(),
            pos: 0,
            emitted: 0,
        }
    }

    /// Serialize to the on-disk byte format.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.size_bytes());
        self.meta.write_to(&mut out);
        for &last in &self.block_last {
            out.extend_from_slice(&last.to_le_bytes());
        }
        for &off in &self.block_offset {
            out.extend_from_slice(&off.to_le_bytes());
        }
        out.extend_from_slice(&self.payload);
        out
    }

    /// Deserialize from `to_bytes` output, validating the header, the
    /// directory, and every block header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let meta = SequenceMetadata::read_from(bytes)?;

        if meta.block_size == 0 {
            return Err(Error::InvalidEncoding("block_size must be >= 1".into()));
        }
        let expect_blocks = meta.n_elem.div_ceil(u64::from(meta.block_size));
        if meta.n_blocks != expect_blocks {
            return Err(Error::InvalidEncoding(format!(
                "n_blocks {} does not match n_elem {} at block_size {}",
                meta.n_blocks, meta.n_elem, meta.block_size
            )));
        }
        // Bound allocation against total input to prevent allocation bombs.
        if meta.n_blocks.saturating_mul(16) > bytes.len() as u64 {
            return Err(Error::InvalidEncoding(format!(
                "n_blocks ({}) too large for input ({} bytes)",
                meta.n_blocks,
                bytes.len()
            )));
        }
        if meta.payload_offset != SequenceMetadata::BYTES as u64 + 16 * meta.n_blocks {
            return Err(Error::InvalidEncoding(format!(
                "payload_offset {} inconsistent with n_blocks {}",
                meta.payload_offset, meta.n_blocks
            )));
        }
        if (bytes.len() as u64) < meta.payload_offset {
            return Err(Error::InvalidEncoding(format!(
                "directory truncated: {} bytes, need {}",
                bytes.len(),
                meta.payload_offset
            )));
        }

        let n_blocks = meta.n_blocks as usize;
        let mut off = SequenceMetadata::BYTES;
        let mut take_u64 = || -> u64 {
            let v = u64::from_le_bytes(bytes[off..off + 8].try_into().unwrap());
            off += 8;
            v
        };
        let block_last: Vec<u64> = (0..n_blocks).map(|_| take_u64()).collect();
        let block_offset: Vec<u64> = (0..n_blocks).map(|_| take_u64()).collect();

        let payload = bytes[meta.payload_offset as usize..].to_vec();

        // Walk the payload once, checking the directory against the actual
        // block headers.
        let mut cursor = 0usize;
        for b in 0..n_blocks {
            if block_offset[b] as usize != cursor {
                return Err(Error::InvalidEncoding(format!(
                    "block {b} directory offset {} does not match payload position {cursor}",
                    block_offset[b]
                )));
            }
            if b > 0 && block_last[b - 1] > block_last[b] {
                return Err(Error::InvalidEncoding(
                    "block_last directory not non-decreasing".into(),
                ));
            }
            let (blk, consumed) = EFBlock::read_from(&payload[cursor..])?;
            let expect_n = if b + 1 < n_blocks {
                u64::from(meta.block_size)
            } else {
                meta.n_elem - u64::from(meta.block_size) * (n_blocks as u64 - 1)
            };
            if u64::from(blk.meta.n_elem) != expect_n {
                return Err(Error::InvalidEncoding(format!(
                    "block {b} holds {} values, expected {expect_n}",
                    blk.meta.n_elem
                )));
            }
            if blk.meta.floor > block_last[b] {
                return Err(Error::InvalidEncoding(format!(
                    "block {b} floor {} exceeds directory last value {}",
                    blk.meta.floor, block_last[b]
                )));
            }
            cursor += consumed;
        }
        if cursor != payload.len() {
            return Err(Error::InvalidEncoding(format!(
                "trailing bytes after last block: {} of {}",
                payload.len() - cursor,
                payload.len()
            )));
        }

        Ok(Self {
            meta,
            block_last,
            block_offset,
            payload,
        })
    }

    /// Write the serialized sequence to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        std::fs::write(path, self.to_bytes())?;
        Ok(())
    }

    /// Load a sequence from a file written by [`Sequence::save`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

impl<'a> IntoIterator for &'a Sequence {
    type Item = u64;
    type IntoIter = Values<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Streaming iterator over a sequence's values; holds at most one decoded
/// block at a time.
pub struct Values<'a> {
    seq: &'a Sequence,
    block: usize,
    decoded: Vec<u64>,
    pos: usize,
    emitted: u64,
}

impl Iterator for Values<'_> {
    type Item = u64;

    fn next(&mut self) -> Option<u64> {
        if self.pos == self.decoded.len() {
            if self.block as u64 >= self.seq.meta.n_blocks {
                return None;
            }
            // A validated sequence always parses; stop on the impossible.
            self.decoded = self.seq.block(self.block).ok()?.decode();
            self.block += 1;
            self.pos = 0;
        }
        let v = self.decoded[self.pos];
        self.pos += 1;
        self.emitted += 1;
        Some(v)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.seq.meta.n_elem - self.emitted) as usize;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Values<'_> {}

#[cfg(test)]
mod tests {
    use super::*;

    /// Deterministic sorted values in `[0, max)`.
    fn sorted_values(n: usize, max: u64) -> Vec<u64> {
        let mut state = 0x9E37_79B9_7F4A_7C15u64;
        let mut out: Vec<u64> = (0..n)
            .map(|_| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                (state >> 11) % max
            })
            .collect();
        out.sort_unstable();
        out
    }

    #[test]
    fn test_roundtrip_basic() {
        let values = vec![10, 20, 30, 31, 32, 100, 1000];
        let seq = Sequence::with_block_size(&values, 3).unwrap();
        assert_eq!(seq.len(), values.len() as u64);
        assert_eq!(seq.decode().unwrap(), values);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(seq.get(i as u64).unwrap(), v);
        }
    }

    #[test]
    fn test_rejects_unsorted() {
        let err = Sequence::new(&[5, 4, 6]).unwrap_err();
        assert!(matches!(err, Error::NotMonotone { index: 1 }));
    }

    #[test]
    fn test_empty_sequence() {
        let seq = Sequence::new(&[]).unwrap();
        assert!(seq.is_empty());
        assert_eq!(seq.n_blocks(), 0);
        assert_eq!(seq.decode().unwrap(), Vec::<u64>::new());
        assert!(seq.get(0).is_err());
        assert!(!seq.contains(7).unwrap());

        // Empty survives the byte round-trip with n_elem = n_blocks = 0.
        let reloaded = Sequence::from_bytes(&seq.to_bytes()).unwrap();
        assert_eq!(reloaded.len(), 0);
        assert_eq!(reloaded.n_blocks(), 0);
    }

    #[test]
    fn test_four_even_blocks() {
        let values = sorted_values(1024, 4096);
        let seq = Sequence::with_block_size(&values, 256).unwrap();
        assert_eq!(seq.n_blocks(), 4);

        assert_eq!(seq.decode_block(0).unwrap(), &values[0..256]);
        assert_eq!(seq.decode_block(1).unwrap(), &values[256..512]);
        assert_eq!(seq.decode().unwrap(), values);
    }

    #[test]
    fn test_ragged_last_block() {
        let values = sorted_values(1333, 4096);
        let seq = Sequence::with_block_size(&values, 256).unwrap();
        assert_eq!(seq.n_blocks(), 6);

        let last = seq.decode_block(5).unwrap();
        assert_eq!(last.len(), 53);
        assert_eq!(last, &values[1280..1333]);
        assert!(seq.decode_block(6).is_err());

        assert_eq!(seq.decode().unwrap(), values);
    }

    #[test]
    fn test_block_concatenation_matches_decode() {
        let values = sorted_values(1000, 1 << 20);
        let seq = Sequence::with_block_size(&values, 128).unwrap();
        let mut concat = Vec::new();
        for b in 0..seq.n_blocks() {
            concat.extend(seq.decode_block(b).unwrap());
        }
        assert_eq!(concat, seq.decode().unwrap());
    }

    #[test]
    fn test_get_across_blocks() {
        let values = sorted_values(700, 1 << 30);
        let seq = Sequence::with_block_size(&values, 64).unwrap();
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(seq.get(i as u64).unwrap(), v);
        }
        assert!(seq.get(700).is_err());
    }

    #[test]
    fn test_contains() {
        let values = vec![1, 3, 4, 6, 7, 10, 11, 17, 21, 33, 55, 77, 99, 101, 133, 145];
        let seq = Sequence::with_block_size(&values, 4).unwrap();
        for v in 0..150 {
            assert_eq!(seq.contains(v).unwrap(), values.contains(&v), "value {v}");
        }
        assert!(!seq.contains(u64::MAX).unwrap());
    }

    #[test]
    fn test_contains_with_duplicates() {
        let values = vec![2, 2, 2, 5, 5, 8, 8, 8, 8, 9];
        let seq = Sequence::with_block_size(&values, 3).unwrap();
        for v in 0..12 {
            assert_eq!(seq.contains(v).unwrap(), values.contains(&v), "value {v}");
        }
        assert_eq!(seq.decode().unwrap(), values);
    }

    #[test]
    fn test_single_value_blocks() {
        let values = vec![7, 9, 9, 1_000_000];
        let seq = Sequence::with_block_size(&values, 1).unwrap();
        assert_eq!(seq.n_blocks(), 4);
        assert_eq!(seq.decode().unwrap(), values);
        for (i, &v) in values.iter().enumerate() {
            assert_eq!(seq.get(i as u64).unwrap(), v);
        }
    }

    #[test]
    fn test_block_size_zero_clamped() {
        let seq = Sequence::with_block_size(&[1, 2, 3], 0).unwrap();
        assert_eq!(seq.block_size(), 1);
        assert_eq!(seq.n_blocks(), 3);
        assert_eq!(seq.decode().unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn test_iter_streams_blocks() {
        let values = sorted_values(513, 1 << 16);
        let seq = Sequence::with_block_size(&values, 128).unwrap();
        let collected: Vec<u64> = seq.iter().collect();
        assert_eq!(collected, values);
        assert_eq!(seq.iter().len(), 513);
        let collected: Vec<u64> = (&seq).into_iter().collect();
        assert_eq!(collected, values);
    }

    #[test]
    fn test_header_layout() {
        let values = sorted_values(10, 100);
        let seq = Sequence::with_block_size(&values, 4).unwrap();
        let bytes = seq.to_bytes();

        assert_eq!(&bytes[0..4], b"PPEF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), 1);
        assert_eq!(u64::from_le_bytes(bytes[8..16].try_into().unwrap()), 10);
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 4);
        assert_eq!(u32::from_le_bytes(bytes[20..24].try_into().unwrap()), 0);
        assert_eq!(u64::from_le_bytes(bytes[24..32].try_into().unwrap()), 3);
        assert_eq!(
            u64::from_le_bytes(bytes[32..40].try_into().unwrap()),
            40 + 16 * 3
        );
    }

    #[test]
    fn test_bytes_roundtrip() {
        let values = sorted_values(1333, 1 << 12);
        let seq = Sequence::with_block_size(&values, 256).unwrap();
        let bytes = seq.to_bytes();
        assert_eq!(bytes.len(), seq.size_bytes());

        let reloaded = Sequence::from_bytes(&bytes).unwrap();
        assert_eq!(reloaded.meta(), seq.meta());
        assert_eq!(reloaded.decode().unwrap(), values);
        // Serialization is deterministic.
        assert_eq!(reloaded.to_bytes(), bytes);
    }

    #[test]
    fn test_file_roundtrip() {
        let values = sorted_values(1333, 1 << 12);
        let seq = Sequence::with_block_size(&values, 256).unwrap();

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("_test.ppef");
        seq.save(&path).unwrap();

        let reloaded = Sequence::load(&path).unwrap();
        let meta = seq.meta();
        let meta2 = reloaded.meta();
        assert_eq!(meta2.magic, meta.magic);
        assert_eq!(meta2.version, meta.version);
        assert_eq!(meta2.n_elem, meta.n_elem);
        assert_eq!(meta2.block_size, meta.block_size);
        assert_eq!(meta2.reserved, meta.reserved);
        assert_eq!(meta2.n_blocks, meta.n_blocks);
        assert_eq!(meta2.payload_offset, meta.payload_offset);
        assert_eq!(reloaded.decode().unwrap(), values);
    }

    #[test]
    fn test_load_missing_file() {
        let err = Sequence::load("/nonexistent/_no_such.ppef").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_from_bytes_rejects_corruption() {
        let values = sorted_values(100, 1 << 10);
        let seq = Sequence::with_block_size(&values, 32).unwrap();
        let bytes = seq.to_bytes();

        // Bad magic.
        let mut bad = bytes.clone();
        bad[0] = b'X';
        assert!(Sequence::from_bytes(&bad).is_err());

        // Unsupported version.
        let mut bad = bytes.clone();
        bad[4..8].copy_from_slice(&2u32.to_le_bytes());
        assert!(Sequence::from_bytes(&bad).is_err());

        // Corrupt n_elem.
        let mut bad = bytes.clone();
        bad[8..16].copy_from_slice(&999u64.to_le_bytes());
        assert!(Sequence::from_bytes(&bad).is_err());

        // Truncated payload.
        assert!(Sequence::from_bytes(&bytes[..bytes.len() - 8]).is_err());

        // Trailing garbage.
        let mut bad = bytes.clone();
        bad.extend_from_slice(&[0u8; 8]);
        assert!(Sequence::from_bytes(&bad).is_err());

        // Short header.
        assert!(Sequence::from_bytes(&bytes[..10]).is_err());
    }

    #[test]
    fn test_debug_dump() {
        let seq = Sequence::with_block_size(&[1, 2, 3], 2).unwrap();
        let dump = format!("{seq:?}");
        assert!(dump.contains("n_elem: 3"));
        assert!(dump.contains("n_blocks: 2"));
    }
}
