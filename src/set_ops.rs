//! Set-algebraic combinators over compressed sequences.
//!
//! Both combinators stream their inputs block by block: at any moment at
//! most one block per input is held decompressed. Intersection additionally
//! prunes at the directory level, skipping an entire block when its last
//! value is smaller than the other side's current value; because the
//! per-block last values are monotone this degenerates to a merge-join over
//! the two directories.
//!
//! Results are re-packed into a fresh [`Sequence`] that inherits the *left*
//! operand's block size, keeping repeated application stable under one
//! partitioning choice.

use crate::error::Result;
use crate::sequence::Sequence;

/// Streaming read position over a sequence; decodes one block at a time,
/// on demand.
struct BlockCursor<'a> {
    seq: &'a Sequence,
    block: usize,
    decoded: Vec<u64>,
    loaded: bool,
    pos: usize,
}

impl<'a> BlockCursor<'a> {
    fn new(seq: &'a Sequence) -> Self {
        Self {
            seq,
            block: 0,
            decoded: Vec::new(),
            loaded: false,
            pos: 0,
        }
    }

    /// Last value of the current block, from the directory alone.
    fn block_last(&self) -> Option<u64> {
        self.seq.block_last(self.block)
    }

    /// Current value, decoding the current block if needed.
    fn current(&mut self) -> Result<Option<u64>> {
        if self.block as u64 >= self.seq.n_blocks() {
            return Ok(None);
        }
        if !self.loaded {
            self.decoded = self.seq.block(self.block)?.decode();
            self.loaded = true;
            self.pos = 0;
        }
        Ok(Some(self.decoded[self.pos]))
    }

    /// Step past the current value.
    fn advance(&mut self) {
        self.pos += 1;
        if self.pos == self.decoded.len() {
            self.skip_block();
        }
    }

    /// Jump to the start of the next block without decoding the rest of
    /// the current one.
    fn skip_block(&mut self) {
        self.block += 1;
        self.loaded = false;
        self.pos = 0;
    }
}

impl Sequence {
    /// Intersect two sequences, preserving multiplicity: a value occurring
    /// `j` times in `self` and `k` times in `other` occurs `min(j, k)`
    /// times in the result.
    ///
    /// The result uses `self`'s block size.
    pub fn intersect(&self, other: &Sequence) -> Result<Sequence> {
        let mut a = BlockCursor::new(self);
        let mut b = BlockCursor::new(other);
        let mut out = Vec::new();

        loop {
            // Directory-level pruning: drop whole blocks that end before
            // the other side's current value.
            loop {
                match (a.block_last(), b.current()?) {
                    (Some(last), Some(cur)) if last < cur => a.skip_block(),
                    _ => break,
                }
            }
            loop {
                match (b.block_last(), a.current()?) {
                    (Some(last), Some(cur)) if last < cur => b.skip_block(),
                    _ => break,
                }
            }

            match (a.current()?, b.current()?) {
                (Some(x), Some(y)) => {
                    if x < y {
                        a.advance();
                    } else if y < x {
                        b.advance();
                    } else {
                        out.push(x);
                        a.advance();
                        b.advance();
                    }
                }
                _ => break,
            }
        }

        Sequence::with_block_size(&out, self.block_size())
    }

    /// Merge two sequences into their deduplicated union.
    ///
    /// The result uses `self`'s block size.
    pub fn union(&self, other: &Sequence) -> Result<Sequence> {
        let mut a = BlockCursor::new(self);
        let mut b = BlockCursor::new(other);
        let mut out: Vec<u64> = Vec::new();

        let mut push = |out: &mut Vec<u64>, v: u64| {
            if out.last() != Some(&v) {
                out.push(v);
            }
        };

        loop {
            match (a.current()?, b.current()?) {
                (Some(x), Some(y)) => {
                    if x <= y {
                        push(&mut out, x);
                        a.advance();
                    } else {
                        push(&mut out, y);
                        b.advance();
                    }
                }
                (Some(x), None) => {
                    push(&mut out, x);
                    a.advance();
                }
                (None, Some(y)) => {
                    push(&mut out, y);
                    b.advance();
                }
                (None, None) => break,
            }
        }

        Sequence::with_block_size(&out, self.block_size())
    }
}
