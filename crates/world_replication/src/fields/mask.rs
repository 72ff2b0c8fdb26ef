//! Bit mask in the exact shape it is written on the wire: a count of 32-bit
//! blocks followed by the blocks themselves.

/// Fixed-length bit set backed by 32-bit blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct UpdateMask {
    len: usize,
    blocks: Vec<u32>,
}

impl UpdateMask {
    /// Creates a mask able to hold `len` bits, all unset.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            blocks: vec![0; Self::blocks_for(len)],
        }
    }

    /// Rebuilds a mask from wire blocks.
    pub fn from_blocks(blocks: Vec<u32>) -> Self {
        Self {
            len: blocks.len() * 32,
            blocks,
        }
    }

    pub fn blocks_for(len: usize) -> usize {
        len.div_ceil(32)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn set(&mut self, index: usize) {
        if index < self.len {
            self.blocks[index / 32] |= 1 << (index % 32);
        }
    }

    pub fn unset(&mut self, index: usize) {
        if index < self.len {
            self.blocks[index / 32] &= !(1 << (index % 32));
        }
    }

    pub fn get(&self, index: usize) -> bool {
        index < self.len && self.blocks[index / 32] & (1 << (index % 32)) != 0
    }

    /// True when no bit is set.
    pub fn is_empty(&self) -> bool {
        self.blocks.iter().all(|&block| block == 0)
    }

    pub fn clear(&mut self) {
        self.blocks.iter_mut().for_each(|block| *block = 0);
    }

    pub fn blocks(&self) -> &[u32] {
        &self.blocks
    }

    /// Number of blocks up to and including the last non-zero one.
    ///
    /// Trailing zero blocks are never written.
    pub fn used_blocks(&self) -> usize {
        self.blocks
            .iter()
            .rposition(|&block| block != 0)
            .map_or(0, |last| last + 1)
    }

    pub fn count_ones(&self) -> usize {
        self.blocks.iter().map(|block| block.count_ones() as usize).sum()
    }

    /// Sets every bit that is set in `other`.
    pub fn union_with(&mut self, other: &UpdateMask) {
        for (block, other) in self.blocks.iter_mut().zip(other.blocks.iter()) {
            *block |= *other;
        }
    }

    /// Keeps only the bits that are also set in `other`.
    pub fn intersect_with(&mut self, other: &UpdateMask) {
        for (index, block) in self.blocks.iter_mut().enumerate() {
            *block &= other.blocks.get(index).copied().unwrap_or(0);
        }
    }

    /// Indices of set bits in ascending order.
    pub fn iter_set(&self) -> impl Iterator<Item = usize> + '_ {
        self.blocks.iter().enumerate().flat_map(|(block_index, &block)| {
            (0..32)
                .filter(move |bit| block & (1 << bit) != 0)
                .map(move |bit| block_index * 32 + bit)
        })
    }
}
