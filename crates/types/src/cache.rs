//! Bounded, ordered cache of recent source blocks.

use crate::IndexedBlock;
use std::collections::VecDeque;
use thiserror::Error;

/// Errors produced by [`BtcCache`] operations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CacheError {
    /// The cache capacity must be non-zero.
    #[error("cache capacity must be positive")]
    ZeroCapacity,
    /// The cache is empty.
    #[error("cache is empty")]
    Empty,
    /// More blocks were supplied than the cache may hold.
    #[error("{got} blocks exceed the cache capacity of {max}")]
    TooManyBlocks {
        /// Number of blocks supplied.
        got: usize,
        /// Configured capacity.
        max: u64,
    },
    /// A block does not directly follow the block before it.
    #[error("block at height {got} does not extend the chain tip at height {tip}")]
    NonContiguous {
        /// Height of the offending block.
        got: u32,
        /// Height of the current tip.
        tip: u32,
    },
    /// A block's `prev_blockhash` does not match its predecessor's hash.
    #[error("block at height {height} does not reference its parent by hash")]
    BrokenChain {
        /// Height of the offending block.
        height: u32,
    },
    /// A requested height lies outside the cached range.
    #[error("height {height} is outside the cached range [{first}, {tip}]")]
    OutOfRange {
        /// Requested height.
        height: u32,
        /// First cached height.
        first: u32,
        /// Tip height.
        tip: u32,
    },
}

/// A rolling window over the canonical chain as the PoW engine currently sees
/// it.
///
/// Entries are strictly increasing by height and chained by `prev_blockhash`;
/// the cache never holds forks. `max_entries` is a soft bound: [`BtcCache::add`]
/// evicts the oldest entry once the bound is reached, and [`BtcCache::trim`]
/// re-establishes the bound after a [`BtcCache::resize`].
#[derive(Debug, Clone)]
pub struct BtcCache {
    blocks: VecDeque<IndexedBlock>,
    max_entries: u64,
}

impl BtcCache {
    /// Creates an empty cache holding at most `max_entries` blocks.
    pub fn new(max_entries: u64) -> Result<Self, CacheError> {
        if max_entries == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        Ok(Self { blocks: VecDeque::new(), max_entries })
    }

    /// Replaces the cache contents with `blocks`.
    ///
    /// The run must be non-empty, strictly increasing by one, chain-valid,
    /// and no longer than the configured capacity.
    pub fn init(&mut self, blocks: Vec<IndexedBlock>) -> Result<(), CacheError> {
        if blocks.is_empty() {
            return Err(CacheError::Empty);
        }
        if blocks.len() as u64 > self.max_entries {
            return Err(CacheError::TooManyBlocks { got: blocks.len(), max: self.max_entries });
        }
        for pair in blocks.windows(2) {
            if pair[1].height != pair[0].height + 1 {
                return Err(CacheError::NonContiguous { got: pair[1].height, tip: pair[0].height });
            }
            if pair[1].header.prev_blockhash != pair[0].block_hash() {
                return Err(CacheError::BrokenChain { height: pair[1].height });
            }
        }
        self.blocks = blocks.into();
        Ok(())
    }

    /// Appends a block to the tip, evicting the oldest entry if the cache is
    /// full.
    pub fn add(&mut self, block: IndexedBlock) -> Result<(), CacheError> {
        if let Some(tip) = self.tip() {
            if block.height != tip.height + 1 {
                return Err(CacheError::NonContiguous { got: block.height, tip: tip.height });
            }
            if block.header.prev_blockhash != tip.block_hash() {
                return Err(CacheError::BrokenChain { height: block.height });
            }
        }
        if self.blocks.len() as u64 >= self.max_entries {
            self.blocks.pop_front();
        }
        self.blocks.push_back(block);
        Ok(())
    }

    /// Drops the tip block.
    pub fn remove_last(&mut self) -> Result<(), CacheError> {
        self.blocks.pop_back().map(|_| ()).ok_or(CacheError::Empty)
    }

    /// Returns the oldest cached block.
    pub fn first(&self) -> Option<&IndexedBlock> {
        self.blocks.front()
    }

    /// Returns the newest cached block.
    pub fn tip(&self) -> Option<&IndexedBlock> {
        self.blocks.back()
    }

    /// Number of cached blocks.
    pub fn size(&self) -> usize {
        self.blocks.len()
    }

    /// Whether the cache holds no blocks.
    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Looks up the cached block at `height` in O(1).
    pub fn find_block(&self, height: u32) -> Option<&IndexedBlock> {
        let first = self.first()?.height;
        if height < first {
            return None;
        }
        self.blocks.get((height - first) as usize)
    }

    /// Returns a copy of the contiguous run from `from_height` through the
    /// tip.
    ///
    /// `from_height == tip + 1` yields an empty run; anything below the first
    /// cached height or above that is an error.
    pub fn get_last_blocks(&self, from_height: u32) -> Result<Vec<IndexedBlock>, CacheError> {
        let (first, tip) = match (self.first(), self.tip()) {
            (Some(f), Some(t)) => (f.height, t.height),
            _ => return Err(CacheError::Empty),
        };
        if from_height < first || from_height > tip + 1 {
            return Err(CacheError::OutOfRange { height: from_height, first, tip });
        }
        let skip = (from_height - first) as usize;
        Ok(self.blocks.iter().skip(skip).cloned().collect())
    }

    /// Changes the capacity bound. Does not drop entries; call
    /// [`BtcCache::trim`] to re-establish the bound.
    pub fn resize(&mut self, max_entries: u64) -> Result<(), CacheError> {
        if max_entries == 0 {
            return Err(CacheError::ZeroCapacity);
        }
        self.max_entries = max_entries;
        Ok(())
    }

    /// Removes oldest entries until the cache fits its capacity bound.
    pub fn trim(&mut self) {
        while self.blocks.len() as u64 > self.max_entries {
            self.blocks.pop_front();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::header_chain;

    #[test]
    fn init_rejects_broken_chain() {
        let mut cache = BtcCache::new(100).unwrap();
        let mut blocks = header_chain(10, 5);
        // sever the link between the 3rd and 4th block
        blocks[3].header.prev_blockhash = blocks[1].block_hash();
        assert_eq!(cache.init(blocks), Err(CacheError::BrokenChain { height: 13 }));
    }

    #[test]
    fn init_rejects_oversized_run() {
        let mut cache = BtcCache::new(3).unwrap();
        let blocks = header_chain(0, 4);
        assert_eq!(cache.init(blocks), Err(CacheError::TooManyBlocks { got: 4, max: 3 }));
    }

    #[test]
    fn add_and_remove_maintain_chain() {
        let mut cache = BtcCache::new(10).unwrap();
        let blocks = header_chain(100, 4);
        cache.init(blocks[..3].to_vec()).unwrap();

        cache.add(blocks[3].clone()).unwrap();
        assert_eq!(cache.tip().unwrap().height, 103);

        // a block that skips a height is rejected
        let stray = header_chain(200, 1).pop().unwrap();
        assert!(matches!(cache.add(stray), Err(CacheError::NonContiguous { .. })));

        cache.remove_last().unwrap();
        assert_eq!(cache.tip().unwrap().height, 102);
    }

    #[test]
    fn add_evicts_front_when_full() {
        let mut cache = BtcCache::new(3).unwrap();
        let blocks = header_chain(50, 4);
        cache.init(blocks[..3].to_vec()).unwrap();
        cache.add(blocks[3].clone()).unwrap();
        assert_eq!(cache.size(), 3);
        assert_eq!(cache.first().unwrap().height, 51);
        assert_eq!(cache.tip().unwrap().height, 53);
    }

    #[test]
    fn find_block_is_height_indexed() {
        let mut cache = BtcCache::new(100).unwrap();
        let blocks = header_chain(500, 8);
        cache.init(blocks.clone()).unwrap();

        assert_eq!(cache.find_block(503).unwrap().block_hash(), blocks[3].block_hash());
        assert!(cache.find_block(499).is_none());
        assert!(cache.find_block(508).is_none());
    }

    #[test]
    fn get_last_blocks_round_trips_init() {
        let mut cache = BtcCache::new(100).unwrap();
        let blocks = header_chain(42, 6);
        cache.init(blocks.clone()).unwrap();

        assert_eq!(cache.get_last_blocks(42).unwrap(), blocks);
        assert_eq!(cache.get_last_blocks(46).unwrap(), blocks[4..].to_vec());
        assert_eq!(cache.get_last_blocks(48).unwrap(), Vec::new());
        assert!(matches!(cache.get_last_blocks(41), Err(CacheError::OutOfRange { .. })));
        assert!(matches!(cache.get_last_blocks(49), Err(CacheError::OutOfRange { .. })));
    }

    #[test]
    fn resize_and_trim_drop_oldest() {
        let mut cache = BtcCache::new(100).unwrap();
        cache.init(header_chain(0, 10)).unwrap();

        cache.resize(4).unwrap();
        assert_eq!(cache.size(), 10);
        cache.trim();
        assert_eq!(cache.size(), 4);
        assert_eq!(cache.first().unwrap().height, 6);
        assert_eq!(cache.tip().unwrap().height, 9);

        assert_eq!(cache.resize(0), Err(CacheError::ZeroCapacity));
    }
}
