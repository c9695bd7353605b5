//! Indexed source blocks and the block events produced by the BTC notifier.

use bitcoin::{BlockHash, Transaction, block::Header};

/// A Bitcoin block together with the height it occupies on the chain the
/// relayer is tracking.
///
/// Identity is the header hash: two [`IndexedBlock`]s are equal iff their
/// headers hash to the same value, regardless of the transactions carried.
#[derive(Debug, Clone)]
pub struct IndexedBlock {
    /// Height of the block on the source chain.
    pub height: u32,
    /// The 80-byte consensus header.
    pub header: Header,
    /// Transactions of the block, in block order.
    pub txs: Vec<Transaction>,
}

impl IndexedBlock {
    /// Creates a new [`IndexedBlock`].
    pub const fn new(height: u32, header: Header, txs: Vec<Transaction>) -> Self {
        Self { height, header, txs }
    }

    /// Returns the block hash, derived from the header.
    pub fn block_hash(&self) -> BlockHash {
        self.header.block_hash()
    }
}

impl PartialEq for IndexedBlock {
    fn eq(&self, other: &Self) -> bool {
        self.block_hash() == other.block_hash()
    }
}

impl Eq for IndexedBlock {}

/// Whether a block was attached to or detached from the source node's best
/// chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockEventKind {
    /// The block was connected to the best chain.
    Connected,
    /// The block was disconnected from the best chain.
    Disconnected,
}

/// A connect/disconnect notification observed on the source node.
///
/// Events are delivered over a bounded channel in the order the notifier
/// observed them; during a reorg, disconnects for the abandoned branch arrive
/// tip-first, followed by connects for the replacing branch in ascending
/// order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEvent {
    /// The kind of event.
    pub kind: BlockEventKind,
    /// Height of the affected block.
    pub height: u32,
    /// Header of the affected block.
    pub header: Header,
}

impl BlockEvent {
    /// Creates a new [`BlockEvent`].
    pub const fn new(kind: BlockEventKind, height: u32, header: Header) -> Self {
        Self { kind, height, header }
    }

    /// Shorthand for a connect event.
    pub const fn connected(height: u32, header: Header) -> Self {
        Self::new(BlockEventKind::Connected, height, header)
    }

    /// Shorthand for a disconnect event.
    pub const fn disconnected(height: u32, header: Header) -> Self {
        Self::new(BlockEventKind::Disconnected, height, header)
    }
}
