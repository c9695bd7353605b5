//! Helpers for fabricating chain-valid block runs in tests.

use crate::IndexedBlock;
use bitcoin::{
    BlockHash, CompactTarget, TxMerkleNode,
    block::{Header, Version},
    hashes::Hash,
};

/// The regtest-style compact target used by fabricated headers.
pub const TEST_BITS: u32 = 0x207f_ffff;

/// Builds a header extending `prev` at the given timestamp.
pub fn header_after(prev: BlockHash, time: u32) -> Header {
    Header {
        version: Version::ONE,
        prev_blockhash: prev,
        merkle_root: TxMerkleNode::all_zeros(),
        time,
        bits: CompactTarget::from_consensus(TEST_BITS),
        nonce: 0,
    }
}

/// Fabricates a chain-valid run of `len` indexed blocks starting at
/// `start_height`, rooted at an all-zero parent hash.
pub fn header_chain(start_height: u32, len: usize) -> Vec<IndexedBlock> {
    header_chain_from(BlockHash::all_zeros(), start_height, len, 0)
}

/// Like [`header_chain`], but rooted at `parent` and salted with `salt` so
/// two runs from the same parent produce distinct branches.
pub fn header_chain_from(
    parent: BlockHash,
    start_height: u32,
    len: usize,
    salt: u32,
) -> Vec<IndexedBlock> {
    let mut blocks = Vec::with_capacity(len);
    let mut prev = parent;
    for i in 0..len {
        let header = header_after(prev, 1_600_000_000 + salt + i as u32);
        prev = header.block_hash();
        blocks.push(IndexedBlock::new(start_height + i as u32, header, Vec::new()));
    }
    blocks
}
