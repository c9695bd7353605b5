//! Ledger of blocks rolled back during an in-progress reorg.

use bitcoin::{block::Header, pow::Work};

/// Records the `(height, header)` pairs popped off the cache tip during a
/// disconnect burst.
///
/// The ledger is the engine's memory of the abandoned branch: the deepest
/// entry marks the fork point replay resumes from, and the accumulated work
/// is what any replacing branch must strictly exceed.
#[derive(Debug, Default)]
pub struct ReorgLedger {
    removed: Vec<(u32, Header)>,
}

impl ReorgLedger {
    /// Creates an empty ledger.
    pub const fn new() -> Self {
        Self { removed: Vec::new() }
    }

    /// Records a block removed from the cache tip.
    pub fn add_removed(&mut self, height: u32, header: Header) {
        self.removed.push((height, header));
    }

    /// The deepest fork point reached so far: the lowest-height block that
    /// was rolled back.
    pub fn deepest_removed(&self) -> Option<(u32, Header)> {
        self.removed.iter().min_by_key(|(height, _)| *height).copied()
    }

    /// Cumulative proof-of-work of everything rolled back.
    pub fn removed_work(&self) -> Work {
        self.removed
            .iter()
            .map(|(_, header)| header.work())
            .fold(Work::from_be_bytes([0u8; 32]), |acc, w| acc + w)
    }

    /// Number of rolled-back blocks.
    pub fn len(&self) -> usize {
        self.removed.len()
    }

    /// Whether no reorg is in progress.
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
    }

    /// Forgets the rolled-back branch.
    pub fn clear(&mut self) {
        self.removed.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayer_types::test_utils::header_chain;

    #[test]
    fn deepest_removed_is_lowest_height() {
        let blocks = header_chain(998, 3);
        let mut ledger = ReorgLedger::new();
        // disconnects arrive tip-first
        ledger.add_removed(1000, blocks[2].header);
        ledger.add_removed(999, blocks[1].header);

        let (height, header) = ledger.deepest_removed().unwrap();
        assert_eq!(height, 999);
        assert_eq!(header.block_hash(), blocks[1].block_hash());
    }

    #[test]
    fn removed_work_accumulates() {
        let blocks = header_chain(10, 2);
        let mut ledger = ReorgLedger::new();
        assert_eq!(ledger.removed_work(), Work::from_be_bytes([0u8; 32]));

        ledger.add_removed(11, blocks[1].header);
        ledger.add_removed(10, blocks[0].header);
        assert_eq!(ledger.removed_work(), blocks[0].header.work() + blocks[1].header.work());

        ledger.clear();
        assert!(ledger.is_empty());
        assert_eq!(ledger.removed_work(), Work::from_be_bytes([0u8; 32]));
    }
}
