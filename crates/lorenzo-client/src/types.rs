//! Wire records of the Lorenzo light-client surface.

use alloy_primitives::{B256, Bytes};
use bitcoin::{BlockHash, consensus::encode};
use relayer_types::IndexedBlock;
use serde::{Deserialize, Serialize};

/// Height and hash of a block known to the BTC light client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BtcChainInfo {
    /// Height of the block.
    pub height: u32,
    /// Hash of the block.
    pub hash: BlockHash,
}

/// Result of a header submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxResponse {
    /// Destination response code; zero is success.
    pub code: u32,
    /// Hash of the transaction that carried the submission.
    #[serde(default)]
    pub tx_hash: Option<String>,
}

/// A batch of consensus-encoded BTC headers addressed by a signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgInsertHeaders {
    /// The submitting signer identity.
    pub signer: String,
    /// 80-byte consensus-encoded headers, in chain order.
    pub headers: Vec<Bytes>,
}

impl MsgInsertHeaders {
    /// Packages the headers of `blocks` into an insert message.
    pub fn new(signer: &str, blocks: &[IndexedBlock]) -> Self {
        Self {
            signer: signer.to_owned(),
            headers: blocks.iter().map(|b| encode::serialize(&b.header).into()).collect(),
        }
    }
}

/// A BNB header in the destination's upload format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BnbHeaderRecord {
    /// Block number.
    pub number: u64,
    /// Keccak hash of the RLP-encoded header.
    pub hash: B256,
    /// Hash of the parent header.
    pub parent_hash: B256,
    /// Receipt trie root carried by the header.
    pub receipt_root: B256,
    /// The canonical RLP encoding of the header.
    pub raw_header: Bytes,
}

/// A batch of BNB header records addressed by a signer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MsgUploadHeaders {
    /// The submitting signer identity.
    pub signer: String,
    /// Header records, in chain order.
    pub headers: Vec<BnbHeaderRecord>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use relayer_types::test_utils::header_chain;

    #[test]
    fn insert_msg_carries_consensus_headers() {
        let blocks = header_chain(10, 3);
        let msg = MsgInsertHeaders::new("lrz1signer", &blocks);

        assert_eq!(msg.signer, "lrz1signer");
        assert_eq!(msg.headers.len(), 3);
        for (bytes, block) in msg.headers.iter().zip(&blocks) {
            assert_eq!(bytes.len(), 80);
            let decoded: bitcoin::block::Header = encode::deserialize(bytes).unwrap();
            assert_eq!(decoded.block_hash(), block.block_hash());
        }
    }

    #[test]
    fn chain_info_round_trips_json() {
        let blocks = header_chain(7, 1);
        let info = BtcChainInfo { height: 7, hash: blocks[0].block_hash() };
        let json = serde_json::to_string(&info).unwrap();
        let back: BtcChainInfo = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
