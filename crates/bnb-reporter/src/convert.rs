//! RLP conversions between node headers and destination records.

use crate::BnbReporterError;
use alloy_consensus::Header;
use alloy_rlp::Decodable;
use relayer_lorenzo_client::BnbHeaderRecord;

/// Decodes the raw RLP of a destination record back into a header.
pub fn header_from_record(record: &BnbHeaderRecord) -> Result<Header, BnbReporterError> {
    Header::decode(&mut record.raw_header.as_ref())
        .map_err(|e| BnbReporterError::Rlp(e.to_string()))
}

/// Encodes headers into the destination's upload format.
pub fn records_from_headers(headers: &[Header]) -> Vec<BnbHeaderRecord> {
    headers
        .iter()
        .map(|header| BnbHeaderRecord {
            number: header.number,
            hash: header.hash_slow(),
            parent_hash: header.parent_hash,
            receipt_root: header.receipts_root,
            raw_header: alloy_rlp::encode(header).into(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn record_round_trips_header() {
        let header = Header {
            number: 321,
            parent_hash: B256::repeat_byte(0x11),
            receipts_root: B256::repeat_byte(0x22),
            gas_limit: 30_000_000,
            timestamp: 1_700_000_000,
            ..Default::default()
        };

        let record = records_from_headers(std::slice::from_ref(&header)).remove(0);
        assert_eq!(record.number, 321);
        assert_eq!(record.hash, header.hash_slow());
        assert_eq!(record.parent_hash, header.parent_hash);
        assert_eq!(record.receipt_root, header.receipts_root);

        let decoded = header_from_record(&record).unwrap();
        assert_eq!(decoded.hash_slow(), header.hash_slow());
        assert_eq!(decoded.number, header.number);
        assert_eq!(decoded.parent_hash, header.parent_hash);
        assert_eq!(decoded.receipts_root, header.receipts_root);
    }

    #[test]
    fn garbage_rlp_is_surfaced() {
        let record = BnbHeaderRecord {
            number: 1,
            hash: B256::ZERO,
            parent_hash: B256::ZERO,
            receipt_root: B256::ZERO,
            raw_header: vec![0xde, 0xad, 0xbe, 0xef].into(),
        };
        assert!(matches!(header_from_record(&record), Err(BnbReporterError::Rlp(_))));
    }
}
