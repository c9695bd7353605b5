//! Header submission: contains-prefiltering, chunked message building, and
//! retried inserts.

use crate::{BtcClient, LorenzoBtcClient, Metrics, Reporter, ReporterError};
use bitcoin::pow::Work;
use relayer_lorenzo_client::MsgInsertHeaders;
use relayer_types::{IndexedBlock, retry};
use std::time::Instant;
use tracing::{debug, info};

/// Splits `items` into chunks of at most `chunk_size`, preserving order.
pub(crate) fn chunk_by<T: Clone>(items: &[T], chunk_size: usize) -> Vec<Vec<T>> {
    items.chunks(chunk_size.max(1)).map(<[T]>::to_vec).collect()
}

/// Cumulative proof-of-work over a contiguous run of blocks.
pub(crate) fn calculate_branch_work(branch: &[IndexedBlock]) -> Work {
    branch.iter().map(|b| b.header.work()).fold(Work::from_be_bytes([0u8; 32]), |acc, w| acc + w)
}

impl<B, L> Reporter<B, L>
where
    B: BtcClient,
    L: LorenzoBtcClient,
{
    /// Finds the suffix of `ibs` unknown to the destination and splits it
    /// into submission-sized chunks. An empty result means everything is
    /// already known.
    async fn chunks_to_submit(
        &self,
        ibs: &[IndexedBlock],
    ) -> Result<Vec<Vec<IndexedBlock>>, ReporterError> {
        let mut start_point = None;
        for (i, ib) in ibs.iter().enumerate() {
            let hash = ib.block_hash();
            let contains = retry::with_backoff(self.retry_sleep, self.max_retry_sleep, || {
                self.lorenzo_client.contains_btc_block(hash)
            })
            .await?;
            if !contains {
                start_point = Some(i);
                break;
            }
        }

        let Some(start) = start_point else {
            info!(target: "reporter", "All headers are duplicated, no need to submit");
            return Ok(Vec::new());
        };

        Ok(chunk_by(&ibs[start..], self.cfg.max_headers_in_msg as usize))
    }

    /// Submits one chunk of headers, retrying transient failures.
    async fn submit_header_chunk(
        &self,
        signer: &str,
        chunk: &[IndexedBlock],
    ) -> Result<(), ReporterError> {
        let msg = MsgInsertHeaders::new(signer, chunk);
        let result = retry::with_backoff(self.retry_sleep, self.max_retry_sleep, || {
            self.lorenzo_client.insert_btc_headers(msg.clone())
        })
        .await;

        match result {
            Ok(res) => {
                info!(
                    target: "reporter",
                    count = chunk.len(),
                    code = res.code,
                    "Successfully submitted headers to Lorenzo"
                );
                Metrics::record_submitted(chunk.len() as u64, chunk.iter().map(IndexedBlock::block_hash));
                Ok(())
            }
            Err(err) => {
                Metrics::record_failed(chunk.len() as u64);
                Err(err.into())
            }
        }
    }

    /// Extracts and reports the headers of `ibs` that the destination does
    /// not know yet. Returns the number of headers submitted.
    pub async fn process_headers(
        &self,
        signer: &str,
        ibs: &[IndexedBlock],
    ) -> Result<usize, ReporterError> {
        let Some((first, last)) = ibs.first().zip(ibs.last()) else {
            return Ok(0);
        };
        let (from, to) = (first.height, last.height);
        let started = Instant::now();

        let chunks = self.chunks_to_submit(ibs).await?;
        if chunks.is_empty() {
            debug!(target: "reporter", "No new headers to submit");
            return Ok(0);
        }

        let mut submitted = 0;
        for chunk in &chunks {
            self.submit_header_chunk(signer, chunk).await?;
            submitted += chunk.len();
        }

        info!(
            target: "reporter",
            from,
            to,
            submitted,
            elapsed = ?started.elapsed(),
            "Processed headers"
        );
        Ok(submitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        client::{MockBtcClient, MockLorenzoBtcClient},
        reporter::test_support::test_reporter,
    };
    use relayer_lorenzo_client::TxResponse;
    use relayer_types::test_utils::header_chain;

    #[test]
    fn chunk_by_preserves_order_and_bounds() {
        let items: Vec<u32> = (0..250).collect();
        let chunks = chunk_by(&items, 100);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 100);
        assert_eq!(chunks[1].len(), 100);
        assert_eq!(chunks[2].len(), 50);
        assert_eq!(chunks.concat(), items);
    }

    #[test]
    fn branch_work_sums_header_work() {
        let blocks = header_chain(0, 3);
        let expected =
            blocks[0].header.work() + blocks[1].header.work() + blocks[2].header.work();
        assert_eq!(calculate_branch_work(&blocks), expected);
    }

    #[tokio::test]
    async fn known_headers_cause_zero_insert_calls() {
        let blocks = header_chain(100, 5);
        let mut lorenzo = MockLorenzoBtcClient::new();
        lorenzo.expect_contains_btc_block().times(5).returning(|_| Ok(true));
        lorenzo.expect_insert_btc_headers().times(0);

        let reporter = test_reporter(MockBtcClient::new(), lorenzo);
        let submitted = reporter.process_headers("lrz1signer", &blocks).await.unwrap();
        assert_eq!(submitted, 0);
    }

    #[tokio::test]
    async fn submits_from_first_unknown_header() {
        let blocks = header_chain(100, 5);
        let known: Vec<_> = blocks[..2].iter().map(IndexedBlock::block_hash).collect();
        let mut lorenzo = MockLorenzoBtcClient::new();
        lorenzo
            .expect_contains_btc_block()
            .times(3)
            .returning(move |hash| Ok(known.contains(&hash)));
        lorenzo
            .expect_insert_btc_headers()
            .withf(|msg| msg.headers.len() == 3)
            .times(1)
            .returning(|_| Ok(TxResponse { code: 0, tx_hash: None }));

        let reporter = test_reporter(MockBtcClient::new(), lorenzo);
        let submitted = reporter.process_headers("lrz1signer", &blocks).await.unwrap();
        assert_eq!(submitted, 3);
    }
}
