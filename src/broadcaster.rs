//! Transaction broadcast and block-inclusion confirmation
//!
//! One transaction at a time: encode, submit with bounded retry on transient
//! failures, then poll for block inclusion before the caller may advance.
//! Chain rejections (non-zero code) are never retried; a transaction the
//! chain refuses once it will refuse again.

use crate::client::{ChainClient, ClientError};
use crate::metrics;
use crate::tx::Tx;
use crate::types::TxResponse;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, warn};

/// Maximum submission attempts for a single transaction.
pub const MAX_ATTEMPTS: u32 = 5;

/// Bounded wait for a transaction to appear in a block.
pub const DEFAULT_INCLUSION_WAIT: Duration = Duration::from_secs(35);

/// Broadcast transport timeout per attempt.
pub const DEFAULT_BROADCAST_TIMEOUT: Duration = Duration::from_secs(35);

#[derive(Debug, Error)]
pub enum BroadcastError {
    #[error("failed to encode transaction: {0}")]
    Codec(#[from] serde_json::Error),

    /// Transient failures exhausted the retry budget
    #[error("broadcast failed after {attempts} attempts: {source}")]
    RetriesExhausted {
        attempts: u32,
        #[source]
        source: ClientError,
    },

    /// The chain rejected the transaction; resending cannot succeed
    #[error("transaction {txhash} rejected by chain with code {code}")]
    Rejected { txhash: String, code: u32 },

    /// Pre-signed flow only: the transaction never made it into a block and
    /// its baked-in sequence number forbids an automatic resend
    #[error("transaction {txhash} was not included in a block")]
    NotIncluded { txhash: String },

    /// Non-retryable client failure surfaced on first contact
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Failure of an ordered broadcast run, carrying the index to resume from.
#[derive(Debug, Error)]
#[error("transaction {index} failed: {source}")]
pub struct RunError {
    pub index: usize,
    #[source]
    pub source: BroadcastError,
}

/// Outcome of submitting and confirming one transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Confirmation {
    /// Seen in a finalized block
    Included(TxResponse),
    /// The node already had it in its mempool; success-equivalent
    AlreadyPending,
    /// Submitted, but the inclusion wait expired without a sighting
    NotIncluded { txhash: String },
}

/// Retry schedule for transient submission failures: `2^attempt` seconds,
/// attempt counting from 1.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_ATTEMPTS,
        }
    }
}

impl RetryPolicy {
    pub fn backoff(&self, attempt: u32) -> Duration {
        Duration::from_secs(1u64 << attempt)
    }
}

/// Submits signed transactions and confirms their inclusion.
pub struct Broadcaster<'a> {
    client: &'a dyn ChainClient,
    policy: RetryPolicy,
    broadcast_timeout: Duration,
    inclusion_wait: Duration,
}

impl<'a> Broadcaster<'a> {
    pub fn new(client: &'a dyn ChainClient) -> Self {
        Self {
            client,
            policy: RetryPolicy::default(),
            broadcast_timeout: DEFAULT_BROADCAST_TIMEOUT,
            inclusion_wait: DEFAULT_INCLUSION_WAIT,
        }
    }

    pub fn with_timeouts(mut self, broadcast: Duration, inclusion: Duration) -> Self {
        self.broadcast_timeout = broadcast;
        self.inclusion_wait = inclusion;
        self
    }

    /// Submit one signed transaction and wait for it to reach a block.
    ///
    /// Transient submission errors are retried with exponential backoff up
    /// to the policy's attempt budget; an "already in cache" answer from the
    /// node is success-equivalent and returns immediately.
    pub async fn broadcast_and_confirm(
        &self,
        tx: &Tx,
        index: usize,
    ) -> Result<Confirmation, BroadcastError> {
        let tx_bytes = tx.to_bytes()?;
        let txhash = tx.hash()?;
        let started = std::time::Instant::now();

        let submitted = match self.submit_with_retry(&tx_bytes, index).await? {
            Some(res) => res,
            None => {
                metrics::metrics().txs_skipped.inc();
                return Ok(Confirmation::AlreadyPending);
            }
        };
        if submitted.code != 0 {
            return Err(BroadcastError::Rejected {
                txhash: submitted.txhash,
                code: submitted.code,
            });
        }
        metrics::metrics().txs_submitted.inc();
        info!(index, txhash = %submitted.txhash, code = submitted.code, "transaction sent to mempool");

        match self
            .client
            .wait_for_inclusion(&txhash, self.inclusion_wait)
            .await
        {
            Ok(res) if res.code == 0 => {
                let m = metrics::metrics();
                m.txs_confirmed.inc();
                m.broadcast_latency.observe(started.elapsed().as_secs_f64());
                info!(index, height = res.height, gas_used = res.gas_used, "tx included in block");
                Ok(Confirmation::Included(res))
            }
            Ok(res) => {
                // executed in a block but failed; not a confirmation
                warn!(index, txhash = %txhash, code = res.code, "error in tx execution");
                Ok(Confirmation::NotIncluded { txhash })
            }
            Err(ClientError::InclusionTimeout { .. }) => Ok(Confirmation::NotIncluded { txhash }),
            Err(e) => Err(e.into()),
        }
    }

    /// Broadcast pre-signed transactions in order from `start_index`,
    /// confirming each before the next. The first failure aborts the rest
    /// and reports the failing index; non-inclusion is fatal here because
    /// the baked-in sequence numbers cannot be recomputed.
    pub async fn broadcast_all(&self, txs: &[Tx], start_index: usize) -> Result<(), RunError> {
        info!(
            tx_count = txs.len(),
            start_index, "broadcasting transactions"
        );
        for (index, tx) in txs.iter().enumerate().skip(start_index) {
            let confirmation = self
                .broadcast_and_confirm(tx, index)
                .await
                .map_err(|source| RunError { index, source })?;
            match confirmation {
                Confirmation::Included(_) => {}
                Confirmation::AlreadyPending => {
                    info!(index, "transaction already in mempool, skipping");
                }
                Confirmation::NotIncluded { txhash } => {
                    error!(index, txhash = %txhash, "transaction was not included");
                    return Err(RunError {
                        index,
                        source: BroadcastError::NotIncluded { txhash },
                    });
                }
            }
        }
        Ok(())
    }

    /// Submission attempt loop. `Ok(None)` means the node already had the
    /// transaction in its mempool.
    async fn submit_with_retry(
        &self,
        tx_bytes: &[u8],
        index: usize,
    ) -> Result<Option<TxResponse>, BroadcastError> {
        let max = self.policy.max_attempts;
        for attempt in 1..=max {
            match self.client.broadcast(tx_bytes, self.broadcast_timeout).await {
                Ok(res) => return Ok(Some(res)),
                Err(e) if e.is_already_in_cache() => {
                    info!(index, "transaction already in mempool");
                    return Ok(None);
                }
                Err(e) if e.is_retryable() && attempt < max => {
                    metrics::metrics().txs_retried.inc();
                    warn!(index, attempt, error = %e, "transaction error, retrying");
                    tokio::time::sleep(self.policy.backoff(attempt)).await;
                }
                Err(e) if e.is_retryable() => {
                    return Err(BroadcastError::RetriesExhausted {
                        attempts: max,
                        source: e,
                    });
                }
                Err(e) => return Err(e.into()),
            }
        }
        // attempt budget is at least 1, so the loop always returns
        unreachable!("retry loop exited without a result")
    }
}
