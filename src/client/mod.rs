//! Chain gateway client
//!
//! The pipeline drives the chain through this narrow interface: account
//! queries, gas simulation, broadcast, and block-inclusion polling. The
//! production implementation speaks JSON-RPC over HTTP; tests inject a
//! scripted fake.

use crate::address::Address;
use crate::tx::MsgMultiSend;
use crate::types::{AccountInfo, TxResponse};
use async_trait::async_trait;
use std::time::Duration;

// Submodules
pub mod errors;
pub mod http;

// Re-exports for convenience
pub use errors::ClientError;
pub use http::HttpChainClient;

/// Capability interface over the chain gateway.
#[async_trait]
pub trait ChainClient: Send + Sync {
    /// Current account number and next expected sequence for an address.
    async fn account(&self, address: &Address) -> Result<AccountInfo, ClientError>;

    /// Dry-run a message against current chain state and return the gas it
    /// consumed. Requires the sender's current sequence and account number.
    async fn simulate(
        &self,
        msg: &MsgMultiSend,
        sequence: u64,
        account_number: u64,
    ) -> Result<u64, ClientError>;

    /// Submit encoded transaction bytes to the node's mempool. Broadcast
    /// transport errors are reported distinctly from on-chain rejection
    /// codes, which arrive inside the response.
    async fn broadcast(&self, tx_bytes: &[u8], timeout: Duration)
        -> Result<TxResponse, ClientError>;

    /// Poll until the transaction hash appears in a finalized block, bounded
    /// by `timeout`. Expiry yields [`ClientError::InclusionTimeout`].
    async fn wait_for_inclusion(
        &self,
        txhash: &str,
        timeout: Duration,
    ) -> Result<TxResponse, ClientError>;
}
