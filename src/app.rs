//! End-to-end payout orchestration
//!
//! Composes loader, batcher, builder, signer and broadcaster into either a
//! single online pass (`start`) or the staged build/sign/broadcast flows
//! operating on persisted transaction files.

use crate::address::Address;
use crate::batcher::Batches;
use crate::broadcaster::{Broadcaster, Confirmation};
use crate::builder::TxBuilder;
use crate::client::ChainClient;
use crate::config::Config;
use crate::keyring::Keyring;
use crate::loader;
use crate::metrics;
use crate::signer::{self, SignError};
use crate::tx::Tx;
use crate::types::{Sender, TransferSet};
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Per-run options shared by the pipeline flows, populated from CLI flags.
#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Signer key name, or a literal sender address where signing is not
    /// required. Empty means the configured default key.
    pub from: String,
    pub batch_size: usize,
    pub start_index: usize,
    pub validate_only: bool,
    /// Explicit sequence/account number for offline operation
    pub sequence: u64,
    pub account_number: u64,
    pub offline: bool,
    /// Fixed gas limit; 0 means "determine it"
    pub gas: u64,
}

pub struct App {
    client: Arc<dyn ChainClient>,
    keyring: Keyring,
    config: Config,
}

impl App {
    pub fn new(config: Config, client: Arc<dyn ChainClient>, keyring: Keyring) -> Self {
        Self {
            client,
            keyring,
            config,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Online single pass: per batch, build against a freshly queried
    /// sequence, sign, submit, and poll inclusion; a batch that misses its
    /// inclusion window is rebuilt and resent, bounded by
    /// `chain.max_resends`. One batch is fully confirmed before the next is
    /// sent.
    pub async fn start(&self, file: &Path, opts: &RunOptions) -> Result<()> {
        let key_name = self.signer_key(opts);
        let sender_address = self
            .keyring
            .address(&key_name)
            .with_context(|| format!("failed to resolve signer key '{key_name}'"))?;

        let set = self.load(file)?;
        if opts.validate_only {
            return Ok(());
        }

        let builder = TxBuilder::new(self.client.as_ref(), &self.config.chain);
        let broadcaster = self.broadcaster();
        let max_resends = self.config.chain.max_resends;

        for batch in Batches::new(&set, opts.batch_size, opts.start_index)? {
            info!(
                start_index = batch.start,
                end_index = batch.end(),
                start_address = %batch.entries[0].address,
                end_address = %batch.entries[batch.len() - 1].address,
                batch_total = %batch.total,
                "sending multi-send batch"
            );

            let mut confirmed = false;
            for resend in 0..=max_resends {
                if resend > 0 {
                    metrics::metrics().txs_resent.inc();
                    warn!(
                        start_index = batch.start,
                        resend, "transaction was not included, resending"
                    );
                }

                // fresh sequence per attempt: a resent batch must not
                // collide with whatever consumed the previous number
                let account = self
                    .client
                    .account(&sender_address)
                    .await
                    .context("failed to query sender account")?;
                let sender = Sender::new(&key_name, account.sequence, account.account_number);

                let tx = builder
                    .build_batch_tx(&batch, &sender_address, &sender, opts.gas, false)
                    .await?;
                metrics::metrics().batches_built.inc();
                let signed = signer::sign_tx(
                    &self.keyring,
                    &self.config.chain.chain_id,
                    &sender,
                    &tx,
                    batch.start,
                    sender.sequence,
                )?;

                match broadcaster
                    .broadcast_and_confirm(&signed, batch.start)
                    .await
                    .with_context(|| {
                        format!("batch starting at index {} failed", batch.start)
                    })? {
                    Confirmation::Included(_) | Confirmation::AlreadyPending => {
                        confirmed = true;
                        break;
                    }
                    Confirmation::NotIncluded { .. } => continue,
                }
            }

            if !confirmed {
                bail!(
                    "batch starting at index {} was not included after {} resends; \
                     rerun with --start-index {} once the network recovers",
                    batch.start,
                    max_resends,
                    batch.start
                );
            }
        }

        info!("transfer completed successfully");
        Ok(())
    }

    /// Build one unsigned transaction per batch. Returns `None` when the run
    /// is validate-only. Gas 0 simulates online or falls back to the
    /// empirical model offline.
    pub async fn build_txs(&self, file: &Path, opts: &RunOptions) -> Result<Option<Vec<Tx>>> {
        let key_name = self.signer_key(opts);
        let sender_address = self.resolve_address(&key_name)?;

        let set = self.load(file)?;
        if opts.validate_only {
            return Ok(None);
        }

        if opts.offline {
            info!("building unsigned txs in offline mode");
        } else {
            info!("building unsigned txs");
        }

        let builder = TxBuilder::new(self.client.as_ref(), &self.config.chain);
        let sender = Sender::new(&key_name, opts.sequence, opts.account_number);

        let mut txs = Vec::new();
        for batch in Batches::new(&set, opts.batch_size, opts.start_index)? {
            let tx = builder
                .build_batch_tx(&batch, &sender_address, &sender, opts.gas, opts.offline)
                .await
                .with_context(|| format!("failed to build batch starting at {}", batch.start))?;
            metrics::metrics().batches_built.inc();
            txs.push(tx);
        }
        Ok(Some(txs))
    }

    /// Sign persisted unsigned transactions with sequential sequence numbers
    /// from the explicit base. Offline only.
    pub fn sign_txs(&self, txs: &[Tx], opts: &RunOptions) -> Result<Vec<Tx>, SignError> {
        let sender = Sender::new(self.signer_key(opts), opts.sequence, opts.account_number);
        signer::sign_all(
            &self.keyring,
            &self.config.chain.chain_id,
            &sender,
            txs,
            opts.start_index,
            opts.offline,
        )
    }

    /// Broadcast persisted signed transactions in order, confirming each
    /// before advancing. No resends: their sequence numbers are baked in.
    pub async fn broadcast_txs(&self, txs: &[Tx], start_index: usize) -> Result<()> {
        self.broadcaster()
            .broadcast_all(txs, start_index)
            .await
            .context("broadcast aborted; rerun with --start-index set past the last confirmed tx")
    }

    /// Load and validate the transfer file; logs the grand total and entry
    /// count for validate-only auditing.
    pub fn load(&self, file: &Path) -> Result<TransferSet> {
        info!(file = %file.display(), "loading and validating the transfer data");
        let set = loader::load_transfer_file(file)?;
        info!(
            total = %set.total,
            entries = set.len(),
            "transfer data stateless checks passed"
        );
        Ok(set)
    }

    fn broadcaster(&self) -> Broadcaster<'_> {
        Broadcaster::new(self.client.as_ref()).with_timeouts(
            Duration::from_secs(self.config.rpc.broadcast_timeout_secs),
            Duration::from_secs(self.config.rpc.inclusion_timeout_secs),
        )
    }

    fn signer_key(&self, opts: &RunOptions) -> String {
        if opts.from.is_empty() {
            self.config.chain.key.clone()
        } else {
            opts.from.clone()
        }
    }

    /// Accept either a literal account address or a key name.
    fn resolve_address(&self, from: &str) -> Result<Address> {
        let prefix = format!("{}1", self.config.chain.account_prefix);
        if from.starts_with(&prefix) {
            return from
                .parse()
                .with_context(|| format!("invalid sender address '{from}'"));
        }
        self.keyring
            .address(from)
            .with_context(|| format!("failed to resolve signer key '{from}'"))
    }
}
