//! Unsigned transaction construction

use crate::address::Address;
use crate::batcher::Batch;
use crate::client::{ChainClient, ClientError};
use crate::config::ChainConfig;
use crate::gas;
use crate::tx::{Fee, MsgInput, MsgMultiSend, MsgOutput, Tx};
use crate::types::{Coins, Sender, BASE_DENOM};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    /// Gas simulation failures propagate untouched
    #[error(transparent)]
    Client(#[from] ClientError),
}

/// Builds one unsigned multi-send transaction per batch.
pub struct TxBuilder<'a> {
    client: &'a dyn ChainClient,
    chain: &'a ChainConfig,
}

impl<'a> TxBuilder<'a> {
    pub fn new(client: &'a dyn ChainClient, chain: &'a ChainConfig) -> Self {
        Self { client, chain }
    }

    /// Materialize a batch into an unsigned transaction.
    ///
    /// `gas_wanted == 0` means "determine it": simulate when online, use the
    /// empirical model when offline. The message input carries the batch
    /// total, so input and output amounts balance by construction.
    pub async fn build_batch_tx(
        &self,
        batch: &Batch<'_>,
        sender_address: &Address,
        sender: &Sender,
        gas_wanted: u64,
        offline: bool,
    ) -> Result<Tx, BuildError> {
        let msg = multi_send_for_batch(batch, sender_address);

        let gas = if gas_wanted == 0 {
            gas::determine_gas(
                self.client,
                offline,
                &msg,
                sender,
                batch.len(),
                self.chain.gas_adjustment,
            )
            .await?
        } else {
            gas_wanted
        };

        let fee = Fee {
            gas_limit: gas,
            amount: fee_for_gas(gas, self.chain.gas_price),
        };
        Ok(Tx::unsigned(msg, fee))
    }
}

/// One multi-send message for a batch: input = sender with the batch total,
/// outputs = the batch entries verbatim.
pub fn multi_send_for_batch(batch: &Batch<'_>, sender_address: &Address) -> MsgMultiSend {
    let input = MsgInput {
        address: sender_address.clone(),
        amount: batch.total.clone(),
    };
    let outputs = batch
        .entries
        .iter()
        .map(|entry| MsgOutput {
            address: entry.address.clone(),
            amount: entry.amount.clone(),
        })
        .collect();
    MsgMultiSend::new(input, outputs)
}

/// Fee owed for a gas limit at the configured base-denomination gas price,
/// rounded up.
fn fee_for_gas(gas: u64, gas_price: f64) -> Coins {
    let amount = (gas as f64 * gas_price).ceil() as u128;
    Coins::from_amount(BASE_DENOM, amount)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::KEY_HASH_LEN;
    use crate::batcher::Batches;
    use crate::types::{TransferEntry, TransferSet};

    fn sample_set() -> TransferSet {
        let entries: Vec<TransferEntry> = (1..=5u8)
            .map(|i| TransferEntry {
                address: Address::from_key_hash("baby", &[i; KEY_HASH_LEN]),
                amount: Coins::from_amount(BASE_DENOM, i as u128 * 100),
            })
            .collect();
        let total = entries
            .iter()
            .fold(Coins::new(), |acc, e| acc.checked_add(&e.amount));
        TransferSet { entries, total }
    }

    #[test]
    fn message_input_balances_outputs() {
        let set = sample_set();
        let sender = Address::from_key_hash("baby", &[99; KEY_HASH_LEN]);
        for batch in Batches::new(&set, 2, 0).unwrap() {
            let msg = multi_send_for_batch(&batch, &sender);
            assert_eq!(msg.inputs.len(), 1);
            assert_eq!(msg.outputs.len(), batch.len());
            let out_sum = msg
                .outputs
                .iter()
                .fold(Coins::new(), |acc, o| acc.checked_add(&o.amount));
            assert_eq!(msg.inputs[0].amount, out_sum);
        }
    }

    #[test]
    fn fee_rounds_up_at_the_gas_price() {
        assert_eq!(
            fee_for_gas(476_775, 0.002),
            Coins::from_amount(BASE_DENOM, 954)
        );
        assert_eq!(fee_for_gas(1, 0.002), Coins::from_amount(BASE_DENOM, 1));
    }
}
