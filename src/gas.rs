//! Gas determination for batch transactions

use crate::client::{ChainClient, ClientError};
use crate::tx::MsgMultiSend;
use crate::types::Sender;

/// Empirical linear model of multi-send gas cost by recipient count,
/// fit from runs at different batch sizes.
const GAS_PER_RECIPIENT: f64 = 22_312.5;
const GAS_FLOOR: f64 = 375_000.0;

/// Safety margin applied on top of the model.
const GAS_SAFETY_FACTOR: f64 = 1.20;

/// Offline gas estimate for a multi-send with `recipients` outputs.
/// Pure and deterministic; used when the chain cannot be queried.
pub fn estimate_gas(recipients: usize) -> u64 {
    ((GAS_PER_RECIPIENT * recipients as f64 + GAS_FLOOR) * GAS_SAFETY_FACTOR).ceil() as u64
}

/// Determine gas for a batch message: simulate on chain when online,
/// fall back to the empirical model when offline.
///
/// Simulation failures propagate untouched; retrying is the broadcaster's
/// concern, not this layer's.
pub async fn determine_gas(
    client: &dyn ChainClient,
    offline: bool,
    msg: &MsgMultiSend,
    sender: &Sender,
    recipients: usize,
    gas_adjustment: f64,
) -> Result<u64, ClientError> {
    if offline {
        return Ok(estimate_gas(recipients));
    }
    let simulated = client
        .simulate(msg, sender.sequence, sender.account_number)
        .await?;
    Ok((simulated as f64 * gas_adjustment).ceil() as u64)
}
