//! Common types used throughout the application

use crate::address::Address;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Canonical micro-denomination of the payout token.
/// 1 display unit ("baby") == 1_000_000 base units.
pub const BASE_DENOM: &str = "ubaby";

/// Number of base units per display unit.
pub const BASE_UNITS_PER_DISPLAY: u128 = 1_000_000;

/// Multi-denomination money value.
///
/// Amounts are non-negative integers keyed by denomination symbol. The map is
/// ordered so that encoding and display are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Coins(BTreeMap<String, u128>);

impl Coins {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    /// Single-denomination constructor. A zero amount yields empty coins.
    pub fn from_amount(denom: &str, amount: u128) -> Self {
        let mut coins = Self::new();
        coins.add(denom, amount);
        coins
    }

    /// Add `amount` of `denom` to this value. Zero amounts are dropped so
    /// that equality and display stay canonical.
    pub fn add(&mut self, denom: &str, amount: u128) {
        if amount == 0 {
            return;
        }
        *self.0.entry(denom.to_string()).or_insert(0) += amount;
    }

    /// Per-denomination sum of `self` and `other`.
    pub fn checked_add(&self, other: &Coins) -> Coins {
        let mut sum = self.clone();
        for (denom, amount) in &other.0 {
            sum.add(denom, *amount);
        }
        sum
    }

    pub fn amount_of(&self, denom: &str) -> u128 {
        self.0.get(denom).copied().unwrap_or(0)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Coins {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            return write!(f, "0");
        }
        let mut first = true;
        for (denom, amount) in &self.0 {
            if !first {
                write!(f, ",")?;
            }
            write!(f, "{amount}{denom}")?;
            first = false;
        }
        Ok(())
    }
}

/// One recipient's total payout. Created by the loader, immutable thereafter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferEntry {
    pub address: Address,
    pub amount: Coins,
}

/// Validated, address-sorted transfer list plus its grand total.
///
/// Entries are sorted by raw address string ascending, so re-running the
/// loader on unchanged input reproduces identical batch boundaries across
/// process restarts. Downstream stages reference entries positionally.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferSet {
    pub entries: Vec<TransferEntry>,
    pub total: Coins,
}

impl TransferSet {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Signing identity for a run.
///
/// `sequence` is the replay-protection nonce of the next transaction this
/// sender will sign; it is threaded by value through the signer and advanced
/// by exactly one per signed transaction, in batch order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Sender {
    pub key_name: String,
    pub sequence: u64,
    pub account_number: u64,
}

impl Sender {
    pub fn new(key_name: impl Into<String>, sequence: u64, account_number: u64) -> Self {
        Self {
            key_name: key_name.into(),
            sequence,
            account_number,
        }
    }
}

/// Account state as reported by the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_number: u64,
    pub sequence: u64,
}

/// Result of a broadcast or inclusion query. `code == 0` is the only success.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    pub txhash: String,
    pub code: u32,
    #[serde(default)]
    pub height: i64,
    #[serde(default)]
    pub gas_used: i64,
}

impl TxResponse {
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}
