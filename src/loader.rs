//! Transfer data loading and stateless validation
//!
//! Parses the operator-provided transfer file into a sorted, validated
//! [`TransferSet`]. This stage performs no network or signing activity;
//! every failure here is fatal before anything touches the chain.

use crate::address::{Address, AddressError};
use crate::types::{Coins, TransferEntry, TransferSet, BASE_DENOM, BASE_UNITS_PER_DISPLAY};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read transfer file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed transfer file: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("invalid amount for address {address}: {reason}")]
    InvalidAmount { address: String, reason: String },

    #[error("invalid address {address}: {source}")]
    InvalidAddress {
        address: String,
        source: AddressError,
    },
}

/// Raw per-recipient record in the transfer file.
#[derive(Debug, Deserialize)]
struct RawTransfer {
    aggregates: RawAggregates,
}

#[derive(Debug, Deserialize)]
struct RawAggregates {
    total_baby: f64,
}

/// Read and validate a transfer file from disk.
pub fn load_transfer_file(path: &Path) -> Result<TransferSet, LoadError> {
    let data = std::fs::read(path)?;
    load_transfer_data(&data)
}

/// Parse a transfer document into a [`TransferSet`].
///
/// Recipients with a zero aggregate amount are silently skipped. Surviving
/// entries are sorted by raw address string ascending so batch boundaries
/// are reproducible across runs.
pub fn load_transfer_data(data: &[u8]) -> Result<TransferSet, LoadError> {
    let raw: BTreeMap<String, RawTransfer> = serde_json::from_slice(data)?;

    let mut total = Coins::new();
    let mut entries = Vec::with_capacity(raw.len());
    for (address, record) in raw {
        // zero amounts never become entries
        if record.aggregates.total_baby == 0.0 {
            continue;
        }
        let amount = display_to_base_units(record.aggregates.total_baby).map_err(|reason| {
            LoadError::InvalidAmount {
                address: address.clone(),
                reason,
            }
        })?;
        let address: Address = address.parse().map_err(|source| LoadError::InvalidAddress {
            address: address.clone(),
            source,
        })?;

        let coins = Coins::from_amount(BASE_DENOM, amount);
        total = total.checked_add(&coins);
        entries.push(TransferEntry {
            address,
            amount: coins,
        });
    }

    entries.sort_by(|a, b| a.address.cmp(&b.address));
    Ok(TransferSet { entries, total })
}

/// Convert a display-denomination amount to integer base units at six
/// decimal places, rejecting values the chain cannot represent.
fn display_to_base_units(value: f64) -> Result<u128, String> {
    if !value.is_finite() {
        return Err("amount is not a finite number".to_string());
    }
    if value < 0.0 {
        return Err("amount is negative".to_string());
    }
    let scaled = value * BASE_UNITS_PER_DISPLAY as f64;
    if scaled > u128::MAX as f64 {
        return Err("amount overflows the base denomination".to_string());
    }
    Ok(scaled.round() as u128)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::KEY_HASH_LEN;

    fn addr(byte: u8) -> Address {
        Address::from_key_hash("baby", &[byte; KEY_HASH_LEN])
    }

    fn transfer_json(pairs: &[(&Address, f64)]) -> Vec<u8> {
        let body: Vec<String> = pairs
            .iter()
            .map(|(a, v)| format!(r#""{a}": {{"aggregates": {{"total_baby": {v}}}}}"#))
            .collect();
        format!("{{{}}}", body.join(",")).into_bytes()
    }

    #[test]
    fn total_equals_sum_of_entries() {
        let (a, b, c) = (addr(1), addr(2), addr(3));
        let set =
            load_transfer_data(&transfer_json(&[(&a, 1.5), (&b, 2.0), (&c, 0.25)])).unwrap();
        assert_eq!(set.len(), 3);
        let summed = set
            .entries
            .iter()
            .fold(Coins::new(), |acc, e| acc.checked_add(&e.amount));
        assert_eq!(summed, set.total);
        assert_eq!(set.total.amount_of(BASE_DENOM), 3_750_000);
    }

    #[test]
    fn entries_are_sorted_by_raw_address() {
        let (a, b, c) = (addr(9), addr(1), addr(5));
        let set = load_transfer_data(&transfer_json(&[(&a, 1.0), (&b, 1.0), (&c, 1.0)])).unwrap();
        let mut sorted = set.entries.clone();
        sorted.sort_by(|x, y| x.address.cmp(&y.address));
        assert_eq!(set.entries, sorted);
    }

    #[test]
    fn zero_amount_recipients_are_skipped() {
        let (a, b) = (addr(1), addr(2));
        let with_zero = load_transfer_data(&transfer_json(&[(&a, 10.0), (&b, 0.0)])).unwrap();
        let without = load_transfer_data(&transfer_json(&[(&a, 10.0)])).unwrap();
        assert_eq!(with_zero, without);
        assert_eq!(with_zero.len(), 1);
        assert_eq!(with_zero.total.amount_of(BASE_DENOM), 10_000_000);
    }

    #[test]
    fn malformed_document_is_rejected() {
        assert!(matches!(
            load_transfer_data(b"not json at all"),
            Err(LoadError::Malformed(_))
        ));
    }

    #[test]
    fn negative_amount_is_rejected_with_address() {
        let a = addr(4);
        let err = load_transfer_data(&transfer_json(&[(&a, -1.0)])).unwrap_err();
        match err {
            LoadError::InvalidAmount { address, .. } => assert_eq!(address, a.to_string()),
            other => panic!("expected InvalidAmount, got {other:?}"),
        }
    }

    #[test]
    fn invalid_address_is_rejected() {
        let data = br#"{"notanaddress": {"aggregates": {"total_baby": 1.0}}}"#;
        assert!(matches!(
            load_transfer_data(data),
            Err(LoadError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn amounts_convert_at_six_decimals() {
        let a = addr(7);
        let set = load_transfer_data(&transfer_json(&[(&a, 0.000001)])).unwrap();
        assert_eq!(set.total.amount_of(BASE_DENOM), 1);
    }
}
