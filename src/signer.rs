//! Offline transaction signing
//!
//! Signs an ordered sequence of unsigned transactions with strictly
//! increasing sequence numbers from a caller-supplied base. A gap in the
//! sequence would strand every later transaction as unsignable, so any
//! failure aborts the whole pass with no partial output.

use crate::keyring::Keyring;
use crate::tx::{SignDoc, SignerInfo, Tx};
use crate::types::Sender;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum SignError {
    #[error(
        "signing transactions is only supported in offline mode; \
         pass --offline together with --sequence and --account-number"
    )]
    OnlineUnsupported,

    #[error("keyring error: {0}")]
    Keyring(#[source] anyhow::Error),

    #[error("failed to encode sign-doc for transaction {index}: {source}")]
    Codec {
        index: usize,
        source: serde_json::Error,
    },

    #[error("failed to sign transaction {index}: {source}")]
    Signing {
        index: usize,
        source: anyhow::Error,
    },
}

/// Sign `txs[start_index..]` with the sender's key.
///
/// Transaction *k* (0-indexed from the resume point) commits to
/// `sender.sequence + k`. Re-signing the same set with a different base
/// sequence shifts every sequence number uniformly and changes nothing else.
pub fn sign_all(
    keyring: &Keyring,
    chain_id: &str,
    sender: &Sender,
    txs: &[Tx],
    start_index: usize,
    offline: bool,
) -> Result<Vec<Tx>, SignError> {
    if !offline {
        return Err(SignError::OnlineUnsupported);
    }

    info!(
        key = %sender.key_name,
        base_sequence = sender.sequence,
        account_number = sender.account_number,
        tx_count = txs.len().saturating_sub(start_index),
        "signing transactions in offline mode"
    );

    let mut sequence = sender.sequence;
    let mut signed = Vec::with_capacity(txs.len().saturating_sub(start_index));
    for (index, tx) in txs.iter().enumerate().skip(start_index) {
        signed.push(sign_tx(keyring, chain_id, sender, tx, index, sequence)?);
        // subsequent transactions use the next sequence number so they
        // stay valid when submitted in order
        sequence += 1;
    }

    Ok(signed)
}

/// Sign one transaction, committing to the given sequence number. Used
/// directly by the online single-pass flow, which derives the sequence from
/// a fresh account query instead of a caller-supplied base.
pub fn sign_tx(
    keyring: &Keyring,
    chain_id: &str,
    sender: &Sender,
    tx: &Tx,
    index: usize,
    sequence: u64,
) -> Result<Tx, SignError> {
    let public_key = keyring
        .public_key_hex(&sender.key_name)
        .map_err(SignError::Keyring)?;
    let doc = SignDoc {
        chain_id,
        account_number: sender.account_number,
        sequence,
        fee: &tx.auth_info.fee,
        messages: &tx.body.messages,
    };
    let sign_bytes = doc.to_bytes().map_err(|source| SignError::Codec { index, source })?;
    let signature = keyring
        .sign(&sender.key_name, &sign_bytes)
        .map_err(|source| SignError::Signing { index, source })?;

    let mut signed = tx.clone();
    signed.auth_info.signer_infos = vec![SignerInfo {
        public_key,
        sequence,
    }];
    signed.signatures = vec![hex::encode(signature)];

    debug!(index, sequence, "transaction signed");
    Ok(signed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::{Address, KEY_HASH_LEN};
    use crate::tx::{Fee, MsgInput, MsgMultiSend, Tx};
    use crate::types::Coins;

    fn unsigned_tx(seed: u8) -> Tx {
        let input = MsgInput {
            address: Address::from_key_hash("baby", &[seed; KEY_HASH_LEN]),
            amount: Coins::from_amount("ubaby", 100),
        };
        Tx::unsigned(
            MsgMultiSend::new(input, Vec::new()),
            Fee {
                gas_limit: 500_000,
                amount: Coins::from_amount("ubaby", 1_000),
            },
        )
    }

    fn test_keyring() -> (tempfile::TempDir, Keyring) {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::new(dir.path(), "baby");
        keyring.generate("payer").unwrap();
        (dir, keyring)
    }

    #[test]
    fn assigns_consecutive_sequences_from_base() {
        let (_dir, keyring) = test_keyring();
        let sender = Sender::new("payer", 7, 3);
        let txs: Vec<Tx> = (0..3).map(unsigned_tx).collect();

        let signed = sign_all(&keyring, "baby-devnet-1", &sender, &txs, 0, true).unwrap();
        assert_eq!(signed.len(), 3);
        for (k, tx) in signed.iter().enumerate() {
            assert!(tx.is_signed());
            assert_eq!(tx.auth_info.signer_infos[0].sequence, 7 + k as u64);
        }
    }

    #[test]
    fn different_base_shifts_sequences_uniformly() {
        let (_dir, keyring) = test_keyring();
        let txs: Vec<Tx> = (0..3).map(unsigned_tx).collect();

        let low = sign_all(&keyring, "c", &Sender::new("payer", 7, 3), &txs, 0, true).unwrap();
        let high = sign_all(&keyring, "c", &Sender::new("payer", 17, 3), &txs, 0, true).unwrap();

        for (a, b) in low.iter().zip(&high) {
            assert_eq!(
                b.auth_info.signer_infos[0].sequence,
                a.auth_info.signer_infos[0].sequence + 10
            );
            // only the committed sequence and signature differ
            assert_eq!(a.body, b.body);
            assert_eq!(a.auth_info.fee, b.auth_info.fee);
            assert_ne!(a.signatures, b.signatures);
        }
    }

    #[test]
    fn start_index_signs_only_the_tail() {
        let (_dir, keyring) = test_keyring();
        let sender = Sender::new("payer", 5, 1);
        let txs: Vec<Tx> = (0..4).map(unsigned_tx).collect();

        let signed = sign_all(&keyring, "c", &sender, &txs, 2, true).unwrap();
        assert_eq!(signed.len(), 2);
        assert_eq!(signed[0].auth_info.signer_infos[0].sequence, 5);
        assert_eq!(signed[1].auth_info.signer_infos[0].sequence, 6);
    }

    #[test]
    fn online_signing_is_rejected_before_touching_keys() {
        let dir = tempfile::tempdir().unwrap();
        // no key generated on purpose: the mode check must fire first
        let keyring = Keyring::new(dir.path(), "baby");
        let err = sign_all(
            &keyring,
            "c",
            &Sender::new("payer", 0, 0),
            &[unsigned_tx(1)],
            0,
            false,
        )
        .unwrap_err();
        assert!(matches!(err, SignError::OnlineUnsupported));
    }

    #[test]
    fn missing_key_aborts_with_no_partial_output() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::new(dir.path(), "baby");
        let err = sign_all(
            &keyring,
            "c",
            &Sender::new("ghost", 0, 0),
            &[unsigned_tx(1)],
            0,
            true,
        )
        .unwrap_err();
        assert!(matches!(err, SignError::Keyring(_)));
    }
}
