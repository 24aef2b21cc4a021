//! Transaction wire types and JSON codec
//!
//! A transaction carries exactly one multi-output transfer message. Stages
//! never mutate a transaction in place: the builder produces an unsigned
//! value (empty `signatures`), the signer replaces it with a signed one.

use crate::address::Address;
use crate::types::Coins;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Funding side of a multi-send: the batch sender with the batch total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgInput {
    pub address: Address,
    pub amount: Coins,
}

/// One recipient of a multi-send.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgOutput {
    pub address: Address,
    pub amount: Coins,
}

/// Multi-output transfer message: one input, N outputs. Valid on chain only
/// if the output amounts sum to the input amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgMultiSend {
    pub inputs: Vec<MsgInput>,
    pub outputs: Vec<MsgOutput>,
}

impl MsgMultiSend {
    pub fn new(input: MsgInput, outputs: Vec<MsgOutput>) -> Self {
        Self {
            inputs: vec![input],
            outputs,
        }
    }
}

/// Gas limit and fee paid for a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fee {
    pub gas_limit: u64,
    pub amount: Coins,
}

/// Message payload and memo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxBody {
    pub messages: Vec<MsgMultiSend>,
    #[serde(default)]
    pub memo: String,
}

/// Public key and sequence the signature commits to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignerInfo {
    /// Hex-encoded Ed25519 public key
    pub public_key: String,
    pub sequence: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthInfo {
    pub signer_infos: Vec<SignerInfo>,
    pub fee: Fee,
}

/// A transaction at any lifecycle stage. Unsigned transactions have no
/// signer infos and no signatures; signed transactions have exactly one of
/// each.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tx {
    pub body: TxBody,
    pub auth_info: AuthInfo,
    /// Hex-encoded signatures
    pub signatures: Vec<String>,
}

impl Tx {
    /// Wrap one message into an unsigned transaction.
    pub fn unsigned(msg: MsgMultiSend, fee: Fee) -> Self {
        Self {
            body: TxBody {
                messages: vec![msg],
                memo: String::new(),
            },
            auth_info: AuthInfo {
                signer_infos: Vec::new(),
                fee,
            },
            signatures: Vec::new(),
        }
    }

    pub fn is_signed(&self) -> bool {
        !self.signatures.is_empty()
    }

    /// Canonical wire encoding. JSON with lexicographically ordered map keys
    /// and fixed struct field order, so identical transactions encode to
    /// identical bytes.
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }

    /// Uppercase hex SHA-256 of the canonical encoding, the chain's
    /// transaction hash.
    pub fn hash(&self) -> serde_json::Result<String> {
        let bytes = self.to_bytes()?;
        Ok(hex::encode_upper(Sha256::digest(&bytes)))
    }
}

/// The bytes an offline signer commits to: chain id, account number,
/// sequence, fee, and the messages, in canonical JSON.
#[derive(Debug, Clone, Serialize)]
pub struct SignDoc<'a> {
    pub chain_id: &'a str,
    pub account_number: u64,
    pub sequence: u64,
    pub fee: &'a Fee,
    pub messages: &'a [MsgMultiSend],
}

impl SignDoc<'_> {
    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

/// Persisted transaction file shape: `{ "txs": [ ... ] }`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TxFile {
    pub txs: Vec<Tx>,
}

impl TxFile {
    pub fn new(txs: Vec<Tx>) -> Self {
        Self { txs }
    }

    /// Read a transaction file from disk.
    pub fn read(path: &std::path::Path) -> anyhow::Result<Self> {
        use anyhow::Context;
        let data = std::fs::read(path)
            .with_context(|| format!("failed to read tx file {}", path.display()))?;
        let file = serde_json::from_slice(&data)
            .with_context(|| format!("failed to decode tx file {}", path.display()))?;
        Ok(file)
    }

    /// Write pretty-printed JSON to the given path, or to stdout when no
    /// path was specified.
    pub fn write(&self, path: Option<&std::path::Path>) -> anyhow::Result<()> {
        use anyhow::Context;
        let rendered = serde_json::to_string_pretty(self)?;
        match path {
            Some(path) => std::fs::write(path, rendered)
                .with_context(|| format!("failed to write tx file {}", path.display()))?,
            None => println!("{rendered}"),
        }
        Ok(())
    }
}
