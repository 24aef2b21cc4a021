//! Account address encoding and validation

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of bytes in an account key hash.
pub const KEY_HASH_LEN: usize = 20;

/// Errors raised while parsing an account address.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AddressError {
    #[error("missing '1' separator between prefix and payload")]
    MissingSeparator,

    #[error("empty or non-lowercase address prefix")]
    BadPrefix,

    #[error("payload is not valid base58: {0}")]
    BadPayload(String),

    #[error("decoded payload is {0} bytes, expected {KEY_HASH_LEN}")]
    BadPayloadLength(usize),
}

/// A validated account address: `<prefix>1<base58(20-byte key hash)>`.
///
/// The raw string form is kept verbatim; ordering and equality are raw byte
/// order, which is what the loader sorts by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address {
    raw: String,
}

impl Address {
    /// Encode a key hash under the given human-readable prefix.
    pub fn from_key_hash(prefix: &str, hash: &[u8; KEY_HASH_LEN]) -> Self {
        Self {
            raw: format!("{prefix}1{}", bs58::encode(hash).into_string()),
        }
    }

    /// Derive the address of an Ed25519 public key: the first 20 bytes of
    /// its SHA-256 digest, encoded under `prefix`.
    pub fn from_public_key(prefix: &str, public_key: &[u8]) -> Self {
        let digest = Sha256::digest(public_key);
        let mut hash = [0u8; KEY_HASH_LEN];
        hash.copy_from_slice(&digest[..KEY_HASH_LEN]);
        Self::from_key_hash(prefix, &hash)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// The human-readable prefix portion of the address.
    pub fn prefix(&self) -> &str {
        // Safe: validated on construction to contain a separator.
        let sep = self.raw.find(|c: char| !c.is_ascii_lowercase()).unwrap();
        &self.raw[..sep]
    }
}

impl FromStr for Address {
    type Err = AddressError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // The prefix is the leading run of lowercase ASCII letters; the first
        // non-letter character must be the '1' separator.
        let sep = s
            .find(|c: char| !c.is_ascii_lowercase())
            .ok_or(AddressError::MissingSeparator)?;
        if sep == 0 {
            return Err(AddressError::BadPrefix);
        }
        if s.as_bytes()[sep] != b'1' {
            return Err(AddressError::MissingSeparator);
        }

        let payload = &s[sep + 1..];
        let decoded = bs58::decode(payload)
            .into_vec()
            .map_err(|e| AddressError::BadPayload(e.to_string()))?;
        if decoded.len() != KEY_HASH_LEN {
            return Err(AddressError::BadPayloadLength(decoded.len()));
        }

        Ok(Self { raw: s.to_string() })
    }
}

impl TryFrom<String> for Address {
    type Error = AddressError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Address> for String {
    fn from(addr: Address) -> Self {
        addr.raw
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrips_through_string_form() {
        let addr = Address::from_key_hash("baby", &[7u8; KEY_HASH_LEN]);
        let parsed: Address = addr.as_str().parse().unwrap();
        assert_eq!(parsed, addr);
        assert_eq!(parsed.prefix(), "baby");
    }

    #[test]
    fn derivation_from_public_key_is_stable() {
        let a = Address::from_public_key("baby", &[1u8; 32]);
        let b = Address::from_public_key("baby", &[1u8; 32]);
        assert_eq!(a, b);
        let c = Address::from_public_key("baby", &[2u8; 32]);
        assert_ne!(a, c);
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert_eq!(
            "nodigitshere".parse::<Address>().unwrap_err(),
            AddressError::MissingSeparator
        );
        assert_eq!("1abc".parse::<Address>().unwrap_err(), AddressError::BadPrefix);
        // '0', 'I', 'O', 'l' are outside the base58 alphabet
        assert!(matches!(
            "baby10OIl".parse::<Address>().unwrap_err(),
            AddressError::BadPayload(_)
        ));
        // valid base58, wrong length
        assert!(matches!(
            "baby1abc".parse::<Address>().unwrap_err(),
            AddressError::BadPayloadLength(_)
        ));
    }

    #[test]
    fn serde_uses_string_form() {
        let addr = Address::from_key_hash("baby", &[9u8; KEY_HASH_LEN]);
        let json = serde_json::to_string(&addr).unwrap();
        assert_eq!(json, format!("\"{}\"", addr));
        let back: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(back, addr);
    }
}
