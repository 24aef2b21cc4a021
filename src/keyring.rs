//! File-backed keyring for offline signing
//!
//! Keys are Ed25519 keypairs stored one per file as a JSON array of 64 bytes
//! (32-byte secret followed by the 32-byte public key) under the configured
//! key directory. Key names map to `<name>.json`.

use crate::address::Address;
use anyhow::{bail, Context, Result};
use ed25519_dalek::{Signer as _, SigningKey, SECRET_KEY_LENGTH};
use rand::RngCore;
use std::path::PathBuf;

/// Length of a serialized keypair file payload.
const KEYPAIR_LEN: usize = 64;

/// Keyring over a directory of keypair files.
pub struct Keyring {
    dir: PathBuf,
    account_prefix: String,
}

impl Keyring {
    pub fn new(dir: impl Into<PathBuf>, account_prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            account_prefix: account_prefix.into(),
        }
    }

    fn key_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.json"))
    }

    /// Generate a new keypair under `name` and return its address.
    /// Refuses to overwrite an existing key.
    pub fn generate(&self, name: &str) -> Result<Address> {
        let path = self.key_path(name);
        if path.exists() {
            bail!("key '{name}' already exists at {}", path.display());
        }
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create key directory {}", self.dir.display()))?;

        let mut secret = [0u8; SECRET_KEY_LENGTH];
        rand::thread_rng().fill_bytes(&mut secret);
        let signing_key = SigningKey::from_bytes(&secret);

        let mut bytes = Vec::with_capacity(KEYPAIR_LEN);
        bytes.extend_from_slice(&secret);
        bytes.extend_from_slice(signing_key.verifying_key().as_bytes());
        std::fs::write(&path, serde_json::to_vec(&bytes)?)
            .with_context(|| format!("failed to write keypair file {}", path.display()))?;

        Ok(self.derive_address(&signing_key))
    }

    /// Load the signing key stored under `name`.
    pub fn load(&self, name: &str) -> Result<SigningKey> {
        let path = self.key_path(name);
        let raw = std::fs::read(&path)
            .with_context(|| format!("failed to read keypair file {}", path.display()))?;

        let bytes: Vec<u8> =
            serde_json::from_slice(&raw).context("failed to parse keypair JSON")?;
        if bytes.len() != KEYPAIR_LEN {
            bail!(
                "invalid keypair length: expected {KEYPAIR_LEN} bytes, got {}",
                bytes.len()
            );
        }
        if bytes.iter().all(|&b| b == 0) {
            bail!("invalid keypair: all-zero key rejected");
        }

        let mut secret = [0u8; SECRET_KEY_LENGTH];
        secret.copy_from_slice(&bytes[..SECRET_KEY_LENGTH]);
        Ok(SigningKey::from_bytes(&secret))
    }

    /// Sign arbitrary bytes with the named key.
    pub fn sign(&self, name: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        let key = self.load(name)?;
        Ok(key.sign(bytes).to_bytes().to_vec())
    }

    /// Address of the named key.
    pub fn address(&self, name: &str) -> Result<Address> {
        Ok(self.derive_address(&self.load(name)?))
    }

    /// Hex-encoded public key of the named key.
    pub fn public_key_hex(&self, name: &str) -> Result<String> {
        let key = self.load(name)?;
        Ok(hex::encode(key.verifying_key().as_bytes()))
    }

    /// Names of all keys present in the key directory.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("failed to read key directory {}", self.dir.display())
                })
            }
        };
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) == Some("json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn derive_address(&self, key: &SigningKey) -> Address {
        Address::from_public_key(&self.account_prefix, key.verifying_key().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_keyring() -> (tempfile::TempDir, Keyring) {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::new(dir.path(), "baby");
        (dir, keyring)
    }

    #[test]
    fn generate_then_load_yields_same_address() {
        let (_dir, keyring) = temp_keyring();
        let addr = keyring.generate("payer").unwrap();
        assert_eq!(keyring.address("payer").unwrap(), addr);
        assert!(addr.as_str().starts_with("baby1"));
    }

    #[test]
    fn generate_refuses_to_overwrite() {
        let (_dir, keyring) = temp_keyring();
        keyring.generate("payer").unwrap();
        assert!(keyring.generate("payer").is_err());
    }

    #[test]
    fn signatures_verify_under_the_stored_key() {
        use ed25519_dalek::Verifier;

        let (_dir, keyring) = temp_keyring();
        keyring.generate("payer").unwrap();
        let sig_bytes = keyring.sign("payer", b"sign-doc").unwrap();

        let key = keyring.load("payer").unwrap();
        let sig = ed25519_dalek::Signature::from_slice(&sig_bytes).unwrap();
        assert!(key.verifying_key().verify(b"sign-doc", &sig).is_ok());
    }

    #[test]
    fn rejects_all_zero_keypair_file() {
        let (dir, keyring) = temp_keyring();
        std::fs::write(
            dir.path().join("bad.json"),
            serde_json::to_vec(&vec![0u8; 64]).unwrap(),
        )
        .unwrap();
        assert!(keyring.load("bad").is_err());
    }

    #[test]
    fn list_returns_sorted_key_names() {
        let (_dir, keyring) = temp_keyring();
        keyring.generate("zeta").unwrap();
        keyring.generate("alpha").unwrap();
        assert_eq!(keyring.list().unwrap(), vec!["alpha", "zeta"]);
    }
}
