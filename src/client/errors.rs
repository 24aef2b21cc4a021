//! Chain client error taxonomy and classification

use thiserror::Error;

/// Error messages that indicate a transient broadcast failure worth
/// retrying. Matched as case-insensitive substrings against the rendered
/// error.
pub const RETRYABLE_ERRORS: &[&str] = &[
    "timed out after waiting for tx",
    "connection refused",
];

/// Node-side message reporting that the transaction is already present in
/// the local mempool. Success-equivalent: the transaction will still be
/// mined, so the run advances past it.
pub const ERR_TX_IN_CACHE: &str = "tx already exists in cache";

/// Errors surfaced by a [`super::ChainClient`].
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// Transport-level failure (connection, request timeout)
    #[error("transport error: {message}")]
    Transport { message: String },

    /// Error payload returned by the gateway RPC
    #[error("rpc error (code {code}): {message}")]
    Rpc { code: i64, message: String },

    /// Response body did not decode into the expected shape
    #[error("malformed rpc response: {message}")]
    BadResponse { message: String },

    /// Inclusion polling exhausted its wait window without seeing the
    /// transaction in a block
    #[error("tx {txhash} not seen in a block after {waited_secs}s")]
    InclusionTimeout { txhash: String, waited_secs: u64 },
}

impl ClientError {
    /// Whether this error matches the known retryable set.
    pub fn is_retryable(&self) -> bool {
        let rendered = self.to_string().to_lowercase();
        RETRYABLE_ERRORS.iter().any(|m| rendered.contains(m))
    }

    /// Whether the node reported the transaction as already pending.
    pub fn is_already_in_cache(&self) -> bool {
        self.to_string().to_lowercase().contains(ERR_TX_IN_CACHE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_retryable_messages() {
        let timeout = ClientError::Transport {
            message: "timed out after waiting for tx to be committed".to_string(),
        };
        assert!(timeout.is_retryable());

        let refused = ClientError::Transport {
            message: "Connection refused (os error 111)".to_string(),
        };
        assert!(refused.is_retryable());

        let other = ClientError::Rpc {
            code: -32600,
            message: "invalid request".to_string(),
        };
        assert!(!other.is_retryable());
    }

    #[test]
    fn classifies_already_in_cache() {
        let cached = ClientError::Rpc {
            code: -32000,
            message: "broadcast failed: tx already exists in cache".to_string(),
        };
        assert!(cached.is_already_in_cache());
        assert!(!cached.is_retryable());

        let timeout = ClientError::InclusionTimeout {
            txhash: "AB".to_string(),
            waited_secs: 35,
        };
        assert!(!timeout.is_already_in_cache());
    }
}
