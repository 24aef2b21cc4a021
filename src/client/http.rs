//! JSON-RPC 2.0 client for the chain gateway

use super::errors::ClientError;
use super::ChainClient;
use crate::address::Address;
use crate::tx::MsgMultiSend;
use crate::types::{AccountInfo, TxResponse};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// How often inclusion polling re-queries the gateway.
const INCLUSION_POLL_INTERVAL: Duration = Duration::from_secs(2);

/// HTTP implementation of [`ChainClient`].
pub struct HttpChainClient {
    http: reqwest::Client,
    endpoint: String,
    next_id: AtomicU64,
}

#[derive(Debug, Serialize)]
struct RpcRequest<'a, P> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    params: P,
}

#[derive(Debug, Deserialize)]
struct RpcEnvelope<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
    #[serde(default)]
    data: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SimulateResult {
    gas_used: u64,
}

/// `tx_info` answer: `tx` stays null until the hash lands in a block.
#[derive(Debug, Deserialize)]
struct TxInfoResult {
    #[serde(default)]
    tx: Option<TxResponse>,
}

impl HttpChainClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            next_id: AtomicU64::new(1),
        }
    }

    async fn call<P: Serialize, T: DeserializeOwned>(
        &self,
        method: &str,
        params: P,
        timeout: Option<Duration>,
    ) -> Result<T, ClientError> {
        let request = RpcRequest {
            jsonrpc: "2.0",
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            method,
            params,
        };

        let mut builder = self.http.post(self.endpoint.as_str()).json(&request);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }

        let response = builder.send().await.map_err(|e| transport_error(method, &e))?;
        let envelope: RpcEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ClientError::BadResponse {
                message: e.to_string(),
            })?;

        if let Some(err) = envelope.error {
            let message = match err.data {
                Some(data) => format!("{}: {data}", err.message),
                None => err.message,
            };
            return Err(ClientError::Rpc {
                code: err.code,
                message,
            });
        }
        envelope.result.ok_or_else(|| ClientError::BadResponse {
            message: format!("{method}: response carried neither result nor error"),
        })
    }
}

/// Map a transport failure to a classifiable message. Request timeouts are
/// rendered with the gateway's broadcast-timeout wording so the retry
/// classifier treats them as transient.
fn transport_error(method: &str, err: &reqwest::Error) -> ClientError {
    let message = if err.is_timeout() {
        format!("{method}: timed out after waiting for tx broadcast: {err}")
    } else {
        format!("{method}: {err}")
    };
    ClientError::Transport { message }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn account(&self, address: &Address) -> Result<AccountInfo, ClientError> {
        self.call(
            "auth_account",
            serde_json::json!({ "address": address }),
            None,
        )
        .await
    }

    async fn simulate(
        &self,
        msg: &MsgMultiSend,
        sequence: u64,
        account_number: u64,
    ) -> Result<u64, ClientError> {
        let result: SimulateResult = self
            .call(
                "tx_simulate",
                serde_json::json!({
                    "msg": msg,
                    "sequence": sequence,
                    "account_number": account_number,
                }),
                None,
            )
            .await?;
        Ok(result.gas_used)
    }

    async fn broadcast(
        &self,
        tx_bytes: &[u8],
        timeout: Duration,
    ) -> Result<TxResponse, ClientError> {
        self.call(
            "broadcast_tx_sync",
            serde_json::json!({ "tx": hex::encode(tx_bytes) }),
            Some(timeout),
        )
        .await
    }

    async fn wait_for_inclusion(
        &self,
        txhash: &str,
        timeout: Duration,
    ) -> Result<TxResponse, ClientError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let info: TxInfoResult = self
                .call("tx_info", serde_json::json!({ "hash": txhash }), None)
                .await?;
            if let Some(res) = info.tx {
                if res.height > 0 {
                    return Ok(res);
                }
            }
            if tokio::time::Instant::now() + INCLUSION_POLL_INTERVAL > deadline {
                return Err(ClientError::InclusionTimeout {
                    txhash: txhash.to_string(),
                    waited_secs: timeout.as_secs(),
                });
            }
            tokio::time::sleep(INCLUSION_POLL_INTERVAL).await;
        }
    }
}
