//! Raw JSON-RPC 2.0 POST transport: chain clients talk to the chain via a
//! simple JSON-RPC facade, the same "skip the full client crate, use
//! reqwest + serde_json" pattern `chronx_wallet::rpc_client::WalletRpcClient`
//! uses, here returning `RelayError` instead of `anyhow::Error` to match
//! the rest of the workspace's error type.

use hashbridge_core::error::RelayError;

#[derive(Clone)]
pub struct JsonRpcTransport {
    url: String,
    client: reqwest::Client,
}

impl JsonRpcTransport {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            client: reqwest::Client::new(),
        }
    }

    /// Call `method(params)` and return the `result` field.
    pub async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, RelayError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1,
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RelayError::Transient {
                op: method.to_string(),
                attempt: 1,
                detail: e.to_string(),
            })?;

        let json: serde_json::Value = resp.json().await.map_err(|e| RelayError::Transient {
            op: method.to_string(),
            attempt: 1,
            detail: format!("decoding response: {e}"),
        })?;

        if let Some(err) = json.get("error") {
            return Err(RelayError::Degraded {
                context: format!("{method} RPC error: {err}"),
            });
        }

        Ok(json["result"].clone())
    }
}
