use {
    crate::{ChainClient, rate_limit::RateLimiter},
    anyhow::{Context, Result, bail},
    async_trait::async_trait,
    base64::{Engine, engine::general_purpose::STANDARD},
    reqwest::{Client, StatusCode},
    serde::{Deserialize, Serialize, de::DeserializeOwned},
    serde_json::json,
    std::time::Duration,
    ton::{Address, Nano},
    url::Url,
};

const USER_AGENT: &str = "ton-deployer/0.1.0";
const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// [`ChainClient`] over a toncenter-style JSON-RPC endpoint.
pub struct HttpChainClient {
    client: Client,
    endpoint: Url,
    rate_limiter: RateLimiter,
}

impl HttpChainClient {
    pub fn new(endpoint: Url, rate_limiter: RateLimiter) -> Result<Self> {
        let client = Client::builder()
            .timeout(HTTP_TIMEOUT)
            .user_agent(USER_AGENT)
            .build()
            .context("building http client")?;
        Ok(Self {
            client,
            endpoint,
            rate_limiter,
        })
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T> {
        self.rate_limiter.acquire().await;
        let request = JsonRpcRequest {
            jsonrpc: "2.0",
            id: "1",
            method,
            params,
        };
        tracing::trace!(method, "sending rpc call");
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await
            .with_context(|| format!("sending {method}"))?;
        let status = response.status();
        let body = response
            .text()
            .await
            .with_context(|| format!("reading {method} response"))?;
        decode(method, status, &body)
    }
}

#[async_trait]
impl ChainClient for HttpChainClient {
    async fn balance(&self, address: &Address) -> Result<Nano> {
        let balance: String = self
            .call("getAddressBalance", json!({ "address": address.to_raw() }))
            .await?;
        let balance = balance
            .parse()
            .with_context(|| format!("malformed balance '{balance}'"))?;
        Ok(Nano(balance))
    }

    async fn is_contract_deployed(&self, address: &Address) -> Result<bool> {
        let state: String = self
            .call("getAddressState", json!({ "address": address.to_raw() }))
            .await?;
        Ok(state == "active")
    }

    async fn wallet_seqno(&self, address: &Address) -> Result<u32> {
        let info: WalletInformation = self
            .call("getWalletInformation", json!({ "address": address.to_raw() }))
            .await?;
        Ok(info.seqno.unwrap_or(0))
    }

    async fn send_boc(&self, boc: Vec<u8>) -> Result<()> {
        let _: serde_json::Value = self
            .call("sendBoc", json!({ "boc": STANDARD.encode(boc) }))
            .await?;
        Ok(())
    }
}

#[derive(Serialize)]
struct JsonRpcRequest<'a> {
    jsonrpc: &'static str,
    id: &'static str,
    method: &'a str,
    params: serde_json::Value,
}

#[derive(Deserialize)]
struct JsonRpcResponse<T> {
    ok: bool,
    result: Option<T>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

#[derive(Deserialize)]
struct WalletInformation {
    #[serde(default)]
    seqno: Option<u32>,
}

fn decode<T: DeserializeOwned>(method: &str, status: StatusCode, body: &str) -> Result<T> {
    let envelope: JsonRpcResponse<T> = serde_json::from_str(body)
        .with_context(|| format!("{method} returned {status} with unexpected body: {body}"))?;
    if !envelope.ok {
        bail!(
            "{method} failed with {status}: {}",
            envelope
                .error
                .map(|error| error.to_string())
                .unwrap_or_else(|| "unknown error".to_string())
        );
    }
    envelope
        .result
        .with_context(|| format!("{method} returned no result"))
}
