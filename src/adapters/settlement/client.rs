use crate::config::SettlementConfig;
use crate::models::{PlaceTradeRequest, PlaceTradeResponse, SettlementResult};
use anyhow::{Context, Result};
use async_trait::async_trait;
use hmac::{Hmac, Mac};
use reqwest::Client;
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Remote settlement service seam. The production client talks HTTP; tests
/// substitute an in-memory implementation.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Submits one placement call. Callers own the exactly-once guarantee;
    /// this method sends unconditionally.
    async fn place_trade(&self, request: &PlaceTradeRequest) -> Result<PlaceTradeResponse>;

    /// Settlement for a trade id. `Ok(None)` means the server has not
    /// settled the trade yet.
    async fn fetch_resolution(&self, trade_id: &str) -> Result<Option<SettlementResult>>;
}

pub struct SettlementApi {
    client: Client,
    base_url: String,
    api_secret: Option<String>,
}

impl SettlementApi {
    pub fn new(config: &SettlementConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.request_timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            api_secret: config.api_secret.clone(),
        })
    }

    /// HMAC-SHA256 over method + path + body + timestamp, hex-encoded.
    fn generate_signature(
        &self,
        method: &str,
        path: &str,
        body: &str,
        timestamp: u64,
    ) -> Result<String> {
        let secret = self
            .api_secret
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("API secret is required for signed requests"))?;

        let message = format!("{}{}{}{}", method, path, body, timestamp);
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|e| anyhow::anyhow!("Failed to create HMAC: {}", e))?;
        mac.update(message.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn sign(
        &self,
        request: reqwest::RequestBuilder,
        method: &str,
        path: &str,
        body: &str,
    ) -> Result<reqwest::RequestBuilder> {
        if self.api_secret.is_none() {
            return Ok(request);
        }
        let timestamp = std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map_err(|e| anyhow::anyhow!("System clock before epoch: {}", e))?
            .as_secs();
        let signature = self.generate_signature(method, path, body, timestamp)?;
        Ok(request
            .header("X-SIGNATURE", signature)
            .header("X-TIMESTAMP", timestamp.to_string()))
    }
}

#[async_trait]
impl SettlementGateway for SettlementApi {
    async fn place_trade(&self, request: &PlaceTradeRequest) -> Result<PlaceTradeResponse> {
        let path = "/api/trade/place";
        let url = format!("{}{}", self.base_url, path);
        let body = serde_json::to_string(request).context("Serialize placement request")?;

        let req = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .body(body.clone());
        let req = self.sign(req, "POST", path, &body)?;

        let response = req
            .send()
            .await
            .context(format!("Failed to place trade for {}", request.symbol))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Placement call failed with status {}", status);
        }
        response
            .json::<PlaceTradeResponse>()
            .await
            .context("Failed to parse placement response")
    }

    async fn fetch_resolution(&self, trade_id: &str) -> Result<Option<SettlementResult>> {
        let path = format!("/api/trade/{}/result", trade_id);
        let url = format!("{}{}", self.base_url, path);

        let req = self.client.get(&url);
        let req = self.sign(req, "GET", &path, "")?;

        let response = req
            .send()
            .await
            .context(format!("Failed to fetch resolution for trade {}", trade_id))?;
        // 404 means not settled yet; the poller keeps waiting.
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!(
                "Resolution call for trade {} failed with status {}",
                trade_id,
                status
            );
        }
        let result: SettlementResult = response
            .json()
            .await
            .context("Failed to parse resolution response")?;
        Ok(Some(result))
    }
}
