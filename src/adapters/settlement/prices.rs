use crate::models::PriceTick;
use anyhow::{Context, Result};
use reqwest::Client;
use rust_decimal::Decimal;

/// Pull-based live price feed. The hosting surface polls this on its own
/// cadence; the lifecycle manager itself never drives the polling.
pub struct PriceFeed {
    client: Client,
    base_url: String,
}

impl PriceFeed {
    pub fn new(client: Client, base_url: &str) -> Self {
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub async fn get_price(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/api/market/price", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await
            .context(format!("Failed to fetch price for {}", symbol))?;
        let status = response.status();
        if !status.is_success() {
            anyhow::bail!("Price call for {} failed with status {}", symbol, status);
        }
        let tick: PriceTick = response
            .json()
            .await
            .context("Failed to parse price response")?;
        Ok(tick.price)
    }
}
