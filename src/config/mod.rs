use clap::Parser;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[arg(short, long, default_value = "config.json")]
    pub config: PathBuf,

    /// Exchange pair to trade, e.g. BTCUSDT.
    #[arg(long, default_value = "BTCUSDT")]
    pub symbol: String,

    #[arg(long)]
    pub amount: Option<Decimal>,

    /// "call" (price will rise) or "put" (price will fall).
    #[arg(long, default_value = "call")]
    pub direction: String,

    /// Trade duration in seconds; must be one of the allowed set.
    #[arg(long, default_value_t = 60)]
    pub duration: u32,

    /// Look up the outcome of a previously placed trade instead of placing one.
    #[arg(long)]
    pub recover: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub settlement: SettlementConfig,
    pub trading: TradingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettlementConfig {
    pub api_url: String,
    /// Bearer token sent in the placement payload.
    pub token: Option<String>,
    /// Secret for HMAC request signing; unsigned requests are rejected by the server.
    pub api_secret: Option<String>,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    /// Client-side minimum stake; the server re-validates with its own copy.
    #[serde(default = "default_min_trade_amount")]
    pub min_trade_amount: Decimal,
    /// Allowed trade durations in seconds.
    #[serde(default = "default_allowed_durations")]
    pub allowed_durations: Vec<u32>,
    /// Seconds between settlement polls while a trade is live.
    #[serde(default = "default_resolution_poll_interval_secs")]
    pub resolution_poll_interval_secs: u64,
    /// Extra seconds past expiry to keep polling before falling back locally.
    #[serde(default = "default_resolution_grace_secs")]
    pub resolution_grace_secs: u64,
    /// Minimum seconds between balance refresh calls; calls inside the window coalesce.
    #[serde(default = "default_balance_refresh_min_interval_secs")]
    pub balance_refresh_min_interval_secs: u64,
    /// Seconds between live price polls by the hosting surface.
    #[serde(default = "default_price_poll_interval_secs")]
    pub price_poll_interval_secs: u64,
    /// Simulate placement locally: no outbound call, deterministic price-delta resolution.
    #[serde(default)]
    pub demo_mode: bool,
}

fn default_request_timeout_secs() -> u64 {
    10
}
fn default_min_trade_amount() -> Decimal {
    dec!(10)
}
fn default_allowed_durations() -> Vec<u32> {
    vec![30, 60, 120, 180, 300]
}
fn default_resolution_poll_interval_secs() -> u64 {
    5
}
fn default_resolution_grace_secs() -> u64 {
    15
}
fn default_balance_refresh_min_interval_secs() -> u64 {
    5
}
fn default_price_poll_interval_secs() -> u64 {
    2
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settlement: SettlementConfig {
                api_url: "https://api.example-options.com".to_string(),
                token: None,
                api_secret: None,
                request_timeout_secs: default_request_timeout_secs(),
            },
            trading: TradingConfig {
                min_trade_amount: default_min_trade_amount(),
                allowed_durations: default_allowed_durations(),
                resolution_poll_interval_secs: default_resolution_poll_interval_secs(),
                resolution_grace_secs: default_resolution_grace_secs(),
                balance_refresh_min_interval_secs: default_balance_refresh_min_interval_secs(),
                price_poll_interval_secs: default_price_poll_interval_secs(),
                demo_mode: false,
            },
        }
    }
}

impl Config {
    pub fn load(path: &PathBuf) -> anyhow::Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)?;
            Ok(serde_json::from_str(&content)?)
        } else {
            let config = Config::default();
            let content = serde_json::to_string_pretty(&config)?;
            std::fs::write(path, content)?;
            Ok(config)
        }
    }
}
