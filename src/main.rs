mod adapters;
mod config;
mod domain;
mod models;
mod services;
mod utils;

use crate::adapters::profile::ProfileHandle;
use crate::adapters::settlement::{PriceFeed, SettlementApi, SettlementGateway};
use crate::config::{Args, Config};
use crate::models::TradeDirection;
use crate::services::countdown::CountdownEngine;
use crate::services::placement::PlacementService;
use crate::services::presenter::{render_active, OutcomePresenter};
use crate::services::session::SessionStore;
use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = Config::load(&args.config).context("Failed to load config")?;

    let api = Arc::new(SettlementApi::new(&config.settlement)?);

    if let Some(trade_id) = &args.recover {
        return recover_outcome(api.as_ref(), trade_id).await;
    }

    let amount = args
        .amount
        .context("--amount is required to place a trade")?;
    let direction = match args.direction.to_lowercase().as_str() {
        "call" => TradeDirection::Call,
        "put" => TradeDirection::Put,
        other => anyhow::bail!("Unknown direction '{}'; use call or put", other),
    };

    let http = reqwest::Client::builder()
        .timeout(Duration::from_secs(config.settlement.request_timeout_secs))
        .build()
        .context("Failed to create HTTP client")?;
    let prices = Arc::new(PriceFeed::new(http, &config.settlement.api_url));

    let entry_price = prices
        .get_price(&args.symbol)
        .await
        .context("Failed to sample entry price")?;

    let request = domain::request::build(
        amount,
        &args.symbol,
        direction,
        args.duration,
        entry_price,
        config.trading.min_trade_amount,
        &config.trading.allowed_durations,
    )?;

    let store = SessionStore::new();
    let profile = Arc::new(ProfileHandle::new(Duration::from_secs(
        config.trading.balance_refresh_min_interval_secs,
    )));
    let presenter = Arc::new(OutcomePresenter::new(store.clone(), profile));
    let gateway: Arc<dyn SettlementGateway> = api;
    let placement = PlacementService::new(
        store.clone(),
        gateway.clone(),
        config.settlement.token.clone(),
        config.trading.demo_mode,
    );
    let engine = CountdownEngine::new(
        store.clone(),
        gateway,
        presenter,
        Duration::from_secs(config.trading.resolution_poll_interval_secs),
        Duration::from_secs(config.trading.resolution_grace_secs),
        config.trading.demo_mode,
    );

    info!(
        "Placing {} {} {} for {}s (entry {})",
        request.direction, request.symbol, request.amount, request.duration_secs, entry_price
    );

    let session_id = store.create(request).await;
    let trade_id = placement.place(&session_id).await?;
    engine.spawn(trade_id.clone());
    spawn_price_poller(
        store.clone(),
        prices,
        trade_id.clone(),
        args.symbol.clone(),
        Duration::from_secs(config.trading.price_poll_interval_secs),
    );

    follow_session(&store, &trade_id).await;
    Ok(())
}

/// Looks up the final outcome of a trade placed earlier, e.g. after the
/// countdown dialog was closed before expiry.
async fn recover_outcome(api: &SettlementApi, trade_id: &str) -> Result<()> {
    match api.fetch_resolution(trade_id).await? {
        Some(result) => {
            let payout = if result.is_win() {
                result.profit.unwrap_or_default()
            } else {
                result.lost_amount.unwrap_or_default()
            };
            info!(
                "trade {}: {} {} (balance {:?})",
                trade_id,
                result.status.to_uppercase(),
                payout,
                result.new_balance
            );
        }
        None => info!("trade {}: not settled yet", trade_id),
    }
    Ok(())
}

/// Polls the live price feed on the hosting surface's cadence and pushes
/// observations into the session while it is active.
fn spawn_price_poller(
    store: Arc<SessionStore>,
    prices: Arc<PriceFeed>,
    trade_id: String,
    symbol: String,
    interval: Duration,
) {
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            match store.snapshot(&trade_id).await {
                Some(session) if !session.is_resolved() => {}
                _ => return,
            }
            match prices.get_price(&symbol).await {
                Ok(price) => {
                    store.update_price(&trade_id, price).await;
                }
                Err(e) => warn!("price poll for {} failed: {}", symbol, e),
            }
        }
    });
}

/// Watches the session until it resolves, logging the countdown line on
/// every change the store publishes.
async fn follow_session(store: &SessionStore, trade_id: &str) {
    let Some(mut sub) = store.subscribe(trade_id).await else {
        return;
    };
    loop {
        let session = sub.snapshot();
        if session.is_resolved() {
            // The engine announced the outcome; nothing more to watch.
            return;
        }
        info!("{}", render_active(&session));
        if sub.changed().await.is_err() {
            return;
        }
    }
}
