pub mod client;
pub mod prices;

pub use client::{SettlementApi, SettlementGateway};
pub use prices::PriceFeed;
