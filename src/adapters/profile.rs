use log::{debug, info};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Balance refresh collaborator. The authoritative balance lives with the
/// external profile service; this only signals it to re-fetch, coalescing
/// signals that arrive inside the minimum interval.
pub struct ProfileHandle {
    min_interval: Duration,
    last_refresh: Mutex<Option<Instant>>,
}

impl ProfileHandle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_refresh: Mutex::new(None),
        }
    }

    /// Returns true if a refresh was actually dispatched.
    pub async fn refresh_balance(&self) -> bool {
        let mut last = self.last_refresh.lock().await;
        if let Some(at) = *last {
            if at.elapsed() < self.min_interval {
                debug!("balance refresh coalesced, last one {:?} ago", at.elapsed());
                return false;
            }
        }
        *last = Some(Instant::now());
        info!("balance refresh requested");
        true
    }
}
