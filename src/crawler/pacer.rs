//! Courtesy spacing between item-level requests
//!
//! Independent of rate-limit handling: even with quota to spare, items are
//! started no closer together than the configured interval, including when
//! several items are fetched concurrently.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Hands out start slots spaced at least `interval` apart
#[derive(Debug)]
pub struct Pacer {
    interval: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            next_slot: Mutex::new(None),
        }
    }

    /// Waits until the caller's slot comes up
    ///
    /// The first caller proceeds immediately; each later caller is scheduled
    /// `interval` after the previous slot.
    pub async fn wait(&self) {
        if self.interval.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
