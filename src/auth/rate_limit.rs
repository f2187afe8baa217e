use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use chrono::{DateTime, Utc, Duration};
use tracing::debug;

use crate::config::RateLimitSettings;

#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    pub window_size: Duration,
    pub max_requests: usize,
    /// Upper bound on tracked client keys.
    pub max_clients: usize,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            window_size: Duration::seconds(60),
            max_requests: 5,
            max_clients: 10_000,
        }
    }
}

impl From<&RateLimitSettings> for RateLimitConfig {
    fn from(settings: &RateLimitSettings) -> Self {
        Self {
            window_size: Duration::seconds(settings.window_seconds),
            max_requests: settings.max_requests,
            max_clients: settings.max_clients.max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Admission {
    Allowed,
    Rejected,
}

#[derive(Debug)]
struct RequestWindow {
    timestamps: Vec<DateTime<Utc>>,
}

impl RequestWindow {
    fn new() -> Self {
        Self {
            timestamps: Vec::new(),
        }
    }

    // Callers sample `now` before taking the lock, so entries are not guaranteed sorted.
    // A timestamp exactly `window_size` old is still inside `[now - window, now]`.
    fn cleanup_old_requests(&mut self, now: DateTime<Utc>, window_size: Duration) {
        self.timestamps.retain(|ts| now - *ts <= window_size);
    }

    fn add_request(&mut self, now: DateTime<Utc>) {
        self.timestamps.push(now);
    }

    fn request_count(&self) -> usize {
        self.timestamps.len()
    }

    fn last_request(&self) -> Option<DateTime<Utc>> {
        self.timestamps.iter().max().copied()
    }
}

/// Sliding-window admission per client key.
///
/// The whole map sits behind one async mutex, so two concurrent checks for
/// the same key can never both take the last free slot. The lock is only held
/// for the bookkeeping, never across a handler.
pub struct RateLimiter {
    windows: Arc<Mutex<HashMap<String, RequestWindow>>>,
    config: RateLimitConfig,
}

impl RateLimiter {
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            windows: Arc::new(Mutex::new(HashMap::new())),
            config,
        }
    }

    pub async fn admit(&self, client_key: &str, now: DateTime<Utc>) -> Admission {
        let mut windows = self.windows.lock().await;

        if !windows.contains_key(client_key) && windows.len() >= self.config.max_clients {
            self.make_room(&mut windows, now);
        }

        let window = windows
            .entry(client_key.to_string())
            .or_insert_with(RequestWindow::new);

        window.cleanup_old_requests(now, self.config.window_size);

        if window.request_count() >= self.config.max_requests {
            return Admission::Rejected;
        }

        window.add_request(now);
        Admission::Allowed
    }

    /// Drops every client whose window has emptied. Returns how many were removed.
    pub async fn cleanup(&self, now: DateTime<Utc>) -> usize {
        let mut windows = self.windows.lock().await;
        let before = windows.len();

        windows.retain(|_, window| {
            window.cleanup_old_requests(now, self.config.window_size);
            window.request_count() > 0
        });

        before - windows.len()
    }

    pub async fn tracked_clients(&self) -> usize {
        self.windows.lock().await.len()
    }

    fn make_room(&self, windows: &mut HashMap<String, RequestWindow>, now: DateTime<Utc>) {
        windows.retain(|_, window| {
            window.cleanup_old_requests(now, self.config.window_size);
            window.request_count() > 0
        });

        if windows.len() < self.config.max_clients {
            return;
        }

        let least_recent = windows
            .iter()
            .min_by_key(|(_, window)| window.last_request())
            .map(|(key, _)| key.clone());

        if let Some(key) = least_recent {
            debug!("Evicting rate limit window for {}", key);
            windows.remove(&key);
        }
    }
}
