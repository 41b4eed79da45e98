//! Periodic KEV refresh bound to the process lifetime.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use tokio::task::JoinHandle;

use crate::catalog::KevCatalog;

const DEFAULT_INTERVAL_HOURS: f64 = 6.0;

/// One refresh timer per process. Armed lazily on first request, dropped
/// (and thus cancelled) on shutdown.
pub struct KevScheduler {
    handle: Option<JoinHandle<()>>,
}

impl KevScheduler {
    /// Reads `interval_hours_env`/`kill_switch_env` once at spawn time.
    /// A non-numeric or non-positive interval falls back to the default
    /// silently; the kill switch disables scheduling entirely.
    pub fn spawn(
        catalog: Arc<KevCatalog>,
        client: Client,
        interval_hours_env: Option<String>,
        kill_switch_enabled: bool,
    ) -> Self {
        if kill_switch_enabled {
            tracing::info!("KEV scheduler disabled by kill switch");
            return Self { handle: None };
        }

        let interval_hours = interval_hours_env
            .and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(DEFAULT_INTERVAL_HOURS);
        let interval = Duration::from_secs_f64(interval_hours * 3600.0);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                ticker.tick().await;
                tracing::info!("KEV scheduler firing periodic refresh");
                let outcome = catalog.refresh(&client).await;
                tracing::info!(changed = outcome.changed, "KEV scheduled refresh complete");
            }
        });

        Self { handle: Some(handle) }
    }
}

impl Drop for KevScheduler {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve_interval(env: Option<&str>) -> f64 {
        env.and_then(|v| v.parse::<f64>().ok())
            .filter(|v| v.is_finite() && *v > 0.0)
            .unwrap_or(DEFAULT_INTERVAL_HOURS)
    }

    #[test]
    fn non_numeric_env_falls_back_to_default() {
        assert_eq!(resolve_interval(Some("banana")), DEFAULT_INTERVAL_HOURS);
    }

    #[test]
    fn non_positive_env_falls_back_to_default() {
        assert_eq!(resolve_interval(Some("-1")), DEFAULT_INTERVAL_HOURS);
        assert_eq!(resolve_interval(Some("0")), DEFAULT_INTERVAL_HOURS);
    }

    #[test]
    fn valid_env_overrides_default() {
        assert_eq!(resolve_interval(Some("12")), 12.0);
    }

    #[test]
    fn missing_env_falls_back_to_default() {
        assert_eq!(resolve_interval(None), DEFAULT_INTERVAL_HOURS);
    }
}
