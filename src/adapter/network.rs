//! Network reachability adapters

use std::time::Duration;

use tokio::sync::watch;
use tracing::{Level, event};

use crate::{
    domain::{constant::network, error::MehError},
    port::network::NetworkStatus
};

/// Reachability flag backed by a watch channel
///
/// Whoever knows about connectivity (a probe, a test, a `--offline` flag)
/// calls [`NetworkMonitor::set_online`]; queues observe the changes.
#[derive(Debug)]
pub struct NetworkMonitor {
    tx: watch::Sender<bool>
}

impl NetworkMonitor {
    pub fn new(online: bool) -> Self {
        let (tx, _) = watch::channel(online);
        Self { tx }
    }

    /// Update the flag; receivers are only woken on an actual change
    pub fn set_online(&self, online: bool) {
        let changed = self.tx.send_if_modified(|current| {
            if *current == online {
                return false;
            }
            *current = online;
            true
        });

        if changed {
            event!(Level::INFO, event = network::STATUS_CHANGED, online);
        }
    }
}

impl NetworkStatus for NetworkMonitor {
    fn is_online(&self) -> bool {
        *self.tx.borrow()
    }

    fn watch(&self) -> watch::Receiver<bool> {
        self.tx.subscribe()
    }
}

/// Health check against the remote API
pub struct HttpProbe {
    client: reqwest::Client,
    url:    String
}

impl HttpProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self, MehError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MehError::Configuration(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client, url: url.into() })
    }

    /// Any HTTP answer counts as reachable; only transport failures do not
    pub async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(_) => true,
            Err(e) => {
                event!(Level::DEBUG, event = network::PROBE_FAILED, url = %self.url, error = %e);
                false
            }
        }
    }

    /// Probe once and record the result on the monitor
    pub async fn refresh(&self, monitor: &NetworkMonitor) -> bool {
        let online = self.check().await;
        monitor.set_online(online);
        online
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_watchers_see_transitions() {
        let monitor = NetworkMonitor::new(false);
        let mut rx = monitor.watch();
        assert!(!monitor.is_online());

        monitor.set_online(true);
        rx.changed().await.unwrap();
        assert!(*rx.borrow_and_update());
        assert!(monitor.is_online());
    }

    #[tokio::test]
    async fn test_same_value_does_not_notify() {
        let monitor = NetworkMonitor::new(true);
        let rx = monitor.watch();

        monitor.set_online(true);
        assert!(!rx.has_changed().unwrap());
    }

    #[tokio::test]
    async fn test_probe_against_closed_port_is_offline() {
        let monitor = NetworkMonitor::new(true);
        let probe = HttpProbe::new("http://127.0.0.1:9/health", Duration::from_millis(500)).unwrap();

        assert!(!probe.refresh(&monitor).await);
        assert!(!monitor.is_online());
    }
}
