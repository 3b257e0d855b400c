//! Connectivity probe.

use crate::backend::Backend;
use crate::consts::cli_consts::probe;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionStatus {
    Connected,
    /// Carries the failure that made the backend unreachable.
    Disconnected(String),
}

impl ConnectionStatus {
    pub fn is_connected(&self) -> bool {
        matches!(self, ConnectionStatus::Connected)
    }
}

/// Issues one minimal read. Any failure, HTTP or transport, means
/// disconnected; there is no retry.
pub async fn check_connection(backend: &dyn Backend) -> ConnectionStatus {
    match backend.ping().await {
        Ok(()) => ConnectionStatus::Connected,
        Err(e) => {
            log::debug!("Connectivity probe failed: {}", e);
            ConnectionStatus::Disconnected(e.to_string())
        }
    }
}

/// Probes every `interval` and reports each status change (including the
/// first result). Stops when `on_change` returns false.
pub async fn watch_connection<F>(backend: &dyn Backend, interval: Duration, mut on_change: F)
where
    F: FnMut(&ConnectionStatus) -> bool,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut last: Option<ConnectionStatus> = None;

    loop {
        ticker.tick().await;
        let status = check_connection(backend).await;
        if last.as_ref() != Some(&status) {
            if !on_change(&status) {
                return;
            }
            last = Some(status);
        }
    }
}

/// Default interval for [`watch_connection`].
pub fn default_watch_interval() -> Duration {
    probe::watch_interval()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::backend::error::BackendError;
    use mockall::Sequence;

    #[tokio::test]
    async fn connected_on_successful_read() {
        let mut backend = MockBackend::new();
        backend.expect_ping().times(1).returning(|| Ok(()));
        assert_eq!(check_connection(&backend).await, ConnectionStatus::Connected);
    }

    #[tokio::test]
    async fn any_error_is_disconnected_without_retry() {
        let mut backend = MockBackend::new();
        backend.expect_ping().times(1).returning(|| {
            Err(BackendError::Http {
                status: 503,
                message: "unavailable".to_string(),
            })
        });
        let status = check_connection(&backend).await;
        assert!(!status.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn watch_reports_only_changes() {
        let mut backend = MockBackend::new();
        let mut seq = Sequence::new();
        backend
            .expect_ping()
            .times(2)
            .in_sequence(&mut seq)
            .returning(|| Ok(()));
        backend
            .expect_ping()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|| Err(BackendError::Timeout(Duration::from_secs(30))));

        let mut seen = Vec::new();
        watch_connection(&backend, Duration::from_secs(30), |status| {
            seen.push(status.clone());
            seen.len() < 2
        })
        .await;

        assert_eq!(seen[0], ConnectionStatus::Connected);
        assert!(!seen[1].is_connected());
    }
}
