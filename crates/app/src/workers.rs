//! Periodic background passes.
//!
//! Each worker runs one pass per tick on its own tokio task. A failing pass is
//! logged and retried on the next tick; the loop exits only on shutdown.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use regdesk_infra::config::WorkerConfig;

use crate::error::UsecaseResult;
use crate::services::AppServices;

pub const CANCEL_EXPIRED_INSCRIPTIONS: &str = "cancel-expired-inscriptions";
pub const CLEANUP_GUEST_INSCRIPTIONS: &str = "cleanup-guest-inscriptions";

pub struct WorkerHandle {
    name: &'static str,
    shutdown: Arc<Notify>,
    task: JoinHandle<()>,
}

impl WorkerHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Signal the worker and wait for its loop to exit.
    pub async fn stop(self) {
        self.shutdown.notify_one();
        if let Err(e) = self.task.await {
            warn!(worker = self.name, error = %e, "worker task ended abnormally");
        }
    }
}

/// Run `pass` every `period` until stopped. The first pass runs immediately.
pub fn spawn_worker<F, Fut>(name: &'static str, period: Duration, pass: F) -> WorkerHandle
where
    F: Fn() -> Fut + Send + 'static,
    Fut: Future<Output = UsecaseResult<u64>> + Send + 'static,
{
    let shutdown = Arc::new(Notify::new());
    let signal = shutdown.clone();

    let task = tokio::spawn(async move {
        info!(worker = name, period_secs = period.as_secs(), "worker started");
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = signal.notified() => {
                    info!(worker = name, "worker received shutdown signal");
                    break;
                }
                _ = ticker.tick() => {
                    match pass().await {
                        Ok(0) => debug!(worker = name, "nothing to do"),
                        Ok(count) => info!(worker = name, count, "worker pass finished"),
                        Err(e) => error!(worker = name, code = e.code, error = %e, "worker pass failed"),
                    }
                }
            }
        }
        info!(worker = name, "worker stopped");
    });

    WorkerHandle { name, shutdown, task }
}

/// Expired-inscription and guest-cleanup workers.
pub fn spawn_default_workers(services: &AppServices, config: &WorkerConfig) -> Vec<WorkerHandle> {
    let expired = services.clone();
    let guests = services.clone();
    vec![
        spawn_worker(
            CANCEL_EXPIRED_INSCRIPTIONS,
            Duration::from_secs(config.expired_interval_secs.max(1)),
            move || {
                let services = expired.clone();
                async move { services.cancel_expired().await }
            },
        ),
        spawn_worker(
            CLEANUP_GUEST_INSCRIPTIONS,
            Duration::from_secs(config.guest_interval_secs.max(1)),
            move || {
                let services = guests.clone();
                async move { services.cleanup_guests().await }
            },
        ),
    ]
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::error::UsecaseError;

    use super::*;

    async fn wait_for(counter: &AtomicU64, at_least: u64) {
        for _ in 0..200 {
            if counter.load(Ordering::SeqCst) >= at_least {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("worker ran {} time(s), expected {at_least}", counter.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn worker_runs_until_stopped() {
        let runs = Arc::new(AtomicU64::new(0));
        let seen = runs.clone();
        let handle = spawn_worker("counter", Duration::from_millis(5), move || {
            let seen = seen.clone();
            async move { Ok(seen.fetch_add(1, Ordering::SeqCst)) }
        });
        assert_eq!(handle.name(), "counter");

        wait_for(&runs, 3).await;
        handle.stop().await;

        let after_stop = runs.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(runs.load(Ordering::SeqCst), after_stop);
    }

    #[tokio::test]
    async fn failing_passes_do_not_end_the_loop() {
        let attempts = Arc::new(AtomicU64::new(0));
        let seen = attempts.clone();
        let handle = spawn_worker("flaky", Duration::from_millis(5), move || {
            let seen = seen.clone();
            async move {
                seen.fetch_add(1, Ordering::SeqCst);
                Err(UsecaseError::internal("database unavailable"))
            }
        });

        wait_for(&attempts, 3).await;
        handle.stop().await;
    }

    #[tokio::test]
    async fn default_workers_start_and_stop() {
        let services = AppServices::in_memory();
        let config = WorkerConfig {
            expired_interval_secs: 1,
            guest_interval_secs: 1,
        };
        let handles = spawn_default_workers(&services, &config);
        let names: Vec<_> = handles.iter().map(|h| h.name()).collect();
        assert_eq!(names, vec![CANCEL_EXPIRED_INSCRIPTIONS, CLEANUP_GUEST_INSCRIPTIONS]);

        for handle in handles {
            handle.stop().await;
        }
    }
}
