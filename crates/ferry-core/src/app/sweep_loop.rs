//! SweepLoop - 期限切れファイルの回収
//!
//! # フロー
//! 1. 起動直後に一度、その後は固定間隔で `EphemeralStore::sweep_expired()` を実行
//! 2. 個々の削除失敗はレポートに数えるだけ（ループは止めない）
//! 3. `CancellationToken` でシャットダウン

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::store::EphemeralStore;

/// SweepLoop は一つの長寿命タスクとして動く（自己再スケジュールはしない）
pub struct SweepLoop {
    store: Arc<EphemeralStore>,
    interval: Duration,
}

impl SweepLoop {
    pub fn new(store: Arc<EphemeralStore>, interval: Duration) -> Self {
        Self { store, interval }
    }

    /// Uses the interval from the store's configuration.
    pub fn from_config(store: Arc<EphemeralStore>) -> Self {
        let interval = store.config().sweep_interval;
        Self::new(store, interval)
    }

    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(self.run(shutdown))
    }

    pub async fn run(self, shutdown: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        tracing::info!(interval_secs = self.interval.as_secs(), "sweep loop started");

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    let report = self.store.sweep_expired().await;
                    if report.evicted > 0 || report.failures() > 0 {
                        tracing::info!(
                            evicted = report.evicted,
                            deferred = report.deferred,
                            missing = report.missing,
                            failed = report.failed,
                            "sweep finished"
                        );
                    } else {
                        tracing::debug!("sweep finished, nothing expired");
                    }
                }
            }
        }

        tracing::info!("sweep loop stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::StoreConfig;
    use crate::impls::InMemoryBlobStore;
    use crate::ports::FixedClock;
    use chrono::{TimeZone, Utc};

    fn store(clock: &FixedClock) -> (Arc<EphemeralStore>, Arc<InMemoryBlobStore>) {
        let blobs = Arc::new(InMemoryBlobStore::new());
        let store = EphemeralStore::new(StoreConfig::default(), blobs.clone()).with_clock(clock.clone());
        (Arc::new(store), blobs)
    }

    #[tokio::test(start_paused = true)]
    async fn sweeps_on_start_and_every_interval() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let (store, blobs) = store(&clock);
        let interval = Duration::from_secs(300);

        store.put(&b"a"[..], "a.pdf").await.unwrap();
        clock.advance(chrono::Duration::minutes(10));

        let shutdown = CancellationToken::new();
        let handle = SweepLoop::new(Arc::clone(&store), interval).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(store.is_empty());
        assert!(blobs.is_empty());

        store.put(&b"b"[..], "b.pdf").await.unwrap();
        clock.advance(chrono::Duration::minutes(10));
        assert_eq!(store.len(), 1);

        tokio::time::sleep(interval).await;
        assert!(store.is_empty());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn leaves_live_entries_alone() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let (store, _blobs) = store(&clock);
        store.put(&b"a"[..], "a.pdf").await.unwrap();

        let shutdown = CancellationToken::new();
        let handle = SweepLoop::from_config(Arc::clone(&store)).spawn(shutdown.clone());

        tokio::time::sleep(Duration::from_secs(301)).await;
        assert_eq!(store.len(), 1);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn stops_when_cancelled() {
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap());
        let (store, _blobs) = store(&clock);

        let shutdown = CancellationToken::new();
        shutdown.cancel();
        SweepLoop::new(store, Duration::from_secs(1))
            .run(shutdown)
            .await;
    }
}
