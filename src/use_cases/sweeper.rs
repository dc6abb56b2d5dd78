// Background flush-then-evict loop over resident game sets.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::entities::GameSet;
use crate::domain::errors::StorageError;
use crate::domain::ports::GameSetPersister;
use crate::use_cases::game_set_storage::GameSetStorage;

/// Timing knobs for the sweeper.
#[derive(Debug, Clone)]
pub struct SweeperSettings {
    /// Pause between the end of one cycle and the start of the next.
    pub sweep_interval: Duration,
    /// Inactivity after which a flushed game set is evicted.
    pub idle_threshold: Duration,
    /// Upper bound for a single persist call.
    pub persist_timeout: Duration,
}

impl Default for SweeperSettings {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(900),
            persist_timeout: Duration::from_secs(5),
        }
    }
}

/// Outcome of a single sweep cycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub flushed: usize,
    pub failed: usize,
    pub evicted: usize,
    /// Resident copies dropped because their durable row was deleted.
    pub discarded: usize,
}

/// Running totals across cycles, readable while the sweeper runs.
#[derive(Debug, Default)]
pub struct SweepStats {
    cycles: AtomicU64,
    flushed: AtomicU64,
    persist_failures: AtomicU64,
    evicted: AtomicU64,
    discarded: AtomicU64,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepTotals {
    pub cycles: u64,
    pub flushed: u64,
    pub persist_failures: u64,
    pub evicted: u64,
    pub discarded: u64,
}

impl SweepStats {
    fn record(&self, report: &SweepReport) {
        self.cycles.fetch_add(1, Ordering::Relaxed);
        self.flushed
            .fetch_add(report.flushed as u64, Ordering::Relaxed);
        self.persist_failures
            .fetch_add(report.failed as u64, Ordering::Relaxed);
        self.evicted
            .fetch_add(report.evicted as u64, Ordering::Relaxed);
        self.discarded
            .fetch_add(report.discarded as u64, Ordering::Relaxed);
    }

    pub fn totals(&self) -> SweepTotals {
        SweepTotals {
            cycles: self.cycles.load(Ordering::Relaxed),
            flushed: self.flushed.load(Ordering::Relaxed),
            persist_failures: self.persist_failures.load(Ordering::Relaxed),
            evicted: self.evicted.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
        }
    }
}

// Result of flushing one resident game set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flush {
    Persisted,
    Failed,
    Gone,
}

/// Periodically persists every resident game set and evicts the idle ones
/// whose flush succeeded.
pub struct GameSetSweeper {
    storage: Arc<GameSetStorage>,
    persister: Arc<dyn GameSetPersister>,
    settings: SweeperSettings,
    stats: Arc<SweepStats>,
}

impl GameSetSweeper {
    pub fn new(
        storage: Arc<GameSetStorage>,
        persister: Arc<dyn GameSetPersister>,
        settings: SweeperSettings,
    ) -> Self {
        Self {
            storage,
            persister,
            settings,
            stats: Arc::new(SweepStats::default()),
        }
    }

    pub fn stats(&self) -> Arc<SweepStats> {
        self.stats.clone()
    }

    /// Runs one flush-then-evict pass.
    pub async fn run_cycle(&self) -> SweepReport {
        // Snapshot each entry under its own lock so the flush sees a
        // consistent aggregate and we know which revision it covers.
        let mut snapshots = Vec::new();
        for (id, handle) in self.storage.snapshot().await {
            let (revision, game_set) = {
                let entry = handle.lock().await;
                (entry.revision(), entry.game_set().clone())
            };
            snapshots.push((id, handle, revision, game_set));
        }

        let outcomes = join_all(
            snapshots
                .iter()
                .map(|(_, _, _, game_set)| self.persist_one(game_set)),
        )
        .await;

        let idle_threshold = self.settings.idle_threshold.as_secs();
        let now = self.storage.now();
        let mut report = SweepReport::default();
        let mut candidates = Vec::new();
        for ((id, handle, revision, _), outcome) in snapshots.into_iter().zip(outcomes) {
            match outcome {
                Flush::Persisted => report.flushed += 1,
                Flush::Failed => {
                    report.failed += 1;
                    continue;
                }
                Flush::Gone => {
                    // Hydrated from a row that was deleted since; nothing
                    // would ever reach storage again.
                    if self.storage.discard(id, &handle).await {
                        info!(game_set_id = id, "dropped resident copy of deleted game set");
                        report.discarded += 1;
                    }
                    continue;
                }
            }
            let eligible = {
                let mut entry = handle.lock().await;
                entry.mark_persisted(revision);
                entry.is_clean() && entry.idle_for(now) >= idle_threshold
            };
            if eligible {
                candidates.push((id, handle));
            }
        }

        let evicted = self.storage.evict_idle(candidates, idle_threshold).await;
        for id in &evicted {
            debug!(game_set_id = id, "evicted idle game set");
        }
        report.evicted = evicted.len();

        self.stats.record(&report);
        report
    }

    async fn persist_one(&self, game_set: &GameSet) -> Flush {
        match tokio::time::timeout(
            self.settings.persist_timeout,
            self.persister.persist(game_set),
        )
        .await
        {
            Ok(Ok(())) => Flush::Persisted,
            Ok(Err(StorageError::NotFound)) => Flush::Gone,
            Ok(Err(err)) => {
                warn!(game_set_id = game_set.id, error = %err, "failed to persist game set");
                Flush::Failed
            }
            Err(_) => {
                warn!(
                    game_set_id = game_set.id,
                    timeout_ms = self.settings.persist_timeout.as_millis() as u64,
                    "persisting game set timed out"
                );
                Flush::Failed
            }
        }
    }

    /// Spawns the sweep loop on the current tokio runtime.
    pub fn start(self: Arc<Self>) -> SweeperHandle {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let task = tokio::spawn(self.run(shutdown_rx));
        SweeperHandle { shutdown_tx, task }
    }

    async fn run(self: Arc<Self>, mut shutdown_rx: watch::Receiver<bool>) {
        info!(
            sweep_interval_secs = self.settings.sweep_interval.as_secs(),
            idle_threshold_secs = self.settings.idle_threshold.as_secs(),
            "game set sweeper started"
        );

        while !*shutdown_rx.borrow() {
            let report = self.run_cycle().await;
            debug!(
                flushed = report.flushed,
                failed = report.failed,
                evicted = report.evicted,
                discarded = report.discarded,
                "sweep cycle finished"
            );

            tokio::select! {
                _ = tokio::time::sleep(self.settings.sweep_interval) => {}
                changed = shutdown_rx.changed() => {
                    // A dropped handle counts as a stop request.
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        // Last flush so a clean shutdown loses nothing.
        let report = self.run_cycle().await;
        info!(
            flushed = report.flushed,
            failed = report.failed,
            "game set sweeper stopped"
        );
    }
}

/// Controls a running sweeper task.
pub struct SweeperHandle {
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }

    /// Requests a stop and waits for the in-flight cycle and the final
    /// flush to finish.
    pub async fn stop(self) {
        let _ = self.shutdown_tx.send(true);
        if let Err(err) = self.task.await {
            warn!(error = %err, "game set sweeper task failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{sample_game_set, ScriptedPersister, SettableClock};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    const NOW: u64 = 1_700_000_000;

    fn settings() -> SweeperSettings {
        SweeperSettings {
            sweep_interval: Duration::from_secs(60),
            idle_threshold: Duration::from_secs(900),
            persist_timeout: Duration::from_millis(200),
        }
    }

    // Puts a game set that was last touched `age` seconds before NOW.
    async fn put_aged(storage: &GameSetStorage, clock: &SettableClock, id: i64, age: u64) {
        clock.set(NOW - age);
        storage.put(id, sample_game_set(id, "Set")).await;
        clock.set(NOW);
    }

    fn build(persister: Arc<dyn GameSetPersister>) -> (Arc<GameSetStorage>, Arc<SettableClock>, GameSetSweeper) {
        let clock = Arc::new(SettableClock::new(NOW));
        let storage = Arc::new(GameSetStorage::new(clock.clone()));
        let sweeper = GameSetSweeper::new(storage.clone(), persister, settings());
        (storage, clock, sweeper)
    }

    #[tokio::test]
    async fn when_both_persists_succeed_then_only_the_idle_game_set_is_evicted() {
        let persister = Arc::new(ScriptedPersister::new());
        let (storage, clock, sweeper) = build(persister.clone());
        put_aged(&storage, &clock, 1, 1_000).await;
        put_aged(&storage, &clock, 2, 10).await;

        let report = sweeper.run_cycle().await;

        assert_eq!(
            report,
            SweepReport {
                flushed: 2,
                failed: 0,
                evicted: 1,
                discarded: 0
            }
        );
        assert!(!storage.contains(1).await);
        assert!(storage.contains(2).await);
        assert_eq!(persister.persisted_ids(), vec![1, 2]);
    }

    #[tokio::test]
    async fn when_persist_fails_then_idle_game_set_stays_resident() {
        let persister = Arc::new(ScriptedPersister::new().failing_for([1]));
        let (storage, clock, sweeper) = build(persister);
        put_aged(&storage, &clock, 1, 1_000).await;

        let report = sweeper.run_cycle().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted, 0);
        assert!(storage.contains(1).await);
    }

    #[tokio::test]
    async fn when_one_persist_fails_then_the_other_game_set_is_still_evicted() {
        let persister = Arc::new(ScriptedPersister::new().failing_for([1]));
        let (storage, clock, sweeper) = build(persister);
        put_aged(&storage, &clock, 1, 1_000).await;
        put_aged(&storage, &clock, 2, 1_000).await;

        let report = sweeper.run_cycle().await;

        assert_eq!(report.flushed, 1);
        assert_eq!(report.failed, 1);
        assert!(storage.contains(1).await);
        assert!(!storage.contains(2).await);
    }

    #[tokio::test]
    async fn when_failed_persist_recovers_then_next_cycle_evicts() {
        let persister = Arc::new(ScriptedPersister::new().failing_for([1]));
        let (storage, clock, sweeper) = build(persister.clone());
        put_aged(&storage, &clock, 1, 1_000).await;

        sweeper.run_cycle().await;
        assert!(storage.contains(1).await);

        persister.clear_failures();
        let report = sweeper.run_cycle().await;

        assert_eq!(report.evicted, 1);
        assert!(!storage.contains(1).await);
    }

    #[tokio::test]
    async fn when_durable_row_is_gone_then_resident_copy_is_discarded() {
        let persister = Arc::new(ScriptedPersister::new().missing_for([1]));
        let (storage, clock, sweeper) = build(persister);
        put_aged(&storage, &clock, 1, 5).await;
        put_aged(&storage, &clock, 2, 5).await;

        let report = sweeper.run_cycle().await;

        assert_eq!(
            report,
            SweepReport {
                flushed: 1,
                failed: 0,
                evicted: 0,
                discarded: 1
            }
        );
        assert!(!storage.contains(1).await);
        assert!(storage.contains(2).await);
        assert_eq!(sweeper.stats().totals().discarded, 1);
    }

    #[tokio::test]
    async fn when_idle_time_reaches_threshold_exactly_then_game_set_is_evicted() {
        let (storage, clock, sweeper) = build(Arc::new(ScriptedPersister::new()));
        put_aged(&storage, &clock, 1, 900).await;
        put_aged(&storage, &clock, 2, 899).await;

        sweeper.run_cycle().await;

        assert!(!storage.contains(1).await);
        assert!(storage.contains(2).await);
    }

    #[tokio::test]
    async fn when_game_set_is_modified_during_flush_then_it_is_not_evicted() {
        struct GatedPersister {
            entered: Notify,
            release: Notify,
        }

        #[async_trait]
        impl GameSetPersister for GatedPersister {
            async fn persist(&self, _game_set: &GameSet) -> Result<(), StorageError> {
                self.entered.notify_one();
                self.release.notified().await;
                Ok(())
            }
        }

        let persister = Arc::new(GatedPersister {
            entered: Notify::new(),
            release: Notify::new(),
        });
        let (storage, clock, sweeper) = build(persister.clone());
        let sweeper = Arc::new(sweeper);
        put_aged(&storage, &clock, 1, 1_000).await;
        let handle = storage.snapshot().await.remove(0).1;

        let cycle = tokio::spawn({
            let sweeper = sweeper.clone();
            async move { sweeper.run_cycle().await }
        });
        persister.entered.notified().await;
        handle
            .lock()
            .await
            .modify(|game_set| game_set.name = "Renamed".to_string());
        persister.release.notify_one();

        let report = cycle.await.expect("cycle task panicked");

        assert_eq!(report.flushed, 1);
        assert_eq!(report.evicted, 0);
        assert!(storage.contains(1).await);
        assert!(!handle.lock().await.is_clean());
    }

    #[tokio::test]
    async fn when_persist_hangs_then_it_times_out_without_blocking_others() {
        let persister = Arc::new(ScriptedPersister::new().hanging_for([1]));
        let (storage, clock, sweeper) = build(persister);
        put_aged(&storage, &clock, 1, 1_000).await;
        put_aged(&storage, &clock, 2, 1_000).await;

        let report = sweeper.run_cycle().await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.evicted, 1);
        assert!(storage.contains(1).await);
        assert!(!storage.contains(2).await);
    }

    #[tokio::test]
    async fn when_cycles_run_then_stats_accumulate() {
        let persister = Arc::new(ScriptedPersister::new().failing_for([3]));
        let (storage, clock, sweeper) = build(persister);
        put_aged(&storage, &clock, 1, 1_000).await;
        put_aged(&storage, &clock, 3, 5).await;

        sweeper.run_cycle().await;
        sweeper.run_cycle().await;

        assert_eq!(
            sweeper.stats().totals(),
            SweepTotals {
                cycles: 2,
                flushed: 1,
                persist_failures: 2,
                evicted: 1,
                discarded: 0
            }
        );
    }

    #[tokio::test]
    async fn when_sweeper_is_stopped_then_it_flushes_and_finishes() {
        let persister = Arc::new(ScriptedPersister::new());
        let clock = Arc::new(SettableClock::new(NOW));
        let storage = Arc::new(GameSetStorage::new(clock.clone()));
        storage.put(1, sample_game_set(1, "Set")).await;
        let sweeper = Arc::new(GameSetSweeper::new(
            storage.clone(),
            persister.clone(),
            SweeperSettings {
                sweep_interval: Duration::from_millis(10),
                ..settings()
            },
        ));
        let stats = sweeper.stats();

        let handle = sweeper.start();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(handle.is_running());
        handle.stop().await;

        let totals = stats.totals();
        assert!(totals.cycles >= 2, "expected periodic and final cycles");
        assert_eq!(totals.flushed, totals.cycles);
        // Recently touched game sets survive shutdown flushes.
        assert!(storage.contains(1).await);
    }
}
