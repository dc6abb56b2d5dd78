// Process-local cache of active game sets.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};

use crate::domain::entities::GameSet;
use crate::domain::ports::Clock;

/// Shared handle to a resident game set. The mutex is the per-key lock: hold
/// it for any read-modify-write sequence on the game set.
pub type GameSetHandle = Arc<Mutex<ResidentGameSet>>;

/// A game set held in memory together with its access and flush bookkeeping.
#[derive(Debug)]
pub struct ResidentGameSet {
    game_set: GameSet,
    last_touched: u64,
    revision: u64,
    persisted_revision: Option<u64>,
}

impl ResidentGameSet {
    fn new(game_set: GameSet, now: u64) -> Self {
        Self {
            game_set,
            last_touched: now,
            revision: 0,
            persisted_revision: None,
        }
    }

    pub fn game_set(&self) -> &GameSet {
        &self.game_set
    }

    /// Applies a mutation and marks the game set dirty.
    pub fn modify<R>(&mut self, f: impl FnOnce(&mut GameSet) -> R) -> R {
        let result = f(&mut self.game_set);
        self.revision += 1;
        result
    }

    pub fn last_touched(&self) -> u64 {
        self.last_touched
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// True when the current revision has been written to durable storage.
    pub fn is_clean(&self) -> bool {
        self.persisted_revision == Some(self.revision)
    }

    pub fn idle_for(&self, now: u64) -> u64 {
        now.saturating_sub(self.last_touched)
    }

    pub(crate) fn touch(&mut self, now: u64) {
        self.last_touched = self.last_touched.max(now);
    }

    /// Records a successful flush of `revision`. Later mutations keep the
    /// entry dirty.
    pub(crate) fn mark_persisted(&mut self, revision: u64) {
        if revision == self.revision {
            self.persisted_revision = Some(revision);
        }
    }
}

/// Mapping from game-set id to its resident copy.
///
/// Lock order is map lock first, entry lock second. Code holding an entry
/// lock must not call back into the storage.
pub struct GameSetStorage {
    entries: RwLock<HashMap<i64, GameSetHandle>>,
    clock: Arc<dyn Clock>,
}

impl GameSetStorage {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn now(&self) -> u64 {
        self.clock.now_epoch_seconds()
    }

    /// Returns the resident game set and refreshes its last-touched time.
    /// Never loads from durable storage.
    pub async fn get(&self, id: i64) -> Option<GameSetHandle> {
        let handle = {
            let entries = self.entries.read().await;
            entries.get(&id).cloned()
        }?;
        handle.lock().await.touch(self.now());
        Some(handle)
    }

    /// Like [`GameSetStorage::get`] but leaves the last-touched time alone.
    /// Listings use this so browsing does not keep game sets resident.
    pub async fn peek(&self, id: i64) -> Option<GameSetHandle> {
        let entries = self.entries.read().await;
        entries.get(&id).cloned()
    }

    /// Inserts or replaces the resident game set for `id`.
    pub async fn put(&self, id: i64, game_set: GameSet) -> GameSetHandle {
        let handle = Arc::new(Mutex::new(ResidentGameSet::new(game_set, self.now())));
        let mut entries = self.entries.write().await;
        entries.insert(id, handle.clone());
        handle
    }

    /// Inserts `game_set` unless another caller made `id` resident first, in
    /// which case the existing entry wins and is returned touched.
    pub async fn put_if_absent(&self, id: i64, game_set: GameSet) -> GameSetHandle {
        let now = self.now();
        let mut entries = self.entries.write().await;
        let existing = entries.get(&id).cloned();
        if let Some(existing) = existing {
            drop(entries);
            existing.lock().await.touch(now);
            return existing;
        }
        let handle = Arc::new(Mutex::new(ResidentGameSet::new(game_set, now)));
        entries.insert(id, handle.clone());
        handle
    }

    /// Drops the resident copy without persisting it.
    pub async fn remove(&self, id: i64) -> Option<GameSetHandle> {
        let mut entries = self.entries.write().await;
        entries.remove(&id)
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn contains(&self, id: i64) -> bool {
        self.entries.read().await.contains_key(&id)
    }

    /// Removes `id` only if `handle` is still its resident object. Returns
    /// whether anything was removed.
    pub(crate) async fn discard(&self, id: i64, handle: &GameSetHandle) -> bool {
        let mut entries = self.entries.write().await;
        match entries.get(&id) {
            Some(current) if Arc::ptr_eq(current, handle) => {
                entries.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// All resident handles at this instant.
    pub async fn snapshot(&self) -> Vec<(i64, GameSetHandle)> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .map(|(id, handle)| (*id, handle.clone()))
            .collect()
    }

    /// Removes each candidate that is still the resident object for its id,
    /// is clean, and has been idle for at least `idle_threshold` seconds.
    /// Entries locked by a request are in use and skipped.
    pub(crate) async fn evict_idle(
        &self,
        candidates: Vec<(i64, GameSetHandle)>,
        idle_threshold: u64,
    ) -> Vec<i64> {
        let now = self.now();
        let mut entries = self.entries.write().await;
        let mut evicted = Vec::new();
        for (id, handle) in candidates {
            let Some(current) = entries.get(&id) else {
                continue;
            };
            if !Arc::ptr_eq(current, &handle) {
                continue;
            }
            let eligible = match handle.try_lock() {
                Ok(entry) => entry.is_clean() && entry.idle_for(now) >= idle_threshold,
                Err(_) => false,
            };
            if eligible {
                entries.remove(&id);
                evicted.push(id);
            }
        }
        evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::use_cases::test_support::{sample_game_set, SettableClock};

    fn storage_at(now: u64) -> (GameSetStorage, Arc<SettableClock>) {
        let clock = Arc::new(SettableClock::new(now));
        (GameSetStorage::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn when_game_set_is_put_then_get_returns_equal_game_set() {
        let (storage, _) = storage_at(1_000);
        let game_set = sample_game_set(5, "Crypt");

        storage.put(5, game_set.clone()).await;

        let handle = storage.get(5).await.expect("expected resident game set");
        assert_eq!(handle.lock().await.game_set(), &game_set);
    }

    #[tokio::test]
    async fn when_key_was_never_put_then_get_returns_none() {
        let (storage, _) = storage_at(1_000);
        storage.put(1, sample_game_set(1, "A")).await;

        assert!(storage.get(2).await.is_none());
    }

    #[tokio::test]
    async fn when_key_is_removed_then_get_returns_none() {
        let (storage, _) = storage_at(1_000);
        storage.put(3, sample_game_set(3, "A")).await;

        assert!(storage.remove(3).await.is_some());
        assert!(storage.get(3).await.is_none());
        assert!(storage.remove(3).await.is_none());
    }

    #[tokio::test]
    async fn when_key_is_put_twice_then_latest_game_set_is_resident() {
        let (storage, _) = storage_at(1_000);
        storage.put(4, sample_game_set(4, "Old")).await;
        storage.put(4, sample_game_set(4, "New")).await;

        let handle = storage.get(4).await.expect("expected resident game set");
        assert_eq!(handle.lock().await.game_set().name, "New");
        assert_eq!(storage.len().await, 1);
    }

    #[tokio::test]
    async fn when_put_if_absent_races_existing_entry_then_existing_wins() {
        let (storage, _) = storage_at(1_000);
        let first = storage.put(8, sample_game_set(8, "First")).await;

        let second = storage.put_if_absent(8, sample_game_set(8, "Second")).await;

        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.lock().await.game_set().name, "First");
    }

    #[tokio::test]
    async fn when_get_is_called_then_last_touched_moves_forward() {
        let (storage, clock) = storage_at(1_000);
        storage.put(9, sample_game_set(9, "A")).await;

        clock.set(1_500);
        let handle = storage.get(9).await.expect("expected resident game set");

        assert_eq!(handle.lock().await.last_touched(), 1_500);
    }

    #[tokio::test]
    async fn when_peek_is_called_then_last_touched_is_unchanged() {
        let (storage, clock) = storage_at(1_000);
        storage.put(6, sample_game_set(6, "A")).await;

        clock.set(1_500);
        let handle = storage.peek(6).await.expect("expected resident game set");

        assert_eq!(handle.lock().await.last_touched(), 1_000);
        assert!(storage.peek(7).await.is_none());
    }

    #[tokio::test]
    async fn when_game_set_is_modified_after_flush_then_it_is_dirty_again() {
        let (storage, _) = storage_at(1_000);
        let handle = storage.put(10, sample_game_set(10, "A")).await;
        let mut entry = handle.lock().await;

        assert!(!entry.is_clean());
        let revision = entry.revision();
        entry.mark_persisted(revision);
        assert!(entry.is_clean());

        entry.modify(|game_set| game_set.name = "B".to_string());
        assert!(!entry.is_clean());

        // A flush of the old revision must not clean the newer one.
        entry.mark_persisted(revision);
        assert!(!entry.is_clean());
    }

    #[tokio::test]
    async fn when_candidate_was_replaced_then_evict_idle_keeps_replacement() {
        let (storage, clock) = storage_at(0);
        let stale = storage.put(11, sample_game_set(11, "A")).await;
        {
            let mut entry = stale.lock().await;
            let revision = entry.revision();
            entry.mark_persisted(revision);
        }
        storage.put(11, sample_game_set(11, "B")).await;
        clock.set(10_000);

        let evicted = storage.evict_idle(vec![(11, stale)], 900).await;

        assert!(evicted.is_empty());
        assert!(storage.contains(11).await);
    }

    #[tokio::test]
    async fn when_candidate_is_locked_then_evict_idle_skips_it() {
        let (storage, clock) = storage_at(0);
        let handle = storage.put(12, sample_game_set(12, "A")).await;
        let mut entry = handle.lock().await;
        let revision = entry.revision();
        entry.mark_persisted(revision);
        clock.set(10_000);

        let evicted = storage.evict_idle(vec![(12, handle.clone())], 900).await;

        assert!(evicted.is_empty());
        drop(entry);
        let evicted = storage.evict_idle(vec![(12, handle)], 900).await;
        assert_eq!(evicted, vec![12]);
    }

    #[tokio::test]
    async fn when_discarding_a_replaced_handle_then_the_replacement_stays() {
        let (storage, _) = storage_at(1_000);
        let stale = storage.put(12, sample_game_set(12, "A")).await;
        let current = storage.put(12, sample_game_set(12, "B")).await;

        assert!(!storage.discard(12, &stale).await);
        assert!(storage.contains(12).await);

        assert!(storage.discard(12, &current).await);
        assert!(!storage.contains(12).await);
    }
}
