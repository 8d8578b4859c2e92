// Copyright (c) 2022 BITXOR LABS <info@bitxor.io>

use crate::changes::{CacheChanges, SubCacheChanges};
use crate::dependent_state::DependentState;
use crate::error::CacheError;
use crate::state_hash::{merkle_root, StateHashInfo};
use crate::sub_cache::{
    MergedEntries, SubCacheDescriptor, SubCacheEntries, SubCacheId, SubCacheModifier,
    SubCacheOverlay, SubCacheReader,
};
use bitxor_db_exports::{CacheDbBatch, ShareableCacheDatabase};
use bitxor_hash::Hash;
use bitxor_models::height::Height;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Cache construction parameters
#[derive(Clone, Default)]
pub struct CacheConfiguration {
    /// whether state hashes are calculated
    pub enable_verifiable_state: bool,
    /// database receiving every commit, when cache database storage is enabled
    pub database: Option<ShareableCacheDatabase>,
}

#[derive(Debug)]
struct CacheSnapshot {
    height: Height,
    dependent_state: DependentState,
    sub_caches: Vec<Arc<SubCacheEntries>>,
    state_roots: Vec<Hash>,
}

impl CacheSnapshot {
    fn empty() -> Self {
        CacheSnapshot {
            height: Height(0),
            dependent_state: DependentState::default(),
            sub_caches: SubCacheId::ALL
                .iter()
                .map(|_| Arc::new(SubCacheEntries::new()))
                .collect(),
            state_roots: Vec::new(),
        }
    }
}

/// Ledger state cache: committed snapshot plus commit logic
pub struct CoreCache {
    enable_verifiable_state: bool,
    database: Option<ShareableCacheDatabase>,
    snapshot: RwLock<Arc<CacheSnapshot>>,
}

impl CoreCache {
    /// Empty cache at height zero
    pub fn new(config: CacheConfiguration) -> Self {
        CoreCache {
            enable_verifiable_state: config.enable_verifiable_state,
            database: config.database,
            snapshot: RwLock::new(Arc::new(CacheSnapshot::empty())),
        }
    }

    /// Whether state hashes are calculated
    pub fn enable_verifiable_state(&self) -> bool {
        self.enable_verifiable_state
    }

    /// Backing database, if any
    pub fn database(&self) -> Option<&ShareableCacheDatabase> {
        self.database.as_ref()
    }

    /// Committed height
    pub fn height(&self) -> Height {
        self.snapshot.read().height
    }

    /// Read-only view of the committed state
    pub fn create_view(&self) -> CacheView {
        CacheView {
            snapshot: self.snapshot.read().clone(),
            enable_verifiable_state: self.enable_verifiable_state,
        }
    }

    /// Empty delta on top of the committed state
    pub fn create_delta(&self) -> CacheDelta {
        let base = self.snapshot.read().clone();
        CacheDelta {
            overlays: SubCacheId::ALL
                .iter()
                .map(|_| SubCacheOverlay::new())
                .collect(),
            dependent_state: base.dependent_state,
            state_roots: None,
            base,
            enable_verifiable_state: self.enable_verifiable_state,
        }
    }

    /// Commits `delta` at `height`, which must be above the committed height
    pub fn commit(&self, delta: CacheDelta, height: Height) -> Result<(), CacheError> {
        let mut snapshot = self.snapshot.write();
        if height <= snapshot.height {
            return Err(CacheError::NonMonotonicCommit {
                height,
                cache_height: snapshot.height,
            });
        }
        self.commit_locked(&mut snapshot, delta, height)
    }

    /// Commits `delta` again at the committed height, replacing the committed content
    pub fn recommit(&self, delta: CacheDelta) -> Result<(), CacheError> {
        let mut snapshot = self.snapshot.write();
        let height = snapshot.height;
        if delta.base.height != height {
            return Err(CacheError::InvalidRecommit {
                height: delta.base.height,
                cache_height: height,
            });
        }
        self.commit_locked(&mut snapshot, delta, height)
    }

    fn commit_locked(
        &self,
        snapshot: &mut Arc<CacheSnapshot>,
        delta: CacheDelta,
        height: Height,
    ) -> Result<(), CacheError> {
        if !Arc::ptr_eq(snapshot, &delta.base) {
            return Err(CacheError::StaleDelta);
        }

        // the database is written first so that a failure leaves memory untouched
        let changes = delta.changes();
        self.write_database(&changes, height)?;

        let CacheDelta {
            base,
            overlays,
            dependent_state,
            state_roots,
            ..
        } = delta;
        let sub_caches = base
            .sub_caches
            .iter()
            .zip(overlays)
            .map(|(entries, overlay)| {
                if overlay.is_empty() {
                    return entries.clone();
                }
                let mut entries = SubCacheEntries::clone(entries);
                for (key, value) in overlay {
                    match value {
                        Some(value) => entries.insert(key, value),
                        None => entries.remove(&key),
                    };
                }
                Arc::new(entries)
            })
            .collect();

        *snapshot = Arc::new(CacheSnapshot {
            height,
            dependent_state,
            sub_caches,
            state_roots: state_roots.unwrap_or_else(|| base.state_roots.clone()),
        });
        debug!("cache committed at height {}", height);
        Ok(())
    }

    fn write_database(&self, changes: &CacheChanges, height: Height) -> Result<(), CacheError> {
        let Some(database) = &self.database else {
            return Ok(());
        };

        let mut batch = CacheDbBatch::new();
        for id in SubCacheId::ALL.iter().filter(|id| id.is_database_backed()) {
            if let Some(sub_changes) = changes.sub(*id).filter(|c| !c.is_empty()) {
                batch.insert(id.name().to_string(), sub_changes.to_column_batch());
            }
        }

        let mut database = database.write();
        let database_height = database.get_height()?.unwrap_or_default();
        if batch.is_empty() && height <= database_height {
            return Ok(());
        }
        // the database height never goes backwards, it may be ahead after an interrupted commit
        database.write_batch(batch, height.max(database_height))?;
        Ok(())
    }

    /// Bulk loads serialized entries into sub cache `id` of a cache that was never committed
    pub(crate) fn load_entries(
        &self,
        id: SubCacheId,
        entries: Vec<(Vec<u8>, Vec<u8>)>,
    ) -> Result<(), CacheError> {
        let mut snapshot = self.snapshot.write();
        if snapshot.height != Height(0) {
            return Err(CacheError::AlreadyLoaded(id.name().to_string()));
        }

        let mut sub_caches = snapshot.sub_caches.clone();
        let mut content = SubCacheEntries::clone(&sub_caches[id.index()]);
        content.extend(entries);
        sub_caches[id.index()] = Arc::new(content);
        *snapshot = Arc::new(CacheSnapshot {
            height: snapshot.height,
            dependent_state: snapshot.dependent_state,
            sub_caches,
            state_roots: Vec::new(),
        });
        Ok(())
    }
}

/// Immutable snapshot of the committed state
#[derive(Clone)]
pub struct CacheView {
    snapshot: Arc<CacheSnapshot>,
    enable_verifiable_state: bool,
}

impl CacheView {
    /// Height of the snapshot
    pub fn height(&self) -> Height {
        self.snapshot.height
    }

    /// Dependent state of the snapshot
    pub fn dependent_state(&self) -> &DependentState {
        &self.snapshot.dependent_state
    }

    /// Typed read access to a sub cache
    pub fn sub<D: SubCacheDescriptor>(&self) -> SubCacheReader<'_, D> {
        SubCacheReader::new(&self.snapshot.sub_caches[D::ID.index()], None)
    }

    /// Number of entries of sub cache `id`
    pub fn len(&self, id: SubCacheId) -> usize {
        self.snapshot.sub_caches[id.index()].len()
    }

    /// Serialized entries of sub cache `id`, in key order
    pub fn entries(&self, id: SubCacheId) -> impl Iterator<Item = (&[u8], &[u8])> {
        self.snapshot.sub_caches[id.index()]
            .iter()
            .map(|(key, value)| (key.as_slice(), value.as_slice()))
    }

    /// Merkle roots refreshed by the last commit that calculated them
    pub fn state_roots(&self) -> &[Hash] {
        &self.snapshot.state_roots
    }

    /// State hash of the snapshot, zero when verifiable state is disabled
    pub fn calculate_state_hash(&self) -> StateHashInfo {
        if !self.enable_verifiable_state {
            return StateHashInfo::default();
        }
        StateHashInfo::from_roots(
            SubCacheId::ALL
                .iter()
                .filter(|id| id.is_verifiable())
                .map(|id| merkle_root(self.entries(*id)))
                .collect(),
        )
    }
}

/// Uncommitted changes on top of a committed snapshot
pub struct CacheDelta {
    base: Arc<CacheSnapshot>,
    overlays: Vec<SubCacheOverlay>,
    dependent_state: DependentState,
    state_roots: Option<Vec<Hash>>,
    enable_verifiable_state: bool,
}

impl CacheDelta {
    /// Height of the snapshot the delta was created from
    pub fn height(&self) -> Height {
        self.base.height
    }

    /// Dependent state, including uncommitted changes
    pub fn dependent_state(&self) -> &DependentState {
        &self.dependent_state
    }

    /// Mutable dependent state
    pub fn dependent_state_mut(&mut self) -> &mut DependentState {
        &mut self.dependent_state
    }

    /// Typed read access to a sub cache
    pub fn sub<D: SubCacheDescriptor>(&self) -> SubCacheReader<'_, D> {
        let index = D::ID.index();
        SubCacheReader::new(&self.base.sub_caches[index], Some(&self.overlays[index]))
    }

    /// Typed write access to a sub cache. Invalidates previously calculated Merkle roots.
    pub fn sub_mut<D: SubCacheDescriptor>(&mut self) -> SubCacheModifier<'_, D> {
        let index = D::ID.index();
        self.state_roots = None;
        SubCacheModifier::new(&self.base.sub_caches[index], &mut self.overlays[index])
    }

    /// Serialized entries of sub cache `id` with the changes applied, in key order
    pub fn entries(&self, id: SubCacheId) -> impl Iterator<Item = (&[u8], &[u8])> {
        MergedEntries::new(&self.base.sub_caches[id.index()], &self.overlays[id.index()])
    }

    /// Number of entries of sub cache `id` with the changes applied
    pub fn len(&self, id: SubCacheId) -> usize {
        self.entries(id).count()
    }

    /// Changes carried by the delta
    pub fn changes(&self) -> CacheChanges {
        CacheChanges {
            sub_caches: self
                .base
                .sub_caches
                .iter()
                .zip(self.overlays.iter())
                .map(|(base, overlay)| SubCacheChanges::from_overlay(base, overlay))
                .collect(),
            dependent_state: self.dependent_state,
        }
    }

    /// Re-applies changes recorded by another delta. Applying the same changes twice is harmless.
    pub fn apply_changes(&mut self, changes: &CacheChanges) -> Result<(), CacheError> {
        if changes.sub_caches.len() != self.overlays.len() {
            return Err(CacheError::CorruptedStorage {
                name: "cache changes".to_string(),
                reason: format!(
                    "{} sub cache change sets for {} sub caches",
                    changes.sub_caches.len(),
                    self.overlays.len()
                ),
            });
        }

        self.state_roots = None;
        for ((base, overlay), sub_changes) in self
            .base
            .sub_caches
            .iter()
            .zip(self.overlays.iter_mut())
            .zip(changes.sub_caches.iter())
        {
            for (key, value) in sub_changes.added.iter().chain(sub_changes.modified.iter()) {
                if base.get(key) == Some(value) {
                    overlay.remove(key);
                } else {
                    overlay.insert(key.clone(), Some(value.clone()));
                }
            }
            for key in sub_changes.removed.iter() {
                if base.contains_key(key) {
                    overlay.insert(key.clone(), None);
                } else {
                    overlay.remove(key);
                }
            }
        }
        self.dependent_state = changes.dependent_state;
        Ok(())
    }

    /// Calculates the state hash of the delta and keeps the sub cache Merkle roots,
    /// so that committing the delta refreshes the committed roots.
    /// Returns the zero hash when verifiable state is disabled.
    pub fn calculate_state_hash(&mut self) -> StateHashInfo {
        if !self.enable_verifiable_state {
            return StateHashInfo::default();
        }
        let info = StateHashInfo::from_roots(
            SubCacheId::ALL
                .iter()
                .filter(|id| id.is_verifiable())
                .map(|id| merkle_root(self.entries(*id)))
                .collect(),
        );
        self.state_roots = Some(info.sub_cache_merkle_roots.clone());
        info
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accounts::{AccountState, AccountStateCache};
    use crate::block_statistics::{BlockStatistic, BlockStatisticCache};
    use assert_matches::assert_matches;
    use bitxor_db_exports::{CacheDatabaseConfig, MockCacheDatabaseController};
    use bitxor_db_worker::CacheDatabase;
    use bitxor_models::address::Address;
    use bitxor_models::amount::Amount;
    use bitxor_models::network::NetworkIdentifier;
    use bitxor_models::timestamp::Timestamp;
    use bitxor_models::token::TokenId;
    use bitxor_signature::KeyPair;
    use tempfile::TempDir;

    fn address() -> Address {
        Address::from_public_key(
            &KeyPair::generate().get_public_key(),
            NetworkIdentifier::PrivateTest,
        )
    }

    fn funded_account(address: Address, amount: u64) -> AccountState {
        let mut account = AccountState::new(address, Height(1));
        account
            .credit(TokenId(1), Amount::from_raw(amount))
            .unwrap();
        account
    }

    fn verifiable_cache() -> CoreCache {
        CoreCache::new(CacheConfiguration {
            enable_verifiable_state: true,
            database: None,
        })
    }

    #[test]
    fn view_is_isolated_from_later_commits() {
        let cache = verifiable_cache();
        let account = funded_account(address(), 10);
        let view = cache.create_view();

        let mut delta = cache.create_delta();
        delta.sub_mut::<AccountStateCache>().insert(&account).unwrap();
        assert!(delta
            .sub::<AccountStateCache>()
            .contains(&account.address)
            .unwrap());
        cache.commit(delta, Height(1)).unwrap();

        assert!(!view
            .sub::<AccountStateCache>()
            .contains(&account.address)
            .unwrap());
        let view = cache.create_view();
        assert_eq!(view.height(), Height(1));
        assert_eq!(
            view.sub::<AccountStateCache>()
                .find(&account.address)
                .unwrap(),
            Some(account)
        );
    }

    #[test]
    fn commits_are_strictly_monotonic() {
        let cache = verifiable_cache();
        cache.commit(cache.create_delta(), Height(2)).unwrap();
        assert_matches!(
            cache.commit(cache.create_delta(), Height(2)),
            Err(CacheError::NonMonotonicCommit { .. })
        );
        assert_matches!(
            cache.commit(cache.create_delta(), Height(1)),
            Err(CacheError::NonMonotonicCommit { .. })
        );
        cache.recommit(cache.create_delta()).unwrap();
        assert_eq!(cache.height(), Height(2));
    }

    #[test]
    fn stale_delta_is_rejected() {
        let cache = verifiable_cache();
        let stale = cache.create_delta();
        cache.commit(cache.create_delta(), Height(1)).unwrap();
        assert_matches!(
            cache.commit(stale, Height(2)),
            Err(CacheError::StaleDelta)
        );
    }

    #[test]
    fn removal_and_changes_are_tracked() {
        let cache = verifiable_cache();
        let first = funded_account(address(), 10);
        let second = funded_account(address(), 20);
        let mut delta = cache.create_delta();
        delta.sub_mut::<AccountStateCache>().insert(&first).unwrap();
        delta.sub_mut::<AccountStateCache>().insert(&second).unwrap();
        cache.commit(delta, Height(1)).unwrap();

        let mut delta = cache.create_delta();
        let mut updated = first.clone();
        updated.credit(TokenId(1), Amount::from_raw(1)).unwrap();
        delta.sub_mut::<AccountStateCache>().insert(&updated).unwrap();
        assert!(delta
            .sub_mut::<AccountStateCache>()
            .remove(&second.address)
            .unwrap());
        delta.sub_mut::<BlockStatisticCache>()
            .insert(&BlockStatistic {
                height: Height(2),
                timestamp: Timestamp(10),
                difficulty: 1,
                fee_multiplier: 0,
            })
            .unwrap();

        let changes = delta.changes();
        let accounts = changes.sub(SubCacheId::AccountState).unwrap();
        assert!(accounts.added.is_empty());
        assert_eq!(accounts.modified.len(), 1);
        assert_eq!(accounts.removed.len(), 1);
        assert_eq!(
            accounts.upserted_values::<AccountStateCache>().unwrap(),
            vec![updated]
        );
        assert_eq!(changes.sub(SubCacheId::BlockStatistic).unwrap().added.len(), 1);
        assert_eq!(delta.len(SubCacheId::AccountState), 1);
    }

    #[test]
    fn applying_changes_twice_is_idempotent() {
        let source = verifiable_cache();
        let mut delta = source.create_delta();
        delta
            .sub_mut::<AccountStateCache>()
            .insert(&funded_account(address(), 5))
            .unwrap();
        delta.dependent_state_mut().num_total_transactions = 3;
        let changes = delta.changes();
        source.commit(delta, Height(1)).unwrap();

        let replica = verifiable_cache();
        let mut delta = replica.create_delta();
        delta.apply_changes(&changes).unwrap();
        delta.apply_changes(&changes).unwrap();
        replica.commit(delta, Height(1)).unwrap();

        assert_eq!(
            replica.create_view().calculate_state_hash(),
            source.create_view().calculate_state_hash()
        );
        assert_eq!(
            replica.create_view().dependent_state().num_total_transactions,
            3
        );
    }

    #[test]
    fn state_hash_covers_verifiable_sub_caches_only() {
        let cache = verifiable_cache();
        let mut delta = cache.create_delta();
        let empty = delta.calculate_state_hash();
        assert_eq!(empty.sub_cache_merkle_roots.len(), 3);
        assert!(empty.sub_cache_merkle_roots.iter().all(Hash::is_zero));

        delta
            .sub_mut::<BlockStatisticCache>()
            .insert(&BlockStatistic {
                height: Height(1),
                timestamp: Timestamp(0),
                difficulty: 1,
                fee_multiplier: 0,
            })
            .unwrap();
        assert_eq!(delta.calculate_state_hash(), empty);

        delta
            .sub_mut::<AccountStateCache>()
            .insert(&funded_account(address(), 1))
            .unwrap();
        let info = delta.calculate_state_hash();
        assert_ne!(info.state_hash, empty.state_hash);

        cache.commit(delta, Height(1)).unwrap();
        let view = cache.create_view();
        assert_eq!(view.state_roots(), info.sub_cache_merkle_roots.as_slice());
        assert_eq!(view.calculate_state_hash(), info);
    }

    #[test]
    fn state_hash_is_zero_when_disabled() {
        let cache = CoreCache::new(CacheConfiguration::default());
        let mut delta = cache.create_delta();
        delta
            .sub_mut::<AccountStateCache>()
            .insert(&funded_account(address(), 1))
            .unwrap();
        let info = delta.calculate_state_hash();
        assert!(info.state_hash.is_zero());
        assert!(info.sub_cache_merkle_roots.is_empty());
    }

    #[test]
    fn commit_writes_through_to_database() {
        let temp = TempDir::new().unwrap();
        let database = CacheDatabase::new_shareable(CacheDatabaseConfig {
            path: temp.path().to_path_buf(),
            columns: SubCacheId::database_columns(),
            max_open_files: 16,
        })
        .unwrap();
        let cache = CoreCache::new(CacheConfiguration {
            enable_verifiable_state: true,
            database: Some(database.clone()),
        });

        let account = funded_account(address(), 7);
        let mut delta = cache.create_delta();
        delta.sub_mut::<AccountStateCache>().insert(&account).unwrap();
        cache.commit(delta, Height(1)).unwrap();

        let database = database.read();
        assert_eq!(database.get_height().unwrap(), Some(Height(1)));
        let key = AccountStateCache::serialize_key(&account.address).unwrap();
        let stored = database
            .get_cf(SubCacheId::AccountState.name(), &key)
            .unwrap()
            .unwrap();
        assert_eq!(
            AccountStateCache::deserialize_value(&stored).unwrap(),
            account
        );
    }

    #[test]
    fn database_height_never_goes_backwards() {
        let mut controller = MockCacheDatabaseController::new();
        controller
            .expect_get_height()
            .returning(|| Ok(Some(Height(5))));
        controller.expect_write_batch().never();
        let cache = CoreCache::new(CacheConfiguration {
            enable_verifiable_state: false,
            database: Some(Arc::new(RwLock::new(Box::new(controller)))),
        });

        // an empty commit below the database height leaves the database alone
        cache.commit(cache.create_delta(), Height(4)).unwrap();
        assert_eq!(cache.height(), Height(4));
    }
}
