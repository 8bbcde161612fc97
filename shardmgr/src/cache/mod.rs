//! In-process cache of shard maps and mappings feeding data-dependent
//! routing (spec.md §4.H). Every write swaps in a whole new immutable
//! snapshot, an `ArcSwap`-backed hot-reload pattern: readers `load()` a
//! cheap `Arc` clone and never block a writer, and a writer never
//! blocks a reader.

mod state;

use std::sync::Arc;

use arc_swap::ArcSwap;
use tracing::debug;
use uuid::Uuid;

use crate::entities::{Mapping, ShardMap};
use crate::key::ShardKey;
use crate::store::{ResultCode, StoreError};

use state::CacheState;

/// No size bound: the assumption is a bounded number of mappings per
/// process (spec.md §4.H). An application that needs one can wrap this
/// behind the same interface.
#[derive(Default)]
pub struct Cache {
    state: ArcSwap<CacheState>,
}

impl Cache {
    pub fn new() -> Self {
        Self {
            state: ArcSwap::from_pointee(CacheState::default()),
        }
    }

    pub fn get_shard_map(&self, name: &str) -> Option<ShardMap> {
        self.state.load().get_shard_map(name)
    }

    pub fn put_shard_map(&self, shard_map: ShardMap) {
        self.state.rcu(|state| Arc::new(state.with_shard_map(shard_map.clone())));
    }

    pub fn evict_shard_map(&self, name: &str) {
        debug!(name, "evicting shard map from cache");
        self.state.rcu(|state| Arc::new(state.without_shard_map(name)));
    }

    pub fn get_mapping_for_key(&self, shard_map_id: Uuid, key: &ShardKey) -> Option<Mapping> {
        self.state.load().get_mapping_for_key(shard_map_id, key)
    }

    pub fn put_mapping(&self, shard_map_id: Uuid, mapping: Mapping) {
        self.state.rcu(|state| Arc::new(state.with_mapping(shard_map_id, mapping.clone())));
    }

    pub fn evict_mapping(&self, shard_map_id: Uuid, mapping_id: Uuid) {
        debug!(%shard_map_id, %mapping_id, "evicting mapping from cache");
        self.state.rcu(|state| Arc::new(state.without_mapping(shard_map_id, mapping_id)));
    }

    pub fn evict_shard(&self, shard_map_id: Uuid, shard_id: Uuid) {
        debug!(%shard_map_id, %shard_id, "evicting shard's mappings from cache");
        self.state.rcu(|state| Arc::new(state.without_shard(shard_map_id, shard_id)));
    }

    /// Evicts whatever `err` says is stale (spec.md §7: `ShardMapDoesNotExist`,
    /// `ShardDoesNotExist`, `MappingDoesNotExist`, `ShardVersionMismatch`
    /// all mean "this cache entry no longer matches the GSM"). Returns
    /// whether anything was evicted, so a caller can decide whether a
    /// GSM refresh-and-retry is worth attempting.
    pub fn invalidate_on_error(&self, err: &StoreError, shard_map_id: Uuid, mapping_id: Option<Uuid>) -> bool {
        let Some(code) = err.result_code() else {
            return false;
        };
        if !code.invalidates_cache() {
            return false;
        }
        if let Some(mapping_id) = mapping_id {
            self.evict_mapping(shard_map_id, mapping_id);
        }
        matches!(
            code,
            ResultCode::ShardMapDoesNotExist
                | ResultCode::ShardDoesNotExist
                | ResultCode::MappingDoesNotExist
                | ResultCode::ShardVersionMismatch
        )
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::{Mapping, ShardMapKind};
    use crate::key::ShardKeyType;

    fn range_map() -> ShardMap {
        ShardMap::new("customers", ShardMapKind::Range, ShardKeyType::Int32)
    }

    #[test]
    fn test_put_and_get_shard_map() {
        let cache = Cache::new();
        let shard_map = range_map();
        cache.put_shard_map(shard_map.clone());
        assert_eq!(cache.get_shard_map("customers"), Some(shard_map));
        assert_eq!(cache.get_shard_map("nope"), None);
    }

    #[test]
    fn test_mapping_for_key_range() {
        let cache = Cache::new();
        let shard_map = range_map();
        cache.put_shard_map(shard_map.clone());

        let shard_id = Uuid::new_v4();
        let range = crate::key::ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(100)).unwrap();
        let mapping = Mapping::new_range(shard_map.id, shard_id, range);
        cache.put_mapping(shard_map.id, mapping.clone());

        let found = cache.get_mapping_for_key(shard_map.id, &ShardKey::from_i32(42)).unwrap();
        assert_eq!(found.id, mapping.id);
        assert!(cache.get_mapping_for_key(shard_map.id, &ShardKey::from_i32(100)).is_none());
    }

    #[test]
    fn test_overwrite_existing_supersedes() {
        let cache = Cache::new();
        let shard_map = range_map();
        cache.put_shard_map(shard_map.clone());

        let shard_a = Uuid::new_v4();
        let shard_b = Uuid::new_v4();
        let range = crate::key::ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(100)).unwrap();
        let mut mapping = Mapping::new_range(shard_map.id, shard_a, range.clone());
        cache.put_mapping(shard_map.id, mapping.clone());

        mapping.shard_id = shard_b;
        cache.put_mapping(shard_map.id, mapping.clone());

        let found = cache.get_mapping_for_key(shard_map.id, &ShardKey::from_i32(10)).unwrap();
        assert_eq!(found.shard_id, shard_b);
    }

    #[test]
    fn test_evict_mapping_hides_it() {
        let cache = Cache::new();
        let shard_map = range_map();
        cache.put_shard_map(shard_map.clone());

        let shard_id = Uuid::new_v4();
        let range = crate::key::ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(100)).unwrap();
        let mapping = Mapping::new_range(shard_map.id, shard_id, range);
        cache.put_mapping(shard_map.id, mapping.clone());
        cache.evict_mapping(shard_map.id, mapping.id);

        assert!(cache.get_mapping_for_key(shard_map.id, &ShardKey::from_i32(10)).is_none());
    }

    #[test]
    fn test_invalidate_on_error_matches_four_codes() {
        let cache = Cache::new();
        let shard_map_id = Uuid::new_v4();
        assert!(cache.invalidate_on_error(&StoreError::semantic(ResultCode::ShardDoesNotExist), shard_map_id, None));
        assert!(!cache.invalidate_on_error(&StoreError::semantic(ResultCode::MappingLockOwnerIdMismatch), shard_map_id, None));
    }
}
