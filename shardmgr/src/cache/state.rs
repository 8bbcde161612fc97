use std::collections::{BTreeMap, HashMap};

use uuid::Uuid;

use crate::entities::{Mapping, ShardMap, ShardMapKind};
use crate::key::ShardKey;

/// Everything cached for one shard map: the map row itself plus its
/// mappings, ordered by canonical min-value bytes so a range lookup can
/// binary-search for the mapping whose interval contains a key (spec.md
/// §4.H).
#[derive(Clone)]
pub(super) struct MapEntry {
    pub shard_map: ShardMap,
    by_id: HashMap<Uuid, Mapping>,
    /// min-value bytes -> mapping id. For a point map this is an exact-key
    /// index; for a range map, looking a key up means finding the
    /// greatest min-value at or below it and checking containment.
    ordered: BTreeMap<Vec<u8>, Uuid>,
}

impl MapEntry {
    fn new(shard_map: ShardMap) -> Self {
        Self {
            shard_map,
            by_id: HashMap::new(),
            ordered: BTreeMap::new(),
        }
    }

    fn put(&mut self, mapping: Mapping) {
        if let Some(bytes) = mapping.key.min_value().canonical_bytes() {
            self.ordered.insert(bytes.to_vec(), mapping.id);
        }
        self.by_id.insert(mapping.id, mapping);
    }

    fn evict(&mut self, mapping_id: Uuid) {
        if let Some(mapping) = self.by_id.remove(&mapping_id) {
            if let Some(bytes) = mapping.key.min_value().canonical_bytes() {
                self.ordered.remove(bytes.as_slice());
            }
        }
    }

    fn lookup(&self, key: &ShardKey) -> Option<&Mapping> {
        let bytes = key.canonical_bytes()?;
        match self.shard_map.kind {
            ShardMapKind::List => {
                let id = self.ordered.get(bytes)?;
                self.by_id.get(id).filter(|m| m.is_routable())
            }
            ShardMapKind::Range => {
                let (_, id) = self.ordered.range(..=bytes.to_vec()).next_back()?;
                let mapping = self.by_id.get(id)?;
                let range = mapping.key.as_range()?;
                if mapping.is_routable() && range.contains(key).unwrap_or(false) {
                    Some(mapping)
                } else {
                    None
                }
            }
            ShardMapKind::Default => None,
        }
    }
}

/// Immutable snapshot swapped in whole by every write (spec.md §4.H
/// "OverwriteExisting"; spec.md §5 "writers replace whole entries
/// atomically"). Readers hold a cloned `Arc` and never block a writer.
#[derive(Clone, Default)]
pub(super) struct CacheState {
    pub shard_maps_by_name: HashMap<String, ShardMap>,
    entries: HashMap<Uuid, MapEntry>,
}

impl CacheState {
    pub fn with_shard_map(&self, shard_map: ShardMap) -> Self {
        let mut next = self.clone();
        next.shard_maps_by_name.insert(shard_map.name.clone(), shard_map.clone());
        next.entries
            .entry(shard_map.id)
            .and_modify(|entry| entry.shard_map = shard_map.clone())
            .or_insert_with(|| MapEntry::new(shard_map));
        next
    }

    pub fn with_mapping(&self, shard_map_id: Uuid, mapping: Mapping) -> Self {
        let mut next = self.clone();
        let entry = next
            .entries
            .entry(shard_map_id)
            .or_insert_with(|| MapEntry::new(lookup_or_placeholder(&next.shard_maps_by_name, shard_map_id)));
        entry.put(mapping);
        next
    }

    pub fn without_mapping(&self, shard_map_id: Uuid, mapping_id: Uuid) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(&shard_map_id) {
            entry.evict(mapping_id);
        }
        next
    }

    pub fn without_shard_map(&self, name: &str) -> Self {
        let mut next = self.clone();
        if let Some(shard_map) = next.shard_maps_by_name.remove(name) {
            next.entries.remove(&shard_map.id);
        }
        next
    }

    /// Drops every mapping routed to `shard_id`, used when a
    /// `ShardDoesNotExist` response means the shard itself was detached
    /// or removed out from under a cached route (spec.md §7).
    pub fn without_shard(&self, shard_map_id: Uuid, shard_id: Uuid) -> Self {
        let mut next = self.clone();
        if let Some(entry) = next.entries.get_mut(&shard_map_id) {
            let stale: Vec<Uuid> = entry
                .by_id
                .values()
                .filter(|m| m.shard_id == shard_id)
                .map(|m| m.id)
                .collect();
            for id in stale {
                entry.evict(id);
            }
        }
        next
    }

    pub fn get_shard_map(&self, name: &str) -> Option<ShardMap> {
        self.shard_maps_by_name.get(name).cloned()
    }

    pub fn get_mapping_for_key(&self, shard_map_id: Uuid, key: &ShardKey) -> Option<Mapping> {
        self.entries.get(&shard_map_id)?.lookup(key).cloned()
    }
}

/// A shard map should always be cached before its mappings are, but a
/// defensively-coded caller that races the two calls gets an empty
/// placeholder rather than a panic; `with_shard_map` overwrites the
/// placeholder in place (`and_modify`) once the real row arrives, rather
/// than leaving it stranded behind an already-present entry.
fn lookup_or_placeholder(by_name: &HashMap<String, ShardMap>, shard_map_id: Uuid) -> ShardMap {
    by_name
        .values()
        .find(|m| m.id == shard_map_id)
        .cloned()
        .unwrap_or_else(|| ShardMap::new("", ShardMapKind::Default, crate::key::ShardKeyType::Int32))
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::key::{ShardKeyType, ShardRange};

    #[test]
    fn test_mapping_before_shard_map_heals_on_arrival() {
        let shard_map = ShardMap::new("customers", ShardMapKind::Range, ShardKeyType::Int32);
        let range = ShardRange::new(ShardKey::from_i32(0), ShardKey::from_i32(100)).unwrap();
        let mapping = Mapping::new_range(shard_map.id, Uuid::new_v4(), range);

        let raced = CacheState::default().with_mapping(shard_map.id, mapping.clone());
        assert!(raced.get_shard_map("customers").is_none());

        let healed = raced.with_shard_map(shard_map.clone());
        assert_eq!(healed.get_shard_map("customers"), Some(shard_map.clone()));
        let found = healed.get_mapping_for_key(shard_map.id, &ShardKey::from_i32(42));
        assert_eq!(found.map(|m| m.id), Some(mapping.id));
    }
}
