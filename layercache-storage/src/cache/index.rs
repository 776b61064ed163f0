//! Tag and dependency index.
//!
//! Tracks which keys carry which tags and which keys depend on which. The
//! dependency graph is directed, many-to-many, and may contain cycles;
//! traversals carry a visited set.

use std::collections::{HashMap, HashSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use layercache_core::{CacheError, CacheResult, KeyPattern};

#[derive(Debug, Default)]
struct IndexState {
    tag_to_keys: HashMap<String, HashSet<String>>,
    key_to_tags: HashMap<String, HashSet<String>>,
    /// parent -> keys that depend on it
    parent_to_dependents: HashMap<String, HashSet<String>>,
    /// dependent -> keys it depends on
    dependent_of: HashMap<String, HashSet<String>>,
}

impl IndexState {
    fn drop_tags(&mut self, key: &str) {
        if let Some(tags) = self.key_to_tags.remove(key) {
            for tag in tags {
                if let Some(keys) = self.tag_to_keys.get_mut(&tag) {
                    keys.remove(key);
                    if keys.is_empty() {
                        self.tag_to_keys.remove(&tag);
                    }
                }
            }
        }
    }

    fn drop_parent_edges(&mut self, key: &str) {
        if let Some(parents) = self.dependent_of.remove(key) {
            for parent in parents {
                if let Some(dependents) = self.parent_to_dependents.get_mut(&parent) {
                    dependents.remove(key);
                    if dependents.is_empty() {
                        self.parent_to_dependents.remove(&parent);
                    }
                }
            }
        }
    }

    fn drop_dependent_edges(&mut self, key: &str) {
        if let Some(dependents) = self.parent_to_dependents.remove(key) {
            for dependent in dependents {
                if let Some(parents) = self.dependent_of.get_mut(&dependent) {
                    parents.remove(key);
                    if parents.is_empty() {
                        self.dependent_of.remove(&dependent);
                    }
                }
            }
        }
    }
}

/// Tag and dependency bookkeeping for cached keys.
#[derive(Debug, Default)]
pub struct InvalidationIndex {
    state: RwLock<IndexState>,
}

impl InvalidationIndex {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> CacheResult<RwLockReadGuard<'_, IndexState>> {
        self.state.read().map_err(|_| CacheError::LockPoisoned)
    }

    fn write(&self) -> CacheResult<RwLockWriteGuard<'_, IndexState>> {
        self.state.write().map_err(|_| CacheError::LockPoisoned)
    }

    /// Declare the tags and parents of `key`.
    ///
    /// Replaces whatever the key declared before. Edges where `key` is the
    /// parent are untouched.
    pub fn register(&self, key: &str, tags: &[String], depends_on: &[String]) -> CacheResult<()> {
        let mut state = self.write()?;
        state.drop_tags(key);
        state.drop_parent_edges(key);

        if !tags.is_empty() {
            let own: HashSet<String> = tags.iter().cloned().collect();
            for tag in &own {
                state
                    .tag_to_keys
                    .entry(tag.clone())
                    .or_default()
                    .insert(key.to_string());
            }
            state.key_to_tags.insert(key.to_string(), own);
        }

        let parents: HashSet<String> = depends_on
            .iter()
            .filter(|parent| parent.as_str() != key)
            .cloned()
            .collect();
        if !parents.is_empty() {
            for parent in &parents {
                state
                    .parent_to_dependents
                    .entry(parent.clone())
                    .or_default()
                    .insert(key.to_string());
            }
            state.dependent_of.insert(key.to_string(), parents);
        }
        Ok(())
    }

    /// Forget everything about `key`. Idempotent.
    pub fn unregister(&self, key: &str) -> CacheResult<()> {
        let mut state = self.write()?;
        state.drop_tags(key);
        state.drop_parent_edges(key);
        state.drop_dependent_edges(key);
        Ok(())
    }

    /// Drop the tags and parent edges of a key that is no longer cached,
    /// keeping the keys that depend on it.
    pub fn prune(&self, key: &str) -> CacheResult<()> {
        let mut state = self.write()?;
        state.drop_tags(key);
        state.drop_parent_edges(key);
        Ok(())
    }

    /// Keys currently carrying `tag`.
    pub fn keys_for_tag(&self, tag: &str) -> CacheResult<HashSet<String>> {
        Ok(self
            .read()?
            .tag_to_keys
            .get(tag)
            .cloned()
            .unwrap_or_default())
    }

    /// Union of keys carrying any of `tags`.
    pub fn keys_for_tags(&self, tags: &[String]) -> CacheResult<HashSet<String>> {
        let state = self.read()?;
        Ok(tags
            .iter()
            .filter_map(|tag| state.tag_to_keys.get(tag))
            .flatten()
            .cloned()
            .collect())
    }

    pub fn tags_for_key(&self, key: &str) -> CacheResult<HashSet<String>> {
        Ok(self
            .read()?
            .key_to_tags
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    /// Keys that declared `key` as a parent.
    pub fn direct_dependents(&self, key: &str) -> CacheResult<HashSet<String>> {
        Ok(self
            .read()?
            .parent_to_dependents
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    /// Every key reachable from `key` through dependency edges, excluding
    /// `key` itself. Terminates on cycles.
    pub fn dependents_of(&self, key: &str) -> CacheResult<Vec<String>> {
        let state = self.read()?;
        let mut visited: HashSet<&str> = HashSet::new();
        visited.insert(key);

        let mut order = Vec::new();
        let mut stack = vec![key];
        while let Some(current) = stack.pop() {
            if let Some(dependents) = state.parent_to_dependents.get(current) {
                for dependent in dependents {
                    if visited.insert(dependent.as_str()) {
                        order.push(dependent.clone());
                        stack.push(dependent.as_str());
                    }
                }
            }
        }
        Ok(order)
    }

    /// Indexed keys matching `pattern`, as tag members or dependency endpoints.
    pub fn keys_matching(&self, pattern: &KeyPattern) -> CacheResult<HashSet<String>> {
        let state = self.read()?;
        Ok(state
            .key_to_tags
            .keys()
            .chain(state.dependent_of.keys())
            .chain(state.parent_to_dependents.keys())
            .filter(|key| pattern.matches(key))
            .cloned()
            .collect())
    }

    /// Number of tags with at least one key.
    pub fn tag_count(&self) -> CacheResult<usize> {
        Ok(self.read()?.tag_to_keys.len())
    }

    /// Number of distinct keys known to the index.
    pub fn key_count(&self) -> CacheResult<usize> {
        let state = self.read()?;
        let keys: HashSet<&String> = state
            .key_to_tags
            .keys()
            .chain(state.dependent_of.keys())
            .chain(state.parent_to_dependents.keys())
            .collect();
        Ok(keys.len())
    }
}
