//! Name-keyed asset storage with a fallback entry.

use std::{collections::HashMap, fmt, hash::Hash, marker::PhantomData};

/// Typed index into an [`AssetCache`]. Handles stay valid for the cache's lifetime.
pub struct AssetHandle<T> {
    id: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> AssetHandle<T> {
    fn new(id: u32) -> Self {
        Self {
            id,
            marker: PhantomData,
        }
    }

    pub fn id(self) -> u32 {
        self.id
    }

    #[cfg(test)]
    pub(crate) fn from_raw(id: u32) -> Self {
        Self::new(id)
    }
}

impl<T> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for AssetHandle<T> {}

impl<T> PartialEq for AssetHandle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for AssetHandle<T> {}

impl<T> PartialOrd for AssetHandle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for AssetHandle<T> {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl<T> Hash for AssetHandle<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for AssetHandle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AssetHandle({})", self.id)
    }
}

/// Assets of one kind. Lookups of unknown names resolve to the default asset.
#[derive(Debug)]
pub struct AssetCache<T> {
    kind: &'static str,
    assets: Vec<T>,
    names: HashMap<String, AssetHandle<T>>,
    default: AssetHandle<T>,
}

impl<T> AssetCache<T> {
    pub fn new(kind: &'static str, default_name: &str, default_asset: T) -> Self {
        let default = AssetHandle::new(0);
        let mut names = HashMap::new();
        names.insert(default_name.to_string(), default);
        Self {
            kind,
            assets: vec![default_asset],
            names,
            default,
        }
    }

    /// Register `asset` under `name`. Re-registering a name replaces the asset
    /// behind the existing handle.
    pub fn insert(&mut self, name: &str, asset: T) -> AssetHandle<T> {
        if let Some(handle) = self.names.get(name).copied() {
            log::debug!("replacing {} '{name}'", self.kind);
            self.assets[handle.id as usize] = asset;
            return handle;
        }
        let handle = AssetHandle::new(self.assets.len() as u32);
        self.assets.push(asset);
        self.names.insert(name.to_string(), handle);
        handle
    }

    pub fn find(&self, name: &str) -> Option<AssetHandle<T>> {
        self.names.get(name).copied()
    }

    /// Handle for `name`, or the default handle when nothing is registered under it.
    pub fn handle(&self, name: &str) -> AssetHandle<T> {
        self.find(name).unwrap_or_else(|| {
            log::warn!("{} '{name}' not found, using the default", self.kind);
            self.default
        })
    }

    pub fn default_handle(&self) -> AssetHandle<T> {
        self.default
    }

    /// The asset behind `handle`. Handles from another cache fall back to the default.
    pub fn get(&self, handle: AssetHandle<T>) -> &T {
        self.assets
            .get(handle.id as usize)
            .unwrap_or(&self.assets[self.default.id as usize])
    }

    pub fn get_mut(&mut self, handle: AssetHandle<T>) -> &mut T {
        let id = if (handle.id as usize) < self.assets.len() {
            handle.id
        } else {
            self.default.id
        };
        &mut self.assets[id as usize]
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_names_resolve_to_the_default() {
        let mut cache = AssetCache::new("texture", "white", "white pixels");
        let brick = cache.insert("brick", "brick pixels");
        assert_eq!(cache.handle("brick"), brick);
        assert_eq!(*cache.get(cache.handle("marble")), "white pixels");
        assert_eq!(cache.find("marble"), None);
    }

    #[test]
    fn reinserting_keeps_the_handle() {
        let mut cache = AssetCache::new("mesh", "cube", 1);
        let a = cache.insert("rock", 2);
        let b = cache.insert("rock", 3);
        assert_eq!(a, b);
        assert_eq!(*cache.get(a), 3);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn foreign_handles_do_not_panic() {
        let mut big = AssetCache::new("material", "default", 0);
        for i in 1..10 {
            big.insert(&format!("m{i}"), i);
        }
        let small = AssetCache::new("material", "default", 42);
        assert_eq!(*small.get(big.handle("m7")), 42);
    }
}
