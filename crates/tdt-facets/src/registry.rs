//! Global facet keys (`FacetKeys.dic`) and their source scopes
//! (`ScopeFacet.scp`).
//!
//! A global key is allocated once per `(window path, local key)` pair and is
//! never reused; importing the same window file again resolves to the keys
//! it received the first time.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use tdt_types::{GlobalFacetKey, LocalFacetKey, Scope};

/// Where a global facet came from.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FacetOrigin {
    /// Name of the window topic file
    pub window_path: String,
    /// Key inside that file
    pub local: LocalFacetKey,
}

#[derive(Serialize, Deserialize)]
struct RegistryRecord {
    last_key: GlobalFacetKey,
    entries: BTreeMap<GlobalFacetKey, FacetOrigin>,
}

/// Allocates and remembers global facet keys.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "RegistryRecord", into = "RegistryRecord")]
pub struct FacetKeyRegistry {
    entries: BTreeMap<GlobalFacetKey, FacetOrigin>,
    by_origin: HashMap<FacetOrigin, GlobalFacetKey>,
    last_key: GlobalFacetKey,
}

impl FacetKeyRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Global key for a local facet, allocating `last_key + 1` on first
    /// sight. The flag is `true` when the key is new.
    pub fn allocate(&mut self, window_path: &str, local: LocalFacetKey) -> (GlobalFacetKey, bool) {
        let origin = FacetOrigin {
            window_path: window_path.to_string(),
            local,
        };
        if let Some(&key) = self.by_origin.get(&origin) {
            return (key, false);
        }
        self.last_key += 1;
        let key = self.last_key;
        self.entries.insert(key, origin.clone());
        self.by_origin.insert(origin, key);
        (key, true)
    }

    /// Global keys for every local key of one window file.
    pub fn allocate_facet_keys<I>(
        &mut self,
        window_path: &str,
        locals: I,
    ) -> BTreeMap<LocalFacetKey, (GlobalFacetKey, bool)>
    where
        I: IntoIterator<Item = LocalFacetKey>,
    {
        locals
            .into_iter()
            .map(|local| (local, self.allocate(window_path, local)))
            .collect()
    }

    /// Existing global key of a local facet.
    pub fn lookup(&self, window_path: &str, local: LocalFacetKey) -> Option<GlobalFacetKey> {
        self.by_origin
            .get(&FacetOrigin {
                window_path: window_path.to_string(),
                local,
            })
            .copied()
    }

    /// Origin of a global key.
    pub fn origin(&self, key: GlobalFacetKey) -> Option<&FacetOrigin> {
        self.entries.get(&key)
    }

    /// Highest key handed out.
    pub fn last_key(&self) -> GlobalFacetKey {
        self.last_key
    }

    /// Number of keys.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no key was allocated.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl From<RegistryRecord> for FacetKeyRegistry {
    fn from(record: RegistryRecord) -> Self {
        let by_origin = record
            .entries
            .iter()
            .map(|(k, o)| (o.clone(), *k))
            .collect();
        Self {
            entries: record.entries,
            by_origin,
            last_key: record.last_key,
        }
    }
}

impl From<FacetKeyRegistry> for RegistryRecord {
    fn from(registry: FacetKeyRegistry) -> Self {
        Self {
            last_key: registry.last_key,
            entries: registry.entries,
        }
    }
}

/// Source window of every global facet.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScopeFacetIndex {
    scopes: BTreeMap<GlobalFacetKey, Scope>,
}

impl ScopeFacetIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the window of a facet.
    pub fn insert(&mut self, key: GlobalFacetKey, scope: Scope) {
        self.scopes.insert(key, scope);
    }

    /// Window of a facet.
    pub fn scope_of(&self, key: GlobalFacetKey) -> Option<Scope> {
        self.scopes.get(&key).copied()
    }

    /// Keep facets whose window lies inside `task`.
    pub fn filter_in_scope(
        &self,
        keys: &BTreeSet<GlobalFacetKey>,
        task: &Scope,
    ) -> BTreeSet<GlobalFacetKey> {
        keys.iter()
            .filter(|k| self.scope_of(**k).is_some_and(|s| s.is_in_scope(task)))
            .copied()
            .collect()
    }

    /// Number of indexed facets.
    pub fn len(&self) -> usize {
        self.scopes.len()
    }

    /// Whether the index is empty.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }
}
