//! Per-engine configuration registry.
//!
//! Append-only: a type is either registered explicitly, or sealed with its
//! default configuration the first time synthesis looks it up. Neither
//! can be replaced afterwards.

use crate::config::TypeConfig;
use fielddiff_core::{DiffError, DiffResult, TypeKey};
use indexmap::IndexMap;
use std::sync::{Arc, PoisonError, RwLock};

enum Entry {
    Registered(Arc<TypeConfig>),
    Sealed(Arc<TypeConfig>),
}

impl Entry {
    fn config(&self) -> &Arc<TypeConfig> {
        match self {
            Self::Registered(config) | Self::Sealed(config) => config,
        }
    }
}

/// Registry of per-type configurations
pub struct ConfigRegistry {
    entries: RwLock<IndexMap<TypeKey, Entry>>,
}

/// Shared registry handle
pub type SharedRegistry = Arc<ConfigRegistry>;

impl ConfigRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(IndexMap::new()),
        }
    }

    /// Fail if `key` can no longer be configured
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConfigured` or `Sealed`
    pub fn ensure_configurable(&self, key: TypeKey) -> DiffResult<()> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(&key) {
            None => Ok(()),
            Some(entry) => Err(Self::conflict(key, entry)),
        }
    }

    /// Publish a configuration
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConfigured` if the type was registered before, or
    /// `Sealed` if it was already compiled with its default configuration
    pub fn register(&self, config: TypeConfig) -> DiffResult<Arc<TypeConfig>> {
        let key = config.type_key();
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entries.get(&key) {
            return Err(Self::conflict(key, entry));
        }
        let config = Arc::new(config);
        entries.insert(key, Entry::Registered(Arc::clone(&config)));
        Ok(config)
    }

    /// Configuration used for synthesis
    ///
    /// An unregistered type is sealed with its default configuration.
    #[must_use]
    pub fn lookup(&self, key: TypeKey) -> Arc<TypeConfig> {
        if let Some(entry) = self.entries.read().unwrap_or_else(PoisonError::into_inner).get(&key) {
            return Arc::clone(entry.config());
        }
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        let entry = entries
            .entry(key)
            .or_insert_with(|| Entry::Sealed(Arc::new(TypeConfig::new(key))));
        Arc::clone(entry.config())
    }

    /// Configuration of `key` without sealing it
    #[must_use]
    pub fn get(&self, key: TypeKey) -> Option<Arc<TypeConfig>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        entries.get(&key).map(|entry| Arc::clone(entry.config()))
    }

    /// Whether `key` was registered explicitly
    #[must_use]
    pub fn is_configured(&self, key: TypeKey) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        matches!(entries.get(&key), Some(Entry::Registered(_)))
    }

    /// Whether `key` was sealed with its default configuration
    #[must_use]
    pub fn is_sealed(&self, key: TypeKey) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        matches!(entries.get(&key), Some(Entry::Sealed(_)))
    }

    /// Number of known types
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no type is known
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn conflict(key: TypeKey, entry: &Entry) -> DiffError {
        let type_name = key.name().to_string();
        match entry {
            Entry::Registered(_) => DiffError::AlreadyConfigured { type_name },
            Entry::Sealed(_) => DiffError::Sealed { type_name },
        }
    }
}

impl Default for ConfigRegistry {
    fn default() -> Self {
        Self::new()
    }
}
