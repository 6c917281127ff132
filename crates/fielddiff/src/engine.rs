//! Comparison engine.
//!
//! An [`Engine`] owns a configuration registry and a cache of compiled
//! procedures. Each type is compiled at most once per engine: the first
//! caller takes the type's compile lock, synthesizes, publishes the result
//! and releases the lock; concurrent callers wait on the lock and then read
//! the published procedure. Comparisons only take the cache's read lock,
//! and none at all through a [`Procedure`] obtained from [`Engine::procedure`].

use fielddiff_plan::synth::resolve;
use fielddiff_plan::{
    ConfigRegistry, DiffOptions, Diffable, ErasedProcedure, MapKey, Object, Procedure, ProcedureSource,
    SharedRegistry, Synthesizer, TypeConfigBuilder,
};
use fielddiff_core::{DiffResult, Difference, TypeKey};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, RwLock, Weak};
use std::thread::JoinHandle;

/// Compilation counters of an engine
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompileStats {
    /// Types with a published procedure
    pub compiled_types: usize,
    /// Synthesis runs performed
    pub syntheses: u64,
}

struct EngineInner {
    /// Handle given to synthesizers for lazy element procedures
    this: Weak<EngineInner>,
    registry: SharedRegistry,
    options: Arc<DiffOptions>,
    /// Published procedures, in compilation order
    cache: RwLock<IndexMap<TypeKey, ErasedProcedure>>,
    /// One compile lock per type
    locks: Mutex<HashMap<TypeKey, Arc<Mutex<()>>>>,
    syntheses: AtomicU64,
}

impl EngineInner {
    fn cached(&self, key: TypeKey) -> Option<ErasedProcedure> {
        let cache = self.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.get(&key).map(Arc::clone)
    }

    fn compile_lock(&self, key: TypeKey) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(locks.entry(key).or_default())
    }

    fn synthesizer(&self) -> Synthesizer {
        let source: Weak<dyn ProcedureSource> = self.this.clone();
        Synthesizer::new(Arc::clone(&self.registry), Arc::clone(&self.options)).with_source(source)
    }
}

impl ProcedureSource for EngineInner {
    fn resolve_erased(&self, key: TypeKey, build: &dyn Fn(&Synthesizer) -> ErasedProcedure) -> ErasedProcedure {
        if let Some(procedure) = self.cached(key) {
            tracing::trace!(type_name = key.name(), "Procedure cache hit");
            return procedure;
        }

        let lock = self.compile_lock(key);
        let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(procedure) = self.cached(key) {
            return procedure;
        }

        let procedure = build(&self.synthesizer());
        self.syntheses.fetch_add(1, Ordering::Relaxed);
        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        cache.insert(key, Arc::clone(&procedure));
        procedure
    }
}

/// Configuration registry plus compiled-procedure cache
///
/// Cloning shares the same registry and cache. Separate engines are fully
/// isolated: a type may be configured differently in each.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<EngineInner>,
}

impl Engine {
    /// Create an engine with default options
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(DiffOptions::default())
    }

    /// Create an engine with custom options
    #[must_use]
    pub fn with_options(options: DiffOptions) -> Self {
        let inner = Arc::new_cyclic(|this| EngineInner {
            this: this.clone(),
            registry: Arc::new(ConfigRegistry::new()),
            options: Arc::new(options),
            cache: RwLock::new(IndexMap::new()),
            locks: Mutex::new(HashMap::new()),
            syntheses: AtomicU64::new(0),
        });
        Self { inner }
    }

    /// Start configuring `T`
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConfigured` if `T` was registered before, or `Sealed`
    /// if `T` was already compiled with its default configuration
    pub fn configure<T: Object>(&self) -> DiffResult<Configure<'_, T>> {
        self.inner.registry.ensure_configurable(TypeKey::of::<T>())?;
        Ok(Configure {
            engine: self,
            builder: TypeConfigBuilder::new(),
        })
    }

    /// Compile `T` now, if it is not compiled yet
    pub fn compile<T: Object>(&self) {
        let _ = self.procedure::<T>();
    }

    /// Compile `T` on a background thread
    pub fn compile_in_background<T: Object>(&self) -> JoinHandle<()> {
        let engine = self.clone();
        std::thread::spawn(move || engine.compile::<T>())
    }

    /// The compiled procedure of `T`, compiling it on first use
    ///
    /// The returned procedure can be called repeatedly without touching the
    /// engine's cache again.
    #[must_use]
    pub fn procedure<T: Object>(&self) -> Procedure<T> {
        resolve::<T>(&*self.inner).unwrap_or_else(|| {
            tracing::warn!(type_name = TypeKey::of::<T>().name(), "Cached procedure has an unexpected type");
            self.inner.synthesizer().synthesize::<T>()
        })
    }

    /// Differences between two values of `T`
    #[must_use]
    pub fn compare<T: Object>(&self, old: &T, new: &T) -> Vec<Difference> {
        self.procedure::<T>().call(old, new)
    }

    /// Differences between two possibly absent values of `T`
    ///
    /// Empty when both are absent. When one side is absent, every leaf of the
    /// other side is reported.
    #[must_use]
    pub fn compare_optional<T: Object>(&self, old: Option<&T>, new: Option<&T>) -> Vec<Difference> {
        if old.is_none() && new.is_none() {
            return Vec::new();
        }
        self.procedure::<T>().compare(old, new)
    }

    /// Whether `T` has a registered configuration
    #[must_use]
    pub fn is_configured<T: 'static>(&self) -> bool {
        self.inner.registry.is_configured(TypeKey::of::<T>())
    }

    /// Whether `T` has a published procedure
    #[must_use]
    pub fn is_compiled<T: 'static>(&self) -> bool {
        self.inner.cached(TypeKey::of::<T>()).is_some()
    }

    /// Names of the compiled types, in compilation order
    #[must_use]
    pub fn compiled_types(&self) -> Vec<&'static str> {
        let cache = self.inner.cache.read().unwrap_or_else(PoisonError::into_inner);
        cache.keys().map(TypeKey::name).collect()
    }

    /// Compilation counters
    #[must_use]
    pub fn stats(&self) -> CompileStats {
        let cache = self.inner.cache.read().unwrap_or_else(PoisonError::into_inner);
        CompileStats {
            compiled_types: cache.len(),
            syntheses: self.inner.syntheses.load(Ordering::Relaxed),
        }
    }

    /// Options applied to every comparison
    #[must_use]
    pub fn options(&self) -> &DiffOptions {
        &self.inner.options
    }

    /// Configuration registry of this engine
    #[must_use]
    pub fn registry(&self) -> &ConfigRegistry {
        &self.inner.registry
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let stats = self.stats();
        f.debug_struct("Engine")
            .field("options", &self.inner.options)
            .field("configured_types", &self.inner.registry.len())
            .field("compiled_types", &stats.compiled_types)
            .finish()
    }
}

/// Pending configuration of `T`; nothing is visible until [`Configure::register`]
pub struct Configure<'a, T> {
    engine: &'a Engine,
    builder: TypeConfigBuilder<T>,
}

impl<'a, T: Object> Configure<'a, T> {
    /// Exclude a member and everything nested under it
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` or `MemberAlreadyConfigured`
    pub fn ignore(mut self, member: &str) -> DiffResult<Self> {
        self.builder = self.builder.ignore(member)?;
        Ok(self)
    }

    /// Exclude every member whose declared type is `F`
    #[must_use]
    pub fn ignore_type<F: Diffable>(mut self) -> Self {
        self.builder = self.builder.ignore_type::<F>();
        self
    }

    /// Compare `Field` members as well as properties
    #[must_use]
    pub fn compare_fields(mut self) -> Self {
        self.builder = self.builder.compare_fields();
        self
    }

    /// Compare a map of objects entry by entry
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` or `MemberAlreadyConfigured`
    pub fn deep_compare(mut self, member: &str) -> DiffResult<Self> {
        self.builder = self.builder.deep_compare(member)?;
        Ok(self)
    }

    /// Match the elements of a sequence of `E` by their `key` member
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` or `MemberAlreadyConfigured`
    pub fn match_using<E: Object, K: MapKey>(mut self, member: &str, key: &str) -> DiffResult<Self> {
        self.builder = self.builder.match_using::<E, K>(member, key)?;
        Ok(self)
    }

    /// Like [`Self::match_using`]; elements whose key equals `sentinel` are
    /// always reported as new
    ///
    /// # Errors
    ///
    /// Returns `InvalidSelector` or `MemberAlreadyConfigured`
    pub fn match_using_or_new<E: Object, K: MapKey>(mut self, member: &str, key: &str, sentinel: K) -> DiffResult<Self> {
        self.builder = self.builder.match_using_or_new::<E, K>(member, key, sentinel)?;
        Ok(self)
    }

    /// Publish the configuration
    ///
    /// # Errors
    ///
    /// Returns `AlreadyConfigured` or `Sealed` if `T` was registered or
    /// compiled since [`Engine::configure`]
    pub fn register(self) -> DiffResult<Precompile<'a, T>> {
        self.engine.inner.registry.register(self.builder.build())?;
        tracing::debug!(type_name = TypeKey::of::<T>().name(), "Registered configuration");
        Ok(Precompile {
            engine: self.engine,
            _marker: PhantomData,
        })
    }
}

/// Optional precompilation after registration
#[must_use = "call `now()` or `spawn()` to precompile, or drop to compile on first use"]
pub struct Precompile<'a, T> {
    engine: &'a Engine,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Object> Precompile<'_, T> {
    /// Compile on the calling thread
    pub fn now(self) {
        self.engine.compile::<T>();
    }

    /// Compile on a background thread
    pub fn spawn(self) -> JoinHandle<()> {
        self.engine.compile_in_background::<T>()
    }
}
