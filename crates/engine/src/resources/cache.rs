use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{LoadContext, Resource};

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// Hashed resource key. Hashing a name and using the precomputed id reach the
/// same cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

impl ResourceId {
    pub const fn from_name(name: &str) -> Self {
        let bytes = name.as_bytes();
        let mut hash = FNV_OFFSET_BASIS;
        let mut index = 0;
        while index < bytes.len() {
            hash ^= bytes[index] as u32;
            hash = hash.wrapping_mul(FNV_PRIME);
            index += 1;
        }
        Self(hash)
    }
}

impl From<&str> for ResourceId {
    fn from(name: &str) -> Self {
        Self::from_name(name)
    }
}

impl From<u32> for ResourceId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// Shared reference to a cached resource, possibly empty. Callers check
/// before use.
pub struct Handle<T> {
    inner: Option<Arc<T>>,
}

impl<T> Handle<T> {
    pub fn empty() -> Self {
        Self { inner: None }
    }

    pub fn new(resource: T) -> Self {
        Self {
            inner: Some(Arc::new(resource)),
        }
    }

    pub fn is_loaded(&self) -> bool {
        self.inner.is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_none()
    }

    pub fn get(&self) -> Option<&T> {
        self.inner.as_deref()
    }

    /// Identity comparison. Two empty handles are equal.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        match (&self.inner, &other.inner) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        }
    }

    pub fn use_count(&self) -> usize {
        self.inner.as_ref().map_or(0, Arc::strong_count)
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> Default for Handle<T> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.inner {
            Some(resource) => write!(f, "Handle({:p})", Arc::as_ptr(resource)),
            None => f.write_str("Handle(empty)"),
        }
    }
}

impl<T> From<Option<Arc<T>>> for Handle<T> {
    fn from(inner: Option<Arc<T>>) -> Self {
        Self { inner }
    }
}

/// One cache per resource type.
pub struct ResourceCache<T> {
    entries: HashMap<ResourceId, Handle<T>>,
}

impl<T: Resource> ResourceCache<T> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Runs the loader and replaces whatever was cached under `id`. A failed
    /// load leaves an empty entry behind.
    pub fn load(
        &mut self,
        ctx: &LoadContext,
        id: ResourceId,
        name: &str,
        args: T::Args,
    ) -> Handle<T> {
        let handle = match T::load(ctx, name, args) {
            Ok(resource) => {
                debug!(kind = T::KIND, name, id = id.0, "resource_loaded");
                Handle::new(resource)
            }
            Err(error) => {
                warn!(kind = T::KIND, name, id = id.0, error = %error, "resource_load_failed");
                Handle::empty()
            }
        };
        self.entries.insert(id, handle.clone());
        handle
    }

    pub fn get(&self, id: ResourceId) -> Handle<T> {
        self.entries.get(&id).cloned().unwrap_or_default()
    }

    pub fn contains(&self, id: ResourceId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn release(&mut self, id: ResourceId) -> bool {
        self.entries.remove(&id).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<T: Resource> Default for ResourceCache<T> {
    fn default() -> Self {
        Self::new()
    }
}

trait AnyCache: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
    fn kind(&self) -> &'static str;
    fn entry_count(&self) -> usize;
    fn clear_entries(&mut self);
}

impl<T: Resource> AnyCache for ResourceCache<T> {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn kind(&self) -> &'static str {
        T::KIND
    }

    fn entry_count(&self) -> usize {
        self.len()
    }

    fn clear_entries(&mut self) {
        self.clear();
    }
}

/// Owns one lazily created [`ResourceCache`] per resource type.
pub struct ResourceManager {
    ctx: LoadContext,
    caches: HashMap<TypeId, Box<dyn AnyCache + Send + Sync>>,
}

impl ResourceManager {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            ctx: LoadContext::new(asset_root),
            caches: HashMap::new(),
        }
    }

    pub fn context(&self) -> &LoadContext {
        &self.ctx
    }

    pub fn load<T: Resource>(&mut self, name: &str, args: T::Args) -> Handle<T> {
        self.load_as::<T>(ResourceId::from_name(name), name, args)
    }

    /// Loads `name` but files the result under an explicit id.
    pub fn load_as<T: Resource>(
        &mut self,
        id: impl Into<ResourceId>,
        name: &str,
        args: T::Args,
    ) -> Handle<T> {
        let id = id.into();
        let ctx = self.ctx.clone();
        self.cache_mut::<T>()
            .map(|cache| cache.load(&ctx, id, name, args))
            .unwrap_or_default()
    }

    pub fn get<T: Resource>(&self, name: &str) -> Handle<T> {
        self.get_by_id::<T>(ResourceId::from_name(name))
    }

    /// Returns the cached entry if one exists, even an empty one left by a
    /// failed load; loads only on first use.
    pub fn get_or_load<T: Resource>(&mut self, name: &str, args: T::Args) -> Handle<T> {
        if self.contains::<T>(name) {
            return self.get::<T>(name);
        }
        self.load::<T>(name, args)
    }

    pub fn get_by_id<T: Resource>(&self, id: impl Into<ResourceId>) -> Handle<T> {
        let id = id.into();
        self.cache::<T>()
            .map(|cache| cache.get(id))
            .unwrap_or_default()
    }

    pub fn contains<T: Resource>(&self, name: &str) -> bool {
        self.cache::<T>()
            .is_some_and(|cache| cache.contains(ResourceId::from_name(name)))
    }

    /// Drops the cache's reference. Outstanding handles keep the resource alive.
    pub fn release<T: Resource>(&mut self, name: &str) -> bool {
        self.caches
            .get_mut(&TypeId::of::<T>())
            .and_then(|cache| cache.as_any_mut().downcast_mut::<ResourceCache<T>>())
            .is_some_and(|cache| cache.release(ResourceId::from_name(name)))
    }

    pub fn cached_count<T: Resource>(&self) -> usize {
        self.cache::<T>().map_or(0, ResourceCache::len)
    }

    /// Number of per-type caches instantiated so far.
    pub fn cache_count(&self) -> usize {
        self.caches.len()
    }

    pub fn clear<T: Resource>(&mut self) {
        if let Some(cache) = self.caches.get_mut(&TypeId::of::<T>()) {
            cache.clear_entries();
        }
    }

    pub fn clear_all(&mut self) {
        for cache in self.caches.values_mut() {
            info!(
                kind = cache.kind(),
                entries = cache.entry_count(),
                "resource_cache_cleared"
            );
            cache.clear_entries();
        }
    }

    fn cache<T: Resource>(&self) -> Option<&ResourceCache<T>> {
        self.caches
            .get(&TypeId::of::<T>())
            .and_then(|cache| cache.as_any().downcast_ref::<ResourceCache<T>>())
    }

    fn cache_mut<T: Resource>(&mut self) -> Option<&mut ResourceCache<T>> {
        self.caches
            .entry(TypeId::of::<T>())
            .or_insert_with(|| {
                Box::new(ResourceCache::<T>::new()) as Box<dyn AnyCache + Send + Sync>
            })
            .as_any_mut()
            .downcast_mut::<ResourceCache<T>>()
    }
}

impl Drop for ResourceManager {
    fn drop(&mut self) {
        self.clear_all();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::super::ResourceLoadError;
    use super::*;

    #[derive(Debug)]
    struct Counted {
        serial: usize,
    }

    impl Resource for Counted {
        type Args = Arc<AtomicUsize>;
        const KIND: &'static str = "counted";

        fn load(
            _ctx: &LoadContext,
            _name: &str,
            loads: Arc<AtomicUsize>,
        ) -> Result<Self, ResourceLoadError> {
            let serial = loads.fetch_add(1, Ordering::SeqCst);
            Ok(Self { serial })
        }
    }

    #[derive(Debug)]
    struct Scaled(u32);

    impl Resource for Scaled {
        type Args = u32;
        const KIND: &'static str = "scaled";

        fn load(_ctx: &LoadContext, name: &str, factor: u32) -> Result<Self, ResourceLoadError> {
            if factor == 0 {
                return Err(ResourceLoadError::InvalidData {
                    path: PathBuf::from(name),
                    message: "factor must be non-zero".to_string(),
                });
            }
            Ok(Self(name.len() as u32 * factor))
        }
    }

    #[test]
    fn resource_id_is_fnv1a() {
        assert_eq!(ResourceId::from_name("").0, 0x811c_9dc5);
        assert_eq!(ResourceId::from_name("a").0, 0xe40c_292c);
        assert_eq!(ResourceId::from("roboto"), ResourceId::from_name("roboto"));
    }

    #[test]
    fn get_twice_returns_same_object_without_loading() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut manager = ResourceManager::new("unused");
        let loaded = manager.load::<Counted>("get_twice", Arc::clone(&loads));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        let first = manager.get::<Counted>("get_twice");
        let second = manager.get::<Counted>("get_twice");

        assert!(first.ptr_eq(&second));
        assert!(first.ptr_eq(&loaded));
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn load_twice_reloads_and_replaces_entry() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut manager = ResourceManager::new("unused");
        let first = manager.load::<Counted>("reload", Arc::clone(&loads));
        let second = manager.load::<Counted>("reload", Arc::clone(&loads));

        assert_eq!(loads.load(Ordering::SeqCst), 2);
        assert!(!first.ptr_eq(&second));
        assert_eq!(first.get().map(|counted| counted.serial), Some(0));
        assert_eq!(second.get().map(|counted| counted.serial), Some(1));

        let current = manager.get::<Counted>("reload");
        assert!(current.ptr_eq(&second));
        assert_eq!(manager.cached_count::<Counted>(), 1);
    }

    #[test]
    fn get_or_load_loads_once_even_after_failure() {
        let loads = Arc::new(AtomicUsize::new(0));
        let mut manager = ResourceManager::new("unused");
        let first = manager.get_or_load::<Counted>("shared", Arc::clone(&loads));
        let second = manager.get_or_load::<Counted>("shared", Arc::clone(&loads));
        assert!(first.ptr_eq(&second));
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        assert!(manager.get_or_load::<Scaled>("bad", 0).is_empty());
        assert!(manager.get_or_load::<Scaled>("bad", 5).is_empty());
    }

    #[test]
    fn get_never_loads_and_returns_empty_for_unknown_keys() {
        let manager = ResourceManager::new("unused");
        let handle = manager.get::<Counted>("never_loaded");
        assert!(handle.is_empty());
        assert_eq!(manager.cache_count(), 0);
    }

    #[test]
    fn failed_load_installs_empty_entry() {
        let mut manager = ResourceManager::new("unused");
        let handle = manager.load::<Scaled>("broken", 0);
        assert!(handle.is_empty());
        assert!(manager.contains::<Scaled>("broken"));
        assert!(manager.get::<Scaled>("broken").is_empty());
    }

    #[test]
    fn failed_reload_replaces_previous_good_entry() {
        let mut manager = ResourceManager::new("unused");
        let good = manager.load::<Scaled>("flaky", 2);
        assert!(good.is_loaded());

        let reloaded = manager.load::<Scaled>("flaky", 0);
        assert!(reloaded.is_empty());
        assert!(manager.get::<Scaled>("flaky").is_empty());
        assert_eq!(good.get().map(|scaled| scaled.0), Some(10));
    }

    #[test]
    fn id_and_name_keys_reach_the_same_entry() {
        let mut manager = ResourceManager::new("unused");
        let by_name = manager.load::<Scaled>("abcd", 3);
        let by_id = manager.get_by_id::<Scaled>(ResourceId::from_name("abcd"));
        assert!(by_name.ptr_eq(&by_id));
        assert_eq!(by_id.get().map(|scaled| scaled.0), Some(12));

        let custom = manager.load_as::<Scaled>(7u32, "xy", 10);
        assert!(manager.get_by_id::<Scaled>(7u32).ptr_eq(&custom));
        assert!(manager.get::<Scaled>("xy").is_empty());
    }

    #[test]
    fn one_cache_per_type_and_handles_outlive_release() {
        let mut manager = ResourceManager::new("unused");
        let counted = manager.load::<Counted>("typed", Arc::new(AtomicUsize::new(0)));
        manager.load::<Scaled>("typed", 1);
        assert_eq!(manager.cache_count(), 2);
        assert_eq!(counted.use_count(), 2);

        assert!(manager.release::<Counted>("typed"));
        assert!(!manager.release::<Counted>("typed"));
        assert!(counted.is_loaded());
        assert_eq!(counted.use_count(), 1);
        assert!(manager.get::<Counted>("typed").is_empty());
        assert!(manager.get::<Scaled>("typed").is_loaded());

        manager.clear_all();
        assert_eq!(manager.cached_count::<Scaled>(), 0);
    }
}
