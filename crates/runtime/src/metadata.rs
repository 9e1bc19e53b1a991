use std::any::TypeId;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use lru::LruCache;
use tagforge_core::introspect::StaticIntrospector;
use tagforge_core::{PropertyDescriptor, PropertyIntrospector, TargetType, ValueType};

const GLOBAL_CAPACITY: usize = 256;

/// Introspected properties of one target type.
#[derive(Debug)]
pub struct TargetMetadata {
    target: TargetType,
    properties: HashMap<String, PropertyDescriptor>,
}

impl TargetMetadata {
    pub fn new(target: TargetType, descriptors: Vec<PropertyDescriptor>) -> Self {
        let properties = descriptors
            .into_iter()
            .map(|descriptor| (descriptor.name().to_owned(), descriptor))
            .collect();
        Self { target, properties }
    }

    pub fn target(&self) -> TargetType {
        self.target
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub fn property_type(&self, name: &str) -> Option<ValueType> {
        self.property(name).map(PropertyDescriptor::value_type)
    }

    /// Property `name` if it can be written.
    pub fn write_method(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.property(name).filter(|property| property.is_writable())
    }

    /// Property `name` if it can be read.
    pub fn read_method(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.property(name).filter(|property| property.is_readable())
    }

    pub fn property_names(&self) -> impl Iterator<Item = &str> {
        self.properties.keys().map(String::as_str)
    }
}

/// Bounded cache of [`TargetMetadata`] keyed by type identity.
///
/// Introspection runs outside the lock, so two threads asking for the same new
/// type may both introspect it; the entry stored last wins.
pub struct MetadataCache {
    introspector: Arc<dyn PropertyIntrospector>,
    entries: Mutex<LruCache<TypeId, Arc<TargetMetadata>>>,
    introspections: AtomicUsize,
}

impl MetadataCache {
    pub fn new(capacity: usize) -> Self {
        Self::with_introspector(capacity, Arc::new(StaticIntrospector))
    }

    pub fn with_introspector(capacity: usize, introspector: Arc<dyn PropertyIntrospector>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            introspector,
            entries: Mutex::new(LruCache::new(capacity)),
            introspections: AtomicUsize::new(0),
        }
    }

    /// Process-wide cache shared by environments that do not bring their own.
    pub fn global() -> Arc<MetadataCache> {
        static GLOBAL: OnceLock<Arc<MetadataCache>> = OnceLock::new();
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(MetadataCache::new(GLOBAL_CAPACITY))))
    }

    pub fn metadata_for(&self, target: &TargetType) -> Arc<TargetMetadata> {
        if let Some(found) = self.entries().get(&target.id()) {
            tracing::trace!(target_type = target.name(), "metadata cache hit");
            return Arc::clone(found);
        }

        let descriptors = self.introspector.introspect(target);
        self.introspections.fetch_add(1, Ordering::SeqCst);
        let metadata = Arc::new(TargetMetadata::new(*target, descriptors));
        tracing::debug!(
            target_type = target.name(),
            properties = metadata.properties.len(),
            "introspected target type"
        );

        self.entries().put(target.id(), Arc::clone(&metadata));
        metadata
    }

    /// Drops the entry for `target`. Returns whether one was cached.
    pub fn evict(&self, target: &TargetType) -> bool {
        self.entries().pop(&target.id()).is_some()
    }

    pub fn clear(&self) {
        self.entries().clear();
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries().cap().get()
    }

    /// Number of introspections performed over the cache's lifetime.
    pub fn introspections(&self) -> usize {
        self.introspections.load(Ordering::SeqCst)
    }

    fn entries(&self) -> MutexGuard<'_, LruCache<TypeId, Arc<TargetMetadata>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
