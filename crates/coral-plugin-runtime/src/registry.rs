//! Shared object registry
//!
//! The registry is the "global object pool" plugins use to publish services
//! and discover what other plugins published. It never owns the objects in
//! any semantic sense: producers add a handle, consumers look handles up,
//! and the producer removes the handle before disposing of the object.

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// An opaque, shareable handle to a published object.
pub type ObjectHandle = Arc<dyn Any + Send + Sync>;

type ObjectCallback = Box<dyn Fn(&ObjectHandle) + Send + Sync>;

/// Process-wide collection of published objects.
///
/// Readers run concurrently; writers are exclusive. Notifications are
/// delivered synchronously: a subscriber observing an added object may
/// immediately call [`all_objects`](Self::all_objects) and find it present,
/// and the about-to-remove notification always fires while the object is
/// still visible.
#[derive(Default)]
pub struct ObjectRegistry {
    objects: RwLock<Vec<ObjectHandle>>,
    added_subscribers: Mutex<Vec<ObjectCallback>>,
    removing_subscribers: Mutex<Vec<ObjectCallback>>,
}

impl fmt::Debug for ObjectRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectRegistry")
            .field("objects", &self.objects.read().len())
            .finish()
    }
}

impl ObjectRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish an object. Returns `false` (and notifies nobody) if the same
    /// handle is already present.
    pub fn add_object(&self, obj: ObjectHandle) -> bool {
        {
            let mut objects = self.objects.write();
            if objects.iter().any(|o| Arc::ptr_eq(o, &obj)) {
                warn!("Attempt to add the same object twice, ignoring");
                return false;
            }
            objects.push(Arc::clone(&obj));
        }
        for subscriber in self.added_subscribers.lock().iter() {
            subscriber(&obj);
        }
        true
    }

    /// Withdraw an object. Subscribers are notified before the object
    /// disappears from snapshots. Returns `false` if the handle is absent.
    pub fn remove_object(&self, obj: &ObjectHandle) -> bool {
        if !self.objects.read().iter().any(|o| Arc::ptr_eq(o, obj)) {
            warn!("Attempt to remove an object that is not in the pool, ignoring");
            return false;
        }
        for subscriber in self.removing_subscribers.lock().iter() {
            subscriber(obj);
        }
        self.objects.write().retain(|o| !Arc::ptr_eq(o, obj));
        true
    }

    /// Snapshot of the current collection, in publication order.
    pub fn all_objects(&self) -> Vec<ObjectHandle> {
        self.objects.read().clone()
    }

    /// Read-lock the pool for callers that must iterate and filter
    /// atomically. Writers block until the guard is dropped.
    pub fn read_lock(&self) -> RwLockReadGuard<'_, Vec<ObjectHandle>> {
        self.objects.read()
    }

    /// The first published object downcastable to `T`.
    pub fn get_object<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.objects
            .read()
            .iter()
            .find_map(|o| Arc::clone(o).downcast::<T>().ok())
    }

    /// Subscribe to object additions. The callback runs synchronously on
    /// the adding thread, after the object became visible.
    pub fn on_object_added<F>(&self, subscriber: F)
    where
        F: Fn(&ObjectHandle) + Send + Sync + 'static,
    {
        self.added_subscribers.lock().push(Box::new(subscriber));
    }

    /// Subscribe to object removals. The callback runs synchronously on the
    /// removing thread, before the object disappears.
    pub fn on_about_to_remove_object<F>(&self, subscriber: F)
    where
        F: Fn(&ObjectHandle) + Send + Sync + 'static,
    {
        self.removing_subscribers.lock().push(Box::new(subscriber));
    }
}
