//! Navigation event bus — publish/subscribe channel that lets an already-open
//! web surface load a new destination in place.
//!
//! Listeners are `Arc<dyn NavigateListener>`; each open surface holds one
//! [`Subscription`] and drops it when the surface goes away.

use parking_lot::{Mutex, RwLock};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// A request for the open surface to load `destination_url`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NavigateEvent {
    pub destination_url: String,
    pub background_color: Option<String>,
}

/// Receives navigate events. Invoked synchronously on the publishing thread;
/// thread affinity (e.g. a UI thread) is the listener's concern.
pub trait NavigateListener: Send + Sync {
    fn on_navigate(&self, event: &NavigateEvent);
}

impl<F> NavigateListener for F
where
    F: Fn(&NavigateEvent) + Send + Sync,
{
    fn on_navigate(&self, event: &NavigateEvent) {
        self(event)
    }
}

struct Registration {
    id: u64,
    listener: Arc<dyn NavigateListener>,
}

#[derive(Default)]
struct BusInner {
    listeners: RwLock<Vec<Registration>>,
    next_id: AtomicU64,
}

impl BusInner {
    fn remove(&self, id: u64) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|r| r.id != id);
        listeners.len() != before
    }
}

fn same_listener(a: &Arc<dyn NavigateListener>, b: &Arc<dyn NavigateListener>) -> bool {
    // Compare data pointers only; vtable addresses are not stable across codegen units.
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Process-wide navigate channel. Cloning yields another handle to the same bus.
#[derive(Clone, Default)]
pub struct NavigationEventBus {
    inner: Arc<BusInner>,
}

impl NavigationEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Registering the same listener object again has
    /// no effect: the returned handle refers to the existing registration and
    /// does not unsubscribe when dropped, though `unsubscribe()` still works.
    pub fn subscribe(&self, listener: Arc<dyn NavigateListener>) -> Subscription {
        let mut listeners = self.inner.listeners.write();
        if let Some(existing) = listeners
            .iter()
            .find(|r| same_listener(&r.listener, &listener))
        {
            debug!(subscription_id = existing.id, "navigate listener already registered");
            return Subscription::new(&self.inner, existing.id, false);
        }

        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        listeners.push(Registration { id, listener });
        debug!(subscription_id = id, listeners = listeners.len(), "navigate listener registered");
        Subscription::new(&self.inner, id, true)
    }

    /// Deliver a navigate event to every listener in registration order.
    /// A panicking listener is logged and skipped. Returns the number of
    /// listeners that handled the event.
    pub fn publish(&self, destination_url: &str, background_color: Option<&str>) -> usize {
        let event = NavigateEvent {
            destination_url: destination_url.to_string(),
            background_color: background_color.map(str::to_string),
        };

        // Snapshot so listeners may (un)subscribe while being notified.
        let snapshot: Vec<(u64, Arc<dyn NavigateListener>)> = self
            .inner
            .listeners
            .read()
            .iter()
            .map(|r| (r.id, Arc::clone(&r.listener)))
            .collect();

        let mut delivered = 0;
        for (id, listener) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener.on_navigate(&event))) {
                Ok(()) => delivered += 1,
                Err(_) => warn!(subscription_id = id, url = %event.destination_url, "navigate listener panicked"),
            }
        }

        debug!(url = %event.destination_url, delivered, "navigate event published");
        delivered
    }

    pub fn listener_count(&self) -> usize {
        self.inner.listeners.read().len()
    }
}

/// Handle for one listener registration. The handle that created the
/// registration unsubscribes on drop.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    bus: Weak<BusInner>,
    id: u64,
    owner: bool,
}

impl Subscription {
    fn new(inner: &Arc<BusInner>, id: u64, owner: bool) -> Self {
        Self {
            bus: Arc::downgrade(inner),
            id,
            owner,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Remove the listener. Returns false if it was already removed.
    pub fn unsubscribe(&self) -> bool {
        match self.bus.upgrade() {
            Some(bus) => {
                let removed = bus.remove(self.id);
                if removed {
                    debug!(subscription_id = self.id, "navigate listener removed");
                }
                removed
            }
            None => false,
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.owner {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("owner", &self.owner)
            .finish()
    }
}

/// Listener that records every event it receives, for tests.
#[derive(Default)]
pub struct CaptureListener {
    events: Mutex<Vec<NavigateEvent>>,
}

impl CaptureListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<NavigateEvent> {
        self.events.lock().clone()
    }

    pub fn count(&self) -> usize {
        self.events.lock().len()
    }
}

impl NavigateListener for CaptureListener {
    fn on_navigate(&self, event: &NavigateEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Convenience: create a capture listener for tests.
pub fn capture_listener() -> Arc<CaptureListener> {
    Arc::new(CaptureListener::new())
}
