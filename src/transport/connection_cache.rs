//! # Connection Cache
//!
//! Authenticated connections keyed by correlation id.
//!
//! Each key owns a slot with its own async mutex. Looking up a key and
//! building it when absent happen under that slot's lock, so concurrent
//! callers for the same id wait for one in-flight build and share its result,
//! while different ids build in parallel.
//!
//! A failed build leaves the slot empty; the next waiter runs its own build.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::transport::connection::Connection;

type Slot = Arc<Mutex<Option<Arc<Connection>>>>;

/// Outcome of [`ConnectionCache::get_or_build`]
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The connection was already cached
    Hit(Arc<Connection>),
    /// This call built and cached the connection
    Built(Arc<Connection>),
}

impl Lookup {
    pub fn connection(&self) -> &Arc<Connection> {
        match self {
            Lookup::Hit(conn) | Lookup::Built(conn) => conn,
        }
    }

    pub fn into_connection(self) -> Arc<Connection> {
        match self {
            Lookup::Hit(conn) | Lookup::Built(conn) => conn,
        }
    }

    pub fn is_hit(&self) -> bool {
        matches!(self, Lookup::Hit(_))
    }
}

#[derive(Default)]
pub struct ConnectionCache {
    slots: Mutex<HashMap<u32, Slot>>,
}

impl ConnectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cached connection for `id`, without waiting on an in-flight build.
    pub async fn get(&self, id: u32) -> Option<Arc<Connection>> {
        let slot = self.slots.lock().await.get(&id).cloned()?;
        let entry = slot.try_lock().ok()?;
        entry.clone()
    }

    /// Return the connection cached under `id`, or run `build` and cache what
    /// it returns.
    pub async fn get_or_build<F, Fut>(&self, id: u32, build: F) -> Result<Lookup>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Connection>>,
    {
        let slot = self.slots.lock().await.entry(id).or_default().clone();
        let mut entry = slot.lock().await;

        if let Some(conn) = entry.as_ref() {
            trace!(correlation_id = id, "Connection cache hit");
            return Ok(Lookup::Hit(conn.clone()));
        }

        match build().await {
            Ok(conn) => {
                let conn = Arc::new(conn);
                // A remove() or close_all() that ran during the build holds
                // this slot outside the map and takes the connection once the
                // lock is released.
                *entry = Some(conn.clone());
                drop(entry);
                debug!(correlation_id = id, "Connection cached");
                Ok(Lookup::Built(conn))
            }
            Err(e) => {
                drop(entry);
                self.prune(id, &slot).await;
                Err(e)
            }
        }
    }

    /// Drop an empty slot nobody else is waiting on.
    async fn prune(&self, id: u32, slot: &Slot) {
        let mut slots = self.slots.lock().await;
        let unshared = Arc::strong_count(slot) == 2;
        if unshared && slots.get(&id).is_some_and(|s| Arc::ptr_eq(s, slot)) {
            slots.remove(&id);
        }
    }

    /// Take the connection for `id` out of the cache.
    ///
    /// Waits for an in-flight build of the same id to finish first.
    pub async fn remove(&self, id: u32) -> Option<Arc<Connection>> {
        let slot = self.slots.lock().await.remove(&id)?;
        let conn = slot.lock().await.take();
        conn
    }

    /// Remove every connection and close its socket.
    pub async fn close_all(&self) -> usize {
        let slots: Vec<(u32, Slot)> = self.slots.lock().await.drain().collect();
        let mut closed = 0;
        for (id, slot) in slots {
            let Some(conn) = slot.lock().await.take() else {
                continue;
            };
            if let Err(e) = conn.close().await {
                warn!(correlation_id = id, error = %e, "Failed to close connection");
            }
            closed += 1;
        }
        debug!(closed, "Connection cache cleared");
        closed
    }

    pub async fn contains(&self, id: u32) -> bool {
        self.get(id).await.is_some()
    }

    /// Number of cached connections (in-flight builds not included)
    pub async fn len(&self) -> usize {
        let slots: Vec<Slot> = self.slots.lock().await.values().cloned().collect();
        let mut count = 0;
        for slot in slots {
            if let Ok(entry) = slot.try_lock() {
                count += usize::from(entry.is_some());
            }
        }
        count
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}
