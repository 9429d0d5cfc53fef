//! Revocable object handles and their per-session owner.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tracing::{debug, trace};

use crate::model::handle::{Blob, ObjectHandle};

/// Table of live object handles, as provided by the hosting platform.
pub trait HandleStore: Send + Sync {
    /// Register `blob` and return a handle to it.
    fn create(&self, blob: Blob) -> ObjectHandle;

    /// Look up the content behind a live handle.
    fn resolve(&self, handle: &ObjectHandle) -> Option<Blob>;

    /// Release a handle. Returns `false` if it was not live.
    fn revoke(&self, handle: &ObjectHandle) -> bool;
}

/// In-process handle table with creation and revocation counters.
#[derive(Debug, Default)]
pub struct MemoryHandleStore {
    next_id: AtomicU64,
    live: Mutex<HashMap<u64, Blob>>,
    created: AtomicUsize,
    revoked: AtomicUsize,
}

impl MemoryHandleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of handles currently live.
    pub fn live_count(&self) -> usize {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Total handles ever created.
    pub fn created_count(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    /// Total successful revocations.
    pub fn revoked_count(&self) -> usize {
        self.revoked.load(Ordering::SeqCst)
    }
}

impl HandleStore for MemoryHandleStore {
    fn create(&self, blob: Blob) -> ObjectHandle {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let size = blob.bytes.len();
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, blob);
        self.created.fetch_add(1, Ordering::SeqCst);
        trace!(id, size, "Created object handle");
        ObjectHandle::new(id, format!("blob:docpreview/{id}"))
    }

    fn resolve(&self, handle: &ObjectHandle) -> Option<Blob> {
        self.live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&handle.id())
            .cloned()
    }

    fn revoke(&self, handle: &ObjectHandle) -> bool {
        let removed = self
            .live
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&handle.id())
            .is_some();
        if removed {
            self.revoked.fetch_add(1, Ordering::SeqCst);
            trace!(id = handle.id(), "Revoked object handle");
        }
        removed
    }
}

/// Handles owned by one preview session: at most one primary handle plus
/// any number of attachment handles.
///
/// Every handle is revoked exactly once, by [`HandleOwner::release_all`] or
/// when the owner is dropped.
pub struct HandleOwner {
    store: Arc<dyn HandleStore>,
    primary: Option<ObjectHandle>,
    attachments: Vec<ObjectHandle>,
}

impl HandleOwner {
    pub fn new(store: Arc<dyn HandleStore>) -> Self {
        Self {
            store,
            primary: None,
            attachments: Vec::new(),
        }
    }

    /// Create the primary handle, revoking the previous one first.
    pub fn set_primary(&mut self, blob: Blob) -> ObjectHandle {
        if let Some(old) = self.primary.take() {
            debug!(id = old.id(), "Replacing primary handle");
            self.store.revoke(&old);
        }
        let handle = self.store.create(blob);
        self.primary = Some(handle.clone());
        handle
    }

    /// Create a handle for an attachment download.
    pub fn add_attachment(&mut self, blob: Blob) -> ObjectHandle {
        let handle = self.store.create(blob);
        self.attachments.push(handle.clone());
        handle
    }

    pub fn primary(&self) -> Option<&ObjectHandle> {
        self.primary.as_ref()
    }

    pub fn attachment_handles(&self) -> &[ObjectHandle] {
        &self.attachments
    }

    /// Whether any handle is held.
    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.attachments.is_empty()
    }

    pub fn store(&self) -> &Arc<dyn HandleStore> {
        &self.store
    }

    /// Revoke every held handle. Returns how many were revoked; a second call returns 0.
    pub fn release_all(&mut self) -> usize {
        let mut released = 0;
        for handle in self.primary.take().into_iter().chain(self.attachments.drain(..)) {
            if self.store.revoke(&handle) {
                released += 1;
            }
        }
        if released > 0 {
            debug!(released, "Released session handles");
        }
        released
    }
}

impl Drop for HandleOwner {
    fn drop(&mut self) {
        self.release_all();
    }
}

impl std::fmt::Debug for HandleOwner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HandleOwner")
            .field("primary", &self.primary)
            .field("attachments", &self.attachments)
            .finish_non_exhaustive()
    }
}

/// Create a handle for a rendering context the session does not own.
///
/// The handle is revoked after `delay` so the consumer has time to load it.
/// Uses the current tokio runtime when there is one, a plain thread otherwise.
pub fn open_detached(store: &Arc<dyn HandleStore>, blob: Blob, delay: Duration) -> ObjectHandle {
    let handle = store.create(blob);
    let store = Arc::clone(store);
    let revoke_handle = handle.clone();

    let revoke = move || {
        store.revoke(&revoke_handle);
        debug!(id = revoke_handle.id(), "Revoked detached handle");
    };

    match tokio::runtime::Handle::try_current() {
        Ok(rt) => {
            rt.spawn(async move {
                tokio::time::sleep(delay).await;
                revoke();
            });
        }
        Err(_) => {
            std::thread::spawn(move || {
                std::thread::sleep(delay);
                revoke();
            });
        }
    }

    handle
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blob(s: &str) -> Blob {
        Blob::new(s.as_bytes().to_vec(), "text/plain")
    }

    #[test]
    fn test_store_create_resolve_revoke() {
        let store = MemoryHandleStore::new();
        let h = store.create(blob("abc"));
        assert_eq!(h.url(), format!("blob:docpreview/{}", h.id()));
        assert_eq!(store.resolve(&h).map(|b| b.bytes), Some(b"abc".to_vec()));
        assert!(store.revoke(&h));
        assert!(!store.revoke(&h));
        assert!(store.resolve(&h).is_none());
        assert_eq!(store.revoked_count(), 1);
    }

    #[test]
    fn test_set_primary_revokes_previous() {
        let store = Arc::new(MemoryHandleStore::new());
        let mut owner = HandleOwner::new(store.clone());
        let first = owner.set_primary(blob("one"));
        let second = owner.set_primary(blob("two"));
        assert_ne!(first, second);
        assert!(store.resolve(&first).is_none());
        assert_eq!(store.live_count(), 1);
        assert_eq!(owner.primary(), Some(&second));
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let store = Arc::new(MemoryHandleStore::new());
        let mut owner = HandleOwner::new(store.clone());
        owner.set_primary(blob("p"));
        owner.add_attachment(blob("a"));
        owner.add_attachment(blob("b"));
        assert_eq!(owner.release_all(), 3);
        assert_eq!(owner.release_all(), 0);
        assert!(owner.is_empty());
        assert_eq!(store.live_count(), 0);
    }

    #[test]
    fn test_drop_releases_handles() {
        let store = Arc::new(MemoryHandleStore::new());
        {
            let mut owner = HandleOwner::new(store.clone());
            owner.add_attachment(blob("a"));
            assert_eq!(store.live_count(), 1);
        }
        assert_eq!(store.live_count(), 0);
        assert_eq!(store.revoked_count(), 1);
    }

    #[test]
    fn test_detached_handle_revoked_after_delay_without_runtime() {
        let store: Arc<dyn HandleStore> = Arc::new(MemoryHandleStore::new());
        let h = open_detached(&store, blob("x"), Duration::from_millis(20));
        assert!(store.resolve(&h).is_some());
        std::thread::sleep(Duration::from_millis(300));
        assert!(store.resolve(&h).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_detached_handle_revoked_after_delay_on_runtime() {
        let store: Arc<dyn HandleStore> = Arc::new(MemoryHandleStore::new());
        let h = open_detached(&store, blob("x"), Duration::from_secs(30));
        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(store.resolve(&h).is_some());
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(store.resolve(&h).is_none());
    }
}
