//! Document change notification.
//!
//! Stores announce document changes through a [`ChangeNotifier`]. Listeners
//! are registered as `Arc<dyn UpdateListener>` and identified by the
//! [`ListenerId`] returned from `subscribe`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::node::DocumentId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UpdateKind {
    /// A new document was stored.
    Added,
    /// An existing document was modified or removed.
    Other,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpdateEvent {
    pub document: DocumentId,
    pub kind: UpdateKind,
}

impl UpdateEvent {
    pub fn added(document: DocumentId) -> Self {
        Self { document, kind: UpdateKind::Added }
    }

    pub fn other(document: DocumentId) -> Self {
        Self { document, kind: UpdateKind::Other }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ListenerId(pub u64);

pub trait UpdateListener: Send + Sync {
    fn document_updated(&self, event: UpdateEvent);
}

pub trait ChangeNotifier: Send + Sync {
    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> ListenerId;

    /// Removes the listener; returns `false` if it was not registered.
    fn unsubscribe(&self, id: ListenerId) -> bool;
}

/// Listener registry that fans events out to every subscriber.
#[derive(Default)]
pub struct NotificationService {
    listeners: Mutex<Vec<(ListenerId, Arc<dyn UpdateListener>)>>,
    next_id: AtomicU64,
}

impl NotificationService {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<(ListenerId, Arc<dyn UpdateListener>)>> {
        self.listeners.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn listener_count(&self) -> usize {
        self.lock().len()
    }

    /// Delivers `event` to all listeners registered at the time of the call.
    ///
    /// Listeners run outside the registry lock, so they may subscribe or
    /// unsubscribe from within the callback.
    pub fn notify(&self, event: UpdateEvent) {
        let listeners: Vec<Arc<dyn UpdateListener>> =
            self.lock().iter().map(|(_, listener)| Arc::clone(listener)).collect();
        tracing::trace!(document = %event.document, kind = ?event.kind, listeners = listeners.len(), "document update");
        for listener in listeners {
            listener.document_updated(event);
        }
    }
}

impl ChangeNotifier for NotificationService {
    fn subscribe(&self, listener: Arc<dyn UpdateListener>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.lock().push((id, listener));
        id
    }

    fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.lock();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }
}

impl std::fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationService").field("listeners", &self.listener_count()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<UpdateEvent>>,
    }

    impl UpdateListener for Recorder {
        fn document_updated(&self, event: UpdateEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    #[rstest]
    fn delivers_to_subscribers_until_unsubscribed() {
        let service = NotificationService::new();
        let recorder = Arc::new(Recorder::default());
        let id = service.subscribe(recorder.clone());

        service.notify(UpdateEvent::added(DocumentId(1)));
        assert!(service.unsubscribe(id));
        assert!(!service.unsubscribe(id));
        service.notify(UpdateEvent::other(DocumentId(1)));

        assert_eq!(*recorder.events.lock().unwrap(), vec![UpdateEvent::added(DocumentId(1))]);
        assert_eq!(service.listener_count(), 0);
    }

    #[rstest]
    fn listener_ids_are_distinct() {
        let service = NotificationService::new();
        let a = service.subscribe(Arc::new(Recorder::default()));
        let b = service.subscribe(Arc::new(Recorder::default()));
        assert_ne!(a, b);
        assert_eq!(service.listener_count(), 2);
    }
}
