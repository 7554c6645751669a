//! Delivery of document change events to a step.

use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};

use xstep_core::{ChangeNotifier, ListenerId, UpdateEvent, UpdateListener};

/// Forwards notifier callbacks into a channel owned by the step.
struct ChannelListener {
    sender: Sender<UpdateEvent>,
}

impl UpdateListener for ChannelListener {
    fn document_updated(&self, event: UpdateEvent) {
        if self.sender.send(event).is_err() {
            tracing::warn!(document = %event.document, "update delivered to a dropped step");
        }
    }
}

/// Registration with a [`ChangeNotifier`]; unsubscribes when dropped.
pub struct Subscription {
    notifier: Arc<dyn ChangeNotifier>,
    id: ListenerId,
}

impl Subscription {
    pub fn new(notifier: Arc<dyn ChangeNotifier>, listener: Arc<dyn UpdateListener>) -> Self {
        let id = notifier.subscribe(listener);
        Self { notifier, id }
    }

    pub fn id(&self) -> ListenerId {
        self.id
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.notifier.unsubscribe(self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish_non_exhaustive()
    }
}

/// Receiving end of a step's update subscription.
#[derive(Debug)]
pub(crate) struct UpdateChannel {
    receiver: Receiver<UpdateEvent>,
    subscription: Subscription,
}

impl UpdateChannel {
    pub(crate) fn open(notifier: &Arc<dyn ChangeNotifier>) -> Self {
        let (sender, receiver) = mpsc::channel();
        let subscription = Subscription::new(Arc::clone(notifier), Arc::new(ChannelListener { sender }));
        tracing::trace!(listener = ?subscription.id(), "step subscribed to document updates");
        Self { receiver, subscription }
    }

    pub(crate) fn drain(&self) -> Vec<UpdateEvent> {
        self.receiver.try_iter().collect()
    }

    pub(crate) fn listener_id(&self) -> ListenerId {
        self.subscription.id()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use xstep_core::{DocumentId, NotificationService};

    #[rstest]
    fn events_queue_until_drained_and_drop_unsubscribes() {
        let service = Arc::new(NotificationService::new());
        let notifier: Arc<dyn ChangeNotifier> = service.clone();
        let channel = UpdateChannel::open(&notifier);
        assert_eq!(service.listener_count(), 1);

        service.notify(UpdateEvent::added(DocumentId(1)));
        service.notify(UpdateEvent::other(DocumentId(2)));
        assert_eq!(channel.drain(), vec![UpdateEvent::added(DocumentId(1)), UpdateEvent::other(DocumentId(2))]);
        assert!(channel.drain().is_empty());

        drop(channel);
        assert_eq!(service.listener_count(), 0);
    }
}
