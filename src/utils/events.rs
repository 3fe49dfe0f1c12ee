// src/utils/events.rs
//! In-process change feed backed by a `tokio::sync::broadcast` channel.
//!
//! Handlers publish an event after committing a workflow transaction;
//! the SSE endpoint forwards events to the affected user so the client can
//! refetch its notification list (or silently refresh its role state)
//! without polling or a full page reload.

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A notification row was inserted for the user.
    NotificationCreated,
    /// The user's role set changed; cached permissions were invalidated and
    /// the client should refetch its profile.
    RolesChanged,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ChangeEvent {
    pub kind: EventKind,
    /// The user this event is addressed to.
    pub user_id: Uuid,
    pub notification_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
}

impl ChangeEvent {
    pub fn notification_created(user_id: Uuid, notification_id: Uuid) -> Self {
        Self {
            kind: EventKind::NotificationCreated,
            user_id,
            notification_id: Some(notification_id),
            created_at: Utc::now().naive_utc(),
        }
    }

    pub fn roles_changed(user_id: Uuid) -> Self {
        Self {
            kind: EventKind::RolesChanged,
            user_id,
            notification_id: None,
            created_at: Utc::now().naive_utc(),
        }
    }
}

/// Cloneable publish/subscribe handle shared through an axum `Extension`.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event. A send error only means no subscriber is currently
    /// connected, which is fine: the feed is advisory and clients fall back
    /// to polling.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscriber_receives_published_event() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let user_id = Uuid::new_v4();
        let notification_id = Uuid::new_v4();

        bus.publish(ChangeEvent::notification_created(user_id, notification_id));

        let event = rx.recv().await.expect("event should be delivered");
        assert_eq!(event.kind, EventKind::NotificationCreated);
        assert_eq!(event.user_id, user_id);
        assert_eq!(event.notification_id, Some(notification_id));
    }

    #[tokio::test]
    async fn publish_without_subscribers_does_not_panic() {
        let bus = EventBus::new();
        bus.publish(ChangeEvent::roles_changed(Uuid::new_v4()));
    }

    #[tokio::test]
    async fn each_subscriber_sees_every_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        let user_id = Uuid::new_v4();

        bus.publish(ChangeEvent::roles_changed(user_id));

        assert_eq!(rx1.recv().await.unwrap().user_id, user_id);
        assert_eq!(rx2.recv().await.unwrap().user_id, user_id);
    }
}
