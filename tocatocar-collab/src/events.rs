use serde_json::{json, Value};

use crate::{DirectMessageData, MessageData, NotificationData, PrimaryKey};

/// Events emitted after a collab operation has been committed
#[derive(Debug, Clone)]
pub enum CollabEvent {
    /// Something about a jam changed and clients should refetch it
    JamUpdated { jam_id: PrimaryKey },
    /// A chat message was posted in a jam
    NewMessage(MessageData),
    /// A user received a notification
    NewNotification(NotificationData),
    /// A user received a direct message
    NewDirectMessage(DirectMessageData),
}

impl CollabEvent {
    /// The pub/sub channel the event is published on
    pub fn channel(&self) -> String {
        match self {
            Self::JamUpdated { jam_id } => jam_channel(*jam_id),
            Self::NewMessage(message) => jam_channel(message.jam_id),
            Self::NewNotification(notification) => user_channel(notification.user_id),
            Self::NewDirectMessage(message) => user_channel(message.recipient_id),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::JamUpdated { .. } => "update-jam",
            Self::NewMessage(_) => "new-message",
            Self::NewNotification(_) => "new-notification",
            Self::NewDirectMessage(_) => "new-dm",
        }
    }

    pub fn payload(&self) -> Value {
        let value = match self {
            Self::JamUpdated { jam_id } => Ok(json!({ "jamId": jam_id })),
            Self::NewMessage(message) => serde_json::to_value(message),
            Self::NewNotification(notification) => serde_json::to_value(notification),
            Self::NewDirectMessage(message) => serde_json::to_value(message),
        };

        // These types only hold plain fields, so serialization can't fail
        value.unwrap_or(Value::Null)
    }
}

pub fn jam_channel(jam_id: PrimaryKey) -> String {
    format!("jam-{}", jam_id)
}

pub fn user_channel(user_id: PrimaryKey) -> String {
    format!("user-{}", user_id)
}

/// The value of a committed operation, along with the events it produced
#[derive(Debug)]
pub struct Committed<T> {
    pub value: T,
    pub events: Vec<CollabEvent>,
}

impl<T> Committed<T> {
    pub fn new(value: T) -> Self {
        Self {
            value,
            events: vec![],
        }
    }

    pub fn with(mut self, event: CollabEvent) -> Self {
        self.events.push(event);
        self
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;

    #[test]
    fn test_event_routing() {
        let updated = CollabEvent::JamUpdated { jam_id: 4 };
        assert_eq!(updated.channel(), "jam-4");
        assert_eq!(updated.name(), "update-jam");
        assert_eq!(updated.payload(), json!({ "jamId": 4 }));

        let dm = CollabEvent::NewDirectMessage(DirectMessageData {
            id: 1,
            sender_id: 2,
            recipient_id: 3,
            content: "hola".to_string(),
            read: false,
            created_at: Utc::now(),
        });
        assert_eq!(dm.channel(), "user-3");
        assert_eq!(dm.name(), "new-dm");
        assert_eq!(dm.payload()["senderId"], json!(2));
    }
}
