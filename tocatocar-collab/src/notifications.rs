use log::warn;

use crate::{
    errors::PersistenceContext, AccessPolicy, Actor, CollabContext, CollabEvent, CollabResult,
    Committed, NewNotification, NotificationData, PrimaryKey,
};

/// Persists notifications and pushes them to the user's channel
#[derive(Clone)]
pub struct NotificationManager {
    context: CollabContext,
}

impl NotificationManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn notify(&self, new_notification: NewNotification) -> CollabResult<NotificationData> {
        let committed = self.create(new_notification).await?;
        Ok(self.context.settle(committed).await)
    }

    pub async fn list(&self, actor: &Actor) -> CollabResult<Vec<NotificationData>> {
        self.context
            .database
            .list_notifications(actor.id)
            .await
            .context("listing notifications")
    }

    /// Marks a notification as read. Only the owner may do this.
    pub async fn mark_read(
        &self,
        actor: &Actor,
        notification_id: PrimaryKey,
    ) -> CollabResult<NotificationData> {
        let db = &self.context.database;

        let notification = db
            .notification_by_id(notification_id)
            .await
            .context("fetching notification")?;

        AccessPolicy::ensure(notification.user_id == actor.id)?;

        db.mark_notification_read(notification_id)
            .await
            .context("marking notification as read")
    }

    pub async fn mark_all_read(&self, actor: &Actor) -> CollabResult<()> {
        self.context
            .database
            .mark_all_notifications_read(actor.id)
            .await
            .context("marking notifications as read")
    }

    pub async fn unread_count(&self, actor: &Actor) -> CollabResult<usize> {
        let notifications = self.list(actor).await?;
        Ok(notifications.iter().filter(|n| !n.read).count())
    }

    /// Persists a notification without publishing it yet
    pub(crate) async fn create(
        &self,
        new_notification: NewNotification,
    ) -> CollabResult<Committed<NotificationData>> {
        let notification = self
            .context
            .database
            .create_notification(new_notification)
            .await
            .context("creating notification")?;

        Ok(Committed::new(notification.clone()).with(CollabEvent::NewNotification(notification)))
    }

    /// Persists notifications that accompany another operation.
    /// The operation already committed, so failures here are only logged.
    pub(crate) async fn create_side_effects(
        &self,
        new_notifications: Vec<NewNotification>,
    ) -> Vec<CollabEvent> {
        let mut events = vec![];

        for new_notification in new_notifications {
            let user_id = new_notification.user_id;

            match self.create(new_notification).await {
                Ok(committed) => events.extend(committed.events),
                Err(e) => warn!("Could not notify user {}: {}", user_id, e),
            }
        }

        events
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test::Harness, CollabError};

    fn welcome(user_id: PrimaryKey) -> NewNotification {
        NewNotification {
            user_id,
            kind: "welcome".to_string(),
            message: "Bienvenido".to_string(),
            link: None,
            actor_id: None,
        }
    }

    #[tokio::test]
    async fn test_notify_publishes_to_user_channel() {
        let harness = Harness::new();
        let ana = harness.user("Ana").await;
        let notifications = &harness.collab.notifications;

        let created = notifications.notify(welcome(ana.id)).await.unwrap();

        let channel = format!("user-{}", ana.id);
        assert_eq!(harness.publisher.count(&channel, "new-notification"), 1);
        assert_eq!(notifications.unread_count(&ana).await.unwrap(), 1);

        let read = notifications.mark_read(&ana, created.id).await.unwrap();
        assert!(read.read);
        assert_eq!(notifications.unread_count(&ana).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_only_owner_marks_read() {
        let harness = Harness::new();
        let ana = harness.user("Ana").await;
        let bob = harness.user("Bob").await;
        let notifications = &harness.collab.notifications;

        let created = notifications.notify(welcome(ana.id)).await.unwrap();

        assert!(matches!(
            notifications.mark_read(&bob, created.id).await,
            Err(CollabError::Unauthorized)
        ));

        notifications.notify(welcome(ana.id)).await.unwrap();
        notifications.mark_all_read(&ana).await.unwrap();
        assert_eq!(notifications.unread_count(&ana).await.unwrap(), 0);
        assert_eq!(notifications.list(&ana).await.unwrap().len(), 2);
    }
}
