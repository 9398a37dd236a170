use log::info;

use crate::{
    errors::PersistenceContext, AccessPolicy, Actor, CollabContext, CollabError, CollabEvent,
    CollabResult, Committed, DatabaseError, NewNotification, NewParticipation,
    NotificationManager, ParticipationData, ParticipationStatus, PrimaryKey, ThemeData,
};

/// Keeps track of who plays what on each theme
pub struct ParticipationManager {
    context: CollabContext,
    notifications: NotificationManager,
}

impl ParticipationManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            notifications: NotificationManager::new(context),
        }
    }

    /// Signs the actor up to play an instrument on a theme.
    /// Joining again with the same instrument returns the existing participation.
    pub async fn join(
        &self,
        actor: &Actor,
        theme_id: PrimaryKey,
        instrument: &str,
    ) -> CollabResult<ParticipationData> {
        let instrument = instrument.trim();

        if instrument.is_empty() {
            return Err(CollabError::Invalid(
                "El instrumento es obligatorio".to_string(),
            ));
        }

        let db = &self.context.database;
        let theme = db.theme_by_id(theme_id).await.context("fetching theme")?;

        if let Ok(existing) = db.participation(actor.id, theme_id, instrument).await {
            return Ok(existing);
        }

        let new_participation = NewParticipation {
            user_id: actor.id,
            theme_id,
            instrument: instrument.to_string(),
        };

        let participation = match db.create_participation(new_participation).await {
            Ok(p) => p,
            // Someone else made the same request in the meantime
            Err(DatabaseError::Conflict { .. }) => {
                return db
                    .participation(actor.id, theme_id, instrument)
                    .await
                    .context("fetching participation")
            }
            Err(e) => return Err(e).context("joining theme"),
        };

        info!(
            "User {} joined theme {} on {}",
            actor.id, theme.id, participation.instrument
        );

        let mut committed = Committed::new(participation.clone())
            .with(CollabEvent::JamUpdated {
                jam_id: theme.jam_id,
            });

        if theme.proposed_by_id != actor.id {
            let notification = self.join_notification(actor, &theme, &participation).await;

            committed.events.extend(
                self.notifications
                    .create_side_effects(vec![notification])
                    .await,
            );
        }

        Ok(self.context.settle(committed).await)
    }

    /// Removes the actor from a theme, whatever instruments they signed up with
    pub async fn leave(&self, actor: &Actor, theme_id: PrimaryKey) -> CollabResult<u64> {
        let db = &self.context.database;
        let theme = db.theme_by_id(theme_id).await.context("fetching theme")?;

        let removed = db
            .delete_participations(actor.id, theme_id)
            .await
            .context("leaving theme")?;

        if removed == 0 {
            return Ok(0);
        }

        let committed = Committed::new(removed).with(CollabEvent::JamUpdated {
            jam_id: theme.jam_id,
        });

        Ok(self.context.settle(committed).await)
    }

    /// Picks a participant to play. Only the host or an admin may do this.
    pub async fn select(
        &self,
        actor: &Actor,
        participation_id: PrimaryKey,
    ) -> CollabResult<ParticipationData> {
        let db = &self.context.database;

        let participation = db
            .participation_by_id(participation_id)
            .await
            .context("fetching participation")?;
        let theme = db
            .theme_by_id(participation.theme_id)
            .await
            .context("fetching theme")?;
        let jam = db.jam_by_id(theme.jam_id).await.context("fetching jam")?;

        AccessPolicy::ensure(self.context.policy.can_manage_jam(actor, &jam))?;

        if participation.status == ParticipationStatus::Selected {
            return Ok(participation);
        }

        let selected = db
            .update_participation_status(participation_id, ParticipationStatus::Selected)
            .await
            .context("selecting participant")?;

        let notification = NewNotification {
            user_id: selected.user_id,
            kind: "theme-selected".to_string(),
            message: format!(
                "Te eligieron para tocar {} en {}",
                selected.instrument, theme.name
            ),
            link: Some(format!("/jams/{}", jam.code)),
            actor_id: Some(actor.id),
        };

        let mut committed =
            Committed::new(selected).with(CollabEvent::JamUpdated { jam_id: jam.id });

        committed.events.extend(
            self.notifications
                .create_side_effects(vec![notification])
                .await,
        );

        Ok(self.context.settle(committed).await)
    }

    pub async fn list(&self, theme_id: PrimaryKey) -> CollabResult<Vec<ParticipationData>> {
        self.context
            .database
            .list_participations(theme_id)
            .await
            .context("listing participations")
    }

    async fn join_notification(
        &self,
        actor: &Actor,
        theme: &ThemeData,
        participation: &ParticipationData,
    ) -> NewNotification {
        let name = match self.context.database.user_by_id(actor.id).await {
            Ok(user) => user.name,
            Err(_) => "Alguien".to_string(),
        };

        NewNotification {
            user_id: theme.proposed_by_id,
            kind: "theme-join".to_string(),
            message: format!(
                "{} se unió a {} con {}",
                name, theme.name, participation.instrument
            ),
            link: None,
            actor_id: Some(actor.id),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        jams::test::create_jam, test::Harness, themes::test::song, Database, ThemeStatus,
    };

    #[tokio::test]
    async fn test_join_is_idempotent() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let player = harness.user("Player").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let theme = harness
            .collab
            .themes
            .propose(&host, jam.id, song("Autumn Leaves"))
            .await
            .unwrap();

        let participation = &harness.collab.participation;
        let first = participation.join(&player, theme.id, "Sax").await.unwrap();
        let second = participation.join(&player, theme.id, " Sax ").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(first.status, ParticipationStatus::Waiting);
        assert_eq!(participation.list(theme.id).await.unwrap().len(), 1);

        // Only the first join tells the proposer
        let notifications = harness.database.list_notifications(host.id).await.unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, "theme-join");
    }

    #[tokio::test]
    async fn test_join_requires_instrument() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let theme = harness
            .collab
            .themes
            .propose(&host, jam.id, song("Autumn Leaves"))
            .await
            .unwrap();

        let result = harness.collab.participation.join(&host, theme.id, "  ").await;
        assert!(matches!(result, Err(CollabError::Invalid(_))));
    }

    #[tokio::test]
    async fn test_leave_removes_every_instrument() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let player = harness.user("Player").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let theme = harness
            .collab
            .themes
            .propose(&host, jam.id, song("Autumn Leaves"))
            .await
            .unwrap();

        let participation = &harness.collab.participation;
        participation.join(&player, theme.id, "Sax").await.unwrap();
        participation.join(&player, theme.id, "Flute").await.unwrap();
        participation.join(&host, theme.id, "Piano").await.unwrap();

        assert_eq!(participation.leave(&player, theme.id).await.unwrap(), 2);
        assert_eq!(participation.leave(&player, theme.id).await.unwrap(), 0);

        let remaining = participation.list(theme.id).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].user_id, host.id);
    }

    #[tokio::test]
    async fn test_select_is_host_only() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let player = harness.user("Player").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let theme = harness
            .collab
            .themes
            .propose(&player, jam.id, song("Autumn Leaves"))
            .await
            .unwrap();

        let participation = &harness.collab.participation;
        let joined = participation.join(&player, theme.id, "Sax").await.unwrap();

        assert!(matches!(
            participation.select(&player, joined.id).await,
            Err(CollabError::Unauthorized)
        ));

        let selected = participation.select(&host, joined.id).await.unwrap();
        assert_eq!(selected.status, ParticipationStatus::Selected);

        let channel = format!("user-{}", player.id);
        assert_eq!(harness.publisher.count(&channel, "new-notification"), 1);
    }

    #[tokio::test]
    async fn test_jam_night_from_start_to_stage() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let x = harness.user("X").await;
        let collab = &harness.collab;

        let jam = create_jam(&harness, &host, "AB12").await;
        assert_eq!(jam.code, "AB12");

        let theme = collab
            .themes
            .propose(&x, jam.id, song("Autumn Leaves"))
            .await
            .unwrap();
        assert_eq!(theme.status, ThemeStatus::Open);

        collab.participation.join(&x, theme.id, "Sax").await.unwrap();

        let channel = format!("jam-{}", jam.id);
        let before = harness.publisher.count(&channel, "update-jam");

        collab
            .themes
            .update_status(&host, theme.id, ThemeStatus::Queued)
            .await
            .unwrap();
        assert_eq!(harness.publisher.count(&channel, "update-jam"), before + 1);

        collab
            .themes
            .update_status(&host, theme.id, ThemeStatus::Playing)
            .await
            .unwrap();
        assert_eq!(harness.publisher.count(&channel, "update-jam"), before + 2);

        let stored = harness.database.theme_by_id(theme.id).await.unwrap();
        assert_eq!(stored.status, ThemeStatus::Playing);

        let participations = collab.participation.list(theme.id).await.unwrap();
        assert_eq!(participations.len(), 1);
        assert_eq!(participations[0].user_id, x.id);
        assert_eq!(participations[0].instrument, "Sax");

        // X hears that their theme is on
        let notifications = harness.database.list_notifications(x.id).await.unwrap();
        assert!(notifications.iter().any(|n| n.kind == "theme-playing"));
    }
}
