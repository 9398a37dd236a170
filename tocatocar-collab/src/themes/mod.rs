mod status;

use std::collections::HashSet;

use log::{info, warn};

pub use status::*;

use crate::{
    errors::PersistenceContext, jams::non_empty, AccessPolicy, Actor, CollabContext, CollabError,
    CollabEvent, CollabResult, Committed, NewNotification, NewTheme, NotificationManager,
    PrimaryKey, QueuePlacement, ThemeData, ThemeKind, ThemeStatus,
};

/// Manages the themes of jams and the order they are played in
pub struct ThemeManager {
    context: CollabContext,
    notifications: NotificationManager,
}

/// The fields of a proposed theme
#[derive(Debug, Clone)]
pub struct ThemeFields {
    pub name: String,
    pub tonality: Option<String>,
    pub description: Option<String>,
    pub kind: ThemeKind,
}

/// A requested queue position for a theme
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueueEntry {
    pub theme_id: PrimaryKey,
    pub order: i32,
}

impl ThemeManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            notifications: NotificationManager::new(context),
        }
    }

    /// Proposes a new theme in a jam. It starts out open.
    pub async fn propose(
        &self,
        actor: &Actor,
        jam_id: PrimaryKey,
        fields: ThemeFields,
    ) -> CollabResult<ThemeData> {
        let name = fields.name.trim();

        if name.is_empty() {
            return Err(CollabError::Invalid("El nombre es obligatorio".to_string()));
        }

        let db = &self.context.database;
        let jam = db.jam_by_id(jam_id).await.context("fetching jam")?;

        // Topics aren't played in a key
        let tonality = match fields.kind {
            ThemeKind::Song => non_empty(fields.tonality),
            ThemeKind::Topic => None,
        };

        let theme = db
            .create_theme(NewTheme {
                jam_id: jam.id,
                name: name.to_string(),
                tonality,
                description: non_empty(fields.description),
                kind: fields.kind,
                proposed_by_id: actor.id,
            })
            .await
            .context("creating theme")?;

        let committed = Committed::new(theme).with(CollabEvent::JamUpdated { jam_id: jam.id });
        Ok(self.context.settle(committed).await)
    }

    pub async fn list(&self, jam_id: PrimaryKey) -> CollabResult<Vec<ThemeData>> {
        self.context
            .database
            .list_themes(jam_id)
            .await
            .context("listing themes")
    }

    /// The queued themes of a jam, in the order they will be played
    pub async fn queue(&self, jam_id: PrimaryKey) -> CollabResult<Vec<ThemeData>> {
        let mut queued: Vec<_> = self
            .list(jam_id)
            .await?
            .into_iter()
            .filter(|t| t.status == ThemeStatus::Queued)
            .collect();

        queued.sort_by_key(|t| (t.order, t.id));
        Ok(queued)
    }

    /// Moves a theme to another status.
    /// Queued themes go to the end of the queue, and playing themes notify their participants.
    pub async fn update_status(
        &self,
        actor: &Actor,
        theme_id: PrimaryKey,
        status: ThemeStatus,
    ) -> CollabResult<ThemeData> {
        let db = &self.context.database;

        let theme = db.theme_by_id(theme_id).await.context("fetching theme")?;
        let jam = db.jam_by_id(theme.jam_id).await.context("fetching jam")?;

        AccessPolicy::ensure(self.context.policy.can_move_theme(actor, &jam, &theme))?;

        if theme.status.transition_to(status)? == Transition::Unchanged {
            return Ok(theme);
        }

        let updated = match status {
            ThemeStatus::Queued => db.enqueue_theme(theme_id).await,
            _ => db.update_theme_status(theme_id, status, theme.order).await,
        }
        .context("updating theme status")?;

        info!(
            "Theme {} in jam {} went from {} to {}",
            theme.id, jam.code, theme.status, status
        );

        let mut committed =
            Committed::new(updated).with(CollabEvent::JamUpdated { jam_id: jam.id });

        if status == ThemeStatus::Playing {
            let notifications = self.playing_notifications(actor, &theme, &jam.code).await;

            committed
                .events
                .extend(self.notifications.create_side_effects(notifications).await);
        }

        Ok(self.context.settle(committed).await)
    }

    /// Rewrites the queue order of a jam.
    ///
    /// Entries are sorted by the submitted order, keeping the submitted sequence for ties,
    /// and each theme gets its index in the sorted list.
    /// The entries must name every queued theme of the jam and nothing else.
    pub async fn reorder(
        &self,
        actor: &Actor,
        jam_id: PrimaryKey,
        entries: &[QueueEntry],
    ) -> CollabResult<()> {
        let db = &self.context.database;
        let jam = db.jam_by_id(jam_id).await.context("fetching jam")?;

        AccessPolicy::ensure(self.context.policy.can_manage_jam(actor, &jam))?;

        let mut seen = HashSet::new();

        if !entries.iter().all(|e| seen.insert(e.theme_id)) {
            return Err(CollabError::Invalid("Hay temas repetidos".to_string()));
        }

        let queued: HashSet<_> = self
            .list(jam_id)
            .await?
            .into_iter()
            .filter(|t| t.status == ThemeStatus::Queued)
            .map(|t| t.id)
            .collect();

        if !entries.iter().all(|e| queued.contains(&e.theme_id)) {
            return Err(CollabError::Invalid(
                "Solo se pueden ordenar temas en cola de esta jam".to_string(),
            ));
        }

        if entries.len() != queued.len() {
            return Err(CollabError::Invalid(
                "El nuevo orden debe incluir toda la cola".to_string(),
            ));
        }

        let placements = dense_placements(entries);

        db.reorder_themes(jam_id, &placements)
            .await
            .context("reordering themes")?;

        let committed = Committed::new(()).with(CollabEvent::JamUpdated { jam_id });
        self.context.settle(committed).await;

        Ok(())
    }

    /// Deletes a theme. Only the host or an admin may do this.
    pub async fn delete(&self, actor: &Actor, theme_id: PrimaryKey) -> CollabResult<()> {
        let db = &self.context.database;

        let theme = db.theme_by_id(theme_id).await.context("fetching theme")?;
        let jam = db.jam_by_id(theme.jam_id).await.context("fetching jam")?;

        AccessPolicy::ensure(self.context.policy.can_manage_jam(actor, &jam))?;

        db.delete_theme(theme_id).await.context("deleting theme")?;

        let committed = Committed::new(()).with(CollabEvent::JamUpdated { jam_id: jam.id });
        self.context.settle(committed).await;

        Ok(())
    }

    async fn playing_notifications(
        &self,
        actor: &Actor,
        theme: &ThemeData,
        jam_code: &str,
    ) -> Vec<NewNotification> {
        let participations = match self.context.database.list_participations(theme.id).await {
            Ok(p) => p,
            Err(e) => {
                warn!("Could not list participants of theme {}: {}", theme.id, e);
                return vec![];
            }
        };

        let mut notified = HashSet::new();

        participations
            .into_iter()
            .filter(|p| p.user_id != actor.id && notified.insert(p.user_id))
            .map(|p| NewNotification {
                user_id: p.user_id,
                kind: "theme-playing".to_string(),
                message: format!("¡{} está sonando! Sube al escenario", theme.name),
                link: Some(format!("/jams/{}", jam_code)),
                actor_id: Some(actor.id),
            })
            .collect()
    }
}

/// Sorts entries by their requested order and numbers them from zero
fn dense_placements(entries: &[QueueEntry]) -> Vec<QueuePlacement> {
    let mut sorted = entries.to_vec();
    sorted.sort_by_key(|e| e.order);

    sorted
        .into_iter()
        .enumerate()
        .map(|(index, entry)| QueuePlacement {
            theme_id: entry.theme_id,
            order: index as i32,
        })
        .collect()
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use crate::{
        jams::test::create_jam, realtime::test::RecordingPublisher, test::Harness, Database,
        JamData,
    };

    pub(crate) fn song(name: &str) -> ThemeFields {
        ThemeFields {
            name: name.to_string(),
            tonality: Some("Gm".to_string()),
            description: None,
            kind: ThemeKind::Song,
        }
    }

    async fn queued_themes(
        harness: &Harness,
        host: &Actor,
        jam: &JamData,
        names: &[&str],
    ) -> Vec<ThemeData> {
        let themes = &harness.collab.themes;
        let mut result = vec![];

        for name in names {
            let theme = themes.propose(host, jam.id, song(name)).await.unwrap();
            let theme = themes
                .update_status(host, theme.id, ThemeStatus::Queued)
                .await
                .unwrap();

            result.push(theme);
        }

        result
    }

    fn orders(queue: &[ThemeData]) -> Vec<(PrimaryKey, i32)> {
        queue.iter().map(|t| (t.id, t.order)).collect()
    }

    #[test]
    fn test_dense_placements_are_stable() {
        let entries = [
            QueueEntry { theme_id: 1, order: 10 },
            QueueEntry { theme_id: 2, order: -3 },
            QueueEntry { theme_id: 3, order: 10 },
            QueueEntry { theme_id: 4, order: 7 },
        ];

        let placements: Vec<_> = dense_placements(&entries)
            .iter()
            .map(|p| (p.theme_id, p.order))
            .collect();

        assert_eq!(placements, [(2, 0), (4, 1), (1, 2), (3, 3)]);
    }

    #[tokio::test]
    async fn test_propose_starts_open() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;

        let topic = harness
            .collab
            .themes
            .propose(
                &host,
                jam.id,
                ThemeFields {
                    kind: ThemeKind::Topic,
                    ..song("Blues libre")
                },
            )
            .await
            .unwrap();

        assert_eq!(topic.status, ThemeStatus::Open);
        assert_eq!(topic.tonality, None);
        assert_eq!(topic.proposed_by_id, host.id);
    }

    #[tokio::test]
    async fn test_queueing_appends() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;

        let themes = queued_themes(&harness, &host, &jam, &["A", "B", "C"]).await;
        let orders: Vec<_> = themes.iter().map(|t| t.order).collect();
        assert_eq!(orders, [0, 1, 2]);

        // Returning to open and queueing again moves the theme to the back
        let manager = &harness.collab.themes;
        manager
            .update_status(&host, themes[0].id, ThemeStatus::Open)
            .await
            .unwrap();
        let requeued = manager
            .update_status(&host, themes[0].id, ThemeStatus::Queued)
            .await
            .unwrap();

        assert_eq!(requeued.order, 3);
    }

    #[tokio::test]
    async fn test_unauthorized_update_does_not_mutate() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let proposer = harness.user("Proposer").await;
        let stranger = harness.user("Stranger").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let theme = themes.propose(&proposer, jam.id, song("Blue Bossa")).await.unwrap();
        let published = harness.publisher.published().len();

        let result = themes
            .update_status(&stranger, theme.id, ThemeStatus::Queued)
            .await;

        assert!(matches!(result, Err(CollabError::Unauthorized)));

        let stored = harness.database.theme_by_id(theme.id).await.unwrap();
        assert_eq!(stored.status, ThemeStatus::Open);
        assert_eq!(stored.order, theme.order);
        assert_eq!(harness.publisher.published().len(), published);

        // The proposer can move their own theme
        themes
            .update_status(&proposer, theme.id, ThemeStatus::Queued)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_same_status_is_a_quiet_noop() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let theme = themes.propose(&host, jam.id, song("Solar")).await.unwrap();
        let published = harness.publisher.published().len();

        let same = themes
            .update_status(&host, theme.id, ThemeStatus::Open)
            .await
            .unwrap();

        assert_eq!(same.status, ThemeStatus::Open);
        assert_eq!(harness.publisher.published().len(), published);

        let invalid = themes
            .update_status(&host, theme.id, ThemeStatus::Finished)
            .await;
        assert!(matches!(
            invalid,
            Err(CollabError::InvalidTransition {
                from: ThemeStatus::Open,
                to: ThemeStatus::Finished
            })
        ));
    }

    #[tokio::test]
    async fn test_multiple_themes_can_play() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        for theme in queued_themes(&harness, &host, &jam, &["A", "B"]).await {
            themes
                .update_status(&host, theme.id, ThemeStatus::Playing)
                .await
                .unwrap();
        }

        let playing = themes
            .list(jam.id)
            .await
            .unwrap()
            .iter()
            .filter(|t| t.status == ThemeStatus::Playing)
            .count();

        assert_eq!(playing, 2);
    }

    #[tokio::test]
    async fn test_reorder() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let queued = queued_themes(&harness, &host, &jam, &["A", "B", "C"]).await;
        let (a, b, c) = (queued[0].id, queued[1].id, queued[2].id);

        let entries = [
            QueueEntry { theme_id: c, order: 0 },
            QueueEntry { theme_id: a, order: 1 },
            QueueEntry { theme_id: b, order: 2 },
        ];

        themes.reorder(&host, jam.id, &entries).await.unwrap();
        let queue = themes.queue(jam.id).await.unwrap();
        assert_eq!(orders(&queue), [(c, 0), (a, 1), (b, 2)]);

        // Same input, same result
        themes.reorder(&host, jam.id, &entries).await.unwrap();
        assert_eq!(orders(&themes.queue(jam.id).await.unwrap()), orders(&queue));
    }

    #[tokio::test]
    async fn test_reorder_failure_changes_nothing() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let queued = queued_themes(&harness, &host, &jam, &["A", "B", "C"]).await;
        let before = orders(&themes.queue(jam.id).await.unwrap());
        let published = harness.publisher.published().len();

        let entries = [
            QueueEntry { theme_id: queued[2].id, order: 0 },
            QueueEntry { theme_id: queued[0].id, order: 1 },
            QueueEntry { theme_id: queued[1].id, order: 2 },
        ];

        harness.database.fail_reorder_after(1);
        let result = themes.reorder(&host, jam.id, &entries).await;

        assert!(matches!(result, Err(CollabError::Persistence(_))));
        assert_eq!(orders(&themes.queue(jam.id).await.unwrap()), before);
        assert_eq!(harness.publisher.published().len(), published);
    }

    #[tokio::test]
    async fn test_reorder_rejects_bad_input() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let guest = harness.user("Guest").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let queued = queued_themes(&harness, &host, &jam, &["A", "B"]).await;
        let open = themes.propose(&host, jam.id, song("Open")).await.unwrap();
        let before = orders(&themes.queue(jam.id).await.unwrap());

        let duplicated = [
            QueueEntry { theme_id: queued[0].id, order: 0 },
            QueueEntry { theme_id: queued[0].id, order: 1 },
        ];
        assert!(matches!(
            themes.reorder(&host, jam.id, &duplicated).await,
            Err(CollabError::Invalid(_))
        ));

        let with_open = [
            QueueEntry { theme_id: queued[1].id, order: 0 },
            QueueEntry { theme_id: open.id, order: 1 },
        ];
        assert!(matches!(
            themes.reorder(&host, jam.id, &with_open).await,
            Err(CollabError::Invalid(_))
        ));

        let swapped = [
            QueueEntry { theme_id: queued[1].id, order: 0 },
            QueueEntry { theme_id: queued[0].id, order: 1 },
        ];
        assert!(matches!(
            themes.reorder(&guest, jam.id, &swapped).await,
            Err(CollabError::Unauthorized)
        ));

        assert_eq!(orders(&themes.queue(jam.id).await.unwrap()), before);
    }

    #[tokio::test]
    async fn test_reorder_requires_the_whole_queue() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let queued = queued_themes(&harness, &host, &jam, &["A", "B", "C"]).await;
        let before = orders(&themes.queue(jam.id).await.unwrap());

        let only_c = [QueueEntry { theme_id: queued[2].id, order: 0 }];
        assert!(matches!(
            themes.reorder(&host, jam.id, &only_c).await,
            Err(CollabError::Invalid(_))
        ));

        let queue = themes.queue(jam.id).await.unwrap();
        let distinct: HashSet<_> = queue.iter().map(|t| t.order).collect();

        assert_eq!(orders(&queue), before);
        assert_eq!(distinct.len(), queue.len());
    }

    #[tokio::test]
    async fn test_concurrent_queueing_gets_distinct_orders() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        queued_themes(&harness, &host, &jam, &["A"]).await;
        let b = themes.propose(&host, jam.id, song("B")).await.unwrap();
        let c = themes.propose(&host, jam.id, song("C")).await.unwrap();

        let (b, c) = tokio::join!(
            themes.update_status(&host, b.id, ThemeStatus::Queued),
            themes.update_status(&host, c.id, ThemeStatus::Queued),
        );
        let mut new_orders = vec![b.unwrap().order, c.unwrap().order];
        new_orders.sort();

        assert_eq!(new_orders, [1, 2]);
    }

    #[tokio::test]
    async fn test_failing_publisher_does_not_affect_results() {
        let harness = Harness::with_publisher(RecordingPublisher::failing());
        let host = harness.user("Host").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let queued = queued_themes(&harness, &host, &jam, &["A", "B"]).await;

        let playing = themes
            .update_status(&host, queued[0].id, ThemeStatus::Playing)
            .await
            .unwrap();
        assert_eq!(playing.status, ThemeStatus::Playing);

        let entries = [QueueEntry { theme_id: queued[1].id, order: 5 }];
        themes.reorder(&host, jam.id, &entries).await.unwrap();
        assert_eq!(
            orders(&themes.queue(jam.id).await.unwrap()),
            vec![(queued[1].id, 0)]
        );

        let joined = harness
            .collab
            .participation
            .join(&host, queued[1].id, "Piano")
            .await
            .unwrap();
        assert_eq!(joined.instrument, "Piano");

        assert!(!harness.publisher.published().is_empty());
    }

    #[tokio::test]
    async fn test_delete_requires_host() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let proposer = harness.user("Proposer").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let themes = &harness.collab.themes;

        let theme = themes.propose(&proposer, jam.id, song("Footprints")).await.unwrap();

        assert!(matches!(
            themes.delete(&proposer, theme.id).await,
            Err(CollabError::Unauthorized)
        ));

        themes.delete(&host, theme.id).await.unwrap();
        assert!(themes.list(jam.id).await.unwrap().is_empty());
    }
}
