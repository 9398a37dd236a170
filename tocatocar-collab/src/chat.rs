use crate::{
    errors::PersistenceContext, Actor, CollabContext, CollabError, CollabEvent, CollabResult,
    Committed, DirectMessageData, JamManager, MessageData, NewDirectMessage, NewMessage,
    PrimaryKey,
};

/// Jam chat and direct messages between users
pub struct ChatManager {
    context: CollabContext,
    jams: JamManager,
}

impl ChatManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            jams: JamManager::new(context),
        }
    }

    /// Posts a message in a jam, optionally about one of its themes
    pub async fn post_message(
        &self,
        actor: &Actor,
        jam_code: &str,
        theme_id: Option<PrimaryKey>,
        content: &str,
    ) -> CollabResult<MessageData> {
        let content = required_content(content)?;
        let jam = self.jams.by_code(jam_code).await?;
        let db = &self.context.database;

        if let Some(theme_id) = theme_id {
            let theme = db.theme_by_id(theme_id).await.context("fetching theme")?;

            if theme.jam_id != jam.id {
                return Err(CollabError::Invalid(
                    "El tema no pertenece a esta jam".to_string(),
                ));
            }
        }

        let message = db
            .create_message(NewMessage {
                jam_id: jam.id,
                theme_id,
                author_id: actor.id,
                content,
            })
            .await
            .context("posting message")?;

        let committed = Committed::new(message.clone()).with(CollabEvent::NewMessage(message));
        Ok(self.context.settle(committed).await)
    }

    /// Messages of a jam, oldest first
    pub async fn messages(
        &self,
        jam_code: &str,
        theme_id: Option<PrimaryKey>,
    ) -> CollabResult<Vec<MessageData>> {
        let jam = self.jams.by_code(jam_code).await?;

        self.context
            .database
            .list_messages(jam.id, theme_id)
            .await
            .context("listing messages")
    }

    pub async fn send_direct(
        &self,
        actor: &Actor,
        recipient_id: PrimaryKey,
        content: &str,
    ) -> CollabResult<DirectMessageData> {
        let content = required_content(content)?;

        if recipient_id == actor.id {
            return Err(CollabError::Invalid(
                "No puedes enviarte mensajes a ti mismo".to_string(),
            ));
        }

        let db = &self.context.database;
        db.user_by_id(recipient_id)
            .await
            .context("fetching recipient")?;

        let message = db
            .create_direct_message(NewDirectMessage {
                sender_id: actor.id,
                recipient_id,
                content,
            })
            .await
            .context("sending direct message")?;

        let committed =
            Committed::new(message.clone()).with(CollabEvent::NewDirectMessage(message));

        Ok(self.context.settle(committed).await)
    }

    /// The messages between the actor and another user, oldest first.
    /// Messages the actor received are marked as read.
    pub async fn conversation(
        &self,
        actor: &Actor,
        other_id: PrimaryKey,
    ) -> CollabResult<Vec<DirectMessageData>> {
        let db = &self.context.database;

        db.mark_direct_messages_read(other_id, actor.id)
            .await
            .context("marking messages as read")?;

        db.list_direct_messages(actor.id, other_id)
            .await
            .context("listing direct messages")
    }
}

fn required_content(content: &str) -> CollabResult<String> {
    let content = content.trim();

    if content.is_empty() {
        return Err(CollabError::Invalid("El mensaje está vacío".to_string()));
    }

    Ok(content.to_string())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{jams::test::create_jam, test::Harness, themes::test::song};

    #[tokio::test]
    async fn test_jam_messages() {
        let harness = Harness::new();
        let host = harness.user("Host").await;
        let guest = harness.user("Guest").await;
        let jam = create_jam(&harness, &host, "AB12").await;
        let other_jam = create_jam(&harness, &host, "CD34").await;
        let chat = &harness.collab.chat;

        let theme = harness
            .collab
            .themes
            .propose(&host, jam.id, song("So What"))
            .await
            .unwrap();
        let foreign = harness
            .collab
            .themes
            .propose(&host, other_jam.id, song("Giant Steps"))
            .await
            .unwrap();

        chat.post_message(&host, "AB12", None, "¡Bienvenidos!").await.unwrap();
        chat.post_message(&guest, "AB12", Some(theme.id), "Me apunto")
            .await
            .unwrap();

        assert!(matches!(
            chat.post_message(&guest, "AB12", Some(foreign.id), "Hola").await,
            Err(CollabError::Invalid(_))
        ));
        assert!(matches!(
            chat.post_message(&guest, "AB12", None, "   ").await,
            Err(CollabError::Invalid(_))
        ));

        let all = chat.messages("AB12", None).await.unwrap();
        let contents: Vec<_> = all.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, ["¡Bienvenidos!", "Me apunto"]);

        let about_theme = chat.messages("AB12", Some(theme.id)).await.unwrap();
        assert_eq!(about_theme.len(), 1);

        let channel = format!("jam-{}", jam.id);
        assert_eq!(harness.publisher.count(&channel, "new-message"), 2);
    }

    #[tokio::test]
    async fn test_direct_messages() {
        let harness = Harness::new();
        let ana = harness.user("Ana").await;
        let bob = harness.user("Bob").await;
        let chat = &harness.collab.chat;

        chat.send_direct(&ana, bob.id, "¿Tocas el jueves?").await.unwrap();
        chat.send_direct(&bob, ana.id, "¡Claro!").await.unwrap();

        assert!(matches!(
            chat.send_direct(&ana, ana.id, "Hola").await,
            Err(CollabError::Invalid(_))
        ));
        assert!(matches!(
            chat.send_direct(&ana, 999, "Hola").await,
            Err(CollabError::NotFound { .. })
        ));

        let conversation = chat.conversation(&bob, ana.id).await.unwrap();
        assert_eq!(conversation.len(), 2);
        assert_eq!(conversation[0].content, "¿Tocas el jueves?");
        assert!(conversation[0].read);
        assert!(!conversation[1].read);

        let channel = format!("user-{}", bob.id);
        assert_eq!(harness.publisher.count(&channel, "new-dm"), 1);
    }
}
