use url::Url;

use crate::{
    errors::PersistenceContext, util::URL_SCHEME_REGEX, AccessPolicy, Actor, CollabContext,
    CollabError, CollabEvent, CollabResult, Committed, JamManager, MediaData, MediaKind, NewMedia,
    PrimaryKey,
};

/// Links to photos, videos and recordings of jams.
/// Only the URL is stored; the files live with the media host.
pub struct MediaManager {
    context: CollabContext,
    jams: JamManager,
}

impl MediaManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
            jams: JamManager::new(context),
        }
    }

    pub async fn attach(
        &self,
        actor: &Actor,
        jam_code: &str,
        url: &str,
        kind: MediaKind,
        caption: Option<String>,
    ) -> CollabResult<MediaData> {
        let url = normalize_url(url)?;
        let jam = self.jams.by_code(jam_code).await?;

        let media = self
            .context
            .database
            .create_media(NewMedia {
                jam_id: jam.id,
                uploader_id: actor.id,
                url,
                kind,
                caption: caption
                    .map(|c| c.trim().to_string())
                    .filter(|c| !c.is_empty()),
            })
            .await
            .context("attaching media")?;

        let committed = Committed::new(media).with(CollabEvent::JamUpdated { jam_id: jam.id });
        Ok(self.context.settle(committed).await)
    }

    /// Media of a jam, newest first
    pub async fn list(&self, jam_code: &str) -> CollabResult<Vec<MediaData>> {
        let jam = self.jams.by_code(jam_code).await?;

        self.context
            .database
            .list_media(jam.id)
            .await
            .context("listing media")
    }

    /// Removes media. Allowed for the uploader, the host and admins.
    pub async fn remove(&self, actor: &Actor, media_id: PrimaryKey) -> CollabResult<()> {
        let db = &self.context.database;

        let media = db.media_by_id(media_id).await.context("fetching media")?;
        let jam = db.jam_by_id(media.jam_id).await.context("fetching jam")?;

        let is_uploader = media.uploader_id == actor.id;
        AccessPolicy::ensure(is_uploader || self.context.policy.can_manage_jam(actor, &jam))?;

        db.delete_media(media_id).await.context("removing media")?;

        let committed = Committed::new(()).with(CollabEvent::JamUpdated { jam_id: jam.id });
        self.context.settle(committed).await;

        Ok(())
    }
}

/// Turns user input like `www.host.com/photo.jpg` into an absolute https URL
fn normalize_url(input: &str) -> CollabResult<String> {
    let invalid = || CollabError::Invalid("La URL no es válida".to_string());
    let input = input.trim();

    // Other schemes would otherwise end up as part of the host
    if let Some((scheme, _)) = input.split_once("://") {
        let is_scheme = scheme.chars().all(|c| c.is_ascii_alphanumeric() || "+-.".contains(c));

        if is_scheme && !matches!(scheme, "http" | "https") {
            return Err(invalid());
        }
    }

    let normalized = URL_SCHEME_REGEX.replace(input, "https://");
    let url = Url::parse(&normalized).map_err(|_| invalid())?;

    match url.host_str() {
        Some(host) if host.contains('.') || host == "localhost" => Ok(url.to_string()),
        _ => Err(invalid()),
    }
}
