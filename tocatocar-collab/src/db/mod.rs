use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

mod data;
pub use data::*;

mod memory;
pub use memory::*;

mod pg;
pub use pg::*;

pub type Result<T> = std::result::Result<T, DatabaseError>;
pub type SharedDatabase = Arc<dyn Database>;

#[derive(Debug, Error)]
pub enum DatabaseError {
    /// An unknown or internal error happened with the database
    #[error(transparent)]
    Internal(Box<dyn std::error::Error + Send + Sync>),
    /// A resource already exists
    #[error("{resource} with {field} of value {value} already exists")]
    Conflict {
        /// The resource in question
        resource: &'static str,
        /// The field that is conflicting
        field: &'static str,
        /// The conflicting value
        value: String,
    },
    /// A resource in the database doesn't exist
    #[error("{resource}:{identifier} doesn't exist")]
    NotFound {
        resource: &'static str,
        identifier: &'static str,
    },
}

impl DatabaseError {
    pub fn internal<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Internal(Box::new(error))
    }
}

/// Helper trait to reduce boilerplate
pub trait IntoDatabaseError {
    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError;
    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str)
        -> DatabaseError;
    fn any(self) -> DatabaseError;
}

/// Helper trait to reduce boilerplate
pub trait DatabaseResult {
    /// Turns the Result into a conflict error if it's Ok()
    fn conflict_or_ok(self, resource: &'static str, field: &'static str, value: &str)
        -> Result<()>;
}

impl<T> DatabaseResult for Result<T> {
    fn conflict_or_ok(
        self,
        resource: &'static str,
        field: &'static str,
        value: &str,
    ) -> Result<()> {
        match self {
            Ok(_) => Err(DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            }),
            Err(e) => match e {
                DatabaseError::NotFound {
                    resource: _,
                    identifier: _,
                } => Ok(()),
                e => Err(e),
            },
        }
    }
}

/// Represents a type that can store and fetch Toca Tocar data
#[async_trait]
pub trait Database: Send + Sync {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData>;
    async fn user_by_email(&self, email: &str) -> Result<UserData>;
    async fn create_user(&self, new_user: NewUser) -> Result<UserData>;
    async fn update_profile(&self, updated_profile: UpdatedProfile) -> Result<UserData>;
    async fn set_user_role(&self, user_id: PrimaryKey, role: Role) -> Result<UserData>;

    async fn session_by_token(&self, token: &str) -> Result<SessionData>;
    async fn create_session(&self, new_session: NewSession) -> Result<SessionData>;
    async fn delete_session_by_token(&self, token: &str) -> Result<()>;
    async fn clear_expired_sessions(&self) -> Result<()>;

    async fn jam_by_id(&self, jam_id: PrimaryKey) -> Result<JamData>;
    async fn jam_by_code(&self, code: &str) -> Result<JamData>;
    async fn list_jams(&self) -> Result<Vec<JamData>>;
    /// Fails with [DatabaseError::Conflict] if the code is taken
    async fn create_jam(&self, new_jam: NewJam) -> Result<JamData>;
    async fn update_jam_status(&self, jam_id: PrimaryKey, status: JamStatus) -> Result<JamData>;
    /// Deletes the jam along with its themes, participations, messages, media and attendance
    async fn delete_jam(&self, jam_id: PrimaryKey) -> Result<()>;

    async fn attendance(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<AttendanceData>;
    async fn create_attendance(
        &self,
        jam_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<AttendanceData>;
    async fn delete_attendance(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<()>;
    async fn list_attendance(&self, jam_id: PrimaryKey) -> Result<Vec<AttendanceData>>;

    async fn theme_by_id(&self, theme_id: PrimaryKey) -> Result<ThemeData>;
    /// Lists the themes of a jam in creation order
    async fn list_themes(&self, jam_id: PrimaryKey) -> Result<Vec<ThemeData>>;
    async fn create_theme(&self, new_theme: NewTheme) -> Result<ThemeData>;
    async fn update_theme_status(
        &self,
        theme_id: PrimaryKey,
        status: ThemeStatus,
        order: i32,
    ) -> Result<ThemeData>;
    /// Queues a theme behind every other queued theme of its jam.
    /// The order is computed and written atomically, so concurrent calls never share an order.
    async fn enqueue_theme(&self, theme_id: PrimaryKey) -> Result<ThemeData>;
    /// Applies every placement in a single transaction.
    /// The placements must cover exactly the queued themes of the jam, otherwise nothing is written.
    async fn reorder_themes(&self, jam_id: PrimaryKey, placements: &[QueuePlacement])
        -> Result<()>;
    /// Deletes the theme along with its participations and messages
    async fn delete_theme(&self, theme_id: PrimaryKey) -> Result<()>;

    async fn participation(
        &self,
        user_id: PrimaryKey,
        theme_id: PrimaryKey,
        instrument: &str,
    ) -> Result<ParticipationData>;
    async fn participation_by_id(&self, participation_id: PrimaryKey)
        -> Result<ParticipationData>;
    /// Fails with [DatabaseError::Conflict] if the user already plays the instrument on the theme
    async fn create_participation(
        &self,
        new_participation: NewParticipation,
    ) -> Result<ParticipationData>;
    async fn update_participation_status(
        &self,
        participation_id: PrimaryKey,
        status: ParticipationStatus,
    ) -> Result<ParticipationData>;
    /// Deletes every participation of the user on the theme, returning how many were removed
    async fn delete_participations(&self, user_id: PrimaryKey, theme_id: PrimaryKey)
        -> Result<u64>;
    async fn list_participations(&self, theme_id: PrimaryKey) -> Result<Vec<ParticipationData>>;

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData>;
    async fn list_messages(
        &self,
        jam_id: PrimaryKey,
        theme_id: Option<PrimaryKey>,
    ) -> Result<Vec<MessageData>>;
    async fn create_direct_message(
        &self,
        new_message: NewDirectMessage,
    ) -> Result<DirectMessageData>;
    /// Lists the messages exchanged between two users, oldest first
    async fn list_direct_messages(
        &self,
        user_id: PrimaryKey,
        other_id: PrimaryKey,
    ) -> Result<Vec<DirectMessageData>>;
    async fn mark_direct_messages_read(
        &self,
        sender_id: PrimaryKey,
        recipient_id: PrimaryKey,
    ) -> Result<()>;

    async fn media_by_id(&self, media_id: PrimaryKey) -> Result<MediaData>;
    async fn create_media(&self, new_media: NewMedia) -> Result<MediaData>;
    async fn list_media(&self, jam_id: PrimaryKey) -> Result<Vec<MediaData>>;
    async fn delete_media(&self, media_id: PrimaryKey) -> Result<()>;

    async fn notification_by_id(&self, notification_id: PrimaryKey) -> Result<NotificationData>;
    async fn create_notification(
        &self,
        new_notification: NewNotification,
    ) -> Result<NotificationData>;
    /// Lists the notifications of a user, newest first
    async fn list_notifications(&self, user_id: PrimaryKey) -> Result<Vec<NotificationData>>;
    async fn mark_notification_read(&self, notification_id: PrimaryKey)
        -> Result<NotificationData>;
    async fn mark_all_notifications_read(&self, user_id: PrimaryKey) -> Result<()>;
}

#[derive(Debug)]
pub struct NewUser {
    pub name: String,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Role,
}

/// Fields left as [None] keep their current value
#[derive(Debug, Default)]
pub struct UpdatedProfile {
    pub id: PrimaryKey,
    pub name: Option<String>,
    pub city: Option<String>,
    pub instrument: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

#[derive(Debug)]
pub struct NewSession {
    pub token: String,
    pub user_id: PrimaryKey,
    pub expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewJam {
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub start_time: DateTime<Utc>,
    pub is_private: bool,
    pub opening_act: Option<String>,
    pub opening_act_time: Option<DateTime<Utc>>,
    /// The host of the new jam
    pub host_id: PrimaryKey,
}

#[derive(Debug)]
pub struct NewTheme {
    pub jam_id: PrimaryKey,
    pub name: String,
    pub tonality: Option<String>,
    pub description: Option<String>,
    pub kind: ThemeKind,
    /// The proposer of the new theme
    pub proposed_by_id: PrimaryKey,
}

/// Where a queued theme should end up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueuePlacement {
    pub theme_id: PrimaryKey,
    pub order: i32,
}

#[derive(Debug)]
pub struct NewParticipation {
    pub user_id: PrimaryKey,
    pub theme_id: PrimaryKey,
    pub instrument: String,
}

#[derive(Debug)]
pub struct NewMessage {
    pub jam_id: PrimaryKey,
    pub theme_id: Option<PrimaryKey>,
    pub author_id: PrimaryKey,
    pub content: String,
}

#[derive(Debug)]
pub struct NewDirectMessage {
    pub sender_id: PrimaryKey,
    pub recipient_id: PrimaryKey,
    pub content: String,
}

#[derive(Debug)]
pub struct NewMedia {
    pub jam_id: PrimaryKey,
    pub uploader_id: PrimaryKey,
    pub url: String,
    pub kind: MediaKind,
    pub caption: Option<String>,
}

#[derive(Debug)]
pub struct NewNotification {
    pub user_id: PrimaryKey,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    pub actor_id: Option<PrimaryKey>,
}
