//! All schemas that are exposed from endpoints are defined here
//! along with the [ToSerialized] impls

use chrono::{DateTime, Utc};
use serde::Serialize;
use tocatocar_collab::{
    AttendanceData, DirectMessageData, JamData, JamStatus, MediaData, MediaKind, MessageData,
    NotificationData, ParticipationData, ParticipationStatus, Profile as CollabProfile, Role,
    SessionData, ThemeData, ThemeKind, ThemeStatus, UserData,
};
use utoipa::ToSchema;

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct User {
    id: i32,
    name: String,
    #[schema(value_type = String)]
    role: Role,
    profile: Profile,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    city: Option<String>,
    instrument: Option<String>,
    instagram: Option<String>,
    youtube: Option<String>,
    website: Option<String>,
    bio: Option<String>,
    image: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoginResult {
    token: String,
    expires_at: DateTime<Utc>,
    user: User,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Jam {
    id: i32,
    code: String,
    name: String,
    description: Option<String>,
    location: Option<String>,
    city: Option<String>,
    start_time: DateTime<Utc>,
    #[schema(value_type = String)]
    status: JamStatus,
    host_id: i32,
    is_private: bool,
    opening_act: Option<String>,
    opening_act_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Theme {
    id: i32,
    jam_id: i32,
    name: String,
    tonality: Option<String>,
    description: Option<String>,
    #[schema(value_type = String)]
    kind: ThemeKind,
    #[schema(value_type = String)]
    status: ThemeStatus,
    order: i32,
    proposed_by_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Participation {
    id: i32,
    user_id: i32,
    theme_id: i32,
    instrument: String,
    #[schema(value_type = String)]
    status: ParticipationStatus,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Attendance {
    id: i32,
    user_id: i32,
    jam_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    id: i32,
    jam_id: i32,
    theme_id: Option<i32>,
    author_id: i32,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessage {
    id: i32,
    sender_id: i32,
    recipient_id: i32,
    content: String,
    read: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Media {
    id: i32,
    jam_id: i32,
    uploader_id: i32,
    url: String,
    #[schema(value_type = String)]
    kind: MediaKind,
    caption: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    id: i32,
    kind: String,
    message: String,
    link: Option<String>,
    actor_id: Option<i32>,
    read: bool,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCount {
    pub count: usize,
}

/// Helper trait to convert any type into a serialized version
pub trait ToSerialized<T>
where
    T: Serialize,
{
    fn to_serialized(&self) -> T;
}

impl<I, O> ToSerialized<Vec<O>> for Vec<I>
where
    I: ToSerialized<O>,
    O: Serialize,
{
    fn to_serialized(&self) -> Vec<O> {
        self.iter().map(|x| x.to_serialized()).collect()
    }
}

impl ToSerialized<User> for UserData {
    fn to_serialized(&self) -> User {
        User {
            id: self.id,
            name: self.name.clone(),
            role: self.role,
            profile: self.profile.to_serialized(),
        }
    }
}

impl ToSerialized<Profile> for CollabProfile {
    fn to_serialized(&self) -> Profile {
        Profile {
            city: self.city.clone(),
            instrument: self.instrument.clone(),
            instagram: self.instagram.clone(),
            youtube: self.youtube.clone(),
            website: self.website.clone(),
            bio: self.bio.clone(),
            image: self.image.clone(),
        }
    }
}

impl ToSerialized<LoginResult> for SessionData {
    fn to_serialized(&self) -> LoginResult {
        LoginResult {
            token: self.token.clone(),
            expires_at: self.expires_at,
            user: self.user.to_serialized(),
        }
    }
}

impl ToSerialized<Jam> for JamData {
    fn to_serialized(&self) -> Jam {
        Jam {
            id: self.id,
            code: self.code.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            location: self.location.clone(),
            city: self.city.clone(),
            start_time: self.start_time,
            status: self.status,
            host_id: self.host_id,
            is_private: self.is_private,
            opening_act: self.opening_act.clone(),
            opening_act_time: self.opening_act_time,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Theme> for ThemeData {
    fn to_serialized(&self) -> Theme {
        Theme {
            id: self.id,
            jam_id: self.jam_id,
            name: self.name.clone(),
            tonality: self.tonality.clone(),
            description: self.description.clone(),
            kind: self.kind,
            status: self.status,
            order: self.order,
            proposed_by_id: self.proposed_by_id,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Participation> for ParticipationData {
    fn to_serialized(&self) -> Participation {
        Participation {
            id: self.id,
            user_id: self.user_id,
            theme_id: self.theme_id,
            instrument: self.instrument.clone(),
            status: self.status,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Attendance> for AttendanceData {
    fn to_serialized(&self) -> Attendance {
        Attendance {
            id: self.id,
            user_id: self.user_id,
            jam_id: self.jam_id,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Message> for MessageData {
    fn to_serialized(&self) -> Message {
        Message {
            id: self.id,
            jam_id: self.jam_id,
            theme_id: self.theme_id,
            author_id: self.author_id,
            content: self.content.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<DirectMessage> for DirectMessageData {
    fn to_serialized(&self) -> DirectMessage {
        DirectMessage {
            id: self.id,
            sender_id: self.sender_id,
            recipient_id: self.recipient_id,
            content: self.content.clone(),
            read: self.read,
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Media> for MediaData {
    fn to_serialized(&self) -> Media {
        Media {
            id: self.id,
            jam_id: self.jam_id,
            uploader_id: self.uploader_id,
            url: self.url.clone(),
            kind: self.kind,
            caption: self.caption.clone(),
            created_at: self.created_at,
        }
    }
}

impl ToSerialized<Notification> for NotificationData {
    fn to_serialized(&self) -> Notification {
        Notification {
            id: self.id,
            kind: self.kind.clone(),
            message: self.message.clone(),
            link: self.link.clone(),
            actor_id: self.actor_id,
            read: self.read,
            created_at: self.created_at,
        }
    }
}
