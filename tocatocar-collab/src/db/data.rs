use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The type used for primary keys in the database.
pub type PrimaryKey = i32;

/// A stored text value didn't match any variant of the enum it maps to
#[derive(Debug, Error)]
#[error("{value} is not a valid {kind}")]
pub struct UnknownVariant {
    pub kind: &'static str,
    pub value: String,
}

/// Declares an enum that is stored as upper case text in the database
macro_rules! text_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(rename_all = "SCREAMING_SNAKE_CASE")]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = UnknownVariant;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                match value {
                    $($text => Ok(Self::$variant),)+
                    other => Err(UnknownVariant {
                        kind: stringify!($name),
                        value: other.to_string(),
                    }),
                }
            }
        }
    };
}

text_enum!(
    /// What a user is allowed to do globally
    Role {
        User => "USER",
        Admin => "ADMIN",
    }
);

text_enum!(
    /// The lifecycle of a jam
    JamStatus {
        Scheduled => "SCHEDULED",
        Active => "ACTIVE",
        Finished => "FINISHED",
    }
);

text_enum!(
    /// Where a theme is in the queue workflow
    ThemeStatus {
        Open => "OPEN",
        Queued => "QUEUED",
        Playing => "PLAYING",
        Finished => "FINISHED",
    }
);

text_enum!(
    ThemeKind {
        Song => "SONG",
        Topic => "TOPIC",
    }
);

text_enum!(
    ParticipationStatus {
        Waiting => "WAITING",
        Selected => "SELECTED",
    }
);

text_enum!(
    MediaKind {
        Image => "IMAGE",
        Video => "VIDEO",
        Audio => "AUDIO",
    }
);

/// Optional public profile of a musician
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    pub city: Option<String>,
    /// The main instrument the user plays
    pub instrument: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

/// A Toca Tocar account
#[derive(Debug, Clone)]
pub struct UserData {
    pub id: PrimaryKey,
    pub name: String,
    pub email: Option<String>,
    /// Argon2 hash, only present for accounts that log in with credentials
    pub password: Option<String>,
    pub role: Role,
    pub profile: Profile,
    pub created_at: DateTime<Utc>,
}

/// Login session data for authentication
#[derive(Debug, Clone)]
pub struct SessionData {
    pub id: PrimaryKey,
    /// The session token, or key if you will
    pub token: String,
    pub expires_at: DateTime<Utc>,
    /// The user that is logged in
    pub user: UserData,
}

/// A scheduled or ongoing jam session
#[derive(Debug, Clone)]
pub struct JamData {
    pub id: PrimaryKey,
    /// The short public code used to look the jam up
    pub code: String,
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub start_time: DateTime<Utc>,
    pub status: JamStatus,
    pub host_id: PrimaryKey,
    pub is_private: bool,
    /// The band or musician playing before the jam opens up
    pub opening_act: Option<String>,
    pub opening_act_time: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A song or topic proposed inside a jam
#[derive(Debug, Clone)]
pub struct ThemeData {
    pub id: PrimaryKey,
    pub jam_id: PrimaryKey,
    pub name: String,
    /// Only meaningful for songs
    pub tonality: Option<String>,
    pub description: Option<String>,
    pub kind: ThemeKind,
    pub status: ThemeStatus,
    /// Position in the queue. Only meaningful while the theme is queued.
    pub order: i32,
    pub proposed_by_id: PrimaryKey,
    pub created_at: DateTime<Utc>,
}

/// A user signed up to play an instrument on a theme
/// Note: `user_id`, `theme_id`, and `instrument` are unique together.
#[derive(Debug, Clone)]
pub struct ParticipationData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub theme_id: PrimaryKey,
    pub instrument: String,
    pub status: ParticipationStatus,
    pub created_at: DateTime<Utc>,
}

/// A check-in of a user at a jam.
/// Note: `user_id` and `jam_id` are unique together.
#[derive(Debug, Clone)]
pub struct AttendanceData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub jam_id: PrimaryKey,
    pub created_at: DateTime<Utc>,
}

/// A chat message in a jam, optionally about a theme
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub id: PrimaryKey,
    pub jam_id: PrimaryKey,
    pub theme_id: Option<PrimaryKey>,
    pub author_id: PrimaryKey,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// A private message between two users
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectMessageData {
    pub id: PrimaryKey,
    pub sender_id: PrimaryKey,
    pub recipient_id: PrimaryKey,
    pub content: String,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

/// A link to a photo, video or recording of a jam
#[derive(Debug, Clone)]
pub struct MediaData {
    pub id: PrimaryKey,
    pub jam_id: PrimaryKey,
    pub uploader_id: PrimaryKey,
    /// The public URL returned by the media host
    pub url: String,
    pub kind: MediaKind,
    pub caption: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationData {
    pub id: PrimaryKey,
    pub user_id: PrimaryKey,
    pub kind: String,
    pub message: String,
    pub link: Option<String>,
    /// The user that caused the notification, if any
    pub actor_id: Option<PrimaryKey>,
    pub read: bool,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_text_enums() {
        assert_eq!(ThemeStatus::Queued.as_str(), "QUEUED");
        assert_eq!("PLAYING".parse::<ThemeStatus>().unwrap(), ThemeStatus::Playing);
        assert!("playing".parse::<ThemeStatus>().is_err());

        assert_eq!(
            serde_json::to_string(&JamStatus::Scheduled).unwrap(),
            "\"SCHEDULED\""
        );
        assert_eq!(
            serde_json::from_str::<ParticipationStatus>("\"SELECTED\"").unwrap(),
            ParticipationStatus::Selected
        );
    }
}
