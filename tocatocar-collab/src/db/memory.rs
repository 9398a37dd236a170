use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;

use crate::{
    AttendanceData, Database, DatabaseError, DirectMessageData, JamData, JamStatus, MediaData,
    MessageData, NewDirectMessage, NewJam, NewMedia, NewMessage, NewNotification,
    NewParticipation, NewSession, NewTheme, NewUser, NotificationData, ParticipationData,
    ParticipationStatus, PrimaryKey, Profile, QueuePlacement, Result, Role, SessionData, ThemeData,
    ThemeStatus, UpdatedProfile, UserData,
};

/// A database that lives in process memory.
/// Used for local development without postgres, and in tests.
#[derive(Default)]
pub struct MemoryDatabase {
    tables: Mutex<Tables>,
    #[cfg(test)]
    reorder_fault: Mutex<Option<usize>>,
}

#[derive(Default, Clone)]
struct Tables {
    last_id: PrimaryKey,
    users: Vec<UserData>,
    sessions: Vec<StoredSession>,
    jams: Vec<JamData>,
    attendance: Vec<AttendanceData>,
    themes: Vec<ThemeData>,
    participations: Vec<ParticipationData>,
    messages: Vec<MessageData>,
    direct_messages: Vec<DirectMessageData>,
    media: Vec<MediaData>,
    notifications: Vec<NotificationData>,
}

#[derive(Clone)]
struct StoredSession {
    id: PrimaryKey,
    token: String,
    user_id: PrimaryKey,
    expires_at: chrono::DateTime<Utc>,
}

impl Tables {
    fn next_id(&mut self) -> PrimaryKey {
        self.last_id += 1;
        self.last_id
    }

    fn user(&self, user_id: PrimaryKey) -> Result<&UserData> {
        self.users
            .iter()
            .find(|u| u.id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })
    }

    fn jam(&self, jam_id: PrimaryKey) -> Result<&JamData> {
        self.jams
            .iter()
            .find(|j| j.id == jam_id)
            .ok_or(DatabaseError::NotFound {
                resource: "jam",
                identifier: "id",
            })
    }

    fn theme_mut(&mut self, theme_id: PrimaryKey) -> Result<&mut ThemeData> {
        self.themes
            .iter_mut()
            .find(|t| t.id == theme_id)
            .ok_or(DatabaseError::NotFound {
                resource: "theme",
                identifier: "id",
            })
    }

    /// Removes a theme and everything that hangs off it
    fn remove_theme(&mut self, theme_id: PrimaryKey) {
        self.themes.retain(|t| t.id != theme_id);
        self.participations.retain(|p| p.theme_id != theme_id);
        self.messages.retain(|m| m.theme_id != Some(theme_id));
    }
}

impl MemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next reorder fail after applying the given amount of placements
    #[cfg(test)]
    pub(crate) fn fail_reorder_after(&self, applied: usize) {
        *self.reorder_fault.lock() = Some(applied);
    }

    #[cfg(test)]
    fn take_reorder_fault(&self) -> Option<usize> {
        self.reorder_fault.lock().take()
    }

    #[cfg(not(test))]
    fn take_reorder_fault(&self) -> Option<usize> {
        None
    }
}

fn not_found<T>(resource: &'static str, identifier: &'static str) -> Result<T> {
    Err(DatabaseError::NotFound {
        resource,
        identifier,
    })
}

#[async_trait]
impl Database for MemoryDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        self.tables.lock().user(user_id).cloned()
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        self.tables
            .lock()
            .users
            .iter()
            .find(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            })
            .cloned()
            .map_or_else(|| not_found("user", "email"), Ok)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        let mut tables = self.tables.lock();

        if let Some(email) = &new_user.email {
            let taken = tables.users.iter().any(|u| {
                u.email
                    .as_deref()
                    .is_some_and(|e| e.eq_ignore_ascii_case(email))
            });

            if taken {
                return Err(DatabaseError::Conflict {
                    resource: "user",
                    field: "email",
                    value: email.clone(),
                });
            }
        }

        let user = UserData {
            id: tables.next_id(),
            name: new_user.name,
            email: new_user.email,
            password: new_user.password,
            role: new_user.role,
            profile: Profile::default(),
            created_at: Utc::now(),
        };

        tables.users.push(user.clone());
        Ok(user)
    }

    async fn update_profile(&self, updated_profile: UpdatedProfile) -> Result<UserData> {
        let mut tables = self.tables.lock();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == updated_profile.id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        if let Some(name) = updated_profile.name {
            user.name = name;
        }

        let profile = &mut user.profile;
        let fields = [
            (&mut profile.city, updated_profile.city),
            (&mut profile.instrument, updated_profile.instrument),
            (&mut profile.instagram, updated_profile.instagram),
            (&mut profile.youtube, updated_profile.youtube),
            (&mut profile.website, updated_profile.website),
            (&mut profile.bio, updated_profile.bio),
            (&mut profile.image, updated_profile.image),
        ];

        for (field, value) in fields {
            if value.is_some() {
                *field = value;
            }
        }

        Ok(user.clone())
    }

    async fn set_user_role(&self, user_id: PrimaryKey, role: Role) -> Result<UserData> {
        let mut tables = self.tables.lock();
        let user = tables
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(DatabaseError::NotFound {
                resource: "user",
                identifier: "id",
            })?;

        user.role = role;
        Ok(user.clone())
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let tables = self.tables.lock();
        let now = Utc::now();

        let session = tables
            .sessions
            .iter()
            .find(|s| s.token == token && s.expires_at > now)
            .ok_or(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            })?;

        Ok(SessionData {
            id: session.id,
            token: session.token.clone(),
            expires_at: session.expires_at,
            user: tables.user(session.user_id)?.clone(),
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        {
            let mut tables = self.tables.lock();

            if tables.sessions.iter().any(|s| s.token == new_session.token) {
                return Err(DatabaseError::Conflict {
                    resource: "session",
                    field: "token",
                    value: new_session.token,
                });
            }

            // Ensure user exists
            tables.user(new_session.user_id)?;

            let id = tables.next_id();
            tables.sessions.push(StoredSession {
                id,
                token: new_session.token.clone(),
                user_id: new_session.user_id,
                expires_at: new_session.expires_at,
            });
        }

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let mut tables = self.tables.lock();
        let before = tables.sessions.len();

        tables.sessions.retain(|s| s.token != token);

        if tables.sessions.len() == before {
            return not_found("session", "token");
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        let now = Utc::now();
        self.tables.lock().sessions.retain(|s| s.expires_at > now);

        Ok(())
    }

    async fn jam_by_id(&self, jam_id: PrimaryKey) -> Result<JamData> {
        self.tables.lock().jam(jam_id).cloned()
    }

    async fn jam_by_code(&self, code: &str) -> Result<JamData> {
        self.tables
            .lock()
            .jams
            .iter()
            .find(|j| j.code == code)
            .cloned()
            .map_or_else(|| not_found("jam", "code"), Ok)
    }

    async fn list_jams(&self) -> Result<Vec<JamData>> {
        let mut jams = self.tables.lock().jams.clone();
        jams.sort_by(|a, b| b.start_time.cmp(&a.start_time).then(b.id.cmp(&a.id)));

        Ok(jams)
    }

    async fn create_jam(&self, new_jam: NewJam) -> Result<JamData> {
        let mut tables = self.tables.lock();

        if tables.jams.iter().any(|j| j.code == new_jam.code) {
            return Err(DatabaseError::Conflict {
                resource: "jam",
                field: "code",
                value: new_jam.code,
            });
        }

        tables.user(new_jam.host_id)?;

        let jam = JamData {
            id: tables.next_id(),
            code: new_jam.code,
            name: new_jam.name,
            description: new_jam.description,
            location: new_jam.location,
            city: new_jam.city,
            start_time: new_jam.start_time,
            status: JamStatus::Scheduled,
            host_id: new_jam.host_id,
            is_private: new_jam.is_private,
            opening_act: new_jam.opening_act,
            opening_act_time: new_jam.opening_act_time,
            created_at: Utc::now(),
        };

        tables.jams.push(jam.clone());
        Ok(jam)
    }

    async fn update_jam_status(&self, jam_id: PrimaryKey, status: JamStatus) -> Result<JamData> {
        let mut tables = self.tables.lock();
        let jam = tables
            .jams
            .iter_mut()
            .find(|j| j.id == jam_id)
            .ok_or(DatabaseError::NotFound {
                resource: "jam",
                identifier: "id",
            })?;

        jam.status = status;
        Ok(jam.clone())
    }

    async fn delete_jam(&self, jam_id: PrimaryKey) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.jam(jam_id)?;

        let theme_ids: Vec<_> = tables
            .themes
            .iter()
            .filter(|t| t.jam_id == jam_id)
            .map(|t| t.id)
            .collect();

        for theme_id in theme_ids {
            tables.remove_theme(theme_id);
        }

        tables.jams.retain(|j| j.id != jam_id);
        tables.attendance.retain(|a| a.jam_id != jam_id);
        tables.messages.retain(|m| m.jam_id != jam_id);
        tables.media.retain(|m| m.jam_id != jam_id);

        Ok(())
    }

    async fn attendance(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<AttendanceData> {
        self.tables
            .lock()
            .attendance
            .iter()
            .find(|a| a.jam_id == jam_id && a.user_id == user_id)
            .cloned()
            .map_or_else(|| not_found("attendance", "jam_id:user_id"), Ok)
    }

    async fn create_attendance(
        &self,
        jam_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<AttendanceData> {
        let mut tables = self.tables.lock();

        let exists = tables
            .attendance
            .iter()
            .any(|a| a.jam_id == jam_id && a.user_id == user_id);

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "attendance",
                field: "jam:user",
                value: format!("{}:{}", jam_id, user_id),
            });
        }

        tables.jam(jam_id)?;

        let attendance = AttendanceData {
            id: tables.next_id(),
            user_id,
            jam_id,
            created_at: Utc::now(),
        };

        tables.attendance.push(attendance.clone());
        Ok(attendance)
    }

    async fn delete_attendance(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let mut tables = self.tables.lock();
        let before = tables.attendance.len();

        tables
            .attendance
            .retain(|a| !(a.jam_id == jam_id && a.user_id == user_id));

        if tables.attendance.len() == before {
            return not_found("attendance", "jam_id:user_id");
        }

        Ok(())
    }

    async fn list_attendance(&self, jam_id: PrimaryKey) -> Result<Vec<AttendanceData>> {
        Ok(self
            .tables
            .lock()
            .attendance
            .iter()
            .filter(|a| a.jam_id == jam_id)
            .cloned()
            .collect())
    }

    async fn theme_by_id(&self, theme_id: PrimaryKey) -> Result<ThemeData> {
        self.tables
            .lock()
            .themes
            .iter()
            .find(|t| t.id == theme_id)
            .cloned()
            .map_or_else(|| not_found("theme", "id"), Ok)
    }

    async fn list_themes(&self, jam_id: PrimaryKey) -> Result<Vec<ThemeData>> {
        Ok(self
            .tables
            .lock()
            .themes
            .iter()
            .filter(|t| t.jam_id == jam_id)
            .cloned()
            .collect())
    }

    async fn create_theme(&self, new_theme: NewTheme) -> Result<ThemeData> {
        let mut tables = self.tables.lock();
        tables.jam(new_theme.jam_id)?;

        let theme = ThemeData {
            id: tables.next_id(),
            jam_id: new_theme.jam_id,
            name: new_theme.name,
            tonality: new_theme.tonality,
            description: new_theme.description,
            kind: new_theme.kind,
            status: ThemeStatus::Open,
            order: 0,
            proposed_by_id: new_theme.proposed_by_id,
            created_at: Utc::now(),
        };

        tables.themes.push(theme.clone());
        Ok(theme)
    }

    async fn update_theme_status(
        &self,
        theme_id: PrimaryKey,
        status: ThemeStatus,
        order: i32,
    ) -> Result<ThemeData> {
        let mut tables = self.tables.lock();
        let theme = tables.theme_mut(theme_id)?;

        theme.status = status;
        theme.order = order;

        Ok(theme.clone())
    }

    async fn enqueue_theme(&self, theme_id: PrimaryKey) -> Result<ThemeData> {
        let mut tables = self.tables.lock();
        let jam_id = tables.theme_mut(theme_id)?.jam_id;

        let order = tables
            .themes
            .iter()
            .filter(|t| t.jam_id == jam_id && t.status == ThemeStatus::Queued && t.id != theme_id)
            .map(|t| t.order + 1)
            .max()
            .unwrap_or(0);

        let theme = tables.theme_mut(theme_id)?;
        theme.status = ThemeStatus::Queued;
        theme.order = order;

        Ok(theme.clone())
    }

    async fn reorder_themes(
        &self,
        jam_id: PrimaryKey,
        placements: &[QueuePlacement],
    ) -> Result<()> {
        let fault = self.take_reorder_fault();
        let mut tables = self.tables.lock();

        let queued = tables
            .themes
            .iter()
            .filter(|t| t.jam_id == jam_id && t.status == ThemeStatus::Queued)
            .count();

        if queued != placements.len() {
            return Err(DatabaseError::Internal(
                "placements do not cover the whole queue".into(),
            ));
        }

        // Work on a copy so a failure halfway leaves the real table untouched
        let mut staged = tables.themes.clone();

        for (applied, placement) in placements.iter().enumerate() {
            if fault == Some(applied) {
                return Err(DatabaseError::Internal(
                    "injected failure while reordering".into(),
                ));
            }

            let theme = staged
                .iter_mut()
                .find(|t| {
                    t.id == placement.theme_id
                        && t.jam_id == jam_id
                        && t.status == ThemeStatus::Queued
                })
                .ok_or(DatabaseError::NotFound {
                    resource: "queued theme",
                    identifier: "id",
                })?;

            theme.order = placement.order;
        }

        tables.themes = staged;
        Ok(())
    }

    async fn delete_theme(&self, theme_id: PrimaryKey) -> Result<()> {
        let mut tables = self.tables.lock();
        tables.theme_mut(theme_id)?;
        tables.remove_theme(theme_id);

        Ok(())
    }

    async fn participation(
        &self,
        user_id: PrimaryKey,
        theme_id: PrimaryKey,
        instrument: &str,
    ) -> Result<ParticipationData> {
        self.tables
            .lock()
            .participations
            .iter()
            .find(|p| p.user_id == user_id && p.theme_id == theme_id && p.instrument == instrument)
            .cloned()
            .map_or_else(
                || not_found("participation", "user_id:theme_id:instrument"),
                Ok,
            )
    }

    async fn participation_by_id(
        &self,
        participation_id: PrimaryKey,
    ) -> Result<ParticipationData> {
        self.tables
            .lock()
            .participations
            .iter()
            .find(|p| p.id == participation_id)
            .cloned()
            .map_or_else(|| not_found("participation", "id"), Ok)
    }

    async fn create_participation(
        &self,
        new_participation: NewParticipation,
    ) -> Result<ParticipationData> {
        let mut tables = self.tables.lock();

        let exists = tables.participations.iter().any(|p| {
            p.user_id == new_participation.user_id
                && p.theme_id == new_participation.theme_id
                && p.instrument == new_participation.instrument
        });

        if exists {
            return Err(DatabaseError::Conflict {
                resource: "participation",
                field: "user:theme:instrument",
                value: format!(
                    "{}:{}:{}",
                    new_participation.user_id,
                    new_participation.theme_id,
                    new_participation.instrument
                ),
            });
        }

        tables.theme_mut(new_participation.theme_id)?;

        let participation = ParticipationData {
            id: tables.next_id(),
            user_id: new_participation.user_id,
            theme_id: new_participation.theme_id,
            instrument: new_participation.instrument,
            status: ParticipationStatus::Waiting,
            created_at: Utc::now(),
        };

        tables.participations.push(participation.clone());
        Ok(participation)
    }

    async fn update_participation_status(
        &self,
        participation_id: PrimaryKey,
        status: ParticipationStatus,
    ) -> Result<ParticipationData> {
        let mut tables = self.tables.lock();
        let participation = tables
            .participations
            .iter_mut()
            .find(|p| p.id == participation_id)
            .ok_or(DatabaseError::NotFound {
                resource: "participation",
                identifier: "id",
            })?;

        participation.status = status;
        Ok(participation.clone())
    }

    async fn delete_participations(
        &self,
        user_id: PrimaryKey,
        theme_id: PrimaryKey,
    ) -> Result<u64> {
        let mut tables = self.tables.lock();
        let before = tables.participations.len();

        tables
            .participations
            .retain(|p| !(p.user_id == user_id && p.theme_id == theme_id));

        Ok((before - tables.participations.len()) as u64)
    }

    async fn list_participations(&self, theme_id: PrimaryKey) -> Result<Vec<ParticipationData>> {
        Ok(self
            .tables
            .lock()
            .participations
            .iter()
            .filter(|p| p.theme_id == theme_id)
            .cloned()
            .collect())
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        let mut tables = self.tables.lock();
        tables.jam(new_message.jam_id)?;

        let message = MessageData {
            id: tables.next_id(),
            jam_id: new_message.jam_id,
            theme_id: new_message.theme_id,
            author_id: new_message.author_id,
            content: new_message.content,
            created_at: Utc::now(),
        };

        tables.messages.push(message.clone());
        Ok(message)
    }

    async fn list_messages(
        &self,
        jam_id: PrimaryKey,
        theme_id: Option<PrimaryKey>,
    ) -> Result<Vec<MessageData>> {
        Ok(self
            .tables
            .lock()
            .messages
            .iter()
            .filter(|m| m.jam_id == jam_id && theme_id.map_or(true, |id| m.theme_id == Some(id)))
            .cloned()
            .collect())
    }

    async fn create_direct_message(
        &self,
        new_message: NewDirectMessage,
    ) -> Result<DirectMessageData> {
        let mut tables = self.tables.lock();

        let message = DirectMessageData {
            id: tables.next_id(),
            sender_id: new_message.sender_id,
            recipient_id: new_message.recipient_id,
            content: new_message.content,
            read: false,
            created_at: Utc::now(),
        };

        tables.direct_messages.push(message.clone());
        Ok(message)
    }

    async fn list_direct_messages(
        &self,
        user_id: PrimaryKey,
        other_id: PrimaryKey,
    ) -> Result<Vec<DirectMessageData>> {
        Ok(self
            .tables
            .lock()
            .direct_messages
            .iter()
            .filter(|m| {
                (m.sender_id == user_id && m.recipient_id == other_id)
                    || (m.sender_id == other_id && m.recipient_id == user_id)
            })
            .cloned()
            .collect())
    }

    async fn mark_direct_messages_read(
        &self,
        sender_id: PrimaryKey,
        recipient_id: PrimaryKey,
    ) -> Result<()> {
        self.tables
            .lock()
            .direct_messages
            .iter_mut()
            .filter(|m| m.sender_id == sender_id && m.recipient_id == recipient_id)
            .for_each(|m| m.read = true);

        Ok(())
    }

    async fn media_by_id(&self, media_id: PrimaryKey) -> Result<MediaData> {
        self.tables
            .lock()
            .media
            .iter()
            .find(|m| m.id == media_id)
            .cloned()
            .map_or_else(|| not_found("media", "id"), Ok)
    }

    async fn create_media(&self, new_media: NewMedia) -> Result<MediaData> {
        let mut tables = self.tables.lock();
        tables.jam(new_media.jam_id)?;

        let media = MediaData {
            id: tables.next_id(),
            jam_id: new_media.jam_id,
            uploader_id: new_media.uploader_id,
            url: new_media.url,
            kind: new_media.kind,
            caption: new_media.caption,
            created_at: Utc::now(),
        };

        tables.media.push(media.clone());
        Ok(media)
    }

    async fn list_media(&self, jam_id: PrimaryKey) -> Result<Vec<MediaData>> {
        Ok(self
            .tables
            .lock()
            .media
            .iter()
            .rev()
            .filter(|m| m.jam_id == jam_id)
            .cloned()
            .collect())
    }

    async fn delete_media(&self, media_id: PrimaryKey) -> Result<()> {
        let mut tables = self.tables.lock();
        let before = tables.media.len();

        tables.media.retain(|m| m.id != media_id);

        if tables.media.len() == before {
            return not_found("media", "id");
        }

        Ok(())
    }

    async fn notification_by_id(&self, notification_id: PrimaryKey) -> Result<NotificationData> {
        self.tables
            .lock()
            .notifications
            .iter()
            .find(|n| n.id == notification_id)
            .cloned()
            .map_or_else(|| not_found("notification", "id"), Ok)
    }

    async fn create_notification(
        &self,
        new_notification: NewNotification,
    ) -> Result<NotificationData> {
        let mut tables = self.tables.lock();
        tables.user(new_notification.user_id)?;

        let notification = NotificationData {
            id: tables.next_id(),
            user_id: new_notification.user_id,
            kind: new_notification.kind,
            message: new_notification.message,
            link: new_notification.link,
            actor_id: new_notification.actor_id,
            read: false,
            created_at: Utc::now(),
        };

        tables.notifications.push(notification.clone());
        Ok(notification)
    }

    async fn list_notifications(&self, user_id: PrimaryKey) -> Result<Vec<NotificationData>> {
        Ok(self
            .tables
            .lock()
            .notifications
            .iter()
            .rev()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_notification_read(
        &self,
        notification_id: PrimaryKey,
    ) -> Result<NotificationData> {
        let mut tables = self.tables.lock();
        let notification = tables
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(DatabaseError::NotFound {
                resource: "notification",
                identifier: "id",
            })?;

        notification.read = true;
        Ok(notification.clone())
    }

    async fn mark_all_notifications_read(&self, user_id: PrimaryKey) -> Result<()> {
        self.tables
            .lock()
            .notifications
            .iter_mut()
            .filter(|n| n.user_id == user_id)
            .for_each(|n| n.read = true);

        Ok(())
    }
}

/// Counts rows per table, used to assert that failed operations wrote nothing
#[cfg(test)]
impl MemoryDatabase {
    pub(crate) fn row_counts(&self) -> std::collections::HashMap<&'static str, usize> {
        let tables = self.tables.lock();

        std::collections::HashMap::from([
            ("users", tables.users.len()),
            ("jams", tables.jams.len()),
            ("themes", tables.themes.len()),
            ("participations", tables.participations.len()),
            ("attendance", tables.attendance.len()),
            ("messages", tables.messages.len()),
            ("media", tables.media.len()),
            ("notifications", tables.notifications.len()),
        ])
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn new_jam(code: &str, host_id: PrimaryKey) -> NewJam {
        NewJam {
            code: code.to_string(),
            name: "Martes de jazz".to_string(),
            description: None,
            location: None,
            city: None,
            start_time: Utc::now(),
            is_private: false,
            opening_act: None,
            opening_act_time: None,
            host_id,
        }
    }

    async fn seeded() -> (MemoryDatabase, JamData) {
        let db = MemoryDatabase::new();
        let host = db
            .create_user(NewUser {
                name: "Host".to_string(),
                email: Some("host@example.com".to_string()),
                password: None,
                role: Role::User,
            })
            .await
            .unwrap();

        let jam = db.create_jam(new_jam("AB12", host.id)).await.unwrap();

        (db, jam)
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let (db, jam) = seeded().await;

        let duplicate_code = db.create_jam(new_jam("AB12", jam.host_id)).await;

        assert!(matches!(
            duplicate_code,
            Err(DatabaseError::Conflict { field: "code", .. })
        ));

        db.create_attendance(jam.id, jam.host_id).await.unwrap();
        let again = db.create_attendance(jam.id, jam.host_id).await;

        assert!(matches!(again, Err(DatabaseError::Conflict { .. })));
        assert_eq!(db.list_attendance(jam.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_emails_are_case_insensitive() {
        let (db, _) = seeded().await;

        let user = db.user_by_email("HOST@example.com").await.unwrap();
        assert_eq!(user.name, "Host");

        let duplicate = db
            .create_user(NewUser {
                name: "Impostor".to_string(),
                email: Some("Host@Example.com".to_string()),
                password: None,
                role: Role::User,
            })
            .await;

        assert!(matches!(duplicate, Err(DatabaseError::Conflict { .. })));
    }

    async fn theme(db: &MemoryDatabase, jam: &JamData, name: &str) -> ThemeData {
        db.create_theme(NewTheme {
            jam_id: jam.id,
            name: name.to_string(),
            tonality: None,
            description: None,
            kind: crate::ThemeKind::Song,
            proposed_by_id: jam.host_id,
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_enqueue_appends_and_reorder_covers_queue() {
        let (db, jam) = seeded().await;

        let first = theme(&db, &jam, "Solar").await;
        let second = theme(&db, &jam, "Nardis").await;

        assert_eq!(db.enqueue_theme(first.id).await.unwrap().order, 0);
        assert_eq!(db.enqueue_theme(second.id).await.unwrap().order, 1);

        // Queueing again keeps the theme's own order out of the count
        assert_eq!(db.enqueue_theme(second.id).await.unwrap().order, 1);

        let partial = [QueuePlacement { theme_id: second.id, order: 0 }];
        assert!(db.reorder_themes(jam.id, &partial).await.is_err());

        let full = [
            QueuePlacement { theme_id: second.id, order: 0 },
            QueuePlacement { theme_id: first.id, order: 1 },
        ];
        db.reorder_themes(jam.id, &full).await.unwrap();

        assert_eq!(db.theme_by_id(second.id).await.unwrap().order, 0);
        assert_eq!(db.theme_by_id(first.id).await.unwrap().order, 1);
    }

    #[tokio::test]
    async fn test_delete_jam_cascades() {
        let (db, jam) = seeded().await;

        let theme = db
            .create_theme(NewTheme {
                jam_id: jam.id,
                name: "Blue Bossa".to_string(),
                tonality: Some("Cm".to_string()),
                description: None,
                kind: crate::ThemeKind::Song,
                proposed_by_id: jam.host_id,
            })
            .await
            .unwrap();

        db.create_participation(NewParticipation {
            user_id: jam.host_id,
            theme_id: theme.id,
            instrument: "Piano".to_string(),
        })
        .await
        .unwrap();

        db.create_message(NewMessage {
            jam_id: jam.id,
            theme_id: Some(theme.id),
            author_id: jam.host_id,
            content: "Vamos".to_string(),
        })
        .await
        .unwrap();

        db.delete_jam(jam.id).await.unwrap();

        let counts = db.row_counts();
        assert_eq!(counts["jams"], 0);
        assert_eq!(counts["themes"], 0);
        assert_eq!(counts["participations"], 0);
        assert_eq!(counts["messages"], 0);
        assert_eq!(counts["users"], 1);
    }
}
