use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{postgres::PgPoolOptions, query, query_as, Error as SqlxError, FromRow, PgPool};

use crate::{
    AttendanceData, Database, DatabaseError, DatabaseResult, DirectMessageData, IntoDatabaseError,
    JamData, JamStatus, MediaData, MessageData, NewDirectMessage, NewJam, NewMedia, NewMessage,
    NewNotification, NewParticipation, NewSession, NewTheme, NewUser, NotificationData,
    ParticipationData, ParticipationStatus, PrimaryKey, Profile, QueuePlacement, Result, Role,
    SessionData, ThemeData, ThemeStatus, UnknownVariant, UpdatedProfile, UserData,
};

/// A postgres database implementation for Toca Tocar
pub struct PgDatabase {
    pool: PgPool,
}

impl PgDatabase {
    /// Connects to the database and brings the schema up to date
    pub async fn new(url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(url)
            .await
            .map_err(|e| e.any())?;

        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .map_err(DatabaseError::internal)?;

        Ok(Self { pool })
    }
}

#[derive(FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: Option<String>,
    password: Option<String>,
    role: String,
    city: Option<String>,
    instrument: Option<String>,
    instagram: Option<String>,
    youtube: Option<String>,
    website: Option<String>,
    bio: Option<String>,
    image: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SessionRow {
    id: i32,
    token: String,
    user_id: i32,
    expires_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct JamRow {
    id: i32,
    code: String,
    name: String,
    description: Option<String>,
    location: Option<String>,
    city: Option<String>,
    start_time: DateTime<Utc>,
    status: String,
    host_id: i32,
    is_private: bool,
    opening_act: Option<String>,
    opening_act_time: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ThemeRow {
    id: i32,
    jam_id: i32,
    name: String,
    tonality: Option<String>,
    description: Option<String>,
    kind: String,
    status: String,
    queue_order: i32,
    proposed_by_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ParticipationRow {
    id: i32,
    user_id: i32,
    theme_id: i32,
    instrument: String,
    status: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct AttendanceRow {
    id: i32,
    user_id: i32,
    jam_id: i32,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MessageRow {
    id: i32,
    jam_id: i32,
    theme_id: Option<i32>,
    author_id: i32,
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct DirectMessageRow {
    id: i32,
    sender_id: i32,
    recipient_id: i32,
    content: String,
    read: bool,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct MediaRow {
    id: i32,
    jam_id: i32,
    uploader_id: i32,
    url: String,
    kind: String,
    caption: Option<String>,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct NotificationRow {
    id: i32,
    user_id: i32,
    kind: String,
    message: String,
    link: Option<String>,
    actor_id: Option<i32>,
    read: bool,
    created_at: DateTime<Utc>,
}

fn parse<T>(value: &str) -> Result<T>
where
    T: FromStr<Err = UnknownVariant>,
{
    value.parse().map_err(DatabaseError::internal)
}

impl TryFrom<UserRow> for UserData {
    type Error = DatabaseError;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            name: row.name,
            email: row.email,
            password: row.password,
            role: parse(&row.role)?,
            profile: Profile {
                city: row.city,
                instrument: row.instrument,
                instagram: row.instagram,
                youtube: row.youtube,
                website: row.website,
                bio: row.bio,
                image: row.image,
            },
            created_at: row.created_at,
        })
    }
}

impl TryFrom<JamRow> for JamData {
    type Error = DatabaseError;

    fn try_from(row: JamRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            code: row.code,
            name: row.name,
            description: row.description,
            location: row.location,
            city: row.city,
            start_time: row.start_time,
            status: parse(&row.status)?,
            host_id: row.host_id,
            is_private: row.is_private,
            opening_act: row.opening_act,
            opening_act_time: row.opening_act_time,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ThemeRow> for ThemeData {
    type Error = DatabaseError;

    fn try_from(row: ThemeRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            jam_id: row.jam_id,
            name: row.name,
            tonality: row.tonality,
            description: row.description,
            kind: parse(&row.kind)?,
            status: parse(&row.status)?,
            order: row.queue_order,
            proposed_by_id: row.proposed_by_id,
            created_at: row.created_at,
        })
    }
}

impl TryFrom<ParticipationRow> for ParticipationData {
    type Error = DatabaseError;

    fn try_from(row: ParticipationRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            user_id: row.user_id,
            theme_id: row.theme_id,
            instrument: row.instrument,
            status: parse(&row.status)?,
            created_at: row.created_at,
        })
    }
}

impl From<AttendanceRow> for AttendanceData {
    fn from(row: AttendanceRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            jam_id: row.jam_id,
            created_at: row.created_at,
        }
    }
}

impl From<MessageRow> for MessageData {
    fn from(row: MessageRow) -> Self {
        Self {
            id: row.id,
            jam_id: row.jam_id,
            theme_id: row.theme_id,
            author_id: row.author_id,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

impl From<DirectMessageRow> for DirectMessageData {
    fn from(row: DirectMessageRow) -> Self {
        Self {
            id: row.id,
            sender_id: row.sender_id,
            recipient_id: row.recipient_id,
            content: row.content,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

impl TryFrom<MediaRow> for MediaData {
    type Error = DatabaseError;

    fn try_from(row: MediaRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            jam_id: row.jam_id,
            uploader_id: row.uploader_id,
            url: row.url,
            kind: parse(&row.kind)?,
            caption: row.caption,
            created_at: row.created_at,
        })
    }
}

impl From<NotificationRow> for NotificationData {
    fn from(row: NotificationRow) -> Self {
        Self {
            id: row.id,
            user_id: row.user_id,
            kind: row.kind,
            message: row.message,
            link: row.link,
            actor_id: row.actor_id,
            read: row.read,
            created_at: row.created_at,
        }
    }
}

/// Converts a list of rows, failing on the first row that doesn't convert
fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>>
where
    T: TryFrom<R, Error = DatabaseError>,
{
    rows.into_iter().map(T::try_from).collect()
}

#[async_trait]
impl Database for PgDatabase {
    async fn user_by_id(&self, user_id: PrimaryKey) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))?
            .try_into()
    }

    async fn user_by_email(&self, email: &str) -> Result<UserData> {
        query_as::<_, UserRow>("SELECT * FROM users WHERE lower(email) = lower($1)")
            .bind(email)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "email"))?
            .try_into()
    }

    async fn create_user(&self, new_user: NewUser) -> Result<UserData> {
        if let Some(email) = &new_user.email {
            self.user_by_email(email)
                .await
                .conflict_or_ok("user", "email", email)?;
        }

        let email = new_user.email.clone().unwrap_or_default();

        query_as::<_, UserRow>(
            "INSERT INTO users (name, email, password, role) VALUES ($1, $2, $3, $4) RETURNING *",
        )
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(new_user.password)
        .bind(new_user.role.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("user", "email", &email))?
        .try_into()
    }

    async fn update_profile(&self, updated_profile: UpdatedProfile) -> Result<UserData> {
        let user = self.user_by_id(updated_profile.id).await?;
        let profile = user.profile;

        query_as::<_, UserRow>(
            "UPDATE users SET
                name = $1,
                city = $2,
                instrument = $3,
                instagram = $4,
                youtube = $5,
                website = $6,
                bio = $7,
                image = $8
            WHERE id = $9
            RETURNING *",
        )
        .bind(updated_profile.name.unwrap_or(user.name))
        .bind(updated_profile.city.or(profile.city))
        .bind(updated_profile.instrument.or(profile.instrument))
        .bind(updated_profile.instagram.or(profile.instagram))
        .bind(updated_profile.youtube.or(profile.youtube))
        .bind(updated_profile.website.or(profile.website))
        .bind(updated_profile.bio.or(profile.bio))
        .bind(updated_profile.image.or(profile.image))
        .bind(updated_profile.id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?
        .try_into()
    }

    async fn set_user_role(&self, user_id: PrimaryKey, role: Role) -> Result<UserData> {
        query_as::<_, UserRow>("UPDATE users SET role = $1 WHERE id = $2 RETURNING *")
            .bind(role.as_str())
            .bind(user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("user", "id"))?
            .try_into()
    }

    async fn session_by_token(&self, token: &str) -> Result<SessionData> {
        let row = query_as::<_, SessionRow>(
            "SELECT * FROM sessions WHERE token = $1 AND expires_at > now()",
        )
        .bind(token)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("session", "token"))?;

        let user = self.user_by_id(row.user_id).await?;

        Ok(SessionData {
            id: row.id,
            token: row.token,
            expires_at: row.expires_at,
            user,
        })
    }

    async fn create_session(&self, new_session: NewSession) -> Result<SessionData> {
        self.session_by_token(&new_session.token)
            .await
            .conflict_or_ok("session", "token", &new_session.token)?;

        query(
            "INSERT INTO sessions (token, user_id, expires_at) VALUES ($1, $2, $3)",
        )
        .bind(&new_session.token)
        .bind(new_session.user_id)
        .bind(new_session.expires_at)
        .execute(&self.pool)
        .await
        .map_err(|e| e.conflict_or("session", "token", &new_session.token))?;

        self.session_by_token(&new_session.token).await
    }

    async fn delete_session_by_token(&self, token: &str) -> Result<()> {
        let result = query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())?;

        if result.rows_affected() == 0 {
            return Err(DatabaseError::NotFound {
                resource: "session",
                identifier: "token",
            });
        }

        Ok(())
    }

    async fn clear_expired_sessions(&self) -> Result<()> {
        query("DELETE FROM sessions WHERE now() > expires_at")
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn jam_by_id(&self, jam_id: PrimaryKey) -> Result<JamData> {
        query_as::<_, JamRow>("SELECT * FROM jams WHERE id = $1")
            .bind(jam_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("jam", "id"))?
            .try_into()
    }

    async fn jam_by_code(&self, code: &str) -> Result<JamData> {
        query_as::<_, JamRow>("SELECT * FROM jams WHERE code = $1")
            .bind(code)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("jam", "code"))?
            .try_into()
    }

    async fn list_jams(&self) -> Result<Vec<JamData>> {
        let rows = query_as::<_, JamRow>("SELECT * FROM jams ORDER BY start_time DESC, id DESC")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn create_jam(&self, new_jam: NewJam) -> Result<JamData> {
        self.jam_by_code(&new_jam.code)
            .await
            .conflict_or_ok("jam", "code", &new_jam.code)?;

        // Ensure host exists
        let _ = self.user_by_id(new_jam.host_id).await?;

        query_as::<_, JamRow>(
            "
            INSERT INTO jams (
                code, name, description, location, city, start_time,
                host_id, is_private, opening_act, opening_act_time
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *",
        )
        .bind(&new_jam.code)
        .bind(new_jam.name)
        .bind(new_jam.description)
        .bind(new_jam.location)
        .bind(new_jam.city)
        .bind(new_jam.start_time)
        .bind(new_jam.host_id)
        .bind(new_jam.is_private)
        .bind(new_jam.opening_act)
        .bind(new_jam.opening_act_time)
        .fetch_one(&self.pool)
        .await
        // Two hosts can race for the same code between the check and the insert
        .map_err(|e| e.conflict_or("jam", "code", &new_jam.code))?
        .try_into()
    }

    async fn update_jam_status(&self, jam_id: PrimaryKey, status: JamStatus) -> Result<JamData> {
        query_as::<_, JamRow>("UPDATE jams SET status = $1 WHERE id = $2 RETURNING *")
            .bind(status.as_str())
            .bind(jam_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("jam", "id"))?
            .try_into()
    }

    async fn delete_jam(&self, jam_id: PrimaryKey) -> Result<()> {
        // Ensure jam exists
        let _ = self.jam_by_id(jam_id).await?;

        query("DELETE FROM jams WHERE id = $1")
            .bind(jam_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn attendance(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<AttendanceData> {
        query_as::<_, AttendanceRow>(
            "SELECT * FROM jam_attendance WHERE jam_id = $1 AND user_id = $2",
        )
        .bind(jam_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("attendance", "jam_id:user_id"))
    }

    async fn create_attendance(
        &self,
        jam_id: PrimaryKey,
        user_id: PrimaryKey,
    ) -> Result<AttendanceData> {
        let key = format!("{}:{}", jam_id, user_id);

        query_as::<_, AttendanceRow>(
            "INSERT INTO jam_attendance (jam_id, user_id) VALUES ($1, $2) RETURNING *",
        )
        .bind(jam_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.conflict_or("attendance", "jam:user", &key))
    }

    async fn delete_attendance(&self, jam_id: PrimaryKey, user_id: PrimaryKey) -> Result<()> {
        let attendance = self.attendance(jam_id, user_id).await?;

        query("DELETE FROM jam_attendance WHERE id = $1")
            .bind(attendance.id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn list_attendance(&self, jam_id: PrimaryKey) -> Result<Vec<AttendanceData>> {
        let rows = query_as::<_, AttendanceRow>(
            "SELECT * FROM jam_attendance WHERE jam_id = $1 ORDER BY created_at, id",
        )
        .bind(jam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn theme_by_id(&self, theme_id: PrimaryKey) -> Result<ThemeData> {
        query_as::<_, ThemeRow>("SELECT * FROM themes WHERE id = $1")
            .bind(theme_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("theme", "id"))?
            .try_into()
    }

    async fn list_themes(&self, jam_id: PrimaryKey) -> Result<Vec<ThemeData>> {
        let rows = query_as::<_, ThemeRow>(
            "SELECT * FROM themes WHERE jam_id = $1 ORDER BY created_at, id",
        )
        .bind(jam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn create_theme(&self, new_theme: NewTheme) -> Result<ThemeData> {
        // Ensure jam exists
        let _ = self.jam_by_id(new_theme.jam_id).await?;

        query_as::<_, ThemeRow>(
            "
            INSERT INTO themes (jam_id, name, tonality, description, kind, proposed_by_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *",
        )
        .bind(new_theme.jam_id)
        .bind(new_theme.name)
        .bind(new_theme.tonality)
        .bind(new_theme.description)
        .bind(new_theme.kind.as_str())
        .bind(new_theme.proposed_by_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?
        .try_into()
    }

    async fn update_theme_status(
        &self,
        theme_id: PrimaryKey,
        status: ThemeStatus,
        order: i32,
    ) -> Result<ThemeData> {
        query_as::<_, ThemeRow>(
            "UPDATE themes SET status = $1, queue_order = $2 WHERE id = $3 RETURNING *",
        )
        .bind(status.as_str())
        .bind(order)
        .bind(theme_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("theme", "id"))?
        .try_into()
    }

    async fn enqueue_theme(&self, theme_id: PrimaryKey) -> Result<ThemeData> {
        let mut transaction = self.pool.begin().await.map_err(|e| e.any())?;

        // Locking the jam row serializes queue changes within a jam
        query(
            "SELECT jams.id FROM jams JOIN themes ON themes.jam_id = jams.id
            WHERE themes.id = $1 FOR UPDATE OF jams",
        )
        .bind(theme_id)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|e| e.not_found_or("theme", "id"))?;

        let theme: ThemeData = query_as::<_, ThemeRow>(
            "UPDATE themes SET status = 'QUEUED', queue_order = (
                SELECT COALESCE(MAX(queued.queue_order) + 1, 0) FROM themes queued
                WHERE queued.jam_id = themes.jam_id
                    AND queued.status = 'QUEUED'
                    AND queued.id <> themes.id
            )
            WHERE id = $1 RETURNING *",
        )
        .bind(theme_id)
        .fetch_one(&mut *transaction)
        .await
        .map_err(|e| e.not_found_or("theme", "id"))?
        .try_into()?;

        transaction.commit().await.map_err(|e| e.any())?;
        Ok(theme)
    }

    async fn reorder_themes(
        &self,
        jam_id: PrimaryKey,
        placements: &[QueuePlacement],
    ) -> Result<()> {
        // Dropping the transaction without committing rolls it back
        let mut transaction = self.pool.begin().await.map_err(|e| e.any())?;

        query("SELECT id FROM jams WHERE id = $1 FOR UPDATE")
            .bind(jam_id)
            .fetch_one(&mut *transaction)
            .await
            .map_err(|e| e.not_found_or("jam", "id"))?;

        let (queued,): (i64,) =
            query_as("SELECT COUNT(*) FROM themes WHERE jam_id = $1 AND status = 'QUEUED'")
                .bind(jam_id)
                .fetch_one(&mut *transaction)
                .await
                .map_err(|e| e.any())?;

        if queued != placements.len() as i64 {
            return Err(DatabaseError::Internal(
                "placements do not cover the whole queue".into(),
            ));
        }

        for placement in placements {
            let result = query(
                "UPDATE themes SET queue_order = $1
                WHERE id = $2 AND jam_id = $3 AND status = 'QUEUED'",
            )
            .bind(placement.order)
            .bind(placement.theme_id)
            .bind(jam_id)
            .execute(&mut *transaction)
            .await
            .map_err(|e| e.any())?;

            if result.rows_affected() == 0 {
                transaction.rollback().await.map_err(|e| e.any())?;

                return Err(DatabaseError::NotFound {
                    resource: "queued theme",
                    identifier: "id",
                });
            }
        }

        transaction.commit().await.map_err(|e| e.any())
    }

    async fn delete_theme(&self, theme_id: PrimaryKey) -> Result<()> {
        // Ensure theme exists
        let _ = self.theme_by_id(theme_id).await?;

        query("DELETE FROM themes WHERE id = $1")
            .bind(theme_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn participation(
        &self,
        user_id: PrimaryKey,
        theme_id: PrimaryKey,
        instrument: &str,
    ) -> Result<ParticipationData> {
        query_as::<_, ParticipationRow>(
            "SELECT * FROM participations
            WHERE user_id = $1 AND theme_id = $2 AND instrument = $3",
        )
        .bind(user_id)
        .bind(theme_id)
        .bind(instrument)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("participation", "user_id:theme_id:instrument"))?
        .try_into()
    }

    async fn participation_by_id(
        &self,
        participation_id: PrimaryKey,
    ) -> Result<ParticipationData> {
        query_as::<_, ParticipationRow>("SELECT * FROM participations WHERE id = $1")
            .bind(participation_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("participation", "id"))?
            .try_into()
    }

    async fn create_participation(
        &self,
        new_participation: NewParticipation,
    ) -> Result<ParticipationData> {
        let key = format!(
            "{}:{}:{}",
            new_participation.user_id, new_participation.theme_id, new_participation.instrument
        );

        query_as::<_, ParticipationRow>(
            "INSERT INTO participations (user_id, theme_id, instrument)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_participation.user_id)
        .bind(new_participation.theme_id)
        .bind(new_participation.instrument)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.conflict_or("participation", "user:theme:instrument", &key))?
        .try_into()
    }

    async fn update_participation_status(
        &self,
        participation_id: PrimaryKey,
        status: ParticipationStatus,
    ) -> Result<ParticipationData> {
        query_as::<_, ParticipationRow>(
            "UPDATE participations SET status = $1 WHERE id = $2 RETURNING *",
        )
        .bind(status.as_str())
        .bind(participation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.not_found_or("participation", "id"))?
        .try_into()
    }

    async fn delete_participations(
        &self,
        user_id: PrimaryKey,
        theme_id: PrimaryKey,
    ) -> Result<u64> {
        query("DELETE FROM participations WHERE user_id = $1 AND theme_id = $2")
            .bind(user_id)
            .bind(theme_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|r| r.rows_affected())
    }

    async fn list_participations(&self, theme_id: PrimaryKey) -> Result<Vec<ParticipationData>> {
        let rows = query_as::<_, ParticipationRow>(
            "SELECT * FROM participations WHERE theme_id = $1 ORDER BY created_at, id",
        )
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn create_message(&self, new_message: NewMessage) -> Result<MessageData> {
        query_as::<_, MessageRow>(
            "INSERT INTO messages (jam_id, theme_id, author_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *",
        )
        .bind(new_message.jam_id)
        .bind(new_message.theme_id)
        .bind(new_message.author_id)
        .bind(new_message.content)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn list_messages(
        &self,
        jam_id: PrimaryKey,
        theme_id: Option<PrimaryKey>,
    ) -> Result<Vec<MessageData>> {
        let rows = query_as::<_, MessageRow>(
            "SELECT * FROM messages
            WHERE jam_id = $1 AND ($2::INTEGER IS NULL OR theme_id = $2)
            ORDER BY created_at, id",
        )
        .bind(jam_id)
        .bind(theme_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn create_direct_message(
        &self,
        new_message: NewDirectMessage,
    ) -> Result<DirectMessageData> {
        query_as::<_, DirectMessageRow>(
            "INSERT INTO direct_messages (sender_id, recipient_id, content)
            VALUES ($1, $2, $3)
            RETURNING *",
        )
        .bind(new_message.sender_id)
        .bind(new_message.recipient_id)
        .bind(new_message.content)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn list_direct_messages(
        &self,
        user_id: PrimaryKey,
        other_id: PrimaryKey,
    ) -> Result<Vec<DirectMessageData>> {
        let rows = query_as::<_, DirectMessageRow>(
            "SELECT * FROM direct_messages
            WHERE (sender_id = $1 AND recipient_id = $2)
                OR (sender_id = $2 AND recipient_id = $1)
            ORDER BY created_at, id",
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_direct_messages_read(
        &self,
        sender_id: PrimaryKey,
        recipient_id: PrimaryKey,
    ) -> Result<()> {
        query(
            "UPDATE direct_messages SET read = true
            WHERE sender_id = $1 AND recipient_id = $2 AND read = false",
        )
        .bind(sender_id)
        .bind(recipient_id)
        .execute(&self.pool)
        .await
        .map_err(|e| e.any())
        .map(|_| ())
    }

    async fn media_by_id(&self, media_id: PrimaryKey) -> Result<MediaData> {
        query_as::<_, MediaRow>("SELECT * FROM media WHERE id = $1")
            .bind(media_id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| e.not_found_or("media", "id"))?
            .try_into()
    }

    async fn create_media(&self, new_media: NewMedia) -> Result<MediaData> {
        query_as::<_, MediaRow>(
            "INSERT INTO media (jam_id, uploader_id, url, kind, caption)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(new_media.jam_id)
        .bind(new_media.uploader_id)
        .bind(new_media.url)
        .bind(new_media.kind.as_str())
        .bind(new_media.caption)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| e.any())?
        .try_into()
    }

    async fn list_media(&self, jam_id: PrimaryKey) -> Result<Vec<MediaData>> {
        let rows = query_as::<_, MediaRow>(
            "SELECT * FROM media WHERE jam_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(jam_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        convert_all(rows)
    }

    async fn delete_media(&self, media_id: PrimaryKey) -> Result<()> {
        // Ensure media exists
        let _ = self.media_by_id(media_id).await?;

        query("DELETE FROM media WHERE id = $1")
            .bind(media_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }

    async fn notification_by_id(&self, notification_id: PrimaryKey) -> Result<NotificationData> {
        query_as::<_, NotificationRow>("SELECT * FROM notifications WHERE id = $1")
            .bind(notification_id)
            .fetch_one(&self.pool)
            .await
            .map(Into::into)
            .map_err(|e| e.not_found_or("notification", "id"))
    }

    async fn create_notification(
        &self,
        new_notification: NewNotification,
    ) -> Result<NotificationData> {
        query_as::<_, NotificationRow>(
            "INSERT INTO notifications (user_id, kind, message, link, actor_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *",
        )
        .bind(new_notification.user_id)
        .bind(new_notification.kind)
        .bind(new_notification.message)
        .bind(new_notification.link)
        .bind(new_notification.actor_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.any())
    }

    async fn list_notifications(&self, user_id: PrimaryKey) -> Result<Vec<NotificationData>> {
        let rows = query_as::<_, NotificationRow>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| e.any())?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    async fn mark_notification_read(
        &self,
        notification_id: PrimaryKey,
    ) -> Result<NotificationData> {
        query_as::<_, NotificationRow>(
            "UPDATE notifications SET read = true WHERE id = $1 RETURNING *",
        )
        .bind(notification_id)
        .fetch_one(&self.pool)
        .await
        .map(Into::into)
        .map_err(|e| e.not_found_or("notification", "id"))
    }

    async fn mark_all_notifications_read(&self, user_id: PrimaryKey) -> Result<()> {
        query("UPDATE notifications SET read = true WHERE user_id = $1 AND read = false")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(|e| e.any())
            .map(|_| ())
    }
}

impl IntoDatabaseError for SqlxError {
    fn any(self) -> DatabaseError {
        DatabaseError::internal(self)
    }

    fn not_found_or(self, resource: &'static str, identifier: &'static str) -> DatabaseError {
        match self {
            SqlxError::RowNotFound => DatabaseError::NotFound {
                resource,
                identifier,
            },
            e => Self::any(e),
        }
    }

    fn conflict_or(self, resource: &'static str, field: &'static str, value: &str) -> DatabaseError {
        match self {
            SqlxError::Database(ref e) if e.is_unique_violation() => DatabaseError::Conflict {
                resource,
                field,
                value: value.to_string(),
            },
            e => Self::any(e),
        }
    }
}
