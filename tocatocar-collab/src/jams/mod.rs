mod code;

use std::sync::Arc;

use chrono::{DateTime, Utc};
use log::{info, warn};

pub use code::*;

use crate::{
    errors::PersistenceContext, AccessPolicy, Actor, AttendanceData, CollabContext, CollabError,
    CollabEvent, CollabResult, Committed, DatabaseError, JamData, JamStatus, NewJam, PrimaryKey,
};

/// How many codes are tried before giving up on creating a jam
const MAX_CODE_ATTEMPTS: usize = 10;

/// Creates, looks up and removes jams, and keeps track of who attends them
pub struct JamManager {
    context: CollabContext,
    codes: Arc<dyn CodeSource>,
}

/// The fields a host fills in when creating a jam
#[derive(Debug, Clone)]
pub struct JamFields {
    pub name: String,
    pub description: Option<String>,
    pub location: Option<String>,
    pub city: Option<String>,
    pub start_time: DateTime<Utc>,
    pub is_private: bool,
    pub opening_act: Option<String>,
    pub opening_act_time: Option<DateTime<Utc>>,
}

impl JamManager {
    pub fn new(context: &CollabContext) -> Self {
        Self::with_codes(context, Arc::new(RandomCodes))
    }

    pub fn with_codes(context: &CollabContext, codes: Arc<dyn CodeSource>) -> Self {
        Self {
            context: context.clone(),
            codes,
        }
    }

    /// Creates a jam hosted by the actor under a fresh code
    pub async fn create(&self, actor: &Actor, fields: JamFields) -> CollabResult<JamData> {
        let name = fields.name.trim();

        if name.is_empty() {
            return Err(CollabError::Invalid("El nombre es obligatorio".to_string()));
        }

        let mut new_jam = NewJam {
            code: String::new(),
            name: name.to_string(),
            description: non_empty(fields.description),
            location: non_empty(fields.location),
            city: non_empty(fields.city),
            start_time: fields.start_time,
            is_private: fields.is_private,
            opening_act: non_empty(fields.opening_act),
            opening_act_time: fields.opening_act_time,
            host_id: actor.id,
        };

        for attempt in 1..=MAX_CODE_ATTEMPTS {
            new_jam.code = self.codes.next_code();

            match self.context.database.create_jam(new_jam.clone()).await {
                Ok(jam) => {
                    info!("Created jam {} ({}) hosted by {}", jam.name, jam.code, actor.id);
                    return Ok(jam);
                }
                Err(DatabaseError::Conflict { value, .. }) => {
                    warn!("Jam code {} is taken (attempt {})", value, attempt);
                }
                Err(e) => return Err(e).context("creating jam"),
            }
        }

        Err(CollabError::CodeExhausted)
    }

    pub async fn update_status(
        &self,
        actor: &Actor,
        jam_id: PrimaryKey,
        status: JamStatus,
    ) -> CollabResult<JamData> {
        let db = &self.context.database;
        let jam = db.jam_by_id(jam_id).await.context("fetching jam")?;

        AccessPolicy::ensure(self.context.policy.can_manage_jam(actor, &jam))?;

        if jam.status == status {
            return Ok(jam);
        }

        let jam = db
            .update_jam_status(jam_id, status)
            .await
            .context("updating jam status")?;

        let committed = Committed::new(jam).with(CollabEvent::JamUpdated { jam_id });
        Ok(self.context.settle(committed).await)
    }

    /// Deletes a jam along with everything in it
    pub async fn delete(&self, actor: &Actor, code: &str) -> CollabResult<()> {
        let jam = self.by_code(code).await?;

        AccessPolicy::ensure(self.context.policy.can_manage_jam(actor, &jam))?;

        self.context
            .database
            .delete_jam(jam.id)
            .await
            .context("deleting jam")?;

        info!("Jam {} was deleted by {}", jam.code, actor.id);

        let committed = Committed::new(()).with(CollabEvent::JamUpdated { jam_id: jam.id });
        self.context.settle(committed).await;

        Ok(())
    }

    pub async fn by_code(&self, code: &str) -> CollabResult<JamData> {
        let code = normalize_code(code).ok_or(CollabError::NotFound {
            resource: "jam",
            identifier: "code",
        })?;

        self.context
            .database
            .jam_by_code(&code)
            .await
            .context("fetching jam")
    }

    /// Lists public jams, plus the private ones the actor hosts
    pub async fn list(&self, actor: Option<&Actor>) -> CollabResult<Vec<JamData>> {
        let jams = self
            .context
            .database
            .list_jams()
            .await
            .context("listing jams")?;

        Ok(jams
            .into_iter()
            .filter(|jam| !jam.is_private || actor.is_some_and(|a| a.id == jam.host_id))
            .collect())
    }

    /// Marks the actor as present at the jam. Checking in twice is fine.
    pub async fn check_in(&self, actor: &Actor, code: &str) -> CollabResult<AttendanceData> {
        let jam = self.by_code(code).await?;
        let db = &self.context.database;

        match db.create_attendance(jam.id, actor.id).await {
            Ok(attendance) => {
                let committed =
                    Committed::new(attendance).with(CollabEvent::JamUpdated { jam_id: jam.id });

                Ok(self.context.settle(committed).await)
            }
            Err(DatabaseError::Conflict { .. }) => db
                .attendance(jam.id, actor.id)
                .await
                .context("fetching attendance"),
            Err(e) => Err(e).context("checking in"),
        }
    }

    pub async fn check_out(&self, actor: &Actor, code: &str) -> CollabResult<()> {
        let jam = self.by_code(code).await?;

        match self.context.database.delete_attendance(jam.id, actor.id).await {
            Ok(_) => {
                let committed = Committed::new(()).with(CollabEvent::JamUpdated { jam_id: jam.id });
                self.context.settle(committed).await;

                Ok(())
            }
            Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(e).context("checking out"),
        }
    }

    pub async fn attendees(&self, code: &str) -> CollabResult<Vec<AttendanceData>> {
        let jam = self.by_code(code).await?;

        self.context
            .database
            .list_attendance(jam.id)
            .await
            .context("listing attendance")
    }
}

pub(crate) fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
