use std::collections::HashSet;

use crate::{CollabError, CollabResult, JamData, PrimaryKey, Role, ThemeData, UserData};

/// The authenticated identity performing an operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub id: PrimaryKey,
    pub role: Role,
    pub email: Option<String>,
}

impl From<&UserData> for Actor {
    fn from(user: &UserData) -> Self {
        Self {
            id: user.id,
            role: user.role,
            email: user.email.clone(),
        }
    }
}

/// Decides who may do what.
///
/// Admins are users with the [Role::Admin] role, plus anyone whose email is
/// in the configured allow-list.
#[derive(Debug, Clone, Default)]
pub struct AccessPolicy {
    admin_emails: HashSet<String>,
}

impl AccessPolicy {
    pub fn new<I, S>(admin_emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            admin_emails: admin_emails
                .into_iter()
                .map(|e| e.as_ref().trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
        }
    }

    pub fn is_admin(&self, actor: &Actor) -> bool {
        actor.role == Role::Admin
            || actor
                .email
                .as_ref()
                .is_some_and(|e| self.admin_emails.contains(&e.to_lowercase()))
    }

    pub fn is_host(&self, actor: &Actor, jam: &JamData) -> bool {
        jam.host_id == actor.id
    }

    /// Host or admin
    pub fn can_manage_jam(&self, actor: &Actor, jam: &JamData) -> bool {
        self.is_host(actor, jam) || self.is_admin(actor)
    }

    /// Host, proposer of the theme, or admin
    pub fn can_move_theme(&self, actor: &Actor, jam: &JamData, theme: &ThemeData) -> bool {
        self.can_manage_jam(actor, jam) || theme.proposed_by_id == actor.id
    }

    pub fn ensure(allowed: bool) -> CollabResult<()> {
        if allowed {
            Ok(())
        } else {
            Err(CollabError::Unauthorized)
        }
    }
}

#[cfg(test)]
mod test {
    use chrono::Utc;

    use super::*;
    use crate::{JamStatus, ThemeKind, ThemeStatus};

    fn actor(id: PrimaryKey, role: Role, email: &str) -> Actor {
        Actor {
            id,
            role,
            email: Some(email.to_string()),
        }
    }

    fn jam(host_id: PrimaryKey) -> JamData {
        JamData {
            id: 1,
            code: "AB12".to_string(),
            name: "Jam".to_string(),
            description: None,
            location: None,
            city: None,
            start_time: Utc::now(),
            status: JamStatus::Scheduled,
            host_id,
            is_private: false,
            opening_act: None,
            opening_act_time: None,
            created_at: Utc::now(),
        }
    }

    fn theme(proposed_by_id: PrimaryKey) -> ThemeData {
        ThemeData {
            id: 2,
            jam_id: 1,
            name: "Autumn Leaves".to_string(),
            tonality: Some("Gm".to_string()),
            description: None,
            kind: ThemeKind::Song,
            status: ThemeStatus::Open,
            order: 0,
            proposed_by_id,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_admin_allow_list() {
        let policy = AccessPolicy::new([" Boss@TocaTocar.com ", ""]);

        assert!(policy.is_admin(&actor(1, Role::User, "boss@tocatocar.com")));
        assert!(policy.is_admin(&actor(2, Role::Admin, "someone@example.com")));
        assert!(!policy.is_admin(&actor(3, Role::User, "someone@example.com")));
        assert!(!policy.is_admin(&Actor {
            id: 4,
            role: Role::User,
            email: None
        }));
    }

    #[test]
    fn test_theme_permissions() {
        let policy = AccessPolicy::default();
        let jam = jam(1);
        let theme = theme(2);

        assert!(policy.can_move_theme(&actor(1, Role::User, "host@a.com"), &jam, &theme));
        assert!(policy.can_move_theme(&actor(2, Role::User, "proposer@a.com"), &jam, &theme));
        assert!(policy.can_move_theme(&actor(9, Role::Admin, "admin@a.com"), &jam, &theme));
        assert!(!policy.can_move_theme(&actor(3, Role::User, "other@a.com"), &jam, &theme));

        assert!(!policy.can_manage_jam(&actor(2, Role::User, "proposer@a.com"), &jam));
    }
}
