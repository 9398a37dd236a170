use log::info;

use crate::{
    errors::PersistenceContext, jams::non_empty, AccessPolicy, Actor, CollabContext, CollabError,
    CollabResult, PrimaryKey, Role, UpdatedProfile, UserData,
};

pub struct ProfileManager {
    context: CollabContext,
}

/// Profile fields a user can change. [None] leaves the field as is.
#[derive(Debug, Default, Clone)]
pub struct ProfileFields {
    pub name: Option<String>,
    pub city: Option<String>,
    pub instrument: Option<String>,
    pub instagram: Option<String>,
    pub youtube: Option<String>,
    pub website: Option<String>,
    pub bio: Option<String>,
    pub image: Option<String>,
}

impl ProfileManager {
    pub fn new(context: &CollabContext) -> Self {
        Self {
            context: context.clone(),
        }
    }

    pub async fn profile(&self, user_id: PrimaryKey) -> CollabResult<UserData> {
        self.context
            .database
            .user_by_id(user_id)
            .await
            .context("fetching profile")
    }

    /// Updates the actor's own profile
    pub async fn update(&self, actor: &Actor, fields: ProfileFields) -> CollabResult<UserData> {
        let name = fields
            .name
            .map(|name| {
                non_empty(Some(name)).ok_or(CollabError::Invalid(
                    "El nombre no puede estar vacío".to_string(),
                ))
            })
            .transpose()?;

        self.context
            .database
            .update_profile(UpdatedProfile {
                id: actor.id,
                name,
                city: fields.city,
                instrument: fields.instrument,
                instagram: fields.instagram,
                youtube: fields.youtube,
                website: fields.website,
                bio: fields.bio,
                image: fields.image,
            })
            .await
            .context("updating profile")
    }

    /// Changes the role of a user. Only admins may do this.
    pub async fn set_role(
        &self,
        actor: &Actor,
        user_id: PrimaryKey,
        role: Role,
    ) -> CollabResult<UserData> {
        AccessPolicy::ensure(self.context.policy.is_admin(actor))?;

        let user = self
            .context
            .database
            .set_user_role(user_id, role)
            .await
            .context("setting role")?;

        info!("{} is now {} (changed by {})", user.name, role, actor.id);
        Ok(user)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::test::Harness;

    #[tokio::test]
    async fn test_update_own_profile() {
        let harness = Harness::new();
        let ana = harness.user("Ana").await;
        let profiles = &harness.collab.profiles;

        let updated = profiles
            .update(
                &ana,
                ProfileFields {
                    city: Some("Sevilla".to_string()),
                    instrument: Some("Contrabajo".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "Ana");
        assert_eq!(updated.profile.city.as_deref(), Some("Sevilla"));
        assert_eq!(updated.profile.instrument.as_deref(), Some("Contrabajo"));

        let blank_name = profiles
            .update(
                &ana,
                ProfileFields {
                    name: Some(" ".to_string()),
                    ..Default::default()
                },
            )
            .await;
        assert!(matches!(blank_name, Err(CollabError::Invalid(_))));

        let fetched = profiles.profile(ana.id).await.unwrap();
        assert_eq!(fetched.profile.city.as_deref(), Some("Sevilla"));
    }

    #[tokio::test]
    async fn test_only_admins_set_roles() {
        let harness = Harness::new();
        let ana = harness.user("Ana").await;
        let bob = harness.user("Bob").await;
        let boss = Actor {
            email: Some("boss@tocatocar.com".to_string()),
            ..harness.user("Boss").await
        };
        let profiles = &harness.collab.profiles;

        assert!(matches!(
            profiles.set_role(&ana, bob.id, Role::Admin).await,
            Err(CollabError::Unauthorized)
        ));

        let promoted = profiles.set_role(&boss, ana.id, Role::Admin).await.unwrap();
        assert_eq!(promoted.role, Role::Admin);
    }
}
