use argon2::{
    password_hash::{Encoding, SaltString},
    Argon2, PasswordHash, PasswordHasher, PasswordVerifier,
};
use chrono::{Duration, Utc};
use log::{info, warn};
use rand::rngs::OsRng;
use thiserror::Error;

use crate::{
    util::random_string, Actor, CollabContext, DatabaseError, NewSession, NewUser, Role,
    SessionData, SharedDatabase, UserData,
};

pub struct Auth {
    db: SharedDatabase,
    argon: Argon2<'static>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    /// Email or password is incorrect
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The session doesn't exist or has expired
    #[error("Not authenticated")]
    Unauthenticated,
    #[error("Missing {0}")]
    Missing(&'static str),
    #[error("An account with that email already exists")]
    EmailTaken,
    /// Something else went wrong with the database
    #[error(transparent)]
    Db(DatabaseError),
    #[error("HashError: {0}")]
    HashError(String),
}

impl Auth {
    const SESSION_DURATION_IN_DAYS: i64 = 7;
    const TOKEN_LENGTH: usize = 32;

    pub fn new(context: &CollabContext) -> Self {
        Self {
            db: context.database.clone(),
            argon: Argon2::default(),
        }
    }

    /// Logs in a user, returning a new session
    pub async fn login(&self, credentials: Credentials) -> Result<SessionData, AuthError> {
        self.clear_expired().await;

        let user = self
            .db
            .user_by_email(credentials.email.trim())
            .await
            .map_err(|e| match e {
                DatabaseError::NotFound { .. } => AuthError::InvalidCredentials,
                err => AuthError::Db(err),
            })?;

        // Accounts created through other providers have no password to log in with
        let password = user.password.as_ref().ok_or(AuthError::InvalidCredentials)?;

        let stored_password = PasswordHash::parse(password, Encoding::default())
            .map_err(|e| AuthError::HashError(e.to_string()))?;

        self.argon
            .verify_password(credentials.password.as_bytes(), &stored_password)
            .map_err(|_| AuthError::InvalidCredentials)?;

        let expires_at = Utc::now() + Duration::days(Self::SESSION_DURATION_IN_DAYS);

        let new_session = NewSession {
            token: random_string(Self::TOKEN_LENGTH),
            user_id: user.id,
            expires_at,
        };

        let session = self
            .db
            .create_session(new_session)
            .await
            .map_err(AuthError::Db)?;

        info!("{} logged in", session.user.name);
        Ok(session)
    }

    /// Deletes the associated session, if it exists
    pub async fn logout(&self, token: &str) -> Result<(), AuthError> {
        match self.db.delete_session_by_token(token).await {
            Ok(_) | Err(DatabaseError::NotFound { .. }) => Ok(()),
            Err(e) => Err(AuthError::Db(e)),
        }
    }

    /// Creates an account that logs in with email and password
    pub async fn register(&self, new_account: NewAccount) -> Result<UserData, AuthError> {
        let name = new_account.name.trim();
        let email = new_account.email.trim().to_lowercase();

        if name.is_empty() {
            return Err(AuthError::Missing("name"));
        }

        if email.is_empty() {
            return Err(AuthError::Missing("email"));
        }

        if new_account.password.is_empty() {
            return Err(AuthError::Missing("password"));
        }

        let salt = SaltString::generate(&mut OsRng);
        let hashed_password = self
            .argon
            .hash_password(new_account.password.as_bytes(), &salt)
            .map_err(|e| AuthError::HashError(e.to_string()))?
            .to_string();

        let user = self
            .db
            .create_user(NewUser {
                name: name.to_string(),
                email: Some(email),
                password: Some(hashed_password),
                role: Role::User,
            })
            .await
            .map_err(|e| match e {
                DatabaseError::Conflict { .. } => AuthError::EmailTaken,
                err => AuthError::Db(err),
            })?;

        info!("Registered {} ({})", user.name, user.id);
        Ok(user)
    }

    /// Returns a session if it exists and hasn't expired
    pub async fn session(&self, token: &str) -> Result<SessionData, AuthError> {
        self.db.session_by_token(token).await.map_err(|e| match e {
            DatabaseError::NotFound { .. } => AuthError::Unauthenticated,
            err => AuthError::Db(err),
        })
    }

    /// Resolves the actor behind a session token
    pub async fn actor(&self, token: &str) -> Result<Actor, AuthError> {
        let session = self.session(token).await?;
        Ok(Actor::from(&session.user))
    }

    async fn clear_expired(&self) {
        if let Err(e) = self.db.clear_expired_sessions().await {
            warn!("Could not clear expired sessions: {}", e);
        }
    }
}

#[derive(Debug)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Debug)]
pub struct NewAccount {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{test::Harness, Database};

    fn account(email: &str) -> NewAccount {
        NewAccount {
            name: "Ana".to_string(),
            email: email.to_string(),
            password: "supersecret".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_and_login() {
        let harness = Harness::new();
        let auth = &harness.collab.auth;

        let user = auth.register(account(" Ana@Example.com ")).await.unwrap();
        assert_eq!(user.email.as_deref(), Some("ana@example.com"));
        assert_ne!(user.password.as_deref(), Some("supersecret"));

        let session = auth
            .login(Credentials {
                email: "ana@example.com".to_string(),
                password: "supersecret".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(session.token.len(), 32);
        assert!(session.expires_at > Utc::now() + Duration::days(6));

        let actor = auth.actor(&session.token).await.unwrap();
        assert_eq!(actor.id, user.id);

        auth.logout(&session.token).await.unwrap();
        assert!(matches!(
            auth.session(&session.token).await,
            Err(AuthError::Unauthenticated)
        ));
    }

    #[tokio::test]
    async fn test_rejects_bad_credentials() {
        let harness = Harness::new();
        let auth = &harness.collab.auth;

        auth.register(account("ana@example.com")).await.unwrap();

        let wrong_password = auth
            .login(Credentials {
                email: "ana@example.com".to_string(),
                password: "nope".to_string(),
            })
            .await;
        assert!(matches!(wrong_password, Err(AuthError::InvalidCredentials)));

        let unknown = auth
            .login(Credentials {
                email: "nobody@example.com".to_string(),
                password: "supersecret".to_string(),
            })
            .await;
        assert!(matches!(unknown, Err(AuthError::InvalidCredentials)));

        // Users without a password can't log in with credentials
        harness.user("Bob").await;
        let passwordless = auth
            .login(Credentials {
                email: "bob@example.com".to_string(),
                password: "".to_string(),
            })
            .await;
        assert!(matches!(passwordless, Err(AuthError::InvalidCredentials)));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let harness = Harness::new();
        let auth = &harness.collab.auth;

        auth.register(account("ana@example.com")).await.unwrap();

        assert!(matches!(
            auth.register(account("ANA@example.com")).await,
            Err(AuthError::EmailTaken)
        ));
        assert!(matches!(
            auth.register(account("   ")).await,
            Err(AuthError::Missing("email"))
        ));

        let users = harness.database.row_counts()["users"];
        assert_eq!(users, 1);
        assert!(harness.database.user_by_email("ana@example.com").await.is_ok());
    }
}
