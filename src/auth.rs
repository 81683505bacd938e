//! Authentication module.

use crate::db::{Database, Profile, Session, User, now_timestamp};
use crate::error::{AppError, Result};
use argon2::{
    Argon2,
    password_hash::{
        PasswordHash, PasswordHasher, PasswordVerifier, SaltString,
        rand_core::{OsRng, RngCore},
    },
};
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

/// Message shown for every failed sign-in.
pub const SIGN_IN_FAILED: &str = "Login failed, please check your credentials and try again.";

/// Minimum password length accepted at registration.
pub const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password using Argon2.
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Verify a password against a hash.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| AppError::Internal(format!("Invalid password hash: {}", e)))?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Generate a secure random token.
pub fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty() && !domain.is_empty() && !domain.contains('@')
        }
        None => false,
    }
}

/// Email/password identity provider.
pub struct AuthService {
    db: Database,
    session_duration_days: u32,
    registration_enabled: bool,
}

impl AuthService {
    /// Create a new auth service.
    pub fn new(db: Database, session_duration_days: u32, registration_enabled: bool) -> Self {
        Self {
            db,
            session_duration_days,
            registration_enabled,
        }
    }

    /// Create an account and its profile document.
    pub fn register(&self, username: &str, email: &str, password: &str) -> Result<User> {
        if !self.registration_enabled {
            return Err(AppError::InvalidInput(
                "Registration is disabled".to_string(),
            ));
        }

        let username = username.trim();
        if username.is_empty() || username.chars().count() > 64 {
            return Err(AppError::InvalidInput(
                "Username must be 1-64 characters".to_string(),
            ));
        }

        let email = normalize_email(email);
        if !valid_email(&email) {
            return Err(AppError::InvalidInput(format!(
                "'{}' is not a valid email address",
                email
            )));
        }

        if password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AppError::InvalidInput(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }

        let user = User {
            id: uuid::Uuid::new_v4().to_string(),
            email: email.clone(),
            password_hash: hash_password(password)?,
            created_at: now_timestamp(),
            last_login: None,
        };

        self.db.create_user(&user)?;

        let profile = Profile {
            user_id: user.id.clone(),
            username: username.to_string(),
            email,
        };
        if let Err(e) = self.db.save_profile(&profile) {
            // Never leave an account without its profile document.
            tracing::warn!(user_id = %user.id, error = %e, "Profile write failed, rolling back account");
            if let Err(rollback) = self.db.delete_user(&user.id) {
                tracing::error!(user_id = %user.id, error = %rollback, "Account rollback failed");
            }
            return Err(e);
        }

        tracing::info!(user_id = %user.id, "Account registered");
        Ok(user)
    }

    /// Sign in and create a session.
    pub fn sign_in(&self, email: &str, password: &str) -> Result<Session> {
        let email = normalize_email(email);
        let failed = || AppError::Auth(SIGN_IN_FAILED.to_string());

        let user = match self.db.get_user_by_email(&email) {
            Ok(Some(user)) => user,
            Ok(None) => return Err(failed()),
            Err(e) => {
                tracing::warn!(error = %e, "User lookup failed during sign-in");
                return Err(failed());
            }
        };

        if !verify_password(password, &user.password_hash).unwrap_or(false) {
            return Err(failed());
        }

        let session = Session {
            token: generate_token(),
            user_id: user.id.clone(),
            email: user.email.clone(),
            expires_at: now_timestamp() + (self.session_duration_days as i64 * 24 * 60 * 60),
        };

        let created = self
            .db
            .update_user_last_login(&user.id)
            .and_then(|_| self.db.create_session(&session));
        if let Err(e) = created {
            tracing::warn!(user_id = %user.id, error = %e, "Session creation failed");
            return Err(failed());
        }

        tracing::info!(user_id = %user.id, "Signed in");
        Ok(session)
    }

    /// Resume a session from its token, if still valid.
    pub fn restore(&self, token: &str) -> Result<Option<Session>> {
        let session = match self.db.get_session(token)? {
            Some(s) => s,
            None => return Ok(None),
        };

        // Check expiration
        if session.expires_at < now_timestamp() {
            self.db.delete_session(token)?;
            return Ok(None);
        }

        Ok(Some(session))
    }

    /// Sign out (delete session).
    pub fn sign_out(&self, session: &Session) -> Result<()> {
        tracing::info!(user_id = %session.user_id, "Signed out");
        self.db.delete_session(&session.token)
    }

    /// Delete the signed-in account and everything it owns.
    pub fn delete_account(&self, session: &Session) -> Result<()> {
        if !self.db.delete_user(&session.user_id)? {
            return Err(AppError::NotFound(format!("User {}", session.user_id)));
        }
        tracing::info!(user_id = %session.user_id, "Account deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> AuthService {
        AuthService::new(Database::open_memory().unwrap(), 30, true)
    }

    #[test]
    fn test_password_hash_and_verify() {
        let password = "test_password_123";
        let hash = hash_password(password).unwrap();

        assert!(verify_password(password, &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_generate_token() {
        let token1 = generate_token();
        let token2 = generate_token();

        assert_eq!(token1.len(), 43); // Base64 of 32 bytes
        assert_ne!(token1, token2);
    }

    #[test]
    fn register_writes_profile() {
        let auth = service();
        let user = auth.register("reader", "Reader@Example.com", "secret1").unwrap();
        assert_eq!(user.email, "reader@example.com");

        let profile = auth.db.get_profile(&user.id).unwrap().unwrap();
        assert_eq!(profile.username, "reader");
        assert_eq!(profile.email, "reader@example.com");
    }

    #[test]
    fn register_validation() {
        let auth = service();
        assert!(auth.register("", "a@b.c", "secret1").is_err());
        assert!(auth.register("u", "not-an-email", "secret1").is_err());
        assert!(auth.register("u", "a@b.c", "short").is_err());

        auth.register("u", "a@b.c", "secret1").unwrap();
        assert!(matches!(
            auth.register("v", "A@B.C", "secret2"),
            Err(AppError::InvalidInput(_))
        ));
    }

    #[test]
    fn registration_disabled() {
        let auth = AuthService::new(Database::open_memory().unwrap(), 30, false);
        assert!(auth.register("u", "a@b.c", "secret1").is_err());
    }

    #[test]
    fn failed_profile_write_rolls_back_account() {
        let auth = service();
        auth.db
            .execute_batch(
                "CREATE TRIGGER reject_profiles BEFORE INSERT ON profiles
                 BEGIN SELECT RAISE(ABORT, 'profiles unavailable'); END;",
            )
            .unwrap();

        assert!(auth.register("u", "a@b.c", "secret1").is_err());
        assert!(auth.db.get_user_by_email("a@b.c").unwrap().is_none());

        auth.db.execute_batch("DROP TRIGGER reject_profiles;").unwrap();
        assert!(auth.register("u", "a@b.c", "secret1").is_ok());
    }

    #[test]
    fn sign_in_failures_share_one_message() {
        let auth = service();
        auth.register("u", "a@b.c", "secret1").unwrap();

        for (email, password) in [("a@b.c", "wrong-pass"), ("nobody@b.c", "secret1")] {
            match auth.sign_in(email, password) {
                Err(AppError::Auth(msg)) => assert_eq!(msg, SIGN_IN_FAILED),
                other => panic!("expected auth failure, got {:?}", other),
            }
        }
    }

    #[test]
    fn sign_in_restore_sign_out() {
        let auth = service();
        let user = auth.register("u", "a@b.c", "secret1").unwrap();

        let session = auth.sign_in("a@b.c", "secret1").unwrap();
        assert_eq!(session.user_id, user.id);

        let restored = auth.restore(&session.token).unwrap().unwrap();
        assert_eq!(restored, session);

        auth.sign_out(&session).unwrap();
        assert!(auth.restore(&session.token).unwrap().is_none());
    }

    #[test]
    fn expired_session_is_dropped() {
        let auth = service();
        auth.register("u", "a@b.c", "secret1").unwrap();
        let mut session = auth.sign_in("a@b.c", "secret1").unwrap();
        auth.db.delete_session(&session.token).unwrap();

        session.expires_at = now_timestamp() - 10;
        auth.db.create_session(&session).unwrap();

        assert!(auth.restore(&session.token).unwrap().is_none());
        assert!(auth.db.get_session(&session.token).unwrap().is_none());
    }

    #[test]
    fn delete_account_removes_everything() {
        let auth = service();
        let user = auth.register("u", "a@b.c", "secret1").unwrap();
        let session = auth.sign_in("a@b.c", "secret1").unwrap();

        auth.delete_account(&session).unwrap();
        assert!(auth.db.get_user_by_id(&user.id).unwrap().is_none());
        assert!(auth.db.get_profile(&user.id).unwrap().is_none());
        assert!(auth.restore(&session.token).unwrap().is_none());
        assert!(auth.sign_in("a@b.c", "secret1").is_err());
        assert!(auth.delete_account(&session).is_err());
    }
}
