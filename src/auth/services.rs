use lazy_static::lazy_static;
use regex::Regex;
use tracing::{debug, error, info, warn};

use crate::{
    auth::{
        jwt::JwtKeys,
        password::{hash_password_async, verify_password_async},
        repo::UserStore,
        repo_types::{NewUser, Role, User},
    },
    db::StoreError,
    error::AppError,
};

pub const MIN_PASSWORD_LEN: usize = 8;
const DEFAULT_FIRST_NAME: &str = "User";

pub(crate) fn is_valid_email(email: &str) -> bool {
    lazy_static! {
        static ref EMAIL_RE: Regex = Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").unwrap();
    }
    EMAIL_RE.is_match(email)
}

/// Looks the user up by exact email and checks the password.
///
/// Unknown email and wrong password both yield `Ok(None)`.
pub async fn validate_credentials(
    users: &dyn UserStore,
    email: &str,
    password: &str,
) -> Result<Option<User>, AppError> {
    let Some(user) = users.find_by_email(email).await? else {
        debug!("login unknown email");
        return Ok(None);
    };

    let ok = verify_password_async(password.to_string(), user.password_hash.clone()).await?;
    if !ok {
        debug!(user_id = user.id, "login invalid password");
        return Ok(None);
    }
    Ok(Some(user))
}

/// Signs a session token for the user.
pub fn issue_session(keys: &JwtKeys, user: &User) -> Result<String, AppError> {
    keys.sign(user).map_err(|e| {
        error!(error = %e, "jwt sign failed");
        AppError::Internal(e)
    })
}

#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<Role>,
}

/// Creates an account; fails with `Conflict` if the email is taken.
///
/// The returned record still carries the hash; strip it before it leaves the service.
pub async fn register(users: &dyn UserStore, reg: Registration) -> Result<User, AppError> {
    let email = reg.email.trim().to_string();
    if !is_valid_email(&email) {
        return Err(AppError::BadRequest("Invalid email".into()));
    }
    if reg.password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::BadRequest(format!(
            "Password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }

    if users.find_by_email(&email).await.map_err(internal)?.is_some() {
        warn!("email already registered");
        return Err(email_taken());
    }

    let password_hash = hash_password_async(reg.password).await.map_err(|e| {
        error!(error = %e, "hash_password failed");
        AppError::Internal(e)
    })?;

    let new_user = NewUser {
        email,
        password_hash,
        first_name: reg
            .first_name
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_FIRST_NAME.to_string()),
        last_name: reg.last_name.unwrap_or_default(),
        role: reg.role.unwrap_or(Role::User),
    };

    match users.create(&new_user).await {
        Ok(user) => {
            info!(user_id = user.id, role = user.role.as_str(), "user registered");
            Ok(user)
        }
        // Lost a race with a concurrent registration of the same email.
        Err(StoreError::UniqueViolation(_)) => Err(email_taken()),
        Err(e) => Err(internal(e)),
    }
}

fn email_taken() -> AppError {
    AppError::Conflict("User with this email already exists".into())
}

fn internal(e: StoreError) -> AppError {
    error!(error = %e, "registration storage failure");
    AppError::Internal(anyhow::anyhow!("Failed to register user"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::memory::MemoryStore;

    fn registration(email: &str, password: &str) -> Registration {
        Registration {
            email: email.into(),
            password: password.into(),
            first_name: None,
            last_name: None,
            role: None,
        }
    }

    #[test]
    fn test_is_valid_email() {
        assert!(is_valid_email("user@example.com"));
        assert!(!is_valid_email("user@example"));
        assert!(!is_valid_email("no at sign.com"));
        assert!(!is_valid_email(""));
    }

    #[tokio::test]
    async fn register_applies_defaults() {
        let store = MemoryStore::new();
        let user = register(&store, registration("jane@example.com", "password123"))
            .await
            .unwrap();
        assert_eq!(user.email, "jane@example.com");
        assert_eq!(user.first_name, "User");
        assert_eq!(user.last_name, "");
        assert_eq!(user.role, Role::User);
        assert!(user.is_active);
        assert_ne!(user.password_hash, "password123");
    }

    #[tokio::test]
    async fn second_registration_with_same_email_conflicts() {
        let store = MemoryStore::new();
        register(&store, registration("dup@example.com", "password123"))
            .await
            .unwrap();
        let err = register(&store, registration("dup@example.com", "another-password"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(UserStore::count(&store).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn register_rejects_bad_input() {
        let store = MemoryStore::new();
        let err = register(&store, registration("not-an-email", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
        let err = register(&store, registration("ok@example.com", "short"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn validate_credentials_hides_which_part_was_wrong() {
        let store = MemoryStore::new();
        let created = register(&store, registration("login@example.com", "password123"))
            .await
            .unwrap();

        let ok = validate_credentials(&store, "login@example.com", "password123")
            .await
            .unwrap()
            .expect("correct password");
        assert_eq!(ok.id, created.id);

        let wrong = validate_credentials(&store, "login@example.com", "password124")
            .await
            .unwrap();
        let unknown = validate_credentials(&store, "nobody@example.com", "password123")
            .await
            .unwrap();
        assert!(wrong.is_none());
        assert!(unknown.is_none());
    }

    #[tokio::test]
    async fn email_match_is_case_sensitive() {
        let store = MemoryStore::new();
        register(&store, registration("Case@example.com", "password123"))
            .await
            .unwrap();
        let found = validate_credentials(&store, "case@example.com", "password123")
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn issued_session_carries_user_identity() {
        let store = MemoryStore::new();
        let mut reg = registration("admin@example.com", "password123");
        reg.role = Some(Role::Admin);
        let user = register(&store, reg).await.unwrap();

        let keys = JwtKeys::from_config(&AppConfig::test_default().jwt);
        let token = issue_session(&keys, &user).unwrap();
        let identity = keys.verify(&token).unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.email, user.email);
        assert_eq!(identity.role, Role::Admin);
    }

    /// Store whose email lookup always misses, as if a concurrent insert
    /// landed between the lookup and the write.
    struct LateUniqueCheck(MemoryStore);

    #[async_trait::async_trait]
    impl UserStore for LateUniqueCheck {
        async fn find_by_email(&self, _email: &str) -> Result<Option<User>, StoreError> {
            Ok(None)
        }
        async fn find_by_id(&self, id: i32) -> Result<Option<User>, StoreError> {
            UserStore::find_by_id(&self.0, id).await
        }
        async fn create(&self, user: &NewUser) -> Result<User, StoreError> {
            UserStore::create(&self.0, user).await
        }
        async fn count(&self) -> Result<i64, StoreError> {
            UserStore::count(&self.0).await
        }
    }

    #[tokio::test]
    async fn unique_violation_on_insert_is_conflict() {
        let store = LateUniqueCheck(MemoryStore::new());
        register(&store, registration("race@example.com", "password123"))
            .await
            .unwrap();
        let err = register(&store, registration("race@example.com", "password123"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
        assert_eq!(store.count().await.unwrap(), 1);
    }
}
