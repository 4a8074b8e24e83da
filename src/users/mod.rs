//! User accounts as seen by the session layer
//!
//! The session protocol needs very little from account storage: lookup by
//! email or ID, creation, and the logged-in flag that gates liveness. Any
//! backend implementing [`UserStore`] can be plugged in; [`MemoryUserStore`]
//! serves development and tests.

pub mod memory;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::types::Result;

pub use memory::MemoryUserStore;

/// A registered account.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub birth_date: NaiveDate,
    /// Argon2id PHC string
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Public profile identifier, carried in tokens as `userSlug`
    pub slug: String,
    pub created_at: DateTime<Utc>,
    pub is_logged_in: bool,
}

/// Account data for registration; the password is already hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub birth_date: NaiveDate,
    pub password_hash: String,
}

/// Account storage used by the session protocol.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Look up an account by email, case-insensitively.
    async fn find_by_credential(&self, email: &str) -> Result<Option<User>>;

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>>;

    /// Register an account. New accounts start logged in.
    ///
    /// Fails with `Conflict` if the email is taken.
    async fn create(&self, new_user: NewUser) -> Result<User>;

    async fn is_logged_in(&self, id: &Uuid) -> Result<bool>;

    async fn set_logged_in(&self, id: &Uuid, logged_in: bool) -> Result<()>;
}

/// Normalize an email for lookup.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// URL-safe slug from a display name: lowercase ASCII letters and digits
/// separated by single hyphens. `None` if nothing usable remains.
pub fn slugify(name: &str) -> Option<String> {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            pending_hyphen = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_hyphen = true;
        }
    }

    (!slug.is_empty()).then_some(slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("Ada Lovelace").as_deref(), Some("ada-lovelace"));
        assert_eq!(slugify("  Grace   B. Hopper!! ").as_deref(), Some("grace-b-hopper"));
        assert_eq!(slugify("R2-D2").as_deref(), Some("r2-d2"));
        assert_eq!(slugify("---"), None);
        assert_eq!(slugify(""), None);
    }

    #[test]
    fn test_normalize_email() {
        assert_eq!(normalize_email("  Ada@Example.COM "), "ada@example.com");
    }

    #[test]
    fn test_password_hash_not_serialized() {
        let user = User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            birth_date: NaiveDate::from_ymd_opt(1990, 12, 10).unwrap(),
            password_hash: "$argon2id$secret".into(),
            slug: "ada".into(),
            created_at: Utc::now(),
            is_logged_in: true,
        };
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"birthDate\":\"1990-12-10\""));
    }
}
