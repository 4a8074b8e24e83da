//! In-process user store.

use chrono::Utc;
use dashmap::mapref::entry::Entry;
use dashmap::{DashMap, DashSet};
use rand::Rng;
use tracing::info;
use uuid::Uuid;

use super::{normalize_email, slugify, NewUser, User, UserStore};
use crate::types::{Result, TurnstileError};

/// Accounts held in concurrent maps; nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryUserStore {
    users: DashMap<Uuid, User>,
    by_email: DashMap<String, Uuid>,
    slugs: DashSet<String>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a unique slug derived from `name`.
    fn claim_slug(&self, name: &str) -> Result<String> {
        let base = slugify(name)
            .ok_or_else(|| TurnstileError::BadRequest("name has no usable characters".into()))?;

        if self.slugs.insert(base.clone()) {
            return Ok(base);
        }

        let mut rng = rand::thread_rng();
        loop {
            let candidate = format!("{}-{}", base, rng.gen_range(100_000..1_000_000u32));
            if self.slugs.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait::async_trait]
impl UserStore for MemoryUserStore {
    async fn find_by_credential(&self, email: &str) -> Result<Option<User>> {
        let email = normalize_email(email);
        let Some(id) = self.by_email.get(&email).map(|entry| *entry.value()) else {
            return Ok(None);
        };
        Ok(self.users.get(&id).map(|user| user.clone()))
    }

    async fn find_by_id(&self, id: &Uuid) -> Result<Option<User>> {
        Ok(self.users.get(id).map(|user| user.clone()))
    }

    async fn create(&self, new_user: NewUser) -> Result<User> {
        let email = normalize_email(&new_user.email);
        if email.is_empty() {
            return Err(TurnstileError::BadRequest("email is required".into()));
        }

        // Holding the vacant entry keeps a concurrent registration of the
        // same email out until we are done
        let vacant = match self.by_email.entry(email.clone()) {
            Entry::Occupied(_) => {
                return Err(TurnstileError::Conflict("email already registered".into()))
            }
            Entry::Vacant(vacant) => vacant,
        };

        let slug = self.claim_slug(&new_user.name)?;
        let user = User {
            id: Uuid::new_v4(),
            name: new_user.name.trim().to_string(),
            email,
            birth_date: new_user.birth_date,
            password_hash: new_user.password_hash,
            slug,
            created_at: Utc::now(),
            is_logged_in: true,
        };

        self.users.insert(user.id, user.clone());
        vacant.insert(user.id);

        info!(user_id = %user.id, slug = %user.slug, "User registered");
        Ok(user)
    }

    async fn is_logged_in(&self, id: &Uuid) -> Result<bool> {
        Ok(self
            .users
            .get(id)
            .map(|user| user.is_logged_in)
            .unwrap_or(false))
    }

    async fn set_logged_in(&self, id: &Uuid, logged_in: bool) -> Result<()> {
        let mut user = self
            .users
            .get_mut(id)
            .ok_or_else(|| TurnstileError::NotFound(format!("user {id}")))?;
        user.is_logged_in = logged_in;
        Ok(())
    }
}
