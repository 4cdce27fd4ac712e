//! User Entity
//!
//! The slice of a platform user this core reads and writes: login email,
//! credential, role set and user code.

use chrono::{DateTime, Utc};
use kernel::id::UserId;
use platform::password::HashedPassword;

use crate::domain::value_object::{Email, Role, RoleHierarchy, UserCode};

#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub email: Email,
    pub password_hash: HashedPassword,
    pub roles: Vec<Role>,
    pub user_code: Option<UserCode>,
    /// Free-form country as entered at registration
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        email: Email,
        password_hash: HashedPassword,
        roles: Vec<Role>,
        country: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            user_id: UserId::new(),
            email,
            password_hash,
            roles,
            user_code: None,
            country: country.into(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn highest_role(&self) -> Option<Role> {
        RoleHierarchy::highest(&self.roles)
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }
}
