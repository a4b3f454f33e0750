//! User resource models and mutation payloads
//!
//! These are snapshots owned by persistence; the pipeline only passes
//! identifiers and filters around and receives copies back.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Lifecycle status of a user account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
    Locked,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
            UserStatus::Locked => "locked",
        }
    }

    /// Parse a submitted status value. `all` is a filter-only pseudo-status
    /// and is not a valid account state.
    pub fn parse(value: &str) -> Option<UserStatus> {
        match value {
            "active" => Some(UserStatus::Active),
            "inactive" => Some(UserStatus::Inactive),
            "locked" => Some(UserStatus::Locked),
            _ => None,
        }
    }
}

impl std::fmt::Display for UserStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password: String,
    pub status: UserStatus,
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(
        name: impl Into<String>,
        slug: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: name.into(),
            slug: slug.into(),
            email: email.into(),
            password: password.into(),
            status: UserStatus::Active,
            roles: Vec::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn with_roles(mut self, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.roles = roles.into_iter().map(Into::into).collect();
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Full serialization (password excluded).
    pub fn to_json(&self) -> Value {
        json!({
            "id": self.id,
            "name": self.name,
            "slug": self.slug,
            "email": self.email,
            "status": self.status,
            "roles": self.roles,
            "created_at": self.created_at,
            "updated_at": self.updated_at,
        })
    }

    /// The restricted read projection: id, slug, status, email, and
    /// role-derived data only.
    pub fn read_view(&self) -> Value {
        json!({
            "id": self.id,
            "slug": self.slug,
            "status": self.status,
            "email": self.email,
            "roles": self.roles,
        })
    }
}

/// A named role assignable to users.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Role {
    pub id: Uuid,
    pub name: String,
    pub description: String,
}

impl Role {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Role {
            id: Uuid::new_v4(),
            name: name.into(),
            description: description.into(),
        }
    }
}

/// An issued API access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires: DateTime<Utc>,
}

/// An issued refresh token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshToken {
    pub id: Uuid,
    pub token: String,
    pub user_id: Uuid,
    pub expires: DateTime<Utc>,
}

/// A piece of authored content referencing its author.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: Uuid,
    pub title: String,
    pub author_id: Uuid,
    pub status: String,
}

/// Submitted payload for a password change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChange {
    pub user_id: String,
    pub old_password: String,
    pub new_password: String,
    pub ne2_password: String,
}

/// Submitted payload for an ownership transfer: the user receiving the
/// Owner role.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OwnershipTransfer {
    pub id: String,
}
