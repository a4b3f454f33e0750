//! Acting identity carried by every frame
//!
//! The pipeline never interprets the context itself; it is handed to the
//! permission gate, which decides what the actor may do.

use uuid::Uuid;

/// Identity and scope of the actor behind one invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ActorContext {
    /// An authenticated user with its granted role names
    User { id: Uuid, roles: Vec<String> },

    /// Internal (service-to-service) invocation
    Internal,

    /// No established identity
    Anonymous,
}

impl ActorContext {
    /// Build a user context from an id and role names.
    pub fn user(id: Uuid, roles: impl IntoIterator<Item = impl Into<String>>) -> Self {
        ActorContext::User {
            id,
            roles: roles.into_iter().map(Into::into).collect(),
        }
    }

    /// Get the acting user id, if any.
    pub fn actor_id(&self) -> Option<Uuid> {
        match self {
            ActorContext::User { id, .. } => Some(*id),
            _ => None,
        }
    }

    /// Check whether the actor holds a role.
    pub fn has_role(&self, role: &str) -> bool {
        match self {
            ActorContext::User { roles, .. } => roles.iter().any(|r| r == role),
            _ => false,
        }
    }

    /// Check if this is an internal invocation.
    pub fn is_internal(&self) -> bool {
        matches!(self, ActorContext::Internal)
    }
}
