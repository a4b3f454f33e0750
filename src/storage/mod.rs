//! Persistence contracts
//!
//! The pipeline owns no entity state. These traits describe exactly what it
//! needs from a persistence engine: finders, mutators, cascade destroyers
//! scoped by actor, and transaction scopes. Implementations translate their
//! backend's failures into [`StoreError`]; nothing below this boundary
//! reaches callers raw.

pub mod in_memory;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::core::error::StoreError;
use crate::core::frame::{Frame, OptionValue};
use crate::core::page::Page;
use crate::core::transaction::{TransactionSource, TxHandle};
use crate::users::model::{OwnershipTransfer, PasswordChange, Role, User};

pub use in_memory::InMemoryStore;

/// Default number of items per browse page.
pub const DEFAULT_PAGE_LIMIT: usize = 20;

/// Query options passed to every store call.
///
/// Built from a validated frame; the `transacting` handle is set by the
/// transactional mutation helper when a call joins an atomic unit.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    pub id: Option<String>,
    pub include: Vec<String>,
    pub filter: Option<String>,
    pub fields: Vec<String>,
    pub limit: Option<usize>,
    pub page: Option<usize>,
    pub order: Option<String>,
    pub status: Option<String>,
    pub debug: bool,
    pub transacting: Option<TxHandle>,
}

impl StoreOptions {
    /// Extract the recognized option vocabulary from a frame.
    pub fn from_frame(frame: &Frame) -> Self {
        let str_option = |name: &str| {
            frame
                .option(name)
                .and_then(OptionValue::as_str)
                .map(str::to_owned)
        };
        let list_option = |name: &str| {
            frame
                .option(name)
                .map(OptionValue::elements)
                .unwrap_or_default()
        };
        let usize_option = |name: &str| {
            frame
                .option(name)
                .and_then(OptionValue::as_int)
                .and_then(|n| usize::try_from(n).ok())
        };

        StoreOptions {
            id: str_option("id"),
            include: list_option("include"),
            filter: str_option("filter"),
            fields: list_option("fields"),
            limit: usize_option("limit"),
            page: usize_option("page"),
            order: str_option("order"),
            status: str_option("status"),
            debug: frame
                .option("debug")
                .and_then(OptionValue::as_bool)
                .unwrap_or(false),
            transacting: None,
        }
    }

    /// Copy of these options joined to a transaction.
    pub fn transacting(&self, tx: TxHandle) -> Self {
        let mut options = self.clone();
        options.transacting = Some(tx);
        options
    }

    /// Copy of these options with the status filter replaced.
    pub fn with_status(&self, status: &str) -> Self {
        let mut options = self.clone();
        options.status = Some(status.to_owned());
        options
    }

    pub fn includes(&self, expansion: &str) -> bool {
        self.include.iter().any(|i| i == expansion)
    }
}

/// Lookup filter for a single user.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserFilter {
    pub id: Option<String>,
    pub slug: Option<String>,
    pub email: Option<String>,
    pub status: Option<String>,
    pub role: Option<String>,
}

impl UserFilter {
    pub fn by_id(id: impl Into<String>) -> Self {
        UserFilter {
            id: Some(id.into()),
            ..UserFilter::default()
        }
    }

    /// Build a filter from a submitted record, honoring only the declared
    /// lookup fields.
    pub fn from_record(record: &Value, lookup: &[&str]) -> Self {
        let field = |name: &str| {
            if !lookup.contains(&name) {
                return None;
            }
            record.get(name).and_then(Value::as_str).map(str::to_owned)
        };
        UserFilter {
            id: field("id"),
            slug: field("slug"),
            email: field("email"),
            status: field("status"),
            role: field("role"),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.id.is_none()
            && self.slug.is_none()
            && self.email.is_none()
            && self.status.is_none()
            && self.role.is_none()
    }
}

/// Result of an edit: the post-mutation snapshot plus whether anything
/// actually changed.
#[derive(Debug, Clone)]
pub struct EditOutcome {
    pub user: User,
    pub changed: bool,
}

/// Finders and mutators for the user resource.
#[async_trait]
pub trait UserStore: TransactionSource {
    /// Page through users.
    async fn find_page(&self, options: &StoreOptions) -> Result<Page<User>, StoreError>;

    /// Find a single user matching the filter.
    async fn find_one(
        &self,
        filter: &UserFilter,
        options: &StoreOptions,
    ) -> Result<Option<User>, StoreError>;

    /// Apply a patch record to the user named by `options.id`.
    ///
    /// Returns `None` when the target does not exist. The outcome reflects
    /// committed post-mutation state.
    async fn edit(
        &self,
        patch: &Value,
        options: &StoreOptions,
    ) -> Result<Option<EditOutcome>, StoreError>;

    /// Remove the user named by `options.id`.
    async fn destroy(&self, options: &StoreOptions) -> Result<(), StoreError>;

    /// Verify and replace a user's password.
    async fn change_password(
        &self,
        payload: &PasswordChange,
        options: &StoreOptions,
    ) -> Result<(), StoreError>;

    /// Move the Owner role to the user named by the payload.
    async fn transfer_ownership(
        &self,
        payload: &OwnershipTransfer,
        options: &StoreOptions,
    ) -> Result<(), StoreError>;
}

/// Issued-token finders and destroyers, scoped by actor.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn destroy_access_tokens_by_user(&self, options: &StoreOptions)
        -> Result<(), StoreError>;

    async fn destroy_refresh_tokens_by_user(
        &self,
        options: &StoreOptions,
    ) -> Result<(), StoreError>;
}

/// Authored-content finders and destroyers, scoped by author.
#[async_trait]
pub trait PostStore: Send + Sync {
    async fn destroy_by_author(&self, options: &StoreOptions) -> Result<(), StoreError>;

    async fn count_by_author(
        &self,
        author: &Uuid,
        options: &StoreOptions,
    ) -> Result<usize, StoreError>;
}

/// Role lookup, used when an action assigns a specific role.
#[async_trait]
pub trait RoleStore: Send + Sync {
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, StoreError>;
}
