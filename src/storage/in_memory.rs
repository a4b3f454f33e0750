//! In-memory implementation of the store contracts
//!
//! Useful for testing and development. All entity families live behind one
//! `RwLock`; transactions stage a full snapshot of committed state, so a
//! unit of work either replaces committed state wholesale at commit or is
//! discarded at rollback.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::Value;
use uuid::Uuid;

use crate::core::error::StoreError;
use crate::core::page::{Page, PageMeta};
use crate::core::transaction::{TransactionSource, TxHandle};
use crate::storage::{
    EditOutcome, PostStore, RoleStore, StoreOptions, TokenStore, UserFilter, UserStore,
    DEFAULT_PAGE_LIMIT,
};
use crate::users::model::{
    AccessToken, OwnershipTransfer, PasswordChange, Post, RefreshToken, Role, User, UserStatus,
};
use crate::users::{ADMINISTRATOR_ROLE, OWNER_ROLE};

#[derive(Debug, Clone, Default)]
struct State {
    users: Vec<User>,
    roles: Vec<Role>,
    access_tokens: Vec<AccessToken>,
    refresh_tokens: Vec<RefreshToken>,
    posts: Vec<Post>,
}

/// Entity counts, handy for atomicity assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreCounts {
    pub users: usize,
    pub roles: usize,
    pub access_tokens: usize,
    pub refresh_tokens: usize,
    pub posts: usize,
}

/// In-memory store backing every persistence contract.
#[derive(Default)]
pub struct InMemoryStore {
    committed: RwLock<State>,
    staged: RwLock<HashMap<TxHandle, State>>,
}

fn poisoned<T>(_: T) -> StoreError {
    StoreError::Backend("state lock poisoned".to_owned())
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state<R>(
        &self,
        options: &StoreOptions,
        f: impl FnOnce(&State) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        match options.transacting {
            Some(tx) => {
                let staged = self.staged.read().map_err(poisoned)?;
                let state = staged.get(&tx).ok_or(StoreError::UnknownTransaction)?;
                f(state)
            }
            None => {
                let state = self.committed.read().map_err(poisoned)?;
                f(&state)
            }
        }
    }

    fn write_state<R>(
        &self,
        options: &StoreOptions,
        f: impl FnOnce(&mut State) -> Result<R, StoreError>,
    ) -> Result<R, StoreError> {
        match options.transacting {
            Some(tx) => {
                let mut staged = self.staged.write().map_err(poisoned)?;
                let state = staged.get_mut(&tx).ok_or(StoreError::UnknownTransaction)?;
                f(state)
            }
            None => {
                let mut state = self.committed.write().map_err(poisoned)?;
                f(&mut state)
            }
        }
    }

    // --- seeding and inspection (committed state) ---

    pub fn seed_user(&self, user: User) -> Result<(), StoreError> {
        self.committed.write().map_err(poisoned)?.users.push(user);
        Ok(())
    }

    pub fn seed_role(&self, role: Role) -> Result<(), StoreError> {
        self.committed.write().map_err(poisoned)?.roles.push(role);
        Ok(())
    }

    pub fn seed_access_token(&self, token: AccessToken) -> Result<(), StoreError> {
        self.committed
            .write()
            .map_err(poisoned)?
            .access_tokens
            .push(token);
        Ok(())
    }

    pub fn seed_refresh_token(&self, token: RefreshToken) -> Result<(), StoreError> {
        self.committed
            .write()
            .map_err(poisoned)?
            .refresh_tokens
            .push(token);
        Ok(())
    }

    pub fn seed_post(&self, post: Post) -> Result<(), StoreError> {
        self.committed.write().map_err(poisoned)?.posts.push(post);
        Ok(())
    }

    /// Committed snapshot of one user.
    pub fn committed_user(&self, id: &Uuid) -> Result<Option<User>, StoreError> {
        let state = self.committed.read().map_err(poisoned)?;
        Ok(state.users.iter().find(|u| u.id == *id).cloned())
    }

    /// Committed entity counts.
    pub fn counts(&self) -> Result<StoreCounts, StoreError> {
        let state = self.committed.read().map_err(poisoned)?;
        Ok(StoreCounts {
            users: state.users.len(),
            roles: state.roles.len(),
            access_tokens: state.access_tokens.len(),
            refresh_tokens: state.refresh_tokens.len(),
            posts: state.posts.len(),
        })
    }
}

fn matches_filter(user: &User, filter: &UserFilter) -> bool {
    let field = |expected: &Option<String>, actual: &str| {
        expected.as_deref().is_none_or(|value| value == actual)
    };
    field(&filter.id, &user.id.to_string())
        && field(&filter.slug, &user.slug)
        && field(&filter.email, &user.email)
        && field(&filter.status, user.status.as_str())
        && filter
            .role
            .as_deref()
            .is_none_or(|role| user.has_role(role))
}

fn matches_status(user: &User, status: Option<&str>) -> bool {
    match status {
        None | Some("all") => true,
        Some(status) => user.status.as_str() == status,
    }
}

/// `field:value` exact-match filter over name, slug, email and status.
fn matches_free_filter(user: &User, filter: &str) -> bool {
    let Some((field, value)) = filter.split_once(':') else {
        return true;
    };
    match field.trim() {
        "name" => user.name == value.trim(),
        "slug" => user.slug == value.trim(),
        "email" => user.email == value.trim(),
        "status" => user.status.as_str() == value.trim(),
        _ => true,
    }
}

fn apply_order(users: &mut [User], order: &str) {
    let mut parts = order.split_whitespace();
    let field = parts.next().unwrap_or("created_at");
    let descending = parts.next().is_some_and(|dir| dir.eq_ignore_ascii_case("desc"));
    match field {
        "name" => users.sort_by(|a, b| a.name.cmp(&b.name)),
        "slug" => users.sort_by(|a, b| a.slug.cmp(&b.slug)),
        "email" => users.sort_by(|a, b| a.email.cmp(&b.email)),
        _ => users.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
    }
    if descending {
        users.reverse();
    }
}

/// Apply a patch record to a user. Returns whether anything changed.
fn apply_patch(user: &mut User, patch: &Value) -> Result<bool, StoreError> {
    let Some(fields) = patch.as_object() else {
        return Err(StoreError::Constraint(
            "edit patch must be an object".to_owned(),
        ));
    };
    let mut changed = false;

    for (field, value) in fields {
        match field.as_str() {
            "name" | "slug" | "email" => {
                let Some(value) = value.as_str() else {
                    return Err(StoreError::Constraint(format!("{field} must be a string")));
                };
                let slot = match field.as_str() {
                    "name" => &mut user.name,
                    "slug" => &mut user.slug,
                    _ => &mut user.email,
                };
                if slot.as_str() != value {
                    *slot = value.to_owned();
                    changed = true;
                }
            }
            "status" => {
                let status = value
                    .as_str()
                    .and_then(UserStatus::parse)
                    .ok_or_else(|| StoreError::Constraint(format!("invalid status `{value}`")))?;
                if user.status != status {
                    user.status = status;
                    changed = true;
                }
            }
            "roles" => {
                let roles: Vec<String> = value
                    .as_array()
                    .map(|items| {
                        items
                            .iter()
                            .filter_map(Value::as_str)
                            .map(str::to_owned)
                            .collect()
                    })
                    .ok_or_else(|| {
                        StoreError::Constraint("roles must be an array of names".to_owned())
                    })?;
                if user.roles != roles {
                    user.roles = roles;
                    changed = true;
                }
            }
            // unknown patch fields are ignored, matching lenient edit inputs
            _ => {}
        }
    }

    if changed {
        user.updated_at = chrono::Utc::now();
    }
    Ok(changed)
}

#[async_trait]
impl UserStore for InMemoryStore {
    async fn find_page(&self, options: &StoreOptions) -> Result<Page<User>, StoreError> {
        let limit = options.limit.unwrap_or(DEFAULT_PAGE_LIMIT).max(1);
        let page = options.page.unwrap_or(1).max(1);

        self.read_state(options, |state| {
            let mut users: Vec<User> = state
                .users
                .iter()
                .filter(|user| matches_status(user, options.status.as_deref()))
                .filter(|user| {
                    options
                        .filter
                        .as_deref()
                        .is_none_or(|f| matches_free_filter(user, f))
                })
                .cloned()
                .collect();
            if let Some(order) = options.order.as_deref() {
                apply_order(&mut users, order);
            }

            let total = users.len();
            let items = users
                .into_iter()
                .skip((page - 1) * limit)
                .take(limit)
                .collect();
            Ok(Page {
                items,
                meta: PageMeta::new(page, limit, total),
            })
        })
    }

    async fn find_one(
        &self,
        filter: &UserFilter,
        options: &StoreOptions,
    ) -> Result<Option<User>, StoreError> {
        self.read_state(options, |state| {
            Ok(state
                .users
                .iter()
                .find(|user| matches_filter(user, filter))
                .cloned())
        })
    }

    async fn edit(
        &self,
        patch: &Value,
        options: &StoreOptions,
    ) -> Result<Option<EditOutcome>, StoreError> {
        let id = options
            .id
            .clone()
            .ok_or_else(|| StoreError::Constraint("edit requires an id option".to_owned()))?;

        self.write_state(options, |state| {
            let Some(user) = state.users.iter_mut().find(|u| u.id.to_string() == id) else {
                return Ok(None);
            };
            let changed = apply_patch(user, patch)?;
            Ok(Some(EditOutcome {
                user: user.clone(),
                changed,
            }))
        })
    }

    async fn destroy(&self, options: &StoreOptions) -> Result<(), StoreError> {
        let id = options
            .id
            .clone()
            .ok_or_else(|| StoreError::Constraint("destroy requires an id option".to_owned()))?;

        self.write_state(options, |state| {
            let before = state.users.len();
            state.users.retain(|user| user.id.to_string() != id);
            if state.users.len() == before {
                return Err(StoreError::Missing);
            }
            Ok(())
        })
    }

    async fn change_password(
        &self,
        payload: &PasswordChange,
        options: &StoreOptions,
    ) -> Result<(), StoreError> {
        if payload.new_password != payload.ne2_password {
            return Err(StoreError::Constraint(
                "new passwords do not match".to_owned(),
            ));
        }

        self.write_state(options, |state| {
            let user = state
                .users
                .iter_mut()
                .find(|u| u.id.to_string() == payload.user_id)
                .ok_or(StoreError::Missing)?;
            if user.password != payload.old_password {
                return Err(StoreError::Constraint("old password is incorrect".to_owned()));
            }
            user.password = payload.new_password.clone();
            user.updated_at = chrono::Utc::now();
            Ok(())
        })
    }

    async fn transfer_ownership(
        &self,
        payload: &OwnershipTransfer,
        options: &StoreOptions,
    ) -> Result<(), StoreError> {
        self.write_state(options, |state| {
            if !state.users.iter().any(|u| u.id.to_string() == payload.id) {
                return Err(StoreError::Missing);
            }
            let now = chrono::Utc::now();
            for user in &mut state.users {
                if user.id.to_string() == payload.id {
                    user.roles = vec![OWNER_ROLE.to_owned()];
                    user.updated_at = now;
                } else if user.has_role(OWNER_ROLE) {
                    user.roles = vec![ADMINISTRATOR_ROLE.to_owned()];
                    user.updated_at = now;
                }
            }
            Ok(())
        })
    }
}

#[async_trait]
impl TokenStore for InMemoryStore {
    async fn destroy_access_tokens_by_user(
        &self,
        options: &StoreOptions,
    ) -> Result<(), StoreError> {
        let id = options
            .id
            .clone()
            .ok_or_else(|| StoreError::Constraint("token destroy requires an id".to_owned()))?;
        self.write_state(options, |state| {
            state
                .access_tokens
                .retain(|token| token.user_id.to_string() != id);
            Ok(())
        })
    }

    async fn destroy_refresh_tokens_by_user(
        &self,
        options: &StoreOptions,
    ) -> Result<(), StoreError> {
        let id = options
            .id
            .clone()
            .ok_or_else(|| StoreError::Constraint("token destroy requires an id".to_owned()))?;
        self.write_state(options, |state| {
            state
                .refresh_tokens
                .retain(|token| token.user_id.to_string() != id);
            Ok(())
        })
    }
}

#[async_trait]
impl PostStore for InMemoryStore {
    async fn destroy_by_author(&self, options: &StoreOptions) -> Result<(), StoreError> {
        let id = options
            .id
            .clone()
            .ok_or_else(|| StoreError::Constraint("post destroy requires an id".to_owned()))?;
        self.write_state(options, |state| {
            state.posts.retain(|post| post.author_id.to_string() != id);
            Ok(())
        })
    }

    async fn count_by_author(
        &self,
        author: &Uuid,
        options: &StoreOptions,
    ) -> Result<usize, StoreError> {
        self.read_state(options, |state| {
            Ok(state
                .posts
                .iter()
                .filter(|post| post.author_id == *author)
                .count())
        })
    }
}

#[async_trait]
impl RoleStore for InMemoryStore {
    async fn find_by_name(&self, name: &str) -> Result<Option<Role>, StoreError> {
        let state = self.committed.read().map_err(poisoned)?;
        Ok(state.roles.iter().find(|role| role.name == name).cloned())
    }
}

#[async_trait]
impl TransactionSource for InMemoryStore {
    async fn begin(&self) -> Result<TxHandle, StoreError> {
        let snapshot = self.committed.read().map_err(poisoned)?.clone();
        let tx = TxHandle::new();
        self.staged.write().map_err(poisoned)?.insert(tx, snapshot);
        Ok(tx)
    }

    async fn commit(&self, tx: TxHandle) -> Result<(), StoreError> {
        let staged = self
            .staged
            .write()
            .map_err(poisoned)?
            .remove(&tx)
            .ok_or(StoreError::UnknownTransaction)?;
        *self.committed.write().map_err(poisoned)? = staged;
        Ok(())
    }

    async fn rollback(&self, tx: TxHandle) -> Result<(), StoreError> {
        self.staged
            .write()
            .map_err(poisoned)?
            .remove(&tx)
            .ok_or(StoreError::UnknownTransaction)?;
        Ok(())
    }
}
