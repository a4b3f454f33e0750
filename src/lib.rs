//! # Actionframe
//!
//! A declarative resource-action pipeline for building API operations in Rust.
//!
//! ## Features
//!
//! - **Actions as data**: each operation declares its allowed options,
//!   validation constraints, permission rule, response contract and query
//!   function in an immutable [`core::ActionDefinition`]
//! - **Uniform execution context**: one [`core::Frame`] per invocation
//!   carries input records, options, the acting identity and response
//!   metadata
//! - **Staged pipeline**: validate, authorize, execute, strictly in that
//!   order, failing fast with typed errors before any mutation
//! - **Pluggable collaborators**: persistence, the permission engine and
//!   message localization sit behind trait contracts
//! - **Atomic cascades**: multi-entity mutations run inside one
//!   transaction scope with all-or-nothing semantics
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use actionframe::prelude::*;
//! use std::sync::Arc;
//!
//! let store = Arc::new(InMemoryStore::new());
//! let services = Services::new(
//!     store.clone(),
//!     store.clone(),
//!     store.clone(),
//!     store,
//!     Arc::new(AllowAllGate),
//! );
//!
//! let mut registry = ActionRegistry::new();
//! actionframe::users::register(&mut registry);
//! let executor = Executor::new(Arc::new(registry), services);
//!
//! let frame = Frame::builder()
//!     .context(ActorContext::user(actor_id, ["Administrator"]))
//!     .option("limit", 10)
//!     .build();
//! let response = executor.execute("users", "browse", frame).await?;
//! ```

pub mod core;
pub mod storage;
pub mod users;

/// Re-exports of commonly used types and traits
pub mod prelude {
    // === Core Types ===
    pub use crate::core::{
        action::{ActionDefinition, Payload, PermissionRule, QueryFuture, QueryOutcome},
        catalog::{DefaultCatalog, MessageCatalog},
        context::ActorContext,
        error::{
            NoPermissionError, NotFoundError, OperationFailedError, PipelineError, QueryError,
            StoreError, ValidationError,
        },
        executor::{ActionResponse, Executor, Services},
        frame::{Frame, OptionValue, ResponseHeaders},
        page::{Page, PageMeta},
        permissions::{AccessCheck, AllowAllGate, Decision, GateError, PermissionGate},
        registry::ActionRegistry,
        transaction::{with_transaction, TransactionSource, TxHandle},
    };

    // === Storage ===
    pub use crate::storage::{
        EditOutcome, InMemoryStore, PostStore, RoleStore, StoreOptions, TokenStore, UserFilter,
        UserStore,
    };

    // === User Resource ===
    pub use crate::users::model::{
        AccessToken, OwnershipTransfer, PasswordChange, Post, RefreshToken, Role, User, UserStatus,
    };

    // === External dependencies ===
    pub use async_trait::async_trait;
    pub use chrono::{DateTime, Utc};
    pub use http::StatusCode;
    pub use serde::{Deserialize, Serialize};
    pub use serde_json::json;
    pub use uuid::Uuid;
}
