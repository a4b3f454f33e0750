//! Core module containing the pipeline's fundamental traits and types

pub mod action;
pub mod catalog;
pub mod context;
pub mod error;
pub mod executor;
pub mod frame;
pub mod page;
pub mod permissions;
pub mod registry;
pub mod transaction;
pub mod validation;

pub use action::{
    ActionBuilder, ActionDefinition, DynamicRule, IdentifierFn, InputSchema, OptionConstraint,
    Payload, PermissionRule, QueryFn, QueryFuture, QueryOutcome, ResponseContract,
};
pub use catalog::{DefaultCatalog, MessageCatalog};
pub use context::ActorContext;
pub use error::{
    NoPermissionError, NotFoundError, OperationFailedError, PipelineError, QueryError, StoreError,
    ValidationError,
};
pub use executor::{ActionResponse, Executor, Services};
pub use frame::{Frame, FrameBuilder, OptionValue, ResponseHeaders};
pub use page::{Page, PageMeta};
pub use permissions::{authorize, AccessCheck, AllowAllGate, Decision, GateError, PermissionGate};
pub use registry::ActionRegistry;
pub use transaction::{with_transaction, TransactionSource, TxHandle};
pub use validation::validate;
