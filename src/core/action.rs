//! Declarative action definitions
//!
//! An [`ActionDefinition`] captures everything one resource operation
//! declares instead of coding: which options it accepts and how they are
//! constrained, what input it requires, what permission rule guards it, what
//! its response looks like, and the query function that does the actual work.
//! Definitions are immutable once registered; the per-action option and
//! unsafe-attribute vocabularies are constant data attached here, never
//! shared mutable state.

use std::fmt;

use futures::future::BoxFuture;
use http::StatusCode;
use serde_json::Value;

use crate::core::error::QueryError;
use crate::core::executor::Services;
use crate::core::frame::{Frame, ResponseHeaders};
use crate::core::page::Page;
use crate::core::permissions::Decision;

/// Future returned by an action's query function.
pub type QueryFuture<'a> = BoxFuture<'a, Result<QueryOutcome, QueryError>>;

/// An action's query logic: receives the validated, authorized frame plus
/// the collaborator set and returns the payload with any response-metadata
/// overrides.
pub type QueryFn = for<'a> fn(&'a Frame, &'a Services) -> QueryFuture<'a>;

/// A per-frame permission resolution that may consult persistence before
/// reaching a decision. Resolution failures propagate as denials with the
/// failure attached as cause.
pub type DynamicRule =
    for<'a> fn(&'a Frame, &'a Services) -> BoxFuture<'a, Result<Decision, anyhow::Error>>;

/// Extracts the permission target identifier from the frame's input data.
pub type IdentifierFn = fn(&Frame) -> Option<String>;

/// How an action is authorized.
#[derive(Clone)]
pub enum PermissionRule {
    /// No permission check at all
    AlwaysAllowed,

    /// Delegate to the permission gate under the action's own name.
    ///
    /// `unsafe_attrs` lists input fields whose modification escalates the
    /// check: the resolver diffs them against the submitted record and the
    /// gate evaluates any touched ones with elevated scrutiny.
    StaticCheck {
        unsafe_attrs: &'static [&'static str],
    },

    /// Arbitrary per-frame resolution (e.g. look up a role first)
    DynamicCheck(DynamicRule),

    /// Delegate to the gate under an alternate (resource, action) pair,
    /// scoped to the specific target instance named by the input data
    IdentifierScoped {
        resource: &'static str,
        action: &'static str,
        identifier: IdentifierFn,
    },
}

impl fmt::Debug for PermissionRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PermissionRule::AlwaysAllowed => write!(f, "AlwaysAllowed"),
            PermissionRule::StaticCheck { unsafe_attrs } => f
                .debug_struct("StaticCheck")
                .field("unsafe_attrs", unsafe_attrs)
                .finish(),
            PermissionRule::DynamicCheck(_) => write!(f, "DynamicCheck"),
            PermissionRule::IdentifierScoped {
                resource, action, ..
            } => f
                .debug_struct("IdentifierScoped")
                .field("resource", resource)
                .field("action", action)
                .finish(),
        }
    }
}

/// Declared constraints for one allowed option.
#[derive(Debug, Clone, Copy)]
pub struct OptionConstraint {
    pub name: &'static str,
    pub required: bool,
    /// Enumerated allowed values, if the option is restricted to a set
    pub values: Option<&'static [&'static str]>,
}

/// What the action reads from the frame's input data.
#[derive(Debug, Clone, Copy, Default)]
pub struct InputSchema {
    /// The `frame.data` key the action consumes
    pub source: Option<&'static str>,
    /// Fields usable as a lookup filter (read-style actions)
    pub lookup: &'static [&'static str],
    /// Fields that must be present and non-null on the first record
    pub required: &'static [&'static str],
}

/// Declared response shape: status code plus default headers.
#[derive(Debug, Clone, Copy)]
pub struct ResponseContract {
    pub status: StatusCode,
    pub headers: ResponseHeaders,
}

impl Default for ResponseContract {
    fn default() -> Self {
        ResponseContract {
            status: StatusCode::OK,
            headers: ResponseHeaders::none(),
        }
    }
}

/// The result payload of a query function.
#[derive(Debug, Clone)]
pub enum Payload {
    Entity(Value),
    Collection(Page<Value>),
    Empty,
}

/// What a query function hands back to the executor: the payload plus any
/// response-metadata overrides. Overrides win over the action's declared
/// default headers, which lets a mutation report data-dependent metadata
/// such as whether an edit was a no-op.
#[derive(Debug, Clone)]
pub struct QueryOutcome {
    pub payload: Payload,
    pub headers: ResponseHeaders,
}

impl QueryOutcome {
    pub fn entity(value: Value) -> Self {
        QueryOutcome {
            payload: Payload::Entity(value),
            headers: ResponseHeaders::none(),
        }
    }

    pub fn collection(page: Page<Value>) -> Self {
        QueryOutcome {
            payload: Payload::Collection(page),
            headers: ResponseHeaders::none(),
        }
    }

    pub fn empty() -> Self {
        QueryOutcome {
            payload: Payload::Empty,
            headers: ResponseHeaders::none(),
        }
    }

    pub fn with_headers(mut self, headers: ResponseHeaders) -> Self {
        self.headers = headers;
        self
    }
}

/// Immutable descriptor of one resource operation.
pub struct ActionDefinition {
    pub name: &'static str,
    pub options: Vec<OptionConstraint>,
    pub input: InputSchema,
    pub permissions: PermissionRule,
    pub response: ResponseContract,
    pub query: QueryFn,
}

impl fmt::Debug for ActionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActionDefinition")
            .field("name", &self.name)
            .field("options", &self.options)
            .field("input", &self.input)
            .field("permissions", &self.permissions)
            .field("response", &self.response)
            .finish_non_exhaustive()
    }
}

impl ActionDefinition {
    /// Start building a definition around its query function.
    pub fn build(name: &'static str, query: QueryFn) -> ActionBuilder {
        ActionBuilder {
            name,
            query,
            options: Vec::new(),
            input: InputSchema::default(),
            permissions: PermissionRule::AlwaysAllowed,
            response: ResponseContract::default(),
        }
    }

    /// The declared constraint for an option, if the option is allowed.
    pub fn constraint(&self, option: &str) -> Option<&OptionConstraint> {
        self.options.iter().find(|c| c.name == option)
    }

    pub fn allows_option(&self, option: &str) -> bool {
        self.constraint(option).is_some()
    }
}

/// Builder for [`ActionDefinition`].
pub struct ActionBuilder {
    name: &'static str,
    query: QueryFn,
    options: Vec<OptionConstraint>,
    input: InputSchema,
    permissions: PermissionRule,
    response: ResponseContract,
}

impl ActionBuilder {
    /// Allow a set of unconstrained options.
    pub fn options(mut self, names: &'static [&'static str]) -> Self {
        for name in names {
            self.options.push(OptionConstraint {
                name,
                required: false,
                values: None,
            });
        }
        self
    }

    /// Allow an option and mark it required.
    pub fn required_option(mut self, name: &'static str) -> Self {
        match self.options.iter_mut().find(|c| c.name == name) {
            Some(constraint) => constraint.required = true,
            None => self.options.push(OptionConstraint {
                name,
                required: true,
                values: None,
            }),
        }
        self
    }

    /// Allow an option and restrict it to an enumerated value set.
    pub fn option_values(mut self, name: &'static str, values: &'static [&'static str]) -> Self {
        match self.options.iter_mut().find(|c| c.name == name) {
            Some(constraint) => constraint.values = Some(values),
            None => self.options.push(OptionConstraint {
                name,
                required: false,
                values: Some(values),
            }),
        }
        self
    }

    /// Name the `frame.data` key the action consumes.
    pub fn input_source(mut self, source: &'static str) -> Self {
        self.input.source = Some(source);
        self
    }

    /// Declare the fields usable as a lookup filter.
    pub fn lookup_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.input.lookup = fields;
        self
    }

    /// Declare required fields on the first input record.
    pub fn required_fields(mut self, fields: &'static [&'static str]) -> Self {
        self.input.required = fields;
        self
    }

    pub fn permissions(mut self, rule: PermissionRule) -> Self {
        self.permissions = rule;
        self
    }

    pub fn status(mut self, status: StatusCode) -> Self {
        self.response.status = status;
        self
    }

    pub fn default_headers(mut self, headers: ResponseHeaders) -> Self {
        self.response.headers = headers;
        self
    }

    pub fn finish(self) -> ActionDefinition {
        ActionDefinition {
            name: self.name,
            options: self.options,
            input: self.input,
            permissions: self.permissions,
            response: self.response,
            query: self.query,
        }
    }
}
