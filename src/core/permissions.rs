//! Permission resolution
//!
//! The pipeline never decides authorization itself: it assembles an
//! [`AccessCheck`] from the action's declared [`PermissionRule`] and the
//! frame, and delegates to the external [`PermissionGate`]. One resolution
//! pass moves Pending -> Evaluating -> Allowed | Denied; a denial always
//! surfaces as [`NoPermissionError`], never as a raw gate error.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::core::action::{ActionDefinition, PermissionRule};
use crate::core::context::ActorContext;
use crate::core::error::NoPermissionError;
use crate::core::executor::Services;
use crate::core::frame::Frame;

/// Outcome of one permission-engine evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied,
}

/// One question for the permission engine: may the actor perform `action`
/// on `resource`, optionally scoped to a specific `target` instance, with
/// any touched unsafe attributes calling for elevated scrutiny.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessCheck {
    pub action: String,
    pub resource: String,
    pub target: Option<String>,
    pub unsafe_attrs: Vec<String>,
}

impl AccessCheck {
    pub fn new(action: impl Into<String>, resource: impl Into<String>) -> Self {
        AccessCheck {
            action: action.into(),
            resource: resource.into(),
            target: None,
            unsafe_attrs: Vec::new(),
        }
    }

    pub fn scoped_to(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn with_unsafe_attrs(mut self, attrs: Vec<String>) -> Self {
        self.unsafe_attrs = attrs;
        self
    }
}

/// Failures inside the permission engine itself.
#[derive(Debug, Error)]
pub enum GateError {
    #[error("permission engine unavailable: {0}")]
    Unavailable(String),

    #[error("permission engine failure: {0}")]
    Internal(String),
}

/// The external permission-decision engine.
#[async_trait]
pub trait PermissionGate: Send + Sync {
    /// Can this actor perform the described action?
    async fn evaluate(
        &self,
        actor: &ActorContext,
        check: AccessCheck,
    ) -> Result<Decision, GateError>;
}

/// Permissive gate for development and tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAllGate;

#[async_trait]
impl PermissionGate for AllowAllGate {
    async fn evaluate(
        &self,
        _actor: &ActorContext,
        _check: AccessCheck,
    ) -> Result<Decision, GateError> {
        Ok(Decision::Allowed)
    }
}

/// Resolve an action's permission rule for one frame.
///
/// Runs after validation and before the query function; a denial here
/// means no mutation has happened yet.
pub async fn authorize(
    definition: &ActionDefinition,
    resource: &str,
    frame: &Frame,
    services: &Services,
) -> Result<(), NoPermissionError> {
    debug!(action = definition.name, resource, "evaluating permissions");

    let denial = || NoPermissionError::new(services.catalog.no_permission(definition.name, resource));

    match &definition.permissions {
        PermissionRule::AlwaysAllowed => Ok(()),

        PermissionRule::StaticCheck { unsafe_attrs } => {
            let touched = touched_unsafe_attrs(definition, resource, frame, unsafe_attrs);
            let check = AccessCheck::new(definition.name, resource).with_unsafe_attrs(touched);
            settle(services.gate.evaluate(&frame.context, check).await, denial)
        }

        PermissionRule::DynamicCheck(rule) => match rule(frame, services).await {
            Ok(Decision::Allowed) => Ok(()),
            Ok(Decision::Denied) => Err(denial()),
            Err(cause) => {
                warn!(action = definition.name, %cause, "permission resolution failed");
                Err(denial().caused_by(cause))
            }
        },

        PermissionRule::IdentifierScoped {
            resource: alt_resource,
            action,
            identifier,
        } => {
            let Some(target) = identifier(frame) else {
                return Err(NoPermissionError::new(
                    services.catalog.no_permission(action, alt_resource),
                ));
            };
            let check = AccessCheck::new(*action, *alt_resource).scoped_to(target);
            settle(services.gate.evaluate(&frame.context, check).await, || {
                NoPermissionError::new(services.catalog.no_permission(action, alt_resource))
            })
        }
    }
}

fn settle(
    result: Result<Decision, GateError>,
    denial: impl Fn() -> NoPermissionError,
) -> Result<(), NoPermissionError> {
    match result {
        Ok(Decision::Allowed) => Ok(()),
        Ok(Decision::Denied) => Err(denial()),
        Err(cause) => {
            warn!(%cause, "permission engine failed");
            Err(denial().caused_by(cause))
        }
    }
}

/// The declared unsafe attributes actually touched by the submitted record.
fn touched_unsafe_attrs(
    definition: &ActionDefinition,
    resource: &str,
    frame: &Frame,
    declared: &[&str],
) -> Vec<String> {
    let source = definition.input.source.unwrap_or(resource);
    frame
        .first_record(source)
        .and_then(Value::as_object)
        .map(|record| {
            declared
                .iter()
                .filter(|attr| record.contains_key(**attr))
                .map(|attr| (*attr).to_owned())
                .collect()
        })
        .unwrap_or_default()
}
