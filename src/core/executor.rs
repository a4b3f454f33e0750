//! Action executor
//!
//! Orchestrates one invocation end to end: resolve the action definition,
//! validate the frame, resolve permissions, run the query function, then
//! finalize response metadata. The stages run strictly in that order; a
//! failure in any stage stops the invocation before anything later runs.

use std::sync::Arc;

use http::StatusCode;
use tracing::{debug, warn};

use crate::core::action::Payload;
use crate::core::catalog::{DefaultCatalog, MessageCatalog};
use crate::core::error::{
    NotFoundError, OperationFailedError, PipelineError, QueryError, StoreError,
};
use crate::core::frame::{Frame, ResponseHeaders};
use crate::core::permissions::{authorize, PermissionGate};
use crate::core::registry::ActionRegistry;
use crate::core::validation::validate;
use crate::storage::{PostStore, RoleStore, TokenStore, UserStore};

/// The collaborator set handed to query functions and permission rules.
#[derive(Clone)]
pub struct Services {
    pub users: Arc<dyn UserStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub posts: Arc<dyn PostStore>,
    pub roles: Arc<dyn RoleStore>,
    pub gate: Arc<dyn PermissionGate>,
    pub catalog: Arc<dyn MessageCatalog>,
}

impl Services {
    pub fn new(
        users: Arc<dyn UserStore>,
        tokens: Arc<dyn TokenStore>,
        posts: Arc<dyn PostStore>,
        roles: Arc<dyn RoleStore>,
        gate: Arc<dyn PermissionGate>,
    ) -> Self {
        Services {
            users,
            tokens,
            posts,
            roles,
            gate,
            catalog: Arc::new(DefaultCatalog),
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn MessageCatalog>) -> Self {
        self.catalog = catalog;
        self
    }
}

/// Final result of one executed action.
#[derive(Debug, Clone)]
pub struct ActionResponse {
    pub payload: Payload,
    pub status: StatusCode,
    pub headers: ResponseHeaders,
}

/// Runs actions resolved from a shared registry against a collaborator set.
pub struct Executor {
    registry: Arc<ActionRegistry>,
    services: Services,
}

impl Executor {
    pub fn new(registry: Arc<ActionRegistry>, services: Services) -> Self {
        Executor { registry, services }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    /// Execute (resource, action) for one frame.
    pub async fn execute(
        &self,
        resource: &str,
        action: &str,
        mut frame: Frame,
    ) -> Result<ActionResponse, PipelineError> {
        let definition =
            self.registry
                .get(resource, action)
                .ok_or_else(|| PipelineError::UnknownAction {
                    resource: resource.to_owned(),
                    action: action.to_owned(),
                })?;

        debug!(resource, action, "executing action");
        validate(&definition, &mut frame)?;
        authorize(&definition, resource, &frame, &self.services).await?;

        let outcome = (definition.query)(&frame, &self.services)
            .await
            .map_err(|err| self.translate(resource, action, err))?;

        let headers = definition
            .response
            .headers
            .merged(frame.headers)
            .merged(outcome.headers);

        Ok(ActionResponse {
            payload: outcome.payload,
            status: definition.response.status,
            headers,
        })
    }

    /// Translate query-level failures into the caller-facing taxonomy.
    ///
    /// Absent targets become resource-specific `NotFoundError`s; raw store
    /// errors never cross this boundary.
    fn translate(&self, resource: &str, action: &str, err: QueryError) -> PipelineError {
        match err {
            QueryError::TargetMissing | QueryError::Store(StoreError::Missing) => {
                warn!(resource, action, "target entity absent");
                NotFoundError::new(resource, self.services.catalog.not_found(resource)).into()
            }
            QueryError::Validation(err) => err.into(),
            QueryError::NoPermission(err) => err.into(),
            QueryError::OperationFailed(err) => err.into(),
            QueryError::Store(err) => {
                warn!(resource, action, %err, "store failure during query");
                OperationFailedError::with_cause(format!("{resource}.{action}"), err).into()
            }
        }
    }
}
