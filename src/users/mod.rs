//! The user resource
//!
//! Declares every user action as data: allowed options, validation
//! constraints, permission rule, response contract, and query function.
//! Nothing in here branches on action names at runtime; the table is
//! registered once and the executor drives it.

pub mod model;

use futures::future::BoxFuture;
use http::StatusCode;
use serde_json::{json, Value};

use crate::core::action::{ActionDefinition, PermissionRule, QueryFuture, QueryOutcome};
use crate::core::error::{QueryError, StoreError, ValidationError};
use crate::core::executor::Services;
use crate::core::frame::{Frame, ResponseHeaders};
use crate::core::page::Page;
use crate::core::permissions::{AccessCheck, Decision};
use crate::core::registry::ActionRegistry;
use crate::core::transaction::with_transaction;
use crate::storage::{StoreOptions, UserFilter};
use crate::users::model::{OwnershipTransfer, PasswordChange, User};

/// Registry name of the user resource.
pub const RESOURCE: &str = "users";

/// Role names with built-in meaning.
pub const OWNER_ROLE: &str = "Owner";
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

/// Sub-resources expandable through the `include` option.
pub const ALLOWED_INCLUDES: &[&str] = &["count.posts", "permissions", "roles", "roles.permissions"];

/// Attributes whose modification escalates the edit permission check.
pub const UNSAFE_ATTRS: &[&str] = &["status", "roles"];

/// Fields accepted as a read lookup.
const READ_LOOKUP: &[&str] = &["id", "slug", "status", "email", "role"];

/// `frame.data` keys consumed by the custom actions.
const PASSWORD_INPUT: &str = "password";
const OWNER_INPUT: &str = "owner";

/// Register every user action.
pub fn register(registry: &mut ActionRegistry) {
    registry.register(RESOURCE, browse());
    registry.register(RESOURCE, read());
    registry.register(RESOURCE, edit());
    registry.register(RESOURCE, destroy());
    registry.register(RESOURCE, change_password());
    registry.register(RESOURCE, transfer_ownership());
}

fn browse() -> ActionDefinition {
    ActionDefinition::build("browse", browse_query)
        .options(&["filter", "fields", "limit", "status", "order", "page", "debug"])
        .option_values("include", ALLOWED_INCLUDES)
        .permissions(PermissionRule::StaticCheck { unsafe_attrs: &[] })
        .finish()
}

fn read() -> ActionDefinition {
    ActionDefinition::build("read", read_query)
        .options(&["filter", "fields", "debug"])
        .option_values("include", ALLOWED_INCLUDES)
        .input_source(RESOURCE)
        .lookup_fields(READ_LOOKUP)
        .permissions(PermissionRule::StaticCheck { unsafe_attrs: &[] })
        .finish()
}

fn edit() -> ActionDefinition {
    ActionDefinition::build("edit", edit_query)
        .required_option("id")
        .option_values("include", ALLOWED_INCLUDES)
        .input_source(RESOURCE)
        .permissions(PermissionRule::StaticCheck {
            unsafe_attrs: UNSAFE_ATTRS,
        })
        .finish()
}

fn destroy() -> ActionDefinition {
    ActionDefinition::build("destroy", destroy_query)
        .required_option("id")
        .permissions(PermissionRule::StaticCheck { unsafe_attrs: &[] })
        .status(StatusCode::NO_CONTENT)
        .default_headers(ResponseHeaders::invalidate_cache(true))
        .finish()
}

fn change_password() -> ActionDefinition {
    ActionDefinition::build("change_password", change_password_query)
        .input_source(PASSWORD_INPUT)
        .required_fields(&["new_password", "ne2_password", "old_password", "user_id"])
        .permissions(PermissionRule::IdentifierScoped {
            resource: RESOURCE,
            action: "edit",
            identifier: password_target,
        })
        .finish()
}

fn transfer_ownership() -> ActionDefinition {
    ActionDefinition::build("transfer_ownership", transfer_ownership_query)
        .input_source(OWNER_INPUT)
        .permissions(PermissionRule::DynamicCheck(owner_assignment))
        .finish()
}

// --- permission rules ---

/// The password-change target is the user named by the submitted payload.
fn password_target(frame: &Frame) -> Option<String> {
    frame
        .first_record(PASSWORD_INPUT)?
        .get("user_id")?
        .as_str()
        .map(str::to_owned)
}

/// Transferring ownership means assigning the Owner role: resolve the role
/// first, then ask the gate whether this actor may assign it. A missing
/// role definition is a denial, not a crash.
fn owner_assignment<'a>(
    frame: &'a Frame,
    services: &'a Services,
) -> BoxFuture<'a, Result<Decision, anyhow::Error>> {
    Box::pin(async move {
        let role = services
            .roles
            .find_by_name(OWNER_ROLE)
            .await?
            .ok_or_else(|| anyhow::anyhow!("the `{OWNER_ROLE}` role is not defined"))?;
        let check = AccessCheck::new("assign", "roles").scoped_to(role.id.to_string());
        Ok(services.gate.evaluate(&frame.context, check).await?)
    })
}

// --- query functions ---

fn browse_query<'a>(frame: &'a Frame, services: &'a Services) -> QueryFuture<'a> {
    Box::pin(async move {
        let options = StoreOptions::from_frame(frame);
        let page = services.users.find_page(&options).await?;
        let meta = page.meta.clone();
        let mut items = Vec::with_capacity(page.items.len());
        for user in &page.items {
            items.push(render_user(user, &options, services).await?);
        }
        Ok(QueryOutcome::collection(Page { items, meta }))
    })
}

fn read_query<'a>(frame: &'a Frame, services: &'a Services) -> QueryFuture<'a> {
    Box::pin(async move {
        let options = StoreOptions::from_frame(frame);
        let filter = frame
            .first_record(RESOURCE)
            .map(|record| UserFilter::from_record(record, READ_LOOKUP))
            .unwrap_or_default();
        if filter.is_empty() {
            return Err(ValidationError::MalformedInput {
                entity: RESOURCE.to_owned(),
                message: "a lookup field (id, slug, status, email or role) is required".to_owned(),
            }
            .into());
        }

        let user = services
            .users
            .find_one(&filter, &options)
            .await?
            .ok_or(QueryError::TargetMissing)?;
        let mut view = user.read_view();
        attach_expansions(&mut view, &user, &options, services).await?;
        Ok(QueryOutcome::entity(view))
    })
}

fn edit_query<'a>(frame: &'a Frame, services: &'a Services) -> QueryFuture<'a> {
    Box::pin(async move {
        let options = StoreOptions::from_frame(frame);
        let patch = frame
            .first_record(RESOURCE)
            .ok_or_else(|| ValidationError::MissingInput {
                entity: RESOURCE.to_owned(),
            })?;

        let outcome = services
            .users
            .edit(patch, &options)
            .await?
            .ok_or(QueryError::TargetMissing)?;

        let value = render_user(&outcome.user, &options, services).await?;
        // the changed flag drives downstream cache invalidation
        Ok(QueryOutcome::entity(value)
            .with_headers(ResponseHeaders::invalidate_cache(outcome.changed)))
    })
}

/// Remove a user and everything referencing it in one atomic unit. The
/// dependent removals are independent of each other and run concurrently;
/// the user record itself goes last, after all of them have finished.
fn destroy_query<'a>(frame: &'a Frame, services: &'a Services) -> QueryFuture<'a> {
    Box::pin(async move {
        let options = StoreOptions::from_frame(frame);
        let id = options.id.clone().unwrap_or_default();
        if services
            .users
            .find_one(&UserFilter::by_id(id), &options)
            .await?
            .is_none()
        {
            return Err(QueryError::TargetMissing);
        }

        let tx_options = options.clone();
        with_transaction(services.users.as_ref(), "users.destroy", move |tx| {
            Box::pin(async move {
                let opts = tx_options.transacting(tx);
                futures::try_join!(
                    services.tokens.destroy_access_tokens_by_user(&opts),
                    services.tokens.destroy_refresh_tokens_by_user(&opts),
                    services.posts.destroy_by_author(&opts),
                )?;
                services.users.destroy(&opts.with_status("all")).await
            })
        })
        .await?;

        Ok(QueryOutcome::empty())
    })
}

fn change_password_query<'a>(frame: &'a Frame, services: &'a Services) -> QueryFuture<'a> {
    Box::pin(async move {
        let options = StoreOptions::from_frame(frame);
        let payload: PasswordChange = parse_input(frame, PASSWORD_INPUT)?;
        match services.users.change_password(&payload, &options).await {
            Ok(()) => Ok(QueryOutcome::empty()),
            Err(StoreError::Constraint(message)) => Err(ValidationError::MalformedInput {
                entity: PASSWORD_INPUT.to_owned(),
                message,
            }
            .into()),
            Err(err) => Err(err.into()),
        }
    })
}

fn transfer_ownership_query<'a>(frame: &'a Frame, services: &'a Services) -> QueryFuture<'a> {
    Box::pin(async move {
        let options = StoreOptions::from_frame(frame);
        let payload: OwnershipTransfer = parse_input(frame, OWNER_INPUT)?;
        services.users.transfer_ownership(&payload, &options).await?;
        Ok(QueryOutcome::empty())
    })
}

// --- helpers ---

fn parse_input<T: serde::de::DeserializeOwned>(
    frame: &Frame,
    entity: &str,
) -> Result<T, QueryError> {
    let record = frame
        .first_record(entity)
        .ok_or_else(|| ValidationError::MissingInput {
            entity: entity.to_owned(),
        })?;
    serde_json::from_value(record.clone()).map_err(|err| {
        ValidationError::MalformedInput {
            entity: entity.to_owned(),
            message: err.to_string(),
        }
        .into()
    })
}

async fn render_user(
    user: &User,
    options: &StoreOptions,
    services: &Services,
) -> Result<Value, QueryError> {
    let mut value = user.to_json();
    attach_expansions(&mut value, user, options, services).await?;
    Ok(value)
}

async fn attach_expansions(
    value: &mut Value,
    user: &User,
    options: &StoreOptions,
    services: &Services,
) -> Result<(), QueryError> {
    if options.includes("count.posts") {
        let posts = services.posts.count_by_author(&user.id, options).await?;
        if let Some(fields) = value.as_object_mut() {
            fields.insert("count".to_owned(), json!({ "posts": posts }));
        }
    }
    Ok(())
}
