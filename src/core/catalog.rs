//! Message catalog contract
//!
//! Localization lives outside the pipeline; the executor and the permission
//! resolver only need a way to turn (resource, action) pairs into
//! human-readable messages.

/// Produces the user-facing messages the pipeline attaches to errors.
pub trait MessageCatalog: Send + Sync {
    /// Message for an absent target, keyed by resource type.
    fn not_found(&self, resource: &str) -> String;

    /// Message for a denied action.
    fn no_permission(&self, action: &str, resource: &str) -> String;
}

/// Built-in English catalog.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultCatalog;

impl MessageCatalog for DefaultCatalog {
    fn not_found(&self, resource: &str) -> String {
        format!("{} not found.", display_name(resource))
    }

    fn no_permission(&self, action: &str, resource: &str) -> String {
        format!("You do not have permission to {action} {resource}.")
    }
}

/// "users" -> "User"
fn display_name(resource: &str) -> String {
    let singular = resource.strip_suffix('s').unwrap_or(resource);
    let mut chars = singular.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
