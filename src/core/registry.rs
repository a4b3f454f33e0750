//! Action registry
//!
//! Maps (resource, action) pairs to their immutable [`ActionDefinition`].
//! The registry is populated once at startup and shared read-only for the
//! lifetime of the process.

use std::collections::HashMap;
use std::sync::Arc;

use crate::core::action::ActionDefinition;

/// Registry of all declared actions, keyed by (resource, action).
#[derive(Debug, Default)]
pub struct ActionRegistry {
    actions: HashMap<(String, String), Arc<ActionDefinition>>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self {
            actions: HashMap::new(),
        }
    }

    /// Register a definition under a resource name.
    ///
    /// Re-registering the same (resource, action) pair replaces the
    /// previous definition.
    pub fn register(&mut self, resource: &str, definition: ActionDefinition) {
        self.actions.insert(
            (resource.to_owned(), definition.name.to_owned()),
            Arc::new(definition),
        );
    }

    /// Resolve the definition for (resource, action).
    pub fn get(&self, resource: &str, action: &str) -> Option<Arc<ActionDefinition>> {
        self.actions
            .get(&(resource.to_owned(), action.to_owned()))
            .cloned()
    }

    /// Action names registered for a resource.
    pub fn actions_for(&self, resource: &str) -> Vec<&str> {
        self.actions
            .keys()
            .filter(|(r, _)| r == resource)
            .map(|(_, action)| action.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
