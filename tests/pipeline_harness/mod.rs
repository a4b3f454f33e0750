//! Shared test harness for pipeline integration testing
//!
//! Provides a seeded in-memory world (users, roles, tokens, authored
//! posts), a recording permission gate with pluggable verdicts, and a
//! failing post store for cascade rollback testing.
//!
//! # Usage
//!
//! From any integration test file in `tests/`:
//! ```rust,ignore
//! mod pipeline_harness;
//! use pipeline_harness::*;
//! ```

#![allow(dead_code)]

use std::sync::{Arc, Mutex, Once};

use actionframe::prelude::*;

static TRACING: Once = Once::new();

/// Install a tracing subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .try_init();
    });
}

// ---------------------------------------------------------------------------
// RecordingGate: permission gate double with pluggable verdicts
// ---------------------------------------------------------------------------

type Verdict = Box<dyn Fn(&ActorContext, &AccessCheck) -> Decision + Send + Sync>;

/// Records every check it is asked and answers via a verdict function.
pub struct RecordingGate {
    calls: Mutex<Vec<AccessCheck>>,
    verdict: Verdict,
}

impl RecordingGate {
    pub fn with(
        verdict: impl Fn(&ActorContext, &AccessCheck) -> Decision + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(RecordingGate {
            calls: Mutex::new(Vec::new()),
            verdict: Box::new(verdict),
        })
    }

    pub fn allowing() -> Arc<Self> {
        Self::with(|_, _| Decision::Allowed)
    }

    pub fn denying() -> Arc<Self> {
        Self::with(|_, _| Decision::Denied)
    }

    /// Allows baseline checks, denies any check escalated by unsafe
    /// attributes.
    pub fn denying_unsafe() -> Arc<Self> {
        Self::with(|_, check| {
            if check.unsafe_attrs.is_empty() {
                Decision::Allowed
            } else {
                Decision::Denied
            }
        })
    }

    pub fn calls(&self) -> Vec<AccessCheck> {
        self.calls.lock().expect("gate calls lock").clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().expect("gate calls lock").len()
    }
}

#[async_trait]
impl PermissionGate for RecordingGate {
    async fn evaluate(
        &self,
        actor: &ActorContext,
        check: AccessCheck,
    ) -> Result<Decision, GateError> {
        self.calls
            .lock()
            .map_err(|_| GateError::Internal("calls lock poisoned".to_owned()))?
            .push(check.clone());
        Ok((self.verdict)(actor, &check))
    }
}

// ---------------------------------------------------------------------------
// FailingPostStore: simulates a cascade step failure
// ---------------------------------------------------------------------------

/// Delegates reads to the wrapped store but fails every destroy.
pub struct FailingPostStore(pub Arc<InMemoryStore>);

#[async_trait]
impl PostStore for FailingPostStore {
    async fn destroy_by_author(&self, _options: &StoreOptions) -> Result<(), StoreError> {
        Err(StoreError::Backend("simulated cascade failure".to_owned()))
    }

    async fn count_by_author(
        &self,
        author: &Uuid,
        options: &StoreOptions,
    ) -> Result<usize, StoreError> {
        self.0.count_by_author(author, options).await
    }
}

// ---------------------------------------------------------------------------
// Seeded world
// ---------------------------------------------------------------------------

/// A seeded store: an owner, an administrator, and an author who has two
/// access tokens, one refresh token and two posts. One extra post belongs
/// to the administrator.
pub struct World {
    pub store: Arc<InMemoryStore>,
    pub owner: Uuid,
    pub admin: Uuid,
    pub author: Uuid,
}

pub fn seed_world() -> World {
    let store = Arc::new(InMemoryStore::new());
    store
        .seed_role(Role::new("Owner", "Site owner"))
        .expect("seed role");
    store
        .seed_role(Role::new("Administrator", "Full access"))
        .expect("seed role");
    store
        .seed_role(Role::new("Editor", "Can publish"))
        .expect("seed role");

    let owner =
        User::new("Olive Husk", "olive", "olive@example.com", "owner-pass").with_roles(["Owner"]);
    let admin = User::new("Ada Marsh", "ada", "ada@example.com", "admin-pass")
        .with_roles(["Administrator"]);
    let author =
        User::new("Ben Quill", "ben", "ben@example.com", "author-pass").with_roles(["Editor"]);

    let world = World {
        owner: owner.id,
        admin: admin.id,
        author: author.id,
        store: store.clone(),
    };

    store.seed_user(owner).expect("seed user");
    store.seed_user(admin).expect("seed user");
    store.seed_user(author).expect("seed user");

    for token in ["at-1", "at-2"] {
        store
            .seed_access_token(AccessToken {
                id: Uuid::new_v4(),
                token: token.to_owned(),
                user_id: world.author,
                expires: Utc::now() + chrono::Duration::hours(1),
            })
            .expect("seed token");
    }
    store
        .seed_refresh_token(RefreshToken {
            id: Uuid::new_v4(),
            token: "rt-1".to_owned(),
            user_id: world.author,
            expires: Utc::now() + chrono::Duration::days(30),
        })
        .expect("seed token");

    for title in ["First Post", "Second Post"] {
        store
            .seed_post(Post {
                id: Uuid::new_v4(),
                title: title.to_owned(),
                author_id: world.author,
                status: "published".to_owned(),
            })
            .expect("seed post");
    }
    store
        .seed_post(Post {
            id: Uuid::new_v4(),
            title: "Admin Notes".to_owned(),
            author_id: world.admin,
            status: "draft".to_owned(),
        })
        .expect("seed post");

    world
}

// ---------------------------------------------------------------------------
// Assembly helpers
// ---------------------------------------------------------------------------

pub fn services_for(store: &Arc<InMemoryStore>, gate: Arc<dyn PermissionGate>) -> Services {
    Services::new(
        store.clone(),
        store.clone(),
        store.clone(),
        store.clone(),
        gate,
    )
}

pub fn executor_for(store: &Arc<InMemoryStore>, gate: Arc<dyn PermissionGate>) -> Executor {
    executor_with(services_for(store, gate))
}

pub fn executor_with(services: Services) -> Executor {
    let mut registry = ActionRegistry::new();
    actionframe::users::register(&mut registry);
    Executor::new(Arc::new(registry), services)
}
