//! End-to-end tests for the user action pipeline
//!
//! Drives the executor through every declared action and asserts the
//! validation, permission and response-metadata behavior of each stage.

mod pipeline_harness;

use actionframe::prelude::*;
use pipeline_harness::*;
use serde_json::json;

fn admin_context(world: &World) -> ActorContext {
    ActorContext::user(world.admin, ["Administrator"])
}

// =============================================================================
// Option validation
// =============================================================================

mod option_validation {
    use super::*;

    #[tokio::test]
    async fn test_unknown_option_is_rejected_before_authorization() {
        init_tracing();
        let world = seed_world();
        let gate = RecordingGate::allowing();
        let executor = executor_for(&world.store, gate.clone());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("id", world.author.to_string())
            // destroy does not allow `include`
            .option("include", "roles")
            .build();
        let err = executor
            .execute("users", "destroy", frame)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert_eq!(gate.call_count(), 0, "gate must not run for invalid frames");
        assert_eq!(
            world.store.counts().expect("counts").users,
            3,
            "nothing may be mutated"
        );
    }

    #[tokio::test]
    async fn test_missing_required_id_is_rejected() {
        let world = seed_world();
        let gate = RecordingGate::allowing();
        let executor = executor_for(&world.store, gate.clone());

        for action in ["edit", "destroy"] {
            let frame = Frame::builder().context(admin_context(&world)).build();
            let err = executor.execute("users", action, frame).await.unwrap_err();
            assert_eq!(err.kind(), "VALIDATION_ERROR");
            assert!(err.to_string().contains("id"));
        }
        assert_eq!(gate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_supplying_required_option_progresses_to_authorization() {
        let world = seed_world();
        let gate = RecordingGate::denying();
        let executor = executor_for(&world.store, gate.clone());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("id", world.author.to_string())
            .build();
        let err = executor
            .execute("users", "destroy", frame)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NO_PERMISSION");
        assert_eq!(gate.call_count(), 1, "validation passed, gate was consulted");
    }

    #[tokio::test]
    async fn test_include_accepts_every_listed_value() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        for include in [
            "count.posts",
            "permissions",
            "roles",
            "roles.permissions",
            "roles,permissions,count.posts,roles.permissions",
        ] {
            let frame = Frame::builder()
                .context(admin_context(&world))
                .option("include", include)
                .build();
            let response = executor
                .execute("users", "browse", frame)
                .await
                .unwrap_or_else(|err| panic!("include `{include}` must be accepted: {err}"));
            assert_eq!(response.status, StatusCode::OK);
        }
    }

    #[tokio::test]
    async fn test_include_rejects_values_outside_the_enumeration() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("include", "roles,posts")
            .build();
        let err = executor.execute("users", "browse", frame).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("posts"));
    }

    #[tokio::test]
    async fn test_unknown_action_is_a_programmer_error() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder().context(admin_context(&world)).build();
        let err = executor
            .execute("users", "promote", frame)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "UNKNOWN_ACTION");
    }
}

// =============================================================================
// Browse and read
// =============================================================================

mod browse_and_read {
    use super::*;

    #[tokio::test]
    async fn test_browse_returns_a_paged_collection() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("limit", 2)
            .option("page", 1)
            .option("order", "name asc")
            .build();
        let response = executor
            .execute("users", "browse", frame)
            .await
            .expect("browse succeeds");

        let Payload::Collection(page) = response.payload else {
            panic!("browse must return a collection");
        };
        assert_eq!(page.items.len(), 2);
        assert_eq!(page.meta.total, 3);
        assert_eq!(page.meta.pages, 2);
        assert_eq!(
            page.items[0].get("name").and_then(|v| v.as_str()),
            Some("Ada Marsh")
        );
    }

    #[tokio::test]
    async fn test_browse_include_count_posts() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("include", "count.posts")
            .build();
        let response = executor
            .execute("users", "browse", frame)
            .await
            .expect("browse succeeds");

        let Payload::Collection(page) = response.payload else {
            panic!("browse must return a collection");
        };
        let ben = page
            .items
            .iter()
            .find(|item| item.get("slug") == Some(&json!("ben")))
            .expect("author present");
        assert_eq!(ben.pointer("/count/posts"), Some(&json!(2)));
    }

    #[tokio::test]
    async fn test_read_missing_user_yields_resource_specific_not_found() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .record("users", json!({"id": Uuid::new_v4().to_string()}))
            .build();
        let err = executor.execute("users", "read", frame).await.unwrap_err();
        assert_eq!(err.kind(), "NOT_FOUND");
        assert_eq!(err.to_string(), "User not found.");
    }

    #[tokio::test]
    async fn test_read_returns_exactly_the_contract_fields() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .record("users", json!({"slug": "ben"}))
            .build();
        let response = executor
            .execute("users", "read", frame)
            .await
            .expect("read succeeds");

        let Payload::Entity(user) = response.payload else {
            panic!("read must return an entity");
        };
        let mut keys: Vec<&str> = user
            .as_object()
            .expect("entity is an object")
            .keys()
            .map(String::as_str)
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, vec!["email", "id", "roles", "slug", "status"]);
        assert_eq!(user.get("email"), Some(&json!("ben@example.com")));
    }

    #[tokio::test]
    async fn test_read_without_lookup_field_is_invalid() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder().context(admin_context(&world)).build();
        let err = executor.execute("users", "read", frame).await.unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }
}

// =============================================================================
// Edit
// =============================================================================

mod edit {
    use super::*;

    #[tokio::test]
    async fn test_editing_safe_attribute_passes_baseline_permission() {
        let world = seed_world();
        let gate = RecordingGate::denying_unsafe();
        let executor = executor_for(&world.store, gate.clone());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("id", world.author.to_string())
            .record("users", json!({"name": "Benjamin Quill"}))
            .build();
        let response = executor
            .execute("users", "edit", frame)
            .await
            .expect("safe edit succeeds");

        assert_eq!(response.status, StatusCode::OK);
        let calls = gate.calls();
        assert_eq!(calls.len(), 1);
        assert!(calls[0].unsafe_attrs.is_empty());
    }

    #[tokio::test]
    async fn test_editing_unsafe_attribute_requires_elevated_permission() {
        let world = seed_world();
        let gate = RecordingGate::denying_unsafe();
        let executor = executor_for(&world.store, gate.clone());

        for record in [json!({"status": "locked"}), json!({"roles": ["Owner"]})] {
            let frame = Frame::builder()
                .context(admin_context(&world))
                .option("id", world.author.to_string())
                .record("users", record)
                .build();
            let err = executor.execute("users", "edit", frame).await.unwrap_err();
            assert_eq!(err.kind(), "NO_PERMISSION");
        }

        let calls = gate.calls();
        assert_eq!(calls[0].unsafe_attrs, vec!["status"]);
        assert_eq!(calls[1].unsafe_attrs, vec!["roles"]);

        let author = world
            .store
            .committed_user(&world.author)
            .expect("read")
            .expect("author still present");
        assert_eq!(author.status, UserStatus::Active);
    }

    #[tokio::test]
    async fn test_effective_edit_reports_cache_invalidation() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("id", world.author.to_string())
            .record("users", json!({"name": "Benjamin Quill"}))
            .build();
        let response = executor
            .execute("users", "edit", frame)
            .await
            .expect("edit succeeds");

        assert_eq!(response.headers.cache_invalidate, Some(true));
        let Payload::Entity(user) = response.payload else {
            panic!("edit must return the entity");
        };
        assert_eq!(user.get("name"), Some(&json!("Benjamin Quill")));
    }

    #[tokio::test]
    async fn test_noop_edit_succeeds_without_cache_invalidation() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("id", world.author.to_string())
            .record("users", json!({"name": "Ben Quill"}))
            .build();
        let response = executor
            .execute("users", "edit", frame)
            .await
            .expect("no-op edit still succeeds");

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.cache_invalidate, Some(false));
    }

    #[tokio::test]
    async fn test_edit_missing_user_yields_not_found() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(admin_context(&world))
            .option("id", Uuid::new_v4().to_string())
            .record("users", json!({"name": "Nobody"}))
            .build();
        let err = executor.execute("users", "edit", frame).await.unwrap_err();
        assert_eq!(err.kind(), "NOT_FOUND");
    }
}

// =============================================================================
// Change password
// =============================================================================

mod change_password {
    use super::*;

    fn password_record(world: &World, old: &str, new: &str) -> serde_json::Value {
        json!({
            "user_id": world.author.to_string(),
            "old_password": old,
            "new_password": new,
            "ne2_password": new,
        })
    }

    #[tokio::test]
    async fn test_missing_required_field_is_rejected() {
        let world = seed_world();
        let gate = RecordingGate::allowing();
        let executor = executor_for(&world.store, gate.clone());

        let frame = Frame::builder()
            .context(ActorContext::user(world.author, ["Editor"]))
            .record(
                "password",
                json!({"user_id": world.author.to_string(), "new_password": "next"}),
            )
            .build();
        let err = executor
            .execute("users", "change_password", frame)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "VALIDATION_ERROR");
        assert!(err.to_string().contains("ne2_password"));
        assert_eq!(gate.call_count(), 0);
    }

    #[tokio::test]
    async fn test_authorized_as_edit_scoped_to_the_target() {
        let world = seed_world();
        let author = world.author;
        let gate = RecordingGate::with(move |actor, check| {
            // only the author may edit the author
            if check.target.as_deref() == Some(author.to_string().as_str())
                && actor.actor_id() == Some(author)
            {
                Decision::Allowed
            } else {
                Decision::Denied
            }
        });
        let executor = executor_for(&world.store, gate.clone());

        let frame = Frame::builder()
            .context(ActorContext::user(world.author, ["Editor"]))
            .record("password", password_record(&world, "author-pass", "next-pass"))
            .build();
        executor
            .execute("users", "change_password", frame)
            .await
            .expect("own password change succeeds");

        let calls = gate.calls();
        assert_eq!(calls[0].action, "edit");
        assert_eq!(calls[0].resource, "users");
        assert_eq!(calls[0].target.as_deref(), Some(world.author.to_string().as_str()));

        let author = world
            .store
            .committed_user(&world.author)
            .expect("read")
            .expect("author present");
        assert_eq!(author.password, "next-pass");
    }

    #[tokio::test]
    async fn test_other_actor_without_edit_rights_on_target_is_denied() {
        let world = seed_world();
        let author = world.author;
        let gate = RecordingGate::with(move |actor, _check| {
            if actor.actor_id() == Some(author) {
                Decision::Allowed
            } else {
                Decision::Denied
            }
        });
        let executor = executor_for(&world.store, gate);

        let frame = Frame::builder()
            .context(admin_context(&world))
            .record("password", password_record(&world, "author-pass", "stolen"))
            .build();
        let err = executor
            .execute("users", "change_password", frame)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NO_PERMISSION");
        let author = world
            .store
            .committed_user(&world.author)
            .expect("read")
            .expect("author present");
        assert_eq!(author.password, "author-pass", "password must be untouched");
    }

    #[tokio::test]
    async fn test_wrong_old_password_is_a_validation_error() {
        let world = seed_world();
        let executor = executor_for(&world.store, RecordingGate::allowing());

        let frame = Frame::builder()
            .context(ActorContext::user(world.author, ["Editor"]))
            .record("password", password_record(&world, "wrong", "next-pass"))
            .build();
        let err = executor
            .execute("users", "change_password", frame)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "VALIDATION_ERROR");
    }
}

// =============================================================================
// Transfer ownership
// =============================================================================

mod transfer_ownership {
    use super::*;

    fn assign_role_gate(owner: Uuid) -> std::sync::Arc<RecordingGate> {
        RecordingGate::with(move |actor, check| {
            if check.action == "assign"
                && check.resource == "roles"
                && actor.actor_id() == Some(owner)
            {
                Decision::Allowed
            } else {
                Decision::Denied
            }
        })
    }

    #[tokio::test]
    async fn test_owner_can_transfer_ownership() {
        let world = seed_world();
        let gate = assign_role_gate(world.owner);
        let executor = executor_for(&world.store, gate.clone());

        let frame = Frame::builder()
            .context(ActorContext::user(world.owner, ["Owner"]))
            .record("owner", json!({"id": world.admin.to_string()}))
            .build();
        executor
            .execute("users", "transfer_ownership", frame)
            .await
            .expect("transfer succeeds");

        let calls = gate.calls();
        assert_eq!(calls[0].action, "assign");
        assert_eq!(calls[0].resource, "roles");
        assert!(calls[0].target.is_some(), "check is scoped to the Owner role");

        let old_owner = world
            .store
            .committed_user(&world.owner)
            .expect("read")
            .expect("present");
        let new_owner = world
            .store
            .committed_user(&world.admin)
            .expect("read")
            .expect("present");
        assert!(old_owner.has_role("Administrator"));
        assert!(new_owner.has_role("Owner"));
    }

    #[tokio::test]
    async fn test_non_owner_is_denied() {
        let world = seed_world();
        let executor = executor_for(&world.store, assign_role_gate(world.owner));

        let frame = Frame::builder()
            .context(admin_context(&world))
            .record("owner", json!({"id": world.admin.to_string()}))
            .build();
        let err = executor
            .execute("users", "transfer_ownership", frame)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NO_PERMISSION");
        let admin = world
            .store
            .committed_user(&world.admin)
            .expect("read")
            .expect("present");
        assert!(!admin.has_role("Owner"));
    }

    #[tokio::test]
    async fn test_missing_owner_role_definition_is_a_denial_not_a_crash() {
        init_tracing();
        // a store with users but no role definitions at all
        let store = std::sync::Arc::new(InMemoryStore::new());
        let user = User::new("Solo Act", "solo", "solo@example.com", "x").with_roles(["Owner"]);
        let user_id = user.id;
        store.seed_user(user).expect("seed user");

        let executor = executor_for(&store, RecordingGate::allowing());
        let frame = Frame::builder()
            .context(ActorContext::user(user_id, ["Owner"]))
            .record("owner", json!({"id": user_id.to_string()}))
            .build();
        let err = executor
            .execute("users", "transfer_ownership", frame)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "NO_PERMISSION");
        let PipelineError::NoPermission(denial) = err else {
            panic!("expected a permission denial");
        };
        assert!(denial.cause().is_some(), "the resolution failure is attached");
    }
}
