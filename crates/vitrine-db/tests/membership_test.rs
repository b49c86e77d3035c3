//! Integration tests for memberships and the guarded owner transitions.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use vitrine_core::models::membership::CreateMembership;
use vitrine_core::models::role::{BuiltinRole, CreateRole, Role};
use vitrine_core::models::tenant::CreateTenant;
use vitrine_core::repository::{MembershipRepository, RoleRepository, TenantRepository};
use vitrine_core::{ConflictReason, VitrineError};
use vitrine_db::{SurrealMembershipRepository, SurrealRoleRepository, SurrealTenantRepository};

struct Fixture {
    tenant_id: Uuid,
    owner: Role,
    editor: Role,
    members: SurrealMembershipRepository<Db>,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitrine_db::run_migrations(&db).await.unwrap();

    let tenant = SurrealTenantRepository::new(db.clone())
        .create(CreateTenant {
            slug: "shop".into(),
            name: "Shop".into(),
            plan_id: None,
        })
        .await
        .unwrap();

    let roles = SurrealRoleRepository::new(db.clone());
    let mut created = Vec::new();
    for builtin in [BuiltinRole::Owner, BuiltinRole::Editor] {
        created.push(
            roles
                .create(CreateRole {
                    tenant_id: tenant.id,
                    key: builtin.key().into(),
                    name: builtin.default_name().into(),
                    description: builtin.default_description().into(),
                    builtin: true,
                    permission_keys: builtin.permission_keys(),
                })
                .await
                .unwrap(),
        );
    }
    let editor = created.pop().unwrap();
    let owner = created.pop().unwrap();

    Fixture {
        tenant_id: tenant.id,
        owner,
        editor,
        members: SurrealMembershipRepository::new(db),
    }
}

impl Fixture {
    async fn join(&self, role: &Role) -> Uuid {
        self.members
            .create(CreateMembership {
                tenant_id: self.tenant_id,
                user_id: Uuid::new_v4(),
                role_id: role.id,
            })
            .await
            .unwrap()
            .id
    }

    async fn owner_count(&self) -> u64 {
        self.members
            .count_with_role(self.tenant_id, self.owner.id)
            .await
            .unwrap()
    }
}

#[tokio::test]
async fn membership_lookup_and_uniqueness() {
    let fx = setup().await;
    let user_id = Uuid::new_v4();
    let m = fx
        .members
        .create(CreateMembership {
            tenant_id: fx.tenant_id,
            user_id,
            role_id: fx.editor.id,
        })
        .await
        .unwrap();

    let found = fx
        .members
        .get_for_user(fx.tenant_id, user_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, m.id);
    assert_eq!(fx.members.list_for_user(user_id).await.unwrap().len(), 1);
    assert!(
        fx.members
            .get_for_user(Uuid::new_v4(), user_id)
            .await
            .unwrap()
            .is_none()
    );

    let err = fx
        .members
        .create(CreateMembership {
            tenant_id: fx.tenant_id,
            user_id,
            role_id: fx.owner.id,
        })
        .await
        .unwrap_err();
    assert!(
        matches!(err, VitrineError::Conflict(ConflictReason::Duplicate { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn last_owner_cannot_be_demoted_or_removed() {
    let fx = setup().await;
    let first = fx.join(&fx.owner).await;

    let err = fx
        .members
        .change_role_guarded(fx.tenant_id, first, fx.editor.id)
        .await
        .unwrap_err();
    assert!(matches!(err, VitrineError::Conflict(ConflictReason::LastOwner)));

    let err = fx
        .members
        .remove_guarded(fx.tenant_id, first)
        .await
        .unwrap_err();
    assert!(matches!(err, VitrineError::Conflict(ConflictReason::LastOwner)));
    assert_eq!(fx.owner_count().await, 1);

    // Re-assigning OWNER to an owner is not a demotion.
    fx.members
        .change_role_guarded(fx.tenant_id, first, fx.owner.id)
        .await
        .unwrap();

    let second = fx.join(&fx.owner).await;
    fx.members.remove_guarded(fx.tenant_id, first).await.unwrap();
    assert_eq!(fx.owner_count().await, 1);

    let err = fx
        .members
        .remove_guarded(fx.tenant_id, second)
        .await
        .unwrap_err();
    assert!(matches!(err, VitrineError::Conflict(ConflictReason::LastOwner)));
}

#[tokio::test]
async fn non_owners_move_freely() {
    let fx = setup().await;
    fx.join(&fx.owner).await;
    let editor = fx.join(&fx.editor).await;

    let promoted = fx
        .members
        .change_role_guarded(fx.tenant_id, editor, fx.owner.id)
        .await
        .unwrap();
    assert_eq!(promoted.role_id, fx.owner.id);
    assert_eq!(fx.owner_count().await, 2);

    fx.members
        .change_role_guarded(fx.tenant_id, editor, fx.editor.id)
        .await
        .unwrap();
    fx.members.remove_guarded(fx.tenant_id, editor).await.unwrap();
    assert!(
        fx.members
            .get(fx.tenant_id, editor)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn guarded_calls_on_foreign_memberships_are_not_found() {
    let fx = setup().await;
    let owner = fx.join(&fx.owner).await;
    let elsewhere = Uuid::new_v4();

    assert!(
        fx.members
            .remove_guarded(elsewhere, owner)
            .await
            .unwrap_err()
            .is_not_found()
    );
    assert!(
        fx.members
            .change_role_guarded(elsewhere, owner, fx.editor.id)
            .await
            .unwrap_err()
            .is_not_found()
    );
}

#[tokio::test]
async fn concurrent_owner_removals_leave_an_owner() {
    let fx = setup().await;
    let a = fx.join(&fx.owner).await;
    let b = fx.join(&fx.owner).await;

    let (ra, rb) = tokio::join!(
        fx.members.remove_guarded(fx.tenant_id, a),
        fx.members.remove_guarded(fx.tenant_id, b),
    );

    let succeeded = [ra.is_ok(), rb.is_ok()].iter().filter(|ok| **ok).count();
    assert!(succeeded <= 1, "both removals committed");
    for result in [ra, rb] {
        if let Err(err) = result {
            assert!(
                matches!(
                    err,
                    VitrineError::Conflict(
                        ConflictReason::LastOwner | ConflictReason::ConcurrentModification
                    )
                ),
                "unexpected error {err:?}"
            );
        }
    }
    assert!(fx.owner_count().await >= 1);
}
