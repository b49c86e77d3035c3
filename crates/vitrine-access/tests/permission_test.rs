//! Integration tests for permission resolution against in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use vitrine_access::PermissionEngine;
use vitrine_core::VitrineError;
use vitrine_core::identity::Identity;
use vitrine_core::models::membership::CreateMembership;
use vitrine_core::models::role::CreateRole;
use vitrine_core::models::tenant::CreateTenant;
use vitrine_core::repository::{MembershipRepository, RoleRepository, TenantRepository};
use vitrine_db::{SurrealMembershipRepository, SurrealRoleRepository, SurrealTenantRepository};

type Engine = PermissionEngine<SurrealMembershipRepository<Db>, SurrealRoleRepository<Db>>;

struct Fixture {
    engine: Engine,
    roles: SurrealRoleRepository<Db>,
    tenant_id: Uuid,
    other_tenant: Uuid,
    role_id: Uuid,
    writer: Identity,
}

/// One tenant with a member whose role grants only `product.write`.
async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitrine_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let mut ids = Vec::new();
    for slug in ["shop", "other"] {
        let tenant = tenants
            .create(CreateTenant {
                slug: slug.into(),
                name: slug.into(),
                plan_id: None,
            })
            .await
            .unwrap();
        ids.push(tenant.id);
    }

    let roles = SurrealRoleRepository::new(db.clone());
    let members = SurrealMembershipRepository::new(db.clone());
    let role = roles
        .create(CreateRole {
            tenant_id: ids[0],
            key: "writer".into(),
            name: "Writer".into(),
            description: String::new(),
            builtin: false,
            permission_keys: vec!["product.write".into()],
        })
        .await
        .unwrap();

    let writer = Identity::user(Uuid::new_v4());
    members
        .create(CreateMembership {
            tenant_id: ids[0],
            user_id: writer.user_id,
            role_id: role.id,
        })
        .await
        .unwrap();

    Fixture {
        engine: PermissionEngine::new(members, roles.clone()),
        roles,
        tenant_id: ids[0],
        other_tenant: ids[1],
        role_id: role.id,
        writer,
    }
}

#[tokio::test]
async fn keys_match_exactly() {
    let fx = setup().await;
    let (engine, t) = (&fx.engine, Some(fx.tenant_id));

    assert!(engine.can(&fx.writer, "product.write", t).await.unwrap());
    assert!(!engine.can(&fx.writer, "product.read", t).await.unwrap());
    assert!(!engine.can(&fx.writer, "product", t).await.unwrap());
    assert!(
        engine
            .can_any(&fx.writer, &["product.read", "product.write"], t)
            .await
            .unwrap()
    );
    assert!(!engine.can_any(&fx.writer, &[], t).await.unwrap());
}

#[tokio::test]
async fn checks_fail_closed_outside_memberships() {
    let fx = setup().await;
    let engine = &fx.engine;

    assert!(!engine.can(&fx.writer, "product.write", None).await.unwrap());
    assert!(
        !engine
            .can(&fx.writer, "product.write", Some(fx.other_tenant))
            .await
            .unwrap()
    );
    let stranger = Identity::user(Uuid::new_v4());
    assert!(
        engine
            .granted_keys(&stranger, fx.tenant_id)
            .await
            .unwrap()
            .is_empty()
    );

    let err = engine
        .require(&fx.writer, "product.read", Some(fx.tenant_id))
        .await
        .unwrap_err();
    assert!(matches!(err, VitrineError::AuthorizationDenied { .. }));
    assert!(
        engine
            .require_any(&fx.writer, &["brand.read", "brand.write"], Some(fx.tenant_id))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn superuser_bypasses_tenant_data() {
    let fx = setup().await;
    let root = Identity::superuser(Uuid::new_v4());

    assert!(fx.engine.can(&root, "settings.write", None).await.unwrap());
    assert!(
        fx.engine
            .can(&root, "anything", Some(Uuid::new_v4()))
            .await
            .unwrap()
    );
    fx.engine.require(&root, "role.write", None).await.unwrap();
}

#[tokio::test]
async fn memo_is_stable_for_the_request() {
    let fx = setup().await;
    let memo = fx.engine.memo(fx.writer);
    let t = Some(fx.tenant_id);

    assert!(memo.can("product.write", t).await.unwrap());
    assert!(!memo.can("product.read", t).await.unwrap());
    assert!(!memo.can("product.write", None).await.unwrap());

    fx.roles
        .replace_permissions(fx.tenant_id, fx.role_id, &["product.read".into()])
        .await
        .unwrap();

    // The memo keeps the set it loaded; a fresh check sees the change.
    assert!(memo.can("product.write", t).await.unwrap());
    assert!(!fx.engine.can(&fx.writer, "product.write", t).await.unwrap());
    assert!(fx.engine.memo(fx.writer).can("product.read", t).await.unwrap());
    assert!(memo.require("product.read", t).await.is_err());
}
