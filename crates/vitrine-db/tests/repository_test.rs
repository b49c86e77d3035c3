//! Integration tests for the tenant, user, permission and role repositories.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use vitrine_core::identity::SystemRole;
use vitrine_core::models::permission::PERMISSION_CATALOG;
use vitrine_core::models::role::{CreateRole, UpdateRole};
use vitrine_core::models::tenant::{CreateTenant, UpdateTenant};
use vitrine_core::models::user::CreateUser;
use vitrine_core::repository::{
    Pagination, PermissionRepository, RoleRepository, TenantRepository, UserRepository,
};
use vitrine_core::{ConflictReason, VitrineError};
use vitrine_db::{
    SurrealPermissionRepository, SurrealRoleRepository, SurrealTenantRepository,
    SurrealUserRepository,
};

async fn setup() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitrine_db::run_migrations(&db).await.unwrap();
    db
}

fn tenant_input(slug: &str) -> CreateTenant {
    CreateTenant {
        slug: slug.into(),
        name: format!("Shop {slug}"),
        plan_id: None,
    }
}

#[tokio::test]
async fn tenant_crud_and_ordering() {
    let repo = SurrealTenantRepository::new(setup().await);

    let first = repo.create(tenant_input("alpha")).await.unwrap();
    let second = repo.create(tenant_input("beta")).await.unwrap();

    assert_eq!(repo.get_by_id(first.id).await.unwrap().slug, "alpha");
    assert_eq!(repo.get_by_slug("beta").await.unwrap().id, second.id);
    assert!(repo.get_by_slug("gamma").await.unwrap_err().is_not_found());
    assert_eq!(repo.earliest().await.unwrap().unwrap().id, first.id);

    let page = repo.list(Pagination::default()).await.unwrap();
    assert_eq!(page.total, 2);
    assert_eq!(page.items[0].id, first.id);

    let updated = repo
        .update(
            first.id,
            UpdateTenant {
                name: Some("Alpha Store".into()),
                plan_id: Some(Some("pro".into())),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Alpha Store");
    assert_eq!(updated.plan_id.as_deref(), Some("pro"));

    let cleared = repo
        .update(
            first.id,
            UpdateTenant {
                plan_id: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cleared.plan_id, None);
    assert_eq!(cleared.name, "Alpha Store");

    let err = repo.create(tenant_input("alpha")).await.unwrap_err();
    assert!(
        matches!(err, VitrineError::Conflict(ConflictReason::Duplicate { .. })),
        "got {err:?}"
    );
}

#[tokio::test]
async fn malformed_tenant_slug_is_rejected() {
    let repo = SurrealTenantRepository::new(setup().await);
    let err = repo.create(tenant_input("Bad Slug")).await.unwrap_err();
    assert!(
        matches!(&err, VitrineError::Validation { field, .. } if field == "slug"),
        "got {err:?}"
    );
}

#[tokio::test]
async fn empty_store_has_no_earliest_tenant() {
    let repo = SurrealTenantRepository::new(setup().await);
    assert!(repo.earliest().await.unwrap().is_none());
}

#[tokio::test]
async fn user_passwords_are_hashed_and_verifiable() {
    let repo = SurrealUserRepository::with_pepper(setup().await, "pepper".into());

    let user = repo
        .create(CreateUser {
            email: "ops@example.com".into(),
            name: Some("Ops".into()),
            password: "correct horse".into(),
            system_role: SystemRole::Superuser,
        })
        .await
        .unwrap();

    assert_ne!(user.password_hash, "correct horse");
    assert!(user.identity().is_superuser());
    assert!(repo.verify(&user, "correct horse").unwrap());
    assert!(!repo.verify(&user, "wrong").unwrap());

    let fetched = repo.get_by_email("ops@example.com").await.unwrap();
    assert_eq!(fetched.id, user.id);
    assert_eq!(repo.get_by_id(user.id).await.unwrap().email, "ops@example.com");
    assert_eq!(repo.list(Pagination::default()).await.unwrap().total, 1);
    assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn permission_catalog_seeding_is_idempotent() {
    let repo = SurrealPermissionRepository::new(setup().await);

    let inserted = vitrine_db::seed_permission_catalog(&repo).await.unwrap();
    assert_eq!(inserted as usize, PERMISSION_CATALOG.len());
    assert_eq!(vitrine_db::seed_permission_catalog(&repo).await.unwrap(), 0);

    let renamed = repo
        .ensure_catalog(&[("product.read", "Browse products")])
        .await
        .unwrap();
    assert_eq!(renamed, 0);
    let all = repo.list().await.unwrap();
    assert_eq!(all.len(), PERMISSION_CATALOG.len());
    let product_read = all.iter().find(|p| p.key == "product.read").unwrap();
    assert_eq!(product_read.name, "Browse products");

    let mut found = repo
        .existing_keys(&["product.read".into(), "nope.read".into(), "role.write".into()])
        .await
        .unwrap();
    found.sort();
    assert_eq!(found, vec!["product.read", "role.write"]);
}

#[tokio::test]
async fn role_permissions_are_replaced_wholesale() {
    let db = setup().await;
    let tenants = SurrealTenantRepository::new(db.clone());
    let roles = SurrealRoleRepository::new(db);
    let tenant = tenants.create(tenant_input("shop")).await.unwrap();

    let role = roles
        .create(CreateRole {
            tenant_id: tenant.id,
            key: "editor-lite".into(),
            name: "Editor lite".into(),
            description: String::new(),
            builtin: false,
            permission_keys: vec!["product.write".into(), "product.read".into()],
        })
        .await
        .unwrap();
    assert_eq!(
        roles.permission_keys(tenant.id, role.id).await.unwrap(),
        vec!["product.read", "product.write"]
    );
    assert_eq!(
        roles
            .get_by_key(tenant.id, "editor-lite")
            .await
            .unwrap()
            .unwrap()
            .id,
        role.id
    );

    roles
        .replace_permissions(tenant.id, role.id, &["brand.read".into()])
        .await
        .unwrap();
    assert_eq!(
        roles.permission_keys(tenant.id, role.id).await.unwrap(),
        vec!["brand.read"]
    );

    let renamed = roles
        .update(
            tenant.id,
            role.id,
            UpdateRole {
                name: Some("Brand viewer".into()),
                description: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Brand viewer");
    assert_eq!(renamed.key, "editor-lite");

    // Another tenant cannot see or touch it.
    let other = tenants.create(tenant_input("other")).await.unwrap();
    assert!(roles.get_by_id(other.id, role.id).await.unwrap_err().is_not_found());
    assert!(roles.get_by_key(other.id, "editor-lite").await.unwrap().is_none());
    assert!(roles.delete(other.id, role.id).await.unwrap_err().is_not_found());

    roles.delete(tenant.id, role.id).await.unwrap();
    assert!(roles.list(tenant.id).await.unwrap().is_empty());
    assert!(
        roles
            .permission_keys(tenant.id, role.id)
            .await
            .unwrap()
            .is_empty()
    );
}
