//! Integration tests for schema initialization using in-memory SurrealDB.

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};

async fn migrated() -> Surreal<Db> {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitrine_db::run_migrations(&db).await.unwrap();
    db
}

#[tokio::test]
async fn schema_migration_applies_successfully() {
    let db = migrated().await;

    let mut result = db.query("INFO FOR DB").await.unwrap();
    let info: Option<surrealdb_types::Value> = result.take(0).unwrap();
    let info = info.expect("INFO FOR DB should return a value");
    let info_str = format!("{:?}", info);

    for table in [
        "tenant",
        "user",
        "permission",
        "role",
        "role_permission",
        "membership",
        "category",
        "brand",
        "product",
        "product_image",
        "tenant_branding",
        "audit_log",
        "feature_override",
        "_migration",
    ] {
        assert!(info_str.contains(table), "missing {table} table");
    }
}

#[tokio::test]
async fn migration_is_idempotent() {
    let db = migrated().await;
    vitrine_db::run_migrations(&db).await.unwrap();

    let mut result = db.query("SELECT * FROM _migration").await.unwrap();
    let records: Vec<surrealdb_types::Value> = result.take(0).unwrap();
    assert_eq!(
        records.len(),
        vitrine_db::latest_version() as usize,
        "expected one record per migration"
    );
}

#[tokio::test]
async fn unique_index_prevents_duplicate_tenant_slugs() {
    let db = migrated().await;

    db.query("CREATE tenant SET name = 'Acme', slug = 'acme'")
        .await
        .unwrap()
        .check()
        .unwrap();

    let result = db
        .query("CREATE tenant SET name = 'Other Acme', slug = 'acme'")
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "duplicate slug should be rejected");
}

#[tokio::test]
async fn entity_slugs_are_unique_per_tenant_only() {
    let db = migrated().await;

    let create = |tenant: &'static str, uid: &'static str| {
        let db = db.clone();
        async move {
            db.query(
                "CREATE product CONTENT { uid: $uid, tenant_id: $tenant, slug: 'boots' } \
                 RETURN NONE",
            )
            .bind(("uid", uid))
            .bind(("tenant", tenant))
            .await
            .unwrap()
            .check()
        }
    };

    assert!(create("t1", "p1").await.is_ok());
    assert!(create("t2", "p2").await.is_ok(), "other tenant may reuse the slug");
    assert!(create("t1", "p3").await.is_err(), "same tenant may not");
}

#[tokio::test]
async fn system_role_is_constrained() {
    let db = migrated().await;

    let result = db
        .query(
            "CREATE user SET email = 'a@example.com', password_hash = 'x', \
             system_role = 'ROOT'",
        )
        .await
        .unwrap()
        .check();
    assert!(result.is_err(), "unknown system role should be rejected");
}
