//! Integration tests for the unscoped-handle guard.

use std::sync::{Arc, Mutex};

use serde_json::json;
use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use vitrine_core::VitrineError;
use vitrine_core::query::{DataClient, Entity, FindArgs, Filter, Operation, into_record};
use vitrine_db::{DataLayer, GuardEvent, GuardMode, IsolationConfig};

async fn setup(config: IsolationConfig) -> DataLayer<Db> {
    let db: Surreal<Db> = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitrine_db::run_migrations(&db).await.unwrap();
    DataLayer::new(db, config)
}

#[tokio::test]
async fn strict_mode_rejects_every_operation_on_scoped_entities() {
    let data = setup(IsolationConfig::default().with_guard_mode(GuardMode::Strict)).await;
    let handle = data.unscoped();

    let err = handle
        .find_many(Entity::Product, FindArgs::default())
        .await
        .unwrap_err();
    assert!(
        matches!(&err, VitrineError::ScopeViolation { entity, operation }
            if entity == "product" && operation == "find_many"),
        "got {err:?}"
    );

    assert!(handle.count(Entity::Brand, Filter::All).await.is_err());
    assert!(
        handle
            .create(Entity::Category, into_record(json!({"slug": "x"})))
            .await
            .is_err()
    );
    assert!(handle.delete_many(Entity::AuditLog, Filter::All).await.is_err());

    // Nothing was written through the rejected create.
    let scoped_count = data
        .scoped(uuid::Uuid::new_v4())
        .count(Entity::Category, Filter::All)
        .await
        .unwrap();
    assert_eq!(scoped_count, 0);
}

#[tokio::test]
async fn warn_mode_proceeds_and_notifies_observer() {
    let seen: Arc<Mutex<Vec<GuardEvent>>> = Arc::default();
    let sink = Arc::clone(&seen);
    let data = setup(IsolationConfig::default().with_guard_mode(GuardMode::Warn))
        .await
        .with_observer(Arc::new(move |event: &GuardEvent| {
            sink.lock().unwrap().push(*event);
        }));
    let handle = data.unscoped();

    let row = handle
        .create(
            Entity::Brand,
            into_record(json!({"slug": "acme", "tenant_id": "legacy"})),
        )
        .await
        .unwrap();
    assert_eq!(row["tenant_id"], "legacy");
    assert_eq!(handle.count(Entity::Brand, Filter::All).await.unwrap(), 1);

    let events = seen.lock().unwrap().clone();
    assert_eq!(
        events,
        vec![
            GuardEvent {
                entity: Entity::Brand,
                operation: Operation::Create
            },
            GuardEvent {
                entity: Entity::Brand,
                operation: Operation::Count
            },
        ]
    );
}

#[tokio::test]
async fn off_mode_and_unscoped_entities_pass_silently() {
    let seen: Arc<Mutex<Vec<GuardEvent>>> = Arc::default();
    let sink = Arc::clone(&seen);

    let mut config = IsolationConfig::default().with_guard_mode(GuardMode::Strict);
    config.scoped_entities.remove(&Entity::AuditLog);
    let data = setup(config).await.with_observer(Arc::new(move |event: &GuardEvent| {
        sink.lock().unwrap().push(*event);
    }));

    // Not tenant-scoped under this configuration, so strict mode allows it.
    assert_eq!(
        data.unscoped()
            .count(Entity::AuditLog, Filter::All)
            .await
            .unwrap(),
        0
    );

    let off = setup(IsolationConfig::default().with_guard_mode(GuardMode::Off)).await;
    assert_eq!(
        off.unscoped()
            .count(Entity::Product, Filter::All)
            .await
            .unwrap(),
        0
    );
    assert!(seen.lock().unwrap().is_empty());
}
