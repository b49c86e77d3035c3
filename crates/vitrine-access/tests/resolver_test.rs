//! Integration tests for tenant resolution.

use std::sync::Mutex;

use surrealdb::Surreal;
use surrealdb::engine::local::{Db, Mem};
use uuid::Uuid;
use vitrine_access::{AccessConfig, ResolutionSource, TenantResolver, TenantSelector};
use vitrine_core::identity::Identity;
use vitrine_core::models::membership::CreateMembership;
use vitrine_core::models::tenant::CreateTenant;
use vitrine_core::repository::{MembershipRepository, TenantRepository};
use vitrine_core::{VitrineError, VitrineResult};
use vitrine_db::{SurrealMembershipRepository, SurrealTenantRepository};

/// Selector backed by a fixed hint that records every write-back.
#[derive(Default)]
struct Selector {
    hint: Option<String>,
    fail: bool,
    persisted: Mutex<Vec<Uuid>>,
}

impl Selector {
    fn hinted(hint: impl ToString) -> Self {
        Self {
            hint: Some(hint.to_string()),
            ..Default::default()
        }
    }

    fn persisted(&self) -> Vec<Uuid> {
        self.persisted.lock().unwrap().clone()
    }
}

impl TenantSelector for Selector {
    fn hint(&self) -> Option<String> {
        self.hint.clone()
    }

    async fn persist(&self, tenant_id: Uuid) -> VitrineResult<()> {
        if self.fail {
            return Err(VitrineError::Internal("session store unavailable".into()));
        }
        self.persisted.lock().unwrap().push(tenant_id);
        Ok(())
    }
}

type Resolver = TenantResolver<SurrealMembershipRepository<Db>, SurrealTenantRepository<Db>>;

struct Fixture {
    db: Surreal<Db>,
    /// Created in this order: `a`, `b`, `c`.
    a: Uuid,
    b: Uuid,
    c: Uuid,
    /// Member of `a` (first) and `b`.
    user: Identity,
}

async fn setup() -> Fixture {
    let db = Surreal::new::<Mem>(()).await.unwrap();
    db.use_ns("test").use_db("test").await.unwrap();
    vitrine_db::run_migrations(&db).await.unwrap();

    let tenants = SurrealTenantRepository::new(db.clone());
    let mut ids = Vec::new();
    for slug in ["a", "b", "c"] {
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

    let user = Identity::user(Uuid::new_v4());
    let members = SurrealMembershipRepository::new(db.clone());
    for tenant_id in [ids[0], ids[1]] {
        members
            .create(CreateMembership {
                tenant_id,
                user_id: user.user_id,
                role_id: Uuid::new_v4(),
            })
            .await
            .unwrap();
    }

    Fixture {
        db,
        a: ids[0],
        b: ids[1],
        c: ids[2],
        user,
    }
}

impl Fixture {
    fn resolver(&self, config: AccessConfig) -> Resolver {
        TenantResolver::new(
            SurrealMembershipRepository::new(self.db.clone()),
            SurrealTenantRepository::new(self.db.clone()),
            config,
        )
    }
}

#[tokio::test]
async fn member_hint_is_used_without_write_back() {
    let fx = setup().await;
    let selector = Selector::hinted(fx.b);

    let r = fx
        .resolver(AccessConfig::default())
        .resolve(&fx.user, &selector)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(r.tenant_id, fx.b);
    assert_eq!(r.source, ResolutionSource::Hint);
    assert!(selector.persisted().is_empty());
}

#[tokio::test]
async fn bad_hints_fall_back_to_first_membership() {
    let fx = setup().await;
    let resolver = fx.resolver(AccessConfig::default());

    for selector in [
        Selector::default(),
        Selector::hinted("not-a-uuid"),
        Selector::hinted(fx.c),
    ] {
        let r = resolver.resolve(&fx.user, &selector).await.unwrap().unwrap();
        assert_eq!(r.tenant_id, fx.a);
        assert_eq!(r.source, ResolutionSource::FirstMembership);
        assert_eq!(selector.persisted(), vec![fx.a]);
    }
}

#[tokio::test]
async fn failed_write_back_does_not_fail_resolution() {
    let fx = setup().await;
    let selector = Selector {
        fail: true,
        ..Default::default()
    };
    let tenant = fx
        .resolver(AccessConfig::default())
        .resolve_tenant_id(&fx.user, &selector)
        .await
        .unwrap();
    assert_eq!(tenant, Some(fx.a));
}

#[tokio::test]
async fn users_without_memberships_get_no_tenant() {
    let fx = setup().await;
    let stranger = Identity::user(Uuid::new_v4());
    let selector = Selector::hinted(fx.a);

    let r = fx
        .resolver(AccessConfig::default())
        .resolve(&stranger, &selector)
        .await
        .unwrap();
    assert_eq!(r, None);
    assert!(selector.persisted().is_empty());
}

#[tokio::test]
async fn superuser_hint_must_name_an_existing_tenant() {
    let fx = setup().await;
    let root = Identity::superuser(Uuid::new_v4());
    let resolver = fx.resolver(AccessConfig::default());

    let r = resolver
        .resolve(&root, &Selector::hinted(fx.c))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(r.tenant_id, fx.c);
    assert_eq!(r.source, ResolutionSource::Hint);

    let selector = Selector::hinted(Uuid::new_v4());
    let r = resolver.resolve(&root, &selector).await.unwrap().unwrap();
    assert_eq!(r.tenant_id, fx.a, "earliest tenant");
    assert_eq!(r.source, ResolutionSource::SuperuserFallback);
    assert_eq!(selector.persisted(), vec![fx.a]);
}

#[tokio::test]
async fn superuser_fallback_can_be_disabled() {
    let fx = setup().await;
    let root = Identity::superuser(Uuid::new_v4());
    let resolver = fx.resolver(AccessConfig {
        super_fallback_enabled: false,
    });

    assert_eq!(
        resolver.resolve(&root, &Selector::default()).await.unwrap(),
        None
    );
}
