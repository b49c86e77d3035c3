//! SurrealDB implementation of [`MembershipRepository`].
//!
//! Owner-affecting writes run as one transaction that first bumps the
//! tenant's `owner_guard` counter. Two such transactions on the same tenant
//! therefore write the same record and cannot both commit, which closes the
//! read-then-act window on the owner count.

use chrono::{DateTime, Utc};
use surrealdb::{Connection, Surreal};
use surrealdb_types::SurrealValue;
use uuid::Uuid;
use vitrine_core::error::{ConflictReason, VitrineError, VitrineResult};
use vitrine_core::models::membership::{CreateMembership, Membership};
use vitrine_core::repository::MembershipRepository;

use super::CountRow;
use crate::error::{DbError, parse_uuid};

#[derive(Debug, SurrealValue)]
struct MembershipRow {
    record_id: String,
    tenant_id: String,
    user_id: String,
    role_id: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MembershipRow {
    fn try_into_membership(self) -> Result<Membership, DbError> {
        Ok(Membership {
            id: parse_uuid("membership", "id", &self.record_id)?,
            tenant_id: parse_uuid("membership", "tenant_id", &self.tenant_id)?,
            user_id: parse_uuid("membership", "user_id", &self.user_id)?,
            role_id: parse_uuid("membership", "role_id", &self.role_id)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Shared prologue of the guarded transactions: serialise on the tenant and
/// collect the OWNER role ids and the current owner memberships.
const OWNER_GUARD_PROLOGUE: &str = "\
BEGIN TRANSACTION;
UPDATE type::record('tenant', $tenant_id) SET owner_guard += 1 RETURN NONE;
LET $owner_roles = (SELECT VALUE meta::id(id) FROM role \
    WHERE tenant_id = $tenant_id AND key = 'OWNER');
LET $owners = (SELECT VALUE id FROM membership \
    WHERE tenant_id = $tenant_id AND role_id IN $owner_roles);
";

const CHANGE_ROLE_GUARDED: &str = "\
UPDATE type::record('membership', $id) \
    SET role_id = $role_id, updated_at = time::now() \
    WHERE tenant_id = $tenant_id AND (\
        role_id NOT IN $owner_roles \
        OR $role_id IN $owner_roles \
        OR array::len($owners) > 1\
    ) RETURN NONE;
COMMIT TRANSACTION;
";

const REMOVE_GUARDED: &str = "\
DELETE type::record('membership', $id) \
    WHERE tenant_id = $tenant_id AND (\
        role_id NOT IN $owner_roles \
        OR array::len($owners) > 1\
    );
COMMIT TRANSACTION;
";

/// Why a guarded role change left the membership off the requested role.
/// Only an owner being demoted while no other owner exists is a guard refusal;
/// anything else means another writer got there in between.
fn refusal_reason(holds_owner: bool, grants_owner: bool, owners: u64) -> ConflictReason {
    if holds_owner && !grants_owner && owners <= 1 {
        ConflictReason::LastOwner
    } else {
        ConflictReason::ConcurrentModification
    }
}

/// SurrealDB implementation of the Membership repository.
#[derive(Clone)]
pub struct SurrealMembershipRepository<C: Connection> {
    db: Surreal<C>,
}

impl<C: Connection> SurrealMembershipRepository<C> {
    pub fn new(db: Surreal<C>) -> Self {
        Self { db }
    }

    async fn fetch_many(
        &self,
        filter: &str,
        binds: Vec<(&'static str, String)>,
    ) -> VitrineResult<Vec<Membership>> {
        let query = format!(
            "SELECT meta::id(id) AS record_id, * FROM membership \
             WHERE {filter} ORDER BY created_at ASC"
        );
        let mut builder = self.db.query(query);
        for bind in binds {
            builder = builder.bind(bind);
        }
        let mut result = builder.await.map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .map(MembershipRow::try_into_membership)
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    async fn find(&self, tenant_id: Uuid, id: Uuid) -> VitrineResult<Option<Membership>> {
        let mut result = self
            .db
            .query(
                "SELECT meta::id(id) AS record_id, * FROM type::record('membership', $id) \
                 WHERE tenant_id = $tenant_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<MembershipRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows
            .into_iter()
            .next()
            .map(MembershipRow::try_into_membership)
            .transpose()?)
    }

    async fn owner_role_ids(&self, tenant_id: Uuid) -> VitrineResult<Vec<Uuid>> {
        let mut result = self
            .db
            .query(
                "SELECT VALUE meta::id(id) FROM role \
                 WHERE tenant_id = $tenant_id AND key = 'OWNER'",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let ids: Vec<String> = result.take(0).map_err(DbError::from)?;
        Ok(ids
            .iter()
            .map(|id| parse_uuid("role", "id", id))
            .collect::<Result<Vec<_>, DbError>>()?)
    }

    /// Classifies a role change the guarded transaction did not apply.
    async fn refusal(
        &self,
        tenant_id: Uuid,
        current: &Membership,
        role_id: Uuid,
    ) -> VitrineResult<ConflictReason> {
        let owner_roles = self.owner_role_ids(tenant_id).await?;
        let mut owners = 0;
        for owner_role in &owner_roles {
            owners += self.count_with_role(tenant_id, *owner_role).await?;
        }
        Ok(refusal_reason(
            owner_roles.contains(&current.role_id),
            owner_roles.contains(&role_id),
            owners,
        ))
    }
}

impl<C: Connection> MembershipRepository for SurrealMembershipRepository<C> {
    async fn create(&self, input: CreateMembership) -> VitrineResult<Membership> {
        let id = Uuid::new_v4();

        self.db
            .query(
                "CREATE type::record('membership', $id) SET \
                 tenant_id = $tenant_id, user_id = $user_id, role_id = $role_id",
            )
            .bind(("id", id.to_string()))
            .bind(("tenant_id", input.tenant_id.to_string()))
            .bind(("user_id", input.user_id.to_string()))
            .bind(("role_id", input.role_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("membership", e))?;

        self.get(input.tenant_id, id).await
    }

    async fn get(&self, tenant_id: Uuid, id: Uuid) -> VitrineResult<Membership> {
        self.find(tenant_id, id)
            .await?
            .ok_or_else(|| VitrineError::not_found("membership", id))
    }

    async fn get_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> VitrineResult<Option<Membership>> {
        let rows = self
            .fetch_many(
                "tenant_id = $tenant_id AND user_id = $user_id",
                vec![
                    ("tenant_id", tenant_id.to_string()),
                    ("user_id", user_id.to_string()),
                ],
            )
            .await?;
        Ok(rows.into_iter().next())
    }

    async fn list(&self, tenant_id: Uuid) -> VitrineResult<Vec<Membership>> {
        self.fetch_many(
            "tenant_id = $tenant_id",
            vec![("tenant_id", tenant_id.to_string())],
        )
        .await
    }

    async fn list_for_user(&self, user_id: Uuid) -> VitrineResult<Vec<Membership>> {
        self.fetch_many(
            "user_id = $user_id",
            vec![("user_id", user_id.to_string())],
        )
        .await
    }

    async fn count_with_role(&self, tenant_id: Uuid, role_id: Uuid) -> VitrineResult<u64> {
        let mut result = self
            .db
            .query(
                "SELECT count() AS total FROM membership \
                 WHERE tenant_id = $tenant_id AND role_id = $role_id GROUP ALL",
            )
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?;

        let rows: Vec<CountRow> = result.take(0).map_err(DbError::from)?;
        Ok(rows.first().map(|r| r.total).unwrap_or(0))
    }

    async fn change_role_guarded(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        role_id: Uuid,
    ) -> VitrineResult<Membership> {
        self.get(tenant_id, id).await?;

        self.db
            .query(format!("{OWNER_GUARD_PROLOGUE}{CHANGE_ROLE_GUARDED}"))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("id", id.to_string()))
            .bind(("role_id", role_id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("membership", e))?;

        let after = self.get(tenant_id, id).await?;
        if after.role_id != role_id {
            let reason = self.refusal(tenant_id, &after, role_id).await?;
            return Err(VitrineError::Conflict(reason));
        }
        Ok(after)
    }

    async fn remove_guarded(&self, tenant_id: Uuid, id: Uuid) -> VitrineResult<()> {
        self.get(tenant_id, id).await?;

        self.db
            .query(format!("{OWNER_GUARD_PROLOGUE}{REMOVE_GUARDED}"))
            .bind(("tenant_id", tenant_id.to_string()))
            .bind(("id", id.to_string()))
            .await
            .map_err(DbError::from)?
            .check()
            .map_err(|e| DbError::statement("membership", e))?;

        if self.find(tenant_id, id).await?.is_some() {
            return Err(VitrineError::Conflict(ConflictReason::LastOwner));
        }
        Ok(())
    }
}
