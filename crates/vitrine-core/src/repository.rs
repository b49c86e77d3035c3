//! Repository trait definitions for the identity and access tables.
//!
//! All repository operations are async. Tenant-scoped repositories take a
//! `tenant_id` parameter on every call; a row that exists only under another
//! tenant is reported as `NotFound`.

use uuid::Uuid;

use crate::error::VitrineResult;
use crate::models::{
    membership::{CreateMembership, Membership},
    permission::Permission,
    role::{CreateRole, Role, UpdateRole},
    tenant::{CreateTenant, Tenant, UpdateTenant},
    user::{CreateUser, User},
};

/// Pagination parameters for list queries.
#[derive(Debug, Clone)]
pub struct Pagination {
    pub offset: u64,
    pub limit: u64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

/// A paginated result set.
#[derive(Debug, Clone)]
pub struct PaginatedResult<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: u64,
}

// ---------------------------------------------------------------------------
// Global scope
// ---------------------------------------------------------------------------

pub trait TenantRepository: Send + Sync {
    fn create(&self, input: CreateTenant) -> impl Future<Output = VitrineResult<Tenant>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = VitrineResult<Tenant>> + Send;
    fn get_by_slug(&self, slug: &str) -> impl Future<Output = VitrineResult<Tenant>> + Send;
    fn update(
        &self,
        id: Uuid,
        input: UpdateTenant,
    ) -> impl Future<Output = VitrineResult<Tenant>> + Send;
    /// Oldest first.
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = VitrineResult<PaginatedResult<Tenant>>> + Send;
    /// The earliest-created tenant, if any exist.
    fn earliest(&self) -> impl Future<Output = VitrineResult<Option<Tenant>>> + Send;
}

pub trait UserRepository: Send + Sync {
    fn create(&self, input: CreateUser) -> impl Future<Output = VitrineResult<User>> + Send;
    fn get_by_id(&self, id: Uuid) -> impl Future<Output = VitrineResult<User>> + Send;
    fn get_by_email(&self, email: &str) -> impl Future<Output = VitrineResult<User>> + Send;
    fn list(
        &self,
        pagination: Pagination,
    ) -> impl Future<Output = VitrineResult<PaginatedResult<User>>> + Send;
}

/// The global permission catalog.
pub trait PermissionRepository: Send + Sync {
    /// Insert missing `(key, name)` entries and refresh names of existing
    /// ones. Returns the number of newly inserted keys.
    fn ensure_catalog(
        &self,
        entries: &[(&str, &str)],
    ) -> impl Future<Output = VitrineResult<u64>> + Send;
    fn list(&self) -> impl Future<Output = VitrineResult<Vec<Permission>>> + Send;
    /// The subset of `keys` present in the catalog.
    fn existing_keys(
        &self,
        keys: &[String],
    ) -> impl Future<Output = VitrineResult<Vec<String>>> + Send;
}

// ---------------------------------------------------------------------------
// Tenant scope
// ---------------------------------------------------------------------------

pub trait RoleRepository: Send + Sync {
    /// Creates the role and its permission assignments atomically.
    fn create(&self, input: CreateRole) -> impl Future<Output = VitrineResult<Role>> + Send;
    fn get_by_id(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VitrineResult<Role>> + Send;
    fn get_by_key(
        &self,
        tenant_id: Uuid,
        key: &str,
    ) -> impl Future<Output = VitrineResult<Option<Role>>> + Send;
    fn list(&self, tenant_id: Uuid) -> impl Future<Output = VitrineResult<Vec<Role>>> + Send;
    /// Name/description only.
    fn update(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        input: UpdateRole,
    ) -> impl Future<Output = VitrineResult<Role>> + Send;
    /// Delete-all-then-insert of the role's permission keys, in one
    /// transaction.
    fn replace_permissions(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        keys: &[String],
    ) -> impl Future<Output = VitrineResult<()>> + Send;
    fn permission_keys(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VitrineResult<Vec<String>>> + Send;
    /// Removes the role and its permission assignments.
    fn delete(&self, tenant_id: Uuid, id: Uuid) -> impl Future<Output = VitrineResult<()>> + Send;
}

pub trait MembershipRepository: Send + Sync {
    fn create(
        &self,
        input: CreateMembership,
    ) -> impl Future<Output = VitrineResult<Membership>> + Send;
    fn get(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VitrineResult<Membership>> + Send;
    fn get_for_user(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = VitrineResult<Option<Membership>>> + Send;
    fn list(&self, tenant_id: Uuid)
    -> impl Future<Output = VitrineResult<Vec<Membership>>> + Send;
    /// Every membership of a user across tenants, oldest first.
    fn list_for_user(
        &self,
        user_id: Uuid,
    ) -> impl Future<Output = VitrineResult<Vec<Membership>>> + Send;
    fn count_with_role(
        &self,
        tenant_id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = VitrineResult<u64>> + Send;
    /// Reassigns the role. Atomically rechecks the owner count and fails
    /// with `Conflict(LastOwner)` when this would demote the tenant's last
    /// OWNER.
    fn change_role_guarded(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        role_id: Uuid,
    ) -> impl Future<Output = VitrineResult<Membership>> + Send;
    /// Deletes the membership under the same atomic last-owner recheck.
    fn remove_guarded(
        &self,
        tenant_id: Uuid,
        id: Uuid,
    ) -> impl Future<Output = VitrineResult<()>> + Send;
}
