//! SurrealDB connection management.

use std::sync::Arc;

use serde::Deserialize;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::{Client, Ws};
use surrealdb::opt::auth::Root;
use tracing::info;

use crate::isolation::{DataLayer, IsolationConfig};
use crate::repository::{
    SurrealMembershipRepository, SurrealPermissionRepository, SurrealRoleRepository,
    SurrealTenantRepository, SurrealUserRepository,
};

/// Configuration for connecting to SurrealDB.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DbConfig {
    /// WebSocket URL (e.g., `127.0.0.1:8000`).
    pub url: String,
    /// SurrealDB namespace.
    pub namespace: String,
    /// SurrealDB database name.
    pub database: String,
    /// Root username for authentication.
    pub username: String,
    /// Root password for authentication.
    pub password: String,
    /// Optional server-side pepper for password hashing.
    pub pepper: Option<String>,
}

impl Default for DbConfig {
    fn default() -> Self {
        Self {
            url: "127.0.0.1:8000".into(),
            namespace: "vitrine".into(),
            database: "main".into(),
            username: "root".into(),
            password: "root".into(),
            pepper: None,
        }
    }
}

/// A connection to SurrealDB plus the handles built on top of it.
///
/// Cloning is cheap; every clone shares the underlying connection.
#[derive(Clone)]
pub struct DbManager {
    db: Surreal<Client>,
    pepper: Option<String>,
    isolation: Arc<IsolationConfig>,
}

impl DbManager {
    /// Connect to SurrealDB using the provided configuration.
    ///
    /// Authenticates as root, selects the configured namespace and
    /// database, and returns a ready-to-use manager.
    pub async fn connect(
        config: &DbConfig,
        isolation: IsolationConfig,
    ) -> Result<Self, surrealdb::Error> {
        info!(
            url = %config.url,
            namespace = %config.namespace,
            database = %config.database,
            "Connecting to SurrealDB"
        );

        let db = Surreal::new::<Ws>(&config.url).await?;

        db.signin(Root {
            username: config.username.clone(),
            password: config.password.clone(),
        })
        .await?;

        db.use_ns(&config.namespace)
            .use_db(&config.database)
            .await?;

        info!(
            lookup_policy = ?isolation.lookup_policy,
            guard_mode = ?isolation.guard_mode,
            "Successfully connected to SurrealDB"
        );

        Ok(Self {
            db,
            pepper: config.pepper.clone(),
            isolation: Arc::new(isolation),
        })
    }

    /// Returns a reference to the underlying SurrealDB client.
    pub fn client(&self) -> &Surreal<Client> {
        &self.db
    }

    /// Guarded entry point for tenant-scoped entity data.
    pub fn data(&self) -> DataLayer<Client> {
        DataLayer::with_shared_config(self.db.clone(), Arc::clone(&self.isolation))
    }

    pub fn tenants(&self) -> SurrealTenantRepository<Client> {
        SurrealTenantRepository::new(self.db.clone())
    }

    pub fn users(&self) -> SurrealUserRepository<Client> {
        match &self.pepper {
            Some(pepper) => SurrealUserRepository::with_pepper(self.db.clone(), pepper.clone()),
            None => SurrealUserRepository::new(self.db.clone()),
        }
    }

    pub fn memberships(&self) -> SurrealMembershipRepository<Client> {
        SurrealMembershipRepository::new(self.db.clone())
    }

    pub fn roles(&self) -> SurrealRoleRepository<Client> {
        SurrealRoleRepository::new(self.db.clone())
    }

    pub fn permissions(&self) -> SurrealPermissionRepository<Client> {
        SurrealPermissionRepository::new(self.db.clone())
    }
}
