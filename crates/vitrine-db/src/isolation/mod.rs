//! Tenant isolation over the shared entity tables.
//!
//! [`DataLayer`] is the only public way to reach entity data: `scoped`
//! yields a [`ScopedClient`] bound to one tenant, `unscoped` yields the raw
//! store wrapped in an [`UnscopedGuard`].

mod config;
mod guard;
mod scoped;

use std::sync::Arc;

use surrealdb::{Connection, Surreal};
use uuid::Uuid;
use vitrine_core::query::TenantScopes;

use crate::client::SurrealDataClient;

pub use config::{GuardMode, IsolationConfig, LookupPolicy};
pub use guard::{GuardEvent, GuardObserver, UnscopedGuard};
pub use scoped::ScopedClient;

/// Factory for scoped and guarded unscoped handles over one connection.
pub struct DataLayer<C: Connection> {
    client: SurrealDataClient<C>,
    config: Arc<IsolationConfig>,
    observer: Option<GuardObserver>,
}

impl<C: Connection> Clone for DataLayer<C> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            config: Arc::clone(&self.config),
            observer: self.observer.clone(),
        }
    }
}

impl<C: Connection> DataLayer<C> {
    pub fn new(db: Surreal<C>, config: IsolationConfig) -> Self {
        Self::with_shared_config(db, Arc::new(config))
    }

    pub fn with_shared_config(db: Surreal<C>, config: Arc<IsolationConfig>) -> Self {
        Self {
            client: SurrealDataClient::new(db),
            config,
            observer: None,
        }
    }

    /// Installs the hook notified of unscoped accesses in warn mode.
    pub fn with_observer(mut self, observer: GuardObserver) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn config(&self) -> &IsolationConfig {
        &self.config
    }

    /// Tenant-less handle. Touching a tenant-scoped entity through it is
    /// reported or refused according to the guard mode.
    pub fn unscoped(&self) -> UnscopedGuard<SurrealDataClient<C>> {
        let guard = UnscopedGuard::new(self.client.clone(), Arc::clone(&self.config));
        match &self.observer {
            Some(observer) => guard.with_observer(Arc::clone(observer)),
            None => guard,
        }
    }

    /// Handle bound to `tenant_id`. Build one per request.
    pub fn scoped(&self, tenant_id: Uuid) -> ScopedClient<SurrealDataClient<C>> {
        ScopedClient::new(self.client.clone(), tenant_id, Arc::clone(&self.config))
    }
}

impl<C: Connection> TenantScopes for DataLayer<C> {
    type Scoped = ScopedClient<SurrealDataClient<C>>;

    fn for_tenant(&self, tenant_id: Uuid) -> Self::Scoped {
        self.scoped(tenant_id)
    }
}
