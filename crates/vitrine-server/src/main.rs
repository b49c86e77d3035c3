//! Vitrine Server: operator entry point: migrations, tenant bootstrap and
//! account administration.

mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use thiserror::Error;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use vitrine_access::{TenantBootstrap, TenantResolver, TenantSelector};
use vitrine_core::error::{VitrineError, VitrineResult};
use vitrine_core::identity::SystemRole;
use vitrine_core::models::tenant::CreateTenant;
use vitrine_core::models::user::CreateUser;
use vitrine_core::repository::{TenantRepository, UserRepository};
use vitrine_db::{DbError, DbManager};

use crate::config::{ConfigError, ServerConfig};

#[derive(Parser)]
#[command(name = "vitrine-server")]
#[command(version)]
#[command(about = "Vitrine back-office operator tool", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(long, short, env = "VITRINE_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Apply schema migrations and seed the permission catalog
    Migrate,
    /// Create a tenant if missing, then seed its roles and branding
    BootstrapTenant {
        #[arg(long)]
        slug: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        plan: Option<String>,
        /// Existing user to make an OWNER of the tenant
        #[arg(long)]
        owner_email: Option<String>,
    },
    /// Create a user account
    CreateUser {
        #[arg(long)]
        email: String,
        #[arg(long)]
        name: Option<String>,
        #[arg(long, env = "VITRINE_USER_PASSWORD")]
        password: String,
        /// Grant the global super-role
        #[arg(long)]
        superuser: bool,
    },
    /// Show which tenant a user would land in
    ResolveTenant {
        #[arg(long)]
        email: String,
        /// Tenant id the client would send as its preference
        #[arg(long)]
        hint: Option<String>,
    },
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Vitrine(#[from] VitrineError),
}

/// Hint from the command line; nothing is persisted.
struct CliSelector(Option<String>);

impl TenantSelector for CliSelector {
    fn hint(&self) -> Option<String> {
        self.0.clone()
    }

    async fn persist(&self, _tenant_id: Uuid) -> VitrineResult<()> {
        Ok(())
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("vitrine=info")),
        )
        .json()
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = ServerConfig::load(cli.config.as_deref())?;
    let db = DbManager::connect(&config.db, config.isolation.clone())
        .await
        .map_err(DbError::from)
        .map_err(VitrineError::from)?;

    match cli.command {
        Command::Migrate => migrate(&db).await?,
        Command::BootstrapTenant {
            slug,
            name,
            plan,
            owner_email,
        } => bootstrap_tenant(&db, slug, name, plan, owner_email).await?,
        Command::CreateUser {
            email,
            name,
            password,
            superuser,
        } => {
            let system_role = if superuser {
                SystemRole::Superuser
            } else {
                SystemRole::User
            };
            let user = db
                .users()
                .create(CreateUser {
                    email,
                    name,
                    password,
                    system_role,
                })
                .await?;
            info!(
                user_id = %user.id,
                email = %user.email,
                role = system_role.as_str(),
                "user created"
            );
        }
        Command::ResolveTenant { email, hint } => {
            let user = db.users().get_by_email(&email).await?;
            let resolver = TenantResolver::new(db.memberships(), db.tenants(), config.access);
            match resolver
                .resolve(&user.identity(), &CliSelector(hint))
                .await?
            {
                Some(r) => {
                    info!(tenant_id = %r.tenant_id, source = ?r.source, "tenant resolved")
                }
                None => info!(email = %user.email, "no tenant context"),
            }
        }
    }
    Ok(())
}

async fn migrate(db: &DbManager) -> VitrineResult<()> {
    vitrine_db::run_migrations(db.client()).await?;
    vitrine_db::seed_permission_catalog(&db.permissions()).await?;
    Ok(())
}

async fn bootstrap_tenant(
    db: &DbManager,
    slug: String,
    name: String,
    plan_id: Option<String>,
    owner_email: Option<String>,
) -> VitrineResult<()> {
    let tenants = db.tenants();
    let tenant = match tenants.get_by_slug(&slug).await {
        Ok(tenant) => tenant,
        Err(e) if e.is_not_found() => {
            tenants
                .create(CreateTenant {
                    slug,
                    name,
                    plan_id,
                })
                .await?
        }
        Err(e) => return Err(e),
    };

    let owner = match owner_email {
        Some(email) => Some(db.users().get_by_email(&email).await?.id),
        None => None,
    };

    let report = TenantBootstrap::new(
        tenants,
        db.users(),
        db.memberships(),
        db.roles(),
        db.data(),
    )
    .bootstrap_tenant(tenant.id, owner)
    .await?;

    info!(
        tenant_id = %report.tenant_id,
        roles_created = report.roles_created,
        owner_membership = ?report.owner_membership.map(|m| m.id),
        "bootstrap complete"
    );
    Ok(())
}
