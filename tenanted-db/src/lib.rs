//! Database Per Tenant for Tenanted
//!
//! Name resolution and readiness coordination for applications where every
//! tenant owns a separate database, named by substituting the tenant into a
//! template such as `app_%{tenant}`.
//!
//! # Features
//!
//! - **Identifier Validation** - Rejects tenant names unsafe in names, paths or SQL
//! - **Naming Templates** - Forward rendering and exact reverse matching
//! - **Catalog Scanning** - Lists tenants that own a database on the server
//! - **Readiness Gate** - Cross-process advisory lock marking provisioning in progress
//! - **Tenant Database Manager** - `exists`, `is_ready`, `create`, `drop`, `acquire_ready_lock`
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use tenanted_db::*;
//!
//! let config = DatabaseConfig::new("app_%{tenant}")
//!     .with_url("postgres://app@localhost:5432");
//! let manager = TenantDatabaseManager::new(config, Arc::new(PgDatabaseProvider::new()))?;
//!
//! // Provision once, even with many processes racing
//! let tenant = manager.tenant("acme")?;
//! tenant
//!     .acquire_ready_lock(|| async {
//!         if !tenant.exists().await? {
//!             tenant.create().await?;
//!         }
//!         Ok(())
//!     })
//!     .await?;
//!
//! // Readers
//! assert!(tenant.is_ready().await?);
//! let tenants = manager.tenant_databases().await?;
//! ```

pub mod catalog;
pub mod config;
mod error;
pub mod gate;
pub mod identifier;
pub mod manager;
#[cfg(feature = "postgres")]
pub mod pg;
pub mod provider;
pub mod template;

pub use catalog::CatalogScanner;
pub use config::{DEFAULT_MAINTENANCE_DB, DatabaseConfig};
pub use error::{TenantError, TenantResult};
pub use gate::{ReadinessGate, ReadinessLockHandle};
pub use identifier::validate_tenant_name;
pub use manager::{TenantDatabase, TenantDatabaseManager};
#[cfg(feature = "postgres")]
pub use pg::PgDatabaseProvider;
pub use provider::{
    DatabaseProvider, InMemoryConnection, InMemoryDatabaseProvider, MaintenanceConnection,
};
pub use template::{NameTemplate, TENANT_PLACEHOLDER, workerize};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::DatabaseConfig;
    pub use crate::error::{TenantError, TenantResult};
    pub use crate::gate::ReadinessGate;
    pub use crate::manager::{TenantDatabase, TenantDatabaseManager};
    pub use crate::provider::{DatabaseProvider, MaintenanceConnection};
    pub use crate::template::NameTemplate;
}
