//! Database server collaborators.
//!
//! The manager never talks to a database server directly. Implement
//! [`DatabaseProvider`] with your driver of choice (or enable the `postgres`
//! feature for the bundled diesel-async implementation) and inject it:
//!
//! ```rust,ignore
//! let provider = Arc::new(MyDatabaseProvider::new());
//! let manager = TenantDatabaseManager::new(config, provider)?;
//!
//! let tenant = manager.tenant("acme")?;
//! if !tenant.is_ready().await? {
//!     tenant.acquire_ready_lock(|| async { tenant.create().await }).await?;
//! }
//! ```

use crate::config::DatabaseConfig;
use crate::{TenantError, TenantResult};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Short-lived administrative connection to the maintenance database.
///
/// Dropping the connection releases it.
#[async_trait]
pub trait MaintenanceConnection: Send {
    /// Names of all non-template databases on the server.
    async fn database_names(&mut self) -> TenantResult<Vec<String>>;

    /// Whether a database with exactly this name exists.
    async fn database_exists(&mut self, database_name: &str) -> TenantResult<bool>;
}

/// Database server provider trait
///
/// Users must implement this trait with their database of choice.
#[async_trait]
pub trait DatabaseProvider: Send + Sync {
    /// The maintenance connection type
    type Connection: MaintenanceConnection;

    /// Adapter name used to namespace readiness lock files (e.g. `postgresql`)
    fn adapter_name(&self) -> &str;

    /// Open a connection to the database named by `config`
    ///
    /// Fails with [`TenantError::NoDatabase`] when that database does not exist.
    async fn connect_maintenance(&self, config: &DatabaseConfig) -> TenantResult<Self::Connection>;

    /// Create the database named by `config`
    async fn create_database(&self, config: &DatabaseConfig) -> TenantResult<()>;

    /// Drop the database named by `config`
    ///
    /// May fail with [`TenantError::NoDatabase`] when it does not exist.
    async fn drop_database(&self, config: &DatabaseConfig) -> TenantResult<()>;

    /// Prepare local storage before creation (no-op for server databases)
    async fn ensure_database_directory_exists(&self, config: &DatabaseConfig) -> TenantResult<()> {
        let _ = config;
        Ok(())
    }
}

#[derive(Debug, Default)]
struct Catalog {
    databases: BTreeSet<String>,
    templates: BTreeSet<String>,
}

/// In-memory database server for tests and local development.
///
/// Starts out holding the `postgres` maintenance database and the
/// `template0`/`template1` template databases.
#[derive(Debug, Clone)]
pub struct InMemoryDatabaseProvider {
    catalog: Arc<RwLock<Catalog>>,
}

impl InMemoryDatabaseProvider {
    /// Create a provider with the default server databases.
    pub fn new() -> Self {
        let catalog = Catalog {
            databases: BTreeSet::from(["postgres".to_string()]),
            templates: BTreeSet::from(["template0".to_string(), "template1".to_string()]),
        };
        Self {
            catalog: Arc::new(RwLock::new(catalog)),
        }
    }

    /// Register an existing database.
    pub async fn insert(&self, database_name: impl Into<String>) {
        self.catalog.write().await.databases.insert(database_name.into());
    }

    /// Remove a database without going through `drop_database`.
    pub async fn remove(&self, database_name: &str) {
        self.catalog.write().await.databases.remove(database_name);
    }

    /// Whether a non-template database exists.
    pub async fn contains(&self, database_name: &str) -> bool {
        self.catalog.read().await.databases.contains(database_name)
    }
}

impl Default for InMemoryDatabaseProvider {
    fn default() -> Self {
        Self::new()
    }
}

/// Connection handed out by [`InMemoryDatabaseProvider`].
#[derive(Debug)]
pub struct InMemoryConnection {
    database: String,
    catalog: Arc<RwLock<Catalog>>,
}

#[async_trait]
impl MaintenanceConnection for InMemoryConnection {
    async fn database_names(&mut self) -> TenantResult<Vec<String>> {
        let catalog = self.catalog.read().await;
        if !catalog.databases.contains(&self.database) {
            return Err(TenantError::NoDatabase(self.database.clone()));
        }
        Ok(catalog.databases.iter().cloned().collect())
    }

    async fn database_exists(&mut self, database_name: &str) -> TenantResult<bool> {
        let catalog = self.catalog.read().await;
        if !catalog.databases.contains(&self.database) {
            return Err(TenantError::NoDatabase(self.database.clone()));
        }
        Ok(catalog.databases.contains(database_name))
    }
}

#[async_trait]
impl DatabaseProvider for InMemoryDatabaseProvider {
    type Connection = InMemoryConnection;

    fn adapter_name(&self) -> &str {
        "postgresql"
    }

    async fn connect_maintenance(&self, config: &DatabaseConfig) -> TenantResult<Self::Connection> {
        if !self.contains(&config.database).await {
            return Err(TenantError::NoDatabase(config.database.clone()));
        }
        Ok(InMemoryConnection {
            database: config.database.clone(),
            catalog: Arc::clone(&self.catalog),
        })
    }

    async fn create_database(&self, config: &DatabaseConfig) -> TenantResult<()> {
        let mut catalog = self.catalog.write().await;
        if catalog.databases.contains(&config.database) || catalog.templates.contains(&config.database) {
            return Err(TenantError::Query(format!(
                "database {:?} already exists",
                config.database
            )));
        }
        catalog.databases.insert(config.database.clone());
        Ok(())
    }

    async fn drop_database(&self, config: &DatabaseConfig) -> TenantResult<()> {
        let mut catalog = self.catalog.write().await;
        if catalog.databases.remove(&config.database) {
            Ok(())
        } else {
            Err(TenantError::NoDatabase(config.database.clone()))
        }
    }
}
