//! Tenant database manager.
//!
//! Ties together name resolution, catalog scanning, the injected database
//! provider and the readiness gate.
//!
//! # Usage
//!
//! ```rust,ignore
//! let manager = TenantDatabaseManager::new(config, Arc::new(provider))?;
//!
//! // Provisioning: readers see "not ready" until the closure returns
//! let tenant = manager.tenant("acme")?;
//! tenant
//!     .acquire_ready_lock(|| async {
//!         tenant.create().await?;
//!         run_migrations(tenant.config()).await
//!     })
//!     .await?;
//!
//! // Elsewhere, possibly in another process
//! if manager.tenant("acme")?.is_ready().await? {
//!     // safe to connect
//! }
//! ```

use crate::catalog::CatalogScanner;
use crate::config::DatabaseConfig;
use crate::gate::ReadinessGate;
use crate::identifier::validate_tenant_name;
use crate::provider::{DatabaseProvider, MaintenanceConnection};
use crate::template::NameTemplate;
use crate::{TenantError, TenantResult};
use std::collections::BTreeSet;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

/// Tenant database manager
///
/// Manages per-tenant databases using an injected database provider.
pub struct TenantDatabaseManager<P: DatabaseProvider> {
    config: Arc<DatabaseConfig>,
    template: NameTemplate,
    provider: Arc<P>,
    gate: ReadinessGate,
}

impl<P: DatabaseProvider> TenantDatabaseManager<P> {
    /// Create new tenant database manager with injected provider
    ///
    /// Fails with [`TenantError::MalformedTemplate`] if `config.database` is
    /// not a single-placeholder template.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    /// use tenanted_db::{DatabaseConfig, InMemoryDatabaseProvider, TenantDatabaseManager};
    ///
    /// let config = DatabaseConfig::new("app_%{tenant}");
    /// let manager = TenantDatabaseManager::new(config, Arc::new(InMemoryDatabaseProvider::new())).unwrap();
    ///
    /// assert_eq!(manager.tenant("acme").unwrap().database_name(), "app_acme");
    /// ```
    pub fn new(config: DatabaseConfig, provider: Arc<P>) -> TenantResult<Self> {
        let template = NameTemplate::new(config.database.clone())?;
        Ok(Self {
            config: Arc::new(config),
            template,
            provider,
            gate: ReadinessGate::new(),
        })
    }

    /// Base configuration (holding the template).
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Compiled naming template.
    pub fn template(&self) -> &NameTemplate {
        &self.template
    }

    /// Injected provider.
    pub fn provider(&self) -> &Arc<P> {
        &self.provider
    }

    /// Reject identifiers containing `/`, `'`, `"` or `` ` ``.
    pub fn validate_tenant_name(&self, tenant_name: &str) -> TenantResult<()> {
        validate_tenant_name(tenant_name)
    }

    /// Scope operations to one tenant.
    ///
    /// The identifier is validated and the database name resolved before
    /// anything touches the server.
    pub fn tenant(&self, tenant_name: &str) -> TenantResult<TenantDatabase<'_, P>> {
        let database = self.template.render(tenant_name)?;
        Ok(TenantDatabase {
            manager: self,
            tenant: tenant_name.to_string(),
            config: self.config.for_database(database),
        })
    }

    /// Tenants that currently have a database on the server.
    pub async fn tenant_databases(&self) -> TenantResult<BTreeSet<String>> {
        let names = {
            let mut conn = self
                .provider
                .connect_maintenance(&self.config.maintenance_config())
                .await?;
            conn.database_names().await?
        };

        Ok(CatalogScanner::new(&self.template).tenant_databases(names))
    }

    /// Readiness lock key for a resolved database name.
    ///
    /// Stable across restarts and identical for every process sharing the
    /// same lock directory.
    pub fn database_path(&self, database_name: &str) -> PathBuf {
        self.config
            .lock_dir()
            .join(self.provider.adapter_name())
            .join(database_name)
    }

    /// Storage path for a database; server databases are addressed by name.
    pub fn path_for(&self, database: &str) -> String {
        database.to_string()
    }
}

impl<P: DatabaseProvider> Clone for TenantDatabaseManager<P> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            template: self.template.clone(),
            provider: Arc::clone(&self.provider),
            gate: self.gate,
        }
    }
}

/// One tenant's database, resolved against a [`TenantDatabaseManager`].
pub struct TenantDatabase<'a, P: DatabaseProvider> {
    manager: &'a TenantDatabaseManager<P>,
    tenant: String,
    config: DatabaseConfig,
}

impl<P: DatabaseProvider> TenantDatabase<'_, P> {
    /// Tenant identifier.
    pub fn tenant(&self) -> &str {
        &self.tenant
    }

    /// Resolved database name.
    pub fn database_name(&self) -> &str {
        &self.config.database
    }

    /// Config pointing at this tenant's database.
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// Readiness lock key for this tenant.
    pub fn database_path(&self) -> PathBuf {
        self.manager.database_path(self.database_name())
    }

    /// Whether the database exists on the server.
    ///
    /// A "no such database" report is treated as absence.
    pub async fn exists(&self) -> TenantResult<bool> {
        match self.lookup().await {
            Err(TenantError::NoDatabase(name)) => {
                debug!(database = %self.database_name(), missing = %name, "Existence check found no database");
                Ok(false)
            }
            other => other,
        }
    }

    async fn lookup(&self) -> TenantResult<bool> {
        let maintenance = self.manager.config.maintenance_config();
        let mut conn = self.manager.provider.connect_maintenance(&maintenance).await?;
        conn.database_exists(self.database_name()).await
    }

    /// Whether the database exists and is not being provisioned.
    pub async fn is_ready(&self) -> TenantResult<bool> {
        if !self.exists().await? {
            return Ok(false);
        }
        let locked = self.manager.gate.is_locked(&self.database_path())?;
        Ok(!locked)
    }

    /// Create the database.
    pub async fn create(&self) -> TenantResult<()> {
        let provider = &self.manager.provider;
        provider.ensure_database_directory_exists(&self.config).await?;
        provider.create_database(&self.config).await?;

        info!(tenant = %self.tenant, database = %self.database_name(), "Created tenant database");
        Ok(())
    }

    /// Drop the database. Dropping a missing database is a no-op.
    pub async fn drop(&self) -> TenantResult<()> {
        match self.manager.provider.drop_database(&self.config).await {
            Ok(()) => {
                info!(tenant = %self.tenant, database = %self.database_name(), "Dropped tenant database");
                Ok(())
            }
            Err(TenantError::NoDatabase(_)) => {
                debug!(database = %self.database_name(), "Drop skipped, database does not exist");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Run `critical_section` while holding this tenant's readiness lock.
    ///
    /// Readers calling [`TenantDatabase::is_ready`] see `false` until the
    /// critical section has finished and the lock is released.
    pub async fn acquire_ready_lock<F, Fut, T>(&self, critical_section: F) -> TenantResult<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = TenantResult<T>>,
    {
        self.manager
            .gate
            .lock_async(&self.database_path(), critical_section)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryDatabaseProvider;

    fn manager_in(dir: &tempfile::TempDir) -> TenantDatabaseManager<InMemoryDatabaseProvider> {
        let config = DatabaseConfig::new("tenant_%{tenant}").with_lock_dir(dir.path());
        TenantDatabaseManager::new(config, Arc::new(InMemoryDatabaseProvider::new())).unwrap()
    }

    #[test]
    fn test_malformed_template_rejected_at_construction() {
        let config = DatabaseConfig::new("tenant_db");
        let result = TenantDatabaseManager::new(config, Arc::new(InMemoryDatabaseProvider::new()));
        assert!(matches!(result, Err(TenantError::MalformedTemplate(_))));
    }

    #[test]
    fn test_invalid_tenant_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);

        assert!(matches!(
            manager.tenant("foo'bar"),
            Err(TenantError::InvalidIdentifier(_))
        ));
        assert!(manager.validate_tenant_name("foo-bar_123").is_ok());
    }

    #[test]
    fn test_database_path() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);

        let tenant = manager.tenant("acme").unwrap();
        assert_eq!(
            tenant.database_path(),
            dir.path().join("postgresql").join("tenant_acme")
        );
        assert_eq!(tenant.database_path(), manager.tenant("acme").unwrap().database_path());
        assert_eq!(manager.path_for("app_tenant"), "app_tenant");
    }

    #[tokio::test]
    async fn test_tenant_databases() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);
        manager.provider().insert("tenant_acme").await;
        manager.provider().insert("tenant_beta").await;
        manager.provider().insert("unrelated").await;

        let tenants = manager.tenant_databases().await.unwrap();
        assert_eq!(tenants.into_iter().collect::<Vec<_>>(), vec!["acme", "beta"]);
    }

    #[tokio::test]
    async fn test_exists_and_create() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);
        let tenant = manager.tenant("acme").unwrap();

        assert!(!tenant.exists().await.unwrap());
        tenant.create().await.unwrap();
        assert!(tenant.exists().await.unwrap());
        assert!(manager.provider().contains("tenant_acme").await);
    }

    #[tokio::test]
    async fn test_exists_recovers_missing_maintenance_database() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);
        manager.provider().insert("tenant_acme").await;
        manager.provider().remove("postgres").await;

        let tenant = manager.tenant("acme").unwrap();
        assert!(!tenant.exists().await.unwrap());
        assert!(!tenant.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_drop_missing_database_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);
        let tenant = manager.tenant("ghost").unwrap();

        tenant.drop().await.unwrap();

        tenant.create().await.unwrap();
        tenant.drop().await.unwrap();
        assert!(!tenant.exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_ready_tracks_lock() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);
        manager.provider().insert("tenant_acme").await;
        let tenant = manager.tenant("acme").unwrap();

        assert!(tenant.is_ready().await.unwrap());

        let ready_inside = tenant
            .acquire_ready_lock(|| async { tenant.is_ready().await })
            .await
            .unwrap();
        assert!(!ready_inside);

        assert!(tenant.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_not_ready_when_missing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);
        let tenant = manager.tenant("acme").unwrap();

        assert!(!tenant.is_ready().await.unwrap());
    }

    #[tokio::test]
    async fn test_provisioning_failure_releases_lock() {
        let dir = tempfile::tempdir().unwrap();
        let manager = manager_in(&dir);
        let tenant = manager.tenant("acme").unwrap();

        let result: TenantResult<()> = tenant
            .acquire_ready_lock(|| async {
                tenant.create().await?;
                Err(TenantError::Query("migration failed".into()))
            })
            .await;

        assert!(matches!(result, Err(TenantError::Query(_))));
        assert!(tenant.is_ready().await.unwrap());
    }
}
