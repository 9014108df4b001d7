//! PostgreSQL provider built on diesel-async.
//!
//! Enabled with the `postgres` feature.

use crate::config::DatabaseConfig;
use crate::provider::{DatabaseProvider, MaintenanceConnection};
use crate::{TenantError, TenantResult};
use async_trait::async_trait;
use diesel::sql_types::Text;
use diesel::{QueryableByName, sql_query};
use diesel_async::{AsyncConnection, AsyncPgConnection, RunQueryDsl, SimpleAsyncConnection};
use tracing::debug;

#[derive(QueryableByName)]
struct DatabaseRow {
    #[diesel(sql_type = Text)]
    datname: String,
}

/// Quote a PostgreSQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn connection_error(database: &str, err: diesel::ConnectionError) -> TenantError {
    let message = err.to_string();
    if message.contains("does not exist") {
        TenantError::NoDatabase(database.to_string())
    } else {
        TenantError::Connection(message)
    }
}

fn query_error(err: diesel::result::Error) -> TenantError {
    TenantError::Query(err.to_string())
}

/// Maintenance connection backed by `AsyncPgConnection`.
pub struct PgMaintenanceConnection {
    conn: AsyncPgConnection,
}

#[async_trait]
impl MaintenanceConnection for PgMaintenanceConnection {
    async fn database_names(&mut self) -> TenantResult<Vec<String>> {
        let rows: Vec<DatabaseRow> =
            sql_query("SELECT datname FROM pg_database WHERE datistemplate = false")
                .load(&mut self.conn)
                .await
                .map_err(query_error)?;

        Ok(rows.into_iter().map(|row| row.datname).collect())
    }

    async fn database_exists(&mut self, database_name: &str) -> TenantResult<bool> {
        let rows: Vec<DatabaseRow> =
            sql_query("SELECT datname FROM pg_database WHERE datname = $1 LIMIT 1")
                .bind::<Text, _>(database_name)
                .load(&mut self.conn)
                .await
                .map_err(query_error)?;

        Ok(!rows.is_empty())
    }
}

/// PostgreSQL database provider.
#[derive(Debug, Clone, Default)]
pub struct PgDatabaseProvider;

impl PgDatabaseProvider {
    /// Create a PostgreSQL provider.
    pub fn new() -> Self {
        Self
    }

    async fn connect(&self, config: &DatabaseConfig) -> TenantResult<AsyncPgConnection> {
        debug!(database = %config.database, name = %config.name, "Opening PostgreSQL connection");
        AsyncPgConnection::establish(&config.database_url()?)
            .await
            .map_err(|e| connection_error(&config.database, e))
    }
}

#[async_trait]
impl DatabaseProvider for PgDatabaseProvider {
    type Connection = PgMaintenanceConnection;

    fn adapter_name(&self) -> &str {
        "postgresql"
    }

    async fn connect_maintenance(&self, config: &DatabaseConfig) -> TenantResult<Self::Connection> {
        let conn = self.connect(config).await?;
        Ok(PgMaintenanceConnection { conn })
    }

    async fn create_database(&self, config: &DatabaseConfig) -> TenantResult<()> {
        let mut conn = self.connect(&config.maintenance_config()).await?;
        conn.batch_execute(&format!("CREATE DATABASE {}", quote_ident(&config.database)))
            .await
            .map_err(query_error)
    }

    async fn drop_database(&self, config: &DatabaseConfig) -> TenantResult<()> {
        let mut conn = self.connect(&config.maintenance_config()).await?;
        conn.batch_execute(&format!(
            "DROP DATABASE IF EXISTS {}",
            quote_ident(&config.database)
        ))
        .await
        .map_err(query_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("tenant_acme"), "\"tenant_acme\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_missing_database_maps_to_no_database() {
        let err = connection_error(
            "tenant_acme",
            diesel::ConnectionError::BadConnection(
                "FATAL:  database \"tenant_acme\" does not exist".to_string(),
            ),
        );
        assert!(err.is_no_database());

        let err = connection_error(
            "tenant_acme",
            diesel::ConnectionError::BadConnection("connection refused".to_string()),
        );
        assert!(matches!(err, TenantError::Connection(_)));
    }
}
