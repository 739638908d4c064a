use async_trait::async_trait;
use log::info;

use crate::{
    errors::{AnalysisError, DbError},
    models::connections::{ConnectionConfig, DbType},
};

pub mod mysql;
pub mod postgres;

/// One column as reported by the engine catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnRow {
    pub name: String,
    pub data_type: String,
    pub is_nullable: bool,
    pub ordinal_position: i64,
    pub max_length: Option<i64>,
    pub is_auto_increment: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForeignKeyRow {
    pub column: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexRow {
    pub name: String,
    pub column: String,
    pub is_unique: bool,
}

/// Read-only access to an engine's system catalog.
///
/// Implementations own all engine-specific catalog SQL and return structured
/// rows; nothing above this trait sees dialect text.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Namespace the source is scoped to (e.g. `public`).
    fn namespace(&self) -> String;
    /// Base table names in the namespace.
    async fn list_tables(&self) -> Result<Vec<String>, DbError>;
    async fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnRow>, DbError>;
    async fn primary_key(&self, table_name: &str) -> Result<Vec<String>, DbError>;
    async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyRow>, DbError>;
    /// Indexes, excluding the ones backing primary keys.
    async fn indexes(&self, table_name: &str) -> Result<Vec<IndexRow>, DbError>;
    async fn row_estimate(&self, table_name: &str) -> Result<Option<i64>, DbError>;
}

/// Opens a catalog source for the configured engine.
///
/// Engines without a catalog dialect are rejected before any connection is made.
pub async fn connect(config: &ConnectionConfig) -> Result<Box<dyn CatalogSource>, AnalysisError> {
    let source: Box<dyn CatalogSource> = match config.db_type {
        DbType::Postgres => Box::new(
            postgres::PostgresCatalog::connect(&config.database_url, &config.namespace).await?,
        ),
        DbType::MySql => Box::new(mysql::MySqlCatalog::connect(&config.database_url).await?),
        DbType::Sqlite => {
            return Err(AnalysisError::UnsupportedEngine(config.db_type.to_string()));
        }
    };
    info!("Connected to {} catalog", config.db_type);
    Ok(source)
}
