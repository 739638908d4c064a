use async_trait::async_trait;
use log::debug;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};

use crate::errors::DbError;

use super::{CatalogSource, ColumnRow, ForeignKeyRow, IndexRow};

const TABLES_QUERY: &str = r#"
    SELECT table_name::text AS table_name
    FROM information_schema.tables
    WHERE table_schema = $1 AND table_type = 'BASE TABLE'
    ORDER BY table_name
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT column_name::text AS column_name,
           data_type::text AS data_type,
           (is_nullable = 'YES') AS is_nullable,
           ordinal_position::int8 AS ordinal_position,
           character_maximum_length::int8 AS max_length,
           (COALESCE(column_default, '') LIKE 'nextval(%' OR is_identity = 'YES') AS is_auto_increment
    FROM information_schema.columns
    WHERE table_schema = $1 AND table_name = $2
    ORDER BY ordinal_position
"#;

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT kcu.column_name::text AS column_name
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
     AND tc.table_name = kcu.table_name
    WHERE tc.constraint_type = 'PRIMARY KEY'
      AND tc.table_schema = $1 AND tc.table_name = $2
    ORDER BY kcu.ordinal_position
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT kcu.column_name::text AS column_name,
           ccu.table_name::text AS referenced_table,
           ccu.column_name::text AS referenced_column
    FROM information_schema.table_constraints tc
    JOIN information_schema.key_column_usage kcu
      ON tc.constraint_name = kcu.constraint_name
     AND tc.table_schema = kcu.table_schema
    JOIN information_schema.constraint_column_usage ccu
      ON tc.constraint_name = ccu.constraint_name
     AND tc.constraint_schema = ccu.constraint_schema
    WHERE tc.constraint_type = 'FOREIGN KEY'
      AND tc.table_schema = $1 AND tc.table_name = $2
    ORDER BY kcu.column_name
"#;

const INDEXES_QUERY: &str = r#"
    SELECT i.relname::text AS index_name,
           a.attname::text AS column_name,
           ix.indisunique AS is_unique
    FROM pg_class t
    JOIN pg_index ix ON t.oid = ix.indrelid
    JOIN pg_class i ON ix.indexrelid = i.oid
    JOIN pg_attribute a ON a.attrelid = t.oid AND a.attnum = ANY(ix.indkey)
    JOIN pg_namespace n ON t.relnamespace = n.oid
    WHERE n.nspname = $1 AND t.relname = $2 AND NOT ix.indisprimary
    ORDER BY i.relname, a.attnum
"#;

const ROW_ESTIMATE_QUERY: &str = r#"
    SELECT c.reltuples::int8 AS estimate
    FROM pg_class c
    JOIN pg_namespace n ON c.relnamespace = n.oid
    WHERE n.nspname = $1 AND c.relname = $2
"#;

pub struct PostgresCatalog {
    pub pool: PgPool,
    namespace: String,
}

impl PostgresCatalog {
    pub async fn connect(database_url: &str, namespace: &str) -> Result<Self, DbError> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        Ok(Self::from_pool(pool, namespace))
    }

    pub fn from_pool(pool: PgPool, namespace: &str) -> Self {
        Self {
            pool,
            namespace: namespace.to_string(),
        }
    }
}

/// `reltuples` is -1 for relations that were never vacuumed or analyzed.
fn estimate_from_reltuples(reltuples: i64) -> Option<i64> {
    (reltuples >= 0).then_some(reltuples)
}

#[async_trait]
impl CatalogSource for PostgresCatalog {
    fn namespace(&self) -> String {
        self.namespace.clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(TABLES_QUERY)
            .bind(self.namespace.as_str())
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(DbError::Sqlx))
            .collect()
    }

    async fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnRow>, DbError> {
        debug!("Retrieving columns for table {}", table_name);
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(self.namespace.as_str())
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnRow, DbError> {
                Ok(ColumnRow {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    is_nullable: row.try_get("is_nullable")?,
                    ordinal_position: row.try_get("ordinal_position")?,
                    max_length: row.try_get("max_length")?,
                    is_auto_increment: row.try_get("is_auto_increment")?,
                })
            })
            .collect()
    }

    async fn primary_key(&self, table_name: &str) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(PRIMARY_KEY_QUERY)
            .bind(self.namespace.as_str())
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("column_name").map_err(DbError::Sqlx))
            .collect()
    }

    async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyRow>, DbError> {
        let rows = sqlx::query(FOREIGN_KEYS_QUERY)
            .bind(self.namespace.as_str())
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ForeignKeyRow, DbError> {
                Ok(ForeignKeyRow {
                    column: row.try_get("column_name")?,
                    referenced_table: row.try_get("referenced_table")?,
                    referenced_column: row.try_get("referenced_column")?,
                })
            })
            .collect()
    }

    async fn indexes(&self, table_name: &str) -> Result<Vec<IndexRow>, DbError> {
        let rows = sqlx::query(INDEXES_QUERY)
            .bind(self.namespace.as_str())
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<IndexRow, DbError> {
                Ok(IndexRow {
                    name: row.try_get("index_name")?,
                    column: row.try_get("column_name")?,
                    is_unique: row.try_get("is_unique")?,
                })
            })
            .collect()
    }

    async fn row_estimate(&self, table_name: &str) -> Result<Option<i64>, DbError> {
        let row = sqlx::query(ROW_ESTIMATE_QUERY)
            .bind(self.namespace.as_str())
            .bind(table_name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(estimate_from_reltuples(row.try_get("estimate")?)),
            None => Ok(None),
        }
    }
}
