use async_trait::async_trait;
use log::debug;
use sqlx::{mysql::MySqlPoolOptions, MySqlPool, Row};

use crate::errors::DbError;

use super::{CatalogSource, ColumnRow, ForeignKeyRow, IndexRow};

// information_schema columns are cast explicitly: depending on the server
// version they are reported as VARBINARY or unsigned types.

const TABLES_QUERY: &str = r#"
    SELECT CAST(TABLE_NAME AS CHAR) AS table_name
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_TYPE = 'BASE TABLE'
    ORDER BY TABLE_NAME
"#;

const COLUMNS_QUERY: &str = r#"
    SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
           CAST(CASE WHEN COLUMN_TYPE = 'tinyint(1)' THEN COLUMN_TYPE ELSE DATA_TYPE END AS CHAR) AS data_type,
           CAST(IS_NULLABLE = 'YES' AS SIGNED) AS is_nullable,
           CAST(ORDINAL_POSITION AS SIGNED) AS ordinal_position,
           CAST(CHARACTER_MAXIMUM_LENGTH AS SIGNED) AS max_length,
           CAST(EXTRA LIKE '%auto_increment%' AS SIGNED) AS is_auto_increment
    FROM information_schema.COLUMNS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
    ORDER BY ORDINAL_POSITION
"#;

const PRIMARY_KEY_QUERY: &str = r#"
    SELECT CAST(COLUMN_NAME AS CHAR) AS column_name
    FROM information_schema.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND CONSTRAINT_NAME = 'PRIMARY'
    ORDER BY ORDINAL_POSITION
"#;

const FOREIGN_KEYS_QUERY: &str = r#"
    SELECT CAST(COLUMN_NAME AS CHAR) AS column_name,
           CAST(REFERENCED_TABLE_NAME AS CHAR) AS referenced_table,
           CAST(REFERENCED_COLUMN_NAME AS CHAR) AS referenced_column
    FROM information_schema.KEY_COLUMN_USAGE
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
      AND REFERENCED_TABLE_NAME IS NOT NULL
    ORDER BY COLUMN_NAME
"#;

const INDEXES_QUERY: &str = r#"
    SELECT CAST(INDEX_NAME AS CHAR) AS index_name,
           CAST(COLUMN_NAME AS CHAR) AS column_name,
           CAST(NON_UNIQUE = 0 AS SIGNED) AS is_unique
    FROM information_schema.STATISTICS
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ? AND INDEX_NAME <> 'PRIMARY'
    ORDER BY INDEX_NAME, SEQ_IN_INDEX
"#;

const ROW_ESTIMATE_QUERY: &str = r#"
    SELECT CAST(TABLE_ROWS AS SIGNED) AS estimate
    FROM information_schema.TABLES
    WHERE TABLE_SCHEMA = DATABASE() AND TABLE_NAME = ?
"#;

pub struct MySqlCatalog {
    pub pool: MySqlPool,
    database: String,
}

impl MySqlCatalog {
    pub async fn connect(database_url: &str) -> Result<Self, DbError> {
        let pool = MySqlPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| DbError::Connection(e.to_string()))?;

        let database: Option<String> = sqlx::query("SELECT CAST(DATABASE() AS CHAR) AS db")
            .fetch_one(&pool)
            .await?
            .try_get("db")?;
        let database = database
            .ok_or_else(|| DbError::Config("no database selected in connection URL".to_string()))?;

        Ok(Self { pool, database })
    }
}

#[async_trait]
impl CatalogSource for MySqlCatalog {
    fn namespace(&self) -> String {
        self.database.clone()
    }

    async fn list_tables(&self) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(TABLES_QUERY).fetch_all(&self.pool).await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("table_name").map_err(DbError::Sqlx))
            .collect()
    }

    async fn table_columns(&self, table_name: &str) -> Result<Vec<ColumnRow>, DbError> {
        debug!("Retrieving columns for table {}", table_name);
        let rows = sqlx::query(COLUMNS_QUERY)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<ColumnRow, DbError> {
                Ok(ColumnRow {
                    name: row.try_get("column_name")?,
                    data_type: row.try_get("data_type")?,
                    is_nullable: row.try_get::<i64, _>("is_nullable")? != 0,
                    ordinal_position: row.try_get("ordinal_position")?,
                    max_length: row.try_get("max_length")?,
                    is_auto_increment: row.try_get::<i64, _>("is_auto_increment")? != 0,
                })
            })
            .collect()
    }

    async fn primary_key(&self, table_name: &str) -> Result<Vec<String>, DbError> {
        let rows = sqlx::query(PRIMARY_KEY_QUERY)
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| row.try_get::<String, _>("column_name").map_err(DbError::Sqlx))
            .collect()
    }

    async fn foreign_keys(&self, table_name: &str) -> Result<Vec<ForeignKeyRow>, DbError> {
        let rows = sqlx::query(FOREIGN_KEYS_QUERY)
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
            .bind(table_name)
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> Result<IndexRow, DbError> {
                Ok(IndexRow {
                    name: row.try_get("index_name")?,
                    column: row.try_get("column_name")?,
                    is_unique: row.try_get::<i64, _>("is_unique")? != 0,
                })
            })
            .collect()
    }

    async fn row_estimate(&self, table_name: &str) -> Result<Option<i64>, DbError> {
        let row = sqlx::query(ROW_ESTIMATE_QUERY)
            .bind(table_name)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(row.try_get("estimate")?),
            None => Ok(None),
        }
    }
}
