use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::errors::DbError;

pub const DEFAULT_NAMESPACE: &str = "public";

#[derive(Debug, Deserialize, Serialize, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    MySql,
    Sqlite,
}

impl fmt::Display for DbType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DbType::Postgres => "postgres",
            DbType::MySql => "mysql",
            DbType::Sqlite => "sqlite",
        };
        f.write_str(name)
    }
}

impl FromStr for DbType {
    type Err = DbError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "postgres" | "postgresql" | "pg" => Ok(DbType::Postgres),
            "mysql" | "mariadb" => Ok(DbType::MySql),
            "sqlite" => Ok(DbType::Sqlite),
            other => Err(DbError::Config(format!("unknown database type '{}'", other))),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConnectionConfig {
    pub db_type: DbType,
    pub database_url: String,
    /// Catalog namespace to analyze. Ignored by MySQL, which uses the
    /// connection's current database.
    pub namespace: String,
}

impl ConnectionConfig {
    pub fn new(db_type: DbType, database_url: impl Into<String>) -> Self {
        Self {
            db_type,
            database_url: database_url.into(),
            namespace: DEFAULT_NAMESPACE.to_string(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = namespace.into();
        self
    }

    /// Identifier of the analyzed source. Credentials are stripped from the URL
    /// so the key is safe to log and persist.
    pub fn source_key(&self) -> String {
        let url = &self.database_url;
        let redacted = match (url.find("://"), url.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}{}", &url[..scheme_end + 3], &url[at + 1..])
            }
            _ => url.clone(),
        };
        format!("{}:{}/{}", self.db_type, redacted, self.namespace)
    }
}
