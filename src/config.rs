use std::{env, fs, path::PathBuf};

use crate::{
    errors::DbError,
    models::{
        connections::{ConnectionConfig, DbType, DEFAULT_NAMESPACE},
        params::GenerationParameters,
    },
};

const DEFAULT_WORKLOAD_NAME: &str = "workload";

/// Settings for the `qforge` binary, read from the environment (and `.env`).
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub connection: ConnectionConfig,
    pub workload_name: String,
    /// JSON document with [`GenerationParameters`]; defaults apply when unset.
    pub params_path: Option<PathBuf>,
    pub output_dir: PathBuf,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, DbError> {
        dotenv::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the config from any key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, DbError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database_url = get("DATABASE_URL")
            .ok_or_else(|| DbError::Config("DATABASE_URL must be set".to_string()))?;
        let db_type = match get("DB_TYPE") {
            Some(value) => value.parse::<DbType>()?,
            None => DbType::Postgres,
        };
        let namespace = get("DB_NAMESPACE").unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());

        Ok(Self {
            connection: ConnectionConfig::new(db_type, database_url).with_namespace(namespace),
            workload_name: get("WORKLOAD_NAME").unwrap_or_else(|| DEFAULT_WORKLOAD_NAME.to_string()),
            params_path: get("WORKLOAD_PARAMS").map(PathBuf::from),
            output_dir: get("WORKLOAD_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        })
    }

    pub fn load_parameters(&self) -> Result<GenerationParameters, DbError> {
        let Some(path) = &self.params_path else {
            return Ok(GenerationParameters::default());
        };
        let raw = fs::read_to_string(path)?;
        serde_json::from_str(&raw)
            .map_err(|e| DbError::Config(format!("{}: {}", path.display(), e)))
    }
}
