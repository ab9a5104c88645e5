use serde::Deserialize;

use roomstore_core::DEFAULT_TOMBSTONE_TTL_MS;

use crate::error::EngineError;

pub const DEFAULT_SCENES_TABLE: &str = "excalidraw_scenes";
pub const DEFAULT_FILES_BUCKET: &str = "excalidraw-files";
/// One year.
pub const DEFAULT_FILE_CACHE_MAX_AGE_SECS: u64 = 365 * 24 * 60 * 60;

/// Which backend(s) serve records and blobs. Resolved once when the
/// storage is built.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
    Memory,
    Sqlite { path: String },
    /// Tried in order; later entries only serve calls the earlier ones
    /// report as unavailable.
    Fallback { chain: Vec<BackendConfig> },
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: BackendConfig,
    pub scenes_table: String,
    pub files_bucket: String,
    pub file_cache_max_age_secs: u64,
    pub tombstone_ttl_ms: i64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendConfig::Memory,
            scenes_table: DEFAULT_SCENES_TABLE.to_string(),
            files_bucket: DEFAULT_FILES_BUCKET.to_string(),
            file_cache_max_age_secs: DEFAULT_FILE_CACHE_MAX_AGE_SECS,
            tombstone_ttl_ms: DEFAULT_TOMBSTONE_TTL_MS,
        }
    }
}

impl StorageConfig {
    pub fn from_toml_str(s: &str) -> Result<Self, EngineError> {
        let config: Self =
            toml::from_str(s).map_err(|e| EngineError::Configuration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read `ROOMSTORE_*` variables from the process environment.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Build from a variable lookup. Unset variables keep their defaults.
    ///
    /// - `ROOMSTORE_BACKEND`: `memory` or `sqlite`
    /// - `ROOMSTORE_SQLITE_PATH`: database path, required for `sqlite`
    /// - `ROOMSTORE_SCENES_TABLE`, `ROOMSTORE_FILES_BUCKET`
    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
        let mut config = Self::default();

        match lookup("ROOMSTORE_BACKEND").as_deref() {
            None | Some("") | Some("memory") => {}
            Some("sqlite") => {
                let path = lookup("ROOMSTORE_SQLITE_PATH").unwrap_or_default();
                config.backend = BackendConfig::Sqlite { path };
            }
            Some(other) => {
                return Err(EngineError::Configuration(format!(
                    "unknown backend {other:?}"
                )));
            }
        }
        if let Some(table) = lookup("ROOMSTORE_SCENES_TABLE") {
            config.scenes_table = table;
        }
        if let Some(bucket) = lookup("ROOMSTORE_FILES_BUCKET") {
            config.files_bucket = bucket;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), EngineError> {
        validate_backend(&self.backend)?;
        if self.scenes_table.is_empty() {
            return Err(EngineError::Configuration("scenes_table is empty".into()));
        }
        if self.files_bucket.is_empty() {
            return Err(EngineError::Configuration("files_bucket is empty".into()));
        }
        if self.tombstone_ttl_ms < 0 {
            return Err(EngineError::Configuration(
                "tombstone_ttl_ms must not be negative".into(),
            ));
        }
        Ok(())
    }

    pub fn cache_control(&self) -> String {
        format!("public, max-age={}", self.file_cache_max_age_secs)
    }
}

fn validate_backend(backend: &BackendConfig) -> Result<(), EngineError> {
    match backend {
        BackendConfig::Memory => Ok(()),
        BackendConfig::Sqlite { path } if path.trim().is_empty() => Err(
            EngineError::Configuration("sqlite backend selected without a path".into()),
        ),
        BackendConfig::Sqlite { .. } => Ok(()),
        BackendConfig::Fallback { chain } if chain.is_empty() => Err(
            EngineError::Configuration("fallback chain is empty".into()),
        ),
        BackendConfig::Fallback { chain } => chain.iter().try_for_each(validate_backend),
    }
}
