use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::{
    entity_type::EntityType, reconcile::ReconcilePolicy, storage::StorageBackend,
    store::StorageKeys, AppError, AppResult,
};

pub const APP_DIR_NAME: &str = "fincent";
pub const CONFIG_FILE_NAME: &str = "fincent.json";

pub const ENV_DATA_DIR: &str = "FINCENT_DATA_DIR";
pub const ENV_CONFIG: &str = "FINCENT_CONFIG";
pub const ENV_BACKEND: &str = "FINCENT_BACKEND";
pub const ENV_QUOTA_BYTES: &str = "FINCENT_QUOTA_BYTES";

/// Entity created on first start when the entities collection is empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DefaultEntity {
    pub name: String,
    #[serde(rename = "type")]
    pub entity_type: EntityType,
}

/// Settings resolved from defaults, then the JSON config file, then
/// `FINCENT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct AppConfig {
    pub data_dir: Option<PathBuf>,
    pub backend: StorageBackend,
    pub keys: StorageKeys,
    pub default_entity: Option<DefaultEntity>,
    pub policy: ReconcilePolicy,
    pub quota_bytes: Option<usize>,
}

pub fn default_data_dir() -> PathBuf {
    dirs::data_dir()
        .or_else(|| env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

impl AppConfig {
    pub fn load() -> AppResult<Self> {
        Self::load_with(|name| env::var(name).ok())
    }

    /// Resolves the configuration reading variables through `var`.
    pub fn load_with<F>(var: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env_data_dir = var(ENV_DATA_DIR)
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let mut config = match var(ENV_CONFIG).filter(|value| !value.trim().is_empty()) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => {
                let dir = env_data_dir.clone().unwrap_or_else(default_data_dir);
                let path = dir.join(CONFIG_FILE_NAME);
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    Self::default()
                }
            }
        };

        if let Some(dir) = env_data_dir {
            config.data_dir = Some(dir);
        }
        if let Some(backend) = var(ENV_BACKEND) {
            config.backend = backend.parse()?;
        }
        if let Some(quota) = var(ENV_QUOTA_BYTES) {
            let parsed = quota.trim().parse::<usize>().map_err(|err| {
                AppError::new("CONFIG/INVALID_QUOTA", "Quota must be a byte count.")
                    .with_context("value", quota.clone())
                    .with_context("error", err.to_string())
            })?;
            config.quota_bytes = Some(parsed).filter(|limit| *limit > 0);
        }
        Ok(config)
    }

    pub fn from_file(path: &Path) -> AppResult<Self> {
        let data = fs::read_to_string(path).map_err(|err| {
            AppError::new("CONFIG/READ", "Failed to read configuration file")
                .with_context("path", path.display().to_string())
                .with_cause(err)
        })?;
        serde_json::from_str(&data).map_err(|err| {
            AppError::new("CONFIG/PARSE", "Configuration file is not valid")
                .with_context("path", path.display().to_string())
                .with_cause(err)
        })
    }

    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}
