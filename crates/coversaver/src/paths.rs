use std::env;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use directories_next::ProjectDirs;

pub const ENV_CONFIG_DIR: &str = "COVERSAVER_CONFIG_DIR";
pub const ENV_DATA_DIR: &str = "COVERSAVER_DATA_DIR";

const QUALIFIER: &str = "org";
const ORGANISATION: &str = "Tomtopia";
const APPLICATION: &str = "coversaver";

#[derive(Debug, Clone)]
pub struct AppPaths {
    config_dir: PathBuf,
    data_dir: PathBuf,
}

impl AppPaths {
    pub fn discover() -> Result<Self> {
        let overrides = (env_override(ENV_CONFIG_DIR), env_override(ENV_DATA_DIR));
        if let (Some(config_dir), Some(data_dir)) = overrides {
            return Ok(Self::from_dirs(config_dir, data_dir));
        }

        let project_dirs = ProjectDirs::from(QUALIFIER, ORGANISATION, APPLICATION)
            .ok_or_else(|| anyhow!("failed to determine user directories"))?;
        let (config_dir, data_dir) = overrides;
        Ok(Self::from_dirs(
            config_dir.unwrap_or_else(|| project_dirs.config_dir().to_path_buf()),
            data_dir.unwrap_or_else(|| project_dirs.data_dir().to_path_buf()),
        ))
    }

    pub fn from_dirs(config_dir: PathBuf, data_dir: PathBuf) -> Self {
        Self {
            config_dir,
            data_dir,
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }


    pub fn config_file(&self) -> PathBuf {
        self.config_dir.join("coversaver.toml")
    }

    pub fn state_file(&self) -> PathBuf {
        self.config_dir.join("state.toml")
    }

    /// Default cover list shared by `collect` and `bundle`.
    pub fn covers_file(&self) -> PathBuf {
        self.data_dir.join("covers.json")
    }
}

fn env_override(name: &str) -> Option<PathBuf> {
    match env::var_os(name) {
        Some(value) if !value.is_empty() => Some(PathBuf::from(value)),
        _ => None,
    }
}
