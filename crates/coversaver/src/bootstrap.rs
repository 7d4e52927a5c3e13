use std::fs;
use std::path::Path;

use anyhow::{bail, Context, Result};
use saverconfig::SaverConfig;
use tracing::{debug, info};

use crate::paths::AppPaths;
use crate::state::AppState;

pub fn bootstrap_filesystem(paths: &AppPaths) -> Result<AppState> {
    for dir in [paths.config_dir(), paths.data_dir()] {
        ensure_directory(dir)?;
    }

    let state_path = paths.state_file();
    let state_exists = state_path.exists();
    let state = AppState::load_or_default(&state_path)?;
    if state_exists {
        debug!(path = %state_path.display(), "loaded coversaver state file");
    } else {
        state.persist(&state_path)?;
        info!(path = %state_path.display(), "initialised coversaver state file");
    }

    Ok(state)
}

fn ensure_directory(path: &Path) -> Result<()> {
    if path.exists() {
        if path.is_dir() {
            debug!(path = %path.display(), "reusing existing directory");
            Ok(())
        } else {
            bail!("filesystem entry at {} is not a directory", path.display());
        }
    } else {
        fs::create_dir_all(path).with_context(|| {
            format!("failed to create coversaver directory at {}", path.display())
        })?;
        info!(path = %path.display(), "created coversaver directory");
        Ok(())
    }
}

/// Reads the explicit `--config` file, or the default one when present.
///
/// A missing default file means built-in defaults; a missing explicit file is
/// an error.
pub fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<SaverConfig> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => (paths.config_file(), false),
    };
    if !path.exists() {
        if required {
            bail!("config file {} does not exist", path.display());
        }
        debug!(path = %path.display(), "no config file; using defaults");
        return Ok(SaverConfig::default());
    }
    let contents = fs::read_to_string(&path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config = SaverConfig::from_toml_str(&contents)
        .with_context(|| format!("invalid config file at {}", path.display()))?;
    debug!(path = %path.display(), "loaded config");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_paths(root: &Path) -> AppPaths {
        AppPaths::from_dirs(root.join("config"), root.join("data"))
    }

    #[test]
    fn bootstrap_creates_directories_and_state() {
        let temp = tempfile::tempdir().unwrap();
        let paths = temp_paths(temp.path());
        let state = bootstrap_filesystem(&paths).unwrap();
        assert_eq!(state, AppState::default());
        assert!(paths.data_dir().is_dir());
        assert!(paths.state_file().is_file());
    }

    #[test]
    fn bootstrap_rejects_file_in_place_of_directory() {
        let temp = tempfile::tempdir().unwrap();
        let paths = temp_paths(temp.path());
        fs::write(temp.path().join("data"), "oops").unwrap();
        assert!(bootstrap_filesystem(&paths).is_err());
    }

    #[test]
    fn config_resolution() {
        let temp = tempfile::tempdir().unwrap();
        let paths = temp_paths(temp.path());
        let defaults = load_config(None, &paths).unwrap();
        assert_eq!(defaults.bundle.batch_size, 10);

        assert!(load_config(Some(&temp.path().join("missing.toml")), &paths).is_err());

        let custom = temp.path().join("custom.toml");
        fs::write(&custom, "version = 1\n[bundle]\nbatch_size = 4\n").unwrap();
        assert_eq!(load_config(Some(&custom), &paths).unwrap().bundle.batch_size, 4);

        fs::write(&custom, "version = 2\n").unwrap();
        assert!(load_config(Some(&custom), &paths).is_err());
    }
}
