use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use covers::AccessToken;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppState {
    /// PKCE verifier waiting for its authorization code.
    pub spotify_verifier: Option<String>,
    pub spotify_token: Option<AccessToken>,
    /// Last Apple Music developer token minted from the signing key.
    pub apple_developer_token: Option<AccessToken>,
    /// Epoch seconds of the last successful `collect`.
    pub last_collection: Option<u64>,
}

impl AppState {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read state file at {}", path.display()))?;
            let state: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse state file at {}", path.display()))?;
            Ok(state)
        } else {
            Ok(Self::default())
        }
    }

    pub fn persist(&self, path: &Path) -> Result<()> {
        let dir = path
            .parent()
            .ok_or_else(|| anyhow::anyhow!("state path has no parent: {}", path.display()))?;
        fs::create_dir_all(dir).with_context(|| {
            format!(
                "failed to prepare directory for state file at {}",
                dir.display()
            )
        })?;
        let serialized =
            toml::to_string_pretty(self).context("failed to serialize state file to TOML")?;
        fs::write(path, serialized)
            .with_context(|| format!("failed to write state file to {}", path.display()))?;
        Ok(())
    }

    /// The stored Spotify token, if it still has enough life left to use.
    pub fn usable_spotify_token(&self) -> Option<&AccessToken> {
        self.spotify_token.as_ref().filter(|token| token.is_fresh())
    }
}
