//! Collects album artwork from the user's music libraries and packages it
//! into an installable screen saver archive.
//!
//! Types:
//!
//! - `Cover` is the flat record every service is reduced to; `CoverSource`
//!   remembers which library it came from.
//! - `SpotifyClient` and `AppleMusicClient` page through the saved albums of
//!   each service.
//! - `AccessToken` tracks an OAuth token and its expiry.
//! - `DeveloperKey` signs Apple Music developer tokens.
//!
//! Functions:
//!
//! - `merge_covers` combines per-service lists, dropping cross-service
//!   duplicates.
//! - `assemble_bundle` downloads covers and writes the `.saver` zip.
mod apple;
mod bundle;
mod developer_token;
mod spotify;
mod token;

pub use apple::{artwork_url, parse_library_page, AppleMusicClient};
pub use bundle::{
    assemble_bundle, http_fetcher, install_script, AssemblyPhase, AssemblyProgress, BundleError,
    BundleOptions, SaverTemplate,
};
pub use developer_token::{DeveloperClaims, DeveloperKey, DEVELOPER_TOKEN_LIFETIME};
pub use spotify::{
    authorize_url, code_challenge, generate_verifier, parse_album_page, parse_token_response,
    SpotifyClient,
};
pub use token::{unix_now, AccessToken};

use std::collections::HashSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("{service} request failed: {source}")]
    Request {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },
    #[error("{service} API error: {status}")]
    Status { service: &'static str, status: u16 },
    #[error("{service} authorization failed: {message}")]
    Auth {
        service: &'static str,
        message: String,
    },
    #[error("unexpected {service} response: {source}")]
    Decode {
        service: &'static str,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid {service} url '{url}'")]
    Url { service: &'static str, url: String },
    #[error("failed to read signing key {}: {source}", path.display())]
    KeyFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{service} token signing failed: {source}")]
    Signing {
        service: &'static str,
        #[source]
        source: jsonwebtoken::errors::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoverSource {
    Apple,
    Spotify,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cover {
    pub id: String,
    pub url: String,
    pub name: String,
    pub artist: String,
    pub source: CoverSource,
}

impl Cover {
    /// Identity used to spot the same album across services.
    pub fn dedupe_key(&self) -> String {
        format!(
            "{}::{}",
            self.name.to_lowercase(),
            self.artist.to_lowercase()
        )
    }
}

/// Apple covers first, then Spotify; the first occurrence of an album wins.
pub fn merge_covers(apple: Vec<Cover>, spotify: Vec<Cover>) -> Vec<Cover> {
    let mut seen = HashSet::new();
    apple
        .into_iter()
        .chain(spotify)
        .filter(|cover| seen.insert(cover.dedupe_key()))
        .collect()
}
