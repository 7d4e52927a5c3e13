//! Spotify saved-albums access: PKCE authorization code flow plus paging
//! through `/v1/me/albums`.
use std::time::Duration;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use tracing::{debug, info};

use crate::token::{unix_now, AccessToken};
use crate::{Cover, CoverSource, LibraryError};

const SERVICE: &str = "Spotify";
pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";
pub const ALBUMS_URL: &str = "https://api.spotify.com/v1/me/albums?limit=50";
pub const SCOPE: &str = "user-library-read";

const VERIFIER_LEN: usize = 128;
const VERIFIER_CHARS: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789";

pub fn generate_verifier<R: Rng>(rng: &mut R) -> String {
    (0..VERIFIER_LEN)
        .map(|_| VERIFIER_CHARS[rng.gen_range(0..VERIFIER_CHARS.len())] as char)
        .collect()
}

/// S256 challenge: unpadded base64url of the verifier's SHA-256.
pub fn code_challenge(verifier: &str) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()))
}

pub fn authorize_url(
    client_id: &str,
    redirect_uri: &str,
    challenge: &str,
) -> Result<Url, LibraryError> {
    Url::parse_with_params(
        AUTHORIZE_URL,
        &[
            ("client_id", client_id),
            ("response_type", "code"),
            ("redirect_uri", redirect_uri),
            ("scope", SCOPE),
            ("code_challenge_method", "S256"),
            ("code_challenge", challenge),
        ],
    )
    .map_err(|_| LibraryError::Url {
        service: SERVICE,
        url: AUTHORIZE_URL.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

/// Default lifetime Spotify grants when the response leaves it out.
const DEFAULT_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

pub fn parse_token_response(body: &str, now: u64) -> Result<AccessToken, LibraryError> {
    let response: TokenResponse =
        serde_json::from_str(body).map_err(|source| LibraryError::Decode {
            service: SERVICE,
            source,
        })?;
    if let Some(error) = response.error {
        let message = response
            .error_description
            .filter(|description| !description.is_empty())
            .unwrap_or(error);
        return Err(LibraryError::Auth {
            service: SERVICE,
            message,
        });
    }
    let value = response.access_token.ok_or_else(|| LibraryError::Auth {
        service: SERVICE,
        message: "token response carried no access_token".to_string(),
    })?;
    let lifetime = response
        .expires_in
        .map(Duration::from_secs)
        .unwrap_or(DEFAULT_TOKEN_LIFETIME);
    Ok(AccessToken::expiring_in(value, lifetime, now))
}

#[derive(Debug, Deserialize)]
struct AlbumPage {
    #[serde(default)]
    items: Vec<SavedAlbum>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SavedAlbum {
    album: Album,
}

#[derive(Debug, Deserialize)]
struct Album {
    id: String,
    name: String,
    #[serde(default)]
    images: Vec<AlbumImage>,
    #[serde(default)]
    artists: Vec<Artist>,
}

#[derive(Debug, Deserialize)]
struct AlbumImage {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Artist {
    name: String,
}

/// Decodes one page of saved albums, returning its covers and the next page url.
pub fn parse_album_page(body: &str) -> Result<(Vec<Cover>, Option<String>), LibraryError> {
    let page: AlbumPage = serde_json::from_str(body).map_err(|source| LibraryError::Decode {
        service: SERVICE,
        source,
    })?;
    let covers = page
        .items
        .into_iter()
        .filter_map(|saved| {
            let album = saved.album;
            let url = album.images.into_iter().next()?.url?;
            if url.is_empty() {
                return None;
            }
            let artist = album
                .artists
                .iter()
                .map(|artist| artist.name.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            Some(Cover {
                id: album.id,
                url,
                name: album.name,
                artist,
                source: CoverSource::Spotify,
            })
        })
        .collect();
    Ok((covers, page.next.filter(|next| !next.is_empty())))
}

#[derive(Debug, Clone)]
pub struct SpotifyClient {
    http: Client,
    client_id: String,
    redirect_uri: String,
}

impl SpotifyClient {
    pub fn new(
        http: Client,
        client_id: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http,
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
        }
    }

    pub fn authorize_url(&self, challenge: &str) -> Result<Url, LibraryError> {
        authorize_url(&self.client_id, &self.redirect_uri, challenge)
    }

    pub fn exchange_code(&self, code: &str, verifier: &str) -> Result<AccessToken, LibraryError> {
        debug!(redirect_uri = %self.redirect_uri, "exchanging spotify authorization code");
        let response = self
            .http
            .post(TOKEN_URL)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("grant_type", "authorization_code"),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
                ("code_verifier", verifier),
            ])
            .send()
            .map_err(request_error)?;
        let body = response.text().map_err(request_error)?;
        parse_token_response(&body, unix_now())
    }

    pub fn fetch_album_covers(&self, token: &AccessToken) -> Result<Vec<Cover>, LibraryError> {
        let mut covers = Vec::new();
        let mut next = Some(ALBUMS_URL.to_string());
        let mut pages = 0usize;
        while let Some(url) = next {
            debug!(%url, "requesting spotify album page");
            let response = self
                .http
                .get(&url)
                .bearer_auth(&token.value)
                .send()
                .map_err(request_error)?;
            let status = response.status();
            if !status.is_success() {
                return Err(LibraryError::Status {
                    service: SERVICE,
                    status: status.as_u16(),
                });
            }
            let body = response.text().map_err(request_error)?;
            let (page, following) = parse_album_page(&body)?;
            covers.extend(page);
            next = following;
            pages += 1;
        }
        info!(covers = covers.len(), pages, "fetched spotify library");
        Ok(covers)
    }
}

fn request_error(source: reqwest::Error) -> LibraryError {
    LibraryError::Request {
        service: SERVICE,
        source,
    }
}
