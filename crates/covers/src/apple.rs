use reqwest::blocking::Client;
use reqwest::Url;
use serde::Deserialize;
use tracing::{debug, info};

use crate::{Cover, CoverSource, LibraryError};

const SERVICE: &str = "Apple Music";
pub const API_BASE: &str = "https://api.music.apple.com";
pub const LIBRARY_ALBUMS_PATH: &str = "/v1/me/library/albums?limit=100";

/// Fills the `{w}`/`{h}` placeholders of an artwork url template.
pub fn artwork_url(template: &str, size: u32) -> String {
    let size = size.to_string();
    template.replace("{w}", &size).replace("{h}", &size)
}

#[derive(Debug, Deserialize)]
struct LibraryPage {
    #[serde(default)]
    data: Vec<LibraryAlbum>,
    next: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LibraryAlbum {
    id: String,
    attributes: Option<AlbumAttributes>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumAttributes {
    #[serde(default)]
    name: String,
    #[serde(default)]
    artist_name: String,
    artwork: Option<Artwork>,
}

#[derive(Debug, Deserialize)]
struct Artwork {
    url: Option<String>,
}

/// Decodes one library page. `next` is a path relative to the API host.
pub fn parse_library_page(
    body: &str,
    artwork_size: u32,
) -> Result<(Vec<Cover>, Option<String>), LibraryError> {
    let page: LibraryPage = serde_json::from_str(body).map_err(|source| LibraryError::Decode {
        service: SERVICE,
        source,
    })?;
    let covers = page
        .data
        .into_iter()
        .filter_map(|album| {
            let attributes = album.attributes?;
            let template = attributes.artwork?.url.filter(|url| !url.is_empty())?;
            Some(Cover {
                id: album.id,
                url: artwork_url(&template, artwork_size),
                name: attributes.name,
                artist: attributes.artist_name,
                source: CoverSource::Apple,
            })
        })
        .collect();
    Ok((covers, page.next.filter(|next| !next.is_empty())))
}

#[derive(Debug, Clone)]
pub struct AppleMusicClient {
    http: Client,
    developer_token: String,
    music_user_token: String,
    api_base: Url,
    artwork_size: u32,
}

impl AppleMusicClient {
    pub fn new(
        http: Client,
        developer_token: impl Into<String>,
        music_user_token: impl Into<String>,
        artwork_size: u32,
    ) -> Result<Self, LibraryError> {
        let api_base = Url::parse(API_BASE).map_err(|_| LibraryError::Url {
            service: SERVICE,
            url: API_BASE.to_string(),
        })?;
        Ok(Self {
            http,
            developer_token: developer_token.into(),
            music_user_token: music_user_token.into(),
            api_base,
            artwork_size,
        })
    }

    fn resolve(&self, path: &str) -> Result<Url, LibraryError> {
        self.api_base.join(path).map_err(|_| LibraryError::Url {
            service: SERVICE,
            url: path.to_string(),
        })
    }

    pub fn fetch_album_covers(&self) -> Result<Vec<Cover>, LibraryError> {
        let mut covers = Vec::new();
        let mut next = Some(LIBRARY_ALBUMS_PATH.to_string());
        let mut pages = 0usize;
        while let Some(path) = next {
            let url = self.resolve(&path)?;
            debug!(%url, "requesting apple music library page");
            let response = self
                .http
                .get(url)
                .bearer_auth(&self.developer_token)
                .header("Music-User-Token", &self.music_user_token)
                .send()
                .map_err(|source| LibraryError::Request {
                    service: SERVICE,
                    source,
                })?;
            let status = response.status();
            if !status.is_success() {
                return Err(LibraryError::Status {
                    service: SERVICE,
                    status: status.as_u16(),
                });
            }
            let body = response.text().map_err(|source| LibraryError::Request {
                service: SERVICE,
                source,
            })?;
            let (page, following) = parse_library_page(&body, self.artwork_size)?;
            covers.extend(page);
            next = following;
            pages += 1;
        }
        info!(covers = covers.len(), pages, "fetched apple music library");
        Ok(covers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artwork_template_gets_square_size() {
        assert_eq!(
            artwork_url("https://is1.mzstatic.com/image/{w}x{h}bb.jpg", 500),
            "https://is1.mzstatic.com/image/500x500bb.jpg"
        );
        assert_eq!(artwork_url("https://plain/url.jpg", 500), "https://plain/url.jpg");
    }

    #[test]
    fn library_page_skips_albums_without_artwork() {
        let body = r#"{
            "data": [
                {"id": "l.1", "attributes": {"name": "Random Access Memories",
                    "artistName": "Daft Punk",
                    "artwork": {"url": "https://art/{w}x{h}.jpg", "width": 1200}}},
                {"id": "l.2", "attributes": {"name": "No Art", "artistName": "Anon"}},
                {"id": "l.3"}
            ],
            "next": "/v1/me/library/albums?offset=100"
        }"#;
        let (covers, next) = parse_library_page(body, 300).unwrap();
        assert_eq!(covers.len(), 1);
        assert_eq!(covers[0].id, "l.1");
        assert_eq!(covers[0].url, "https://art/300x300.jpg");
        assert_eq!(covers[0].artist, "Daft Punk");
        assert_eq!(covers[0].source, CoverSource::Apple);
        assert_eq!(next.as_deref(), Some("/v1/me/library/albums?offset=100"));
    }

    #[test]
    fn relative_next_resolves_against_api_host() {
        let client =
            AppleMusicClient::new(Client::new(), "dev", "user", 500).expect("client");
        let url = client.resolve("/v1/me/library/albums?offset=100").unwrap();
        assert_eq!(
            url.as_str(),
            "https://api.music.apple.com/v1/me/library/albums?offset=100"
        );
    }

    #[test]
    fn malformed_body_is_a_decode_error() {
        let err = parse_library_page("<html>", 500).unwrap_err();
        assert!(matches!(err, LibraryError::Decode { .. }));
    }
}
