// components/spotify_catalog/src/spotify.rs
use crate::client::CatalogClient;
use crate::error::CatalogError;
use crate::types::{Credentials, PageCursor, PlaylistInfo, PlaylistRef, Track, TrackPage};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, info};

pub const ACCOUNTS_URL: &str = "https://accounts.spotify.com";
pub const API_URL: &str = "https://api.spotify.com";

/// Largest page the playlist tracks endpoint hands out
const PAGE_LIMIT: u32 = 100;
const PLAYLIST_FIELDS: &str = "name,owner(display_name),tracks(total)";
/// Tokens are renewed this long before Spotify would reject them
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);
/// Upper bound for any single request, so a stalled connection surfaces as an error
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_token_lifetime")]
    expires_in: u64,
}

fn default_token_lifetime() -> u64 {
    3600
}

#[derive(Deserialize)]
struct ApiPlaylist {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    owner: Option<ApiOwner>,
    #[serde(default)]
    tracks: Option<ApiTrackTotal>,
}

#[derive(Deserialize)]
struct ApiOwner {
    #[serde(default)]
    display_name: Option<String>,
}

#[derive(Deserialize)]
struct ApiTrackTotal {
    #[serde(default)]
    total: u32,
}

#[derive(Deserialize)]
struct ApiTrackPage {
    #[serde(default)]
    items: Vec<ApiPlaylistItem>,
    #[serde(default)]
    next: Option<String>,
}

#[derive(Deserialize)]
struct ApiPlaylistItem {
    #[serde(default)]
    track: Option<ApiTrack>,
}

#[derive(Deserialize)]
struct ApiTrack {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    artists: Vec<ApiArtist>,
}

#[derive(Deserialize)]
struct ApiArtist {
    name: String,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

impl From<ApiPlaylist> for PlaylistInfo {
    fn from(playlist: ApiPlaylist) -> Self {
        PlaylistInfo {
            name: playlist.name.unwrap_or_else(|| "Unknown Playlist".to_string()),
            owner: playlist
                .owner
                .and_then(|owner| owner.display_name)
                .unwrap_or_else(|| "Unknown".to_string()),
            total_tracks: playlist.tracks.map(|tracks| tracks.total).unwrap_or(0),
        }
    }
}

impl From<ApiTrackPage> for TrackPage {
    fn from(page: ApiTrackPage) -> Self {
        TrackPage {
            // removed tracks and unavailable items come back as `"track": null`
            items: page
                .items
                .into_iter()
                .filter_map(|item| item.track)
                .map(|track| Track {
                    title: track.name.unwrap_or_else(|| "Unknown Track".to_string()),
                    artists: track.artists.into_iter().map(|artist| artist.name).collect(),
                })
                .collect(),
            next: page.next.map(PageCursor),
        }
    }
}

struct AccessToken {
    value: String,
    expires_at: Instant,
}

/// Spotify Web API client using the client credentials flow
pub struct SpotifyClient {
    http: Client,
    credentials: Credentials,
    accounts_url: String,
    api_url: String,
    token: Mutex<AccessToken>,
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("credentials", &self.credentials)
            .field("accounts_url", &self.accounts_url)
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl SpotifyClient {
    pub async fn authenticate(credentials: Credentials) -> Result<Self, CatalogError> {
        Self::authenticate_with(credentials, ACCOUNTS_URL, API_URL).await
    }

    /// Authenticate against other endpoints, e.g. a local mock server
    pub async fn authenticate_with(
        credentials: Credentials,
        accounts_url: impl Into<String>,
        api_url: impl Into<String>,
    ) -> Result<Self, CatalogError> {
        Self::authenticate_with_timeout(credentials, accounts_url, api_url, REQUEST_TIMEOUT).await
    }

    pub async fn authenticate_with_timeout(
        credentials: Credentials,
        accounts_url: impl Into<String>,
        api_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CatalogError> {
        if !credentials.is_complete() {
            return Err(CatalogError::MissingCredentials);
        }

        let http = Client::builder().timeout(timeout).build()?;
        let accounts_url = accounts_url.into().trim_end_matches('/').to_string();
        let api_url = api_url.into().trim_end_matches('/').to_string();

        let token = request_token(&http, &accounts_url, &credentials).await?;
        info!(client_id = %credentials.client_id, "Spotify client initialized");

        Ok(Self {
            http,
            credentials,
            accounts_url,
            api_url,
            token: Mutex::new(token),
        })
    }

    async fn bearer(&self) -> Result<String, CatalogError> {
        {
            let token = self.token.lock();
            if Instant::now() < token.expires_at {
                return Ok(token.value.clone());
            }
        }

        debug!("access token expired, requesting a new one");
        let fresh = request_token(&self.http, &self.accounts_url, &self.credentials).await?;
        let value = fresh.value.clone();
        *self.token.lock() = fresh;
        Ok(value)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, CatalogError> {
        let bearer = self.bearer().await?;
        debug!(url, "GET");

        let response = self
            .http
            .get(url)
            .bearer_auth(bearer)
            .query(query)
            .send()
            .await?;

        Ok(check_status(response).await?.json::<T>().await?)
    }

    fn playlist_url(&self, playlist: &PlaylistRef) -> String {
        format!("{}/v1/playlists/{}", self.api_url, playlist.id())
    }
}

#[async_trait]
impl CatalogClient for SpotifyClient {
    async fn get_playlist(&self, playlist: &PlaylistRef) -> Result<PlaylistInfo, CatalogError> {
        let api_playlist: ApiPlaylist = self
            .get_json(
                &self.playlist_url(playlist),
                &[("fields", PLAYLIST_FIELDS.to_string())],
            )
            .await?;
        Ok(api_playlist.into())
    }

    async fn first_tracks_page(&self, playlist: &PlaylistRef) -> Result<TrackPage, CatalogError> {
        let page: ApiTrackPage = self
            .get_json(
                &format!("{}/tracks", self.playlist_url(playlist)),
                &[("limit", PAGE_LIMIT.to_string())],
            )
            .await?;
        Ok(page.into())
    }

    async fn next_page(&self, cursor: &PageCursor) -> Result<TrackPage, CatalogError> {
        let page: ApiTrackPage = self.get_json(&cursor.0, &[]).await?;
        Ok(page.into())
    }
}

async fn request_token(
    http: &Client,
    accounts_url: &str,
    credentials: &Credentials,
) -> Result<AccessToken, CatalogError> {
    let response = http
        .post(format!("{}/api/token", accounts_url))
        .basic_auth(&credentials.client_id, Some(&credentials.client_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CatalogError::Authentication(format!(
            "HTTP {}: {}",
            status.as_u16(),
            body.trim()
        )));
    }

    let token: TokenResponse = response.json().await?;
    let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_MARGIN);

    Ok(AccessToken {
        value: token.access_token,
        expires_at: Instant::now() + lifetime,
    })
}

async fn check_status(response: Response) -> Result<Response, CatalogError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiErrorBody>(&body)
        .map(|body| body.error.message)
        .unwrap_or(body);

    Err(match status {
        StatusCode::NOT_FOUND => CatalogError::NotFound(url),
        StatusCode::FORBIDDEN => CatalogError::Forbidden(message),
        StatusCode::UNAUTHORIZED => CatalogError::Authentication(message),
        _ => CatalogError::Api {
            status: status.as_u16(),
            message,
        },
    })
}
