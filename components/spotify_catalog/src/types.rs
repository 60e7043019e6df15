// components/spotify_catalog/src/types.rs
use crate::error::CatalogError;
use regex::Regex;
use std::fmt;
use std::sync::LazyLock;

static PLAYLIST_PATTERNS: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"open\.spotify\.com/playlist/([a-zA-Z0-9]+)").expect("valid regex"),
        Regex::new(r"spotify:playlist:([a-zA-Z0-9]+)").expect("valid regex"),
    ]
});

/// Playlist id taken from a share link or a `spotify:playlist:` URI
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PlaylistRef(String);

impl PlaylistRef {
    pub fn parse(input: &str) -> Result<Self, CatalogError> {
        PLAYLIST_PATTERNS
            .iter()
            .find_map(|pattern| pattern.captures(input))
            .and_then(|captures| captures.get(1))
            .map(|id| PlaylistRef(id.as_str().to_string()))
            .ok_or_else(|| CatalogError::InvalidPlaylistRef(input.trim().to_string()))
    }

    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PlaylistRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "spotify:playlist:{}", self.0)
    }
}

/// Client credentials for the Spotify Web API
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
}

impl Credentials {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
        }
    }

    pub fn is_complete(&self) -> bool {
        !self.client_id.trim().is_empty() && !self.client_secret.trim().is_empty()
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .finish()
    }
}

/// A playlist entry as far as the downloader cares
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub title: String,
    pub artists: Vec<String>,
}

impl Track {
    pub fn new<I, S>(title: impl Into<String>, artists: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            title: title.into(),
            artists: artists.into_iter().map(Into::into).collect(),
        }
    }

    pub fn artist_line(&self) -> String {
        self.artists.join(", ")
    }

    /// What gets typed into the video search
    pub fn search_query(&self) -> String {
        format!("{} {}", self.artist_line(), self.title)
    }

    /// `Artist, Artist - Title`
    pub fn display_name(&self) -> String {
        format!("{} - {}", self.artist_line(), self.title)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaylistInfo {
    pub name: String,
    pub owner: String,
    pub total_tracks: u32,
}

/// Opaque pointer to the next page of a track listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageCursor(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackPage {
    pub items: Vec<Track>,
    pub next: Option<PageCursor>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use rstest::rstest;

    #[rstest]
    #[case("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M", "37i9dQZF1DXcBWIGoYBM5M")]
    #[case("https://open.spotify.com/playlist/37i9dQZF1DXcBWIGoYBM5M?si=abc123", "37i9dQZF1DXcBWIGoYBM5M")]
    #[case("open.spotify.com/playlist/6YYCPN91F4xI1Z17Hzn7ir", "6YYCPN91F4xI1Z17Hzn7ir")]
    #[case("spotify:playlist:6YYCPN91F4xI1Z17Hzn7ir", "6YYCPN91F4xI1Z17Hzn7ir")]
    #[case("  spotify:playlist:abc  ", "abc")]
    fn playlist_refs_are_extracted(#[case] input: &str, #[case] id: &str) {
        assert_eq!(PlaylistRef::parse(input).unwrap().id(), id);
    }

    #[rstest]
    #[case("")]
    #[case("https://open.spotify.com/album/1DFixLWuPkv3KT3TnV35m3")]
    #[case("spotify:track:4uLU6hMCjMI75M1A2tKUQC")]
    #[case("https://www.youtube.com/playlist?list=PL123")]
    fn other_inputs_are_rejected(#[case] input: &str) {
        assert_matches!(PlaylistRef::parse(input), Err(CatalogError::InvalidPlaylistRef(_)));
    }

    #[test]
    fn track_query_and_display() {
        let track = Track::new("Get Lucky", ["Daft Punk", "Pharrell Williams"]);
        assert_eq!(track.search_query(), "Daft Punk, Pharrell Williams Get Lucky");
        assert_eq!(track.display_name(), "Daft Punk, Pharrell Williams - Get Lucky");
    }

    #[test]
    fn credentials_hide_the_secret() {
        let credentials = Credentials::new("id", "hunter2");
        assert!(credentials.is_complete());
        assert!(!format!("{:?}", credentials).contains("hunter2"));
        assert!(!Credentials::new("id", " ").is_complete());
    }
}
