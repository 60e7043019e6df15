// components/spotify_catalog/src/client.rs
use crate::error::CatalogError;
use crate::types::{PageCursor, PlaylistInfo, PlaylistRef, Track, TrackPage};
use async_trait::async_trait;
use tracing::debug;

/// Read access to a music catalog's playlists
#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Name, owner and track count of a playlist
    async fn get_playlist(&self, playlist: &PlaylistRef) -> Result<PlaylistInfo, CatalogError>;

    /// First page of a playlist's tracks
    async fn first_tracks_page(&self, playlist: &PlaylistRef) -> Result<TrackPage, CatalogError>;

    /// Page following the one that handed out `cursor`
    async fn next_page(&self, cursor: &PageCursor) -> Result<TrackPage, CatalogError>;
}

/// Every track of a playlist in playlist order, following page cursors until
/// the catalog stops handing them out
pub async fn fetch_all_tracks(
    client: &dyn CatalogClient,
    playlist: &PlaylistRef,
) -> Result<Vec<Track>, CatalogError> {
    let mut page = client.first_tracks_page(playlist).await?;
    let mut tracks = Vec::with_capacity(page.items.len());

    loop {
        tracks.append(&mut page.items);
        let Some(cursor) = page.next.take() else {
            break;
        };
        debug!(playlist = %playlist, fetched = tracks.len(), "fetching next page of tracks");
        page = client.next_page(&cursor).await?;
    }

    Ok(tracks)
}


#[cfg(test)]
mod tests {
    use super::stub::CatalogStub;
    use super::*;
    use std::sync::atomic::Ordering;

    fn tracks(prefix: &str, count: usize) -> Vec<Track> {
        (0..count)
            .map(|n| Track::new(format!("{} {}", prefix, n), ["Artist"]))
            .collect()
    }

    #[tokio::test]
    async fn pages_are_concatenated_in_order() {
        let catalog = CatalogStub::with_pages(
            "Mix",
            vec![tracks("a", 2), tracks("b", 2), tracks("c", 1)],
        );
        let playlist = PlaylistRef::parse("spotify:playlist:mix").unwrap();

        let all = fetch_all_tracks(&catalog, &playlist).await.unwrap();

        let titles: Vec<&str> = all.iter().map(|t| t.title.as_str()).collect();
        assert_eq!(titles, ["a 0", "a 1", "b 0", "b 1", "c 0"]);
        assert_eq!(catalog.page_requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn single_page_needs_no_cursor() {
        let catalog = CatalogStub::with_pages("Short", vec![tracks("a", 3)]);
        let playlist = PlaylistRef::parse("spotify:playlist:short").unwrap();

        let all = fetch_all_tracks(&catalog, &playlist).await.unwrap();

        assert_eq!(all.len(), 3);
        assert_eq!(catalog.page_requests.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn empty_playlist_yields_no_tracks() {
        let catalog = CatalogStub::with_pages("Empty", vec![]);
        let playlist = PlaylistRef::parse("spotify:playlist:empty").unwrap();

        assert!(fetch_all_tracks(&catalog, &playlist).await.unwrap().is_empty());
    }
}
