// components/media_downloader/src/utils.rs

/// Sanitize a filename to be safe for all filesystems
pub fn sanitize_filename(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            // Replace invalid characters with underscores
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            _ => c,
        })
        .collect()
}

/// The file name an extracted audio track is expected to end up under
pub fn expected_audio_filename(artists: &str, title: &str) -> String {
    sanitize_filename(&format!("{} - {}.mp3", artists, title))
}
