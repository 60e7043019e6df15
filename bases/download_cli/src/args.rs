// bases/download_cli/src/args.rs
use clap::{Parser, Subcommand, ValueEnum};
use converter_config::DownloadType;
use std::path::PathBuf;

/// Convert Spotify playlists and YouTube links into local files.
///
/// Without a subcommand an interactive menu is shown.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Config file to use instead of the platform default
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Download every track of a Spotify playlist as mp3
    Convert {
        /// Playlist link or spotify:playlist: URI
        playlist: String,

        /// Directory the playlist folder is created in
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Download a single YouTube video or its audio
    Download {
        url: String,

        /// Defaults to the configured download type
        #[arg(short, long, value_enum)]
        kind: Option<KindArg>,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Store Spotify API credentials
    Configure {
        #[arg(long)]
        client_id: String,

        #[arg(long)]
        client_secret: String,
    },

    /// Change the default output directory
    SetOutput { path: PathBuf },

    /// Print the current configuration
    ShowConfig,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KindArg {
    Music,
    Video,
}

impl From<KindArg> for DownloadType {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Music => DownloadType::Music,
            KindArg::Video => DownloadType::Video,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn no_subcommand_means_interactive() {
        let args = Args::try_parse_from(["download-cli"]).unwrap();
        assert_eq!(args.command, None);
        assert!(!args.verbose);
        assert_eq!(args.config, None);
    }

    #[test]
    fn convert_takes_playlist_and_output() {
        let args = Args::try_parse_from([
            "download-cli",
            "-v",
            "convert",
            "spotify:playlist:abc",
            "--output",
            "/music",
        ])
        .unwrap();

        assert!(args.verbose);
        assert_eq!(
            args.command,
            Some(Command::Convert {
                playlist: "spotify:playlist:abc".to_string(),
                output: Some(PathBuf::from("/music")),
            })
        );
    }

    #[test]
    fn download_kind_is_optional() {
        let args = Args::try_parse_from(["download-cli", "download", "https://youtu.be/x", "-k", "video"]).unwrap();
        assert_matches!(
            args.command,
            Some(Command::Download { kind: Some(KindArg::Video), output: None, .. })
        );

        let args = Args::try_parse_from(["download-cli", "download", "https://youtu.be/x"]).unwrap();
        assert_matches!(args.command, Some(Command::Download { kind: None, .. }));
    }

    #[test]
    fn global_config_flag_after_subcommand() {
        let args = Args::try_parse_from(["download-cli", "show-config", "--config", "/tmp/c.toml"]).unwrap();
        assert_eq!(args.command, Some(Command::ShowConfig));
        assert_eq!(args.config, Some(PathBuf::from("/tmp/c.toml")));
    }

    #[test]
    fn configure_requires_both_values() {
        assert!(Args::try_parse_from(["download-cli", "configure", "--client-id", "x"]).is_err());
        assert_eq!(DownloadType::from(KindArg::Music), DownloadType::Music);
    }
}
