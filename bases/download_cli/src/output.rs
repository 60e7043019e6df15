// bases/download_cli/src/output.rs
use chrono::Local;
use colored::{ColoredString, Colorize};
use converter_config::ConfigStore;
use media_downloader::{ProgressEvent, Severity};
use playlist_converter::{ConversionEvent, ConversionResult, ConversionStatus};
use std::cell::Cell;
use std::io::Write;

pub const MENU_ITEMS: [&str; 5] = [
    "Convert Spotify Playlist",
    "Download Single YouTube Video or Music",
    "Configure Spotify API",
    "Set Output Directory",
    "Exit",
];

pub struct OutputHandler {
    verbose: bool,
    /// A progress line is on screen without a trailing newline
    progress_open: Cell<bool>,
}

impl OutputHandler {
    pub fn new(verbose: bool) -> Self {
        Self {
            verbose,
            progress_open: Cell::new(false),
        }
    }

    pub fn print_banner(&self) {
        println!("{}", "Spotify Playlist Converter".bold().green());
        println!("{}", "Powered by yt-dlp".dimmed());
    }

    pub fn print_menu(&self) {
        println!();
        for (number, item) in MENU_ITEMS.iter().enumerate() {
            println!("  {}. {}", (number + 1).to_string().bold(), item);
        }
        println!();
    }

    pub fn log(&self, severity: Severity, message: impl AsRef<str>) {
        if severity == Severity::Debug && !self.verbose {
            return;
        }
        self.close_progress_line();
        println!("{}", format_line(&timestamp(), severity, message.as_ref()));
    }

    pub fn render(&self, event: &ConversionEvent) {
        match event {
            ConversionEvent::Log { severity, message } => self.log(*severity, message),
            ConversionEvent::Progress { event, .. } => self.render_progress(event),
            ConversionEvent::PlaylistResolved { .. }
            | ConversionEvent::TrackStarted { .. }
            | ConversionEvent::TrackFinished { .. } => {
                // the converter logs these itself
            }
        }
    }

    pub fn render_progress(&self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Downloading { .. } => {
                print!("\r{}", format_line(&timestamp(), Severity::Info, &event.to_string()));
                let _ = std::io::stdout().flush();
                self.progress_open.set(true);
            }
            other => self.log(other.severity(), other.to_string()),
        }
    }

    pub fn print_summary(&self, result: &ConversionResult) {
        self.close_progress_line();
        println!();
        println!("{}", "Summary".bold());
        println!("  Playlist:   {}", result.playlist.name);
        println!("  Saved to:   {}", result.destination.display());
        println!("  Downloaded: {}", result.downloaded().to_string().green());
        println!("  Skipped:    {}", result.skipped());
        println!("  Failed:     {}", result.failed().to_string().red());
        if result.status() == ConversionStatus::Partial && result.total() < result.listed {
            println!("  Not tried:  {}", result.listed - result.total());
        }
    }

    pub fn print_config(&self, store: &ConfigStore) {
        let config = store.config();
        let secret = if config.spotify.client_secret.is_empty() {
            "not set".dimmed()
        } else {
            "********".normal()
        };
        let client_id = if config.spotify.client_id.is_empty() {
            "not set".dimmed()
        } else {
            config.spotify.client_id.normal()
        };

        println!("{}", "Configuration".bold());
        println!("  File:          {}", store.path().display());
        println!("  Client ID:     {}", client_id);
        println!("  Client Secret: {}", secret);
        println!("  Output path:   {}", config.settings.output_path.display());
        println!("  Download type: {}", config.settings.download_type);
        println!("  Theme:         {} / {}", config.settings.theme, config.settings.color_theme);
    }

    pub fn print_error(&self, error: &color_eyre::Report) {
        self.close_progress_line();
        eprintln!("{}", format_line(&timestamp(), Severity::Error, &error.to_string()));

        if self.verbose {
            error.chain().skip(1).for_each(|cause| {
                eprintln!("  caused by: {}", cause);
            });
        }
    }

    fn close_progress_line(&self) {
        if self.progress_open.replace(false) {
            println!();
        }
    }
}

fn timestamp() -> String {
    Local::now().format("%H:%M:%S").to_string()
}

pub fn icon(severity: Severity) -> &'static str {
    match severity {
        Severity::Debug => "[.]",
        Severity::Info => "[*]",
        Severity::Success => "[+]",
        Severity::Warning => "[!]",
        Severity::Error => "[x]",
    }
}

fn paint(severity: Severity, text: &str) -> ColoredString {
    match severity {
        Severity::Debug => text.dimmed(),
        Severity::Info => text.cyan(),
        Severity::Success => text.green(),
        Severity::Warning => text.yellow(),
        Severity::Error => text.red(),
    }
}

/// `[12:00:00] [+] message`, icon and message colored by severity
pub fn format_line(timestamp: &str, severity: Severity, message: &str) -> String {
    format!(
        "{} {} {}",
        format!("[{}]", timestamp).dimmed(),
        paint(severity, icon(severity)),
        paint(severity, message)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(Severity::Info, "[*]")]
    #[case(Severity::Success, "[+]")]
    #[case(Severity::Warning, "[!]")]
    #[case(Severity::Error, "[x]")]
    fn lines_carry_severity_icon(#[case] severity: Severity, #[case] expected: &str) {
        let line = format_line("12:34:56", severity, "Downloading track 1/3");
        assert!(line.contains(expected));
        assert!(line.contains("12:34:56"));
        assert!(line.contains("Downloading track 1/3"));
    }

    #[test]
    fn menu_is_numbered_in_order() {
        assert_eq!(MENU_ITEMS.len(), 5);
        assert_eq!(MENU_ITEMS[0], "Convert Spotify Playlist");
        assert_eq!(MENU_ITEMS[4], "Exit");
    }
}
