// components/media_downloader/src/progress.rs
//! Classification of yt-dlp output lines.
//!
//! yt-dlp is asked to print its progress as one JSON object per line, but not
//! every version (or every phase of a download) honours the template, so each
//! line is first tried as a structured payload and otherwise classified by the
//! keywords it contains.

use serde::Deserialize;
use std::fmt;
use tracing::trace;

/// Marker yt-dlp and the progress template use when a value is unknown
pub const UNAVAILABLE: &str = "N/A";

/// How loudly a line of output should be reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Debug,
    Info,
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Debug => "debug",
            Severity::Info => "info",
            Severity::Success => "success",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A speed or eta figure as reported by the downloader
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Reading {
    Value(f64),
    Text(String),
}

impl Reading {
    pub fn unavailable() -> Self {
        Reading::Text(UNAVAILABLE.to_string())
    }

    pub fn is_unavailable(&self) -> bool {
        matches!(self, Reading::Text(text) if text == UNAVAILABLE)
    }
}

impl Default for Reading {
    fn default() -> Self {
        Self::unavailable()
    }
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reading::Value(value) => write!(f, "{}", value),
            Reading::Text(text) => write!(f, "{}", text),
        }
    }
}

/// One classified unit of downloader output
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Downloading {
        percent: f64,
        speed: Reading,
        eta: Reading,
    },
    Finished,
    Error {
        message: String,
    },
    RawLine {
        text: String,
        severity: Severity,
    },
}

impl ProgressEvent {
    pub fn severity(&self) -> Severity {
        match self {
            ProgressEvent::Downloading { .. } => Severity::Info,
            ProgressEvent::Finished => Severity::Success,
            ProgressEvent::Error { .. } => Severity::Error,
            ProgressEvent::RawLine { severity, .. } => *severity,
        }
    }
}

impl fmt::Display for ProgressEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProgressEvent::Downloading {
                percent,
                speed,
                eta,
            } => write!(
                f,
                "Downloading: {:.1}% complete | Speed: {} | ETA: {}",
                percent,
                format_speed(speed),
                format_eta(eta)
            ),
            ProgressEvent::Finished => write!(f, "Post-processing complete"),
            ProgressEvent::Error { message } => write!(f, "Error: {}", message),
            ProgressEvent::RawLine { text, .. } => write!(f, "{}", text),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum ProgressPayload {
    Downloading {
        #[serde(default)]
        progress: Option<ProgressFields>,
    },
    Finished {},
    Error {
        #[serde(default)]
        message: Option<String>,
    },
}

#[derive(Debug, Default, Deserialize)]
struct ProgressFields {
    #[serde(default)]
    percent: Option<f64>,
    #[serde(default)]
    speed: Option<Reading>,
    #[serde(default)]
    eta: Option<Reading>,
}

impl From<ProgressPayload> for ProgressEvent {
    fn from(payload: ProgressPayload) -> Self {
        match payload {
            ProgressPayload::Downloading { progress } => {
                let progress = progress.unwrap_or_default();
                ProgressEvent::Downloading {
                    percent: progress.percent.unwrap_or(0.0),
                    speed: progress.speed.unwrap_or_default(),
                    eta: progress.eta.unwrap_or_default(),
                }
            }
            ProgressPayload::Finished {} => ProgressEvent::Finished,
            ProgressPayload::Error { message } => ProgressEvent::Error {
                message: message.unwrap_or_else(|| "Unknown error".to_string()),
            },
        }
    }
}

/// Turn one line of downloader output into a progress event
pub fn parse_line(raw: &str) -> ProgressEvent {
    let line = raw.trim();

    if line.starts_with('{') && line.ends_with('}') {
        match serde_json::from_str::<ProgressPayload>(line) {
            Ok(payload) => return payload.into(),
            Err(e) => trace!(error = %e, "progress payload did not decode, classifying as text"),
        }
    }

    ProgressEvent::RawLine {
        text: line.to_string(),
        severity: classify(line),
    }
}

fn classify(line: &str) -> Severity {
    if line.contains("ERROR") {
        Severity::Error
    } else if line.contains("WARNING") {
        Severity::Warning
    } else if line.contains("Downloading") || line.contains("Merging") {
        Severity::Info
    } else {
        Severity::Debug
    }
}

/// Render bytes per second in the largest unit that keeps the value below 1024
pub fn format_speed(speed: &Reading) -> String {
    let value = match speed {
        Reading::Value(value) => *value,
        Reading::Text(text) => match text.trim().parse::<f64>() {
            Ok(value) => value,
            Err(_) => return text.clone(),
        },
    };

    if value < 1024.0 {
        format!("{:.1} B/s", value)
    } else if value < 1024.0 * 1024.0 {
        format!("{:.1} KB/s", value / 1024.0)
    } else {
        format!("{:.1} MB/s", value / (1024.0 * 1024.0))
    }
}

/// Render remaining seconds as `Ns`, `Mm Ss` or `Hh Mm`
pub fn format_eta(eta: &Reading) -> String {
    let seconds = match eta {
        Reading::Value(value) if value.is_finite() => value.trunc() as i64,
        Reading::Value(value) => return value.to_string(),
        Reading::Text(text) => match text.trim().parse::<i64>() {
            Ok(seconds) => seconds,
            Err(_) => return text.clone(),
        },
    };

    if seconds < 60 {
        format!("{}s", seconds)
    } else if seconds < 3600 {
        format!("{}m {}s", seconds / 60, seconds % 60)
    } else {
        format!("{}h {}m", seconds / 3600, (seconds % 3600) / 60)
    }
}
