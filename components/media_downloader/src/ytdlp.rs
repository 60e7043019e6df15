// components/media_downloader/src/ytdlp.rs
use crate::progress::{parse_line, ProgressEvent};
use crate::types::{DownloadError, DownloadRequest, Downloader, MediaKind, MediaSource};
use async_trait::async_trait;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_BINARY: &str = "yt-dlp";

/// How long a terminated yt-dlp gets to exit before it is killed
pub const TERMINATE_GRACE_PERIOD: Duration = Duration::from_secs(1);

/// Makes yt-dlp print one JSON object per progress update
const PROGRESS_TEMPLATE: &str = concat!(
    "download:{\"status\":\"%(progress.status)s\",",
    "\"progress\":{\"percent\":%(progress._percent|0)s,",
    "\"speed\":%(progress.speed|null)s,",
    "\"eta\":%(progress.eta|null)s}}"
);

const AUDIO_FORMAT_ARGS: &[&str] = &[
    "-x",
    "--audio-format",
    "mp3",
    "--audio-quality",
    "192K",
    "--embed-thumbnail",
    "--add-metadata",
    "--embed-metadata",
    "--parse-metadata",
    "title:%(artist)s - %(title)s",
    "--prefer-ffmpeg",
];

const VIDEO_FORMAT_ARGS: &[&str] = &[
    "-f",
    "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
    "--merge-output-format",
    "mp4",
];

const LINE_BUFFER: usize = 64;

/// Drives the external yt-dlp binary
#[derive(Debug, Clone)]
pub struct YtDlp {
    program: PathBuf,
    launcher_args: Vec<OsString>,
    grace_period: Duration,
}

impl YtDlp {
    /// Use `yt-dlp` as found on the PATH when the download starts
    pub fn new() -> Self {
        Self::with_binary(DEFAULT_BINARY)
    }

    pub fn with_binary(binary: impl Into<PathBuf>) -> Self {
        Self {
            program: binary.into(),
            launcher_args: Vec::new(),
            grace_period: TERMINATE_GRACE_PERIOD,
        }
    }

    /// Run yt-dlp through another program, e.g. `python3 -m yt_dlp`
    pub fn with_launcher<I, S>(program: impl Into<PathBuf>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        Self {
            program: program.into(),
            launcher_args: args.into_iter().map(Into::into).collect(),
            grace_period: TERMINATE_GRACE_PERIOD,
        }
    }

    /// Resolve yt-dlp on the PATH up front
    pub fn locate() -> Result<Self, DownloadError> {
        which::which(DEFAULT_BINARY)
            .map(Self::with_binary)
            .map_err(|_| DownloadError::DependencyNotFound(DEFAULT_BINARY))
    }

    pub fn with_grace_period(mut self, grace_period: Duration) -> Self {
        self.grace_period = grace_period;
        self
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    fn command(&self, request: &DownloadRequest) -> Command {
        let mut command = Command::new(&self.program);
        command
            .args(&self.launcher_args)
            .args(build_args(request))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command
    }
}

impl Default for YtDlp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Downloader for YtDlp {
    async fn check_available(&self) -> Result<(), DownloadError> {
        which::which(&self.program)
            .map(|_| ())
            .map_err(|_| DownloadError::DependencyNotFound(DEFAULT_BINARY))
    }

    async fn download(
        &self,
        request: &DownloadRequest,
        progress: mpsc::Sender<ProgressEvent>,
        cancel: &CancellationToken,
    ) -> Result<(), DownloadError> {
        let args = build_args(request);
        debug!(program = %self.program.display(), ?args, "spawning yt-dlp");

        let mut child = self.command(request).spawn()?;

        let (line_tx, line_rx) = mpsc::channel(LINE_BUFFER);
        let mut readers = Vec::with_capacity(2);
        if let Some(stdout) = child.stdout.take() {
            readers.push(forward_lines(stdout, line_tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            readers.push(forward_lines(stderr, line_tx.clone()));
        }
        drop(line_tx);

        if let PumpEnd::Cancelled = pump_progress(line_rx, &progress, cancel).await {
            info!("stop requested, terminating yt-dlp");
            for reader in &readers {
                reader.abort();
            }
            terminate(&mut child, self.grace_period).await?;
            return Err(DownloadError::Cancelled);
        }

        let status = tokio::select! {
            biased;
            status = child.wait() => status?,
            _ = cancel.cancelled() => {
                terminate(&mut child, self.grace_period).await?;
                return Err(DownloadError::Cancelled);
            }
        };

        if status.success() {
            Ok(())
        } else {
            Err(DownloadError::ProcessFailed {
                code: status.code(),
            })
        }
    }
}

/// Command line for a request, without the program itself
pub(crate) fn build_args(request: &DownloadRequest) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec![
        "--newline".into(),
        "--progress-template".into(),
        PROGRESS_TEMPLATE.into(),
        "--no-playlist".into(),
        "-o".into(),
        request.output_dir.join("%(title)s.%(ext)s").into_os_string(),
    ];

    let format_args = match request.kind {
        MediaKind::Audio => AUDIO_FORMAT_ARGS,
        MediaKind::Video => VIDEO_FORMAT_ARGS,
    };
    args.extend(format_args.iter().map(OsString::from));

    args.push(match &request.source {
        MediaSource::Search(query) => format!("ytsearch1:{} official audio", query).into(),
        MediaSource::Url(url) => url.as_str().into(),
    });

    args
}

/// Producer: read one output stream line by line into the shared channel
fn forward_lines<R>(reader: R, lines: mpsc::Sender<String>) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf).await {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf)
                        .trim_end_matches(|c| c == '\r' || c == '\n')
                        .to_string();
                    if lines.send(line).await.is_err() {
                        break;
                    }
                }
                Err(e) => {
                    debug!(error = %e, "stopped reading yt-dlp output");
                    break;
                }
            }
        }
    })
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum PumpEnd {
    /// Every producer hung up
    Drained,
    Cancelled,
}

/// Consumer: parse lines until the producers are done or a stop is requested
pub(crate) async fn pump_progress(
    mut lines: mpsc::Receiver<String>,
    progress: &mpsc::Sender<ProgressEvent>,
    cancel: &CancellationToken,
) -> PumpEnd {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return PumpEnd::Cancelled,
            line = lines.recv() => match line {
                Some(line) => {
                    if line.trim().is_empty() {
                        continue;
                    }
                    // nobody listening is fine, the output still has to be drained
                    let _ = progress.send(parse_line(&line)).await;
                }
                None => return PumpEnd::Drained,
            }
        }
    }
}

/// Ask the child to exit, then kill it once the grace period is over
async fn terminate(child: &mut Child, grace_period: Duration) -> std::io::Result<()> {
    request_termination(child);

    match tokio::time::timeout(grace_period, child.wait()).await {
        Ok(status) => {
            debug!(status = ?status, "yt-dlp exited after terminate request");
            status.map(|_| ())
        }
        Err(_) => {
            warn!(
                grace_ms = grace_period.as_millis() as u64,
                "yt-dlp still running after grace period, killing it"
            );
            child.kill().await
        }
    }
}

#[cfg(unix)]
fn request_termination(child: &mut Child) {
    if let Some(pid) = child.id() {
        // SAFETY: kill(2) has no memory safety requirements; the pid belongs
        // to a child that has not been reaped yet.
        let rc = unsafe { libc::kill(pid as libc::pid_t, libc::SIGTERM) };
        if rc != 0 {
            debug!(pid, error = %std::io::Error::last_os_error(), "SIGTERM failed");
        }
    }
}

#[cfg(not(unix))]
fn request_termination(child: &mut Child) {
    if let Err(e) = child.start_kill() {
        debug!(error = %e, "terminate request failed");
    }
}

#[cfg(test)]
pub mod stub {
    use super::*;
    use parking_lot::Mutex;

    /// Records requests and succeeds without touching the network
    #[derive(Default)]
    pub struct DownloaderStub {
        pub requests: Mutex<Vec<DownloadRequest>>,
    }

    #[async_trait]
    impl Downloader for DownloaderStub {
        async fn check_available(&self) -> Result<(), DownloadError> {
            Ok(())
        }

        async fn download(
            &self,
            request: &DownloadRequest,
            progress: mpsc::Sender<ProgressEvent>,
            _cancel: &CancellationToken,
        ) -> Result<(), DownloadError> {
            self.requests.lock().push(request.clone());
            let _ = progress.send(ProgressEvent::Finished).await;
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Severity;
    use assert_matches::assert_matches;
    use url::Url;

    fn args_as_strings(request: &DownloadRequest) -> Vec<String> {
        build_args(request)
            .into_iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    async fn collect(mut rx: mpsc::Receiver<ProgressEvent>) -> Vec<ProgressEvent> {
        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        events
    }

    #[test]
    fn audio_search_arguments() {
        let request = DownloadRequest::search("Daft Punk One More Time", "/music/Party");
        let args = args_as_strings(&request);

        assert_eq!(&args[..4], ["--newline", "--progress-template", PROGRESS_TEMPLATE, "--no-playlist"]);
        let output = args.iter().position(|a| a == "-o").unwrap();
        assert_eq!(
            PathBuf::from(&args[output + 1]),
            PathBuf::from("/music/Party").join("%(title)s.%(ext)s")
        );
        assert!(args.windows(3).any(|w| w == ["-x", "--audio-format", "mp3"]));
        assert!(args.contains(&"--embed-thumbnail".to_string()));
        assert!(args.contains(&"--embed-metadata".to_string()));
        assert_eq!(
            args.last().unwrap(),
            "ytsearch1:Daft Punk One More Time official audio"
        );
    }

    #[test]
    fn video_url_arguments() {
        let url = Url::parse("https://www.youtube.com/watch?v=dQw4w9WgXcQ").unwrap();
        let request = DownloadRequest::url(url, MediaKind::Video, "/videos");
        let args = args_as_strings(&request);

        assert!(!args.contains(&"-x".to_string()));
        assert!(args.windows(2).any(|w| w
            == [
                "-f",
                "bestvideo[ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best"
            ]));
        assert!(args.windows(2).any(|w| w == ["--merge-output-format", "mp4"]));
        assert_eq!(
            args.last().unwrap(),
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ"
        );
    }

    #[test]
    fn progress_template_is_json_once_filled_in() {
        let filled = PROGRESS_TEMPLATE
            .trim_start_matches("download:")
            .replace("%(progress.status)s", "downloading")
            .replace("%(progress._percent|0)s", "45.5")
            .replace("%(progress.speed|null)s", "204800.0")
            .replace("%(progress.eta|null)s", "null");

        assert_matches!(
            parse_line(&filled),
            ProgressEvent::Downloading { percent, .. } if percent == 45.5
        );
    }

    #[tokio::test]
    async fn pump_parses_canned_output_in_order() {
        let (line_tx, line_rx) = mpsc::channel(8);
        let (event_tx, event_rx) = mpsc::channel(8);

        for line in [
            "[youtube] Extracting URL",
            "",
            r#"{"status":"downloading","progress":{"percent":50,"speed":2048,"eta":5}}"#,
            "   ",
            r#"{"status":"finished"}"#,
        ] {
            line_tx.send(line.to_string()).await.unwrap();
        }
        drop(line_tx);

        let end = pump_progress(line_rx, &event_tx, &CancellationToken::new()).await;
        drop(event_tx);

        assert_eq!(end, PumpEnd::Drained);
        let events = collect(event_rx).await;
        assert_eq!(events.len(), 3);
        assert_matches!(&events[0], ProgressEvent::RawLine { severity: Severity::Debug, .. });
        assert_matches!(&events[1], ProgressEvent::Downloading { .. });
        assert_eq!(events[2], ProgressEvent::Finished);
    }

    #[tokio::test]
    async fn pump_stops_when_cancelled() {
        let (_line_tx, line_rx) = mpsc::channel::<String>(8);
        let (event_tx, _event_rx) = mpsc::channel(8);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let end = pump_progress(line_rx, &event_tx, &cancel).await;
        assert_eq!(end, PumpEnd::Cancelled);
    }

    #[tokio::test]
    async fn missing_binary_is_reported() {
        let ytdlp = YtDlp::with_binary("definitely-not-yt-dlp-4711");
        assert_matches!(
            ytdlp.check_available().await,
            Err(DownloadError::DependencyNotFound("yt-dlp"))
        );
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::time::Instant;

        /// A shell script standing in for yt-dlp; `$@` holds the yt-dlp arguments
        fn fake(script: &str) -> YtDlp {
            YtDlp::with_launcher("sh", ["-c", script, "yt-dlp"])
                .with_grace_period(Duration::from_millis(300))
        }

        fn request() -> DownloadRequest {
            DownloadRequest::search("Artist Title", std::env::temp_dir())
        }

        #[tokio::test]
        async fn successful_run_reports_progress() {
            let ytdlp = fake(r#"echo '{"status":"downloading","progress":{"percent":100}}'; echo '{"status":"finished"}'"#);
            let (tx, rx) = mpsc::channel(16);

            let result = ytdlp.download(&request(), tx, &CancellationToken::new()).await;

            assert_matches!(result, Ok(()));
            let events = collect(rx).await;
            assert_matches!(&events[0], ProgressEvent::Downloading { percent, .. } if *percent == 100.0);
            assert_eq!(events[1], ProgressEvent::Finished);
        }

        #[tokio::test]
        async fn nonzero_exit_is_a_failure_and_stderr_is_parsed() {
            let ytdlp = fake("echo 'ERROR: network unreachable' >&2; exit 3");
            let (tx, rx) = mpsc::channel(16);

            let result = ytdlp.download(&request(), tx, &CancellationToken::new()).await;

            assert_matches!(result, Err(DownloadError::ProcessFailed { code: Some(3) }));
            let events = collect(rx).await;
            assert_eq!(
                events,
                vec![ProgressEvent::RawLine {
                    text: "ERROR: network unreachable".to_string(),
                    severity: Severity::Error,
                }]
            );
        }

        #[tokio::test]
        async fn arguments_reach_the_process() {
            let ytdlp = fake(r#"for arg in "$@"; do echo "$arg"; done"#);
            let (tx, rx) = mpsc::channel(64);

            ytdlp
                .download(&request(), tx, &CancellationToken::new())
                .await
                .unwrap();

            let lines: Vec<String> = collect(rx).await.iter().map(|e| e.to_string()).collect();
            assert!(lines.contains(&"--no-playlist".to_string()));
            assert_eq!(lines.last().unwrap(), "ytsearch1:Artist Title official audio");
        }

        #[tokio::test]
        async fn stop_terminates_a_cooperative_process() {
            let ytdlp = fake("echo started; exec sleep 30");
            let (tx, mut rx) = mpsc::channel(16);
            let cancel = CancellationToken::new();

            let stopper = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    // wait until the process is producing output
                    rx.recv().await;
                    cancel.cancel();
                })
            };

            let started = Instant::now();
            let result = ytdlp.download(&request(), tx, &cancel).await;
            stopper.await.unwrap();

            assert_matches!(result, Err(DownloadError::Cancelled));
            assert!(started.elapsed() < Duration::from_secs(10));
        }

        #[tokio::test]
        async fn stop_kills_a_process_ignoring_terminate_after_grace_period() {
            let ytdlp = fake("trap '' TERM; echo started; while :; do sleep 0.1; done");
            let (tx, mut rx) = mpsc::channel(16);
            let cancel = CancellationToken::new();

            let stopper = {
                let cancel = cancel.clone();
                tokio::spawn(async move {
                    rx.recv().await;
                    let requested = Instant::now();
                    cancel.cancel();
                    requested
                })
            };

            let result = ytdlp.download(&request(), tx, &cancel).await;
            let requested = stopper.await.unwrap();

            assert_matches!(result, Err(DownloadError::Cancelled));
            assert!(requested.elapsed() >= Duration::from_millis(300));
        }
    }
}
