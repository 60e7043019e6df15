// bases/download_cli/src/app.rs
use crate::args::{Args, Command};
use crate::output::{OutputHandler, MENU_ITEMS};
use color_eyre::eyre::{eyre, WrapErr};
use color_eyre::Result;
use converter_config::{ConfigStore, DownloadType};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password, Select};
use media_downloader::{DownloadError, Downloader, MediaDownloader, MediaKind, Severity};
use playlist_converter::{ConversionError, PlaylistConverter, Worker};
use spotify_catalog::{Credentials, SpotifyClient};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

const EVENT_BUFFER: usize = 256;
const FALLBACK_CONFIG: &str = "spotify_converter.toml";
/// 128 + SIGINT, what a shell reports for a Ctrl-C'd program
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// One session: configuration, the Spotify client once authenticated, and
/// the worker running the current download
pub struct App {
    args: Args,
    store: ConfigStore,
    catalog: Option<Arc<SpotifyClient>>,
    downloader: Arc<dyn Downloader>,
    worker: Worker,
    /// Ctrl-C presses made while a job was running
    interrupts: mpsc::UnboundedReceiver<()>,
    output: OutputHandler,
}

impl App {
    /// Must be called from within the runtime; it starts the Ctrl-C listener
    pub fn new(args: Args, downloader: Arc<dyn Downloader>) -> Result<Self> {
        let path = args
            .config
            .clone()
            .or_else(ConfigStore::default_path)
            .unwrap_or_else(|| PathBuf::from(FALLBACK_CONFIG));
        let store = ConfigStore::load(&path)
            .wrap_err_with(|| format!("Failed to load configuration from {}", path.display()))?;
        debug!(path = %store.path().display(), "configuration ready");

        let output = OutputHandler::new(args.verbose);
        let worker = Worker::new();
        let interrupts = listen_for_interrupts(worker.clone());
        Ok(Self {
            args,
            store,
            catalog: None,
            downloader,
            worker,
            interrupts,
            output,
        })
    }

    pub async fn run(&mut self) -> Result<()> {
        match self.args.command.clone() {
            Some(command) => self.execute(command).await,
            None => self.interactive().await,
        }
    }

    /// Print an error unless the conversion already logged it
    pub fn report(&self, error: &color_eyre::Report) {
        if error.downcast_ref::<ConversionError>().is_none() {
            self.output.print_error(error);
        }
    }

    async fn execute(&mut self, command: Command) -> Result<()> {
        match command {
            Command::Convert { playlist, output } => self.convert(&playlist, output).await,
            Command::Download { url, kind, output } => {
                let download_type = kind
                    .map(DownloadType::from)
                    .unwrap_or(self.store.config().settings.download_type);
                self.download(&url, download_type, output).await
            }
            Command::Configure {
                client_id,
                client_secret,
            } => self.configure(&client_id, &client_secret).await,
            Command::SetOutput { path } => self.set_output(path),
            Command::ShowConfig => {
                self.output.print_config(&self.store);
                Ok(())
            }
        }
    }

    async fn interactive(&mut self) -> Result<()> {
        self.output.print_banner();
        if !self.store.config().has_credentials() {
            self.output.log(
                Severity::Warning,
                "Spotify API credentials not set. Use option 3 to configure them.",
            );
        }

        loop {
            self.output.print_menu();
            let choice: String = Input::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Select an option (1-{})", MENU_ITEMS.len()))
                .interact_text()?;

            let outcome = match choice.trim() {
                "1" => match prompt("Enter Spotify playlist URL")? {
                    Some(playlist) => self.convert(&playlist, None).await,
                    None => Ok(()),
                },
                "2" => self.download_prompted().await,
                "3" => self.configure_prompted().await,
                "4" => match prompt("Enter output directory path")? {
                    Some(path) => self.set_output(PathBuf::from(path)),
                    None => Ok(()),
                },
                "5" => {
                    self.output.log(Severity::Info, "Goodbye!");
                    return Ok(());
                }
                other => {
                    self.output
                        .log(Severity::Warning, format!("Invalid choice: {}", other));
                    Ok(())
                }
            };

            if let Err(error) = outcome {
                self.report(&error);
            }
        }
    }

    async fn convert(&mut self, playlist: &str, output: Option<PathBuf>) -> Result<()> {
        let catalog = self.catalog().await?;
        let downloader = Arc::clone(&self.downloader);
        let root = output.unwrap_or_else(|| self.store.config().settings.output_path.clone());
        let input = playlist.trim().to_string();

        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);
        let job = self.worker.spawn(move |cancel| async move {
            PlaylistConverter::new(catalog, downloader, events_tx, cancel)
                .convert_playlist(&input, &root)
                .await
        })?;

        let result = self
            .follow(events_rx, job, |output, event| output.render(event))
            .await??;
        self.output.print_summary(&result);
        Ok(())
    }

    async fn download(&mut self, url: &str, download_type: DownloadType, output: Option<PathBuf>) -> Result<()> {
        let media = MediaDownloader::new_with_downloader(Arc::clone(&self.downloader)).await?;
        let dir = output.unwrap_or_else(|| self.store.config().settings.output_path.clone());
        let kind = match download_type {
            DownloadType::Music => MediaKind::Audio,
            DownloadType::Video => MediaKind::Video,
        };
        let url = url.trim().to_string();

        self.output.log(
            Severity::Info,
            format!("Downloading {} from {}", download_type, url),
        );
        info!(%url, %download_type, dir = %dir.display(), "single download");

        let (progress_tx, progress_rx) = mpsc::channel(EVENT_BUFFER);
        let job = self.worker.spawn(move |cancel| async move {
            media.download_url(&url, kind, &dir, progress_tx, &cancel).await
        })?;

        match self
            .follow(progress_rx, job, |output, event| output.render_progress(event))
            .await?
        {
            Ok(()) => {
                self.output.log(Severity::Success, "Download completed successfully");
                Ok(())
            }
            Err(DownloadError::Cancelled) => {
                self.output.log(Severity::Warning, "Download stopped by user");
                Ok(())
            }
            Err(e) => Err(e).wrap_err("Download failed"),
        }
    }

    async fn download_prompted(&mut self) -> Result<()> {
        let Some(url) = prompt("Enter YouTube URL")? else {
            return Ok(());
        };

        let current = self.store.config().settings.download_type;
        let choice = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Download as")
            .items(&["Music (mp3)", "Video (mp4)"])
            .default(match current {
                DownloadType::Music => 0,
                DownloadType::Video => 1,
            })
            .interact()?;
        let download_type = if choice == 0 {
            DownloadType::Music
        } else {
            DownloadType::Video
        };

        if download_type != current {
            self.store
                .update(|config| config.settings.download_type = download_type)?;
        }
        self.download(&url, download_type, None).await
    }

    async fn configure_prompted(&mut self) -> Result<()> {
        let theme = ColorfulTheme::default();
        let client_id: String = Input::with_theme(&theme)
            .with_prompt("Spotify Client ID")
            .allow_empty(true)
            .interact_text()?;
        let client_secret = Password::with_theme(&theme)
            .with_prompt("Spotify Client Secret")
            .allow_empty_password(true)
            .interact()?;

        self.configure(&client_id, &client_secret).await
    }

    async fn configure(&mut self, client_id: &str, client_secret: &str) -> Result<()> {
        let credentials = Credentials::new(client_id.trim(), client_secret.trim());
        if !credentials.is_complete() {
            return Err(eyre!("Both Client ID and Client Secret are required."));
        }

        self.store.update(|config| {
            config.spotify.client_id = credentials.client_id.clone();
            config.spotify.client_secret = credentials.client_secret.clone();
        })?;
        self.catalog = None;
        self.output
            .log(Severity::Success, "Spotify API credentials saved");

        match self.catalog().await {
            Ok(_) => self
                .output
                .log(Severity::Success, "Spotify API connection verified"),
            Err(error) => self.output.log(
                Severity::Warning,
                format!("Could not verify the credentials: {}", error),
            ),
        }
        Ok(())
    }

    fn set_output(&mut self, path: PathBuf) -> Result<()> {
        if let Err(e) = std::fs::create_dir_all(&path) {
            debug!(path = %path.display(), error = %e, "rejected output directory");
            return Err(eyre!("Invalid directory or permission denied."));
        }

        self.store
            .update(|config| config.settings.output_path = path.clone())?;
        self.output.log(
            Severity::Success,
            format!("Output directory set to: {}", path.display()),
        );
        Ok(())
    }

    async fn catalog(&mut self) -> Result<Arc<SpotifyClient>> {
        if let Some(client) = &self.catalog {
            return Ok(Arc::clone(client));
        }

        let spotify = &self.store.config().spotify;
        let credentials = Credentials::new(spotify.client_id.clone(), spotify.client_secret.clone());
        let client = Arc::new(SpotifyClient::authenticate(credentials).await?);
        self.catalog = Some(Arc::clone(&client));
        Ok(client)
    }

    async fn follow<E, T>(
        &mut self,
        events: mpsc::Receiver<E>,
        job: JoinHandle<T>,
        render: impl Fn(&OutputHandler, &E),
    ) -> Result<T> {
        // presses that raced the end of an earlier job
        while self.interrupts.try_recv().is_ok() {}

        follow_job(events, job, &mut self.interrupts, &self.worker, &self.output, render).await
    }
}

/// Ctrl-C while a job runs is forwarded to the returned channel. With no job
/// running it ends the program, as it would without a handler installed.
fn listen_for_interrupts(worker: Worker) -> mpsc::UnboundedReceiver<()> {
    let (presses_tx, presses_rx) = mpsc::unbounded_channel();

    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if !worker.is_busy() {
                eprintln!();
                std::process::exit(INTERRUPTED_EXIT_CODE);
            }
            if presses_tx.send(()).is_err() {
                break;
            }
        }
    });

    presses_rx
}

/// Render what the job reports until it finishes. The first interrupt asks
/// the job to stop; a second one aborts it outright.
async fn follow_job<E, T>(
    mut events: mpsc::Receiver<E>,
    job: JoinHandle<T>,
    interrupts: &mut mpsc::UnboundedReceiver<()>,
    worker: &Worker,
    output: &OutputHandler,
    render: impl Fn(&OutputHandler, &E),
) -> Result<T> {
    let mut stop_requested = false;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => render(output, &event),
                None => break,
            },
            Some(()) = interrupts.recv() => {
                if stop_requested {
                    output.log(Severity::Error, "Download aborted");
                    job.abort();
                    return Err(eyre!("Download aborted by user"));
                }
                stop_requested = true;
                output.log(
                    Severity::Warning,
                    "Stopping download... press Ctrl-C again to abort",
                );
                worker.stop();
            }
        }
    }

    Ok(job.await?)
}

/// Ask for a line of text; `None` when the answer is blank
fn prompt(text: &str) -> Result<Option<String>> {
    let answer: String = Input::with_theme(&ColorfulTheme::default())
        .with_prompt(text)
        .allow_empty(true)
        .interact_text()?;
    let answer = answer.trim();
    Ok((!answer.is_empty()).then(|| answer.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::time::Duration;

    #[tokio::test]
    async fn first_interrupt_stops_the_job() {
        let worker = Worker::new();
        let (events_tx, events_rx) = mpsc::channel::<String>(8);
        let job = worker
            .spawn(move |token| async move {
                events_tx.send("working".to_string()).await.ok();
                token.cancelled().await;
                7
            })
            .unwrap();
        let (presses_tx, mut presses_rx) = mpsc::unbounded_channel();
        presses_tx.send(()).unwrap();

        let result = follow_job(
            events_rx,
            job,
            &mut presses_rx,
            &worker,
            &OutputHandler::new(false),
            |_, _| {},
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn second_interrupt_aborts_a_job_that_does_not_stop() {
        let worker = Worker::new();
        let (events_tx, events_rx) = mpsc::channel::<String>(8);
        let job = worker
            .spawn(move |_token| async move {
                // never finishes and never closes its event stream
                let _events = events_tx;
                std::future::pending::<()>().await
            })
            .unwrap();
        let (presses_tx, mut presses_rx) = mpsc::unbounded_channel();
        presses_tx.send(()).unwrap();
        presses_tx.send(()).unwrap();

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            follow_job(
                events_rx,
                job,
                &mut presses_rx,
                &worker,
                &OutputHandler::new(false),
                |_, _| {},
            ),
        )
        .await
        .expect("aborting returns promptly");

        assert_matches!(result, Err(error) if error.to_string() == "Download aborted by user");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!worker.is_busy());
    }

    #[tokio::test]
    async fn events_are_rendered_until_the_job_ends() {
        let worker = Worker::new();
        let (events_tx, events_rx) = mpsc::channel::<u32>(8);
        let job = worker
            .spawn(move |_token| async move {
                for n in 1..=3 {
                    events_tx.send(n).await.ok();
                }
            })
            .unwrap();
        let (_presses_tx, mut presses_rx) = mpsc::unbounded_channel();
        let seen = std::cell::RefCell::new(Vec::new());

        follow_job(
            events_rx,
            job,
            &mut presses_rx,
            &worker,
            &OutputHandler::new(false),
            |_, n| seen.borrow_mut().push(*n),
        )
        .await
        .unwrap();

        assert_eq!(seen.into_inner(), vec![1, 2, 3]);
    }
}
