// components/playlist_converter/src/worker.rs
use parking_lot::Mutex;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum WorkerError {
    #[error("A download is already in progress.")]
    Busy,
}

type ActiveSlot = Arc<Mutex<Option<CancellationToken>>>;

/// Runs at most one background job and lets anyone stop it
#[derive(Debug, Clone, Default)]
pub struct Worker {
    active: ActiveSlot,
}

impl Worker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start `job` on the runtime, handing it the token a later [`Worker::stop`]
    /// cancels. Nothing is queued: while a job runs this returns
    /// [`WorkerError::Busy`].
    pub fn spawn<F, Fut, T>(&self, job: F) -> Result<JoinHandle<T>, WorkerError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        let token = {
            let mut slot = self.active.lock();
            if slot.is_some() {
                warn!("{}", WorkerError::Busy);
                return Err(WorkerError::Busy);
            }
            let token = CancellationToken::new();
            *slot = Some(token.clone());
            token
        };

        // clears the slot however the job ends, including abort and panic
        let guard = SlotGuard {
            active: Arc::clone(&self.active),
        };
        let job = job(token);

        debug!("worker job started");
        Ok(tokio::spawn(async move {
            let _guard = guard;
            job.await
        }))
    }

    /// Ask the running job to stop. Returns false when nothing was running.
    pub fn stop(&self) -> bool {
        match self.active.lock().as_ref() {
            Some(token) => {
                info!("stop requested");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn is_busy(&self) -> bool {
        self.active.lock().is_some()
    }
}

struct SlotGuard {
    active: ActiveSlot,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.active.lock().take();
        debug!("worker job finished");
    }
}
