// In: src/shutdown.rs

//! Deferred process termination.
//!
//! The `terminate` action must be answered before the process goes away, and the
//! answer is written by the very loop that is being torn down. The shutdown work
//! therefore runs on its own thread in two phases:
//!
//!   1. signal   -> the serve loop stops taking requests
//!   2. join     -> wait until the serve loop reports its last response flushed
//!   3. exit     -> run the exit hook (`std::process::exit` in production)

use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};

use crate::error::{BridgeError, Result};

/// What finally tears the process down.
pub type ExitHook = Box<dyn FnOnce() + Send + 'static>;

/// The side held by the action dispatcher.
pub struct ShutdownController {
    signal_tx: Sender<()>,
    flushed_rx: Receiver<()>,
    exit_hook: Option<ExitHook>,
    worker: Option<JoinHandle<()>>,
}

/// The side held by the serve loop.
#[derive(Debug, Clone)]
pub struct ShutdownListener {
    signal_rx: Receiver<()>,
    flushed_tx: Sender<()>,
}

impl ShutdownController {
    pub fn new(exit_hook: ExitHook) -> (Self, ShutdownListener) {
        let (signal_tx, signal_rx) = bounded(1);
        let (flushed_tx, flushed_rx) = bounded(1);

        let controller = Self {
            signal_tx,
            flushed_rx,
            exit_hook: Some(exit_hook),
            worker: None,
        };
        let listener = ShutdownListener {
            signal_rx,
            flushed_tx,
        };
        (controller, listener)
    }

    /// A controller whose final step exits the process with status 0.
    pub fn exiting_process() -> (Self, ShutdownListener) {
        Self::new(Box::new(|| std::process::exit(0)))
    }

    /// Starts the shutdown thread and returns immediately. Later calls are no-ops.
    pub fn request(&mut self) -> Result<()> {
        let Some(exit_hook) = self.exit_hook.take() else {
            log::debug!("shutdown already requested");
            return Ok(());
        };

        let signal_tx = self.signal_tx.clone();
        let flushed_rx = self.flushed_rx.clone();
        let worker = thread::Builder::new()
            .name("udf-bridge-shutdown".into())
            .spawn(move || {
                log::debug!("Bye bye!");
                // Phase 1: the serve loop may already be gone, which is fine.
                let _ = signal_tx.send(());
                // Phase 2: a disconnected listener means nothing is left to flush.
                if flushed_rx.recv().is_err() {
                    log::debug!("serve loop dropped its listener before acknowledging");
                }
                // Phase 3.
                exit_hook();
            })
            .map_err(|e| BridgeError::Shutdown(format!("failed to spawn shutdown thread: {}", e)))?;

        self.worker = Some(worker);
        Ok(())
    }

    pub fn is_requested(&self) -> bool {
        self.exit_hook.is_none()
    }

    /// Blocks until the shutdown thread has run the exit hook.
    pub fn wait(&mut self) -> Result<()> {
        match self.worker.take() {
            Some(worker) => worker
                .join()
                .map_err(|_| BridgeError::Shutdown("shutdown thread panicked".into())),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for ShutdownController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShutdownController")
            .field("requested", &self.is_requested())
            .field("running", &self.worker.is_some())
            .finish()
    }
}

impl ShutdownListener {
    /// The channel that becomes ready once shutdown is signalled; meant for `select!`.
    pub fn signal(&self) -> &Receiver<()> {
        &self.signal_rx
    }

    /// Reports that the last in-flight response has been delivered.
    pub fn acknowledge_flushed(&self) {
        let _ = self.flushed_tx.try_send(());
    }
}
