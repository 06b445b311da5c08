//! Periodic background threads with prompt, joined shutdown.
//!
//! A [`Worker`] runs a tick closure every `interval` until either the closure
//! returns `false` or the handle is stopped. Stopping wakes the thread out of
//! its wait immediately and joins it, so once `stop` (or `Drop`) returns the
//! closure is guaranteed not to be running.

use crossbeam_channel::{bounded, RecvTimeoutError, Sender};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ChimeError, Result};

/// Handle to a named periodic thread.
#[derive(Debug)]
pub struct Worker {
    name: String,
    stop_tx: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    /// Spawn a thread calling `tick` every `interval`.
    ///
    /// The first tick runs immediately. Returning `false` from `tick` ends the
    /// thread early.
    pub fn spawn<F>(name: impl Into<String>, interval: Duration, mut tick: F) -> Result<Self>
    where
        F: FnMut() -> bool + Send + 'static,
    {
        let name = name.into();
        let (stop_tx, stop_rx) = bounded::<()>(1);

        let handle = thread::Builder::new()
            .name(name.clone())
            .spawn(move || loop {
                if !tick() {
                    break;
                }
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            })
            .map_err(|e| ChimeError::Thread(format!("failed to spawn {}: {}", name, e)))?;

        debug!("Worker '{}' started ({:?} interval)", name, interval);

        Ok(Self {
            name,
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Whether the thread has not yet exited.
    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Signal the thread and wait for it to exit.
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        // Dropping the sender disconnects the channel and wakes the wait.
        self.stop_tx.take();

        let Some(handle) = self.handle.take() else {
            return;
        };
        if handle.thread().id() == thread::current().id() {
            // Stopped from inside its own tick; the loop exits on the next wait.
            return;
        }
        if handle.join().is_err() {
            warn!("Worker '{}' panicked", self.name);
        } else {
            debug!("Worker '{}' stopped", self.name);
        }
    }
}

impl Drop for Worker {
    fn drop(&mut self) {
        self.shutdown();
    }
}
