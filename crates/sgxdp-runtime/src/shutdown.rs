//! Explicit shutdown signalling for the scan loop.
//!
//! A [`ShutdownHandle`] is held by whoever owns the process lifecycle (the
//! CLI's signal handler); every [`Shutdown`] clone observes it.  The scan
//! loop suspends only at [`Shutdown::wait`] and the interval sleep.

use tokio::sync::watch;

/// Triggering half.
#[derive(Debug)]
pub struct ShutdownHandle {
    tx: watch::Sender<bool>,
}

/// Observing half.  Clone freely.
#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

/// Create a linked handle / signal pair.
pub fn shutdown_channel() -> (ShutdownHandle, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownHandle { tx }, Shutdown { rx })
}

impl ShutdownHandle {
    /// Request shutdown.  Idempotent; works with or without observers.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once shutdown has been requested.  Dropping the
    /// [`ShutdownHandle`] without triggering counts as a request too.
    pub async fn wait(&mut self) {
        let _ = self.rx.wait_for(|stop| *stop).await;
    }
}
