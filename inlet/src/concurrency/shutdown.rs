//! Broadcast shutdown signalling for the dispatcher and its workers.
//!
//! Abstracts tokio's watch channels into shutdown-specific types. The signal
//! carries no payload; every receiver observes the same event, and dropping
//! the transmitter counts as a shutdown so tasks never outlive their owner.

use tokio::sync::watch;

/// Transmitter side of a shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownTx(watch::Sender<()>);

impl ShutdownTx {
    /// Broadcasts the shutdown signal to all subscribed receivers.
    ///
    /// Fails only when every receiver has already been dropped, which means
    /// there is nothing left to shut down.
    pub fn shutdown(&self) -> Result<(), watch::error::SendError<()>> {
        self.0.send(())
    }

    /// Creates a new receiver subscribed to this transmitter.
    pub fn subscribe(&self) -> ShutdownRx {
        ShutdownRx(self.0.subscribe())
    }
}

/// Receiver side of a shutdown channel.
#[derive(Debug, Clone)]
pub struct ShutdownRx(watch::Receiver<()>);

impl ShutdownRx {
    /// Completes once shutdown has been signalled.
    ///
    /// A dropped transmitter is treated as a shutdown signal.
    pub async fn wait_for_shutdown(&mut self) {
        let _ = self.0.changed().await;
    }
}

/// Creates a new shutdown channel.
pub fn create_shutdown_channel() -> (ShutdownTx, ShutdownRx) {
    let (tx, rx) = watch::channel(());
    (ShutdownTx(tx), ShutdownRx(rx))
}
