//! Progress emitter: the single producer side of the progress channel.
//!
//! The transport drains the receiver and serializes events. When the receiver
//! goes away (client disconnected), the run's cancellation token is cancelled,
//! both on the next failed send and, eagerly, by a watcher task so that an
//! in-flight provider call is aborted without waiting for the next event.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::protocol::ProgressEvent;

/// The consumer is gone; stop producing work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

pub struct ProgressEmitter {
  tx: mpsc::Sender<ProgressEvent>,
  cancel: CancellationToken,
  stop_watcher: CancellationToken,
}

impl ProgressEmitter {
  /// Create an emitter and the receiver the transport drains.
  /// Must be called inside a tokio runtime (spawns the disconnect watcher).
  pub fn channel(capacity: usize, cancel: CancellationToken) -> (Self, mpsc::Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let stop_watcher = CancellationToken::new();

    let watch_tx = tx.clone();
    let watch_cancel = cancel.clone();
    let watch_stop = stop_watcher.clone();
    tokio::spawn(async move {
      tokio::select! {
        _ = watch_tx.closed() => {
          warn!(target: "pipeline", "Progress stream closed by client; cancelling run");
          watch_cancel.cancel();
        }
        _ = watch_stop.cancelled() => {}
        _ = watch_cancel.cancelled() => {}
      }
    });

    (Self { tx, cancel, stop_watcher }, rx)
  }

  pub fn cancel_token(&self) -> &CancellationToken { &self.cancel }

  pub async fn emit(&self, event: ProgressEvent) -> Result<(), Cancelled> {
    if self.cancel.is_cancelled() {
      return Err(Cancelled);
    }
    let kind = event.kind();
    match self.tx.send(event).await {
      Ok(()) => {
        debug!(target: "pipeline", event = kind, "Progress event emitted");
        Ok(())
      }
      Err(_) => {
        warn!(target: "pipeline", event = kind, "Progress write failed; treating as cancellation");
        self.cancel.cancel();
        Err(Cancelled)
      }
    }
  }
}

impl Drop for ProgressEmitter {
  fn drop(&mut self) {
    // Lets the watcher release its sender so the receiver sees end-of-stream.
    self.stop_watcher.cancel();
  }
}
