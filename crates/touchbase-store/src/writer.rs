//! Per-store write queue.
//!
//! Every mutation hands a serialized snapshot of the store to the queue and
//! gets back a [`WriteTicket`]. A single worker task drains the queue; when
//! several snapshots are waiting it writes only the newest one and completes
//! every drained ticket with that write's result.

use std::{
  future::{Future, IntoFuture},
  pin::Pin,
  sync::Arc,
};

use tokio::sync::{mpsc, oneshot};
use touchbase_core::storage::Storage;

use crate::{Error, Result};

type Outcome = std::result::Result<(), String>;

struct Job {
  snapshot: String,
  done:     oneshot::Sender<Outcome>,
}

// ─── Queue ───────────────────────────────────────────────────────────────────

pub(crate) struct WriteQueue {
  file: &'static str,
  tx:   mpsc::UnboundedSender<Job>,
}

impl WriteQueue {
  /// Spawn the worker for `file` on the current tokio runtime.
  pub(crate) fn spawn<S: Storage>(storage: Arc<S>, file: &'static str) -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    tokio::spawn(async move {
      while let Some(first) = rx.recv().await {
        let mut batch = vec![first];
        while let Ok(next) = rx.try_recv() {
          batch.push(next);
        }

        let newest = batch.last().map(|job| job.snapshot.as_str()).unwrap_or_default();
        let outcome = storage.write_text(file, newest).await.map_err(|e| e.to_string());

        match &outcome {
          Ok(()) => tracing::debug!(file, batched = batch.len(), "store persisted"),
          Err(error) => tracing::warn!(file, error = %error, "failed to persist store"),
        }

        for job in batch {
          // Receiver gone means the ticket was dropped.
          let _ = job.done.send(outcome.clone());
        }
      }
      tracing::trace!(file, "write queue closed");
    });

    Self { file, tx }
  }

  /// Queue `snapshot` to be written.
  pub(crate) fn enqueue(&self, snapshot: String) -> WriteTicket {
    let (done, rx) = oneshot::channel();
    match self.tx.send(Job { snapshot, done }) {
      Ok(()) => WriteTicket::pending(self.file, rx),
      Err(_) => WriteTicket::failed(self.file, "write queue closed"),
    }
  }
}

// ─── Ticket ──────────────────────────────────────────────────────────────────

enum TicketState {
  Pending(oneshot::Receiver<Outcome>),
  Ready(Outcome),
}

/// Completion handle for one queued write.
///
/// Await it to learn whether the write reached storage, or drop it to fire
/// and forget. Dropping never cancels the write.
#[must_use = "await the ticket for durability, or drop it explicitly"]
pub struct WriteTicket {
  file:  &'static str,
  state: TicketState,
}

impl WriteTicket {
  fn pending(file: &'static str, rx: oneshot::Receiver<Outcome>) -> Self {
    Self { file, state: TicketState::Pending(rx) }
  }

  pub(crate) fn failed(file: &'static str, message: impl Into<String>) -> Self {
    Self { file, state: TicketState::Ready(Err(message.into())) }
  }

  /// Name of the blob this ticket writes.
  pub fn file(&self) -> &'static str { self.file }
}

impl std::fmt::Debug for WriteTicket {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("WriteTicket").field("file", &self.file).finish_non_exhaustive()
  }
}

impl IntoFuture for WriteTicket {
  type Output = Result<()>;
  type IntoFuture = Pin<Box<dyn Future<Output = Result<()>> + Send>>;

  fn into_future(self) -> Self::IntoFuture {
    let file = self.file;
    Box::pin(async move {
      let outcome = match self.state {
        TicketState::Ready(outcome) => outcome,
        TicketState::Pending(rx) => rx.await.unwrap_or_else(|_| Err("write queue closed".to_owned())),
      };
      outcome.map_err(|message| Error::Persist { file, message })
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::backend::MemoryStorage;

  #[tokio::test]
  async fn ticket_resolves_after_write() {
    let storage = Arc::new(MemoryStorage::new());
    let queue = WriteQueue::spawn(storage.clone(), "a.db");

    queue.enqueue("1".into()).await.unwrap();
    assert_eq!(storage.peek("a.db").as_deref(), Some("1"));
  }

  #[tokio::test]
  async fn burst_ends_with_newest_snapshot() {
    let storage = Arc::new(MemoryStorage::new());
    let queue = WriteQueue::spawn(storage.clone(), "a.db");

    let tickets: Vec<_> = (0..20).map(|i| queue.enqueue(i.to_string())).collect();
    for ticket in tickets {
      ticket.await.unwrap();
    }
    assert_eq!(storage.peek("a.db").as_deref(), Some("19"));
    assert!(storage.write_count() <= 20);
  }

  #[tokio::test]
  async fn failed_write_reports_persist_error() {
    let storage = Arc::new(MemoryStorage::new());
    storage.fail_writes(true);
    let queue = WriteQueue::spawn(storage.clone(), "a.db");

    let err = queue.enqueue("1".into()).await.unwrap_err();
    assert!(matches!(err, Error::Persist { file: "a.db", .. }));
    assert_eq!(storage.peek("a.db"), None);
  }
}
