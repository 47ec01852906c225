//! Store Writer
//!
//! Durable writes never run on the caller's task. One background task owns
//! the write side of the backend and applies requests in queue order. While
//! a write is in flight new requests pile up; the next batch writes only the
//! newest value per key.

use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};

use super::kv::KeyValueStore;
use super::StoreError;

enum WriteOp {
    Set { key: &'static str, value: String },
    Remove { key: &'static str },
    Flush(oneshot::Sender<Result<(), StoreError>>),
}

/// Queue side of the background writer
#[derive(Debug, Clone)]
pub(super) struct Writer {
    tx: mpsc::UnboundedSender<WriteOp>,
}

impl Writer {
    /// Start the writer task; must be called from within a Tokio runtime
    pub(super) fn spawn(backend: Arc<dyn KeyValueStore>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(backend, rx));
        Self { tx }
    }

    pub(super) fn set(&self, key: &'static str, value: String) -> Result<(), StoreError> {
        self.send(WriteOp::Set { key, value })
    }

    pub(super) fn remove(&self, key: &'static str) -> Result<(), StoreError> {
        self.send(WriteOp::Remove { key })
    }

    /// Wait for everything queued so far to reach the backend
    ///
    /// Returns the first write failure since the previous flush.
    pub(super) async fn flush(&self) -> Result<(), StoreError> {
        let (done, wait) = oneshot::channel();
        self.send(WriteOp::Flush(done))?;
        wait.await.map_err(|_| StoreError::WriterClosed)?
    }

    fn send(&self, op: WriteOp) -> Result<(), StoreError> {
        self.tx.send(op).map_err(|_| StoreError::WriterClosed)
    }
}

async fn run_writer(backend: Arc<dyn KeyValueStore>, mut rx: mpsc::UnboundedReceiver<WriteOp>) {
    let mut pending: Vec<(&'static str, Option<String>)> = Vec::new();
    let mut failure: Option<StoreError> = None;

    while let Some(first) = rx.recv().await {
        let mut next = Some(first);
        while let Some(op) = next {
            match op {
                WriteOp::Set { key, value } => queue(&mut pending, key, Some(value)),
                WriteOp::Remove { key } => queue(&mut pending, key, None),
                WriteOp::Flush(done) => {
                    apply(backend.as_ref(), &mut pending, &mut failure).await;
                    let _ = done.send(failure.take().map_or(Ok(()), Err));
                }
            }
            next = rx.try_recv().ok();
        }
        apply(backend.as_ref(), &mut pending, &mut failure).await;
    }

    tracing::debug!("Store writer stopped");
}

/// Keep only the newest value per key
fn queue(
    pending: &mut Vec<(&'static str, Option<String>)>,
    key: &'static str,
    value: Option<String>,
) {
    match pending.iter_mut().find(|(k, _)| *k == key) {
        Some(slot) => slot.1 = value,
        None => pending.push((key, value)),
    }
}

async fn apply(
    backend: &dyn KeyValueStore,
    pending: &mut Vec<(&'static str, Option<String>)>,
    failure: &mut Option<StoreError>,
) {
    for (key, value) in pending.drain(..) {
        let result = match value {
            Some(value) => backend.set(key, &value).await,
            None => backend.remove(key).await,
        };
        if let Err(e) = result {
            tracing::warn!(key, error = %e, "Durable write failed");
            failure.get_or_insert(e);
        }
    }
}
