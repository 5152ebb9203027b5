//! Ordered, debounced tree persistence.
//!
//! All writes go through one worker task fed by an unbounded FIFO queue, so
//! the store sees snapshots in the order they were issued. Debounced
//! snapshots wait for a quiet period; each new one replaces the pending
//! snapshot and restarts the timer. An immediate snapshot is newer than
//! anything pending, so it drops the pending one and is written right away.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::store::TreeStore;
use crate::models::GraphTree;

enum PersistRequest {
    Immediate(GraphTree),
    Debounced(GraphTree),
    Flush(oneshot::Sender<()>),
}

/// Handle to the persistence worker. Cheap calls; never blocks the caller.
pub struct Persister {
    tx: mpsc::UnboundedSender<PersistRequest>,
    worker: JoinHandle<()>,
}

impl Persister {
    /// Starts the worker on the current tokio runtime.
    pub fn spawn(store: Arc<dyn TreeStore>, debounce: Duration, force: bool) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_worker(store, debounce, force, rx));
        Self { tx, worker }
    }

    /// Queue a write of `tree` behind every earlier request.
    pub fn persist_now(&self, tree: GraphTree) {
        self.send(PersistRequest::Immediate(tree));
    }

    /// Write `tree` once no newer debounced snapshot arrives for the quiet period.
    pub fn persist_debounced(&self, tree: GraphTree) {
        self.send(PersistRequest::Debounced(tree));
    }

    fn send(&self, request: PersistRequest) {
        if self.tx.send(request).is_err() {
            log::error!("[persist] worker stopped; snapshot dropped");
        }
    }

    /// Writes any pending debounced snapshot now and waits until every
    /// request queued before this call has been handled.
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(PersistRequest::Flush(done_tx));
        let _ = done_rx.await;
    }

    /// Closes the queue, lets the worker drain it, and waits for it to exit.
    pub async fn shutdown(self) {
        let Persister { tx, worker } = self;
        drop(tx);
        if let Err(e) = worker.await {
            log::error!("[persist] worker ended abnormally: {}", e);
        }
    }
}

async fn run_worker(
    store: Arc<dyn TreeStore>,
    debounce: Duration,
    force: bool,
    mut rx: mpsc::UnboundedReceiver<PersistRequest>,
) {
    let mut pending: Option<(GraphTree, Instant)> = None;

    loop {
        let deadline = pending.as_ref().map(|(_, at)| *at);

        tokio::select! {
            request = rx.recv() => {
                match request {
                    Some(PersistRequest::Immediate(tree)) => {
                        if pending.take().is_some() {
                            log::debug!("[persist] pending snapshot superseded");
                        }
                        write(store.as_ref(), &tree, force).await;
                    }
                    Some(PersistRequest::Debounced(tree)) => {
                        pending = Some((tree, Instant::now() + debounce));
                    }
                    Some(PersistRequest::Flush(done)) => {
                        if let Some((tree, _)) = pending.take() {
                            write(store.as_ref(), &tree, force).await;
                        }
                        let _ = done.send(());
                    }
                    None => {
                        if let Some((tree, _)) = pending.take() {
                            write(store.as_ref(), &tree, force).await;
                        }
                        break;
                    }
                }
            }
            _ = async {
                match deadline {
                    Some(at) => sleep_until(at).await,
                    None => std::future::pending().await,
                }
            } => {
                if let Some((tree, _)) = pending.take() {
                    write(store.as_ref(), &tree, force).await;
                }
            }
        }
    }

    log::debug!("[persist] worker stopped");
}

async fn write(store: &dyn TreeStore, tree: &GraphTree, force: bool) {
    match store.save(tree, force).await {
        Ok(()) => log::debug!("[persist] saved {} nodes", tree.nodes.len()),
        Err(e) => log::error!("[persist] save failed: {}", e),
    }
}
