use crate::worker::{spawn_worker, Launcher, WorkerReply, WorkerRequest};
use phenomatch_core::{Catalog, DataSource, DatasetError, MatchError, MatchQuery, MatchResult};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("phenotype data not ready")]
    NotReady,
    #[error("phenotype data already loaded")]
    AlreadyLoaded,
    #[error("phenotype data load already in progress")]
    LoadInProgress,
    #[error("failed to load phenotype data: {0}")]
    Load(#[from] DatasetError),
    #[error("match failed: {0}")]
    Match(#[from] MatchError),
    #[error("worker exited")]
    ChannelClosed,
}

/// Load lifecycle of a [`PhenotypeMatcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Uninitialized,
    Loading,
    /// Loaded on the worker thread.
    Ready,
    /// Offload could not be used; loaded in-process.
    Unavailable,
    Failed(String),
}

impl LoadState {
    /// Whether matches can be served.
    pub fn is_loaded(&self) -> bool {
        matches!(self, Self::Ready | Self::Unavailable)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatcherOptions {
    /// Try to run on a dedicated worker thread first.
    pub offload: bool,
    /// Capacity of the worker request channel.
    pub queue_depth: usize,
}

impl Default for MatcherOptions {
    fn default() -> Self {
        Self {
            offload: true,
            queue_depth: 16,
        }
    }
}

/// Returns the state to `Uninitialized` if a load is abandoned before it
/// settles, so later matches and loads are not stuck behind `Loading`.
struct LoadGuard<'a> {
    state: &'a watch::Sender<LoadState>,
    armed: bool,
}

impl LoadGuard<'_> {
    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for LoadGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("phenotype catalog load abandoned");
            self.state.send_replace(LoadState::Uninitialized);
        }
    }
}

type ReplySender = oneshot::Sender<Result<Vec<MatchResult>, EngineError>>;

/// In-flight match requests awaiting a worker reply, keyed by id.
#[derive(Default)]
struct PendingTable {
    inner: Mutex<Pending>,
}

#[derive(Default)]
struct Pending {
    waiting: HashMap<u64, ReplySender>,
    closed: bool,
}

impl PendingTable {
    fn lock(&self) -> std::sync::MutexGuard<'_, Pending> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn register(&self, id: u64, reply: ReplySender) -> Result<(), EngineError> {
        let mut pending = self.lock();
        if pending.closed {
            return Err(EngineError::ChannelClosed);
        }
        pending.waiting.insert(id, reply);
        Ok(())
    }

    fn remove(&self, id: u64) {
        self.lock().waiting.remove(&id);
    }

    fn complete(&self, id: u64, result: Result<Vec<MatchResult>, EngineError>) {
        match self.lock().waiting.remove(&id) {
            Some(reply) => {
                let _ = reply.send(result);
            }
            None => tracing::debug!(id, "reply for unknown request"),
        }
    }

    /// Drop every waiter; their receivers observe a closed channel.
    fn close(&self) {
        let mut pending = self.lock();
        pending.closed = true;
        pending.waiting.clear();
    }
}

enum Backend {
    Worker {
        requests: mpsc::Sender<WorkerRequest>,
        pending: Arc<PendingTable>,
    },
    InProcess(Arc<Catalog>),
}

struct Shared {
    options: MatcherOptions,
    launcher: Launcher,
    state: watch::Sender<LoadState>,
    backend: OnceLock<Backend>,
    next_id: AtomicU64,
}

/// Clone-safe handle to the phenotype catalog, offloaded to a worker thread
/// when possible.
///
/// Load once, then match any number of times from any task. Matches issued
/// while a load is in flight wait for it to settle.
#[derive(Clone)]
pub struct PhenotypeMatcher {
    shared: Arc<Shared>,
}

impl PhenotypeMatcher {
    pub fn new(options: MatcherOptions) -> Self {
        Self::with_launcher(options, spawn_worker)
    }

    pub(crate) fn with_launcher(options: MatcherOptions, launcher: Launcher) -> Self {
        let (state, _) = watch::channel(LoadState::Uninitialized);
        Self {
            shared: Arc::new(Shared {
                options,
                launcher,
                state,
                backend: OnceLock::new(),
                next_id: AtomicU64::new(1),
            }),
        }
    }

    pub fn state(&self) -> LoadState {
        self.shared.state.borrow().clone()
    }

    /// Load the catalog. Returns the number of entries.
    ///
    /// Falls back to in-process loading when the worker cannot be started
    /// or dies before answering. Dataset errors are not retried in-process,
    /// but a later `load` may try again. A load dropped before it finishes
    /// leaves the matcher `Uninitialized`.
    pub async fn load(&self, source: DataSource) -> Result<usize, EngineError> {
        let mut refused = None;
        self.shared.state.send_if_modified(|state| match state {
            LoadState::Uninitialized | LoadState::Failed(_) => {
                *state = LoadState::Loading;
                true
            }
            LoadState::Loading => {
                refused = Some(EngineError::LoadInProgress);
                false
            }
            LoadState::Ready | LoadState::Unavailable => {
                refused = Some(EngineError::AlreadyLoaded);
                false
            }
        });
        if let Some(e) = refused {
            return Err(e);
        }

        let mut guard = LoadGuard {
            state: &self.shared.state,
            armed: true,
        };
        let result = self.load_claimed(&source).await;
        guard.disarm();
        result
    }

    async fn load_claimed(&self, source: &DataSource) -> Result<usize, EngineError> {
        if self.shared.options.offload {
            match self.load_offloaded(source).await {
                Some(Ok((count, backend))) => {
                    self.settle(backend, LoadState::Ready);
                    return Ok(count);
                }
                Some(Err(e)) => return Err(self.fail(e)),
                None => {}
            }
        } else {
            tracing::info!("offload disabled; loading in-process");
        }

        match Catalog::load(source) {
            Ok(catalog) => {
                let count = catalog.len();
                self.settle(Backend::InProcess(Arc::new(catalog)), LoadState::Unavailable);
                Ok(count)
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    /// `None` means the worker was unusable and the caller should fall back.
    async fn load_offloaded(
        &self,
        source: &DataSource,
    ) -> Option<Result<(usize, Backend), EngineError>> {
        let (reply_tx, reply_rx) = mpsc::unbounded_channel();
        let requests = match (self.shared.launcher)(self.shared.options.queue_depth, reply_tx) {
            Ok(requests) => requests,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    "worker failed to start; falling back to in-process matching"
                );
                return None;
            }
        };

        let pending = Arc::new(PendingTable::default());
        let (ready_tx, ready_rx) = oneshot::channel();
        tokio::spawn(dispatch(reply_rx, Arc::clone(&pending), ready_tx));

        let load = WorkerRequest::Load {
            source: source.clone(),
        };
        if requests.send(load).await.is_err() {
            tracing::warn!("worker exited before load; falling back to in-process matching");
            return None;
        }

        match ready_rx.await {
            Ok(Ok(count)) => {
                tracing::info!(count, "catalog loaded on worker thread");
                Some(Ok((count, Backend::Worker { requests, pending })))
            }
            Ok(Err(e)) => Some(Err(e)),
            Err(_) => {
                tracing::warn!("worker exited during load; falling back to in-process matching");
                None
            }
        }
    }

    fn settle(&self, backend: Backend, state: LoadState) {
        // Only the task that claimed Loading gets here, so the cell is empty.
        let _ = self.shared.backend.set(backend);
        self.shared.state.send_replace(state);
    }

    fn fail(&self, e: EngineError) -> EngineError {
        tracing::error!(error = %e, "phenotype catalog load failed");
        self.shared.state.send_replace(LoadState::Failed(e.to_string()));
        e
    }

    /// Rank the catalog against `query`.
    ///
    /// Fails with [`EngineError::NotReady`] unless a load has succeeded;
    /// never returns an empty list in place of an error.
    pub async fn match_phenotypes(
        &self,
        query: MatchQuery,
    ) -> Result<Vec<MatchResult>, EngineError> {
        let mut state = self.shared.state.subscribe();
        let settled = state
            .wait_for(|s| *s != LoadState::Loading)
            .await
            .map(|s| s.clone())
            .map_err(|_| EngineError::ChannelClosed)?;
        if !settled.is_loaded() {
            return Err(EngineError::NotReady);
        }

        match self.shared.backend.get() {
            Some(Backend::Worker { requests, pending }) => {
                let id = self.shared.next_id.fetch_add(1, Ordering::Relaxed);
                let (reply_tx, reply_rx) = oneshot::channel();
                pending.register(id, reply_tx)?;
                if requests.send(WorkerRequest::Match { id, query }).await.is_err() {
                    pending.remove(id);
                    return Err(EngineError::ChannelClosed);
                }
                tracing::debug!(id, "match request sent to worker");
                reply_rx.await.map_err(|_| EngineError::ChannelClosed)?
            }
            Some(Backend::InProcess(catalog)) => Ok(catalog.match_phenotypes(&query)?),
            None => Err(EngineError::NotReady),
        }
    }
}

/// Route worker replies: the load outcome to `ready`, match outcomes to
/// their pending request by id.
async fn dispatch(
    mut replies: mpsc::UnboundedReceiver<WorkerReply>,
    pending: Arc<PendingTable>,
    ready: oneshot::Sender<Result<usize, EngineError>>,
) {
    let mut ready = Some(ready);
    while let Some(reply) = replies.recv().await {
        match reply {
            WorkerReply::Ready { count } => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Ok(count));
                }
            }
            WorkerReply::Error { id: None, error } => {
                if let Some(tx) = ready.take() {
                    let _ = tx.send(Err(error));
                }
            }
            WorkerReply::Match { id, results } => pending.complete(id, Ok(results)),
            WorkerReply::Error {
                id: Some(id),
                error,
            } => pending.complete(id, Err(error)),
        }
    }
    tracing::warn!("worker reply channel closed");
    pending.close();
}
