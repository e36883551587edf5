//! Isolated worker context: owns its own catalog copy and answers
//! load/match requests in arrival order.

use crate::engine::EngineError;
use phenomatch_core::{Catalog, DataSource, MatchQuery, MatchResult};
use tokio::sync::mpsc;

/// Messages sent from the coordinator to the worker thread.
pub(crate) enum WorkerRequest {
    Load { source: DataSource },
    Match { id: u64, query: MatchQuery },
}

/// Messages sent back from the worker thread.
///
/// Load outcomes carry no id; they apply to the whole session.
pub(crate) enum WorkerReply {
    Ready { count: usize },
    Match { id: u64, results: Vec<MatchResult> },
    Error { id: Option<u64>, error: EngineError },
}

/// Starts a worker and returns its request channel.
pub(crate) type Launcher = fn(
    usize,
    mpsc::UnboundedSender<WorkerReply>,
) -> std::io::Result<mpsc::Sender<WorkerRequest>>;

/// Spawn the worker on a dedicated OS thread.
pub(crate) fn spawn_worker(
    queue_depth: usize,
    replies: mpsc::UnboundedSender<WorkerReply>,
) -> std::io::Result<mpsc::Sender<WorkerRequest>> {
    let (tx, mut rx) = mpsc::channel::<WorkerRequest>(queue_depth);

    std::thread::Builder::new()
        .name("phenomatch-worker".into())
        .spawn(move || {
            tracing::info!("worker thread started");
            let mut catalog = None;
            while let Some(req) = rx.blocking_recv() {
                let reply = handle(&mut catalog, req);
                if replies.send(reply).is_err() {
                    break;
                }
            }
            tracing::info!("worker thread exiting");
        })?;

    Ok(tx)
}

fn handle(catalog: &mut Option<Catalog>, req: WorkerRequest) -> WorkerReply {
    match req {
        WorkerRequest::Load { source } => match Catalog::load(&source) {
            Ok(loaded) => {
                let count = loaded.len();
                *catalog = Some(loaded);
                WorkerReply::Ready { count }
            }
            Err(e) => WorkerReply::Error {
                id: None,
                error: e.into(),
            },
        },
        WorkerRequest::Match { id, query } => {
            let Some(catalog) = catalog.as_ref() else {
                return WorkerReply::Error {
                    id: Some(id),
                    error: EngineError::NotReady,
                };
            };
            match catalog.match_phenotypes(&query) {
                Ok(results) => WorkerReply::Match { id, results },
                Err(e) => WorkerReply::Error {
                    id: Some(id),
                    error: e.into(),
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phenomatch_core::{Embedding, Sex, EMBEDDING_DIM};

    fn query() -> MatchQuery {
        MatchQuery::new(Embedding::new(vec![1.0; EMBEDDING_DIM]), Sex::Male)
    }

    #[test]
    fn test_match_before_load_is_not_ready() {
        let mut catalog = None;
        let request = WorkerRequest::Match {
            id: 7,
            query: query(),
        };
        assert!(matches!(
            handle(&mut catalog, request),
            WorkerReply::Error {
                id: Some(7),
                error: EngineError::NotReady
            }
        ));
    }

    #[test]
    fn test_failed_load_reply_has_no_id() {
        let mut catalog = None;
        let source = DataSource::new("/nonexistent/list.json");
        let reply = handle(&mut catalog, WorkerRequest::Load { source });
        assert!(matches!(
            reply,
            WorkerReply::Error {
                id: None,
                error: EngineError::Load(_)
            }
        ));
        assert!(catalog.is_none());
    }

    #[test]
    fn test_match_error_carries_request_id() {
        let mut catalog = Some(Catalog::default());
        let bad = MatchQuery::new(vec![0.5; 3], Sex::Female);
        let reply = handle(&mut catalog, WorkerRequest::Match { id: 3, query: bad });
        assert!(matches!(
            reply,
            WorkerReply::Error {
                id: Some(3),
                error: EngineError::Match(_)
            }
        ));
    }

    #[test]
    fn test_spawned_worker_answers_in_order() {
        let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
        let requests = spawn_worker(4, reply_tx).unwrap();

        requests
            .blocking_send(WorkerRequest::Match {
                id: 1,
                query: query(),
            })
            .unwrap();
        let source = DataSource::new("/nonexistent/list.json");
        requests
            .blocking_send(WorkerRequest::Load { source })
            .unwrap();

        assert!(matches!(
            reply_rx.blocking_recv(),
            Some(WorkerReply::Error { id: Some(1), .. })
        ));
        assert!(matches!(
            reply_rx.blocking_recv(),
            Some(WorkerReply::Error { id: None, .. })
        ));

        drop(requests);
        assert!(reply_rx.blocking_recv().is_none());
    }
}
