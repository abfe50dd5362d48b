//! Request queue in front of the codebase model
//!
//! One tokio task owns the [`CodebaseModel`] and drains a bounded `mpsc`
//! queue. Every request carries a `oneshot` reply and is fully processed
//! (diff, invalidate, rescan, repopulate, reanalyze, map write) before the
//! next one is dequeued, so two edits never interleave.
//!
//! # Request lifecycle
//!
//! `Queued → Running(stage) → Done | Failed`
//!
//! Every transition is appended to a shared [`RequestLog`]; the order of
//! entries is the order in which the consumer observed them.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::diagnostics::ReloadReport;
use crate::error::{ModelError, ModelResult};
use crate::graph::{CodebaseModel, CompletionItem, Hover, Location};
use crate::ingest::SymbolId;
use crate::validation::FileKey;

pub type RequestId = u64;

#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    #[error("indexer task has stopped")]
    Closed,

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// What a request asks for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestKind {
    Edit,
    Save,
    Close,
    Remove,
    Definition,
    Hover,
    Completion,
    References,
}

impl RequestKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequestKind::Edit => "edit",
            RequestKind::Save => "save",
            RequestKind::Close => "close",
            RequestKind::Remove => "remove",
            RequestKind::Definition => "definition",
            RequestKind::Hover => "hover",
            RequestKind::Completion => "completion",
            RequestKind::References => "references",
        }
    }

    /// Stage a request of this kind runs in
    pub fn stage(&self) -> RequestStage {
        match self {
            RequestKind::Edit | RequestKind::Save | RequestKind::Close | RequestKind::Remove => {
                RequestStage::Reload
            }
            RequestKind::Definition
            | RequestKind::Hover
            | RequestKind::Completion
            | RequestKind::References => RequestStage::Query,
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RequestStage {
    /// Diff, invalidate and rerun the affected batch
    Reload,
    /// Point query, escalating to analysis if needed
    Query,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestState {
    Queued,
    Running(RequestStage),
    Done,
    Failed { code: &'static str },
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestState::Done | RequestState::Failed { .. })
    }
}

/// One recorded state change
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub id: RequestId,
    pub kind: RequestKind,
    pub state: RequestState,
}

/// Append-only history of request transitions
#[derive(Debug, Default)]
pub struct RequestLog {
    entries: Mutex<Vec<Transition>>,
    next_id: AtomicU64,
}

impl RequestLog {
    fn record(&self, id: RequestId, kind: RequestKind, state: RequestState) {
        debug!(request = id, kind = %kind, state = ?state, "request transition");
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.push(Transition { id, kind, state });
    }

    /// Allocate the next id, record `Queued` and hand the request to `send`
    /// while holding the lock
    fn enqueue(&self, kind: Option<RequestKind>, send: impl FnOnce(RequestId)) -> RequestId {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        if let Some(kind) = kind {
            debug!(request = id, kind = %kind, state = ?RequestState::Queued, "request transition");
            entries.push(Transition {
                id,
                kind,
                state: RequestState::Queued,
            });
        }
        send(id);
        id
    }

    pub fn snapshot(&self) -> Vec<Transition> {
        self.entries
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// States of one request, oldest first
    pub fn states_of(&self, id: RequestId) -> Vec<RequestState> {
        self.snapshot()
            .into_iter()
            .filter(|t| t.id == id)
            .map(|t| t.state)
            .collect()
    }

    /// Latest state of one request
    pub fn current(&self, id: RequestId) -> Option<RequestState> {
        self.states_of(id).pop()
    }
}

enum Command {
    Edit {
        path: String,
        text: String,
        reply: oneshot::Sender<ModelResult<ReloadReport>>,
    },
    Save {
        file: FileKey,
        reply: oneshot::Sender<ModelResult<ReloadReport>>,
    },
    Close {
        file: FileKey,
        reply: oneshot::Sender<ModelResult<ReloadReport>>,
    },
    Remove {
        file: FileKey,
        reply: oneshot::Sender<ModelResult<ReloadReport>>,
    },
    Definition {
        file: FileKey,
        offset: usize,
        reply: oneshot::Sender<Option<Location>>,
    },
    Hover {
        file: FileKey,
        offset: usize,
        reply: oneshot::Sender<Option<Hover>>,
    },
    Completion {
        file: FileKey,
        offset: usize,
        reply: oneshot::Sender<Vec<CompletionItem>>,
    },
    References {
        symbol: SymbolId,
        reply: oneshot::Sender<Vec<Location>>,
    },
    Shutdown {
        reply: oneshot::Sender<CodebaseModel>,
    },
}

impl Command {
    fn kind(&self) -> Option<RequestKind> {
        Some(match self {
            Command::Edit { .. } => RequestKind::Edit,
            Command::Save { .. } => RequestKind::Save,
            Command::Close { .. } => RequestKind::Close,
            Command::Remove { .. } => RequestKind::Remove,
            Command::Definition { .. } => RequestKind::Definition,
            Command::Hover { .. } => RequestKind::Hover,
            Command::Completion { .. } => RequestKind::Completion,
            Command::References { .. } => RequestKind::References,
            Command::Shutdown { .. } => return None,
        })
    }
}

struct Envelope {
    id: RequestId,
    command: Command,
}

/// Cloneable handle to the indexer task
#[derive(Clone)]
pub struct IndexerHandle {
    tx: mpsc::Sender<Envelope>,
    log: Arc<RequestLog>,
}

impl IndexerHandle {
    /// Move `model` into a new consumer task on the current runtime
    ///
    /// # Panics
    /// Outside a tokio runtime.
    pub fn spawn(model: CodebaseModel) -> Self {
        let capacity = model.config().queue_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let log = Arc::new(RequestLog::default());
        tokio::spawn(run_consumer(model, rx, Arc::clone(&log)));
        info!(capacity, "indexer started");
        Self { tx, log }
    }

    /// Request history shared with the consumer
    pub fn log(&self) -> &RequestLog {
        &self.log
    }

    pub fn history(&self) -> Vec<Transition> {
        self.log.snapshot()
    }

    pub async fn on_edit(&self, path: &str, text: &str) -> Result<ReloadReport, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Edit {
            path: path.to_string(),
            text: text.to_string(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| IndexerError::Closed)??)
    }

    pub async fn on_save(&self, file: &FileKey) -> Result<ReloadReport, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Save {
            file: file.clone(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| IndexerError::Closed)??)
    }

    pub async fn on_close(&self, file: &FileKey) -> Result<ReloadReport, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Close {
            file: file.clone(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| IndexerError::Closed)??)
    }

    pub async fn remove_file(&self, file: &FileKey) -> Result<ReloadReport, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Remove {
            file: file.clone(),
            reply,
        })
        .await?;
        Ok(rx.await.map_err(|_| IndexerError::Closed)??)
    }

    pub async fn definition_at(&self, file: &FileKey, offset: usize) -> Result<Option<Location>, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Definition {
            file: file.clone(),
            offset,
            reply,
        })
        .await?;
        rx.await.map_err(|_| IndexerError::Closed)
    }

    pub async fn hover_at(&self, file: &FileKey, offset: usize) -> Result<Option<Hover>, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Hover {
            file: file.clone(),
            offset,
            reply,
        })
        .await?;
        rx.await.map_err(|_| IndexerError::Closed)
    }

    pub async fn completion_at(&self, file: &FileKey, offset: usize) -> Result<Vec<CompletionItem>, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Completion {
            file: file.clone(),
            offset,
            reply,
        })
        .await?;
        rx.await.map_err(|_| IndexerError::Closed)
    }

    pub async fn references_to(&self, symbol: &SymbolId) -> Result<Vec<Location>, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::References {
            symbol: symbol.clone(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| IndexerError::Closed)
    }

    /// Stop the consumer after everything already queued, returning the model
    pub async fn shutdown(self) -> Result<CodebaseModel, IndexerError> {
        let (reply, rx) = oneshot::channel();
        self.submit(Command::Shutdown { reply }).await?;
        rx.await.map_err(|_| IndexerError::Closed)
    }

    /// Enqueue a command, returning its id
    ///
    /// `Queued` is only recorded once a queue slot is held, and the id, the
    /// log entry and the send happen under the log lock, so log order is
    /// dequeue order across cloned handles.
    async fn submit(&self, command: Command) -> Result<RequestId, IndexerError> {
        let permit = self.tx.reserve().await.map_err(|_| IndexerError::Closed)?;
        let kind = command.kind();
        let id = self.log.enqueue(kind, |id| permit.send(Envelope { id, command }));
        Ok(id)
    }
}

/// Drain the queue one request at a time
async fn run_consumer(mut model: CodebaseModel, mut rx: mpsc::Receiver<Envelope>, log: Arc<RequestLog>) {
    while let Some(Envelope { id, command }) = rx.recv().await {
        if let Some(kind) = command.kind() {
            log.record(id, kind, RequestState::Running(kind.stage()));
        }

        let delivered = match command {
            Command::Edit { path, text, reply } => {
                let result = model.on_edit(&path, &text);
                finish(&log, id, RequestKind::Edit, &result);
                reply.send(result).is_ok()
            }
            Command::Save { file, reply } => {
                let result = model.on_save(&file);
                finish(&log, id, RequestKind::Save, &result);
                reply.send(result).is_ok()
            }
            Command::Close { file, reply } => {
                let result = model.on_close(&file);
                finish(&log, id, RequestKind::Close, &result);
                reply.send(result).is_ok()
            }
            Command::Remove { file, reply } => {
                let result = model.remove_file(&file);
                finish(&log, id, RequestKind::Remove, &result);
                reply.send(result).is_ok()
            }
            Command::Definition { file, offset, reply } => {
                let answer = model.definition_at(&file, offset);
                log.record(id, RequestKind::Definition, RequestState::Done);
                reply.send(answer).is_ok()
            }
            Command::Hover { file, offset, reply } => {
                let answer = model.hover_at(&file, offset);
                log.record(id, RequestKind::Hover, RequestState::Done);
                reply.send(answer).is_ok()
            }
            Command::Completion { file, offset, reply } => {
                let answer = model.completion_at(&file, offset);
                log.record(id, RequestKind::Completion, RequestState::Done);
                reply.send(answer).is_ok()
            }
            Command::References { symbol, reply } => {
                let answer = model.references_to(&symbol);
                log.record(id, RequestKind::References, RequestState::Done);
                reply.send(answer).is_ok()
            }
            Command::Shutdown { reply } => {
                info!(request = id, "indexer stopping");
                let _ = reply.send(model);
                return;
            }
        };

        if !delivered {
            debug!(request = id, "caller dropped before the reply");
        }
    }
    debug!("request queue closed");
}

fn finish<T>(log: &RequestLog, id: RequestId, kind: RequestKind, result: &ModelResult<T>) {
    let state = match result {
        Ok(_) => RequestState::Done,
        Err(err) => RequestState::Failed { code: err.code() },
    };
    log.record(id, kind, state);
}
