use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

use crate::language_service::{
    CompletionItem, Document, GotoOutcome, IndexEvent, LanguageError, LanguageService, Location,
    Position, ReferenceSet, ReferencesOutcome, SignatureHelp,
};

// ==============================================================================
// 1. Requests (host -> service)
// ==============================================================================

/// Cursor in a workspace file, optionally with unsaved buffer text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CursorParams {
    /// Workspace-relative or absolute path
    pub file: String,
    pub position: Position,
    /// Buffer contents; read from disk when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// One JSON line on stdin
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Request {
    RebuildIndex,
    GotoDefinition(CursorParams),
    FindReferences(CursorParams),
    ShowLastReferences,
    SelectReference { index: usize },
    PopReferences,
    Complete(CursorParams),
    SignatureHelp(CursorParams),
    Shutdown,
}

// ==============================================================================
// 2. Responses (service -> host)
// ==============================================================================

/// One JSON line on stdout
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum Response {
    IndexProgress {
        completed: usize,
        total: usize,
    },
    IndexFileFailed {
        path: String,
        error: String,
    },
    IndexCompleted {
        files: usize,
        symbols: usize,
        duration_ms: u64,
    },
    /// A watched file was re-indexed or dropped
    IndexUpdated {
        path: String,
    },
    Definition(GotoOutcome),
    References(ReferencesOutcome),
    ReferencesProgress {
        completed: usize,
        total: usize,
    },
    /// `None` when no search has been run
    LastReferences(Option<ReferenceSet>),
    Selected(Option<Location>),
    Completions(Vec<CompletionItem>),
    Signature(Option<SignatureHelp>),
    Error {
        message: String,
    },
    ShuttingDown,
}

impl Response {
    /// Per-file start/finish events are too chatty for the host
    pub fn from_index_event(event: IndexEvent) -> Option<Self> {
        match event {
            IndexEvent::FileStarted { .. } | IndexEvent::FileCompleted { .. } => None,
            IndexEvent::FileFailed { path, error } => {
                Some(Response::IndexFileFailed { path, error })
            }
            IndexEvent::Progress { completed, total } => {
                Some(Response::IndexProgress { completed, total })
            }
            IndexEvent::WorkspaceCompleted {
                files,
                symbols,
                duration_ms,
            } => Some(Response::IndexCompleted {
                files,
                symbols,
                duration_ms,
            }),
        }
    }

    pub fn error(err: impl std::fmt::Display) -> Self {
        Response::Error {
            message: err.to_string(),
        }
    }
}

// ==============================================================================
// 3. Dispatch
// ==============================================================================

/// Run one request to completion, emitting every response it produces
///
/// Returns `false` once the host asked to shut down.
pub fn dispatch(
    service: &mut LanguageService,
    request: Request,
    emit: &mut impl FnMut(Response),
) -> bool {
    debug!("[Protocol] {:?}", request);

    match handle(service, request, emit) {
        Ok(keep_running) => keep_running,
        Err(e) => {
            warn!("[Protocol] Request failed: {}", e);
            emit(Response::error(e));
            true
        }
    }
}

fn handle(
    service: &mut LanguageService,
    request: Request,
    emit: &mut impl FnMut(Response),
) -> Result<bool, LanguageError> {
    match request {
        Request::RebuildIndex => {
            service.rebuild_index(|event| {
                if let Some(response) = Response::from_index_event(event) {
                    emit(response);
                }
            })?;
        }
        Request::GotoDefinition(params) => {
            let document = load_document(service, &params)?;
            let outcome = service.goto_definition(&document, params.position)?;
            emit(Response::Definition(outcome));
        }
        Request::FindReferences(params) => {
            let document = load_document(service, &params)?;
            let outcome =
                service.find_references_at_cursor(&document, params.position, |completed, total| {
                    emit(Response::ReferencesProgress { completed, total })
                });
            emit(Response::References(outcome));
        }
        Request::ShowLastReferences => {
            emit(Response::LastReferences(service.show_last_references().cloned()));
        }
        Request::SelectReference { index } => {
            emit(Response::Selected(service.select_reference(index)));
        }
        Request::PopReferences => {
            emit(Response::LastReferences(service.pop_references().cloned()));
        }
        Request::Complete(params) => {
            let document = load_document(service, &params)?;
            emit(Response::Completions(service.completions(&document, params.position)));
        }
        Request::SignatureHelp(params) => {
            let document = load_document(service, &params)?;
            emit(Response::Signature(service.signature_help(&document, params.position)));
        }
        Request::Shutdown => {
            emit(Response::ShuttingDown);
            return Ok(false);
        }
    }
    Ok(true)
}

fn load_document(
    service: &LanguageService,
    params: &CursorParams,
) -> Result<Document, LanguageError> {
    let path = Path::new(&params.file);
    match &params.text {
        Some(text) => Ok(Document::new(service.relative_path(path)?, text)),
        None => service.open_document(path),
    }
}
