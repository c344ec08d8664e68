//! Language Service
//!
//! Cursor-driven code intelligence over the symbol index: goto-definition,
//! find-references, member completion and signature help, plus the file
//! discovery and watching that keep the index current.
//!
//! Architecture:
//! - Indexer / Watcher: which files belong in the index and when they change
//! - Context / Resolver: heuristic cursor analysis and candidate ranking
//! - References: text scan for call sites, independent of the index

mod completion;
mod context;
mod document;
mod history;
mod indexer;
mod references;
mod resolver;
mod service;
mod signature;
mod watcher;

pub use completion::{completions, CompletionItem, CompletionKind};
pub use context::{
    class_name_in_line, current_class_name, object_type_from_context, parameter_count_at,
    VariableTypeMap,
};
pub use document::{is_word_char, Document, Location, Position, WordRange};
pub use history::{NavigationHistory, ReferenceSet};
pub use indexer::{FileIndexer, IndexEvent};
pub use references::{
    find_declaration_at_cursor, ActiveScope, Reference, ReferenceScanner, ReferenceTarget,
};
pub use resolver::{Resolution, ResolveContext, Resolver};
pub use service::{
    definition_location, GotoOutcome, IndexStats, LanguageError, LanguageService,
    ReferencesOutcome,
};
pub use signature::{signature_help, SignatureHelp};
pub use watcher::{FileEvent, WorkspaceWatcher};
