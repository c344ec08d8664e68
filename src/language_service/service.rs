//! Unified Language Service
//!
//! Owns the settings, the persisted index, the in-memory symbol table and
//! the reference history for one workspace, and exposes the commands a host
//! editor drives. Every command runs to completion before the next one.

use std::path::{Path, PathBuf};
use std::time::Duration;

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info};

use super::completion::{completions, CompletionItem};
use super::context::{current_class_name, VariableTypeMap};
use super::document::{Document, Location, Position};
use super::history::{NavigationHistory, ReferenceSet};
use super::indexer::{FileIndexer, IndexEvent};
use super::references::{find_declaration_at_cursor, ActiveScope, ReferenceScanner, ReferenceTarget};
use super::resolver::Resolver;
use super::signature::{signature_help, SignatureHelp};
use super::watcher::{FileEvent, WorkspaceWatcher};
use crate::project_settings::{load_project_settings_or_default, ProjectSettings};
use crate::symbol_index::{IndexStore, IndexStoreError, SymbolRecord, SymbolTable};

lazy_static! {
    static ref MEMBER_RECEIVER: Regex = Regex::new(r"(\w+)\.$").unwrap();
}

/// Error type for language service operations
#[derive(Debug, Error)]
pub enum LanguageError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Index(#[from] IndexStoreError),
    #[error("{} is outside the workspace", .0.display())]
    NotInWorkspace(PathBuf),
    #[error("Failed to watch workspace: {0}")]
    Watch(#[from] notify::Error),
}

/// What goto-definition decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum GotoOutcome {
    /// Cursor is not on an identifier
    NoWord,
    NoMatch { word: String, param_count: usize },
    Navigate { symbol: String, location: Location },
    /// Ranked candidates for the host to pick from
    Choose {
        word: String,
        candidates: Vec<SymbolRecord>,
    },
}

/// What find-references decided
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ReferencesOutcome {
    NoWord,
    /// Nothing at the cursor names a namespace-scoped function
    NoTarget { word: String },
    NoMatch { target: ReferenceTarget },
    Found { set: ReferenceSet },
}

/// Statistics about the current index
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IndexStats {
    pub files_indexed: usize,
    pub symbols: usize,
}

/// Where a record's declaration starts
pub fn definition_location(record: &SymbolRecord) -> Location {
    Location {
        file_path: record.file_path.clone(),
        line: record.line_num.saturating_sub(1) as usize,
        character: 0,
    }
}

/// Unified language service
pub struct LanguageService {
    settings: ProjectSettings,
    indexer: FileIndexer,
    store: IndexStore,
    table: SymbolTable,
    resolver: Resolver,
    history: NavigationHistory,
}

impl LanguageService {
    /// Open a workspace using its saved settings and persisted index
    pub fn new(workspace_root: PathBuf) -> Result<Self, LanguageError> {
        let settings = load_project_settings_or_default(&workspace_root);
        Self::with_settings(workspace_root, settings)
    }

    pub fn with_settings(
        workspace_root: PathBuf,
        settings: ProjectSettings,
    ) -> Result<Self, LanguageError> {
        let store = IndexStore::new(&workspace_root, &settings.index.file_name)?;
        let loaded = store.load()?;
        info!(
            "[LanguageService] Opened {} with {} symbols",
            workspace_root.display(),
            loaded.table.len()
        );

        Ok(Self {
            indexer: FileIndexer::new(workspace_root, &settings.index),
            resolver: Resolver::new(settings.resolver.well_known_namespaces.clone()),
            store,
            table: loaded.table,
            history: NavigationHistory::new(),
            settings,
        })
    }

    pub fn workspace_root(&self) -> &Path {
        self.indexer.workspace_root()
    }

    pub fn settings(&self) -> &ProjectSettings {
        &self.settings
    }

    pub fn table(&self) -> &SymbolTable {
        &self.table
    }

    pub fn stats(&self) -> IndexStats {
        IndexStats {
            files_indexed: self.table.file_count(),
            symbols: self.table.len(),
        }
    }

    // =========================================================================
    // Indexing
    // =========================================================================

    /// Full workspace re-index; returns the number of symbols written
    pub fn rebuild_index(
        &mut self,
        on_event: impl FnMut(IndexEvent),
    ) -> Result<usize, LanguageError> {
        let files = self.indexer.discover_files();
        info!("[LanguageService] Rebuilding index over {} files", files.len());
        Ok(self.store.rebuild_all(&files, &mut self.table, on_event)?)
    }

    pub fn update_file(&mut self, rel_path: &str) -> Result<usize, LanguageError> {
        Ok(self.store.update_one(rel_path, &mut self.table)?)
    }

    pub fn remove_file(&mut self, rel_path: &str) -> Result<usize, LanguageError> {
        Ok(self.store.remove_one(rel_path, &mut self.table)?)
    }

    /// Apply one watcher event; returns whether the index changed
    pub fn handle_file_event(&mut self, event: &FileEvent) -> Result<bool, LanguageError> {
        let Some(rel_path) = self.indexer.to_relative(event.path()) else {
            return Ok(false);
        };
        let indexable = self.indexer.is_indexable(&rel_path);

        match event {
            FileEvent::Changed(_) if indexable => {
                self.update_file(&rel_path)?;
                Ok(true)
            }
            FileEvent::Changed(_) => Ok(false),
            FileEvent::Removed(_) if indexable => {
                self.remove_file(&rel_path)?;
                Ok(true)
            }
            // a deleted directory yields no events for the files inside it
            FileEvent::Removed(_) => Ok(self.store.remove_dir(&rel_path, &mut self.table)? > 0),
        }
    }

    /// Start watching the workspace with the configured debounce
    pub fn watch<F>(&self, on_batch: F) -> Result<WorkspaceWatcher, LanguageError>
    where
        F: FnMut(Vec<FileEvent>) + Send + 'static,
    {
        let debounce = Duration::from_millis(self.settings.watcher.debounce_ms);
        Ok(WorkspaceWatcher::new(self.workspace_root(), debounce, on_batch)?)
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Workspace-relative form of `path`, which may be absolute or relative
    pub fn relative_path(&self, path: &Path) -> Result<String, LanguageError> {
        if path.is_absolute() {
            self.indexer
                .to_relative(path)
                .ok_or_else(|| LanguageError::NotInWorkspace(path.to_path_buf()))
        } else {
            Ok(path.to_string_lossy().replace('\\', "/"))
        }
    }

    pub fn open_document(&self, path: &Path) -> Result<Document, LanguageError> {
        let rel_path = self.relative_path(path)?;
        Document::open(self.workspace_root(), &rel_path).map_err(|source| LanguageError::Io {
            path: self.indexer.to_absolute(&rel_path),
            source,
        })
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Resolve the identifier at the cursor
    ///
    /// An empty table is filled by a full re-index first.
    pub fn goto_definition(
        &mut self,
        document: &Document,
        position: Position,
    ) -> Result<GotoOutcome, LanguageError> {
        if self.table.is_empty() {
            info!("[LanguageService] Index is empty, rebuilding before lookup");
            self.rebuild_index(|_| {})?;
        }

        let Some(resolution) = self.resolver.resolve(document, position, &self.table) else {
            return Ok(GotoOutcome::NoWord);
        };

        if resolution.is_empty() {
            return Ok(GotoOutcome::NoMatch {
                word: resolution.word,
                param_count: resolution.param_count,
            });
        }

        if let Some(record) = resolution.target_record() {
            return Ok(GotoOutcome::Navigate {
                symbol: record.symbol_name.clone(),
                location: definition_location(record),
            });
        }

        Ok(GotoOutcome::Choose {
            word: resolution.word,
            candidates: resolution.matches,
        })
    }

    /// Find call sites of the function at the cursor
    ///
    /// Tries a declaration on the cursor line first, then `receiver.fn` and
    /// finally `this.fn` through the enclosing class. A non-empty result is
    /// pushed onto the reference history.
    pub fn find_references_at_cursor(
        &mut self,
        document: &Document,
        position: Position,
        on_progress: impl FnMut(usize, usize),
    ) -> ReferencesOutcome {
        let Some(range) = document.word_range_at(position) else {
            return ReferencesOutcome::NoWord;
        };
        let word = document.text_in(range);

        let target = find_declaration_at_cursor(document, position)
            .or_else(|| member_target(document, Position::new(position.line, range.start), &word));
        let Some(target) = target else {
            debug!("[LanguageService] No reference target for {}", word);
            return ReferencesOutcome::NoTarget { word };
        };

        let files = self.indexer.discover_files();
        let active = ActiveScope {
            document,
            class_name: current_class_name(document, position),
        };
        let references = ReferenceScanner::new(self.workspace_root(), &files)
            .find_references_with_progress(&target, Some(&active), on_progress);

        if references.is_empty() {
            return ReferencesOutcome::NoMatch { target };
        }

        let set = ReferenceSet::new(target, references);
        self.history.push(set.clone());
        ReferencesOutcome::Found { set }
    }

    /// Most recent reference set, with its last selection
    pub fn show_last_references(&self) -> Option<&ReferenceSet> {
        self.history.top()
    }

    pub fn select_reference(&mut self, index: usize) -> Option<Location> {
        self.history.select(index).map(|r| r.location.clone())
    }

    /// Drop the most recent set and return the one before it
    pub fn pop_references(&mut self) -> Option<&ReferenceSet> {
        self.history.pop()?;
        self.history.top()
    }

    // =========================================================================
    // Editing assistance
    // =========================================================================

    pub fn completions(&self, document: &Document, position: Position) -> Vec<CompletionItem> {
        completions(document, position, &self.table)
    }

    pub fn signature_help(&self, document: &Document, position: Position) -> Option<SignatureHelp> {
        signature_help(document, position, &self.table)
    }
}

/// Target for `receiver.word`: `this` maps to the enclosing class, a typed
/// local to its type, anything else is taken as the namespace itself
fn member_target(document: &Document, word_start: Position, word: &str) -> Option<ReferenceTarget> {
    let before = document.line_prefix(word_start);
    let receiver = MEMBER_RECEIVER.captures(before)?.get(1)?.as_str();

    let namespace = if receiver == "this" {
        current_class_name(document, word_start)?
    } else {
        let types = VariableTypeMap::scan(document);
        types.get(receiver).unwrap_or(receiver).to_string()
    };
    Some(ReferenceTarget::new(namespace, word))
}
