//! Workspace file discovery
//!
//! Decides which files belong in the symbol index and reports indexing
//! progress to whoever drives a rebuild.

use std::path::{Path, PathBuf};

use glob::Pattern;
use tracing::{debug, warn};
use walkdir::{DirEntry, WalkDir};

use crate::gitignore_filter::GitignoreFilter;
use crate::project_settings::IndexSettings;

/// Events emitted during indexing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexEvent {
    /// Started indexing a file
    FileStarted { path: String },
    /// Finished indexing a file
    FileCompleted { path: String, symbols: usize },
    /// Failed to index a file
    FileFailed { path: String, error: String },
    /// Workspace indexing progress
    Progress { completed: usize, total: usize },
    /// Workspace indexing complete
    WorkspaceCompleted {
        files: usize,
        symbols: usize,
        duration_ms: u64,
    },
}

/// File indexer for managing workspace indexing
pub struct FileIndexer {
    /// Workspace root
    workspace_root: PathBuf,
    extensions: Vec<String>,
    exclude_dirs: Vec<String>,
    exclude_files: Vec<Pattern>,
    gitignore: GitignoreFilter,
}

impl FileIndexer {
    /// Create a new file indexer
    pub fn new(workspace_root: PathBuf, settings: &IndexSettings) -> Self {
        let exclude_files = settings
            .exclude_files
            .iter()
            .filter_map(|raw| match Pattern::new(raw) {
                Ok(pattern) => Some(pattern),
                Err(e) => {
                    warn!("[FileIndexer] Ignoring bad exclude pattern {:?}: {}", raw, e);
                    None
                }
            })
            .collect();

        let gitignore = if settings.respect_gitignore {
            GitignoreFilter::new(&workspace_root)
        } else {
            GitignoreFilter::disabled(&workspace_root)
        };

        Self {
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_dirs: settings.exclude_dirs.clone(),
            exclude_files,
            gitignore,
            workspace_root,
        }
    }

    pub fn workspace_root(&self) -> &Path {
        &self.workspace_root
    }

    /// Get list of all indexable files in workspace, sorted
    ///
    /// Paths are relative to the root and `/`-separated.
    pub fn discover_files(&self) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(&self.workspace_root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !self.is_pruned_dir(entry))
            .filter_map(Result::ok)
            .filter(|entry| entry.file_type().is_file())
            .filter_map(|entry| self.to_relative(entry.path()))
            .filter(|rel| self.is_indexable(rel))
            .collect();

        files.sort();
        debug!("[FileIndexer] Discovered {} files", files.len());
        files
    }

    fn is_pruned_dir(&self, entry: &DirEntry) -> bool {
        if !entry.file_type().is_dir() {
            return false;
        }
        let name = entry.file_name().to_string_lossy();
        name.starts_with('.')
            || self.exclude_dirs.iter().any(|d| d == name.as_ref())
            || self.gitignore.should_ignore(entry.path(), true)
    }

    /// Check whether a workspace-relative path belongs in the index
    pub fn is_indexable(&self, rel_path: &str) -> bool {
        if rel_path.contains(',') {
            return false;
        }
        let mut components: Vec<&str> = rel_path.split('/').collect();
        let Some(file_name) = components.pop() else {
            return false;
        };

        let has_extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| self.extensions.iter().any(|e| *e == ext.to_lowercase()))
            .unwrap_or(false);
        if !has_extension {
            return false;
        }

        if components
            .iter()
            .any(|dir| dir.starts_with('.') || self.exclude_dirs.iter().any(|d| d == dir))
        {
            return false;
        }

        if self.exclude_files.iter().any(|p| p.matches(file_name)) {
            return false;
        }

        !self.gitignore.should_ignore(Path::new(rel_path), false)
    }

    /// Get relative path from absolute path
    pub fn to_relative(&self, abs_path: &Path) -> Option<String> {
        abs_path
            .strip_prefix(&self.workspace_root)
            .ok()
            .and_then(|p| p.to_str())
            .map(|s| s.replace('\\', "/"))
    }

    /// Get absolute path from relative
    pub fn to_absolute(&self, rel_path: &str) -> PathBuf {
        self.workspace_root.join(rel_path)
    }
}
