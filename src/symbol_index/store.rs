//! Persisted symbol index
//!
//! The index is a single UTF-8 text file at the workspace root with one
//! record per line. Every store operation rewrites the whole file from the
//! in-memory table, going through a temporary file and a rename so readers
//! never observe a half-written index.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use thiserror::Error;
use tracing::{debug, info};

use super::record::{parse_index_line, SymbolRecord};
use super::table::SymbolTable;
use crate::language_service::IndexEvent;
use crate::tree_sitter::{extract_symbols, Language, TreeSitterError, TreeSitterParser};

/// Error type for index store operations
#[derive(Debug, Error)]
pub enum IndexStoreError {
    #[error("IO error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Unsupported file type: {0}")]
    UnsupportedFile(String),
    #[error(transparent)]
    Parser(#[from] TreeSitterError),
}

impl IndexStoreError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        IndexStoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Result of reading the index file
#[derive(Debug, Default)]
pub struct LoadedIndex {
    pub table: SymbolTable,
    /// Lines that could not be decoded and were dropped
    pub skipped_lines: usize,
}

/// Owner of the persisted index and the parser used to refill it
pub struct IndexStore {
    root: PathBuf,
    index_path: PathBuf,
    parser: TreeSitterParser,
}

impl IndexStore {
    pub fn new(root: &Path, file_name: &str) -> Result<Self, IndexStoreError> {
        Ok(Self {
            root: root.to_path_buf(),
            index_path: root.join(file_name),
            parser: TreeSitterParser::new()?,
        })
    }

    pub fn index_path(&self) -> &Path {
        &self.index_path
    }

    /// Read the persisted index
    ///
    /// A missing file yields an empty table. Malformed lines are skipped.
    pub fn load(&self) -> Result<LoadedIndex, IndexStoreError> {
        if !self.index_path.exists() {
            info!(
                "[IndexStore] No index at {}, starting empty",
                self.index_path.display()
            );
            return Ok(LoadedIndex::default());
        }

        let bytes =
            fs::read(&self.index_path).map_err(|e| IndexStoreError::io(&self.index_path, e))?;
        let content = String::from_utf8_lossy(&bytes);

        let mut records = Vec::new();
        let mut skipped_lines = 0;
        for (i, line) in content.split('\n').enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match parse_index_line(line) {
                Ok(record) => records.push(record),
                Err(e) => {
                    debug!("[IndexStore] Skipping malformed line {}: {:?}", i + 1, e);
                    skipped_lines += 1;
                }
            }
        }

        info!(
            "[IndexStore] Loaded {} symbols ({} malformed lines skipped)",
            records.len(),
            skipped_lines
        );
        Ok(LoadedIndex {
            table: SymbolTable::from_records(records),
            skipped_lines,
        })
    }

    /// Parse one workspace-relative file and extract its records
    ///
    /// Paths containing `,` are rejected since the index line cannot hold them.
    pub fn extract_file(&mut self, rel_path: &str) -> Result<Vec<SymbolRecord>, IndexStoreError> {
        let language = Language::from_path(rel_path)
            .filter(|_| !rel_path.contains(','))
            .ok_or_else(|| IndexStoreError::UnsupportedFile(rel_path.to_string()))?;

        let full_path = self.root.join(rel_path);
        let bytes = fs::read(&full_path).map_err(|e| IndexStoreError::io(&full_path, e))?;
        let source = String::from_utf8_lossy(&bytes);

        let tree = self.parser.parse(&source, language)?;
        Ok(extract_symbols(&tree, &source, rel_path))
    }

    /// Full re-index of `files` (workspace-relative, in enumeration order)
    ///
    /// The old index file is removed first. Files that fail to read or parse
    /// are reported and skipped. Returns the number of records written.
    pub fn rebuild_all(
        &mut self,
        files: &[String],
        table: &mut SymbolTable,
        mut on_event: impl FnMut(IndexEvent),
    ) -> Result<usize, IndexStoreError> {
        let started = Instant::now();

        if self.index_path.exists() {
            fs::remove_file(&self.index_path)
                .map_err(|e| IndexStoreError::io(&self.index_path, e))?;
        }

        let total = files.len();
        let mut records = Vec::new();
        let mut indexed = 0;
        for (i, file) in files.iter().enumerate() {
            on_event(IndexEvent::FileStarted { path: file.clone() });
            match self.extract_file(file) {
                Ok(found) => {
                    on_event(IndexEvent::FileCompleted {
                        path: file.clone(),
                        symbols: found.len(),
                    });
                    records.extend(found);
                    indexed += 1;
                }
                Err(e) => {
                    on_event(IndexEvent::FileFailed {
                        path: file.clone(),
                        error: e.to_string(),
                    });
                }
            }
            on_event(IndexEvent::Progress {
                completed: i + 1,
                total,
            });
        }

        let symbols = records.len();
        table.replace_all(records);
        self.write(table)?;

        let duration_ms = started.elapsed().as_millis() as u64;
        info!(
            "[IndexStore] Indexed {} files, {} symbols in {}ms",
            indexed, symbols, duration_ms
        );
        on_event(IndexEvent::WorkspaceCompleted {
            files: indexed,
            symbols,
            duration_ms,
        });

        Ok(symbols)
    }

    /// Replace the records of one file and persist
    ///
    /// The old records are dropped before extraction, so a file that fails to
    /// parse ends up with no records rather than stale ones.
    pub fn update_one(
        &mut self,
        rel_path: &str,
        table: &mut SymbolTable,
    ) -> Result<usize, IndexStoreError> {
        let removed = table.remove_file(rel_path);
        let result = self.extract_file(rel_path);

        let added = match result {
            Ok(records) => {
                let added = records.len();
                table.extend(records);
                added
            }
            Err(e) => {
                self.write(table)?;
                return Err(e);
            }
        };

        self.write(table)?;
        debug!(
            "[IndexStore] Updated {}: -{} +{} symbols",
            rel_path, removed, added
        );
        Ok(added)
    }

    /// Drop the records of one file and persist
    pub fn remove_one(
        &self,
        rel_path: &str,
        table: &mut SymbolTable,
    ) -> Result<usize, IndexStoreError> {
        let removed = table.remove_file(rel_path);
        self.write(table)?;
        debug!("[IndexStore] Removed {} symbols for {}", removed, rel_path);
        Ok(removed)
    }

    /// Drop the records of every file below `rel_dir`
    ///
    /// The index is only rewritten when something was removed.
    pub fn remove_dir(
        &self,
        rel_dir: &str,
        table: &mut SymbolTable,
    ) -> Result<usize, IndexStoreError> {
        let removed = table.remove_under(rel_dir);
        if removed > 0 {
            self.write(table)?;
            debug!("[IndexStore] Removed {} symbols under {}/", removed, rel_dir);
        }
        Ok(removed)
    }

    /// Rewrite the index file from `table`
    pub fn write(&self, table: &SymbolTable) -> Result<(), IndexStoreError> {
        let content = table
            .iter()
            .map(SymbolRecord::to_index_line)
            .collect::<Vec<_>>()
            .join("\n");

        let tmp_path = self.index_path.with_extension("index.tmp");
        fs::write(&tmp_path, content).map_err(|e| IndexStoreError::io(&tmp_path, e))?;
        fs::rename(&tmp_path, &self.index_path)
            .map_err(|e| IndexStoreError::io(&self.index_path, e))?;

        debug!(
            "[IndexStore] Wrote {} symbols to {}",
            table.len(),
            self.index_path.display()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn workspace() -> TempDir {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.js"),
            "class Foo {\n  bar(x, y) {}\n}\n",
        )
        .unwrap();
        fs::create_dir(dir.path().join("lib")).unwrap();
        fs::write(
            dir.path().join("lib/util.ts"),
            "const ns = { greet: function (name: string) {} };\n",
        )
        .unwrap();
        dir
    }

    fn files() -> Vec<String> {
        vec!["a.js".to_string(), "lib/util.ts".to_string()]
    }

    #[test]
    fn test_load_missing_index_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = IndexStore::new(dir.path(), "symbols.index").unwrap();

        let loaded = store.load().unwrap();
        assert!(loaded.table.is_empty());
        assert_eq!(loaded.skipped_lines, 0);
    }

    #[test]
    fn test_load_skips_corrupt_lines() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("symbols.index"),
            "a.js,Foo,1,0,\ngarbage\na.js,Foo.bar,2,2,x:unknown;y:unknown\na.js,Bad,x,0,",
        )
        .unwrap();
        let store = IndexStore::new(dir.path(), "symbols.index").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.table.len(), 2);
        assert_eq!(loaded.skipped_lines, 2);
        assert_eq!(loaded.table.find_by_name("Foo.bar").unwrap().param_count, 2);
    }

    #[test]
    fn test_rebuild_writes_and_reports_progress() {
        let dir = workspace();
        let mut store = IndexStore::new(dir.path(), "symbols.index").unwrap();
        let mut table = SymbolTable::new();
        let mut events = Vec::new();

        let count = store
            .rebuild_all(&files(), &mut table, |e| events.push(e))
            .unwrap();

        assert_eq!(count, table.len());
        assert!(table.find_by_name("Foo.bar").is_some());
        assert!(table.find_by_name("ns.greet").is_some());

        let content = fs::read_to_string(store.index_path()).unwrap();
        assert!(content.contains("a.js,Foo.bar,2,2,x:unknown;y:unknown"));
        assert!(content.contains("lib/util.ts,ns.greet,1,1,name:string"));
        assert!(!content.ends_with('\n'));

        assert!(matches!(
            events.last(),
            Some(IndexEvent::WorkspaceCompleted { files: 2, .. })
        ));
        assert!(events
            .iter()
            .any(|e| matches!(e, IndexEvent::Progress { completed: 2, total: 2 })));
    }

    #[test]
    fn test_rebuild_is_idempotent() {
        let dir = workspace();
        let mut store = IndexStore::new(dir.path(), "symbols.index").unwrap();
        let mut table = SymbolTable::new();

        store.rebuild_all(&files(), &mut table, |_| {}).unwrap();
        let first = fs::read(store.index_path()).unwrap();
        store.rebuild_all(&files(), &mut table, |_| {}).unwrap();
        let second = fs::read(store.index_path()).unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_rebuild_skips_unreadable_files() {
        let dir = workspace();
        let mut store = IndexStore::new(dir.path(), "symbols.index").unwrap();
        let mut table = SymbolTable::new();
        let mut failed = Vec::new();

        let mut listed = files();
        listed.push("missing.js".to_string());
        store
            .rebuild_all(&listed, &mut table, |e| {
                if let IndexEvent::FileFailed { path, .. } = e {
                    failed.push(path);
                }
            })
            .unwrap();

        assert_eq!(failed, vec!["missing.js".to_string()]);
        assert!(table.find_by_name("Foo").is_some());
    }

    #[test]
    fn test_update_one_replaces_file_records() {
        let dir = workspace();
        let mut store = IndexStore::new(dir.path(), "symbols.index").unwrap();
        let mut table = SymbolTable::new();
        store.rebuild_all(&files(), &mut table, |_| {}).unwrap();

        fs::write(dir.path().join("a.js"), "class Foo {\n  baz() {}\n}\n").unwrap();
        store.update_one("a.js", &mut table).unwrap();

        assert!(table.find_by_name("Foo.bar").is_none());
        assert!(table.find_by_name("Foo.baz").is_some());
        assert!(table.find_by_name("ns.greet").is_some());

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.table, table);
    }

    #[test]
    fn test_commas_never_reach_the_index() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("keys.js"),
            "var ns = { 'a,b': function (x) {}, ok: function () {} };\n",
        )
        .unwrap();
        fs::write(dir.path().join("odd,name.js"), "function hidden() {}\n").unwrap();
        let mut store = IndexStore::new(dir.path(), "symbols.index").unwrap();
        let mut table = SymbolTable::new();
        let mut failed = Vec::new();

        let files = vec!["keys.js".to_string(), "odd,name.js".to_string()];
        store
            .rebuild_all(&files, &mut table, |e| {
                if let IndexEvent::FileFailed { path, .. } = e {
                    failed.push(path);
                }
            })
            .unwrap();

        assert_eq!(failed, vec!["odd,name.js"]);
        assert!(table.find_by_name("ns.ok").is_some());
        assert!(table.iter().all(|r| !r.symbol_name.contains(',')));

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.skipped_lines, 0);
        assert_eq!(reloaded.table, table);
    }

    #[test]
    fn test_remove_one_persists() {
        let dir = workspace();
        let mut store = IndexStore::new(dir.path(), "symbols.index").unwrap();
        let mut table = SymbolTable::new();
        store.rebuild_all(&files(), &mut table, |_| {}).unwrap();

        let removed = store.remove_one("lib/util.ts", &mut table).unwrap();
        assert_eq!(removed, 1);

        let reloaded = store.load().unwrap();
        assert!(reloaded.table.find_by_name("ns.greet").is_none());
        assert_eq!(reloaded.table.len(), table.len());
    }

    #[test]
    fn test_incremental_matches_full_rebuild() {
        let dir = workspace();
        let mut store = IndexStore::new(dir.path(), "symbols.index").unwrap();
        let mut table = SymbolTable::new();
        store.rebuild_all(&files(), &mut table, |_| {}).unwrap();

        store.remove_one("a.js", &mut table).unwrap();
        let fresh = store.extract_file("a.js").unwrap();
        table.extend(fresh);

        let mut rebuilt = SymbolTable::new();
        store.rebuild_all(&files(), &mut rebuilt, |_| {}).unwrap();

        let mut incremental: Vec<String> = table.iter().map(|r| r.to_index_line()).collect();
        let mut full: Vec<String> = rebuilt.iter().map(|r| r.to_index_line()).collect();
        incremental.sort();
        full.sort();
        assert_eq!(incremental, full);
    }
}
