//! In-memory symbol table
//!
//! The deserialized record list every query reads from. It is owned by the
//! language service and only mutated through `IndexStore` operations.

use super::record::SymbolRecord;

/// Ordered sequence of symbol records
///
/// Names are not unique: the same qualified name may appear in several files
/// or on several lines of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    records: Vec<SymbolRecord>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: Vec<SymbolRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[SymbolRecord] {
        &self.records
    }

    pub fn iter(&self) -> std::slice::Iter<'_, SymbolRecord> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Replace the whole table (full re-index)
    pub fn replace_all(&mut self, records: Vec<SymbolRecord>) {
        self.records = records;
    }

    /// Drop every record belonging to `file_path`, returning how many went
    pub fn remove_file(&mut self, file_path: &str) -> usize {
        let before = self.records.len();
        self.records.retain(|r| r.file_path != file_path);
        before - self.records.len()
    }

    /// Drop every record of the files below directory `dir`
    pub fn remove_under(&mut self, dir: &str) -> usize {
        let prefix = format!("{}/", dir.trim_end_matches('/'));
        let before = self.records.len();
        self.records.retain(|r| !r.file_path.starts_with(&prefix));
        before - self.records.len()
    }

    /// Append freshly extracted records
    pub fn extend(&mut self, records: impl IntoIterator<Item = SymbolRecord>) {
        self.records.extend(records);
    }

    /// Records declared in one file, in table order
    pub fn in_file<'a>(&'a self, file_path: &'a str) -> impl Iterator<Item = &'a SymbolRecord> {
        self.records.iter().filter(move |r| r.file_path == file_path)
    }

    /// First record whose qualified name equals `name`
    pub fn find_by_name(&self, name: &str) -> Option<&SymbolRecord> {
        self.records.iter().find(|r| r.symbol_name == name)
    }

    /// First record whose qualified name starts with `prefix`
    pub fn first_with_prefix(&self, prefix: &str) -> Option<&SymbolRecord> {
        self.records
            .iter()
            .find(|r| !r.symbol_name.is_empty() && r.symbol_name.starts_with(prefix))
    }

    /// Number of distinct files with at least one record
    pub fn file_count(&self) -> usize {
        let mut files: Vec<&str> = self.records.iter().map(|r| r.file_path.as_str()).collect();
        files.sort_unstable();
        files.dedup();
        files.len()
    }
}

impl<'a> IntoIterator for &'a SymbolTable {
    type Item = &'a SymbolRecord;
    type IntoIter = std::slice::Iter<'a, SymbolRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.iter()
    }
}
