//! Open documents and cursor positions
//!
//! Positions are 0-based lines and 0-based character (not byte) offsets,
//! matching what editors send. Record line numbers in the index are 1-based.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Cursor position in a document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// A place in a workspace file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Workspace-relative path
    pub file_path: String,
    /// 0-based line
    pub line: usize,
    pub character: usize,
}

/// Identifier span on one line, in characters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordRange {
    pub line: usize,
    pub start: usize,
    pub end: usize,
}

/// In-memory text of one workspace file
#[derive(Debug, Clone)]
pub struct Document {
    path: String,
    lines: Vec<String>,
}

impl Document {
    pub fn new(path: impl Into<String>, text: &str) -> Self {
        Self {
            path: path.into(),
            lines: text
                .split('\n')
                .map(|l| l.strip_suffix('\r').unwrap_or(l).to_string())
                .collect(),
        }
    }

    /// Read a workspace-relative file, replacing invalid UTF-8
    pub fn open(root: &Path, rel_path: &str) -> std::io::Result<Self> {
        let bytes = fs::read(root.join(rel_path))?;
        Ok(Self::new(rel_path, &String::from_utf8_lossy(&bytes)))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    /// Text of a line, empty when out of range
    pub fn line(&self, line: usize) -> &str {
        self.lines.get(line).map(String::as_str).unwrap_or("")
    }

    /// Line text before the cursor
    pub fn line_prefix(&self, position: Position) -> &str {
        let line = self.line(position.line);
        &line[..char_to_byte(line, position.character)]
    }

    /// Identifier under or immediately before the cursor
    pub fn word_range_at(&self, position: Position) -> Option<WordRange> {
        let chars: Vec<char> = self.line(position.line).chars().collect();
        let at = position.character.min(chars.len());

        let on_word = at < chars.len() && is_word_char(chars[at]);
        let after_word = at > 0 && is_word_char(chars[at - 1]);
        if !on_word && !after_word {
            return None;
        }

        let mut start = at;
        while start > 0 && is_word_char(chars[start - 1]) {
            start -= 1;
        }
        let mut end = at;
        while end < chars.len() && is_word_char(chars[end]) {
            end += 1;
        }

        Some(WordRange {
            line: position.line,
            start,
            end,
        })
    }

    pub fn text_in(&self, range: WordRange) -> String {
        self.line(range.line)
            .chars()
            .skip(range.start)
            .take(range.end - range.start)
            .collect()
    }
}

pub fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

/// Byte offset of the `char_idx`-th character, clamped to the end
pub(crate) fn char_to_byte(s: &str, char_idx: usize) -> usize {
    s.char_indices()
        .nth(char_idx)
        .map(|(b, _)| b)
        .unwrap_or(s.len())
}

pub(crate) fn byte_to_char(s: &str, byte_idx: usize) -> usize {
    s[..byte_idx.min(s.len())].chars().count()
}
