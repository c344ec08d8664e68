//! Tree-sitter parser management
//!
//! Owns one parser per script dialect. JavaScript files and TypeScript files
//! use different grammars, so the dialect is picked from the file extension.

use std::collections::HashMap;
use thiserror::Error;
use tree_sitter::{Parser, Tree};

/// Script dialects the indexer understands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    TypeScript,
    Tsx,
    JavaScript,
    Jsx,
}

impl Language {
    /// Detect language from file path extension
    pub fn from_path(path: &str) -> Option<Self> {
        let file_name = path.rsplit(['/', '\\']).next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        Self::from_extension(ext)
    }

    /// Map a bare extension (without the dot) to a dialect
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "ts" | "mts" | "cts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            "js" | "mjs" | "cjs" => Some(Language::JavaScript),
            "jsx" => Some(Language::Jsx),
            _ => None,
        }
    }

    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
            // JSX uses the same grammar as JavaScript in tree-sitter-javascript
            Language::JavaScript | Language::Jsx => tree_sitter_javascript::LANGUAGE.into(),
        }
    }
}

/// Error type for tree-sitter operations
#[derive(Debug, Error)]
pub enum TreeSitterError {
    #[error("Unsupported language")]
    UnsupportedLanguage,
    #[error("Failed to parse code")]
    ParseFailed,
    #[error("Failed to initialize language: {0}")]
    LanguageInitFailed(String),
}

/// Tree-sitter parser manager
pub struct TreeSitterParser {
    parsers: HashMap<Language, Parser>,
}

impl TreeSitterParser {
    /// Create a new parser manager with all supported dialects initialized
    pub fn new() -> Result<Self, TreeSitterError> {
        let mut parsers = HashMap::new();

        for language in [
            Language::TypeScript,
            Language::Tsx,
            Language::JavaScript,
            Language::Jsx,
        ] {
            let mut parser = Parser::new();
            parser
                .set_language(&language.grammar())
                .map_err(|e| TreeSitterError::LanguageInitFailed(e.to_string()))?;
            parsers.insert(language, parser);
        }

        Ok(Self { parsers })
    }

    /// Parse source code for the given language
    ///
    /// Tree-sitter recovers from syntax errors, so a tree is returned even for
    /// broken files; unrecognised regions show up as `ERROR` nodes.
    pub fn parse(&mut self, code: &str, language: Language) -> Result<Tree, TreeSitterError> {
        let parser = self
            .parsers
            .get_mut(&language)
            .ok_or(TreeSitterError::UnsupportedLanguage)?;

        parser.parse(code, None).ok_or(TreeSitterError::ParseFailed)
    }
}
