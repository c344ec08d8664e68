//! Tree-sitter integration
//!
//! Parses JavaScript and TypeScript sources and flattens their declarations
//! into dotted qualified names for the symbol index.

mod parser;
mod symbol;

pub use parser::{Language, TreeSitterError, TreeSitterParser};
pub use symbol::{extract_symbols, Declaration, DeclarationForm, SymbolExtractor, ANONYMOUS};
