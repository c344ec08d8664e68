pub mod gitignore_filter;
pub mod language_service;
pub mod project_settings;
pub mod protocol;
pub mod symbol_index;
pub mod tree_sitter;
