//! Member completion after a `.`

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use super::context::{object_type_from_context, VariableTypeMap};
use super::document::{Document, Position};
use crate::symbol_index::{SymbolRecord, SymbolTable};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompletionKind {
    Method,
    /// Has members of its own
    Namespace,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionItem {
    pub label: String,
    pub kind: CompletionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

/// Members of the object before the cursor
///
/// Direct members come first. When the type has none, every record below it
/// is offered with its remaining dotted path as the label.
pub fn completions(
    document: &Document,
    position: Position,
    table: &SymbolTable,
) -> Vec<CompletionItem> {
    if !document.line_prefix(position).ends_with('.') {
        return Vec::new();
    }

    let types = VariableTypeMap::scan(document);
    let object_type = object_type_from_context(document, position, table, &types);
    if object_type.is_empty() {
        return Vec::new();
    }
    let type_prefix = format!("{}.", object_type);

    let below: Vec<&SymbolRecord> = table
        .iter()
        .filter(|r| r.symbol_name.starts_with(&type_prefix))
        .collect();

    let parents: HashSet<&str> = below
        .iter()
        .copied()
        .filter_map(|r| r.symbol_name.rsplit_once('.').map(|(parent, _)| parent))
        .collect();

    let direct: Vec<&SymbolRecord> = below
        .iter()
        .copied()
        .filter(|r| !r.symbol_name[type_prefix.len()..].contains('.'))
        .collect();
    let candidates = if direct.is_empty() { below } else { direct };

    let mut seen = HashSet::new();
    candidates
        .into_iter()
        .filter_map(|record| {
            let label = &record.symbol_name[type_prefix.len()..];
            if label.is_empty() || !seen.insert(label.to_string()) {
                return None;
            }
            let kind = if parents.contains(record.symbol_name.as_str()) {
                CompletionKind::Namespace
            } else {
                CompletionKind::Method
            };
            Some(CompletionItem {
                label: label.to_string(),
                kind,
                detail: (!record.param_info.is_empty()).then(|| record.signature()),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_index::ParamInfo;

    fn table() -> SymbolTable {
        SymbolTable::from_records(vec![
            SymbolRecord::new("p.js", "Player", 1),
            SymbolRecord::new("p.js", "Player.jump", 2).with_params(vec![
                ParamInfo::new("height", Some("number".into())),
                ParamInfo::untyped("force"),
            ]),
            SymbolRecord::new("p.js", "Player.stats", 5),
            SymbolRecord::new("p.js", "Player.stats.reset", 6),
            SymbolRecord::new("q.js", "Player.jump", 9),
            SymbolRecord::new("u.js", "cc.util.math.clamp", 3),
        ])
    }

    #[test]
    fn test_direct_members_of_typed_variable() {
        let doc = Document::new("a.js", "let p = new Player();\np.");
        let items = completions(&doc, Position::new(1, 2), &table());

        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["jump", "stats"]);
        assert_eq!(items[0].detail.as_deref(), Some("(height: number, force)"));
        assert_eq!(items[0].kind, CompletionKind::Method);
        assert_eq!(items[1].kind, CompletionKind::Namespace);
    }

    #[test]
    fn test_falls_back_to_nested_members() {
        let doc = Document::new("a.js", "cc.util.");
        let items = completions(&doc, Position::new(0, 8), &table());

        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["math.clamp"]);
    }

    #[test]
    fn test_nothing_without_trailing_dot_or_type() {
        let doc = Document::new("a.js", "Player\nzz.");
        assert!(completions(&doc, Position::new(0, 6), &table()).is_empty());
        assert!(completions(&doc, Position::new(1, 3), &table()).is_empty());
    }
}
