//! Cursor context analysis
//!
//! Line-oriented regex heuristics over the current document. None of this is
//! type inference: aliases propagate a single hop, in source order, and
//! anything the patterns do not recognise contributes nothing.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use super::document::{char_to_byte, Document, Position};
use crate::symbol_index::SymbolTable;

lazy_static! {
    /// `let x = new Foo.Bar(`
    static ref NEW_DECLARATION: Regex =
        Regex::new(r"\b(?:let|var|const)\s+(\w+)\s*=\s*new\s+([\w.]+)\s*\(").unwrap();
    /// `this.x = new Foo(`
    static ref NEW_THIS_PROPERTY: Regex =
        Regex::new(r"\bthis\.(\w+)\s*=\s*new\s+([\w.]+)\s*\(").unwrap();
    /// `x = y;` / `let d = this._node;`
    static ref ALIAS: Regex =
        Regex::new(r"(?:\b(?:let|var|const)\s+)?(\w+)\s*=\s*([\w.]+)\s*;").unwrap();
    static ref FUNCTION_PARAMS: Regex =
        Regex::new(r"\bfunction\s*\w*\s*\(([^)]+)\)").unwrap();
    static ref TYPED_PARAM: Regex = Regex::new(r"(\w+)\s*\??\s*:\s*([\w.]+)").unwrap();

    static ref DOTTED_PREFIX: Regex = Regex::new(r"([\w.]+)\.$").unwrap();

    static ref CLASS_EXPRESSION: Regex = Regex::new(concat!(
        r"^(?:(?:export\s+)?(?:const|let|var)\s+)?([\w.]+)\s*=\s*class\b",
        r"\s*(?:\w+\s*)?(?:extends\s+[\w.]+\s*)?\{",
    ))
    .unwrap();
    static ref CLASS_DECLARATION: Regex =
        Regex::new(r"^(?:export\s+(?:default\s+)?)?(?:abstract\s+)?class\s+([\w.]+)").unwrap();
}

/// Local variable → inferred type name, rebuilt per query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariableTypeMap {
    types: HashMap<String, String>,
}

impl VariableTypeMap {
    /// Scan the whole document top to bottom; later bindings overwrite earlier ones
    pub fn scan(document: &Document) -> Self {
        let mut map = Self::default();
        for line in document.lines() {
            map.observe_line(line);
        }
        map
    }

    /// Apply the bindings one line introduces
    pub fn observe_line(&mut self, line: &str) {
        for caps in NEW_DECLARATION.captures_iter(line) {
            self.insert(&caps[1], &caps[2]);
        }

        for caps in NEW_THIS_PROPERTY.captures_iter(line) {
            self.insert(&caps[1], &caps[2]);
            self.insert(&format!("this.{}", &caps[1]), &caps[2]);
        }

        if let Some(caps) = ALIAS.captures(line) {
            let source = &caps[2];
            let known = self
                .get(source)
                .or_else(|| source.strip_prefix("this.").and_then(|s| self.get(s)))
                .map(str::to_string);
            if let Some(ty) = known {
                self.insert(&caps[1], &ty);
            }
        }

        if let Some(caps) = FUNCTION_PARAMS.captures(line) {
            for param in caps[1].split(',') {
                if let Some(typed) = TYPED_PARAM.captures(param.trim()) {
                    self.insert(&typed[1], &typed[2]);
                }
            }
        }
    }

    pub fn insert(&mut self, name: &str, type_name: &str) {
        self.types.insert(name.to_string(), type_name.to_string());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.types.get(name).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

/// Type bound to the dotted prefix right before the cursor (`foo.bar.|`)
///
/// Checks local variable types first, then any symbol starting with the
/// prefix. Returns an empty string when nothing is known.
pub fn object_type_from_context(
    document: &Document,
    position: Position,
    table: &SymbolTable,
    types: &VariableTypeMap,
) -> String {
    let prefix = document.line_prefix(position);
    let Some(caps) = DOTTED_PREFIX.captures(prefix) else {
        return String::new();
    };
    let object_path = &caps[1];

    if let Some(ty) = types.get(object_path) {
        return ty.to_string();
    }

    match table.first_with_prefix(object_path) {
        Some(record) if record.symbol_name.contains(object_path) => object_path.to_string(),
        Some(record) => record.symbol_name.clone(),
        None => String::new(),
    }
}

/// Nearest class declaration or class-expression assignment at or above the cursor
pub fn current_class_name(document: &Document, position: Position) -> Option<String> {
    let last = position.line.min(document.line_count().saturating_sub(1));
    (0..=last).rev().find_map(|i| class_name_in_line(document.line(i)))
}

/// Class introduced by a line, if any
pub fn class_name_in_line(line: &str) -> Option<String> {
    let line = line.trim();
    CLASS_EXPRESSION
        .captures(line)
        .or_else(|| CLASS_DECLARATION.captures(line))
        .map(|caps| caps[1].to_string())
}

/// Argument count of the call whose `(` is at or after the cursor
///
/// Follows the parenthesis span across lines until it balances and counts
/// non-empty top-level arguments.
pub fn parameter_count_at(document: &Document, position: Position) -> usize {
    let first = document.line(position.line);
    let Some(open) = first[char_to_byte(first, position.character)..].find('(') else {
        return 0;
    };
    let mut offset = char_to_byte(first, position.character) + open;

    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut current = String::new();
    let mut count = 0;

    for line_idx in position.line..document.line_count() {
        let line = document.line(line_idx);
        for c in line[offset..].chars() {
            if let Some(q) = quote {
                if c == q {
                    quote = None;
                }
                if depth >= 1 {
                    current.push(c);
                }
                continue;
            }
            match c {
                '(' | '[' | '{' => {
                    depth += 1;
                    if depth == 1 {
                        continue;
                    }
                }
                ')' | ']' | '}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        if !current.trim().is_empty() {
                            count += 1;
                        }
                        return count;
                    }
                }
                ',' if depth == 1 => {
                    if !current.trim().is_empty() {
                        count += 1;
                    }
                    current.clear();
                    continue;
                }
                '"' | '\'' | '`' => quote = Some(c),
                _ => {}
            }
            current.push(c);
        }
        current.push(' ');
        offset = 0;
    }

    // unbalanced to end of file
    if !current.trim().is_empty() {
        count += 1;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_index::SymbolRecord;

    #[test]
    fn test_variable_types_from_new_and_aliases() {
        let doc = Document::new(
            "a.js",
            "let p = new game.Player(1);\nvar q = p;\nr = q;\nconst s = unknown;\n",
        );
        let types = VariableTypeMap::scan(&doc);

        assert_eq!(types.get("p"), Some("game.Player"));
        assert_eq!(types.get("q"), Some("game.Player"));
        assert_eq!(types.get("r"), Some("game.Player"));
        assert_eq!(types.get("s"), None);
    }

    #[test]
    fn test_alias_before_binding_is_not_resolved() {
        let doc = Document::new("a.js", "var q = p;\nlet p = new Foo();\n");
        let types = VariableTypeMap::scan(&doc);

        assert_eq!(types.get("p"), Some("Foo"));
        assert_eq!(types.get("q"), None);
    }

    #[test]
    fn test_this_properties_and_typed_params() {
        let doc = Document::new(
            "a.ts",
            concat!(
                "this._draw = new cc.DrawNode();\nlet d = this._draw;\n",
                "function f(a: Vec2, b, c?: cc.Node) {}\n",
            ),
        );
        let types = VariableTypeMap::scan(&doc);

        assert_eq!(types.get("_draw"), Some("cc.DrawNode"));
        assert_eq!(types.get("this._draw"), Some("cc.DrawNode"));
        assert_eq!(types.get("d"), Some("cc.DrawNode"));
        assert_eq!(types.get("a"), Some("Vec2"));
        assert_eq!(types.get("b"), None);
        assert_eq!(types.get("c"), Some("cc.Node"));
    }

    #[test]
    fn test_last_binding_wins() {
        let doc = Document::new("a.js", "let x = new A();\nlet x = new B();\n");
        assert_eq!(VariableTypeMap::scan(&doc).get("x"), Some("B"));
    }

    #[test]
    fn test_object_type_from_variables_then_table() {
        let doc = Document::new("a.js", "let p = new Player();\np.\ncc.util.\nzz.\n");
        let types = VariableTypeMap::scan(&doc);
        let table = SymbolTable::from_records(vec![SymbolRecord::new("u.js", "cc.util.clamp", 3)]);

        assert_eq!(
            object_type_from_context(&doc, Position::new(1, 2), &table, &types),
            "Player"
        );
        assert_eq!(
            object_type_from_context(&doc, Position::new(2, 8), &table, &types),
            "cc.util"
        );
        assert_eq!(
            object_type_from_context(&doc, Position::new(3, 3), &table, &types),
            ""
        );
        // no trailing dot
        assert_eq!(
            object_type_from_context(&doc, Position::new(0, 5), &table, &types),
            ""
        );
    }

    #[test]
    fn test_current_class_name() {
        let doc = Document::new(
            "a.js",
            concat!(
                "function free() {}\n",
                "class Foo extends Bar {\n  run() {\n    this.go();\n  }\n}\n",
                "game.Enemy = class extends game.Entity {\n  hit() {}\n}\n",
            ),
        );

        assert_eq!(current_class_name(&doc, Position::new(0, 0)), None);
        assert_eq!(
            current_class_name(&doc, Position::new(3, 6)).as_deref(),
            Some("Foo")
        );
        assert_eq!(
            current_class_name(&doc, Position::new(7, 2)).as_deref(),
            Some("game.Enemy")
        );
    }

    #[test]
    fn test_class_line_variants() {
        assert_eq!(class_name_in_line("export default class App {").as_deref(), Some("App"));
        assert_eq!(class_name_in_line("  const Widget = class {").as_deref(), Some("Widget"));
        assert_eq!(class_name_in_line("abstract class Shape {").as_deref(), Some("Shape"));
        assert_eq!(class_name_in_line("// class Nope"), None);
    }

    #[test]
    fn test_parameter_count() {
        let doc = Document::new(
            "a.js",
            concat!(
                "foo(a, b)\nfoo()\nfoo(bar(1, 2), [3, 4], { k: 5, j: 6 })\n",
                "foo(a,\n    b,\n    c)\nfoo(\"x,y\", 'z')\nfoo(a, )\nnoCall",
            ),
        );

        assert_eq!(parameter_count_at(&doc, Position::new(0, 0)), 2);
        assert_eq!(parameter_count_at(&doc, Position::new(1, 1)), 0);
        assert_eq!(parameter_count_at(&doc, Position::new(2, 0)), 3);
        assert_eq!(parameter_count_at(&doc, Position::new(3, 0)), 3);
        assert_eq!(parameter_count_at(&doc, Position::new(6, 0)), 2);
        assert_eq!(parameter_count_at(&doc, Position::new(7, 0)), 1);
        assert_eq!(parameter_count_at(&doc, Position::new(8, 0)), 0);
    }
}
