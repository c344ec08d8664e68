//! Call-site search
//!
//! A plain text scan over workspace files for `namespace.function(` calls.
//! It does not consult the symbol table. Instances created with `new` are
//! tracked per file so `obj.function(` counts when `obj` was built from the
//! namespace, and `this.function(` counts only in the active file.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::context::class_name_in_line;
use super::document::{byte_to_char, is_word_char, Document, Location, Position};

lazy_static! {
    static ref NAMESPACE_OPEN: Regex =
        Regex::new(r"([\w$]+(?:\.[\w$]+)*)\s*=\s*\{").unwrap();
    /// Object literal closed on the same line: `ns = { a: 1 };`
    static ref CLOSES_SAME_LINE: Regex = Regex::new(r"^[^}]*\};").unwrap();
    static ref INSTANCE: Regex =
        Regex::new(r"\b(?:let|var|const)\s+([\w$]+)\s*=\s*new\s+([\w$.]+)\s*\(").unwrap();
    static ref THIS_INSTANCE: Regex =
        Regex::new(r"\bthis\.([\w$]+)\s*=\s*new\s+([\w$.]+)\s*\(").unwrap();
    static ref INSTANCE_ALIAS: Regex =
        Regex::new(r"(?:\b(?:let|var|const)\s+)?([\w$]+)\s*=\s*([\w$]+)\s*;").unwrap();
}

const METHOD_MODIFIERS: &str = "(?:static|async|public|private|protected)";
/// Parameter list, optional return type and the opening brace
const METHOD_HEAD: &str = r"\s*\([^)]*\)\s*(?::\s*[^{]+)?\{";

/// Namespace-scoped function a reference search is about
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceTarget {
    pub namespace: String,
    pub function_name: String,
}

impl ReferenceTarget {
    pub fn new(namespace: impl Into<String>, function_name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            function_name: function_name.into(),
        }
    }

    pub fn title(&self) -> String {
        format!("{}.{}", self.namespace, self.function_name)
    }
}

/// One call site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub location: Location,
    /// Trimmed source line
    pub preview: String,
}

/// Function declared on the cursor line together with its enclosing namespace
///
/// Tracks a brace-balanced stack of `ns = {` and class openings while walking
/// the document down to the cursor. Returns `None` when the cursor line does
/// not declare the word under the cursor or no namespace encloses it.
pub fn find_declaration_at_cursor(
    document: &Document,
    position: Position,
) -> Option<ReferenceTarget> {
    let range = document.word_range_at(position)?;
    let word = document.text_in(range);
    let escaped = regex::escape(&word);

    // `\b` does not treat `$` as part of a word
    let patterns = [
        format!(r"(?:^|[^\w$]){escaped}\s*:\s*(?:async\s+)?function\b\s*\*?\s*\("),
        format!(r"^(?:{METHOD_MODIFIERS}\s+)*\*?{escaped}{METHOD_HEAD}"),
        format!(r"(?:^|[^\w$]){escaped}\s*[:=]\s*(?:async\s*)?(?:\([^)]*\)|[\w$]+)\s*=>"),
    ];
    let declarations: Vec<Regex> = patterns.iter().filter_map(|p| Regex::new(p).ok()).collect();

    // Named entries are namespaces or classes, `None` is a plain block
    let mut stack: Vec<Option<String>> = Vec::new();

    for (i, raw) in document.lines().iter().enumerate().take(position.line + 1) {
        let line = raw.trim();

        let mut opens = line.matches('{').count();
        if let Some(name) = namespace_opened(line).or_else(|| class_opened(line)) {
            stack.push(Some(name));
            opens = opens.saturating_sub(1);
        }
        stack.extend(std::iter::repeat(None).take(opens));
        for _ in 0..line.matches('}').count() {
            stack.pop();
        }

        if i == position.line && declarations.iter().any(|re| re.is_match(line)) {
            // a declaration line that also closes its block still belongs to it
            let namespace = stack
                .iter()
                .rev()
                .flatten()
                .next()
                .cloned()
                .or_else(|| namespace_opened(line).or_else(|| class_opened(line)))?;
            return Some(ReferenceTarget::new(namespace, word));
        }
    }
    None
}

fn namespace_opened(line: &str) -> Option<String> {
    NAMESPACE_OPEN
        .captures_iter(line)
        .find(|caps| {
            let end = caps.get(0).map(|m| m.end()).unwrap_or(line.len());
            !CLOSES_SAME_LINE.is_match(&line[end..])
        })
        .map(|caps| caps[1].to_string())
}

fn class_opened(line: &str) -> Option<String> {
    if !line.contains('{') {
        return None;
    }
    class_name_in_line(line)
}

/// File that has focus when the search starts
pub struct ActiveScope<'a> {
    pub document: &'a Document,
    /// Class enclosing the cursor
    pub class_name: Option<String>,
}

/// Workspace scan for call sites
pub struct ReferenceScanner<'a> {
    root: &'a Path,
    files: &'a [String],
}

impl<'a> ReferenceScanner<'a> {
    pub fn new(root: &'a Path, files: &'a [String]) -> Self {
        Self { root, files }
    }

    pub fn find_references(
        &self,
        target: &ReferenceTarget,
        active: Option<&ActiveScope>,
    ) -> Vec<Reference> {
        self.find_references_with_progress(target, active, |_, _| {})
    }

    /// Scan every file in order, reporting `(completed, total)` after each
    pub fn find_references_with_progress(
        &self,
        target: &ReferenceTarget,
        active: Option<&ActiveScope>,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Vec<Reference> {
        let Some(patterns) = CallPatterns::new(target) else {
            return Vec::new();
        };

        let mut references = Vec::new();
        for (i, file) in self.files.iter().enumerate() {
            let active_here = active.filter(|a| a.document.path() == file.as_str());

            let loaded;
            let document = match active_here {
                Some(scope) => scope.document,
                None => match Document::open(self.root, file) {
                    Ok(doc) => {
                        loaded = doc;
                        &loaded
                    }
                    Err(e) => {
                        debug!("[References] Skipping {}: {}", file, e);
                        on_progress(i + 1, self.files.len());
                        continue;
                    }
                },
            };

            let this_allowed = active_here
                .and_then(|a| a.class_name.as_deref())
                .is_some_and(|class| class == target.namespace);
            references.extend(patterns.scan(document, this_allowed, &target.namespace));
            on_progress(i + 1, self.files.len());
        }

        debug!(
            "[References] {} references to {}",
            references.len(),
            target.title()
        );
        references
    }
}

struct CallPatterns {
    direct: Regex,
    this_call: Regex,
    instance: Regex,
}

impl CallPatterns {
    fn new(target: &ReferenceTarget) -> Option<Self> {
        let ns = regex::escape(&target.namespace);
        let func = regex::escape(&target.function_name);
        Some(Self {
            direct: Regex::new(&format!(r"{ns}\.{func}\s*\(")).ok()?,
            this_call: Regex::new(&format!(r"this\.{func}\s*\(")).ok()?,
            instance: Regex::new(&format!(r"([\w$]+)\.{func}\s*\(")).ok()?,
        })
    }

    fn scan(&self, document: &Document, this_allowed: bool, namespace: &str) -> Vec<Reference> {
        let mut instances: HashMap<String, String> = HashMap::new();
        let mut seen: HashSet<(usize, usize)> = HashSet::new();
        let mut hits = Vec::new();

        for (line_idx, line) in document.lines().iter().enumerate() {
            observe_instances(line, &mut instances);

            let mut starts: Vec<usize> = self
                .direct
                .find_iter(line)
                .map(|m| m.start())
                .filter(|&start| starts_word(line, start))
                .collect();
            if this_allowed {
                starts.extend(
                    self.this_call
                        .find_iter(line)
                        .map(|m| m.start())
                        .filter(|&start| starts_word(line, start)),
                );
            }
            starts.extend(
                self.instance
                    .captures_iter(line)
                    .filter_map(|caps| caps.get(1))
                    .filter(|var| {
                        instances
                            .get(var.as_str())
                            .is_some_and(|ty| ty == namespace)
                    })
                    .map(|var| var.start()),
            );
            starts.sort_unstable();

            for start in starts {
                let character = byte_to_char(line, start);
                if seen.insert((line_idx, character)) {
                    hits.push(Reference {
                        location: Location {
                            file_path: document.path().to_string(),
                            line: line_idx,
                            character,
                        },
                        preview: line.trim().to_string(),
                    });
                }
            }
        }
        hits
    }
}

/// No identifier character right before `start`
fn starts_word(line: &str, start: usize) -> bool {
    !line[..start].chars().next_back().is_some_and(is_word_char)
}

/// Update the per-file instance map with the bindings on one line
fn observe_instances(line: &str, instances: &mut HashMap<String, String>) {
    for caps in INSTANCE.captures_iter(line) {
        instances.insert(caps[1].to_string(), caps[2].to_string());
    }
    for caps in THIS_INSTANCE.captures_iter(line) {
        instances.insert(caps[1].to_string(), caps[2].to_string());
    }
    if let Some(caps) = INSTANCE_ALIAS.captures(line) {
        if let Some(ty) = instances.get(&caps[2]).cloned() {
            instances.insert(caps[1].to_string(), ty);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_declaration_in_object_namespace() {
        let doc = Document::new(
            "a.js",
            concat!(
                "var ns = ns || {};\nns.util = {\n",
                "    clamp: function (v, lo, hi) {\n        return v;\n    },\n",
                "    other: 1\n};\n",
            ),
        );

        let target = find_declaration_at_cursor(&doc, Position::new(2, 6)).unwrap();
        assert_eq!(target, ReferenceTarget::new("ns.util", "clamp"));

        // not a declaration line
        assert!(find_declaration_at_cursor(&doc, Position::new(5, 5)).is_none());
    }

    #[test]
    fn test_declaration_in_class() {
        let doc = Document::new(
            "a.js",
            concat!(
                "game.Player = class extends game.Entity {\n",
                "    jump(height) {\n    }\n    land = () => {};\n}\n",
            ),
        );

        assert_eq!(
            find_declaration_at_cursor(&doc, Position::new(1, 6)),
            Some(ReferenceTarget::new("game.Player", "jump"))
        );
        assert_eq!(
            find_declaration_at_cursor(&doc, Position::new(3, 6)),
            Some(ReferenceTarget::new("game.Player", "land"))
        );
    }

    #[test]
    fn test_declaration_after_closed_namespace() {
        let doc = Document::new(
            "a.js",
            "a = {\n  f: function () {}\n};\nfree: function () {}\n",
        );
        assert!(find_declaration_at_cursor(&doc, Position::new(3, 1)).is_none());
        assert_eq!(
            find_declaration_at_cursor(&doc, Position::new(1, 2)),
            Some(ReferenceTarget::new("a", "f"))
        );
    }

    #[test]
    fn test_single_line_object_is_not_a_namespace() {
        assert_eq!(namespace_opened("cfg = { a: 1 };"), None);
        assert_eq!(namespace_opened("x = {}; ns.deep = {").as_deref(), Some("ns.deep"));
        assert_eq!(namespace_opened("ns.deep = {").as_deref(), Some("ns.deep"));
    }

    #[test]
    fn test_scan_direct_instance_and_this_calls() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("a.js"),
            "Foo.run(1);\nlet f = new Foo();\nlet g = f;\ng.run();\nbar.run();\nthis.run();\n",
        )
        .unwrap();
        fs::write(dir.path().join("b.js"), "  Foo.run (2); Foo.run(3);\n").unwrap();
        let files = vec!["a.js".to_string(), "b.js".to_string(), "gone.js".to_string()];

        let scanner = ReferenceScanner::new(dir.path(), &files);
        let target = ReferenceTarget::new("Foo", "run");
        let mut progress = Vec::new();
        let refs = scanner.find_references_with_progress(&target, None, |done, total| {
            progress.push((done, total))
        });

        let spots: Vec<(&str, usize, usize)> = refs
            .iter()
            .map(|r| (r.location.file_path.as_str(), r.location.line, r.location.character))
            .collect();
        assert_eq!(
            spots,
            vec![("a.js", 0, 0), ("a.js", 3, 0), ("b.js", 0, 2), ("b.js", 0, 15)]
        );
        assert_eq!(refs[1].preview, "g.run();");
        assert_eq!(progress.last(), Some(&(3, 3)));
    }

    #[test]
    fn test_this_calls_only_in_active_class_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.js"), "this.run();\n").unwrap();
        let files = vec!["a.js".to_string(), "b.js".to_string()];

        // active buffer differs from disk
        let active_doc = Document::new("a.js", "class Foo {\n  go() { this.run(); }\n}\n");
        let active = ActiveScope {
            document: &active_doc,
            class_name: Some("Foo".to_string()),
        };

        let scanner = ReferenceScanner::new(dir.path(), &files);
        let refs = scanner.find_references(&ReferenceTarget::new("Foo", "run"), Some(&active));

        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].location.file_path, "a.js");
        assert_eq!(refs[0].location.line, 1);

        let other_class = ActiveScope {
            document: &active_doc,
            class_name: Some("Bar".to_string()),
        };
        assert!(scanner
            .find_references(&ReferenceTarget::new("Foo", "run"), Some(&other_class))
            .is_empty());
    }

    #[test]
    fn test_instance_binding_applies_from_its_line_on() {
        let doc = Document::new("a.js", "p.run();\nvar p = new Foo();\np.run();\n");
        let patterns = CallPatterns::new(&ReferenceTarget::new("Foo", "run")).unwrap();

        let hits = patterns.scan(&doc, false, "Foo");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].location.line, 2);
    }

    #[test]
    fn test_dollar_identifiers() {
        let doc = Document::new(
            "a.js",
            "var ns = {\n    $apply: function (fn) {\n    },\n};\n",
        );
        assert_eq!(
            find_declaration_at_cursor(&doc, Position::new(1, 6)),
            Some(ReferenceTarget::new("ns", "$apply"))
        );

        let doc = Document::new(
            "b.js",
            "$ns.$fn(1);\nx$ns.$fn(2);\nvar $o = new $ns();\n$o.$fn();\n$this.$fn();\n",
        );
        let patterns = CallPatterns::new(&ReferenceTarget::new("$ns", "$fn")).unwrap();
        let spots: Vec<(usize, usize)> = patterns
            .scan(&doc, true, "$ns")
            .iter()
            .map(|r| (r.location.line, r.location.character))
            .collect();
        assert_eq!(spots, vec![(0, 0), (3, 0)]);
    }

    #[test]
    fn test_back_to_back_calls_on_one_line() {
        let doc = Document::new("a.js", "Foo.run(Foo.run(1));
");
        let patterns = CallPatterns::new(&ReferenceTarget::new("Foo", "run")).unwrap();

        let hits = patterns.scan(&doc, false, "Foo");
        let columns: Vec<usize> = hits.iter().map(|r| r.location.character).collect();
        assert_eq!(columns, vec![0, 8]);
    }
}
