//! Definition candidate ranking
//!
//! Given the identifier under the cursor, every record in the table is
//! classified as an exact match, a type match without parameter agreement, or
//! a loose name match. The groups are then ordered by locality (`this.`
//! references) or by the inferred object type (everything else), and the
//! result says whether a single candidate is strong enough to jump to.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::debug;

use super::context::{
    current_class_name, object_type_from_context, parameter_count_at, VariableTypeMap,
};
use super::document::{byte_to_char, Document, Position};
use crate::symbol_index::{SymbolRecord, SymbolTable};

lazy_static! {
    static ref RECEIVER: Regex = Regex::new(r"(\w+)\.\s*$").unwrap();
    static ref DOTTED_EXPRESSION: Regex =
        Regex::new(r"[A-Za-z_$][\w$]*(?:\.[A-Za-z_$][\w$]*)+").unwrap();
}

/// Facts about the cursor site that ranking needs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveContext {
    pub word: String,
    pub current_file: String,
    /// Written as `this.word`
    pub is_this_reference: bool,
    /// Dotted expression on the line ending at `word`, e.g. `cc.util.clamp`
    pub full_word: Option<String>,
    /// Arguments at the call site
    pub param_count: usize,
    pub current_class: Option<String>,
    /// Receiver type when known, otherwise the enclosing class for bare words
    pub inferred_type: Option<String>,
    /// Type of the dotted prefix before the word; empty when unknown
    pub object_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MatchKind {
    Exact,
    /// `<inferredType>.<word>` with a different parameter count
    Typed,
    Other,
}

/// Ranked candidates for one lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub word: String,
    pub param_count: usize,
    pub matches: Vec<SymbolRecord>,
    /// Index into `matches` of the candidate to jump to directly
    pub target: Option<usize>,
}

impl Resolution {
    pub fn auto_navigate(&self) -> bool {
        self.target.is_some()
    }

    pub fn target_record(&self) -> Option<&SymbolRecord> {
        self.target.and_then(|i| self.matches.get(i))
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }
}

/// Ranks definition candidates against the symbol table
#[derive(Debug, Clone, Default)]
pub struct Resolver {
    well_known_namespaces: Vec<String>,
}

impl Resolver {
    pub fn new(well_known_namespaces: Vec<String>) -> Self {
        Self {
            well_known_namespaces,
        }
    }

    /// Analyse the cursor site; `None` when there is no identifier there
    pub fn context_at(
        &self,
        document: &Document,
        position: Position,
        table: &SymbolTable,
    ) -> Option<ResolveContext> {
        let range = document.word_range_at(position)?;
        let word = document.text_in(range);
        let word_start = Position::new(position.line, range.start);

        let before = document.line_prefix(word_start);
        let is_this_reference = before.ends_with("this.");
        let receiver = RECEIVER.captures(before).map(|c| c[1].to_string());

        let current_class = current_class_name(document, position);
        let types = VariableTypeMap::scan(document);
        let inferred_type = match &receiver {
            Some(name) => types.get(name).map(str::to_string),
            None => current_class.clone(),
        };

        Some(ResolveContext {
            full_word: full_dotted_word(document.line(position.line), range.start, range.end),
            param_count: parameter_count_at(document, position),
            object_type: object_type_from_context(document, word_start, table, &types),
            current_file: document.path().to_string(),
            word,
            is_this_reference,
            current_class,
            inferred_type,
        })
    }

    /// Resolve the identifier at the cursor; `None` when there is none
    pub fn resolve(
        &self,
        document: &Document,
        position: Position,
        table: &SymbolTable,
    ) -> Option<Resolution> {
        let ctx = self.context_at(document, position, table)?;
        Some(self.rank(&ctx, table))
    }

    /// Classify and order every record for an analysed cursor site
    pub fn rank(&self, ctx: &ResolveContext, table: &SymbolTable) -> Resolution {
        let mut exact = Vec::new();
        let mut typed = Vec::new();
        let mut other = Vec::new();

        for record in table.iter() {
            match self.classify(ctx, record) {
                Some(MatchKind::Exact) => exact.push(record),
                Some(MatchKind::Typed) => typed.push(record),
                Some(MatchKind::Other) => other.push(record),
                None => {}
            }
        }

        // `this.` sites prefer the current file, others the inferred object type
        let preferred = |r: &SymbolRecord| {
            if ctx.is_this_reference {
                r.file_path == ctx.current_file
            } else {
                r.symbol_name.contains(ctx.object_type.as_str())
            }
        };

        let mut matches: Vec<SymbolRecord> = Vec::new();
        for wanted in [true, false] {
            for group in [&exact, &typed, &other] {
                matches.extend(
                    group
                        .iter()
                        .filter(|r| preferred(**r) == wanted)
                        .map(|r| (*r).clone()),
                );
            }
        }

        let target = if matches.len() == 1 {
            Some(0)
        } else if ctx.is_this_reference && exact.iter().filter(|r| preferred(**r)).count() == 1 {
            // current-file exact matches lead the list
            Some(0)
        } else if exact.len() == 1 {
            matches.iter().position(|r| r == exact[0])
        } else {
            None
        };

        debug!(
            "[Resolver] {} (params {}): {} exact, {} typed, {} other, target {:?}",
            ctx.word,
            ctx.param_count,
            exact.len(),
            typed.len(),
            other.len(),
            target
        );

        Resolution {
            word: ctx.word.clone(),
            param_count: ctx.param_count,
            matches,
            target,
        }
    }

    fn classify(&self, ctx: &ResolveContext, record: &SymbolRecord) -> Option<MatchKind> {
        let name = record.symbol_name.as_str();
        if name.is_empty() {
            return None;
        }
        let word = ctx.word.as_str();
        let params_agree = record.param_count as usize == ctx.param_count;

        if ctx.is_this_reference {
            if let Some(class) = &ctx.current_class {
                if is_member(name, class, word) {
                    return Some(MatchKind::Exact);
                }
            }
        }
        if name == word && params_agree {
            return Some(MatchKind::Exact);
        }
        if ctx.full_word.as_deref() == Some(name) {
            return Some(MatchKind::Exact);
        }
        if record.param_count == 0
            && self
                .well_known_namespaces
                .iter()
                .any(|ns| is_member(name, ns, word))
        {
            return Some(MatchKind::Exact);
        }
        if let Some(ty) = &ctx.inferred_type {
            if is_member(name, ty, word) {
                return Some(if params_agree {
                    MatchKind::Exact
                } else {
                    MatchKind::Typed
                });
            }
        }
        let dotted_suffix = name
            .strip_suffix(word)
            .is_some_and(|owner| owner.ends_with('.'));
        if name == word || dotted_suffix {
            return Some(MatchKind::Other);
        }
        None
    }
}

/// `name == "<owner>.<member>"` without allocating
fn is_member(name: &str, owner: &str, member: &str) -> bool {
    name.len() == owner.len() + 1 + member.len()
        && name.starts_with(owner)
        && name.ends_with(member)
        && name.as_bytes()[owner.len()] == b'.'
}

/// Dotted expression covering `[start, end)` (characters), cut at `end`
fn full_dotted_word(line: &str, start: usize, end: usize) -> Option<String> {
    DOTTED_EXPRESSION.find_iter(line).find_map(|m| {
        let m_start = byte_to_char(line, m.start());
        let m_end = byte_to_char(line, m.end());
        if m_start < start && m_end >= end {
            Some(line.chars().skip(m_start).take(end - m_start).collect())
        } else {
            None
        }
    })
}
