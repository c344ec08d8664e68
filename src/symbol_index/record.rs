//! Symbol records and their line-oriented index encoding
//!
//! One record per line, five comma-separated fields:
//! `filePath,symbolName,lineNum,paramCount,paramInfo`, where `paramInfo` is a
//! `;`-joined list of `name:type` tokens and `type` is the literal `unknown`
//! when no annotation was recovered.

use serde::{Deserialize, Serialize};

/// Placeholder written for parameters without a type annotation
pub const UNKNOWN_TYPE: &str = "unknown";

/// One declared parameter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamInfo {
    pub name: String,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub type_name: Option<String>,
}

impl ParamInfo {
    pub fn new(name: impl Into<String>, type_name: Option<String>) -> Self {
        Self {
            name: name.into(),
            type_name,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self::new(name, None)
    }

    /// `name: type` when typed, bare `name` otherwise
    pub fn display(&self) -> String {
        match &self.type_name {
            Some(ty) => format!("{}: {}", self.name, ty),
            None => self.name.clone(),
        }
    }
}

/// A discovered declaration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolRecord {
    /// Path relative to the workspace root, `/`-separated
    pub file_path: String,
    /// Dotted qualified name, e.g. `Foo.Bar.baz`
    pub symbol_name: String,
    /// 1-based source line
    pub line_num: u32,
    pub param_count: u32,
    pub param_info: Vec<ParamInfo>,
}

impl SymbolRecord {
    pub fn new(
        file_path: impl Into<String>,
        symbol_name: impl Into<String>,
        line_num: u32,
    ) -> Self {
        Self {
            file_path: file_path.into(),
            symbol_name: symbol_name.into(),
            line_num,
            param_count: 0,
            param_info: Vec::new(),
        }
    }

    pub fn with_params(mut self, params: Vec<ParamInfo>) -> Self {
        self.param_count = params.len() as u32;
        self.param_info = params;
        self
    }

    /// Last segment of the qualified name
    pub fn short_name(&self) -> &str {
        self.symbol_name
            .rsplit('.')
            .next()
            .unwrap_or(&self.symbol_name)
    }

    /// `(a: number, b)` rendering of the parameter list
    pub fn signature(&self) -> String {
        let params: Vec<String> = self.param_info.iter().map(ParamInfo::display).collect();
        format!("({})", params.join(", "))
    }

    /// Encode as one index line (no trailing newline)
    pub fn to_index_line(&self) -> String {
        let params = self
            .param_info
            .iter()
            .map(|p| {
                format!(
                    "{}:{}",
                    sanitize_param_name(&p.name),
                    p.type_name
                        .as_deref()
                        .map(sanitize_param_token)
                        .unwrap_or_else(|| UNKNOWN_TYPE.to_string())
                )
            })
            .collect::<Vec<_>>()
            .join(";");

        format!(
            "{},{},{},{},{}",
            strip_line_breaks(&self.file_path),
            strip_line_breaks(&self.symbol_name),
            self.line_num,
            self.param_count,
            params
        )
    }
}

/// Why an index line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineError {
    FieldCount(usize),
    LineNumber(String),
    ParamCount(String),
}

/// Decode one index line
///
/// The trailing `paramInfo` field may be absent. It is always the last field,
/// so commas inside type annotations (`Map<string, number>`) survive.
pub fn parse_index_line(line: &str) -> Result<SymbolRecord, LineError> {
    let fields: Vec<&str> = line.splitn(5, ',').collect();
    if fields.len() < 4 {
        return Err(LineError::FieldCount(fields.len()));
    }

    let line_num = fields[2]
        .trim()
        .parse::<u32>()
        .map_err(|_| LineError::LineNumber(fields[2].to_string()))?;
    let param_count = fields[3]
        .trim()
        .parse::<u32>()
        .map_err(|_| LineError::ParamCount(fields[3].to_string()))?;

    let param_info = fields
        .get(4)
        .map(|raw| parse_param_info(raw))
        .unwrap_or_default();

    Ok(SymbolRecord {
        file_path: fields[0].to_string(),
        symbol_name: fields[1].to_string(),
        line_num,
        param_count,
        param_info,
    })
}

fn parse_param_info(raw: &str) -> Vec<ParamInfo> {
    let raw = raw.trim_end_matches('\r');
    if raw.is_empty() {
        return Vec::new();
    }

    raw.split(';')
        .map(|token| match token.split_once(':') {
            Some((name, ty)) if ty == UNKNOWN_TYPE => ParamInfo::untyped(name),
            Some((name, ty)) => ParamInfo::new(name, Some(ty.to_string())),
            None => ParamInfo::untyped(token),
        })
        .collect()
}

fn strip_line_breaks(s: &str) -> String {
    s.chars().filter(|c| *c != '\n' && *c != '\r').collect()
}

/// `;` separates tokens, so object-type annotations like `{a: 1; b: 2}` get
/// their semicolons turned into commas.
fn sanitize_param_token(s: &str) -> String {
    strip_line_breaks(s).replace(';', ",")
}

/// Names are split from their type at the first `:`, so destructuring
/// renames (`{ a: b }`) are written as `{ a=b }`.
fn sanitize_param_name(s: &str) -> String {
    sanitize_param_token(s).replace(':', "=")
}
