//! Signature help inside a call's argument list

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::context::VariableTypeMap;
use super::document::{Document, Position};
use crate::symbol_index::{ParamInfo, SymbolTable};

lazy_static! {
    /// `receiver.method(args-so-far`
    static ref OPEN_CALL: Regex = Regex::new(r"(\w+(?:\.\w+)*)\.(\w+)\s*\((.*)$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignatureHelp {
    /// `method(a: number, b)`
    pub label: String,
    pub parameters: Vec<String>,
    /// `None` when the function takes no parameters
    pub active_parameter: Option<usize>,
}

pub fn signature_help(
    document: &Document,
    position: Position,
    table: &SymbolTable,
) -> Option<SignatureHelp> {
    let prefix = document.line_prefix(position);
    let caps = OPEN_CALL.captures(prefix)?;
    let receiver = &caps[1];
    let method = &caps[2];
    let typed_so_far = &caps[3];

    let types = VariableTypeMap::scan(document);
    let owner = types.get(receiver).unwrap_or(receiver);
    let full_name = format!("{}.{}", owner, method);
    let record = table.find_by_name(&full_name)?;

    let parameters: Vec<String> = record.param_info.iter().map(ParamInfo::display).collect();
    let commas = typed_so_far.matches(',').count();
    let active_parameter = parameters.len().checked_sub(1).map(|last| commas.min(last));

    Some(SignatureHelp {
        label: format!("{}({})", method, parameters.join(", ")),
        parameters,
        active_parameter,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol_index::SymbolRecord;

    fn table() -> SymbolTable {
        SymbolTable::from_records(vec![
            SymbolRecord::new("v.ts", "Vec2.add", 3).with_params(vec![
                ParamInfo::new("x", Some("number".into())),
                ParamInfo::untyped("y"),
            ]),
            SymbolRecord::new("l.js", "log.flush", 1),
        ])
    }

    #[test]
    fn test_typed_receiver_and_active_parameter() {
        let doc = Document::new("a.js", "let v = new Vec2();\nv.add(1, 2, 3");

        let help = signature_help(&doc, Position::new(1, 6), &table()).unwrap();
        assert_eq!(help.label, "add(x: number, y)");
        assert_eq!(help.active_parameter, Some(0));

        let help = signature_help(&doc, Position::new(1, 9), &table()).unwrap();
        assert_eq!(help.active_parameter, Some(1));

        // clamped to the last parameter
        let help = signature_help(&doc, Position::new(1, 12), &table()).unwrap();
        assert_eq!(help.active_parameter, Some(1));
    }

    #[test]
    fn test_receiver_used_as_namespace() {
        let doc = Document::new("a.js", "log.flush(");
        let help = signature_help(&doc, Position::new(0, 10), &table()).unwrap();

        assert_eq!(help.label, "flush()");
        assert_eq!(help.active_parameter, None);
    }

    #[test]
    fn test_no_help_outside_known_calls() {
        let doc = Document::new("a.js", "unknown.call(\nplain");
        assert!(signature_help(&doc, Position::new(0, 13), &table()).is_none());
        assert!(signature_help(&doc, Position::new(1, 5), &table()).is_none());
    }
}
