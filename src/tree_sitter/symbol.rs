//! Symbol extraction from parsed AST trees
//!
//! Walks a tree-sitter tree and flattens every way a script can declare a
//! callable or a namespace into one dotted qualified-name space:
//!
//! - class declarations and class expressions (with their members)
//! - object literals bound to variables (`var ns = { f: function () {} }`)
//! - dotted assignments (`a.b.c = ...`)
//! - function declarations and functions assigned to plain variables
//!
//! The walk carries a lexical scope chain that grows when it descends into a
//! class body or a TypeScript namespace.

use std::collections::HashSet;

use tree_sitter::{Node, Tree};

use crate::symbol_index::{ParamInfo, SymbolRecord};

/// Name used for classes that have neither an explicit name nor an assignment target
pub const ANONYMOUS: &str = "<anonymous>";

/// How a declaration was written in source
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeclarationForm {
    /// `class Foo {}`, or a class expression carrying its own name
    NamedClass(String),
    /// `Foo.Bar = class {}` / `const Foo = class {}` (target path)
    AssignedClassExpr(Vec<String>),
    /// Member of an object literal: object path followed by the property name
    ObjectLiteralMember(Vec<String>),
    /// `a.b.c = ...` (full dotted target)
    DottedAssignment(Vec<String>),
    /// Property, method or constructor inside a class body
    ClassMember(String),
    /// Function declaration, or a function/arrow bound to a plain variable
    Function(String),
}

impl DeclarationForm {
    /// Path segments this form contributes below its scope
    pub fn segments(&self) -> Vec<&str> {
        match self {
            DeclarationForm::NamedClass(name)
            | DeclarationForm::ClassMember(name)
            | DeclarationForm::Function(name) => name.split('.').collect(),
            DeclarationForm::AssignedClassExpr(path)
            | DeclarationForm::ObjectLiteralMember(path)
            | DeclarationForm::DottedAssignment(path) => path.iter().map(String::as_str).collect(),
        }
    }
}

/// A declaration found by the walk, before it is turned into a record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    /// Lexical scope the form is relative to
    pub scope: Vec<String>,
    pub form: DeclarationForm,
    /// 1-based line
    pub line: u32,
    /// `None` for classes, properties and plain assignments
    pub params: Option<Vec<ParamInfo>>,
}

impl Declaration {
    pub fn qualified_name(&self) -> String {
        self.scope
            .iter()
            .map(String::as_str)
            .chain(self.form.segments())
            .collect::<Vec<_>>()
            .join(".")
    }

    fn into_record(self, file_path: &str) -> SymbolRecord {
        let record = SymbolRecord::new(file_path, self.qualified_name(), self.line);
        match self.params {
            Some(params) => record.with_params(params),
            None => record,
        }
    }
}

/// Symbol extractor for one source file
pub struct SymbolExtractor<'a> {
    source: &'a [u8],
    declarations: Vec<Declaration>,
    recorded_properties: HashSet<String>,
    recorded_variables: HashSet<String>,
}

impl<'a> SymbolExtractor<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source: source.as_bytes(),
            declarations: Vec::new(),
            recorded_properties: HashSet::new(),
            recorded_variables: HashSet::new(),
        }
    }

    /// Walk the tree and return declarations in discovery order
    pub fn declarations(mut self, tree: &Tree) -> Vec<Declaration> {
        self.visit(tree.root_node(), &[]);
        self.declarations
    }

    /// Walk the tree and return records, dropping duplicate `(name, line)` keys
    pub fn extract(self, tree: &Tree, file_path: &str) -> Vec<SymbolRecord> {
        let mut seen: HashSet<(String, u32)> = HashSet::new();
        self.declarations(tree)
            .into_iter()
            // the index line format has no escape for `,`
            .filter(|decl| {
                let name = decl.qualified_name();
                !name.contains(',') && seen.insert((name, decl.line))
            })
            .map(|decl| decl.into_record(file_path))
            .collect()
    }

    fn visit(&mut self, node: Node, scope: &[String]) {
        if !node.is_named() {
            return;
        }

        let mut inner_scope: Option<Vec<String>> = None;
        match node.kind() {
            "class_declaration" | "abstract_class_declaration" | "class" => {
                inner_scope = Some(self.visit_class(node, scope));
            }
            "internal_module" | "module" => {
                inner_scope = self.namespace_scope(node, scope);
            }
            "lexical_declaration" | "variable_declaration" => {
                self.visit_variable_statement(node, scope);
            }
            "expression_statement" => {
                self.visit_expression_statement(node, scope);
            }
            "function_declaration" | "generator_function_declaration" => {
                self.visit_function_declaration(node, scope);
            }
            kind if is_function_like(kind) => {
                self.visit_assigned_function(node, scope);
            }
            _ => {}
        }

        let scope = inner_scope.as_deref().unwrap_or(scope);
        for child in children(node) {
            self.visit(child, scope);
        }
    }

    /// Record the class and its members, returning the scope for its body
    fn visit_class(&mut self, node: Node, scope: &[String]) -> Vec<String> {
        let (base, form) = self.class_form(node, scope);
        let class_scope: Vec<String> = base
            .iter()
            .cloned()
            .chain(form.segments().into_iter().map(str::to_string))
            .collect();

        self.declarations.push(Declaration {
            scope: base,
            form,
            line: line_of(node),
            params: None,
        });

        let Some(body) = node.child_by_field_name("body") else {
            return class_scope;
        };

        for member in named_children(body) {
            match member.kind() {
                "public_field_definition" | "field_definition" => {
                    let Some(name_node) = member
                        .child_by_field_name("name")
                        .or_else(|| member.child_by_field_name("property"))
                    else {
                        continue;
                    };
                    let name = self.text(name_node).to_string();
                    let full = format!("{}.{}", class_scope.join("."), name);
                    if self.recorded_properties.insert(full) {
                        self.declarations.push(Declaration {
                            scope: class_scope.clone(),
                            form: DeclarationForm::ClassMember(name),
                            line: line_of(member),
                            params: None,
                        });
                    }
                }
                "method_definition" | "method_signature" | "abstract_method_signature" => {
                    let Some(name_node) = member.child_by_field_name("name") else {
                        continue;
                    };
                    let name = self.text(name_node).to_string();
                    let params = self.parameters(member);
                    self.declarations.push(Declaration {
                        scope: class_scope.clone(),
                        form: DeclarationForm::ClassMember(name),
                        line: line_of(member),
                        params: Some(params),
                    });
                }
                _ => {}
            }
        }

        class_scope
    }

    /// Explicit name first, then the assignment the class expression sits in
    fn class_form(&self, node: Node, scope: &[String]) -> (Vec<String>, DeclarationForm) {
        if let Some(name) = node.child_by_field_name("name") {
            return (
                scope.to_vec(),
                DeclarationForm::NamedClass(self.text(name).to_string()),
            );
        }

        if let Some(parent) = node.parent() {
            match parent.kind() {
                "assignment_expression" if parent.child_by_field_name("right") == Some(node) => {
                    if let Some(left) = parent.child_by_field_name("left") {
                        if let Some((base, path)) = self.assignment_target(left, scope) {
                            return (base, DeclarationForm::AssignedClassExpr(path));
                        }
                    }
                }
                "variable_declarator" => {
                    if let Some(name) = parent.child_by_field_name("name") {
                        if name.kind() == "identifier" {
                            return (
                                scope.to_vec(),
                                DeclarationForm::AssignedClassExpr(vec![self
                                    .text(name)
                                    .to_string()]),
                            );
                        }
                    }
                }
                _ => {}
            }
        }

        (
            scope.to_vec(),
            DeclarationForm::NamedClass(ANONYMOUS.to_string()),
        )
    }

    fn namespace_scope(&self, node: Node, scope: &[String]) -> Option<Vec<String>> {
        let name = node.child_by_field_name("name")?;
        // `declare module "pkg"` has a string name and no useful scope
        if name.kind() == "string" {
            return None;
        }
        let mut inner = scope.to_vec();
        inner.extend(self.text(name).split('.').map(|s| s.trim().to_string()));
        Some(inner)
    }

    fn visit_variable_statement(&mut self, node: Node, scope: &[String]) {
        for declarator in named_children(node) {
            if declarator.kind() != "variable_declarator" {
                continue;
            }
            let Some(value) = declarator.child_by_field_name("value") else {
                continue;
            };

            match value.kind() {
                "object" => {
                    let Some(name) = declarator.child_by_field_name("name") else {
                        continue;
                    };
                    if name.kind() == "identifier" {
                        let path = vec![self.text(name).to_string()];
                        self.parse_object_literal(scope, path, value);
                    }
                }
                // var cc = cc || { ... }
                "binary_expression" | "assignment_expression" => {
                    let (Some(left), Some(right)) = (
                        value.child_by_field_name("left"),
                        value.child_by_field_name("right"),
                    ) else {
                        continue;
                    };
                    if left.kind() == "identifier" && right.kind() == "object" {
                        let path = vec![self.text(left).to_string()];
                        self.parse_object_literal(scope, path, right);
                    }
                }
                _ => {}
            }
        }
    }

    fn visit_expression_statement(&mut self, node: Node, scope: &[String]) {
        let Some(expr) = node.named_child(0) else {
            return;
        };
        if expr.kind() != "assignment_expression" {
            return;
        }
        let (Some(left), Some(right)) = (
            expr.child_by_field_name("left"),
            expr.child_by_field_name("right"),
        ) else {
            return;
        };
        if left.kind() != "member_expression" {
            return;
        }
        let Some((base, chain)) = self.assignment_target(left, scope) else {
            return;
        };

        if right.kind() == "object" {
            self.parse_object_literal(&base, chain.clone(), right);
        }

        let params = is_function_like(right.kind()).then(|| self.parameters(right));
        self.declarations.push(Declaration {
            scope: base,
            form: DeclarationForm::DottedAssignment(chain),
            line: line_of(node),
            params,
        });
    }

    fn visit_function_declaration(&mut self, node: Node, scope: &[String]) {
        let Some(name_node) = node.child_by_field_name("name") else {
            return;
        };
        let name = self.text(name_node).to_string();
        self.record_variable_function(node, scope, name);
    }

    fn visit_assigned_function(&mut self, node: Node, scope: &[String]) {
        let Some(parent) = node.parent() else {
            return;
        };
        if parent.kind() != "variable_declarator"
            || parent.child_by_field_name("value") != Some(node)
        {
            return;
        }
        let Some(name_node) = parent.child_by_field_name("name") else {
            return;
        };
        if name_node.kind() != "identifier" {
            return;
        }
        let name = self.text(name_node).to_string();
        self.record_variable_function(node, scope, name);
    }

    fn record_variable_function(&mut self, node: Node, scope: &[String], name: String) {
        let full = scope
            .iter()
            .map(String::as_str)
            .chain(std::iter::once(name.as_str()))
            .collect::<Vec<_>>()
            .join(".");
        if !self.recorded_variables.insert(full) {
            return;
        }
        let params = self.parameters(node);
        self.declarations.push(Declaration {
            scope: scope.to_vec(),
            form: DeclarationForm::Function(name),
            line: line_of(node),
            params: Some(params),
        });
    }

    /// Functions become members, nested objects extend the path
    fn parse_object_literal(&mut self, scope: &[String], path: Vec<String>, object: Node) {
        for property in named_children(object) {
            match property.kind() {
                "pair" => {
                    let (Some(key), Some(value)) = (
                        property.child_by_field_name("key"),
                        property.child_by_field_name("value"),
                    ) else {
                        continue;
                    };
                    let Some(name) = self.property_key(key) else {
                        continue;
                    };

                    let mut member_path = path.clone();
                    member_path.push(name);

                    if is_function_like(value.kind()) {
                        let params = self.parameters(value);
                        self.declarations.push(Declaration {
                            scope: scope.to_vec(),
                            form: DeclarationForm::ObjectLiteralMember(member_path),
                            line: line_of(property),
                            params: Some(params),
                        });
                    } else if value.kind() == "object" {
                        self.parse_object_literal(scope, member_path, value);
                    }
                }
                "method_definition" => {
                    let Some(key) = property.child_by_field_name("name") else {
                        continue;
                    };
                    let Some(name) = self.property_key(key) else {
                        continue;
                    };
                    let mut member_path = path.clone();
                    member_path.push(name);

                    let params = self.parameters(property);
                    self.declarations.push(Declaration {
                        scope: scope.to_vec(),
                        form: DeclarationForm::ObjectLiteralMember(member_path),
                        line: line_of(property),
                        params: Some(params),
                    });
                }
                _ => {}
            }
        }
    }

    /// Resolve an assignment target to `(scope, path)`
    ///
    /// Plain identifiers stay in the current scope. Member chains rooted at an
    /// identifier are absolute; chains rooted at `this` are relative to the
    /// enclosing class scope.
    fn assignment_target(
        &self,
        left: Node,
        scope: &[String],
    ) -> Option<(Vec<String>, Vec<String>)> {
        match left.kind() {
            "identifier" => Some((scope.to_vec(), vec![self.text(left).to_string()])),
            "member_expression" => {
                let (chain, rooted_at_this) = self.member_chain(left);
                if chain.is_empty() {
                    return None;
                }
                let base = if rooted_at_this {
                    scope.to_vec()
                } else {
                    Vec::new()
                };
                Some((base, chain))
            }
            _ => None,
        }
    }

    /// `a.b.c` → `["a", "b", "c"]`, walking property accesses outside-in
    fn member_chain(&self, node: Node) -> (Vec<String>, bool) {
        let mut chain = Vec::new();
        let mut current = node;
        let mut rooted_at_this = false;

        loop {
            match current.kind() {
                "member_expression" => {
                    if let Some(property) = current.child_by_field_name("property") {
                        chain.push(self.text(property).to_string());
                    }
                    match current.child_by_field_name("object") {
                        Some(object) => current = object,
                        None => break,
                    }
                }
                "identifier" => {
                    chain.push(self.text(current).to_string());
                    break;
                }
                "this" => {
                    rooted_at_this = true;
                    break;
                }
                _ => break,
            }
        }

        chain.reverse();
        (chain, rooted_at_this)
    }

    fn property_key(&self, key: Node) -> Option<String> {
        match key.kind() {
            "property_identifier" | "private_property_identifier" | "number" => {
                Some(self.text(key).to_string())
            }
            "string" => {
                let name = self.text(key).trim_matches(|c| c == '"' || c == '\'');
                (!name.is_empty()).then(|| name.to_string())
            }
            // computed names are dynamic
            _ => None,
        }
    }

    fn parameters(&self, function: Node) -> Vec<ParamInfo> {
        if let Some(params) = function.child_by_field_name("parameters") {
            return named_children(params)
                .into_iter()
                .filter(|p| p.kind() != "comment" && p.kind() != "decorator")
                .map(|p| self.param_info(p))
                .collect();
        }
        // `x => x + 1`
        if let Some(param) = function.child_by_field_name("parameter") {
            return vec![ParamInfo::untyped(self.binding_name(param))];
        }
        Vec::new()
    }

    fn param_info(&self, param: Node) -> ParamInfo {
        match param.kind() {
            "required_parameter" | "optional_parameter" => {
                let name = param
                    .child_by_field_name("pattern")
                    .map(|p| self.binding_name(p))
                    .unwrap_or_else(|| collapse_whitespace(self.text(param)));
                let type_name = param
                    .child_by_field_name("type")
                    .map(|annotation| self.annotation_text(annotation))
                    .filter(|t| !t.is_empty());
                ParamInfo::new(name, type_name)
            }
            _ => ParamInfo::untyped(self.binding_name(param)),
        }
    }

    fn binding_name(&self, node: Node) -> String {
        match node.kind() {
            "identifier" | "this" => self.text(node).to_string(),
            "rest_pattern" => node
                .named_child(0)
                .map(|inner| self.binding_name(inner))
                .unwrap_or_else(|| self.text(node).trim_start_matches("...").to_string()),
            "assignment_pattern" => node
                .child_by_field_name("left")
                .map(|left| self.binding_name(left))
                .unwrap_or_else(|| collapse_whitespace(self.text(node))),
            _ => collapse_whitespace(self.text(node)),
        }
    }

    /// `: Foo<T>` → `Foo<T>`
    fn annotation_text(&self, annotation: Node) -> String {
        if annotation.kind() == "type_annotation" {
            if let Some(ty) = annotation.named_child(0) {
                return self.text(ty).to_string();
            }
        }
        self.text(annotation)
            .trim_start_matches(':')
            .trim()
            .to_string()
    }

    fn text(&self, node: Node) -> &'a str {
        node.utf8_text(self.source).unwrap_or_default()
    }
}

fn is_function_like(kind: &str) -> bool {
    matches!(
        kind,
        "function_expression" | "function" | "arrow_function" | "generator_function"
    )
}

fn line_of(node: Node) -> u32 {
    node.start_position().row as u32 + 1
}

fn children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

fn named_children(node: Node) -> Vec<Node> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Convenience function to extract records from a parsed file
pub fn extract_symbols(tree: &Tree, source: &str, file_path: &str) -> Vec<SymbolRecord> {
    SymbolExtractor::new(source).extract(tree, file_path)
}
