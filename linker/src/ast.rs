// AST node types for gatelink object files.
//
// One `Item` per non-empty line. Kind and role words are kept as written;
// the loader classifies them. Every node carries a `SimpleSpan` for error
// reporting.
//
// Preconditions: produced by the parser from a valid or partially-valid token stream.
// Postconditions: each node's span covers the source range of the construct.
// Failure modes: none (data-only module).
// Side effects: none.

use chumsky::span::SimpleSpan;

/// Byte-offset span (alias for chumsky's `SimpleSpan`).
pub type Span = SimpleSpan;

/// A complete object file.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectFile {
    pub items: Vec<Item>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Item {
    /// `module <name>`: following nodes belong to this module.
    Module(Ident),
    Node(NodeDecl),
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ident {
    pub name: String,
    pub span: Span,
}

// ── node_decl: name kind role [inputs] [alias] [action] [value] ──

#[derive(Debug, Clone, PartialEq)]
pub struct NodeDecl {
    pub name: Ident,
    pub kind: Ident,
    pub role: Ident,
    pub inputs: Vec<InputRef>,
    pub alias: Option<AliasRef>,
    pub action: Option<ActionRef>,
    /// `= <int>`: constant value or timer preset.
    pub value: Option<(i64, Span)>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputRef {
    /// `name` or `~name`.
    Node { name: Ident, inverted: bool },
    /// `#<int>`: a numeric constant.
    Literal(i64, Span),
}

/// `-> [~]target`
#[derive(Debug, Clone, PartialEq)]
pub struct AliasRef {
    pub target: Ident,
    pub invert: bool,
}

/// `[=> slave | fn <int>] [@ clock] [< delay]`
#[derive(Debug, Clone, PartialEq)]
pub struct ActionRef {
    pub slave: Option<ActionSlave>,
    pub clock: Option<Ident>,
    pub delay: Option<Ident>,
    pub span: Span,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ActionSlave {
    Node(Ident),
    Function(i64, Span),
}
