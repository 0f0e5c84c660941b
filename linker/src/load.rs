// load.rs — Object-file loader: builds a `Network` from parsed modules
//
// Runs in two walks over all files so references may point forward and
// across modules: first every node is declared in its module list, then
// inputs, alias targets, action links and values are attached by name.
// Numeric literals `#n` become shared floating constants named by the
// codec's number mangling; they join a module list only when the count
// pass meets their first consumer.
//
// Preconditions: none.
// Postconditions: `network` holds every well-formed declaration; the
//   clock `iClock` and the constant `iConst` are predefined.
// Failure modes: syntax errors (E0101), undefined references (E0102),
//   duplicate names (E0103) and kind/role mismatches (E0104) are returned
//   as diagnostics; loading continues past them.
// Side effects: none.

use std::collections::HashMap;
use std::path::Path;

use crate::ast::{ActionSlave, Ident, InputRef, Item, NodeDecl, ObjectFile, Span};
use crate::diag::{codes, DiagCode, Diagnostic};
use crate::id::{ModuleId, NodeId};
use crate::name::mangle;
use crate::network::{ActionKind, ActionLinks, Combine, LogicOp, Network, Node, NodeKind, Role, CONST_NAME};
use crate::parser;
use crate::pass::PassId;

const PHASE: PassId = PassId::Load;

/// One object file to load.
#[derive(Debug, Clone, Copy)]
pub struct ObjectSource<'a> {
    /// Display name; its stem names the default module.
    pub name: &'a str,
    pub text: &'a str,
}

/// Result of loading: the network plus any diagnostics.
#[derive(Debug)]
pub struct LoadResult {
    pub network: Network,
    pub diagnostics: Vec<Diagnostic>,
}

impl LoadResult {
    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(|d| d.is_error())
    }
}

pub fn load(sources: &[ObjectSource<'_>]) -> LoadResult {
    let mut loader = Loader::new();

    let mut parsed: Vec<(ObjectSource<'_>, ObjectFile)> = Vec::new();
    for src in sources {
        let result = parser::parse(src.text);
        for e in &result.errors {
            let at = Location::of(src, e.span().start);
            loader.error(codes::E0101, at, e.to_string(), &[]);
        }
        if !result.errors.is_empty() {
            continue;
        }
        if let Some(file) = result.file {
            parsed.push((*src, file));
        }
    }

    let mut pending = Vec::new();
    for (src, file) in &parsed {
        loader.declare_file(src, file, &mut pending);
    }
    for (id, src, decl) in pending {
        loader.link(id, src, decl);
    }

    LoadResult {
        network: loader.net,
        diagnostics: loader.diagnostics,
    }
}

// ── Kind and role words ──────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum KindWord {
    Input,
    Logic(LogicOp),
    Arith,
    Alias,
    Clock,
    Timer,
    Const,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RoleWord {
    Plain(Role),
    Action(ActionKind),
}

fn kind_word(word: &str) -> Option<KindWord> {
    Some(match word {
        "input" => KindWord::Input,
        "and" => KindWord::Logic(LogicOp::And),
        "or" => KindWord::Logic(LogicOp::Or),
        "xor" => KindWord::Logic(LogicOp::Xor),
        "latch" => KindWord::Logic(LogicOp::Latch),
        "arith" => KindWord::Arith,
        "alias" => KindWord::Alias,
        "clock" => KindWord::Clock,
        "timer" => KindWord::Timer,
        "const" => KindWord::Const,
        _ => return None,
    })
}

fn role_word(word: &str) -> Option<RoleWord> {
    let role = match word {
        "gate" => Role::Gate,
        "arith" => Role::Arith,
        "outw" => Role::OutWord,
        "outx" => Role::OutBit,
        "trab" => Role::Transfer,
        "clock" => Role::Clock,
        "timer" => Role::Timer,
        "udfa" => Role::Undefined,
        _ => {
            return ActionKind::ALL
                .into_iter()
                .find(|a| a.mnemonic().eq_ignore_ascii_case(word))
                .map(RoleWord::Action)
        }
    };
    Some(RoleWord::Plain(role))
}

fn classify(kind: KindWord, role: RoleWord) -> Option<(NodeKind, Role)> {
    use RoleWord::{Action, Plain};

    let natural = match kind {
        KindWord::Input => NodeKind::Input,
        KindWord::Logic(op) => NodeKind::Logic(op),
        KindWord::Arith => NodeKind::Arithmetic,
        KindWord::Alias => NodeKind::Alias,
        KindWord::Clock => NodeKind::Clock,
        KindWord::Timer => NodeKind::Timer,
        KindWord::Const => NodeKind::Constant,
    };
    let pair = match (kind, role) {
        (_, Plain(Role::Undefined)) => (natural, Role::Undefined),
        (KindWord::Input, Plain(r @ (Role::Gate | Role::Arith | Role::Transfer))) => (natural, r),
        (KindWord::Logic(_), Plain(Role::Gate)) => (natural, Role::Gate),
        (KindWord::Logic(op), Plain(Role::OutBit)) => (NodeKind::Output(Combine::Logic(op)), Role::OutBit),
        (KindWord::Arith, Plain(Role::Arith)) => (natural, Role::Arith),
        (KindWord::Arith, Plain(Role::OutWord)) => (NodeKind::Output(Combine::Arithmetic), Role::OutWord),
        (KindWord::Alias, Plain(r @ (Role::Gate | Role::Arith))) => (natural, r),
        (KindWord::Clock, Plain(Role::Clock)) => (natural, Role::Clock),
        (KindWord::Timer, Plain(Role::Timer)) => (natural, Role::Timer),
        (KindWord::Const, Plain(Role::Arith)) => (natural, Role::Arith),
        (KindWord::Logic(op), Action(a)) => (NodeKind::Action(a, Combine::Logic(op)), Role::Action),
        (KindWord::Arith, Action(a)) => (NodeKind::Action(a, Combine::Arithmetic), Role::Action),
        _ => return None,
    };
    Some(pair)
}

// ── Locations ────────────────────────────────────────────────────────────

/// `file:line:col` of a byte offset, 1-based.
#[derive(Debug, Clone, Copy)]
struct Location<'a> {
    file: &'a str,
    line: usize,
    col: usize,
}

impl<'a> Location<'a> {
    fn of(src: &ObjectSource<'a>, offset: usize) -> Self {
        let before = &src.text[..offset.min(src.text.len())];
        let line = before.matches('\n').count() + 1;
        let col = before.rfind('\n').map_or(before.len(), |nl| before.len() - nl - 1) + 1;
        Location {
            file: src.name,
            line,
            col,
        }
    }

    fn at(src: &ObjectSource<'a>, span: Span) -> Self {
        Self::of(src, span.start)
    }
}

// ── Loader ───────────────────────────────────────────────────────────────

struct Loader {
    net: Network,
    index: HashMap<String, NodeId>,
    diagnostics: Vec<Diagnostic>,
}

impl Loader {
    fn new() -> Self {
        let mut net = Network::new();
        let konst = net.add_floating(Node::constant(CONST_NAME, 0));
        let mut index = HashMap::new();
        index.insert(net.name(net.clock).to_string(), net.clock);
        index.insert(CONST_NAME.to_string(), konst);
        Loader {
            net,
            index,
            diagnostics: Vec::new(),
        }
    }

    fn error(&mut self, code: DiagCode, at: Location<'_>, message: String, nodes: &[&str]) {
        let mut diag = Diagnostic::error(
            PHASE,
            code,
            format!("{}:{}:{}: {}", at.file, at.line, at.col, message),
        );
        for n in nodes {
            diag = diag.with_node(*n);
        }
        self.diagnostics.push(diag);
    }

    fn declare_file<'f>(
        &mut self,
        src: &ObjectSource<'f>,
        file: &'f ObjectFile,
        pending: &mut Vec<(NodeId, ObjectSource<'f>, &'f NodeDecl)>,
    ) {
        let mut module: Option<ModuleId> = None;
        for item in &file.items {
            match item {
                Item::Module(name) => module = Some(self.net.add_module(name.name.clone())),
                Item::Node(decl) => {
                    let m = match module {
                        Some(m) => m,
                        None => {
                            let stem = Path::new(src.name)
                                .file_stem()
                                .map_or_else(|| src.name.to_string(), |s| s.to_string_lossy().into_owned());
                            let m = self.net.add_module(stem);
                            module = Some(m);
                            m
                        }
                    };
                    if let Some(id) = self.declare(src, decl, m) {
                        pending.push((id, *src, decl));
                    }
                }
            }
        }
    }

    fn declare(&mut self, src: &ObjectSource<'_>, decl: &NodeDecl, module: ModuleId) -> Option<NodeId> {
        let name = decl.name.name.as_str();
        let at = Location::at(src, decl.span);

        let Some(kind) = kind_word(&decl.kind.name) else {
            let msg = format!("'{}' has unknown kind '{}'", name, decl.kind.name);
            self.error(codes::E0104, Location::at(src, decl.kind.span), msg, &[name]);
            return None;
        };
        let Some(role) = role_word(&decl.role.name) else {
            let msg = format!("'{}' has unknown role '{}'", name, decl.role.name);
            self.error(codes::E0104, Location::at(src, decl.role.span), msg, &[name]);
            return None;
        };
        let Some((kind, role)) = classify(kind, role) else {
            let msg = format!(
                "'{}': kind '{}' cannot take role '{}'",
                name, decl.kind.name, decl.role.name
            );
            self.error(codes::E0104, at, msg, &[name]);
            return None;
        };

        if let Some(&prev) = self.index.get(name) {
            let owner = match self.net.node(prev).module {
                Some(m) => format!("first defined in module '{}'", self.net.modules[m.index()].name),
                None => "predefined".to_string(),
            };
            let diag = Diagnostic::error(
                PHASE,
                codes::E0103,
                format!("{}:{}:{}: '{}' is defined twice", at.file, at.line, at.col, name),
            )
            .with_node(name)
            .with_related(name, owner);
            self.diagnostics.push(diag);
            return None;
        }

        let id = self.net.add_node(module, Node::new(name, kind, role));
        self.index.insert(name.to_string(), id);
        Some(id)
    }

    /// Resolve a reference from `consumer`, reporting an undefined name.
    fn lookup(&mut self, src: &ObjectSource<'_>, consumer: &str, target: &Ident) -> Option<NodeId> {
        if let Some(&id) = self.index.get(&target.name) {
            return Some(id);
        }
        let msg = format!("'{}' references undefined '{}'", consumer, target.name);
        self.error(codes::E0102, Location::at(src, target.span), msg, &[target.name.as_str(), consumer]);
        None
    }

    /// The shared constant for `value`, created floating on first use.
    fn constant(&mut self, value: i64) -> NodeId {
        let name = mangle(&value.to_string());
        if let Some(&id) = self.index.get(&name) {
            return id;
        }
        let id = self.net.add_floating(Node::constant(name.clone(), value));
        self.index.insert(name, id);
        id
    }

    fn link(&mut self, id: NodeId, src: ObjectSource<'_>, decl: &NodeDecl) {
        let name = decl.name.name.as_str();
        let kind = self.net.node(id).kind;

        for input in &decl.inputs {
            match input {
                InputRef::Node { name: target, inverted } => {
                    if let Some(s) = self.lookup(&src, name, target) {
                        self.net.connect(s, id, *inverted);
                    }
                }
                InputRef::Literal(v, _) => {
                    let c = self.constant(*v);
                    self.net.connect(c, id, false);
                }
            }
        }

        if let Some(alias) = &decl.alias {
            if kind == NodeKind::Alias {
                if let Some(t) = self.lookup(&src, name, &alias.target) {
                    self.net.set_alias(id, t, alias.invert);
                }
            } else {
                let msg = format!("'{}' is not an alias but names a target", name);
                self.error(codes::E0104, Location::at(&src, alias.target.span), msg, &[name]);
            }
        }

        if let Some(action) = &decl.action {
            if !matches!(kind, NodeKind::Action(..)) {
                let msg = format!("'{}' is not an action but names a slave or clock", name);
                self.error(codes::E0104, Location::at(&src, action.span), msg, &[name]);
            } else {
                let mut links = ActionLinks::default();
                match &action.slave {
                    Some(ActionSlave::Node(s)) => links.slave = self.lookup(&src, name, s),
                    Some(ActionSlave::Function(n, span)) => match u32::try_from(*n) {
                        Ok(n) => self.net.node_mut(id).function = Some(n),
                        Err(_) => {
                            let msg = format!("'{}' has invalid function number {}", name, n);
                            self.error(codes::E0104, Location::at(&src, *span), msg, &[name]);
                        }
                    },
                    None => {}
                }
                if let Some(c) = &action.clock {
                    links.clock = self.lookup(&src, name, c);
                }
                if let Some(d) = &action.delay {
                    links.delay = self.lookup(&src, name, d);
                }
                self.net.set_action(id, links);
            }
        }

        if let Some((v, span)) = decl.value {
            if matches!(kind, NodeKind::Constant | NodeKind::Timer) {
                self.net.node_mut(id).value = Some(v);
            } else {
                let msg = format!("'{}' of kind {} cannot hold a value", name, kind.label());
                self.error(codes::E0104, Location::at(&src, span), msg, &[name]);
            }
        } else if kind == NodeKind::Constant {
            self.net.node_mut(id).value = Some(0);
        }
    }
}
