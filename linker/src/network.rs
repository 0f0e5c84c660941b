// network.rs — Node model and network builder
//
// A `Network` owns every node in one vector, indexed by `NodeId`. Raw
// edges are stored on the consumer (`Node::inputs`); the activity lists
// built by the fill pass live on the producer inside the arena. Modules
// keep their translation-unit order of node ids, which drives symbol
// placement.
//
// Preconditions: ids passed to the builder methods were returned by the
//   same network.
// Postconditions: node 0 is always the global clock `iClock`.
// Failure modes: none at build time; structural problems are reported by
//   the link passes.
// Side effects: none.

use std::collections::HashMap;

use serde::Serialize;

use crate::id::{ModuleId, NodeId};

pub const CLOCK_NAME: &str = "iClock";
pub const CONST_NAME: &str = "iConst";

// ── Kinds and roles ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum LogicOp {
    And,
    Or,
    Xor,
    /// Set by a normal input, reset by an inverted input, otherwise holds.
    Latch,
}

/// How a node combines its inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Combine {
    Logic(LogicOp),
    Arithmetic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum ActionKind {
    SetFlipFlop,
    ResetFlipFlop,
    DFlipFlop,
    SetHold,
    ResetHold,
    ShiftHold,
    Change,
    RisingEdge,
    TimerCount,
    Switch,
    IfBlock,
    ElseBlock,
}

impl ActionKind {
    /// Function-block actions run code instead of driving a slave node.
    pub fn is_function_block(self) -> bool {
        matches!(self, ActionKind::Switch | ActionKind::IfBlock | ActionKind::ElseBlock)
    }

    /// Actions whose slave is a timer.
    pub fn drives_timer(self) -> bool {
        self == ActionKind::TimerCount
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            ActionKind::SetFlipFlop => "S_FF",
            ActionKind::ResetFlipFlop => "R_FF",
            ActionKind::DFlipFlop => "D_FF",
            ActionKind::SetHold => "S_SH",
            ActionKind::ResetHold => "R_SH",
            ActionKind::ShiftHold => "D_SH",
            ActionKind::Change => "CH_BIT",
            ActionKind::RisingEdge => "RI_BIT",
            ActionKind::TimerCount => "TIMR",
            ActionKind::Switch => "F_SW",
            ActionKind::IfBlock => "F_CF",
            ActionKind::ElseBlock => "F_CE",
        }
    }

    pub const ALL: [ActionKind; 12] = [
        ActionKind::SetFlipFlop,
        ActionKind::ResetFlipFlop,
        ActionKind::DFlipFlop,
        ActionKind::SetHold,
        ActionKind::ResetHold,
        ActionKind::ShiftHold,
        ActionKind::Change,
        ActionKind::RisingEdge,
        ActionKind::TimerCount,
        ActionKind::Switch,
        ActionKind::IfBlock,
        ActionKind::ElseBlock,
    ];
}

/// Structural kind of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Input,
    Output(Combine),
    Logic(LogicOp),
    Arithmetic,
    Alias,
    Clock,
    Timer,
    Action(ActionKind, Combine),
    Constant,
}

impl NodeKind {
    /// The combining function applied to this node's inputs, if it has any.
    pub fn combine(self) -> Option<Combine> {
        match self {
            NodeKind::Logic(op) => Some(Combine::Logic(op)),
            NodeKind::Arithmetic => Some(Combine::Arithmetic),
            NodeKind::Output(c) | NodeKind::Action(_, c) => Some(c),
            NodeKind::Input | NodeKind::Alias | NodeKind::Clock | NodeKind::Timer | NodeKind::Constant => None,
        }
    }

    /// Key used for per-kind statistics and listings.
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::Input => "INPUT",
            NodeKind::Output(_) => "OUTPUT",
            NodeKind::Logic(LogicOp::And) => "AND",
            NodeKind::Logic(LogicOp::Or) => "OR",
            NodeKind::Logic(LogicOp::Xor) => "XOR",
            NodeKind::Logic(LogicOp::Latch) => "LATCH",
            NodeKind::Arithmetic => "ARITH",
            NodeKind::Alias => "ALIAS",
            NodeKind::Clock => "CLOCK",
            NodeKind::Timer => "TIMER",
            NodeKind::Action(..) => "ACTION",
            NodeKind::Constant => "CONST",
        }
    }
}

/// What a node's output drives, which decides its activity list shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Role {
    Gate,
    /// A gate that feeds at least one XOR; set by the fill pass.
    GateXor,
    Arith,
    Action,
    Clock,
    Timer,
    /// Input word that distributes bits to its bit nodes.
    Transfer,
    OutWord,
    OutBit,
    Undefined,
}

impl Role {
    /// Source of a logic edge: owns a two-part activity list.
    pub fn is_gate(self) -> bool {
        matches!(self, Role::Gate | Role::GateXor)
    }

    /// Number of terminator slots in this role's activity list, if it has one.
    pub fn terminators(self) -> Option<usize> {
        match self {
            Role::Gate | Role::GateXor => Some(2),
            Role::Arith => Some(1),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Role::Gate => "GATE",
            Role::GateXor => "GATEX",
            Role::Arith => "ARITH",
            Role::Action => "ACTION",
            Role::Clock => "CLOCK",
            Role::Timer => "TIMER",
            Role::Transfer => "TRAB",
            Role::OutWord => "OUTW",
            Role::OutBit => "OUTX",
            Role::Undefined => "UDFA",
        }
    }
}

// ── Per-node link data ───────────────────────────────────────────────────

/// Input references of a consumer. Arithmetic consumers use `normal` only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InputList {
    pub normal: Vec<NodeId>,
    pub inverted: Vec<NodeId>,
}

impl InputList {
    pub fn len(&self) -> usize {
        self.normal.len() + self.inverted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.inverted.is_empty()
    }

    /// All inputs as `(source, inverted)`, normal inputs first.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, bool)> + '_ {
        self.normal
            .iter()
            .map(|&id| (id, false))
            .chain(self.inverted.iter().map(|&id| (id, true)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AliasLink {
    pub target: NodeId,
    pub invert: bool,
}

/// Static linkage of an action node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ActionLinks {
    /// Node driven by the action; absent for function blocks.
    pub slave: Option<NodeId>,
    /// Clock or timer that schedules the action.
    pub clock: Option<NodeId>,
    /// Arithmetic node holding the delay of a timed action.
    pub delay: Option<NodeId>,
}

/// Bit I/O attachment made by the bit aggregation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum IoLink {
    /// Input word: the bit node for each bit position.
    Bits([Option<NodeId>; 8]),
    /// Output bit: its mask within the output word it belongs to.
    Bit { mask: u8, word: NodeId },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Counts {
    pub fan_in: u32,
    pub fan_out: u32,
    /// Times this node is named as the delay of a timed action.
    pub delay_refs: u32,
}

/// A node's region of the link arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ArenaSlice {
    pub start: usize,
    pub len: usize,
}

impl ArenaSlice {
    pub fn end(&self) -> usize {
        self.start + self.len
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Node {
    pub name: String,
    pub kind: NodeKind,
    pub role: Role,
    /// Module list that contains this node; `None` for the clock and for
    /// floating constants not yet referenced.
    pub module: Option<ModuleId>,
    pub inputs: InputList,
    pub alias: Option<AliasLink>,
    pub action: Option<ActionLinks>,
    /// Function number of a function-block action.
    pub function: Option<u32>,
    /// Constant value, or preset of a timer.
    pub value: Option<i64>,
    pub io: Option<IoLink>,
    /// Bits driven or read by an I/O word.
    pub io_mask: u32,
    /// Master of a shift-hold slave.
    pub back_ref: Option<NodeId>,
    pub counts: Counts,
    pub slice: Option<ArenaSlice>,
}

impl Node {
    pub fn new(name: impl Into<String>, kind: NodeKind, role: Role) -> Self {
        Node {
            name: name.into(),
            kind,
            role,
            module: None,
            inputs: InputList::default(),
            alias: None,
            action: None,
            function: None,
            value: None,
            io: None,
            io_mask: 0,
            back_ref: None,
            counts: Counts::default(),
            slice: None,
        }
    }

    pub fn gate(name: impl Into<String>, op: LogicOp) -> Self {
        Node::new(name, NodeKind::Logic(op), Role::Gate)
    }

    pub fn input_bit(name: impl Into<String>) -> Self {
        Node::new(name, NodeKind::Input, Role::Gate)
    }

    pub fn arith(name: impl Into<String>) -> Self {
        Node::new(name, NodeKind::Arithmetic, Role::Arith)
    }

    pub fn constant(name: impl Into<String>, value: i64) -> Self {
        let mut node = Node::new(name, NodeKind::Constant, Role::Arith);
        node.value = Some(value);
        node
    }

    pub fn is_alias(&self) -> bool {
        self.kind == NodeKind::Alias
    }

    pub fn has_logic_inputs(&self) -> bool {
        matches!(self.kind.combine(), Some(Combine::Logic(_)))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Module {
    pub name: String,
    pub nodes: Vec<NodeId>,
}

// ── Network ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct Network {
    pub nodes: Vec<Node>,
    pub modules: Vec<Module>,
    pub clock: NodeId,
}

impl Default for Network {
    fn default() -> Self {
        Self::new()
    }
}

impl Network {
    /// An empty network holding only the global clock.
    pub fn new() -> Self {
        Network {
            nodes: vec![Node::new(CLOCK_NAME, NodeKind::Clock, Role::Clock)],
            modules: Vec::new(),
            clock: NodeId(0),
        }
    }

    pub fn add_module(&mut self, name: impl Into<String>) -> ModuleId {
        let id = ModuleId(self.modules.len() as u32);
        self.modules.push(Module {
            name: name.into(),
            nodes: Vec::new(),
        });
        id
    }

    /// Add a node to the end of a module's list.
    pub fn add_node(&mut self, module: ModuleId, mut node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        node.module = Some(module);
        self.nodes.push(node);
        self.modules[module.index()].nodes.push(id);
        id
    }

    /// Add a node that belongs to no module list yet (shared constants).
    pub fn add_floating(&mut self, node: Node) -> NodeId {
        let id = NodeId::from_index(self.nodes.len());
        self.nodes.push(node);
        id
    }

    /// Record `source` as an input of `target`.
    pub fn connect(&mut self, source: NodeId, target: NodeId, inverted: bool) {
        let inputs = &mut self.nodes[target.index()].inputs;
        if inverted {
            inputs.inverted.push(source);
        } else {
            inputs.normal.push(source);
        }
    }

    pub fn set_alias(&mut self, alias: NodeId, target: NodeId, invert: bool) {
        self.nodes[alias.index()].alias = Some(AliasLink { target, invert });
    }

    pub fn set_action(&mut self, action: NodeId, links: ActionLinks) {
        self.nodes[action.index()].action = Some(links);
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id.index()]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].name
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Map from name to node over every node, listed or floating. When
    /// names repeat the first node wins; duplicates are reported by the
    /// validation pass.
    pub fn name_index(&self) -> HashMap<String, NodeId> {
        let mut index = HashMap::with_capacity(self.nodes.len());
        for (i, node) in self.nodes.iter().enumerate() {
            index.entry(node.name.clone()).or_insert(NodeId::from_index(i));
        }
        index
    }

    /// Listed node ids in module order (the clock is not listed).
    pub fn listed(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.modules.iter().flat_map(|m| m.nodes.iter().copied())
    }

    /// Insert `id` into `module`'s list directly after position `after`.
    pub fn insert_listed(&mut self, module: ModuleId, after: usize, id: NodeId) {
        self.modules[module.index()].nodes.insert(after + 1, id);
        self.nodes[id.index()].module = Some(module);
    }
}
