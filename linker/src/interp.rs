// interp.rs — Event-driven evaluation of a linked network
//
// Second consumer of `LinkedNetwork`. Value storage is sized from the
// link statistics and indexed by symbol-table position. A change to a
// node schedules exactly the consumers in its activity list, so the
// linked arena is exercised the way an execution engine uses it.
//
// Combining functions: AND, OR and XOR over normal inputs and inverted
// inputs; LATCH sets when a normal input is high, resets when an inverted
// input's source is high, and holds otherwise. Arithmetic nodes sum their
// inputs. Output bits are mirrored into their output word.
//
// Preconditions: `net` is a validated link.
// Postconditions: after every call the network is settled.
// Failure modes: more than `settle_limit` evaluations in one settle is
//   reported as `SimError::Oscillation`.
// Side effects: none outside the interpreter.

use std::collections::VecDeque;
use std::fmt;

use crate::id::NodeId;
use crate::linked::{Backend, LinkedNetwork};
use crate::network::{Combine, IoLink, LogicOp, NodeKind, Role};

pub const DEFAULT_SETTLE_LIMIT: usize = 10_000;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SimError {
    UnknownNode(String),
    /// Only input nodes can be driven from outside.
    NotAnInput(String),
    Oscillation { node: String, steps: usize },
}

impl fmt::Display for SimError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimError::UnknownNode(n) => write!(f, "no node named '{}'", n),
            SimError::NotAnInput(n) => write!(f, "'{}' is not an input", n),
            SimError::Oscillation { node, steps } => {
                write!(f, "network did not settle after {} evaluations (last at '{}')", steps, node)
            }
        }
    }
}

impl std::error::Error for SimError {}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimStats {
    pub nodes: usize,
    pub evaluations: usize,
}

#[derive(Debug, Clone)]
pub struct Interpreter {
    settle_limit: usize,
    values: Vec<i64>,
    /// Symbol-table position of each node id.
    position: Vec<Option<usize>>,
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for Interpreter {
    type Output = Result<SimStats, SimError>;

    fn name(&self) -> &'static str {
        "interp"
    }

    /// Size storage, load constants and settle the whole network.
    fn run(&mut self, net: &LinkedNetwork) -> Self::Output {
        self.values = vec![0; net.stats().nodes];
        self.position = vec![None; net.nodes().len()];
        for (i, id) in net.symbols().iter().enumerate() {
            self.position[id.index()] = Some(i);
        }

        let mut changed = VecDeque::new();
        for id in net.symbols().iter() {
            let node = net.node(id);
            let v = match node.kind {
                NodeKind::Constant => node.value.unwrap_or(0),
                _ => match self.eval(net, id) {
                    Some(v) => v,
                    None => continue,
                },
            };
            if self.store(net, id, v) {
                changed.push_back(id);
            }
        }
        let evaluations = self.settle(net, changed)?;
        Ok(SimStats {
            nodes: self.values.len(),
            evaluations,
        })
    }
}

impl Interpreter {
    pub fn new() -> Self {
        Interpreter {
            settle_limit: DEFAULT_SETTLE_LIMIT,
            values: Vec::new(),
            position: Vec::new(),
        }
    }

    pub fn with_settle_limit(mut self, limit: usize) -> Self {
        self.settle_limit = limit;
        self
    }

    /// Current value of a node; `None` if it is not in the symbol table.
    pub fn get(&self, id: NodeId) -> Option<i64> {
        let p = (*self.position.get(id.index())?)?;
        self.values.get(p).copied()
    }

    pub fn value(&self, net: &LinkedNetwork, name: &str) -> Option<i64> {
        self.get(net.lookup(name)?)
    }

    /// Drive an input bit (0 or 1) or an arithmetic input word, then settle.
    pub fn set_input(&mut self, net: &LinkedNetwork, name: &str, value: i64) -> Result<SimStats, SimError> {
        self.ensure(net)?;
        let id = net.lookup(name).ok_or_else(|| SimError::UnknownNode(name.to_string()))?;
        let node = net.node(id);
        if node.kind != NodeKind::Input || node.role == Role::Transfer {
            return Err(SimError::NotAnInput(name.to_string()));
        }
        let value = if node.role.is_gate() { i64::from(value != 0) } else { value };
        let mut changed = VecDeque::new();
        if self.store(net, id, value) {
            changed.push_back(id);
        }
        self.finish(net, changed)
    }

    /// Drive a bit input word: each declared bit takes its value from `byte`.
    pub fn set_byte(&mut self, net: &LinkedNetwork, name: &str, byte: u8) -> Result<SimStats, SimError> {
        self.ensure(net)?;
        let id = net.lookup(name).ok_or_else(|| SimError::UnknownNode(name.to_string()))?;
        let node = net.node(id);
        let Some(IoLink::Bits(bits)) = node.io.filter(|_| node.kind == NodeKind::Input) else {
            return Err(SimError::NotAnInput(name.to_string()));
        };
        let mask = node.io_mask as u8;
        self.store(net, id, i64::from(byte & mask));
        let mut changed = VecDeque::new();
        for (bit, slot) in bits.iter().enumerate() {
            if let Some(b) = *slot {
                if self.store(net, b, i64::from((byte >> bit) & 1)) {
                    changed.push_back(b);
                }
            }
        }
        self.finish(net, changed)
    }

    fn ensure(&mut self, net: &LinkedNetwork) -> Result<(), SimError> {
        if self.position.len() != net.nodes().len() {
            self.run(net)?;
        }
        Ok(())
    }

    fn finish(&mut self, net: &LinkedNetwork, changed: VecDeque<NodeId>) -> Result<SimStats, SimError> {
        let evaluations = self.settle(net, changed)?;
        Ok(SimStats {
            nodes: self.values.len(),
            evaluations,
        })
    }

    fn read(&self, id: NodeId) -> i64 {
        self.get(id).unwrap_or(0)
    }

    fn high(&self, id: NodeId) -> bool {
        self.read(id) != 0
    }

    /// New value of `id` from its inputs; `None` for nodes that do not
    /// combine inputs.
    fn eval(&self, net: &LinkedNetwork, id: NodeId) -> Option<i64> {
        let node = net.node(id);
        let combine = node.kind.combine()?;
        if node.inputs.is_empty() {
            return None;
        }
        let normal = &node.inputs.normal;
        let inverted = &node.inputs.inverted;
        let v = match combine {
            Combine::Logic(LogicOp::And) => {
                i64::from(normal.iter().all(|&s| self.high(s)) && inverted.iter().all(|&s| !self.high(s)))
            }
            Combine::Logic(LogicOp::Or) => {
                i64::from(normal.iter().any(|&s| self.high(s)) || inverted.iter().any(|&s| !self.high(s)))
            }
            Combine::Logic(LogicOp::Xor) => {
                let ones = normal.iter().filter(|&&s| self.high(s)).count()
                    + inverted.iter().filter(|&&s| !self.high(s)).count();
                i64::from(ones % 2 == 1)
            }
            Combine::Logic(LogicOp::Latch) => {
                if normal.iter().any(|&s| self.high(s)) {
                    1
                } else if inverted.iter().any(|&s| self.high(s)) {
                    0
                } else {
                    self.read(id)
                }
            }
            Combine::Arithmetic => normal.iter().fold(0i64, |acc, &s| acc.wrapping_add(self.read(s))),
        };
        Some(v)
    }

    /// Write a value; true if it changed. Output bits update their word.
    fn store(&mut self, net: &LinkedNetwork, id: NodeId, v: i64) -> bool {
        let Some(p) = self.position.get(id.index()).copied().flatten() else {
            return false;
        };
        if self.values[p] == v {
            return false;
        }
        self.values[p] = v;
        let node = net.node(id);
        if let (Role::OutBit, Some(IoLink::Bit { mask, word })) = (node.role, node.io) {
            if let Some(w) = self.position.get(word.index()).copied().flatten() {
                if v != 0 {
                    self.values[w] |= i64::from(mask);
                } else {
                    self.values[w] &= !i64::from(mask);
                }
            }
        }
        true
    }

    /// Propagate changes along activity lists until nothing changes.
    fn settle(&mut self, net: &LinkedNetwork, mut queue: VecDeque<NodeId>) -> Result<usize, SimError> {
        let mut steps = 0;
        while let Some(src) = queue.pop_front() {
            let activity = net.activity(src);
            for c in activity.normal().chain(activity.inverted()) {
                steps += 1;
                if steps > self.settle_limit {
                    return Err(SimError::Oscillation {
                        node: net.name(c).to_string(),
                        steps: self.settle_limit,
                    });
                }
                if let Some(v) = self.eval(net, c) {
                    if self.store(net, c, v) {
                        queue.push_back(c);
                    }
                }
            }
        }
        Ok(steps)
    }
}
