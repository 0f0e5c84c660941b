// linked.rs — The frozen result of a successful link
//
// `LinkedNetwork` owns the nodes, the filled arena, the sorted symbol
// table and the I/O map. It exposes them read-only: after validation the
// structure is never mutated again. Backends (C emitter, interpreter)
// consume it through the `Backend` trait.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::alloc::Slot;
use crate::id::NodeId;
use crate::network::{ArenaSlice, Module, Network, Node};
use crate::split::SplitRecord;
use crate::symtab::SymbolTable;
use crate::validate::IoMap;

/// Statistics of one link, sized for backends that allocate storage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkStats {
    /// Symbol table entries.
    pub nodes: usize,
    /// Arena slots.
    pub links: usize,
    pub per_kind: BTreeMap<&'static str, usize>,
    pub splits: usize,
    pub aux_gates: usize,
    pub xor_sources: usize,
    pub io_bindings: usize,
}

#[derive(Debug, Clone)]
pub struct LinkedNetwork {
    nodes: Vec<Node>,
    modules: Vec<Module>,
    clock: NodeId,
    arena: Vec<Slot>,
    symbols: SymbolTable,
    io: IoMap,
    splits: Vec<SplitRecord>,
    stats: LinkStats,
}

impl LinkedNetwork {
    pub(crate) fn new(
        network: Network,
        arena: Vec<Slot>,
        symbols: SymbolTable,
        io: IoMap,
        splits: Vec<SplitRecord>,
        stats: LinkStats,
    ) -> Self {
        LinkedNetwork {
            nodes: network.nodes,
            modules: network.modules,
            clock: network.clock,
            arena,
            symbols,
            io,
            splits,
            stats,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.index()]
    }

    pub fn name(&self, id: NodeId) -> &str {
        &self.nodes[id.index()].name
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn modules(&self) -> &[Module] {
        &self.modules
    }

    pub fn clock(&self) -> NodeId {
        self.clock
    }

    /// Symbol table, sorted by name.
    pub fn symbols(&self) -> &SymbolTable {
        &self.symbols
    }

    pub fn lookup(&self, name: &str) -> Option<NodeId> {
        self.symbols.lookup(&self.nodes, name)
    }

    pub fn arena(&self) -> &[Slot] {
        &self.arena
    }

    pub fn io(&self) -> &IoMap {
        &self.io
    }

    pub fn splits(&self) -> &[SplitRecord] {
        &self.splits
    }

    pub fn stats(&self) -> &LinkStats {
        &self.stats
    }

    /// The activity list of `id`: the consumers to schedule when it changes.
    pub fn activity(&self, id: NodeId) -> Activity<'_> {
        let node = self.node(id);
        let Some(ArenaSlice { start, len }) = node.slice else {
            return Activity::default();
        };
        let slots = &self.arena[start..start + len];
        let split = slots.iter().position(|s| *s == Slot::End).unwrap_or(slots.len());
        let normal = &slots[..split];
        let inverted = if node.role.is_gate() && split < slots.len() {
            let rest = &slots[split + 1..];
            let end = rest.iter().position(|s| *s == Slot::End).unwrap_or(rest.len());
            &rest[..end]
        } else {
            &[]
        };
        Activity { normal, inverted }
    }
}

/// Read-only view of one activity list.
#[derive(Debug, Clone, Copy, Default)]
pub struct Activity<'a> {
    normal: &'a [Slot],
    inverted: &'a [Slot],
}

impl<'a> Activity<'a> {
    /// Consumers that see this node's value directly.
    pub fn normal(&self) -> impl Iterator<Item = NodeId> + 'a {
        linked_nodes(self.normal)
    }

    /// Consumers that see this node's value inverted.
    pub fn inverted(&self) -> impl Iterator<Item = NodeId> + 'a {
        linked_nodes(self.inverted)
    }

    pub fn len(&self) -> usize {
        self.normal.len() + self.inverted.len()
    }

    pub fn is_empty(&self) -> bool {
        self.normal.is_empty() && self.inverted.is_empty()
    }
}

fn linked_nodes(slots: &[Slot]) -> impl Iterator<Item = NodeId> + '_ {
    slots.iter().filter_map(|s| match s {
        Slot::Link(id) => Some(*id),
        _ => None,
    })
}

/// A consumer of a linked network.
pub trait Backend {
    type Output;

    fn name(&self) -> &'static str;

    fn run(&mut self, net: &LinkedNetwork) -> Self::Output;
}
