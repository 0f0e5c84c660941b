// symtab.rs — PASS 2: symbol table, slice placement and advisory warnings
//
// Enters the clock first and then every listed node in module order, and
// places each source's activity-list slice in the arena in that same
// order: gates get `fan_out + 2` slots, arithmetic sources `fan_out + 1`.
// The closing terminator of each slice is written here; the fill passes
// write the rest backwards from it. The table is then sorted by name.
//
// Preconditions: arena allocated from the final counts.
// Postconditions: table length == total nodes; slices tile the arena
//   exactly; table sorted by name (stable) after `sort_symbols`.
// Failure modes: size mismatches are internal errors and abort.
// Side effects: sets `Node::slice`, writes closing terminators.

use serde::Serialize;

use crate::alloc::{Allocation, Slot};
use crate::count::LinkTotals;
use crate::diag::{codes, Diagnostic, DiagSink, PassResult};
use crate::id::NodeId;
use crate::network::{ArenaSlice, IoLink, Network, Node, NodeKind, Role};
use crate::pass::PassId;

const PHASE: PassId = PassId::Symbols;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolTable {
    entries: Vec<NodeId>,
}

impl SymbolTable {
    pub fn entries(&self) -> &[NodeId] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.entries.iter().copied()
    }

    /// Binary search by name; valid once sorted.
    pub fn lookup(&self, nodes: &[Node], name: &str) -> Option<NodeId> {
        self.entries
            .binary_search_by(|id| nodes[id.index()].name.as_str().cmp(name))
            .ok()
            .map(|i| self.entries[i])
    }
}

pub fn build_symbols(
    net: &mut Network,
    totals: &LinkTotals,
    alloc: &mut Allocation,
    sink: &mut DiagSink,
) -> PassResult<SymbolTable> {
    let mut entries = std::mem::take(&mut alloc.table);
    entries.push(net.clock);
    entries.extend(net.listed());

    if entries.len() != totals.nodes {
        return Err(sink.internal(Diagnostic::error(
            PHASE,
            codes::E0901,
            format!("symbol table holds {} nodes but {} were counted", entries.len(), totals.nodes),
        )));
    }

    let mut next = 0;
    for &id in &entries {
        let node = net.node_mut(id);
        node.slice = None;
        if node.is_alias() {
            continue;
        }
        let Some(terminators) = node.role.terminators() else {
            continue;
        };
        let slice = ArenaSlice {
            start: next,
            len: node.counts.fan_out as usize + terminators,
        };
        node.slice = Some(slice);
        next = slice.end();
        if alloc.arena.write(slice.end() - 1, Slot::End).is_err() {
            let name = net.name(id).to_string();
            return Err(sink.internal(
                Diagnostic::error(
                    PHASE,
                    codes::E0902,
                    format!("slice of '{}' ends at {} beyond the arena of {} links", name, slice.end(), totals.links),
                )
                .with_node(name),
            ));
        }
    }
    if next != totals.links {
        return Err(sink.internal(Diagnostic::error(
            PHASE,
            codes::E0902,
            format!("slices cover {} links but {} were counted", next, totals.links),
        )));
    }

    for &id in &entries {
        warn_unconnected(net.node(id), sink);
    }
    Ok(SymbolTable { entries })
}

fn warn_unconnected(node: &Node, sink: &mut DiagSink) {
    if node.is_alias() {
        return;
    }
    let source_only = matches!(node.kind, NodeKind::Input | NodeKind::Constant | NodeKind::Clock)
        || matches!(node.io, Some(IoLink::Bits(_)));
    if node.counts.fan_in == 0 && !source_only {
        sink.warning(
            Diagnostic::warning(PHASE, codes::W0301, format!("'{}' has no input", node.name))
                .with_node(node.name.clone()),
        );
    }
    let sink_only = matches!(node.role, Role::Transfer | Role::OutWord | Role::OutBit)
        || node.kind == NodeKind::Clock;
    if node.counts.fan_out == 0 && node.counts.delay_refs == 0 && !sink_only {
        sink.warning(
            Diagnostic::warning(PHASE, codes::W0302, format!("'{}' has no output", node.name))
                .with_node(node.name.clone()),
        );
    }
}

/// Stable sort by name.
pub fn sort_symbols(table: &mut SymbolTable, net: &Network) {
    table.entries.sort_by(|a, b| net.name(*a).cmp(net.name(*b)));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocate;
    use crate::count::count;
    use crate::network::{LogicOp, Node};

    fn symbols(net: &mut Network) -> (SymbolTable, Allocation, DiagSink) {
        let mut sink = DiagSink::new(100);
        let totals = count(net, PassId::Count, &mut sink).unwrap();
        let mut alloc = allocate(&totals, &mut sink).unwrap();
        let table = build_symbols(net, &totals, &mut alloc, &mut sink).unwrap();
        (table, alloc, sink)
    }

    fn and_network() -> (Network, [NodeId; 3]) {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.1"));
        let b = net.add_node(m, Node::input_bit("IX0.0"));
        let g = net.add_node(m, Node::gate("A1", LogicOp::And));
        net.connect(a, g, false);
        net.connect(b, g, false);
        (net, [a, b, g])
    }

    #[test]
    fn clock_first_then_module_order() {
        let (mut net, [a, b, g]) = and_network();
        let (table, _, _) = symbols(&mut net);
        assert_eq!(table.entries(), &[net.clock, a, b, g]);
    }

    #[test]
    fn slices_tile_the_arena_in_module_order() {
        let (mut net, [a, b, g]) = and_network();
        let (_, alloc, _) = symbols(&mut net);
        assert_eq!(net.node(a).slice, Some(ArenaSlice { start: 0, len: 3 }));
        assert_eq!(net.node(b).slice, Some(ArenaSlice { start: 3, len: 3 }));
        assert_eq!(net.node(g).slice, Some(ArenaSlice { start: 6, len: 2 }));
        assert_eq!(net.node(net.clock).slice, None);
        assert_eq!(alloc.arena.len(), 8);
        // only closing terminators are written so far
        let ends: Vec<usize> = alloc
            .arena
            .slots()
            .iter()
            .enumerate()
            .filter(|(_, s)| **s == Slot::End)
            .map(|(i, _)| i)
            .collect();
        assert_eq!(ends, vec![2, 5, 7]);
    }

    #[test]
    fn unconnected_gate_warns_both_ways() {
        let mut net = Network::new();
        let m = net.add_module("m");
        net.add_node(m, Node::gate("lonely", LogicOp::Or));
        let (_, _, sink) = symbols(&mut net);
        let found: Vec<_> = sink.diagnostics().iter().filter_map(|d| d.code).collect();
        assert_eq!(found, vec![codes::W0301, codes::W0302]);
        assert!(!sink.has_errors());
    }

    #[test]
    fn output_gate_has_no_output_warning() {
        let (mut net, _) = and_network();
        let (_, _, sink) = symbols(&mut net);
        let messages: Vec<String> = sink.diagnostics().iter().map(|d| d.message.clone()).collect();
        assert_eq!(messages, vec!["'A1' has no output"]);
    }

    #[test]
    fn sort_is_by_name_and_stable() {
        let (mut net, [a, b, g]) = and_network();
        let (mut table, _, _) = symbols(&mut net);
        sort_symbols(&mut table, &net);
        assert_eq!(table.entries(), &[g, b, a, net.clock]);
        assert_eq!(table.lookup(&net.nodes, "IX0.1"), Some(a));
        assert_eq!(table.lookup(&net.nodes, "nope"), None);
    }

    #[test]
    fn mismatched_totals_abort() {
        let (mut net, _) = and_network();
        let mut sink = DiagSink::new(100);
        let mut totals = count(&mut net, PassId::Count, &mut sink).unwrap();
        totals.nodes += 1;
        let mut alloc = allocate(&totals, &mut sink).unwrap();
        let err = build_symbols(&mut net, &totals, &mut alloc, &mut sink).unwrap_err();
        assert_eq!(err, crate::diag::Abort::Internal);
        assert_eq!(sink.diagnostics().last().and_then(|d| d.code), Some(codes::E0901));
    }
}
