// fill.rs — PASS 3-5: backward fill of activity lists
//
// Each source's slice is filled from its closing terminator towards its
// start with one cursor per node, walking the sorted symbol table three
// times:
//
//   PASS 3  inverted consumers of every logic node
//   PASS 4  the terminator that closes the normal part of every gate
//   PASS 5  normal consumers of every logic and arithmetic node
//
// giving `[normal.., End, inverted.., End]` for gates and
// `[normal.., End]` for arithmetic sources. A gate feeding an XOR is
// re-roled `GateXor` on the way.
//
// Preconditions: slices placed and closing terminators written (PASS 2),
//   table sorted.
// Postconditions: every cursor is back at its slice start and no arena
//   slot is vacant.
// Failure modes: any overflow, double write or unfilled slot is an
//   internal error and aborts.
// Side effects: writes the arena, sets `Role::GateXor`.

use crate::alloc::{Arena, Slot, SlotError};
use crate::diag::{codes, Diagnostic, DiagSink, PassResult};
use crate::id::NodeId;
use crate::network::{Combine, LogicOp, Network, Role};
use crate::pass::PassId;
use crate::symtab::SymbolTable;

const PHASE: PassId = PassId::Fill;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillStats {
    /// Gates re-roled because they feed an XOR.
    pub xor_sources: usize,
}

pub fn fill_activity(
    net: &mut Network,
    table: &SymbolTable,
    arena: &mut Arena,
    sink: &mut DiagSink,
) -> PassResult<FillStats> {
    let cursors = net
        .nodes
        .iter()
        .map(|n| n.slice.map(|s| s.end() - 1))
        .collect();
    let mut writer = Writer {
        net,
        arena,
        sink,
        cursors,
        stats: FillStats::default(),
    };

    // PASS 3
    for op in table.iter() {
        if !writer.net.node(op).has_logic_inputs() {
            continue;
        }
        let inverted = writer.net.node(op).inputs.inverted.clone();
        for src in inverted {
            writer.mark_xor(op, src);
            writer.push(src, Slot::Link(op))?;
        }
    }

    // PASS 4
    for id in table.iter() {
        let node = writer.net.node(id);
        if node.role.is_gate() && !node.is_alias() {
            writer.push(id, Slot::End)?;
        }
    }

    // PASS 5
    for op in table.iter() {
        let node = writer.net.node(op);
        let normal = node.inputs.normal.clone();
        match node.kind.combine() {
            Some(Combine::Logic(_)) => {
                for src in normal {
                    writer.mark_xor(op, src);
                    writer.push(src, Slot::Link(op))?;
                }
            }
            Some(Combine::Arithmetic) => {
                for src in normal {
                    if writer.net.node(src).role == Role::Arith {
                        writer.push(src, Slot::Link(op))?;
                    }
                }
            }
            None => {}
        }
    }

    writer.verify(table)?;
    Ok(writer.stats)
}

struct Writer<'a> {
    net: &'a mut Network,
    arena: &'a mut Arena,
    sink: &'a mut DiagSink,
    cursors: Vec<Option<usize>>,
    stats: FillStats,
}

impl Writer<'_> {
    fn internal(&mut self, node: NodeId, message: String) -> crate::diag::Abort {
        let name = self.net.name(node).to_string();
        self.sink
            .internal(Diagnostic::error(PHASE, codes::E0903, message).with_node(name))
    }

    fn mark_xor(&mut self, op: NodeId, src: NodeId) {
        if self.net.node(op).kind.combine() != Some(Combine::Logic(LogicOp::Xor)) {
            return;
        }
        let source = self.net.node_mut(src);
        if source.role == Role::Gate {
            source.role = Role::GateXor;
            self.stats.xor_sources += 1;
        }
    }

    /// Write `slot` just below `src`'s cursor.
    fn push(&mut self, src: NodeId, slot: Slot) -> PassResult<()> {
        let (Some(slice), Some(cursor)) = (self.net.node(src).slice, self.cursors[src.index()]) else {
            let message = format!("'{}' receives a link but owns no activity list", self.net.name(src));
            return Err(self.internal(src, message));
        };
        if cursor == slice.start {
            let message = format!("activity list of '{}' overflows its {} slots", self.net.name(src), slice.len);
            return Err(self.internal(src, message));
        }
        let cursor = cursor - 1;
        self.cursors[src.index()] = Some(cursor);
        match self.arena.write(cursor, slot) {
            Ok(()) => Ok(()),
            Err(SlotError::Occupied(_)) | Err(SlotError::OutOfRange) => {
                let message = format!("arena slot {} of '{}' written twice", cursor, self.net.name(src));
                Err(self.internal(src, message))
            }
        }
    }

    fn verify(&mut self, table: &SymbolTable) -> PassResult<()> {
        for id in table.iter() {
            let (Some(slice), Some(cursor)) = (self.net.node(id).slice, self.cursors[id.index()]) else {
                continue;
            };
            if cursor != slice.start {
                let message = format!(
                    "activity list of '{}' has {} unfilled slots",
                    self.net.name(id),
                    cursor - slice.start
                );
                return Err(self.internal(id, message));
            }
        }
        if let Some(index) = self.arena.first_vacant() {
            return Err(self.sink.internal(Diagnostic::error(
                PHASE,
                codes::E0903,
                format!("arena slot {} was never written", index),
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alloc::allocate;
    use crate::count::count;
    use crate::network::{Node, NodeKind};
    use crate::symtab::{build_symbols, sort_symbols};

    fn link(net: &mut Network) -> (Arena, PassResult<FillStats>) {
        let mut sink = DiagSink::new(100);
        let totals = count(net, PassId::Count, &mut sink).unwrap();
        let mut alloc = allocate(&totals, &mut sink).unwrap();
        let mut table = build_symbols(net, &totals, &mut alloc, &mut sink).unwrap();
        sort_symbols(&mut table, net);
        let stats = fill_activity(net, &table, &mut alloc.arena, &mut sink);
        (alloc.arena, stats)
    }

    fn slice_of(net: &Network, arena: &Arena, id: NodeId) -> Vec<Slot> {
        let s = net.node(id).slice.unwrap();
        arena.slots()[s.start..s.end()].to_vec()
    }

    #[test]
    fn gate_layout_is_normal_end_inverted_end() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let g1 = net.add_node(m, Node::gate("A1", LogicOp::And));
        let g2 = net.add_node(m, Node::gate("B1", LogicOp::Or));
        let g3 = net.add_node(m, Node::gate("C1", LogicOp::Or));
        net.connect(a, g1, false);
        net.connect(a, g2, true);
        net.connect(a, g3, false);
        let (arena, stats) = link(&mut net);
        assert_eq!(stats, Ok(FillStats::default()));
        assert_eq!(
            slice_of(&net, &arena, a),
            vec![Slot::Link(g3), Slot::Link(g1), Slot::End, Slot::Link(g2), Slot::End]
        );
        assert_eq!(slice_of(&net, &arena, g1), vec![Slot::End, Slot::End]);
        assert_eq!(arena.first_vacant(), None);
    }

    #[test]
    fn arith_layout_has_one_terminator() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let w = net.add_node(m, Node::new("IB1", NodeKind::Input, Role::Arith));
        let n = net.add_node(m, Node::arith("N1"));
        net.connect(w, n, false);
        let (arena, stats) = link(&mut net);
        assert!(stats.is_ok());
        assert_eq!(slice_of(&net, &arena, w), vec![Slot::Link(n), Slot::End]);
        assert_eq!(slice_of(&net, &arena, n), vec![Slot::End]);
    }

    #[test]
    fn xor_source_is_reroled() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let b = net.add_node(m, Node::input_bit("IX0.1"));
        let x = net.add_node(m, Node::gate("X1", LogicOp::Xor));
        net.connect(a, x, false);
        net.connect(b, x, true);
        let (_, stats) = link(&mut net);
        assert_eq!(stats, Ok(FillStats { xor_sources: 2 }));
        assert_eq!(net.node(a).role, Role::GateXor);
        assert_eq!(net.node(b).role, Role::GateXor);
        assert_eq!(net.node(x).role, Role::Gate);
    }

    #[test]
    fn stale_counts_are_detected() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let g = net.add_node(m, Node::gate("A1", LogicOp::And));
        net.connect(a, g, false);
        let mut sink = DiagSink::new(100);
        let totals = count(&mut net, PassId::Count, &mut sink).unwrap();
        let mut alloc = allocate(&totals, &mut sink).unwrap();
        let table = build_symbols(&mut net, &totals, &mut alloc, &mut sink).unwrap();
        // an edge added after counting has no slot
        net.connect(a, g, true);
        let err = fill_activity(&mut net, &table, &mut alloc.arena, &mut sink);
        assert_eq!(err, Err(crate::diag::Abort::Internal));
        assert_eq!(sink.diagnostics().last().and_then(|d| d.code), Some(codes::E0903));
    }
}
