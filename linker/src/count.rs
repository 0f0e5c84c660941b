// count.rs — PASS 1: alias resolution, fan-in/fan-out counting, edge checks
//
// Walks every module list in order. For each consumer it resolves input
// references through aliases (moving edges between the normal and the
// inverted list when an alias inverts), counts fan-in on the consumer and
// fan-out on the source, and checks that each edge is legal for the
// consumer's combining function. Actions count their slave, clock and
// delay. The totals size the arena and the symbol table.
//
// Preconditions: bit I/O aggregated (PASS 0).
// Postconditions: input references point at non-alias nodes; `counts` of
//   every node is exact; `LinkTotals::links` equals the sum over listed
//   non-alias sources of fan-out plus terminators.
// Failure modes: illegal edges, alias cycles, dangling references and
//   incomplete actions are recorded as errors; the walk continues.
// Side effects: rewrites input references and action links, resets and
//   rewrites `counts` and `back_ref`, splices floating constants into the
//   module that first references them.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::alias::{self, AliasError, Resolved};
use crate::diag::{codes, DiagCode, Diagnostic, DiagSink, PassResult};
use crate::id::{ModuleId, NodeId};
use crate::network::{ActionKind, Combine, Counts, InputList, Network, NodeKind, Role};
use crate::pass::PassId;

/// Network-wide totals produced by the counting walk.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LinkTotals {
    /// Symbol table entries: listed nodes plus the clock.
    pub nodes: usize,
    /// Arena slots: activity links plus terminators.
    pub links: usize,
    pub per_kind: BTreeMap<&'static str, usize>,
}

impl LinkTotals {
    fn record(&mut self, kind: NodeKind) {
        self.nodes += 1;
        *self.per_kind.entry(kind.label()).or_insert(0) += 1;
    }
}

/// Position in the module walk, used to splice constants after the
/// node currently being counted.
struct Cursor {
    module: ModuleId,
    splice_at: usize,
}

pub fn count(net: &mut Network, phase: PassId, sink: &mut DiagSink) -> PassResult<LinkTotals> {
    for node in &mut net.nodes {
        node.counts = Counts::default();
        node.back_ref = None;
    }

    let mut totals = LinkTotals::default();
    totals.record(net.node(net.clock).kind);

    let mut counter = Counter { net, phase, sink };
    for m in 0..counter.net.modules.len() {
        let mut i = 0;
        while i < counter.net.modules[m].nodes.len() {
            let id = counter.net.modules[m].nodes[i];
            let mut cursor = Cursor {
                module: ModuleId(m as u32),
                splice_at: i,
            };
            let kind = counter.net.node(id).kind;
            totals.record(kind);

            match kind.combine() {
                Some(Combine::Arithmetic) => counter.arith_inputs(id, &mut cursor, &mut totals)?,
                Some(Combine::Logic(_)) => counter.logic_inputs(id, &mut cursor, &mut totals)?,
                None => {
                    if !counter.net.node(id).inputs.is_empty() {
                        let name = counter.net.name(id).to_string();
                        counter.error(
                            codes::E0210,
                            format!("'{}' of kind {} cannot have inputs", name, kind.label()),
                            &[&name],
                        )?;
                    }
                }
            }
            if let NodeKind::Action(action, _) = kind {
                counter.action(id, action, &mut cursor)?;
            }

            let node = counter.net.node(id);
            if !node.is_alias() {
                if let Some(terminators) = node.role.terminators() {
                    totals.links += terminators;
                }
            }
            i += 1;
        }
    }
    Ok(totals)
}

struct Counter<'a> {
    net: &'a mut Network,
    phase: PassId,
    sink: &'a mut DiagSink,
}

impl Counter<'_> {
    fn error(&mut self, code: DiagCode, message: String, nodes: &[&str]) -> PassResult<()> {
        let mut diag = Diagnostic::error(self.phase, code, message);
        for n in nodes {
            diag = diag.with_node(*n);
        }
        self.sink.error(diag)
    }

    /// Resolve a reference made by `consumer`. `None` after an error.
    fn resolve(&mut self, consumer: NodeId, raw: NodeId) -> PassResult<Option<Resolved>> {
        match alias::resolve(&mut self.net.nodes, raw) {
            Ok(r) => Ok(Some(r)),
            Err(AliasError::Cycle { start }) => {
                let (alias, user) = (self.net.name(start).to_string(), self.net.name(consumer).to_string());
                self.error(
                    codes::E0202,
                    format!("alias '{}' used by '{}' is part of an alias cycle", alias, user),
                    &[&alias, &user],
                )?;
                Ok(None)
            }
            Err(AliasError::Dangling { alias }) => {
                let (alias, user) = (self.net.name(alias).to_string(), self.net.name(consumer).to_string());
                self.error(
                    codes::E0213,
                    format!("alias '{}' used by '{}' has no target", alias, user),
                    &[&alias, &user],
                )?;
                Ok(None)
            }
        }
    }

    /// Make sure a referenced node is in a module list. Floating constants
    /// are spliced in after the current node; anything else is dangling.
    fn ensure_listed(&mut self, consumer: NodeId, src: NodeId, cursor: &mut Cursor) -> PassResult<bool> {
        let node = self.net.node(src);
        if node.module.is_some() || src == self.net.clock {
            return Ok(true);
        }
        if node.kind == NodeKind::Constant {
            self.net.insert_listed(cursor.module, cursor.splice_at, src);
            cursor.splice_at += 1;
            return Ok(true);
        }
        let (s, c) = (node.name.clone(), self.net.name(consumer).to_string());
        self.error(
            codes::E0213,
            format!("'{}' references '{}' which belongs to no module", c, s),
            &[&s, &c],
        )?;
        Ok(false)
    }

    fn arith_inputs(&mut self, id: NodeId, cursor: &mut Cursor, totals: &mut LinkTotals) -> PassResult<()> {
        let raw = std::mem::take(&mut self.net.node_mut(id).inputs);
        let mut resolved = InputList::default();

        for &inv in &raw.inverted {
            let (s, c) = (self.net.name(inv).to_string(), self.net.name(id).to_string());
            self.error(
                codes::E0204,
                format!("arithmetic node '{}' has inverted input '{}'", c, s),
                &[&s, &c],
            )?;
        }

        for &input in &raw.normal {
            let Some(r) = self.resolve(id, input)? else {
                continue;
            };
            let src = r.node;
            resolved.normal.push(src);
            self.net.node_mut(id).counts.fan_in += 1;
            let role = self.net.node(src).role;
            match role {
                Role::Arith => {
                    if self.ensure_listed(id, src, cursor)? {
                        self.net.node_mut(src).counts.fan_out += 1;
                        totals.links += 1;
                    }
                }
                _ => {
                    let (s, c) = (self.net.name(src).to_string(), self.net.name(id).to_string());
                    self.error(
                        codes::E0204,
                        format!("'{}' has arithmetic input '{}' which is not arithmetic", c, s),
                        &[&s, &c],
                    )?;
                }
            }
        }
        self.net.node_mut(id).inputs = resolved;
        Ok(())
    }

    fn logic_inputs(&mut self, id: NodeId, cursor: &mut Cursor, totals: &mut LinkTotals) -> PassResult<()> {
        let raw = std::mem::take(&mut self.net.node_mut(id).inputs);
        let mut resolved = InputList::default();

        for (input, inverted) in raw.iter() {
            let Some(r) = self.resolve(id, input)? else {
                continue;
            };
            let src = r.node;
            if inverted ^ r.invert {
                resolved.inverted.push(src);
            } else {
                resolved.normal.push(src);
            }
            self.net.node_mut(id).counts.fan_in += 1;
            if self.net.node(src).role.is_gate() {
                if self.ensure_listed(id, src, cursor)? {
                    self.net.node_mut(src).counts.fan_out += 1;
                    totals.links += 1;
                }
            } else {
                let (s, c) = (self.net.name(src).to_string(), self.net.name(id).to_string());
                self.error(
                    codes::E0203,
                    format!("'{}' has logic input '{}' which is not a gate", c, s),
                    &[&s, &c],
                )?;
            }
        }
        self.net.node_mut(id).inputs = resolved;
        Ok(())
    }

    fn action(&mut self, id: NodeId, kind: ActionKind, cursor: &mut Cursor) -> PassResult<()> {
        // the action itself is the master's output
        self.net.node_mut(id).counts.fan_out += 1;
        let name = self.net.name(id).to_string();

        let Some(links) = self.net.node(id).action else {
            return self.error(
                codes::E0205,
                format!("action '{}' has no slave and no clock", name),
                &[&name],
            );
        };
        let mut fixed = links;

        match links.slave {
            Some(raw) => {
                if let Some(r) = self.resolve(id, raw)? {
                    fixed.slave = Some(r.node);
                    if self.ensure_listed(id, r.node, cursor)? {
                        self.net.node_mut(r.node).counts.fan_in += 1;
                        if kind == ActionKind::ShiftHold {
                            self.link_back(id, r.node)?;
                        }
                    }
                }
            }
            None if kind.is_function_block() => {}
            None => {
                self.error(
                    codes::E0205,
                    format!("action '{}' ({}) has no slave", name, kind.mnemonic()),
                    &[&name],
                )?;
            }
        }

        let Some(raw) = links.clock else {
            self.error(
                codes::E0206,
                format!("action '{}' has no clock or timer", name),
                &[&name],
            )?;
            self.net.node_mut(id).action = Some(fixed);
            return Ok(());
        };
        if let Some(r) = self.resolve(id, raw)? {
            fixed.clock = Some(r.node);
            let role = self.net.node(r.node).role;
            match role {
                Role::Clock | Role::Timer => {
                    if self.ensure_listed(id, r.node, cursor)? {
                        self.net.node_mut(r.node).counts.fan_out += 1;
                    }
                    if role == Role::Timer {
                        fixed.delay = self.delay(id, links.delay, cursor)?;
                    }
                }
                _ => {
                    let clock = self.net.name(r.node).to_string();
                    self.error(
                        codes::E0206,
                        format!("action '{}' is clocked by '{}' which is neither a clock nor a timer", name, clock),
                        &[&clock, &name],
                    )?;
                }
            }
        }
        self.net.node_mut(id).action = Some(fixed);
        Ok(())
    }

    fn delay(&mut self, id: NodeId, raw: Option<NodeId>, cursor: &mut Cursor) -> PassResult<Option<NodeId>> {
        let Some(raw) = raw else {
            let name = self.net.name(id).to_string();
            self.error(
                codes::E0207,
                format!("action '{}' is timed but has no delay", name),
                &[&name],
            )?;
            return Ok(None);
        };
        let Some(r) = self.resolve(id, raw)? else {
            return Ok(None);
        };
        if self.ensure_listed(id, r.node, cursor)? {
            self.net.node_mut(r.node).counts.delay_refs += 1;
        }
        Ok(Some(r.node))
    }

    fn link_back(&mut self, master: NodeId, slave: NodeId) -> PassResult<()> {
        let current = self.net.node(slave).back_ref;
        match current {
            Some(prev) if prev != master => {
                let (p, m, s) = (
                    self.net.name(prev).to_string(),
                    self.net.name(master).to_string(),
                    self.net.name(slave).to_string(),
                );
                self.error(
                    codes::E0208,
                    format!("'{}' is shifted by '{}' and already linked back to '{}'", s, m, p),
                    &[&m, &s],
                )
            }
            _ => {
                self.net.node_mut(slave).back_ref = Some(master);
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{ActionLinks, LogicOp, Node};

    fn run(net: &mut Network) -> (LinkTotals, DiagSink) {
        let mut sink = DiagSink::new(100);
        let totals = count(net, PassId::Count, &mut sink).unwrap();
        (totals, sink)
    }

    #[test]
    fn two_input_and_gate() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let b = net.add_node(m, Node::input_bit("IX0.1"));
        let g = net.add_node(m, Node::gate("A1", LogicOp::And));
        net.connect(a, g, false);
        net.connect(b, g, false);
        let (totals, sink) = run(&mut net);
        assert!(!sink.has_errors());
        assert_eq!(net.node(g).counts.fan_in, 2);
        assert_eq!(net.node(a).counts.fan_out, 1);
        assert_eq!(net.node(b).counts.fan_out, 1);
        assert_eq!(net.node(g).counts.fan_out, 0);
        assert_eq!(totals.nodes, 4);
        // two links plus two terminators for each of three gates
        assert_eq!(totals.links, 2 + 3 * 2);
        assert_eq!(totals.per_kind["AND"], 1);
        assert_eq!(totals.per_kind["INPUT"], 2);
        assert_eq!(totals.per_kind["CLOCK"], 1);
    }

    #[test]
    fn inverting_alias_moves_edge_to_inverted_list() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let al = net.add_node(m, Node::new("nA", NodeKind::Alias, Role::Gate));
        let g = net.add_node(m, Node::gate("O1", LogicOp::Or));
        net.set_alias(al, a, true);
        net.connect(al, g, false);
        let (totals, sink) = run(&mut net);
        assert!(!sink.has_errors());
        assert!(net.node(g).inputs.normal.is_empty());
        assert_eq!(net.node(g).inputs.inverted, vec![a]);
        assert_eq!(net.node(al).counts, Counts::default());
        // alias has no slice: 1 link + 2 gates * 2 terminators
        assert_eq!(totals.links, 5);
        assert_eq!(totals.nodes, 4);
    }

    #[test]
    fn logic_input_from_arith_is_an_error() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let n = net.add_node(m, Node::arith("N1"));
        let g = net.add_node(m, Node::gate("A1", LogicOp::And));
        net.connect(n, g, false);
        let (_, sink) = run(&mut net);
        let d = &sink.diagnostics()[0];
        assert_eq!(d.code, Some(codes::E0203));
        assert_eq!(d.nodes, vec!["N1", "A1"]);
        assert_eq!(d.phase, PassId::Count);
    }

    #[test]
    fn arith_input_from_gate_is_an_error() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let n = net.add_node(m, Node::arith("N1"));
        net.connect(a, n, false);
        let (_, sink) = run(&mut net);
        assert_eq!(sink.diagnostics()[0].code, Some(codes::E0204));
    }

    #[test]
    fn alias_cycle_is_an_error() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let x = net.add_node(m, Node::new("x", NodeKind::Alias, Role::Gate));
        let y = net.add_node(m, Node::new("y", NodeKind::Alias, Role::Gate));
        let g = net.add_node(m, Node::gate("A1", LogicOp::And));
        net.set_alias(x, y, false);
        net.set_alias(y, x, false);
        net.connect(x, g, false);
        let (_, sink) = run(&mut net);
        let d = &sink.diagnostics()[0];
        assert_eq!(d.code, Some(codes::E0202));
        assert_eq!(d.nodes, vec!["x", "A1"]);
    }

    #[test]
    fn floating_constant_is_spliced_once() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let c = net.add_floating(Node::constant("_5", 5));
        let n1 = net.add_node(m, Node::arith("N1"));
        let n2 = net.add_node(m, Node::arith("N2"));
        net.connect(c, n1, false);
        net.connect(c, n2, false);
        let (totals, sink) = run(&mut net);
        assert!(!sink.has_errors());
        assert_eq!(net.modules[0].nodes, vec![n1, c, n2]);
        assert_eq!(net.node(c).counts.fan_out, 2);
        assert_eq!(totals.nodes, 4);
        // two links plus one terminator for each arithmetic source
        assert_eq!(totals.links, 2 + 3);
    }

    #[test]
    fn output_bit_is_not_an_arithmetic_source() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let q = net.add_node(m, Node::new("QX0.0", NodeKind::Output(Combine::Logic(LogicOp::Or)), Role::OutBit));
        let n = net.add_node(m, Node::arith("n"));
        net.connect(a, q, false);
        net.connect(q, n, false);
        let (_, sink) = run(&mut net);
        assert_eq!(sink.error_count(), 1);
        let d = &sink.diagnostics()[0];
        assert_eq!(d.code, Some(codes::E0204));
        assert_eq!(d.nodes, vec!["QX0.0", "n"]);
        assert_eq!(net.node(q).counts.fan_out, 0);
    }

    #[test]
    fn clocked_action_counts_slave_and_clock() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let act = net.add_node(
            m,
            Node::new("S1", NodeKind::Action(ActionKind::SetFlipFlop, Combine::Logic(LogicOp::And)), Role::Action),
        );
        let q = net.add_node(m, Node::new("QX0.0", NodeKind::Output(Combine::Logic(LogicOp::Or)), Role::OutBit));
        net.connect(a, act, false);
        let clock = net.clock;
        net.set_action(act, ActionLinks { slave: Some(q), clock: Some(clock), delay: None });
        let (_, sink) = run(&mut net);
        assert!(!sink.has_errors(), "{:?}", sink.diagnostics());
        assert_eq!(net.node(act).counts.fan_out, 1);
        assert_eq!(net.node(q).counts.fan_in, 1);
        assert_eq!(net.node(clock).counts.fan_out, 1);
    }

    #[test]
    fn timer_clocked_action_needs_delay() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let t = net.add_node(m, Node::new("t", NodeKind::Timer, Role::Timer));
        let d = net.add_node(m, Node::arith("d"));
        let s = net.add_node(m, Node::gate("L1", LogicOp::Latch));
        let ok = net.add_node(
            m,
            Node::new("D1", NodeKind::Action(ActionKind::DFlipFlop, Combine::Logic(LogicOp::And)), Role::Action),
        );
        let bad = net.add_node(
            m,
            Node::new("D2", NodeKind::Action(ActionKind::DFlipFlop, Combine::Logic(LogicOp::And)), Role::Action),
        );
        net.set_action(ok, ActionLinks { slave: Some(s), clock: Some(t), delay: Some(d) });
        net.set_action(bad, ActionLinks { slave: Some(s), clock: Some(t), delay: None });
        let (_, sink) = run(&mut net);
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.diagnostics()[0].code, Some(codes::E0207));
        assert_eq!(net.node(d).counts.delay_refs, 1);
        assert_eq!(net.node(t).counts.fan_out, 2);
    }

    #[test]
    fn second_shift_master_is_an_error() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let slave = net.add_node(m, Node::arith("H"));
        let clock = net.clock;
        for name in ["SH1", "SH2"] {
            let a = net.add_node(
                m,
                Node::new(name, NodeKind::Action(ActionKind::ShiftHold, Combine::Arithmetic), Role::Action),
            );
            net.set_action(a, ActionLinks { slave: Some(slave), clock: Some(clock), delay: None });
        }
        let (_, sink) = run(&mut net);
        assert_eq!(sink.error_count(), 1);
        assert_eq!(sink.diagnostics()[0].code, Some(codes::E0208));
        assert_eq!(sink.diagnostics()[0].nodes, vec!["SH2", "H"]);
    }

    #[test]
    fn recount_is_idempotent() {
        let mut net = Network::new();
        let m = net.add_module("m");
        let a = net.add_node(m, Node::input_bit("IX0.0"));
        let g = net.add_node(m, Node::gate("A1", LogicOp::And));
        net.connect(a, g, true);
        let (first, _) = run(&mut net);
        let (second, _) = run(&mut net);
        assert_eq!(first, second);
        assert_eq!(net.node(a).counts.fan_out, 1);
    }
}
