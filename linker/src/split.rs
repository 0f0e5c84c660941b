// split.rs — Gate-width splitting
//
// The execution engine caps the fan-in of a gate at `W`. An AND or OR gate
// with `N > W` inputs keeps `direct` of its inputs and receives the output
// of `div` auxiliary gates of the same operation, which take the remaining
// inputs in order, at most `W` each:
//
//   div = N / W;  rem = N % W;  direct = W - div
//   if direct < rem { div += 1; direct -= 1 }
//
// "In order" is the order left by PASS 1: all normal inputs, then all
// inverted ones. Declaration order is not kept, so a gate that mixes
// polarities splits at different inputs than its source text suggests.
// The combined function is the same either way.
//
// Auxiliary gates are named from the original by stripping a trailing
// `_<digits>` and appending `_<k>` with the first free serial `k`.
//
// Preconditions: PASS 1 complete (inputs resolved, fan-in counted).
// Postconditions: every AND/OR gate has at most `W` inputs; the caller
//   re-runs counting before any counts are read.
// Failure modes: XOR and LATCH gates over the width cannot be split (the
//   combined function would change); gates needing more than one level
//   of splitting are rejected.
// Side effects: adds auxiliary gates after the original in its module.

use std::collections::HashMap;

use serde::Serialize;

use crate::diag::{codes, Diagnostic, DiagSink, PassResult};
use crate::id::NodeId;
use crate::network::{Combine, InputList, LogicOp, Network, Node};
use crate::pass::PassId;

pub const DEFAULT_GATE_WIDTH: usize = 127;

/// How an oversized gate is divided.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SplitPlan {
    /// Number of auxiliary gates.
    pub aux: usize,
    /// Inputs kept directly on the original gate.
    pub direct: usize,
}

/// Plan the split of a gate with `inputs > width` inputs. `None` when one
/// level of auxiliary gates cannot hold them all.
pub fn plan(inputs: usize, width: usize) -> Option<SplitPlan> {
    if width < 2 || inputs <= width {
        return None;
    }
    let mut div = inputs / width;
    let rem = inputs % width;
    if div > width {
        return None;
    }
    let mut direct = width - div;
    if direct < rem {
        if direct == 0 {
            return None;
        }
        div += 1;
        direct -= 1;
    }
    Some(SplitPlan { aux: div, direct })
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SplitRecord {
    pub target: NodeId,
    pub name: String,
    pub inputs: usize,
    pub plan: SplitPlan,
    pub aux: Vec<NodeId>,
}

pub fn split_wide_gates(net: &mut Network, width: usize, sink: &mut DiagSink) -> PassResult<Vec<SplitRecord>> {
    let mut names = net.name_index();
    let mut records = Vec::new();
    let listed: Vec<NodeId> = net.listed().collect();

    for id in listed {
        let node = net.node(id);
        let Some(Combine::Logic(op)) = node.kind.combine() else {
            continue;
        };
        let n = node.inputs.len();
        if n <= width {
            continue;
        }
        if matches!(op, LogicOp::Xor | LogicOp::Latch) {
            sink.error(
                Diagnostic::error(
                    PassId::Split,
                    codes::E0209,
                    format!("'{}' has {} inputs, more than the gate width {}", node.name, n, width),
                )
                .with_node(node.name.clone())
                .with_hint(format!("{:?} gates cannot be split; restructure the expression", op)),
            )?;
            continue;
        }
        let Some(split_plan) = plan(n, width) else {
            sink.error(
                Diagnostic::error(
                    PassId::Split,
                    codes::E0209,
                    format!("'{}' has {} inputs, too many to split at gate width {}", node.name, n, width),
                )
                .with_node(node.name.clone()),
            )?;
            continue;
        };
        records.push(split_gate(net, id, op, split_plan, width, &mut names));
    }
    Ok(records)
}

fn split_gate(
    net: &mut Network,
    id: NodeId,
    op: LogicOp,
    plan: SplitPlan,
    width: usize,
    names: &mut HashMap<String, NodeId>,
) -> SplitRecord {
    let node = net.node(id);
    let name = node.name.clone();
    let all: Vec<(NodeId, bool)> = node.inputs.iter().collect();
    let (base, mut serial) = aux_base(&name);

    let mut kept = InputList::default();
    let mut aux_ids = Vec::with_capacity(plan.aux);
    let module = node.module;
    let mut position = module.and_then(|m| net.modules[m.index()].nodes.iter().position(|&n| n == id));

    for chunk in all[plan.direct..].chunks(width) {
        let aux_name = next_free(&base, &mut serial, names);
        let aux = net.add_floating(Node::gate(aux_name.clone(), op));
        if let (Some(m), Some(pos)) = (module, position) {
            net.insert_listed(m, pos, aux);
            position = Some(pos + 1);
        }
        for &(src, inverted) in chunk {
            net.connect(src, aux, inverted);
        }
        names.insert(aux_name, aux);
        aux_ids.push(aux);
    }

    kept.normal.extend(aux_ids.iter().copied());
    for &(src, inverted) in &all[..plan.direct] {
        if inverted {
            kept.inverted.push(src);
        } else {
            kept.normal.push(src);
        }
    }
    net.node_mut(id).inputs = kept;

    SplitRecord {
        target: id,
        name,
        inputs: all.len(),
        plan,
        aux: aux_ids,
    }
}

/// `A1_3` -> (`A1`, 3); names without a numeric suffix start at 0.
fn aux_base(name: &str) -> (String, u32) {
    if let Some(pos) = name.rfind('_') {
        let digits = &name[pos + 1..];
        if !digits.is_empty() && digits.bytes().all(|b| b.is_ascii_digit()) {
            if let Ok(serial) = digits.parse() {
                return (name[..pos].to_string(), serial);
            }
        }
    }
    (name.to_string(), 0)
}

fn next_free(base: &str, serial: &mut u32, names: &HashMap<String, NodeId>) -> String {
    loop {
        *serial += 1;
        let candidate = format!("{}_{}", base, serial);
        if !names.contains_key(&candidate) {
            return candidate;
        }
    }
}
