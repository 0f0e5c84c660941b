// bitio.rs — PASS 0: bit I/O aggregation
//
// Attaches every bit input (`IX0.3`, `TX0.1`) and every bit output
// (`QX1.2`, `QX1.2_0`) to the word node that carries its byte, creating
// the word on first use. Input words distribute bits to their bit nodes;
// output words collect the masks of the bits that drive them.
//
// Preconditions: none (runs on the freshly loaded network).
// Postconditions: each bit node has `io == Some(IoLink::Bit { .. })`, each
//   word has `io == Some(IoLink::Bits(..))` and `io_mask` covering its bits.
// Failure modes: malformed bit names and bits claimed twice are errors.
// Side effects: appends created word nodes to the module of their first bit.

use std::collections::HashMap;

use crate::diag::{codes, Diagnostic, DiagSink, PassResult};
use crate::id::{ModuleId, NodeId};
use crate::name::{self, Area, IoName, Width};
use crate::network::{Combine, IoLink, Network, Node, NodeKind, Role};
use crate::pass::PassId;

const PHASE: PassId = PassId::BitIo;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitIoStats {
    pub input_bits: usize,
    pub output_bits: usize,
    /// Word nodes created because no module declared them.
    pub created_words: usize,
}

pub fn aggregate_bits(net: &mut Network, sink: &mut DiagSink) -> PassResult<BitIoStats> {
    let mut stats = BitIoStats::default();
    let mut names = net.name_index();
    let listed: Vec<(ModuleId, NodeId)> = net
        .modules
        .iter()
        .enumerate()
        .flat_map(|(m, module)| {
            module
                .nodes
                .iter()
                .map(move |&id| (ModuleId(m as u32), id))
        })
        .collect();

    for (module, id) in listed {
        let node = net.node(id);
        let output = match (node.kind, node.role) {
            (NodeKind::Input, Role::Gate) => false,
            (_, Role::OutBit) => true,
            _ => continue,
        };
        let Some(io) = bit_name(&node.name, output) else {
            let what = if output { "output" } else { "input" };
            let expected = if output { "QX<byte>.<bit>[_0]" } else { "IX<byte>.<bit> or TX<byte>.<bit>" };
            sink.error(
                Diagnostic::error(PHASE, codes::E0201, format!("'{}' is not a valid bit {} name", node.name, what))
                    .with_node(node.name.clone())
                    .with_hint(format!("expected {}", expected)),
            )?;
            continue;
        };
        if !output && !node.inputs.is_empty() {
            sink.error(
                Diagnostic::error(PHASE, codes::E0201, format!("input bit '{}' has inputs", node.name))
                    .with_node(node.name.clone()),
            )?;
            continue;
        }
        let bit = io.bit.unwrap_or(0);
        let word = match word_for(net, &mut names, &io, module, output, &mut stats) {
            Ok(word) => word,
            Err(diag) => {
                sink.error(diag.with_node(net.name(id).to_string()))?;
                continue;
            }
        };

        let claimed = match net.node(word).io {
            Some(IoLink::Bits(table)) => table[bit as usize],
            _ => continue,
        };
        if let Some(other) = claimed {
            let other = net.name(other).to_string();
            let word_name = net.name(word).to_string();
            sink.error(
                Diagnostic::error(
                    PHASE,
                    codes::E0201,
                    format!("bit {} of '{}' is claimed by both '{}' and '{}'", bit, word_name, other, net.name(id)),
                )
                .with_node(other)
                .with_node(net.name(id).to_string()),
            )?;
            continue;
        }
        if let Some(IoLink::Bits(table)) = &mut net.node_mut(word).io {
            table[bit as usize] = Some(id);
        }
        let mask = 1u8 << bit;
        net.node_mut(word).io_mask |= u32::from(mask);
        net.node_mut(id).io = Some(IoLink::Bit { mask, word });
        if output {
            stats.output_bits += 1;
        } else {
            stats.input_bits += 1;
        }
    }
    Ok(stats)
}

fn bit_name(name: &str, output: bool) -> Option<IoName> {
    let io = name::decode(name)?;
    if io.width != Width::Bit || io.bit.is_none() {
        return None;
    }
    let ok = if output {
        io.area == Area::Output && (io.tail.is_empty() || io.tail == "_0")
    } else {
        io.area != Area::Output && io.tail.is_empty()
    };
    ok.then_some(io)
}

/// Find or create the word node for a bit.
fn word_for(
    net: &mut Network,
    names: &mut HashMap<String, NodeId>,
    io: &IoName,
    module: ModuleId,
    output: bool,
    stats: &mut BitIoStats,
) -> Result<NodeId, Diagnostic> {
    let word_name = io.aggregate_name();
    let role = if output { Role::OutWord } else { Role::Transfer };
    if let Some(&word) = names.get(&word_name) {
        let node = net.node_mut(word);
        let kind_ok = match node.kind {
            NodeKind::Input => !output,
            NodeKind::Output(_) => output,
            _ => false,
        };
        if !kind_ok || node.role != role {
            return Err(Diagnostic::error(
                PHASE,
                codes::E0201,
                format!("'{}' is not a {} word", word_name, if output { "bit output" } else { "bit input" }),
            )
            .with_node(word_name));
        }
        if node.io.is_none() {
            node.io = Some(IoLink::Bits([None; 8]));
        }
        return Ok(word);
    }

    let kind = if output {
        NodeKind::Output(Combine::Arithmetic)
    } else {
        NodeKind::Input
    };
    let mut node = Node::new(word_name.clone(), kind, role);
    node.io = Some(IoLink::Bits([None; 8]));
    let word = net.add_node(module, node);
    names.insert(word_name, word);
    stats.created_words += 1;
    Ok(word)
}
