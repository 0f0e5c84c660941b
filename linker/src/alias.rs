// alias.rs — Alias resolution with inversion composition
//
// An alias node stands for another node, optionally inverted. Resolution
// follows the chain to the first non-alias node, composing inversions by
// XOR, then rewrites every alias on the chain to point at that node
// directly (path compression), so a second lookup is a single hop.
//
// Preconditions: none.
// Postconditions: on success, every alias visited has `alias.target ==`
//   the resolved node and `alias.invert` equal to its own composed flag.
// Failure modes: `AliasError::Cycle` when the chain revisits a node,
//   `AliasError::Dangling` for an alias without a target.
// Side effects: rewrites alias links of the visited chain.

use crate::id::NodeId;
use crate::network::{AliasLink, Node, NodeKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolved {
    pub node: NodeId,
    pub invert: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AliasError {
    /// The chain starting at `start` loops back on itself.
    Cycle { start: NodeId },
    /// `alias` is an alias node with no target.
    Dangling { alias: NodeId },
}

/// Resolve `start` to its ultimate non-alias node.
pub fn resolve(nodes: &mut [Node], start: NodeId) -> Result<Resolved, AliasError> {
    if nodes[start.index()].kind != NodeKind::Alias {
        return Ok(Resolved {
            node: start,
            invert: false,
        });
    }

    // (alias, inversion accumulated before reaching it)
    let mut chain: Vec<(NodeId, bool)> = Vec::new();
    let mut cur = start;
    let mut invert = false;
    while nodes[cur.index()].kind == NodeKind::Alias {
        if chain.len() >= nodes.len() || chain.iter().any(|&(id, _)| id == cur) {
            return Err(AliasError::Cycle { start });
        }
        let link = nodes[cur.index()]
            .alias
            .ok_or(AliasError::Dangling { alias: cur })?;
        chain.push((cur, invert));
        invert ^= link.invert;
        cur = link.target;
    }

    for (alias, before) in chain {
        nodes[alias.index()].alias = Some(AliasLink {
            target: cur,
            invert: invert ^ before,
        });
    }
    Ok(Resolved { node: cur, invert })
}
