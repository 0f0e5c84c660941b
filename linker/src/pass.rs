// pass.rs — Link pass table: pass ids, dependency order, artifacts
//
// Declares the linker's eight passes (loading object files is outside the
// runner), their dependency edges, and the artifacts they produce. Used by
// the pipeline runner to compute the pass prefix for each --emit target.

use std::collections::HashSet;

use serde::Serialize;

// ── Pass and Artifact identifiers ──────────────────────────────────────────

/// Identifies each link pass. `Load` exists so load diagnostics carry a
/// phase; it is never scheduled by `required_passes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum PassId {
    Load,
    BitIo,
    Count,
    Split,
    Allocate,
    Symbols,
    Sort,
    Fill,
    Validate,
}

/// Artifacts held by the link state. The network itself is mutated in
/// place by most passes and is listed where a pass rewrites it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactId {
    Network,   // Network (mutated in place)
    Totals,    // LinkTotals
    Splits,    // Vec<SplitRecord>
    Arena,     // Arena
    Symbols,   // SymbolTable
    IoMap,     // IoMap
}

// ── Pass descriptor ────────────────────────────────────────────────────────

/// Static metadata about a link pass.
pub struct PassDescriptor {
    /// Short name for verbose timing output.
    pub name: &'static str,
    /// Tag printed in diagnostics (`PASS 1`, `SPLIT`, ...).
    pub tag: &'static str,
    pub inputs: &'static [PassId],
    pub outputs: &'static [ArtifactId],
    pub invariants: &'static str,
}

pub fn descriptor(id: PassId) -> PassDescriptor {
    match id {
        PassId::Load => PassDescriptor {
            name: "load",
            tag: "LOAD",
            inputs: &[],
            outputs: &[ArtifactId::Network],
            invariants: "every reference names a declared node",
        },
        PassId::BitIo => PassDescriptor {
            name: "bit_io",
            tag: "PASS 0",
            inputs: &[],
            outputs: &[ArtifactId::Network],
            invariants: "every bit I/O node is attached to its word aggregate",
        },
        PassId::Count => PassDescriptor {
            name: "count",
            tag: "PASS 1",
            inputs: &[PassId::BitIo],
            outputs: &[ArtifactId::Network, ArtifactId::Totals],
            invariants: "aliases resolved, fan-in/fan-out/delay counts exact",
        },
        PassId::Split => PassDescriptor {
            name: "split",
            tag: "SPLIT",
            inputs: &[PassId::Count],
            outputs: &[ArtifactId::Network, ArtifactId::Totals, ArtifactId::Splits],
            invariants: "no splittable gate exceeds the gate width",
        },
        PassId::Allocate => PassDescriptor {
            name: "allocate",
            tag: "ALLOC",
            inputs: &[PassId::Split],
            outputs: &[ArtifactId::Arena],
            invariants: "arena length equals total link count",
        },
        PassId::Symbols => PassDescriptor {
            name: "symbols",
            tag: "PASS 2",
            inputs: &[PassId::Allocate],
            outputs: &[ArtifactId::Symbols, ArtifactId::Arena],
            invariants: "clock first, every listed node entered once, slices tile the arena",
        },
        PassId::Sort => PassDescriptor {
            name: "sort",
            tag: "SORT",
            inputs: &[PassId::Symbols],
            outputs: &[ArtifactId::Symbols],
            invariants: "symbol table ordered by name, stable",
        },
        PassId::Fill => PassDescriptor {
            name: "fill",
            tag: "PASS 3-5",
            inputs: &[PassId::Sort],
            outputs: &[ArtifactId::Arena, ArtifactId::Network],
            invariants: "every arena slot written exactly once",
        },
        PassId::Validate => PassDescriptor {
            name: "validate",
            tag: "PASS 6",
            inputs: &[PassId::Fill],
            outputs: &[ArtifactId::IoMap],
            invariants: "all I/O bound, all actions clocked",
        },
    }
}

impl PassId {
    pub fn tag(self) -> &'static str {
        descriptor(self).tag
    }

    pub fn name(self) -> &'static str {
        descriptor(self).name
    }
}

// ── Dependency resolution ──────────────────────────────────────────────────

/// The eight runner passes in execution order.
pub const ALL_PASSES: [PassId; 8] = [
    PassId::BitIo,
    PassId::Count,
    PassId::Split,
    PassId::Allocate,
    PassId::Symbols,
    PassId::Sort,
    PassId::Fill,
    PassId::Validate,
];

/// Compute the ordered set of passes needed to produce `terminal`.
/// Returns passes in topological (execution) order.
pub fn required_passes(terminal: PassId) -> Vec<PassId> {
    let mut visited = HashSet::new();
    let mut order = Vec::new();
    visit(terminal, &mut visited, &mut order);
    order.retain(|p| *p != PassId::Load);
    order
}

fn visit(id: PassId, visited: &mut HashSet<PassId>, order: &mut Vec<PassId>) {
    if !visited.insert(id) {
        return;
    }
    for &dep in descriptor(id).inputs {
        visit(dep, visited, order);
    }
    order.push(id);
}

// ── Tests ──────────────────────────────────────────────────────────────────
