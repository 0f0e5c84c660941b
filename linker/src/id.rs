// id.rs — Stable index identifiers for linker objects
//
// Every node of a network lives in one owned vector and every reference
// between nodes is one of these indices. Feedback loops and alias chains
// are therefore plain integers, never owning pointers.

use serde::Serialize;

/// Index of a node in `Network::nodes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct NodeId(pub u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub(crate) fn from_index(index: usize) -> Self {
        NodeId(index as u32)
    }
}

/// Index of a module (one translation unit) in `Network::modules`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleId(pub u32);

impl ModuleId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}
