// alloc.rs — Arena and symbol table allocation
//
// All activity lists share one contiguous arena of `LinkTotals::links`
// slots; each source owns a slice placed by the symbol pass. A slot is
// written exactly once: `Vacant` slots left after filling, or a second
// write to the same slot, are internal consistency failures.
//
// Preconditions: counting (and the re-count after splitting) complete.
// Postconditions: arena length == total links; symbol table capacity ==
//   total nodes.
// Failure modes: allocation failure is reported as `E0905` and aborts.
// Side effects: none.

use serde::Serialize;

use crate::count::LinkTotals;
use crate::diag::{codes, Diagnostic, DiagSink, PassResult};
use crate::id::NodeId;
use crate::pass::PassId;

/// One arena entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Slot {
    Vacant,
    Link(NodeId),
    /// Terminator closing the normal or the inverted part of a list.
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotError {
    OutOfRange,
    Occupied(Slot),
}

#[derive(Debug, Clone, Default)]
pub struct Arena {
    slots: Vec<Slot>,
}

impl Arena {
    pub fn with_len(len: usize) -> Result<Self, std::collections::TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(len)?;
        slots.resize(len, Slot::Vacant);
        Ok(Arena { slots })
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Write a vacant slot.
    pub fn write(&mut self, index: usize, slot: Slot) -> Result<(), SlotError> {
        let entry = self.slots.get_mut(index).ok_or(SlotError::OutOfRange)?;
        if *entry != Slot::Vacant {
            return Err(SlotError::Occupied(*entry));
        }
        *entry = slot;
        Ok(())
    }

    pub fn slots(&self) -> &[Slot] {
        &self.slots
    }

    /// Index of the first slot never written.
    pub fn first_vacant(&self) -> Option<usize> {
        self.slots.iter().position(|s| *s == Slot::Vacant)
    }
}

/// Storage sized by the counting pass.
#[derive(Debug, Default)]
pub struct Allocation {
    pub arena: Arena,
    /// Empty symbol table with capacity for every node.
    pub table: Vec<NodeId>,
}

pub fn allocate(totals: &LinkTotals, sink: &mut DiagSink) -> PassResult<Allocation> {
    let oom = |what: &str, n: usize| {
        Diagnostic::error(
            PassId::Allocate,
            codes::E0905,
            format!("cannot allocate {} for {} entries", what, n),
        )
    };
    let arena = match Arena::with_len(totals.links) {
        Ok(arena) => arena,
        Err(_) => return Err(sink.internal(oom("link arena", totals.links))),
    };
    let mut table = Vec::new();
    if table.try_reserve_exact(totals.nodes).is_err() {
        return Err(sink.internal(oom("symbol table", totals.nodes)));
    }
    Ok(Allocation { arena, table })
}
