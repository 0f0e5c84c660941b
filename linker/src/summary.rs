// summary.rs — Serializable link summary for `--emit json`

use serde::Serialize;

use crate::diag::Diagnostic;
use crate::linked::{LinkStats, LinkedNetwork};
use crate::network::ArenaSlice;
use crate::pipeline::Provenance;
use crate::validate::IoBinding;

#[derive(Debug, Clone, Serialize)]
pub struct SymbolEntry<'a> {
    pub name: &'a str,
    pub kind: &'static str,
    pub role: &'static str,
    pub fan_in: u32,
    pub fan_out: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slice: Option<ArenaSlice>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LinkSummary<'a> {
    pub provenance: &'a Provenance,
    pub stats: &'a LinkStats,
    /// In symbol-table order.
    pub symbols: Vec<SymbolEntry<'a>>,
    pub io: Vec<&'a IoBinding>,
    pub warnings: Vec<String>,
}

pub fn summarize<'a>(
    net: &'a LinkedNetwork,
    provenance: &'a Provenance,
    diagnostics: &[Diagnostic],
) -> LinkSummary<'a> {
    let symbols = net
        .symbols()
        .iter()
        .map(|id| {
            let node = net.node(id);
            SymbolEntry {
                name: &node.name,
                kind: node.kind.label(),
                role: node.role.label(),
                fan_in: node.counts.fan_in,
                fan_out: node.counts.fan_out,
                slice: node.slice,
            }
        })
        .collect();
    LinkSummary {
        provenance,
        stats: net.stats(),
        symbols,
        io: net.io().iter().collect(),
        warnings: diagnostics
            .iter()
            .filter(|d| !d.is_error())
            .map(|d| d.to_string())
            .collect(),
    }
}
