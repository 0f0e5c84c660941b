// pipeline.rs — Link state and pass orchestration
//
// Holds the network and every pass artifact, and runs the pass prefix
// needed for a given terminal PassId.
//
// Preconditions: the network was loaded (or built) before `run_pipeline`.
// Postconditions: artifacts of all passes in `required_passes(terminal)`
//   are populated, or a `LinkError` names the pass that failed.
// Failure modes: any pass recording an error; error threshold exceeded;
//   internal consistency failure.
// Side effects: calls `on_pass_complete` after each pass so diagnostics
//   can be displayed as they are produced; prints timing when verbose.

use std::fmt;
use std::time::Instant;

use serde::Serialize;

use crate::alloc::{allocate, Allocation};
use crate::bitio::{aggregate_bits, BitIoStats};
use crate::count::{count, LinkTotals};
use crate::diag::{codes, Abort, Diagnostic, DiagSink, PassResult};
use crate::fill::{fill_activity, FillStats};
use crate::linked::{LinkStats, LinkedNetwork};
use crate::network::Network;
use crate::pass::{required_passes, PassId};
use crate::split::{split_wide_gates, SplitRecord, DEFAULT_GATE_WIDTH};
use crate::symtab::{build_symbols, sort_symbols, SymbolTable};
use crate::validate::{validate, IoMap, DEFAULT_IO_BYTES};

// ── Configuration ──────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    /// Largest fan-in of a gate; wider AND/OR gates are split.
    pub gate_width: usize,
    /// Errors tolerated before a link is aborted.
    pub max_errors: usize,
    /// Size of the I/O address space in bytes.
    pub io_bytes: u32,
}

impl Default for LinkOptions {
    fn default() -> Self {
        LinkOptions {
            gate_width: DEFAULT_GATE_WIDTH,
            max_errors: 100,
            io_bytes: DEFAULT_IO_BYTES,
        }
    }
}

// ── Provenance ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct InputHash {
    pub name: String,
    /// SHA-256 of the object file text, lowercase hex.
    pub sha256: String,
}

/// Which inputs and which linker produced an output.
#[derive(Debug, Clone, Serialize)]
pub struct Provenance {
    pub inputs: Vec<InputHash>,
    pub linker_version: &'static str,
}

pub fn compute_provenance<'a>(sources: impl IntoIterator<Item = (&'a str, &'a str)>) -> Provenance {
    use sha2::{Digest, Sha256};

    let inputs = sources
        .into_iter()
        .map(|(name, text)| {
            let digest = Sha256::digest(text.as_bytes());
            InputHash {
                name: name.to_string(),
                sha256: bytes_to_hex(&digest),
            }
        })
        .collect();
    Provenance {
        inputs,
        linker_version: env!("CARGO_PKG_VERSION"),
    }
}

fn bytes_to_hex(bytes: &[u8]) -> String {
    use std::fmt::Write;
    let mut s = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(s, "{:02x}", b);
    }
    s
}

// ── Link state ─────────────────────────────────────────────────────────────

/// The network being linked plus every artifact produced so far.
pub struct LinkState {
    pub network: Network,
    pub options: LinkOptions,
    pub sink: DiagSink,
    pub bit_io: Option<BitIoStats>,
    pub totals: Option<LinkTotals>,
    pub splits: Vec<SplitRecord>,
    pub allocation: Option<Allocation>,
    pub symbols: Option<SymbolTable>,
    pub fill: Option<FillStats>,
    pub io: Option<IoMap>,
}

impl LinkState {
    pub fn new(network: Network, options: LinkOptions) -> Self {
        LinkState {
            network,
            options,
            sink: DiagSink::new(options.max_errors),
            bit_io: None,
            totals: None,
            splits: Vec::new(),
            allocation: None,
            symbols: None,
            fill: None,
            io: None,
        }
    }

    /// Freeze a fully validated link. `None` unless every pass ran.
    pub fn into_linked(self) -> Option<(LinkedNetwork, Vec<Diagnostic>)> {
        let totals = self.totals?;
        let allocation = self.allocation?;
        let symbols = self.symbols?;
        let io = self.io?;
        let fill = self.fill?;
        let stats = LinkStats {
            nodes: totals.nodes,
            links: totals.links,
            per_kind: totals.per_kind,
            splits: self.splits.len(),
            aux_gates: self.splits.iter().map(|s| s.aux.len()).sum(),
            xor_sources: fill.xor_sources,
            io_bindings: io.len(),
        };
        let linked = LinkedNetwork::new(
            self.network,
            allocation.arena.slots().to_vec(),
            symbols,
            io,
            self.splits,
            stats,
        );
        Some((linked, self.sink.into_diagnostics()))
    }
}

// ── Error type ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkErrorKind {
    /// The pass recorded one or more errors.
    Diagnostics,
    TooManyErrors,
    Internal,
}

/// The link stopped. Diagnostics are in `LinkState::sink`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkError {
    pub failing_pass: PassId,
    pub kind: LinkErrorKind,
}

impl LinkError {
    /// Process exit status for this failure.
    pub fn exit_code(&self) -> i32 {
        match self.kind {
            LinkErrorKind::Diagnostics => 1,
            LinkErrorKind::Internal => 3,
            LinkErrorKind::TooManyErrors => 4,
        }
    }
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let what = match self.kind {
            LinkErrorKind::Diagnostics => "link failed",
            LinkErrorKind::TooManyErrors => "too many errors",
            LinkErrorKind::Internal => "internal consistency failure",
        };
        write!(f, "{} in {}", what, self.failing_pass.tag())
    }
}

impl std::error::Error for LinkError {}

// ── Pipeline runner ────────────────────────────────────────────────────────

/// Run the passes needed to produce `terminal`.
///
/// Per-pass sequence: execute → on_pass_complete(callback) → verbose → error check.
pub fn run_pipeline(
    state: &mut LinkState,
    terminal: PassId,
    verbose: bool,
    mut on_pass_complete: impl FnMut(PassId, &[Diagnostic]),
) -> Result<(), LinkError> {
    for pass in required_passes(terminal) {
        let mark = state.sink.len();
        let t = Instant::now();
        let outcome = run_pass(state, pass);
        let elapsed = t.elapsed();

        on_pass_complete(pass, state.sink.since(mark));
        if verbose {
            eprintln!(
                "gatelink: {} complete, {:.1}ms",
                pass.name(),
                elapsed.as_secs_f64() * 1000.0
            );
        }

        let kind = match outcome {
            Err(Abort::ErrorLimit) => Some(LinkErrorKind::TooManyErrors),
            Err(Abort::Internal) => Some(LinkErrorKind::Internal),
            Ok(()) if state.sink.has_errors() => Some(LinkErrorKind::Diagnostics),
            Ok(()) => None,
        };
        if let Some(kind) = kind {
            return Err(LinkError {
                failing_pass: pass,
                kind,
            });
        }
    }
    Ok(())
}

fn run_pass(state: &mut LinkState, pass: PassId) -> PassResult<()> {
    let LinkState {
        network,
        options,
        sink,
        bit_io,
        totals,
        splits,
        allocation,
        symbols,
        fill,
        io,
    } = state;

    match pass {
        PassId::Load => {}
        PassId::BitIo => {
            *bit_io = Some(aggregate_bits(network, sink)?);
        }
        PassId::Count => {
            *totals = Some(count(network, PassId::Count, sink)?);
        }
        PassId::Split => {
            *splits = split_wide_gates(network, options.gate_width, sink)?;
            if !splits.is_empty() {
                *totals = Some(count(network, PassId::Split, sink)?);
            }
        }
        PassId::Allocate => {
            let t = totals.as_ref().ok_or_else(|| missing(sink, pass))?;
            *allocation = Some(allocate(t, sink)?);
        }
        PassId::Symbols => {
            let t = totals.as_ref().ok_or_else(|| missing(sink, pass))?;
            let a = allocation.as_mut().ok_or_else(|| missing(sink, pass))?;
            *symbols = Some(build_symbols(network, t, a, sink)?);
        }
        PassId::Sort => {
            let table = symbols.as_mut().ok_or_else(|| missing(sink, pass))?;
            sort_symbols(table, network);
        }
        PassId::Fill => {
            let table = symbols.as_ref().ok_or_else(|| missing(sink, pass))?;
            let a = allocation.as_mut().ok_or_else(|| missing(sink, pass))?;
            *fill = Some(fill_activity(network, table, &mut a.arena, sink)?);
        }
        PassId::Validate => {
            let table = symbols.as_ref().ok_or_else(|| missing(sink, pass))?;
            *io = Some(validate(network, table, options.io_bytes, sink)?);
        }
    }
    Ok(())
}

fn missing(sink: &mut DiagSink, pass: PassId) -> Abort {
    sink.internal(Diagnostic::error(
        pass,
        codes::E0906,
        format!("{} ran before the pass that produces its input", pass.name()),
    ))
}

// ── One-shot link ──────────────────────────────────────────────────────────

/// A failed link with everything that was reported.
#[derive(Debug)]
pub struct LinkFailure {
    pub error: LinkError,
    pub diagnostics: Vec<Diagnostic>,
}

/// Run every pass and freeze the result. Warnings are returned alongside
/// the linked network.
pub fn link(network: Network, options: LinkOptions) -> Result<(LinkedNetwork, Vec<Diagnostic>), LinkFailure> {
    let mut state = LinkState::new(network, options);
    if let Err(error) = run_pipeline(&mut state, PassId::Validate, false, |_, _| {}) {
        return Err(LinkFailure {
            error,
            diagnostics: state.sink.into_diagnostics(),
        });
    }
    match state.into_linked() {
        Some(done) => Ok(done),
        None => Err(LinkFailure {
            error: LinkError {
                failing_pass: PassId::Validate,
                kind: LinkErrorKind::Internal,
            },
            diagnostics: Vec::new(),
        }),
    }
}
