// diag.rs — Unified diagnostics model
//
// Shared diagnostic types used by the loader and every link pass, plus the
// `DiagSink` that enforces the error threshold.
//
// Preconditions: none (types only).
// Postconditions: every error names the phase it was raised in and the
//   node names involved, source endpoint first.
// Failure modes: `DiagSink::error` returns `Abort::ErrorLimit` once the
//   configured error count is exceeded.
// Side effects: none.

use std::fmt;

use serde::Serialize;

use crate::pass::PassId;

// ── Diagnostic code ──────────────────────────────────────────────────────

/// A stable diagnostic code (e.g., `E0201`, `W0301`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct DiagCode(pub &'static str);

impl fmt::Display for DiagCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0)
    }
}

/// Code registry. E01xx load, E02xx structure, E03xx I/O binding,
/// E09xx internal consistency, W03xx advisory.
pub mod codes {
    use super::DiagCode;

    pub const E0101: DiagCode = DiagCode("E0101"); // object file syntax
    pub const E0102: DiagCode = DiagCode("E0102"); // undefined reference
    pub const E0103: DiagCode = DiagCode("E0103"); // duplicate definition
    pub const E0104: DiagCode = DiagCode("E0104"); // bad kind/role combination

    pub const E0201: DiagCode = DiagCode("E0201"); // malformed bit I/O node
    pub const E0202: DiagCode = DiagCode("E0202"); // alias cycle
    pub const E0203: DiagCode = DiagCode("E0203"); // logic input from non-gate
    pub const E0204: DiagCode = DiagCode("E0204"); // arithmetic input from non-arith
    pub const E0205: DiagCode = DiagCode("E0205"); // action without slave
    pub const E0206: DiagCode = DiagCode("E0206"); // action clock missing or mismatched
    pub const E0207: DiagCode = DiagCode("E0207"); // timed action without delay
    pub const E0208: DiagCode = DiagCode("E0208"); // shift slave already linked back
    pub const E0209: DiagCode = DiagCode("E0209"); // wide gate cannot be split
    pub const E0210: DiagCode = DiagCode("E0210"); // inputs on an input-free kind
    pub const E0211: DiagCode = DiagCode("E0211"); // undefined role
    pub const E0212: DiagCode = DiagCode("E0212"); // duplicate name in symbol table
    pub const E0213: DiagCode = DiagCode("E0213"); // dangling reference

    pub const E0301: DiagCode = DiagCode("E0301"); // invalid input word
    pub const E0302: DiagCode = DiagCode("E0302"); // invalid output word
    pub const E0303: DiagCode = DiagCode("E0303"); // I/O address out of range
    pub const E0304: DiagCode = DiagCode("E0304"); // output bit without word

    pub const E0901: DiagCode = DiagCode("E0901"); // symbol table size mismatch
    pub const E0902: DiagCode = DiagCode("E0902"); // arena size mismatch
    pub const E0903: DiagCode = DiagCode("E0903"); // arena slot not written exactly once
    pub const E0904: DiagCode = DiagCode("E0904"); // error threshold exceeded
    pub const E0905: DiagCode = DiagCode("E0905"); // allocation failure
    pub const E0906: DiagCode = DiagCode("E0906"); // pass ran before its input
    pub const E0907: DiagCode = DiagCode("E0907"); // bound I/O name does not decode

    pub const W0301: DiagCode = DiagCode("W0301"); // node has no input
    pub const W0302: DiagCode = DiagCode("W0302"); // node has no output
}

// ── Severity level ───────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagLevel {
    Error,
    Warning,
}

// ── Related node ─────────────────────────────────────────────────────────

/// A secondary node providing context for a diagnostic.
#[derive(Debug, Clone, Serialize)]
pub struct RelatedNode {
    pub name: String,
    pub label: String,
}

// ── Diagnostic ───────────────────────────────────────────────────────────

/// A linker diagnostic emitted by any phase.
#[derive(Debug, Clone, Serialize)]
pub struct Diagnostic {
    pub code: Option<DiagCode>,
    pub level: DiagLevel,
    pub phase: PassId,
    pub message: String,
    /// Names of the nodes involved, source endpoint first.
    pub nodes: Vec<String>,
    pub hint: Option<String>,
    pub related: Vec<RelatedNode>,
}

impl Diagnostic {
    pub fn new(level: DiagLevel, phase: PassId, message: impl Into<String>) -> Self {
        Self {
            code: None,
            level,
            phase,
            message: message.into(),
            nodes: Vec::new(),
            hint: None,
            related: Vec::new(),
        }
    }

    pub fn error(phase: PassId, code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Error, phase, message).with_code(code)
    }

    pub fn warning(phase: PassId, code: DiagCode, message: impl Into<String>) -> Self {
        Self::new(DiagLevel::Warning, phase, message).with_code(code)
    }

    pub fn with_code(mut self, code: DiagCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Record a node involved in the problem.
    pub fn with_node(mut self, name: impl Into<String>) -> Self {
        self.nodes.push(name.into());
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    pub fn with_related(mut self, name: impl Into<String>, label: impl Into<String>) -> Self {
        self.related.push(RelatedNode {
            name: name.into(),
            label: label.into(),
        });
        self
    }

    pub fn is_error(&self) -> bool {
        self.level == DiagLevel::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let level = match self.level {
            DiagLevel::Error => "error",
            DiagLevel::Warning => "warning",
        };
        match &self.code {
            Some(code) => write!(f, "{}[{}] {}: {}", level, code, self.phase.tag(), self.message)?,
            None => write!(f, "{} {}: {}", level, self.phase.tag(), self.message)?,
        }
        for r in &self.related {
            write!(f, "\n  note: '{}' {}", r.name, r.label)?;
        }
        if let Some(hint) = &self.hint {
            write!(f, "\n  hint: {}", hint)?;
        }
        Ok(())
    }
}

// ── Sink and abort signal ────────────────────────────────────────────────

/// Reason a pass stopped before finishing its walk.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Abort {
    /// More errors than `max_errors` were reported.
    ErrorLimit,
    /// An internal consistency check failed (count mismatch, slot reuse,
    /// allocation failure). The network state is not trustworthy.
    Internal,
}

pub type PassResult<T> = Result<T, Abort>;

/// Collects diagnostics across passes and enforces the error threshold.
#[derive(Debug)]
pub struct DiagSink {
    diagnostics: Vec<Diagnostic>,
    errors: usize,
    max_errors: usize,
}

impl DiagSink {
    pub fn new(max_errors: usize) -> Self {
        DiagSink {
            diagnostics: Vec::new(),
            errors: 0,
            max_errors,
        }
    }

    /// Record an error. Returns `Err(Abort::ErrorLimit)` once the count
    /// exceeds the threshold so walks can stop with `?`.
    pub fn error(&mut self, diag: Diagnostic) -> PassResult<()> {
        debug_assert!(diag.is_error());
        let phase = diag.phase;
        self.diagnostics.push(diag);
        self.errors += 1;
        if self.errors > self.max_errors {
            self.diagnostics.push(Diagnostic::error(
                phase,
                codes::E0904,
                format!("too many errors ({}), link aborted", self.errors),
            ));
            return Err(Abort::ErrorLimit);
        }
        Ok(())
    }

    pub fn warning(&mut self, diag: Diagnostic) {
        self.diagnostics.push(diag);
    }

    /// Record an internal consistency failure and return the abort value
    /// the caller must propagate.
    pub fn internal(&mut self, diag: Diagnostic) -> Abort {
        self.diagnostics.push(diag);
        self.errors += 1;
        Abort::Internal
    }

    pub fn error_count(&self) -> usize {
        self.errors
    }

    pub fn has_errors(&self) -> bool {
        self.errors > 0
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    /// Diagnostics recorded since position `mark` (see `len`).
    pub fn since(&self, mark: usize) -> &[Diagnostic] {
        &self.diagnostics[mark.min(self.diagnostics.len())..]
    }

    pub fn diagnostics(&self) -> &[Diagnostic] {
        &self.diagnostics
    }

    pub fn into_diagnostics(self) -> Vec<Diagnostic> {
        self.diagnostics
    }
}
