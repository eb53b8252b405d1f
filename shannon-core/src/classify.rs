//! Role assignment for the scatter op functions.
//!
//! The table references a handful of anonymous, position-independent
//! functions. Signature matching is pointless across firmware builds, but
//! with so few candidates their control-flow shape is enough to tell them
//! apart: zero-init starts by zeroing registers, the byte-copy loops back
//! to its own first instruction, and decompression needs several nested
//! loops.

use std::fmt;

use crate::host::CodeAnalyzer;
use crate::report::LoadWarning;

/// The four roles a scatter op function can play.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScatterOpKind {
    Null,
    ZeroInit,
    Copy,
    Decompress,
}

impl fmt::Display for ScatterOpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScatterOpKind::Null => write!(f, "scatterload_null()"),
            ScatterOpKind::ZeroInit => write!(f, "scatterload_zeroinit()"),
            ScatterOpKind::Copy => write!(f, "scatterload_copy()"),
            ScatterOpKind::Decompress => write!(f, "scatterload_decompress()"),
        }
    }
}

/// Explicit kind-to-address mapping produced by classification.
///
/// Threaded through as a value instead of ambient "already found" state;
/// conflicts surface as [`LoadWarning`]s and the first mapping stays
/// authoritative.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct OpRoleMap {
    pub null: Option<u32>,
    pub zero_init: Option<u32>,
    pub copy: Option<u32>,
    pub decompress: Option<u32>,
}

impl OpRoleMap {
    pub fn get(&self, kind: ScatterOpKind) -> Option<u32> {
        match kind {
            ScatterOpKind::Null => self.null,
            ScatterOpKind::ZeroInit => self.zero_init,
            ScatterOpKind::Copy => self.copy,
            ScatterOpKind::Decompress => self.decompress,
        }
    }

    fn slot_mut(&mut self, kind: ScatterOpKind) -> &mut Option<u32> {
        match kind {
            ScatterOpKind::Null => &mut self.null,
            ScatterOpKind::ZeroInit => &mut self.zero_init,
            ScatterOpKind::Copy => &mut self.copy,
            ScatterOpKind::Decompress => &mut self.decompress,
        }
    }

    /// Resolve an op-function address back to its role.
    pub fn kind_of(&self, op: u32) -> Option<ScatterOpKind> {
        const KINDS: [ScatterOpKind; 4] = [
            ScatterOpKind::Null,
            ScatterOpKind::ZeroInit,
            ScatterOpKind::Copy,
            ScatterOpKind::Decompress,
        ];
        KINDS.into_iter().find(|&kind| self.get(kind) == Some(op))
    }
}

/// Control-flow shape of one op function, computed once per distinct
/// address.
#[derive(Clone, Debug, Default)]
pub struct ControlFlowMetrics {
    pub branches: Vec<crate::host::Branch>,
    pub leading_mnemonics: Vec<String>,
}

pub fn compute_metrics<A: CodeAnalyzer + ?Sized>(analyzer: &A, func: u32) -> ControlFlowMetrics {
    ControlFlowMetrics {
        branches: analyzer.branch_instructions(func),
        leading_mnemonics: analyzer.first_mnemonics(func, 2),
    }
}

/// Classify one function by its metrics. Pure; first matching rule wins.
pub fn classify_op(func: u32, metrics: &ControlFlowMetrics) -> ScatterOpKind {
    // two leading MOVS: registers being zeroed for the fill loop
    if metrics.leading_mnemonics.len() >= 2
        && metrics.leading_mnemonics[..2].iter().all(|m| m == "MOVS")
    {
        return ScatterOpKind::ZeroInit;
    }

    // a branch back to the first instruction: the byte-copy loop
    if metrics.branches.iter().any(|b| b.target == func) {
        return ScatterOpKind::Copy;
    }

    // decompression requires multiple loops
    if metrics.branches.len() >= 3 {
        return ScatterOpKind::Decompress;
    }

    ScatterOpKind::Null
}

/// Classify a deduplicated set of op-function addresses in one pass.
///
/// A second address matching an already-occupied kind is an anomaly in
/// the image, not a fatal error: it is reported and the earlier mapping
/// is kept.
pub fn classify_ops<A: CodeAnalyzer + ?Sized>(
    analyzer: &A,
    ops: &[u32],
    warnings: &mut Vec<LoadWarning>,
) -> OpRoleMap {
    let mut roles = OpRoleMap::default();

    for &op in ops {
        log::info!("processing scatter function at 0x{:X}", op);
        let metrics = compute_metrics(analyzer, op);
        let kind = classify_op(op, &metrics);

        let slot = roles.slot_mut(kind);
        match *slot {
            None => {
                log::info!("found {} at 0x{:X}", kind, op);
                *slot = Some(op);
            }
            Some(existing) if existing != op => {
                log::error!(
                    "{} found at 0x{:X}, already found at 0x{:X} before",
                    kind,
                    op,
                    existing
                );
                warnings.push(LoadWarning::DuplicateRole {
                    kind,
                    existing,
                    duplicate: op,
                });
            }
            Some(_) => {}
        }
    }

    roles
}
