use crate::classify::{OpRoleMap, ScatterOpKind};
use crate::format::toc::SegmentDescriptor;

/// Recoverable anomalies collected while loading an image.
///
/// Everything after the TOC signature check is best-effort: a warning is
/// recorded and the load continues, possibly with a partially relocated
/// image. The analyst decides what to make of it.
#[derive(thiserror::Error, Debug)]
pub enum LoadWarning {
    #[error("segment {name}: {reason}")]
    SegmentSkipped { name: String, reason: String },

    #[error("scatter table not found")]
    ScatterNotFound,

    #[error("unable to read scatter table bounds at 0x{table_ptr:X}")]
    TableUnreadable { table_ptr: u32 },

    #[error("{kind} found at 0x{duplicate:X}, already found at 0x{existing:X} before")]
    DuplicateRole {
        kind: ScatterOpKind,
        existing: u32,
        duplicate: u32,
    },

    #[error("scatter entry {index}: op 0x{op:X} matches no known scatter function")]
    UnresolvedOp { index: usize, op: u32 },

    #[error("scatter entry {index}: {reason}")]
    EntrySkipped { index: usize, reason: String },
}

/// Where the scatter machinery ended up, for the analyst's report.
#[derive(Clone, Debug)]
pub struct ScatterSummary {
    /// Address of the scatterload routine found in the reset path.
    pub scatterload: u32,
    /// Absolute start of the scatter table.
    pub table_start: u32,
    /// Number of 16-byte records read.
    pub entry_count: usize,
    /// Role assignment for the op functions referenced by the table.
    pub roles: OpRoleMap,
}

/// Outcome of a whole load session.
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Segments mapped from the TOC header, in header order.
    pub segments: Vec<SegmentDescriptor>,
    /// Present iff the scatter table was located.
    pub scatter: Option<ScatterSummary>,
    pub warnings: Vec<LoadWarning>,
}

impl LoadReport {
    /// The reset vector sits at offset 0 of the MAIN segment.
    pub fn reset_entry(&self) -> Option<u32> {
        self.segments
            .iter()
            .find(|seg| seg.name == "MAIN")
            .map(|seg| seg.start)
    }
}
