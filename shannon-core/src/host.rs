use std::fmt;

use anyhow::Result;

/// Class tag for a mapped region in the analysis database.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SegmentClass {
    Code,
    Data,
}

impl fmt::Display for SegmentClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SegmentClass::Code => write!(f, "CODE"),
            SegmentClass::Data => write!(f, "DATA"),
        }
    }
}

/// Read access to the flat address space of the loaded image.
pub trait ByteSource {
    fn read_bytes(&self, addr: u32, len: u32) -> Result<Vec<u8>>;
}

/// Write access to the loaded image: region creation, byte patching and
/// the couple of annotations the loader emits (entry points, labels).
///
/// In a live analysis session this is backed by the database; for tests
/// and the CLI it is backed by [`crate::image::MemoryImage`].
pub trait ImageWriter {
    fn create_region(&mut self, start: u32, len: u32, name: &str, class: SegmentClass)
        -> Result<()>;

    fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<()>;

    fn mark_entry_point(&mut self, addr: u32, name: &str);

    fn set_label(&mut self, addr: u32, name: &str);
}

/// An instruction operand, reduced to what the scatter heuristics consume.
///
/// Anything richer (shifts, memory operands, condition codes) belongs to
/// the host disassembler and never crosses this boundary.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operand {
    Reg(String),
    Imm(u32),
}

/// A decoded instruction as reported by the host disassembler.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Insn {
    pub addr: u32,
    pub mnemonic: String,
    pub operands: Vec<Operand>,
}

impl Insn {
    /// Immediate value of operand `idx`, if it is one.
    pub fn imm(&self, idx: usize) -> Option<u32> {
        match self.operands.get(idx) {
            Some(Operand::Imm(v)) => Some(*v),
            _ => None,
        }
    }

    /// Register name of operand `idx`, if it is one.
    pub fn reg(&self, idx: usize) -> Option<&str> {
        match self.operands.get(idx) {
            Some(Operand::Reg(name)) => Some(name.as_str()),
            _ => None,
        }
    }
}

/// A direct branch instruction inside a function and its resolved target.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Branch {
    pub addr: u32,
    pub target: u32,
}

/// Control-flow introspection hooks.
///
/// This keeps the locator and classifier independent from any concrete
/// disassembler while still enabling:
/// - instruction-by-instruction scans over a function body
/// - per-function branch enumeration for the shape metrics
pub trait CodeAnalyzer {
    /// `[start, end)` of the function containing `addr`, if known.
    fn function_bounds(&self, addr: u32) -> Option<(u32, u32)>;

    /// Decode the instruction at `addr`.
    fn instruction_at(&self, addr: u32) -> Option<Insn>;

    /// Address of the instruction following the one at `addr`.
    fn next_instruction(&self, addr: u32) -> Option<u32>;

    /// All direct branch instructions inside the function starting at `func`.
    fn branch_instructions(&self, func: u32) -> Vec<Branch>;

    /// Mnemonics of the first `n` instructions of the function at `func`.
    fn first_mnemonics(&self, func: u32, n: usize) -> Vec<String> {
        let mut out = Vec::with_capacity(n);
        let mut cur = func;
        while out.len() < n {
            match self.instruction_at(cur) {
                Some(insn) => out.push(insn.mnemonic),
                None => break,
            }
            match self.next_instruction(cur) {
                Some(next) if next > cur => cur = next,
                _ => break,
            }
        }
        out
    }
}
