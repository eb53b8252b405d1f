//! Test scaffolding for the scatter heuristics.
//!
//! This is intentionally a module (not dev-only code duplicated per
//! test) so unit tests and downstream crates can script a
//! [`CodeAnalyzer`] without a live disassembler.

use std::collections::BTreeMap;
use std::ops::Bound::{Excluded, Unbounded};

use crate::host::{Branch, CodeAnalyzer, Insn, Operand};

/// A [`CodeAnalyzer`] driven by hand-placed instructions.
///
/// Branch enumeration treats any mnemonic starting with `B` whose first
/// operand is an immediate as a direct branch; register branches
/// (`BX LR` and friends) are indirect and not reported.
#[derive(Debug, Default)]
pub struct ScriptedAnalyzer {
    insns: BTreeMap<u32, Insn>,
    functions: Vec<(u32, u32)>,
}

impl ScriptedAnalyzer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare `[start, end)` as a function body.
    pub fn define_function(&mut self, start: u32, end: u32) {
        self.functions.push((start, end));
    }

    pub fn push_insn(&mut self, addr: u32, mnemonic: &str, operands: Vec<Operand>) {
        self.insns.insert(
            addr,
            Insn {
                addr,
                mnemonic: mnemonic.to_string(),
                operands,
            },
        );
    }
}

impl CodeAnalyzer for ScriptedAnalyzer {
    fn function_bounds(&self, addr: u32) -> Option<(u32, u32)> {
        self.functions
            .iter()
            .find(|(start, end)| addr >= *start && addr < *end)
            .copied()
    }

    fn instruction_at(&self, addr: u32) -> Option<Insn> {
        self.insns.get(&addr).cloned()
    }

    fn next_instruction(&self, addr: u32) -> Option<u32> {
        self.insns
            .range((Excluded(addr), Unbounded))
            .next()
            .map(|(next, _)| *next)
    }

    fn branch_instructions(&self, func: u32) -> Vec<Branch> {
        let Some((start, end)) = self.function_bounds(func) else {
            return Vec::new();
        };
        self.insns
            .range(start..end)
            .filter(|(_, insn)| insn.mnemonic.starts_with('B'))
            .filter_map(|(addr, insn)| {
                insn.imm(0).map(|target| Branch { addr: *addr, target })
            })
            .collect()
    }
}
