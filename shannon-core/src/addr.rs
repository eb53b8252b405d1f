//! Address-normalization helpers for ISA quirks in the boot path.
//!
//! Kept as standalone functions so the quirks stay testable without a
//! live disassembler.

use crate::host::CodeAnalyzer;

/// Realign a scatter op-function pointer.
///
/// Thumb code pointers in the table can be off by one against the
/// 4-aligned function start; bump any misaligned address by one, exactly
/// like the load-time code does.
pub fn realign_op(addr: u32) -> u32 {
    if addr % 4 != 0 {
        addr.wrapping_add(1)
    } else {
        addr
    }
}

/// Follow a double-jump trampoline one hop.
///
/// `branch_addr` is an unconditional branch to `target`. Some images
/// insert a second branch at the target; in that case the interesting
/// branch is the one at `target` itself. Returns the address of the
/// branch to resolve further, or `None` when the target does not decode.
pub fn follow_branch<A: CodeAnalyzer + ?Sized>(
    analyzer: &A,
    branch_addr: u32,
    target: u32,
) -> Option<u32> {
    let insn = analyzer.instruction_at(target)?;
    if insn.mnemonic == "B" {
        log::debug!("additional jump at 0x{:X}", target);
        Some(target)
    } else {
        Some(branch_addr)
    }
}
