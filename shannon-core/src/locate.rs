//! Heuristic search for the scatter-load call in the reset path.
//!
//! No symbols exist in these images, so the locator walks the reset
//! function by instruction shape: the boot monitor switches into
//! supervisor mode once for itself, then a second time right before
//! handing over to the C runtime; the scatterload call is the first
//! unconditional branch after that second switch.

use crate::addr;
use crate::host::CodeAnalyzer;

/// CPSR value written when entering supervisor mode with IRQ/FIQ masked.
pub const SUPERVISOR_MODE: u32 = 0xD3;

/// Anything below this cannot be a code address in these images; a
/// smaller candidate means the operand did not resolve.
const MIN_CODE_ADDR: u32 = 0xFFFF;

/// Result of a successful search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScatterCall {
    /// Address of the scatterload routine.
    pub scatterload: u32,
    /// Address of the start/stop boundary pair of the scatter table.
    pub table_ptr: u32,
}

fn is_supervisor_switch<A: CodeAnalyzer + ?Sized>(analyzer: &A, addr: u32) -> bool {
    let Some(insn) = analyzer.instruction_at(addr) else {
        return false;
    };
    if !insn.mnemonic.contains("MSR") {
        return false;
    }
    let Some(dest) = insn.reg(0) else {
        return false;
    };
    dest.contains("CPSR") && insn.imm(1) == Some(SUPERVISOR_MODE)
}

/// Locate the scatterload routine and its table pointer, starting from
/// the reset vector entry.
///
/// Returns `None` when the function bounds are exhausted before the
/// second mode switch or before a branch is found; the image is still
/// usable without scatter processing.
pub fn find_scatter_call<A: CodeAnalyzer + ?Sized>(
    analyzer: &A,
    reset_entry: u32,
) -> Option<ScatterCall> {
    let (start, end) = analyzer.function_bounds(reset_entry)?;

    let mut mode_switches = 0;
    let mut cur = start;
    loop {
        cur = analyzer.next_instruction(cur)?;
        if cur >= end {
            return None;
        }

        if is_supervisor_switch(analyzer, cur) {
            mode_switches += 1;
            if mode_switches < 2 {
                continue;
            }
            log::debug!("second supervisor mode switch found at 0x{:X}", cur);
            return resolve_first_branch(analyzer, cur, end);
        }
    }
}

/// From the second mode switch, take the first unconditional branch and
/// chase it down to the scatterload routine.
fn resolve_first_branch<A: CodeAnalyzer + ?Sized>(
    analyzer: &A,
    from: u32,
    end: u32,
) -> Option<ScatterCall> {
    let mut cur = from;
    loop {
        cur = analyzer.next_instruction(cur)?;
        let Some(insn) = analyzer.instruction_at(cur) else {
            log::error!("no opcode at 0x{:X} while searching for the scatter branch", cur);
            return None;
        };

        if insn.mnemonic == "B" {
            log::debug!("scatter candidate at 0x{:X}", cur);
            let target = insn.imm(0)?;
            let call_site = addr::follow_branch(analyzer, cur, target)?;
            return resolve_scatterload(analyzer, call_site);
        }

        if cur >= end {
            return None;
        }
    }
}

fn resolve_scatterload<A: CodeAnalyzer + ?Sized>(
    analyzer: &A,
    call_site: u32,
) -> Option<ScatterCall> {
    let branch = analyzer.instruction_at(call_site)?;
    let scatter_target = branch.imm(0)?;

    let call_insn = analyzer.instruction_at(scatter_target)?;
    let scatterload = match call_insn.imm(0) {
        Some(addr) if addr >= MIN_CODE_ADDR => addr,
        _ => {
            log::error!("scatter table not found");
            return None;
        }
    };
    log::info!("scatterload(): 0x{:X}", scatterload);

    let load_insn = analyzer.instruction_at(scatterload)?;
    let table_ptr = load_insn.imm(1)?;

    Some(ScatterCall { scatterload, table_ptr })
}
