//! shannon-core
//!
//! Loader core for Samsung Shannon baseband firmware images: parses the
//! TOC container into a flat address space, finds the scatter-load table
//! hidden in the boot code, classifies the scatter op functions by
//! control-flow shape and materializes the relocated/decompressed image.
//!
//! The crate talks to its host (a disassembler database, or the bundled
//! [`image::MemoryImage`]) only through the capability traits in
//! [`host`]; everything algorithmic is host-independent.

pub mod addr;
pub mod apply;
pub mod classify;
pub mod codec;
pub mod format;
pub mod host;
pub mod image;
pub mod loader;
pub mod locate;
pub mod report;

/// Test scaffolding (kept as a module, not dev-only code, so downstream
/// crates can script a [`host::CodeAnalyzer`] too).
pub mod testing;

use host::{ByteSource, CodeAnalyzer, ImageWriter};
use report::{LoadReport, LoadWarning, ScatterSummary};

/// Stage one: map the TOC container into `image`.
///
/// Rejects files without the `TOC` signature; everything past that is
/// best-effort and lands in the report's warning list.
pub fn load_firmware<W: ImageWriter>(file: &[u8], image: &mut W) -> anyhow::Result<LoadReport> {
    let mut report = LoadReport::default();
    report.segments = loader::load_toc(file, image, &mut report.warnings)?;
    log::info!("loader done, {} segments", report.segments.len());
    Ok(report)
}

/// Stage two: locate, read, classify and apply the scatter table.
///
/// `reset_entry` is the reset vector (offset 0 of MAIN, see
/// [`LoadReport::reset_entry`]). Never fails: without a scatter table the
/// image simply stays in its raw TOC layout, and the report says so.
pub fn process_scatter<H, A>(host: &mut H, analyzer: &A, reset_entry: u32, report: &mut LoadReport)
where
    H: ByteSource + ImageWriter,
    A: CodeAnalyzer + ?Sized,
{
    let Some(call) = locate::find_scatter_call(analyzer, reset_entry) else {
        log::error!("scatter table not found");
        report.warnings.push(LoadWarning::ScatterNotFound);
        return;
    };

    let table = match format::scatter::read_scatter_table(host, call.table_ptr) {
        Ok(table) => table,
        Err(err) => {
            log::error!("unable to create scatter table: {:#}", err);
            report
                .warnings
                .push(LoadWarning::TableUnreadable { table_ptr: call.table_ptr });
            return;
        }
    };

    // classify each distinct op function once, in table order
    let mut ops: Vec<u32> = Vec::new();
    for entry in &table.entries {
        let op = addr::realign_op(entry.op);
        if !ops.contains(&op) {
            ops.push(op);
        }
    }
    let roles = classify::classify_ops(analyzer, &ops, &mut report.warnings);

    apply::apply_scatter_table(host, &table, &roles, &mut report.warnings);

    report.scatter = Some(ScatterSummary {
        scatterload: call.scatterload,
        table_start: table.start,
        entry_count: table.len(),
        roles,
    });
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::classify::ScatterOpKind;
    use crate::host::Operand::{Imm, Reg};
    use crate::host::SegmentClass;
    use crate::image::MemoryImage;
    use crate::testing::ScriptedAnalyzer;

    const MAIN_BASE: u32 = 0x2000;
    const TABLE_PTR: u32 = MAIN_BASE + 0x800;
    const COPY_SRC: u32 = MAIN_BASE + 0x900;
    const COMP_SRC: u32 = MAIN_BASE + 0x940;

    const NULL_FN: u32 = 0x2100;
    const ZERO_FN: u32 = 0x2120;
    const COPY_FN: u32 = 0x2140;
    const COMP_FN: u32 = 0x2160;
    const SCATTERLOAD: u32 = 0x20000;

    fn push_entry(toc: &mut Vec<u8>, name: &str, file_offset: u32, load: u32, size: u32) {
        let mut entry = [0u8; 0x20];
        entry[..name.len()].copy_from_slice(name.as_bytes());
        entry[12..16].copy_from_slice(&file_offset.to_le_bytes());
        entry[16..20].copy_from_slice(&load.to_le_bytes());
        entry[20..24].copy_from_slice(&size.to_le_bytes());
        toc.extend_from_slice(&entry);
    }

    fn raw_record(src: u32, dst: u32, size: u32, op: u32) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(16);
        bytes.extend_from_slice(&src.to_le_bytes());
        bytes.extend_from_slice(&dst.to_le_bytes());
        bytes.extend_from_slice(&size.to_le_bytes());
        bytes.extend_from_slice(&op.to_le_bytes());
        bytes
    }

    /// MAIN segment content: boundary pair at +0x800, four records at
    /// +0x810, copy source at +0x900 and a compressed blob at +0x940.
    fn main_content() -> Vec<u8> {
        let mut main = vec![0u8; 0x1000];

        let mut body = Vec::new();
        body.extend(raw_record(0, 0x7000, 0x20, NULL_FN));
        body.extend(raw_record(0, 0x7100, 0x10, ZERO_FN));
        body.extend(raw_record(COPY_SRC, 0x5000, 16, COPY_FN));
        body.extend(raw_record(COMP_SRC, 0x6000, 5, COMP_FN));

        main[0x800..0x804].copy_from_slice(&0x10u32.to_le_bytes());
        main[0x804..0x808].copy_from_slice(&(0x10 + body.len() as u32).to_le_bytes());
        main[0x810..0x810 + body.len()].copy_from_slice(&body);

        main[0x900..0x910].copy_from_slice(b"0123456789abcdef");
        main[0x940..0x945].copy_from_slice(&[0x33, b'A', b'B', b'C', 0x03]);
        main
    }

    fn toc_file() -> Vec<u8> {
        let mut file = vec![0u8; 0x20];
        file[..3].copy_from_slice(b"TOC");
        push_entry(&mut file, "BOOT", 0x100, 0x1000, 0x100);
        push_entry(&mut file, "MAIN", 0x200, MAIN_BASE, 0x1000);
        push_entry(&mut file, "NV", 0x1200, 0x4000, 0x100);
        file.extend_from_slice(&[0u8; 0x20]);
        file.resize(0x200, 0);
        file.extend(main_content());
        file.extend(std::iter::repeat(0x11).take(0x100)); // NV content
        file
    }

    fn scripted_analyzer() -> ScriptedAnalyzer {
        let mut a = ScriptedAnalyzer::new();

        // reset function: two supervisor switches, double jump, call
        a.define_function(MAIN_BASE, MAIN_BASE + 0x100);
        a.push_insn(MAIN_BASE, "B", vec![Imm(MAIN_BASE + 0x40)]);
        a.push_insn(MAIN_BASE + 0x40, "MSR", vec![Reg("CPSR_c".into()), Imm(0xD3)]);
        a.push_insn(MAIN_BASE + 0x44, "LDR", vec![]);
        a.push_insn(MAIN_BASE + 0x48, "MSR", vec![Reg("CPSR_c".into()), Imm(0xD3)]);
        a.push_insn(MAIN_BASE + 0x4C, "B", vec![Imm(MAIN_BASE + 0x60)]);
        a.push_insn(MAIN_BASE + 0x60, "B", vec![Imm(MAIN_BASE + 0x70)]);
        a.push_insn(MAIN_BASE + 0x70, "BL", vec![Imm(SCATTERLOAD)]);
        a.push_insn(SCATTERLOAD, "ADR", vec![Reg("R0".into()), Imm(TABLE_PTR)]);

        // null op: straight-line stub
        a.define_function(NULL_FN, NULL_FN + 0x10);
        a.push_insn(NULL_FN, "MOV", vec![]);
        a.push_insn(NULL_FN + 4, "BX", vec![Reg("LR".into())]);

        // zero-init op
        a.define_function(ZERO_FN, ZERO_FN + 0x20);
        a.push_insn(ZERO_FN, "MOVS", vec![]);
        a.push_insn(ZERO_FN + 4, "MOVS", vec![]);
        a.push_insn(ZERO_FN + 8, "BNE", vec![Imm(ZERO_FN + 8)]);

        // copy op: self-loop
        a.define_function(COPY_FN, COPY_FN + 0x20);
        a.push_insn(COPY_FN, "LDRB", vec![]);
        a.push_insn(COPY_FN + 4, "STRB", vec![]);
        a.push_insn(COPY_FN + 8, "B", vec![Imm(COPY_FN)]);

        // decompress op: three loops
        a.define_function(COMP_FN, COMP_FN + 0x40);
        a.push_insn(COMP_FN, "LDRB", vec![]);
        a.push_insn(COMP_FN + 4, "BNE", vec![Imm(COMP_FN + 0x10)]);
        a.push_insn(COMP_FN + 8, "BCC", vec![Imm(COMP_FN + 0x20)]);
        a.push_insn(COMP_FN + 12, "B", vec![Imm(COMP_FN + 4)]);

        a
    }

    #[test]
    fn full_load_and_scatter_pipeline() {
        let file = toc_file();
        let mut image = MemoryImage::new();

        let mut report = load_firmware(&file, &mut image).unwrap();
        assert_eq!(report.segments.len(), 3);
        assert_eq!(image.regions().len(), 3);
        assert_eq!(image.region_named("NV_file").unwrap().class, SegmentClass::Data);
        assert_eq!(report.reset_entry(), Some(MAIN_BASE));

        let main_entries: Vec<u32> = image
            .entry_points()
            .iter()
            .filter(|(_, name)| name != "bootloader_entry")
            .map(|(addr, _)| *addr)
            .collect();
        assert_eq!(
            main_entries,
            vec![
                MAIN_BASE,
                MAIN_BASE + 4,
                MAIN_BASE + 8,
                MAIN_BASE + 12,
                MAIN_BASE + 16,
                MAIN_BASE + 24
            ]
        );

        let analyzer = scripted_analyzer();
        process_scatter(&mut image, &analyzer, MAIN_BASE, &mut report);

        assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);
        let scatter = report.scatter.as_ref().unwrap();
        assert_eq!(scatter.scatterload, SCATTERLOAD);
        assert_eq!(scatter.table_start, TABLE_PTR + 0x10);
        assert_eq!(scatter.entry_count, 4);
        assert_eq!(scatter.roles.kind_of(NULL_FN), Some(ScatterOpKind::Null));
        assert_eq!(scatter.roles.kind_of(COPY_FN), Some(ScatterOpKind::Copy));

        // markers
        let null = image.region_named("SCATTERNULL_0").unwrap();
        assert_eq!((null.start, null.end), (0x7000, 0x7020));
        assert!(image.region_named("SCATTERZERO_1").is_some());

        // copy landed verbatim
        let copied = image.region_named("SCATTER_2").unwrap();
        assert_eq!(copied.bytes(), b"0123456789abcdef");

        // decompression materialized the decoded bytes
        let decoded = image.region_named("SCATCOMP_3").unwrap();
        assert_eq!(decoded.bytes(), b"ABCAB");
    }

    #[test]
    fn image_without_scatter_call_still_loads() {
        let file = toc_file();
        let mut image = MemoryImage::new();
        let mut report = load_firmware(&file, &mut image).unwrap();

        // an analyzer that knows nothing about the reset path
        let analyzer = ScriptedAnalyzer::new();
        process_scatter(&mut image, &analyzer, MAIN_BASE, &mut report);

        assert!(report.scatter.is_none());
        assert!(matches!(report.warnings[..], [report::LoadWarning::ScatterNotFound]));
        assert_eq!(image.regions().len(), 3);
    }

    #[test]
    fn rejects_non_toc_file() {
        let mut image = MemoryImage::new();
        assert!(load_firmware(&[0u8; 0x100], &mut image).is_err());
        assert!(image.regions().is_empty());
    }
}
