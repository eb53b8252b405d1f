//! Applies classified scatter records to the address space.

use anyhow::{anyhow, Context, Result};

use crate::addr::realign_op;
use crate::classify::{OpRoleMap, ScatterOpKind};
use crate::codec;
use crate::format::scatter::ScatterTable;
use crate::host::{ByteSource, ImageWriter, SegmentClass};
use crate::report::LoadWarning;

/// Walk the table in order and perform each record's action.
///
/// Records are independent: one failing to apply is reported and the
/// rest still run. Marker regions for Null/ZeroInit records do not carry
/// byte content; they only make visible what was supposed to be mapped
/// or zeroed out.
pub fn apply_scatter_table<H>(
    host: &mut H,
    table: &ScatterTable,
    roles: &OpRoleMap,
    warnings: &mut Vec<LoadWarning>,
) where
    H: ByteSource + ImageWriter,
{
    for (index, entry) in table.entries.iter().enumerate() {
        log::info!(
            "processing scatter - src: 0x{:X} dst: 0x{:X} size: {} op: 0x{:X}",
            entry.src,
            entry.dst,
            entry.size,
            entry.op
        );

        let Some(kind) = roles.kind_of(realign_op(entry.op)) else {
            log::warn!(
                "scatter entry {}: op 0x{:X} matches no known scatter function",
                index,
                entry.op
            );
            warnings.push(LoadWarning::UnresolvedOp { index, op: entry.op });
            continue;
        };

        if let Err(err) = apply_entry(host, index, entry, kind) {
            log::warn!("scatter entry {}: {:#}", index, err);
            warnings.push(LoadWarning::EntrySkipped {
                index,
                reason: format!("{:#}", err),
            });
        }
    }
}

fn apply_entry<H>(
    host: &mut H,
    index: usize,
    entry: &crate::format::scatter::ScatterEntry,
    kind: ScatterOpKind,
) -> Result<()>
where
    H: ByteSource + ImageWriter,
{
    match kind {
        ScatterOpKind::Null => {
            if entry.size > 0 {
                let name = format!("SCATTERNULL_{}", index);
                host.create_region(entry.dst, entry.size, &name, SegmentClass::Code)?;
            }
        }
        ScatterOpKind::ZeroInit => {
            if entry.size > 0 {
                let name = format!("SCATTERZERO_{}", index);
                host.create_region(entry.dst, entry.size, &name, SegmentClass::Code)?;
            }
        }
        ScatterOpKind::Copy => {
            if entry.size > 0 {
                let chunk = host
                    .read_bytes(entry.src, entry.size)
                    .context("read copy source")?;
                let name = format!("SCATTER_{}", index);
                host.create_region(entry.dst, entry.size, &name, SegmentClass::Code)?;
                host.write_bytes(entry.dst, &chunk)?;
            }
        }
        ScatterOpKind::Decompress => {
            let window = read_codec_window(host, entry.src, entry.size)?;
            let decoded = codec::decompress(&window, entry.size as usize);
            let name = format!("SCATCOMP_{}", index);
            host.create_region(entry.dst, decoded.len() as u32, &name, SegmentClass::Code)?;
            host.write_bytes(entry.dst, &decoded)?;
            log::info!(
                "decompressed {} bytes, from 0x{:X} to 0x{:X}",
                decoded.len(),
                entry.src,
                entry.dst
            );
        }
    }
    Ok(())
}

/// The codec may read a little past `cnt` when a record straddles the
/// boundary, so hand it a lookahead window when the region allows one.
fn read_codec_window<S: ByteSource + ?Sized>(source: &S, src: u32, cnt: u32) -> Result<Vec<u8>> {
    let extended = cnt.checked_add(codec::MAX_LOOKAHEAD);
    if let Some(extended) = extended {
        if let Ok(window) = source.read_bytes(src, extended) {
            return Ok(window);
        }
    }
    source
        .read_bytes(src, cnt)
        .map_err(|err| anyhow!("read compressed source: {:#}", err))
}
