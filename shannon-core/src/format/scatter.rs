use std::io::Cursor;

use anyhow::{Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};

use crate::host::ByteSource;

/// Fixed size of one scatter record.
pub const SCATTER_ENTRY_SIZE: u32 = 16;

/// One scatter-load record.
///
/// `op` is the address of one of the scatter functions, not an enum
/// value; it has to go through the classifier before it means anything.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScatterEntry {
    pub src: u32,
    pub dst: u32,
    pub size: u32,
    pub op: u32,
}

/// The decoded scatter table, in table order.
#[derive(Clone, Debug)]
pub struct ScatterTable {
    pub start: u32,
    pub stop: u32,
    pub entries: Vec<ScatterEntry>,
}

impl ScatterTable {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_u32_at<S: ByteSource + ?Sized>(source: &S, addr: u32) -> Result<u32> {
    let bytes = source.read_bytes(addr, 4)?;
    let mut cursor = Cursor::new(bytes);
    Ok(cursor.read_u32::<LittleEndian>()?)
}

/// Read the scatter table whose boundary pair lives at `table_ptr`.
///
/// The two words at `table_ptr` and `table_ptr + 4` are offsets relative
/// to `table_ptr` itself (modulo 2^32); the table body is a packed array
/// of 16-byte records between the resolved start and stop. Trailing bytes
/// that do not fill a whole record are ignored.
pub fn read_scatter_table<S: ByteSource + ?Sized>(source: &S, table_ptr: u32) -> Result<ScatterTable> {
    let rel_start = read_u32_at(source, table_ptr).context("read scatter start word")?;
    let rel_stop = read_u32_at(source, table_ptr + 4).context("read scatter stop word")?;

    let start = rel_start.wrapping_add(table_ptr);
    let stop = rel_stop.wrapping_add(table_ptr);
    let size = stop.wrapping_sub(start);
    let count = size / SCATTER_ENTRY_SIZE;

    let mut entries = Vec::with_capacity(count as usize);
    for i in 0..count {
        let addr = start + i * SCATTER_ENTRY_SIZE;
        let bytes = source
            .read_bytes(addr, SCATTER_ENTRY_SIZE)
            .with_context(|| format!("read scatter entry {} at 0x{:X}", i, addr))?;
        let mut cursor = Cursor::new(bytes);
        entries.push(ScatterEntry {
            src: cursor.read_u32::<LittleEndian>()?,
            dst: cursor.read_u32::<LittleEndian>()?,
            size: cursor.read_u32::<LittleEndian>()?,
            op: cursor.read_u32::<LittleEndian>()?,
        });
    }

    log::info!(
        "scatter table at 0x{:X}, size {}, table has {} entries",
        start,
        size,
        count
    );

    Ok(ScatterTable { start, stop, entries })
}
