use std::io::Cursor;

use anyhow::{bail, Context, Result};
use byteorder::{LittleEndian, ReadBytesExt};

use crate::host::SegmentClass;

/// File signature at offset 0.
pub const TOC_MAGIC: &[u8; 3] = b"TOC";

/// The header entry array starts one entry past the signature block.
pub const FIRST_ENTRY_OFFSET: usize = 0x20;

/// Fixed size of one header entry.
pub const ENTRY_SIZE: usize = 0x20;

const NAME_LEN: usize = 12;

/// One record of the TOC header array.
///
/// Layout (little-endian): 12-byte NUL-padded name, then
/// `file_offset`, `load_address`, `size` and two unused u32 fields.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TocEntry {
    pub name: String,
    pub file_offset: u32,
    pub load_address: u32,
    pub size: u32,
}

/// A segment derived 1:1 from a [`TocEntry`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SegmentDescriptor {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub class: SegmentClass,
    pub file_offset: u32,
}

impl SegmentDescriptor {
    pub fn from_entry(entry: &TocEntry) -> Self {
        Self {
            name: entry.name.clone(),
            start: entry.load_address,
            end: entry.load_address.wrapping_add(entry.size),
            class: segment_class(&entry.name),
            file_offset: entry.file_offset,
        }
    }

    pub fn size(&self) -> u32 {
        self.end.wrapping_sub(self.start)
    }
}

/// NV-bearing names hold calibration/provisioning data, everything else
/// in these images is code.
pub fn segment_class(name: &str) -> SegmentClass {
    if name.contains("NV") {
        SegmentClass::Data
    } else {
        SegmentClass::Code
    }
}

/// Check the 3-byte signature without touching anything else.
pub fn is_toc_image(bytes: &[u8]) -> bool {
    bytes.len() >= TOC_MAGIC.len() && &bytes[..TOC_MAGIC.len()] == TOC_MAGIC
}

/// Parse the header entry array.
///
/// Entries sit at `0x20, 0x40, 0x60, ...`; the first record whose name is
/// empty after NUL-stripping terminates the array and is not returned.
/// A bad signature or a header that runs off the end of the file is a
/// hard error: the file is not this container.
pub fn parse_toc_entries(bytes: &[u8]) -> Result<Vec<TocEntry>> {
    if !is_toc_image(bytes) {
        bail!("not a TOC image (bad signature)");
    }

    let mut entries = Vec::new();
    let mut off = FIRST_ENTRY_OFFSET;

    loop {
        if off + ENTRY_SIZE > bytes.len() {
            bail!("truncated TOC header entry at offset 0x{:X}", off);
        }

        let raw_name = &bytes[off..off + NAME_LEN];
        let name = String::from_utf8_lossy(raw_name)
            .trim_matches('\0')
            .to_string();
        if name.is_empty() {
            break;
        }

        let mut cursor = Cursor::new(&bytes[off + NAME_LEN..off + ENTRY_SIZE]);
        let file_offset = cursor
            .read_u32::<LittleEndian>()
            .with_context(|| format!("read file_offset of entry {:?}", name))?;
        let load_address = cursor
            .read_u32::<LittleEndian>()
            .with_context(|| format!("read load_address of entry {:?}", name))?;
        let size = cursor
            .read_u32::<LittleEndian>()
            .with_context(|| format!("read size of entry {:?}", name))?;
        // two unused u32 fields follow; nothing reads them

        entries.push(TocEntry {
            name,
            file_offset,
            load_address,
            size,
        });

        off += ENTRY_SIZE;
    }

    Ok(entries)
}
