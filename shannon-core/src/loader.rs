//! Maps the TOC header into the address space.

use anyhow::Result;

use crate::format::toc::{parse_toc_entries, SegmentDescriptor};
use crate::host::ImageWriter;
use crate::report::LoadWarning;

/// Vector table shape of the MAIN segment: the six real exception
/// entries plus two reserved slots that only get labels.
const VECTOR_ENTRIES: [(u32, &str); 6] = [
    (0, "reset"),
    (4, "undef_inst"),
    (8, "soft_int"),
    (12, "prefetch_abort"),
    (16, "data_abort"),
    (24, "irq"),
];

const VECTOR_LABELS: [(u32, &str); 2] = [(20, "reserved_1"), (28, "reserved_2")];

/// Parse the TOC header of `file` and load every segment into `image`.
///
/// Loaded regions carry a `_file` suffix to set the load-time file
/// mapping apart from the scatter regions created later. A segment whose
/// bytes cannot be mapped or copied is skipped with a warning; a bad
/// signature or truncated header rejects the whole file.
pub fn load_toc<W: ImageWriter>(
    file: &[u8],
    image: &mut W,
    warnings: &mut Vec<LoadWarning>,
) -> Result<Vec<SegmentDescriptor>> {
    let entries = parse_toc_entries(file)?;
    let mut segments = Vec::with_capacity(entries.len());

    for entry in &entries {
        let desc = SegmentDescriptor::from_entry(entry);
        log::info!(
            "segment {} [0x{:X}, 0x{:X}) class {}",
            desc.name,
            desc.start,
            desc.end,
            desc.class
        );

        if let Err(err) = map_segment(file, image, &desc) {
            log::warn!("segment {}: {:#}", desc.name, err);
            warnings.push(LoadWarning::SegmentSkipped {
                name: desc.name.clone(),
                reason: format!("{:#}", err),
            });
            continue;
        }

        match desc.name.as_str() {
            "BOOT" => image.mark_entry_point(desc.start, "bootloader_entry"),
            "MAIN" => annotate_vector_table(image, desc.start),
            _ => {}
        }

        segments.push(desc);
    }

    Ok(segments)
}

fn map_segment<W: ImageWriter>(
    file: &[u8],
    image: &mut W,
    desc: &SegmentDescriptor,
) -> Result<()> {
    let start = desc.file_offset as usize;
    let end = start
        .checked_add(desc.size() as usize)
        .filter(|&end| end <= file.len())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "file range [0x{:X}, +0x{:X}) is outside the image",
                start,
                desc.size()
            )
        })?;

    let region_name = format!("{}_file", desc.name);
    image.create_region(desc.start, desc.size(), &region_name, desc.class)?;
    image.write_bytes(desc.start, &file[start..end])?;
    Ok(())
}

fn annotate_vector_table<W: ImageWriter>(image: &mut W, base: u32) {
    for (offset, name) in VECTOR_ENTRIES {
        image.mark_entry_point(base + offset, name);
    }
    for (offset, name) in VECTOR_LABELS {
        image.set_label(base + offset, name);
    }
}
