//! A self-contained address-space image.
//!
//! Stands in for the analysis database: named regions with byte content
//! plus the entry points and labels the loader emits. The CLI and the
//! tests run the whole pipeline against this; a live session would back
//! the same traits with the real database.

use anyhow::{anyhow, bail, Result};

use crate::host::{ByteSource, ImageWriter, SegmentClass};

/// One mapped region. Regions from malformed input may overlap; that is
/// caller-visible but not rejected here.
#[derive(Clone, Debug)]
pub struct Region {
    pub name: String,
    pub start: u32,
    pub end: u32,
    pub class: SegmentClass,
    data: Vec<u8>,
}

impl Region {
    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    pub fn len(&self) -> u32 {
        self.end.wrapping_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    fn contains(&self, addr: u32) -> bool {
        addr >= self.start && addr < self.end
    }
}

#[derive(Debug, Default)]
pub struct MemoryImage {
    regions: Vec<Region>,
    entry_points: Vec<(u32, String)>,
    labels: Vec<(u32, String)>,
}

impl MemoryImage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn entry_points(&self) -> &[(u32, String)] {
        &self.entry_points
    }

    pub fn labels(&self) -> &[(u32, String)] {
        &self.labels
    }

    pub fn region_named(&self, name: &str) -> Option<&Region> {
        self.regions.iter().find(|r| r.name == name)
    }

    /// First region mapping `addr`, in creation order.
    pub fn region_containing(&self, addr: u32) -> Option<&Region> {
        self.regions.iter().find(|r| r.contains(addr))
    }

    fn region_containing_mut(&mut self, addr: u32) -> Option<&mut Region> {
        self.regions.iter_mut().find(|r| r.contains(addr))
    }
}

impl ByteSource for MemoryImage {
    fn read_bytes(&self, addr: u32, len: u32) -> Result<Vec<u8>> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let region = self
            .region_containing(addr)
            .ok_or_else(|| anyhow!("no region maps 0x{:X}", addr))?;
        let off = (addr - region.start) as usize;
        let end = off + len as usize;
        if end > region.data.len() {
            bail!(
                "read of {} bytes at 0x{:X} crosses the end of region {}",
                len,
                addr,
                region.name
            );
        }
        Ok(region.data[off..end].to_vec())
    }
}

impl ImageWriter for MemoryImage {
    fn create_region(
        &mut self,
        start: u32,
        len: u32,
        name: &str,
        class: SegmentClass,
    ) -> Result<()> {
        let end = start
            .checked_add(len)
            .ok_or_else(|| anyhow!("region {} wraps the address space", name))?;
        self.regions.push(Region {
            name: name.to_string(),
            start,
            end,
            class,
            data: vec![0; len as usize],
        });
        Ok(())
    }

    fn write_bytes(&mut self, addr: u32, bytes: &[u8]) -> Result<()> {
        if bytes.is_empty() {
            return Ok(());
        }
        let region = self
            .region_containing_mut(addr)
            .ok_or_else(|| anyhow!("no region maps 0x{:X}", addr))?;
        let off = (addr - region.start) as usize;
        let end = off + bytes.len();
        if end > region.data.len() {
            bail!(
                "write of {} bytes at 0x{:X} crosses the end of region {}",
                bytes.len(),
                addr,
                region.name
            );
        }
        region.data[off..end].copy_from_slice(bytes);
        Ok(())
    }

    fn mark_entry_point(&mut self, addr: u32, name: &str) {
        self.entry_points.push((addr, name.to_string()));
    }

    fn set_label(&mut self, addr: u32, name: &str) {
        self.labels.push((addr, name.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn read_back_what_was_written() {
        let mut image = MemoryImage::new();
        image
            .create_region(0x1000, 0x100, "SEG", SegmentClass::Code)
            .unwrap();
        image.write_bytes(0x1010, b"hello").unwrap();

        assert_eq!(image.read_bytes(0x1010, 5).unwrap(), b"hello");
        // untouched bytes stay zero
        assert_eq!(image.read_bytes(0x1000, 4).unwrap(), vec![0; 4]);
    }

    #[test]
    fn unmapped_access_fails() {
        let image = MemoryImage::new();
        assert!(image.read_bytes(0x1000, 4).is_err());

        let mut image = MemoryImage::new();
        image
            .create_region(0x1000, 0x10, "SEG", SegmentClass::Code)
            .unwrap();
        assert!(image.read_bytes(0x1008, 0x10).is_err()); // crosses the end
        assert!(image.write_bytes(0x100C, &[0; 8]).is_err());
    }

    #[test]
    fn zero_length_access_is_fine() {
        let mut image = MemoryImage::new();
        assert_eq!(image.read_bytes(0xDEAD, 0).unwrap(), Vec::<u8>::new());
        assert!(image.write_bytes(0xDEAD, &[]).is_ok());
    }

    #[test]
    fn lookup_by_name_and_address() {
        let mut image = MemoryImage::new();
        image
            .create_region(0x1000, 0x100, "A", SegmentClass::Code)
            .unwrap();
        image
            .create_region(0x4000, 0x100, "B", SegmentClass::Data)
            .unwrap();

        assert_eq!(image.region_named("B").unwrap().start, 0x4000);
        assert_eq!(image.region_containing(0x10FF).unwrap().name, "A");
        assert!(image.region_containing(0x2000).is_none());
    }
}
