//! Region-based virtual address translation
//!
//! Translation is a linear first-match scan over the mapped regions, in
//! mapping order. There is no page table and no per-region unmap; the
//! region list only grows until `clear_mappings`.

use std::sync::Arc;

use bitflags::bitflags;
use parking_lot::RwLock;
use xe_core::error::MemoryError;

use crate::device::MemoryDevice;

bitflags! {
    /// Region access capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Protection: u32 {
        const READ    = 0b001;
        const WRITE   = 0b010;
        const EXECUTE = 0b100;

        const RW  = Self::READ.bits() | Self::WRITE.bits();
        const RX  = Self::READ.bits() | Self::EXECUTE.bits();
        const RWX = Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits();
    }
}

impl Protection {
    fn describe(self) -> &'static str {
        if self.contains(Protection::EXECUTE) {
            "execute"
        } else if self.contains(Protection::WRITE) {
            "write"
        } else {
            "read"
        }
    }
}

/// A window of the guest address space backed by a device.
///
/// `virtual_end` is exclusive. The device is shared: several regions may
/// alias the same backing store at different virtual bases.
pub struct MemoryRegion {
    pub device: Arc<dyn MemoryDevice>,
    pub virtual_start: u64,
    pub virtual_end: u64,
    pub physical_start: u64,
    pub protection: Protection,
}

impl MemoryRegion {
    fn contains(&self, addr: u64) -> bool {
        addr >= self.virtual_start && addr < self.virtual_end
    }

    fn translate(&self, addr: u64) -> u64 {
        addr - self.virtual_start + self.physical_start
    }
}

/// The memory management unit: ordered region list plus typed big-endian
/// accessors over it.
#[derive(Default)]
pub struct Mmu {
    regions: RwLock<Vec<MemoryRegion>>,
}

impl Mmu {
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `[virtual_start, virtual_end)` onto `device` at `physical_start`.
    ///
    /// Regions are scanned in mapping order and the first containing
    /// region wins; overlaps are legal and resolved by that rule alone.
    pub fn map_memory(
        &self,
        device: Arc<dyn MemoryDevice>,
        virtual_start: u64,
        virtual_end: u64,
        physical_start: u64,
        protection: Protection,
    ) {
        tracing::info!(
            target: "mmu",
            "mapped 0x{:08X}-0x{:08X} -> {} +0x{:X} ({:?})",
            virtual_start,
            virtual_end,
            device.name(),
            physical_start,
            protection
        );
        self.regions.write().push(MemoryRegion {
            device,
            virtual_start,
            virtual_end,
            physical_start,
            protection,
        });
    }

    /// Drop every mapping. Devices stay alive as long as callers hold them.
    pub fn clear_mappings(&self) {
        self.regions.write().clear();
    }

    pub fn region_count(&self) -> usize {
        self.regions.read().len()
    }

    /// Run `f` against the first region containing `addr`, after checking
    /// that the region grants `wanted`.
    fn with_region<T>(
        &self,
        addr: u64,
        wanted: Protection,
        f: impl FnOnce(&MemoryRegion) -> Result<T, MemoryError>,
    ) -> Result<T, MemoryError> {
        let regions = self.regions.read();
        for region in regions.iter() {
            if region.contains(addr) {
                if !region.protection.contains(wanted) {
                    tracing::debug!(
                        target: "mmu",
                        "permission denied at 0x{:08X} (wanted {})",
                        addr,
                        wanted.describe()
                    );
                    return Err(MemoryError::AccessViolation {
                        addr,
                        wanted: wanted.describe(),
                    });
                }
                return f(region);
            }
        }
        tracing::debug!(target: "mmu", "unmapped access at 0x{:08X}", addr);
        Err(MemoryError::Unmapped { addr })
    }

    fn bounded(region: &MemoryRegion, addr: u64, len: u64) -> Result<u64, MemoryError> {
        if addr.checked_add(len).map_or(true, |end| end > region.virtual_end) {
            return Err(MemoryError::OutOfBounds { addr, len });
        }
        Ok(region.translate(addr))
    }

    /// Bulk read; bounds-checked against the region end.
    pub fn read_bytes(&self, addr: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        self.with_region(addr, Protection::READ, |region| {
            let phys = Self::bounded(region, addr, buf.len() as u64)?;
            region.device.read(phys, buf)
        })
    }

    /// Bulk write; bounds-checked against the region end.
    pub fn write_bytes(&self, addr: u64, data: &[u8]) -> Result<(), MemoryError> {
        self.with_region(addr, Protection::WRITE, |region| {
            let phys = Self::bounded(region, addr, data.len() as u64)?;
            region.device.write(phys, data)
        })
    }

    /// Fill `len` bytes with `value`.
    pub fn mem_set(&self, addr: u64, value: u8, len: u64) -> Result<(), MemoryError> {
        self.with_region(addr, Protection::WRITE, |region| {
            let phys = Self::bounded(region, addr, len)?;
            region.device.fill(phys, value, len)
        })
    }

    /// Raw pointer into the backing device for zero-copy access.
    ///
    /// The device must outlive the pointer; the MMU hands out access, not
    /// ownership.
    pub fn pointer_to(&self, addr: u64) -> Result<*mut u8, MemoryError> {
        self.with_region(addr, Protection::READ, |region| {
            region.device.as_ptr(region.translate(addr))
        })
    }

    pub fn read8(&self, addr: u64) -> Result<u8, MemoryError> {
        let mut b = [0u8; 1];
        self.read_bytes(addr, &mut b)?;
        Ok(b[0])
    }

    // Multi-byte accessors assemble big-endian byte order explicitly, so a
    // misaligned access degrades to byte-wise assembly instead of faulting.
    // Alignment-sensitive ISA semantics live a layer up, in the CPU.

    pub fn read16(&self, addr: u64) -> Result<u16, MemoryError> {
        let mut b = [0u8; 2];
        self.read_bytes(addr, &mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    pub fn read32(&self, addr: u64) -> Result<u32, MemoryError> {
        let mut b = [0u8; 4];
        self.read_bytes(addr, &mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    pub fn read64(&self, addr: u64) -> Result<u64, MemoryError> {
        let mut b = [0u8; 8];
        self.read_bytes(addr, &mut b)?;
        Ok(u64::from_be_bytes(b))
    }

    pub fn write8(&self, addr: u64, value: u8) -> Result<(), MemoryError> {
        self.write_bytes(addr, &[value])
    }

    pub fn write16(&self, addr: u64, value: u16) -> Result<(), MemoryError> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    pub fn write32(&self, addr: u64, value: u32) -> Result<(), MemoryError> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    pub fn write64(&self, addr: u64, value: u64) -> Result<(), MemoryError> {
        self.write_bytes(addr, &value.to_be_bytes())
    }

    /// Instruction fetch: a 32-bit read that additionally requires the
    /// region to be executable.
    pub fn fetch32(&self, addr: u64) -> Result<u32, MemoryError> {
        self.with_region(addr, Protection::EXECUTE, |region| {
            let phys = Self::bounded(region, addr, 4)?;
            region.device.read32(phys)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::RamDevice;

    fn mapped_mmu() -> Mmu {
        let mmu = Mmu::new();
        let ram = Arc::new(RamDevice::new("RAM", 0x1_0000));
        mmu.map_memory(ram, 0x1000, 0x1_1000, 0, Protection::RWX);
        mmu
    }

    #[test]
    fn first_match_wins() {
        let mmu = Mmu::new();
        let a = Arc::new(RamDevice::new("A", 0x100));
        let b = Arc::new(RamDevice::new("B", 0x100));
        mmu.map_memory(a.clone(), 0x0, 0x100, 0, Protection::RW);
        mmu.map_memory(b, 0x0, 0x100, 0, Protection::RW);
        mmu.write8(0x10, 0x55).unwrap();
        // The second mapping is shadowed entirely.
        assert_eq!(a.read8(0x10).unwrap(), 0x55);
    }

    #[test]
    fn translation_applies_physical_offset() {
        let mmu = Mmu::new();
        let ram = Arc::new(RamDevice::new("RAM", 0x1000));
        mmu.map_memory(ram.clone(), 0x8000, 0x8100, 0x200, Protection::RW);
        mmu.write32(0x8004, 0xAABBCCDD).unwrap();
        assert_eq!(ram.read32(0x204).unwrap(), 0xAABBCCDD);
    }

    #[test]
    fn unmapped_and_violation_are_distinct() {
        let mmu = Mmu::new();
        let ram = Arc::new(RamDevice::new("RAM", 0x1000));
        mmu.map_memory(ram, 0x0, 0x1000, 0, Protection::READ);
        assert!(matches!(
            mmu.write8(0x10, 0),
            Err(MemoryError::AccessViolation { .. })
        ));
        assert!(matches!(
            mmu.read8(0x2000),
            Err(MemoryError::Unmapped { addr: 0x2000 })
        ));
    }

    #[test]
    fn write_only_region_rejects_reads() {
        let mmu = Mmu::new();
        let ram = Arc::new(RamDevice::new("RAM", 0x1000));
        mmu.map_memory(ram, 0x0, 0x1000, 0, Protection::WRITE);
        mmu.write32(0x10, 0xAABBCCDD).unwrap();
        assert!(matches!(
            mmu.read8(0x10),
            Err(MemoryError::AccessViolation { .. })
        ));
        assert!(matches!(
            mmu.read32(0x10),
            Err(MemoryError::AccessViolation { .. })
        ));
    }

    #[test]
    fn misaligned_word_access_is_bytewise() {
        let mmu = mapped_mmu();
        mmu.write32(0x1001, 0x01020304).unwrap();
        assert_eq!(mmu.read32(0x1001).unwrap(), 0x01020304);
        assert_eq!(mmu.read8(0x1001).unwrap(), 0x01);
    }

    #[test]
    fn fetch_requires_execute() {
        let mmu = Mmu::new();
        let ram = Arc::new(RamDevice::new("RAM", 0x1000));
        mmu.map_memory(ram, 0x0, 0x1000, 0, Protection::RW);
        assert!(matches!(
            mmu.fetch32(0x0),
            Err(MemoryError::AccessViolation { .. })
        ));
    }

    #[test]
    fn bulk_bounds_checked_against_region_end() {
        let mmu = mapped_mmu();
        let mut buf = vec![0u8; 8];
        assert!(mmu.read_bytes(0x1_0FFC, &mut buf).is_err());
        assert!(mmu.read_bytes(0x1_0FF8, &mut buf).is_ok());
    }
}
