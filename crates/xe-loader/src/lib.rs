//! Guest image loading
//!
//! Two formats: raw binaries copied to a caller-chosen base, and
//! big-endian ELF32 executables whose PT_LOAD segments are placed at
//! their physical addresses. Either way the image lands in guest memory
//! through the MMU, so mapping and permissions apply.

use std::fs;
use std::path::Path;

use tracing::info;
use xe_core::error::LoaderError;
use xe_memory::Mmu;

const ELF_MAGIC: [u8; 4] = [0x7F, b'E', b'L', b'F'];
const ELFCLASS32: u8 = 1;
const ELFDATA2MSB: u8 = 2;
const EM_PPC: u16 = 20;
const PT_LOAD: u32 = 1;

fn read_u16(image: &[u8], offset: usize) -> Result<u16, LoaderError> {
    let bytes = image
        .get(offset..offset + 2)
        .ok_or(LoaderError::Unsupported("truncated header"))?;
    Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
}

fn read_u32(image: &[u8], offset: usize) -> Result<u32, LoaderError> {
    let bytes = image
        .get(offset..offset + 4)
        .ok_or(LoaderError::Unsupported("truncated header"))?;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

/// Copy a raw binary to `base`. Returns the entry point, which for a raw
/// image is the base itself.
pub fn load_raw(mmu: &Mmu, image: &[u8], base: u32) -> Result<u32, LoaderError> {
    mmu.write_bytes(base as u64, image)?;
    info!(
        target: "loader",
        "raw image: {} bytes at 0x{:08X}", image.len(), base
    );
    Ok(base)
}

/// Place the PT_LOAD segments of a big-endian ELF32 executable and
/// return its entry point.
pub fn load_elf(mmu: &Mmu, image: &[u8]) -> Result<u32, LoaderError> {
    if image.len() < 52 || image[0..4] != ELF_MAGIC {
        return Err(LoaderError::BadMagic);
    }
    if image[4] != ELFCLASS32 {
        return Err(LoaderError::Unsupported("not a 32-bit image"));
    }
    if image[5] != ELFDATA2MSB {
        return Err(LoaderError::Unsupported("not big-endian"));
    }
    if read_u16(image, 18)? != EM_PPC {
        return Err(LoaderError::Unsupported("not a PowerPC image"));
    }

    let entry = read_u32(image, 24)?;
    let phoff = read_u32(image, 28)? as usize;
    let phentsize = read_u16(image, 42)? as usize;
    let phnum = read_u16(image, 44)? as usize;

    let mut loaded = 0;
    for i in 0..phnum {
        let ph = phoff + i * phentsize;
        if read_u32(image, ph)? != PT_LOAD {
            continue;
        }
        let p_offset = read_u32(image, ph + 4)? as usize;
        let p_paddr = read_u32(image, ph + 12)?;
        let p_filesz = read_u32(image, ph + 16)? as usize;
        let p_memsz = read_u32(image, ph + 20)? as u64;
        let data = image
            .get(p_offset..p_offset + p_filesz)
            .ok_or(LoaderError::Unsupported("segment outside image"))?;
        mmu.write_bytes(p_paddr as u64, data)?;
        // BSS tail: memsz past filesz is zero-filled.
        if p_memsz > p_filesz as u64 {
            mmu.mem_set(p_paddr as u64 + p_filesz as u64, 0, p_memsz - p_filesz as u64)?;
        }
        info!(
            target: "loader",
            "PT_LOAD: {} file bytes ({} in memory) at 0x{:08X}", p_filesz, p_memsz, p_paddr
        );
        loaded += 1;
    }
    if loaded == 0 {
        return Err(LoaderError::Unsupported("no loadable segments"));
    }
    info!(target: "loader", "ELF entry point 0x{:08X}", entry);
    Ok(entry)
}

/// Load a file, auto-detecting ELF against raw. Raw images go to
/// `raw_base`.
pub fn load_file(mmu: &Mmu, path: &Path, raw_base: u32) -> Result<u32, LoaderError> {
    let image = fs::read(path)?;
    if image.len() >= 4 && image[0..4] == ELF_MAGIC {
        load_elf(mmu, &image)
    } else {
        load_raw(mmu, &image, raw_base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use xe_memory::{Protection, RamDevice};

    fn mapped_mmu() -> Mmu {
        let mmu = Mmu::new();
        let ram = Arc::new(RamDevice::new("RAM", 0x1_0000));
        mmu.map_memory(ram, 0, 0x1_0000, 0, Protection::RWX);
        mmu
    }

    /// Minimal big-endian ELF32: one PT_LOAD carrying 8 bytes of text
    /// plus a 4-byte BSS tail.
    fn tiny_elf(entry: u32, paddr: u32) -> Vec<u8> {
        let mut image = vec![0u8; 52 + 32];
        image[0..4].copy_from_slice(&ELF_MAGIC);
        image[4] = ELFCLASS32;
        image[5] = ELFDATA2MSB;
        image[18..20].copy_from_slice(&EM_PPC.to_be_bytes());
        image[24..28].copy_from_slice(&entry.to_be_bytes());
        image[28..32].copy_from_slice(&52u32.to_be_bytes()); // phoff
        image[42..44].copy_from_slice(&32u16.to_be_bytes()); // phentsize
        image[44..46].copy_from_slice(&1u16.to_be_bytes()); // phnum
        let ph = 52;
        image[ph..ph + 4].copy_from_slice(&PT_LOAD.to_be_bytes());
        image[ph + 4..ph + 8].copy_from_slice(&84u32.to_be_bytes()); // p_offset
        image[ph + 12..ph + 16].copy_from_slice(&paddr.to_be_bytes());
        image[ph + 16..ph + 20].copy_from_slice(&8u32.to_be_bytes()); // p_filesz
        image[ph + 20..ph + 24].copy_from_slice(&12u32.to_be_bytes()); // p_memsz
        image.extend_from_slice(&[0x38, 0x60, 0x00, 0x05, 0x60, 0x00, 0x00, 0x00]);
        image
    }

    #[test]
    fn raw_image_lands_at_base() {
        let mmu = mapped_mmu();
        let entry = load_raw(&mmu, &[1, 2, 3, 4], 0x800).unwrap();
        assert_eq!(entry, 0x800);
        assert_eq!(mmu.read32(0x800).unwrap(), 0x0102_0304);
    }

    #[test]
    fn elf_segments_and_bss() {
        let mmu = mapped_mmu();
        mmu.mem_set(0x2000, 0xFF, 16).unwrap();
        let entry = load_elf(&mmu, &tiny_elf(0x2000, 0x2000)).unwrap();
        assert_eq!(entry, 0x2000);
        assert_eq!(mmu.read32(0x2000).unwrap(), 0x3860_0005);
        assert_eq!(mmu.read32(0x2004).unwrap(), 0x6000_0000);
        // BSS tail is zeroed over the old contents.
        assert_eq!(mmu.read32(0x2008).unwrap(), 0);
    }

    #[test]
    fn wrong_endianness_is_rejected() {
        let mmu = mapped_mmu();
        let mut image = tiny_elf(0x2000, 0x2000);
        image[5] = 1; // little-endian
        assert!(matches!(
            load_elf(&mmu, &image),
            Err(LoaderError::Unsupported(_))
        ));
    }

    #[test]
    fn non_elf_is_bad_magic() {
        let mmu = mapped_mmu();
        assert!(matches!(
            load_elf(&mmu, &[0u8; 64]),
            Err(LoaderError::BadMagic)
        ));
    }
}
