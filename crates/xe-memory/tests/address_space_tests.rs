//! Integration tests for the mapped address space

use std::sync::Arc;

use xe_core::error::MemoryError;
use xe_memory::{constants::*, FramebufferDevice, MemoryDevice, Mmu, Protection, RamDevice};

fn xenon_address_space() -> (Mmu, Arc<RamDevice>, Arc<FramebufferDevice>) {
    let mmu = Mmu::new();
    let ram = Arc::new(RamDevice::new("RAM", 0x10_0000));
    let fb = Arc::new(FramebufferDevice::new(
        "FB",
        FRAMEBUFFER_WIDTH,
        FRAMEBUFFER_HEIGHT,
    ));
    mmu.map_memory(ram.clone(), RAM_BASE, RAM_BASE + 0x10_0000, 0, Protection::RWX);
    mmu.map_memory(
        fb.clone(),
        FRAMEBUFFER_BASE,
        FRAMEBUFFER_BASE + (FRAMEBUFFER_WIDTH * FRAMEBUFFER_HEIGHT * FRAMEBUFFER_BPP) as u64,
        0,
        Protection::RW,
    );
    (mmu, ram, fb)
}

#[test]
fn word_round_trip_across_region() {
    let (mmu, _, _) = xenon_address_space();
    for &value in &[0u32, 1, 0x8000_0000, 0xFFFF_FFFF, 0x1234_5678] {
        mmu.write32(0x1000, value).unwrap();
        assert_eq!(mmu.read32(0x1000).unwrap(), value);
    }
}

#[test]
fn big_endian_byte_order_is_observable() {
    let (mmu, _, _) = xenon_address_space();
    mmu.write32(0x2000, 0x0102_0304).unwrap();
    assert_eq!(mmu.read8(0x2000).unwrap(), 0x01);
    assert_eq!(mmu.read8(0x2003).unwrap(), 0x04);
    assert_eq!(mmu.read16(0x2002).unwrap(), 0x0304);
    mmu.write64(0x3000, 0x0011_2233_4455_6677).unwrap();
    assert_eq!(mmu.read8(0x3000).unwrap(), 0x00);
    assert_eq!(mmu.read8(0x3007).unwrap(), 0x77);
}

#[test]
fn framebuffer_reachable_through_mmu() {
    let (mmu, _, fb) = xenon_address_space();
    mmu.write32(FRAMEBUFFER_BASE, 0x00FF_00FF).unwrap();
    assert_eq!(fb.pixel(0, 0), Some(0x00FF_00FF));
    // Row 1, column 3.
    let offset = ((FRAMEBUFFER_WIDTH + 3) * FRAMEBUFFER_BPP) as u64;
    mmu.write32(FRAMEBUFFER_BASE + offset, 0xDEAD_BEEF).unwrap();
    assert_eq!(fb.pixel(3, 1), Some(0xDEAD_BEEF));
}

#[test]
fn framebuffer_is_not_executable() {
    let (mmu, _, _) = xenon_address_space();
    assert!(matches!(
        mmu.fetch32(FRAMEBUFFER_BASE),
        Err(MemoryError::AccessViolation { .. })
    ));
}

#[test]
fn mem_set_fills_through_translation() {
    let (mmu, ram, _) = xenon_address_space();
    mmu.mem_set(0x4000, 0x7F, 16).unwrap();
    for i in 0..16 {
        assert_eq!(ram.read8(0x4000 + i).unwrap(), 0x7F);
    }
    assert_eq!(ram.read8(0x4010).unwrap(), 0);
}

#[test]
fn pointer_to_views_device_storage() {
    let (mmu, ram, _) = xenon_address_space();
    mmu.write8(0x5000, 0x42).unwrap();
    let p = mmu.pointer_to(0x5000).unwrap();
    assert_eq!(unsafe { *p }, 0x42);
    drop(ram);
}

#[test]
fn clear_mappings_unmaps_everything() {
    let (mmu, _, _) = xenon_address_space();
    assert_eq!(mmu.region_count(), 2);
    mmu.clear_mappings();
    assert_eq!(mmu.region_count(), 0);
    assert!(matches!(mmu.read8(0), Err(MemoryError::Unmapped { .. })));
}

#[test]
fn aliased_device_shares_storage() {
    let mmu = Mmu::new();
    let ram = Arc::new(RamDevice::new("RAM", 0x1000));
    mmu.map_memory(ram.clone(), 0x0, 0x1000, 0, Protection::RW);
    mmu.map_memory(ram, 0x9000_0000, 0x9000_1000, 0, Protection::RW);
    mmu.write32(0x100, 0x5555_AAAA).unwrap();
    assert_eq!(mmu.read32(0x9000_0100).unwrap(), 0x5555_AAAA);
}
