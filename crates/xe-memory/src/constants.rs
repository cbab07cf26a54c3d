//! Xenon memory map constants

/// Main RAM base address
pub const RAM_BASE: u64 = 0x0000_0000;
/// Main RAM size (512 MB)
pub const RAM_SIZE: u64 = 0x2000_0000;

/// Framebuffer base address
pub const FRAMEBUFFER_BASE: u64 = 0xC000_0000;
/// Framebuffer geometry (BGRA, 4 bytes per pixel)
pub const FRAMEBUFFER_WIDTH: u32 = 640;
pub const FRAMEBUFFER_HEIGHT: u32 = 480;
pub const FRAMEBUFFER_BPP: u32 = 4;

/// Reset vector offset from the exception table base
pub const RESET_VECTOR: u32 = 0x100;

/// Boot SROM window
pub const SROM_BASE: u64 = 0x0000_0000;
pub const SROM_SIZE: u64 = 0x8000;

/// Internal SRAM window
pub const SRAM_BASE: u64 = 0x0001_0000;
pub const SRAM_SIZE: u64 = 0x0001_0000;

/// Processor version reported through the PVR register
pub const PVR_XENON: u32 = 0x0071_0500;
