//! Address space emulation for xenon-emu
//!
//! The guest sees a flat big-endian address space assembled out of
//! `MemoryRegion` windows, each backed by a `MemoryDevice`. The `Mmu`
//! resolves virtual addresses region-by-region in mapping order and
//! enforces per-region read/write/execute permissions.

pub mod constants;
pub mod device;
pub mod mmu;

pub use device::{FramebufferDevice, MemoryDevice, RamDevice};
pub use mmu::{MemoryRegion, Mmu, Protection};
