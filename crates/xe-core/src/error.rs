//! Error types shared across the emulator crates
//!
//! Two layers are deliberately kept apart: `MemoryError` describes faults
//! the MMU reports to the CPU, which normally turn into guest exception
//! vectors; `CpuError` describes conditions the host cannot recover from
//! and that stop the step loop.

use thiserror::Error;

/// Address-space faults raised by the MMU or a memory device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum MemoryError {
    /// No mapped region contains the address.
    #[error("unmapped address 0x{addr:08X}")]
    Unmapped { addr: u64 },

    /// A region contains the address but lacks the requested capability.
    #[error("access violation at 0x{addr:08X} (wanted {wanted})")]
    AccessViolation { addr: u64, wanted: &'static str },

    /// An access runs past the end of the region or device.
    #[error("access of {len} bytes at 0x{addr:08X} out of bounds")]
    OutOfBounds { addr: u64, len: u64 },
}

/// Host-fatal CPU conditions. Guest-recoverable events (traps, unknown
/// opcodes, alignment) never surface here; they become exception vectors.
#[derive(Debug, Error)]
pub enum CpuError {
    /// A memory fault occurred while the core was already vectoring to an
    /// exception handler. Continuing would loop forever, so the step loop
    /// halts instead.
    #[error("nested fault while dispatching exception vector 0x{vector:03X}: {source}")]
    NestedFault {
        vector: u32,
        source: MemoryError,
    },

    /// Save-state buffer too short or of the wrong shape.
    #[error("invalid snapshot: expected {expected} bytes, got {got}")]
    InvalidSnapshot { expected: usize, got: usize },

    /// A fault that escaped guest-exception conversion.
    #[error(transparent)]
    Memory(#[from] MemoryError),
}

/// Guest image loading failures.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("i/o error reading image: {0}")]
    Io(#[from] std::io::Error),

    #[error("not an ELF image")]
    BadMagic,

    #[error("unsupported ELF layout: {0}")]
    Unsupported(&'static str),

    #[error("image does not fit in the mapped address space: {0}")]
    Memory(#[from] MemoryError),
}
