//! Xenon PowerPC decode-execute engine
//!
//! A table-driven interpreter for the 32-bit big-endian PowerPC subset the
//! Xenon runs, including the VMX and extended VMX128 vector units. The CPU
//! core owns architectural state only; all memory traffic goes through the
//! [`xe_memory::Mmu`] it is constructed with.

pub mod decoder;
pub mod dispatch;
pub mod exceptions;
pub mod instructions;
pub mod interpreter;
pub mod manager;
pub mod state;
pub mod vmx;

pub use decoder::Decoder;
pub use dispatch::Outcome;
pub use exceptions::{Exception, Fault};
pub use interpreter::Cpu;
pub use manager::CpuManager;
pub use state::CpuState;
pub use vmx::VectorRegister;
