//! Exception model
//!
//! Exceptions are values, not control flow: handlers return a `Fault` and
//! the interpreter turns it into an architectural exception entry (SRR0,
//! SRR1, EE masked, PC at the vector).

use xe_core::error::MemoryError;

/// Architectural exception classes and their vector offsets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Exception {
    Reset,
    DataStorage,
    InstStorage,
    Alignment,
    Program,
    FpUnavailable,
    Decrementer,
    SystemCall,
}

impl Exception {
    /// Offset from the exception table base.
    pub fn vector(self) -> u32 {
        match self {
            Exception::Reset => 0x100,
            Exception::DataStorage => 0x300,
            Exception::InstStorage => 0x400,
            Exception::Alignment => 0x600,
            Exception::Program => 0x700,
            Exception::FpUnavailable => 0x800,
            Exception::Decrementer => 0x900,
            Exception::SystemCall => 0xC00,
        }
    }
}

/// Why a handler could not complete normally.
#[derive(Debug)]
pub enum Fault {
    /// Raise an architectural exception.
    Exception(Exception),
    /// A data access failed in the MMU; becomes a data storage exception.
    Memory(MemoryError),
}

impl From<Exception> for Fault {
    fn from(ex: Exception) -> Self {
        Fault::Exception(ex)
    }
}

impl From<MemoryError> for Fault {
    fn from(err: MemoryError) -> Self {
        Fault::Memory(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vectors_match_the_exception_table() {
        assert_eq!(Exception::Reset.vector(), 0x100);
        assert_eq!(Exception::DataStorage.vector(), 0x300);
        assert_eq!(Exception::Program.vector(), 0x700);
        assert_eq!(Exception::Decrementer.vector(), 0x900);
        assert_eq!(Exception::SystemCall.vector(), 0xC00);
    }
}
