//! Instruction semantics, grouped by unit

pub mod branch;
pub mod float;
pub mod integer;
pub mod load_store;
pub mod system;
pub mod vector;
pub mod vmx128;
