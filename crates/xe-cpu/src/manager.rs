//! Multi-core scaffolding
//!
//! The Xenon has three dual-threaded cores; this emulator runs one. The
//! manager owns the per-core interpreters behind coarse locks over a
//! shared address space, but provides no cross-core cache coherency or
//! reservation snooping, and `step_all` interleaves cores on the calling
//! thread rather than running them concurrently.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::info;
use xe_core::error::CpuError;
use xe_memory::Mmu;

use crate::interpreter::Cpu;

pub struct CpuManager {
    cores: Vec<Arc<Mutex<Cpu>>>,
}

impl CpuManager {
    pub fn new(mmu: Arc<Mmu>, cores: usize, vector_base: u32) -> Self {
        info!(target: "cpu", "bringing up {} core(s)", cores);
        let cores = (0..cores)
            .map(|_| Arc::new(Mutex::new(Cpu::with_vector_base(mmu.clone(), vector_base))))
            .collect();
        Self { cores }
    }

    pub fn core_count(&self) -> usize {
        self.cores.len()
    }

    pub fn core(&self, index: usize) -> Arc<Mutex<Cpu>> {
        self.cores[index].clone()
    }

    /// One round-robin step across every running core.
    pub fn step_all(&self) -> Result<(), CpuError> {
        for core in &self.cores {
            core.lock().step()?;
        }
        Ok(())
    }

    pub fn any_running(&self) -> bool {
        self.cores.iter().any(|core| core.lock().state.running)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cores_share_the_address_space() {
        let mmu = Arc::new(Mmu::new());
        let manager = CpuManager::new(mmu.clone(), 3, 0);
        assert_eq!(manager.core_count(), 3);
        assert!(!manager.any_running());
        // Idle cores step without touching memory.
        manager.step_all().unwrap();
    }
}
