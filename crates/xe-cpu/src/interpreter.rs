//! The fetch-decode-dispatch-execute loop
//!
//! `Cpu` binds architectural state to an MMU and steps one instruction at
//! a time. All control transfer out of the normal path (exceptions, the
//! system call hook, fatal double faults) funnels through `step`.

use std::sync::Arc;

use tracing::{debug, error, warn};
use xe_core::error::CpuError;
use xe_memory::Mmu;

use crate::decoder::Decoder;
use crate::dispatch::{self, Outcome};
use crate::exceptions::{Exception, Fault};
use crate::state::{CpuState, MSR_EE};

/// Host callback invoked on `sc`, before the exception entry. It may
/// rewrite guest registers and memory to implement the call.
pub type SyscallHandler = Box<dyn FnMut(&mut CpuState, &Mmu) + Send>;

pub struct Cpu {
    pub state: CpuState,
    mmu: Arc<Mmu>,
    vector_base: u32,
    /// A decrementer interrupt is latched and waiting for EE.
    dec_pending: bool,
    /// Set between an exception entry and the first successful fetch of
    /// its handler; a fetch fault while set is a double fault.
    in_exception_entry: bool,
    syscall_handler: Option<SyscallHandler>,
}

impl Cpu {
    pub fn new(mmu: Arc<Mmu>) -> Self {
        Self::with_vector_base(mmu, 0)
    }

    /// Place the exception table at `vector_base` instead of address zero.
    pub fn with_vector_base(mmu: Arc<Mmu>, vector_base: u32) -> Self {
        Self {
            state: CpuState::new(),
            mmu,
            vector_base,
            dec_pending: false,
            in_exception_entry: false,
            syscall_handler: None,
        }
    }

    pub fn mmu(&self) -> &Mmu {
        &self.mmu
    }

    pub fn set_syscall_handler(
        &mut self,
        handler: impl FnMut(&mut CpuState, &Mmu) + Send + 'static,
    ) {
        self.syscall_handler = Some(Box::new(handler));
    }

    /// Cold start at `entry` with an initial GPR image.
    pub fn reset_to(&mut self, entry: u32, gpr: [u32; 32]) {
        self.state.reset_to(entry, gpr);
        self.dec_pending = false;
        self.in_exception_entry = false;
    }

    /// Warm reset; PC is preserved.
    pub fn reset(&mut self) {
        self.state.reset();
        self.dec_pending = false;
        self.in_exception_entry = false;
    }

    /// Architectural exception entry: save the interrupted context, mask
    /// external interrupts and redirect to the vector.
    pub fn trigger_exception(&mut self, ex: Exception) {
        self.state.srr0 = self.state.pc;
        self.state.srr1 = self.state.msr;
        self.state.msr &= !MSR_EE;
        self.state.pc = self.vector_base.wrapping_add(ex.vector());
        self.in_exception_entry = true;
        debug!(target: "cpu", "exception {:?} -> 0x{:08X} (SRR0=0x{:08X})", ex, self.state.pc, self.state.srr0);
    }

    /// Execute one instruction. Architectural exceptions are handled
    /// inside and return `Ok`; only unrecoverable conditions (a fetch
    /// fault during exception entry) surface as `Err` and halt the core.
    pub fn step(&mut self) -> Result<(), CpuError> {
        if !self.state.running {
            return Ok(());
        }

        // Time base ticks once per step.
        let (tbl, wrapped) = self.state.tbl.overflowing_add(1);
        self.state.tbl = tbl;
        if wrapped {
            self.state.tbu = self.state.tbu.wrapping_add(1);
        }

        // A latched decrementer interrupt consumes the step once external
        // interrupts are enabled.
        if self.dec_pending && self.state.msr_ee() {
            self.dec_pending = false;
            self.trigger_exception(Exception::Decrementer);
            return Ok(());
        }
        if self.state.dec > 0 {
            self.state.dec -= 1;
            if self.state.dec == 0 {
                self.dec_pending = true;
            }
        }

        let pc = self.state.pc;
        if pc & 3 != 0 {
            self.trigger_exception(Exception::Alignment);
            return Ok(());
        }

        let instr = match self.mmu.fetch32(pc as u64) {
            Ok(word) => word,
            Err(source) => {
                if self.in_exception_entry {
                    return Err(self.fatal_halt(pc, source));
                }
                debug!(target: "cpu", "fetch fault at 0x{:08X}: {}", pc, source);
                self.trigger_exception(Exception::InstStorage);
                return Ok(());
            }
        };
        self.in_exception_entry = false;

        let (primary, xo) = Decoder::opcode_key(instr);
        let result = match dispatch::lookup(primary, xo) {
            Some(handler) => handler(self, instr),
            None => {
                warn!(
                    target: "cpu",
                    "unimplemented opcode {}/{} (0x{:08X}) at 0x{:08X}",
                    primary, xo, instr, pc
                );
                Err(Fault::Exception(Exception::Program))
            }
        };

        match result {
            Ok(Outcome::Next) => self.state.pc = pc.wrapping_add(4),
            Ok(Outcome::Branch) => {}
            Err(Fault::Exception(Exception::SystemCall)) => {
                // SRR0 names the instruction after sc.
                self.state.pc = pc.wrapping_add(4);
                if let Some(mut handler) = self.syscall_handler.take() {
                    handler(&mut self.state, &self.mmu);
                    self.syscall_handler = Some(handler);
                }
                self.trigger_exception(Exception::SystemCall);
            }
            Err(Fault::Exception(ex)) => self.trigger_exception(ex),
            Err(Fault::Memory(source)) => {
                debug!(target: "cpu", "data fault at 0x{:08X}: {}", pc, source);
                self.trigger_exception(Exception::DataStorage);
            }
        }
        Ok(())
    }

    /// Run until the core halts or `max_steps` elapse. Returns the number
    /// of steps taken.
    pub fn run(&mut self, max_steps: u64) -> Result<u64, CpuError> {
        let mut steps = 0;
        while steps < max_steps && self.state.running {
            self.step()?;
            steps += 1;
        }
        Ok(steps)
    }

    fn fatal_halt(&mut self, vector: u32, source: xe_core::error::MemoryError) -> CpuError {
        error!(
            target: "cpu",
            "double fault: exception vector 0x{:08X} is not fetchable ({})", vector, source
        );
        self.state.dump();
        self.state.running = false;
        CpuError::NestedFault { vector, source }
    }
}
