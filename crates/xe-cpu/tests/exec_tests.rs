//! End-to-end execution tests: assembled instruction words run through
//! the full fetch/decode/dispatch path against a mapped address space.

use std::sync::Arc;

use xe_core::error::CpuError;
use xe_cpu::state::{CR_EQ, CR_LT, CR_SO, MSR_EE, XER_OV, XER_SO};
use xe_cpu::{Cpu, Exception};
use xe_memory::{Mmu, Protection, RamDevice};

const BASE: u32 = 0x1000;

/// 64 KiB of RWX RAM at zero, program loaded at BASE.
fn boot(program: &[u32]) -> Cpu {
    let mmu = Arc::new(Mmu::new());
    let ram = Arc::new(RamDevice::new("RAM", 0x1_0000));
    mmu.map_memory(ram, 0, 0x1_0000, 0, Protection::RWX);
    for (i, &word) in program.iter().enumerate() {
        mmu.write32(BASE as u64 + i as u64 * 4, word).unwrap();
    }
    let mut cpu = Cpu::new(mmu);
    cpu.reset_to(BASE, [0; 32]);
    cpu
}

fn step_n(cpu: &mut Cpu, n: usize) {
    for _ in 0..n {
        cpu.step().unwrap();
    }
}

#[test]
fn addi_then_stw_reaches_memory() {
    // addi r3, r0, 5 ; stw r3, 0(r1)
    let mut cpu = boot(&[0x3860_0005, 0x9061_0000]);
    cpu.state.set_gpr(1, 0x2000);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.state.gpr(3), 5);
    assert_eq!(cpu.mmu().read32(0x2000).unwrap(), 5);
    assert_eq!(cpu.state.pc, BASE + 8);
}

#[test]
fn load_reads_back_big_endian() {
    // lwz r4, 0(r1)
    let mut cpu = boot(&[0x8081_0000]);
    cpu.state.set_gpr(1, 0x3000);
    cpu.mmu().write32(0x3000, 0xCAFE_F00D).unwrap();
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.gpr(4), 0xCAFE_F00D);
    assert_eq!(cpu.mmu().read8(0x3000).unwrap(), 0xCA);
}

#[test]
fn record_form_sets_cr0() {
    // addic. r3, r4, -1 with r4 = 0 leaves a negative result.
    let mut cpu = boot(&[0x3464_FFFF]);
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.gpr(3), 0xFFFF_FFFF);
    assert_eq!(cpu.state.cr_field(0), CR_LT);
}

#[test]
fn overflow_sets_ov_and_sticky_so() {
    // addo. r3, r4, r5 at the signed boundary
    let mut cpu = boot(&[0x7C64_2E15]);
    cpu.state.set_gpr(4, 0x7FFF_FFFF);
    cpu.state.set_gpr(5, 1);
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.gpr(3), 0x8000_0000);
    assert_eq!(cpu.state.xer & (XER_OV | XER_SO), XER_OV | XER_SO);
    // CR0 mirrors both the sign and the summary-overflow bit.
    assert_eq!(cpu.state.cr_field(0), CR_LT | CR_SO);
}

#[test]
fn rlwinm_full_mask_is_identity() {
    // rlwinm r4, r3, 0, 0, 31
    let mut cpu = boot(&[0x5464_003E]);
    cpu.state.set_gpr(3, 0xDEAD_BEEF);
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.gpr(4), 0xDEAD_BEEF);
}

#[test]
fn rlwinm_wrapped_mask_selects_both_ends() {
    // rlwinm r4, r3, 0, 28, 3
    let mut cpu = boot(&[0x5464_0706]);
    cpu.state.set_gpr(3, 0xFFFF_FFFF);
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.gpr(4), 0xF000_000F);
}

#[test]
fn byte_reversed_accesses_swap_endianness() {
    // lwbrx r3, 0, r1 ; lhbrx r4, 0, r2 ; stwbrx r5, 0, r6
    let mut cpu = boot(&[0x7C60_0C2C, 0x7C80_162C, 0x7CA0_352C]);
    cpu.state.set_gpr(1, 0x3000);
    cpu.state.set_gpr(2, 0x3004);
    cpu.state.set_gpr(6, 0x3008);
    cpu.state.set_gpr(5, 0x1234_5678);
    cpu.mmu().write32(0x3000, 0x1122_3344).unwrap();
    cpu.mmu().write16(0x3004, 0xAABB).unwrap();
    step_n(&mut cpu, 3);
    // Storage is big-endian; the loads assemble little-endian.
    assert_eq!(cpu.state.gpr(3), 0x4433_2211);
    assert_eq!(cpu.state.gpr(4), 0x0000_BBAA);
    assert_eq!(cpu.mmu().read32(0x3008).unwrap(), 0x7856_3412);
    assert_eq!(cpu.mmu().read8(0x3008).unwrap(), 0x78);
}

#[test]
fn signed_vector_adds_saturate_at_lane_bounds() {
    // vaddsbs v2, v0, v1 ; vaddshs v3, v0, v1 ; vaddsws v4, v0, v1
    let mut cpu = boot(&[0x1040_0B00, 0x1060_0B40, 0x1080_0B80]);
    cpu.state.vpr[0].set_u32x4([0x7F01_8000, 0x7FFF_8000, 0x7FFF_FFFF, 0x8000_0000]);
    cpu.state.vpr[1].set_u32x4([0x0101_FF00, 0x0001_FFFF, 0x0000_0005, 0xFFFF_FFFF]);
    step_n(&mut cpu, 3);
    assert_eq!(
        cpu.state.vpr[2].as_u32x4(),
        [0x7F02_8000, 0x7F00_80FF, 0x7FFF_FF04, 0x80FF_FFFF]
    );
    assert_eq!(
        cpu.state.vpr[3].as_u32x4(),
        [0x7FFF_8000, 0x7FFF_8000, 0x7FFF_0004, 0x8000_FFFF]
    );
    assert_eq!(
        cpu.state.vpr[4].as_u32x4(),
        [0x7FFF_FFFF, 0x7FFF_FFFF, 0x7FFF_FFFF, 0x8000_0000]
    );
}

#[test]
fn gqr_sprs_reach_the_dedicated_field() {
    // mtspr GQR3, r3 ; mfspr r4, GQR3
    let mut cpu = boot(&[0x7C73_E3A6, 0x7C93_E2A6]);
    cpu.state.set_gpr(3, 0xCAFE);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.state.gqr[3], 0xCAFE);
    assert_eq!(cpu.state.gpr(4), 0xCAFE);
    // The snapshot carries the field, not a stale mirror.
    let snapshot = cpu.state.serialize();
    let mut other = boot(&[0x6000_0000]);
    other.state.restore(&snapshot).unwrap();
    assert_eq!(other.state.gqr[3], 0xCAFE);
}

#[test]
fn store_conditional_succeeds_once() {
    // lwarx r3, 0, r1 ; stwcx. r3, 0, r1 ; stwcx. r3, 0, r1
    let mut cpu = boot(&[0x7C60_0828, 0x7C60_092D, 0x7C60_092D]);
    cpu.state.set_gpr(1, 0x4000);
    cpu.mmu().write32(0x4000, 77).unwrap();
    step_n(&mut cpu, 2);
    assert_eq!(cpu.state.gpr(3), 77);
    assert_eq!(cpu.state.cr_field(0), CR_EQ);
    assert!(!cpu.state.reservation_valid);
    // The reservation was consumed; the second attempt fails.
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.cr_field(0), 0);
}

#[test]
fn exception_entry_and_rfi_round_trip() {
    let mut cpu = boot(&[0x4C00_0064]); // rfi at BASE
    cpu.state.msr = MSR_EE;
    let pc_before = cpu.state.pc;
    let msr_before = cpu.state.msr;
    cpu.trigger_exception(Exception::Program);
    assert_eq!(cpu.state.pc, 0x700);
    assert_eq!(cpu.state.srr0, pc_before);
    assert_eq!(cpu.state.srr1, msr_before);
    assert_eq!(cpu.state.msr & MSR_EE, 0);
    // Return with SRR0/SRR1 untouched restores the interrupted context.
    cpu.state.pc = BASE;
    cpu.step().unwrap();
    assert_eq!(cpu.state.pc, pc_before);
    assert_eq!(cpu.state.msr, msr_before);
}

#[test]
fn syscall_vectors_with_return_address_past_sc() {
    let mut cpu = boot(&[0x4400_0002]); // sc
    cpu.set_syscall_handler(|state, _| state.set_gpr(3, 0x1234));
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.pc, 0xC00);
    assert_eq!(cpu.state.srr0, BASE + 4);
    assert_eq!(cpu.state.gpr(3), 0x1234);
}

#[test]
fn decrementer_fires_on_the_step_after_reaching_zero() {
    // Two nops; the decrementer interrupt consumes the second step.
    let mut cpu = boot(&[0x6000_0000, 0x6000_0000]);
    cpu.state.msr = MSR_EE;
    cpu.state.dec = 1;
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.dec, 0);
    assert_eq!(cpu.state.pc, BASE + 4);
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.pc, 0x900);
    assert_eq!(cpu.state.srr0, BASE + 4);
}

#[test]
fn decrementer_waits_for_interrupts_enabled() {
    let mut cpu = boot(&[0x6000_0000, 0x6000_0000, 0x6000_0000]);
    cpu.state.dec = 1;
    step_n(&mut cpu, 2);
    // EE is off; the latched interrupt waits.
    assert_eq!(cpu.state.pc, BASE + 8);
    cpu.state.msr = MSR_EE;
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.pc, 0x900);
}

#[test]
fn vector_splat_and_add() {
    // vspltisw v0, 3 ; vadduwm v1, v0, v0
    let mut cpu = boot(&[0x1003_038C, 0x1020_0080]);
    step_n(&mut cpu, 2);
    assert_eq!(cpu.state.vpr[0].as_u32x4(), [3; 4]);
    assert_eq!(cpu.state.vpr[1].as_u32x4(), [6; 4]);
}

#[test]
fn unknown_opcode_takes_the_program_vector() {
    let mut cpu = boot(&[0x0400_0000]); // reserved primary 1
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.pc, 0x700);
    assert_eq!(cpu.state.srr0, BASE);
}

#[test]
fn divide_by_zero_takes_the_program_vector() {
    // divw r3, r4, r5 with r5 = 0
    let mut cpu = boot(&[0x7C64_2BD6]);
    cpu.state.set_gpr(4, 100);
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.pc, 0x700);
    assert_eq!(cpu.state.srr0, BASE);
}

#[test]
fn misaligned_pc_takes_the_alignment_vector() {
    let mut cpu = boot(&[0x6000_0000]);
    cpu.state.pc = BASE + 2;
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.pc, 0x600);
    assert_eq!(cpu.state.srr0, BASE + 2);
}

#[test]
fn fetch_from_unmapped_takes_the_isi_vector() {
    let mut cpu = boot(&[0x6000_0000]);
    cpu.state.pc = 0x9000_0000;
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.pc, 0x400);
    assert_eq!(cpu.state.srr0, 0x9000_0000);
}

#[test]
fn unfetchable_vector_is_a_double_fault() {
    // RAM only above the exception table: the Program vector itself
    // cannot be fetched.
    let mmu = Arc::new(Mmu::new());
    let ram = Arc::new(RamDevice::new("RAM", 0x1000));
    mmu.map_memory(ram, 0x1000, 0x2000, 0, Protection::RWX);
    mmu.write32(BASE as u64, 0x0400_0000).unwrap();
    let mut cpu = Cpu::new(mmu);
    cpu.reset_to(BASE, [0; 32]);
    cpu.step().unwrap();
    assert_eq!(cpu.state.pc, 0x700);
    let err = cpu.step().unwrap_err();
    assert!(matches!(err, CpuError::NestedFault { vector: 0x700, .. }));
    assert!(!cpu.state.running);
}

#[test]
fn snapshot_restores_mid_program_state() {
    // addi r3, r0, 5 ; addi r4, r0, 7 ; add r5, r3, r4
    let program = [0x3860_0005, 0x3880_0007, 0x7CA3_2214];
    let mut cpu = boot(&program);
    step_n(&mut cpu, 1);
    let snapshot = cpu.state.serialize();
    step_n(&mut cpu, 2);
    assert_eq!(cpu.state.gpr(5), 12);

    let mut resumed = boot(&program);
    resumed.state.restore(&snapshot).unwrap();
    assert_eq!(resumed.state.pc, BASE + 4);
    assert_eq!(resumed.state.gpr(3), 5);
    step_n(&mut resumed, 2);
    assert_eq!(resumed.state.gpr(5), 12);
}

#[test]
fn branch_with_link_and_return() {
    // bl +8 ; nop ; blr target sets LR and blr comes back
    let mut cpu = boot(&[0x4800_0009, 0x6000_0000, 0x4E80_0020]);
    step_n(&mut cpu, 1); // bl to BASE + 8
    assert_eq!(cpu.state.pc, BASE + 8);
    assert_eq!(cpu.state.lr, BASE + 4);
    step_n(&mut cpu, 1); // blr
    assert_eq!(cpu.state.pc, BASE + 4);
}

#[test]
fn conditional_branch_decrements_ctr() {
    // bdnz -0 (spin) : bc 16, 0, .
    let mut cpu = boot(&[0x4200_0000]);
    cpu.state.ctr = 3;
    step_n(&mut cpu, 1);
    assert_eq!(cpu.state.ctr, 2);
    assert_eq!(cpu.state.pc, BASE);
    cpu.state.ctr = 1;
    step_n(&mut cpu, 1);
    // CTR hit zero: fall through.
    assert_eq!(cpu.state.ctr, 0);
    assert_eq!(cpu.state.pc, BASE + 4);
}
