//! System instructions: sc/rfi, SPR and MSR traffic, CR moves, and the
//! storage-control forms that are ordering or cache hints here

use tracing::trace;

use crate::decoder::Decoder;
use crate::dispatch::Outcome;
use crate::exceptions::{Exception, Fault};
use crate::interpreter::Cpu;
use crate::state::{spr, XER_CA, XER_OV, XER_SO};

type Exec = Result<Outcome, Fault>;

const CACHE_LINE: u64 = 32;

/// User-accessible SPRs; everything else requires supervisor state.
fn user_spr(index: u32) -> bool {
    matches!(index, spr::XER | spr::LR | spr::CTR | spr::TBL_READ | spr::TBU_READ)
}

pub fn sc(_cpu: &mut Cpu, _instr: u32) -> Exec {
    // The interpreter runs the host hook and fixes SRR0 to point past sc.
    Err(Exception::SystemCall.into())
}

pub fn rfi(cpu: &mut Cpu, _instr: u32) -> Exec {
    if cpu.state.msr_pr() {
        return Err(Exception::Program.into());
    }
    cpu.state.msr = cpu.state.srr1;
    cpu.state.pc = cpu.state.srr0 & !3;
    trace!(target: "cpu", "rfi -> 0x{:08X} (MSR=0x{:08X})", cpu.state.pc, cpu.state.msr);
    Ok(Outcome::Branch)
}

pub fn isync(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn sync(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn eieio(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn tlbie(cpu: &mut Cpu, _instr: u32) -> Exec {
    if cpu.state.msr_pr() {
        return Err(Exception::Program.into());
    }
    Ok(Outcome::Next)
}

pub fn tlbsync(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

// Cache hints are no-ops except dcbz, which architecturally zeroes the
// line.

pub fn icbi(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn dcbf(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn dcbst(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn dcbt(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn dcbtst(_cpu: &mut Cpu, _instr: u32) -> Exec {
    Ok(Outcome::Next)
}

pub fn dcbz(cpu: &mut Cpu, instr: u32) -> Exec {
    let (_, ra, rb, _) = Decoder::x_form(instr);
    let ea = super::load_store::ea_x(cpu, ra, rb) as u64 & !(CACHE_LINE - 1);
    cpu.mmu().mem_set(ea, 0, CACHE_LINE)?;
    Ok(Outcome::Next)
}

// CR moves

pub fn mfcr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, _, _, _) = Decoder::x_form(instr);
    cpu.state.set_gpr(rd, cpu.state.cr);
    Ok(Outcome::Next)
}

pub fn mtcrf(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, _, _, _) = Decoder::x_form(instr);
    let crm = (instr >> 12) & 0xFF;
    let mut mask = 0u32;
    for field in 0..8 {
        // CRM bit 0 selects CR field 0, the most significant nibble.
        if crm & (0x80 >> field) != 0 {
            mask |= 0xF << ((7 - field) * 4);
        }
    }
    cpu.state.cr = (cpu.state.cr & !mask) | (cpu.state.gpr(rs) & mask);
    Ok(Outcome::Next)
}

pub fn mcrxr(cpu: &mut Cpu, instr: u32) -> Exec {
    let crfd = Decoder::crfd(instr);
    cpu.state.set_cr_field(crfd, cpu.state.xer >> 28);
    cpu.state.xer &= !(XER_SO | XER_OV | XER_CA | 0x1000_0000);
    Ok(Outcome::Next)
}

// MSR traffic; both directions are supervisor-only.

pub fn mfmsr(cpu: &mut Cpu, instr: u32) -> Exec {
    if cpu.state.msr_pr() {
        return Err(Exception::Program.into());
    }
    let (rd, _, _, _) = Decoder::x_form(instr);
    cpu.state.set_gpr(rd, cpu.state.msr);
    Ok(Outcome::Next)
}

pub fn mtmsr(cpu: &mut Cpu, instr: u32) -> Exec {
    if cpu.state.msr_pr() {
        return Err(Exception::Program.into());
    }
    let (rs, _, _, _) = Decoder::x_form(instr);
    cpu.state.msr = cpu.state.gpr(rs);
    Ok(Outcome::Next)
}

// SPR traffic. Named SPRs are kept in their dedicated fields and
// mirrored into the flat array so unknown readers still see them.

pub fn mfspr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, _, _, _) = Decoder::x_form(instr);
    let index = Decoder::spr_index(instr);
    if !user_spr(index) && cpu.state.msr_pr() {
        return Err(Exception::Program.into());
    }
    let value = match index {
        spr::XER => cpu.state.xer,
        spr::LR => cpu.state.lr,
        spr::CTR => cpu.state.ctr,
        spr::DEC => cpu.state.dec,
        spr::SRR0 => cpu.state.srr0,
        spr::SRR1 => cpu.state.srr1,
        spr::TBL_READ => cpu.state.tbl,
        spr::TBU_READ => cpu.state.tbu,
        spr::SPRG0 => cpu.state.sprg[0],
        spr::SPRG1 => cpu.state.sprg[1],
        spr::SPRG2 => cpu.state.sprg[2],
        spr::SPRG3 => cpu.state.sprg[3],
        spr::HID0 => cpu.state.hid0,
        spr::HID1 => cpu.state.hid1,
        spr::HID4 => cpu.state.hid4,
        spr::GQR0..=spr::GQR7 => cpu.state.gqr[(index - spr::GQR0) as usize],
        other => {
            trace!(target: "cpu", "mfspr from generic SPR {}", other);
            cpu.state.spr(other)
        }
    };
    cpu.state.set_gpr(rd, value);
    Ok(Outcome::Next)
}

pub fn mtspr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, _, _, _) = Decoder::x_form(instr);
    let index = Decoder::spr_index(instr);
    let privileged = !matches!(index, spr::XER | spr::LR | spr::CTR);
    if privileged && cpu.state.msr_pr() {
        return Err(Exception::Program.into());
    }
    let value = cpu.state.gpr(rs);
    match index {
        spr::XER => cpu.state.xer = value,
        spr::LR => cpu.state.lr = value,
        spr::CTR => cpu.state.ctr = value,
        spr::DEC => cpu.state.dec = value,
        spr::SRR0 => cpu.state.srr0 = value,
        spr::SRR1 => cpu.state.srr1 = value,
        spr::TBL_WRITE => cpu.state.tbl = value,
        spr::TBU_WRITE => cpu.state.tbu = value,
        spr::SPRG0 => cpu.state.sprg[0] = value,
        spr::SPRG1 => cpu.state.sprg[1] = value,
        spr::SPRG2 => cpu.state.sprg[2] = value,
        spr::SPRG3 => cpu.state.sprg[3] = value,
        // PVR is read-only; the write is dropped entirely.
        spr::PVR => return Ok(Outcome::Next),
        spr::HID0 => cpu.state.hid0 = value,
        spr::HID1 => cpu.state.hid1 = value,
        spr::HID4 => cpu.state.hid4 = value,
        spr::GQR0..=spr::GQR7 => cpu.state.gqr[(index - spr::GQR0) as usize] = value,
        other => trace!(target: "cpu", "mtspr to generic SPR {}", other),
    }
    cpu.state.set_spr(index, value);
    Ok(Outcome::Next)
}

pub fn mftb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, _, _, _) = Decoder::x_form(instr);
    let value = match Decoder::spr_index(instr) {
        spr::TBU_READ => cpu.state.tbu,
        _ => cpu.state.tbl,
    };
    cpu.state.set_gpr(rd, value);
    Ok(Outcome::Next)
}
