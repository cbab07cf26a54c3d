//! Load/store unit, including byte-reversed, multiple, string-free
//! subset, floating loads/stores, vector loads/stores and the
//! load-reserve/store-conditional pair

use crate::decoder::Decoder;
use crate::dispatch::Outcome;
use crate::exceptions::{Exception, Fault};
use crate::interpreter::Cpu;
use crate::state::{CR_EQ, CR_SO, XER_SO};
use crate::vmx::VectorRegister;

type Exec = Result<Outcome, Fault>;

/// D-form effective address: RA or literal zero, plus the displacement.
pub(crate) fn ea_d(cpu: &Cpu, ra: u32, d: i16) -> u32 {
    let base = if ra == 0 { 0 } else { cpu.state.gpr(ra) };
    base.wrapping_add(d as i32 as u32)
}

/// X-form effective address: RA or literal zero, plus RB.
pub(crate) fn ea_x(cpu: &Cpu, ra: u32, rb: u32) -> u32 {
    let base = if ra == 0 { 0 } else { cpu.state.gpr(ra) };
    base.wrapping_add(cpu.state.gpr(rb))
}

// D-form loads

pub fn lwz(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read32(ea as u64)?;
    cpu.state.set_gpr(rd, value);
    Ok(Outcome::Next)
}

pub fn lwzu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read32(ea as u64)?;
    cpu.state.set_gpr(rd, value);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn lbz(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read8(ea as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    Ok(Outcome::Next)
}

pub fn lbzu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read8(ea as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn lhz(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read16(ea as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    Ok(Outcome::Next)
}

pub fn lhzu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read16(ea as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn lha(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read16(ea as u64)? as i16 as i32 as u32;
    cpu.state.set_gpr(rd, value);
    Ok(Outcome::Next)
}

pub fn lhau(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let value = cpu.mmu().read16(ea as u64)? as i16 as i32 as u32;
    cpu.state.set_gpr(rd, value);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

// D-form stores

pub fn stw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    cpu.mmu().write32(ea as u64, cpu.state.gpr(rs))?;
    Ok(Outcome::Next)
}

pub fn stwu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    cpu.mmu().write32(ea as u64, cpu.state.gpr(rs))?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn stb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    cpu.mmu().write8(ea as u64, cpu.state.gpr(rs) as u8)?;
    Ok(Outcome::Next)
}

pub fn stbu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    cpu.mmu().write8(ea as u64, cpu.state.gpr(rs) as u8)?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn sth(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    cpu.mmu().write16(ea as u64, cpu.state.gpr(rs) as u16)?;
    Ok(Outcome::Next)
}

pub fn sthu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    cpu.mmu().write16(ea as u64, cpu.state.gpr(rs) as u16)?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

// Load/store multiple. lmw stages reads so a fault midway leaves the
// register file untouched.

pub fn lmw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, d) = Decoder::d_form(instr);
    let mut ea = ea_d(cpu, ra, d);
    if ea & 3 != 0 {
        return Err(Exception::Alignment.into());
    }
    let mut staged = Vec::with_capacity((32 - rd) as usize);
    for _ in rd..32 {
        staged.push(cpu.mmu().read32(ea as u64)?);
        ea = ea.wrapping_add(4);
    }
    for (i, value) in staged.into_iter().enumerate() {
        cpu.state.set_gpr(rd + i as u32, value);
    }
    Ok(Outcome::Next)
}

pub fn stmw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, d) = Decoder::d_form(instr);
    let mut ea = ea_d(cpu, ra, d);
    if ea & 3 != 0 {
        return Err(Exception::Alignment.into());
    }
    for reg in rs..32 {
        cpu.mmu().write32(ea as u64, cpu.state.gpr(reg))?;
        ea = ea.wrapping_add(4);
    }
    Ok(Outcome::Next)
}

// X-form indexed loads/stores

pub fn lwzx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let value = cpu.mmu().read32(ea_x(cpu, ra, rb) as u64)?;
    cpu.state.set_gpr(rd, value);
    Ok(Outcome::Next)
}

pub fn lwzux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    let value = cpu.mmu().read32(ea as u64)?;
    cpu.state.set_gpr(rd, value);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn lbzx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let value = cpu.mmu().read8(ea_x(cpu, ra, rb) as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    Ok(Outcome::Next)
}

pub fn lbzux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    let value = cpu.mmu().read8(ea as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn lhzx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let value = cpu.mmu().read16(ea_x(cpu, ra, rb) as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    Ok(Outcome::Next)
}

pub fn lhzux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    let value = cpu.mmu().read16(ea as u64)?;
    cpu.state.set_gpr(rd, value as u32);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn lhax(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let value = cpu.mmu().read16(ea_x(cpu, ra, rb) as u64)? as i16 as i32 as u32;
    cpu.state.set_gpr(rd, value);
    Ok(Outcome::Next)
}

pub fn lhaux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    let value = cpu.mmu().read16(ea as u64)? as i16 as i32 as u32;
    cpu.state.set_gpr(rd, value);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn stwx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    cpu.mmu().write32(ea_x(cpu, ra, rb) as u64, cpu.state.gpr(rs))?;
    Ok(Outcome::Next)
}

pub fn stwux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    cpu.mmu().write32(ea as u64, cpu.state.gpr(rs))?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn stbx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    cpu.mmu().write8(ea_x(cpu, ra, rb) as u64, cpu.state.gpr(rs) as u8)?;
    Ok(Outcome::Next)
}

pub fn stbux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    cpu.mmu().write8(ea as u64, cpu.state.gpr(rs) as u8)?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn sthx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    cpu.mmu().write16(ea_x(cpu, ra, rb) as u64, cpu.state.gpr(rs) as u16)?;
    Ok(Outcome::Next)
}

pub fn sthux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    cpu.mmu().write16(ea as u64, cpu.state.gpr(rs) as u16)?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

// Byte-reversed accesses

pub fn lwbrx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let value = cpu.mmu().read32(ea_x(cpu, ra, rb) as u64)?;
    cpu.state.set_gpr(rd, value.swap_bytes());
    Ok(Outcome::Next)
}

pub fn lhbrx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let value = cpu.mmu().read16(ea_x(cpu, ra, rb) as u64)?;
    cpu.state.set_gpr(rd, value.swap_bytes() as u32);
    Ok(Outcome::Next)
}

pub fn stwbrx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    cpu.mmu()
        .write32(ea_x(cpu, ra, rb) as u64, cpu.state.gpr(rs).swap_bytes())?;
    Ok(Outcome::Next)
}

pub fn sthbrx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    cpu.mmu()
        .write16(ea_x(cpu, ra, rb) as u64, (cpu.state.gpr(rs) as u16).swap_bytes())?;
    Ok(Outcome::Next)
}

// Load-reserve / store-conditional. A single reservation per core;
// lwarx always re-arms it and stwcx. always consumes it.

pub fn lwarx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    if ea & 3 != 0 {
        return Err(Exception::Alignment.into());
    }
    let value = cpu.mmu().read32(ea as u64)?;
    cpu.state.set_gpr(rd, value);
    cpu.state.reservation_addr = ea;
    cpu.state.reservation_valid = true;
    Ok(Outcome::Next)
}

pub fn stwcx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, _) = Decoder::x_form(instr);
    let ea = ea_x(cpu, ra, rb);
    if ea & 3 != 0 {
        return Err(Exception::Alignment.into());
    }
    let matched = cpu.state.reservation_valid && cpu.state.reservation_addr == ea;
    if matched {
        cpu.mmu().write32(ea as u64, cpu.state.gpr(rs))?;
    }
    let mut field = if matched { CR_EQ } else { 0 };
    if cpu.state.xer & XER_SO != 0 {
        field |= CR_SO;
    }
    cpu.state.set_cr_field(0, field);
    cpu.state.reservation_valid = false;
    Ok(Outcome::Next)
}

// Floating loads/stores. Singles convert through f32 on the way in and
// out; doubles move raw bits.

pub fn lfs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frd, ra, d) = Decoder::d_form(instr);
    let bits = cpu.mmu().read32(ea_d(cpu, ra, d) as u64)?;
    cpu.state.fpr[frd as usize] = f32::from_bits(bits) as f64;
    Ok(Outcome::Next)
}

pub fn lfsu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let bits = cpu.mmu().read32(ea as u64)?;
    cpu.state.fpr[frd as usize] = f32::from_bits(bits) as f64;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn lfd(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frd, ra, d) = Decoder::d_form(instr);
    let bits = cpu.mmu().read64(ea_d(cpu, ra, d) as u64)?;
    cpu.state.fpr[frd as usize] = f64::from_bits(bits);
    Ok(Outcome::Next)
}

pub fn lfdu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frd, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let bits = cpu.mmu().read64(ea as u64)?;
    cpu.state.fpr[frd as usize] = f64::from_bits(bits);
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn stfs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frs, ra, d) = Decoder::d_form(instr);
    let bits = (cpu.state.fpr[frs as usize] as f32).to_bits();
    cpu.mmu().write32(ea_d(cpu, ra, d) as u64, bits)?;
    Ok(Outcome::Next)
}

pub fn stfsu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    let bits = (cpu.state.fpr[frs as usize] as f32).to_bits();
    cpu.mmu().write32(ea as u64, bits)?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

pub fn stfd(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frs, ra, d) = Decoder::d_form(instr);
    cpu.mmu()
        .write64(ea_d(cpu, ra, d) as u64, cpu.state.fpr[frs as usize].to_bits())?;
    Ok(Outcome::Next)
}

pub fn stfdu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frs, ra, d) = Decoder::d_form(instr);
    let ea = ea_d(cpu, ra, d);
    cpu.mmu().write64(ea as u64, cpu.state.fpr[frs as usize].to_bits())?;
    cpu.state.set_gpr(ra, ea);
    Ok(Outcome::Next)
}

// Vector loads/stores. The effective address is forced to 16-byte
// alignment, as the ISA specifies.

pub fn lvx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, ra, rb, _) = Decoder::x_form(instr);
    let ea = (ea_x(cpu, ra, rb) & !15) as u64;
    let mut bytes = [0u8; 16];
    cpu.mmu().read_bytes(ea, &mut bytes)?;
    cpu.state.vpr[vd as usize] = VectorRegister::from_bytes(bytes);
    Ok(Outcome::Next)
}

pub fn stvx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vs, ra, rb, _) = Decoder::x_form(instr);
    let ea = (ea_x(cpu, ra, rb) & !15) as u64;
    cpu.mmu().write_bytes(ea, &cpu.state.vpr[vs as usize].bytes())?;
    Ok(Outcome::Next)
}
