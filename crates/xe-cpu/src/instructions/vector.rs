//! VMX vector unit
//!
//! Lane arithmetic goes through the explicit big-endian views on
//! `VectorRegister`, so lane 0 is the most significant element
//! everywhere. Compare forms produce all-ones/all-zeros lane masks and
//! optionally record an all-true/all-false summary in CR6.

use crate::decoder::Decoder;
use crate::dispatch::Outcome;
use crate::exceptions::Fault;
use crate::interpreter::Cpu;
use crate::vmx::VectorRegister;

type Exec = Result<Outcome, Fault>;

fn regs(instr: u32) -> (usize, usize, usize) {
    let (vd, va, vb) = Decoder::vx_form(instr);
    (vd as usize, va as usize, vb as usize)
}

fn map_u8(cpu: &mut Cpu, instr: u32, f: impl Fn(u8, u8) -> u8) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].bytes();
    let b = cpu.state.vpr[vb].bytes();
    let mut out = [0u8; 16];
    for lane in 0..16 {
        out[lane] = f(a[lane], b[lane]);
    }
    cpu.state.vpr[vd] = VectorRegister::from_bytes(out);
    Ok(Outcome::Next)
}

fn map_u16(cpu: &mut Cpu, instr: u32, f: impl Fn(u16, u16) -> u16) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u16x8();
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u16; 8];
    for lane in 0..8 {
        out[lane] = f(a[lane], b[lane]);
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

fn map_u32(cpu: &mut Cpu, instr: u32, f: impl Fn(u32, u32) -> u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u32x4();
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        out[lane] = f(a[lane], b[lane]);
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

fn map_f32(cpu: &mut Cpu, instr: u32, f: impl Fn(f32, f32) -> f32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_f32x4();
    let b = cpu.state.vpr[vb].as_f32x4();
    let mut out = [0f32; 4];
    for lane in 0..4 {
        out[lane] = f(a[lane], b[lane]);
    }
    cpu.state.vpr[vd].set_f32x4(out);
    Ok(Outcome::Next)
}

fn unary_f32(cpu: &mut Cpu, instr: u32, f: impl Fn(f32) -> f32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let b = cpu.state.vpr[vb].as_f32x4();
    let mut out = [0f32; 4];
    for lane in 0..4 {
        out[lane] = f(b[lane]);
    }
    cpu.state.vpr[vd].set_f32x4(out);
    Ok(Outcome::Next)
}

/// CR6 summary for the vcmp record forms: all-true sets bit 0 of the
/// field, all-false sets bit 2.
fn record_cr6(cpu: &mut Cpu, instr: u32, truths: u32, lanes: u32) {
    if instr & 0x400 != 0 {
        let mut field = 0;
        if truths == lanes {
            field |= 0x8;
        }
        if truths == 0 {
            field |= 0x2;
        }
        cpu.state.set_cr_field(6, field);
    }
}

fn cmp_u8(cpu: &mut Cpu, instr: u32, f: impl Fn(u8, u8) -> bool) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].bytes();
    let b = cpu.state.vpr[vb].bytes();
    let mut out = [0u8; 16];
    let mut truths = 0;
    for lane in 0..16 {
        if f(a[lane], b[lane]) {
            out[lane] = 0xFF;
            truths += 1;
        }
    }
    cpu.state.vpr[vd] = VectorRegister::from_bytes(out);
    record_cr6(cpu, instr, truths, 16);
    Ok(Outcome::Next)
}

fn cmp_u16(cpu: &mut Cpu, instr: u32, f: impl Fn(u16, u16) -> bool) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u16x8();
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u16; 8];
    let mut truths = 0;
    for lane in 0..8 {
        if f(a[lane], b[lane]) {
            out[lane] = 0xFFFF;
            truths += 1;
        }
    }
    cpu.state.vpr[vd].set_u16x8(out);
    record_cr6(cpu, instr, truths, 8);
    Ok(Outcome::Next)
}

fn cmp_u32(cpu: &mut Cpu, instr: u32, f: impl Fn(u32, u32) -> bool) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u32x4();
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0u32; 4];
    let mut truths = 0;
    for lane in 0..4 {
        if f(a[lane], b[lane]) {
            out[lane] = u32::MAX;
            truths += 1;
        }
    }
    cpu.state.vpr[vd].set_u32x4(out);
    record_cr6(cpu, instr, truths, 4);
    Ok(Outcome::Next)
}

fn cmp_f32(cpu: &mut Cpu, instr: u32, f: impl Fn(f32, f32) -> bool) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_f32x4();
    let b = cpu.state.vpr[vb].as_f32x4();
    let mut out = [0u32; 4];
    let mut truths = 0;
    for lane in 0..4 {
        if f(a[lane], b[lane]) {
            out[lane] = u32::MAX;
            truths += 1;
        }
    }
    cpu.state.vpr[vd].set_u32x4(out);
    record_cr6(cpu, instr, truths, 4);
    Ok(Outcome::Next)
}

// Modulo add/sub

pub fn vaddubm(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, u8::wrapping_add)
}

pub fn vadduhm(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, u16::wrapping_add)
}

pub fn vadduwm(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, u32::wrapping_add)
}

pub fn vsububm(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, u8::wrapping_sub)
}

pub fn vsubuhm(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, u16::wrapping_sub)
}

pub fn vsubuwm(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, u32::wrapping_sub)
}

// Saturating add/sub, unsigned then signed

pub fn vaddubs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, u8::saturating_add)
}

pub fn vadduhs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, u16::saturating_add)
}

pub fn vadduws(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, u32::saturating_add)
}

pub fn vaddsbs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| (a as i8).saturating_add(b as i8) as u8)
}

pub fn vaddshs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| (a as i16).saturating_add(b as i16) as u16)
}

pub fn vaddsws(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| (a as i32).saturating_add(b as i32) as u32)
}

pub fn vsububs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, u8::saturating_sub)
}

pub fn vsubuhs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, u16::saturating_sub)
}

pub fn vsubuws(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, u32::saturating_sub)
}

pub fn vsubsbs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| (a as i8).saturating_sub(b as i8) as u8)
}

pub fn vsubshs(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| (a as i16).saturating_sub(b as i16) as u16)
}

pub fn vsubsws(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| (a as i32).saturating_sub(b as i32) as u32)
}

// Min/max/average

pub fn vmaxub(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, u8::max)
}

pub fn vmaxuh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, u16::max)
}

pub fn vmaxuw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, u32::max)
}

pub fn vmaxsb(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| (a as i8).max(b as i8) as u8)
}

pub fn vmaxsh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| (a as i16).max(b as i16) as u16)
}

pub fn vmaxsw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| (a as i32).max(b as i32) as u32)
}

pub fn vminub(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, u8::min)
}

pub fn vminuh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, u16::min)
}

pub fn vminuw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, u32::min)
}

pub fn vminsb(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| (a as i8).min(b as i8) as u8)
}

pub fn vminsh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| (a as i16).min(b as i16) as u16)
}

pub fn vminsw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| (a as i32).min(b as i32) as u32)
}

pub fn vavgub(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| ((a as u16 + b as u16 + 1) >> 1) as u8)
}

pub fn vavguh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| ((a as u32 + b as u32 + 1) >> 1) as u16)
}

pub fn vavguw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| ((a as u64 + b as u64 + 1) >> 1) as u32)
}

pub fn vavgsb(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| {
        ((a as i8 as i16 + b as i8 as i16 + 1) >> 1) as u8
    })
}

pub fn vavgsh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| {
        ((a as i16 as i32 + b as i16 as i32 + 1) >> 1) as u16
    })
}

pub fn vavgsw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| {
        ((a as i32 as i64 + b as i32 as i64 + 1) >> 1) as u32
    })
}

// Whole-register logical

pub fn vand(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let value = cpu.state.vpr[va].as_u128() & cpu.state.vpr[vb].as_u128();
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

pub fn vandc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let value = cpu.state.vpr[va].as_u128() & !cpu.state.vpr[vb].as_u128();
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

pub fn vor(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let value = cpu.state.vpr[va].as_u128() | cpu.state.vpr[vb].as_u128();
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

pub fn vxor(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let value = cpu.state.vpr[va].as_u128() ^ cpu.state.vpr[vb].as_u128();
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

pub fn vnor(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let value = !(cpu.state.vpr[va].as_u128() | cpu.state.vpr[vb].as_u128());
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

// Per-element shifts and rotates; the amount comes from the low bits of
// the matching B lane.

pub fn vslb(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| a << (b & 7))
}

pub fn vslh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| a << (b & 15))
}

pub fn vslw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| a << (b & 31))
}

pub fn vsrb(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| a >> (b & 7))
}

pub fn vsrh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| a >> (b & 15))
}

pub fn vsrw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| a >> (b & 31))
}

pub fn vsrab(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| ((a as i8) >> (b & 7)) as u8)
}

pub fn vsrah(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| ((a as i16) >> (b & 15)) as u16)
}

pub fn vsraw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| ((a as i32) >> (b & 31)) as u32)
}

pub fn vrlb(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u8(cpu, instr, |a, b| a.rotate_left((b & 7) as u32))
}

pub fn vrlh(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u16(cpu, instr, |a, b| a.rotate_left((b & 15) as u32))
}

pub fn vrlw(cpu: &mut Cpu, instr: u32) -> Exec {
    map_u32(cpu, instr, |a, b| a.rotate_left(b & 31))
}

/// 128-bit shift amount: the low three bits of the last byte of vB.
fn shift_bits(b: &VectorRegister) -> u32 {
    (b.byte(15) & 7) as u32
}

pub fn vsl(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let sh = shift_bits(&cpu.state.vpr[vb]);
    let value = cpu.state.vpr[va].as_u128() << sh;
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

pub fn vsr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let sh = shift_bits(&cpu.state.vpr[vb]);
    let value = cpu.state.vpr[va].as_u128() >> sh;
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

// Even/odd multiplies widen each source lane pair into the next element
// size. Lane 0 is the most significant element, so "even" lanes are
// 0, 2, 4 and so on.

fn mul_bytes(cpu: &mut Cpu, instr: u32, offset: usize, f: impl Fn(u8, u8) -> u16) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].bytes();
    let b = cpu.state.vpr[vb].bytes();
    let mut out = [0u16; 8];
    for lane in 0..8 {
        out[lane] = f(a[2 * lane + offset], b[2 * lane + offset]);
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

fn mul_halves(cpu: &mut Cpu, instr: u32, offset: usize, f: impl Fn(u16, u16) -> u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u16x8();
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        out[lane] = f(a[2 * lane + offset], b[2 * lane + offset]);
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

pub fn vmuleub(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_bytes(cpu, instr, 0, |a, b| a as u16 * b as u16)
}

pub fn vmuloub(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_bytes(cpu, instr, 1, |a, b| a as u16 * b as u16)
}

pub fn vmulesb(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_bytes(cpu, instr, 0, |a, b| (a as i8 as i16 * b as i8 as i16) as u16)
}

pub fn vmulosb(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_bytes(cpu, instr, 1, |a, b| (a as i8 as i16 * b as i8 as i16) as u16)
}

pub fn vmuleuh(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_halves(cpu, instr, 0, |a, b| a as u32 * b as u32)
}

pub fn vmulouh(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_halves(cpu, instr, 1, |a, b| a as u32 * b as u32)
}

pub fn vmulesh(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_halves(cpu, instr, 0, |a, b| (a as i16 as i32 * b as i16 as i32) as u32)
}

pub fn vmulosh(cpu: &mut Cpu, instr: u32) -> Exec {
    mul_halves(cpu, instr, 1, |a, b| (a as i16 as i32 * b as i16 as i32) as u32)
}

// Compares

pub fn vcmpequb(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u8(cpu, instr, |a, b| a == b)
}

pub fn vcmpequh(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u16(cpu, instr, |a, b| a == b)
}

pub fn vcmpequw(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u32(cpu, instr, |a, b| a == b)
}

pub fn vcmpgtub(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u8(cpu, instr, |a, b| a > b)
}

pub fn vcmpgtuh(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u16(cpu, instr, |a, b| a > b)
}

pub fn vcmpgtuw(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u32(cpu, instr, |a, b| a > b)
}

pub fn vcmpgtsb(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u8(cpu, instr, |a, b| (a as i8) > (b as i8))
}

pub fn vcmpgtsh(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u16(cpu, instr, |a, b| (a as i16) > (b as i16))
}

pub fn vcmpgtsw(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_u32(cpu, instr, |a, b| (a as i32) > (b as i32))
}

pub fn vcmpeqfp(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_f32(cpu, instr, |a, b| a == b)
}

pub fn vcmpgtfp(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_f32(cpu, instr, |a, b| a > b)
}

pub fn vcmpgefp(cpu: &mut Cpu, instr: u32) -> Exec {
    cmp_f32(cpu, instr, |a, b| a >= b)
}

/// Bounds compare: bit 0 of each lane reports a > b, bit 1 reports
/// a < -b. The record form sets the all-within-bounds flag in CR6.
pub fn vcmpbfp(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_f32x4();
    let b = cpu.state.vpr[vb].as_f32x4();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        let le = a[lane] <= b[lane];
        let ge = a[lane] >= -b[lane];
        out[lane] = ((!le as u32) << 31) | ((!ge as u32) << 30);
    }
    cpu.state.vpr[vd].set_u32x4(out);
    if instr & 0x400 != 0 {
        let all_in = out.iter().all(|&lane| lane == 0);
        cpu.state.set_cr_field(6, if all_in { 0x2 } else { 0 });
    }
    Ok(Outcome::Next)
}

// Merge

pub fn vmrghb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].bytes();
    let b = cpu.state.vpr[vb].bytes();
    let mut out = [0u8; 16];
    for lane in 0..8 {
        out[2 * lane] = a[lane];
        out[2 * lane + 1] = b[lane];
    }
    cpu.state.vpr[vd] = VectorRegister::from_bytes(out);
    Ok(Outcome::Next)
}

pub fn vmrglb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].bytes();
    let b = cpu.state.vpr[vb].bytes();
    let mut out = [0u8; 16];
    for lane in 0..8 {
        out[2 * lane] = a[8 + lane];
        out[2 * lane + 1] = b[8 + lane];
    }
    cpu.state.vpr[vd] = VectorRegister::from_bytes(out);
    Ok(Outcome::Next)
}

pub fn vmrghh(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u16x8();
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u16; 8];
    for lane in 0..4 {
        out[2 * lane] = a[lane];
        out[2 * lane + 1] = b[lane];
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

pub fn vmrglh(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u16x8();
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u16; 8];
    for lane in 0..4 {
        out[2 * lane] = a[4 + lane];
        out[2 * lane + 1] = b[4 + lane];
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

pub fn vmrghw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u32x4();
    let b = cpu.state.vpr[vb].as_u32x4();
    cpu.state.vpr[vd].set_u32x4([a[0], b[0], a[1], b[1]]);
    Ok(Outcome::Next)
}

pub fn vmrglw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u32x4();
    let b = cpu.state.vpr[vb].as_u32x4();
    cpu.state.vpr[vd].set_u32x4([a[2], b[2], a[3], b[3]]);
    Ok(Outcome::Next)
}

// Splats. The A field carries the element index or a 5-bit immediate.

pub fn vspltb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let value = cpu.state.vpr[vb].byte(uimm & 15);
    cpu.state.vpr[vd] = VectorRegister::from_bytes([value; 16]);
    Ok(Outcome::Next)
}

pub fn vsplth(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let value = cpu.state.vpr[vb].as_u16x8()[uimm & 7];
    cpu.state.vpr[vd].set_u16x8([value; 8]);
    Ok(Outcome::Next)
}

pub fn vspltw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let value = cpu.state.vpr[vb].as_u32x4()[uimm & 3];
    cpu.state.vpr[vd].set_u32x4([value; 4]);
    Ok(Outcome::Next)
}

fn simm5(field: usize) -> i32 {
    ((field as i32) << 27) >> 27
}

pub fn vspltisb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, simm, _) = regs(instr);
    cpu.state.vpr[vd] = VectorRegister::from_bytes([simm5(simm) as u8; 16]);
    Ok(Outcome::Next)
}

pub fn vspltish(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, simm, _) = regs(instr);
    cpu.state.vpr[vd].set_u16x8([simm5(simm) as u16; 8]);
    Ok(Outcome::Next)
}

pub fn vspltisw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, simm, _) = regs(instr);
    cpu.state.vpr[vd].set_u32x4([simm5(simm) as u32; 4]);
    Ok(Outcome::Next)
}

// Pack/unpack

pub fn vpkuhum(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u16x8();
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u8; 16];
    for lane in 0..8 {
        out[lane] = a[lane] as u8;
        out[8 + lane] = b[lane] as u8;
    }
    cpu.state.vpr[vd] = VectorRegister::from_bytes(out);
    Ok(Outcome::Next)
}

pub fn vpkuwum(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u32x4();
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0u16; 8];
    for lane in 0..4 {
        out[lane] = a[lane] as u16;
        out[4 + lane] = b[lane] as u16;
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

// Saturating packs clamp each wide lane into the narrow range.

fn pack_halves(cpu: &mut Cpu, instr: u32, f: impl Fn(u16) -> u8) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u16x8();
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u8; 16];
    for lane in 0..8 {
        out[lane] = f(a[lane]);
        out[8 + lane] = f(b[lane]);
    }
    cpu.state.vpr[vd] = VectorRegister::from_bytes(out);
    Ok(Outcome::Next)
}

fn pack_words(cpu: &mut Cpu, instr: u32, f: impl Fn(u32) -> u16) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u32x4();
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0u16; 8];
    for lane in 0..4 {
        out[lane] = f(a[lane]);
        out[4 + lane] = f(b[lane]);
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

pub fn vpkuhus(cpu: &mut Cpu, instr: u32) -> Exec {
    pack_halves(cpu, instr, |v| v.min(u8::MAX as u16) as u8)
}

pub fn vpkuwus(cpu: &mut Cpu, instr: u32) -> Exec {
    pack_words(cpu, instr, |v| v.min(u16::MAX as u32) as u16)
}

pub fn vpkshus(cpu: &mut Cpu, instr: u32) -> Exec {
    pack_halves(cpu, instr, |v| (v as i16).clamp(0, u8::MAX as i16) as u8)
}

pub fn vpkswus(cpu: &mut Cpu, instr: u32) -> Exec {
    pack_words(cpu, instr, |v| (v as i32).clamp(0, u16::MAX as i32) as u16)
}

pub fn vpkshss(cpu: &mut Cpu, instr: u32) -> Exec {
    pack_halves(cpu, instr, |v| {
        (v as i16).clamp(i8::MIN as i16, i8::MAX as i16) as u8
    })
}

pub fn vpkswss(cpu: &mut Cpu, instr: u32) -> Exec {
    pack_words(cpu, instr, |v| {
        (v as i32).clamp(i16::MIN as i32, i16::MAX as i32) as u16
    })
}

/// 32-bit 8:8:8:8 pixels packed down to 1:5:5:5.
fn pack_pixel(word: u32) -> u16 {
    (((word >> 24) & 1) << 15
        | ((word >> 19) & 0x1F) << 10
        | ((word >> 11) & 0x1F) << 5
        | ((word >> 3) & 0x1F)) as u16
}

/// 1:5:5:5 back to 32 bits; the flag bit sign-extends across the top
/// byte.
fn unpack_pixel(pixel: u16) -> u32 {
    let flag = if pixel & 0x8000 != 0 { 0xFF00_0000 } else { 0 };
    flag
        | ((pixel as u32 >> 10) & 0x1F) << 16
        | ((pixel as u32 >> 5) & 0x1F) << 8
        | (pixel as u32 & 0x1F)
}

pub fn vpkpx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_u32x4();
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0u16; 8];
    for lane in 0..4 {
        out[lane] = pack_pixel(a[lane]);
        out[4 + lane] = pack_pixel(b[lane]);
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

pub fn vupkhpx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        out[lane] = unpack_pixel(b[lane]);
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

pub fn vupklpx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        out[lane] = unpack_pixel(b[4 + lane]);
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

pub fn vupkhsb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let b = cpu.state.vpr[vb].bytes();
    let mut out = [0u16; 8];
    for lane in 0..8 {
        out[lane] = b[lane] as i8 as i16 as u16;
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

pub fn vupklsb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let b = cpu.state.vpr[vb].bytes();
    let mut out = [0u16; 8];
    for lane in 0..8 {
        out[lane] = b[8 + lane] as i8 as i16 as u16;
    }
    cpu.state.vpr[vd].set_u16x8(out);
    Ok(Outcome::Next)
}

pub fn vupkhsh(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        out[lane] = b[lane] as i16 as i32 as u32;
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

pub fn vupklsh(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let b = cpu.state.vpr[vb].as_u16x8();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        out[lane] = b[4 + lane] as i16 as i32 as u32;
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

// VA-form: permute, select, shift-double, multiply-add

pub fn vperm(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb, vc) = Decoder::va_form(instr);
    let a = cpu.state.vpr[va as usize].bytes();
    let b = cpu.state.vpr[vb as usize].bytes();
    let c = cpu.state.vpr[vc as usize].bytes();
    let mut out = [0u8; 16];
    for lane in 0..16 {
        let index = (c[lane] & 0x1F) as usize;
        out[lane] = if index < 16 { a[index] } else { b[index - 16] };
    }
    cpu.state.vpr[vd as usize] = VectorRegister::from_bytes(out);
    Ok(Outcome::Next)
}

pub fn vsel(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb, vc) = Decoder::va_form(instr);
    let a = cpu.state.vpr[va as usize].as_u128();
    let b = cpu.state.vpr[vb as usize].as_u128();
    let c = cpu.state.vpr[vc as usize].as_u128();
    cpu.state.vpr[vd as usize].set_u128((a & !c) | (b & c));
    Ok(Outcome::Next)
}

pub fn vsldoi(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb, shb) = Decoder::va_form(instr);
    let a = cpu.state.vpr[va as usize].bytes();
    let b = cpu.state.vpr[vb as usize].bytes();
    let shift = (shb & 0xF) as usize;
    let mut out = [0u8; 16];
    for lane in 0..16 {
        let index = lane + shift;
        out[lane] = if index < 16 { a[index] } else { b[index - 16] };
    }
    cpu.state.vpr[vd as usize] = VectorRegister::from_bytes(out);
    Ok(Outcome::Next)
}

pub fn vmladduhm(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb, vc) = Decoder::va_form(instr);
    let a = cpu.state.vpr[va as usize].as_u16x8();
    let b = cpu.state.vpr[vb as usize].as_u16x8();
    let c = cpu.state.vpr[vc as usize].as_u16x8();
    let mut out = [0u16; 8];
    for lane in 0..8 {
        out[lane] = (a[lane] as u32 * b[lane] as u32 + c[lane] as u32) as u16;
    }
    cpu.state.vpr[vd as usize].set_u16x8(out);
    Ok(Outcome::Next)
}

pub fn vmaddfp(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb, vc) = Decoder::va_form(instr);
    let a = cpu.state.vpr[va as usize].as_f32x4();
    let b = cpu.state.vpr[vb as usize].as_f32x4();
    let c = cpu.state.vpr[vc as usize].as_f32x4();
    let mut out = [0f32; 4];
    for lane in 0..4 {
        out[lane] = a[lane].mul_add(c[lane], b[lane]);
    }
    cpu.state.vpr[vd as usize].set_f32x4(out);
    Ok(Outcome::Next)
}

pub fn vnmsubfp(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb, vc) = Decoder::va_form(instr);
    let a = cpu.state.vpr[va as usize].as_f32x4();
    let b = cpu.state.vpr[vb as usize].as_f32x4();
    let c = cpu.state.vpr[vc as usize].as_f32x4();
    let mut out = [0f32; 4];
    for lane in 0..4 {
        out[lane] = -a[lane].mul_add(c[lane], -b[lane]);
    }
    cpu.state.vpr[vd as usize].set_f32x4(out);
    Ok(Outcome::Next)
}

// Vector float arithmetic and rounding

pub fn vaddfp(cpu: &mut Cpu, instr: u32) -> Exec {
    map_f32(cpu, instr, |a, b| a + b)
}

pub fn vsubfp(cpu: &mut Cpu, instr: u32) -> Exec {
    map_f32(cpu, instr, |a, b| a - b)
}

pub fn vmaxfp(cpu: &mut Cpu, instr: u32) -> Exec {
    map_f32(cpu, instr, f32::max)
}

pub fn vminfp(cpu: &mut Cpu, instr: u32) -> Exec {
    map_f32(cpu, instr, f32::min)
}

pub fn vrefp(cpu: &mut Cpu, instr: u32) -> Exec {
    unary_f32(cpu, instr, |b| 1.0 / b)
}

pub fn vrsqrtefp(cpu: &mut Cpu, instr: u32) -> Exec {
    unary_f32(cpu, instr, |b| 1.0 / b.sqrt())
}

pub fn vrfin(cpu: &mut Cpu, instr: u32) -> Exec {
    unary_f32(cpu, instr, f32::round_ties_even)
}

pub fn vrfiz(cpu: &mut Cpu, instr: u32) -> Exec {
    unary_f32(cpu, instr, f32::trunc)
}

pub fn vrfip(cpu: &mut Cpu, instr: u32) -> Exec {
    unary_f32(cpu, instr, f32::ceil)
}

pub fn vrfim(cpu: &mut Cpu, instr: u32) -> Exec {
    unary_f32(cpu, instr, f32::floor)
}

// Fixed-point/float conversions. The A field is a scale exponent.

pub fn vcfux(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let scale = (uimm as i32 as f32).exp2();
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0f32; 4];
    for lane in 0..4 {
        out[lane] = b[lane] as f32 / scale;
    }
    cpu.state.vpr[vd].set_f32x4(out);
    Ok(Outcome::Next)
}

pub fn vcfsx(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let scale = (uimm as i32 as f32).exp2();
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0f32; 4];
    for lane in 0..4 {
        out[lane] = b[lane] as i32 as f32 / scale;
    }
    cpu.state.vpr[vd].set_f32x4(out);
    Ok(Outcome::Next)
}

pub fn vctuxs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let scale = (uimm as i32 as f32).exp2();
    let b = cpu.state.vpr[vb].as_f32x4();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        let scaled = b[lane] * scale;
        out[lane] = if scaled.is_nan() {
            0
        } else {
            scaled.clamp(0.0, u32::MAX as f32) as u32
        };
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

pub fn vctsxs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let scale = (uimm as i32 as f32).exp2();
    let b = cpu.state.vpr[vb].as_f32x4();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        let scaled = b[lane] * scale;
        out[lane] = if scaled.is_nan() {
            0
        } else {
            scaled.clamp(i32::MIN as f32, i32::MAX as f32) as i32 as u32
        };
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pixel_pack_and_unpack() {
        // Alpha bit plus full-intensity red.
        let word = 0x01F8_0000;
        let pixel = pack_pixel(word);
        assert_eq!(pixel, 0xFC00);
        assert_eq!(unpack_pixel(pixel), 0xFF1F_0000);
    }

    #[test]
    fn simm5_sign_extends() {
        assert_eq!(simm5(3), 3);
        assert_eq!(simm5(0x1F), -1);
        assert_eq!(simm5(0x10), -16);
    }

    #[test]
    fn saturating_pack_clamps_both_ways() {
        // vpkshss lane math on representative values.
        let clamp = |v: u16| (v as i16).clamp(i8::MIN as i16, i8::MAX as i16) as u8;
        assert_eq!(clamp(0x0040), 0x40);
        assert_eq!(clamp(0x0200), 0x7F);
        assert_eq!(clamp(0xFE00u16), 0x80);
        let unsigned = |v: u16| (v as i16).clamp(0, u8::MAX as i16) as u8;
        assert_eq!(unsigned(0xFFFFu16), 0);
        assert_eq!(unsigned(0x0123), 0xFF);
    }
}
