//! Floating-point unit
//!
//! FPRs hold doubles; single-precision forms round the result through
//! f32. FPSCR tracking covers the result-class field (FPRF) and the
//! obvious sticky flags; full IEEE trap semantics are out of scope for
//! the interpreter.

use crate::decoder::Decoder;
use crate::dispatch::Outcome;
use crate::exceptions::Fault;
use crate::interpreter::Cpu;
use crate::state::CpuState;

type Exec = Result<Outcome, Fault>;

pub const FPSCR_FX: u32 = 0x8000_0000;
pub const FPSCR_VX: u32 = 0x2000_0000;
pub const FPSCR_OX: u32 = 0x1000_0000;
pub const FPSCR_ZX: u32 = 0x0400_0000;
pub const FPSCR_C: u32 = 0x0001_0000;
pub const FPSCR_FL: u32 = 0x0000_8000;
pub const FPSCR_FG: u32 = 0x0000_4000;
pub const FPSCR_FE: u32 = 0x0000_2000;
pub const FPSCR_FU: u32 = 0x0000_1000;

const FPSCR_FPRF: u32 = FPSCR_C | FPSCR_FL | FPSCR_FG | FPSCR_FE | FPSCR_FU;

/// Classify `value` into the FPRF field.
fn set_fprf(state: &mut CpuState, value: f64) {
    let class = if value.is_nan() {
        FPSCR_C | FPSCR_FU
    } else if value.is_infinite() {
        if value < 0.0 {
            FPSCR_FL | FPSCR_FU
        } else {
            FPSCR_FG | FPSCR_FU
        }
    } else if value == 0.0 {
        if value.is_sign_negative() {
            FPSCR_C | FPSCR_FE
        } else {
            FPSCR_FE
        }
    } else if value < 0.0 {
        FPSCR_FL
    } else {
        FPSCR_FG
    };
    state.fpscr = (state.fpscr & !FPSCR_FPRF) | class;
}

fn finish_fp(cpu: &mut Cpu, frt: u32, value: f64, record: bool) -> Exec {
    set_fprf(&mut cpu.state, value);
    if value.is_infinite() {
        cpu.state.fpscr |= FPSCR_OX | FPSCR_FX;
    }
    if value.is_nan() {
        cpu.state.fpscr |= FPSCR_VX | FPSCR_FX;
    }
    cpu.state.fpr[frt as usize] = value;
    if record {
        // CR1 mirrors the FPSCR exception summary nibble.
        let nibble = cpu.state.fpscr >> 28;
        cpu.state.set_cr_field(1, nibble);
    }
    Ok(Outcome::Next)
}

fn zero_divide(cpu: &mut Cpu, dividend: f64, divisor: f64) {
    if divisor == 0.0 && dividend != 0.0 && !dividend.is_nan() {
        cpu.state.fpscr |= FPSCR_ZX | FPSCR_FX;
    }
}

// Double-precision arithmetic (primary 63)

pub fn fadd(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, _, rc) = Decoder::a_form(instr);
    let value = cpu.state.fpr[fra as usize] + cpu.state.fpr[frb as usize];
    finish_fp(cpu, frt, value, rc)
}

pub fn fsub(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, _, rc) = Decoder::a_form(instr);
    let value = cpu.state.fpr[fra as usize] - cpu.state.fpr[frb as usize];
    finish_fp(cpu, frt, value, rc)
}

pub fn fmul(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, _, frc, rc) = Decoder::a_form(instr);
    let value = cpu.state.fpr[fra as usize] * cpu.state.fpr[frc as usize];
    finish_fp(cpu, frt, value, rc)
}

pub fn fdiv(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, _, rc) = Decoder::a_form(instr);
    let a = cpu.state.fpr[fra as usize];
    let b = cpu.state.fpr[frb as usize];
    zero_divide(cpu, a, b);
    finish_fp(cpu, frt, a / b, rc)
}

pub fn fsqrt(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, _, rc) = Decoder::a_form(instr);
    finish_fp(cpu, frt, cpu.state.fpr[frb as usize].sqrt(), rc)
}

pub fn fsel(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = if cpu.state.fpr[fra as usize] >= 0.0 {
        cpu.state.fpr[frc as usize]
    } else {
        cpu.state.fpr[frb as usize]
    };
    finish_fp(cpu, frt, value, rc)
}

pub fn frsqrte(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, _, rc) = Decoder::a_form(instr);
    finish_fp(cpu, frt, 1.0 / cpu.state.fpr[frb as usize].sqrt(), rc)
}

pub fn fmadd(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, value, rc)
}

pub fn fmsub(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], -cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, value, rc)
}

pub fn fnmadd(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = -cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, value, rc)
}

pub fn fnmsub(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = -cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], -cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, value, rc)
}

// Single-precision forms (primary 59) round through f32.

fn single(value: f64) -> f64 {
    value as f32 as f64
}

pub fn fadds(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, _, rc) = Decoder::a_form(instr);
    let value = single(cpu.state.fpr[fra as usize] + cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, value, rc)
}

pub fn fsubs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, _, rc) = Decoder::a_form(instr);
    let value = single(cpu.state.fpr[fra as usize] - cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, value, rc)
}

pub fn fmuls(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, _, frc, rc) = Decoder::a_form(instr);
    let value = single(cpu.state.fpr[fra as usize] * cpu.state.fpr[frc as usize]);
    finish_fp(cpu, frt, value, rc)
}

pub fn fdivs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, _, rc) = Decoder::a_form(instr);
    let a = cpu.state.fpr[fra as usize];
    let b = cpu.state.fpr[frb as usize];
    zero_divide(cpu, a, b);
    finish_fp(cpu, frt, single(a / b), rc)
}

pub fn fsqrts(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, _, rc) = Decoder::a_form(instr);
    finish_fp(cpu, frt, single(cpu.state.fpr[frb as usize].sqrt()), rc)
}

pub fn fres(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, _, rc) = Decoder::a_form(instr);
    let b = cpu.state.fpr[frb as usize];
    zero_divide(cpu, 1.0, b);
    finish_fp(cpu, frt, single(1.0 / b), rc)
}

pub fn fmadds(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, single(value), rc)
}

pub fn fmsubs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], -cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, single(value), rc)
}

pub fn fnmadds(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = -cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, single(value), rc)
}

pub fn fnmsubs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, fra, frb, frc, rc) = Decoder::a_form(instr);
    let value = -cpu.state.fpr[fra as usize]
        .mul_add(cpu.state.fpr[frc as usize], -cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, single(value), rc)
}

// Moves, conversions and FPSCR plumbing (X-forms under 63)

pub fn fmr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, rc) = Decoder::x_form(instr);
    let value = cpu.state.fpr[frb as usize];
    finish_fp(cpu, frt, value, rc)
}

pub fn fneg(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, rc) = Decoder::x_form(instr);
    let value = -cpu.state.fpr[frb as usize];
    finish_fp(cpu, frt, value, rc)
}

pub fn fabs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, rc) = Decoder::x_form(instr);
    let value = cpu.state.fpr[frb as usize].abs();
    finish_fp(cpu, frt, value, rc)
}

pub fn fnabs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, rc) = Decoder::x_form(instr);
    let value = -cpu.state.fpr[frb as usize].abs();
    finish_fp(cpu, frt, value, rc)
}

pub fn frsp(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, rc) = Decoder::x_form(instr);
    let value = single(cpu.state.fpr[frb as usize]);
    finish_fp(cpu, frt, value, rc)
}

fn to_int_word(value: f64, truncate: bool) -> u32 {
    if value.is_nan() {
        return 0x8000_0000;
    }
    let rounded = if truncate {
        value.trunc()
    } else {
        value.round_ties_even()
    };
    rounded.clamp(i32::MIN as f64, i32::MAX as f64) as i32 as u32
}

/// Converted integers live in the low word of the FPR, boxed in the
/// canonical NaN pattern the real hardware leaves in the high word.
fn store_int_word(cpu: &mut Cpu, frt: u32, word: u32, record: bool) -> Exec {
    cpu.state.fpr[frt as usize] = f64::from_bits(0xFFF8_0000_0000_0000 | word as u64);
    if record {
        let nibble = cpu.state.fpscr >> 28;
        cpu.state.set_cr_field(1, nibble);
    }
    Ok(Outcome::Next)
}

pub fn fctiw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, rc) = Decoder::x_form(instr);
    let word = to_int_word(cpu.state.fpr[frb as usize], false);
    store_int_word(cpu, frt, word, rc)
}

pub fn fctiwz(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, frb, rc) = Decoder::x_form(instr);
    let word = to_int_word(cpu.state.fpr[frb as usize], true);
    store_int_word(cpu, frt, word, rc)
}

pub fn fcmpu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (_, fra, frb, _) = Decoder::x_form(instr);
    let a = cpu.state.fpr[fra as usize];
    let b = cpu.state.fpr[frb as usize];
    let field = if a.is_nan() || b.is_nan() {
        0x1
    } else if a < b {
        0x8
    } else if a > b {
        0x4
    } else {
        0x2
    };
    cpu.state.set_cr_field(Decoder::crfd(instr), field);
    // FPCC mirrors the compare result.
    cpu.state.fpscr = (cpu.state.fpscr & !(FPSCR_FL | FPSCR_FG | FPSCR_FE | FPSCR_FU))
        | (field << 12);
    Ok(Outcome::Next)
}

pub fn mffs(cpu: &mut Cpu, instr: u32) -> Exec {
    let (frt, _, _, rc) = Decoder::x_form(instr);
    cpu.state.fpr[frt as usize] = f64::from_bits(cpu.state.fpscr as u64);
    if rc {
        let nibble = cpu.state.fpscr >> 28;
        cpu.state.set_cr_field(1, nibble);
    }
    Ok(Outcome::Next)
}

pub fn mtfsf(cpu: &mut Cpu, instr: u32) -> Exec {
    let fm = (instr >> 17) & 0xFF;
    let frb = (instr >> 11) & 0x1F;
    let source = cpu.state.fpr[frb as usize].to_bits() as u32;
    let mut fpscr = cpu.state.fpscr;
    for nibble in 0..8 {
        // FM bit 0 selects the most significant nibble.
        if fm & (0x80 >> nibble) != 0 {
            let shift = (7 - nibble) * 4;
            fpscr = (fpscr & !(0xF << shift)) | (source & (0xF << shift));
        }
    }
    cpu.state.fpscr = fpscr;
    Ok(Outcome::Next)
}

pub fn mtfsb0(cpu: &mut Cpu, instr: u32) -> Exec {
    let bt = (instr >> 21) & 0x1F;
    cpu.state.fpscr &= !(0x8000_0000 >> bt);
    Ok(Outcome::Next)
}

pub fn mtfsb1(cpu: &mut Cpu, instr: u32) -> Exec {
    let bt = (instr >> 21) & 0x1F;
    cpu.state.fpscr |= 0x8000_0000 >> bt;
    Ok(Outcome::Next)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fprf_classes() {
        let mut state = CpuState::new();
        set_fprf(&mut state, -1.0);
        assert_eq!(state.fpscr & FPSCR_FPRF, FPSCR_FL);
        set_fprf(&mut state, 0.0);
        assert_eq!(state.fpscr & FPSCR_FPRF, FPSCR_FE);
        set_fprf(&mut state, f64::NAN);
        assert_eq!(state.fpscr & FPSCR_FPRF, FPSCR_C | FPSCR_FU);
        set_fprf(&mut state, f64::INFINITY);
        assert_eq!(state.fpscr & FPSCR_FPRF, FPSCR_FG | FPSCR_FU);
    }

    #[test]
    fn int_conversion_clamps_and_boxes() {
        assert_eq!(to_int_word(1.7, true), 1);
        assert_eq!(to_int_word(1.5, false), 2);
        assert_eq!(to_int_word(2.5, false), 2);
        assert_eq!(to_int_word(1e12, true), i32::MAX as u32);
        assert_eq!(to_int_word(-1e12, true), i32::MIN as u32);
        assert_eq!(to_int_word(f64::NAN, true), 0x8000_0000);
    }
}
