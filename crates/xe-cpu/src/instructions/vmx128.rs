//! VMX128 extended vector forms (primaries 5 and 6)
//!
//! The 128-register extension reuses the VMX datapath; only the encoding
//! differs. This core keeps the architectural 32-register file, so the
//! extended register-number bits are ignored and the forms behave as
//! wider encodings of their VMX counterparts.

use crate::decoder::Decoder;
use crate::dispatch::Outcome;
use crate::exceptions::Fault;
use crate::interpreter::Cpu;

type Exec = Result<Outcome, Fault>;

fn regs(instr: u32) -> (usize, usize, usize) {
    let (vd, va, vb) = Decoder::vx_form(instr);
    (vd as usize, va as usize, vb as usize)
}

fn map_f32_128(cpu: &mut Cpu, instr: u32, f: impl Fn(f32, f32) -> f32) -> Exec {
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

fn logic_128(cpu: &mut Cpu, instr: u32, f: impl Fn(u128, u128) -> u128) -> Exec {
    let (vd, va, vb) = regs(instr);
    let value = f(cpu.state.vpr[va].as_u128(), cpu.state.vpr[vb].as_u128());
    cpu.state.vpr[vd].set_u128(value);
    Ok(Outcome::Next)
}

pub fn vaddfp128(cpu: &mut Cpu, instr: u32) -> Exec {
    map_f32_128(cpu, instr, |a, b| a + b)
}

pub fn vsubfp128(cpu: &mut Cpu, instr: u32) -> Exec {
    map_f32_128(cpu, instr, |a, b| a - b)
}

pub fn vmulfp128(cpu: &mut Cpu, instr: u32) -> Exec {
    map_f32_128(cpu, instr, |a, b| a * b)
}

/// Destructive multiply-add: vD = vA * vB + vD.
pub fn vmaddfp128(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, va, vb) = regs(instr);
    let a = cpu.state.vpr[va].as_f32x4();
    let b = cpu.state.vpr[vb].as_f32x4();
    let d = cpu.state.vpr[vd].as_f32x4();
    let mut out = [0f32; 4];
    for lane in 0..4 {
        out[lane] = a[lane].mul_add(b[lane], d[lane]);
    }
    cpu.state.vpr[vd].set_f32x4(out);
    Ok(Outcome::Next)
}

pub fn vand128(cpu: &mut Cpu, instr: u32) -> Exec {
    logic_128(cpu, instr, |a, b| a & b)
}

pub fn vor128(cpu: &mut Cpu, instr: u32) -> Exec {
    logic_128(cpu, instr, |a, b| a | b)
}

pub fn vxor128(cpu: &mut Cpu, instr: u32) -> Exec {
    logic_128(cpu, instr, |a, b| a ^ b)
}

pub fn vnor128(cpu: &mut Cpu, instr: u32) -> Exec {
    logic_128(cpu, instr, |a, b| !(a | b))
}

/// Splat word lane `uimm & 3` of vB across vD.
pub fn vspltw128(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, uimm, vb) = regs(instr);
    let value = cpu.state.vpr[vb].as_u32x4()[uimm & 3];
    cpu.state.vpr[vd].set_u32x4([value; 4]);
    Ok(Outcome::Next)
}

/// Splat a sign-extended 5-bit immediate into every word lane.
pub fn vspltisw128(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, simm, _) = regs(instr);
    let value = (((simm as i32) << 27) >> 27) as u32;
    cpu.state.vpr[vd].set_u32x4([value; 4]);
    Ok(Outcome::Next)
}

/// Word permute of vB by a packed 2-bit-per-lane selector immediate.
pub fn vpermwi128(cpu: &mut Cpu, instr: u32) -> Exec {
    let (vd, _, vb) = regs(instr);
    let selector = (((instr >> 16) & 0x1F) << 3) | (instr & 0x7);
    let b = cpu.state.vpr[vb].as_u32x4();
    let mut out = [0u32; 4];
    for lane in 0..4 {
        let pick = (selector >> ((3 - lane) * 2)) & 3;
        out[lane] = b[pick as usize];
    }
    cpu.state.vpr[vd].set_u32x4(out);
    Ok(Outcome::Next)
}
