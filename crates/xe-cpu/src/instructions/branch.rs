//! Branch unit and condition register logic

use crate::decoder::Decoder;
use crate::dispatch::Outcome;
use crate::exceptions::Fault;
use crate::interpreter::Cpu;

type Exec = Result<Outcome, Fault>;

/// BO/BI tests shared by bc/bclr/bcctr. `decrement` is false for bcctr,
/// which never touches CTR.
fn branch_taken(cpu: &mut Cpu, bo: u32, bi: u32, decrement: bool) -> bool {
    let ctr_ok = if !decrement || bo & 0x04 != 0 {
        true
    } else {
        cpu.state.ctr = cpu.state.ctr.wrapping_sub(1);
        (cpu.state.ctr != 0) != (bo & 0x02 != 0)
    };
    let cond_ok = bo & 0x10 != 0 || cpu.state.cr_bit(bi) == (bo >> 3) & 1;
    ctr_ok && cond_ok
}

pub fn b(cpu: &mut Cpu, instr: u32) -> Exec {
    let (li, absolute, link) = Decoder::i_form(instr);
    let pc = cpu.state.pc;
    if link {
        cpu.state.lr = pc.wrapping_add(4);
    }
    cpu.state.pc = if absolute {
        li as u32
    } else {
        pc.wrapping_add(li as u32)
    };
    Ok(Outcome::Branch)
}

pub fn bc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (bo, bi, bd, absolute, link) = Decoder::b_form(instr);
    let pc = cpu.state.pc;
    if link {
        cpu.state.lr = pc.wrapping_add(4);
    }
    if branch_taken(cpu, bo, bi, true) {
        cpu.state.pc = if absolute {
            bd as u32
        } else {
            pc.wrapping_add(bd as u32)
        };
        Ok(Outcome::Branch)
    } else {
        Ok(Outcome::Next)
    }
}

pub fn bclr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (bo, bi, _) = Decoder::xl_form(instr);
    let link = instr & 1 != 0;
    let pc = cpu.state.pc;
    let target = cpu.state.lr & !3;
    if link {
        cpu.state.lr = pc.wrapping_add(4);
    }
    if branch_taken(cpu, bo, bi, true) {
        cpu.state.pc = target;
        Ok(Outcome::Branch)
    } else {
        Ok(Outcome::Next)
    }
}

pub fn bcctr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (bo, bi, _) = Decoder::xl_form(instr);
    let link = instr & 1 != 0;
    let pc = cpu.state.pc;
    if link {
        cpu.state.lr = pc.wrapping_add(4);
    }
    if branch_taken(cpu, bo, bi, false) {
        cpu.state.pc = cpu.state.ctr & !3;
        Ok(Outcome::Branch)
    } else {
        Ok(Outcome::Next)
    }
}

pub fn mcrf(cpu: &mut Cpu, instr: u32) -> Exec {
    let crfd = (instr >> 23) & 7;
    let crfs = (instr >> 18) & 7;
    let value = cpu.state.cr_field(crfs);
    cpu.state.set_cr_field(crfd, value);
    Ok(Outcome::Next)
}

fn cr_logic(cpu: &mut Cpu, instr: u32, f: impl Fn(u32, u32) -> u32) -> Exec {
    let (bt, ba, bb) = Decoder::xl_form(instr);
    let result = f(cpu.state.cr_bit(ba), cpu.state.cr_bit(bb)) & 1;
    cpu.state.set_cr_bit(bt, result);
    Ok(Outcome::Next)
}

pub fn crand(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| a & b)
}

pub fn cror(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| a | b)
}

pub fn crxor(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| a ^ b)
}

pub fn crnand(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| !(a & b))
}

pub fn crnor(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| !(a | b))
}

pub fn creqv(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| !(a ^ b))
}

pub fn crandc(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| a & !b)
}

pub fn crorc(cpu: &mut Cpu, instr: u32) -> Exec {
    cr_logic(cpu, instr, |a, b| a | !b)
}
