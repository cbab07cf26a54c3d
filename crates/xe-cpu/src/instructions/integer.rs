//! Integer unit: arithmetic, logical, compare, rotate and trap forms

use crate::decoder::Decoder;
use crate::dispatch::Outcome;
use crate::exceptions::{Exception, Fault};
use crate::interpreter::Cpu;
use crate::state::{CR_EQ, CR_GT, CR_LT, CR_SO, XER_SO};

type Exec = Result<Outcome, Fault>;

fn finish(cpu: &mut Cpu, rd: u32, value: u32, record: bool) -> Exec {
    cpu.state.set_gpr(rd, value);
    if record {
        cpu.state.set_cr0(value);
    }
    Ok(Outcome::Next)
}

/// Full add with carry-in; reports unsigned carry and signed overflow.
fn add3(a: u32, b: u32, carry_in: u32) -> (u32, bool, bool) {
    let wide = a as u64 + b as u64 + carry_in as u64;
    let result = wide as u32;
    let carry = wide > u32::MAX as u64;
    let overflow = ((a ^ result) & (b ^ result)) & 0x8000_0000 != 0;
    (result, carry, overflow)
}

/// Rotate mask from mask-begin/mask-end, IBM bit numbering. A wrapped
/// range (mb > me) selects the complement band.
pub fn mask_from_mb_me(mb: u32, me: u32) -> u32 {
    let head = u32::MAX >> mb;
    let tail = u32::MAX << (31 - me);
    if mb <= me {
        head & tail
    } else {
        head | tail
    }
}

fn compare_signed(cpu: &mut Cpu, crf: u32, a: i32, b: i32) {
    let mut field = match a.cmp(&b) {
        std::cmp::Ordering::Less => CR_LT,
        std::cmp::Ordering::Greater => CR_GT,
        std::cmp::Ordering::Equal => CR_EQ,
    };
    if cpu.state.xer & XER_SO != 0 {
        field |= CR_SO;
    }
    cpu.state.set_cr_field(crf, field);
}

fn compare_unsigned(cpu: &mut Cpu, crf: u32, a: u32, b: u32) {
    let mut field = match a.cmp(&b) {
        std::cmp::Ordering::Less => CR_LT,
        std::cmp::Ordering::Greater => CR_GT,
        std::cmp::Ordering::Equal => CR_EQ,
    };
    if cpu.state.xer & XER_SO != 0 {
        field |= CR_SO;
    }
    cpu.state.set_cr_field(crf, field);
}

fn trap_condition(to: u32, a: u32, b: u32) -> bool {
    let sa = a as i32;
    let sb = b as i32;
    (to & 0x10 != 0 && sa < sb)
        || (to & 0x08 != 0 && sa > sb)
        || (to & 0x04 != 0 && a == b)
        || (to & 0x02 != 0 && a < b)
        || (to & 0x01 != 0 && a > b)
}

// D-form arithmetic

pub fn addi(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, simm) = Decoder::d_form(instr);
    let base = if ra == 0 { 0 } else { cpu.state.gpr(ra) };
    finish(cpu, rd, base.wrapping_add(simm as i32 as u32), false)
}

pub fn addis(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, simm) = Decoder::d_form(instr);
    let base = if ra == 0 { 0 } else { cpu.state.gpr(ra) };
    finish(cpu, rd, base.wrapping_add((simm as i32 as u32) << 16), false)
}

pub fn addic(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, simm) = Decoder::d_form(instr);
    let (result, carry, _) = add3(cpu.state.gpr(ra), simm as i32 as u32, 0);
    cpu.state.set_xer_ca(carry);
    finish(cpu, rd, result, false)
}

pub fn addic_rc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, simm) = Decoder::d_form(instr);
    let (result, carry, _) = add3(cpu.state.gpr(ra), simm as i32 as u32, 0);
    cpu.state.set_xer_ca(carry);
    finish(cpu, rd, result, true)
}

pub fn subfic(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, simm) = Decoder::d_form(instr);
    let (result, carry, _) = add3(!cpu.state.gpr(ra), simm as i32 as u32, 1);
    cpu.state.set_xer_ca(carry);
    finish(cpu, rd, result, false)
}

pub fn mulli(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, simm) = Decoder::d_form(instr);
    let result = (cpu.state.gpr(ra) as i32).wrapping_mul(simm as i32) as u32;
    finish(cpu, rd, result, false)
}

pub fn cmpi(cpu: &mut Cpu, instr: u32) -> Exec {
    let (_, ra, simm) = Decoder::d_form(instr);
    compare_signed(cpu, Decoder::crfd(instr), cpu.state.gpr(ra) as i32, simm as i32);
    Ok(Outcome::Next)
}

pub fn cmpli(cpu: &mut Cpu, instr: u32) -> Exec {
    let (_, ra, uimm) = Decoder::d_form(instr);
    compare_unsigned(cpu, Decoder::crfd(instr), cpu.state.gpr(ra), uimm as u16 as u32);
    Ok(Outcome::Next)
}

pub fn twi(cpu: &mut Cpu, instr: u32) -> Exec {
    let (to, ra, simm) = Decoder::d_form(instr);
    if trap_condition(to, cpu.state.gpr(ra), simm as i32 as u32) {
        return Err(Exception::Program.into());
    }
    Ok(Outcome::Next)
}

// D-form logical. These write RA and the immediate zero-extends.

pub fn andi_rc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, uimm) = Decoder::d_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) & uimm as u16 as u32, true)
}

pub fn andis_rc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, uimm) = Decoder::d_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) & ((uimm as u16 as u32) << 16), true)
}

pub fn ori(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, uimm) = Decoder::d_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) | uimm as u16 as u32, false)
}

pub fn oris(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, uimm) = Decoder::d_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) | ((uimm as u16 as u32) << 16), false)
}

pub fn xori(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, uimm) = Decoder::d_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) ^ uimm as u16 as u32, false)
}

pub fn xoris(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, uimm) = Decoder::d_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) ^ ((uimm as u16 as u32) << 16), false)
}

// X-form compares and trap

pub fn cmp(cpu: &mut Cpu, instr: u32) -> Exec {
    let (_, ra, rb, _) = Decoder::x_form(instr);
    compare_signed(
        cpu,
        Decoder::crfd(instr),
        cpu.state.gpr(ra) as i32,
        cpu.state.gpr(rb) as i32,
    );
    Ok(Outcome::Next)
}

pub fn cmpl(cpu: &mut Cpu, instr: u32) -> Exec {
    let (_, ra, rb, _) = Decoder::x_form(instr);
    compare_unsigned(cpu, Decoder::crfd(instr), cpu.state.gpr(ra), cpu.state.gpr(rb));
    Ok(Outcome::Next)
}

pub fn tw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (to, ra, rb, _) = Decoder::x_form(instr);
    if trap_condition(to, cpu.state.gpr(ra), cpu.state.gpr(rb)) {
        return Err(Exception::Program.into());
    }
    Ok(Outcome::Next)
}

// XO-form arithmetic. The OE bit folds the overflow result into XER.

pub fn add(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let (result, _, overflow) = add3(cpu.state.gpr(ra), cpu.state.gpr(rb), 0);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn addc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let (result, carry, overflow) = add3(cpu.state.gpr(ra), cpu.state.gpr(rb), 0);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn adde(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let carry_in = cpu.state.xer_ca() as u32;
    let (result, carry, overflow) = add3(cpu.state.gpr(ra), cpu.state.gpr(rb), carry_in);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn addze(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, _, oe, rc) = Decoder::xo_form(instr);
    let carry_in = cpu.state.xer_ca() as u32;
    let (result, carry, overflow) = add3(cpu.state.gpr(ra), 0, carry_in);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn addme(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, _, oe, rc) = Decoder::xo_form(instr);
    let carry_in = cpu.state.xer_ca() as u32;
    let (result, carry, overflow) = add3(cpu.state.gpr(ra), u32::MAX, carry_in);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn subf(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let (result, _, overflow) = add3(!cpu.state.gpr(ra), cpu.state.gpr(rb), 1);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn subfc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let (result, carry, overflow) = add3(!cpu.state.gpr(ra), cpu.state.gpr(rb), 1);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn subfe(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let carry_in = cpu.state.xer_ca() as u32;
    let (result, carry, overflow) = add3(!cpu.state.gpr(ra), cpu.state.gpr(rb), carry_in);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn subfze(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, _, oe, rc) = Decoder::xo_form(instr);
    let carry_in = cpu.state.xer_ca() as u32;
    let (result, carry, overflow) = add3(!cpu.state.gpr(ra), 0, carry_in);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn subfme(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, _, oe, rc) = Decoder::xo_form(instr);
    let carry_in = cpu.state.xer_ca() as u32;
    let (result, carry, overflow) = add3(!cpu.state.gpr(ra), u32::MAX, carry_in);
    cpu.state.set_xer_ca(carry);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, result, rc)
}

pub fn neg(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, _, oe, rc) = Decoder::xo_form(instr);
    let value = cpu.state.gpr(ra);
    if oe {
        cpu.state.set_xer_ov(value == 0x8000_0000);
    }
    finish(cpu, rd, value.wrapping_neg(), rc)
}

pub fn mullw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let product = cpu.state.gpr(ra) as i32 as i64 * cpu.state.gpr(rb) as i32 as i64;
    if oe {
        cpu.state.set_xer_ov(product != product as i32 as i64);
    }
    finish(cpu, rd, product as u32, rc)
}

pub fn mulhw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _, rc) = Decoder::xo_form(instr);
    let product = cpu.state.gpr(ra) as i32 as i64 * cpu.state.gpr(rb) as i32 as i64;
    finish(cpu, rd, (product >> 32) as u32, rc)
}

pub fn mulhwu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, _, rc) = Decoder::xo_form(instr);
    let product = cpu.state.gpr(ra) as u64 * cpu.state.gpr(rb) as u64;
    finish(cpu, rd, (product >> 32) as u32, rc)
}

pub fn divw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let dividend = cpu.state.gpr(ra) as i32;
    let divisor = cpu.state.gpr(rb) as i32;
    if divisor == 0 {
        return Err(Exception::Program.into());
    }
    let (quotient, overflow) = dividend.overflowing_div(divisor);
    if oe {
        cpu.state.set_xer_ov(overflow);
    }
    finish(cpu, rd, quotient as u32, rc)
}

pub fn divwu(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rd, ra, rb, oe, rc) = Decoder::xo_form(instr);
    let divisor = cpu.state.gpr(rb);
    if divisor == 0 {
        return Err(Exception::Program.into());
    }
    if oe {
        cpu.state.set_xer_ov(false);
    }
    let quotient = cpu.state.gpr(ra) / divisor;
    finish(cpu, rd, quotient, rc)
}

// X-form logical. Source is the RT slot, destination the RA slot.

pub fn and(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) & cpu.state.gpr(rb), rc)
}

pub fn andc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) & !cpu.state.gpr(rb), rc)
}

pub fn or(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) | cpu.state.gpr(rb), rc)
}

pub fn orc(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) | !cpu.state.gpr(rb), rc)
}

pub fn xor(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) ^ cpu.state.gpr(rb), rc)
}

pub fn nand(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, !(cpu.state.gpr(rs) & cpu.state.gpr(rb)), rc)
}

pub fn nor(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, !(cpu.state.gpr(rs) | cpu.state.gpr(rb)), rc)
}

pub fn eqv(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    finish(cpu, ra, !(cpu.state.gpr(rs) ^ cpu.state.gpr(rb)), rc)
}

pub fn extsb(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, _, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) as u8 as i8 as i32 as u32, rc)
}

pub fn extsh(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, _, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs) as u16 as i16 as i32 as u32, rc)
}

pub fn cntlzw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, _, rc) = Decoder::x_form(instr);
    finish(cpu, ra, cpu.state.gpr(rs).leading_zeros(), rc)
}

// Shifts. The 6-bit shift amount saturates past 31.

pub fn slw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    let shift = cpu.state.gpr(rb) & 0x3F;
    let result = if shift > 31 { 0 } else { cpu.state.gpr(rs) << shift };
    finish(cpu, ra, result, rc)
}

pub fn srw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    let shift = cpu.state.gpr(rb) & 0x3F;
    let result = if shift > 31 { 0 } else { cpu.state.gpr(rs) >> shift };
    finish(cpu, ra, result, rc)
}

pub fn sraw(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, rc) = Decoder::x_form(instr);
    let value = cpu.state.gpr(rs) as i32;
    let shift = cpu.state.gpr(rb) & 0x3F;
    let (result, shifted_out) = if shift > 31 {
        (value >> 31, true)
    } else {
        (value >> shift, value & ((1i32 << shift).wrapping_sub(1)) != 0)
    };
    cpu.state.set_xer_ca(value < 0 && shifted_out);
    finish(cpu, ra, result as u32, rc)
}

pub fn srawi(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, sh, rc) = Decoder::x_form(instr);
    let value = cpu.state.gpr(rs) as i32;
    let result = value >> sh;
    let shifted_out = value & ((1i32 << sh).wrapping_sub(1)) != 0;
    cpu.state.set_xer_ca(value < 0 && shifted_out);
    finish(cpu, ra, result as u32, rc)
}

// Rotates

pub fn rlwinm(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, sh, mb, me, rc) = Decoder::m_form(instr);
    let result = cpu.state.gpr(rs).rotate_left(sh) & mask_from_mb_me(mb, me);
    finish(cpu, ra, result, rc)
}

pub fn rlwnm(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, rb, mb, me, rc) = Decoder::m_form(instr);
    let shift = cpu.state.gpr(rb) & 0x1F;
    let result = cpu.state.gpr(rs).rotate_left(shift) & mask_from_mb_me(mb, me);
    finish(cpu, ra, result, rc)
}

pub fn rlwimi(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, sh, mb, me, rc) = Decoder::m_form(instr);
    let mask = mask_from_mb_me(mb, me);
    let rotated = cpu.state.gpr(rs).rotate_left(sh);
    let result = (rotated & mask) | (cpu.state.gpr(ra) & !mask);
    finish(cpu, ra, result, rc)
}

// 64-bit rotate-and-clear forms operate on the zero-extended word; only
// the low word of the result is architecturally visible here.

pub fn rldicl(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, sh, mb, rc) = Decoder::md_form(instr);
    let rotated = (cpu.state.gpr(rs) as u64).rotate_left(sh);
    let mask = if mb == 0 { u64::MAX } else { u64::MAX >> mb };
    finish(cpu, ra, (rotated & mask) as u32, rc)
}

pub fn rldicr(cpu: &mut Cpu, instr: u32) -> Exec {
    let (rs, ra, sh, me, rc) = Decoder::md_form(instr);
    let rotated = (cpu.state.gpr(rs) as u64).rotate_left(sh);
    let mask = u64::MAX << (63 - me);
    finish(cpu, ra, (rotated & mask) as u32, rc)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_plain_and_wrapped() {
        assert_eq!(mask_from_mb_me(0, 31), u32::MAX);
        assert_eq!(mask_from_mb_me(24, 31), 0x0000_00FF);
        assert_eq!(mask_from_mb_me(0, 7), 0xFF00_0000);
        // Wrapped range selects both ends.
        assert_eq!(mask_from_mb_me(28, 3), 0xF000_000F);
    }

    #[test]
    fn add3_carry_and_overflow_are_independent() {
        let (r, c, o) = add3(u32::MAX, 1, 0);
        assert_eq!(r, 0);
        assert!(c);
        assert!(!o);
        let (r, c, o) = add3(0x7FFF_FFFF, 1, 0);
        assert_eq!(r, 0x8000_0000);
        assert!(!c);
        assert!(o);
    }

    #[test]
    fn trap_conditions() {
        assert!(trap_condition(0x10, (-1i32) as u32, 0));
        assert!(!trap_condition(0x10, 1, 0));
        assert!(trap_condition(0x02, 1, 2));
        assert!(trap_condition(0x04, 7, 7));
        assert!(trap_condition(0x1F, 0, 0));
    }
}
