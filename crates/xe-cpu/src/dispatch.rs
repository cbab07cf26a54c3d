//! Table-driven dispatch
//!
//! One flat map from (primary, extended) opcode keys to handler
//! functions, built once on first use. XO-form arithmetic registers both
//! the plain and OE keys; the vcmp record forms register both the plain
//! and Rc keys. The handler reads the modifier bits itself.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::exceptions::Fault;
use crate::instructions::{branch, float, integer, load_store, system, vector, vmx128};
use crate::interpreter::Cpu;

/// Where control goes after a handler: fall through or the handler
/// already wrote PC.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Next,
    Branch,
}

pub type Handler = fn(&mut Cpu, u32) -> Result<Outcome, Fault>;

macro_rules! table {
    ($($primary:literal / $xo:expr => $handler:path),* $(,)?) => {{
        let mut map: HashMap<(u8, u16), Handler> = HashMap::new();
        $(
            let clash = map.insert(($primary, $xo), $handler as Handler);
            debug_assert!(clash.is_none(), "duplicate key {}/{}", $primary, $xo);
        )*
        map
    }};
}

static TABLE: Lazy<HashMap<(u8, u16), Handler>> = Lazy::new(|| {
    table! {
        // D-form integer
        3 / 0 => integer::twi,
        7 / 0 => integer::mulli,
        8 / 0 => integer::subfic,
        10 / 0 => integer::cmpli,
        11 / 0 => integer::cmpi,
        12 / 0 => integer::addic,
        13 / 0 => integer::addic_rc,
        14 / 0 => integer::addi,
        15 / 0 => integer::addis,
        20 / 0 => integer::rlwimi,
        21 / 0 => integer::rlwinm,
        23 / 0 => integer::rlwnm,
        24 / 0 => integer::ori,
        25 / 0 => integer::oris,
        26 / 0 => integer::xori,
        27 / 0 => integer::xoris,
        28 / 0 => integer::andi_rc,
        29 / 0 => integer::andis_rc,
        30 / 0 => integer::rldicl,
        30 / 1 => integer::rldicr,

        // Branch and system entry
        16 / 0 => branch::bc,
        17 / 0 => system::sc,
        18 / 0 => branch::b,
        19 / 0 => branch::mcrf,
        19 / 16 => branch::bclr,
        19 / 33 => branch::crnor,
        19 / 50 => system::rfi,
        19 / 129 => branch::crandc,
        19 / 150 => system::isync,
        19 / 193 => branch::crxor,
        19 / 225 => branch::crnand,
        19 / 257 => branch::crand,
        19 / 289 => branch::creqv,
        19 / 417 => branch::crorc,
        19 / 449 => branch::cror,
        19 / 528 => branch::bcctr,

        // 31: compares, traps, XO arithmetic (plain and OE keys)
        31 / 0 => integer::cmp,
        31 / 4 => integer::tw,
        31 / 32 => integer::cmpl,
        31 / 8 => integer::subfc,
        31 / 520 => integer::subfc,
        31 / 10 => integer::addc,
        31 / 522 => integer::addc,
        31 / 11 => integer::mulhwu,
        31 / 40 => integer::subf,
        31 / 552 => integer::subf,
        31 / 75 => integer::mulhw,
        31 / 104 => integer::neg,
        31 / 616 => integer::neg,
        31 / 136 => integer::subfe,
        31 / 648 => integer::subfe,
        31 / 138 => integer::adde,
        31 / 650 => integer::adde,
        31 / 200 => integer::subfze,
        31 / 712 => integer::subfze,
        31 / 202 => integer::addze,
        31 / 714 => integer::addze,
        31 / 232 => integer::subfme,
        31 / 744 => integer::subfme,
        31 / 234 => integer::addme,
        31 / 746 => integer::addme,
        31 / 235 => integer::mullw,
        31 / 747 => integer::mullw,
        31 / 266 => integer::add,
        31 / 778 => integer::add,
        31 / 459 => integer::divwu,
        31 / 971 => integer::divwu,
        31 / 491 => integer::divw,
        31 / 1003 => integer::divw,

        // 31: logical and shifts
        31 / 24 => integer::slw,
        31 / 26 => integer::cntlzw,
        31 / 28 => integer::and,
        31 / 60 => integer::andc,
        31 / 124 => integer::nor,
        31 / 284 => integer::eqv,
        31 / 316 => integer::xor,
        31 / 412 => integer::orc,
        31 / 444 => integer::or,
        31 / 476 => integer::nand,
        31 / 536 => integer::srw,
        31 / 792 => integer::sraw,
        31 / 824 => integer::srawi,
        31 / 922 => integer::extsh,
        31 / 954 => integer::extsb,

        // 31: indexed loads/stores, reservations, vector loads/stores
        31 / 20 => load_store::lwarx,
        31 / 23 => load_store::lwzx,
        31 / 55 => load_store::lwzux,
        31 / 87 => load_store::lbzx,
        31 / 103 => load_store::lvx,
        31 / 119 => load_store::lbzux,
        31 / 150 => load_store::stwcx,
        31 / 151 => load_store::stwx,
        31 / 183 => load_store::stwux,
        31 / 215 => load_store::stbx,
        31 / 231 => load_store::stvx,
        31 / 247 => load_store::stbux,
        31 / 279 => load_store::lhzx,
        31 / 311 => load_store::lhzux,
        31 / 343 => load_store::lhax,
        31 / 375 => load_store::lhaux,
        31 / 407 => load_store::sthx,
        31 / 439 => load_store::sthux,
        31 / 534 => load_store::lwbrx,
        31 / 662 => load_store::stwbrx,
        31 / 790 => load_store::lhbrx,
        31 / 918 => load_store::sthbrx,

        // 31: CR/MSR/SPR traffic and storage control
        31 / 19 => system::mfcr,
        31 / 54 => system::dcbst,
        31 / 83 => system::mfmsr,
        31 / 86 => system::dcbf,
        31 / 144 => system::mtcrf,
        31 / 146 => system::mtmsr,
        31 / 246 => system::dcbtst,
        31 / 278 => system::dcbt,
        31 / 306 => system::tlbie,
        31 / 339 => system::mfspr,
        31 / 371 => system::mftb,
        31 / 467 => system::mtspr,
        31 / 512 => system::mcrxr,
        31 / 566 => system::tlbsync,
        31 / 598 => system::sync,
        31 / 854 => system::eieio,
        31 / 982 => system::icbi,
        31 / 1014 => system::dcbz,

        // D-form loads/stores
        32 / 0 => load_store::lwz,
        33 / 0 => load_store::lwzu,
        34 / 0 => load_store::lbz,
        35 / 0 => load_store::lbzu,
        36 / 0 => load_store::stw,
        37 / 0 => load_store::stwu,
        38 / 0 => load_store::stb,
        39 / 0 => load_store::stbu,
        40 / 0 => load_store::lhz,
        41 / 0 => load_store::lhzu,
        42 / 0 => load_store::lha,
        43 / 0 => load_store::lhau,
        44 / 0 => load_store::sth,
        45 / 0 => load_store::sthu,
        46 / 0 => load_store::lmw,
        47 / 0 => load_store::stmw,
        48 / 0 => load_store::lfs,
        49 / 0 => load_store::lfsu,
        50 / 0 => load_store::lfd,
        51 / 0 => load_store::lfdu,
        52 / 0 => load_store::stfs,
        53 / 0 => load_store::stfsu,
        54 / 0 => load_store::stfd,
        55 / 0 => load_store::stfdu,

        // Single-precision floating arithmetic
        59 / 18 => float::fdivs,
        59 / 20 => float::fsubs,
        59 / 21 => float::fadds,
        59 / 22 => float::fsqrts,
        59 / 24 => float::fres,
        59 / 25 => float::fmuls,
        59 / 28 => float::fmsubs,
        59 / 29 => float::fmadds,
        59 / 30 => float::fnmsubs,
        59 / 31 => float::fnmadds,

        // Double-precision arithmetic (A-form keys)
        63 / 18 => float::fdiv,
        63 / 20 => float::fsub,
        63 / 21 => float::fadd,
        63 / 22 => float::fsqrt,
        63 / 23 => float::fsel,
        63 / 25 => float::fmul,
        63 / 26 => float::frsqrte,
        63 / 28 => float::fmsub,
        63 / 29 => float::fmadd,
        63 / 30 => float::fnmsub,
        63 / 31 => float::fnmadd,

        // Double-precision moves/conversions (X-form keys)
        63 / 0 => float::fcmpu,
        63 / 12 => float::frsp,
        63 / 14 => float::fctiw,
        63 / 15 => float::fctiwz,
        63 / 38 => float::mtfsb1,
        63 / 40 => float::fneg,
        63 / 70 => float::mtfsb0,
        63 / 72 => float::fmr,
        63 / 136 => float::fnabs,
        63 / 264 => float::fabs,
        63 / 583 => float::mffs,
        63 / 711 => float::mtfsf,

        // VMX VA-forms
        4 / 34 => vector::vmladduhm,
        4 / 42 => vector::vsel,
        4 / 43 => vector::vperm,
        4 / 44 => vector::vsldoi,
        4 / 46 => vector::vmaddfp,
        4 / 47 => vector::vnmsubfp,

        // VMX VX-forms
        4 / 0 => vector::vaddubm,
        4 / 2 => vector::vmaxub,
        4 / 4 => vector::vrlb,
        4 / 6 => vector::vcmpequb,
        4 / 1030 => vector::vcmpequb,
        4 / 8 => vector::vmuloub,
        4 / 10 => vector::vaddfp,
        4 / 12 => vector::vmrghb,
        4 / 14 => vector::vpkuhum,
        4 / 64 => vector::vadduhm,
        4 / 66 => vector::vmaxuh,
        4 / 68 => vector::vrlh,
        4 / 70 => vector::vcmpequh,
        4 / 1094 => vector::vcmpequh,
        4 / 72 => vector::vmulouh,
        4 / 74 => vector::vsubfp,
        4 / 76 => vector::vmrghh,
        4 / 78 => vector::vpkuwum,
        4 / 142 => vector::vpkuhus,
        4 / 206 => vector::vpkuwus,
        4 / 128 => vector::vadduwm,
        4 / 130 => vector::vmaxuw,
        4 / 132 => vector::vrlw,
        4 / 134 => vector::vcmpequw,
        4 / 1158 => vector::vcmpequw,
        4 / 140 => vector::vmrghw,
        4 / 198 => vector::vcmpeqfp,
        4 / 1222 => vector::vcmpeqfp,
        4 / 258 => vector::vmaxsb,
        4 / 260 => vector::vslb,
        4 / 264 => vector::vmulosb,
        4 / 266 => vector::vrefp,
        4 / 268 => vector::vmrglb,
        4 / 270 => vector::vpkshus,
        4 / 322 => vector::vmaxsh,
        4 / 324 => vector::vslh,
        4 / 328 => vector::vmulosh,
        4 / 330 => vector::vrsqrtefp,
        4 / 332 => vector::vmrglh,
        4 / 334 => vector::vpkswus,
        4 / 386 => vector::vmaxsw,
        4 / 388 => vector::vslw,
        4 / 396 => vector::vmrglw,
        4 / 398 => vector::vpkshss,
        4 / 452 => vector::vsl,
        4 / 454 => vector::vcmpgefp,
        4 / 1478 => vector::vcmpgefp,
        4 / 462 => vector::vpkswss,
        4 / 512 => vector::vaddubs,
        4 / 514 => vector::vminub,
        4 / 516 => vector::vsrb,
        4 / 520 => vector::vmuleub,
        4 / 518 => vector::vcmpgtub,
        4 / 1542 => vector::vcmpgtub,
        4 / 522 => vector::vrfin,
        4 / 524 => vector::vspltb,
        4 / 526 => vector::vupkhsb,
        4 / 576 => vector::vadduhs,
        4 / 578 => vector::vminuh,
        4 / 580 => vector::vsrh,
        4 / 584 => vector::vmuleuh,
        4 / 582 => vector::vcmpgtuh,
        4 / 1606 => vector::vcmpgtuh,
        4 / 586 => vector::vrfiz,
        4 / 588 => vector::vsplth,
        4 / 590 => vector::vupkhsh,
        4 / 640 => vector::vadduws,
        4 / 642 => vector::vminuw,
        4 / 644 => vector::vsrw,
        4 / 646 => vector::vcmpgtuw,
        4 / 1670 => vector::vcmpgtuw,
        4 / 650 => vector::vrfip,
        4 / 652 => vector::vspltw,
        4 / 654 => vector::vupklsb,
        4 / 710 => vector::vcmpgtfp,
        4 / 1734 => vector::vcmpgtfp,
        4 / 714 => vector::vrfim,
        4 / 718 => vector::vupklsh,
        4 / 708 => vector::vsr,
        4 / 768 => vector::vaddsbs,
        4 / 770 => vector::vminsb,
        4 / 772 => vector::vsrab,
        4 / 776 => vector::vmulesb,
        4 / 774 => vector::vcmpgtsb,
        4 / 1798 => vector::vcmpgtsb,
        4 / 778 => vector::vcfux,
        4 / 780 => vector::vspltisb,
        4 / 782 => vector::vpkpx,
        4 / 832 => vector::vaddshs,
        4 / 834 => vector::vminsh,
        4 / 836 => vector::vsrah,
        4 / 840 => vector::vmulesh,
        4 / 838 => vector::vcmpgtsh,
        4 / 1862 => vector::vcmpgtsh,
        4 / 842 => vector::vcfsx,
        4 / 844 => vector::vspltish,
        4 / 846 => vector::vupkhpx,
        4 / 896 => vector::vaddsws,
        4 / 898 => vector::vminsw,
        4 / 900 => vector::vsraw,
        4 / 902 => vector::vcmpgtsw,
        4 / 1926 => vector::vcmpgtsw,
        4 / 906 => vector::vctuxs,
        4 / 908 => vector::vspltisw,
        4 / 966 => vector::vcmpbfp,
        4 / 1990 => vector::vcmpbfp,
        4 / 970 => vector::vctsxs,
        4 / 974 => vector::vupklpx,
        4 / 1024 => vector::vsububm,
        4 / 1026 => vector::vavgub,
        4 / 1028 => vector::vand,
        4 / 1034 => vector::vmaxfp,
        4 / 1098 => vector::vminfp,
        4 / 1088 => vector::vsubuhm,
        4 / 1090 => vector::vavguh,
        4 / 1092 => vector::vandc,
        4 / 1152 => vector::vsubuwm,
        4 / 1154 => vector::vavguw,
        4 / 1156 => vector::vor,
        4 / 1220 => vector::vxor,
        4 / 1282 => vector::vavgsb,
        4 / 1284 => vector::vnor,
        4 / 1346 => vector::vavgsh,
        4 / 1410 => vector::vavgsw,
        4 / 1536 => vector::vsububs,
        4 / 1600 => vector::vsubuhs,
        4 / 1664 => vector::vsubuws,
        4 / 1792 => vector::vsubsbs,
        4 / 1856 => vector::vsubshs,
        4 / 1920 => vector::vsubsws,

        // VMX128 (primary 5 arithmetic/logical, primary 6 permutes)
        5 / 0x010 => vmx128::vaddfp128,
        5 / 0x050 => vmx128::vsubfp128,
        5 / 0x090 => vmx128::vmulfp128,
        5 / 0x0D0 => vmx128::vmaddfp128,
        5 / 0x210 => vmx128::vand128,
        5 / 0x250 => vmx128::vor128,
        5 / 0x290 => vmx128::vxor128,
        5 / 0x2D0 => vmx128::vnor128,
        6 / 0x010 => vmx128::vspltw128,
        6 / 0x050 => vmx128::vspltisw128,
        6 / 0x090 => vmx128::vpermwi128,
    }
});

/// Handler for (primary, extended), or `None` for an illegal opcode.
pub fn lookup(primary: u8, xo: u16) -> Option<Handler> {
    TABLE.get(&(primary, xo)).copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_covers_the_core_keys() {
        assert!(lookup(14, 0).is_some()); // addi
        assert!(lookup(31, 266).is_some()); // add
        assert!(lookup(31, 778).is_some()); // addo
        assert!(lookup(19, 528).is_some()); // bcctr
        assert!(lookup(4, 908).is_some()); // vspltisw
        assert!(lookup(4, 1030).is_some()); // vcmpequb.
        assert!(lookup(6, 0x090).is_some()); // vpermwi128
        assert!(lookup(1, 0).is_none());
        assert!(lookup(31, 1023).is_none());
    }
}
