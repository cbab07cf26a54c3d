//! Architectural register state
//!
//! `CpuState` holds every architecturally visible register plus the
//! load-reserve pair and the running flag. It knows nothing about decoding
//! or memory; the interpreter drives it.

use tracing::error;
use xe_core::error::CpuError;
use xe_memory::constants::PVR_XENON;

use crate::vmx::VectorRegister;

pub const XER_SO: u32 = 0x8000_0000;
pub const XER_OV: u32 = 0x4000_0000;
pub const XER_CA: u32 = 0x2000_0000;

pub const MSR_EE: u32 = 0x0000_8000;
pub const MSR_PR: u32 = 0x0000_4000;

/// CR field bit values (within a 4-bit field).
pub const CR_LT: u32 = 0x8;
pub const CR_GT: u32 = 0x4;
pub const CR_EQ: u32 = 0x2;
pub const CR_SO: u32 = 0x1;

/// SPR numbers the core knows by name.
pub mod spr {
    pub const XER: u32 = 1;
    pub const LR: u32 = 8;
    pub const CTR: u32 = 9;
    pub const DEC: u32 = 22;
    pub const SRR0: u32 = 26;
    pub const SRR1: u32 = 27;
    pub const TBL_READ: u32 = 268;
    pub const TBU_READ: u32 = 269;
    pub const SPRG0: u32 = 272;
    pub const SPRG1: u32 = 273;
    pub const SPRG2: u32 = 274;
    pub const SPRG3: u32 = 275;
    pub const TBL_WRITE: u32 = 284;
    pub const TBU_WRITE: u32 = 285;
    pub const PVR: u32 = 287;
    pub const GQR0: u32 = 912;
    pub const GQR7: u32 = 919;
    pub const HID0: u32 = 1008;
    pub const HID1: u32 = 1009;
    pub const HID4: u32 = 1012;
}

/// Exact byte length of a serialized snapshot.
///
/// 19 scalar u32s, 32 GPRs, 32 FPRs, 32 VPRs, 1024 SPRs, 8 GQRs, the
/// reservation pair and two flag bytes.
pub const SNAPSHOT_LEN: usize = 19 * 4 + 32 * 4 + 32 * 8 + 32 * 16 + 1024 * 4 + 8 * 4 + 4 + 2;

pub struct CpuState {
    pub pc: u32,
    pub lr: u32,
    pub ctr: u32,
    pub xer: u32,
    pub msr: u32,
    pub fpscr: u32,
    pub srr0: u32,
    pub srr1: u32,
    pub sprg: [u32; 4],
    pub hid0: u32,
    pub hid1: u32,
    pub hid4: u32,
    pub dec: u32,
    pub tbl: u32,
    pub tbu: u32,
    pub cr: u32,
    gpr: [u32; 32],
    pub fpr: [f64; 32],
    pub vpr: [VectorRegister; 32],
    spr: [u32; 1024],
    pub gqr: [u32; 8],
    pub reservation_addr: u32,
    pub reservation_valid: bool,
    pub running: bool,
}

impl Default for CpuState {
    fn default() -> Self {
        Self::new()
    }
}

impl CpuState {
    pub fn new() -> Self {
        let mut state = Self {
            pc: 0,
            lr: 0,
            ctr: 0,
            xer: 0,
            msr: 0,
            fpscr: 0,
            srr0: 0,
            srr1: 0,
            sprg: [0; 4],
            hid0: 0,
            hid1: 0,
            hid4: 0,
            dec: 0,
            tbl: 0,
            tbu: 0,
            cr: 0,
            gpr: [0; 32],
            fpr: [0.0; 32],
            vpr: [VectorRegister::ZERO; 32],
            spr: [0; 1024],
            gqr: [0; 8],
            reservation_addr: 0,
            reservation_valid: false,
            running: false,
        };
        state.spr[spr::PVR as usize] = PVR_XENON;
        state
    }

    /// Warm reset: every register zeroed, PVR reseeded, PC left where it
    /// was so firmware can restart in place.
    pub fn reset(&mut self) {
        let pc = self.pc;
        *self = Self::new();
        self.pc = pc;
        self.running = true;
    }

    /// Cold start at `entry` with an initial GPR image (stack pointer,
    /// argument registers).
    pub fn reset_to(&mut self, entry: u32, gpr: [u32; 32]) {
        *self = Self::new();
        self.gpr = gpr;
        self.pc = entry;
        self.running = true;
    }

    // Register indices come from 5- and 10-bit decode fields, so an
    // out-of-range index is a caller bug. Index directly and let the
    // bounds check fail fast rather than silently wrapping.

    pub fn gpr(&self, index: u32) -> u32 {
        self.gpr[index as usize]
    }

    pub fn set_gpr(&mut self, index: u32, value: u32) {
        self.gpr[index as usize] = value;
    }

    pub fn spr(&self, index: u32) -> u32 {
        self.spr[index as usize]
    }

    pub fn set_spr(&mut self, index: u32, value: u32) {
        self.spr[index as usize] = value;
    }

    /// 4-bit CR field, field 0 being the most significant nibble.
    pub fn cr_field(&self, field: u32) -> u32 {
        (self.cr >> ((7 - (field & 7)) * 4)) & 0xF
    }

    pub fn set_cr_field(&mut self, field: u32, value: u32) {
        let shift = (7 - (field & 7)) * 4;
        self.cr = (self.cr & !(0xF << shift)) | ((value & 0xF) << shift);
    }

    /// Single CR bit, numbered 0..31 from the most significant end.
    pub fn cr_bit(&self, bit: u32) -> u32 {
        (self.cr >> (31 - (bit & 31))) & 1
    }

    pub fn set_cr_bit(&mut self, bit: u32, value: u32) {
        let shift = 31 - (bit & 31);
        self.cr = (self.cr & !(1 << shift)) | ((value & 1) << shift);
    }

    /// CR0 from a signed compare of `value` against zero, SO mirrored in.
    pub fn set_cr0(&mut self, value: u32) {
        let mut field = if (value as i32) < 0 {
            CR_LT
        } else if value == 0 {
            CR_EQ
        } else {
            CR_GT
        };
        if self.xer & XER_SO != 0 {
            field |= CR_SO;
        }
        self.set_cr_field(0, field);
    }

    pub fn xer_ca(&self) -> bool {
        self.xer & XER_CA != 0
    }

    pub fn set_xer_ca(&mut self, carry: bool) {
        if carry {
            self.xer |= XER_CA;
        } else {
            self.xer &= !XER_CA;
        }
    }

    /// OV tracks the last result; SO is sticky once set.
    pub fn set_xer_ov(&mut self, overflow: bool) {
        if overflow {
            self.xer |= XER_OV | XER_SO;
        } else {
            self.xer &= !XER_OV;
        }
    }

    pub fn msr_ee(&self) -> bool {
        self.msr & MSR_EE != 0
    }

    pub fn msr_pr(&self) -> bool {
        self.msr & MSR_PR != 0
    }

    /// Snapshot the whole register file into a flat byte buffer.
    ///
    /// Layout is fixed and big-endian throughout; `restore` is the exact
    /// inverse.
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(SNAPSHOT_LEN);
        for value in [
            self.pc, self.lr, self.ctr, self.xer, self.msr, self.fpscr, self.srr0, self.srr1,
            self.sprg[0], self.sprg[1], self.sprg[2], self.sprg[3], self.hid0, self.hid1,
            self.hid4, self.dec, self.tbl, self.tbu, self.cr,
        ] {
            out.extend_from_slice(&value.to_be_bytes());
        }
        for value in self.gpr {
            out.extend_from_slice(&value.to_be_bytes());
        }
        for value in self.fpr {
            out.extend_from_slice(&value.to_bits().to_be_bytes());
        }
        for value in self.vpr {
            out.extend_from_slice(&value.bytes());
        }
        for value in self.spr {
            out.extend_from_slice(&value.to_be_bytes());
        }
        for value in self.gqr {
            out.extend_from_slice(&value.to_be_bytes());
        }
        out.extend_from_slice(&self.reservation_addr.to_be_bytes());
        out.push(self.reservation_valid as u8);
        out.push(self.running as u8);
        debug_assert_eq!(out.len(), SNAPSHOT_LEN);
        out
    }

    /// Restore a snapshot produced by `serialize`.
    pub fn restore(&mut self, snapshot: &[u8]) -> Result<(), CpuError> {
        if snapshot.len() != SNAPSHOT_LEN {
            return Err(CpuError::InvalidSnapshot {
                expected: SNAPSHOT_LEN,
                got: snapshot.len(),
            });
        }
        fn take_u32(buf: &[u8], cursor: &mut usize) -> u32 {
            let mut b = [0u8; 4];
            b.copy_from_slice(&buf[*cursor..*cursor + 4]);
            *cursor += 4;
            u32::from_be_bytes(b)
        }
        let c = &mut 0usize;
        self.pc = take_u32(snapshot, c);
        self.lr = take_u32(snapshot, c);
        self.ctr = take_u32(snapshot, c);
        self.xer = take_u32(snapshot, c);
        self.msr = take_u32(snapshot, c);
        self.fpscr = take_u32(snapshot, c);
        self.srr0 = take_u32(snapshot, c);
        self.srr1 = take_u32(snapshot, c);
        for i in 0..4 {
            self.sprg[i] = take_u32(snapshot, c);
        }
        self.hid0 = take_u32(snapshot, c);
        self.hid1 = take_u32(snapshot, c);
        self.hid4 = take_u32(snapshot, c);
        self.dec = take_u32(snapshot, c);
        self.tbl = take_u32(snapshot, c);
        self.tbu = take_u32(snapshot, c);
        self.cr = take_u32(snapshot, c);
        for i in 0..32 {
            self.gpr[i] = take_u32(snapshot, c);
        }
        for i in 0..32 {
            // High word was written first.
            let hi = take_u32(snapshot, c) as u64;
            let lo = take_u32(snapshot, c) as u64;
            self.fpr[i] = f64::from_bits((hi << 32) | lo);
        }
        for i in 0..32 {
            let mut bytes = [0u8; 16];
            bytes.copy_from_slice(&snapshot[*c..*c + 16]);
            *c += 16;
            self.vpr[i] = VectorRegister::from_bytes(bytes);
        }
        for i in 0..1024 {
            self.spr[i] = take_u32(snapshot, c);
        }
        for i in 0..8 {
            self.gqr[i] = take_u32(snapshot, c);
        }
        self.reservation_addr = take_u32(snapshot, c);
        self.reservation_valid = snapshot[*c] != 0;
        self.running = snapshot[*c + 1] != 0;
        Ok(())
    }

    /// Dump the register file through the log, for fatal halts.
    pub fn dump(&self) {
        error!(target: "cpu", "PC =0x{:08X} LR =0x{:08X} CTR=0x{:08X}", self.pc, self.lr, self.ctr);
        error!(target: "cpu", "MSR=0x{:08X} CR =0x{:08X} XER=0x{:08X}", self.msr, self.cr, self.xer);
        error!(
            target: "cpu",
            "SRR0=0x{:08X} SRR1=0x{:08X} DEC=0x{:08X} FPSCR=0x{:08X}",
            self.srr0, self.srr1, self.dec, self.fpscr
        );
        for row in 0..8 {
            let i = row * 4;
            error!(
                target: "cpu",
                "r{:<2}=0x{:08X} r{:<2}=0x{:08X} r{:<2}=0x{:08X} r{:<2}=0x{:08X}",
                i,
                self.gpr[i],
                i + 1,
                self.gpr[i + 1],
                i + 2,
                self.gpr[i + 2],
                i + 3,
                self.gpr[i + 3]
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cr_field_numbering_is_msb_first() {
        let mut state = CpuState::new();
        state.set_cr_field(0, 0x8);
        assert_eq!(state.cr, 0x8000_0000);
        state.set_cr_field(7, 0x2);
        assert_eq!(state.cr, 0x8000_0002);
        assert_eq!(state.cr_field(0), 0x8);
        assert_eq!(state.cr_field(7), 0x2);
        state.set_cr_bit(1, 1);
        assert_eq!(state.cr_field(0), 0xC);
    }

    #[test]
    fn cr0_follows_signed_compare_and_so() {
        let mut state = CpuState::new();
        state.set_cr0(0xFFFF_FFFF);
        assert_eq!(state.cr_field(0), CR_LT);
        state.set_cr0(0);
        assert_eq!(state.cr_field(0), CR_EQ);
        state.xer |= XER_SO;
        state.set_cr0(5);
        assert_eq!(state.cr_field(0), CR_GT | CR_SO);
    }

    #[test]
    fn so_is_sticky() {
        let mut state = CpuState::new();
        state.set_xer_ov(true);
        assert_eq!(state.xer & (XER_SO | XER_OV), XER_SO | XER_OV);
        state.set_xer_ov(false);
        assert_eq!(state.xer & XER_OV, 0);
        assert_eq!(state.xer & XER_SO, XER_SO);
    }

    #[test]
    fn snapshot_round_trips_exactly() {
        let mut state = CpuState::new();
        state.pc = 0x1234;
        state.msr = MSR_EE;
        state.set_gpr(3, 0xDEAD_BEEF);
        state.fpr[1] = -1.5;
        state.vpr[2].set_u32x4([1, 2, 3, 4]);
        state.set_spr(spr::SPRG0, 0x55);
        state.gqr[7] = 9;
        state.reservation_addr = 0x100;
        state.reservation_valid = true;
        state.running = true;

        let snapshot = state.serialize();
        assert_eq!(snapshot.len(), SNAPSHOT_LEN);

        let mut other = CpuState::new();
        other.restore(&snapshot).unwrap();
        assert_eq!(other.pc, 0x1234);
        assert_eq!(other.gpr(3), 0xDEAD_BEEF);
        assert_eq!(other.fpr[1], -1.5);
        assert_eq!(other.vpr[2].as_u32x4(), [1, 2, 3, 4]);
        assert_eq!(other.spr(spr::SPRG0), 0x55);
        assert!(other.reservation_valid);
        assert!(other.running);
        assert_eq!(other.serialize(), snapshot);
    }

    #[test]
    fn bad_snapshot_length_is_rejected() {
        let mut state = CpuState::new();
        assert!(matches!(
            state.restore(&[0u8; 16]),
            Err(CpuError::InvalidSnapshot { .. })
        ));
    }

    #[test]
    #[should_panic]
    fn out_of_range_gpr_index_panics() {
        let state = CpuState::new();
        let _ = state.gpr(32);
    }

    #[test]
    fn reset_preserves_pc_and_pvr() {
        let mut state = CpuState::new();
        state.pc = 0x8000;
        state.set_gpr(1, 0x1_0000);
        state.reset();
        assert_eq!(state.pc, 0x8000);
        assert_eq!(state.gpr(1), 0);
        assert_eq!(state.spr(spr::PVR), PVR_XENON);
        assert!(state.running);
    }
}
