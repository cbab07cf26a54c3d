//! Instruction word field extraction
//!
//! Pure bit-slicing over the 32-bit instruction word. `opcode_key` folds
//! the primary opcode and the form-dependent extended opcode into the key
//! the dispatch table is indexed by; everything else is per-form field
//! accessors used by the handlers.

/// Extended-opcode A-form entries under primary 63. Anything else under
/// 63 is an X-form and keys on the full 10-bit field.
const A_FORM_63: [u16; 11] = [18, 20, 21, 22, 23, 25, 26, 28, 29, 30, 31];

pub struct Decoder;

impl Decoder {
    pub fn primary(instr: u32) -> u8 {
        (instr >> 26) as u8
    }

    /// Dispatch key: primary opcode plus the extended opcode in the
    /// position that primary's form defines.
    ///
    /// Primaries with no extended opcode key on 0. For primary 4, VA-form
    /// entries (low six bits 32..=47) key on those six bits; the VX forms
    /// key on the full low eleven bits, which never collide with the VA
    /// range. Primaries 5 and 6 carry the VMX128 forms and key on their
    /// masked opcode fields.
    pub fn opcode_key(instr: u32) -> (u8, u16) {
        let primary = Self::primary(instr);
        let xo = match primary {
            4 => {
                let low6 = (instr & 0x3F) as u16;
                if (32..=47).contains(&low6) {
                    low6
                } else {
                    (instr & 0x7FF) as u16
                }
            }
            5 => (instr & 0x3D0) as u16,
            6 => (instr & 0x3F0) as u16,
            19 | 31 => ((instr >> 1) & 0x3FF) as u16,
            30 => ((instr >> 2) & 0x7) as u16,
            59 => ((instr >> 1) & 0x1F) as u16,
            63 => {
                let a_xo = ((instr >> 1) & 0x1F) as u16;
                if A_FORM_63.contains(&a_xo) {
                    a_xo
                } else {
                    ((instr >> 1) & 0x3FF) as u16
                }
            }
            _ => 0,
        };
        (primary, xo)
    }

    /// D-form: target, source and a 16-bit immediate.
    pub fn d_form(instr: u32) -> (u32, u32, i16) {
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            (instr & 0xFFFF) as i16,
        )
    }

    /// X-form: target, two sources and the record bit.
    pub fn x_form(instr: u32) -> (u32, u32, u32, bool) {
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            (instr >> 11) & 0x1F,
            instr & 1 != 0,
        )
    }

    /// XO-form: X-form fields plus the overflow-enable bit.
    pub fn xo_form(instr: u32) -> (u32, u32, u32, bool, bool) {
        let (rt, ra, rb, rc) = Self::x_form(instr);
        (rt, ra, rb, (instr >> 10) & 1 != 0, rc)
    }

    /// M-form rotate: source, target, shift, mask begin/end, record bit.
    pub fn m_form(instr: u32) -> (u32, u32, u32, u32, u32, bool) {
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            (instr >> 11) & 0x1F,
            (instr >> 6) & 0x1F,
            (instr >> 1) & 0x1F,
            instr & 1 != 0,
        )
    }

    /// MD-form 64-bit rotate: source, target, 6-bit shift and mask bound.
    pub fn md_form(instr: u32) -> (u32, u32, u32, u32, bool) {
        let sh = ((instr >> 11) & 0x1F) | ((instr << 4) & 0x20);
        let mask_bound = ((instr >> 6) & 0x1F) | (instr & 0x20);
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            sh,
            mask_bound,
            instr & 1 != 0,
        )
    }

    /// I-form branch: sign-extended displacement, absolute and link bits.
    pub fn i_form(instr: u32) -> (i32, bool, bool) {
        let li = ((instr & 0x03FF_FFFC) as i32) << 6 >> 6;
        (li, instr & 2 != 0, instr & 1 != 0)
    }

    /// B-form conditional branch: BO, BI, sign-extended displacement,
    /// absolute and link bits.
    pub fn b_form(instr: u32) -> (u32, u32, i32, bool, bool) {
        let bd = (((instr & 0xFFFC) as i32) << 16) >> 16;
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            bd,
            instr & 2 != 0,
            instr & 1 != 0,
        )
    }

    /// XL-form CR logical / branch-to-register: BT/BO, BA/BI, BB fields.
    pub fn xl_form(instr: u32) -> (u32, u32, u32) {
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            (instr >> 11) & 0x1F,
        )
    }

    /// A-form floating arithmetic: target and the three source registers.
    pub fn a_form(instr: u32) -> (u32, u32, u32, u32, bool) {
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            (instr >> 11) & 0x1F,
            (instr >> 6) & 0x1F,
            instr & 1 != 0,
        )
    }

    /// VA-form vector: target and three sources.
    pub fn va_form(instr: u32) -> (u32, u32, u32, u32) {
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            (instr >> 11) & 0x1F,
            (instr >> 6) & 0x1F,
        )
    }

    /// VX-form vector: target and two sources. The A field doubles as an
    /// immediate in the splat/convert forms.
    pub fn vx_form(instr: u32) -> (u32, u32, u32) {
        (
            (instr >> 21) & 0x1F,
            (instr >> 16) & 0x1F,
            (instr >> 11) & 0x1F,
        )
    }

    /// CR field designator in compare and CR-move forms.
    pub fn crfd(instr: u32) -> u32 {
        (instr >> 23) & 0x7
    }

    /// SPR number: the two halves of the split field swapped into place.
    pub fn spr_index(instr: u32) -> u32 {
        ((instr >> 16) & 0x1F) | (((instr >> 11) & 0x1F) << 5)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primary_only_keys() {
        // addi r3, r0, 5
        assert_eq!(Decoder::opcode_key(0x3860_0005), (14, 0));
        // stw r3, 0(r1)
        assert_eq!(Decoder::opcode_key(0x9061_0000), (36, 0));
    }

    #[test]
    fn extended_keys_for_31_and_19() {
        // add r3, r4, r5 = 31/266
        assert_eq!(Decoder::opcode_key(0x7C64_2A14), (31, 266));
        // blr = bclr 19/16
        assert_eq!(Decoder::opcode_key(0x4E80_0020), (19, 16));
        // addo keys on xo | 512
        assert_eq!(Decoder::opcode_key(0x7C64_2E14), (31, 778));
    }

    #[test]
    fn vector_keys_split_va_and_vx() {
        // vspltisw v0, 3 is VX 908
        assert_eq!(Decoder::opcode_key(0x1003_038C), (4, 908));
        // vadduwm v1, v0, v0 is VX 128
        assert_eq!(Decoder::opcode_key(0x1020_0080), (4, 128));
        // vperm vD,vA,vB,vC is VA 43
        assert_eq!(Decoder::opcode_key(0x1000_002B), (4, 43));
    }

    #[test]
    fn branch_displacements_sign_extend() {
        // b -4
        let (li, aa, lk) = Decoder::i_form(0x4BFF_FFFC);
        assert_eq!(li, -4);
        assert!(!aa && !lk);
        // bne +8 keeps a positive displacement
        let (_, _, bd, _, _) = Decoder::b_form(0x4082_0008);
        assert_eq!(bd, 8);
    }

    #[test]
    fn spr_field_is_split_swapped() {
        // mtspr 8 (LR), r0 = 0x7C0803A6
        assert_eq!(Decoder::spr_index(0x7C08_03A6), 8);
        // mfspr r0, 9 (CTR)
        assert_eq!(Decoder::spr_index(0x7C09_02A6), 9);
    }
}
