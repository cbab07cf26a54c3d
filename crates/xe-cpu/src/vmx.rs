//! 128-bit vector register representation
//!
//! A vector register is sixteen bytes in guest (big-endian) order. Lane
//! views pack and unpack explicitly through `from_be_bytes`/`to_be_bytes`
//! so lane numbering matches the ISA on any host: lane 0 is always the
//! most significant element.

/// One VMX register. Byte 0 is the most significant byte.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VectorRegister {
    bytes: [u8; 16],
}

impl VectorRegister {
    pub const ZERO: Self = Self { bytes: [0; 16] };

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self { bytes }
    }

    pub fn bytes(&self) -> [u8; 16] {
        self.bytes
    }

    pub fn byte(&self, lane: usize) -> u8 {
        self.bytes[lane]
    }

    pub fn set_byte(&mut self, lane: usize, value: u8) {
        self.bytes[lane] = value;
    }

    pub fn as_u16x8(&self) -> [u16; 8] {
        let mut out = [0u16; 8];
        for (lane, chunk) in self.bytes.chunks_exact(2).enumerate() {
            out[lane] = u16::from_be_bytes([chunk[0], chunk[1]]);
        }
        out
    }

    pub fn set_u16x8(&mut self, lanes: [u16; 8]) {
        for (chunk, lane) in self.bytes.chunks_exact_mut(2).zip(lanes) {
            chunk.copy_from_slice(&lane.to_be_bytes());
        }
    }

    pub fn as_u32x4(&self) -> [u32; 4] {
        let mut out = [0u32; 4];
        for (lane, chunk) in self.bytes.chunks_exact(4).enumerate() {
            out[lane] = u32::from_be_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        }
        out
    }

    pub fn set_u32x4(&mut self, lanes: [u32; 4]) {
        for (chunk, lane) in self.bytes.chunks_exact_mut(4).zip(lanes) {
            chunk.copy_from_slice(&lane.to_be_bytes());
        }
    }

    pub fn as_u64x2(&self) -> [u64; 2] {
        let mut out = [0u64; 2];
        for (lane, chunk) in self.bytes.chunks_exact(8).enumerate() {
            let mut b = [0u8; 8];
            b.copy_from_slice(chunk);
            out[lane] = u64::from_be_bytes(b);
        }
        out
    }

    pub fn set_u64x2(&mut self, lanes: [u64; 2]) {
        for (chunk, lane) in self.bytes.chunks_exact_mut(8).zip(lanes) {
            chunk.copy_from_slice(&lane.to_be_bytes());
        }
    }

    pub fn as_f32x4(&self) -> [f32; 4] {
        let words = self.as_u32x4();
        [
            f32::from_bits(words[0]),
            f32::from_bits(words[1]),
            f32::from_bits(words[2]),
            f32::from_bits(words[3]),
        ]
    }

    pub fn set_f32x4(&mut self, lanes: [f32; 4]) {
        self.set_u32x4([
            lanes[0].to_bits(),
            lanes[1].to_bits(),
            lanes[2].to_bits(),
            lanes[3].to_bits(),
        ]);
    }

    pub fn as_f64x2(&self) -> [f64; 2] {
        let words = self.as_u64x2();
        [f64::from_bits(words[0]), f64::from_bits(words[1])]
    }

    pub fn set_f64x2(&mut self, lanes: [f64; 2]) {
        self.set_u64x2([lanes[0].to_bits(), lanes[1].to_bits()]);
    }

    /// Whole-register view, for 128-bit shifts.
    pub fn as_u128(&self) -> u128 {
        u128::from_be_bytes(self.bytes)
    }

    pub fn set_u128(&mut self, value: u128) {
        self.bytes = value.to_be_bytes();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_zero_is_most_significant() {
        let mut v = VectorRegister::ZERO;
        v.set_u32x4([0x0102_0304, 0, 0, 0]);
        assert_eq!(v.byte(0), 0x01);
        assert_eq!(v.byte(3), 0x04);
        assert_eq!(v.as_u16x8()[0], 0x0102);
        assert_eq!(v.as_u64x2()[0], 0x0102_0304_0000_0000);
    }

    #[test]
    fn float_lanes_round_trip_bits() {
        let mut v = VectorRegister::ZERO;
        v.set_f32x4([1.5, -2.0, 0.0, f32::INFINITY]);
        let lanes = v.as_f32x4();
        assert_eq!(lanes[0], 1.5);
        assert_eq!(lanes[1], -2.0);
        assert!(lanes[3].is_infinite());
        assert_eq!(v.as_u32x4()[0], 1.5f32.to_bits());
    }

    #[test]
    fn u128_view_matches_bytes() {
        let v = VectorRegister::from_bytes([
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xAA, 0xBB, 0xCC, 0xDD,
            0xEE, 0xFF,
        ]);
        assert_eq!(v.as_u128() >> 120, 0x00);
        assert_eq!(v.as_u128() & 0xFF, 0xFF);
    }
}
