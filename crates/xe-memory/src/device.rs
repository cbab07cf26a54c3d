//! Memory device backends
//!
//! A `MemoryDevice` is the only contract the CPU/MMU core requires from a
//! backing store: bulk byte access plus typed big-endian accessors. The
//! multi-byte accessors always assemble MSB-first regardless of host
//! endianness, because the guest is big-endian.

use parking_lot::RwLock;
use xe_core::error::MemoryError;

/// Abstract backing store behind a mapped region.
///
/// All offsets are device-local (already translated by the MMU).
/// Implementations use interior mutability so the MMU can serve accesses
/// through a shared `Arc<dyn MemoryDevice>`.
pub trait MemoryDevice: Send + Sync {
    /// Device name, used in mapping/diagnostic logs.
    fn name(&self) -> &str;

    /// Backing store size in bytes.
    fn len(&self) -> u64;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bulk read into `buf`.
    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), MemoryError>;

    /// Bulk write from `data`.
    fn write(&self, offset: u64, data: &[u8]) -> Result<(), MemoryError>;

    /// Fill `len` bytes with `value`.
    fn fill(&self, offset: u64, value: u8, len: u64) -> Result<(), MemoryError>;

    /// Raw pointer into device storage for zero-copy access.
    ///
    /// The device must outlive any pointer handed out here; nothing about
    /// ownership is transferred. Writes through the pointer race with
    /// concurrent device access.
    fn as_ptr(&self, offset: u64) -> Result<*mut u8, MemoryError>;

    fn read8(&self, offset: u64) -> Result<u8, MemoryError> {
        let mut b = [0u8; 1];
        self.read(offset, &mut b)?;
        Ok(b[0])
    }

    fn read16(&self, offset: u64) -> Result<u16, MemoryError> {
        let mut b = [0u8; 2];
        self.read(offset, &mut b)?;
        Ok(u16::from_be_bytes(b))
    }

    fn read32(&self, offset: u64) -> Result<u32, MemoryError> {
        let mut b = [0u8; 4];
        self.read(offset, &mut b)?;
        Ok(u32::from_be_bytes(b))
    }

    fn read64(&self, offset: u64) -> Result<u64, MemoryError> {
        let mut b = [0u8; 8];
        self.read(offset, &mut b)?;
        Ok(u64::from_be_bytes(b))
    }

    fn write8(&self, offset: u64, value: u8) -> Result<(), MemoryError> {
        self.write(offset, &[value])
    }

    fn write16(&self, offset: u64, value: u16) -> Result<(), MemoryError> {
        self.write(offset, &value.to_be_bytes())
    }

    fn write32(&self, offset: u64, value: u32) -> Result<(), MemoryError> {
        self.write(offset, &value.to_be_bytes())
    }

    fn write64(&self, offset: u64, value: u64) -> Result<(), MemoryError> {
        self.write(offset, &value.to_be_bytes())
    }
}

fn check_range(len: u64, offset: u64, count: u64) -> Result<(), MemoryError> {
    if offset.checked_add(count).map_or(true, |end| end > len) {
        return Err(MemoryError::OutOfBounds {
            addr: offset,
            len: count,
        });
    }
    Ok(())
}

/// Flat RAM device: a contiguous, bounds-checked byte array.
pub struct RamDevice {
    name: String,
    data: RwLock<Vec<u8>>,
}

impl RamDevice {
    pub fn new(name: &str, size: u64) -> Self {
        tracing::info!(target: "mmu", "[{}] initialized: {} bytes", name, size);
        Self {
            name: name.to_owned(),
            data: RwLock::new(vec![0; size as usize]),
        }
    }
}

impl MemoryDevice for RamDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.data.read().len() as u64
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let data = self.data.read();
        check_range(data.len() as u64, offset, buf.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&data[start..start + buf.len()]);
        Ok(())
    }

    fn write(&self, offset: u64, src: &[u8]) -> Result<(), MemoryError> {
        let mut data = self.data.write();
        check_range(data.len() as u64, offset, src.len() as u64)?;
        let start = offset as usize;
        data[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn fill(&self, offset: u64, value: u8, len: u64) -> Result<(), MemoryError> {
        let mut data = self.data.write();
        check_range(data.len() as u64, offset, len)?;
        let start = offset as usize;
        data[start..start + len as usize].fill(value);
        Ok(())
    }

    fn as_ptr(&self, offset: u64) -> Result<*mut u8, MemoryError> {
        let data = self.data.read();
        check_range(data.len() as u64, offset, 1)?;
        // data_ptr bypasses the lock; callers take on the aliasing caveat
        // documented on the trait.
        unsafe { Ok((*self.data.data_ptr()).as_mut_ptr().add(offset as usize)) }
    }
}

/// MMIO framebuffer device: the byte-level contract of `RamDevice` over a
/// BGRA pixel buffer. Drawing and window presentation live outside the
/// core; the CPU only ever sees bytes.
pub struct FramebufferDevice {
    name: String,
    width: u32,
    height: u32,
    pixels: RwLock<Vec<u8>>,
}

impl FramebufferDevice {
    pub fn new(name: &str, width: u32, height: u32) -> Self {
        let size = width as usize * height as usize * 4;
        tracing::info!(target: "mmu", "[{}] framebuffer {}x{} ({} bytes)", name, width, height, size);
        Self {
            name: name.to_owned(),
            width,
            height,
            pixels: RwLock::new(vec![0; size]),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Packed BGRA pixel at (x, y); used by host-side presentation.
    pub fn pixel(&self, x: u32, y: u32) -> Option<u32> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let idx = (y as usize * self.width as usize + x as usize) * 4;
        let pixels = self.pixels.read();
        Some(u32::from_be_bytes([
            pixels[idx],
            pixels[idx + 1],
            pixels[idx + 2],
            pixels[idx + 3],
        ]))
    }

    /// Copy of the whole pixel buffer for blitting.
    pub fn snapshot(&self) -> Vec<u8> {
        self.pixels.read().clone()
    }
}

impl MemoryDevice for FramebufferDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> u64 {
        self.pixels.read().len() as u64
    }

    fn read(&self, offset: u64, buf: &mut [u8]) -> Result<(), MemoryError> {
        let pixels = self.pixels.read();
        check_range(pixels.len() as u64, offset, buf.len() as u64)?;
        let start = offset as usize;
        buf.copy_from_slice(&pixels[start..start + buf.len()]);
        Ok(())
    }

    fn write(&self, offset: u64, src: &[u8]) -> Result<(), MemoryError> {
        let mut pixels = self.pixels.write();
        check_range(pixels.len() as u64, offset, src.len() as u64)?;
        let start = offset as usize;
        pixels[start..start + src.len()].copy_from_slice(src);
        Ok(())
    }

    fn fill(&self, offset: u64, value: u8, len: u64) -> Result<(), MemoryError> {
        let mut pixels = self.pixels.write();
        check_range(pixels.len() as u64, offset, len)?;
        let start = offset as usize;
        pixels[start..start + len as usize].fill(value);
        Ok(())
    }

    fn as_ptr(&self, offset: u64) -> Result<*mut u8, MemoryError> {
        let pixels = self.pixels.read();
        check_range(pixels.len() as u64, offset, 1)?;
        unsafe { Ok((*self.pixels.data_ptr()).as_mut_ptr().add(offset as usize)) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ram_round_trip() {
        let ram = RamDevice::new("RAM", 0x1000);
        ram.write32(0x10, 0xDEADBEEF).unwrap();
        assert_eq!(ram.read32(0x10).unwrap(), 0xDEADBEEF);
        // Big-endian layout: MSB first.
        assert_eq!(ram.read8(0x10).unwrap(), 0xDE);
        assert_eq!(ram.read8(0x13).unwrap(), 0xEF);
    }

    #[test]
    fn ram_bounds_checked() {
        let ram = RamDevice::new("RAM", 0x100);
        assert!(matches!(
            ram.read32(0xFE),
            Err(MemoryError::OutOfBounds { .. })
        ));
        assert!(ram.write8(0xFF, 1).is_ok());
        assert!(ram.write8(0x100, 1).is_err());
    }

    #[test]
    fn ram_fill() {
        let ram = RamDevice::new("RAM", 0x100);
        ram.fill(0, 0xAB, 8).unwrap();
        assert_eq!(ram.read64(0).unwrap(), 0xABAB_ABAB_ABAB_ABAB);
        assert_eq!(ram.read8(8).unwrap(), 0);
    }

    #[test]
    fn framebuffer_pixels_via_bytes() {
        let fb = FramebufferDevice::new("FB", 4, 4);
        fb.write32(0, 0x11223344).unwrap();
        assert_eq!(fb.pixel(0, 0), Some(0x11223344));
        fb.write32((3 * 4 + 2) as u64 * 4, 0xCAFEBABE).unwrap();
        assert_eq!(fb.pixel(2, 3), Some(0xCAFEBABE));
        assert_eq!(fb.pixel(4, 0), None);
    }
}
