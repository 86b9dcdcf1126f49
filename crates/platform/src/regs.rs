//! Write-only MMIO register bus.
//!
//! Both FPGC peripherals expose a small block of memory-mapped control
//! registers that the CPU only ever writes — device state is mirrored on
//! the driver side, never read back. [`RegisterBus`] is the seam the
//! drivers are generic over: hardware builds hand them an [`Mmio`]
//! pointed at the peripheral's control block, host tests hand them a
//! recording mock.

use core::ptr::write_volatile;

/// A fixed-size block of write-only memory-mapped control registers.
///
/// Implementations must tolerate being called from both the synchronous
/// caller path and the hardware-completion path; a register write must
/// never block.
pub trait RegisterBus {
    /// Write `value` to the register at byte offset `offset` from the
    /// block's base.
    fn write_register(&self, offset: usize, value: u32);
}

// Blanket impl so drivers can hold either an owned bus or a shared one.
impl<B: RegisterBus> RegisterBus for &B {
    fn write_register(&self, offset: usize, value: u32) {
        (*self).write_register(offset, value);
    }
}

/// Volatile MMIO implementation of [`RegisterBus`] for hardware targets.
///
/// All unsafety is consolidated in [`Mmio::new`]; once constructed, every
/// register write is a plain volatile store within the declared span.
/// Offsets outside the span are discarded (the register map constants in
/// the driver crates are the only callers, so a stray offset is a driver
/// bug, not a runtime condition worth faulting on).
pub struct Mmio {
    base: *mut u8,
    span: usize,
}

// SAFETY: Mmio only ever issues volatile stores to a device register
// block. The peripheral serializes them internally; concurrent stores
// from the caller and completion contexts are orthogonal register
// offsets by protocol (enforced by the drivers' admission state).
unsafe impl Send for Mmio {}
// SAFETY: see Send — write_register takes &self and performs a single
// volatile store with no driver-side shared state.
unsafe impl Sync for Mmio {}

impl Mmio {
    /// Create a register bus over the `span` bytes at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + span` must be a mapped, uncached (or write-combined)
    /// device register region, valid for volatile 32-bit stores for the
    /// lifetime of the returned value, and not aliased by any other
    /// writer outside this driver.
    #[must_use]
    pub unsafe fn new(base: *mut u8, span: usize) -> Self {
        Self { base, span }
    }
}

impl RegisterBus for Mmio {
    fn write_register(&self, offset: usize, value: u32) {
        let Some(end) = offset.checked_add(core::mem::size_of::<u32>()) else {
            return;
        };
        if end > self.span {
            return;
        }
        // SAFETY: offset + 4 <= span, and the constructor contract
        // guarantees the whole span is valid for volatile stores.
        unsafe {
            let addr = self.base.add(offset).cast::<u32>();
            write_volatile(addr, value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mmio_writes_land_at_offset() {
        let mut block = [0u32; 8];
        // SAFETY: block is a local array, valid for the whole test.
        let mmio = unsafe { Mmio::new(block.as_mut_ptr().cast(), 32) };

        mmio.write_register(0x00, 0xDEAD_BEEF);
        mmio.write_register(0x10, 0x1234_5678);

        assert_eq!(block[0], 0xDEAD_BEEF);
        assert_eq!(block[4], 0x1234_5678);
    }

    #[test]
    fn mmio_discards_out_of_span_writes() {
        let mut block = [0u32; 2];
        // SAFETY: block is a local array, valid for the whole test.
        let mmio = unsafe { Mmio::new(block.as_mut_ptr().cast(), 8) };

        mmio.write_register(0x08, 0xFFFF_FFFF);
        mmio.write_register(usize::MAX, 0xFFFF_FFFF);

        assert_eq!(block, [0, 0]);
    }
}
