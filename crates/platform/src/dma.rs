//! DMA region and double-buffer management.
//!
//! Each streaming peripheral consumes fixed-size buffers out of one
//! contiguous, coherent allocation that is visible to the CPU by virtual
//! address and to the peripheral's DMA engine by bus address. The
//! allocation is sized for exactly two buffers: at any instant one half
//! is *active* (owned by hardware, never written by software) and the
//! other is *passive* (owned by software, never read by hardware).
//!
//! The backing storage is handed in as `&'static mut [u8]` — the region
//! must outlive any DMA the peripheral could still be performing, and on
//! these devices there is no mid-transfer abort, so the storage lives
//! from bring-up to device removal.

use core::slice;
use core::sync::atomic::{AtomicUsize, Ordering};

use thiserror_no_std::Error;

/// The address form the peripheral's DMA engine uses to reference
/// memory, as opposed to the CPU-side virtual address of the same bytes.
///
/// This is the only thing ever handed to hardware.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusAddr(u32);

impl BusAddr {
    /// Wrap a raw bus address.
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw address value, as written to an address register.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// A `#[repr(align(32))]` wrapper that enforces cacheline alignment for
/// DMA-accessible buffers.
///
/// The FPGC's hard processor system has a 32-byte cacheline; a buffer
/// shared with a DMA engine must not straddle a cacheline with unrelated
/// CPU data, or cache maintenance on the neighbour corrupts the
/// transfer. Declare backing storage through this wrapper:
///
/// ```ignore
/// static mut SAMPLE_MEM: Align32<[u8; 1024]> = Align32([0u8; 1024]);
/// ```
#[derive(Clone, Copy)]
#[repr(align(32))]
pub struct Align32<T>(
    /// The inner value. Public so callers can construct and destructure
    /// the wrapper.
    pub T,
);

/// Reasons a DMA region is unusable at bring-up.
///
/// All of these are fatal: the driver does not start without a valid
/// region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegionError {
    /// The backing storage is empty or has an odd length and cannot be
    /// split into two equal halves.
    #[error("backing storage cannot be split into two equal halves")]
    BadLength,
    /// The bus address is not 32-bit aligned.
    #[error("bus address is not 4-byte aligned")]
    Misaligned,
    /// The bus address range wraps the 32-bit address space.
    #[error("bus address range exceeds the 32-bit address space")]
    BusRange,
}

/// One coherent allocation of `2 × SIZE` bytes plus its bus address.
///
/// Created once at device bring-up and consumed by [`DoubleBuffer::new`];
/// the `'static` bound on the storage models the lifetime invariant that
/// the memory is never reclaimed while the device might still DMA from
/// it.
#[derive(Debug)]
pub struct DmaRegion {
    mem: &'static mut [u8],
    bus: BusAddr,
}

impl DmaRegion {
    /// Validate and wrap a coherent allocation.
    ///
    /// Fails when the storage cannot be split into two equal halves or
    /// when the bus address is unusable; bring-up must treat any error
    /// as fatal.
    #[allow(clippy::arithmetic_side_effects)] // len % 2 and len / 2 on a checked non-zero length
    pub fn new(mem: &'static mut [u8], bus: BusAddr) -> Result<Self, RegionError> {
        if mem.is_empty() || mem.len() % 2 != 0 {
            return Err(RegionError::BadLength);
        }
        if bus.get() % 4 != 0 {
            return Err(RegionError::Misaligned);
        }
        let len = u32::try_from(mem.len()).map_err(|_| RegionError::BusRange)?;
        if bus.get().checked_add(len).is_none() {
            return Err(RegionError::BusRange);
        }
        Ok(Self { mem, bus })
    }

    /// Size in bytes of each buffer half.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // constructor guarantees an even, non-zero length
    pub fn half_size(&self) -> usize {
        self.mem.len() / 2
    }

    /// Bus address of the start of the region.
    #[must_use]
    pub fn bus_addr(&self) -> BusAddr {
        self.bus
    }
}

/// The active/passive buffer pair carved from a [`DmaRegion`].
///
/// `active_index` selects the half currently owned by hardware; the
/// other half is the only memory software may write. [`flip`] is invoked
/// from the completion path (audio) or immediately after a submission is
/// armed (video) — never from the producer's copy path, so software can
/// never scribble on memory the DMA engine is reading.
///
/// [`flip`]: DoubleBuffer::flip
pub struct DoubleBuffer {
    half: [*mut u8; 2],
    bus: [BusAddr; 2],
    size: usize,
    active: AtomicUsize,
}

// SAFETY: the raw half pointers reference the 'static DmaRegion storage.
// Mutable access is only handed out via the unsafe `passive_mut`, whose
// contract (copy lock held, hardware owns only the active half) makes
// cross-context use sound.
unsafe impl Send for DoubleBuffer {}
// SAFETY: see Send; all shared state is the atomic active index.
unsafe impl Sync for DoubleBuffer {}

impl DoubleBuffer {
    /// Partition `region` into the buffer pair. Buffer 0 starts active.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)] // bus + size validated by DmaRegion::new
    pub fn new(region: DmaRegion) -> Self {
        let size = region.half_size();
        let bus = region.bus_addr();
        let (lo, hi) = region.mem.split_at_mut(size);
        Self {
            half: [lo.as_mut_ptr(), hi.as_mut_ptr()],
            bus: [bus, BusAddr::new(bus.get() + size as u32)],
            size,
            active: AtomicUsize::new(0),
        }
    }

    /// Size in bytes of each buffer half — the hard ceiling every
    /// submission is checked against.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Index of the hardware-owned half, `0` or `1`.
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.active.load(Ordering::Acquire) & 1
    }

    /// Bus address of the hardware-owned half.
    #[must_use]
    #[allow(clippy::indexing_slicing)] // index masked to {0, 1}; arrays have length 2
    pub fn active_bus_addr(&self) -> BusAddr {
        self.bus[self.active_index()]
    }

    /// Bus address of the software-owned half — the address advertised
    /// to hardware when a submission is armed.
    #[must_use]
    #[allow(clippy::indexing_slicing)] // index masked to {0, 1}; arrays have length 2
    pub fn passive_bus_addr(&self) -> BusAddr {
        self.bus[self.active_index() ^ 1]
    }

    /// Exchange the active and passive roles.
    ///
    /// Only the completion path (or the arm step in the flip-on-arm
    /// variant) may call this; the producer path never does.
    pub fn flip(&self) {
        self.active.fetch_xor(1, Ordering::AcqRel);
    }

    /// Mutable view of the software-owned half.
    ///
    /// # Safety
    ///
    /// The caller must hold the admission copy lock (so no other caller
    /// holds a passive view) and must not hold the view across a role
    /// flip (so the view never aliases the hardware-owned half).
    #[allow(clippy::mut_from_ref, clippy::indexing_slicing)] // exclusive access per the safety contract; index masked to {0, 1}
    pub unsafe fn passive_mut(&self) -> &mut [u8] {
        let idx = self.active_index() ^ 1;
        // SAFETY: half[idx] points at `size` valid bytes of the region;
        // exclusivity is the caller's contract above.
        unsafe { slice::from_raw_parts_mut(self.half[idx], self.size) }
    }
}
