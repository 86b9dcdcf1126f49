//! PPU driver core: session gate, offset-addressed VRAM writes, and the
//! pull-model present/completion cycle.

use core::sync::atomic::{fence, Ordering};

use platform::{
    Admission, BusAddr, CopyFault, DmaRegion, DoubleBuffer, OwnershipGate, RegionError,
    RegisterBus,
};
use thiserror_no_std::Error;

use crate::regs::{
    CMD_SET_BGCOLOR, CMD_SET_BGSCROLL, CMD_SET_ENABLE, CMD_SET_FGSCROLL, CMD_UPDATE, COLOR_24MASK,
    REG_BGCOLOR, REG_BGSCROLL, REG_DMA_ADDR, REG_ENABLE, REG_FGSCROLL, VRAM_SIZE,
};

/// Fatal bring-up failures. The driver does not start without a usable
/// VRAM region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpError {
    /// The coherent allocation for the VRAM pair is unusable.
    #[error("VRAM allocation failed: {0}")]
    Allocation(#[from] RegionError),
    /// The allocation does not split into two full VRAM images.
    #[error("VRAM halves must be exactly one VRAM image")]
    WrongRegionSize,
}

/// Errors surfaced by PPU session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PpuError {
    /// Another session owns the device; retry after it closes.
    #[error("device is owned by another session")]
    AlreadyOwned,
    /// The operation requires an open session.
    #[error("operation requires an open session")]
    NotOwned,
    /// A frame transfer is in flight, or another caller holds the copy
    /// lock. Transient: this is the pull-model back-pressure signal —
    /// retry until accepted.
    #[error("frame transfer in flight or write in progress")]
    Busy,
    /// The write's offset range does not fit within VRAM. Rejected, not
    /// clamped; no state was touched.
    #[error("write exceeds the VRAM bounds")]
    OutOfBounds,
    /// The copy source faulted mid-copy. The targeted VRAM range has
    /// been zeroed so a torn copy is never presented as a valid frame.
    #[error("copy source faulted; target range zeroed")]
    SourceFault,
    /// Unrecognized configuration command; no side effects occurred.
    #[error("unrecognized configuration command")]
    InvalidCommand,
}

/// Tile render layer selector for scroll control.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Layer {
    /// Background tile layer.
    Bg,
    /// Foreground tile layer.
    Fg,
}

/// The PPU device instance.
///
/// One value per device, created at bring-up and torn down at removal.
/// Shared between the synchronous caller path and the completion
/// interrupt glue; every cross-context flag is an atomic.
pub struct Ppu<B> {
    bus: B,
    gate: OwnershipGate,
    admission: Admission,
    vram: DoubleBuffer,
}

impl<B> core::fmt::Debug for Ppu<B> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Ppu").finish_non_exhaustive()
    }
}

impl<B: RegisterBus> Ppu<B> {
    /// Bring up the device over an already-validated DMA region.
    ///
    /// The region's halves must be exactly [`VRAM_SIZE`] bytes.
    pub fn new(bus: B, region: DmaRegion) -> Result<Self, BringUpError> {
        if region.half_size() != VRAM_SIZE {
            return Err(BringUpError::WrongRegionSize);
        }
        Ok(Self {
            bus,
            gate: OwnershipGate::new(),
            admission: Admission::new(),
            vram: DoubleBuffer::new(region),
        })
    }

    /// Bring up the device from raw coherent storage and its bus
    /// address.
    pub fn bring_up(
        bus: B,
        mem: &'static mut [u8],
        bus_addr: BusAddr,
    ) -> Result<Self, BringUpError> {
        let region = DmaRegion::new(mem, bus_addr)?;
        Self::new(bus, region)
    }

    /// Open an exclusive session on the device.
    pub fn open(&self) -> Result<(), PpuError> {
        self.gate.acquire().map_err(|_| PpuError::AlreadyOwned)
    }

    /// Close the session: disable rendering and free the gate.
    ///
    /// An in-flight frame transfer is allowed to finish — the VRAM
    /// region stays valid until device removal.
    pub fn close(&self) {
        self.bus.write_register(REG_ENABLE, 0);
        let _ = self.gate.release();
    }

    /// Out-of-band configuration, ioctl-style.
    ///
    /// Recognizes the five PPU commands (present, bg/fg scroll, bg
    /// color, enable); anything else fails without side effects.
    /// Register-writing commands serialize against in-progress VRAM
    /// copies via the copy lock and fail with [`PpuError::Busy`] when
    /// contended.
    pub fn configure(&self, command: u32, param: u32) -> Result<(), PpuError> {
        if !self.gate.is_held() {
            return Err(PpuError::NotOwned);
        }
        match command {
            CMD_UPDATE => return self.present(),
            CMD_SET_BGSCROLL | CMD_SET_FGSCROLL | CMD_SET_BGCOLOR | CMD_SET_ENABLE => {}
            _ => return Err(PpuError::InvalidCommand),
        }

        let Some(_copy) = self.admission.try_lock_copy() else {
            return Err(PpuError::Busy);
        };
        match command {
            CMD_SET_BGSCROLL => self.bus.write_register(REG_BGSCROLL, param),
            CMD_SET_FGSCROLL => self.bus.write_register(REG_FGSCROLL, param),
            CMD_SET_BGCOLOR => self.bus.write_register(REG_BGCOLOR, param & COLOR_24MASK),
            // Guarded by the match above.
            _ => self.bus.write_register(REG_ENABLE, param),
        }
        Ok(())
    }

    /// Set the scroll position of a tile layer.
    pub fn set_scroll(&self, layer: Layer, x: u16, y: u16) -> Result<(), PpuError> {
        let cmd = match layer {
            Layer::Bg => CMD_SET_BGSCROLL,
            Layer::Fg => CMD_SET_FGSCROLL,
        };
        self.configure(cmd, crate::regs::pack_scroll(x, y))
    }

    /// Set the universal background color (24-bit RGB; upper byte
    /// ignored).
    pub fn set_bg_color(&self, rgb: u32) -> Result<(), PpuError> {
        self.configure(CMD_SET_BGCOLOR, rgb)
    }

    /// Enable or disable rendering.
    pub fn set_enable(&self, enable: bool) -> Result<(), PpuError> {
        self.configure(CMD_SET_ENABLE, u32::from(enable))
    }

    /// Write `data` into the software-owned VRAM half at `offset`.
    ///
    /// Bounds-checked against [`VRAM_SIZE`]; many sub-region writes
    /// compose one frame, so this does not consume the submission
    /// window — but while a presented frame is still being transferred
    /// the VRAM is locked and writes fail with [`PpuError::Busy`].
    pub fn write_at(&self, offset: usize, data: &[u8]) -> Result<(), PpuError> {
        self.write_at_with(offset, data.len(), |dst| {
            dst.copy_from_slice(data);
            Ok(())
        })
    }

    /// Offset write through a fallible fill step (a copy source that may
    /// fault). On fault the targeted range is zeroed; the submission
    /// window is not involved.
    pub fn write_at_with<F>(&self, offset: usize, len: usize, fill: F) -> Result<(), PpuError>
    where
        F: FnOnce(&mut [u8]) -> Result<(), CopyFault>,
    {
        if !self.gate.is_held() {
            return Err(PpuError::NotOwned);
        }
        let end = offset.checked_add(len).ok_or(PpuError::OutOfBounds)?;
        if end > VRAM_SIZE {
            return Err(PpuError::OutOfBounds);
        }

        let Some(_copy) = self.admission.try_lock_copy() else {
            return Err(PpuError::Busy);
        };
        // VRAM stays locked from present until the completion IRQ.
        if !self.admission.window_open() {
            return Err(PpuError::Busy);
        }

        // SAFETY: the copy lock is held and roles flip only in
        // `present`, which also requires the copy lock.
        let vram = unsafe { self.vram.passive_mut() };
        let Some(dst) = vram.get_mut(offset..end) else {
            return Err(PpuError::OutOfBounds);
        };
        if fill(dst).is_err() {
            dst.fill(0);
            return Err(PpuError::SourceFault);
        }

        // Changes must be observable before any later DMA_ADDR publish.
        fence(Ordering::Release);
        Ok(())
    }

    /// Present the composed frame: arm the DMA transfer of the
    /// software-owned VRAM half and hand it to hardware.
    ///
    /// Consumes the submission window; until the completion interrupt
    /// re-grants it, further `present` and `write_at` calls fail with
    /// [`PpuError::Busy`]. Retrying until accepted is the pull-model
    /// contract and doubles as refresh synchronization.
    pub fn present(&self) -> Result<(), PpuError> {
        if !self.gate.is_held() {
            return Err(PpuError::NotOwned);
        }
        let Some(_copy) = self.admission.try_lock_copy() else {
            return Err(PpuError::Busy);
        };
        if !self.admission.try_consume_window() {
            return Err(PpuError::Busy);
        }

        // Frame contents must be observable by the DMA engine before
        // the source address is advertised.
        fence(Ordering::Release);
        self.bus
            .write_register(REG_DMA_ADDR, self.vram.passive_bus_addr().get());
        // Flip-on-arm: the presented half is hardware's from here on.
        self.vram.flip();
        Ok(())
    }

    /// Completion path, invoked by the interrupt glue when the frame
    /// transfer has finished and the PPU can accept a new source
    /// address.
    ///
    /// Re-opens the submission window, unlocking VRAM writes and the
    /// next present. No registers are touched: reading the frame
    /// dropped the IRQ condition on the hardware side, and there is no
    /// push notification — the producer discovers the grant by
    /// retrying.
    pub fn handle_completion(&self) {
        self.admission.grant();
    }

    /// Index of the hardware-owned VRAM half (test/diagnostic hook).
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.vram.active_index()
    }

    /// Whether a present would currently be admitted.
    #[must_use]
    pub fn ready_for_frame(&self) -> bool {
        self.admission.window_open()
    }

    /// The register bus this device writes through.
    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use platform::mocks::MockBus;

    const BUS_BASE: u32 = 0x0400_0000;

    fn ppu() -> Ppu<MockBus> {
        let mem = Box::leak(vec![0u8; VRAM_SIZE * 2].into_boxed_slice());
        Ppu::bring_up(MockBus::new(), mem, BusAddr::new(BUS_BASE)).unwrap()
    }

    fn vram_snapshot(ppu: &Ppu<MockBus>) -> Vec<u8> {
        // SAFETY: tests are single-threaded here; no concurrent copy or
        // flip while the view is live.
        unsafe { ppu.vram.passive_mut().to_vec() }
    }

    #[test]
    fn bring_up_rejects_wrong_region_size() {
        let mem = Box::leak(vec![0u8; VRAM_SIZE].into_boxed_slice());
        let err = Ppu::bring_up(MockBus::new(), mem, BusAddr::new(0x1000)).unwrap_err();
        assert_eq!(err, BringUpError::WrongRegionSize);
    }

    #[test]
    fn open_is_exclusive_until_close() {
        let ppu = ppu();
        ppu.open().unwrap();
        assert_eq!(ppu.open(), Err(PpuError::AlreadyOwned));
        ppu.close();
        ppu.open().unwrap();
    }

    #[test]
    fn close_disables_rendering() {
        let ppu = ppu();
        ppu.open().unwrap();
        ppu.set_enable(true).unwrap();
        ppu.close();
        assert_eq!(ppu.bus.last_write_to(REG_ENABLE), Some(0));
    }

    #[test]
    fn writes_land_at_their_offset() {
        let ppu = ppu();
        ppu.open().unwrap();

        ppu.write_at(0x100, &[0xAB; 4]).unwrap();
        ppu.write_at(VRAM_SIZE - 2, &[0xCD; 2]).unwrap();

        let vram = vram_snapshot(&ppu);
        assert_eq!(&vram[0x100..0x104], &[0xAB; 4]);
        assert_eq!(&vram[VRAM_SIZE - 2..], &[0xCD; 2]);
        assert!(ppu.bus.writes().is_empty(), "writes must not touch registers");
    }

    #[test]
    fn out_of_bounds_writes_are_rejected_not_clamped() {
        let ppu = ppu();
        ppu.open().unwrap();

        assert_eq!(
            ppu.write_at(VRAM_SIZE - 1, &[0u8; 2]),
            Err(PpuError::OutOfBounds)
        );
        assert_eq!(ppu.write_at(VRAM_SIZE, &[0u8; 1]), Err(PpuError::OutOfBounds));
        assert_eq!(
            ppu.write_at(usize::MAX, &[0u8; 2]),
            Err(PpuError::OutOfBounds)
        );
        assert!(vram_snapshot(&ppu).iter().all(|&b| b == 0));
    }

    #[test]
    fn present_publishes_the_composed_half_and_flips() {
        let ppu = ppu();
        ppu.open().unwrap();

        ppu.write_at(0, &[1, 2, 3]).unwrap();
        assert_eq!(ppu.active_index(), 0);
        ppu.present().unwrap();

        // Buffer 0 was active, so the frame was composed in half 1.
        assert_eq!(
            ppu.bus.last_write_to(REG_DMA_ADDR),
            Some(BUS_BASE + VRAM_SIZE as u32)
        );
        assert_eq!(ppu.active_index(), 1);
        assert!(!ppu.ready_for_frame());
    }

    #[test]
    fn vram_is_locked_while_a_frame_is_in_flight() {
        let ppu = ppu();
        ppu.open().unwrap();

        ppu.present().unwrap();
        assert_eq!(ppu.write_at(0, &[1u8]), Err(PpuError::Busy));
        assert_eq!(ppu.present(), Err(PpuError::Busy));

        ppu.handle_completion();
        ppu.write_at(0, &[1u8]).unwrap();
        ppu.present().unwrap();
    }

    #[test]
    fn published_addresses_strictly_alternate_across_frames() {
        let ppu = ppu();
        ppu.open().unwrap();

        let half = VRAM_SIZE as u32;
        let mut last_index = ppu.active_index();
        for frame in 0..6 {
            ppu.present().unwrap();
            let now = ppu.active_index();
            assert_ne!(now, last_index, "active index repeated at frame {frame}");
            last_index = now;

            let expected = if frame % 2 == 0 { BUS_BASE + half } else { BUS_BASE };
            assert_eq!(ppu.bus.last_write_to(REG_DMA_ADDR), Some(expected));
            ppu.handle_completion();
        }
    }

    #[test]
    fn completion_touches_no_registers() {
        let ppu = ppu();
        ppu.open().unwrap();
        ppu.present().unwrap();
        ppu.bus.clear();

        ppu.handle_completion();
        assert!(ppu.bus.writes().is_empty());
        assert!(ppu.ready_for_frame());
    }

    #[test]
    fn faulting_source_zeroes_the_target_range_only() {
        let ppu = ppu();
        ppu.open().unwrap();

        ppu.write_at(0, &[0x77; 16]).unwrap();
        let err = ppu
            .write_at_with(4, 8, |_dst| Err(CopyFault))
            .unwrap_err();
        assert_eq!(err, PpuError::SourceFault);

        let vram = vram_snapshot(&ppu);
        assert_eq!(&vram[0..4], &[0x77; 4]);
        assert_eq!(&vram[4..12], &[0u8; 8]);
        assert_eq!(&vram[12..16], &[0x77; 4]);
        // The window was never consumed; composing can continue.
        ppu.write_at(4, &[0x11; 8]).unwrap();
        ppu.present().unwrap();
    }

    #[test]
    fn scroll_color_and_enable_reach_their_registers() {
        let ppu = ppu();
        ppu.open().unwrap();

        ppu.set_scroll(Layer::Bg, 0x0012, 0x0034).unwrap();
        ppu.set_scroll(Layer::Fg, 0x0056, 0x0078).unwrap();
        ppu.set_bg_color(0xFF12_3456).unwrap();
        ppu.set_enable(true).unwrap();

        assert_eq!(ppu.bus.last_write_to(REG_BGSCROLL), Some(0x0034_0012));
        assert_eq!(ppu.bus.last_write_to(REG_FGSCROLL), Some(0x0078_0056));
        assert_eq!(
            ppu.bus.last_write_to(REG_BGCOLOR),
            Some(0x0012_3456),
            "background color must be masked to 24 bits"
        );
        assert_eq!(ppu.bus.last_write_to(REG_ENABLE), Some(1));
    }

    #[test]
    fn unrecognized_command_has_no_side_effects() {
        let ppu = ppu();
        ppu.open().unwrap();
        assert_eq!(ppu.configure(99, 1), Err(PpuError::InvalidCommand));
        assert!(ppu.bus.writes().is_empty());
        assert!(ppu.ready_for_frame());
    }

    #[test]
    fn operations_require_an_open_session() {
        let ppu = ppu();
        assert_eq!(ppu.write_at(0, &[0u8]), Err(PpuError::NotOwned));
        assert_eq!(ppu.present(), Err(PpuError::NotOwned));
        assert_eq!(ppu.set_enable(true), Err(PpuError::NotOwned));
    }

    #[test]
    fn concurrent_presents_admit_exactly_one() {
        use std::sync::Arc;

        let ppu = Arc::new(ppu());
        ppu.open().unwrap();

        let barrier = Arc::new(std::sync::Barrier::new(2));
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let ppu = Arc::clone(&ppu);
                let barrier = Arc::clone(&barrier);
                std::thread::spawn(move || {
                    barrier.wait();
                    ppu.present()
                })
            })
            .collect();

        let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        let oks = results.iter().filter(|r| r.is_ok()).count();
        let busys = results
            .iter()
            .filter(|r| matches!(r, Err(PpuError::Busy)))
            .count();
        assert_eq!((oks, busys), (1, 1));
        assert_eq!(ppu.bus.writes_to(REG_DMA_ADDR), 1);
    }
}
