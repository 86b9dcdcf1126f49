//! APU driver core: session gate, admission-gated submissions, and the
//! completion path.

use core::sync::atomic::{fence, AtomicU32, Ordering};

use platform::{
    Admission, BusAddr, ConsumerId, CopyFault, DmaRegion, DoubleBuffer, Notifier, OwnershipGate,
    RegionError, RegisterBus,
};
use thiserror_no_std::Error;

use crate::regs::{
    CFG_ENABLE, CFG_IRQ_ACK, CFG_IRQ_REQ, CMD_SET_CONSUMER, REG_BUF, REG_CONFIG, SAMPLE_BUF_SIZE,
};

/// Fatal bring-up failures. The driver does not start without a usable
/// DMA region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BringUpError {
    /// The coherent allocation for the buffer pair is unusable.
    #[error("sample buffer allocation failed: {0}")]
    Allocation(#[from] RegionError),
    /// The allocation does not split into two 512-byte sample buffers.
    #[error("sample buffer halves must be exactly 512 bytes")]
    WrongBufferSize,
}

/// Errors surfaced by APU session operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApuError {
    /// Another session owns the device; retry after it closes.
    #[error("device is owned by another session")]
    AlreadyOwned,
    /// The operation requires an open session.
    #[error("operation requires an open session")]
    NotOwned,
    /// The submission window is closed or another write is in progress.
    /// Transient: retry after the next completion.
    #[error("submission window closed or write in progress")]
    Busy,
    /// The payload exceeds the 512-byte sample buffer. Rejected, never
    /// truncated; no state was touched.
    #[error("payload exceeds the sample buffer size")]
    OutOfBounds,
    /// The copy source faulted mid-copy. The passive buffer has been
    /// zeroed and the submission window stays consumed — the hardware
    /// window is forfeited, not retried.
    #[error("copy source faulted; sample buffer zeroed")]
    SourceFault,
    /// Unrecognized configuration command; no side effects occurred.
    #[error("unrecognized configuration command")]
    InvalidCommand,
}

/// The APU device instance.
///
/// One value per device, created at bring-up and torn down at removal.
/// All methods take `&self`: the same instance is shared between the
/// synchronous caller path and the completion interrupt glue, with every
/// cross-context flag held in atomics.
pub struct Apu<B, N> {
    bus: B,
    notifier: N,
    gate: OwnershipGate,
    admission: Admission,
    buffers: DoubleBuffer,
    /// Registered consumer identity; zero means none.
    consumer: AtomicU32,
}

impl<B, N> core::fmt::Debug for Apu<B, N> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Apu").finish_non_exhaustive()
    }
}

impl<B: RegisterBus, N: Notifier> Apu<B, N> {
    /// Bring up the device over an already-validated DMA region.
    ///
    /// The region's halves must be exactly [`SAMPLE_BUF_SIZE`] bytes.
    pub fn new(bus: B, notifier: N, region: DmaRegion) -> Result<Self, BringUpError> {
        if region.half_size() != SAMPLE_BUF_SIZE {
            return Err(BringUpError::WrongBufferSize);
        }
        Ok(Self {
            bus,
            notifier,
            gate: OwnershipGate::new(),
            admission: Admission::new(),
            buffers: DoubleBuffer::new(region),
            consumer: AtomicU32::new(0),
        })
    }

    /// Bring up the device from raw coherent storage and its bus
    /// address.
    pub fn bring_up(
        bus: B,
        notifier: N,
        mem: &'static mut [u8],
        bus_addr: BusAddr,
    ) -> Result<Self, BringUpError> {
        let region = DmaRegion::new(mem, bus_addr)?;
        Self::new(bus, notifier, region)
    }

    /// Open an exclusive session on the device.
    pub fn open(&self) -> Result<(), ApuError> {
        self.gate.acquire().map_err(|_| ApuError::AlreadyOwned)
    }

    /// Close the session: mute output, disable IRQs, free the gate.
    ///
    /// Safe to call defensively — closing an unopened device only logs.
    /// Hardware may still be draining the buffer it holds; that memory
    /// stays valid until device removal, so no abort is needed.
    pub fn close(&self) {
        self.bus.write_register(REG_CONFIG, 0);
        let _ = self.gate.release();
    }

    /// Out-of-band configuration, ioctl-style.
    ///
    /// The APU recognizes exactly one command, [`CMD_SET_CONSUMER`]:
    /// `param` is the consumer identity completion notifications are
    /// delivered to, zero to unregister. Unrecognized commands fail
    /// without side effects.
    pub fn configure(&self, command: u32, param: u32) -> Result<(), ApuError> {
        if !self.gate.is_held() {
            return Err(ApuError::NotOwned);
        }
        match command {
            CMD_SET_CONSUMER => {
                self.consumer.store(param, Ordering::Release);
                Ok(())
            }
            _ => Err(ApuError::InvalidCommand),
        }
    }

    /// Typed form of [`configure`](Self::configure) for the consumer
    /// registration command.
    pub fn set_consumer(&self, consumer: Option<ConsumerId>) -> Result<(), ApuError> {
        self.configure(CMD_SET_CONSUMER, consumer.map_or(0, ConsumerId::get))
    }

    /// Submit one buffer of samples.
    ///
    /// At most one submission is admitted per completion grant; all
    /// others fail with [`ApuError::Busy`] until the next completion.
    /// Short payloads are zero-padded to the full buffer so stale
    /// samples from a prior cycle are never replayed.
    pub fn write(&self, data: &[u8]) -> Result<(), ApuError> {
        self.write_with(data.len(), |dst| {
            dst.copy_from_slice(data);
            Ok(())
        })
    }

    /// Submit one buffer of samples through a fallible fill step.
    ///
    /// `fill` receives the first `len` bytes of the passive buffer and
    /// models a copy source that may fault (a user mapping, a decoder).
    /// On fault the whole passive buffer is zeroed and the submission
    /// window stays consumed.
    pub fn write_with<F>(&self, len: usize, fill: F) -> Result<(), ApuError>
    where
        F: FnOnce(&mut [u8]) -> Result<(), CopyFault>,
    {
        if !self.gate.is_held() {
            return Err(ApuError::NotOwned);
        }
        if len > SAMPLE_BUF_SIZE {
            return Err(ApuError::OutOfBounds);
        }

        // Serialize concurrent submission attempts; never block.
        let Some(_copy) = self.admission.try_lock_copy() else {
            return Err(ApuError::Busy);
        };
        // One admitted write per completion grant.
        if !self.admission.try_consume_window() {
            return Err(ApuError::Busy);
        }

        // SAFETY: the copy lock is held and roles flip only in
        // handle_completion, which cannot run a grant cycle for this
        // submission before the address below is published.
        let passive = unsafe { self.buffers.passive_mut() };
        let faulted = match passive.get_mut(..len) {
            Some(dst) => fill(dst).is_err(),
            None => true,
        };
        if faulted {
            passive.fill(0);
            return Err(ApuError::SourceFault);
        }
        if let Some(rest) = passive.get_mut(len..) {
            rest.fill(0);
        }

        // The buffer contents must be observable by the DMA engine
        // before its address is advertised.
        fence(Ordering::Release);
        self.bus
            .write_register(REG_BUF, self.buffers.passive_bus_addr().get());
        self.bus.write_register(REG_CONFIG, CFG_ENABLE | CFG_IRQ_REQ);

        Ok(())
    }

    /// Completion path, invoked by the interrupt glue when the APU has
    /// fully consumed a buffer.
    ///
    /// Non-blocking and copy-free: acknowledge the interrupt, flip the
    /// buffer roles, re-open the submission window, and push a
    /// notification to the registered consumer (silently skipped when
    /// none is registered; a dead consumer is logged, never fatal).
    pub fn handle_completion(&self) {
        self.bus.write_register(REG_CONFIG, CFG_IRQ_ACK | CFG_ENABLE);
        self.buffers.flip();
        self.admission.grant();

        if let Some(consumer) = ConsumerId::new(self.consumer.load(Ordering::Acquire)) {
            if self.notifier.notify(consumer).is_err() {
                #[cfg(feature = "defmt")]
                defmt::warn!(
                    "apu: dropped notification, consumer {} not resolvable",
                    consumer.get()
                );
            }
        }
    }

    /// Index of the hardware-owned buffer half (test/diagnostic hook).
    #[must_use]
    pub fn active_index(&self) -> usize {
        self.buffers.active_index()
    }

    /// The register bus this device writes through.
    #[must_use]
    pub fn bus(&self) -> &B {
        &self.bus
    }

    /// The notifier completions are delivered through.
    #[must_use]
    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    /// Whether a submission would currently be admitted.
    #[must_use]
    pub fn ready_for_samples(&self) -> bool {
        self.admission.window_open()
    }
}
