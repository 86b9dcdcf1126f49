//! Shared driver substrate for the FPGC streaming peripherals.
//!
//! The APU (audio) and PPU (pixel/VRAM) drivers both speak the same
//! hand-off protocol to their hardware: a producer fills one half of a
//! DMA-visible buffer pair, advertises its bus address through a
//! write-only MMIO register block, and may not submit again until the
//! peripheral's completion interrupt re-grants the submission window.
//! This crate holds the pieces of that protocol that are identical for
//! both devices, plus the platform seams the drivers are generic over.
//!
//! # Architecture Layers
//!
//! ```text
//! Device drivers (apu, ppu crates)
//!         ↓
//! Streaming substrate (this crate — gate, admission, double buffer)
//!         ↓
//! Platform seams (RegisterBus, Notifier — MMIO + IRQ glue supplies these)
//! ```
//!
//! # Execution contexts
//!
//! Every type here is designed to be shared between exactly two contexts:
//! the synchronous caller path (open/configure/write/close) and the
//! asynchronous completion path invoked at the hardware's cadence. All
//! cross-context state is manipulated through atomic exchange and
//! compare-and-swap only; nothing in this crate blocks, sleeps, or takes
//! a mutex that the other context could be holding.
//!
//! # Features
//!
//! - `std`: expose the mock implementations to downstream tests
//! - `defmt`: enable `defmt::Format` derives and `warn!` diagnostics

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(unused_must_use)]
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_op_in_unsafe_fn)]
#![allow(clippy::doc_markdown)] // register names and hex addresses in doc comments
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

pub mod admission;
pub mod dma;
pub mod gate;
pub mod notify;
pub mod regs;

#[cfg(any(test, feature = "std"))]
pub mod mocks;

pub use admission::{Admission, CopyFault, CopyGuard};
pub use dma::{Align32, BusAddr, DmaRegion, DoubleBuffer, RegionError};
pub use gate::{OwnershipGate, ReleaseOutcome, SessionBusy};
pub use notify::{ConsumerId, Notifier, NotifyError, SignalNotifier};
pub use regs::{Mmio, RegisterBus};
