//! FPGC pixel processing unit (PPU) streaming driver.
//!
//! The PPU renders frames out of a driver-managed VRAM copy that it
//! pulls over DMA. The producer composes a frame with offset-addressed
//! writes into the software-owned VRAM half, then *presents* it: the
//! half's bus address is written to the PPU's DMA-address register and
//! the buffer roles flip, handing that half to hardware. Until the PPU's
//! completion interrupt signals that the transfer is done, further
//! writes and presents fail with `Busy` — that back-pressure is the
//! notification channel, and retrying `present` until it succeeds
//! naturally synchronizes the producer to the hardware's refresh
//! cadence.
//!
//! ```text
//! producer              Ppu                       hardware
//!   write_at ──► copy into passive VRAM half
//!   present  ──► barrier, publish bus addr,
//!                flip roles ──────────────────► DMA pulls the frame
//!   (Busy until grant)                          completion IRQ
//!                re-grant ◄──────────────────── handle_completion
//! ```
//!
//! Scroll, background-color, and enable are out-of-band control
//! registers set through `configure` or the typed helpers.

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

mod driver;
pub mod regs;

pub use driver::{BringUpError, Layer, Ppu, PpuError};
pub use regs::VRAM_SIZE;
