//! FPGC audio processing unit (APU) streaming driver.
//!
//! The APU consumes 512-byte sample buffers out of DDR memory via DMA.
//! Once a buffer's bus address is written to the APU, that memory must
//! not change until the peripheral raises its completion interrupt, at
//! which point it is ready for a new address. The driver double-buffers:
//! the producer fills the software-owned half while hardware drains the
//! other, and a completion flips the roles and pushes a "more samples"
//! notification to the registered consumer.
//!
//! ```text
//! producer            Apu                      hardware
//!   write ──► copy into passive half
//!             barrier, publish bus addr ────► DMA drains active half
//!   (Busy until grant)                        completion IRQ
//!             flip roles, re-grant ◄────────  handle_completion
//!   notified ◄─ push via Notifier
//! ```
//!
//! The completion glue (interrupt controller registration) is platform
//! code: it only needs to call [`Apu::handle_completion`] at the
//! hardware's cadence.

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

pub use driver::{Apu, ApuError, BringUpError};
pub use regs::SAMPLE_BUF_SIZE;
