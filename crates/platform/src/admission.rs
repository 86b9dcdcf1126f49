//! Write admission state.
//!
//! Two atomic flags govern every submission to a streaming peripheral:
//!
//! - the **submission window** ("pending" flag): hardware has signalled
//!   readiness for a new buffer. A successful submission consumes it;
//!   the completion interrupt re-grants it. This is what enforces
//!   *at most one admitted write per completion grant*.
//! - the **copy lock**: serializes concurrent submission attempts while
//!   one caller's copy is in progress. Contention fails fast with Busy —
//!   it never blocks, so the flag is safe to probe from any context.
//!
//! Both flags are plain atomics manipulated with exchange and
//! compare-and-swap; no blocking primitive is ever shared with the
//! completion context.

use core::sync::atomic::{AtomicBool, Ordering};

use thiserror_no_std::Error;

/// Returned by a submission's fill step when the copy source is invalid.
///
/// The driver reacts by zeroing the bytes it was filling so a torn copy
/// is never handed to hardware; whether the submission window is also
/// forfeited is the driver's call (the audio path forfeits it, the video
/// path only locks VRAM between present and completion).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("copy source faulted")]
pub struct CopyFault;

/// Admission state for one streaming device.
///
/// The window starts open: the device accepts its first buffer before
/// any completion has ever fired.
pub struct Admission {
    pending: AtomicBool,
    copy_lock: AtomicBool,
}

impl Admission {
    /// Fresh admission state with the submission window open.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            pending: AtomicBool::new(true),
            copy_lock: AtomicBool::new(false),
        }
    }

    /// Try to take the copy lock without blocking.
    ///
    /// Returns `None` when another submission attempt holds it; the
    /// caller surfaces that as Busy. The lock is released when the
    /// returned guard drops.
    #[must_use]
    pub fn try_lock_copy(&self) -> Option<CopyGuard<'_>> {
        if self.copy_lock.swap(true, Ordering::AcqRel) {
            None
        } else {
            Some(CopyGuard { lock: &self.copy_lock })
        }
    }

    /// Atomically consume the submission window (true → false).
    ///
    /// Returns `false` when the window was already consumed — the caller
    /// surfaces that as Busy and retries after the next completion.
    #[must_use]
    pub fn try_consume_window(&self) -> bool {
        self.pending
            .compare_exchange(true, false, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Re-open the submission window. Called from the completion path
    /// once the hardware has consumed the previous buffer.
    pub fn grant(&self) {
        self.pending.store(true, Ordering::Release);
    }

    /// Whether the submission window is currently open.
    #[must_use]
    pub fn window_open(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }
}

impl Default for Admission {
    fn default() -> Self {
        Self::new()
    }
}

/// Holds the copy lock; dropping releases it.
///
/// The guard is deliberately not `Clone` and borrows the admission
/// state, so the lock cannot outlive the device or be released twice.
pub struct CopyGuard<'a> {
    lock: &'a AtomicBool,
}

impl Drop for CopyGuard<'_> {
    fn drop(&mut self) {
        self.lock.store(false, Ordering::Release);
    }
}
