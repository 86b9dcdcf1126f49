//! Device ownership gate.
//!
//! Each FPGC peripheral supports exactly one owning producer at a time.
//! The gate is a single atomic exchanged between *free* and *held*;
//! acquisition succeeds iff the prior state was free. Releasing an
//! unheld gate is reported rather than treated as fatal, because device
//! teardown paths call release defensively.

use core::sync::atomic::{AtomicBool, Ordering};

use thiserror_no_std::Error;

/// Returned by [`OwnershipGate::acquire`] when another session holds the
/// device. Transient from the caller's perspective: retry after the
/// current owner closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[error("device is owned by another session")]
pub struct SessionBusy;

/// Outcome of [`OwnershipGate::release`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReleaseOutcome {
    /// The gate was held and is now free.
    Released,
    /// The gate was already free. Logged; not an error.
    NotHeld,
}

/// Single-owner gate over one device.
pub struct OwnershipGate {
    held: AtomicBool,
}

impl OwnershipGate {
    /// A free gate.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Claim exclusive ownership.
    ///
    /// Succeeds iff the gate was free, atomically marking it held.
    pub fn acquire(&self) -> Result<(), SessionBusy> {
        if self.held.swap(true, Ordering::AcqRel) {
            Err(SessionBusy)
        } else {
            Ok(())
        }
    }

    /// Unconditionally free the gate.
    ///
    /// Callers mute/disable the device alongside this regardless of the
    /// outcome; a [`ReleaseOutcome::NotHeld`] result means the
    /// surrounding teardown was defensive.
    pub fn release(&self) -> ReleaseOutcome {
        if self.held.swap(false, Ordering::AcqRel) {
            ReleaseOutcome::Released
        } else {
            #[cfg(feature = "defmt")]
            defmt::warn!("release called on a gate that was not held");
            ReleaseOutcome::NotHeld
        }
    }

    /// Whether a session currently owns the device.
    #[must_use]
    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

impl Default for OwnershipGate {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_acquire_is_busy_until_release() {
        let gate = OwnershipGate::new();
        assert_eq!(gate.acquire(), Ok(()));
        assert_eq!(gate.acquire(), Err(SessionBusy));
        assert_eq!(gate.release(), ReleaseOutcome::Released);
        assert_eq!(gate.acquire(), Ok(()));
    }

    #[test]
    fn release_of_unheld_gate_is_reported_not_fatal() {
        let gate = OwnershipGate::new();
        assert_eq!(gate.release(), ReleaseOutcome::NotHeld);
        // Gate still usable afterwards.
        assert_eq!(gate.acquire(), Ok(()));
    }

    #[test]
    fn contended_acquire_admits_exactly_one_thread() {
        use std::sync::Arc;

        let gate = Arc::new(OwnershipGate::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let gate = Arc::clone(&gate);
                std::thread::spawn(move || gate.acquire().is_ok())
            })
            .collect();

        let winners = handles
            .into_iter()
            .map(|h| h.join())
            .filter(|r| matches!(r, Ok(true)))
            .count();
        assert_eq!(winners, 1);
    }
}
