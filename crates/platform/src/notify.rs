//! Producer notification channel.
//!
//! Completion handlers tell the producer "buffer consumed, submit more"
//! in one of two ways:
//!
//! - **Push** (audio): the completion path delivers an asynchronous
//!   notification to a previously registered consumer identity via a
//!   [`Notifier`]. With no identity registered, delivery is silently
//!   skipped — the device may be armed but unobserved.
//! - **Pull** (video): no channel at all. The producer re-tries its
//!   submission and treats `Busy` as the back-pressure signal, which
//!   also synchronizes it to the hardware's refresh cadence.
//!
//! The actual OS mechanism behind a push delivery (signal, waker, IPC)
//! is an external collaborator; [`SignalNotifier`] is the ready-made
//! in-firmware implementation.

use core::num::NonZeroU32;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use thiserror_no_std::Error;

/// Opaque identity of the consumer to notify on completion.
///
/// Zero is reserved for "no consumer registered", so the identity itself
/// is non-zero. What the value resolves to (a process id, a task handle)
/// is the notifier implementation's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConsumerId(NonZeroU32);

impl ConsumerId {
    /// Wrap a raw identity; `None` for the reserved zero value.
    #[must_use]
    pub const fn new(raw: u32) -> Option<Self> {
        match NonZeroU32::new(raw) {
            Some(id) => Some(Self(id)),
            None => None,
        }
    }

    /// The raw identity value.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0.get()
    }
}

/// Why an asynchronous notification could not be delivered.
///
/// Delivery failures are logged and swallowed by the completion path —
/// the device stays armed — but the taxonomy is surfaced so mocks and
/// integrations can report it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum NotifyError {
    /// The registered consumer identity no longer resolves to a live
    /// consumer.
    #[error("consumer identity no longer resolvable")]
    BadConsumerIdentity,
}

/// Push-model notification delivery.
///
/// Implementations are called from the hardware-completion context and
/// must not block.
pub trait Notifier {
    /// Deliver one "buffer consumed" notification to `consumer`.
    fn notify(&self, consumer: ConsumerId) -> Result<(), NotifyError>;
}

/// [`Notifier`] backed by an ISR-safe [`Signal`].
///
/// The completion path raises the signal; the producer task awaits it:
///
/// ```ignore
/// static SAMPLES_WANTED: Signal<CriticalSectionRawMutex, ()> = Signal::new();
///
/// // completion glue
/// let notifier = SignalNotifier::new(&SAMPLES_WANTED);
///
/// // producer task
/// SAMPLES_WANTED.wait().await;
/// ```
///
/// The consumer identity is ignored — the signal *is* the consumer.
pub struct SignalNotifier {
    signal: &'static Signal<CriticalSectionRawMutex, ()>,
}

impl SignalNotifier {
    /// Wrap a static signal.
    #[must_use]
    pub const fn new(signal: &'static Signal<CriticalSectionRawMutex, ()>) -> Self {
        Self { signal }
    }
}

impl Notifier for SignalNotifier {
    fn notify(&self, _consumer: ConsumerId) -> Result<(), NotifyError> {
        self.signal.signal(());
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn consumer_id_zero_is_reserved() {
        assert!(ConsumerId::new(0).is_none());
        assert_eq!(ConsumerId::new(42).unwrap().get(), 42);
    }

    #[test]
    fn signal_notifier_raises_the_signal() {
        static SIGNAL: Signal<CriticalSectionRawMutex, ()> = Signal::new();
        let notifier = SignalNotifier::new(&SIGNAL);

        assert!(!SIGNAL.signaled());
        notifier.notify(ConsumerId::new(1).unwrap()).unwrap();
        assert!(SIGNAL.signaled());
    }
}
