//! Mock implementations for testing
//!
//! Host-side stand-ins for the platform seams: a register bus that
//! journals every write in order, and a notifier that counts deliveries
//! and can be told to fail. Both are usable from multiple threads so
//! tests can model the caller and completion contexts racing.

#![cfg(any(test, feature = "std"))]
#![allow(clippy::unwrap_used)] // journal capacity overflows are test bugs

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use critical_section::Mutex;

use crate::notify::{ConsumerId, Notifier, NotifyError};
use crate::regs::RegisterBus;

/// One journalled register write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegWrite {
    /// Byte offset within the register block.
    pub offset: usize,
    /// Value written.
    pub value: u32,
}

/// Journal capacity; tests asserting on register traffic stay well
/// below this.
const JOURNAL_CAP: usize = 128;

/// Recording mock register bus.
pub struct MockBus {
    journal: Mutex<RefCell<heapless::Vec<RegWrite, JOURNAL_CAP>>>,
}

impl Default for MockBus {
    fn default() -> Self {
        Self {
            journal: Mutex::new(RefCell::new(heapless::Vec::new())),
        }
    }
}

impl MockBus {
    /// Empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All writes observed so far, in order.
    pub fn writes(&self) -> heapless::Vec<RegWrite, JOURNAL_CAP> {
        critical_section::with(|cs| self.journal.borrow_ref(cs).clone())
    }

    /// The most recent value written to `offset`, if any.
    pub fn last_write_to(&self, offset: usize) -> Option<u32> {
        self.writes()
            .iter()
            .rev()
            .find(|w| w.offset == offset)
            .map(|w| w.value)
    }

    /// How many writes landed on `offset`.
    pub fn writes_to(&self, offset: usize) -> usize {
        self.writes().iter().filter(|w| w.offset == offset).count()
    }

    /// Drop the journal contents.
    pub fn clear(&self) {
        critical_section::with(|cs| self.journal.borrow_ref_mut(cs).clear());
    }
}

impl RegisterBus for MockBus {
    fn write_register(&self, offset: usize, value: u32) {
        critical_section::with(|cs| {
            self.journal
                .borrow_ref_mut(cs)
                .push(RegWrite { offset, value })
                .unwrap();
        });
    }
}

/// Counting mock notifier.
#[derive(Default)]
pub struct MockNotifier {
    delivered: AtomicUsize,
    last_consumer: AtomicUsize,
    fail: AtomicBool,
}

impl MockNotifier {
    /// A notifier that succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make subsequent deliveries fail with
    /// [`NotifyError::BadConsumerIdentity`].
    pub fn fail_deliveries(&self, fail: bool) {
        self.fail.store(fail, Ordering::Release);
    }

    /// Number of successful deliveries.
    pub fn delivered(&self) -> usize {
        self.delivered.load(Ordering::Acquire)
    }

    /// Identity of the most recently notified consumer (0 when none).
    pub fn last_consumer(&self) -> u32 {
        u32::try_from(self.last_consumer.load(Ordering::Acquire)).unwrap()
    }
}

impl Notifier for MockNotifier {
    fn notify(&self, consumer: ConsumerId) -> Result<(), NotifyError> {
        if self.fail.load(Ordering::Acquire) {
            return Err(NotifyError::BadConsumerIdentity);
        }
        self.last_consumer
            .store(consumer.get() as usize, Ordering::Release);
        self.delivered.fetch_add(1, Ordering::AcqRel);
        Ok(())
    }
}
