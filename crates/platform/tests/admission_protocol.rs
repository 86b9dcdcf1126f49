//! Property-based tests for the write admission state.
//! Verifies the one-submission-per-grant invariant holds for ALL
//! interleavings of producer attempts and completion grants, not just
//! fixed examples.

use platform::Admission;

/// Producer-visible event in a generated schedule.
#[derive(Debug, Clone, Copy)]
enum Event {
    /// A producer submission attempt (consume the window).
    Submit,
    /// A hardware completion (re-grant the window).
    Complete,
}

fn event_strategy() -> impl proptest::strategy::Strategy<Value = Event> {
    use proptest::prelude::*;
    prop_oneof![Just(Event::Submit), Just(Event::Complete)]
}

proptest::proptest! {
    /// For any schedule of submits and completions, at most one submit
    /// is admitted per completion-grant period.
    #[test]
    fn at_most_one_admission_per_grant(
        events in proptest::collection::vec(event_strategy(), 1..64)
    ) {
        let adm = Admission::new();
        let mut admitted_this_grant = 0usize;

        for event in events {
            match event {
                Event::Submit => {
                    if adm.try_consume_window() {
                        admitted_this_grant += 1;
                        assert!(
                            admitted_this_grant <= 1,
                            "two submissions admitted in one grant period"
                        );
                    }
                }
                Event::Complete => {
                    adm.grant();
                    admitted_this_grant = 0;
                }
            }
        }
    }

    /// A consumed window stays consumed across any number of failed
    /// attempts until the next grant.
    #[test]
    fn busy_attempts_do_not_reopen_the_window(attempts in 1usize..32) {
        let adm = Admission::new();
        assert!(adm.try_consume_window());
        for _ in 0..attempts {
            assert!(!adm.try_consume_window());
            assert!(!adm.window_open());
        }
        adm.grant();
        assert!(adm.try_consume_window());
    }
}

/// Caller and completion contexts racing: the number of admitted
/// submissions can never exceed the number of grant periods.
#[test]
fn threaded_admissions_never_exceed_grants() {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    const COMPLETIONS: usize = 1000;

    let adm = Arc::new(Admission::new());
    let admitted = Arc::new(AtomicUsize::new(0));
    let done = Arc::new(AtomicBool::new(false));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let adm = Arc::clone(&adm);
            let admitted = Arc::clone(&admitted);
            let done = Arc::clone(&done);
            std::thread::spawn(move || {
                while !done.load(Ordering::Acquire) {
                    if adm.try_consume_window() {
                        admitted.fetch_add(1, Ordering::AcqRel);
                    }
                }
            })
        })
        .collect();

    for _ in 0..COMPLETIONS {
        adm.grant();
        std::thread::yield_now();
    }
    done.store(true, Ordering::Release);
    for p in producers {
        let _ = p.join();
    }

    // Initial window + one per completion is the absolute ceiling.
    assert!(admitted.load(Ordering::Acquire) <= COMPLETIONS + 1);
}
