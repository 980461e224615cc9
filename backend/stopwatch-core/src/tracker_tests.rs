// src/tracker_tests.rs

#[cfg(test)]
mod tests {
    use crate::clock::{Clock, TestClock};
    use crate::display::{DisplaySink, ElapsedDisplay};
    use crate::error::TrackerError;
    use crate::tracker::{ElapsedTimeTracker, Reconciliation, RunningFlag};
    use chrono::{DateTime, Duration, Local, TimeZone, Utc};
    use std::sync::{Arc, Mutex};

    // Helper: fixed starting instant for every test
    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap()
    }

    fn setup() -> (ElapsedTimeTracker, TestClock) {
        let clock = TestClock::at(t0());
        let tracker = ElapsedTimeTracker::new(Arc::new(clock.clone()));
        (tracker, clock)
    }

    fn stamp(instant: DateTime<Utc>) -> String {
        instant.to_rfc3339()
    }

    // Local wall-clock form the attendance backend sends
    fn local_stamp(instant: DateTime<Utc>) -> String {
        instant
            .with_timezone(&Local)
            .format("%Y-%m-%dT%H:%M:%S")
            .to_string()
    }

    #[derive(Default)]
    struct RecordingSink {
        frames: Mutex<Vec<ElapsedDisplay>>,
    }

    impl DisplaySink for RecordingSink {
        fn render(&self, frame: ElapsedDisplay) {
            self.frames.lock().unwrap().push(frame);
        }
    }

    #[test]
    fn test_closed_interval_shows_difference() {
        let (mut tracker, _clock) = setup();
        let start = stamp(t0());
        let end = stamp(t0() + Duration::seconds(3725));

        let result = tracker.on_boundary_changed(Some(&start), Some(&end), false);
        assert_eq!(
            result,
            Ok(Reconciliation::Closed {
                seconds: 3725,
                anomalous: false
            })
        );

        let frame = tracker.display();
        assert_eq!(
            (frame.hours, frame.minutes, frame.seconds),
            (1, 2, 5),
            "3725 s should read 01:02:05"
        );
        assert_eq!(frame.to_string(), "01:02:05");
        assert!(tracker.is_closed());
        assert_eq!(tracker.anchor(), None);
    }

    #[test]
    fn test_closed_interval_is_constant_across_ticks() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::hours(2));
        let end = stamp(t0() - Duration::minutes(30));
        tracker
            .on_boundary_changed(Some(&start), Some(&end), true)
            .unwrap();

        let sink = RecordingSink::default();
        for _ in 0..10 {
            clock.advance(Duration::milliseconds(700));
            tracker.tick(&sink);
        }

        let frames = sink.frames.lock().unwrap();
        assert_eq!(frames.len(), 10);
        assert!(frames.iter().all(|f| f.total_seconds() == 90 * 60));
    }

    #[test]
    fn test_open_running_interval_ticks_forward() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::seconds(10));

        let result = tracker.on_boundary_changed(Some(&start), None, true);
        assert_eq!(result, Ok(Reconciliation::Live { seconds: 10 }));
        assert_eq!(tracker.displayed_seconds(), 10);
        assert_eq!(tracker.anchor(), Some(t0()));

        clock.advance(Duration::seconds(5));
        assert_eq!(tracker.displayed_seconds(), 15);

        // Sub-second progress is truncated, never rounded up
        clock.advance(Duration::milliseconds(999));
        assert_eq!(tracker.displayed_seconds(), 15);
        clock.advance(Duration::milliseconds(1));
        assert_eq!(tracker.displayed_seconds(), 16);
    }

    #[test]
    fn test_open_interval_from_local_timestamp() {
        let (mut tracker, clock) = setup();
        let start = local_stamp(t0() - Duration::seconds(10));

        tracker
            .on_boundary_changed(Some(&start), Some("-"), true)
            .unwrap();
        let first = tracker.displayed_seconds();
        assert!((9..=11).contains(&first), "got {first}");

        clock.advance(Duration::seconds(5));
        let later = tracker.displayed_seconds();
        assert!((first + 4..=first + 6).contains(&later), "got {later}");
    }

    #[test]
    fn test_repeated_boundary_updates_do_not_drift() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::seconds(30));

        for step in 0..20 {
            tracker
                .on_boundary_changed(Some(&start), Some("00:00"), true)
                .unwrap();
            assert_eq!(tracker.displayed_seconds(), 30 + step);
            assert_eq!(tracker.accumulated_seconds(), 30 + step);
            clock.advance(Duration::seconds(1));
        }
    }

    #[test]
    fn test_identical_closed_updates_are_idempotent() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0());
        let end = stamp(t0() + Duration::seconds(42));

        for _ in 0..5 {
            tracker
                .on_boundary_changed(Some(&start), Some(&end), true)
                .unwrap();
            clock.advance(Duration::seconds(3));
            assert_eq!(tracker.displayed_seconds(), 42);
        }
    }

    #[test]
    fn test_open_interval_without_running_hint_is_unchanged() {
        let (mut tracker, _clock) = setup();
        let start = stamp(t0() - Duration::seconds(10));

        let result = tracker.on_boundary_changed(Some(&start), None, false);
        assert_eq!(result, Ok(Reconciliation::Unchanged));
        assert_eq!(tracker.displayed_seconds(), 0);
        assert!(!tracker.is_ticking());
    }

    #[test]
    fn test_future_start_does_not_anchor() {
        let (mut tracker, _clock) = setup();
        let start = stamp(t0() + Duration::seconds(30));

        let result = tracker.on_boundary_changed(Some(&start), None, true);
        assert_eq!(result, Ok(Reconciliation::Unchanged));
        assert!(!tracker.is_ticking());
    }

    #[test]
    fn test_end_boundary_wins_over_running_signals() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::seconds(100));
        let end = stamp(t0() - Duration::seconds(40));

        tracker
            .on_boundary_changed(Some(&start), Some(&end), true)
            .unwrap();
        assert_eq!(tracker.displayed_seconds(), 60);

        tracker.on_external_control_changed(true);
        assert!(!tracker.is_ticking());
        clock.advance(Duration::seconds(20));
        assert_eq!(tracker.displayed_seconds(), 60);

        tracker.on_external_control_changed(false);
        tracker.on_external_control_changed(true);
        clock.advance(Duration::seconds(20));
        assert_eq!(tracker.displayed_seconds(), 60);
    }

    #[test]
    fn test_internal_start_refused_while_closed() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0());
        tracker
            .on_boundary_changed(Some(&start), Some(&start), false)
            .unwrap();

        assert!(!tracker.start());
        clock.advance(Duration::seconds(5));
        assert_eq!(tracker.displayed_seconds(), 0);
        assert!(!tracker.is_ticking());
    }

    #[test]
    fn test_fresh_open_interval_reopens_after_close() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::seconds(50));
        let end = stamp(t0() - Duration::seconds(20));
        tracker
            .on_boundary_changed(Some(&start), Some(&end), true)
            .unwrap();
        assert!(tracker.is_closed());

        tracker
            .on_boundary_changed(Some(&start), None, true)
            .unwrap();
        assert!(!tracker.is_closed());
        assert_eq!(tracker.displayed_seconds(), 50);
        clock.advance(Duration::seconds(2));
        assert_eq!(tracker.displayed_seconds(), 52);
    }

    #[test]
    fn test_absent_or_unset_start_resets() {
        for start in [None, Some("-"), Some("00:00"), Some("")] {
            let (mut tracker, clock) = setup();
            let live = stamp(t0() - Duration::seconds(10));
            tracker.on_boundary_changed(Some(&live), None, true).unwrap();
            clock.advance(Duration::seconds(3));

            let result = tracker.on_boundary_changed(start, None, true);
            assert_eq!(result, Ok(Reconciliation::Reset), "start {start:?}");
            assert_eq!(tracker.displayed_seconds(), 0);
            assert_eq!(tracker.anchor(), None);
        }
    }

    #[test]
    fn test_reset_clears_everything() {
        let (mut tracker, clock) = setup();
        assert!(tracker.start());
        clock.advance(Duration::seconds(12));

        tracker.reset();
        assert_eq!(tracker.displayed_seconds(), 0);
        assert_eq!(tracker.anchor(), None);
        assert_eq!(tracker.running_flag(), RunningFlag::Internal(false));

        // Reset is unconditional, including on an already-empty tracker
        tracker.reset();
        assert_eq!(tracker.displayed_seconds(), 0);
    }

    #[test]
    fn test_external_stop_banks_elapsed_time() {
        let (mut tracker, clock) = setup();

        tracker.on_external_control_changed(true);
        assert!(tracker.is_ticking());
        clock.advance(Duration::seconds(8));
        tracker.on_external_control_changed(false);

        assert_eq!(tracker.displayed_seconds(), 8);
        assert!(!tracker.is_ticking());

        let sink = RecordingSink::default();
        for _ in 0..5 {
            clock.advance(Duration::seconds(1));
            tracker.tick(&sink);
        }
        assert!(sink
            .frames
            .lock()
            .unwrap()
            .iter()
            .all(|f| f.total_seconds() == 8));
    }

    #[test]
    fn test_external_start_does_not_clobber_seeded_session() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::seconds(600));
        tracker
            .on_boundary_changed(Some(&start), None, true)
            .unwrap();
        clock.advance(Duration::seconds(4));

        tracker.on_external_control_changed(true);
        assert_eq!(tracker.anchor(), Some(t0()));
        assert_eq!(tracker.displayed_seconds(), 604);
    }

    #[test]
    fn test_external_start_ignored_after_banked_time() {
        let (mut tracker, clock) = setup();
        tracker.on_external_control_changed(true);
        clock.advance(Duration::seconds(5));
        tracker.on_external_control_changed(false);

        tracker.on_external_control_changed(true);
        assert!(!tracker.is_ticking());
        clock.advance(Duration::seconds(5));
        assert_eq!(tracker.displayed_seconds(), 5);
    }

    #[test]
    fn test_external_signal_overrides_internal_toggle() {
        let (mut tracker, clock) = setup();
        assert!(tracker.start());
        assert_eq!(tracker.running_flag(), RunningFlag::Internal(true));

        tracker.on_external_control_changed(false);
        assert_eq!(tracker.running_flag(), RunningFlag::External(false));
        assert!(!tracker.is_running());
        assert!(!tracker.stop(), "internal stop must be refused");
        assert!(!tracker.start(), "internal start must be refused");

        clock.advance(Duration::seconds(3));
        tracker.clear_external_control();
        assert_eq!(tracker.running_flag(), RunningFlag::Internal(true));
        assert!(tracker.is_ticking(), "running toggle resumes ticking");
        clock.advance(Duration::seconds(2));
        assert_eq!(tracker.displayed_seconds(), 2);
    }

    #[test]
    fn test_clearing_external_signal_banks_when_internal_stopped() {
        let (mut tracker, clock) = setup();
        tracker.on_external_control_changed(true);
        clock.advance(Duration::seconds(6));

        tracker.clear_external_control();
        assert_eq!(tracker.external_control(), None);
        assert!(!tracker.is_ticking());
        clock.advance(Duration::seconds(6));
        assert_eq!(tracker.displayed_seconds(), 6);
    }

    #[test]
    fn test_clearing_external_signal_keeps_closed_interval_frozen() {
        let (mut tracker, clock) = setup();
        assert!(tracker.start());
        let start = stamp(t0() - Duration::minutes(30));
        let end = stamp(t0() - Duration::minutes(20));
        tracker
            .on_boundary_changed(Some(&start), Some(&end), true)
            .unwrap();
        tracker.on_external_control_changed(true);

        // Internal toggle is still running, but the clock-out pins the value
        tracker.clear_external_control();
        clock.advance(Duration::seconds(45));
        let sink = RecordingSink::default();
        let frame = tracker.tick(&sink);
        assert_eq!(frame, ElapsedDisplay::from_seconds(600));

        assert_eq!(tracker.external_control(), None);
        assert!(tracker.is_closed());
        assert!(!tracker.is_ticking());
        assert_eq!(tracker.anchor(), None);
        assert_eq!(tracker.displayed_seconds(), 600);
    }

    #[test]
    fn test_internal_start_stop_accumulates() {
        let (mut tracker, clock) = setup();
        assert!(tracker.start());
        assert!(!tracker.start(), "second start is a no-op");
        clock.advance(Duration::seconds(3));
        assert!(tracker.stop());
        assert!(!tracker.stop(), "second stop is a no-op");
        assert_eq!(tracker.displayed_seconds(), 3);

        clock.advance(Duration::seconds(60));
        assert!(tracker.start());
        clock.advance(Duration::milliseconds(2500));
        assert!(tracker.stop());
        assert_eq!(tracker.displayed_seconds(), 5);
    }

    #[test]
    fn test_malformed_start_keeps_state() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::seconds(20));
        tracker
            .on_boundary_changed(Some(&start), None, true)
            .unwrap();
        clock.advance(Duration::seconds(1));
        let before = tracker.snapshot();

        let result = tracker.on_boundary_changed(Some("not-a-date"), None, true);
        assert!(matches!(
            result,
            Err(TrackerError::MalformedTimestamp { ref raw, .. }) if raw == "not-a-date"
        ));
        assert_eq!(tracker.snapshot(), before);
    }

    #[test]
    fn test_malformed_start_on_fresh_tracker() {
        let (mut tracker, _clock) = setup();
        assert!(tracker
            .on_boundary_changed(Some("not-a-date"), Some("also-bad"), true)
            .is_err());
        assert_eq!(tracker.displayed_seconds(), 0);
        assert!(!tracker.is_closed());
    }

    #[test]
    fn test_malformed_end_is_treated_as_open() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0() - Duration::seconds(10));

        let result = tracker.on_boundary_changed(Some(&start), Some("garbage"), true);
        assert_eq!(result, Ok(Reconciliation::Live { seconds: 10 }));
        clock.advance(Duration::seconds(1));
        assert_eq!(tracker.displayed_seconds(), 11);
    }

    #[test]
    fn test_end_before_start_clamps_and_counts_once() {
        let (mut tracker, clock) = setup();
        let start = stamp(t0());
        let end = stamp(t0() - Duration::seconds(90));

        let result = tracker.on_boundary_changed(Some(&start), Some(&end), true);
        assert_eq!(
            result,
            Ok(Reconciliation::Closed {
                seconds: 0,
                anomalous: true
            })
        );
        assert_eq!(tracker.displayed_seconds(), 0);
        assert!(tracker.is_closed());
        assert_eq!(tracker.anomaly_count(), 1);

        // The backend repeats the same bad pair on every poll
        for _ in 0..3 {
            clock.advance(Duration::seconds(1));
            tracker
                .on_boundary_changed(Some(&start), Some(&end), true)
                .unwrap();
        }
        assert_eq!(tracker.anomaly_count(), 1);
        assert_eq!(tracker.display().to_string(), "00:00:00");
    }

    #[test]
    fn test_clock_stepping_backwards_never_goes_negative() {
        let (mut tracker, clock) = setup();
        assert!(tracker.start());
        clock.advance(Duration::seconds(4));
        clock.set_time(t0() - Duration::seconds(30));

        assert_eq!(tracker.displayed_seconds(), 0);
        assert!(tracker.stop());
        assert_eq!(tracker.displayed_seconds(), 0);
    }

    #[test]
    fn test_snapshot_reports_state() {
        let (mut tracker, clock) = setup();
        tracker.on_external_control_changed(true);
        clock.advance(Duration::seconds(61));

        let snapshot = tracker.snapshot();
        assert_eq!(snapshot.formatted, "00:01:01");
        assert_eq!(snapshot.displayed_seconds, 61);
        assert_eq!(snapshot.accumulated_seconds, 0);
        assert!(snapshot.running);
        assert!(snapshot.ticking);
        assert!(!snapshot.closed);
        assert_eq!(snapshot.external_control, Some(true));
        assert_eq!(snapshot.anomalies, 0);
        assert_eq!(clock.now(), t0() + Duration::seconds(61));
    }
}
