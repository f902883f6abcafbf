use chrono::{DateTime, Utc};

use crate::availability::classify;
use crate::models::{DowntimeEvent, Round, Status, Verdict};

#[derive(Debug, Clone, PartialEq)]
enum State {
    Uninitialized,
    Online,
    Offline {
        since: DateTime<Utc>,
        failed_hosts: Vec<String>,
    },
}

/// Single-pass reconstruction of downtime intervals from verdicts fed in
/// ascending time order.
#[derive(Debug, Clone)]
pub(crate) struct DowntimeTimeline {
    state: State,
    closed: Vec<DowntimeEvent>,
    online_checks: usize,
    offline_checks: usize,
    last_checked_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub(crate) struct Timeline {
    /// Closed events, oldest first.
    pub(crate) closed: Vec<DowntimeEvent>,
    pub(crate) ongoing: Option<DowntimeEvent>,
    pub(crate) final_status: Option<Status>,
    pub(crate) online_checks: usize,
    pub(crate) offline_checks: usize,
    pub(crate) last_checked_at: Option<DateTime<Utc>>,
}

impl Timeline {
    pub(crate) fn total_downtime_seconds(&self) -> i64 {
        self.closed
            .iter()
            .chain(self.ongoing.iter())
            .map(|e| e.duration_seconds)
            .sum()
    }

    /// All events, most recent first. The ongoing event, if any, leads.
    pub(crate) fn events_most_recent_first(&self) -> Vec<DowntimeEvent> {
        let mut events: Vec<DowntimeEvent> = self.ongoing.iter().cloned().collect();
        let mut closed = self.closed.clone();
        closed.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        events.extend(closed);
        events
    }
}

impl DowntimeTimeline {
    pub(crate) fn new() -> Self {
        Self {
            state: State::Uninitialized,
            closed: Vec::new(),
            online_checks: 0,
            offline_checks: 0,
            last_checked_at: None,
        }
    }

    pub(crate) fn observe(&mut self, timestamp: DateTime<Utc>, verdict: &Verdict) {
        self.last_checked_at = Some(timestamp);
        if verdict.online {
            self.online_checks += 1;
        } else {
            self.offline_checks += 1;
        }

        let previous = std::mem::replace(&mut self.state, State::Uninitialized);
        self.state = match (previous, verdict.online) {
            (State::Offline { since, failed_hosts }, true) => {
                self.closed.push(DowntimeEvent {
                    start_time: since,
                    end_time: Some(timestamp),
                    duration_seconds: seconds_between(since, timestamp),
                    is_ongoing: false,
                    failed_hosts,
                });
                State::Online
            }
            (_, true) => State::Online,
            // Failed hosts stay attributed to the first round of the outage.
            (offline @ State::Offline { .. }, false) => offline,
            (_, false) => State::Offline {
                since: timestamp,
                failed_hosts: verdict.failed_hosts.clone(),
            },
        };
    }

    pub(crate) fn finish(self, now: DateTime<Utc>) -> Timeline {
        let (final_status, ongoing) = match self.state {
            State::Uninitialized => (None, None),
            State::Online => (Some(Status::Online), None),
            State::Offline { since, failed_hosts } => (
                Some(Status::Offline),
                Some(DowntimeEvent {
                    start_time: since,
                    end_time: None,
                    duration_seconds: seconds_between(since, now),
                    is_ongoing: true,
                    failed_hosts,
                }),
            ),
        };

        Timeline {
            closed: self.closed,
            ongoing,
            final_status,
            online_checks: self.online_checks,
            offline_checks: self.offline_checks,
            last_checked_at: self.last_checked_at,
        }
    }
}

/// Runs every non-empty round through the classifier and the state machine.
pub(crate) fn process(rounds: &[Round], now: DateTime<Utc>) -> Timeline {
    let mut timeline = DowntimeTimeline::new();
    for round in rounds.iter().filter(|r| !r.is_degenerate()) {
        timeline.observe(round.timestamp, &classify(round));
    }
    timeline.finish(now)
}

// Clamped so unsorted input or clock skew cannot yield negative downtime.
fn seconds_between(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    (end - start).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::availability::tests::round;
    use chrono::Duration;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    #[test]
    fn test_outage_closed_by_online_round() {
        let rounds = vec![
            round(at(0), &[("a", true), ("b", true)]),
            round(at(1), &[("a", false), ("b", false)]),
            round(at(2), &[("a", false), ("b", false)]),
            round(at(3), &[("a", true), ("b", true)]),
        ];
        let timeline = process(&rounds, at(10));

        assert_eq!(timeline.closed.len(), 1);
        assert!(timeline.ongoing.is_none());
        let event = &timeline.closed[0];
        assert_eq!(event.start_time, at(1));
        assert_eq!(event.end_time, Some(at(3)));
        assert_eq!(event.duration_seconds, 120);
        assert!(!event.is_ongoing);
        assert_eq!(event.failed_hosts, vec!["a", "b"]);
        assert_eq!(timeline.final_status, Some(Status::Online));
        assert_eq!(timeline.last_checked_at, Some(at(3)));
    }

    #[test]
    fn test_trailing_outage_is_ongoing_against_now() {
        let rounds = vec![round(at(0), &[("a", false)])];
        let timeline = process(&rounds, at(5));

        assert!(timeline.closed.is_empty());
        let ongoing = timeline.ongoing.as_ref().unwrap();
        assert!(ongoing.is_ongoing);
        assert_eq!(ongoing.end_time, None);
        assert_eq!(ongoing.duration_seconds, 300);
        assert_eq!(timeline.final_status, Some(Status::Offline));
    }

    #[test]
    fn test_ongoing_duration_grows_with_now() {
        let rounds = vec![round(at(0), &[("a", false)])];
        let earlier = process(&rounds, at(1)).ongoing.unwrap().duration_seconds;
        let later = process(&rounds, at(2)).ongoing.unwrap().duration_seconds;
        assert!(later > earlier);
    }

    #[test]
    fn test_failed_hosts_snapshot_taken_at_outage_start() {
        let rounds = vec![
            round(at(0), &[("a", false), ("b", true), ("c", false)]),
            round(at(1), &[("a", false), ("c", false)]),
            round(at(2), &[("b", false), ("c", false)]),
            round(at(3), &[("a", true)]),
        ];
        let timeline = process(&rounds, at(4));
        assert_eq!(timeline.closed.len(), 1);
        assert_eq!(timeline.closed[0].failed_hosts, vec!["a", "c"]);
        assert_eq!(timeline.closed[0].start_time, at(1));
    }

    #[test]
    fn test_empty_rounds_are_skipped() {
        let rounds = vec![
            round(at(0), &[("a", false)]),
            Round {
                timestamp: at(1),
                results: vec![],
            },
        ];
        let timeline = process(&rounds, at(2));
        assert_eq!(timeline.last_checked_at, Some(at(0)));
        assert_eq!(timeline.final_status, Some(Status::Offline));
        assert_eq!(timeline.online_checks + timeline.offline_checks, 1);
    }

    #[test]
    fn test_duplicate_timestamps_are_separate_ticks() {
        let rounds = vec![
            round(at(0), &[("a", false)]),
            round(at(0), &[("a", true)]),
            round(at(0), &[("a", false)]),
        ];
        let timeline = process(&rounds, at(0));

        assert_eq!(timeline.online_checks, 1);
        assert_eq!(timeline.offline_checks, 2);
        assert_eq!(timeline.closed.len(), 1);
        assert_eq!(timeline.closed[0].duration_seconds, 0);
        assert_eq!(timeline.closed[0].end_time, Some(at(0)));
        let events = timeline.events_most_recent_first();
        assert_eq!(events.len(), 2);
        assert!(events[0].is_ongoing);
        assert_eq!(events[0].duration_seconds, 0);
        assert_eq!(timeline.final_status, Some(Status::Offline));
    }

    #[test]
    fn test_no_rounds_has_no_status() {
        let timeline = process(&[], at(0));
        assert!(timeline.final_status.is_none());
        assert!(timeline.closed.is_empty());
        assert!(timeline.ongoing.is_none());
        assert_eq!(timeline.total_downtime_seconds(), 0);
    }

    #[test]
    fn test_events_ordered_most_recent_first() {
        let rounds = vec![
            round(at(0), &[("a", false)]),
            round(at(1), &[("a", true)]),
            round(at(2), &[("a", false)]),
        ];
        let timeline = process(&rounds, at(3));
        let events = timeline.events_most_recent_first();

        assert_eq!(events.len(), 2);
        assert!(events[0].is_ongoing);
        assert_eq!(events[0].start_time, at(2));
        assert_eq!(events[1].start_time, at(0));
        assert_eq!(events[1].end_time, Some(at(1)));
        assert_eq!(timeline.total_downtime_seconds(), 120);
    }

    #[test]
    fn test_out_of_order_rounds_do_not_go_negative() {
        let rounds = vec![round(at(5), &[("a", false)]), round(at(1), &[("a", true)])];
        let timeline = process(&rounds, at(0));
        assert_eq!(timeline.closed[0].duration_seconds, 0);
    }
}
