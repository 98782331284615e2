use log::{debug, warn};

use super::error::{MalformedRecord, MergeError, MergeResult};
use super::state::ActiveRatings;
use super::types::{
    AnnotatedEvent, Instant, MergeOutcome, MergeStats, RatingRecord, Stream, Supplied, TargetEvent,
};
use crate::config::settings::{MalformedPolicy, MergeSettings};

/// Annotates every event of one entity with the mean rating visible just before it.
///
/// Both inputs must be sorted ascending by time. The first out-of-order record
/// fails the run with [`MergeError::OrderingViolation`]; malformed records are
/// handled according to `settings.malformed_policy`. A skipped event yields no
/// output row, so the output matches the well-formed events one-to-one and in
/// input order.
pub fn merge<H, E>(settings: &MergeSettings, history: H, events: E) -> MergeResult<MergeOutcome>
where
    H: IntoIterator<Item = Supplied<RatingRecord>>,
    E: IntoIterator<Item = Supplied<TargetEvent>>,
{
    MergeRun::new(settings, history.into_iter(), events.into_iter()).run()
}

/// [`merge`] for inputs that are already known to be well formed.
pub fn merge_records(
    settings: &MergeSettings,
    history: &[RatingRecord],
    events: &[TargetEvent],
) -> MergeResult<MergeOutcome> {
    merge(
        settings,
        history.iter().cloned().map(Ok),
        events.iter().cloned().map(Ok),
    )
}

struct MergeRun<'a, H, E> {
    settings: &'a MergeSettings,
    history: H,
    events: E,
    pending: Option<RatingRecord>,
    state: ActiveRatings,
    stats: MergeStats,
    history_index: usize,
    event_index: usize,
    last_history_time: Option<Instant>,
    last_event_time: Option<Instant>,
}

impl<'a, H, E> MergeRun<'a, H, E>
where
    H: Iterator<Item = Supplied<RatingRecord>>,
    E: Iterator<Item = Supplied<TargetEvent>>,
{
    fn new(settings: &'a MergeSettings, history: H, events: E) -> Self {
        Self {
            settings,
            history,
            events,
            pending: None,
            state: ActiveRatings::new(),
            stats: MergeStats::default(),
            history_index: 0,
            event_index: 0,
            last_history_time: None,
            last_event_time: None,
        }
    }

    fn run(mut self) -> MergeResult<MergeOutcome> {
        let mut annotated = Vec::new();

        while let Some(event) = self.next_event()? {
            self.apply_visible_history(&event)?;
            annotated.push(self.annotate(event));
        }

        debug!(
            "Merged {} events against {} history records ({} insertions, {} retractions)",
            annotated.len(),
            self.stats.history_applied,
            self.stats.insertions,
            self.stats.retractions
        );

        Ok(MergeOutcome {
            annotated,
            stats: self.stats,
        })
    }

    fn apply_visible_history(&mut self, event: &TargetEvent) -> MergeResult<()> {
        loop {
            if self.pending.is_none() {
                self.pending = self.next_history()?;
            }

            match self.pending.take() {
                Some(record) if self.is_visible(&record, event) => self.apply(record),
                other => {
                    self.pending = other;
                    return Ok(());
                }
            }
        }
    }

    fn is_visible(&self, record: &RatingRecord, event: &TargetEvent) -> bool {
        record
            .effective_time
            .checked_add_signed(self.settings.visibility_offset)
            .is_some_and(|visible_from| visible_from < event.occurred_at)
    }

    fn apply(&mut self, record: RatingRecord) {
        match record.rating {
            Some(rating) if !self.is_sentinel(rating) => {
                self.state.insert(record.rater_id, rating);
                self.stats.insertions += 1;
            }
            _ => {
                self.state.retract(record.rater_id);
                self.stats.retractions += 1;
            }
        }
        self.stats.history_applied += 1;
        self.stats.cursor_advances += 1;
    }

    fn annotate(&mut self, event: TargetEvent) -> AnnotatedEvent {
        let aggregate_before = if self.settings.exclude_acting_rater {
            self.state.mean_excluding(event.rater_id)
        } else {
            self.state.mean()
        };
        self.stats.events_annotated += 1;
        self.stats.cursor_advances += 1;

        AnnotatedEvent {
            event,
            aggregate_before,
        }
    }

    fn is_sentinel(&self, rating: f64) -> bool {
        self.settings.retraction_sentinel == Some(rating)
    }

    fn next_history(&mut self) -> MergeResult<Option<RatingRecord>> {
        while let Some(item) = self.history.next() {
            let index = self.history_index;
            self.history_index += 1;

            match item.and_then(|record| self.validate_record(record, index)) {
                Ok(record) => {
                    check_order(
                        Stream::History,
                        index,
                        &mut self.last_history_time,
                        record.effective_time,
                    )?;
                    return Ok(Some(record));
                }
                Err(malformed) => {
                    self.skip_or_fail(malformed)?;
                    self.stats.skipped_history += 1;
                }
            }
        }
        Ok(None)
    }

    fn next_event(&mut self) -> MergeResult<Option<TargetEvent>> {
        while let Some(item) = self.events.next() {
            let index = self.event_index;
            self.event_index += 1;

            match item {
                Ok(event) => {
                    check_order(
                        Stream::Events,
                        index,
                        &mut self.last_event_time,
                        event.occurred_at,
                    )?;
                    return Ok(Some(event));
                }
                Err(malformed) => {
                    self.skip_or_fail(malformed)?;
                    self.stats.skipped_events += 1;
                }
            }
        }
        Ok(None)
    }

    fn validate_record(&self, record: RatingRecord, index: usize) -> Supplied<RatingRecord> {
        match record.rating {
            Some(rating) if !rating.is_finite() && !self.is_sentinel(rating) => Err(
                MalformedRecord::new(Stream::History, index, format!("non-finite rating {rating}")),
            ),
            _ => Ok(record),
        }
    }

    fn skip_or_fail(&mut self, malformed: MalformedRecord) -> MergeResult<()> {
        match self.settings.malformed_policy {
            MalformedPolicy::FailFast => Err(malformed.into()),
            MalformedPolicy::SkipAndLog => {
                warn!("Skipping {}", malformed);
                self.stats.cursor_advances += 1;
                Ok(())
            }
        }
    }
}

fn check_order(
    stream: Stream,
    index: usize,
    last: &mut Option<Instant>,
    current: Instant,
) -> MergeResult<()> {
    if let Some(previous) = *last {
        if current < previous {
            return Err(MergeError::OrderingViolation {
                stream,
                index,
                previous,
                current,
            });
        }
    }
    *last = Some(current);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, Utc};

    const OFFSET: i64 = 2;

    fn ts(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn rated(rater_id: i64, rating: f64, secs: i64) -> RatingRecord {
        RatingRecord::new(rater_id, Some(rating), ts(secs))
    }

    fn retracted(rater_id: i64, secs: i64) -> RatingRecord {
        RatingRecord::new(rater_id, Some(-1.0), ts(secs))
    }

    fn event(rater_id: i64, secs: i64) -> TargetEvent {
        TargetEvent {
            rater_id,
            entity_id: 42,
            occurred_at: ts(secs),
            observed_rating: Some(3.5),
            prediction: Some(3.2),
        }
    }

    fn settings() -> MergeSettings {
        MergeSettings {
            visibility_offset: Duration::seconds(OFFSET),
            ..MergeSettings::default()
        }
    }

    fn aggregates(outcome: &MergeOutcome) -> Vec<Option<f64>> {
        outcome.annotated.iter().map(|a| a.aggregate_before).collect()
    }

    #[test]
    fn test_mean_of_prior_ratings() {
        let history = vec![rated(1, 4.0, 0), rated(2, 2.0, 10)];
        let events = vec![event(9, 20)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![Some(3.0)]);
    }

    #[test]
    fn test_retraction_empties_state() {
        let history = vec![rated(1, 4.0, 0), retracted(1, 5)];
        let events = vec![event(9, 10)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![None]);
        assert_eq!(outcome.stats.retractions, 1);
    }

    #[test]
    fn test_missing_rating_retracts() {
        let history = vec![
            rated(1, 4.0, 0),
            rated(2, 2.0, 1),
            RatingRecord::new(1, None, ts(2)),
        ];
        let events = vec![event(9, 30)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![Some(2.0)]);
    }

    #[test]
    fn test_mean_after_retraction_is_exact() {
        let history = vec![
            rated(1, 0.1, 0),
            rated(2, 0.2, 1),
            RatingRecord::new(1, None, ts(2)),
        ];
        let events = vec![event(9, 10)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![Some(0.2)]);
    }

    #[test]
    fn test_record_within_offset_is_excluded() {
        let history = vec![rated(1, 5.0, 100)];
        let events = vec![event(1, 100 + OFFSET - 1)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![None]);
    }

    #[test]
    fn test_record_exactly_at_boundary_is_excluded() {
        let history = vec![rated(1, 5.0, 100)];
        let events = vec![event(2, 100 + OFFSET), event(3, 100 + OFFSET + 1)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![None, Some(5.0)]);
    }

    #[test]
    fn test_pending_record_becomes_visible_to_later_event() {
        let history = vec![rated(2, 3.0, 10)];
        let events = vec![event(1, 5), event(3, 15)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![None, Some(3.0)]);
    }

    #[test]
    fn test_zero_offset_applies_strictly_earlier_records() {
        let no_offset = MergeSettings {
            visibility_offset: Duration::zero(),
            ..MergeSettings::default()
        };
        let history = vec![rated(2, 3.0, 10)];
        let events = vec![event(1, 10), event(3, 11)];

        let outcome = merge_records(&no_offset, &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![None, Some(3.0)]);
    }

    #[test]
    fn test_rerating_overwrites_and_rater_can_return_after_retraction() {
        let history = vec![
            rated(1, 2.0, 0),
            rated(2, 4.0, 10),
            retracted(1, 20),
            rated(1, 5.0, 40),
        ];
        let events = vec![event(9, 16), event(9, 26), event(9, 46)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![Some(3.0), Some(4.0), Some(4.5)]);
    }

    #[test]
    fn test_empty_state_is_null_not_zero() {
        let events = vec![event(1, 0), event(2, 100)];

        let outcome = merge_records(&settings(), &[], &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![None, None]);
    }

    #[test]
    fn test_no_events_yields_no_output() {
        let history = vec![rated(1, 4.0, 0)];

        let outcome = merge_records(&settings(), &history, &[]).unwrap();

        assert!(outcome.annotated.is_empty());
        assert_eq!(outcome.stats.history_applied, 0);
    }

    #[test]
    fn test_output_preserves_event_order_and_payload() {
        let history = vec![rated(1, 4.0, 0)];
        let events = vec![event(7, 10), event(8, 10), event(9, 12)];

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        let raters: Vec<i64> = outcome.annotated.iter().map(|a| a.event.rater_id).collect();
        assert_eq!(raters, vec![7, 8, 9]);
        assert_eq!(outcome.annotated[0].event, events[0]);
    }

    #[test]
    fn test_cursor_advances_bounded_by_input_lengths() {
        let history: Vec<RatingRecord> = (0..50).map(|i| rated(i % 7, (i % 5) as f64, i * 3)).collect();
        let events: Vec<TargetEvent> = (0..40).map(|i| event(i, i * 4)).collect();

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        assert_eq!(outcome.annotated.len(), events.len());
        assert!(outcome.stats.cursor_advances <= history.len() + events.len());
    }

    #[test]
    fn test_aggregate_never_sees_records_at_or_after_boundary() {
        let history: Vec<RatingRecord> = (0..30).map(|i| rated(i, i as f64, i * 2)).collect();
        let events: Vec<TargetEvent> = (0..20).map(|i| event(100 + i, i * 3)).collect();

        let outcome = merge_records(&settings(), &history, &events).unwrap();

        for annotated in &outcome.annotated {
            let visible: Vec<f64> = history
                .iter()
                .filter(|r| r.effective_time + Duration::seconds(OFFSET) < annotated.event.occurred_at)
                .map(|r| r.rating.unwrap())
                .collect();
            let expected = if visible.is_empty() {
                None
            } else {
                Some(visible.iter().sum::<f64>() / visible.len() as f64)
            };
            assert_eq!(annotated.aggregate_before, expected);
        }
    }

    #[test]
    fn test_exclude_acting_rater() {
        let exclude = MergeSettings {
            exclude_acting_rater: true,
            ..settings()
        };
        let history = vec![rated(1, 5.0, 0), rated(2, 3.0, 0)];
        let events = vec![event(1, 20), event(3, 20)];

        let outcome = merge_records(&exclude, &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_without_sentinel_negative_rating_counts() {
        let plain = MergeSettings {
            retraction_sentinel: None,
            ..settings()
        };
        let history = vec![rated(1, 3.0, 0), retracted(2, 0)];
        let events = vec![event(9, 20)];

        let outcome = merge_records(&plain, &history, &events).unwrap();

        assert_eq!(aggregates(&outcome), vec![Some(1.0)]);
    }

    #[test]
    fn test_unsorted_history_is_rejected() {
        let history = vec![rated(1, 4.0, 10), rated(2, 2.0, 3)];
        let events = vec![event(9, 100)];

        let err = merge_records(&settings(), &history, &events).unwrap_err();

        assert!(matches!(
            err,
            MergeError::OrderingViolation {
                stream: Stream::History,
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_unsorted_events_are_rejected() {
        let events = vec![event(1, 50), event(2, 40)];

        let err = merge_records(&settings(), &[], &events).unwrap_err();

        assert!(matches!(
            err,
            MergeError::OrderingViolation {
                stream: Stream::Events,
                index: 1,
                ..
            }
        ));
    }

    #[test]
    fn test_malformed_records_skipped_by_default() {
        let history = vec![
            Ok(rated(1, 4.0, 0)),
            Err(MalformedRecord::new(Stream::History, 1, "missing user_id")),
            Ok(rated(2, f64::NAN, 1)),
            Ok(rated(3, 2.0, 2)),
        ];
        let events = vec![
            Err(MalformedRecord::new(Stream::Events, 0, "missing timestamp")),
            Ok(event(9, 20)),
        ];

        let outcome = merge(&settings(), history, events).unwrap();

        assert_eq!(aggregates(&outcome), vec![Some(3.0)]);
        assert_eq!(outcome.stats.skipped_history, 2);
        assert_eq!(outcome.stats.skipped_events, 1);
        assert!(outcome.stats.cursor_advances <= 6);
    }

    #[test]
    fn test_malformed_record_fails_fast_when_configured() {
        let strict = MergeSettings {
            malformed_policy: MalformedPolicy::FailFast,
            ..settings()
        };
        let history = vec![
            Ok(rated(1, 4.0, 0)),
            Err(MalformedRecord::new(Stream::History, 1, "missing user_id")),
        ];
        let events = vec![Ok(event(9, 20))];

        let err = merge(&strict, history, events).unwrap_err();

        assert_eq!(
            err,
            MergeError::Malformed(MalformedRecord::new(Stream::History, 1, "missing user_id"))
        );
    }
}
