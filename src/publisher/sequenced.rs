//! Per-query delivery with sequence deduplication and recovery.

use super::sink::Sink;
use crate::error::{QueryError, Result};
use crate::expression::{test_filter, Bindable, Evaluator};
use crate::query::{BasicQuery, InterruptionPolicy, Point, Range};
use crate::types::{QueryId, Sequence, SequencedValue};
use parking_lot::Mutex;
use tracing::{debug, warn};

struct PublisherState<V> {
    filter: Evaluator,
    id: QueryId,
    next_sequence: Sequence,
    write_log: Vec<SequencedValue<V>>,
}

impl<V: Bindable> PublisherState<V> {
    /// Gates a value on `next_sequence` and the filter, advancing
    /// `next_sequence` when it passes.
    fn admit(&mut self, value: &SequencedValue<V>) -> bool {
        if value.sequence >= self.next_sequence && test_filter(&mut self.filter, value) {
            self.next_sequence = value.sequence.increment();
            true
        } else {
            false
        }
    }
}

/// Delivers one query's values to its sink, in strictly increasing sequence
/// order and without repeats.
///
/// Until a query id is assigned (before `end_snapshot`, or during recovery)
/// pushed values are buffered. Once live, values below the next expected
/// sequence are dropped, which removes the overlap between a snapshot and
/// live values that arrived while it was loading.
pub struct SequencedValuePublisher<I, V, S> {
    query: BasicQuery<I>,
    sink: S,
    state: Mutex<PublisherState<V>>,
}

impl<I, V, S> SequencedValuePublisher<I, V, S>
where
    I: Clone,
    V: Bindable,
    S: Sink<SequencedValue<V>>,
{
    pub fn new(query: BasicQuery<I>, filter: Evaluator, sink: S) -> Self {
        Self {
            query,
            sink,
            state: Mutex::new(PublisherState {
                filter,
                id: QueryId::UNASSIGNED,
                next_sequence: Sequence::FIRST,
                write_log: Vec::new(),
            }),
        }
    }

    /// Builds a publisher using the query's own filter.
    pub fn from_query(query: BasicQuery<I>, sink: S) -> Result<Self> {
        let filter = query.filter_evaluator()?;
        Ok(Self::new(query, filter, sink))
    }

    pub fn query(&self) -> &BasicQuery<I> {
        &self.query
    }

    /// The id the query is live under, or `QueryId::UNASSIGNED`.
    pub fn id(&self) -> QueryId {
        self.state.lock().id
    }

    /// The smallest sequence that would still be delivered.
    pub fn next_sequence(&self) -> Sequence {
        self.state.lock().next_sequence
    }

    /// Pushes a live value.
    pub fn push(&self, value: SequencedValue<V>) -> Result<()> {
        let mut state = self.state.lock();
        if !state.id.is_assigned() {
            state.write_log.push(value);
            return Ok(());
        }
        if state.admit(&value) {
            self.sink.push(value)?;
        }
        Ok(())
    }

    /// Delivers historical values through the same sequence gate as live
    /// values.
    pub fn push_snapshot(&self, snapshot: impl IntoIterator<Item = SequencedValue<V>>) -> Result<()> {
        let mut state = self.state.lock();
        for value in snapshot {
            if state.admit(&value) {
                self.sink.push(value)?;
            }
        }
        Ok(())
    }

    /// Starts buffering live values ahead of a snapshot load.
    pub fn begin_snapshot(&self) {
        self.state.lock().id = QueryId::UNASSIGNED;
    }

    /// Goes live under `id`, delivering values buffered during the load.
    pub fn end_snapshot(&self, id: QueryId) -> Result<()> {
        let mut state = self.state.lock();
        state.id = id;
        let write_log = std::mem::take(&mut state.write_log);
        debug!(%id, buffered = write_log.len(), "publisher live");
        for value in write_log {
            if state.admit(&value) {
                self.sink.push(value)?;
            }
        }
        Ok(())
    }

    /// Starts recovering after an interruption and returns the query to
    /// resubmit.
    ///
    /// `RecoverData` resumes at the next expected sequence (or the query's
    /// own start if nothing was delivered yet); `IgnoreContinue` resumes at
    /// the present. Any other policy closes the sink with `QueryInterrupted`
    /// and returns that error.
    pub fn begin_recovery(&self) -> Result<BasicQuery<I>> {
        let mut state = self.state.lock();
        state.id = QueryId::UNASSIGNED;
        let start = match self.query.interruption_policy() {
            InterruptionPolicy::IgnoreContinue => Point::Sequence(Sequence::PRESENT),
            InterruptionPolicy::RecoverData if state.next_sequence == Sequence::FIRST => {
                self.query.range().start()
            }
            InterruptionPolicy::RecoverData => Point::Sequence(state.next_sequence),
            InterruptionPolicy::BreakQuery => {
                warn!("query interrupted without recovery");
                self.sink.close(Some(QueryError::QueryInterrupted));
                return Err(QueryError::QueryInterrupted);
            }
        };
        let mut recovery = self.query.clone();
        recovery.set_range(Range::new(start, self.query.range().end()));
        debug!(range = %recovery.range(), "recovering query");
        Ok(recovery)
    }

    /// Rejoins the live path under `id`.
    pub fn end_recovery(&self, id: QueryId) -> Result<()> {
        self.end_snapshot(id)
    }

    /// Closes the sink. Terminal.
    pub fn close(&self, reason: Option<QueryError>) {
        self.sink.close(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publisher::{channel_sink, ChannelSink, SinkConfig, SinkReceiver};

    type Publisher = SequencedValuePublisher<String, i64, ChannelSink<SequencedValue<i64>>>;

    fn publisher(policy: InterruptionPolicy) -> (Publisher, SinkReceiver<SequencedValue<i64>>) {
        let (sink, receiver) = channel_sink(&SinkConfig::default());
        let query = BasicQuery::new("index".to_string())
            .with_range(Range::TOTAL)
            .with_interruption_policy(policy);
        (Publisher::from_query(query, sink).unwrap(), receiver)
    }

    fn value(v: i64, s: u64) -> SequencedValue<i64> {
        SequencedValue::new(v, Sequence(s))
    }

    #[test]
    fn test_buffers_until_live() {
        let (publisher, receiver) = publisher(InterruptionPolicy::BreakQuery);
        publisher.push(value(1, 1)).unwrap();
        assert!(receiver.drain().is_empty());
        publisher.end_snapshot(QueryId(5)).unwrap();
        assert_eq!(publisher.id(), QueryId(5));
        assert_eq!(receiver.drain(), vec![value(1, 1)]);
    }

    #[test]
    fn test_snapshot_overlap_is_deduplicated() {
        let (publisher, receiver) = publisher(InterruptionPolicy::BreakQuery);
        publisher.begin_snapshot();
        publisher.push(value(2, 2)).unwrap();
        publisher.push(value(3, 3)).unwrap();
        publisher
            .push_snapshot(vec![value(1, 1), value(2, 2)])
            .unwrap();
        publisher.end_snapshot(QueryId(1)).unwrap();
        let delivered: Vec<u64> = receiver.drain().iter().map(|v| v.sequence.0).collect();
        assert_eq!(delivered, vec![1, 2, 3]);
        assert_eq!(publisher.next_sequence(), Sequence(4));
    }

    #[test]
    fn test_recover_data_resumes_at_next_sequence() {
        let (publisher, _receiver) = publisher(InterruptionPolicy::RecoverData);
        let recovery = publisher.begin_recovery().unwrap();
        assert_eq!(recovery.range(), &Range::TOTAL);

        publisher.end_recovery(QueryId(2)).unwrap();
        publisher.push(value(9, 9)).unwrap();
        let recovery = publisher.begin_recovery().unwrap();
        assert_eq!(recovery.range().start(), Point::Sequence(Sequence(10)));
        assert_eq!(recovery.range().end(), Point::Sequence(Sequence::LAST));
        assert_eq!(publisher.id(), QueryId::UNASSIGNED);
    }

    #[test]
    fn test_ignore_continue_resumes_at_present() {
        let (publisher, _receiver) = publisher(InterruptionPolicy::IgnoreContinue);
        let recovery = publisher.begin_recovery().unwrap();
        assert_eq!(recovery.range(), &Range::REAL_TIME);
    }

    #[test]
    fn test_break_query_closes_sink() {
        let (publisher, receiver) = publisher(InterruptionPolicy::BreakQuery);
        assert_eq!(publisher.begin_recovery(), Err(QueryError::QueryInterrupted));
        assert_eq!(receiver.recv(), Err(QueryError::QueryInterrupted));
    }
}
