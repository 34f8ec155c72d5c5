//! Integration tests for the two-phase subscription registries.

use seqquery::{
    translate, BasicQuery, DataStore, DataType, Evaluator, Expression, ExpressionSubscriptions,
    IndexedExpressionSubscriptions, IndexedSubscriptions, IndexedValue, LocalDataStore, QueryId,
    QueryResult, Range, Sequence, SequencedValue, SnapshotLimit, Subscriptions, Timestamp,
    UpdatePolicy,
};

fn value(v: i64, s: u64) -> SequencedValue<i64> {
    SequencedValue::new(v, Sequence(s))
}

fn indexed(v: i64, index: &str, s: u64) -> SequencedValue<IndexedValue<i64, String>> {
    SequencedValue::new(IndexedValue::new(v, index.to_string()), Sequence(s))
}

fn publish(subscriptions: &Subscriptions<i64, u32>, v: SequencedValue<i64>) -> Vec<u32> {
    let mut clients = Vec::new();
    subscriptions.publish(&v, |c| clients.extend_from_slice(c));
    clients
}

// --- Snapshot And Live Stitching ---

#[test]
fn test_store_snapshot_stitched_to_live_values() {
    let store = LocalDataStore::<String, i64>::new();
    let subscriptions = Subscriptions::<i64, u32>::new();
    for s in 1..=3 {
        store.store(indexed(s as i64, "a", s)).unwrap();
    }

    let query = BasicQuery::new("a".to_string())
        .with_range(Range::TOTAL)
        .with_snapshot_limit(SnapshotLimit::UNLIMITED);
    let id = subscriptions.init(7, *query.range(), query.filter_evaluator().unwrap());

    // Published while the snapshot loads, one of them already stored.
    for s in 3..=4 {
        store.store(indexed(s as i64, "a", s)).unwrap();
        assert!(publish(&subscriptions, value(s as i64, s)).is_empty());
    }
    let snapshot = store.load(&query).unwrap();

    let mut delivered = Vec::new();
    subscriptions.commit(QueryResult::new(id, snapshot), |result| {
        delivered = result.snapshot;
    });
    assert_eq!(publish(&subscriptions, value(5, 5)), vec![7]);

    let sequences: Vec<u64> = delivered.iter().map(|v| v.sequence.0).collect();
    assert_eq!(sequences, vec![1, 2, 3, 4]);
}

#[test]
fn test_values_after_snapshot_not_repeated() {
    let subscriptions = Subscriptions::<i64, u32>::new();
    let id = subscriptions.init(1, Range::TOTAL, Evaluator::constant(true));
    publish(&subscriptions, value(2, 2));
    let mut delivered = Vec::new();
    subscriptions.commit(
        QueryResult::new(id, vec![value(1, 1), value(2, 2), value(3, 3)]),
        |result| delivered = result.snapshot,
    );
    assert_eq!(delivered, vec![value(1, 1), value(2, 2), value(3, 3)]);
}

#[test]
fn test_real_time_subscription_receives_any_sequence() {
    let subscriptions = Subscriptions::<i64, u32>::new();
    subscriptions.add(1, Range::REAL_TIME, Evaluator::constant(true));
    assert_eq!(publish(&subscriptions, value(1, 1)), vec![1]);
}

#[test]
fn test_ended_subscription_commit_ignored() {
    let subscriptions = Subscriptions::<i64, u32>::new();
    let id = subscriptions.init(1, Range::TOTAL, Evaluator::constant(true));
    subscriptions.end(id);
    let mut called = false;
    subscriptions.commit(QueryResult::new(id, Vec::new()), |_| called = true);
    assert!(!called);
}

// --- Indexed Dispatch ---

#[test]
fn test_indexed_subscriptions_isolate_indices() {
    let subscriptions = IndexedSubscriptions::<i64, String, u32>::new();
    let a = "a".to_string();
    let b = "b".to_string();
    let first = subscriptions.init(&a, 1, Range::TOTAL, Evaluator::constant(true));
    let second = subscriptions.init(&b, 2, Range::TOTAL, Evaluator::constant(true));
    assert_eq!(first, QueryId(1));
    assert_eq!(second, QueryId(1));

    subscriptions.publish(&indexed(10, "a", 1), |_| panic!("initializing"));
    subscriptions.commit(&a, QueryResult::new(first, Vec::new()), |r| {
        assert_eq!(r.snapshot, vec![value(10, 1)]);
    });

    let mut clients = Vec::new();
    subscriptions.publish(&indexed(11, "a", 2), |c| clients.extend_from_slice(c));
    assert_eq!(clients, vec![1]);

    subscriptions.end(&b, second);
    subscriptions.publish(&indexed(12, "b", 3), |_| panic!("ended"));
}

// --- Expression Subscriptions ---

fn running_total() -> Evaluator {
    translate(&Expression::add(
        Expression::parameter(0, DataType::Int),
        Expression::constant(100),
    ))
    .unwrap()
}

#[test]
fn test_expression_subscription_round_trip() {
    let subscriptions = ExpressionSubscriptions::<i64, i64, u32>::new();
    let positive = translate(&Expression::greater(
        Expression::parameter(0, DataType::Int),
        Expression::constant(0),
    ))
    .unwrap();
    subscriptions
        .init(3, QueryId(4), Range::TOTAL, positive, UpdatePolicy::All, running_total())
        .unwrap();

    let mut live = Vec::new();
    subscriptions.publish(&value(-1, 3), |c, id, out| live.push((*c, id, out)));
    subscriptions.publish(&value(2, 4), |c, id, out| live.push((*c, id, out)));
    assert!(live.is_empty());

    let mut outputs = Vec::new();
    subscriptions.commit(
        &3,
        SnapshotLimit::UNLIMITED,
        QueryResult::new(QueryId(4), Vec::new()),
        vec![value(1, 1)],
        |result| outputs = result.snapshot,
    );
    assert_eq!(outputs, vec![value(101, 1), value(102, 4)]);

    subscriptions.publish(&value(3, 5), |c, id, out| live.push((*c, id, out)));
    assert_eq!(live, vec![(3, QueryId(4), value(103, 5))]);
}

#[test]
fn test_indexed_expression_subscriptions_route_by_index() {
    let subscriptions = IndexedExpressionSubscriptions::<i64, i64, String, u32>::new();
    for (index, client) in [("a", 1), ("b", 2)] {
        subscriptions
            .init(
                index.to_string(),
                client,
                QueryId(1),
                Range::TOTAL,
                Evaluator::constant(true),
                UpdatePolicy::All,
                running_total(),
            )
            .unwrap();
        subscriptions.commit(
            &index.to_string(),
            &client,
            SnapshotLimit::NONE,
            QueryResult::new(QueryId(1), Vec::new()),
            Vec::new(),
            |_| {},
        );
    }

    let mut live = Vec::new();
    subscriptions.publish(&indexed(1, "b", 1), |c, id, out| live.push((*c, id, out)));
    assert_eq!(live, vec![(2, QueryId(1), value(101, 1))]);

    subscriptions.remove_all(&2);
    live.clear();
    subscriptions.publish(&indexed(1, "b", 2), |c, id, out| live.push((*c, id, out)));
    assert!(live.is_empty());
}

// --- Timestamp Ranges ---

fn dated(year: i32, s: u64) -> SequencedValue<Timestamp> {
    SequencedValue::new(Timestamp::ymd_hms(year, 6, 1, 12, 0, 0), Sequence(s))
}

fn publish_dated(subscriptions: &Subscriptions<Timestamp, u32>, v: SequencedValue<Timestamp>) -> Vec<u32> {
    let mut clients = Vec::new();
    subscriptions.publish(&v, |c| clients.extend_from_slice(c));
    clients
}

#[test]
fn test_timestamp_start_gates_live_values() {
    let subscriptions = Subscriptions::<Timestamp, u32>::new();
    let range = Range::new(Timestamp::ymd_hms(2020, 1, 1, 0, 0, 0), Sequence::LAST);
    let id = subscriptions.init(3, range, Evaluator::constant(true));
    assert_ne!(id, QueryId::UNASSIGNED);
    subscriptions.commit(QueryResult::new(id, Vec::new()), |_| {});

    assert!(publish_dated(&subscriptions, dated(2019, 1)).is_empty());
    assert_eq!(publish_dated(&subscriptions, dated(2021, 2)), vec![3]);
}

#[test]
fn test_timestamp_end_not_subscribable() {
    let subscriptions = Subscriptions::<Timestamp, u32>::new();
    let range = Range::new(
        Timestamp::ymd_hms(2020, 1, 1, 0, 0, 0),
        Timestamp::ymd_hms(2021, 1, 1, 0, 0, 0),
    );
    assert_eq!(subscriptions.init(3, range, Evaluator::constant(true)), QueryId::UNASSIGNED);
    assert_eq!(subscriptions.subscription_count(), 0);
}

#[test]
fn test_scalars_never_match_timestamp_range() {
    let subscriptions = Subscriptions::<i64, u32>::new();
    let range = Range::new(Timestamp::ymd_hms(2020, 1, 1, 0, 0, 0), Sequence::LAST);
    let id = subscriptions.init(3, range, Evaluator::constant(true));
    subscriptions.commit(QueryResult::new(id, Vec::new()), |_| {});
    assert!(publish(&subscriptions, value(1, 1)).is_empty());
    assert!(publish(&subscriptions, value(i64::MAX, 2)).is_empty());
}

#[test]
fn test_expression_timestamp_range_bounds_outputs() {
    let subscriptions = ExpressionSubscriptions::<Timestamp, Timestamp, u32>::new();
    let identity = || translate(&Expression::parameter(0, DataType::Timestamp)).unwrap();
    let open = Range::new(Timestamp::ymd_hms(2020, 1, 1, 0, 0, 0), Sequence::LAST);
    let bounded = Range::new(
        Timestamp::ymd_hms(2020, 1, 1, 0, 0, 0),
        Timestamp::ymd_hms(2022, 1, 1, 0, 0, 0),
    );
    for (id, range) in [(QueryId(1), open), (QueryId(2), bounded)] {
        subscriptions
            .init(3, id, range, Evaluator::constant(true), UpdatePolicy::All, identity())
            .unwrap();
        subscriptions.commit(&3, SnapshotLimit::NONE, QueryResult::new(id, Vec::new()), Vec::new(), |_| {});
    }

    let mut delivered = Vec::new();
    for (year, s) in [(2019, 1), (2021, 2), (2023, 3)] {
        subscriptions.publish(&dated(year, s), |_, id, out| delivered.push((id, out.sequence)));
    }
    delivered.sort();
    assert_eq!(
        delivered,
        vec![(QueryId(1), Sequence(2)), (QueryId(1), Sequence(3)), (QueryId(2), Sequence(2))]
    );
}

#[test]
fn test_expression_scalars_never_match_timestamp_range() {
    let subscriptions = ExpressionSubscriptions::<i64, i64, u32>::new();
    let range = Range::new(Timestamp::ymd_hms(2020, 1, 1, 0, 0, 0), Sequence::LAST);
    subscriptions
        .init(
            3,
            QueryId(1),
            range,
            Evaluator::constant(true),
            UpdatePolicy::All,
            running_total(),
        )
        .unwrap();
    subscriptions.commit(&3, SnapshotLimit::NONE, QueryResult::new(QueryId(1), Vec::new()), Vec::new(), |_| {});
    let mut delivered = 0;
    subscriptions.publish(&value(5, 1), |_, _, _| delivered += 1);
    assert_eq!(delivered, 0);
}
