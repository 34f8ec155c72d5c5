//! Subscriptions that evaluate an expression over each matching value.

use super::{accepts, reconcile, SubscriptionState};
use crate::error::{QueryError, Result};
use crate::expression::{Bindable, Evaluator, FromValue};
use crate::query::{QueryResult, Range, SnapshotLimit, SnapshotLimitType, UpdatePolicy};
use crate::types::{QueryId, SequencedValue, Timestamped};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, trace};

struct ExpressionEntry<In, Out> {
    state: SubscriptionState,
    range: Range,
    filter: Evaluator,
    update_policy: UpdatePolicy,
    expression: Evaluator,
    previous: Option<Out>,
    /// Raw inputs matched while initializing, evaluated at commit.
    write_log: Vec<SequencedValue<In>>,
}

impl<In: Bindable, Out: FromValue + Clone + PartialEq> ExpressionEntry<In, Out> {
    /// Evaluates the expression against one input. Returns `None` when the
    /// evaluation fails or, under `UpdatePolicy::Change`, when the output
    /// repeats the previous one.
    fn evaluate(&mut self, input: &SequencedValue<In>) -> Option<SequencedValue<Out>> {
        let output = match self.expression.eval_with::<Out>(&input.value) {
            Ok(output) => output,
            Err(e) => {
                debug!(error = %e, sequence = ?input.sequence, "expression evaluation failed, dropping value");
                return None;
            }
        };
        if self.update_policy == UpdatePolicy::Change {
            if self.previous.as_ref() == Some(&output) {
                return None;
            }
            self.previous = Some(output.clone());
        }
        Some(SequencedValue::new(output, input.sequence))
    }
}

type SharedEntry<In, Out> = Arc<Mutex<ExpressionEntry<In, Out>>>;

/// Registry of expression queries. Clients choose their own query ids.
///
/// Inputs are buffered unevaluated while a query initializes and evaluated
/// in sequence order at commit, so stateful expressions see every input
/// exactly once.
pub struct ExpressionSubscriptions<In, Out, C> {
    entries: RwLock<BTreeMap<(C, QueryId), SharedEntry<In, Out>>>,
}

impl<In, Out, C> ExpressionSubscriptions<In, Out, C>
where
    In: Clone + Bindable + Timestamped,
    Out: FromValue + Clone + PartialEq,
    C: Clone + Ord,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
        }
    }

    /// Registers a query in the initializing state.
    ///
    /// Fails with `DuplicateQuery` if `client` already has a query `id`.
    pub fn init(
        &self,
        client: C,
        id: QueryId,
        range: Range,
        filter: Evaluator,
        update_policy: UpdatePolicy,
        expression: Evaluator,
    ) -> Result<()> {
        let mut entries = self.entries.write();
        let key = (client, id);
        if entries.contains_key(&key) {
            return Err(QueryError::DuplicateQuery(id));
        }
        entries.insert(
            key,
            Arc::new(Mutex::new(ExpressionEntry {
                state: SubscriptionState::Initializing,
                range,
                filter,
                update_policy,
                expression,
                previous: None,
                write_log: Vec::new(),
            })),
        );
        debug!(%id, %range, ?update_policy, "expression subscription initialized");
        Ok(())
    }

    /// Evaluates the loaded input `snapshot` together with the inputs
    /// buffered since `init`, and passes the outputs to `f` in `result`.
    ///
    /// With a `Tail` limit only the last `size` outputs are kept and placed
    /// ahead of any outputs already in `result`; otherwise `result.snapshot`
    /// is replaced by every output. Unknown or already committed queries are
    /// ignored.
    pub fn commit<F>(
        &self,
        client: &C,
        snapshot_limit: SnapshotLimit,
        mut result: QueryResult<SequencedValue<Out>>,
        mut snapshot: Vec<SequencedValue<In>>,
        f: F,
    ) where
        F: FnOnce(QueryResult<SequencedValue<Out>>),
    {
        let Some(entry) = self.find(client, result.id) else {
            return;
        };
        let mut entry = entry.lock();
        if entry.state != SubscriptionState::Initializing {
            return;
        }
        let write_log = std::mem::take(&mut entry.write_log);
        reconcile(&mut snapshot, write_log);
        match snapshot_limit.limit_type() {
            SnapshotLimitType::Tail => {
                let capacity = snapshot_limit.len();
                let mut tail = VecDeque::new();
                for input in &snapshot {
                    if let Some(output) = entry.evaluate(input) {
                        if tail.len() == capacity {
                            tail.pop_front();
                        }
                        tail.push_back(output);
                    }
                }
                let mut outputs = Vec::from(tail);
                outputs.append(&mut result.snapshot);
                result.snapshot = outputs;
            }
            SnapshotLimitType::Head => {
                result.snapshot = snapshot
                    .iter()
                    .filter_map(|input| entry.evaluate(input))
                    .collect();
            }
        }
        debug!(id = %result.id, outputs = result.snapshot.len(), "expression subscription committed");
        entry.state = SubscriptionState::Committed;
        f(result);
    }

    /// Removes one query. Unknown queries are ignored.
    pub fn end(&self, client: &C, id: QueryId) {
        if self.entries.write().remove(&(client.clone(), id)).is_some() {
            debug!(%id, "expression subscription ended");
        }
    }

    /// Removes every query belonging to `client`.
    pub fn remove_all(&self, client: &C) {
        let mut entries = self.entries.write();
        let before = entries.len();
        entries.retain(|(owner, _), _| owner != client);
        debug!(removed = before - entries.len(), "client expression subscriptions removed");
    }

    /// Publishes an input. Initializing queries buffer it; committed queries
    /// evaluate it and `sender` is called once per delivered output.
    pub fn publish<S>(&self, value: &SequencedValue<In>, mut sender: S)
    where
        S: FnMut(&C, QueryId, SequencedValue<Out>),
    {
        let mut deliveries = Vec::new();
        {
            let entries = self.entries.read();
            for ((client, id), entry) in entries.iter() {
                let mut entry = entry.lock();
                let entry = &mut *entry;
                if !accepts(&entry.range, &mut entry.filter, value) {
                    continue;
                }
                match entry.state {
                    SubscriptionState::Initializing => {
                        trace!(%id, sequence = ?value.sequence, "buffering input");
                        entry.write_log.push(value.clone());
                    }
                    SubscriptionState::Committed => {
                        if let Some(output) = entry.evaluate(value) {
                            deliveries.push((client.clone(), *id, output));
                        }
                    }
                }
            }
        }
        for (client, id, output) in deliveries {
            sender(&client, id, output);
        }
    }

    /// Number of registered queries.
    pub fn subscription_count(&self) -> usize {
        self.entries.read().len()
    }

    fn find(&self, client: &C, id: QueryId) -> Option<SharedEntry<In, Out>> {
        self.entries.read().get(&(client.clone(), id)).cloned()
    }
}

impl<In, Out, C> Default for ExpressionSubscriptions<In, Out, C>
where
    In: Clone + Bindable + Timestamped,
    Out: FromValue + Clone + PartialEq,
    C: Clone + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
