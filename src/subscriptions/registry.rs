//! Two-phase registry of live queries over a single stream.

use super::{accepts, reconcile, SubscriptionState};
use crate::expression::{Bindable, Evaluator};
use crate::query::{QueryResult, Range};
use crate::types::{QueryId, SequencedValue, Timestamped};
use parking_lot::{Mutex, RwLock};
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};

/// Internal subscription state.
struct SubscriptionEntry<V> {
    state: SubscriptionState,
    range: Range,
    filter: Evaluator,
    /// Matches published while initializing.
    write_log: Vec<SequencedValue<V>>,
}

struct Entries<V, C> {
    /// Keyed by client first so a client's subscriptions are adjacent.
    by_client: BTreeMap<(C, QueryId), Arc<Mutex<SubscriptionEntry<V>>>>,
    clients: HashMap<QueryId, C>,
}

/// Registry of live queries, each owned by a client of type `C`.
///
/// Ids are assigned by the registry, starting at 1. Only open-ended ranges
/// (ending at `Sequence::LAST`) can be registered.
pub struct Subscriptions<V, C> {
    entries: RwLock<Entries<V, C>>,
    next_id: AtomicI32,
}

impl<V, C> Subscriptions<V, C>
where
    V: Clone + Bindable + Timestamped,
    C: Clone + Ord,
{
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(Entries {
                by_client: BTreeMap::new(),
                clients: HashMap::new(),
            }),
            next_id: AtomicI32::new(0),
        }
    }

    /// Registers and immediately commits a query with no snapshot.
    pub fn add(&self, client: C, range: Range, filter: Evaluator) -> QueryId {
        let id = self.init(client, range, filter);
        self.commit(QueryResult::new(id, Vec::new()), |_| {});
        id
    }

    /// Registers a query in the initializing state.
    ///
    /// Returns `QueryId::UNASSIGNED` if the range does not reach into live
    /// data.
    pub fn init(&self, client: C, range: Range, filter: Evaluator) -> QueryId {
        if !range.is_open_ended() {
            debug!(%range, "rejecting subscription with bounded range");
            return QueryId::UNASSIGNED;
        }
        let id = QueryId(self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let entry = SubscriptionEntry {
            state: SubscriptionState::Initializing,
            range,
            filter,
            write_log: Vec::new(),
        };
        let mut entries = self.entries.write();
        entries.clients.insert(id, client.clone());
        entries
            .by_client
            .insert((client, id), Arc::new(Mutex::new(entry)));
        debug!(%id, %range, "subscription initialized");
        id
    }

    /// Reconciles a loaded snapshot with the values buffered since `init`
    /// and passes the result to `f`.
    ///
    /// A result with an unassigned id is passed through unchanged. Unknown or
    /// already committed ids are ignored. `f` runs while the entry is locked,
    /// so no live value for this subscription is delivered before it returns.
    pub fn commit<F>(&self, mut result: QueryResult<SequencedValue<V>>, f: F)
    where
        F: FnOnce(QueryResult<SequencedValue<V>>),
    {
        if !result.id.is_assigned() {
            f(result);
            return;
        }
        let entry = {
            let entries = self.entries.read();
            let Some(client) = entries.clients.get(&result.id) else {
                return;
            };
            match entries.by_client.get(&(client.clone(), result.id)) {
                Some(entry) => Arc::clone(entry),
                None => return,
            }
        };
        let mut entry = entry.lock();
        if entry.state != SubscriptionState::Initializing {
            return;
        }
        let write_log = std::mem::take(&mut entry.write_log);
        debug!(id = %result.id, snapshot = result.snapshot.len(), buffered = write_log.len(), "subscription committed");
        reconcile(&mut result.snapshot, write_log);
        entry.state = SubscriptionState::Committed;
        f(result);
    }

    /// Removes a subscription. Unknown ids are ignored.
    pub fn end(&self, id: QueryId) {
        let mut entries = self.entries.write();
        if let Some(client) = entries.clients.remove(&id) {
            entries.by_client.remove(&(client, id));
            debug!(%id, "subscription ended");
        }
    }

    /// Removes every subscription belonging to `client`.
    pub fn remove_all(&self, client: &C) {
        let mut entries = self.entries.write();
        let before = entries.by_client.len();
        entries.by_client.retain(|(owner, _), _| owner != client);
        entries.clients.retain(|_, owner| owner != client);
        debug!(removed = before - entries.by_client.len(), "client subscriptions removed");
    }

    /// Publishes to every client.
    pub fn publish<S>(&self, value: &SequencedValue<V>, sender: S)
    where
        S: FnOnce(&[C]),
    {
        self.publish_filtered(value, |_| true, sender);
    }

    /// Publishes a value to the clients passing `client_filter`.
    ///
    /// Initializing subscriptions buffer the value. Each client with a
    /// committed match is listed once, and `sender` is called once with the
    /// list if it is not empty. A client is considered at most once per
    /// value: after its first match (or its rejection by `client_filter`) its
    /// remaining subscriptions are skipped.
    pub fn publish_filtered<F, S>(&self, value: &SequencedValue<V>, client_filter: F, sender: S)
    where
        F: Fn(&C) -> bool,
        S: FnOnce(&[C]),
    {
        let mut receiving = Vec::new();
        {
            let entries = self.entries.read();
            let mut last_client: Option<&C> = None;
            for ((client, id), entry) in entries.by_client.iter() {
                if last_client == Some(client) {
                    continue;
                }
                if !client_filter(client) {
                    last_client = Some(client);
                    continue;
                }
                let mut entry = entry.lock();
                let SubscriptionEntry {
                    state,
                    range,
                    filter,
                    write_log,
                } = &mut *entry;
                if !accepts(range, filter, value) {
                    continue;
                }
                last_client = Some(client);
                match state {
                    SubscriptionState::Initializing => {
                        trace!(%id, sequence = ?value.sequence, "buffering value");
                        write_log.push(value.clone());
                    }
                    SubscriptionState::Committed => receiving.push(client.clone()),
                }
            }
        }
        if !receiving.is_empty() {
            sender(&receiving);
        }
    }

    /// Number of registered subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.entries.read().by_client.len()
    }
}

impl<V, C> Default for Subscriptions<V, C>
where
    V: Clone + Bindable + Timestamped,
    C: Clone + Ord,
{
    fn default() -> Self {
        Self::new()
    }
}
