//! Generic async resource store.
//!
//! A store holds one piece of domain data mirrored from the API together with
//! the lifecycle of the requests that feed it. State lives in a
//! [`tokio::sync::watch`] channel, so observers receive every transition and
//! only the store's own completion handlers ever write to it.

use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Instant;

use dashmap::DashMap;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::error::ClientError;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, PartialEq)]
pub struct ResourceState<T> {
    pub data: T,
    pub loading: bool,
    pub error: Option<String>,
    pub success: Option<String>,
}

impl<T> ResourceState<T> {
    fn new(data: T) -> Self {
        Self {
            data,
            loading: false,
            error: None,
            success: None,
        }
    }

    pub fn outcome(&self) -> RequestOutcome {
        if self.loading {
            RequestOutcome::Pending
        } else if let Some(message) = &self.error {
            RequestOutcome::Failed(message.clone())
        } else if let Some(message) = &self.success {
            RequestOutcome::Succeeded(message.clone())
        } else {
            RequestOutcome::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestOutcome {
    Idle,
    Pending,
    Succeeded(String),
    Failed(String),
}

/// What to do with a fetch response that resolves after a newer one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Sequencing {
    #[default]
    LastWriteWins,
    DiscardStale,
}

impl FromStr for Sequencing {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "last-write-wins" | "lww" => Ok(Sequencing::LastWriteWins),
            "discard-stale" | "sequenced" => Ok(Sequencing::DiscardStale),
            other => Err(format!("unknown sequencing policy '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    /// Replaces held data wholesale; subject to sequencing.
    Read,
    /// Patches held data or only reports success; always applied.
    Write,
}

/// Static description of one store operation.
#[derive(Debug, Clone, Copy)]
pub struct Operation {
    pub name: &'static str,
    pub kind: OpKind,
    /// Shown when the API gives no message of its own.
    pub fallback_error: &'static str,
}

impl Operation {
    pub const fn read(name: &'static str, fallback_error: &'static str) -> Self {
        Self {
            name,
            kind: OpKind::Read,
            fallback_error,
        }
    }

    pub const fn write(name: &'static str, fallback_error: &'static str) -> Self {
        Self {
            name,
            kind: OpKind::Write,
            fallback_error,
        }
    }
}

struct Sequencer {
    policy: Sequencing,
    issued: DashMap<&'static str, u64>,
    applied: DashMap<&'static str, u64>,
}

impl Sequencer {
    fn new(policy: Sequencing) -> Self {
        Self {
            policy,
            issued: DashMap::new(),
            applied: DashMap::new(),
        }
    }

    fn issue(&self, op: &'static str) -> u64 {
        let mut ticket = self.issued.entry(op).or_insert(0);
        *ticket += 1;
        *ticket
    }

    fn accept(&self, op: &Operation, ticket: u64) -> bool {
        if self.policy == Sequencing::LastWriteWins || op.kind == OpKind::Write {
            return true;
        }
        let mut newest = self.applied.entry(op.name).or_insert(0);
        if ticket < *newest {
            return false;
        }
        *newest = ticket;
        true
    }
}

pub struct ResourceStore<T> {
    name: &'static str,
    state: watch::Sender<ResourceState<T>>,
    in_flight: AtomicUsize,
    sequencer: Sequencer,
    metrics: Metrics,
}

impl<T> ResourceStore<T> {
    pub fn new(name: &'static str, initial: T, sequencing: Sequencing, metrics: Metrics) -> Self {
        Self {
            name,
            state: watch::Sender::new(ResourceState::new(initial)),
            in_flight: AtomicUsize::new(0),
            sequencer: Sequencer::new(sequencing),
            metrics,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn subscribe(&self) -> watch::Receiver<ResourceState<T>> {
        self.state.subscribe()
    }

    pub fn snapshot(&self) -> ResourceState<T>
    where
        T: Clone,
    {
        self.state.borrow().clone()
    }

    /// Reads held data without cloning the whole state.
    pub fn read<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.state.borrow().data)
    }

    pub fn is_loading(&self) -> bool {
        self.state.borrow().loading
    }

    pub fn outcome(&self) -> RequestOutcome {
        self.state.borrow().outcome()
    }

    /// Takes the `(error, success)` pair, leaving both empty. Observers are
    /// only woken if something was set.
    pub fn take_messages(&self) -> (Option<String>, Option<String>) {
        let mut taken = (None, None);
        self.state.send_if_modified(|state| {
            taken = (state.error.take(), state.success.take());
            taken.0.is_some() || taken.1.is_some()
        });
        taken
    }

    /// Resets error and success after the UI has shown them. Held data and
    /// the loading flag are left alone.
    pub fn clear_state(&self) {
        self.state.send_modify(|state| {
            state.error = None;
            state.success = None;
        });
    }

    /// Records a failure that never reached the API.
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        warn!(store = self.name, error = %message, "operation failed locally");
        self.state.send_modify(|state| {
            state.success = None;
            state.error = Some(message);
        });
    }

    /// Changes held data outside of a request, e.g. when restoring or
    /// dropping a session.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        self.state.send_modify(|state| f(&mut state.data));
    }

    /// Runs one operation through the request lifecycle.
    ///
    /// `apply` merges a successful response into held data and returns the
    /// success message to surface, if any. On failure held data is not
    /// touched and the error is reduced to a display string.
    pub async fn run<R, Fut, F>(&self, op: Operation, request: Fut, apply: F) -> Result<R, ClientError>
    where
        Fut: Future<Output = Result<R, ClientError>>,
        F: FnOnce(&mut T, &R) -> Option<String>,
    {
        let ticket = self.sequencer.issue(op.name);
        let guard = InFlight::enter(self);
        self.begin(&op);

        let started = Instant::now();
        let result = request.await;
        let elapsed = started.elapsed();
        guard.settle();

        match &result {
            Ok(value) => {
                self.metrics.observe(self.name, op.name, "success", elapsed);
                // Staleness is decided under the state lock so a newer
                // response can never be overwritten by an older one.
                let mut applied = false;
                self.state.send_modify(|state| {
                    state.loading = self.in_flight.load(Ordering::SeqCst) > 0;
                    if !self.sequencer.accept(&op, ticket) {
                        return;
                    }
                    applied = true;
                    // A quiet completion must not wipe messages another
                    // operation left for the relay.
                    if let Some(message) = apply(&mut state.data, value) {
                        state.success = Some(message);
                    }
                });
                if !applied {
                    debug!(store = self.name, op = op.name, ticket, "discarding stale response");
                }
                info!(
                    store = self.name,
                    op = op.name,
                    elapsed_ms = elapsed.as_millis() as u64,
                    applied,
                    "operation succeeded"
                );
            }
            Err(err) => {
                self.metrics.observe(self.name, op.name, "error", elapsed);
                let message = err.display_message(op.fallback_error);
                warn!(
                    store = self.name,
                    op = op.name,
                    status = err.status(),
                    error = %err,
                    "operation failed"
                );
                self.state.send_modify(|state| {
                    state.loading = self.in_flight.load(Ordering::SeqCst) > 0;
                    state.error = Some(message);
                });
            }
        }

        result
    }

    fn begin(&self, op: &Operation) {
        debug!(store = self.name, op = op.name, "operation pending");
        self.state.send_modify(|state| {
            state.loading = true;
            state.error = None;
            state.success = None;
        });
    }
}

/// Membership of one operation in a store's in-flight count.
///
/// Settled explicitly once the response is in. If the operation is dropped
/// first, the count is released on drop and `loading` recomputed.
struct InFlight<'a, T> {
    store: &'a ResourceStore<T>,
    settled: bool,
}

impl<'a, T> InFlight<'a, T> {
    fn enter(store: &'a ResourceStore<T>) -> Self {
        store.in_flight.fetch_add(1, Ordering::SeqCst);
        store.metrics.requests_in_flight.inc();
        Self {
            store,
            settled: false,
        }
    }

    fn settle(mut self) {
        self.leave();
        self.settled = true;
    }

    fn leave(&self) {
        self.store.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.store.metrics.requests_in_flight.dec();
    }
}

impl<T> Drop for InFlight<'_, T> {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        self.leave();
        let store = self.store;
        debug!(store = store.name, "operation dropped before completion");
        store.state.send_modify(|state| {
            state.loading = store.in_flight.load(Ordering::SeqCst) > 0;
        });
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::{Semaphore, oneshot};

    use super::*;

    const FETCH: Operation = Operation::read("fetch", "Failed to fetch items");
    const RENAME: Operation = Operation::write("rename", "Failed to rename item");

    fn store(items: Vec<&str>) -> ResourceStore<Vec<String>> {
        store_with(items, Sequencing::LastWriteWins)
    }

    fn store_with(items: Vec<&str>, sequencing: Sequencing) -> ResourceStore<Vec<String>> {
        ResourceStore::new(
            "items",
            items.into_iter().map(str::to_string).collect(),
            sequencing,
            Metrics::new(),
        )
    }

    fn replace_all(data: &mut Vec<String>, items: &Vec<String>) -> Option<String> {
        *data = items.clone();
        None
    }

    #[tokio::test]
    async fn successful_fetch_replaces_data() {
        let store = store(vec!["old"]);
        let response = vec!["a".to_string(), "b".to_string()];

        let result = store
            .run(FETCH, async { Ok(response.clone()) }, replace_all)
            .await;

        assert!(result.is_ok());
        let state = store.snapshot();
        assert_eq!(state.data, response);
        assert!(!state.loading);
        assert_eq!(state.outcome(), RequestOutcome::Idle);
    }

    #[tokio::test]
    async fn failed_fetch_keeps_prior_data_and_uses_fallback() {
        let store = store(vec!["kept"]);

        let result = store
            .run(
                FETCH,
                async { Err::<Vec<String>, _>(ClientError::Transport("refused".to_string())) },
                replace_all,
            )
            .await;

        assert!(result.is_err());
        let state = store.snapshot();
        assert_eq!(state.data, vec!["kept".to_string()]);
        assert_eq!(state.error.as_deref(), Some("Failed to fetch items"));
        assert_eq!(
            state.outcome(),
            RequestOutcome::Failed("Failed to fetch items".to_string())
        );
    }

    #[tokio::test]
    async fn api_message_is_surfaced() {
        let store = store(vec![]);
        let _ = store
            .run(
                RENAME,
                async {
                    Err::<(), _>(ClientError::Api {
                        status: 403,
                        message: Some("Not allowed".to_string()),
                    })
                },
                |_, _| None,
            )
            .await;
        assert_eq!(store.snapshot().error.as_deref(), Some("Not allowed"));
    }

    #[tokio::test]
    async fn clear_state_never_touches_data() {
        let store = store(vec!["x"]);
        store
            .run(RENAME, async { Ok(()) }, |data, _| {
                data.push("y".to_string());
                Some("Renamed".to_string())
            })
            .await
            .unwrap();
        assert_eq!(store.outcome(), RequestOutcome::Succeeded("Renamed".to_string()));

        store.clear_state();
        let state = store.snapshot();
        assert_eq!(state.data, vec!["x".to_string(), "y".to_string()]);
        assert_eq!(state.error, None);
        assert_eq!(state.success, None);

        store.fail("boom");
        store.clear_state();
        assert_eq!(store.outcome(), RequestOutcome::Idle);
    }

    #[tokio::test]
    async fn new_operation_supersedes_previous_outcome() {
        let store = Arc::new(store(vec![]));
        store.fail("first failure");

        let (tx, rx) = oneshot::channel::<()>();
        let pending = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .run(
                        FETCH,
                        async move {
                            let _ = rx.await;
                            Ok(Vec::new())
                        },
                        replace_all,
                    )
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(store.outcome(), RequestOutcome::Pending);
        assert_eq!(store.snapshot().error, None);

        tx.send(()).unwrap();
        pending.await.unwrap().unwrap();
        assert_eq!(store.outcome(), RequestOutcome::Idle);
    }

    #[tokio::test]
    async fn loading_stays_true_while_any_request_is_in_flight() {
        let store = Arc::new(store(vec![]));
        let (slow_tx, slow_rx) = oneshot::channel::<()>();

        let slow = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .run(
                        FETCH,
                        async move {
                            let _ = slow_rx.await;
                            Ok(vec!["slow".to_string()])
                        },
                        replace_all,
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        store
            .run(RENAME, async { Ok(()) }, |_, _| None)
            .await
            .unwrap();
        assert!(store.is_loading());

        slow_tx.send(()).unwrap();
        slow.await.unwrap().unwrap();
        assert!(!store.is_loading());
        assert_eq!(store.snapshot().data, vec!["slow".to_string()]);
    }

    async fn overlapping_fetches(sequencing: Sequencing) -> Vec<String> {
        let store = Arc::new(store_with(vec![], sequencing));
        let (older_tx, older_rx) = oneshot::channel::<()>();

        let older = {
            let store = store.clone();
            tokio::spawn(async move {
                store
                    .run(
                        FETCH,
                        async move {
                            let _ = older_rx.await;
                            Ok(vec!["older".to_string()])
                        },
                        replace_all,
                    )
                    .await
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        store
            .run(FETCH, async { Ok(vec!["newer".to_string()]) }, replace_all)
            .await
            .unwrap();

        older_tx.send(()).unwrap();
        older.await.unwrap().unwrap();
        store.snapshot().data
    }

    #[tokio::test]
    async fn last_write_wins_applies_late_responses() {
        assert_eq!(
            overlapping_fetches(Sequencing::LastWriteWins).await,
            vec!["older".to_string()]
        );
    }

    #[tokio::test]
    async fn discard_stale_drops_late_responses() {
        assert_eq!(
            overlapping_fetches(Sequencing::DiscardStale).await,
            vec!["newer".to_string()]
        );
    }

    #[test]
    fn sequencing_parses_policy_names() {
        assert_eq!(
            "discard-stale".parse::<Sequencing>().unwrap(),
            Sequencing::DiscardStale
        );
        assert_eq!("LWW".parse::<Sequencing>().unwrap(), Sequencing::LastWriteWins);
        assert!("fifo".parse::<Sequencing>().is_err());
    }

    #[test]
    fn writes_are_never_sequenced() {
        let sequencer = Sequencer::new(Sequencing::DiscardStale);
        let first = sequencer.issue(RENAME.name);
        let second = sequencer.issue(RENAME.name);
        assert!(sequencer.accept(&RENAME, second));
        assert!(sequencer.accept(&RENAME, first));

        let a = sequencer.issue(FETCH.name);
        let b = sequencer.issue(FETCH.name);
        assert!(sequencer.accept(&FETCH, b));
        assert!(!sequencer.accept(&FETCH, a));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn newest_fetch_wins_when_responses_race_across_threads() {
        const FETCHES: usize = 32;
        let store = Arc::new(store_with(vec![], Sequencing::DiscardStale));
        let gate = Arc::new(Semaphore::new(0));
        let started = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for idx in 0..FETCHES {
            let (store, gate, counter) = (store.clone(), gate.clone(), started.clone());
            handles.push(tokio::spawn(async move {
                let request = async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _permit = gate
                        .acquire()
                        .await
                        .map_err(|err| ClientError::Transport(err.to_string()))?;
                    Ok(vec![idx.to_string()])
                };
                store.run(FETCH, request, replace_all).await
            }));
            // Tickets follow spawn order only if each fetch has begun first.
            while started.load(Ordering::SeqCst) <= idx {
                tokio::task::yield_now().await;
            }
        }

        gate.add_permits(FETCHES);
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let state = store.snapshot();
        assert_eq!(state.data, vec![(FETCHES - 1).to_string()]);
        assert!(!state.loading);
    }

    #[tokio::test]
    async fn dropped_operation_releases_loading() {
        let metrics = Metrics::new();
        let store = ResourceStore::new(
            "items",
            Vec::<String>::new(),
            Sequencing::default(),
            metrics.clone(),
        );
        let never = std::future::pending::<Result<Vec<String>, ClientError>>();

        let abandoned =
            tokio::time::timeout(Duration::from_millis(20), store.run(FETCH, never, replace_all))
                .await;

        assert!(abandoned.is_err());
        assert!(!store.is_loading());
        assert_eq!(store.in_flight.load(Ordering::SeqCst), 0);
        assert_eq!(metrics.requests_in_flight.get(), 0);
        assert_eq!(store.outcome(), RequestOutcome::Idle);

        store
            .run(FETCH, async { Ok(vec!["after".to_string()]) }, replace_all)
            .await
            .unwrap();
        assert_eq!(store.snapshot().data, vec!["after".to_string()]);
        assert!(!store.is_loading());
    }
}
