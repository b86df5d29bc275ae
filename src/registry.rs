//! The pending-request store.
//!
//! [`TestHttpClient`] records every intercepted request together with the
//! sending half of a one-shot channel. Tests locate entries with a [`Query`],
//! then either settle them through [`PendingRequest::succeed`] /
//! [`PendingRequest::fail`] or evict them without an outcome.
//!
//! Settling removes the entry from the store before the outcome is sent, so
//! code awaiting the response always observes a consistent registry.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use testhttp_commons::TelemetrySink;

use crate::config::RegistryConfig;
use crate::diagnostics::PendingSnapshot;
use crate::error::{RegistryError, RegistryResult};
use crate::matcher::matches;
use crate::query::Query;
use crate::request::{Request, RequestDescriptor, describe_request};
use crate::response::PendingResponse;

/// Identity of a pending entry. Unique within one registry, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct EntryId(u64);

impl EntryId {
    pub(crate) fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

struct Slot<T, E, R> {
    id: EntryId,
    request: Arc<R>,
    responder: oneshot::Sender<Result<T, E>>,
}

struct Store<T, E, R> {
    next_id: u64,
    slots: Vec<Slot<T, E, R>>,
}

impl<T, E, R> Store<T, E, R> {
    fn new() -> Self {
        Self {
            next_id: 1,
            slots: Vec::new(),
        }
    }

    fn allocate_id(&mut self) -> EntryId {
        let id = EntryId::from_raw(self.next_id);
        self.next_id += 1;
        id
    }

    fn take(&mut self, id: EntryId) -> Option<Slot<T, E, R>> {
        let index = self.slots.iter().position(|slot| slot.id == id)?;
        Some(self.slots.remove(index))
    }

    fn contains(&self, id: EntryId) -> bool {
        self.slots.iter().any(|slot| slot.id == id)
    }
}

type SharedStore<T, E, R> = Arc<Mutex<Store<T, E, R>>>;

/// Test double for an HTTP client.
///
/// `T` is the success value delivered to callers, `E` the failure value and
/// `R` the request descriptor type. Clones share the same store, so one clone
/// can be handed to application code while the test keeps another.
pub struct TestHttpClient<T, E = anyhow::Error, R = Request> {
    config: Arc<RegistryConfig>,
    store: SharedStore<T, E, R>,
}

impl<T, E, R> Clone for TestHttpClient<T, E, R> {
    fn clone(&self) -> Self {
        Self {
            config: Arc::clone(&self.config),
            store: Arc::clone(&self.store),
        }
    }
}

impl<T, E, R> Default for TestHttpClient<T, E, R> {
    fn default() -> Self {
        Self::with_config(RegistryConfig::default())
    }
}

impl<T, E, R> fmt::Debug for TestHttpClient<T, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestHttpClient")
            .field("name", &self.config.name)
            .field("pending", &self.len())
            .finish()
    }
}

impl<T, E, R> TestHttpClient<T, E, R> {
    /// Fresh registry with default settings. Call once per test.
    pub fn make() -> Self {
        Self::default()
    }

    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config: Arc::new(config),
            store: Arc::new(Mutex::new(Store::new())),
        }
    }

    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Number of requests still pending.
    pub fn len(&self) -> usize {
        self.store.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.lock().slots.is_empty()
    }

    /// Drop every pending entry without settling it. Their futures never
    /// resolve.
    pub fn reset(&self) {
        let discarded = std::mem::take(&mut self.store.lock().slots);
        debug!(
            client = %self.config.name,
            discarded = discarded.len(),
            "reset pending requests"
        );
    }

    fn handle(&self, id: EntryId, request: Arc<R>) -> PendingRequest<T, E, R> {
        PendingRequest {
            id,
            request,
            config: Arc::clone(&self.config),
            store: Arc::downgrade(&self.store),
        }
    }

    fn evict(&self, ids: &[EntryId]) {
        let evicted: Vec<Slot<T, E, R>> = {
            let mut store = self.store.lock();
            let (evicted, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut store.slots)
                .into_iter()
                .partition(|slot| ids.contains(&slot.id));
            store.slots = kept;
            evicted
        };
        for slot in &evicted {
            debug!(client = %self.config.name, entry = %slot.id, "evicted pending request");
        }
    }
}

impl<T, E, R: RequestDescriptor> TestHttpClient<T, E, R> {
    /// Record `request` and hand back a future for its outcome.
    ///
    /// Never blocks. The future stays pending until the test settles the
    /// matching entry.
    pub fn intercept(&self, request: impl Into<Arc<R>>) -> PendingResponse<T, E> {
        let request = request.into();
        let (responder, receiver) = oneshot::channel();
        let (id, pending) = {
            let mut store = self.store.lock();
            let id = store.allocate_id();
            store.slots.push(Slot {
                id,
                request: Arc::clone(&request),
                responder,
            });
            (id, store.slots.len())
        };
        debug!(
            client = %self.config.name,
            entry = %id,
            method = request.method(),
            url = request.url(),
            pending,
            "intercepted request"
        );
        PendingResponse::new(id, receiver)
    }

    /// The single entry matching `query`.
    ///
    /// Fails with [`RegistryError::NotFound`] when nothing matches and with
    /// [`RegistryError::AmbiguousMatch`] when several entries do. The entry
    /// stays pending.
    pub fn find_one(&self, query: impl Into<Query<R>>) -> RegistryResult<PendingRequest<T, E, R>> {
        let query = query.into();
        self.expect_single(&query)
    }

    /// Evict the single entry matching `query` without settling it.
    pub fn remove_one(&self, query: impl Into<Query<R>>) -> RegistryResult<()> {
        let query = query.into();
        let found = self.expect_single(&query)?;
        self.evict(&[found.id]);
        Ok(())
    }

    /// Every entry matching `query`, in interception order. Fails with
    /// [`RegistryError::NoneFound`] when the result would be empty.
    pub fn find_all(
        &self,
        query: impl Into<Query<R>>,
    ) -> RegistryResult<Vec<PendingRequest<T, E, R>>> {
        let query = query.into();
        self.expect_some(&query)
    }

    /// Evict every entry matching `query` without settling any of them.
    pub fn remove_all(&self, query: impl Into<Query<R>>) -> RegistryResult<()> {
        let query = query.into();
        let ids: Vec<EntryId> = self
            .expect_some(&query)?
            .iter()
            .map(PendingRequest::id)
            .collect();
        self.evict(&ids);
        Ok(())
    }

    /// Every entry matching `query`; empty when nothing matches.
    pub fn match_all(&self, query: impl Into<Query<R>>) -> Vec<PendingRequest<T, E, R>> {
        let query = query.into();
        self.collect(&query)
    }

    /// Fail with [`RegistryError::UnverifiedRequests`] if anything is still
    /// pending. Never mutates the store.
    pub fn verify_none_outstanding(&self) -> RegistryResult<()> {
        let pending: Vec<String> = self
            .store
            .lock()
            .slots
            .iter()
            .map(|slot| describe_request(slot.request.as_ref()))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        if self.config.dump_on_verify_failure {
            for description in &pending {
                warn!(client = %self.config.name, request = %description, "unverified pending request");
            }
        }
        Err(RegistryError::UnverifiedRequests {
            client: self.config.name.clone(),
            pending,
        })
    }

    /// Point-in-time view of every pending entry, in interception order.
    pub fn snapshot(&self) -> Vec<PendingSnapshot> {
        self.store
            .lock()
            .slots
            .iter()
            .map(|slot| PendingSnapshot::capture(slot.id, slot.request.as_ref()))
            .collect()
    }

    /// Emit every pending entry to `sink`, then flush it.
    pub fn dump(&self, sink: &dyn TelemetrySink<PendingSnapshot>) -> anyhow::Result<()> {
        sink.record_batch(&self.snapshot())
    }

    fn collect(&self, query: &Query<R>) -> Vec<PendingRequest<T, E, R>> {
        // Predicates run without the lock held so they may call back into
        // the registry.
        let candidates: Vec<(EntryId, Arc<R>)> = self
            .store
            .lock()
            .slots
            .iter()
            .map(|slot| (slot.id, Arc::clone(&slot.request)))
            .collect();

        let found: Vec<PendingRequest<T, E, R>> = candidates
            .into_iter()
            .filter(|(_, request)| matches(request.as_ref(), query))
            .map(|(id, request)| self.handle(id, request))
            .collect();
        trace!(
            client = %self.config.name,
            query = %query,
            matched = found.len(),
            "evaluated query"
        );
        found
    }

    fn expect_single(&self, query: &Query<R>) -> RegistryResult<PendingRequest<T, E, R>> {
        let mut found = self.collect(query);
        if found.len() > 1 {
            return Err(RegistryError::AmbiguousMatch {
                client: self.config.name.clone(),
                query: query.describe(),
                count: found.len(),
            });
        }
        found.pop().ok_or_else(|| RegistryError::NotFound {
            client: self.config.name.clone(),
            query: query.describe(),
        })
    }

    fn expect_some(&self, query: &Query<R>) -> RegistryResult<Vec<PendingRequest<T, E, R>>> {
        let found = self.collect(query);
        if found.is_empty() {
            return Err(RegistryError::NoneFound {
                client: self.config.name.clone(),
                query: query.describe(),
            });
        }
        Ok(found)
    }
}

/// Handle to one pending entry.
///
/// Settling through [`succeed`](Self::succeed) or [`fail`](Self::fail) is the
/// act of removing the entry, so only the first settlement delivers an
/// outcome. Later calls return `false`.
pub struct PendingRequest<T, E = anyhow::Error, R = Request> {
    id: EntryId,
    request: Arc<R>,
    config: Arc<RegistryConfig>,
    store: Weak<Mutex<Store<T, E, R>>>,
}

impl<T, E, R> PendingRequest<T, E, R> {
    pub fn id(&self) -> EntryId {
        self.id
    }

    /// The intercepted request descriptor.
    pub fn request(&self) -> &R {
        &self.request
    }

    /// Whether the entry is still in the store.
    pub fn is_pending(&self) -> bool {
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        let pending = store.lock().contains(self.id);
        pending
    }

    /// Resolve the caller's future with `value`.
    pub fn succeed(&self, value: T) -> bool {
        self.settle(Ok(value))
    }

    /// Reject the caller's future with `error`, delivered verbatim.
    pub fn fail(&self, error: E) -> bool {
        self.settle(Err(error))
    }

    fn settle(&self, outcome: Result<T, E>) -> bool {
        let slot = match self.store.upgrade() {
            Some(store) => {
                let mut guard = store.lock();
                guard.take(self.id)
            }
            None => None,
        };
        let Some(slot) = slot else {
            warn!(
                client = %self.config.name,
                entry = %self.id,
                "settled a request that is no longer pending"
            );
            return false;
        };

        let succeeded = outcome.is_ok();
        if slot.responder.send(outcome).is_err() {
            debug!(
                client = %self.config.name,
                entry = %self.id,
                "caller dropped the response future before settlement"
            );
        }
        debug!(client = %self.config.name, entry = %self.id, succeeded, "settled request");
        true
    }
}

impl<T, E, R> Clone for PendingRequest<T, E, R> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            request: Arc::clone(&self.request),
            config: Arc::clone(&self.config),
            store: Weak::clone(&self.store),
        }
    }
}

impl<T, E, R> PartialEq for PendingRequest<T, E, R> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id && Weak::ptr_eq(&self.store, &other.store)
    }
}

impl<T, E, R> Eq for PendingRequest<T, E, R> {}

impl<T, E, R: RequestDescriptor> fmt::Debug for PendingRequest<T, E, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingRequest")
            .field("id", &self.id)
            .field("request", &describe_request(self.request.as_ref()))
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use pretty_assertions::assert_eq;
    use testhttp_commons::MemoryTelemetry;

    type Client = TestHttpClient<u32, String>;

    #[test]
    fn intercept_appends_in_order() {
        let client = Client::make();
        let first = client.intercept(Request::get("/a"));
        let second = client.intercept(Request::get("/a"));

        assert_eq!(client.len(), 2);
        assert!(first.id() < second.id());

        let ids: Vec<EntryId> = client.match_all("/a").iter().map(PendingRequest::id).collect();
        assert_eq!(ids, vec![first.id(), second.id()]);
    }

    #[test]
    fn succeed_removes_before_delivering() {
        let client = Client::make();
        let response = client.intercept(Request::get("/x"));
        let entry = client.find_one("/x").unwrap();

        assert!(entry.is_pending());
        assert!(entry.succeed(42));
        assert!(!entry.is_pending());
        assert!(client.is_empty());
        assert_eq!(response.now_or_never(), Some(Ok(42)));
    }

    #[test]
    fn second_settlement_is_ignored() {
        let client = Client::make();
        let response = client.intercept(Request::get("/x"));
        let other = client.intercept(Request::get("/y"));
        let entry = client.find_one("/x").unwrap();

        assert!(entry.fail("boom".to_string()));
        assert!(!entry.succeed(1));
        assert!(!entry.clone().fail("again".to_string()));

        assert_eq!(response.now_or_never(), Some(Err("boom".to_string())));
        assert_eq!(client.len(), 1);
        assert!(client.find_one("/y").is_ok());
        drop(other);
    }

    #[test]
    fn settling_after_client_dropped_is_harmless() {
        let client = Client::make();
        let _response = client.intercept(Request::get("/x"));
        let entry = client.find_one("/x").unwrap();
        drop(client);

        assert!(!entry.is_pending());
        assert!(!entry.succeed(1));
    }

    #[test]
    fn settling_with_dropped_future_still_removes_entry() {
        let client = Client::make();
        drop(client.intercept(Request::get("/x")));

        assert!(client.find_one("/x").unwrap().succeed(5));
        assert!(client.verify_none_outstanding().is_ok());
    }

    #[test]
    fn handles_compare_by_identity() {
        let client = Client::make();
        let _a = client.intercept(Request::post("/a"));
        let _b = client.intercept(Request::post("/b"));

        let first = client.find_one("/a").unwrap();
        let again = client.find_one(Query::request("post", "/a")).unwrap();
        let other = client.find_one("/b").unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
    }

    #[test]
    fn identical_descriptors_are_distinct_entries() {
        let client = Client::make();
        let _a = client.intercept(Request::post("/a"));
        let _b = client.intercept(Request::post("/a"));

        let all = client.find_all("/a").unwrap();
        assert_eq!(all.len(), 2);
        assert_ne!(all[0], all[1]);
    }

    #[test]
    fn handles_from_different_clients_differ() {
        let left = Client::make();
        let right = Client::make();
        let _l = left.intercept(Request::get("/a"));
        let _r = right.intercept(Request::get("/a"));

        assert_ne!(left.find_one("/a").unwrap(), right.find_one("/a").unwrap());
    }

    #[test]
    fn remove_one_leaves_future_unsettled() {
        let client = Client::make();
        let mut response = client.intercept(Request::get("/a"));

        client.remove_one("/a").unwrap();
        assert!(client.is_empty());
        assert!((&mut response).now_or_never().is_none());
    }

    #[test]
    fn remove_all_only_evicts_matches() {
        let client = Client::make();
        let _a1 = client.intercept(Request::post("/a"));
        let _b = client.intercept(Request::get("/b"));
        let _a2 = client.intercept(Request::post("/a"));

        client.remove_all("/a").unwrap();

        let remaining: Vec<String> = client.snapshot().into_iter().map(|s| s.url).collect();
        assert_eq!(remaining, vec!["/b".to_string()]);
    }

    #[test]
    fn reset_is_idempotent_and_abandons_futures() {
        let client = Client::make();
        let mut response = client.intercept(Request::get("/a"));
        let stale = client.find_one("/a").unwrap();

        client.reset();
        client.reset();

        assert!(client.verify_none_outstanding().is_ok());
        assert!(!stale.succeed(1));
        assert!((&mut response).now_or_never().is_none());
    }

    #[test]
    fn ids_are_not_reused_after_reset() {
        let client = Client::make();
        let first = client.intercept(Request::get("/a"));
        client.reset();
        let second = client.intercept(Request::get("/a"));

        assert!(second.id() > first.id());
    }

    #[test]
    fn predicates_may_call_back_into_registry() {
        let client = Client::make();
        let _a = client.intercept(Request::get("/a"));
        let inner = client.clone();

        let found = client.match_all(Query::matching(move |_: &Request| inner.len() == 1));
        assert_eq!(found.len(), 1);
    }

    #[test]
    fn panicking_predicate_leaves_store_usable() {
        let client = Client::make();
        let mut response = client.intercept(Request::get("/a"));

        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            client.find_one(Query::matching(|_: &Request| -> bool {
                panic!("predicate exploded")
            }))
        }));
        assert!(outcome.is_err());

        assert_eq!(client.len(), 1);
        let entry = client.find_one("/a").unwrap();
        assert!(entry.is_pending());
        assert!(entry.succeed(1));
        assert_eq!((&mut response).now_or_never(), Some(Ok(1)));
        assert!(client.is_empty());
    }

    #[test]
    fn custom_name_prefixes_errors() {
        let client = Client::with_config(RegistryConfig::default().with_name("Billing"));
        let error = client.find_one("/missing").unwrap_err();
        assert_eq!(
            error.to_string(),
            "Billing: no pending request found for URL: /missing"
        );
    }

    #[test]
    fn verify_with_dump_still_fails() {
        let client =
            Client::with_config(RegistryConfig::default().with_dump_on_verify_failure(true));
        let _a = client.intercept(Request::get("/a"));

        let error = client.verify_none_outstanding().unwrap_err();
        assert!(matches!(error, RegistryError::UnverifiedRequests { ref pending, .. } if pending.len() == 1));
        assert_eq!(client.len(), 1);
    }

    #[test]
    fn dump_records_every_pending_entry() {
        let client = Client::make();
        let _a = client.intercept(Request::get("/a"));
        let _b = client.intercept(Request::delete("/b"));
        let sink = MemoryTelemetry::<PendingSnapshot>::new();

        client.dump(&sink).unwrap();

        let events = sink.events();
        assert_eq!(events, client.snapshot());
        assert_eq!(events[1].description, "method: DELETE, URL: /b");
        assert_eq!(sink.flush_count(), 1);
    }

    #[test]
    fn debug_output_is_readable() {
        let client = Client::make();
        let _a = client.intercept(Request::put("/a"));
        let entry = client.find_one("/a").unwrap();

        assert_eq!(
            format!("{client:?}"),
            r#"TestHttpClient { name: "HttpClient", pending: 1 }"#
        );
        assert!(format!("{entry:?}").contains("method: PUT, URL: /a"));
        assert_eq!(entry.id().to_string(), "#1");
    }
}
