// Vehicle Query Executor.
//
// Every dispatch gets a request id from a monotonically increasing counter. A
// response is only applied while its id is still the latest one; anything older is
// dropped without a trace in the published state. Superseded requests are also
// aborted, but the id check is what guarantees ordering.
//
// `loading` goes up synchronously on dispatch and only comes down when the latest
// request settles. A failed or timed-out request replaces the results with an
// empty page instead of leaving the previous (now wrong) results on screen.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::AbortHandle;

use crate::error::ApiError;
use crate::filters::{FilterDefaults, FilterState};
use crate::models::QueryResult;
use crate::query::VehicleQuery;

#[async_trait]
pub trait VehicleSource: Send + Sync {
    async fn search_vehicles(&self, query: &VehicleQuery) -> Result<QueryResult, ApiError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FetchStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Failed,
}

/// Coarse failure class; the raw error is logged, never shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    Network,
    Timeout,
    Rejected,
}

impl From<&ApiError> for FailureKind {
    fn from(error: &ApiError) -> Self {
        match error {
            ApiError::Transport(_) => FailureKind::Network,
            ApiError::Timeout(_) => FailureKind::Timeout,
            ApiError::Status { .. } | ApiError::Unsuccessful { .. } | ApiError::Decode(_) => {
                FailureKind::Rejected
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchSnapshot {
    /// Id of the latest dispatched request (0 before the first dispatch)
    pub request_id: u64,
    pub status: FetchStatus,
    pub loading: bool,
    pub result: QueryResult,
    pub failure: Option<FailureKind>,
}

impl FetchSnapshot {
    fn idle(limit: u32) -> Self {
        Self {
            request_id: 0,
            status: FetchStatus::Idle,
            loading: false,
            result: QueryResult::empty(1, limit),
            failure: None,
        }
    }
}

#[derive(Clone)]
pub struct VehicleQueryExecutor {
    inner: Arc<ExecutorInner>,
}

struct ExecutorInner {
    source: Arc<dyn VehicleSource>,
    defaults: FilterDefaults,
    page_size: u32,
    timeout: Duration,
    latest: AtomicU64,
    snapshot: watch::Sender<FetchSnapshot>,
    in_flight: Mutex<Option<(u64, AbortHandle)>>,
}

impl VehicleQueryExecutor {
    pub fn new(
        source: Arc<dyn VehicleSource>,
        defaults: FilterDefaults,
        page_size: u32,
        timeout: Duration,
    ) -> Self {
        let (snapshot, _) = watch::channel(FetchSnapshot::idle(page_size));
        Self {
            inner: Arc::new(ExecutorInner {
                source,
                defaults,
                page_size,
                timeout,
                latest: AtomicU64::new(0),
                snapshot,
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn snapshot(&self) -> FetchSnapshot {
        self.inner.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FetchSnapshot> {
        self.inner.snapshot.subscribe()
    }

    pub fn is_loading(&self) -> bool {
        self.inner.snapshot.borrow().loading
    }

    /// Starts a fetch for `state`, superseding any request still in flight.
    /// Must be called from within a tokio runtime.
    pub fn dispatch(&self, state: &FilterState) -> u64 {
        let query = VehicleQuery::from_state(state, &self.inner.defaults, self.inner.page_size);

        // Id allocation and handle registration happen under one lock, so the
        // registered handle always belongs to the newest request.
        let mut in_flight = self.inner.in_flight.lock();
        let mut request_id = 0;
        self.inner.snapshot.send_modify(|snapshot| {
            request_id = self.inner.latest.fetch_add(1, Ordering::SeqCst) + 1;
            snapshot.request_id = request_id;
            snapshot.status = FetchStatus::Loading;
            snapshot.loading = true;
        });
        tracing::debug!(request_id, query = %query, "Dispatching vehicle query");

        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let outcome = inner.execute(&query).await;
            inner.settle(request_id, query.page(), outcome);
        });
        if let Some((previous_id, previous)) = in_flight.replace((request_id, task.abort_handle())) {
            if previous_id < request_id {
                previous.abort();
            }
        }
        drop(in_flight);

        request_id
    }

    /// Waits until no request is loading and returns the published snapshot.
    pub async fn settled(&self) -> FetchSnapshot {
        let mut rx = self.subscribe();
        match rx.wait_for(|snapshot| !snapshot.loading).await {
            Ok(snapshot) => snapshot.clone(),
            Err(_) => self.snapshot(),
        }
    }

    /// Dispatches `state` and waits for the outcome.
    pub async fn run(&self, state: &FilterState) -> FetchSnapshot {
        self.dispatch(state);
        self.settled().await
    }
}

impl ExecutorInner {
    async fn execute(&self, query: &VehicleQuery) -> Result<QueryResult, ApiError> {
        match tokio::time::timeout(self.timeout, self.source.search_vehicles(query)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(ApiError::Timeout(self.timeout)),
        }
    }

    fn settle(&self, request_id: u64, page: u32, outcome: Result<QueryResult, ApiError>) {
        self.snapshot.send_if_modified(|snapshot| {
            if self.latest.load(Ordering::SeqCst) != request_id {
                tracing::debug!(request_id, "Discarding stale vehicle response");
                return false;
            }
            match outcome {
                Ok(result) => {
                    tracing::info!(
                        request_id,
                        count = result.vehicles.len(),
                        total = result.pagination.total,
                        "Vehicle query settled"
                    );
                    snapshot.result = result;
                    snapshot.status = FetchStatus::Success;
                    snapshot.failure = None;
                }
                Err(e) => {
                    tracing::error!(request_id, error = %e, "Vehicle query failed");
                    snapshot.failure = Some(FailureKind::from(&e));
                    snapshot.result = QueryResult::empty(page, self.page_size);
                    snapshot.status = FetchStatus::Failed;
                }
            }
            snapshot.loading = false;
            true
        });
    }
}
