// One inventory page session.
//
// The session is the only owner of the `FilterStore`. Every user event becomes a
// `FilterMutation` and goes through `InventorySession::apply`, which
// 1. mutates the store (page reset and model cascade happen there),
// 2. writes the new state into the URL,
// 3. re-scopes the model list when the brand moved,
// 4. schedules the vehicle fetch: typing waits for the search debounce, slider
//    drags wait for the range to settle, everything else fetches immediately.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::sync::watch;

use crate::catalog::{OptionCatalog, OptionProviders};
use crate::debounce::Debouncer;
use crate::executor::{FetchSnapshot, VehicleQueryExecutor, VehicleSource};
use crate::filters::{FilterDefaults, FilterField, FilterMutation, FilterState, MultiSelect, RangeKind, SortOrder};
use crate::resolver::{CascadeResolver, ModelOptions};
use crate::store::FilterStore;
use crate::url_sync::{History, UrlSynchronizer, INVENTORY_PATH};
use crate::view::{ChipKey, InventoryView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTiming {
    pub page_size: u32,
    pub request_timeout: Duration,
    pub search_debounce: Duration,
    pub range_settle: Duration,
}

impl Default for SessionTiming {
    fn default() -> Self {
        Self {
            page_size: 12,
            request_timeout: Duration::from_secs(12),
            search_debounce: Duration::from_millis(400),
            range_settle: Duration::from_millis(250),
        }
    }
}

/// Shared collaborators a session is opened with.
#[derive(Clone)]
pub struct SessionDeps {
    pub providers: Arc<OptionProviders>,
    pub vehicles: Arc<dyn VehicleSource>,
    pub defaults: FilterDefaults,
    pub timing: SessionTiming,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FetchPolicy {
    Now,
    After(Duration),
}

pub struct InventorySession {
    store: FilterStore,
    urls: UrlSynchronizer,
    resolver: CascadeResolver,
    providers: Arc<OptionProviders>,
    executor: VehicleQueryExecutor,
    debouncer: Debouncer,
    catalog: RwLock<OptionCatalog>,
    timing: SessionTiming,
}

impl InventorySession {
    /// Builds the initial state from the current URL, normalises the URL, starts
    /// the model list for a URL-selected brand and fires the first fetch.
    pub fn open(deps: SessionDeps, history: Arc<dyn History>) -> Self {
        let urls = UrlSynchronizer::new(INVENTORY_PATH, history, deps.defaults);
        let store = FilterStore::new(urls.initial_state(), deps.defaults);
        let resolver = CascadeResolver::new(Arc::clone(&deps.providers));
        let executor = VehicleQueryExecutor::new(
            deps.vehicles,
            deps.defaults,
            deps.timing.page_size,
            deps.timing.request_timeout,
        );

        let initial = store.state();
        urls.sync(&initial);
        // A URL model is kept even before its list arrives; only a brand *change* clears it.
        resolver.scope_to(initial.brand_id.as_deref());
        executor.dispatch(&initial);
        tracing::debug!(href = %urls.location(), "Inventory session opened");

        Self {
            store,
            urls,
            resolver,
            providers: deps.providers,
            executor,
            debouncer: Debouncer::new(),
            catalog: RwLock::new(OptionCatalog::default()),
            timing: deps.timing,
        }
    }

    pub fn state(&self) -> FilterState {
        self.store.state()
    }

    pub fn defaults(&self) -> &FilterDefaults {
        self.store.defaults()
    }

    pub fn subscribe_filters(&self) -> watch::Receiver<FilterState> {
        self.store.subscribe()
    }

    pub fn subscribe_results(&self) -> watch::Receiver<FetchSnapshot> {
        self.executor.subscribe()
    }

    pub fn subscribe_models(&self) -> watch::Receiver<ModelOptions> {
        self.resolver.subscribe()
    }

    pub fn fetch(&self) -> FetchSnapshot {
        self.executor.snapshot()
    }

    pub fn models(&self) -> ModelOptions {
        self.resolver.options()
    }

    pub fn location(&self) -> String {
        self.urls.location()
    }

    pub fn apply(&self, mutation: FilterMutation) -> Option<FilterField> {
        let policy = self.fetch_policy(&mutation);
        let brand_before = self.store.state().brand_id;

        let field = self.store.dispatch(mutation)?;
        let state = self.store.state();
        self.urls.sync(&state);

        if state.brand_id != brand_before {
            self.resolver.scope_to(state.brand_id.as_deref());
        }

        match policy {
            FetchPolicy::Now => {
                self.debouncer.cancel();
                self.executor.dispatch(&state);
            }
            FetchPolicy::After(delay) => {
                let executor = self.executor.clone();
                let store = self.store.clone();
                self.debouncer.schedule(delay, async move {
                    executor.dispatch(&store.state());
                });
            }
        }
        Some(field)
    }

    fn fetch_policy(&self, mutation: &FilterMutation) -> FetchPolicy {
        match mutation {
            FilterMutation::SetSearchTerm(_) => FetchPolicy::After(self.timing.search_debounce),
            FilterMutation::SetRange { .. }
            | FilterMutation::SetRangeMin(..)
            | FilterMutation::SetRangeMax(..) => FetchPolicy::After(self.timing.range_settle),
            _ => FetchPolicy::Now,
        }
    }

    pub fn type_search(&self, text: impl Into<String>) -> Option<FilterField> {
        self.apply(FilterMutation::SetSearchTerm(text.into()))
    }

    /// Enter in the search box: skip the remaining debounce.
    pub fn submit_search(&self) {
        if self.debouncer.cancel() {
            self.executor.dispatch(&self.store.state());
        }
    }

    pub fn select_brand(&self, brand_id: Option<String>) -> Option<FilterField> {
        self.apply(FilterMutation::SetBrand(brand_id))
    }

    pub fn select_model(&self, model_id: Option<String>) -> Option<FilterField> {
        self.apply(FilterMutation::SetModel(model_id))
    }

    pub fn select_body_type(&self, body_type_id: Option<String>) -> Option<FilterField> {
        self.apply(FilterMutation::SetBodyType(body_type_id))
    }

    pub fn toggle(&self, kind: MultiSelect, value: impl Into<String>) -> Option<FilterField> {
        self.apply(FilterMutation::Toggle(kind, value.into()))
    }

    /// A slider moved. The fetch waits until the range settles or is released.
    pub fn drag_range(&self, kind: RangeKind, min: u32, max: u32) -> Option<FilterField> {
        self.apply(FilterMutation::SetRange { kind, min, max })
    }

    /// The slider was let go: fetch now if a settle fetch is still waiting.
    pub fn release_range(&self) {
        if self.debouncer.cancel() {
            self.executor.dispatch(&self.store.state());
        }
    }

    pub fn sort_by(&self, order: SortOrder) -> Option<FilterField> {
        self.apply(FilterMutation::SetSort(order))
    }

    pub fn go_to_page(&self, page: u32) -> Option<FilterField> {
        self.apply(FilterMutation::SetPage(page))
    }

    pub fn remove_chip(&self, chip: &ChipKey) -> Option<FilterField> {
        self.apply(chip.removal())
    }

    pub fn clear_all(&self) -> Option<FilterField> {
        self.apply(FilterMutation::Reset)
    }

    /// Retry affordance after a failed fetch.
    pub fn retry(&self) -> u64 {
        self.debouncer.cancel();
        self.executor.dispatch(&self.store.state())
    }

    /// URL the page would have after `mutation`, without applying it.
    pub fn href_after(&self, mutation: FilterMutation) -> String {
        let mut preview = self.store.state();
        preview.apply(mutation, self.store.defaults());
        self.urls.href_for(&preview)
    }

    pub async fn load_catalog(&self) -> OptionCatalog {
        let catalog = self.providers.catalog().await;
        *self.catalog.write() = catalog.clone();
        catalog
    }

    /// Waits for the latest vehicle fetch and the model list to finish.
    pub async fn settled(&self) -> FetchSnapshot {
        let (snapshot, _) = futures::join!(self.executor.settled(), self.resolver.settled());
        snapshot
    }

    pub fn view(&self) -> InventoryView {
        let state = self.store.state();
        let catalog = self.catalog.read();
        let models = self.resolver.options();
        InventoryView::derive(&state, self.store.defaults(), &catalog, &models.models, &self.executor.snapshot())
    }
}
