// Brand → model cascade.
//
// A model only makes sense under the brand it belongs to. The state side of the
// cascade is the pure `apply_brand_change`; the option side is
// `CascadeResolver`, which keeps the model list scoped to the selected brand and
// drops any model response that was superseded by a later re-scope.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::{AbortHandle, JoinHandle};

use crate::catalog::{CatalogOption, OptionProviders};
use crate::filters::FilterState;

/// Selecting a different brand (or clearing it) always clears the model.
/// Re-selecting the current brand is not a change and keeps the model.
pub fn apply_brand_change(state: &FilterState, brand: Option<String>) -> FilterState {
    let mut next = state.clone();
    if next.brand_id == brand {
        return next;
    }
    next.brand_id = brand;
    next.model_id = None;
    next
}

/// Model list for the currently selected brand.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelOptions {
    pub brand_id: Option<String>,
    pub models: Vec<CatalogOption>,
    pub loading: bool,
}

#[derive(Clone)]
pub struct CascadeResolver {
    inner: Arc<ResolverInner>,
}

struct ResolverInner {
    providers: Arc<OptionProviders>,
    options: watch::Sender<ModelOptions>,
    generation: AtomicU64,
    in_flight: Mutex<Option<(u64, AbortHandle)>>,
}

impl CascadeResolver {
    pub fn new(providers: Arc<OptionProviders>) -> Self {
        let (options, _) = watch::channel(ModelOptions::default());
        Self {
            inner: Arc::new(ResolverInner {
                providers,
                options,
                generation: AtomicU64::new(0),
                in_flight: Mutex::new(None),
            }),
        }
    }

    pub fn options(&self) -> ModelOptions {
        self.inner.options.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<ModelOptions> {
        self.inner.options.subscribe()
    }

    /// Re-scopes the model list to `brand`.
    ///
    /// The previous list is cleared synchronously, before any fetch is issued, so
    /// a model of the old brand is never selectable. Returns the load task, if any.
    pub fn scope_to(&self, brand: Option<&str>) -> Option<JoinHandle<()>> {
        let brand = brand.map(str::to_string);
        // Held until the new task is registered so racing calls cannot register
        // out of order and abort the task of the brand that ended up selected.
        let mut in_flight = self.inner.in_flight.lock();
        let mut generation = 0;
        self.inner.options.send_modify(|options| {
            generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
            options.brand_id = brand.clone();
            options.models.clear();
            options.loading = brand.is_some();
        });
        if let Some((previous_generation, previous)) = in_flight.take() {
            if previous_generation < generation {
                previous.abort();
            }
        }

        let brand = brand?;
        tracing::debug!(brand_id = %brand, "Loading models for brand");
        let inner = Arc::clone(&self.inner);
        let task = tokio::spawn(async move {
            let models = inner.providers.models_for(&brand).await;
            inner.options.send_if_modified(|options| {
                if inner.generation.load(Ordering::SeqCst) != generation {
                    tracing::debug!(brand_id = %brand, "Discarding models of a deselected brand");
                    return false;
                }
                options.models = models;
                options.loading = false;
                true
            });
        });
        *in_flight = Some((generation, task.abort_handle()));
        Some(task)
    }

    /// Waits until the model list for the current brand has loaded.
    pub async fn settled(&self) -> ModelOptions {
        let mut rx = self.subscribe();
        match rx.wait_for(|options| !options.loading).await {
            Ok(options) => options.clone(),
            Err(_) => self.options(),
        }
    }
}
