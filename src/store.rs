// Filter State Store: the single owner of the canonical FilterState.

use std::sync::Arc;

use tokio::sync::watch;

use crate::filters::{
    Attribute, FilterDefaults, FilterField, FilterMutation, FilterState, MultiSelect, RangeKind, SortOrder,
};

/// Plain state container with pub-sub. Clones share the same state.
///
/// Subscribers are only woken by mutations that actually changed something.
#[derive(Clone)]
pub struct FilterStore {
    state: Arc<watch::Sender<FilterState>>,
    defaults: FilterDefaults,
}

impl FilterStore {
    pub fn new(initial: FilterState, defaults: FilterDefaults) -> Self {
        let (state, _) = watch::channel(initial);
        Self {
            state: Arc::new(state),
            defaults,
        }
    }

    pub fn with_defaults(defaults: FilterDefaults) -> Self {
        Self::new(FilterState::new(&defaults), defaults)
    }

    pub fn defaults(&self) -> &FilterDefaults {
        &self.defaults
    }

    pub fn state(&self) -> FilterState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FilterState> {
        self.state.subscribe()
    }

    pub fn dispatch(&self, mutation: FilterMutation) -> Option<FilterField> {
        let mut changed = None;
        self.state.send_if_modified(|state| {
            changed = state.apply(mutation, &self.defaults);
            changed.is_some()
        });
        if let Some(field) = changed {
            tracing::debug!(?field, "Filter state changed");
        }
        changed
    }

    pub fn set_search_term(&self, text: impl Into<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetSearchTerm(text.into()))
    }

    pub fn set_brand(&self, brand_id: Option<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetBrand(brand_id))
    }

    pub fn set_model(&self, model_id: Option<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetModel(model_id))
    }

    pub fn set_body_type(&self, body_type_id: Option<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetBodyType(body_type_id))
    }

    pub fn toggle_fuel_type(&self, id: impl Into<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::Toggle(MultiSelect::FuelType, id.into()))
    }

    pub fn toggle_transmission(&self, id: impl Into<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::Toggle(MultiSelect::Transmission, id.into()))
    }

    pub fn toggle_color(&self, value: impl Into<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::Toggle(MultiSelect::Color, value.into()))
    }

    pub fn set_drivetrain(&self, value: Option<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetAttribute(Attribute::Drivetrain, value))
    }

    pub fn set_condition(&self, value: Option<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetAttribute(Attribute::Condition, value))
    }

    pub fn set_status(&self, value: Option<String>) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetAttribute(Attribute::Status, value))
    }

    pub fn set_price_range(&self, min: u32, max: u32) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetRange { kind: RangeKind::Price, min, max })
    }

    pub fn set_year_range(&self, min: u32, max: u32) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetRange { kind: RangeKind::Year, min, max })
    }

    pub fn set_mileage_range(&self, min: u32, max: u32) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetRange { kind: RangeKind::Mileage, min, max })
    }

    pub fn set_sort(&self, order: SortOrder) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetSort(order))
    }

    pub fn set_page(&self, page: u32) -> Option<FilterField> {
        self.dispatch(FilterMutation::SetPage(page))
    }

    pub fn reset(&self) -> Option<FilterField> {
        self.dispatch(FilterMutation::Reset)
    }
}
