// Maps filter state onto query parameters.
//
// The page URL and the backend `/vehicles` request share one parameter vocabulary;
// both omit every field that still holds its default.

use std::fmt;

use url::form_urlencoded;

use crate::filters::{Attribute, FilterDefaults, FilterState, MultiSelect, RangeKind};

pub mod param {
    pub const SEARCH: &str = "q";
    pub const MAKE: &str = "make";
    pub const MODEL: &str = "model";
    pub const VEHICLE_TYPE: &str = "vehicleType";
    pub const FUEL_TYPE: &str = "fuelType";
    pub const TRANSMISSION: &str = "transmission";
    pub const EXTERIOR_COLOR: &str = "exteriorColor";
    pub const DRIVETRAIN: &str = "drivetrain";
    pub const CONDITION: &str = "condition";
    pub const STATUS: &str = "status";
    pub const MIN_PRICE: &str = "minPrice";
    pub const MAX_PRICE: &str = "maxPrice";
    pub const MIN_YEAR: &str = "minYear";
    pub const MAX_YEAR: &str = "maxYear";
    pub const MIN_MILEAGE: &str = "minMileage";
    pub const MAX_MILEAGE: &str = "maxMileage";
    pub const SORT: &str = "sortBy";
    pub const PAGE: &str = "page";
    pub const LIMIT: &str = "limit";
}

pub(crate) fn multi_param(kind: MultiSelect) -> &'static str {
    match kind {
        MultiSelect::FuelType => param::FUEL_TYPE,
        MultiSelect::Transmission => param::TRANSMISSION,
        MultiSelect::Color => param::EXTERIOR_COLOR,
    }
}

pub(crate) fn attribute_param(attribute: Attribute) -> &'static str {
    match attribute {
        Attribute::Drivetrain => param::DRIVETRAIN,
        Attribute::Condition => param::CONDITION,
        Attribute::Status => param::STATUS,
    }
}

pub(crate) fn range_params(kind: RangeKind) -> (&'static str, &'static str) {
    match kind {
        RangeKind::Price => (param::MIN_PRICE, param::MAX_PRICE),
        RangeKind::Year => (param::MIN_YEAR, param::MAX_YEAR),
        RangeKind::Mileage => (param::MIN_MILEAGE, param::MAX_MILEAGE),
    }
}

/// Non-default fields of `state` in a stable order, page last and only when past 1.
pub fn filter_params(state: &FilterState, defaults: &FilterDefaults) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();

    if !state.search_term.is_empty() {
        params.push((param::SEARCH, state.search_term.clone()));
    }
    if let Some(brand) = &state.brand_id {
        params.push((param::MAKE, brand.clone()));
        if let Some(model) = &state.model_id {
            params.push((param::MODEL, model.clone()));
        }
    }
    if let Some(body_type) = &state.body_type_id {
        params.push((param::VEHICLE_TYPE, body_type.clone()));
    }
    for kind in [MultiSelect::FuelType, MultiSelect::Transmission, MultiSelect::Color] {
        let values = state.selection(kind);
        if !values.is_empty() {
            let csv: Vec<&str> = values.iter().map(String::as_str).collect();
            params.push((multi_param(kind), csv.join(",")));
        }
    }
    for attribute in [Attribute::Drivetrain, Attribute::Condition, Attribute::Status] {
        if let Some(value) = state.attribute(attribute) {
            params.push((attribute_param(attribute), value.to_string()));
        }
    }
    for kind in [RangeKind::Price, RangeKind::Year, RangeKind::Mileage] {
        let (min_key, max_key) = range_params(kind);
        let range = state.range(kind);
        let bounds = defaults.bounds(kind);
        if range.min != bounds.min {
            params.push((min_key, range.min.to_string()));
        }
        if range.max != bounds.max {
            params.push((max_key, range.max.to_string()));
        }
    }
    if state.sort_by != Default::default() {
        params.push((param::SORT, state.sort_by.as_str().to_string()));
    }
    if state.page > 1 {
        params.push((param::PAGE, state.page.to_string()));
    }

    params
}

pub(crate) fn encode(params: &[(&'static str, String)]) -> String {
    form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params.iter())
        .finish()
}

/// A `/vehicles` request built from one filter state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VehicleQuery {
    params: Vec<(&'static str, String)>,
}

impl VehicleQuery {
    /// Always carries `page` and `limit`; the search term is sent trimmed.
    pub fn from_state(state: &FilterState, defaults: &FilterDefaults, limit: u32) -> Self {
        let mut params: Vec<(&'static str, String)> = filter_params(state, defaults)
            .into_iter()
            .filter(|(key, _)| *key != param::PAGE)
            .map(|(key, value)| {
                if key == param::SEARCH {
                    (key, value.trim().to_string())
                } else {
                    (key, value)
                }
            })
            .collect();
        params.push((param::PAGE, state.page.max(1).to_string()));
        params.push((param::LIMIT, limit.max(1).to_string()));
        Self { params }
    }

    pub fn params(&self) -> &[(&'static str, String)] {
        &self.params
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn page(&self) -> u32 {
        self.get(param::PAGE).and_then(|p| p.parse().ok()).unwrap_or(1)
    }

    pub fn limit(&self) -> u32 {
        self.get(param::LIMIT).and_then(|l| l.parse().ok()).unwrap_or(1)
    }
}

impl fmt::Display for VehicleQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(&self.params))
    }
}
