// Two-way mapping between `FilterState` and the inventory page URL.
//
// Parsing is total: missing keys take their defaults, malformed numbers fall back
// to the default bound, unknown keys are ignored. Serialization omits every field
// that equals its default, so the default state is the bare path.
//
// The synchronizer only ever *replaces* the current history entry; filter churn
// must not pile up back-navigation steps.

use std::borrow::Cow;
use std::sync::Arc;

use parking_lot::Mutex;
use url::form_urlencoded;

use crate::filters::{
    normalize_id, normalize_search, normalize_value, FilterDefaults, FilterState, NumericRange, RangeKind,
};
use crate::query::{self, param};

pub const INVENTORY_PATH: &str = "/inventory";

pub fn parse_query(query: &str, defaults: &FilterDefaults) -> FilterState {
    let mut state = FilterState::new(defaults);
    let mut bounds: [(Option<u32>, Option<u32>); 3] = [(None, None); 3];

    let query = query.trim_start_matches('?');
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        match key.as_ref() {
            param::SEARCH => state.search_term = normalize_search(value.into_owned()),
            param::MAKE => state.brand_id = normalize_id(Some(value.into_owned())),
            param::MODEL => state.model_id = normalize_id(Some(value.into_owned())),
            param::VEHICLE_TYPE => state.body_type_id = normalize_id(Some(value.into_owned())),
            param::FUEL_TYPE => extend_csv(&mut state.fuel_type_ids, &value),
            param::TRANSMISSION => extend_csv(&mut state.transmission_ids, &value),
            param::EXTERIOR_COLOR => extend_csv(&mut state.color_values, &value),
            param::DRIVETRAIN => state.drivetrain = normalize_id(Some(value.into_owned())),
            param::CONDITION => state.condition = normalize_id(Some(value.into_owned())),
            param::STATUS => state.status = normalize_id(Some(value.into_owned())),
            param::MIN_PRICE => bounds[0].0 = parse_number(&key, &value),
            param::MAX_PRICE => bounds[0].1 = parse_number(&key, &value),
            param::MIN_YEAR => bounds[1].0 = parse_number(&key, &value),
            param::MAX_YEAR => bounds[1].1 = parse_number(&key, &value),
            param::MIN_MILEAGE => bounds[2].0 = parse_number(&key, &value),
            param::MAX_MILEAGE => bounds[2].1 = parse_number(&key, &value),
            param::SORT => {
                state.sort_by = value.parse().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "Ignoring sort order from URL");
                    Default::default()
                })
            }
            param::PAGE => {
                state.page = parse_number(&key, &value).filter(|p| *p >= 1).unwrap_or(1);
            }
            other => tracing::debug!(key = other, "Ignoring unknown query parameter"),
        }
    }

    for (kind, (min, max)) in [RangeKind::Price, RangeKind::Year, RangeKind::Mileage]
        .into_iter()
        .zip(bounds)
    {
        let domain = defaults.bounds(kind);
        let range = NumericRange::ordered(min.unwrap_or(domain.min), max.unwrap_or(domain.max))
            .clamp_into(domain);
        match kind {
            RangeKind::Price => state.price_range = range,
            RangeKind::Year => state.year_range = range,
            RangeKind::Mileage => state.mileage_range = range,
        }
    }

    if state.brand_id.is_none() && state.model_id.take().is_some() {
        tracing::warn!("Dropping model from URL without a brand");
    }

    state
}

fn extend_csv(set: &mut std::collections::BTreeSet<String>, csv: &str) {
    set.extend(csv.split(',').filter_map(|v| normalize_value(v.to_string())));
}

fn parse_number(key: &Cow<'_, str>, value: &Cow<'_, str>) -> Option<u32> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    match trimmed.parse::<u32>() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(key = %key, value = %value, "Malformed number in URL, using default");
            None
        }
    }
}

/// Query string for `state` without the leading `?`; empty for the default state.
pub fn to_query(state: &FilterState, defaults: &FilterDefaults) -> String {
    query::encode(&query::filter_params(state, defaults))
}

pub fn inventory_href(path: &str, state: &FilterState, defaults: &FilterDefaults) -> String {
    let query = to_query(state, defaults);
    if query.is_empty() {
        path.to_string()
    } else {
        format!("{path}?{query}")
    }
}

/// The browser history seam.
pub trait History: Send + Sync {
    /// Current path and query, e.g. `/inventory?make=h1`.
    fn location(&self) -> String;
    /// Swap the current entry for `href` without adding a new one.
    fn replace(&self, href: &str);
}

/// History kept in memory. Used for server-rendered sessions and in tests.
#[derive(Debug)]
pub struct MemoryHistory {
    entries: Mutex<Vec<String>>,
    replacements: Mutex<usize>,
}

impl MemoryHistory {
    pub fn new(initial: impl Into<String>) -> Self {
        Self {
            entries: Mutex::new(vec![initial.into()]),
            replacements: Mutex::new(0),
        }
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    pub fn replacements(&self) -> usize {
        *self.replacements.lock()
    }
}

impl History for MemoryHistory {
    fn location(&self) -> String {
        self.entries.lock().last().cloned().unwrap_or_default()
    }

    fn replace(&self, href: &str) {
        let mut entries = self.entries.lock();
        match entries.last_mut() {
            Some(current) => *current = href.to_string(),
            None => entries.push(href.to_string()),
        }
        *self.replacements.lock() += 1;
    }
}

pub struct UrlSynchronizer {
    path: String,
    history: Arc<dyn History>,
    defaults: FilterDefaults,
}

impl UrlSynchronizer {
    pub fn new(path: impl Into<String>, history: Arc<dyn History>, defaults: FilterDefaults) -> Self {
        Self {
            path: path.into(),
            history,
            defaults,
        }
    }

    pub fn initial_state(&self) -> FilterState {
        let location = self.history.location();
        let query = location.split_once('?').map(|(_, q)| q).unwrap_or("");
        parse_query(query, &self.defaults)
    }

    pub fn href_for(&self, state: &FilterState) -> String {
        inventory_href(&self.path, state, &self.defaults)
    }

    pub fn location(&self) -> String {
        self.history.location()
    }

    /// Writes `state` into the current history entry. Returns whether the URL changed.
    pub fn sync(&self, state: &FilterState) -> bool {
        let href = self.href_for(state);
        if href == self.history.location() {
            return false;
        }
        tracing::debug!(href, "Replacing inventory URL");
        self.history.replace(&href);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{Attribute, FilterMutation, MultiSelect, SortOrder};

    fn defaults() -> FilterDefaults {
        FilterDefaults::for_year(2025)
    }

    fn round_trip(state: &FilterState) -> FilterState {
        parse_query(&to_query(state, &defaults()), &defaults())
    }

    #[test]
    fn test_empty_query_is_default_state() {
        assert!(parse_query("", &defaults()).is_default(&defaults()));
        assert_eq!(to_query(&FilterState::new(&defaults()), &defaults()), "");
    }

    #[test]
    fn test_malformed_numbers_fall_back_to_defaults() {
        let d = defaults();
        let state = parse_query("?minPrice=cheap&maxPrice=30000&minYear=&page=-2&maxMileage=1e9", &d);

        assert_eq!(state.price_range, NumericRange { min: 0, max: 30_000 });
        assert_eq!(state.year_range, d.year);
        assert_eq!(state.mileage_range, d.mileage);
        assert_eq!(state.page, 1);
    }

    #[test]
    fn test_inverted_and_out_of_domain_ranges_are_repaired() {
        let d = defaults();
        let state = parse_query("minYear=2022&maxYear=2011&maxPrice=500000", &d);
        assert_eq!(state.year_range, NumericRange { min: 2011, max: 2022 });
        assert_eq!(state.price_range, d.price);
    }

    #[test]
    fn test_unknown_sort_falls_back() {
        let state = parse_query("sortBy=cheapest-first", &defaults());
        assert_eq!(state.sort_by, SortOrder::Newest);
    }

    #[test]
    fn test_model_without_brand_is_dropped() {
        let state = parse_query("model=c1", &defaults());
        assert_eq!(state.model_id, None);
    }

    #[test]
    fn test_unknown_catalog_ids_are_kept() {
        let state = parse_query("make=stale-brand&model=stale-model", &defaults());
        assert_eq!(state.brand_id.as_deref(), Some("stale-brand"));
        assert_eq!(state.model_id.as_deref(), Some("stale-model"));
    }

    #[test]
    fn test_csv_values_merge_across_repeated_keys() {
        let state = parse_query("fuelType=petrol,,diesel&fuelType=hybrid", &defaults());
        let values: Vec<&str> = state.fuel_type_ids.iter().map(String::as_str).collect();
        assert_eq!(values, vec!["diesel", "hybrid", "petrol"]);
    }

    #[test]
    fn test_round_trip_of_reachable_states() {
        let d = defaults();
        let scripts: Vec<Vec<FilterMutation>> = vec![
            vec![],
            vec![FilterMutation::SetSearchTerm(" honda civic ".into())],
            vec![
                FilterMutation::SetBrand(Some("h1".into())),
                FilterMutation::SetModel(Some("c1".into())),
                FilterMutation::SetPage(3),
            ],
            vec![
                FilterMutation::Toggle(MultiSelect::Color, "pearl white".into()),
                FilterMutation::Toggle(MultiSelect::Transmission, "manual".into()),
                FilterMutation::Toggle(MultiSelect::FuelType, "electric".into()),
                FilterMutation::SetAttribute(Attribute::Condition, Some("certified".into())),
            ],
            vec![
                FilterMutation::SetRangeMin(RangeKind::Price, 20_000),
                FilterMutation::SetRangeMax(RangeKind::Year, 2018),
                FilterMutation::SetRange { kind: RangeKind::Mileage, min: 10_000, max: 10_000 },
                FilterMutation::SetSort(SortOrder::MileageDesc),
            ],
            vec![FilterMutation::SetSearchTerm("a&b=c?d#e".into())],
        ];

        for script in scripts {
            let mut state = FilterState::new(&d);
            for mutation in script {
                state.apply(mutation, &d);
            }
            assert_eq!(round_trip(&state), state);
        }
    }

    #[test]
    fn test_sync_replaces_instead_of_pushing() {
        let d = defaults();
        let history = Arc::new(MemoryHistory::new(INVENTORY_PATH));
        let sync = UrlSynchronizer::new(INVENTORY_PATH, history.clone(), d);
        let mut state = sync.initial_state();

        for term in ["c", "ci", "civ", "civic"] {
            state.apply(FilterMutation::SetSearchTerm(term.into()), &d);
            assert!(sync.sync(&state));
        }

        assert_eq!(history.entries(), vec!["/inventory?q=civic".to_string()]);
        assert_eq!(history.replacements(), 4);
        assert!(!sync.sync(&state));
    }

    #[test]
    fn test_reset_returns_to_bare_path() {
        let d = defaults();
        let history = Arc::new(MemoryHistory::new("/inventory?make=h1&minPrice=5000"));
        let sync = UrlSynchronizer::new(INVENTORY_PATH, history.clone(), d);
        let mut state = sync.initial_state();
        assert_eq!(state.brand_id.as_deref(), Some("h1"));

        state.apply(FilterMutation::Reset, &d);
        sync.sync(&state);

        assert_eq!(history.location(), "/inventory");
    }
}
