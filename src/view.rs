// Derived view state.
//
// Pure functions of the filter state plus catalog data. Nothing here is stored;
// chips carry the mutation that removes them so dismissal goes through the same
// store path as any other filter change.

use serde::Serialize;

use crate::catalog::{label_in, CatalogOption, OptionCatalog, OptionKind};
use crate::executor::{FetchSnapshot, FetchStatus};
use crate::filters::{Attribute, FilterDefaults, FilterMutation, FilterState, MultiSelect, RangeKind};
use crate::models::{Pagination, VehicleSummary};

/// Number of filter dimensions that deviate from their default.
///
/// Each selected multi-select value counts on its own; a range counts once no
/// matter how many of its bounds moved. Sort order and page are not filters.
pub fn active_filter_count(state: &FilterState, defaults: &FilterDefaults) -> usize {
    let singles = [
        !state.search_term.is_empty(),
        state.brand_id.is_some(),
        state.model_id.is_some(),
        state.body_type_id.is_some(),
        state.drivetrain.is_some(),
        state.condition.is_some(),
        state.status.is_some(),
    ]
    .into_iter()
    .filter(|active| *active)
    .count();

    let multi = state.fuel_type_ids.len() + state.transmission_ids.len() + state.color_values.len();

    let ranges = [RangeKind::Price, RangeKind::Year, RangeKind::Mileage]
        .into_iter()
        .filter(|kind| state.range(*kind) != defaults.bounds(*kind))
        .count();

    singles + multi + ranges
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "field", content = "value")]
pub enum ChipKey {
    Search,
    Brand,
    Model,
    BodyType,
    Multi(MultiSelect, String),
    Attribute(Attribute),
    Range(RangeKind),
}

impl ChipKey {
    pub fn removal(&self) -> FilterMutation {
        match self {
            ChipKey::Search => FilterMutation::SetSearchTerm(String::new()),
            ChipKey::Brand => FilterMutation::SetBrand(None),
            ChipKey::Model => FilterMutation::SetModel(None),
            ChipKey::BodyType => FilterMutation::SetBodyType(None),
            ChipKey::Multi(kind, value) => FilterMutation::Deselect(*kind, value.clone()),
            ChipKey::Attribute(attribute) => FilterMutation::SetAttribute(*attribute, None),
            ChipKey::Range(kind) => FilterMutation::ResetRange(*kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterChip {
    pub key: ChipKey,
    pub label: String,
}

/// Active filter chips in display order. Ids that the catalog does not know (yet)
/// are shown raw.
pub fn active_chips(
    state: &FilterState,
    defaults: &FilterDefaults,
    catalog: &OptionCatalog,
    models: &[CatalogOption],
) -> Vec<FilterChip> {
    let mut chips = Vec::new();
    let mut push = |key: ChipKey, label: String| chips.push(FilterChip { key, label });

    if !state.search_term.is_empty() {
        push(ChipKey::Search, format!("Search: \"{}\"", state.search_term.trim()));
    }
    if let Some(brand) = &state.brand_id {
        push(ChipKey::Brand, lookup(catalog.label(OptionKind::Brands, brand), brand));
    }
    if let Some(model) = &state.model_id {
        push(ChipKey::Model, lookup(label_in(models, model), model));
    }
    if let Some(body_type) = &state.body_type_id {
        push(ChipKey::BodyType, lookup(catalog.label(OptionKind::BodyTypes, body_type), body_type));
    }
    for id in &state.fuel_type_ids {
        let label = lookup(catalog.label(OptionKind::FuelTypes, id), id);
        push(ChipKey::Multi(MultiSelect::FuelType, id.clone()), label);
    }
    for id in &state.transmission_ids {
        let label = lookup(catalog.label(OptionKind::Transmissions, id), id);
        push(ChipKey::Multi(MultiSelect::Transmission, id.clone()), label);
    }
    for color in &state.color_values {
        push(ChipKey::Multi(MultiSelect::Color, color.clone()), title_case(color));
    }
    if let Some(drivetrain) = &state.drivetrain {
        push(ChipKey::Attribute(Attribute::Drivetrain), drivetrain.to_uppercase());
    }
    if let Some(condition) = &state.condition {
        push(ChipKey::Attribute(Attribute::Condition), title_case(condition));
    }
    if let Some(status) = &state.status {
        push(ChipKey::Attribute(Attribute::Status), title_case(status));
    }
    for kind in [RangeKind::Price, RangeKind::Year, RangeKind::Mileage] {
        let range = state.range(kind);
        if range != defaults.bounds(kind) {
            push(ChipKey::Range(kind), range_label(kind, range.min, range.max));
        }
    }

    chips
}

fn lookup(label: Option<&str>, id: &str) -> String {
    label.unwrap_or(id).to_string()
}

pub fn range_label(kind: RangeKind, min: u32, max: u32) -> String {
    match kind {
        RangeKind::Price => format!("${} - ${}", thousands(min.into()), thousands(max.into())),
        RangeKind::Year => format!("{min} - {max}"),
        RangeKind::Mileage => format!("{} - {} mi", thousands(min.into()), thousands(max.into())),
    }
}

pub fn thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

pub fn title_case(value: &str) -> String {
    value
        .split(|c: char| c == ' ' || c == '-' || c == '_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<String>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum PageItem {
    Page { number: u32, current: bool },
    Gap,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationView {
    pub current: u32,
    pub total_pages: u32,
    pub previous: Option<u32>,
    pub next: Option<u32>,
    pub items: Vec<PageItem>,
}

/// First, last and the neighbours of the current page; gaps collapse to `Gap`.
pub fn pagination_view(current: u32, total_pages: u32) -> PaginationView {
    let current = current.max(1);
    let mut items = Vec::new();
    if total_pages > 1 {
        // total_pages comes from the backend; only the window is ever materialised
        let mut window = [
            1,
            current.saturating_sub(1),
            current,
            current.saturating_add(1),
            total_pages,
        ];
        window.sort_unstable();
        let mut last_shown = 0;
        for number in window {
            if number == 0 || number > total_pages || number == last_shown {
                continue;
            }
            if last_shown != 0 && number - last_shown > 1 {
                items.push(PageItem::Gap);
            }
            items.push(PageItem::Page {
                number,
                current: number == current,
            });
            last_shown = number;
        }
    }

    PaginationView {
        current,
        total_pages,
        previous: (current > 1).then(|| current - 1),
        next: (current < total_pages).then(|| current + 1),
        items,
    }
}

pub fn results_summary(pagination: &Pagination) -> String {
    if pagination.total == 0 {
        return "No vehicles found".to_string();
    }
    let limit = u64::from(pagination.limit.max(1));
    let page = u64::from(pagination.page.max(1));
    let start = (page - 1) * limit + 1;
    let end = (page * limit).min(pagination.total);
    let noun = if pagination.total == 1 { "vehicle" } else { "vehicles" };
    format!(
        "Showing {}-{} of {} {}",
        thousands(start),
        thousands(end),
        thousands(pagination.total),
        noun
    )
}

/// Results area presentation choice. Local to the page, never a filter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Layout {
    #[default]
    Grid,
    List,
}

impl Layout {
    pub const PARAM: &'static str = "view";

    pub fn from_query(query: &str) -> Self {
        let list = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .any(|(key, value)| key == Self::PARAM && value == "list");
        if list { Layout::List } else { Layout::Grid }
    }
}

pub const FAILED_MESSAGE: &str = "We couldn't load vehicles right now. Please try again.";
pub const EMPTY_MESSAGE: &str = "No vehicles found. Try adjusting your filters.";

/// Everything a renderer needs for one frame of the inventory page.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryView {
    pub filters: FilterState,
    pub active_filter_count: usize,
    pub chips: Vec<FilterChip>,
    pub status: FetchStatus,
    pub loading: bool,
    pub vehicles: Vec<VehicleSummary>,
    pub pagination: Pagination,
    pub pages: PaginationView,
    pub summary: String,
    pub message: Option<&'static str>,
}

impl InventoryView {
    pub fn derive(
        state: &FilterState,
        defaults: &FilterDefaults,
        catalog: &OptionCatalog,
        models: &[CatalogOption],
        fetch: &FetchSnapshot,
    ) -> Self {
        let pagination = fetch.result.pagination.clone();
        let message = match fetch.status {
            FetchStatus::Failed => Some(FAILED_MESSAGE),
            FetchStatus::Success if fetch.result.vehicles.is_empty() => Some(EMPTY_MESSAGE),
            _ => None,
        };
        Self {
            filters: state.clone(),
            active_filter_count: active_filter_count(state, defaults),
            chips: active_chips(state, defaults, catalog, models),
            status: fetch.status,
            loading: fetch.loading,
            vehicles: fetch.result.vehicles.clone(),
            pages: pagination_view(state.page, pagination.total_pages),
            summary: results_summary(&pagination),
            pagination,
            message,
        }
    }
}
