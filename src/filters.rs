// Canonical inventory filter state.
//
// `FilterState` is a plain record; every change goes through `FilterState::apply`,
// which enforces the cross-field invariants:
// - range bounds are clamped into their domain and never inverted,
// - a model is only kept while its brand stays selected,
// - any change other than the page itself puts the result window back on page 1.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::Datelike;
use serde::{Deserialize, Serialize};

use crate::resolver;

pub const PRICE_FLOOR: u32 = 0;
pub const PRICE_CEILING: u32 = 100_000;
pub const YEAR_FLOOR: u32 = 2000;
pub const MILEAGE_FLOOR: u32 = 0;
pub const MILEAGE_CEILING: u32 = 200_000;

/// Inclusive integer range. Both bounds are always present.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NumericRange {
    pub min: u32,
    pub max: u32,
}

impl NumericRange {
    /// Builds a range from two bounds given in any order.
    pub fn ordered(a: u32, b: u32) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    pub fn clamp_into(self, bounds: NumericRange) -> Self {
        Self::ordered(
            self.min.clamp(bounds.min, bounds.max),
            self.max.clamp(bounds.min, bounds.max),
        )
    }

    /// Moves the lower bound, dragging the upper bound along if it would invert.
    pub fn with_min(self, min: u32, bounds: NumericRange) -> Self {
        let min = min.clamp(bounds.min, bounds.max);
        Self {
            min,
            max: self.max.max(min),
        }
    }

    /// Moves the upper bound, dragging the lower bound along if it would invert.
    pub fn with_max(self, max: u32, bounds: NumericRange) -> Self {
        let max = max.clamp(bounds.min, bounds.max);
        Self {
            min: self.min.min(max),
            max,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RangeKind {
    Price,
    Year,
    Mileage,
}

/// Domain bounds of the range filters. The year ceiling moves with the calendar,
/// so the defaults are computed once per session and passed around.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FilterDefaults {
    pub price: NumericRange,
    pub year: NumericRange,
    pub mileage: NumericRange,
}

impl FilterDefaults {
    pub fn for_year(current_year: u32) -> Self {
        Self {
            price: NumericRange { min: PRICE_FLOOR, max: PRICE_CEILING },
            year: NumericRange {
                min: YEAR_FLOOR,
                max: current_year.max(YEAR_FLOOR),
            },
            mileage: NumericRange { min: MILEAGE_FLOOR, max: MILEAGE_CEILING },
        }
    }

    pub fn current() -> Self {
        let year = u32::try_from(chrono::Local::now().year()).unwrap_or(YEAR_FLOOR);
        Self::for_year(year)
    }

    pub fn bounds(&self, kind: RangeKind) -> NumericRange {
        match kind {
            RangeKind::Price => self.price,
            RangeKind::Year => self.year,
            RangeKind::Mileage => self.mileage,
        }
    }
}

impl Default for FilterDefaults {
    fn default() -> Self {
        Self::current()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SortOrder {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    YearDesc,
    YearAsc,
    MileageAsc,
    MileageDesc,
    Featured,
}

impl SortOrder {
    pub const ALL: [SortOrder; 8] = [
        SortOrder::Newest,
        SortOrder::PriceAsc,
        SortOrder::PriceDesc,
        SortOrder::YearDesc,
        SortOrder::YearAsc,
        SortOrder::MileageAsc,
        SortOrder::MileageDesc,
        SortOrder::Featured,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SortOrder::Newest => "newest",
            SortOrder::PriceAsc => "price-asc",
            SortOrder::PriceDesc => "price-desc",
            SortOrder::YearDesc => "year-desc",
            SortOrder::YearAsc => "year-asc",
            SortOrder::MileageAsc => "mileage-asc",
            SortOrder::MileageDesc => "mileage-desc",
            SortOrder::Featured => "featured",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            SortOrder::Newest => "Newest Listings",
            SortOrder::PriceAsc => "Price: Low to High",
            SortOrder::PriceDesc => "Price: High to Low",
            SortOrder::YearDesc => "Year: Newest First",
            SortOrder::YearAsc => "Year: Oldest First",
            SortOrder::MileageAsc => "Mileage: Low to High",
            SortOrder::MileageDesc => "Mileage: High to Low",
            SortOrder::Featured => "Featured",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown sort order '{0}'")]
pub struct UnknownSortOrder(pub String);

impl FromStr for SortOrder {
    type Err = UnknownSortOrder;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SortOrder::ALL
            .into_iter()
            .find(|order| order.as_str() == s)
            .ok_or_else(|| UnknownSortOrder(s.to_string()))
    }
}

/// Multi-select filter dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum MultiSelect {
    FuelType,
    Transmission,
    Color,
}

/// Free-form single-value attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Attribute {
    Drivetrain,
    Condition,
    Status,
}

/// Which part of the state a mutation touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterField {
    SearchTerm,
    Brand,
    Model,
    BodyType,
    Multi(MultiSelect),
    Attribute(Attribute),
    Range(RangeKind),
    Sort,
    Page,
    All,
}

/// Every way the filter state can change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMutation {
    SetSearchTerm(String),
    SetBrand(Option<String>),
    SetModel(Option<String>),
    SetBodyType(Option<String>),
    Toggle(MultiSelect, String),
    Deselect(MultiSelect, String),
    SetAttribute(Attribute, Option<String>),
    SetRange { kind: RangeKind, min: u32, max: u32 },
    SetRangeMin(RangeKind, u32),
    SetRangeMax(RangeKind, u32),
    ResetRange(RangeKind),
    SetSort(SortOrder),
    SetPage(u32),
    Reset,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterState {
    pub search_term: String,
    pub brand_id: Option<String>,
    pub model_id: Option<String>,
    pub body_type_id: Option<String>,
    pub fuel_type_ids: BTreeSet<String>,
    pub transmission_ids: BTreeSet<String>,
    pub color_values: BTreeSet<String>,
    pub drivetrain: Option<String>,
    pub condition: Option<String>,
    pub status: Option<String>,
    pub price_range: NumericRange,
    pub year_range: NumericRange,
    pub mileage_range: NumericRange,
    pub sort_by: SortOrder,
    pub page: u32,
}

impl FilterState {
    pub fn new(defaults: &FilterDefaults) -> Self {
        Self {
            search_term: String::new(),
            brand_id: None,
            model_id: None,
            body_type_id: None,
            fuel_type_ids: BTreeSet::new(),
            transmission_ids: BTreeSet::new(),
            color_values: BTreeSet::new(),
            drivetrain: None,
            condition: None,
            status: None,
            price_range: defaults.price,
            year_range: defaults.year,
            mileage_range: defaults.mileage,
            sort_by: SortOrder::default(),
            page: 1,
        }
    }

    pub fn range(&self, kind: RangeKind) -> NumericRange {
        match kind {
            RangeKind::Price => self.price_range,
            RangeKind::Year => self.year_range,
            RangeKind::Mileage => self.mileage_range,
        }
    }

    fn range_mut(&mut self, kind: RangeKind) -> &mut NumericRange {
        match kind {
            RangeKind::Price => &mut self.price_range,
            RangeKind::Year => &mut self.year_range,
            RangeKind::Mileage => &mut self.mileage_range,
        }
    }

    pub fn selection(&self, kind: MultiSelect) -> &BTreeSet<String> {
        match kind {
            MultiSelect::FuelType => &self.fuel_type_ids,
            MultiSelect::Transmission => &self.transmission_ids,
            MultiSelect::Color => &self.color_values,
        }
    }

    fn selection_mut(&mut self, kind: MultiSelect) -> &mut BTreeSet<String> {
        match kind {
            MultiSelect::FuelType => &mut self.fuel_type_ids,
            MultiSelect::Transmission => &mut self.transmission_ids,
            MultiSelect::Color => &mut self.color_values,
        }
    }

    pub fn attribute(&self, attribute: Attribute) -> Option<&str> {
        match attribute {
            Attribute::Drivetrain => self.drivetrain.as_deref(),
            Attribute::Condition => self.condition.as_deref(),
            Attribute::Status => self.status.as_deref(),
        }
    }

    fn attribute_mut(&mut self, attribute: Attribute) -> &mut Option<String> {
        match attribute {
            Attribute::Drivetrain => &mut self.drivetrain,
            Attribute::Condition => &mut self.condition,
            Attribute::Status => &mut self.status,
        }
    }

    pub fn is_default(&self, defaults: &FilterDefaults) -> bool {
        *self == FilterState::new(defaults)
    }

    /// True when no filtering dimension deviates from its default.
    /// Sort order and page are presentation of the result set, not filters.
    pub fn filters_are_default(&self, defaults: &FilterDefaults) -> bool {
        let mut projected = self.clone();
        projected.sort_by = SortOrder::default();
        projected.page = 1;
        projected.is_default(defaults)
    }

    /// Applies a mutation in place and reports which field changed.
    ///
    /// Returns `None` when the mutation was a no-op; in that case the page is
    /// left alone as well.
    pub fn apply(&mut self, mutation: FilterMutation, defaults: &FilterDefaults) -> Option<FilterField> {
        let before = self.clone();
        let field = match mutation {
            FilterMutation::SetSearchTerm(text) => {
                self.search_term = normalize_search(text);
                FilterField::SearchTerm
            }
            FilterMutation::SetBrand(brand) => {
                *self = resolver::apply_brand_change(self, normalize_id(brand));
                FilterField::Brand
            }
            FilterMutation::SetModel(model) => {
                if self.brand_id.is_none() {
                    tracing::debug!("Ignoring model selection without a brand");
                    return None;
                }
                self.model_id = normalize_id(model);
                FilterField::Model
            }
            FilterMutation::SetBodyType(body_type) => {
                self.body_type_id = normalize_id(body_type);
                FilterField::BodyType
            }
            FilterMutation::Toggle(kind, value) => {
                let value = normalize_value(value)?;
                let set = self.selection_mut(kind);
                if !set.remove(&value) {
                    set.insert(value);
                }
                FilterField::Multi(kind)
            }
            FilterMutation::Deselect(kind, value) => {
                self.selection_mut(kind).remove(value.trim());
                FilterField::Multi(kind)
            }
            FilterMutation::SetAttribute(attribute, value) => {
                *self.attribute_mut(attribute) = normalize_id(value);
                FilterField::Attribute(attribute)
            }
            FilterMutation::SetRange { kind, min, max } => {
                *self.range_mut(kind) = NumericRange::ordered(min, max).clamp_into(defaults.bounds(kind));
                FilterField::Range(kind)
            }
            FilterMutation::SetRangeMin(kind, min) => {
                let range = self.range(kind).with_min(min, defaults.bounds(kind));
                *self.range_mut(kind) = range;
                FilterField::Range(kind)
            }
            FilterMutation::SetRangeMax(kind, max) => {
                let range = self.range(kind).with_max(max, defaults.bounds(kind));
                *self.range_mut(kind) = range;
                FilterField::Range(kind)
            }
            FilterMutation::ResetRange(kind) => {
                *self.range_mut(kind) = defaults.bounds(kind);
                FilterField::Range(kind)
            }
            FilterMutation::SetSort(order) => {
                self.sort_by = order;
                FilterField::Sort
            }
            FilterMutation::SetPage(page) => {
                self.page = page.max(1);
                FilterField::Page
            }
            FilterMutation::Reset => {
                *self = FilterState::new(defaults);
                FilterField::All
            }
        };

        if *self == before {
            return None;
        }
        if field != FilterField::Page {
            self.page = 1;
        }
        Some(field)
    }
}

/// Whitespace-only search text is the same as no search.
pub(crate) fn normalize_search(text: String) -> String {
    if text.trim().is_empty() { String::new() } else { text }
}

pub(crate) fn normalize_id(id: Option<String>) -> Option<String> {
    id.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Multi-select values travel as CSV, so a value may not carry a comma.
pub(crate) fn normalize_value(value: String) -> Option<String> {
    let value = value.trim();
    if value.is_empty() || value.contains(',') {
        tracing::debug!(value, "Rejecting multi-select value");
        return None;
    }
    Some(value.to_string())
}
