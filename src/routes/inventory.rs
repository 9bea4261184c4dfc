// Server-rendered inventory page and its JSON twin.
//
// Each request opens a fresh InventorySession on a MemoryHistory seeded with the
// request URL, waits for the catalog and the first fetch, then renders the
// derived view. Every link on the page is the URL of the state after one mutation.

use std::sync::Arc;

use askama::Template;
use axum::{
    Json,
    extract::{RawQuery, State},
    response::Html,
};
use serde::Serialize;
use url::form_urlencoded;

use crate::AppState;
use crate::catalog::{CatalogOption, OptionCatalog, OptionKind};
use crate::executor::FetchStatus;
use crate::error::{AppError, AppResult};
use crate::filters::{Attribute, FilterDefaults, FilterMutation, FilterState, MultiSelect, RangeKind, SortOrder};
use crate::models::VehicleSummary;
use crate::query::{param, range_params};
use crate::session::InventorySession;
use crate::url_sync::{INVENTORY_PATH, MemoryHistory};
use crate::view::{InventoryView, Layout, PageItem, range_label, thousands, title_case};

/// Hidden form field holding the brand the filter form was rendered for.
const SCOPE_PARAM: &str = "scope";

const COLORS: [&str; 8] = ["black", "white", "silver", "gray", "blue", "red", "green", "brown"];
const DRIVETRAINS: [&str; 4] = ["fwd", "rwd", "awd", "4wd"];
const CONDITIONS: [&str; 3] = ["new", "used", "certified"];
const STATUSES: [&str; 3] = ["available", "pending", "sold"];

/// A submitted form carries the old model alongside a newly picked brand.
/// Drops the model when the brand moved and strips page-local keys.
fn reconcile_form_scope(query: &str) -> String {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
        .into_owned()
        .collect();
    let value_of = |key: &str| {
        pairs
            .iter()
            .rev()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.trim().to_string())
    };

    let brand_moved = match value_of(SCOPE_PARAM) {
        Some(scope) => value_of(param::MAKE).unwrap_or_default() != scope,
        None => false,
    };

    let mut out = form_urlencoded::Serializer::new(String::new());
    for (key, value) in &pairs {
        let page_local = key == SCOPE_PARAM || key == Layout::PARAM;
        if page_local || (brand_moved && key == param::MODEL) {
            continue;
        }
        out.append_pair(key, value);
    }
    out.finish()
}

fn with_layout(href: String, layout: Layout) -> String {
    match layout {
        Layout::Grid => href,
        Layout::List if href.contains('?') => format!("{href}&{}=list", Layout::PARAM),
        Layout::List => format!("{href}?{}=list", Layout::PARAM),
    }
}

async fn load_session(app: &AppState, raw_query: &str) -> (InventorySession, OptionCatalog) {
    let query = reconcile_form_scope(raw_query);
    let href = if query.is_empty() {
        INVENTORY_PATH.to_string()
    } else {
        format!("{INVENTORY_PATH}?{query}")
    };

    let session = InventorySession::open(app.session_deps(), Arc::new(MemoryHistory::new(href)));
    let (catalog, snapshot) = futures::join!(session.load_catalog(), session.settled());
    tracing::debug!(
        href = %session.location(),
        request_id = snapshot.request_id,
        status = ?snapshot.status,
        "Inventory session settled"
    );
    (session, catalog)
}

#[derive(Debug, Clone)]
struct Choice {
    value: String,
    label: String,
    selected: bool,
}

#[derive(Debug, Clone)]
struct RangeField {
    label: &'static str,
    min_name: &'static str,
    max_name: &'static str,
    min: u32,
    max: u32,
    floor: u32,
    ceiling: u32,
    step: u32,
    summary: String,
}

#[derive(Debug, Clone)]
struct BrandTile {
    name: String,
    logo: Option<String>,
    href: String,
    active: bool,
}

#[derive(Debug, Clone)]
struct ChipLink {
    label: String,
    remove_href: String,
}

#[derive(Debug, Clone)]
struct VehicleCard {
    title: String,
    price: String,
    mileage: Option<String>,
    image: Option<String>,
    details: Vec<String>,
    badge: Option<String>,
}

#[derive(Debug, Clone)]
struct PageLink {
    label: String,
    href: Option<String>,
    current: bool,
}

#[derive(Template)]
#[template(path = "inventory.html")]
struct InventoryTemplate {
    canonical: String,
    search_term: String,
    scope: String,
    list_layout: bool,
    grid_href: String,
    list_href: String,
    clear_href: String,
    active_filter_count: usize,
    brands: Vec<Choice>,
    models: Vec<Choice>,
    models_disabled: bool,
    body_types: Vec<Choice>,
    fuel_types: Vec<Choice>,
    transmissions: Vec<Choice>,
    colors: Vec<Choice>,
    drivetrains: Vec<Choice>,
    conditions: Vec<Choice>,
    statuses: Vec<Choice>,
    sort_options: Vec<Choice>,
    ranges: Vec<RangeField>,
    brand_tiles: Vec<BrandTile>,
    chips: Vec<ChipLink>,
    summary: String,
    message: Option<&'static str>,
    failed: bool,
    retry_href: String,
    vehicles: Vec<VehicleCard>,
    pages: Vec<PageLink>,
    previous_href: Option<String>,
    next_href: Option<String>,
}

// Options for a single select; an id the catalog doesn't know stays selectable
fn single_choices(options: &[CatalogOption], selected: Option<&str>) -> Vec<Choice> {
    let mut choices: Vec<Choice> = options
        .iter()
        .map(|o| Choice {
            value: o.id.clone(),
            label: o.name.clone(),
            selected: selected == Some(o.id.as_str()),
        })
        .collect();
    if let Some(id) = selected {
        if !options.iter().any(|o| o.id == id) {
            choices.push(Choice {
                value: id.to_string(),
                label: id.to_string(),
                selected: true,
            });
        }
    }
    choices
}

fn multi_choices(options: &[CatalogOption], state: &FilterState, kind: MultiSelect) -> Vec<Choice> {
    let selection = state.selection(kind);
    let mut choices: Vec<Choice> = options
        .iter()
        .map(|o| Choice {
            value: o.id.clone(),
            label: o.name.clone(),
            selected: selection.contains(&o.id),
        })
        .collect();
    for id in selection {
        if !options.iter().any(|o| &o.id == id) {
            choices.push(Choice {
                value: id.clone(),
                label: title_case(id),
                selected: true,
            });
        }
    }
    choices
}

fn fixed_choices(values: &[&str], selected: Option<&str>, label: fn(&str) -> String) -> Vec<Choice> {
    let options: Vec<CatalogOption> = values.iter().map(|v| CatalogOption::new(*v, label(v))).collect();
    single_choices(&options, selected)
}

fn attribute_choices(state: &FilterState, attribute: Attribute) -> Vec<Choice> {
    let selected = state.attribute(attribute);
    match attribute {
        Attribute::Drivetrain => fixed_choices(&DRIVETRAINS, selected, |v| v.to_uppercase()),
        Attribute::Condition => fixed_choices(&CONDITIONS, selected, title_case),
        Attribute::Status => fixed_choices(&STATUSES, selected, title_case),
    }
}

fn range_field(kind: RangeKind, state: &FilterState, defaults: &FilterDefaults) -> RangeField {
    let (min_name, max_name) = range_params(kind);
    let bounds = defaults.bounds(kind);
    let range = state.range(kind);
    let (label, step) = match kind {
        RangeKind::Price => ("Price", 1_000),
        RangeKind::Year => ("Year", 1),
        RangeKind::Mileage => ("Mileage", 5_000),
    };
    RangeField {
        label,
        min_name,
        max_name,
        min: range.min,
        max: range.max,
        floor: bounds.min,
        ceiling: bounds.max,
        step,
        summary: range_label(kind, range.min, range.max),
    }
}

fn vehicle_card(vehicle: &VehicleSummary) -> VehicleCard {
    let details = [&vehicle.fuel_type, &vehicle.transmission, &vehicle.exterior_color]
        .into_iter()
        .flatten()
        .map(|d| title_case(d))
        .filter(|d| !d.is_empty())
        .collect();
    VehicleCard {
        title: vehicle.display_title(),
        price: match vehicle.price {
            Some(price) => format!("${}", thousands(price)),
            None => "Call for price".to_string(),
        },
        mileage: vehicle.mileage.map(|m| format!("{} mi", thousands(m))),
        image: vehicle.image.clone(),
        details,
        badge: vehicle.status.as_deref().or(vehicle.condition.as_deref()).map(title_case),
    }
}

fn render_page(session: &InventorySession, catalog: &OptionCatalog, view: InventoryView, layout: Layout) -> InventoryTemplate {
    let state = &view.filters;
    let defaults = session.defaults();
    let canonical = session.location();
    let link = |mutation: FilterMutation| with_layout(session.href_after(mutation), layout);

    let model_options = session.models();
    let brand_tiles = catalog
        .brands
        .iter()
        .map(|brand| {
            let active = state.brand_id.as_deref() == Some(brand.id.as_str());
            // Clicking the selected brand again clears it
            let target = if active { None } else { Some(brand.id.clone()) };
            BrandTile {
                name: brand.name.clone(),
                logo: brand.logo.clone(),
                href: link(FilterMutation::SetBrand(target)),
                active,
            }
        })
        .collect();

    let chips = view
        .chips
        .iter()
        .map(|chip| ChipLink {
            label: chip.label.clone(),
            remove_href: link(chip.key.removal()),
        })
        .collect();

    let pages = view
        .pages
        .items
        .iter()
        .map(|item| match item {
            PageItem::Page { number, current } => PageLink {
                label: number.to_string(),
                href: (!current).then(|| link(FilterMutation::SetPage(*number))),
                current: *current,
            },
            PageItem::Gap => PageLink {
                label: "…".to_string(),
                href: None,
                current: false,
            },
        })
        .collect();

    let colors = {
        let palette: Vec<CatalogOption> = COLORS.iter().map(|c| CatalogOption::new(*c, title_case(c))).collect();
        multi_choices(&palette, state, MultiSelect::Color)
    };

    let sort_options = SortOrder::ALL
        .iter()
        .map(|order| Choice {
            value: order.as_str().to_string(),
            label: order.label().to_string(),
            selected: *order == state.sort_by,
        })
        .collect();

    InventoryTemplate {
        search_term: state.search_term.clone(),
        scope: state.brand_id.clone().unwrap_or_default(),
        list_layout: layout == Layout::List,
        grid_href: canonical.clone(),
        list_href: with_layout(canonical.clone(), Layout::List),
        clear_href: link(FilterMutation::Reset),
        active_filter_count: view.active_filter_count,
        brands: single_choices(&catalog.brands, state.brand_id.as_deref()),
        models: if state.brand_id.is_some() {
            single_choices(&model_options.models, state.model_id.as_deref())
        } else {
            Vec::new()
        },
        models_disabled: state.brand_id.is_none(),
        body_types: single_choices(&catalog.body_types, state.body_type_id.as_deref()),
        fuel_types: multi_choices(catalog.options(OptionKind::FuelTypes), state, MultiSelect::FuelType),
        transmissions: multi_choices(catalog.options(OptionKind::Transmissions), state, MultiSelect::Transmission),
        colors,
        drivetrains: attribute_choices(state, Attribute::Drivetrain),
        conditions: attribute_choices(state, Attribute::Condition),
        statuses: attribute_choices(state, Attribute::Status),
        sort_options,
        ranges: [RangeKind::Price, RangeKind::Year, RangeKind::Mileage]
            .into_iter()
            .map(|kind| range_field(kind, state, defaults))
            .collect(),
        brand_tiles,
        chips,
        summary: view.summary.clone(),
        message: view.message,
        failed: view.status == FetchStatus::Failed,
        retry_href: with_layout(canonical.clone(), layout),
        vehicles: view.vehicles.iter().map(vehicle_card).collect(),
        pages,
        previous_href: view.pages.previous.map(|p| link(FilterMutation::SetPage(p))),
        next_href: view.pages.next.map(|p| link(FilterMutation::SetPage(p))),
        canonical,
    }
}

pub async fn inventory_page(State(app): State<AppState>, RawQuery(query): RawQuery) -> AppResult<Html<String>> {
    let query = query.unwrap_or_default();
    let layout = Layout::from_query(&query);
    let (session, catalog) = load_session(&app, &query).await;

    let view = session.view();
    tracing::info!(
        href = %session.location(),
        vehicles = view.vehicles.len(),
        active_filters = view.active_filter_count,
        "Rendering inventory page"
    );

    let template = render_page(&session, &catalog, view, layout);
    match template.render() {
        Ok(html) => Ok(Html(html)),
        Err(e) => {
            tracing::error!("Failed to render inventory template: {}", e);
            Err(AppError::InternalServerError(anyhow::Error::new(e)))
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryResponse {
    canonical: String,
    layout: Layout,
    models: Vec<CatalogOption>,
    #[serde(flatten)]
    view: InventoryView,
}

pub async fn inventory_json(State(app): State<AppState>, RawQuery(query): RawQuery) -> Json<InventoryResponse> {
    let query = query.unwrap_or_default();
    let (session, _) = load_session(&app, &query).await;

    Json(InventoryResponse {
        canonical: session.location(),
        layout: Layout::from_query(&query),
        models: session.models().models,
        view: session.view(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::OptionProviders;
    use crate::config::Settings;
    use crate::routes::create_router;
    use crate::test_support::{FakeBackend, result_with};
    use serde_json::Value;
    use std::time::Duration;

    fn settings() -> Settings {
        Settings {
            server_address: "127.0.0.1:0".to_string(),
            api_base_url: "http://unused.invalid/api".to_string(),
            page_size: 12,
            request_timeout_secs: 5,
            search_debounce_ms: 400,
            range_settle_ms: 250,
            catalog_ttl_secs: 60,
        }
    }

    async fn serve_site(backend: Arc<FakeBackend>) -> String {
        let state = AppState {
            settings: Arc::new(settings()),
            vehicles: backend.clone(),
            providers: Arc::new(OptionProviders::new(backend, Duration::from_secs(60))),
        };
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, create_router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn backend() -> Arc<FakeBackend> {
        let backend = FakeBackend::with_brands(vec![
            CatalogOption::new("h1", "Honda"),
            CatalogOption::new("t1", "Toyota"),
        ]);
        backend.set_models("h1", vec![CatalogOption::new("c1", "Civic")]);
        backend.respond_to("", result_with(&["v1", "v2"], 2));
        Arc::new(backend)
    }

    #[test]
    fn test_form_brand_change_drops_stale_model() {
        assert_eq!(reconcile_form_scope("make=t1&model=c1&scope=h1"), "make=t1");
        assert_eq!(reconcile_form_scope("make=h1&model=c1&scope=h1"), "make=h1&model=c1");
        assert_eq!(reconcile_form_scope("make=&model=c1&scope=h1"), "make=");
    }

    #[test]
    fn test_links_without_scope_are_untouched() {
        assert_eq!(reconcile_form_scope("make=t1&model=c1"), "make=t1&model=c1");
        assert_eq!(reconcile_form_scope("q=civic&view=list"), "q=civic");
        assert_eq!(reconcile_form_scope(""), "");
    }

    #[test]
    fn test_list_layout_is_appended_to_links() {
        assert_eq!(with_layout("/inventory".into(), Layout::List), "/inventory?view=list");
        assert_eq!(with_layout("/inventory?page=2".into(), Layout::List), "/inventory?page=2&view=list");
        assert_eq!(with_layout("/inventory?page=2".into(), Layout::Grid), "/inventory?page=2");
    }

    #[test]
    fn test_unknown_selected_id_stays_selectable() {
        let options = vec![CatalogOption::new("h1", "Honda")];
        let choices = single_choices(&options, Some("gone"));
        assert_eq!(choices.len(), 2);
        assert!(!choices[0].selected);
        assert_eq!(choices[1].label, "gone");
        assert!(choices[1].selected);
    }

    #[tokio::test]
    async fn test_json_view_reflects_normalised_url() {
        let base = serve_site(backend()).await;

        let body: Value = reqwest::get(format!("{base}/api/inventory?make=h1&model=c1&minPrice=abc&page=0&view=list"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["canonical"], "/inventory?make=h1&model=c1");
        assert_eq!(body["layout"], "list");
        assert_eq!(body["activeFilterCount"], 2);
        assert_eq!(body["vehicles"].as_array().unwrap().len(), 2);
        assert_eq!(body["models"][0]["name"], "Civic");
        assert_eq!(body["status"], "success");
    }

    #[tokio::test]
    async fn test_form_submission_with_new_brand_clears_model() {
        let backend = backend();
        let base = serve_site(backend.clone()).await;

        let body: Value = reqwest::get(format!("{base}/api/inventory?scope=h1&make=t1&model=c1"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();

        assert_eq!(body["canonical"], "/inventory?make=t1");
        assert_eq!(body["filters"]["modelId"], Value::Null);
        let last = backend.vehicle_queries().last().cloned().unwrap();
        assert_eq!(last.get("model"), None);
    }

    #[tokio::test]
    async fn test_inventory_page_renders_results_and_chips() {
        let base = serve_site(backend()).await;

        let response = reqwest::get(format!("{base}/inventory?make=h1&exteriorColor=blue")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let html = response.text().await.unwrap();

        assert!(html.contains("Showing 1-2 of 2 vehicles"));
        assert!(html.contains("2020 Honda Civic"));
        assert!(html.contains("$18,500"));
        assert!(html.contains("2 active"));
        assert!(html.contains("Toyota"));
        assert!(html.contains("Clear all"));
    }

    #[tokio::test]
    async fn test_failed_backend_renders_error_notice() {
        let backend = backend();
        backend.fail_vehicles(true);
        let base = serve_site(backend).await;

        let response = reqwest::get(format!("{base}/inventory")).await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let html = response.text().await.unwrap();

        assert!(html.contains("Try again"));
        assert!(html.contains("No vehicles found"));
        assert!(!html.contains("vehicle-card"));
    }

    #[tokio::test]
    async fn test_root_redirects_and_health_answers() {
        let base = serve_site(backend()).await;
        let client = reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .unwrap();

        let response = client.get(format!("{base}/")).send().await.unwrap();
        assert_eq!(response.status(), reqwest::StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()["location"], "/inventory");

        let health: Value = client.get(format!("{base}/health")).send().await.unwrap().json().await.unwrap();
        assert_eq!(health["status"], "ok");
    }
}
