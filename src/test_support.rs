// Scripted in-process backend for unit tests.
//
// Responses are keyed by the search term of the request (`""` when absent).
// Gates hold a matching request until the returned sender fires, which lets tests
// control the order in which concurrent requests complete.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::catalog::{CatalogOption, CatalogSource, OptionKind};
use crate::error::ApiError;
use crate::executor::VehicleSource;
use crate::filters::SortOrder;
use crate::models::{Pagination, QueryResult, VehicleSummary};
use crate::query::{param, VehicleQuery};

pub fn vehicle(id: &str) -> VehicleSummary {
    VehicleSummary {
        id: id.to_string(),
        title: None,
        year: Some(2020),
        make: Some("Honda".to_string()),
        model: Some("Civic".to_string()),
        price: Some(18_500),
        mileage: Some(42_000),
        image: None,
        fuel_type: None,
        transmission: None,
        exterior_color: None,
        condition: None,
        status: None,
    }
}

pub fn result_with(ids: &[&str], total: u64) -> QueryResult {
    QueryResult {
        vehicles: ids.iter().map(|id| vehicle(id)).collect(),
        pagination: Pagination {
            total,
            page: 1,
            limit: 12,
            total_pages: if total == 0 { 0 } else { total.div_ceil(12) as u32 },
        },
    }
}

struct Gate {
    param: &'static str,
    value: String,
    release: oneshot::Receiver<()>,
}

#[derive(Default)]
pub struct FakeBackend {
    options: Mutex<HashMap<OptionKind, Vec<CatalogOption>>>,
    option_calls: Mutex<HashMap<OptionKind, usize>>,
    fail_options: Mutex<bool>,
    models: Mutex<HashMap<String, Vec<CatalogOption>>>,
    model_calls: Mutex<Vec<String>>,
    model_gates: Mutex<HashMap<String, oneshot::Receiver<()>>>,
    vehicles: Mutex<HashMap<String, QueryResult>>,
    vehicle_queries: Mutex<Vec<VehicleQuery>>,
    vehicle_gates: Mutex<Vec<Gate>>,
    fail_vehicles: Mutex<bool>,
}

impl FakeBackend {
    pub fn with_brands(brands: Vec<CatalogOption>) -> Self {
        let backend = Self::default();
        backend.set_options(OptionKind::Brands, brands);
        backend
    }

    pub fn set_options(&self, kind: OptionKind, options: Vec<CatalogOption>) {
        self.options.lock().insert(kind, options);
    }

    pub fn fail_options(&self, fail: bool) {
        *self.fail_options.lock() = fail;
    }

    pub fn option_calls(&self, kind: OptionKind) -> usize {
        self.option_calls.lock().get(&kind).copied().unwrap_or(0)
    }

    pub fn set_models(&self, brand_id: &str, models: Vec<CatalogOption>) {
        self.models.lock().insert(brand_id.to_string(), models);
    }

    pub fn model_calls(&self) -> Vec<String> {
        self.model_calls.lock().clone()
    }

    pub fn gate_models(&self, brand_id: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.model_gates.lock().insert(brand_id.to_string(), rx);
        tx
    }

    pub fn respond_to(&self, search_term: &str, result: QueryResult) {
        self.vehicles.lock().insert(search_term.to_string(), result);
    }

    pub fn fail_vehicles(&self, fail: bool) {
        *self.fail_vehicles.lock() = fail;
    }

    pub fn vehicle_queries(&self) -> Vec<VehicleQuery> {
        self.vehicle_queries.lock().clone()
    }

    pub fn gate_vehicles(&self, search_term: &str) -> oneshot::Sender<()> {
        self.gate_matching(param::SEARCH, search_term)
    }

    pub fn gate_sort(&self, order: SortOrder) -> oneshot::Sender<()> {
        self.gate_matching(param::SORT, order.as_str())
    }

    fn gate_matching(&self, param: &'static str, value: &str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.vehicle_gates.lock().push(Gate {
            param,
            value: value.to_string(),
            release: rx,
        });
        tx
    }

    fn take_vehicle_gate(&self, query: &VehicleQuery) -> Option<oneshot::Receiver<()>> {
        let mut gates = self.vehicle_gates.lock();
        let index = gates
            .iter()
            .position(|gate| query.get(gate.param).unwrap_or("") == gate.value)?;
        Some(gates.remove(index).release)
    }
}

#[async_trait]
impl CatalogSource for FakeBackend {
    async fn options(&self, kind: OptionKind) -> Result<Vec<CatalogOption>, ApiError> {
        *self.option_calls.lock().entry(kind).or_insert(0) += 1;
        if *self.fail_options.lock() {
            return Err(ApiError::Unsuccessful {
                path: kind.path().to_string(),
                message: "scripted failure".to_string(),
            });
        }
        Ok(self.options.lock().get(&kind).cloned().unwrap_or_default())
    }

    async fn models(&self, brand_id: &str) -> Result<Vec<CatalogOption>, ApiError> {
        self.model_calls.lock().push(brand_id.to_string());
        let gate = self.model_gates.lock().remove(brand_id);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        Ok(self.models.lock().get(brand_id).cloned().unwrap_or_default())
    }
}

#[async_trait]
impl VehicleSource for FakeBackend {
    async fn search_vehicles(&self, query: &VehicleQuery) -> Result<QueryResult, ApiError> {
        self.vehicle_queries.lock().push(query.clone());
        let gate = self.take_vehicle_gate(query);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if *self.fail_vehicles.lock() {
            return Err(ApiError::Status {
                status: reqwest::StatusCode::INTERNAL_SERVER_ERROR,
                path: "/vehicles".to_string(),
            });
        }
        let term = query.get(param::SEARCH).unwrap_or("");
        let result = self.vehicles.lock().get(term).cloned();
        Ok(result.unwrap_or_else(|| QueryResult::empty(query.page(), query.limit())))
    }
}
