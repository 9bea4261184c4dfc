// Client for the dealership REST API (option catalogs and vehicle search)

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;

use crate::catalog::{CatalogOption, CatalogSource, OptionKind};
use crate::error::ApiError;
use crate::executor::VehicleSource;
use crate::models::{Envelope, QueryResult};
use crate::query::VehicleQuery;

const MODELS_PATH: &str = "/models/dropdown";
const VEHICLES_PATH: &str = "/vehicles";

// Shared HTTP client; created once in main and handed to every consumer
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(concat!("lot_browser/", env!("CARGO_PKG_VERSION")))
        .timeout(timeout)
        .build()
        .context("Failed to build reqwest client")
}

#[derive(Debug, Clone)]
pub struct DealershipApi {
    client: Client,
    base_url: String,
}

impl DealershipApi {
    pub fn new(client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // GET {base}{path}?{query} and unwrap the `{success, data}` envelope
    async fn get_data<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!(url, ?query, "Calling dealership API");

        let response = self
            .client
            .get(&url)
            .query(query)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(ApiError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            tracing::warn!(url, status = %status, "Dealership API returned an error status");
            return Err(ApiError::Status {
                status,
                path: path.to_string(),
            });
        }

        let envelope: Envelope<T> = response.json().await.map_err(ApiError::Decode)?;
        envelope.into_data(path)
    }
}

#[async_trait]
impl CatalogSource for DealershipApi {
    async fn options(&self, kind: OptionKind) -> Result<Vec<CatalogOption>, ApiError> {
        self.get_data(kind.path(), &[]).await
    }

    async fn models(&self, brand_id: &str) -> Result<Vec<CatalogOption>, ApiError> {
        self.get_data(MODELS_PATH, &[("make", brand_id.to_string())]).await
    }
}

#[async_trait]
impl VehicleSource for DealershipApi {
    async fn search_vehicles(&self, query: &VehicleQuery) -> Result<QueryResult, ApiError> {
        self.get_data(VEHICLES_PATH, query.params()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::Query,
        http::StatusCode,
        routing::get,
    };
    use serde_json::json;
    use std::collections::HashMap;

    use crate::filters::{FilterDefaults, FilterMutation, FilterState};

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/api")
    }

    fn api(base_url: String) -> DealershipApi {
        DealershipApi::new(build_client(Duration::from_secs(5)).unwrap(), base_url)
    }

    #[tokio::test]
    async fn test_fetches_brands_from_dropdown() {
        let router = Router::new().route(
            "/api/makes/dropdown",
            get(|| async { Json(json!({"success": true, "data": [{"_id": "h1", "name": "Honda"}]})) }),
        );
        let api = api(serve(router).await);

        let brands = api.options(OptionKind::Brands).await.unwrap();

        assert_eq!(brands, vec![CatalogOption::new("h1", "Honda")]);
    }

    #[tokio::test]
    async fn test_models_are_scoped_by_make() {
        let router = Router::new().route(
            "/api/models/dropdown",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let make = params.get("make").cloned().unwrap_or_default();
                Json(json!({"success": true, "data": [{"value": format!("{make}-m1"), "label": "Model"}]}))
            }),
        );
        let api = api(serve(router).await);

        let models = api.models("t1").await.unwrap();

        assert_eq!(models[0].id, "t1-m1");
    }

    #[tokio::test]
    async fn test_vehicle_search_sends_query_parameters() {
        let router = Router::new().route(
            "/api/vehicles",
            get(|Query(params): Query<HashMap<String, String>>| async move {
                let expected = params.get("q").map(String::as_str) == Some("civic")
                    && params.get("page").map(String::as_str) == Some("1")
                    && params.get("limit").map(String::as_str) == Some("12");
                if !expected {
                    return (StatusCode::BAD_REQUEST, Json(json!({"success": false})));
                }
                (
                    StatusCode::OK,
                    Json(json!({
                        "success": true,
                        "data": {
                            "vehicles": [{"_id": "v1", "make": "Honda", "model": "Civic", "year": 2018, "price": 15000}],
                            "pagination": {"total": 1, "page": 1, "limit": 12, "totalPages": 1}
                        }
                    })),
                )
            }),
        );
        let api = api(serve(router).await);
        let defaults = FilterDefaults::for_year(2025);
        let mut state = FilterState::new(&defaults);
        state.apply(FilterMutation::SetSearchTerm("civic".into()), &defaults);

        let result = api
            .search_vehicles(&VehicleQuery::from_state(&state, &defaults, 12))
            .await
            .unwrap();

        assert_eq!(result.vehicles.len(), 1);
        assert_eq!(result.vehicles[0].display_title(), "2018 Honda Civic");
        assert_eq!(result.pagination.total_pages, 1);
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let router = Router::new().route(
            "/api/vehicles",
            get(|| async { (StatusCode::BAD_GATEWAY, "upstream down") }),
        );
        let api = api(serve(router).await);
        let defaults = FilterDefaults::for_year(2025);

        let err = api
            .search_vehicles(&VehicleQuery::from_state(&FilterState::new(&defaults), &defaults, 12))
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Status { status, .. } if status == StatusCode::BAD_GATEWAY));
    }

    #[tokio::test]
    async fn test_unsuccessful_envelope_is_an_error() {
        let router = Router::new().route(
            "/api/fuel-types",
            get(|| async { Json(json!({"success": false, "message": "maintenance"})) }),
        );
        let api = api(serve(router).await);

        let err = api.options(OptionKind::FuelTypes).await.unwrap_err();

        assert!(matches!(err, ApiError::Unsuccessful { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_a_transport_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let api = api(format!("http://{addr}/api"));

        let err = api.options(OptionKind::Brands).await.unwrap_err();

        assert!(matches!(err, ApiError::Transport(_)));
    }
}
