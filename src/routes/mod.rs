// Route definitions

use axum::{Router, routing::get};

use crate::AppState;

mod inventory;
mod pages;

pub fn create_router(app_state: AppState) -> Router {
    let api_router = Router::new()
        .route("/inventory", get(inventory::inventory_json))
        .with_state(app_state.clone());

    Router::new()
        .route("/", get(pages::home))
        .route("/health", get(pages::health))
        .route("/inventory", get(inventory::inventory_page))
        .nest("/api", api_router)
        .with_state(app_state)
}
