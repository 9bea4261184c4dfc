use axum::{Json, response::Redirect};
use serde_json::{Value, json};

use crate::url_sync::INVENTORY_PATH;

// The site has a single page; the root only points at it
pub async fn home() -> Redirect {
    Redirect::temporary(INVENTORY_PATH)
}

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok", "version": env!("CARGO_PKG_VERSION") }))
}
