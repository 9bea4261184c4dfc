// Vehicle inventory browser: filter state, URL sync, cascading options and
// latest-wins result fetching, served as a server-rendered axum site.

use std::sync::Arc;

use axum::extract::FromRef;

pub mod api;
pub mod catalog;
pub mod config;
pub mod debounce;
pub mod error;
pub mod executor;
pub mod filters;
pub mod models;
pub mod query;
pub mod resolver;
pub mod routes;
pub mod session;
pub mod store;
pub mod url_sync;
pub mod view;

#[cfg(test)]
mod test_support;

use crate::catalog::OptionProviders;
use crate::config::Settings;
use crate::executor::VehicleSource;
use crate::filters::FilterDefaults;
use crate::session::SessionDeps;

// Shared across every request; sessions themselves are per request
#[derive(Clone, FromRef)]
pub struct AppState {
    pub settings: Arc<Settings>,
    pub vehicles: Arc<dyn VehicleSource>,
    pub providers: Arc<OptionProviders>,
}

impl AppState {
    /// Collaborators for a fresh inventory session. The year ceiling is read
    /// from the clock on every call so it rolls over without a restart.
    pub fn session_deps(&self) -> SessionDeps {
        SessionDeps {
            providers: Arc::clone(&self.providers),
            vehicles: Arc::clone(&self.vehicles),
            defaults: FilterDefaults::current(),
            timing: self.settings.timing(),
        }
    }
}
