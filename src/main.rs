use anyhow::{Context, Result};
use axum::Router;
use std::{net::SocketAddr, sync::Arc};
use tokio::net::TcpListener;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use lot_browser::{
    AppState,
    api::{self, DealershipApi},
    catalog::OptionProviders,
    config::Settings,
    routes,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file first. Ignore errors (e.g., file not found)
    dotenv::dotenv().ok();

    // Initialize logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "lot_browser=info,tower_http=info".into()))
        .with(fmt::layer())
        .init();

    tracing::info!("Initializing inventory browser...");

    let settings = match Settings::new() {
        Ok(s) => {
            tracing::info!(api_base_url = %s.api_base_url, page_size = s.page_size, "Configuration loaded successfully.");
            s
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };
    let shared_settings = Arc::new(settings);

    // One client for the whole process; it pools connections to the backend
    let http_client = api::build_client(shared_settings.request_timeout())?;
    let backend = Arc::new(DealershipApi::new(http_client, shared_settings.api_base_url.clone()));
    tracing::info!(base_url = backend.base_url(), "Dealership API client created.");

    let providers = Arc::new(OptionProviders::new(backend.clone(), shared_settings.catalog_ttl()));

    let app_state = AppState {
        settings: shared_settings.clone(),
        vehicles: backend,
        providers,
    };

    let router: Router = routes::create_router(app_state);
    let app = router
        .nest_service("/static", ServeDir::new("static"))
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = shared_settings
        .server_address
        .parse()
        .with_context(|| format!("Invalid server address format: {}", shared_settings.server_address))?;

    let listener = match TcpListener::bind(&addr).await {
        Ok(l) => {
            tracing::info!("Server listening on {}", addr);
            l
        }
        Err(e) => {
            tracing::error!("Failed to bind to address {}: {}", addr, e);
            return Err(e.into());
        }
    };

    axum::serve(listener, app.into_make_service()).await?;

    Ok(())
}
