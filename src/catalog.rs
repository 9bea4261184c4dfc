// Read-only reference data used to populate filter controls and resolve labels.
//
// Option lists are fetched through a `CatalogSource` and reused for a fixed
// lifespan. A failed fetch is logged and yields an empty list; failures are never
// cached, so the next lookup tries again.

use std::hash::Hash;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use cached::{Cached, TimedCache};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// One selectable entry: a brand, model, body type, fuel type or transmission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOption")]
pub struct CatalogOption {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo: Option<String>,
}

impl CatalogOption {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            logo: None,
        }
    }
}

// Dropdown endpoints use `{_id, name}` or `{value, label}` depending on the resource.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawOption {
    id: Option<String>,
    #[serde(rename = "_id")]
    object_id: Option<String>,
    value: Option<String>,
    name: Option<String>,
    label: Option<String>,
    logo: Option<String>,
    logo_url: Option<String>,
}

impl TryFrom<RawOption> for CatalogOption {
    type Error = String;

    fn try_from(raw: RawOption) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.object_id)
            .or(raw.value)
            .ok_or_else(|| "catalog option without id".to_string())?;
        let name = raw.name.or(raw.label).unwrap_or_else(|| id.clone());
        Ok(Self {
            id,
            name,
            logo: raw.logo.or(raw.logo_url),
        })
    }
}

/// The independent (brand-agnostic) option lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum OptionKind {
    Brands,
    BodyTypes,
    FuelTypes,
    Transmissions,
}

impl OptionKind {
    pub fn path(&self) -> &'static str {
        match self {
            OptionKind::Brands => "/makes/dropdown",
            OptionKind::BodyTypes => "/vehicle-types",
            OptionKind::FuelTypes => "/fuel-types",
            OptionKind::Transmissions => "/transmissions",
        }
    }
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn options(&self, kind: OptionKind) -> Result<Vec<CatalogOption>, ApiError>;
    async fn models(&self, brand_id: &str) -> Result<Vec<CatalogOption>, ApiError>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionCatalog {
    pub brands: Vec<CatalogOption>,
    pub body_types: Vec<CatalogOption>,
    pub fuel_types: Vec<CatalogOption>,
    pub transmissions: Vec<CatalogOption>,
}

impl OptionCatalog {
    pub fn options(&self, kind: OptionKind) -> &[CatalogOption] {
        match kind {
            OptionKind::Brands => &self.brands,
            OptionKind::BodyTypes => &self.body_types,
            OptionKind::FuelTypes => &self.fuel_types,
            OptionKind::Transmissions => &self.transmissions,
        }
    }

    pub fn label(&self, kind: OptionKind, id: &str) -> Option<&str> {
        label_in(self.options(kind), id)
    }
}

pub fn label_in<'a>(options: &'a [CatalogOption], id: &str) -> Option<&'a str> {
    options.iter().find(|o| o.id == id).map(|o| o.name.as_str())
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum CatalogKey {
    List(OptionKind),
    Models(String),
}

/// Cached option lookups shared by every inventory session.
pub struct OptionProviders {
    source: Arc<dyn CatalogSource>,
    cache: Mutex<TimedCache<CatalogKey, Vec<CatalogOption>>>,
}

impl OptionProviders {
    pub fn new(source: Arc<dyn CatalogSource>, lifespan: Duration) -> Self {
        Self {
            source,
            cache: Mutex::new(TimedCache::with_lifespan(lifespan.as_secs().max(1))),
        }
    }

    pub async fn list(&self, kind: OptionKind) -> Vec<CatalogOption> {
        let key = CatalogKey::List(kind);
        if let Some(hit) = self.cached(&key) {
            return hit;
        }
        match self.source.options(kind).await {
            Ok(options) => self.store(key, options),
            Err(e) => {
                tracing::warn!(?kind, error = %e, "Failed to load option list");
                Vec::new()
            }
        }
    }

    pub async fn models_for(&self, brand_id: &str) -> Vec<CatalogOption> {
        let key = CatalogKey::Models(brand_id.to_string());
        if let Some(hit) = self.cached(&key) {
            return hit;
        }
        match self.source.models(brand_id).await {
            Ok(models) => self.store(key, models),
            Err(e) => {
                tracing::warn!(brand_id, error = %e, "Failed to load models for brand");
                Vec::new()
            }
        }
    }

    /// Loads the four brand-agnostic lists concurrently.
    pub async fn catalog(&self) -> OptionCatalog {
        let (brands, body_types, fuel_types, transmissions) = futures::join!(
            self.list(OptionKind::Brands),
            self.list(OptionKind::BodyTypes),
            self.list(OptionKind::FuelTypes),
            self.list(OptionKind::Transmissions),
        );
        OptionCatalog {
            brands,
            body_types,
            fuel_types,
            transmissions,
        }
    }

    fn cached(&self, key: &CatalogKey) -> Option<Vec<CatalogOption>> {
        self.cache.lock().cache_get(key).cloned()
    }

    fn store(&self, key: CatalogKey, options: Vec<CatalogOption>) -> Vec<CatalogOption> {
        tracing::debug!(?key, count = options.len(), "Caching option list");
        self.cache.lock().cache_set(key, options.clone());
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::FakeBackend;

    #[test]
    fn test_option_accepts_value_label_shape() {
        let option: CatalogOption =
            serde_json::from_str(r#"{"value": "t1", "label": "Toyota", "logoUrl": "/t.png"}"#).unwrap();
        assert_eq!(option.id, "t1");
        assert_eq!(option.name, "Toyota");
        assert_eq!(option.logo.as_deref(), Some("/t.png"));
    }

    #[test]
    fn test_option_accepts_mongo_shape_with_both_ids() {
        let option: CatalogOption =
            serde_json::from_str(r#"{"_id": "abc", "id": "abc", "name": "SUV"}"#).unwrap();
        assert_eq!(option.id, "abc");
        assert_eq!(option.name, "SUV");
    }

    #[tokio::test]
    async fn test_lists_are_cached() {
        let backend = Arc::new(FakeBackend::with_brands(vec![CatalogOption::new("h1", "Honda")]));
        let providers = OptionProviders::new(backend.clone(), Duration::from_secs(60));

        let first = providers.list(OptionKind::Brands).await;
        let second = providers.list(OptionKind::Brands).await;

        assert_eq!(first, second);
        assert_eq!(backend.option_calls(OptionKind::Brands), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let backend = Arc::new(FakeBackend::default());
        backend.fail_options(true);
        let providers = OptionProviders::new(backend.clone(), Duration::from_secs(60));

        assert!(providers.list(OptionKind::FuelTypes).await.is_empty());

        backend.fail_options(false);
        backend.set_options(OptionKind::FuelTypes, vec![CatalogOption::new("f1", "Diesel")]);
        let options = providers.list(OptionKind::FuelTypes).await;

        assert_eq!(options, vec![CatalogOption::new("f1", "Diesel")]);
        assert_eq!(backend.option_calls(OptionKind::FuelTypes), 2);
    }

    #[tokio::test]
    async fn test_catalog_labels_fall_back_to_none() {
        let backend = Arc::new(FakeBackend::with_brands(vec![CatalogOption::new("h1", "Honda")]));
        let providers = OptionProviders::new(backend, Duration::from_secs(60));

        let catalog = providers.catalog().await;

        assert_eq!(catalog.label(OptionKind::Brands, "h1"), Some("Honda"));
        assert_eq!(catalog.label(OptionKind::Brands, "gone"), None);
    }
}
