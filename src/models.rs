// Wire types of the dealership REST API

use serde::{Deserialize, Serialize};

use crate::error::ApiError;

/// `{success, data}` wrapper used by every backend endpoint.
#[derive(Debug, Deserialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(default = "Option::default")]
    pub data: Option<T>,
    #[serde(default)]
    pub message: Option<String>,
}

impl<T> Envelope<T> {
    pub fn into_data(self, path: &str) -> Result<T, ApiError> {
        if !self.success {
            return Err(ApiError::Unsuccessful {
                path: path.to_string(),
                message: self.message.unwrap_or_else(|| "no message".to_string()),
            });
        }
        self.data.ok_or_else(|| ApiError::Unsuccessful {
            path: path.to_string(),
            message: "response carried no data".to_string(),
        })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub total: u64,
    #[serde(default)]
    pub page: u32,
    #[serde(default)]
    pub limit: u32,
    #[serde(default)]
    pub total_pages: u32,
}

/// One results page. Replaced wholesale on every successful fetch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryResult {
    #[serde(default)]
    pub vehicles: Vec<VehicleSummary>,
    #[serde(default)]
    pub pagination: Pagination,
}

impl QueryResult {
    pub fn empty(page: u32, limit: u32) -> Self {
        Self {
            vehicles: Vec::new(),
            pagination: Pagination {
                total: 0,
                page,
                limit,
                total_pages: 0,
            },
        }
    }
}

// Listing card data
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "RawVehicle")]
pub struct VehicleSummary {
    pub id: String,
    pub title: Option<String>,
    pub year: Option<u32>,
    pub make: Option<String>,
    pub model: Option<String>,
    pub price: Option<u64>,
    pub mileage: Option<u64>,
    pub image: Option<String>,
    pub fuel_type: Option<String>,
    pub transmission: Option<String>,
    pub exterior_color: Option<String>,
    pub condition: Option<String>,
    pub status: Option<String>,
}

impl VehicleSummary {
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.trim().is_empty()) {
            return title.to_string();
        }
        let parts: Vec<String> = [
            self.year.map(|y| y.to_string()),
            self.make.clone(),
            self.model.clone(),
        ]
        .into_iter()
        .flatten()
        .collect();
        if parts.is_empty() {
            "Vehicle".to_string()
        } else {
            parts.join(" ")
        }
    }
}

// The backend populates references either as plain strings or as `{name}` objects.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NameRef {
    Plain(String),
    Named { name: String },
}

impl NameRef {
    fn into_name(self) -> String {
        match self {
            NameRef::Plain(name) | NameRef::Named { name } => name,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ImageRef {
    Url(String),
    Object { url: String },
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawVehicle {
    id: Option<String>,
    #[serde(rename = "_id")]
    object_id: Option<String>,
    title: Option<String>,
    year: Option<u32>,
    make: Option<NameRef>,
    model: Option<NameRef>,
    price: Option<f64>,
    mileage: Option<f64>,
    main_image: Option<String>,
    #[serde(default)]
    images: Vec<ImageRef>,
    fuel_type: Option<NameRef>,
    transmission: Option<NameRef>,
    exterior_color: Option<String>,
    condition: Option<String>,
    status: Option<String>,
}

impl TryFrom<RawVehicle> for VehicleSummary {
    type Error = String;

    fn try_from(raw: RawVehicle) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.object_id)
            .ok_or_else(|| "vehicle without id".to_string())?;
        let image = raw.main_image.or_else(|| {
            raw.images.into_iter().next().map(|image| match image {
                ImageRef::Url(url) | ImageRef::Object { url } => url,
            })
        });

        Ok(Self {
            id,
            title: raw.title,
            year: raw.year,
            make: raw.make.map(NameRef::into_name),
            model: raw.model.map(NameRef::into_name),
            price: raw.price.filter(|p| p.is_finite() && *p >= 0.0).map(|p| p.round() as u64),
            mileage: raw.mileage.filter(|m| m.is_finite() && *m >= 0.0).map(|m| m.round() as u64),
            image,
            fuel_type: raw.fuel_type.map(NameRef::into_name),
            transmission: raw.transmission.map(NameRef::into_name),
            exterior_color: raw.exterior_color,
            condition: raw.condition,
            status: raw.status,
        })
    }
}
