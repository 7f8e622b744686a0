//! Remote recipe table: wire shape, row mapping, and the store contract.
//!
//! The remote keeps one flat row per recipe with snake_case scalar and array
//! columns and JSON-valued `ingredients`, `procedure` and `media` columns.
//! Implementations of [`RemoteStore`] live with the transport (the CLI uses
//! reqwest); this module stays free of I/O.

use std::fmt;
use std::future::Future;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use crate::models::{
    CookTime, Ingredient, IngredientType, Media, ProcedureStep, Rating, Recipe, Tags,
};

pub const RECIPES_TABLE: &str = "recipes";
pub const IMAGE_BUCKET: &str = "recipe-images";

/// Endpoint and credential for the remote backend. Only constructible when
/// both are present and the endpoint is HTTPS.
#[derive(Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    base_url: String,
    api_key: String,
}

impl RemoteConfig {
    #[must_use]
    pub fn new(url: Option<&str>, api_key: Option<&str>) -> Option<Self> {
        let url = url.map(str::trim).filter(|u| !u.is_empty())?;
        let api_key = api_key.map(str::trim).filter(|k| !k.is_empty())?;
        let host = url.strip_prefix("https://")?;
        let host = host.split('/').next().unwrap_or_default();
        if host.is_empty() || host.contains(char::is_whitespace) {
            return None;
        }
        Some(Self {
            base_url: url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub fn api_key(&self) -> &str {
        &self.api_key
    }
}

// The credential must never end up in logs.
impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish()
    }
}

fn null_as_default<'de, T, D>(deserializer: D) -> Result<T, D::Error>
where
    T: Deserialize<'de> + Default,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Option::unwrap_or_default)
}

/// One row of the remote `recipes` table. Columns not listed here (for
/// example a server-side `created_at`) are dropped on decode.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipeRow {
    pub id: String,
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating_average: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub rating_count: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub prep_minutes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cook_minutes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub total_minutes: u32,
    #[serde(default, deserialize_with = "null_as_default")]
    pub protein_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub vegetables_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cuisine_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub meal_type_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub method_tags: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub ingredients: Vec<Ingredient>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub procedure: Vec<ProcedureStep>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub media: Media,
}

impl From<&Recipe> for RecipeRow {
    fn from(recipe: &Recipe) -> Self {
        Self {
            id: recipe.id.clone(),
            name: recipe.name.clone(),
            description: recipe.description.clone(),
            rating_average: recipe.rating.average,
            rating_count: recipe.rating.count,
            prep_minutes: recipe.cook_time.prep_minutes,
            cook_minutes: recipe.cook_time.cook_minutes,
            total_minutes: recipe.cook_time.total_minutes,
            protein_tags: recipe.tags.protein.clone(),
            vegetables_tags: recipe.tags.vegetables.clone(),
            cuisine_tags: recipe.tags.cuisine.clone(),
            meal_type_tags: recipe.tags.meal_type.clone(),
            method_tags: recipe.tags.method.clone(),
            ingredients: recipe.ingredients.clone(),
            procedure: recipe.procedure.clone(),
            media: recipe.media.clone(),
        }
    }
}

impl From<RecipeRow> for Recipe {
    fn from(row: RecipeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            rating: Rating {
                average: row.rating_average,
                count: row.rating_count,
            },
            cook_time: CookTime {
                prep_minutes: row.prep_minutes,
                cook_minutes: row.cook_minutes,
                total_minutes: row.total_minutes,
            },
            ingredients: row.ingredients,
            procedure: row.procedure,
            tags: Tags {
                protein: row.protein_tags,
                vegetables: row.vegetables_tags,
                cuisine: row.cuisine_tags,
                meal_type: row.meal_type_tags,
                method: row.method_tags,
            },
            media: row.media,
        }
    }
}

#[must_use]
pub fn to_row(recipe: &Recipe) -> RecipeRow {
    RecipeRow::from(recipe)
}

#[must_use]
pub fn from_row(row: RecipeRow) -> Recipe {
    Recipe::from(row)
}

/// Error body returned by the backend on a rejected request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct BackendErrorBody {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("remote store is not configured")]
    Disabled,
    #[error("remote request failed: {0}")]
    Transport(String),
    #[error(
        "remote rejected request (status {status}, code {}): {} [details: {}; hint: {}]",
        .body.code.as_deref().unwrap_or("-"),
        .body.message.as_deref().unwrap_or("no message"),
        .body.details.as_deref().unwrap_or("-"),
        .body.hint.as_deref().unwrap_or("-")
    )]
    Backend { status: u16, body: BackendErrorBody },
    #[error("could not decode remote response: {0}")]
    Decode(String),
    #[error("no remote object matches '{0}'")]
    NotFound(String),
}

/// Outcome of the operator diagnostic against the remote table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub configured: bool,
    /// Whether the backend answered at all. A configured but unreachable
    /// store says nothing about the table.
    #[serde(skip)]
    pub reachable: bool,
    pub table_exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipes_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl HealthReport {
    #[must_use]
    pub fn unconfigured() -> Self {
        Self {
            error: Some("Remote store not configured".to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        self.configured && self.table_exists
    }
}

/// Outcome of writing a throwaway row to check insert permissions.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WriteTestReport {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    /// Whether the throwaway row was removed again.
    pub cleaned_up: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl WriteTestReport {
    /// Failed report carrying the backend's code, details and hint when it sent them.
    #[must_use]
    pub fn failed(err: &RemoteError) -> Self {
        match err {
            RemoteError::Backend { body, .. } => Self {
                error: Some(body.message.clone().unwrap_or_else(|| err.to_string())),
                code: body.code.clone(),
                details: body.details.clone(),
                hint: body.hint.clone(),
                ..Self::default()
            },
            other => Self {
                error: Some(other.to_string()),
                ..Self::default()
            },
        }
    }
}

/// Fixed recipe inserted by the write test, keyed `test_<millis>`.
#[must_use]
pub fn write_test_recipe(millis: i64) -> Recipe {
    Recipe {
        id: format!("test_{millis}"),
        name: "Test Recipe".to_string(),
        description: "Created by the remote write test".to_string(),
        rating: Rating {
            average: 4.5,
            count: 1,
        },
        cook_time: CookTime {
            prep_minutes: 5,
            cook_minutes: 10,
            total_minutes: 15,
        },
        ingredients: vec![Ingredient {
            name: "test ingredient".to_string(),
            kind: IngredientType::Other,
            amount: None,
        }],
        procedure: vec![ProcedureStep {
            step: 1,
            instruction: "test step".to_string(),
        }],
        tags: Tags::default(),
        media: Media::default(),
    }
}

/// Create/read/update/delete against the remote recipe table plus the image
/// bucket. Every call on a disabled store returns [`RemoteError::Disabled`]
/// without touching the network.
pub trait RemoteStore: Send + Sync {
    fn is_enabled(&self) -> bool;

    fn fetch_all(&self) -> impl Future<Output = Result<Vec<Recipe>, RemoteError>> + Send;

    fn fetch_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<Recipe>, RemoteError>> + Send;

    /// The id is assigned by the caller; the store never generates one.
    fn insert(&self, recipe: &Recipe) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn update(
        &self,
        id: &str,
        recipe: &Recipe,
    ) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn delete(&self, id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;

    /// Store image bytes under `<recipe_id>_<unix-millis>` and return the public URL.
    fn upload_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        recipe_id: &str,
    ) -> impl Future<Output = Result<String, RemoteError>> + Send;

    /// Remove the first stored image whose name matches `recipe_id`. When
    /// several images share the prefix only the first match is removed.
    fn delete_image(&self, recipe_id: &str) -> impl Future<Output = Result<(), RemoteError>> + Send;

    fn health(&self) -> impl Future<Output = HealthReport> + Send;
}

/// Name an uploaded image so it can later be found by a search on the recipe id.
#[must_use]
pub fn image_object_name(recipe_id: &str, millis: i64) -> String {
    format!("{recipe_id}_{millis}")
}
