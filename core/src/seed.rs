use anyhow::{Context, Result};

use crate::models::Recipe;

const SEED_JSON: &str = include_str!("../data/seed_recipes.json");

/// The bundled example recipes used when neither the remote store nor the
/// local cache has anything to offer.
pub fn seed_recipes() -> Result<Vec<Recipe>> {
    serde_json::from_str(SEED_JSON).context("Bundled seed recipes are malformed")
}
