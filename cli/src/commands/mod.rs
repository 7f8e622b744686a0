mod browse;
mod edit;
mod health;
mod helpers;
mod image;

use anyhow::Result;
use std::path::Path;

use crate::postgrest::PostgrestClient;
use cookbook_core::cache::LocalCache;
use cookbook_core::service::CatalogService;

pub(crate) use browse::{ListFilters, RecipeList, cmd_filters, cmd_list, cmd_show};
pub(crate) use edit::{cmd_add, cmd_delete, cmd_update};
pub(crate) use health::{cmd_clear_cache, cmd_health};
pub(crate) use image::{cmd_image_delete, cmd_image_upload};

pub(crate) type Catalog = CatalogService<PostgrestClient>;

/// Open the cache and hydrate the catalog; every recipe command starts here.
pub(crate) async fn open_catalog(remote: PostgrestClient, cache_path: &Path) -> Result<Catalog> {
    let cache = LocalCache::open(cache_path)?;
    let mut catalog = CatalogService::new(remote, cache);
    catalog.hydrate().await?;
    Ok(catalog)
}
