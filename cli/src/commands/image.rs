use anyhow::{Context, Result, bail};
use std::path::Path;

use cookbook_core::service::CatalogError;

use super::Catalog;
use super::helpers::{exit_not_found, image_content_type};
use crate::config::{REMOTE_KEY_VAR, REMOTE_URL_VAR};

pub(crate) async fn cmd_image_upload(
    catalog: &mut Catalog,
    id: &str,
    file: &Path,
    json: bool,
) -> Result<()> {
    let content_type = image_content_type(file)?;
    let bytes =
        std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;

    let url = match catalog.attach_image(id, bytes, content_type).await {
        Ok(Some(url)) => url,
        Ok(None) => bail!(
            "Image upload needs a remote store. Set {REMOTE_URL_VAR} and {REMOTE_KEY_VAR}."
        ),
        Err(CatalogError::NotFound(_)) => exit_not_found(id, json),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::json!({ "id": id, "url": url }));
    } else {
        println!("Uploaded image for {id}: {url}");
    }
    Ok(())
}

pub(crate) async fn cmd_image_delete(catalog: &mut Catalog, id: &str, json: bool) -> Result<()> {
    let removed = match catalog.detach_image(id).await {
        Ok(removed) => removed,
        Err(CatalogError::NotFound(_)) => exit_not_found(id, json),
        Err(e) => return Err(e.into()),
    };

    if json {
        println!("{}", serde_json::json!({ "id": id, "removed": removed }));
    } else if removed {
        println!("Removed image from {id}");
    } else {
        println!("Recipe {id} has no image");
    }
    Ok(())
}
