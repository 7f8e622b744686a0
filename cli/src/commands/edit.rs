use anyhow::Result;
use std::path::Path;

use super::Catalog;
use super::helpers::{exit_not_found, read_draft};

pub(crate) async fn cmd_add(catalog: &mut Catalog, file: &Path, json: bool) -> Result<()> {
    let draft = read_draft(file)?;
    let name = draft.name.trim().to_string();
    let id = catalog.create_recipe(draft).await?;

    if json {
        println!("{}", serde_json::json!({ "id": id }));
    } else {
        println!("Added recipe: {name} (id: {id})");
    }
    Ok(())
}

pub(crate) async fn cmd_update(
    catalog: &mut Catalog,
    id: &str,
    file: &Path,
    json: bool,
) -> Result<()> {
    let draft = read_draft(file)?;
    if !catalog.edit_recipe(id, draft).await? {
        exit_not_found(id, json);
    }

    if json {
        if let Some(recipe) = catalog.get_recipe_by_id(id) {
            println!("{}", serde_json::to_string_pretty(recipe)?);
        }
    } else {
        println!("Updated recipe {id}");
    }
    Ok(())
}

pub(crate) async fn cmd_delete(catalog: &mut Catalog, id: &str, json: bool) -> Result<()> {
    if !catalog.delete_recipe(id).await? {
        exit_not_found(id, json);
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted recipe {id}");
    }
    Ok(())
}
