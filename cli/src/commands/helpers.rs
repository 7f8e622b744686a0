use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::path::Path;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use cookbook_core::models::{NewRecipe, Recipe, TagCategory};

/// Read a recipe draft from a JSON file (camelCase fields, no `id`).
pub(crate) fn read_draft(path: &Path) -> Result<NewRecipe> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse recipe JSON in {}", path.display()))
}

/// Guess an image MIME type from the file extension.
pub(crate) fn image_content_type(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    Ok(match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "webp" => "image/webp",
        "gif" => "image/gif",
        _ => bail!(
            "Unsupported image type '{}'. Supported: png, jpg, jpeg, webp, gif",
            path.display()
        ),
    })
}

pub(crate) fn format_minutes(minutes: u32) -> String {
    match (minutes / 60, minutes % 60) {
        (0, m) => format!("{m} min"),
        (h, 0) => format!("{h} h"),
        (h, m) => format!("{h} h {m} min"),
    }
}

pub(crate) fn print_recipe_table(recipes: &[&Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Name")]
        name: String,
        #[tabled(rename = "Rating")]
        rating: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Cuisine")]
        cuisine: String,
        #[tabled(rename = "Method")]
        method: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .enumerate()
        .map(|(i, r)| RecipeRow {
            idx: i + 1,
            id: truncate(&r.id, 28),
            name: truncate(&r.name, 32),
            rating: {
                let avg = r.rating.average;
                format!("{avg:.1}")
            },
            time: format_minutes(r.cook_time.total_minutes),
            cuisine: r.tags.get(TagCategory::Cuisine).join(", "),
            method: r.tags.get(TagCategory::Method).join(", "),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..5)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

/// Report a missing recipe and exit with status 2.
pub(crate) fn exit_not_found(id: &str, json: bool) -> ! {
    let message = format!("Recipe '{id}' not found");
    if json {
        println!("{}", json_error(&message));
    } else {
        eprintln!("{message}");
    }
    std::process::exit(2);
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
