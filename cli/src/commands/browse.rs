use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::process;
use tabled::{Table, Tabled, settings::Style};
use tracing::warn;

use cookbook_core::filter::{RecipeQuery, filter_options, filter_recipes, result_summary};
use cookbook_core::models::{Recipe, TagCategory, parse_tag_list};

use super::Catalog;
use super::helpers::{exit_not_found, format_minutes, print_recipe_table};

/// Search text plus comma separated per-category selections, shared by the
/// `list` command and `GET /api/recipes`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListFilters {
    #[serde(rename = "q")]
    pub text: Option<String>,
    pub protein: Option<String>,
    pub vegetables: Option<String>,
    pub cuisine: Option<String>,
    pub meal_type: Option<String>,
    pub method: Option<String>,
    /// Bare tags resolved to whichever category contains them.
    pub tag: Option<String>,
}

impl ListFilters {
    pub(crate) fn to_query(&self, recipes: &[Recipe]) -> RecipeQuery {
        let mut query = RecipeQuery::text(self.text.as_deref().unwrap_or_default());
        for (category, raw) in [
            (TagCategory::Protein, &self.protein),
            (TagCategory::Vegetables, &self.vegetables),
            (TagCategory::Cuisine, &self.cuisine),
            (TagCategory::MealType, &self.meal_type),
            (TagCategory::Method, &self.method),
        ] {
            for value in raw.as_deref().map(parse_tag_list).unwrap_or_default() {
                query.tags.select(category, &value);
            }
        }
        for tag in self.tag.as_deref().map(parse_tag_list).unwrap_or_default() {
            if query.select_tag(&tag, recipes).is_none() {
                warn!(tag = %tag, "ignoring tag not used by any recipe");
            }
        }
        query
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct RecipeList<'a> {
    pub count: usize,
    pub message: String,
    pub recipes: Vec<&'a Recipe>,
}

impl<'a> RecipeList<'a> {
    pub(crate) fn search(recipes: &'a [Recipe], filters: &ListFilters) -> Self {
        let query = filters.to_query(recipes);
        let recipes = filter_recipes(recipes, &query);
        Self {
            count: recipes.len(),
            message: result_summary(recipes.len()),
            recipes,
        }
    }
}

/// The result summary goes to stdout with the table, or to stderr when
/// nothing matched.
fn write_summary(
    list: &RecipeList<'_>,
    out: &mut impl Write,
    err: &mut impl Write,
) -> io::Result<()> {
    if list.recipes.is_empty() {
        writeln!(err, "{}", list.message)
    } else {
        writeln!(out, "{}", list.message)
    }
}

pub(crate) fn cmd_list(catalog: &Catalog, filters: &ListFilters, json: bool) -> Result<()> {
    let list = RecipeList::search(catalog.recipes()?, filters);

    if json {
        println!("{}", serde_json::to_string_pretty(&list)?);
    } else {
        if !list.recipes.is_empty() {
            print_recipe_table(&list.recipes);
        }
        write_summary(&list, &mut io::stdout(), &mut io::stderr())?;
    }

    if list.count == 0 {
        process::exit(2);
    }
    Ok(())
}

pub(crate) fn cmd_show(catalog: &Catalog, id: &str, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Type")]
        kind: String,
        #[tabled(rename = "Amount")]
        amount: String,
    }

    catalog.recipes()?;
    let Some(recipe) = catalog.get_recipe_by_id(id) else {
        exit_not_found(id, json);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(recipe)?);
        return Ok(());
    }

    let name = &recipe.name;
    let avg = recipe.rating.average;
    let ratings = recipe.rating.count;
    println!("{name}");
    println!("{}", recipe.description);
    println!();
    println!("Rating: {avg:.1} ({ratings} ratings)");
    println!(
        "Prep: {} | Cook: {} | Total: {}",
        format_minutes(recipe.cook_time.prep_minutes),
        format_minutes(recipe.cook_time.cook_minutes),
        format_minutes(recipe.cook_time.total_minutes)
    );
    println!();

    let rows: Vec<IngredientRow> = recipe
        .ingredients
        .iter()
        .map(|i| IngredientRow {
            name: i.name.clone(),
            kind: format!("{:?}", i.kind).to_lowercase(),
            amount: i.amount.clone().unwrap_or_else(|| "-".to_string()),
        })
        .collect();
    println!("{}", Table::new(&rows).with(Style::rounded()));

    println!();
    println!("Procedure:");
    for step in &recipe.procedure {
        println!("  {}. {}", step.step, step.instruction);
    }

    let tagged: Vec<TagCategory> = TagCategory::ALL
        .into_iter()
        .filter(|c| !recipe.tags.get(*c).is_empty())
        .collect();
    if !tagged.is_empty() {
        println!();
        for category in tagged {
            println!("{}: {}", category.label(), recipe.tags.get(category).join(", "));
        }
    }

    if recipe.has_images() {
        println!();
        for url in &recipe.media.images {
            println!("Image: {url}");
        }
    }
    if let Some(video) = &recipe.media.video {
        println!("Video: {}", video.url);
    }

    Ok(())
}

pub(crate) fn cmd_filters(catalog: &Catalog, json: bool) -> Result<()> {
    let options = filter_options(catalog.recipes()?);

    if json {
        println!("{}", serde_json::to_string_pretty(&options)?);
        return Ok(());
    }

    for category in TagCategory::ALL {
        let values = options.get(category);
        let listed = if values.is_empty() {
            "-".to_string()
        } else {
            values.join(", ")
        };
        println!("{:<15} {listed}", format!("{}:", category.label()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookbook_core::seed::seed_recipes;

    fn names(list: &RecipeList<'_>) -> Vec<String> {
        list.recipes.iter().map(|r| r.name.clone()).collect()
    }

    #[test]
    fn test_empty_filters_list_everything() {
        let recipes = seed_recipes().unwrap();
        let list = RecipeList::search(&recipes, &ListFilters::default());
        assert_eq!(list.count, 6);
        assert_eq!(list.message, "Showing 6 recipes");
    }

    #[test]
    fn test_comma_separated_selection() {
        let recipes = seed_recipes().unwrap();
        let filters = ListFilters {
            protein: Some("Crab, salmon".to_string()),
            ..ListFilters::default()
        };
        let list = RecipeList::search(&recipes, &filters);
        assert_eq!(names(&list), vec!["Crab and Corn Soup", "Grilled Salmon"]);
    }

    #[test]
    fn test_text_and_category_combine() {
        let recipes = seed_recipes().unwrap();
        let filters = ListFilters {
            text: Some("soup".to_string()),
            method: Some("grilled".to_string()),
            ..ListFilters::default()
        };
        let list = RecipeList::search(&recipes, &filters);
        assert_eq!(list.count, 0);
        assert_eq!(
            list.message,
            "No recipes found. Try adjusting your search or filters."
        );
    }

    #[test]
    fn test_empty_result_summary_goes_to_stderr() {
        let recipes = seed_recipes().unwrap();
        let filters = ListFilters {
            text: Some("no such dish".to_string()),
            ..ListFilters::default()
        };
        let list = RecipeList::search(&recipes, &filters);
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_summary(&list, &mut out, &mut err).unwrap();
        assert!(out.is_empty());
        assert_eq!(
            String::from_utf8(err).unwrap(),
            "No recipes found. Try adjusting your search or filters.\n"
        );

        let list = RecipeList::search(&recipes, &ListFilters::default());
        let (mut out, mut err) = (Vec::new(), Vec::new());
        write_summary(&list, &mut out, &mut err).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "Showing 6 recipes\n");
        assert!(err.is_empty());
    }

    #[test]
    fn test_bare_tag_resolves_category() {
        let recipes = seed_recipes().unwrap();
        let filters = ListFilters {
            tag: Some("baked,nonexistent".to_string()),
            ..ListFilters::default()
        };
        let list = RecipeList::search(&recipes, &filters);
        assert_eq!(names(&list), vec!["Eggplant Parmesan"]);
    }

    #[test]
    fn test_filters_deserialize_from_query_names() {
        let filters: ListFilters =
            serde_json::from_str(r#"{"q": "adobo", "mealType": "dinner"}"#).unwrap();
        assert_eq!(filters.text.as_deref(), Some("adobo"));
        assert_eq!(filters.meal_type.as_deref(), Some("dinner"));
    }
}
