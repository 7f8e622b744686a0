use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::models::{Recipe, TagCategory, Tags};

/// Per-category selections. Values within a category are OR'd; categories are AND'd.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagFilters {
    #[serde(default)]
    pub protein: BTreeSet<String>,
    #[serde(default)]
    pub vegetables: BTreeSet<String>,
    #[serde(default)]
    pub cuisine: BTreeSet<String>,
    #[serde(default)]
    pub meal_type: BTreeSet<String>,
    #[serde(default)]
    pub method: BTreeSet<String>,
}

impl TagFilters {
    #[must_use]
    pub fn get(&self, category: TagCategory) -> &BTreeSet<String> {
        match category {
            TagCategory::Protein => &self.protein,
            TagCategory::Vegetables => &self.vegetables,
            TagCategory::Cuisine => &self.cuisine,
            TagCategory::MealType => &self.meal_type,
            TagCategory::Method => &self.method,
        }
    }

    fn get_mut(&mut self, category: TagCategory) -> &mut BTreeSet<String> {
        match category {
            TagCategory::Protein => &mut self.protein,
            TagCategory::Vegetables => &mut self.vegetables,
            TagCategory::Cuisine => &mut self.cuisine,
            TagCategory::MealType => &mut self.meal_type,
            TagCategory::Method => &mut self.method,
        }
    }

    pub fn select(&mut self, category: TagCategory, value: &str) {
        let value = value.trim().to_lowercase();
        if !value.is_empty() {
            self.get_mut(category).insert(value);
        }
    }

    /// Checkbox semantics: select the value if absent, deselect it otherwise.
    /// Returns whether the value is selected afterwards.
    pub fn toggle(&mut self, category: TagCategory, value: &str) -> bool {
        let value = value.trim().to_lowercase();
        let set = self.get_mut(category);
        if set.remove(&value) {
            false
        } else {
            set.insert(value);
            true
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        TagCategory::ALL.iter().all(|c| self.get(*c).is_empty())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeQuery {
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub tags: TagFilters,
}

impl RecipeQuery {
    #[must_use]
    pub fn text(text: &str) -> Self {
        Self {
            text: text.to_string(),
            tags: TagFilters::default(),
        }
    }

    /// Select a bare tag under the category it belongs to in `recipes`.
    /// Tags no category knows are ignored and yield `None`.
    pub fn select_tag(&mut self, tag: &str, recipes: &[Recipe]) -> Option<TagCategory> {
        let category = find_tag_category(tag, recipes)?;
        self.tags.select(category, tag);
        Some(category)
    }
}

/// Case-insensitive substring match against name, ingredient names and description.
#[must_use]
pub fn matches_text(recipe: &Recipe, text: &str) -> bool {
    if text.is_empty() {
        return true;
    }
    let needle = text.to_lowercase();
    recipe.name.to_lowercase().contains(&needle)
        || recipe
            .ingredients
            .iter()
            .any(|ing| ing.name.to_lowercase().contains(&needle))
        || recipe.description.to_lowercase().contains(&needle)
}

/// An empty selection places no restriction. Protein and vegetables also match
/// on the names of ingredients of the corresponding type, so an untagged
/// ingredient can still satisfy the filter.
#[must_use]
pub fn matches_category(
    recipe: &Recipe,
    category: TagCategory,
    selection: &BTreeSet<String>,
) -> bool {
    if selection.is_empty() {
        return true;
    }
    let tagged = recipe
        .tags
        .get(category)
        .iter()
        .any(|t| selection.contains(&t.to_lowercase()));
    tagged
        || recipe.ingredients.iter().any(|ing| {
            category.matches_ingredient(ing.kind) && selection.contains(&ing.name.to_lowercase())
        })
}

#[must_use]
pub fn matches(recipe: &Recipe, query: &RecipeQuery) -> bool {
    matches_text(recipe, &query.text)
        && TagCategory::ALL
            .iter()
            .all(|c| matches_category(recipe, *c, query.tags.get(*c)))
}

/// The visible subset, in collection order.
#[must_use]
pub fn filter_recipes<'a>(recipes: &'a [Recipe], query: &RecipeQuery) -> Vec<&'a Recipe> {
    recipes.iter().filter(|r| matches(r, query)).collect()
}

/// Sorted, de-duplicated values seen in one category across the collection.
#[must_use]
pub fn distinct_values(recipes: &[Recipe], category: TagCategory) -> Vec<String> {
    let mut values: BTreeSet<String> = BTreeSet::new();
    for recipe in recipes {
        for tag in recipe.tags.get(category) {
            values.insert(tag.trim().to_lowercase());
        }
        for ing in &recipe.ingredients {
            if category.matches_ingredient(ing.kind) {
                values.insert(ing.name.trim().to_lowercase());
            }
        }
    }
    values.remove("");
    values.into_iter().collect()
}

/// Option lists for every filter category.
#[must_use]
pub fn filter_options(recipes: &[Recipe]) -> Tags {
    let mut options = Tags::default();
    for category in TagCategory::ALL {
        *options.get_mut(category) = distinct_values(recipes, category);
    }
    options
}

const LOOKUP_ORDER: [TagCategory; 5] = [
    TagCategory::Protein,
    TagCategory::Vegetables,
    TagCategory::Cuisine,
    TagCategory::Method,
    TagCategory::MealType,
];

/// Resolve a bare tag (e.g. from a clicked tag link) to the first category that
/// contains it.
#[must_use]
pub fn find_tag_category(tag: &str, recipes: &[Recipe]) -> Option<TagCategory> {
    let tag = tag.trim().to_lowercase();
    LOOKUP_ORDER
        .into_iter()
        .find(|c| distinct_values(recipes, *c).contains(&tag))
}

#[must_use]
pub fn result_summary(count: usize) -> String {
    match count {
        0 => "No recipes found. Try adjusting your search or filters.".to_string(),
        1 => "Showing 1 recipe".to_string(),
        n => format!("Showing {n} recipes"),
    }
}
