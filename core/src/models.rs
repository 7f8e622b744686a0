use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rating: Rating,
    pub cook_time: CookTime,
    pub ingredients: Vec<Ingredient>,
    pub procedure: Vec<ProcedureStep>,
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Media::is_empty")]
    pub media: Media,
}

impl Recipe {
    #[must_use]
    pub fn from_draft(id: String, draft: NewRecipe) -> Self {
        Self {
            id,
            name: draft.name,
            description: draft.description,
            rating: draft.rating,
            cook_time: draft.cook_time,
            ingredients: draft.ingredients,
            procedure: draft.procedure,
            tags: draft.tags,
            media: draft.media,
        }
    }

    /// Strip the id, producing the editable form of this recipe.
    #[must_use]
    pub fn into_draft(self) -> NewRecipe {
        NewRecipe {
            name: self.name,
            description: self.description,
            rating: self.rating,
            cook_time: self.cook_time,
            ingredients: self.ingredients,
            procedure: self.procedure,
            tags: self.tags,
            media: self.media,
        }
    }

    /// A recipe without images renders the placeholder; that is not an error.
    #[must_use]
    pub fn has_images(&self) -> bool {
        !self.media.images.is_empty()
    }
}

/// A recipe before the persistence layer has assigned it an id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRecipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub rating: Rating,
    #[serde(default)]
    pub cook_time: CookTime,
    #[serde(default)]
    pub ingredients: Vec<Ingredient>,
    #[serde(default)]
    pub procedure: Vec<ProcedureStep>,
    #[serde(default)]
    pub tags: Tags,
    #[serde(default, skip_serializing_if = "Media::is_empty")]
    pub media: Media,
}

impl NewRecipe {
    /// Apply the per-field normalization the edit form performs.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.ingredients = self
            .ingredients
            .into_iter()
            .map(normalize_ingredient)
            .collect();
        // Steps without a number (0) are numbered after the highest seen so far
        for step in std::mem::take(&mut self.procedure) {
            if step.step == 0 {
                self.push_step(&step.instruction);
            } else {
                self.procedure.push(ProcedureStep {
                    step: step.step,
                    instruction: normalize_instruction(&step.instruction),
                });
            }
        }
        self.tags = self.tags.normalized();
        self
    }

    /// Append a procedure step numbered after the current maximum.
    pub fn push_step(&mut self, instruction: &str) -> u32 {
        let step = next_step_number(&self.procedure);
        self.procedure.push(ProcedureStep {
            step,
            instruction: normalize_instruction(instruction),
        });
        step
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub average: f64,
    pub count: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CookTime {
    pub prep_minutes: u32,
    pub cook_minutes: u32,
    pub total_minutes: u32,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngredientType {
    Meat,
    Vegetable,
    Seafood,
    #[default]
    Other,
}

impl IngredientType {
    /// Ingredient types that count as a protein source.
    #[must_use]
    pub fn is_protein(self) -> bool {
        matches!(self, Self::Meat | Self::Seafood)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ingredient {
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: IngredientType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcedureStep {
    #[serde(default)]
    pub step: u32,
    pub instruction: String,
}

/// The five fixed facets a recipe is tagged and filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TagCategory {
    Protein,
    Vegetables,
    Cuisine,
    MealType,
    Method,
}

impl TagCategory {
    pub const ALL: [TagCategory; 5] = [
        TagCategory::Protein,
        TagCategory::Vegetables,
        TagCategory::Cuisine,
        TagCategory::MealType,
        TagCategory::Method,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Protein => "protein",
            Self::Vegetables => "vegetables",
            Self::Cuisine => "cuisine",
            Self::MealType => "mealType",
            Self::Method => "method",
        }
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Protein => "Protein",
            Self::Vegetables => "Vegetables",
            Self::Cuisine => "Cuisine",
            Self::MealType => "Meal Type",
            Self::Method => "Cooking Method",
        }
    }

    /// Ingredient types whose names also count as values of this category.
    #[must_use]
    pub fn matches_ingredient(self, kind: IngredientType) -> bool {
        match self {
            Self::Protein => kind.is_protein(),
            Self::Vegetables => kind == IngredientType::Vegetable,
            Self::Cuisine | Self::MealType | Self::Method => false,
        }
    }
}

impl fmt::Display for TagCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tags {
    #[serde(default)]
    pub protein: Vec<String>,
    #[serde(default)]
    pub vegetables: Vec<String>,
    #[serde(default)]
    pub cuisine: Vec<String>,
    #[serde(default)]
    pub meal_type: Vec<String>,
    #[serde(default)]
    pub method: Vec<String>,
}

impl Tags {
    #[must_use]
    pub fn get(&self, category: TagCategory) -> &[String] {
        match category {
            TagCategory::Protein => &self.protein,
            TagCategory::Vegetables => &self.vegetables,
            TagCategory::Cuisine => &self.cuisine,
            TagCategory::MealType => &self.meal_type,
            TagCategory::Method => &self.method,
        }
    }

    pub fn get_mut(&mut self, category: TagCategory) -> &mut Vec<String> {
        match category {
            TagCategory::Protein => &mut self.protein,
            TagCategory::Vegetables => &mut self.vegetables,
            TagCategory::Cuisine => &mut self.cuisine,
            TagCategory::MealType => &mut self.meal_type,
            TagCategory::Method => &mut self.method,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        TagCategory::ALL.iter().all(|c| self.get(*c).is_empty())
    }

    #[must_use]
    pub fn normalized(mut self) -> Self {
        for category in TagCategory::ALL {
            let values = std::mem::take(self.get_mut(category));
            *self.get_mut(category) = normalize_tags(values);
        }
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Media {
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub video: Option<Video>,
}

impl Media {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.images.is_empty() && self.video.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Video {
    pub url: String,
    pub platform: VideoPlatform,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoPlatform {
    Youtube,
    Vimeo,
    Local,
}

// --- Validation ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Recipe name is required")]
    MissingName,
    #[error("Recipe description is required")]
    MissingDescription,
    #[error("At least one ingredient is required")]
    NoIngredients,
    #[error("At least one procedure step is required")]
    NoProcedure,
}

impl ValidationError {
    /// The draft field the error refers to.
    #[must_use]
    pub fn field(self) -> &'static str {
        match self {
            Self::MissingName => "name",
            Self::MissingDescription => "description",
            Self::NoIngredients => "ingredients",
            Self::NoProcedure => "procedure",
        }
    }
}

/// Check a draft before it is handed to the persistence layer. Reports the
/// first failing field in form order.
pub fn validate(draft: &NewRecipe) -> Result<(), ValidationError> {
    if draft.name.trim().is_empty() {
        return Err(ValidationError::MissingName);
    }
    if draft.description.trim().is_empty() {
        return Err(ValidationError::MissingDescription);
    }
    if draft.ingredients.is_empty() {
        return Err(ValidationError::NoIngredients);
    }
    if draft.procedure.is_empty() {
        return Err(ValidationError::NoProcedure);
    }
    Ok(())
}

// --- Normalization ---

#[must_use]
pub fn normalize_ingredient(raw: Ingredient) -> Ingredient {
    Ingredient {
        name: raw.name.trim().to_lowercase(),
        kind: raw.kind,
        amount: raw.amount.map(|a| a.trim().to_string()),
    }
}

#[must_use]
pub fn normalize_instruction(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Trim and lowercase tag values, dropping empties and repeats while keeping
/// first-seen order.
#[must_use]
pub fn normalize_tags<I, S>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for value in values {
        let tag = value.as_ref().trim().to_lowercase();
        if !tag.is_empty() && !out.contains(&tag) {
            out.push(tag);
        }
    }
    out
}

/// Parse a comma separated tag field such as `"Chicken, pork ,,"`.
#[must_use]
pub fn parse_tag_list(input: &str) -> Vec<String> {
    normalize_tags(input.split(','))
}

/// Steps are numbered on append and never renumbered, so gaps are expected.
#[must_use]
pub fn next_step_number(procedure: &[ProcedureStep]) -> u32 {
    procedure
        .iter()
        .map(|p| p.step)
        .max()
        .unwrap_or(0)
        .saturating_add(1)
}

/// Timestamp plus random suffix, e.g. `recipe_1718000000000_3f9a1c0b2`.
#[must_use]
pub fn generate_recipe_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis();
    let suffix = Uuid::new_v4().simple().to_string();
    format!("recipe_{millis}_{}", &suffix[..9])
}
