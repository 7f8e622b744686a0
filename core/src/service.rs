use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::cache::LocalCache;
use crate::models::{NewRecipe, Recipe, ValidationError, generate_recipe_id, validate};
use crate::remote::{RemoteError, RemoteStore, WriteTestReport, write_test_recipe};
use crate::seed::seed_recipes;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    Uninitialized,
    Hydrating,
    Ready,
}

/// Where the collection came from during hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HydrationSource {
    Remote,
    Cache,
    Seed,
}

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("recipe catalog is not ready yet")]
    NotReady,
    #[error("recipe '{0}' not found")]
    NotFound(String),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("image upload failed: {0}")]
    ImageUpload(RemoteError),
    #[error(transparent)]
    Local(#[from] anyhow::Error),
}

/// Owns the in-memory recipe collection for a session.
///
/// Reads are remote-first with cache and seed fallback; writes go to the
/// remote when it is enabled and always to memory and the local cache. Remote
/// failures are logged and never fail a mutation.
pub struct CatalogService<S> {
    remote: S,
    cache: LocalCache,
    recipes: Vec<Recipe>,
    state: SyncState,
    source: Option<HydrationSource>,
}

impl<S: RemoteStore> CatalogService<S> {
    pub fn new(remote: S, cache: LocalCache) -> Self {
        Self {
            remote,
            cache,
            recipes: Vec::new(),
            state: SyncState::Uninitialized,
            source: None,
        }
    }

    pub fn state(&self) -> SyncState {
        self.state
    }

    pub fn hydration_source(&self) -> Option<HydrationSource> {
        self.source
    }

    pub fn remote(&self) -> &S {
        &self.remote
    }

    /// The collection, withheld until hydration has finished so consumers
    /// never see a partial (empty) state.
    pub fn recipes(&self) -> Result<&[Recipe], CatalogError> {
        match self.state {
            SyncState::Ready => Ok(&self.recipes),
            SyncState::Uninitialized | SyncState::Hydrating => Err(CatalogError::NotReady),
        }
    }

    fn ensure_ready(&self) -> Result<(), CatalogError> {
        if self.state == SyncState::Ready {
            Ok(())
        } else {
            Err(CatalogError::NotReady)
        }
    }

    /// Populate the collection once per session. Calling again after the
    /// catalog is ready is a no-op.
    pub async fn hydrate(&mut self) -> Result<HydrationSource, CatalogError> {
        if let (SyncState::Ready, Some(source)) = (self.state, self.source) {
            return Ok(source);
        }
        self.state = SyncState::Hydrating;

        match self.remote.fetch_all().await {
            Ok(recipes) if !recipes.is_empty() => {
                info!(count = recipes.len(), "hydrated recipes from remote store");
                self.recipes = recipes;
                self.mirror_to_cache();
                return Ok(self.finish_hydration(HydrationSource::Remote));
            }
            Ok(_) => debug!("remote store returned no recipes, falling back to cache"),
            Err(RemoteError::Disabled) => debug!("remote store disabled, using local cache"),
            Err(e) => warn!(error = %e, "failed to fetch recipes from remote, falling back to cache"),
        }

        if let Some(recipes) = self.cache.load() {
            info!(count = recipes.len(), "hydrated recipes from local cache");
            self.recipes = recipes;
            return Ok(self.finish_hydration(HydrationSource::Cache));
        }

        self.recipes = seed_recipes()?;
        info!(count = self.recipes.len(), "hydrated bundled seed recipes");
        self.mirror_to_cache();
        Ok(self.finish_hydration(HydrationSource::Seed))
    }

    fn finish_hydration(&mut self, source: HydrationSource) -> HydrationSource {
        self.state = SyncState::Ready;
        self.source = Some(source);
        source
    }

    fn mirror_to_cache(&self) {
        if let Err(e) = self.cache.save(&self.recipes) {
            warn!(error = %e, "failed to mirror recipes to local cache");
        }
    }

    /// In-memory lookup only; never consults the remote store or the cache.
    pub fn get_recipe_by_id(&self, id: &str) -> Option<&Recipe> {
        self.recipes.iter().find(|r| r.id == id)
    }

    fn unused_id(&self) -> String {
        loop {
            let id = generate_recipe_id();
            if self.get_recipe_by_id(&id).is_none() {
                return id;
            }
        }
    }

    /// Store an already validated draft under a fresh id. The id is returned
    /// whether or not the remote insert succeeded.
    pub async fn add_recipe(&mut self, draft: NewRecipe) -> Result<String, CatalogError> {
        self.ensure_ready()?;
        let id = self.unused_id();
        let recipe = Recipe::from_draft(id.clone(), draft);

        let outcome = self.remote.insert(&recipe).await;
        log_remote_outcome("insert", &id, outcome);

        self.recipes.push(recipe);
        self.cache.save(&self.recipes)?;
        Ok(id)
    }

    /// Replace an existing recipe. Returns `false` when `id` is not in the
    /// in-memory collection, even if the remote store knows it.
    pub async fn update_recipe(&mut self, id: &str, recipe: Recipe) -> Result<bool, CatalogError> {
        self.ensure_ready()?;
        let Some(index) = self.recipes.iter().position(|r| r.id == id) else {
            return Ok(false);
        };
        let recipe = Recipe {
            id: id.to_string(),
            ..recipe
        };

        let outcome = self.remote.update(id, &recipe).await;
        log_remote_outcome("update", id, outcome);

        self.recipes[index] = recipe;
        self.cache.save(&self.recipes)?;
        Ok(true)
    }

    pub async fn delete_recipe(&mut self, id: &str) -> Result<bool, CatalogError> {
        self.ensure_ready()?;
        if self.get_recipe_by_id(id).is_none() {
            return Ok(false);
        }

        let outcome = self.remote.delete(id).await;
        log_remote_outcome("delete", id, outcome);

        self.recipes.retain(|r| r.id != id);
        self.cache.save(&self.recipes)?;
        Ok(true)
    }

    // --- Form submission ---

    /// Normalize and validate a draft, then add it. Nothing is persisted when
    /// validation fails.
    pub async fn create_recipe(&mut self, draft: NewRecipe) -> Result<String, CatalogError> {
        let draft = draft.normalized();
        validate(&draft)?;
        self.add_recipe(draft).await
    }

    pub async fn edit_recipe(&mut self, id: &str, draft: NewRecipe) -> Result<bool, CatalogError> {
        let draft = draft.normalized();
        validate(&draft)?;
        self.update_recipe(id, Recipe::from_draft(id.to_string(), draft))
            .await
    }

    // --- Images ---

    /// Upload an image and make it the recipe's only image. Upload failures
    /// are returned to the caller since there is no local fallback for the
    /// blob; a disabled remote yields `None` and leaves the recipe untouched.
    pub async fn attach_image(
        &mut self,
        id: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<Option<String>, CatalogError> {
        self.ensure_ready()?;
        let mut recipe = self
            .get_recipe_by_id(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        let url = match self.remote.upload_image(bytes, content_type, id).await {
            Ok(url) => url,
            Err(RemoteError::Disabled) => {
                debug!(recipe_id = id, "remote store disabled, image not uploaded");
                return Ok(None);
            }
            Err(e) => {
                warn!(recipe_id = id, error = %e, "image upload failed");
                return Err(CatalogError::ImageUpload(e));
            }
        };

        recipe.media.images = vec![url.clone()];
        self.update_recipe(id, recipe).await?;
        Ok(Some(url))
    }

    /// Drop the recipe's images, removing the stored blob when possible.
    /// Returns whether the recipe had any images.
    pub async fn detach_image(&mut self, id: &str) -> Result<bool, CatalogError> {
        self.ensure_ready()?;
        let mut recipe = self
            .get_recipe_by_id(id)
            .cloned()
            .ok_or_else(|| CatalogError::NotFound(id.to_string()))?;

        let outcome = self.remote.delete_image(id).await;
        log_remote_outcome("delete image", id, outcome);

        if !recipe.has_images() {
            return Ok(false);
        }
        recipe.media.images.clear();
        self.update_recipe(id, recipe).await?;
        Ok(true)
    }
}

/// Insert a throwaway `test_<millis>` row, then delete it again. The row never
/// enters the catalog or the local cache.
pub async fn remote_write_test<S: RemoteStore>(remote: &S) -> WriteTestReport {
    if !remote.is_enabled() {
        return WriteTestReport::failed(&RemoteError::Disabled);
    }
    let recipe = write_test_recipe(chrono::Utc::now().timestamp_millis());
    if let Err(e) = remote.insert(&recipe).await {
        warn!(error = %e, "remote write test failed");
        return WriteTestReport::failed(&e);
    }

    let cleaned_up = match remote.delete(&recipe.id).await {
        Ok(()) => true,
        Err(e) => {
            warn!(recipe_id = %recipe.id, error = %e, "could not remove write test row");
            false
        }
    };
    info!(recipe_id = %recipe.id, "remote write test succeeded");
    WriteTestReport {
        success: true,
        id: Some(recipe.id),
        cleaned_up,
        ..WriteTestReport::default()
    }
}

fn log_remote_outcome(op: &str, id: &str, outcome: Result<(), RemoteError>) {
    match outcome {
        Ok(()) => debug!(recipe_id = id, "remote {op} succeeded"),
        Err(RemoteError::Disabled) => {
            debug!(recipe_id = id, "remote store disabled, {op} applied locally only");
        }
        Err(e) => warn!(
            recipe_id = id,
            error = %e,
            "remote {op} failed, change applied locally only"
        ),
    }
}
