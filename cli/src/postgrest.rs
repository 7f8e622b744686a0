use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::json;

use cookbook_core::models::Recipe;
use cookbook_core::remote::{
    BackendErrorBody, HealthReport, IMAGE_BUCKET, RECIPES_TABLE, RecipeRow, RemoteConfig,
    RemoteError, RemoteStore, from_row, image_object_name, to_row,
};

use crate::config::REMOTE_KEY_VAR;

const TABLE_HINT: &str = "Make sure the recipes table has been created on the backend";

/// [`RemoteStore`] over a hosted PostgREST table plus its object storage API.
/// Without a [`RemoteConfig`] every call short-circuits to
/// [`RemoteError::Disabled`].
#[derive(Clone)]
pub struct PostgrestClient {
    http: reqwest::Client,
    config: Option<RemoteConfig>,
}

#[derive(Debug, Deserialize)]
struct StorageObject {
    name: String,
}

impl PostgrestClient {
    pub fn new(config: Option<RemoteConfig>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .user_agent(format!(
                "cookbook-cli/{} (recipe catalog)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn disabled() -> Result<Self> {
        Self::new(None)
    }

    fn config(&self) -> Result<&RemoteConfig, RemoteError> {
        self.config.as_ref().ok_or(RemoteError::Disabled)
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, RemoteError> {
        let config = self.config()?;
        Ok(self
            .http
            .request(method, format!("{}{path}", config.base_url()))
            .header("apikey", config.api_key())
            .bearer_auth(config.api_key()))
    }

    fn table_path() -> String {
        format!("/rest/v1/{RECIPES_TABLE}")
    }

    fn public_url(&self, object_name: &str) -> Result<String, RemoteError> {
        Ok(format!(
            "{}/storage/v1/object/public/{IMAGE_BUCKET}/{object_name}",
            self.config()?.base_url()
        ))
    }

    async fn send(builder: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(e.to_string()))?;
        if resp.status().is_success() {
            return Ok(resp);
        }
        let status = resp.status().as_u16();
        let text = resp.text().await.unwrap_or_default();
        Err(backend_error(status, &text))
    }

    async fn rows(resp: Response) -> Result<Vec<Recipe>, RemoteError> {
        let rows: Vec<RecipeRow> = resp
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;
        Ok(rows.into_iter().map(from_row).collect())
    }
}

/// Decode the backend's `{code, message, details, hint}` error body, keeping
/// the raw text as the message when it is not JSON.
fn backend_error(status: u16, text: &str) -> RemoteError {
    let body = serde_json::from_str::<BackendErrorBody>(text).unwrap_or_else(|_| BackendErrorBody {
        message: (!text.trim().is_empty()).then(|| text.trim().to_string()),
        ..BackendErrorBody::default()
    });
    RemoteError::Backend { status, body }
}

/// Total row count from a `Content-Range` header such as `0-0/6` or `*/0`.
fn parse_content_range(header: &str) -> Option<u64> {
    header.rsplit_once('/')?.1.trim().parse().ok()
}

impl RemoteStore for PostgrestClient {
    fn is_enabled(&self) -> bool {
        self.config.is_some()
    }

    async fn fetch_all(&self) -> Result<Vec<Recipe>, RemoteError> {
        let builder = self
            .request(Method::GET, &Self::table_path())?
            .query(&[("select", "*")]);
        Self::rows(Self::send(builder).await?).await
    }

    async fn fetch_by_id(&self, id: &str) -> Result<Option<Recipe>, RemoteError> {
        let builder = self
            .request(Method::GET, &Self::table_path())?
            .query(&[("select", "*"), ("id", format!("eq.{id}").as_str())]);
        let recipes = Self::rows(Self::send(builder).await?).await?;
        Ok(recipes.into_iter().next())
    }

    async fn insert(&self, recipe: &Recipe) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::POST, &Self::table_path())?
            .header("Prefer", "return=minimal")
            .json(&[to_row(recipe)]);
        Self::send(builder).await?;
        Ok(())
    }

    async fn update(&self, id: &str, recipe: &Recipe) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::PATCH, &Self::table_path())?
            .query(&[("id", &format!("eq.{id}"))])
            .header("Prefer", "return=representation")
            .json(&to_row(recipe));
        let updated = Self::rows(Self::send(builder).await?).await?;
        if updated.is_empty() {
            return Err(RemoteError::NotFound(id.to_string()));
        }
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<(), RemoteError> {
        let builder = self
            .request(Method::DELETE, &Self::table_path())?
            .query(&[("id", &format!("eq.{id}"))]);
        Self::send(builder).await?;
        Ok(())
    }

    async fn upload_image(
        &self,
        bytes: Vec<u8>,
        content_type: &str,
        recipe_id: &str,
    ) -> Result<String, RemoteError> {
        let name = image_object_name(recipe_id, Utc::now().timestamp_millis());
        let builder = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/{IMAGE_BUCKET}/{name}"),
            )?
            .header("Content-Type", content_type)
            .header("x-upsert", "true")
            .body(bytes);
        Self::send(builder).await?;
        self.public_url(&name)
    }

    async fn delete_image(&self, recipe_id: &str) -> Result<(), RemoteError> {
        let builder = self
            .request(
                Method::POST,
                &format!("/storage/v1/object/list/{IMAGE_BUCKET}"),
            )?
            .json(&json!({ "prefix": "", "search": recipe_id, "limit": 100 }));
        let objects: Vec<StorageObject> = Self::send(builder)
            .await?
            .json()
            .await
            .map_err(|e| RemoteError::Decode(e.to_string()))?;

        let Some(first) = objects.into_iter().next() else {
            return Ok(());
        };
        let builder = self
            .request(Method::DELETE, &format!("/storage/v1/object/{IMAGE_BUCKET}"))?
            .json(&json!({ "prefixes": [first.name] }));
        Self::send(builder).await?;
        Ok(())
    }

    async fn health(&self) -> HealthReport {
        let builder = match self.request(Method::GET, &Self::table_path()) {
            Ok(builder) => builder
                .query(&[("select", "id"), ("limit", "1")])
                .header("Prefer", "count=exact"),
            Err(_) => return HealthReport::unconfigured(),
        };

        let outcome = Self::send(builder).await.map(|resp| {
            resp.headers()
                .get("content-range")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_content_range)
                .unwrap_or(0)
        });
        health_report(outcome)
    }
}

/// Turn the outcome of the counted table request into a report. Only a backend
/// answer says anything about the table; transport and decode failures leave
/// it unknown.
fn health_report(outcome: Result<u64, RemoteError>) -> HealthReport {
    let configured = HealthReport {
        configured: true,
        ..HealthReport::default()
    };
    match outcome {
        Ok(count) => HealthReport {
            reachable: true,
            table_exists: true,
            recipes_count: Some(count),
            ..configured
        },
        Err(e @ RemoteError::Backend { status: 401 | 403, .. }) => HealthReport {
            reachable: true,
            error: Some(e.to_string()),
            hint: Some(format!("Check that {REMOTE_KEY_VAR} is a valid API key")),
            ..configured
        },
        Err(e @ RemoteError::Backend { .. }) => HealthReport {
            reachable: true,
            error: Some(e.to_string()),
            hint: Some(TABLE_HINT.to_string()),
            ..configured
        },
        Err(e) => HealthReport {
            error: Some(e.to_string()),
            ..configured
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cookbook_core::seed::seed_recipes;

    fn configured() -> PostgrestClient {
        PostgrestClient::new(RemoteConfig::new(
            Some("https://abc.example.co"),
            Some("anon"),
        ))
        .unwrap()
    }

    #[test]
    fn test_parse_content_range() {
        assert_eq!(parse_content_range("0-0/6"), Some(6));
        assert_eq!(parse_content_range("*/0"), Some(0));
        assert_eq!(parse_content_range("0-5/*"), None);
        assert_eq!(parse_content_range("garbage"), None);
    }

    #[test]
    fn test_backend_error_json_body() {
        let err = backend_error(
            404,
            r#"{"code":"42P01","message":"relation does not exist","details":null,"hint":"run setup"}"#,
        );
        match err {
            RemoteError::Backend { status, body } => {
                assert_eq!(status, 404);
                assert_eq!(body.code.as_deref(), Some("42P01"));
                assert_eq!(body.hint.as_deref(), Some("run setup"));
                assert_eq!(body.details, None);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_backend_error_plain_text_body() {
        match backend_error(502, "Bad Gateway") {
            RemoteError::Backend { body, .. } => {
                assert_eq!(body.message.as_deref(), Some("Bad Gateway"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        match backend_error(500, "") {
            RemoteError::Backend { body, .. } => assert_eq!(body, BackendErrorBody::default()),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_public_url() {
        let client = configured();
        assert!(client.is_enabled());
        assert_eq!(
            client.public_url("recipe_1_42").unwrap(),
            "https://abc.example.co/storage/v1/object/public/recipe-images/recipe_1_42"
        );
    }

    #[tokio::test]
    async fn test_disabled_client_never_touches_network() {
        let client = PostgrestClient::disabled().unwrap();
        let recipe = seed_recipes().unwrap().remove(0);
        assert!(!client.is_enabled());
        assert_eq!(client.fetch_all().await, Err(RemoteError::Disabled));
        assert_eq!(client.fetch_by_id("1").await, Err(RemoteError::Disabled));
        assert_eq!(client.insert(&recipe).await, Err(RemoteError::Disabled));
        assert_eq!(client.update("1", &recipe).await, Err(RemoteError::Disabled));
        assert_eq!(client.delete("1").await, Err(RemoteError::Disabled));
        assert_eq!(
            client.upload_image(vec![1], "image/png", "1").await,
            Err(RemoteError::Disabled)
        );
        assert_eq!(client.delete_image("1").await, Err(RemoteError::Disabled));
    }

    #[test]
    fn test_health_report_counts_rows() {
        let report = health_report(Ok(6));
        assert!(report.is_healthy());
        assert!(report.reachable);
        assert_eq!(report.recipes_count, Some(6));
        assert_eq!(report.hint, None);
    }

    #[test]
    fn test_health_report_missing_table() {
        let report = health_report(Err(backend_error(
            404,
            r#"{"code":"42P01","message":"relation \"public.recipes\" does not exist"}"#,
        )));
        assert!(report.configured);
        assert!(report.reachable);
        assert!(!report.table_exists);
        assert!(report.error.unwrap().contains("42P01"));
        assert_eq!(report.hint.as_deref(), Some(TABLE_HINT));
    }

    #[test]
    fn test_health_report_rejected_key() {
        let report = health_report(Err(backend_error(401, r#"{"message":"Invalid API key"}"#)));
        assert!(report.reachable);
        assert!(!report.table_exists);
        assert!(report.hint.unwrap().contains(REMOTE_KEY_VAR));
    }

    #[test]
    fn test_health_report_unreachable_has_no_table_hint() {
        for err in [
            RemoteError::Transport("connection refused".to_string()),
            RemoteError::Decode("unexpected end of input".to_string()),
        ] {
            let report = health_report(Err(err));
            assert!(report.configured);
            assert!(!report.reachable);
            assert!(!report.is_healthy());
            assert!(report.error.is_some());
            assert_eq!(report.hint, None);
        }
    }

    #[tokio::test]
    async fn test_disabled_health_is_unconfigured() {
        let report = PostgrestClient::disabled().unwrap().health().await;
        assert_eq!(report, HealthReport::unconfigured());
    }

    #[tokio::test]
    #[ignore = "requires COOKBOOK_REMOTE_URL and COOKBOOK_REMOTE_KEY"]
    async fn test_live_fetch_all() {
        let config = RemoteConfig::new(
            std::env::var("COOKBOOK_REMOTE_URL").ok().as_deref(),
            std::env::var("COOKBOOK_REMOTE_KEY").ok().as_deref(),
        );
        let client = PostgrestClient::new(config).unwrap();
        assert!(client.health().await.is_healthy());
        let recipes = client.fetch_all().await.unwrap();
        for recipe in &recipes {
            assert!(!recipe.id.is_empty());
        }
    }
}
