use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, Query, Request, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use tokio::sync::Mutex;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use crate::commands::{Catalog, ListFilters, RecipeList};
use crate::postgrest::PostgrestClient;
use cookbook_core::filter::filter_options;
use cookbook_core::models::{NewRecipe, Recipe, Tags};
use cookbook_core::remote::{HealthReport, RemoteStore, WriteTestReport};
use cookbook_core::service::{CatalogError, remote_write_test};

const BODY_LIMIT: usize = 10 * 1024 * 1024; // 10 MB

#[derive(Clone)]
struct AppState {
    catalog: Arc<Mutex<Catalog>>,
    // Health checks bypass the catalog lock.
    remote: PostgrestClient,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unavailable(String),
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                error!("internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<CatalogError> for ApiError {
    fn from(err: CatalogError) -> Self {
        match err {
            CatalogError::NotReady => Self::Unavailable(err.to_string()),
            CatalogError::NotFound(id) => Self::NotFound(format!("Recipe '{id}' not found")),
            CatalogError::Validation(e) => Self::BadRequest(e.to_string()),
            CatalogError::ImageUpload(_) => Self::BadGateway(err.to_string()),
            CatalogError::Local(e) => Self::Internal(e),
        }
    }
}

fn not_found(id: &str) -> ApiError {
    ApiError::NotFound(format!("Recipe '{id}' not found"))
}

// --- Middleware ---

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    response
}

// --- Handlers ---

async fn list_recipes(
    State(state): State<AppState>,
    Query(filters): Query<ListFilters>,
) -> Result<Response, ApiError> {
    let catalog = state.catalog.lock().await;
    let list = RecipeList::search(catalog.recipes()?, &filters);
    Ok(Json(list).into_response())
}

async fn create_recipe(
    State(state): State<AppState>,
    Json(draft): Json<NewRecipe>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let mut catalog = state.catalog.lock().await;
    let id = catalog.create_recipe(draft).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": id }))))
}

async fn get_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Recipe>, ApiError> {
    let catalog = state.catalog.lock().await;
    catalog.recipes()?;
    catalog
        .get_recipe_by_id(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn update_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(draft): Json<NewRecipe>,
) -> Result<Json<Recipe>, ApiError> {
    let mut catalog = state.catalog.lock().await;
    if !catalog.edit_recipe(&id, draft).await? {
        return Err(not_found(&id));
    }
    catalog
        .get_recipe_by_id(&id)
        .cloned()
        .map(Json)
        .ok_or_else(|| not_found(&id))
}

async fn delete_recipe(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let mut catalog = state.catalog.lock().await;
    if catalog.delete_recipe(&id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(&id))
    }
}

async fn get_filters(State(state): State<AppState>) -> Result<Json<Tags>, ApiError> {
    let catalog = state.catalog.lock().await;
    Ok(Json(filter_options(catalog.recipes()?)))
}

async fn upload_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<serde_json::Value>, ApiError> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .filter(|ct| ct.starts_with("image/"))
        .ok_or_else(|| ApiError::BadRequest("Content-Type must be an image type".to_string()))?
        .to_string();
    if body.is_empty() {
        return Err(ApiError::BadRequest("Image body is empty".to_string()));
    }

    let mut catalog = state.catalog.lock().await;
    match catalog.attach_image(&id, body.to_vec(), &content_type).await? {
        Some(url) => Ok(Json(json!({ "id": id, "url": url }))),
        None => Err(ApiError::BadRequest(
            "Image upload requires a configured remote store".to_string(),
        )),
    }
}

async fn delete_image(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut catalog = state.catalog.lock().await;
    let removed = catalog.detach_image(&id).await?;
    Ok(Json(json!({ "id": id, "removed": removed })))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.remote.health().await;
    (health_status(&report), Json(report))
}

fn health_status(report: &HealthReport) -> StatusCode {
    if report.is_healthy() {
        StatusCode::OK
    } else if report.configured && !report.reachable {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::BAD_REQUEST
    }
}

async fn write_test(State(state): State<AppState>) -> (StatusCode, Json<WriteTestReport>) {
    let report = remote_write_test(&state.remote).await;
    let status = if report.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(report))
}

// --- Router ---

fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(60 * 60));

    Router::new()
        .route("/api/recipes", get(list_recipes).post(create_recipe))
        .route(
            "/api/recipes/{id}",
            get(get_recipe).put(update_recipe).delete(delete_recipe),
        )
        .route(
            "/api/recipes/{id}/image",
            post(upload_image).delete(delete_image),
        )
        .route("/api/filters", get(get_filters))
        .route("/api/health", get(health))
        .route("/api/health/write-test", post(write_test))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(cors)
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

/// Serve an already hydrated catalog until interrupted.
pub async fn start_server(
    catalog: Catalog,
    remote: PostgrestClient,
    port: u16,
    bind: &str,
) -> anyhow::Result<()> {
    let state = AppState {
        catalog: Arc::new(Mutex::new(catalog)),
        remote,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}")).await?;
    info!("Listening on http://{bind}:{port}");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
        info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
                info!("Received terminate signal, shutting down");
            }
            Err(e) => {
                warn!(error = %e, "failed to install terminate handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use cookbook_core::cache::LocalCache;
    use cookbook_core::service::CatalogService;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    fn catalog() -> Catalog {
        CatalogService::new(
            PostgrestClient::disabled().unwrap(),
            LocalCache::open_in_memory().unwrap(),
        )
    }

    fn router_for(catalog: Catalog) -> Router {
        build_router(AppState {
            catalog: Arc::new(Mutex::new(catalog)),
            remote: PostgrestClient::disabled().unwrap(),
        })
    }

    async fn test_app() -> Router {
        let mut catalog = catalog();
        catalog.hydrate().await.unwrap();
        router_for(catalog)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let body = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&body).unwrap()
    }

    fn get(uri: &str) -> axum::http::Request<Body> {
        axum::http::Request::get(uri).body(Body::empty()).unwrap()
    }

    fn send_json(method: &str, uri: &str, body: &serde_json::Value) -> axum::http::Request<Body> {
        axum::http::Request::builder()
            .method(method)
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn draft_json(name: &str) -> serde_json::Value {
        json!({
            "name": name,
            "description": "Sour tamarind soup",
            "ingredients": [{ "name": "Pork Ribs", "type": "meat", "amount": "1 kg" }],
            "procedure": [{ "step": 1, "instruction": "Boil" }],
            "tags": { "cuisine": ["Filipino"], "method": ["soup"] }
        })
    }

    #[tokio::test]
    async fn list_returns_all_recipes() {
        let response = test_app().await.oneshot(get("/api/recipes")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 6);
        assert_eq!(json["message"], "Showing 6 recipes");
        assert_eq!(json["recipes"][0]["name"], "Chicken Hamonado");
    }

    #[tokio::test]
    async fn list_applies_filters() {
        let response = test_app()
            .await
            .oneshot(get("/api/recipes?protein=crab,salmon"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 2);

        let response = test_app()
            .await
            .oneshot(get("/api/recipes?q=chicken&mealType=lunch"))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["count"], 1);
        assert_eq!(json["recipes"][0]["id"], "1");
    }

    #[tokio::test]
    async fn list_no_match_reports_message() {
        let response = test_app()
            .await
            .oneshot(get("/api/recipes?q=zzzz"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["count"], 0);
        assert_eq!(
            json["message"],
            "No recipes found. Try adjusting your search or filters."
        );
    }

    #[tokio::test]
    async fn not_ready_returns_503() {
        let response = router_for(catalog())
            .oneshot(get("/api/recipes"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let json = body_json(response).await;
        assert_eq!(json["error"], "recipe catalog is not ready yet");
    }

    #[tokio::test]
    async fn get_recipe_and_unknown() {
        let app = test_app().await;
        let response = app.clone().oneshot(get("/api/recipes/3")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["name"], "Pork Adobo");

        let response = app.oneshot(get("/api/recipes/nope")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "Recipe 'nope' not found");
    }

    #[tokio::test]
    async fn create_recipe_then_fetch() {
        let app = test_app().await;
        let response = app
            .clone()
            .oneshot(send_json("POST", "/api/recipes", &draft_json("Sinigang")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let id = body_json(response).await["id"].as_str().unwrap().to_string();
        assert!(id.starts_with("recipe_"));

        let response = app
            .oneshot(get(&format!("/api/recipes/{id}")))
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["name"], "Sinigang");
        // Normalized on the way in
        assert_eq!(json["ingredients"][0]["name"], "pork ribs");
        assert_eq!(json["tags"]["cuisine"][0], "filipino");
    }

    #[tokio::test]
    async fn create_invalid_recipe_returns_400() {
        let app = test_app().await;
        let mut draft = draft_json("");
        draft["name"] = json!("  ");
        let response = app
            .clone()
            .oneshot(send_json("POST", "/api/recipes", &draft))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(body_json(response).await["error"], "Recipe name is required");

        let response = app.oneshot(get("/api/recipes")).await.unwrap();
        assert_eq!(body_json(response).await["count"], 6);
    }

    #[tokio::test]
    async fn update_recipe_and_unknown() {
        let app = test_app().await;
        let response = app
            .clone()
            .oneshot(send_json("PUT", "/api/recipes/5", &draft_json("Bistek")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["id"], "5");
        assert_eq!(json["name"], "Bistek");

        let response = app
            .oneshot(send_json("PUT", "/api/recipes/nope", &draft_json("Ghost")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn delete_recipe_twice() {
        let app = test_app().await;
        let delete = || {
            axum::http::Request::delete("/api/recipes/2")
                .body(Body::empty())
                .unwrap()
        };
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        let response = app.clone().oneshot(delete()).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let response = app.oneshot(get("/api/recipes")).await.unwrap();
        assert_eq!(body_json(response).await["count"], 5);
    }

    #[tokio::test]
    async fn filters_endpoint_lists_options() {
        let response = test_app().await.oneshot(get("/api/filters")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        let protein: Vec<&str> = json["protein"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap())
            .collect();
        assert!(protein.contains(&"chicken"));
        assert!(protein.contains(&"crab meat"));
        assert!(json["mealType"].as_array().unwrap().len() > 1);
    }

    #[tokio::test]
    async fn image_upload_requires_remote() {
        let response = test_app()
            .await
            .oneshot(
                axum::http::Request::post("/api/recipes/1/image")
                    .header("Content-Type", "image/png")
                    .body(Body::from(vec![0x89, 0x50, 0x4e, 0x47]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            body_json(response).await["error"],
            "Image upload requires a configured remote store"
        );
    }

    #[tokio::test]
    async fn image_upload_rejects_non_image() {
        let response = test_app()
            .await
            .oneshot(
                axum::http::Request::post("/api/recipes/1/image")
                    .header("Content-Type", "text/plain")
                    .body(Body::from("hello"))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn image_upload_unknown_recipe() {
        let response = test_app()
            .await
            .oneshot(
                axum::http::Request::post("/api/recipes/nope/image")
                    .header("Content-Type", "image/png")
                    .body(Body::from(vec![1, 2, 3]))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn image_delete_without_image() {
        let response = test_app()
            .await
            .oneshot(
                axum::http::Request::delete("/api/recipes/1/image")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["removed"], false);
    }

    #[tokio::test]
    async fn health_unconfigured_returns_400() {
        let response = test_app().await.oneshot(get("/api/health")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["configured"], false);
        assert_eq!(json["tableExists"], false);
        assert!(json.get("recipesCount").is_none());
    }

    #[test]
    fn health_status_separates_unreachable_from_missing_table() {
        let healthy = HealthReport {
            configured: true,
            reachable: true,
            table_exists: true,
            recipes_count: Some(6),
            ..HealthReport::default()
        };
        assert_eq!(health_status(&healthy), StatusCode::OK);

        let missing_table = HealthReport {
            configured: true,
            reachable: true,
            ..HealthReport::default()
        };
        assert_eq!(health_status(&missing_table), StatusCode::BAD_REQUEST);

        let unreachable = HealthReport {
            configured: true,
            error: Some("remote request failed: connection refused".to_string()),
            ..HealthReport::default()
        };
        assert_eq!(health_status(&unreachable), StatusCode::BAD_GATEWAY);

        assert_eq!(
            health_status(&HealthReport::unconfigured()),
            StatusCode::BAD_REQUEST
        );
    }

    #[tokio::test]
    async fn write_test_unconfigured_returns_400() {
        let response = test_app()
            .await
            .oneshot(
                axum::http::Request::post("/api/health/write-test")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert_eq!(json["cleanedUp"], false);
        assert_eq!(json["error"], "remote store is not configured");
    }

    #[tokio::test]
    async fn security_and_cors_headers_present() {
        let response = test_app()
            .await
            .oneshot(
                axum::http::Request::get("/api/recipes")
                    .header("Origin", "http://localhost:3000")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response.headers().get("x-content-type-options").unwrap(),
            "nosniff"
        );
        assert_eq!(response.headers().get("x-frame-options").unwrap(), "DENY");
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "*"
        );
    }
}
