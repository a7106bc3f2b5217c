//! REST API for the space search service.
//!
//! Provides HTTP endpoints for searching storage spaces and inspecting the
//! listing catalog. Uses Axum as the web framework and supports CORS.

use std::sync::{Arc, OnceLock};

use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, State};
use axum::{
    Router,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
};
use log::{error, info};
use serde::{Deserialize, Serialize};
#[allow(unused_imports)]
use serde_json::json;
use tower_http::cors::{Any, CorsLayer};
use utoipa::{OpenApi, ToSchema};

use crate::catalog::{CatalogError, CatalogStore};
use crate::config::ApiConfig;
use crate::model::{Listing, SearchResponse, VehicleRequest};
use crate::optimizer::SearchConfig;
use crate::search::{SearchError, search_spaces};

#[derive(Clone)]
pub struct ApiState {
    catalog: Arc<CatalogStore>,
    search_config: SearchConfig,
}

impl ApiState {
    pub fn new(catalog: Arc<CatalogStore>, search_config: SearchConfig) -> Self {
        Self {
            catalog,
            search_config,
        }
    }
}

static OPENAPI_DOC: OnceLock<utoipa::openapi::OpenApi> = OnceLock::new();

const SWAGGER_UI_HTML: &str = r##"<!DOCTYPE html>
<html lang="en">
    <head>
        <meta charset="utf-8" />
        <title>space-search API Docs</title>
        <link
            rel="stylesheet"
            href="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui.css"
            integrity="sha384-wxLW6kwyHktdDGr6Pv1zgm/VGJh99lfUbzSn6HNHBENZlCN7W602k9VkGdxuFvPn"
            crossorigin="anonymous"
        />
    </head>
    <body>
        <div id="swagger-ui"></div>
        <script
            src="https://unpkg.com/swagger-ui-dist@5.17.14/swagger-ui-bundle.js"
            integrity="sha384-wmyclcVGX/WhUkdkATwhaK1X1JtiNrr2EoYJ+diV3vj4v6OC5yCeSu+yW13SYJep"
            crossorigin="anonymous"
        ></script>
        <script>
            window.onload = function () {
                window.ui = SwaggerUIBundle({
                    url: "/docs/openapi.json",
                    dom_id: "#swagger-ui",
                });
            };
        </script>
    </body>
    </html>"##;

fn openapi_doc() -> &'static utoipa::openapi::OpenApi {
    OPENAPI_DOC.get_or_init(ApiDoc::openapi)
}

#[derive(Serialize, Deserialize, ToSchema)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl ErrorResponse {
    fn new(error: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: details.into(),
        }
    }
}

/// Summary of a reloaded catalog.
#[derive(Serialize, Deserialize, ToSchema)]
pub struct ReloadResponse {
    pub locations: usize,
    pub listings: usize,
}

fn error_response(
    status: StatusCode,
    error: impl Into<String>,
    details: impl Into<String>,
) -> Response {
    (status, Json(ErrorResponse::new(error, details))).into_response()
}

fn json_deserialize_error(err: JsonRejection) -> Response {
    error_response(StatusCode::BAD_REQUEST, "Invalid JSON data", err.to_string())
}

fn catalog_unavailable(err: CatalogError) -> Response {
    error!("❌ Catalog unavailable: {}", err);
    error_response(
        StatusCode::SERVICE_UNAVAILABLE,
        "Catalog unavailable",
        err.to_string(),
    )
}

fn search_error_response(err: SearchError) -> Response {
    match err {
        SearchError::NoVehicles => error_response(
            StatusCode::BAD_REQUEST,
            "Invalid input data",
            err.to_string(),
        ),
        SearchError::InvalidVehicle(inner) => error_response(
            StatusCode::BAD_REQUEST,
            "Invalid input data",
            inner.to_string(),
        ),
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(handle_search, handle_get_listing, handle_location_listings, handle_reload),
    components(
        schemas(
            VehicleRequest,
            SearchResponse,
            Listing,
            ReloadResponse,
            ErrorResponse
        )
    ),
    tags(
        (name = "search", description = "Search for storage spaces"),
        (name = "catalog", description = "Listing catalog")
    )
)]
struct ApiDoc;

/// Builds the application router.
pub fn router(state: ApiState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    Router::new()
        .route("/search/spaces", post(handle_search))
        .route("/listings/{id}", get(handle_get_listing))
        .route(
            "/locations/{location_id}/listings",
            get(handle_location_listings),
        )
        .route("/catalog/reload", post(handle_reload))
        // API documentation
        .route("/docs/openapi.json", get(serve_openapi_json))
        .route("/docs", get(serve_openapi_ui))
        .layer(cors)
        .with_state(state)
}

/// Starts the API server.
///
/// Blocks until the server is terminated.
pub async fn start_api_server(config: ApiConfig, state: ApiState) -> std::io::Result<()> {
    let addr = config.socket_addr();
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let display_host = config.display_host().to_string();
    info!(
        "🚀 Server running on http://{}:{}",
        display_host,
        config.port()
    );
    if config.binds_to_all_interfaces() && config.uses_default_host() {
        info!("💡 Local access: http://localhost:{}", config.port());
    }
    info!("📦 API Endpoints:");
    info!("   - POST /search/spaces");
    info!("   - GET  /listings/{{id}}");
    info!("   - GET  /locations/{{location_id}}/listings");
    info!("   - POST /catalog/reload");
    info!("📑 Documentation:");
    info!("   - GET /docs");
    info!("   - GET /docs/openapi.json");

    axum::serve(listener, router(state)).await
}

/// Handler for POST /search/spaces.
///
/// Takes a list of vehicles and returns, per location, the cheapest set of
/// listings that holds all of them.
///
/// # Returns
/// JSON array sorted by total price; empty if no location fits the vehicles
#[utoipa::path(
    post,
    path = "/search/spaces",
    request_body = Vec<VehicleRequest>,
    responses(
        (status = 200, description = "Feasible locations sorted by price", body = Vec<SearchResponse>),
        (status = BAD_REQUEST, description = "Missing or invalid vehicles", body = ErrorResponse),
        (status = SERVICE_UNAVAILABLE, description = "Catalog unavailable", body = ErrorResponse)
    ),
    tag = "search"
)]
async fn handle_search(
    State(state): State<ApiState>,
    payload: Result<Json<Option<Vec<VehicleRequest>>>, JsonRejection>,
) -> Response {
    let vehicles = match payload {
        Ok(Json(vehicles)) => vehicles.unwrap_or_default(),
        Err(err) => return json_deserialize_error(err),
    };

    let catalog = match state.catalog.snapshot() {
        Ok(catalog) => catalog,
        Err(err) => return catalog_unavailable(err),
    };

    info!("📥 New search request: {} vehicle entries", vehicles.len());
    match search_spaces(catalog, &vehicles, state.search_config).await {
        Ok(results) => (StatusCode::OK, Json(results)).into_response(),
        Err(err) => search_error_response(err),
    }
}

/// Handler for GET /listings/{id}.
#[utoipa::path(
    get,
    path = "/listings/{id}",
    params(("id" = String, Path, description = "Listing id")),
    responses(
        (status = 200, description = "The listing", body = Listing),
        (status = NOT_FOUND, description = "Unknown listing", body = ErrorResponse),
        (status = SERVICE_UNAVAILABLE, description = "Catalog unavailable", body = ErrorResponse)
    ),
    tag = "catalog"
)]
async fn handle_get_listing(State(state): State<ApiState>, Path(id): Path<String>) -> Response {
    let catalog = match state.catalog.snapshot() {
        Ok(catalog) => catalog,
        Err(err) => return catalog_unavailable(err),
    };

    match catalog.listing(&id) {
        Some(listing) => (StatusCode::OK, Json(listing.clone())).into_response(),
        None => error_response(
            StatusCode::NOT_FOUND,
            "Listing not found",
            format!("No listing with id '{}'", id),
        ),
    }
}

/// Handler for GET /locations/{location_id}/listings.
///
/// Lists the listings of a location by ascending price.
#[utoipa::path(
    get,
    path = "/locations/{location_id}/listings",
    params(("location_id" = String, Path, description = "Location id")),
    responses(
        (status = 200, description = "Listings of the location", body = Vec<Listing>),
        (status = SERVICE_UNAVAILABLE, description = "Catalog unavailable", body = ErrorResponse)
    ),
    tag = "catalog"
)]
async fn handle_location_listings(
    State(state): State<ApiState>,
    Path(location_id): Path<String>,
) -> Response {
    match state.catalog.snapshot() {
        Ok(catalog) => {
            (StatusCode::OK, Json(catalog.listings_at(&location_id).to_vec())).into_response()
        }
        Err(err) => catalog_unavailable(err),
    }
}

/// Handler for POST /catalog/reload.
///
/// Re-reads the listings file. Running searches keep the snapshot they started with.
#[utoipa::path(
    post,
    path = "/catalog/reload",
    responses(
        (status = 200, description = "Catalog reloaded", body = ReloadResponse),
        (status = INTERNAL_SERVER_ERROR, description = "Reload failed, previous catalog stays active", body = ErrorResponse)
    ),
    tag = "catalog"
)]
async fn handle_reload(State(state): State<ApiState>) -> Response {
    let store = Arc::clone(&state.catalog);
    let reloaded = tokio::task::spawn_blocking(move || store.reload()).await;

    match reloaded {
        Ok(Ok(snapshot)) => (
            StatusCode::OK,
            Json(ReloadResponse {
                locations: snapshot.location_count(),
                listings: snapshot.listing_count(),
            }),
        )
            .into_response(),
        Ok(Err(err)) => error_response(
            StatusCode::INTERNAL_SERVER_ERROR,
            "Catalog reload failed",
            err.to_string(),
        ),
        Err(err) => {
            error!("❌ Reload task of {} failed: {}", state.catalog.path().display(), err);
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Catalog reload failed",
                err.to_string(),
            )
        }
    }
}

async fn serve_openapi_json() -> impl IntoResponse {
    Json(openapi_doc())
}

async fn serve_openapi_ui() -> impl IntoResponse {
    Html(SWAGGER_UI_HTML)
}
