use crate::common::models::{LocationParams, LocationResponse, SearchParams, SearchResponse, Segment};
use crate::server::config::ServerConfig;
use crate::server::database::Database;
use crate::server::listings::{self, ListingUpdate, NewListing};
use crate::server::locations;
use axum::{
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use std::time::Instant;
use tower::ServiceBuilder;
use tower_http::{cors::{Any, CorsLayer}, trace::TraceLayer};

#[derive(Clone)]
pub struct ApiState {
    pub db: Arc<Database>,
    pub config: ServerConfig,
}

pub fn router(state: ApiState) -> Router {
    let cors = cors_layer(&state.config.allowed_origin);

    Router::new()
        .route("/health", get(health))
        .route("/search", get(search))
        .route("/api/location", get(location))
        .route("/api/listings", post(create_listing))
        .route("/api/listings/:id", put(update_listing))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

fn cors_layer(allowed_origin: &Option<String>) -> CorsLayer {
    match allowed_origin {
        Some(origin) => match origin.parse::<HeaderValue>() {
            Ok(value) => CorsLayer::new()
                .allow_origin(value)
                .allow_methods(Any)
                .allow_headers(Any),
            Err(_) => {
                log::warn!("[HTTP] Invalid ALLOWED_ORIGIN '{}', allowing any origin", origin);
                CorsLayer::permissive()
            }
        },
        None => CorsLayer::permissive(),
    }
}

async fn health() -> &'static str {
    "ok"
}

#[derive(Debug, Deserialize)]
struct SearchQueryParams {
    q: Option<String>,
    segment: Option<String>,
}

async fn search(
    State(state): State<ApiState>,
    Query(params): Query<SearchQueryParams>,
) -> Response {
    let started = Instant::now();
    let segment = params.segment.as_deref().and_then(Segment::parse).unwrap_or_default();
    // An all-whitespace q is the same as no filter at all
    let q = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    match listings::search_listings(state.db.clone(), q.as_deref(), segment).await {
        Ok((travellers, shipments)) => {
            let total = travellers.len() + shipments.len();
            log::info!(
                "[HTTP] /search q={:?} segment={} -> {} result(s)",
                q,
                segment.as_str(),
                total
            );
            Json(SearchResponse {
                travellers,
                shipments,
                total,
                took_ms: started.elapsed().as_millis() as u64,
                params: SearchParams { q, segment: segment.as_str().to_string() },
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
struct LocationQueryParams {
    q: Option<String>,
}

async fn location(
    State(state): State<ApiState>,
    Query(params): Query<LocationQueryParams>,
) -> Response {
    let started = Instant::now();
    let q = params
        .q
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from);

    match locations::lookup_locations(state.db.clone(), q.as_deref()).await {
        Ok(data) => {
            let total = data.len();
            Json(LocationResponse {
                data,
                total,
                took_ms: started.elapsed().as_millis() as u64,
                params: LocationParams { q },
            })
            .into_response()
        }
        Err(e) => error_response(e),
    }
}

async fn create_listing(
    State(state): State<ApiState>,
    Json(new): Json<NewListing>,
) -> Response {
    match listings::create_listing(state.db.clone(), new).await {
        Ok(record) => (StatusCode::CREATED, Json(record)).into_response(),
        Err(e) => error_response(e),
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpdateRequest {
    actor_id: String,
    #[serde(flatten)]
    patch: ListingUpdate,
}

async fn update_listing(
    State(state): State<ApiState>,
    Path(listing_id): Path<String>,
    Json(request): Json<UpdateRequest>,
) -> Response {
    match listings::update_listing(state.db.clone(), &listing_id, &request.actor_id, request.patch).await {
        Ok(record) => Json(record).into_response(),
        Err(e) => error_response(e),
    }
}

/// Failures surface as opaque strings, the way the client displays them.
fn error_response(e: anyhow::Error) -> Response {
    log::error!("[HTTP] Request failed: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(serde_json::json!({ "error": e.to_string() })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use sqlx::sqlite::SqlitePoolOptions;
    use tower::ServiceExt;

    async fn test_state() -> ApiState {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        let db = Database { pool };
        db.migrate().await.unwrap();
        let db = Arc::new(db);
        locations::seed_locations(db.clone()).await.unwrap();

        let mut config = ServerConfig::from_env();
        config.allowed_origin = None;
        ApiState { db, config }
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn search_on_empty_db_returns_empty_arrays() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/search?segment=all").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["total"], 0);
        assert_eq!(json["travellers"].as_array().unwrap().len(), 0);
        assert_eq!(json["shipments"].as_array().unwrap().len(), 0);
        assert_eq!(json["params"]["segment"], "all");
    }

    #[tokio::test]
    async fn location_lookup_matches_seed() {
        let app = router(test_state().await);
        let response = app
            .oneshot(Request::builder().uri("/api/location?q=accra").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let json = body_json(response).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["data"][0]["id"], "ACC");
    }

    #[tokio::test]
    async fn create_then_search_round_trip() {
        let state = test_state().await;
        let app = router(state.clone());

        let body = serde_json::json!({
            "title": "4kg to Accra",
            "description": "Direct flight",
            "origin": {"city": "New York", "name": "New York (JFK)", "code": "JFK"},
            "destination": {"city": "Accra", "name": "Kotoka International", "code": "ACC"},
            "departureDate": "2024-07-04T08:30:00Z",
            "maxWeightKg": 4.0,
            "pricePerKg": 9.0,
            "currency": "USD",
            "typeOfListing": "travel",
            "owner": {"id": "u1", "name": "Ama"}
        });

        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/listings")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let response = app
            .oneshot(Request::builder().uri("/search?q=JFK&segment=routes").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let json = body_json(response).await;
        assert_eq!(json["total"], 1);
        assert_eq!(json["travellers"][0]["origin"]["code"], "JFK");
        assert_eq!(json["params"]["q"], "JFK");
    }

    #[tokio::test]
    async fn validation_failure_returns_error_body() {
        let app = router(test_state().await);
        let body = serde_json::json!({
            "title": "   ",
            "description": "x",
            "origin": {"city": "a", "name": "b", "code": "c"},
            "destination": {"city": "a", "name": "b", "code": "c"},
            "maxWeightKg": 1.0,
            "pricePerKg": 1.0,
            "currency": "USD",
            "typeOfListing": "travel",
            "owner": {"id": "u1", "name": "Ama"}
        });
        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/listings")
                    .header("content-type", "application/json")
                    .body(Body::from(body.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let json = body_json(response).await;
        assert_eq!(json["error"], "Title is required");
    }
}
