//! Origin render server
//!
//! Every page request is one origin pass: a fresh [`TransferSlot`], a
//! [`StateSync`] in the origin context, the page's state run to completion
//! (bounded by `render_timeout`), and a JSON payload carrying the state
//! together with the serialized slot for the browser to hydrate from.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::get,
    Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::cats::{cat_location, home_cat_state, Cat, CatApi, CatState, CatViewer};
use crate::config::AppConfig;
use crate::error::ConfigError;
use crate::state::{AsyncRequestState, ExecutionContext, StateSync, TransferSlot};

// Application state
#[derive(Clone)]
pub struct AppState {
    pub api: Arc<dyn CatApi>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(api: Arc<dyn CatApi>, config: AppConfig) -> Self {
        Self {
            api,
            config: Arc::new(config),
        }
    }
}

// API types
#[derive(Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

/// Result of one origin pass
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderedPage<T> {
    pub route: String,
    pub state: AsyncRequestState<T, String>,
    /// Serialized transfer slot for the target pass
    pub transfer_state: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub struct CatQuery {
    #[serde(rename = "catId")]
    pub cat_id: Option<String>,
}

type PageResponse = Result<(StatusCode, Json<RenderedPage<Cat>>), StatusCode>;

pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Pages
        .route("/", get(home_page))
        .route("/home", get(home_page))
        .route("/cat", get(cat_page))
        // API routes
        .route("/api/health", get(health_check))
        // Add middleware
        .layer(
            ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(
                CorsLayer::new()
                    .allow_origin(Any)
                    .allow_methods(Any)
                    .allow_headers(Any),
            ),
        )
        .with_state(state)
}

/// Bind and serve until the process is stopped
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.bind_addr();
    let app = create_router(state);

    info!("Starting server on {}", addr);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// Health check endpoint
async fn health_check() -> Json<ApiResponse<String>> {
    Json(ApiResponse {
        success: true,
        data: Some("OK".to_string()),
        error: None,
    })
}

// Home page: one random cat
async fn home_page(State(state): State<AppState>) -> PageResponse {
    let sync = origin_pass();
    let cat = home_cat_state(&sync, state.api.clone()).map_err(config_failure)?;

    Ok(render("/home".to_string(), &sync, cat, state.config.render_timeout).await)
}

// Cat page: a specific cat, or a random one without catId
async fn cat_page(State(state): State<AppState>, Query(query): Query<CatQuery>) -> PageResponse {
    let sync = origin_pass();
    let viewer = CatViewer::new(&sync, state.api.clone()).map_err(config_failure)?;

    let route = match query.cat_id.as_deref() {
        Some(id) if !id.is_empty() => cat_location(id),
        _ => "/cat".to_string(),
    };
    viewer.refresh(query.cat_id);

    Ok(render(route, &sync, viewer.state(), state.config.render_timeout).await)
}

fn origin_pass() -> StateSync {
    StateSync::new(ExecutionContext::Origin, TransferSlot::new())
}

fn config_failure(e: ConfigError) -> StatusCode {
    warn!("Invalid page state configuration: {}", e);
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn render(
    route: String,
    sync: &StateSync,
    mut page_state: CatState,
    render_timeout: Duration,
) -> (StatusCode, Json<RenderedPage<Cat>>) {
    let pass_id = Uuid::new_v4();

    let status = match tokio::time::timeout(render_timeout, page_state.settled()).await {
        Ok(Some(_)) => StatusCode::OK,
        Ok(None) => {
            warn!(%pass_id, route = %route, "Page state finished without settling");
            StatusCode::INTERNAL_SERVER_ERROR
        }
        Err(_) => {
            warn!(
                %pass_id,
                route = %route,
                timeout_ms = render_timeout.as_millis() as u64,
                "Render timed out"
            );
            StatusCode::GATEWAY_TIMEOUT
        }
    };

    let page = RenderedPage {
        route,
        state: page_state.get().map_err(|e| e.to_string()),
        transfer_state: sync.slot().to_value(),
    };
    info!(%pass_id, route = %page.route, status = status.as_u16(), "Origin pass rendered");

    (status, Json(page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use tower::ServiceExt;

    struct FakeCats;

    #[async_trait]
    impl CatApi for FakeCats {
        async fn random_cat(&self) -> Result<Cat, ApiError> {
            Ok(Cat::new("random", "https://img.example/random.jpg"))
        }

        async fn cat_by_id(&self, cat_id: &str) -> Result<Cat, ApiError> {
            match cat_id {
                "slow" => futures::future::pending().await,
                "missing" => Err(ApiError::Status {
                    status: 404,
                    body: "not found".to_string(),
                }),
                id => Ok(Cat::new(id, format!("https://img.example/{}.jpg", id))),
            }
        }
    }

    fn test_router() -> Router {
        let config = AppConfig {
            render_timeout: Duration::from_millis(50),
            ..AppConfig::default()
        };
        create_router(AppState::new(Arc::new(FakeCats), config))
    }

    async fn get_page(uri: &str) -> (StatusCode, serde_json::Value) {
        let response = test_router()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health_check() {
        let (status, body) = get_page("/api/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["success"], true);
        assert_eq!(body["data"], "OK");
    }

    #[tokio::test]
    async fn test_cat_page_carries_transfer_state() {
        let (status, body) = get_page("/cat?catId=42").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"], "/cat?catId=42");
        assert_eq!(body["state"]["data"]["id"], "42");
        assert_eq!(body["state"]["loading"], false);
        assert_eq!(body["transferState"]["ct-state-cat"]["id"], "42");
    }

    #[tokio::test]
    async fn test_cat_page_route_encodes_cat_id() {
        let (status, body) = get_page("/cat?catId=a%26b%3Dc").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"], "/cat?catId=a%26b%3Dc");
        assert_eq!(body["state"]["data"]["id"], "a&b=c");
    }

    #[tokio::test]
    async fn test_home_page_random_cat() {
        let (status, body) = get_page("/").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["route"], "/home");
        assert_eq!(body["transferState"]["ct-state-home-cat"]["id"], "random");
    }

    #[tokio::test]
    async fn test_failed_request_renders_error_without_handoff() {
        let (status, body) = get_page("/cat?catId=missing").await;

        assert_eq!(status, StatusCode::OK);
        assert!(body["state"]["data"].is_null());
        assert_eq!(body["state"]["error"], "Cat API error 404: not found");
        assert_eq!(body["transferState"], serde_json::json!({}));
    }

    #[tokio::test]
    async fn test_slow_request_times_out() {
        let (status, body) = get_page("/cat?catId=slow").await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["state"]["loading"], true);
    }
}
