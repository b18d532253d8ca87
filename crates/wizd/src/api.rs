use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use axum::routing::get;
use axum::routing::post;
use serde::Serialize;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::engine::EngineError;
use crate::engine::LightState;
use crate::engine::ServiceName;
use crate::engine::TurnOnParams;

/// Response for /v1/ping and accepted commands
#[derive(Serialize)]
struct StatusResponse {
    status: String,
}

/// Response for the /v1/info endpoint
#[derive(Serialize)]
struct InfoResponse {
    version: String,
    hostname: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// Shared application state
struct AppState {
    version: &'static str,
    engine: Arc<Engine>,
}

/// Error returned from a handler, rendered as a JSON body
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: String) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message,
        }
    }

    fn bad_request(message: String) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message,
        }
    }
}

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        let status = match e {
            EngineError::UnknownEntity(_) | EngineError::UnknownService { .. } => {
                StatusCode::NOT_FOUND
            }
            EngineError::IntegrationUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            EngineError::Poisoned => StatusCode::INTERNAL_SERVER_ERROR,
        };
        Self {
            status,
            message: e.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(ErrorResponse {
                error: self.message,
            }),
        )
            .into_response()
    }
}

fn accepted() -> impl IntoResponse {
    (
        StatusCode::ACCEPTED,
        Json(StatusResponse {
            status: "accepted".to_string(),
        }),
    )
}

/// Handler for GET /v1/ping
#[tracing::instrument]
async fn ping() -> impl IntoResponse {
    tracing::debug!("Handling /v1/ping request");
    (
        StatusCode::OK,
        Json(StatusResponse {
            status: "ok".to_string(),
        }),
    )
}

/// Handler for GET /v1/info
#[tracing::instrument(skip(state))]
async fn info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    tracing::debug!("Handling /v1/info request");

    let hostname = hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string());

    (
        StatusCode::OK,
        Json(InfoResponse {
            version: state.version.to_string(),
            hostname,
        }),
    )
}

/// Handler for GET /v1/lights
#[tracing::instrument(skip(state))]
async fn list_lights(State(state): State<Arc<AppState>>) -> Json<BTreeMap<String, LightState>> {
    Json(state.engine.state_snapshot().lights.clone())
}

/// Handler for GET /v1/lights/:entity_id
#[tracing::instrument(skip(state))]
async fn get_light(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<Json<LightState>, ApiError> {
    state
        .engine
        .state_snapshot()
        .lights
        .get(&entity_id)
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("No such light: {}", entity_id)))
}

/// Handler for POST /v1/lights/:entity_id/turn_on
///
/// The body is an optional JSON object of turn-on parameters.
#[tracing::instrument(skip(state, body))]
async fn turn_on(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let params = if body.is_empty() {
        TurnOnParams::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid turn_on parameters: {}", e)))?
    };

    state.engine.turn_on(entity_id, params)?;
    Ok(accepted())
}

/// Handler for POST /v1/lights/:entity_id/turn_off
#[tracing::instrument(skip(state))]
async fn turn_off(
    State(state): State<Arc<AppState>>,
    Path(entity_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.turn_off(entity_id)?;
    Ok(accepted())
}

/// Handler for GET /v1/services
#[tracing::instrument(skip(state))]
async fn list_services(State(state): State<Arc<AppState>>) -> Json<Vec<ServiceName>> {
    Json(state.engine.services())
}

/// Handler for POST /v1/services/:domain/:service
#[tracing::instrument(skip(state))]
async fn call_service(
    State(state): State<Arc<AppState>>,
    Path((domain, service)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    state.engine.call_service(domain, service)?;
    Ok(accepted())
}

/// Create the API router with all endpoints
fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/v1/ping", get(ping))
        .route("/v1/info", get(info))
        .route("/v1/lights", get(list_lights))
        .route("/v1/lights/:entity_id", get(get_light))
        .route("/v1/lights/:entity_id/turn_on", post(turn_on))
        .route("/v1/lights/:entity_id/turn_off", post(turn_off))
        .route("/v1/services", get(list_services))
        .route("/v1/services/:domain/:service", post(call_service))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP API server
///
/// Binds to `listen:port` and serves until `shutdown_rx` fires.
pub async fn serve(
    engine: Arc<Engine>,
    listen: String,
    port: u16,
    shutdown_rx: tokio::sync::oneshot::Receiver<()>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let version = env!("CARGO_PKG_VERSION");

    let state = Arc::new(AppState { version, engine });
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", listen, port).parse()?;
    tracing::info!("Starting HTTP API server on {}", addr);

    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            shutdown_rx.await.ok();
            tracing::info!("HTTP API server shutting down gracefully");
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::Method;
    use axum::http::Request;
    use serde_json::json;
    use tower::ServiceExt;

    use super::*;
    use crate::engine::ToIntegrationMessage;
    use crate::engine::test_support::Recorded;
    use crate::engine::test_support::RecordingIntegration;
    use crate::engine::test_support::wait_for;

    /// Engine with one recording integration whose light and service have
    /// reached the state snapshot.
    async fn running_engine() -> (Arc<Engine>, Recorded) {
        let engine = Arc::new(Engine::new());
        let (integration, commands) = RecordingIntegration::new("test", "light.desk");
        engine.register_integration("test".to_string(), Box::new(integration));

        let runner = engine.clone();
        tokio::spawn(async move { runner.run().await });

        let probe = engine.clone();
        wait_for(move || {
            probe.state_snapshot().lights.contains_key("light.desk") && !probe.services().is_empty()
        })
        .await;

        (engine, commands)
    }

    fn router(engine: Arc<Engine>) -> Router {
        create_router(Arc::new(AppState {
            version: "test",
            engine,
        }))
    }

    async fn request(
        engine: &Arc<Engine>,
        method: Method,
        uri: &str,
        body: Body,
    ) -> (StatusCode, serde_json::Value) {
        let response = router(engine.clone())
            .oneshot(
                Request::builder()
                    .method(method)
                    .uri(uri)
                    .header("content-type", "application/json")
                    .body(body)
                    .unwrap(),
            )
            .await
            .unwrap();

        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_ping() {
        let engine = Arc::new(Engine::new());
        let (status, body) = request(&engine, Method::GET, "/v1/ping", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"status": "ok"}));
    }

    #[tokio::test]
    async fn test_info_reports_version() {
        let engine = Arc::new(Engine::new());
        let (status, body) = request(&engine, Method::GET, "/v1/info", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["version"], "test");
        assert!(body["hostname"].is_string());
    }

    #[tokio::test]
    async fn test_lights() {
        let (engine, _) = running_engine().await;

        let (status, body) = request(&engine, Method::GET, "/v1/lights", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["light.desk"]["name"], "Desk");

        let (status, body) =
            request(&engine, Method::GET, "/v1/lights/light.desk", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["on"], true);
        assert_eq!(body["brightness"], 128);

        let (status, body) =
            request(&engine, Method::GET, "/v1/lights/light.attic", Body::empty()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(body["error"].as_str().unwrap().contains("light.attic"));
    }

    #[tokio::test]
    async fn test_turn_on_forwards_params() {
        let (engine, commands) = running_engine().await;

        let (status, body) = request(
            &engine,
            Method::POST,
            "/v1/lights/light.desk/turn_on",
            Body::from(r#"{"brightness": 64, "effect": "Ocean"}"#),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body, json!({"status": "accepted"}));

        wait_for(|| !commands.lock().unwrap().is_empty()).await;
        let commands = commands.lock().unwrap();
        match &commands[0] {
            ToIntegrationMessage::LightTurnOn { entity_id, params } => {
                assert_eq!(entity_id, "light.desk");
                assert_eq!(params.brightness, Some(64));
                assert_eq!(params.effect.as_deref(), Some("Ocean"));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_turn_on_without_body_and_turn_off() {
        let (engine, commands) = running_engine().await;

        let (status, _) = request(
            &engine,
            Method::POST,
            "/v1/lights/light.desk/turn_on",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        let (status, _) = request(
            &engine,
            Method::POST,
            "/v1/lights/light.desk/turn_off",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);

        wait_for(|| commands.lock().unwrap().len() == 2).await;
        let commands = commands.lock().unwrap();
        assert!(matches!(
            &commands[0],
            ToIntegrationMessage::LightTurnOn { params, .. } if *params == TurnOnParams::default()
        ));
        assert!(matches!(
            &commands[1],
            ToIntegrationMessage::LightTurnOff { entity_id } if entity_id == "light.desk"
        ));
    }

    #[tokio::test]
    async fn test_turn_on_rejects_bad_input() {
        let (engine, _) = running_engine().await;

        let (status, body) = request(
            &engine,
            Method::POST,
            "/v1/lights/light.desk/turn_on",
            Body::from(r#"{"brightness": 300}"#),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());

        let (status, _) = request(
            &engine,
            Method::POST,
            "/v1/lights/light.attic/turn_on",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_services() {
        let (engine, commands) = running_engine().await;

        let (status, body) = request(&engine, Method::GET, "/v1/services", Body::empty()).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!([{"domain": "test", "service": "refresh"}]));

        let (status, _) = request(
            &engine,
            Method::POST,
            "/v1/services/test/refresh",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::ACCEPTED);
        wait_for(|| !commands.lock().unwrap().is_empty()).await;

        let (status, body) = request(
            &engine,
            Method::POST,
            "/v1/services/test/missing",
            Body::empty(),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "No such service: test.missing");
    }
}
