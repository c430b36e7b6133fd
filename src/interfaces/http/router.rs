//! API router with Swagger UI

use std::sync::Arc;
use std::time::Instant;

use axum::{
    extract::FromRef,
    http::{header, HeaderValue, Method},
    middleware,
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::application::{SharedEventBus, SharedVenueRegistry};
use crate::config::AdminConfig;
use crate::interfaces::http::common::ApiResponse;
use crate::interfaces::http::middleware::{auth_middleware, AuthState};
use crate::interfaces::http::modules::{auth, health, metrics, venues};
use crate::interfaces::ws::{create_notification_state, ws_notifications_handler, NotificationState};

/// Everything the HTTP layer needs. Handlers pull their own slice via `FromRef`.
#[derive(Clone)]
pub struct AppState {
    pub registry: SharedVenueRegistry,
    pub event_bus: SharedEventBus,
    pub auth: AuthState,
    pub users: Arc<AdminConfig>,
    pub started_at: Arc<Instant>,
}

impl FromRef<AppState> for AuthState {
    fn from_ref(s: &AppState) -> Self {
        s.auth.clone()
    }
}

impl FromRef<AppState> for auth::AuthHandlerState {
    fn from_ref(s: &AppState) -> Self {
        auth::AuthHandlerState {
            auth: s.auth.clone(),
            users: Arc::clone(&s.users),
        }
    }
}

impl FromRef<AppState> for venues::VenueHandlerState {
    fn from_ref(s: &AppState) -> Self {
        venues::VenueHandlerState {
            registry: Arc::clone(&s.registry),
        }
    }
}

impl FromRef<AppState> for health::HealthState {
    fn from_ref(s: &AppState) -> Self {
        health::HealthState {
            registry: Arc::clone(&s.registry),
            started_at: Arc::clone(&s.started_at),
        }
    }
}

impl FromRef<AppState> for NotificationState {
    fn from_ref(s: &AppState) -> Self {
        create_notification_state(s.event_bus.clone())
    }
}

/// Security scheme modifier for OpenAPI
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .description(Some("JWT from /api/v1/auth/login"))
                        .build(),
                ),
            );
            components.add_security_scheme(
                "cookie_auth",
                SecurityScheme::ApiKey(ApiKey::Cookie(ApiKeyValue::new("admin_token"))),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::login,
        auth::logout,
        auth::get_current_user,
        venues::list_venues,
        venues::get_ledger,
        venues::start_session,
        venues::stop_session,
        venues::reset_ledger,
        venues::quote_session,
    ),
    components(
        schemas(
            ApiResponse<String>,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::UserInfo,
            venues::VenueDto,
            venues::RateRuleDto,
            venues::LedgerDto,
            venues::StationDto,
            venues::ReceiptDto,
            venues::StartSessionRequest,
            venues::StartSessionResponse,
            venues::StopSessionResponse,
            venues::ResetRequest,
            venues::ResetResponse,
            venues::QuoteDto,
            health::HealthResponse,
            health::VenueHealth,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Liveness and storage health"),
        (name = "Authentication", description = "Operator login with static credentials"),
        (name = "Venues", description = "Daily ledgers: live board, sessions, receipts, reset"),
    ),
    info(
        title = "Venue Ledger API",
        version = "1.0.0",
        description = "Session billing for billiard tables and game room stations"
    )
)]
pub struct ApiDoc;

fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|o| match o.parse() {
            Ok(v) => Some(v),
            Err(_) => {
                warn!(origin = %o, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if allowed.is_empty() {
        return CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);
    }
    // Cookies only cross origins when they are listed explicitly.
    CorsLayer::new()
        .allow_origin(allowed)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .allow_credentials(true)
}

/// Build the full router. `/metrics` is mounted only when a Prometheus
/// recorder is installed.
pub fn create_api_router(
    state: AppState,
    prometheus: Option<PrometheusHandle>,
    cors_origins: &[String],
) -> Router {
    let auth_state = state.auth.clone();

    let auth_routes = Router::new()
        .route("/login", post(auth::login))
        .route("/logout", post(auth::logout));

    let auth_protected_routes = Router::new()
        .route("/me", get(auth::get_current_user))
        .layer(middleware::from_fn_with_state(auth_state.clone(), auth_middleware));

    let venue_routes = Router::new()
        .route("/", get(venues::list_venues))
        .route("/{venue}/ledger", get(venues::get_ledger))
        .route("/{venue}/stations/{id}/start", post(venues::start_session))
        .route("/{venue}/stations/{id}/stop", post(venues::stop_session))
        .route("/{venue}/reset", post(venues::reset_ledger))
        .route("/{venue}/quote", get(venues::quote_session))
        .layer(middleware::from_fn_with_state(auth_state.clone(), auth_middleware));

    let notification_routes = Router::new()
        .route("/notifications", get(ws_notifications_handler))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    let swagger_routes = SwaggerUi::new("/docs").url("/api-doc/openapi.json", ApiDoc::openapi());

    let mut router = Router::new()
        .route("/health", get(health::health_check))
        .nest("/api/v1/auth", auth_routes.merge(auth_protected_routes))
        .nest("/api/v1/venues", venue_routes)
        .nest("/ws", notification_routes)
        .with_state(state.clone())
        .merge(swagger_routes);

    if let Some(handle) = prometheus {
        let metrics_routes = Router::new()
            .route("/metrics", get(metrics::prometheus_metrics))
            .with_state(metrics::MetricsState {
                handle,
                registry: state.registry,
            });
        router = router.merge(metrics_routes);
    }

    router
        .layer(middleware::from_fn(metrics::http_metrics_middleware))
        .layer(cors_layer(cors_origins))
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::{create_event_bus, LedgerOptions, LedgerService, VenueRegistry};
    use crate::domain::VenueConfig;
    use crate::infrastructure::crypto::jwt::{create_token, JwtConfig};
    use crate::infrastructure::storage::MemoryLedgerRepository;
    use crate::shared::time::{ManualClock, SharedClock};
    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use axum::response::Response;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    const NOON_UTC: i64 = 1_710_072_000_000; // 2024-03-10T12:00:00Z

    struct Harness {
        router: Router,
        clock: Arc<ManualClock>,
        token: String,
    }

    async fn harness() -> Harness {
        let clock = Arc::new(ManualClock::new(NOON_UTC));
        let shared: SharedClock = clock.clone();
        let repo = Arc::new(MemoryLedgerRepository::new());
        let event_bus = create_event_bus();
        let mut registry = VenueRegistry::new();
        for venue in [VenueConfig::billiard(), VenueConfig::game_room()] {
            registry.insert(
                LedgerService::load(
                    venue,
                    repo.clone(),
                    shared.clone(),
                    event_bus.clone(),
                    LedgerOptions::default(),
                )
                .await,
            );
        }

        let jwt_config = JwtConfig::new("router-secret", 1);
        let (token, _) = create_token("admin", "admin", &jwt_config).unwrap();
        let state = AppState {
            registry: Arc::new(registry),
            event_bus,
            auth: AuthState {
                jwt_config,
                cookie_name: "admin_token".into(),
            },
            users: Arc::new(AdminConfig::default()),
            started_at: Arc::new(Instant::now()),
        };
        Harness {
            router: create_api_router(state, None, &[]),
            clock,
            token,
        }
    }

    impl Harness {
        async fn call(&self, method: &str, uri: &str, body: Option<Value>, auth: bool) -> Response {
            let mut builder = Request::builder().method(method).uri(uri);
            if auth {
                builder = builder.header("authorization", format!("Bearer {}", self.token));
            }
            let request = match body {
                Some(json) => builder
                    .header("content-type", "application/json")
                    .body(Body::from(json.to_string()))
                    .unwrap(),
                None => builder.body(Body::empty()).unwrap(),
            };
            self.router.clone().oneshot(request).await.unwrap()
        }
    }

    async fn json_body(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = harness().await;
        let response = h.call("GET", "/health", None, false).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["status"], "ok");
        assert_eq!(body["venues"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn venue_routes_require_a_token() {
        let h = harness().await;
        let response = h.call("GET", "/api/v1/venues/billiard/ledger", None, false).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(response).await["success"], false);
    }

    #[tokio::test]
    async fn login_sets_session_cookie_usable_for_requests() {
        let h = harness().await;
        let response = h
            .call(
                "POST",
                "/api/v1/auth/login",
                Some(json!({"username": "admin", "password": "admin"})),
                false,
            )
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get("set-cookie")
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("admin_token="));
        assert!(cookie.contains("HttpOnly"));

        let pair = cookie.split(';').next().unwrap().to_string();
        let request = Request::builder()
            .uri("/api/v1/auth/me")
            .header("cookie", pair)
            .body(Body::empty())
            .unwrap();
        let me = h.router.clone().oneshot(request).await.unwrap();
        assert_eq!(me.status(), StatusCode::OK);
        assert_eq!(json_body(me).await["data"]["username"], "admin");
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let h = harness().await;
        let response = h
            .call(
                "POST",
                "/api/v1/auth/login",
                Some(json!({"username": "admin", "password": "nope"})),
                false,
            )
            .await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn start_then_stop_returns_receipt_and_ticket() {
        let h = harness().await;
        let started = h
            .call("POST", "/api/v1/venues/game-room/stations/2/start", Some(json!({"player_count": 4})), true)
            .await;
        assert_eq!(started.status(), StatusCode::OK);
        let started = json_body(started).await;
        assert_eq!(started["data"]["station"]["running"], true);
        assert_eq!(started["data"]["station"]["player_count"], 4);
        assert_eq!(started["data"]["persisted"], true);

        h.clock.advance(30 * 60_000);
        let board = json_body(h.call("GET", "/api/v1/venues/game-room/ledger", None, true).await).await;
        assert_eq!(board["data"]["running"], 1);
        assert_eq!(board["data"]["stations"][1]["elapsed"], "00:30:00");

        let stopped = h
            .call("POST", "/api/v1/venues/game-room/stations/2/stop", None, true)
            .await;
        assert_eq!(stopped.status(), StatusCode::OK);
        let stopped = json_body(stopped).await;
        let receipt = &stopped["data"]["receipt"];
        assert_eq!(receipt["station_id"], 2);
        assert_eq!(receipt["duration"], "00:30:00");
        assert_eq!(receipt["player_count"], 4);
        assert_eq!(stopped["data"]["revenue"], receipt["amount_tnd"]);
        assert!(stopped["data"]["ticket"].as_str().unwrap().contains("Players: 4"));
    }

    #[tokio::test]
    async fn second_start_conflicts() {
        let h = harness().await;
        let uri = "/api/v1/venues/billiard/stations/1/start";
        assert_eq!(h.call("POST", uri, Some(json!({})), true).await.status(), StatusCode::OK);
        assert_eq!(h.call("POST", uri, Some(json!({})), true).await.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn stopping_idle_station_has_no_receipt() {
        let h = harness().await;
        let response = h.call("POST", "/api/v1/venues/billiard/stations/3/stop", None, true).await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert!(body["data"]["receipt"].is_null());
        assert!(body["data"]["ticket"].is_null());
    }

    #[tokio::test]
    async fn unknown_station_and_venue_are_not_found() {
        let h = harness().await;
        let station = h.call("POST", "/api/v1/venues/billiard/stations/99/start", Some(json!({})), true).await;
        assert_eq!(station.status(), StatusCode::NOT_FOUND);
        let venue = h.call("GET", "/api/v1/venues/bowling/ledger", None, true).await;
        assert_eq!(venue.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_player_count_is_bad_request() {
        let h = harness().await;
        let response = h
            .call("POST", "/api/v1/venues/game-room/stations/1/start", Some(json!({"player_count": 3})), true)
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reset_requires_confirmation() {
        let h = harness().await;
        h.call("POST", "/api/v1/venues/billiard/stations/1/start", Some(json!({})), true).await;

        let refused = h.call("POST", "/api/v1/venues/billiard/reset", Some(json!({"confirm": false})), true).await;
        assert_eq!(refused.status(), StatusCode::BAD_REQUEST);

        let reset = h.call("POST", "/api/v1/venues/billiard/reset", Some(json!({"confirm": true})), true).await;
        assert_eq!(reset.status(), StatusCode::OK);
        let body = json_body(reset).await;
        assert_eq!(body["data"]["ledger"]["running"], 0);
        assert_eq!(body["data"]["ledger"]["date"], "2024-03-10");
    }

    #[tokio::test]
    async fn quote_prices_without_touching_ledger() {
        let h = harness().await;
        let response = h
            .call("GET", "/api/v1/venues/billiard/quote?station=1&duration_ms=600000", None, true)
            .await;
        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["duration_ms"], 600_000);

        let board = json_body(h.call("GET", "/api/v1/venues/billiard/ledger", None, true).await).await;
        assert_eq!(board["data"]["running"], 0);
    }

    #[tokio::test]
    async fn lists_configured_venues() {
        let h = harness().await;
        let body = json_body(h.call("GET", "/api/v1/venues", None, true).await).await;
        let ids: Vec<&str> = body["data"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["billiard", "game-room"]);
    }
}
