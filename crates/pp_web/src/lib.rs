//! `pp_web` - HTTP API server for Procure Pulse
//!
//! This crate provides:
//! - axum-based HTTP server
//! - Cookie-session authentication endpoints
//! - Filter lookups for the dashboard dropdowns
//! - KPI summary and detail endpoints

use axum::{
    Router,
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use chrono::NaiveDate;
use http::HeaderValue;
use pp_auth::AuthKeys;
use pp_config::{PpConfig, WebConfig};
use pp_query::{Kpi, KpiEngine, ScopeFilters, resolve_scope, resolve_scope_for_user};
use pp_store::{PpStore, Role};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::warn;

pub mod auth;
pub use auth::CurrentUser;

/// Web server errors
#[derive(Error, Debug)]
pub enum WebError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Query error: {0}")]
    QueryError(#[from] pp_query::QueryError),

    #[error("Store error: {0}")]
    StoreError(pp_store::StoreError),
}

impl From<pp_store::StoreError> for WebError {
    fn from(err: pp_store::StoreError) -> Self {
        match err {
            pp_store::StoreError::Conflict(msg) => WebError::Conflict(msg),
            other => WebError::StoreError(other),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            WebError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            WebError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg.clone()),
            WebError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone()),
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            WebError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            WebError::ServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg.clone()),
            WebError::QueryError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            WebError::StoreError(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16()
        });

        (status, Json(body)).into_response()
    }
}

/// Shared application state
pub struct AppState {
    /// Database store
    pub store: PpStore,
    /// Session token keys
    pub auth: AuthKeys,
    /// Name of the session cookie
    pub cookie_name: String,
    /// Mark the session cookie Secure
    pub cookie_secure: bool,
    /// Maximum rows in a detail table
    pub detail_row_cap: usize,
    /// Server start time for uptime calculation
    pub start_time: Instant,
}

pub struct WebServer {
    state: Arc<AppState>,
    config: WebConfig,
}

impl WebServer {
    /// Build the server from configuration. A missing or short JWT secret is
    /// fatal here, before any request is served.
    ///
    /// # Errors
    ///
    /// Returns [`WebError::ServerError`] for auth misconfiguration.
    pub fn new(store: PpStore, config: &PpConfig) -> Result<Self, WebError> {
        let secret = config
            .require_jwt_secret()
            .map_err(|e| WebError::ServerError(e.to_string()))?;
        let keys = AuthKeys::from_secret(secret, config.auth.token_ttl_secs)
            .map_err(|e| WebError::ServerError(e.to_string()))?;

        let state = Arc::new(AppState {
            store,
            auth: keys,
            cookie_name: config.auth.cookie_name.clone(),
            cookie_secure: config.auth.cookie_secure,
            detail_row_cap: config.web.detail_row_cap,
            start_time: Instant::now(),
        });

        Ok(Self {
            state,
            config: config.web.clone(),
        })
    }

    #[must_use]
    pub fn router(&self) -> Router {
        let mut router = create_router(self.state.clone());
        if let Some(cors) = build_cors_layer(&self.config) {
            router = router.layer(cors);
        }
        router
    }

    /// Serve until interrupted
    ///
    /// # Errors
    ///
    /// Returns [`WebError::ServerError`] when binding or serving fails.
    pub async fn run(&self) -> Result<(), WebError> {
        let addr = format!("{}:{}", self.config.bind_address, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|err| WebError::ServerError(err.to_string()))?;
        tracing::info!(%addr, "Starting pp_web server");
        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|err| WebError::ServerError(err.to_string()))?;
        Ok(())
    }
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        tracing::info!("Shutdown signal received");
    }
}

fn build_cors_layer(config: &WebConfig) -> Option<CorsLayer> {
    if !config.cors_enabled {
        return None;
    }

    let layer = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .expose_headers(Any);

    if config
        .cors_origins
        .iter()
        .any(|origin| origin.trim() == "*")
    {
        return Some(layer.allow_origin(Any));
    }

    let mut origins = Vec::new();
    for origin in &config.cors_origins {
        match HeaderValue::from_str(origin) {
            Ok(value) => origins.push(value),
            Err(_) => warn!(origin = %origin, "Invalid CORS origin; skipping"),
        }
    }

    if origins.is_empty() {
        Some(layer.allow_origin(Any))
    } else {
        Some(layer.allow_origin(AllowOrigin::list(origins)))
    }
}

/// Create the router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        // Health
        .route("/api/health", get(health_handler))
        // Accounts and sessions
        .route("/api/auth/register", post(auth::register_handler))
        .route("/api/auth/login", post(auth::login_handler))
        .route("/api/auth/logout", post(auth::logout_handler))
        .route("/api/auth/me", get(auth::me_handler))
        // Dashboard filter dropdowns
        .route("/api/filters/teams", get(filter_teams_handler))
        .route("/api/filters/subteams", get(filter_sub_teams_handler))
        .route("/api/filters/personnel", get(filter_personnel_handler))
        .route("/api/filters/snapshots", get(filter_snapshots_handler))
        // KPIs
        .route("/api/kpis/summary", get(kpi_summary_handler))
        .route("/api/kpis/detail", get(kpi_detail_handler))
        // Admin
        .route("/api/admin/users", get(admin_users_handler))
        // Middleware
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// =============================================================================
// Health
// =============================================================================

/// Health check response
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

// =============================================================================
// Filter dropdowns
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubTeamFilterParams {
    team_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PersonnelFilterParams {
    sub_team_id: Option<String>,
}

async fn filter_teams_handler(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<serde_json::Value>, WebError> {
    let teams = state.store.list_teams()?;
    Ok(Json(serde_json::json!({ "teams": teams })))
}

async fn filter_sub_teams_handler(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(params): Query<SubTeamFilterParams>,
) -> Result<Json<serde_json::Value>, WebError> {
    let team_id = params
        .team_id
        .ok_or_else(|| WebError::BadRequest("teamId is required".to_string()))?;
    let sub_teams = state.store.list_sub_teams(&team_id)?;
    Ok(Json(serde_json::json!({ "subTeams": sub_teams })))
}

async fn filter_personnel_handler(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
    Query(params): Query<PersonnelFilterParams>,
) -> Result<Json<serde_json::Value>, WebError> {
    let sub_team_id = params
        .sub_team_id
        .ok_or_else(|| WebError::BadRequest("subTeamId is required".to_string()))?;
    let personnel = state.store.list_personnel(&sub_team_id)?;
    Ok(Json(serde_json::json!({ "personnel": personnel })))
}

/// "2024-01" displayed as "January 2024"; an unparseable month falls back to
/// the raw value.
fn snapshot_label(snapshot_month: &str) -> String {
    NaiveDate::parse_from_str(&format!("{snapshot_month}-01"), "%Y-%m-%d")
        .map(|date| date.format("%B %Y").to_string())
        .unwrap_or_else(|_| snapshot_month.to_string())
}

async fn filter_snapshots_handler(
    State(state): State<Arc<AppState>>,
    _user: CurrentUser,
) -> Result<Json<serde_json::Value>, WebError> {
    let snapshots: Vec<serde_json::Value> = state
        .store
        .list_snapshots()?
        .into_iter()
        .map(|month| {
            serde_json::json!({
                "value": month,
                "label": snapshot_label(&month),
            })
        })
        .collect();
    Ok(Json(serde_json::json!({ "snapshots": snapshots })))
}

// =============================================================================
// KPI endpoints
// =============================================================================

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryParams {
    team_id: Option<String>,
    sub_team_id: Option<String>,
    personnel_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DetailParams {
    kpi_name: Option<String>,
    team_id: Option<String>,
    sub_team_id: Option<String>,
    personnel_id: Option<String>,
    snapshot_month: Option<String>,
}

fn scope_filters(
    team_id: Option<String>,
    sub_team_id: Option<String>,
    personnel_id: Option<String>,
) -> ScopeFilters {
    ScopeFilters {
        team_id,
        sub_team_id,
        personnel_id,
    }
}

/// Resolve scope: explicit filters win; otherwise the caller's role decides.
fn resolve_request_scope(
    state: &AppState,
    user: &CurrentUser,
    filters: &ScopeFilters,
) -> Result<pp_query::ResolvedScope, WebError> {
    if filters.is_empty() {
        let account = state
            .store
            .user_by_id(user.0.user_id)?
            .ok_or_else(|| WebError::Unauthorized("Account no longer exists".to_string()))?;
        Ok(resolve_scope_for_user(&state.store, &account)?)
    } else {
        Ok(resolve_scope(&state.store, filters)?)
    }
}

async fn kpi_summary_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<SummaryParams>,
) -> Result<Json<pp_query::SummaryData>, WebError> {
    let snapshot = state
        .store
        .latest_snapshot()?
        .ok_or_else(|| WebError::NotFound("No snapshot data available".to_string()))?;

    let filters = scope_filters(params.team_id, params.sub_team_id, params.personnel_id);
    let scope = resolve_request_scope(&state, &user, &filters)?;

    let engine = KpiEngine::new(&state.store);
    let summary = engine.summary(&scope, &snapshot)?;
    Ok(Json(summary))
}

async fn kpi_detail_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
    Query(params): Query<DetailParams>,
) -> Result<Json<pp_query::DetailData>, WebError> {
    // Validate the KPI name before touching the store
    let kpi_name = params
        .kpi_name
        .ok_or_else(|| WebError::BadRequest("kpiName is required".to_string()))?;
    let kpi = Kpi::from_display_name(&kpi_name)
        .ok_or_else(|| WebError::BadRequest(format!("Unknown KPI: {kpi_name}")))?;

    let snapshot = match params.snapshot_month {
        Some(month) => month,
        None => state
            .store
            .latest_snapshot()?
            .ok_or_else(|| WebError::NotFound("No snapshot data available".to_string()))?,
    };

    let filters = scope_filters(params.team_id, params.sub_team_id, params.personnel_id);
    let scope = resolve_request_scope(&state, &user, &filters)?;

    let detail = pp_query::build_detail(&state.store, kpi, &scope, &snapshot, state.detail_row_cap)?;
    Ok(Json(detail))
}

// =============================================================================
// Admin
// =============================================================================

async fn admin_users_handler(
    State(state): State<Arc<AppState>>,
    user: CurrentUser,
) -> Result<Json<serde_json::Value>, WebError> {
    let role: Role = user
        .0
        .role
        .parse()
        .map_err(|_| WebError::Forbidden("Admin access required".to_string()))?;
    if role != Role::Admin {
        return Err(WebError::Forbidden("Admin access required".to_string()));
    }
    let users = state.store.list_users()?;
    Ok(Json(serde_json::json!({ "users": users })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, header};
    use http_body_util::BodyExt;
    use pp_store::schema::metrics;
    use pp_store::{ContractMetricRecord, NewUser, Personnel, SubTeam, Team};
    use tower::ServiceExt;

    const TEST_SECRET: &str = "0123456789abcdef0123456789abcdef";

    fn test_state() -> Arc<AppState> {
        Arc::new(AppState {
            store: PpStore::open_memory().unwrap(),
            auth: AuthKeys::from_secret(TEST_SECRET, 3600).unwrap(),
            cookie_name: "pp_token".to_string(),
            cookie_secure: false,
            detail_row_cap: 50,
            start_time: Instant::now(),
        })
    }

    fn seed_org(state: &AppState) {
        state
            .store
            .insert_teams(&[Team {
                team_id: "T001".into(),
                team_name: "Commercial".into(),
            }])
            .unwrap();
        state
            .store
            .insert_sub_teams(&[SubTeam {
                sub_team_id: "ST001".into(),
                sub_team_name: "Sourcing".into(),
                team_id: "T001".into(),
            }])
            .unwrap();
        state
            .store
            .insert_personnel(&[
                Personnel {
                    personnel_id: "P0001".into(),
                    personnel_name: "Alex Doe".into(),
                    email: None,
                    role: None,
                    sub_team_id: "ST001".into(),
                },
                Personnel {
                    personnel_id: "P0002".into(),
                    personnel_name: "Sam Roe".into(),
                    email: None,
                    role: None,
                    sub_team_id: "ST001".into(),
                },
            ])
            .unwrap();
        let records: Vec<ContractMetricRecord> = [("C001", "P0001", "1"), ("C002", "P0002", "0")]
            .iter()
            .map(|(contract, personnel, value)| ContractMetricRecord {
                contract_id: (*contract).to_string(),
                snapshot_month: "2024-01".into(),
                personnel_id: (*personnel).to_string(),
                supplier_id: None,
                metric_name: metrics::CO_KPI_ON_TIME.into(),
                value: Some((*value).to_string()),
                value_type: "boolean_flag".into(),
                target_date: None,
                actual_date: None,
                date_associated: None,
            })
            .collect();
        state.store.insert_contract_metrics(&records).unwrap();
    }

    /// Create an account and return a session cookie header for it
    fn auth_cookie(state: &AppState, role: Role, personnel_id: Option<&str>) -> String {
        let email = format!("{}@example.gov", role.as_str());
        let user = state
            .store
            .create_user(&NewUser {
                name: format!("{} account", role.as_str()),
                email,
                password_hash: "unused".to_string(),
                role,
                personnel_id: personnel_id.map(String::from),
            })
            .unwrap();
        let token = state
            .auth
            .sign_token(user.user_id, &user.email, &user.name, user.role.as_str())
            .unwrap();
        format!("pp_token={token}")
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn get(uri: &str, cookie: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder().uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let app = create_router(test_state());
        let response = app.oneshot(get("/api/health", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_summary_requires_authentication() {
        let state = test_state();
        seed_org(&state);
        let app = create_router(state);
        let response = app.oneshot(get("/api/kpis/summary", None)).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_summary_rejects_garbage_cookie() {
        let state = test_state();
        seed_org(&state);
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/kpis/summary", Some("pp_token=not-a-jwt")))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_summary_404_when_no_snapshots() {
        let state = test_state();
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/kpis/summary", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_summary_with_team_filter() {
        let state = test_state();
        seed_org(&state);
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/kpis/summary?teamId=T001", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["snapshotMonth"], "2024-01");
        assert_eq!(body["dataScope"]["level"], "Team");
        let co_kpi = body["kpis"]
            .as_array()
            .unwrap()
            .iter()
            .find(|k| k["name"] == "CO KPI On Time")
            .unwrap();
        assert_eq!(co_kpi["value"], 50.0);
        assert_eq!(co_kpi["status"], "Bad");
    }

    #[tokio::test]
    async fn test_role_scopes_differ_on_same_data() {
        let state = test_state();
        seed_org(&state);
        let admin_cookie = auth_cookie(&state, Role::Admin, None);
        let user_cookie = auth_cookie(&state, Role::User, Some("P0001"));
        let app = create_router(state);

        let admin_response = app
            .clone()
            .oneshot(get("/api/kpis/summary", Some(&admin_cookie)))
            .await
            .unwrap();
        let admin_body = body_json(admin_response).await;
        assert_eq!(admin_body["dataScope"]["level"], "Organization-Wide");

        let user_response = app
            .oneshot(get("/api/kpis/summary", Some(&user_cookie)))
            .await
            .unwrap();
        let user_body = body_json(user_response).await;
        assert_eq!(user_body["dataScope"]["level"], "Individual");

        // Same data, narrower scope: the individual sees only their own row
        let value_of = |body: &serde_json::Value| {
            body["kpis"]
                .as_array()
                .unwrap()
                .iter()
                .find(|k| k["name"] == "CO KPI On Time")
                .unwrap()["value"]
                .clone()
        };
        assert_eq!(value_of(&admin_body), 50.0);
        assert_eq!(value_of(&user_body), 100.0);
    }

    #[tokio::test]
    async fn test_detail_missing_kpi_name_is_400() {
        let state = test_state();
        seed_org(&state);
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/kpis/detail", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detail_unknown_kpi_name_is_400() {
        let state = test_state();
        // Deliberately no data: validation happens before any store access
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get(
                "/api/kpis/detail?kpiName=Not%20A%20Real%20KPI",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_detail_happy_path() {
        let state = test_state();
        seed_org(&state);
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get(
                "/api/kpis/detail?kpiName=CO%20KPI%20On%20Time",
                Some(&cookie),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["displayName"], "CO KPI On Time");
        assert_eq!(body["currentSnapshotMonth"], "2024-01");
        assert_eq!(body["currentValue"]["value"], 50.0);
        assert_eq!(body["detailTable"]["data"].as_array().unwrap().len(), 2);
        assert_eq!(body["trendData"]["labels"][0], "2024-01");
    }

    #[tokio::test]
    async fn test_admin_users_forbidden_for_non_admin() {
        let state = test_state();
        seed_org(&state);
        let cookie = auth_cookie(&state, Role::User, Some("P0001"));
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/admin/users", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_admin_users_allowed_for_admin() {
        let state = test_state();
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/admin/users", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["users"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_subteams_filter_requires_team_id() {
        let state = test_state();
        seed_org(&state);
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/filters/subteams", Some(&cookie)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_snapshots_filter_labels() {
        let state = test_state();
        seed_org(&state);
        let cookie = auth_cookie(&state, Role::Admin, None);
        let app = create_router(state);
        let response = app
            .oneshot(get("/api/filters/snapshots", Some(&cookie)))
            .await
            .unwrap();
        let body = body_json(response).await;
        assert_eq!(body["snapshots"][0]["value"], "2024-01");
        assert_eq!(body["snapshots"][0]["label"], "January 2024");
    }

    fn register_request(email: &str, personnel_id: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/auth/register")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({
                    "name": "Alex Doe",
                    "email": email,
                    "password": "hunter2hunter2",
                    "personnelId": personnel_id,
                })
                .to_string(),
            ))
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_then_login_sets_cookie() {
        let state = test_state();
        seed_org(&state);
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(register_request("alex@example.gov", "P0001"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let login = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({
                    "email": "alex@example.gov",
                    "password": "hunter2hunter2",
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.clone().oneshot(login).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(cookie.starts_with("pp_token="));
        assert!(cookie.contains("HttpOnly"));

        // Wrong password stays out
        let bad_login = Request::builder()
            .method("POST")
            .uri("/api/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                serde_json::json!({
                    "email": "alex@example.gov",
                    "password": "wrong-password",
                })
                .to_string(),
            ))
            .unwrap();
        let response = app.oneshot(bad_login).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_register_duplicate_email_is_conflict() {
        let state = test_state();
        seed_org(&state);
        let app = create_router(state);
        let first = app
            .clone()
            .oneshot(register_request("alex@example.gov", "P0001"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app
            .oneshot(register_request("alex@example.gov", "P0002"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_register_unknown_personnel_is_400() {
        let state = test_state();
        seed_org(&state);
        let app = create_router(state);
        let response = app
            .oneshot(register_request("alex@example.gov", "P9999"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_register_already_linked_personnel_is_conflict() {
        let state = test_state();
        seed_org(&state);
        let app = create_router(state);
        let first = app
            .clone()
            .oneshot(register_request("alex@example.gov", "P0001"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::CREATED);
        let second = app
            .oneshot(register_request("sam@example.gov", "P0001"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn test_snapshot_label_fallback() {
        assert_eq!(snapshot_label("2024-03"), "March 2024");
        assert_eq!(snapshot_label("garbage"), "garbage");
    }
}
