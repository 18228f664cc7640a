//! Schoolgate admin API server
//!
//! Run with: cargo run --features server --bin schoolgate-server
//!
//! The acting user id comes from the `x-actor-id` header; session handling
//! lives in front of this server.
//!
//! Endpoints (under /admin):
//!   GET    /users                     - List users (?search=&role=&status=)
//!   POST   /users                     - Create user
//!   GET    /users/:id                 - Show user
//!   PUT    /users/:id                 - Update user
//!   DELETE /users/:id                 - Delete user
//!   PATCH  /users/:id/toggle-status   - Activate/deactivate user
//!   GET    /roles                     - List roles (?search=&status=)
//!   POST   /roles                     - Create role
//!   GET    /roles/:id                 - Show role
//!   PUT    /roles/:id                 - Update role
//!   DELETE /roles/:id                 - Delete role
//!   PATCH  /roles/:id/toggle-status   - Activate/deactivate role
//!   GET    /permissions               - Permission catalog by module

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch},
    Json, Router,
};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use schoolgate::{
    bootstrap, AdminError, AdminService, Config, Gate, GateError, NewRole, NewUser, Permission, Role, RoleDetail,
    RoleFilter, RoleSummary, RoleUpdate, Store, UserDetail, UserFilter, UserSummary, UserUpdate,
};

type AppState = Arc<AdminService>;

// ============================================================================
// Responses
// ============================================================================

#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
    error: Option<String>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self { success: true, data: Some(data), error: None }
    }
}

impl ApiResponse<()> {
    fn err(msg: impl Into<String>) -> Self {
        Self { success: false, data: None, error: Some(msg.into()) }
    }
}

struct ApiError(StatusCode, String);

impl From<AdminError> for ApiError {
    fn from(e: AdminError) -> Self {
        let status = match &e {
            AdminError::Forbidden { .. } => StatusCode::FORBIDDEN,
            AdminError::Blocked(_) | AdminError::Invalid(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AdminError::Gate(GateError::Validation(_)) => StatusCode::UNPROCESSABLE_ENTITY,
            AdminError::Gate(GateError::NotFound { .. }) => StatusCode::NOT_FOUND,
            AdminError::Gate(GateError::Duplicate(_)) => StatusCode::CONFLICT,
            AdminError::Gate(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if e.is_fault() {
            tracing::error!(error = %e, "Admin action failed");
        }
        ApiError(status, e.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiResponse::err(self.1))).into_response()
    }
}

type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

fn actor(headers: &HeaderMap) -> Result<u64, ApiError> {
    headers
        .get("x-actor-id")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
        .ok_or_else(|| ApiError(StatusCode::UNAUTHORIZED, "missing or invalid x-actor-id header".into()))
}

// ============================================================================
// Users
// ============================================================================

async fn list_users(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<UserFilter>,
) -> ApiResult<Vec<UserSummary>> {
    Ok(Json(ApiResponse::ok(svc.list_users(actor(&headers)?, &filter)?)))
}

async fn create_user(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewUser>,
) -> Result<(StatusCode, Json<ApiResponse<UserDetail>>), ApiError> {
    let user = svc.create_user(actor(&headers)?, &req)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(user))))
}

async fn show_user(State(svc): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<UserDetail> {
    Ok(Json(ApiResponse::ok(svc.show_user(actor(&headers)?, id)?)))
}

async fn update_user(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<UserUpdate>,
) -> ApiResult<UserDetail> {
    Ok(Json(ApiResponse::ok(svc.update_user(actor(&headers)?, id, &req)?)))
}

async fn delete_user(State(svc): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<u64> {
    svc.delete_user(actor(&headers)?, id)?;
    Ok(Json(ApiResponse::ok(id)))
}

async fn toggle_user(State(svc): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<UserDetail> {
    Ok(Json(ApiResponse::ok(svc.toggle_user_status(actor(&headers)?, id)?)))
}

// ============================================================================
// Roles
// ============================================================================

async fn list_roles(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Query(filter): Query<RoleFilter>,
) -> ApiResult<Vec<RoleSummary>> {
    Ok(Json(ApiResponse::ok(svc.list_roles(actor(&headers)?, &filter)?)))
}

async fn create_role(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<NewRole>,
) -> Result<(StatusCode, Json<ApiResponse<Role>>), ApiError> {
    let role = svc.create_role(actor(&headers)?, &req)?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(role))))
}

async fn show_role(State(svc): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<RoleDetail> {
    Ok(Json(ApiResponse::ok(svc.show_role(actor(&headers)?, id)?)))
}

async fn update_role(
    State(svc): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<u64>,
    Json(req): Json<RoleUpdate>,
) -> ApiResult<Role> {
    Ok(Json(ApiResponse::ok(svc.update_role(actor(&headers)?, id, &req)?)))
}

async fn delete_role(State(svc): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<u64> {
    svc.delete_role(actor(&headers)?, id)?;
    Ok(Json(ApiResponse::ok(id)))
}

async fn toggle_role(State(svc): State<AppState>, headers: HeaderMap, Path(id): Path<u64>) -> ApiResult<Role> {
    Ok(Json(ApiResponse::ok(svc.toggle_role_status(actor(&headers)?, id)?)))
}

async fn permissions(
    State(svc): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<BTreeMap<String, Vec<Permission>>> {
    let registry = svc.permission_catalog(actor(&headers)?)?;
    Ok(Json(ApiResponse::ok(registry.list_all().clone())))
}

// ============================================================================
// Main
// ============================================================================

fn router(svc: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    let admin = Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/:id", get(show_user).put(update_user).delete(delete_user))
        .route("/users/:id/toggle-status", patch(toggle_user))
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:id", get(show_role).put(update_role).delete(delete_role))
        .route("/roles/:id/toggle-status", patch(toggle_role))
        .route("/permissions", get(permissions));

    Router::new()
        .nest("/admin", admin)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(svc)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let config = Config::from_env();
    schoolgate::init_logger(Some(&config.log_level));

    let store = Arc::new(Store::open_with(&config.data_dir, config.map_size_mb)?);
    let registry = bootstrap::seed_catalog(&store)?;

    match &config.admin_password_hash {
        Some(hash) if !bootstrap::is_bootstrapped(&store)? => {
            let admin = bootstrap::BootstrapAdmin {
                name: "Super Admin".to_string(),
                email: config.admin_email.clone(),
                password_hash: hash.clone(),
            };
            bootstrap::bootstrap(&store, &admin)?;
        }
        Some(_) => tracing::debug!("Already bootstrapped"),
        None => tracing::warn!("SCHOOLGATE_ADMIN_PASSWORD_HASH not set; no super admin created"),
    }

    let svc = Arc::new(AdminService::new(store, Gate::from_registry(&registry)));
    let app = router(svc);

    let addr = format!("0.0.0.0:{}", config.http_port);
    tracing::info!(%addr, "Schoolgate admin API listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
