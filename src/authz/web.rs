use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::{HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post, MethodRouter};
use axum::{Json, Router};
use sea_orm::DatabaseConnection;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::authz::engine::{self, Decision};
use crate::authz::errors::AuthzError;
use crate::authz::resolver::{DbPermissionResolver, PermissionResolver};
use crate::authz::types::{AuthorizationRequirement, Principal, RouteAuthorization, RouteMetadata};
use crate::errors::GatehouseError;
use crate::settings::Authz as AuthzSettings;
use crate::storage;

pub const SUBJECT_HEADER: &str = "x-principal-subject";
pub const ROLE_HEADER: &str = "x-principal-role";

#[derive(Clone)]
pub struct AppState {
    pub db: DatabaseConnection,
    pub resolver: Arc<dyn PermissionResolver>,
}

#[derive(Clone)]
struct GuardState {
    resolver: Arc<dyn PermissionResolver>,
    route: Arc<RouteAuthorization>,
}

/// Resolves route markers into [`RouteAuthorization`] values at registration
/// time and wraps handlers with the guard.
pub struct RouteRegistry {
    resolver: Arc<dyn PermissionResolver>,
    reject_dual_declarations: bool,
}

impl RouteRegistry {
    pub fn new(resolver: Arc<dyn PermissionResolver>, reject_dual_declarations: bool) -> Self {
        Self {
            resolver,
            reject_dual_declarations,
        }
    }

    /// Merge handler markers over class markers and resolve the result.
    pub fn authorization(
        &self,
        route: &str,
        handler: &RouteMetadata,
        class: &RouteMetadata,
    ) -> Result<RouteAuthorization, GatehouseError> {
        let merged = RouteMetadata::merge(handler, class);
        if merged.is_dual_declaration() {
            if self.reject_dual_declarations {
                return Err(GatehouseError::RouteAuthorization {
                    route: route.to_string(),
                    reason: "both any-of and all-of permission lists declared".to_string(),
                });
            }
            tracing::warn!(
                route,
                any_of = ?merged.any_of,
                all_of = ?merged.all_of,
                "Route declares any-of and all-of; only all-of will be enforced"
            );
        }
        Ok(RouteAuthorization::from_metadata(&merged))
    }

    /// Put `method_router` behind the authorization guard for `route`.
    pub fn guard<S>(
        &self,
        method_router: MethodRouter<S>,
        route: RouteAuthorization,
    ) -> MethodRouter<S>
    where
        S: Clone + Send + Sync + 'static,
    {
        let state = GuardState {
            resolver: self.resolver.clone(),
            route: Arc::new(route),
        };
        method_router.layer(middleware::from_fn_with_state(state, guard))
    }
}

async fn guard(State(state): State<GuardState>, request: Request, next: Next) -> Response {
    let principal = request.extensions().get::<Principal>().cloned();
    match engine::authorize(state.resolver.as_ref(), &state.route, principal.as_ref()).await {
        Ok(Decision::Allow) => next.run(request).await,
        Ok(Decision::Deny(denial)) => denial.into_response(),
        Err(e) => e.into_response(),
    }
}

/// Read the principal an upstream authenticating proxy forwarded in headers.
/// A missing or malformed subject yields no principal at all.
pub fn principal_from_headers(headers: &HeaderMap) -> Option<Principal> {
    let subject_id = headers
        .get(SUBJECT_HEADER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<i64>()
        .ok()?;
    let role = headers
        .get(ROLE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(|r| r.trim().to_string())
        .filter(|r| !r.is_empty());
    Some(Principal { subject_id, role })
}

async fn forwarded_principal(mut request: Request, next: Next) -> Response {
    if let Some(principal) = principal_from_headers(request.headers()) {
        request.extensions_mut().insert(principal);
    }
    next.run(request).await
}

pub fn router(db: DatabaseConnection, settings: &AuthzSettings) -> Result<Router, GatehouseError> {
    let resolver: Arc<dyn PermissionResolver> = Arc::new(DbPermissionResolver::new(db.clone()));
    let registry = RouteRegistry::new(resolver.clone(), settings.reject_dual_declarations);

    let roles_controller = RouteMetadata::all_of(["role:read"]);
    let decisions_controller = RouteMetadata::all_of(["permission:read"]);

    let health_route = registry.authorization(
        "/healthz",
        &RouteMetadata::public(),
        &RouteMetadata::default(),
    )?;
    let check_route = registry.authorization(
        "/v1/check",
        &RouteMetadata::default(),
        &decisions_controller,
    )?;
    let role_permissions_route = registry.authorization(
        "/v1/roles/{name}/permissions",
        &RouteMetadata::default(),
        &roles_controller,
    )?;

    let mut router = Router::new()
        .route("/healthz", registry.guard(get(health), health_route))
        .route("/v1/check", registry.guard(post(handle_check), check_route))
        .route(
            "/v1/roles/{name}/permissions",
            registry.guard(get(handle_role_permissions), role_permissions_route),
        )
        .with_state(AppState { db, resolver });

    if settings.trust_forwarded_principal {
        tracing::warn!("Trusting forwarded principal headers; run behind an authenticating proxy");
        router = router.layer(middleware::from_fn(forwarded_principal));
    }

    Ok(router)
}

#[derive(Debug, Deserialize)]
pub struct CheckRequest {
    #[serde(default)]
    pub principal: Option<Principal>,
    #[serde(default)]
    pub requirement: AuthorizationRequirement,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing: Option<Vec<String>>,
}

async fn handle_check(
    State(state): State<AppState>,
    Json(req): Json<CheckRequest>,
) -> Result<Json<CheckResponse>, AuthzError> {
    let route = RouteAuthorization::requiring(req.requirement);
    let decision =
        engine::authorize(state.resolver.as_ref(), &route, req.principal.as_ref()).await?;
    let response = match decision {
        Decision::Allow => CheckResponse {
            allowed: true,
            error: None,
            message: None,
            missing: None,
        },
        Decision::Deny(denial) => CheckResponse {
            allowed: false,
            error: Some(denial.reason_code()),
            message: Some(denial.to_string()),
            missing: denial.missing().map(<[String]>::to_vec),
        },
    };
    Ok(Json(response))
}

async fn handle_role_permissions(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Response {
    match storage::list_role_permissions(&state.db, &name).await {
        Ok(Some((role, permissions))) => Json(json!({
            "name": role.name,
            "display_name": role.display_name,
            "enabled": role.enabled(),
            "is_system": role.is_system == 1,
            "permissions": permissions.into_iter().map(|p| p.name).collect::<Vec<_>>(),
        }))
        .into_response(),
        Ok(None) => {
            let body = json!({
                "error": "not_found",
                "message": format!("role `{name}` not found"),
            });
            (StatusCode::NOT_FOUND, Json(body)).into_response()
        }
        Err(e) => AuthzError::Store(e).into_response(),
    }
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}
