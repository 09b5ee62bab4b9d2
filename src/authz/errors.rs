use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use miette::Diagnostic;
use serde_json::json;
use thiserror::Error;

use crate::authz::types::MatchMode;

/// Why a request was refused. Every variant renders as 403 and none of them
/// is a server fault.
#[derive(Debug, Clone, PartialEq, Eq, Error, Diagnostic)]
pub enum Denial {
    #[error("Authentication required")]
    #[diagnostic(
        code(gatehouse::authz::authentication_missing),
        help("No principal was attached to the request by the authentication layer")
    )]
    AuthenticationMissing,

    #[error("The authenticated principal carries no role")]
    #[diagnostic(code(gatehouse::authz::role_missing))]
    RoleMissing,

    #[error("Role `{role}` is disabled")]
    #[diagnostic(
        code(gatehouse::authz::role_disabled),
        help("A disabled role authorizes nothing until it is re-enabled")
    )]
    RoleDisabled { role: String },

    #[error("Permission denied: requires {mode} [{}]", .permissions.join(", "))]
    #[diagnostic(code(gatehouse::authz::permission_denied))]
    PermissionDenied {
        mode: MatchMode,
        /// For all-of, exactly the unmet subset. For any-of, the full list
        /// of alternatives.
        permissions: Vec<String>,
    },
}

impl Denial {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Denial::AuthenticationMissing => "authentication_missing",
            Denial::RoleMissing => "role_missing",
            Denial::RoleDisabled { .. } => "role_disabled",
            Denial::PermissionDenied { .. } => "permission_denied",
        }
    }

    pub fn missing(&self) -> Option<&[String]> {
        match self {
            Denial::PermissionDenied { permissions, .. } => Some(permissions),
            _ => None,
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        let mut body = json!({
            "error": self.reason_code(),
            "message": self.to_string(),
        });
        if let Some(missing) = self.missing() {
            body["missing"] = json!(missing);
        }
        body
    }
}

impl IntoResponse for Denial {
    fn into_response(self) -> Response {
        (StatusCode::FORBIDDEN, Json(self.to_json())).into_response()
    }
}

#[derive(Debug, Error, Diagnostic)]
pub enum AuthzError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Denied(#[from] Denial),

    #[error("Permission store error: {0}")]
    #[diagnostic(code(gatehouse::authz::store))]
    Store(#[from] sea_orm::DbErr),
}

impl IntoResponse for AuthzError {
    fn into_response(self) -> Response {
        match self {
            AuthzError::Denied(denial) => denial.into_response(),
            AuthzError::Store(e) => {
                tracing::error!(error = %e, "Permission lookup failed");
                let body = json!({
                    "error": "internal_error",
                    "message": "permission lookup failed",
                });
                (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
            }
        }
    }
}
