use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum GatehouseError {
    #[error("Database error: {0}")]
    #[diagnostic(code(gatehouse::db))]
    Db(#[from] sea_orm::DbErr),

    #[error("Invalid route authorization for `{route}`: {reason}")]
    #[diagnostic(
        code(gatehouse::route_authorization),
        help("Declare either an any-of or an all-of permission list on a route, not both")
    )]
    RouteAuthorization { route: String, reason: String },
}
