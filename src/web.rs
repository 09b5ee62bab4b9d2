use crate::authz;
use crate::settings::Settings;
use miette::IntoDiagnostic;
use sea_orm::DatabaseConnection;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;

pub async fn serve(settings: Settings, db: DatabaseConnection) -> miette::Result<()> {
    let router = authz::web::router(db, &settings.authz)?.layer(TraceLayer::new_for_http());

    let addr: SocketAddr = settings
        .listen_addr()
        .parse()
        .map_err(|e| miette::miette!("bad listen addr: {e}"))?;

    tracing::info!(%addr, "Authorization API listening");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .into_diagnostic()?;
    axum::serve(listener, router).await.into_diagnostic()?;
    Ok(())
}
