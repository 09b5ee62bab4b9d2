use clap::Parser;
use gatehouse::{authz, settings, storage, web};
use miette::Result;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(
    name = "gatehouse",
    version,
    about = "Role and permission authorization service"
)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    // logging
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(env_filter).init();

    let cli = Cli::parse();

    // load settings
    let settings = settings::Settings::load(&cli.config)?;
    tracing::info!(?settings, "Loaded configuration");

    // init storage (database) and bring the schema up to date
    let db = storage::init(&settings.database).await?;
    storage::migrate(&db).await?;

    // baseline roles and permissions; failures are logged, not fatal
    if settings.seed.enabled {
        authz::seed::bootstrap(&db).await;
    } else {
        tracing::info!("Authorization seed disabled by configuration");
    }

    web::serve(settings, db).await?;
    Ok(())
}
