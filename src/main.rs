use anyhow::Context;

use socialnet::{app, config::AppConfig, db, state::AppState, users::services::ensure_first_superuser};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "socialnet=debug,axum=info,tower_http=info,sqlx=warn".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env().context("load configuration")?;
    let pool = db::connect(&config.database).await?;
    db::migrate(&pool).await?;

    let (host, port) = (config.host.clone(), config.port);
    let state = AppState::from_pg(config, pool.clone())?;
    ensure_first_superuser(state.users.as_ref(), &state.config.first_superuser).await?;

    let served = app::serve(app::build_app(state), &host, port).await;
    pool.close().await;
    tracing::info!("database pool closed");
    served
}
