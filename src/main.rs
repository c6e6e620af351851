use std::sync::Arc;

use tracing_subscriber::EnvFilter;

mod bot;
mod config;
mod db;
mod http;
mod intro;
mod onboarding;
mod profile;
mod requests;
mod webapp;

use config::AppConfig;
use db::Database;
use onboarding::OnboardingSessions;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
}

/// The profile endpoint shares the store with the bot; losing it leaves the
/// bot running.
fn spawn_profile_endpoint(config: &AppConfig, db: Database) {
    let host = config.http_host.clone();
    let port = config.http_port;
    tokio::spawn(async move {
        if let Err(e) = http::serve(db, &host, port).await {
            tracing::error!("HTTP server stopped: {}", e);
        }
    });
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = AppConfig::from_env()?;
    tracing::info!("Config loaded. Admin: {}", config.admin_id);

    let db = Database::connect(&config.database_url).await?;
    db.run_migrations().await?;
    tracing::info!("🗄️ Database ready at {}", config.database_url);

    spawn_profile_endpoint(&config, db.clone());

    let state = Arc::new(bot::AppState {
        config,
        db,
        sessions: OnboardingSessions::new(),
    });
    bot::run(state).await;

    Ok(())
}
