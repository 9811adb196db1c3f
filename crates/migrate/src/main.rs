use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tradeflow_migrate::config::RunnerConfig;
use tradeflow_migrate::store::PgMigrationStore;
use tradeflow_migrate::{MigrationRequest, Migrator};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // --- Tracing ---
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tradeflow_migrate=debug,tradeflow_db=info".into());
    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    // --- Configuration ---
    let config = RunnerConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        org_id = config.org_id,
        base_url = %config.client.base_url,
        dry_run = config.dry_run,
        "Loaded migration configuration"
    );

    // --- Database ---
    let pool = tradeflow_db::create_pool(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tradeflow_db::health_check(&pool)
        .await
        .context("Database health check failed")?;
    tradeflow_db::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;
    tracing::info!("Database ready");

    // --- Run ---
    let request = MigrationRequest {
        org_id: config.org_id,
        user_id: config.user_id,
        credential: config.api_key.clone(),
        base_url_override: None,
        dry_run: config.dry_run,
    };
    let migrator = Migrator::new(PgMigrationStore::new(pool), config.client.clone())
        .with_stale_after(config.stale_after);
    let result = migrator.run(&request).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if !result.success {
        std::process::exit(1);
    }
    Ok(())
}
