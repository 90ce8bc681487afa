use std::{env, sync::Arc};
use trade_buddy::{
    bot::{blob_store::FsBlobStore, discord},
    config::{app, database},
    core::notice,
    errors::{Error, Result},
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // 1. Initialize tracing (as early as possible)
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // 2. Load .env file; env vars can also be set externally
    dotenvy::dotenv().ok();

    // 3. Application settings
    let config = Arc::new(app::load_app_config()?);
    info!("Loaded application configuration");

    // 4. Image store (also creates the data directory for the default ledger path)
    let blobs = Arc::new(
        FsBlobStore::open(&config.image_dir)
            .await
            .inspect_err(|e| error!("Failed to open image store: {e}"))?,
    );

    // 5. Ledger
    let db = database::create_connection()
        .await
        .inspect_err(|e| error!("Failed to connect to database: {e}"))?;
    database::create_tables(&db).await?;
    info!("Database initialized successfully.");

    // 6. Seed the price list on first run
    if let Some(price_list) = &config.price_list {
        if notice::seed_price_list(&db, price_list).await? {
            info!("Seeded price list from configuration");
        }
    }

    // 7. Run the bot; the token is read right before use
    let token = env::var("DISCORD_BOT_TOKEN")
        .inspect_err(|e| error!("DISCORD_BOT_TOKEN not found: {e}"))
        .map_err(Error::EnvVar)?;

    discord::run_bot(token, db, blobs, config).await
}
