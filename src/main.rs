use manoa_compass::config::Config;
use manoa_compass::database::Database;
use manoa_compass::logger::init_logger;
use manoa_compass::router;
use manoa_compass::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::from_env()?;

    init_logger(config.log_level)?;

    let database = Database::new(&config.database_url);
    database.run_migrations()?;

    let addr = config.bind_addr;

    if config.cron_secret.is_none() {
        log::warn!("CRON_SECRET is not set; scheduler and worker calls will be rejected.");
    }

    let app = router::app(AppState::new(database, config));

    log::info!("🚀 Server running on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;

    Ok(())
}
