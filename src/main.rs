use actix_web::{web, App, HttpServer};
use minichat_server::{configure_routes, cors_middleware, AdmissionControl, AppError, AppState, Settings};
use dotenv::dotenv;
use std::net::TcpListener;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[actix_web::main]
async fn main() -> minichat_server::Result<()> {
    // Load environment variables
    dotenv().ok();

    // Initialize logging
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .init();

    // Load configuration
    let config = Settings::new()?;
    info!("Configuration loaded successfully ({})", config.environment);

    info!("Starting server at {}:{}", config.server.host, config.server.port);

    // Initialize application state
    let state = AppState::new(config.clone()).await?;
    let limiter = state.rate_limiter.clone();
    let state = web::Data::new(state);

    // Periodically forget clients whose windows have emptied
    let sweep_limiter = limiter.clone();
    let sweep_interval = Duration::from_secs(config.rate_limit.sweep_interval_seconds.max(1));
    tokio::spawn(async move {
        loop {
            tokio::time::sleep(sweep_interval).await;
            let removed = sweep_limiter.cleanup(chrono::Utc::now()).await;
            if removed > 0 {
                debug!("Dropped {} idle rate limit windows", removed);
            }
        }
    });

    // Create and bind TCP listener
    let listener = TcpListener::bind(format!("{}:{}", config.server.host, config.server.port))?;

    let cors_settings = config.cors.clone();
    let workers = config.server.workers as usize;

    // Start HTTP server
    HttpServer::new(move || {
        // CORS is outermost so preflights skip admission and 429s carry CORS headers
        App::new()
            .wrap(AdmissionControl::new(limiter.clone()))
            .wrap(cors_middleware(&cors_settings))
            .app_data(state.clone())
            .configure(configure_routes)
    })
    .listen(listener)?
    .workers(workers)
    .run()
    .await
    .map_err(|e| AppError::InternalError(e.to_string()))?;

    Ok(())
}
