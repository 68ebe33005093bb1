use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};
use tracing_appender::rolling::Rotation;
use vcs_webhook_gateway::logging::{FileLogger, setup_logging};
use vcs_webhook_gateway::{AppState, api, load_config};

const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8888";
const DEFAULT_CONFIG_PATH: &str = "gateway_config.toml";

fn log_rotation() -> Rotation {
    match std::env::var("LOG_ROTATION").as_deref() {
        Ok("minutely") => Rotation::MINUTELY,
        Ok("hourly") => Rotation::HOURLY,
        Ok("never") => Rotation::NEVER,
        _ => Rotation::DAILY,
    }
}

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let file_logger = std::env::var("LOG_DIR")
        .ok()
        .map(|dir| FileLogger::new(PathBuf::from(dir)).with_rotation(log_rotation()));
    let _log_guard = match setup_logging(file_logger.as_ref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to set up logging: {}", e);
            std::process::exit(1);
        }
    };

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let config_path = PathBuf::from(
        std::env::var("GATEWAY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string()),
    );

    let config = match load_config(&config_path) {
        Ok(cfg) => cfg,
        Err(e) => {
            error!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };

    for endpoint in &config.endpoint {
        if endpoint.has_valid_secret() {
            info!("Endpoint '{}' ({})", endpoint.name, endpoint.provider);
        } else {
            info!(
                "Endpoint '{}' ({}) has no secret, accepting unauthenticated deliveries",
                endpoint.name, endpoint.provider
            );
        }
    }

    let state = Arc::new(AppState::new(config, config_path.clone()));
    let app = api::router(state);

    info!("Listening on {}", bind_address);
    info!("Using config at {:?}", config_path);
    let listener = match tokio::net::TcpListener::bind(&bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind {}: {}", bind_address, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        error!("Server error: {}", e);
        std::process::exit(1);
    }
}
