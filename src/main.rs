use std::net::TcpListener;

use blog_auth::configuration::get_configuration;
use blog_auth::startup::{build_store, run};
use blog_auth::telemetry::init_telemetry;

#[tokio::main]
async fn main() -> std::io::Result<()> {
    init_telemetry();

    tracing::info!("Starting application");

    let configuration = match get_configuration() {
        Ok(config) => {
            tracing::info!("Configuration loaded successfully");
            config
        }
        Err(e) => {
            tracing::error!("Failed to read configuration: {}", e);
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "Configuration error",
            ));
        }
    };

    if let Err(e) = configuration.jwt.validate() {
        tracing::error!("Invalid JWT configuration: {}", e);
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Configuration error",
        ));
    }

    if configuration.jwt.uses_development_secrets() {
        tracing::warn!("Development JWT secrets in use; set APP_JWT__ACCESS_SECRET and APP_JWT__REFRESH_SECRET before deploying");
    }

    let store = build_store(&configuration).await.map_err(|e| {
        tracing::error!("Failed to initialise credential store: {}", e);
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "Credential store error")
    })?;

    let address = format!(
        "{}:{}",
        configuration.application.host, configuration.application.port
    );
    let listener = TcpListener::bind(&address)?;
    tracing::info!("Server listening on: {}", address);

    run(listener, store, configuration.jwt.clone())?.await
}
