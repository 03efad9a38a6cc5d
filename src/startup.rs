use actix_web::dev::Server;
use actix_web::{middleware::Logger, web, App, HttpServer};
use sqlx::postgres::PgPoolOptions;
use std::net::TcpListener;
use std::sync::Arc;

use crate::auth::{SessionManager, TokenCodec};
use crate::configuration::{JwtSettings, Settings, StoreBackend};
use crate::error::StoreError;
use crate::middleware::{JwtMiddleware, LoggerMiddleware};
use crate::routes::{
    all_users, change_password, current_user, health_check, logged_in_users, login, logout,
    refresh, signup, update_profile,
};
use crate::store::{CredentialStore, InMemoryCredentialStore, PgCredentialStore};

/// Build the credential store selected in configuration
pub async fn build_store(settings: &Settings) -> Result<Arc<dyn CredentialStore>, StoreError> {
    match settings.store.backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory credential store; data is lost on restart");
            Ok(Arc::new(InMemoryCredentialStore::new()))
        }
        StoreBackend::Postgres => {
            let database = settings.database.as_ref().ok_or_else(|| {
                StoreError::Unavailable("store.backend is postgres but [database] is missing".to_string())
            })?;

            tracing::info!("Attempting to connect to database");
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(&database.connection_string())
                .await?;

            sqlx::migrate!("./migrations")
                .run(&pool)
                .await
                .map_err(|e| StoreError::Unavailable(format!("migration failed: {}", e)))?;

            tracing::info!("Database connection pool created successfully");
            Ok(Arc::new(PgCredentialStore::new(pool)))
        }
    }
}

pub fn run(
    listener: TcpListener,
    store: Arc<dyn CredentialStore>,
    jwt_config: JwtSettings,
) -> Result<Server, std::io::Error> {
    let sessions = web::Data::new(SessionManager::new(store, TokenCodec::new(&jwt_config)));

    let server = HttpServer::new(move || {
        App::new()
            // Global middleware
            .wrap(Logger::default())
            .wrap(LoggerMiddleware)
            .app_data(sessions.clone())
            // Public routes
            .route("/health_check", web::get().to(health_check))
            .service(
                web::scope("/auth")
                    .route("/signup", web::post().to(signup))
                    .route("/login", web::post().to(login))
                    .route("/refresh", web::post().to(refresh))
                    .route("/logout", web::post().to(logout))
                    .route("/change-password", web::post().to(change_password))
                    .route("/user/{user_id}", web::put().to(update_profile)),
            )
            // Protected routes (require a valid access token)
            .service(
                web::scope("/api")
                    .wrap(JwtMiddleware::new(sessions.clone()))
                    .route("/me", web::get().to(current_user))
                    .route("/auth-users", web::get().to(all_users))
                    .route("/auth-users/logged-in", web::get().to(logged_in_users)),
            )
    })
    .listen(listener)?
    .run();

    Ok(server)
}
