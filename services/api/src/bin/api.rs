//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{ConsoleMailAdapter, DbAdapter, SignerAdapter, SmtpMailAdapter},
    config::{Config, MailBackend},
    error::ApiError,
    web::{api_router, state::AppState, ApiDoc},
};
use axum::extract::DefaultBodyLimit;
use axum::http::{
    header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    HeaderValue, Method,
};
use axum::Router;
use critique_core::ports::MailService;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[tokio::main]
async fn main() -> Result<(), ApiError> {
    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    info!("Configuration loaded. Starting server...");

    // --- 2. Connect to Database & Run Migrations ---
    info!("Connecting to database...");
    let db_pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await?;
    let db_adapter = Arc::new(DbAdapter::new(db_pool.clone()));
    info!("Running database migrations...");
    db_adapter.run_migrations().await?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let mail: Arc<dyn MailService> = match config.mail_backend {
        MailBackend::Smtp => {
            let host = config.smtp_host.as_deref().ok_or_else(|| {
                ApiError::Internal("SMTP_HOST is required for the smtp mail backend".to_string())
            })?;
            let transport = SmtpMailAdapter::new(
                host,
                config.smtp_port,
                config.smtp_username.as_deref(),
                config.smtp_password.as_deref(),
                &config.admin_email,
            )
            .map_err(|e| ApiError::Internal(format!("SMTP transport setup failed: {}", e)))?;
            info!("Mail backend: smtp relay at {}", host);
            Arc::new(transport)
        }
        MailBackend::Console => {
            info!("Mail backend: console (codes are logged, not delivered)");
            Arc::new(ConsoleMailAdapter)
        }
    };

    let tokens = Arc::new(SignerAdapter::new(
        &config.secret_key,
        config.access_token_ttl_hours,
        config.confirmation_ttl_secs,
    ));

    // --- 4. Build the Shared AppState ---
    let app_state = Arc::new(AppState {
        db: db_adapter,
        mail,
        tokens,
        config: config.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin("http://localhost:3000".parse::<HeaderValue>().unwrap())
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // The versioned API routes, then the Swagger UI on top.
    let app = Router::new()
        .merge(
            api_router(app_state)
                .layer(cors)
                .layer(DefaultBodyLimit::max(1024 * 1024)),
        )
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()));

    // --- 6. Start the Server ---
    info!("Starting server on {}", config.bind_address);
    info!(
        "Swagger UI available at http://{}/swagger-ui",
        config.bind_address
    );
    let listener = tokio::net::TcpListener::bind(&config.bind_address).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
