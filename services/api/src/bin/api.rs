//! services/api/src/bin/api.rs

use api_lib::{
    adapters::{CryptoGateway, DbAdapter, OpenAiChatAdapter, StripeGateway, YookassaGateway},
    config::Config,
    error::ApiError,
    web::{
        account_handler,
        auth::{login_handler, logout_handler, signup_handler},
        chat_stream_handler, checkout_handler, create_session_handler, current_session_handler,
        list_sessions_handler, middleware::require_auth, rest::ApiDoc, session_messages_handler,
        state::AppState, webhook_handler,
    },
};
use async_openai::{config::OpenAIConfig, Client};
use axum::{
    http::{
        header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use edem_core::emotion::{EmotionClassifier, MessageAnalyzer};
use edem_core::entitlement::QuotaPolicy;
use edem_core::language::LanguageDetector;
use edem_core::ports::BillingGateway;
use edem_core::prompt::PromptCatalog;
use edem_core::voice::VoiceCatalog;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;
use tower_http::cors::CorsLayer;

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
    db_adapter
        .run_migrations()
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    info!("Database migrations complete.");

    // --- 3. Initialize Service Adapters ---
    let openai_config = OpenAIConfig::new().with_api_key(
        config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| ApiError::Internal("OPENAI_API_KEY is required".to_string()))?,
    );
    let openai_client = Client::with_config(openai_config);
    let chat_adapter = Arc::new(OpenAiChatAdapter::new(
        openai_client,
        config.chat_model.clone(),
    ));

    let http_client = reqwest::Client::new();
    let payments: Vec<Arc<dyn BillingGateway>> = vec![
        Arc::new(StripeGateway::new(
            http_client.clone(),
            config.stripe_secret_key.clone(),
            config.stripe_webhook_secret.clone(),
            config.app_base_url.clone(),
        )),
        Arc::new(YookassaGateway::new(
            http_client.clone(),
            config.yookassa_shop_id.clone(),
            config.yookassa_secret_key.clone(),
            config.app_base_url.clone(),
        )),
        Arc::new(CryptoGateway::new(
            config.crypto_ipn_secret.clone(),
            config.crypto_gateway_url.clone(),
        )),
    ];

    // --- 4. Build the Shared AppState ---
    // Classifier tables and prompt catalogs are built once here and injected.
    let app_state = Arc::new(AppState {
        db: db_adapter,
        config: config.clone(),
        chat_model: chat_adapter,
        payments,
        language_detector: Arc::new(LanguageDetector::with_default_signals()),
        emotion_classifier: Arc::new(EmotionClassifier::with_default_rules()),
        message_analyzer: Arc::new(MessageAnalyzer::default()),
        voices: Arc::new(VoiceCatalog::with_default_profiles()),
        prompts: Arc::new(PromptCatalog::with_default_prompts()),
        quota: QuotaPolicy {
            free_message_allowance: config.free_message_allowance,
            paid_monthly_allowance: config.paid_monthly_allowance,
        },
    });

    let cors = CorsLayer::new()
        .allow_origin(config.app_base_url.parse::<HeaderValue>().map_err(|e| {
            ApiError::Internal(format!("Invalid APP_BASE_URL for CORS: {}", e))
        })?)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE, ACCEPT]);

    // --- 5. Create the Web Router ---
    // Public routes (no auth required; webhooks authenticate via signatures)
    let public_routes = Router::new()
        .route("/auth/signup", post(signup_handler))
        .route("/auth/login", post(login_handler))
        .route("/auth/logout", post(logout_handler))
        .route("/billing/{provider}/webhook", post(webhook_handler));

    // Protected routes (auth required)
    let protected_routes = Router::new()
        .route("/chat/stream", post(chat_stream_handler))
        .route("/sessions", post(create_session_handler).get(list_sessions_handler))
        .route("/sessions/current", post(current_session_handler))
        .route("/sessions/{id}/messages", get(session_messages_handler))
        .route("/account", get(account_handler))
        .route("/billing/{provider}/checkout", post(checkout_handler))
        .layer(axum_middleware::from_fn_with_state(
            app_state.clone(),
            require_auth,
        ));

    // Combine API routes
    let api_router = Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(cors)
        .with_state(app_state);

    // Merge the API router with the Swagger UI router for a complete application.
    let app = Router::new()
        .merge(api_router)
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
