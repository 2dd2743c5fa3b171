use axum::{routing::get, Router};
use moka::future::Cache;
use rust_kyc_api::api::handlers::{self, AppState};
use rust_kyc_api::circuit_breaker::create_notify_circuit_breaker;
use rust_kyc_api::config::Config;
use rust_kyc_api::db::open_store;
use rust_kyc_api::integrations::notify::{EmailNotifier, GuardedNotifier, Notifier, SmsNotifier};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for the application.
///
/// Initializes logging, configuration, the record store, notifiers and the
/// resubmission cache, then serves the HTTP API.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rust_kyc_api=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    let store = open_store(config.database_url.as_deref()).await;

    // Each channel gets its own breaker so a dead SMS gateway does not stop email.
    let notifiers: Vec<Arc<dyn Notifier>> = vec![
        Arc::new(GuardedNotifier::new(
            EmailNotifier::new(config.email.clone())?,
            create_notify_circuit_breaker(),
        )),
        Arc::new(GuardedNotifier::new(
            SmsNotifier::new(config.sms.clone())?,
            create_notify_circuit_breaker(),
        )),
    ];
    tracing::info!("Notifiers initialized (email, sms)");

    let recent_verifications = Cache::builder()
        .time_to_live(Duration::from_secs(config.verification_cache_ttl_secs))
        .max_capacity(10_000)
        .build();
    tracing::info!(
        "Verification cache initialized ({}s TTL, 10k capacity)",
        config.verification_cache_ttl_secs
    );

    let app_state = Arc::new(AppState {
        store,
        notifiers,
        recent_verifications,
    });

    // Configure rate limiter: 10 requests/second per IP, burst of 20
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(10)
            .burst_size(20)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    let protected_routes = handlers::api_routes().layer(
        ServiceBuilder::new()
            // Request size limit: 5MB max payload
            .layer(RequestBodyLimitLayer::new(5 * 1024 * 1024))
            .layer(GovernorLayer {
                config: governor_conf,
            }),
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(protected_routes)
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
