use std::sync::Arc;
use std::time::Duration;

use sqlx::sqlite::SqlitePoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use matricula::{
    api,
    config::Settings,
    notifications::{email::EmailNotifier, webhook::WebhookNotifier, NotificationManager},
    payments::{PaymentGateway, StripeGateway},
    service::ServiceContext,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "matricula=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let settings = Settings::new().unwrap_or_else(|e| {
        tracing::warn!("Failed to load config: {}. Using defaults.", e);
        Settings::default()
    });

    tracing::info!(
        "Starting matricula server on {}:{}",
        settings.server.host,
        settings.server.port
    );

    // Initialize database
    let db_pool = SqlitePoolOptions::new()
        .max_connections(settings.database.max_connections)
        .connect(&settings.database.url)
        .await?;

    // Run migrations
    sqlx::migrate!("./migrations").run(&db_pool).await?;

    // Initialize notification channels
    let notifications = Arc::new(NotificationManager::new());
    if let Some(email) = EmailNotifier::new(settings.notifications.email.clone()) {
        notifications.register(Arc::new(email)).await;
    }
    if let Some(webhook) = WebhookNotifier::new(settings.notifications.webhook.clone()) {
        notifications.register(Arc::new(webhook)).await;
    }

    let health_results = notifications.health_check_all().await;
    for (name, result) in health_results {
        match result {
            Ok(_) => tracing::info!("Notification channel {} is healthy", name),
            Err(e) => tracing::warn!("Notification channel {} health check failed: {:?}", name, e),
        }
    }

    // Initialize payment gateway if configured
    let gateway: Option<Arc<dyn PaymentGateway>> = if settings.gateway.enabled {
        if let (Some(secret_key), Some(webhook_secret)) = (
            settings.gateway.secret_key.clone(),
            settings.gateway.webhook_secret.clone(),
        ) {
            tracing::info!("Payment gateway enabled");
            Some(Arc::new(StripeGateway::new(secret_key, webhook_secret)))
        } else {
            tracing::warn!("Gateway enabled but missing configuration");
            None
        }
    } else {
        tracing::info!("Payment gateway disabled; only the purchase-order path will work");
        None
    };

    // Create service context
    let service_context = Arc::new(ServiceContext::new(
        db_pool.clone(),
        gateway.clone(),
        notifications,
        Duration::from_secs(settings.gateway.timeout_seconds),
    ));

    let app = api::create_app(service_context, gateway, Arc::new(settings.clone()));

    let listener = tokio::net::TcpListener::bind(format!(
        "{}:{}",
        settings.server.host, settings.server.port
    ))
    .await?;

    tracing::info!(
        "Server listening on http://{}:{}",
        settings.server.host,
        settings.server.port
    );

    axum::serve(listener, app).await?;

    Ok(())
}
