pub mod handlers;
pub mod state;

use axum::{
    routing::{get, patch, post},
    Router,
};
use std::sync::Arc;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::{config::Settings, payments::PaymentGateway, service::ServiceContext};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    gateway: Option<Arc<dyn PaymentGateway>>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, gateway, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))
        // API routes
        .nest("/api", api_routes())
        // Operator routes
        .nest("/admin", admin_routes())
        // Add state to the router
        .with_state(app_state)
        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive()) // Configure properly for production
        .layer(TraceLayer::new_for_http())
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/purchases", purchase_routes())
        .nest("/purchase-orders", purchase_order_routes())
}

fn purchase_routes() -> Router<AppState> {
    Router::new()
        // Gateway callback endpoint (signature-verified, not authenticated)
        .route("/webhook/gateway", post(handlers::purchases::gateway_webhook))
        .route("/", post(handlers::purchases::create))
        .route("/:id", get(handlers::purchases::get))
        .route("/:id/confirm", post(handlers::purchases::confirm))
        .route("/:id/refund", post(handlers::purchases::refund))
        .route("/:id/repair", post(handlers::purchases::repair))
        .route("/:id/sync", post(handlers::purchases::sync))
        .route("/user/:user_id", get(handlers::purchases::list_by_user))
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route("/", post(handlers::purchase_orders::create))
        .route("/", get(handlers::purchase_orders::list_pending))
        .route("/:id", get(handlers::purchase_orders::get))
        .route("/:id", patch(handlers::purchase_orders::decide))
}

fn admin_routes() -> Router<AppState> {
    Router::new().route("/reconcile", post(handlers::purchases::reconcile))
}
