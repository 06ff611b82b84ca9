use std::sync::Arc;

use crate::{config::Settings, payments::PaymentGateway, service::ServiceContext};

#[derive(Clone)]
pub struct AppState {
    pub service_context: Arc<ServiceContext>,
    /// Used by the webhook handler for signature verification; business
    /// calls go through the purchase service.
    pub gateway: Option<Arc<dyn PaymentGateway>>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        service_context: Arc<ServiceContext>,
        gateway: Option<Arc<dyn PaymentGateway>>,
        settings: Arc<Settings>,
    ) -> Self {
        Self {
            service_context,
            gateway,
            settings,
        }
    }
}
