use async_trait::async_trait;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};

use crate::{
    config::EmailConfig,
    error::{AppError, Result},
    notifications::{NotificationEvent, Notifier},
};

/// SMTP channel. Student-facing address lookup lives in the (external) user
/// module, so everything here goes to the configured operator address;
/// per-event routing is the operator's mail rules' problem.
pub struct EmailNotifier {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    config: EmailConfig,
}

impl EmailNotifier {
    pub fn new(config: Option<EmailConfig>) -> Option<Self> {
        config.and_then(|cfg| {
            if !cfg.enabled {
                return None;
            }
            let creds =
                Credentials::new(cfg.smtp_username.clone(), cfg.smtp_password.clone());
            let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&cfg.smtp_host)
                .ok()?
                .credentials(creds)
                .build();
            Some(Self { mailer, config: cfg })
        })
    }

    fn subject_and_body(event: &NotificationEvent) -> (String, String) {
        match event {
            NotificationEvent::PaymentSucceeded { payment } => (
                "Payment received".to_string(),
                format!(
                    "Payment {} for course {} settled: {} {}",
                    payment.id, payment.course_id, payment.amount_cents, payment.currency
                ),
            ),
            NotificationEvent::PaymentFailed { payment } => (
                "Payment failed".to_string(),
                format!(
                    "Payment {} for course {} failed: {}",
                    payment.id,
                    payment.course_id,
                    payment.failure_reason.as_deref().unwrap_or("unknown reason")
                ),
            ),
            NotificationEvent::PaymentRefunded { payment } => (
                "Payment refunded".to_string(),
                format!(
                    "Payment {} refunded: {} {}",
                    payment.id,
                    payment.refunded_amount_cents.unwrap_or(payment.amount_cents),
                    payment.currency
                ),
            ),
            NotificationEvent::EnrollmentCreated { enrollment } => (
                "New enrollment".to_string(),
                format!(
                    "User {} enrolled in course {}",
                    enrollment.user_id, enrollment.course_id
                ),
            ),
            NotificationEvent::PurchaseOrderSubmitted { order } => (
                format!("Purchase order {} awaiting review", order.po_number),
                format!(
                    "Student {} submitted {} for course {}",
                    order.student_id, order.po_number, order.course_id
                ),
            ),
            NotificationEvent::PurchaseOrderDecided { order } => (
                format!("Purchase order {} decided", order.po_number),
                format!("{} is now {:?}", order.po_number, order.status),
            ),
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    fn name(&self) -> &str {
        "email"
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    async fn health_check(&self) -> Result<()> {
        let ok = self
            .mailer
            .test_connection()
            .await
            .map_err(|e| AppError::Notification(format!("SMTP connection failed: {}", e)))?;
        if !ok {
            return Err(AppError::Notification("SMTP connection refused".to_string()));
        }
        Ok(())
    }

    async fn notify(&self, event: &NotificationEvent) -> Result<()> {
        let (subject, body) = Self::subject_and_body(event);

        let message = Message::builder()
            .from(
                self.config
                    .from_address
                    .parse()
                    .map_err(|e| AppError::Notification(format!("Bad from address: {}", e)))?,
            )
            .to(self
                .config
                .operator_address
                .parse()
                .map_err(|e| AppError::Notification(format!("Bad operator address: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| AppError::Notification(format!("Failed to build email: {}", e)))?;

        self.mailer
            .send(message)
            .await
            .map_err(|e| AppError::Notification(format!("SMTP send failed: {}", e)))?;

        Ok(())
    }
}
