pub mod enrollment_service;
pub mod purchase_order_service;
pub mod purchase_service;
pub mod schedule_service;

use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;

use crate::notifications::NotificationManager;
use crate::payments::PaymentGateway;
use crate::repository::*;

pub use enrollment_service::EnrollmentService;
pub use purchase_order_service::{
    DecideRequest, DecisionResult, PurchaseOrderService, SubmitPurchaseOrder,
};
pub use purchase_service::{
    ConfirmationResult, InitiatePurchase, InitiatedPurchase, PurchaseService, RefundRequest,
};
pub use schedule_service::ScheduleService;

pub struct ServiceContext {
    pub payment_repo: Arc<dyn PaymentRepository>,
    pub enrollment_repo: Arc<dyn EnrollmentRepository>,
    pub booking_repo: Arc<dyn BookingRepository>,
    pub course_repo: Arc<dyn CourseRepository>,
    pub purchase_order_repo: Arc<dyn PurchaseOrderRepository>,
    pub schedule_repo: Arc<dyn ScheduleRepository>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub schedule_service: Arc<ScheduleService>,
    pub purchase_service: Arc<PurchaseService>,
    pub purchase_order_service: Arc<PurchaseOrderService>,
    pub notifications: Arc<NotificationManager>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        db_pool: SqlitePool,
        gateway: Option<Arc<dyn PaymentGateway>>,
        notifications: Arc<NotificationManager>,
        gateway_timeout: Duration,
    ) -> Self {
        let payment_repo: Arc<dyn PaymentRepository> =
            Arc::new(SqlitePaymentRepository::new(db_pool.clone()));
        let enrollment_repo: Arc<dyn EnrollmentRepository> =
            Arc::new(SqliteEnrollmentRepository::new(db_pool.clone()));
        let booking_repo: Arc<dyn BookingRepository> =
            Arc::new(SqliteBookingRepository::new(db_pool.clone()));
        let course_repo: Arc<dyn CourseRepository> =
            Arc::new(SqliteCourseRepository::new(db_pool.clone()));
        let purchase_order_repo: Arc<dyn PurchaseOrderRepository> =
            Arc::new(SqlitePurchaseOrderRepository::new(db_pool.clone()));
        let schedule_repo: Arc<dyn ScheduleRepository> =
            Arc::new(SqliteScheduleRepository::new(db_pool.clone()));

        let enrollment_service = Arc::new(EnrollmentService::new(
            enrollment_repo.clone(),
            notifications.clone(),
        ));
        let schedule_service = Arc::new(ScheduleService::new(schedule_repo.clone()));

        let purchase_service = Arc::new(PurchaseService::new(
            payment_repo.clone(),
            booking_repo.clone(),
            course_repo.clone(),
            enrollment_service.clone(),
            schedule_service.clone(),
            gateway,
            notifications.clone(),
            gateway_timeout,
        ));

        let purchase_order_service = Arc::new(PurchaseOrderService::new(
            purchase_order_repo.clone(),
            booking_repo.clone(),
            course_repo.clone(),
            purchase_service.clone(),
            notifications.clone(),
        ));

        Self {
            payment_repo,
            enrollment_repo,
            booking_repo,
            course_repo,
            purchase_order_repo,
            schedule_repo,
            enrollment_service,
            schedule_service,
            purchase_service,
            purchase_order_service,
            notifications,
            db_pool,
        }
    }
}
