#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;
use uuid::Uuid;

use matricula::{
    domain::{Booking, BookingStatus, ClassSchedule, Course, CourseSession, TimeBlock},
    error::{AppError, Result},
    notifications::NotificationManager,
    payments::{GatewayEvent, GatewayIntent, IntentStatus, PaymentGateway},
    repository::{
        BookingRepository, CourseRepository, EnrollmentRepository, PaymentRepository,
        PurchaseOrderRepository, ScheduleRepository, SqliteBookingRepository,
        SqliteCourseRepository, SqliteEnrollmentRepository, SqlitePaymentRepository,
        SqlitePurchaseOrderRepository, SqliteScheduleRepository,
    },
    service::{EnrollmentService, PurchaseOrderService, PurchaseService, ScheduleService},
};

pub const TEST_SIGNATURE: &str = "test-signature";

/// In-memory stand-in for the payment gateway: records intents and
/// refunds, and lets tests flip intent status or fail intent creation.
pub struct FakeGateway {
    intents: Mutex<HashMap<String, IntentStatus>>,
    pub refunds: Mutex<Vec<(String, Option<i64>)>>,
    fail_create: Mutex<bool>,
    counter: Mutex<u64>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self {
            intents: Mutex::new(HashMap::new()),
            refunds: Mutex::new(Vec::new()),
            fail_create: Mutex::new(false),
            counter: Mutex::new(0),
        }
    }

    pub fn fail_next_create(&self) {
        *self.fail_create.lock().unwrap() = true;
    }

    pub fn set_status(&self, intent_id: &str, status: IntentStatus) {
        self.intents.lock().unwrap().insert(intent_id.to_string(), status);
    }

    pub fn refund_count(&self) -> usize {
        self.refunds.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    async fn create_intent(
        &self,
        _amount_minor_units: i64,
        _currency: &str,
        _metadata: HashMap<String, String>,
    ) -> Result<GatewayIntent> {
        if std::mem::take(&mut *self.fail_create.lock().unwrap()) {
            return Err(AppError::Gateway("card declined".to_string()));
        }
        let mut counter = self.counter.lock().unwrap();
        *counter += 1;
        let intent_id = format!("pi_test_{}", *counter);
        self.intents
            .lock()
            .unwrap()
            .insert(intent_id.clone(), IntentStatus::Pending);
        Ok(GatewayIntent {
            client_secret: Some(format!("cs_test_{}", *counter)),
            intent_id,
        })
    }

    async fn get_intent_status(&self, intent_id: &str) -> Result<IntentStatus> {
        self.intents
            .lock()
            .unwrap()
            .get(intent_id)
            .copied()
            .ok_or_else(|| AppError::Gateway("unknown intent".to_string()))
    }

    async fn create_refund(
        &self,
        intent_id: &str,
        amount_minor_units: Option<i64>,
    ) -> Result<String> {
        self.refunds
            .lock()
            .unwrap()
            .push((intent_id.to_string(), amount_minor_units));
        Ok(format!("re_test_{}", intent_id))
    }

    fn verify_callback(&self, payload: &str, signature: &str) -> Result<GatewayEvent> {
        if signature != TEST_SIGNATURE {
            return Err(AppError::BadRequest("Invalid webhook signature".to_string()));
        }
        let value: serde_json::Value = serde_json::from_str(payload)
            .map_err(|e| AppError::BadRequest(format!("Bad payload: {}", e)))?;
        let intent_id = value["intent_id"].as_str().unwrap_or_default().to_string();
        Ok(match value["type"].as_str() {
            Some("payment_intent.succeeded") => GatewayEvent::IntentSucceeded { intent_id },
            Some("payment_intent.payment_failed") => GatewayEvent::IntentFailed {
                intent_id,
                reason: "card declined".to_string(),
            },
            Some("payment_intent.canceled") => GatewayEvent::IntentCanceled { intent_id },
            _ => GatewayEvent::Ignored,
        })
    }
}

/// Wraps the real schedule repository and refuses lookups for chosen
/// sessions, simulating a partially unavailable schedule store.
pub struct FlakyScheduleRepository {
    inner: SqliteScheduleRepository,
    failing_sessions: Mutex<HashSet<String>>,
}

impl FlakyScheduleRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            inner: SqliteScheduleRepository::new(pool),
            failing_sessions: Mutex::new(HashSet::new()),
        }
    }

    pub fn fail_session(&self, session_id: &str) {
        self.failing_sessions
            .lock()
            .unwrap()
            .insert(session_id.to_string());
    }

    pub fn heal(&self) {
        self.failing_sessions.lock().unwrap().clear();
    }

    fn check(&self, session_id: &str) -> Result<()> {
        if self.failing_sessions.lock().unwrap().contains(session_id) {
            return Err(AppError::Database("schedule store unavailable".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl ScheduleRepository for FlakyScheduleRepository {
    async fn create(&self, schedule: ClassSchedule) -> Result<ClassSchedule> {
        self.check(&schedule.session_id)?;
        self.inner.create(schedule).await
    }

    async fn find(&self, course_id: Uuid, session_id: &str) -> Result<Option<ClassSchedule>> {
        self.check(session_id)?;
        self.inner.find(course_id, session_id).await
    }

    async fn add_student(&self, schedule_id: Uuid, student_id: Uuid) -> Result<()> {
        self.inner.add_student(schedule_id, student_id).await
    }

    async fn is_scheduled(
        &self,
        course_id: Uuid,
        session_id: &str,
        student_id: Uuid,
    ) -> Result<bool> {
        self.inner.is_scheduled(course_id, session_id, student_id).await
    }

    async fn set_slot_delivered(
        &self,
        course_id: Uuid,
        session_id: &str,
        slot_index: usize,
    ) -> Result<ClassSchedule> {
        self.inner
            .set_slot_delivered(course_id, session_id, slot_index)
            .await
    }
}

pub struct TestEnv {
    pub pool: SqlitePool,
    pub payments: Arc<dyn PaymentRepository>,
    pub enrollments: Arc<dyn EnrollmentRepository>,
    pub bookings: Arc<dyn BookingRepository>,
    pub courses: Arc<dyn CourseRepository>,
    pub orders: Arc<dyn PurchaseOrderRepository>,
    pub schedules: Arc<dyn ScheduleRepository>,
    pub gateway: Arc<FakeGateway>,
    pub enrollment_service: Arc<EnrollmentService>,
    pub schedule_service: Arc<ScheduleService>,
    pub purchase_service: Arc<PurchaseService>,
    pub purchase_order_service: Arc<PurchaseOrderService>,
}

pub async fn make_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePool::connect(":memory:").await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub async fn setup() -> anyhow::Result<TestEnv> {
    let pool = make_pool().await?;
    let schedules: Arc<dyn ScheduleRepository> =
        Arc::new(SqliteScheduleRepository::new(pool.clone()));
    Ok(build_env(pool, schedules))
}

/// Same wiring, but with a caller-supplied schedule repository (used to
/// inject failures).
pub fn build_env(pool: SqlitePool, schedules: Arc<dyn ScheduleRepository>) -> TestEnv {
    let payments: Arc<dyn PaymentRepository> =
        Arc::new(SqlitePaymentRepository::new(pool.clone()));
    let enrollments: Arc<dyn EnrollmentRepository> =
        Arc::new(SqliteEnrollmentRepository::new(pool.clone()));
    let bookings: Arc<dyn BookingRepository> =
        Arc::new(SqliteBookingRepository::new(pool.clone()));
    let courses: Arc<dyn CourseRepository> = Arc::new(SqliteCourseRepository::new(pool.clone()));
    let orders: Arc<dyn PurchaseOrderRepository> =
        Arc::new(SqlitePurchaseOrderRepository::new(pool.clone()));

    let notifications = Arc::new(NotificationManager::new());
    let gateway = Arc::new(FakeGateway::new());

    let enrollment_service = Arc::new(EnrollmentService::new(
        enrollments.clone(),
        notifications.clone(),
    ));
    let schedule_service = Arc::new(ScheduleService::new(schedules.clone()));
    let purchase_service = Arc::new(PurchaseService::new(
        payments.clone(),
        bookings.clone(),
        courses.clone(),
        enrollment_service.clone(),
        schedule_service.clone(),
        Some(gateway.clone() as Arc<dyn PaymentGateway>),
        notifications.clone(),
        std::time::Duration::from_secs(5),
    ));
    let purchase_order_service = Arc::new(PurchaseOrderService::new(
        orders.clone(),
        bookings.clone(),
        courses.clone(),
        purchase_service.clone(),
        notifications,
    ));

    TestEnv {
        pool,
        payments,
        enrollments,
        bookings,
        courses,
        orders,
        schedules,
        gateway,
        enrollment_service,
        schedule_service,
        purchase_service,
        purchase_order_service,
    }
}

/// A course with `session_count` sessions of two time blocks each.
pub async fn make_course(
    courses: &Arc<dyn CourseRepository>,
    price_cents: i64,
    session_count: usize,
) -> anyhow::Result<Course> {
    let sessions = (0..session_count)
        .map(|i| {
            let start = Utc::now() + Duration::days((i + 1) as i64);
            CourseSession {
                session_id: format!("s{}", i + 1),
                name: format!("Session {}", i + 1),
                time_blocks: vec![
                    TimeBlock {
                        starts_at: start,
                        ends_at: start + Duration::hours(2),
                    },
                    TimeBlock {
                        starts_at: start + Duration::days(1),
                        ends_at: start + Duration::days(1) + Duration::hours(2),
                    },
                ],
            }
        })
        .collect();

    Ok(courses
        .create(Course {
            id: Uuid::new_v4(),
            title: "Systems Programming".to_string(),
            description: "From zero to linker errors".to_string(),
            price_cents,
            currency: "USD".to_string(),
            sessions,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await?)
}

pub async fn make_booking(
    bookings: &Arc<dyn BookingRepository>,
    student_id: Uuid,
    course_id: Uuid,
) -> anyhow::Result<Booking> {
    Ok(bookings
        .create(Booking {
            id: Uuid::new_v4(),
            student_id,
            course_id,
            session_id: Some("s1".to_string()),
            status: BookingStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
        .await?)
}
