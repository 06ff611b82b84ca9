mod common;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;

use common::{make_course, FakeGateway, TEST_SIGNATURE};
use matricula::{api, config::Settings, payments::PaymentGateway, service::ServiceContext};

async fn spawn_app() -> anyhow::Result<(Router, Arc<ServiceContext>, Arc<FakeGateway>)> {
    let pool = common::make_pool().await?;
    let gateway = Arc::new(FakeGateway::new());
    let context = Arc::new(ServiceContext::new(
        pool,
        Some(gateway.clone() as Arc<dyn PaymentGateway>),
        Arc::new(matricula::notifications::NotificationManager::new()),
        Duration::from_secs(5),
    ));
    let app = api::create_app(
        context.clone(),
        Some(gateway.clone() as Arc<dyn PaymentGateway>),
        Arc::new(Settings::default()),
    );
    Ok((app, context, gateway))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_json(response: axum::response::Response) -> anyhow::Result<Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

#[tokio::test]
async fn health_check_works() -> anyhow::Result<()> {
    let (app, _, _) = spawn_app().await?;

    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await?;
    assert_eq!(response.status(), StatusCode::OK);

    Ok(())
}

#[tokio::test]
async fn purchase_endpoints_map_errors_to_status_codes() -> anyhow::Result<()> {
    let (app, context, _) = spawn_app().await?;
    let course = make_course(&context.course_repo, 15_000, 1).await?;
    let user_id = Uuid::new_v4();

    // Happy path: 201 with a client secret for the frontend.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/purchases",
            json!({ "user_id": user_id, "course_id": course.id }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    assert!(body["client_secret"].is_string());
    assert_eq!(body["payment"]["status"], "Processing");
    let payment_id = body["payment"]["id"].as_str().unwrap().to_string();

    // Duplicate while live: 409.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/purchases",
            json!({ "user_id": user_id, "course_id": course.id }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    // Zero amount override: 422.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/purchases",
            json!({
                "user_id": Uuid::new_v4(),
                "course_id": course.id,
                "amount_cents": 0
            }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    // Unknown course: 404.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/purchases",
            json!({ "user_id": Uuid::new_v4(), "course_id": Uuid::new_v4() }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Operator confirm by payment id.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/purchases/{}/confirm", payment_id),
            json!({}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["payment"]["status"], "Succeeded");
    assert_eq!(body["enrollment"]["status"], "Active");
    assert_eq!(body["already_confirmed"], false);

    // Unknown payment id: 404.
    let response = app
        .clone()
        .oneshot(post_json(
            &format!("/api/purchases/{}/confirm", Uuid::new_v4()),
            json!({}),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    Ok(())
}

#[tokio::test]
async fn gateway_webhook_confirms_with_a_valid_signature() -> anyhow::Result<()> {
    let (app, context, _) = spawn_app().await?;
    let course = make_course(&context.course_repo, 15_000, 1).await?;
    let user_id = Uuid::new_v4();

    let initiated = context
        .purchase_service
        .initiate(matricula::service::InitiatePurchase {
            user_id,
            course_id: course.id,
            amount_cents: None,
            currency: None,
            booking_id: None,
        })
        .await?;
    let intent_id = initiated.payment.gateway_intent_id.unwrap();
    let payload = json!({
        "type": "payment_intent.succeeded",
        "intent_id": intent_id
    });

    // No signature header: rejected before any state is touched.
    let response = app
        .clone()
        .oneshot(post_json("/api/purchases/webhook/gateway", payload.clone()))
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    // Bad signature: rejected too.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/purchases/webhook/gateway")
                .header("content-type", "application/json")
                .header("Stripe-Signature", "forged")
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(context
        .enrollment_service
        .find_live(user_id, course.id)
        .await?
        .is_none());

    // Valid signature: the event is applied.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/purchases/webhook/gateway")
                .header("content-type", "application/json")
                .header("Stripe-Signature", TEST_SIGNATURE)
                .body(Body::from(payload.to_string()))
                .unwrap(),
        )
        .await?;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(context
        .enrollment_service
        .find_live(user_id, course.id)
        .await?
        .is_some());

    Ok(())
}

#[tokio::test]
async fn purchase_order_endpoints_round_trip() -> anyhow::Result<()> {
    let (app, context, _) = spawn_app().await?;
    let course = make_course(&context.course_repo, 40_000, 1).await?;
    let student_id = Uuid::new_v4();

    let response = app
        .clone()
        .oneshot(post_json(
            "/api/purchase-orders",
            json!({ "student_id": student_id, "course_id": course.id }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = body_json(response).await?;
    let order_id = body["id"].as_str().unwrap().to_string();
    assert_eq!(body["status"], "Pending");

    // Duplicate pending order: 409.
    let response = app
        .clone()
        .oneshot(post_json(
            "/api/purchase-orders",
            json!({ "student_id": student_id, "course_id": course.id }),
        ))
        .await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let decide = |decision: &str| {
        Request::builder()
            .method("PATCH")
            .uri(format!("/api/purchase-orders/{}", order_id))
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "decision": decision,
                    "reviewer_id": Uuid::new_v4()
                })
                .to_string(),
            ))
            .unwrap()
    };

    let response = app.clone().oneshot(decide("Approved")).await?;
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await?;
    assert_eq!(body["order"]["status"], "Approved");
    assert_eq!(body["confirmation"]["payment"]["payment_method"], "PurchaseOrder");

    // Deciding twice: 409.
    let response = app.clone().oneshot(decide("Rejected")).await?;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    Ok(())
}
