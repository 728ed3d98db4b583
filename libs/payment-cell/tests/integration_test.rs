use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use payment_cell::router::payment_routes;
use shared_config::AppConfig;
use shared_utils::test_utils::{JwtTestUtils, MockGatewayResponses, TestConfig, TestUser};

fn create_test_app(config: AppConfig) -> Router {
    payment_routes(Arc::new(config))
}

fn billable_row(appointment_id: Uuid, patient_id: Uuid, price: f64) -> Value {
    json!({
        "id": appointment_id,
        "patient_id": patient_id,
        "price": price
    })
}

fn method_row(method_id: Uuid, name: &str, method_type: &str, percent: f64, active: bool) -> Value {
    json!({
        "id": method_id,
        "created_at": "2026-01-05T09:00:00Z",
        "name": name,
        "method_type": method_type,
        "processing_fee_percent": percent,
        "is_active": active
    })
}

fn payment_row(
    payment_id: Uuid,
    appointment_id: Uuid,
    method_id: Uuid,
    status: &str,
    payment_date: Option<&str>,
    transaction_reference: Option<&str>,
) -> Value {
    json!({
        "id": payment_id,
        "created_at": "2026-08-20T14:00:00Z",
        "appointment_id": appointment_id,
        "payment_method_id": method_id,
        "amount": 100.0,
        "processing_fee": 2.5,
        "total_amount": 102.5,
        "transaction_reference": transaction_reference,
        "payment_date": payment_date,
        "status": status,
        "receipt_number": "REC-20260820140000-7QK2",
        "payer_name": "Ana Torres",
        "payer_email": "ana.torres@example.com"
    })
}

async fn mount_token_guard(server: &MockServer, user: &TestUser) {
    Mock::given(method("GET"))
        .and(path("/rest/v1/users"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([MockGatewayResponses::user_account_row(user)])),
        )
        .mount(server)
        .await;
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_json(uri: &str, token: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn patch_json(uri: &str, token: &str, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("PATCH")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token));
    let payload = match body {
        Some(value) => {
            builder = builder.header("content-type", "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    builder.body(payload).unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_receptionist_creates_payment_with_computed_fee() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let appointment_id = Uuid::new_v4();
    let method_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            Uuid::new_v4(),
            100.0
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payment_methods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([method_row(
            method_id,
            "Visa terminal",
            "card",
            2.5,
            true
        )])))
        .mount(&mock_server)
        .await;

    // The insert must carry the computed fee and total, never a client
    // supplied amount.
    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({
            "amount": 100.0,
            "processing_fee": 2.5,
            "total_amount": 102.5,
            "status": "pending"
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([payment_row(
            Uuid::new_v4(),
            appointment_id,
            method_id,
            "pending",
            None,
            None
        )])))
        .mount(&mock_server)
        .await;

    let request = post_json(
        "/",
        &token,
        json!({
            "appointment_id": appointment_id,
            "payment_method_id": method_id,
            "payer_name": "Ana Torres",
            "payer_email": "ana.torres@example.com"
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["payment"]["status"], "pending");
    assert_eq!(body["payment"]["total_amount"], 102.5);
    assert_eq!(body["payment"]["receipt_number"], "REC-20260820140000-7QK2");
    assert!(body["payment"]["payment_date"].is_null());
}

#[tokio::test]
async fn test_patient_pays_own_appointment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::patient("ana.torres@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let appointment_id = Uuid::new_v4();
    let method_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            user.id,
            100.0
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payment_methods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([method_row(
            method_id,
            "Cash",
            "cash",
            0.0,
            true
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({
            "processing_fee": 0.0,
            "total_amount": 100.0
        })))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!([payment_row(
            Uuid::new_v4(),
            appointment_id,
            method_id,
            "pending",
            None,
            None
        )])))
        .mount(&mock_server)
        .await;

    let request = post_json(
        "/",
        &token,
        json!({
            "appointment_id": appointment_id,
            "payment_method_id": method_id,
            "payer_name": "Ana Torres",
            "payer_email": "ana.torres@example.com"
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_patient_cannot_pay_for_another_patient() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::patient("ana.torres@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let appointment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            Uuid::new_v4(),
            100.0
        )])))
        .mount(&mock_server)
        .await;

    let request = post_json(
        "/",
        &token,
        json!({
            "appointment_id": appointment_id,
            "payment_method_id": Uuid::new_v4(),
            "payer_name": "Ana Torres",
            "payer_email": "ana.torres@example.com"
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_second_payment_for_appointment_conflicts() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let appointment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            Uuid::new_v4(),
            100.0
        )])))
        .mount(&mock_server)
        .await;

    // An earlier payment already holds the appointment.
    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!([{ "id": Uuid::new_v4() }])),
        )
        .mount(&mock_server)
        .await;

    let request = post_json(
        "/",
        &token,
        json!({
            "appointment_id": appointment_id,
            "payment_method_id": Uuid::new_v4(),
            "payer_name": "Ana Torres",
            "payer_email": "ana.torres@example.com"
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let body = body_json(response).await;
    assert_eq!(body["error"], "CONFLICT");
}

#[tokio::test]
async fn test_lost_create_race_reported_as_duplicate() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let appointment_id = Uuid::new_v4();
    let method_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            Uuid::new_v4(),
            100.0
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payment_methods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([method_row(
            method_id,
            "Visa terminal",
            "card",
            2.5,
            true
        )])))
        .mount(&mock_server)
        .await;

    // A concurrent create won between the pre-check and the insert.
    Mock::given(method("POST"))
        .and(path("/rest/v1/payments"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_string("duplicate key value violates unique constraint"),
        )
        .mount(&mock_server)
        .await;

    let request = post_json(
        "/",
        &token,
        json!({
            "appointment_id": appointment_id,
            "payment_method_id": method_id,
            "payer_name": "Ana Torres",
            "payer_email": "ana.torres@example.com"
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_inactive_method_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let appointment_id = Uuid::new_v4();
    let method_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            Uuid::new_v4(),
            100.0
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payment_methods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([method_row(
            method_id,
            "Legacy terminal",
            "card",
            2.5,
            false
        )])))
        .mount(&mock_server)
        .await;

    let request = post_json(
        "/",
        &token,
        json!({
            "appointment_id": appointment_id,
            "payment_method_id": method_id,
            "payer_name": "Ana Torres",
            "payer_email": "ana.torres@example.com"
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"], "BUSINESS_RULE_VIOLATION");
}

#[tokio::test]
async fn test_payment_for_unknown_appointment_not_found() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let request = post_json(
        "/",
        &token,
        json!({
            "appointment_id": Uuid::new_v4(),
            "payment_method_id": Uuid::new_v4(),
            "payer_name": "Ana Torres",
            "payer_email": "ana.torres@example.com"
        }),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let body = body_json(response).await;
    assert_eq!(body["error"], "RESOURCE_NOT_FOUND");
}

#[tokio::test]
async fn test_confirm_settles_pending_payment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let payment_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();
    let method_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            appointment_id,
            method_id,
            "pending",
            None,
            None
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({
            "status": "completed",
            "transaction_reference": "TXN-889"
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            appointment_id,
            method_id,
            "completed",
            Some("2026-08-20T14:30:00Z"),
            Some("TXN-889")
        )])))
        .mount(&mock_server)
        .await;

    let request = patch_json(
        &format!("/{}/confirm", payment_id),
        &token,
        Some(json!({ "transaction_reference": "TXN-889" })),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["payment"]["status"], "completed");
    assert_eq!(body["payment"]["transaction_reference"], "TXN-889");
    assert!(body["payment"]["payment_date"].is_string());
}

#[tokio::test]
async fn test_confirm_without_reference_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);

    mount_token_guard(&mock_server, &user).await;

    let request = patch_json(
        &format!("/{}/confirm", Uuid::new_v4()),
        &token,
        Some(json!({ "transaction_reference": "   " })),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = body_json(response).await;
    assert_eq!(body["error"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_confirm_settled_payment_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let payment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "completed",
            Some("2026-08-20T14:30:00Z"),
            Some("TXN-889")
        )])))
        .mount(&mock_server)
        .await;

    let request = patch_json(
        &format!("/{}/confirm", payment_id),
        &token,
        Some(json!({ "transaction_reference": "TXN-890" })),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("settle"));
    assert!(message.contains("completed"));
}

#[tokio::test]
async fn test_patient_cannot_confirm_payment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::patient("ana.torres@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);

    mount_token_guard(&mock_server, &user).await;

    let request = patch_json(
        &format!("/{}/confirm", Uuid::new_v4()),
        &token,
        Some(json!({ "transaction_reference": "TXN-889" })),
    );

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_fail_stamps_payment_date() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let payment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "pending",
            None,
            None
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({ "status": "failed" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "failed",
            Some("2026-08-20T14:30:00Z"),
            None
        )])))
        .mount(&mock_server)
        .await;

    let request = patch_json(&format!("/{}/fail", payment_id), &token, None);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["payment"]["status"], "failed");
    assert!(body["payment"]["payment_date"].is_string());
}

#[tokio::test]
async fn test_refund_settled_payment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let payment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "completed",
            Some("2026-08-20T14:30:00Z"),
            Some("TXN-889")
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("PATCH"))
        .and(path("/rest/v1/payments"))
        .and(body_partial_json(json!({ "status": "refunded" })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "refunded",
            Some("2026-08-20T14:30:00Z"),
            Some("TXN-889")
        )])))
        .mount(&mock_server)
        .await;

    let request = patch_json(&format!("/{}/refund", payment_id), &token, None);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["payment"]["status"], "refunded");
}

#[tokio::test]
async fn test_refund_pending_payment_rejected() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::receptionist("front-desk@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let payment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            Uuid::new_v4(),
            Uuid::new_v4(),
            "pending",
            None,
            None
        )])))
        .mount(&mock_server)
        .await;

    let request = patch_json(&format!("/{}/refund", payment_id), &token, None);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let body = body_json(response).await;
    assert_eq!(body["error"], "BUSINESS_RULE_VIOLATION");
    let message = body["message"].as_str().unwrap();
    assert!(message.contains("refund"));
    assert!(message.contains("pending"));
}

#[tokio::test]
async fn test_patient_views_own_payment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::patient("ana.torres@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let payment_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            appointment_id,
            Uuid::new_v4(),
            "pending",
            None,
            None
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            user.id,
            100.0
        )])))
        .mount(&mock_server)
        .await;

    let request = get_request(&format!("/{}", payment_id), &token);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["receipt_number"], "REC-20260820140000-7QK2");
}

#[tokio::test]
async fn test_patient_cannot_view_others_payment() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::patient("ana.torres@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let payment_id = Uuid::new_v4();
    let appointment_id = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([payment_row(
            payment_id,
            appointment_id,
            Uuid::new_v4(),
            "pending",
            None,
            None
        )])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/appointments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([billable_row(
            appointment_id,
            Uuid::new_v4(),
            100.0
        )])))
        .mount(&mock_server)
        .await;

    let request = get_request(&format!("/{}", payment_id), &token);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_revenue_summary_rolls_up_completed_payments() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::admin("director@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);
    let card = Uuid::new_v4();
    let cash = Uuid::new_v4();

    mount_token_guard(&mock_server, &user).await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "payment_method_id": card, "processing_fee": 2.5, "total_amount": 102.5, "status": "completed" },
            { "payment_method_id": cash, "processing_fee": 1.25, "total_amount": 51.25, "status": "completed" },
            { "payment_method_id": card, "processing_fee": 0.0, "total_amount": 75.0, "status": "pending" },
            { "payment_method_id": card, "processing_fee": 0.5, "total_amount": 20.5, "status": "refunded" }
        ])))
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/v1/payment_methods"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "id": card, "method_type": "card" },
            { "id": cash, "method_type": "cash" }
        ])))
        .mount(&mock_server)
        .await;

    let request = get_request("/summary?from=2026-08-01&to=2026-08-31", &token);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["from"], "2026-08-01");
    assert_eq!(body["to"], "2026-08-31");
    assert_eq!(body["total_collected"], 153.75);
    assert_eq!(body["total_fees"], 3.75);
    assert_eq!(body["net_revenue"], 150.0);
    assert_eq!(body["counts"]["completed"], 2);
    assert_eq!(body["counts"]["pending"], 1);
    assert_eq!(body["counts"]["refunded"], 1);
    assert_eq!(body["counts"]["failed"], 0);
    assert_eq!(body["by_method"][0]["method_type"], "card");
    assert_eq!(body["by_method"][0]["count"], 1);
    assert_eq!(body["by_method"][0]["total"], 102.5);
    assert_eq!(body["by_method"][1]["method_type"], "cash");
}

#[tokio::test]
async fn test_patient_cannot_view_revenue_summary() {
    let mock_server = MockServer::start().await;
    let config = TestConfig::for_gateway(&mock_server.uri()).to_app_config();
    let app = create_test_app(config.clone());

    let user = TestUser::patient("ana.torres@example.com");
    let token = JwtTestUtils::create_test_token(&user, &config.jwt_secret);

    mount_token_guard(&mock_server, &user).await;

    let request = get_request("/summary", &token);

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
