use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_models::auth::AuthenticatedUser;
use shared_models::error::AppError;

use crate::models::{ConfirmPaymentRequest, CreatePaymentRequest, PaymentError, RevenueQuery};
use crate::services::processing::PaymentProcessingService;
use crate::services::reporting::RevenueService;

fn map_payment_error(err: PaymentError) -> AppError {
    match err {
        PaymentError::NotFound(id) => AppError::NotFound(format!("Payment not found: {}", id)),
        PaymentError::AppointmentNotFound(id) => {
            AppError::NotFound(format!("Appointment not found: {}", id))
        }
        PaymentError::MethodNotFound(id) => {
            AppError::NotFound(format!("Payment method not found: {}", id))
        }
        err @ PaymentError::MethodInactive(_) => AppError::BusinessRule(err.to_string()),
        err @ PaymentError::DuplicatePayment(_) => AppError::Conflict(err.to_string()),
        err @ PaymentError::InvalidTransition { .. } => AppError::BusinessRule(err.to_string()),
        PaymentError::ValidationError(msg) => AppError::ValidationError(msg),
        PaymentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn create_payment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<CreatePaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let processing = PaymentProcessingService::new(&state);

    // Patients pay their own appointments; staff record payments at the
    // desk on anyone's behalf.
    if !user.role.is_staff() {
        let appointment = processing
            .get_billable_appointment(request.appointment_id, token)
            .await
            .map_err(map_payment_error)?;
        if appointment.patient_id != user.id {
            return Err(AppError::Auth(
                "Not authorized to pay for another patient".to_string(),
            ));
        }
    }

    let payment = processing
        .create_payment(request, &user, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": payment,
    })))
}

#[axum::debug_handler]
pub async fn get_payment(
    State(state): State<Arc<AppConfig>>,
    Path(payment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let processing = PaymentProcessingService::new(&state);

    let payment = processing
        .get_payment(payment_id, token)
        .await
        .map_err(map_payment_error)?;

    if !user.role.is_staff() {
        let appointment = processing
            .get_billable_appointment(payment.appointment_id, token)
            .await
            .map_err(map_payment_error)?;
        if appointment.patient_id != user.id {
            return Err(AppError::Auth(
                "Not authorized to view this payment".to_string(),
            ));
        }
    }

    Ok(Json(json!(payment)))
}

#[axum::debug_handler]
pub async fn confirm_payment(
    State(state): State<Arc<AppConfig>>,
    Path(payment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<ConfirmPaymentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can confirm payments".to_string(),
        ));
    }

    let processing = PaymentProcessingService::new(&state);
    let payment = processing
        .mark_as_paid(payment_id, &request.transaction_reference, &user, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": payment,
    })))
}

#[axum::debug_handler]
pub async fn fail_payment(
    State(state): State<Arc<AppConfig>>,
    Path(payment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can mark a payment failed".to_string(),
        ));
    }

    let processing = PaymentProcessingService::new(&state);
    let payment = processing
        .mark_as_failed(payment_id, &user, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": payment,
    })))
}

#[axum::debug_handler]
pub async fn refund_payment(
    State(state): State<Arc<AppConfig>>,
    Path(payment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth("Only staff can refund payments".to_string()));
    }

    let processing = PaymentProcessingService::new(&state);
    let payment = processing
        .mark_as_refunded(payment_id, &user, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!({
        "success": true,
        "payment": payment,
    })))
}

#[axum::debug_handler]
pub async fn revenue_summary(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<RevenueQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can view revenue reports".to_string(),
        ));
    }

    let summary = RevenueService::new(&state)
        .summarize(&query, token)
        .await
        .map_err(map_payment_error)?;

    Ok(Json(json!(summary)))
}
