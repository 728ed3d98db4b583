use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    Json,
};
use axum_extra::TypedHeader;
use chrono::NaiveDate;
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use doctor_cell::services::{AvailabilityService, DoctorService};
use shared_config::AppConfig;
use shared_models::auth::AuthenticatedUser;
use shared_models::error::AppError;
use shared_utils::clock::{self, ClinicClock};

use crate::models::{
    AppointmentError, AppointmentSearchQuery, BookAppointmentRequest, CancelAppointmentRequest,
    FollowUpRequest, RescheduleAppointmentRequest,
};
use crate::services::booking::AppointmentBookingService;

#[derive(Debug, Deserialize)]
pub struct SlotSearchQuery {
    pub doctor_id: Uuid,
    pub specialty_id: Option<Uuid>,
    pub date: NaiveDate,
}

fn map_appointment_error(err: AppointmentError) -> AppError {
    match err {
        AppointmentError::NotFound(id) => {
            AppError::NotFound(format!("Appointment not found: {}", id))
        }
        AppointmentError::DoctorNotFound(id) => {
            AppError::NotFound(format!("Doctor not found: {}", id))
        }
        AppointmentError::SpecialtyNotFound(id) => {
            AppError::NotFound(format!("Specialty not found: {}", id))
        }
        err @ AppointmentError::SpecialtyMismatch { .. } => AppError::BusinessRule(err.to_string()),
        err @ AppointmentError::SlotNotBookable(_) => AppError::BusinessRule(err.to_string()),
        err @ AppointmentError::SlotTaken(_) => AppError::Conflict(err.to_string()),
        err @ AppointmentError::InvalidTransition { .. } => AppError::BusinessRule(err.to_string()),
        err @ AppointmentError::NoShowTooEarly => AppError::BusinessRule(err.to_string()),
        AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
        AppointmentError::DatabaseError(msg) => AppError::Database(msg),
    }
}

/// Mirrors the doctor-scoped slot endpoint for callers that navigate
/// from the booking flow instead of a doctor profile.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Query(query): Query<SlotSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    let today = ClinicClock::from_config(&state).today();
    if query.date < today {
        return Err(AppError::ValidationError(format!(
            "date {} is in the past",
            query.date
        )));
    }

    if let Some(specialty_id) = query.specialty_id {
        let doctor_service = DoctorService::new(&state);
        let holds = doctor_service
            .doctor_has_specialty(query.doctor_id, specialty_id, token)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        if !holds {
            return Err(AppError::BusinessRule(
                "Doctor does not offer the requested specialty".to_string(),
            ));
        }
    }

    let availability = AvailabilityService::new(&state);
    let slots = availability
        .get_day_slots(query.doctor_id, query.date, token)
        .await
        .map_err(|e| match e {
            doctor_cell::models::DoctorError::DoctorNotFound(id) => {
                AppError::NotFound(format!("Doctor not found: {}", id))
            }
            other => AppError::Database(other.to_string()),
        })?;

    Ok(Json(json!({
        "doctor_id": query.doctor_id,
        "date": query.date,
        "day_of_week": clock::weekday_number(query.date),
        "total": slots.len(),
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppConfig>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Patients book for themselves; staff book on a patient's behalf.
    if !user.role.is_staff() && request.patient_id != user.id {
        return Err(AppError::Auth(
            "Not authorized to book for another patient".to_string(),
        ));
    }

    let booking = AppointmentBookingService::new(&state);
    let appointment = booking
        .book(request, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking = AppointmentBookingService::new(&state);

    let appointment = booking
        .get_appointment(appointment_id, token)
        .await
        .map_err(map_appointment_error)?;

    if !user.role.is_staff() && appointment.patient_id != user.id {
        return Err(AppError::Auth(
            "Not authorized to view this appointment".to_string(),
        ));
    }

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn search_appointments(
    State(state): State<Arc<AppConfig>>,
    Query(mut query): Query<AppointmentSearchQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    // Patients only ever see their own records.
    if !user.role.is_staff() {
        query.patient_id = Some(user.id);
    }

    let booking = AppointmentBookingService::new(&state);
    let appointments = booking
        .search(&query, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "total": appointments.len(),
        "appointments": appointments,
    })))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can confirm appointments".to_string(),
        ));
    }

    let booking = AppointmentBookingService::new(&state);
    let appointment = booking
        .confirm(appointment_id, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking = AppointmentBookingService::new(&state);

    if !user.role.is_staff() {
        let appointment = booking
            .get_appointment(appointment_id, token)
            .await
            .map_err(map_appointment_error)?;
        if appointment.patient_id != user.id {
            return Err(AppError::Auth(
                "Not authorized to cancel this appointment".to_string(),
            ));
        }
    }

    let appointment = booking
        .cancel(appointment_id, &request.reason, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can complete appointments".to_string(),
        ));
    }

    let booking = AppointmentBookingService::new(&state);
    let appointment = booking
        .complete(appointment_id, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can mark a no-show".to_string(),
        ));
    }

    let booking = AppointmentBookingService::new(&state);
    let appointment = booking
        .mark_no_show(appointment_id, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn reschedule_appointment(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<RescheduleAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let booking = AppointmentBookingService::new(&state);

    if !user.role.is_staff() {
        let appointment = booking
            .get_appointment(appointment_id, token)
            .await
            .map_err(map_appointment_error)?;
        if appointment.patient_id != user.id {
            return Err(AppError::Auth(
                "Not authorized to reschedule this appointment".to_string(),
            ));
        }
    }

    let appointment = booking
        .reschedule(appointment_id, request, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
    })))
}

#[axum::debug_handler]
pub async fn book_follow_up(
    State(state): State<Arc<AppConfig>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<FollowUpRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !user.role.is_staff() {
        return Err(AppError::Auth(
            "Only staff can book follow-up appointments".to_string(),
        ));
    }

    let booking = AppointmentBookingService::new(&state);
    let follow_up = booking
        .book_follow_up(appointment_id, request, &user, token)
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "original_id": appointment_id,
        "appointment": follow_up,
    })))
}
