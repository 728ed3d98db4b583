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
use shared_utils::clock::{self, ClinicClock};

use crate::models::{AvailableSlotsQuery, CreateScheduleRequest, DoctorError, UpdateScheduleRequest};
use crate::services::{AvailabilityService, DoctorService, ScheduleService};

fn map_doctor_error(err: DoctorError) -> AppError {
    match err {
        DoctorError::DoctorNotFound(id) => AppError::NotFound(format!("Doctor not found: {}", id)),
        DoctorError::SpecialtyNotFound(id) => {
            AppError::NotFound(format!("Specialty not found: {}", id))
        }
        DoctorError::ScheduleNotFound(id) => {
            AppError::NotFound(format!("Schedule entry not found: {}", id))
        }
        DoctorError::InvalidTimeRange(msg) => AppError::ValidationError(msg),
        DoctorError::ValidationError(msg) => AppError::ValidationError(msg),
        DoctorError::ScheduleOverlap(msg) => AppError::Conflict(msg),
        DoctorError::DatabaseError(msg) => AppError::Database(msg),
    }
}

fn can_manage_schedule(user: &AuthenticatedUser, doctor_id: Uuid) -> bool {
    user.role.is_staff() || user.id == doctor_id
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service
        .get_doctor(doctor_id, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!(doctor)))
}

/// Slot board for one doctor and date. A weekday without template rows
/// returns an empty board; dates already behind the clinic clock are
/// rejected before any lookup.
#[axum::debug_handler]
pub async fn get_available_slots(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    Query(query): Query<AvailableSlotsQuery>,
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
            .doctor_has_specialty(doctor_id, specialty_id, token)
            .await
            .map_err(map_doctor_error)?;
        if !holds {
            return Err(AppError::BusinessRule(
                "Doctor does not offer the requested specialty".to_string(),
            ));
        }
    }

    let availability = AvailabilityService::new(&state);
    let slots = availability
        .get_day_slots(doctor_id, query.date, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "date": query.date,
        "day_of_week": clock::weekday_number(query.date),
        "total": slots.len(),
        "slots": slots,
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !can_manage_schedule(&user, doctor_id) {
        return Err(AppError::Auth(
            "Not authorized to view this doctor's schedule".to_string(),
        ));
    }

    let schedule_service = ScheduleService::new(&state);
    let schedule = schedule_service
        .list_for_doctor(doctor_id, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "doctor_id": doctor_id,
        "total": schedule.len(),
        "schedule": schedule,
    })))
}

#[axum::debug_handler]
pub async fn create_doctor_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(doctor_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<CreateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();

    if !can_manage_schedule(&user, doctor_id) {
        return Err(AppError::Auth(
            "Not authorized to manage this doctor's schedule".to_string(),
        ));
    }

    let doctor_service = DoctorService::new(&state);
    doctor_service
        .get_doctor(doctor_id, token)
        .await
        .map_err(map_doctor_error)?;

    let schedule_service = ScheduleService::new(&state);
    let created = schedule_service
        .create(doctor_id, request, user.id, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": created,
    })))
}

#[axum::debug_handler]
pub async fn update_doctor_schedule(
    State(state): State<Arc<AppConfig>>,
    Path(schedule_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<AuthenticatedUser>,
    Json(request): Json<UpdateScheduleRequest>,
) -> Result<Json<Value>, AppError> {
    let token = auth.token();
    let schedule_service = ScheduleService::new(&state);

    let existing = schedule_service
        .get_schedule(schedule_id, token)
        .await
        .map_err(map_doctor_error)?;

    if !can_manage_schedule(&user, existing.doctor_id) {
        return Err(AppError::Auth(
            "Not authorized to manage this doctor's schedule".to_string(),
        ));
    }

    let updated = schedule_service
        .update(schedule_id, request, user.id, token)
        .await
        .map_err(map_doctor_error)?;

    Ok(Json(json!({
        "success": true,
        "schedule": updated,
    })))
}
