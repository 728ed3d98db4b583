use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use doctor_cell::models::DoctorError;
use doctor_cell::services::{AvailabilityService, DoctorService};
use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};
use shared_models::auth::AuthenticatedUser;
use shared_utils::clock::ClinicClock;

use crate::models::{
    Appointment, AppointmentError, AppointmentSearchQuery, AppointmentStatus,
    BookAppointmentRequest, FollowUpRequest, RescheduleAppointmentRequest,
};
use crate::services::events::{publish_event, AppointmentEvent};
use crate::services::lifecycle::AppointmentLifecycle;

/// Books appointments and drives them through their lifecycle. Slot
/// availability is delegated to the doctor cell; the partial unique
/// index on non-cancelled (doctor, date, start_time) rows backstops the
/// check-then-insert race, surfacing the loser as a slot conflict.
pub struct AppointmentBookingService {
    db: PostgrestClient,
    availability: AvailabilityService,
    doctors: DoctorService,
    lifecycle: AppointmentLifecycle,
    clock: ClinicClock,
    config: AppConfig,
}

impl AppointmentBookingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
            availability: AvailabilityService::new(config),
            doctors: DoctorService::new(config),
            lifecycle: AppointmentLifecycle::new(),
            clock: ClinicClock::from_config(config),
            config: config.clone(),
        }
    }

    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if request.reason.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "reason is required".to_string(),
            ));
        }
        if self
            .clock
            .has_passed(request.appointment_date, request.start_time)
        {
            return Err(AppointmentError::ValidationError(format!(
                "appointment time {} {} is in the past",
                request.appointment_date,
                request.start_time.format("%H:%M"),
            )));
        }

        self.doctors
            .get_doctor(request.doctor_id, auth_token)
            .await
            .map_err(map_doctor_error)?;

        let specialty = self
            .doctors
            .get_specialty(request.specialty_id, auth_token)
            .await
            .map_err(map_doctor_error)?;

        let holds = self
            .doctors
            .doctor_has_specialty(request.doctor_id, request.specialty_id, auth_token)
            .await
            .map_err(map_doctor_error)?;
        if !holds {
            return Err(AppointmentError::SpecialtyMismatch {
                doctor_id: request.doctor_id,
                specialty_id: request.specialty_id,
            });
        }

        let slot = self
            .availability
            .find_slot(
                request.doctor_id,
                request.appointment_date,
                request.start_time,
                None,
                auth_token,
            )
            .await
            .map_err(map_doctor_error)?
            .ok_or_else(|| {
                AppointmentError::SlotNotBookable(format!(
                    "{} {}",
                    request.appointment_date,
                    request.start_time.format("%H:%M"),
                ))
            })?;

        if !slot.available {
            return Err(AppointmentError::SlotTaken(slot.label.clone()));
        }

        let body = json!({
            "patient_id": request.patient_id,
            "doctor_id": request.doctor_id,
            "specialty_id": request.specialty_id,
            "appointment_date": request.appointment_date,
            "start_time": slot.start_time,
            "end_time": slot.end_time,
            "reason": request.reason.trim(),
            "price": specialty.consultation_price,
            "status": AppointmentStatus::Scheduled,
            "created_by": actor.id,
        });

        debug!(
            patient_id = %request.patient_id,
            doctor_id = %request.doctor_id,
            date = %request.appointment_date,
            slot = %slot.label,
            "Booking appointment"
        );

        let rows: Vec<Appointment> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::representation_headers()),
            )
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(_) => AppointmentError::SlotTaken(slot.label.clone()),
                other => AppointmentError::DatabaseError(other.to_string()),
            })?;

        let appointment = rows
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::DatabaseError("insert returned no row".into()))?;

        info!(appointment_id = %appointment.meta.id, "Appointment booked");
        publish_event(&self.config, auth_token, AppointmentEvent::Booked, &appointment);

        Ok(appointment)
    }

    pub async fn get_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}&limit=1", appointment_id);
        let rows: Vec<Appointment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        rows.into_iter()
            .next()
            .ok_or(AppointmentError::NotFound(appointment_id))
    }

    pub async fn confirm(
        &self,
        appointment_id: Uuid,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_transition(
            &appointment.status,
            &AppointmentStatus::Confirmed,
            "confirm",
        )?;

        self.patch_appointment(
            appointment_id,
            json!({
                "status": AppointmentStatus::Confirmed,
                "updated_at": Utc::now(),
                "updated_by": actor.id,
            }),
            auth_token,
        )
        .await
    }

    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        reason: &str,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        if reason.trim().is_empty() {
            return Err(AppointmentError::ValidationError(
                "cancellation reason is required".to_string(),
            ));
        }

        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_transition(
            &appointment.status,
            &AppointmentStatus::Cancelled,
            "cancel",
        )?;

        let cancelled = self
            .patch_appointment(
                appointment_id,
                json!({
                    "status": AppointmentStatus::Cancelled,
                    "cancellation_reason": reason.trim(),
                    "updated_at": Utc::now(),
                    "updated_by": actor.id,
                }),
                auth_token,
            )
            .await?;

        publish_event(&self.config, auth_token, AppointmentEvent::Cancelled, &cancelled);
        Ok(cancelled)
    }

    pub async fn complete(
        &self,
        appointment_id: Uuid,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_transition(
            &appointment.status,
            &AppointmentStatus::Completed,
            "complete",
        )?;

        let completed = self
            .patch_appointment(
                appointment_id,
                json!({
                    "status": AppointmentStatus::Completed,
                    "updated_at": Utc::now(),
                    "updated_by": actor.id,
                }),
                auth_token,
            )
            .await?;

        publish_event(&self.config, auth_token, AppointmentEvent::Completed, &completed);
        Ok(completed)
    }

    pub async fn mark_no_show(
        &self,
        appointment_id: Uuid,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_no_show(
            &appointment.status,
            appointment.appointment_date,
            appointment.start_time,
            &self.clock,
        )?;

        self.patch_appointment(
            appointment_id,
            json!({
                "status": AppointmentStatus::NoShow,
                "updated_at": Utc::now(),
                "updated_by": actor.id,
            }),
            auth_token,
        )
        .await
    }

    /// Moves a pending appointment to a new slot; the status is kept. The
    /// appointment being moved is excluded from the availability check so
    /// it cannot block its own target.
    pub async fn reschedule(
        &self,
        appointment_id: Uuid,
        request: RescheduleAppointmentRequest,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.get_appointment(appointment_id, auth_token).await?;
        self.lifecycle.validate_reschedule(&appointment.status)?;

        if self
            .clock
            .has_passed(request.new_date, request.new_start_time)
        {
            return Err(AppointmentError::ValidationError(format!(
                "appointment time {} {} is in the past",
                request.new_date,
                request.new_start_time.format("%H:%M"),
            )));
        }

        let slot = self
            .availability
            .find_slot(
                appointment.doctor_id,
                request.new_date,
                request.new_start_time,
                Some(appointment_id),
                auth_token,
            )
            .await
            .map_err(map_doctor_error)?
            .ok_or_else(|| {
                AppointmentError::SlotNotBookable(format!(
                    "{} {}",
                    request.new_date,
                    request.new_start_time.format("%H:%M"),
                ))
            })?;

        if !slot.available {
            return Err(AppointmentError::SlotTaken(slot.label.clone()));
        }

        info!(
            appointment_id = %appointment_id,
            new_date = %request.new_date,
            slot = %slot.label,
            "Rescheduling appointment"
        );

        self.patch_appointment(
            appointment_id,
            json!({
                "appointment_date": request.new_date,
                "start_time": slot.start_time,
                "end_time": slot.end_time,
                "updated_at": Utc::now(),
                "updated_by": actor.id,
            }),
            auth_token,
        )
        .await
    }

    /// Books a new appointment with the original's doctor, patient and
    /// specialty, then links it on the original. The original's status is
    /// untouched.
    pub async fn book_follow_up(
        &self,
        original_id: Uuid,
        request: FollowUpRequest,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let original = self.get_appointment(original_id, auth_token).await?;

        if original.follow_up_appointment_id.is_some() {
            return Err(AppointmentError::ValidationError(format!(
                "appointment {} already has a follow-up",
                original_id
            )));
        }

        let follow_up = self
            .book(
                BookAppointmentRequest {
                    patient_id: original.patient_id,
                    doctor_id: original.doctor_id,
                    specialty_id: original.specialty_id,
                    appointment_date: request.appointment_date,
                    start_time: request.start_time,
                    reason: request.reason,
                },
                actor,
                auth_token,
            )
            .await?;

        self.patch_appointment(
            original_id,
            json!({
                "follow_up_appointment_id": follow_up.meta.id,
                "updated_at": Utc::now(),
                "updated_by": actor.id,
            }),
            auth_token,
        )
        .await?;

        Ok(follow_up)
    }

    pub async fn search(
        &self,
        query: &AppointmentSearchQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut path =
            String::from("/rest/v1/appointments?order=appointment_date.desc,start_time.asc");

        if let Some(doctor_id) = query.doctor_id {
            path.push_str(&format!("&doctor_id=eq.{}", doctor_id));
        }
        if let Some(patient_id) = query.patient_id {
            path.push_str(&format!("&patient_id=eq.{}", patient_id));
        }
        if let Some(status) = query.status {
            path.push_str(&format!("&status=eq.{}", status));
        }
        if let Some(from) = query.from {
            path.push_str(&format!("&appointment_date=gte.{}", from));
        }
        if let Some(to) = query.to {
            path.push_str(&format!("&appointment_date=lte.{}", to));
        }
        path.push_str(&format!("&limit={}", query.limit.unwrap_or(50)));
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        self.db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)
    }

    async fn patch_appointment(
        &self,
        appointment_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let path = format!("/rest/v1/appointments?id=eq.{}", appointment_id);
        let rows: Vec<Appointment> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::representation_headers()),
            )
            .await
            .map_err(map_db_error)?;

        rows.into_iter()
            .next()
            .ok_or(AppointmentError::NotFound(appointment_id))
    }
}

fn map_db_error(err: DbError) -> AppointmentError {
    match err {
        DbError::UniqueViolation(msg) => AppointmentError::SlotTaken(msg),
        other => AppointmentError::DatabaseError(other.to_string()),
    }
}

fn map_doctor_error(err: DoctorError) -> AppointmentError {
    match err {
        DoctorError::DoctorNotFound(id) => AppointmentError::DoctorNotFound(id),
        DoctorError::SpecialtyNotFound(id) => AppointmentError::SpecialtyNotFound(id),
        other => AppointmentError::DatabaseError(other.to_string()),
    }
}
