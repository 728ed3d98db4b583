use chrono::Utc;
use reqwest::Method;
use serde_json::json;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;
use shared_utils::clock;

use crate::models::{CreateScheduleRequest, DoctorError, DoctorSchedule, UpdateScheduleRequest};

const DEFAULT_SLOT_MINUTES: i32 = 30;

/// Maintains the weekly schedule templates the availability calculator
/// reads. Rows are recurring (doctor, weekday) working blocks; a block is
/// retired by deactivating it, never deleted, so historical appointments
/// keep their context.
pub struct ScheduleService {
    db: PostgrestClient,
}

impl ScheduleService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    /// All template rows for the doctor, active or not, in calendar order.
    pub async fn list_for_doctor(
        &self,
        doctor_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<DoctorSchedule>, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&order=day_of_week.asc,start_time.asc",
            doctor_id
        );
        self.db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))
    }

    pub async fn create(
        &self,
        doctor_id: Uuid,
        request: CreateScheduleRequest,
        actor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorSchedule, DoctorError> {
        let slot_minutes = request.slot_minutes.unwrap_or(DEFAULT_SLOT_MINUTES);
        validate_template(
            request.day_of_week,
            request.start_time,
            request.end_time,
            slot_minutes,
        )?;

        self.ensure_no_overlap(
            doctor_id,
            request.day_of_week,
            request.start_time,
            request.end_time,
            None,
            auth_token,
        )
        .await?;

        if !clock::is_business_hour(request.start_time) {
            warn!(
                %doctor_id,
                start = %request.start_time,
                "Schedule block starts outside business hours"
            );
        }

        let body = json!({
            "doctor_id": doctor_id,
            "day_of_week": request.day_of_week,
            "start_time": request.start_time,
            "end_time": request.end_time,
            "slot_minutes": slot_minutes,
            "is_active": request.is_active.unwrap_or(true),
            "created_by": actor_id,
        });

        debug!(%doctor_id, day_of_week = request.day_of_week, "Creating schedule block");

        let rows: Vec<DoctorSchedule> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/doctor_schedules",
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or_else(|| DoctorError::DatabaseError("insert returned no row".into()))
    }

    /// Partial update; unspecified fields keep their stored values. The
    /// merged row is re-validated so a patch cannot invert a time range.
    pub async fn update(
        &self,
        schedule_id: Uuid,
        request: UpdateScheduleRequest,
        actor_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorSchedule, DoctorError> {
        let existing = self.get_schedule(schedule_id, auth_token).await?;

        let start_time = request.start_time.unwrap_or(existing.start_time);
        let end_time = request.end_time.unwrap_or(existing.end_time);
        let slot_minutes = request.slot_minutes.unwrap_or(existing.slot_minutes);
        let is_active = request.is_active.unwrap_or(existing.is_active);

        validate_template(existing.day_of_week, start_time, end_time, slot_minutes)?;

        if is_active {
            self.ensure_no_overlap(
                existing.doctor_id,
                existing.day_of_week,
                start_time,
                end_time,
                Some(schedule_id),
                auth_token,
            )
            .await?;
        }

        let body = json!({
            "start_time": start_time,
            "end_time": end_time,
            "slot_minutes": slot_minutes,
            "is_active": is_active,
            "updated_at": Utc::now(),
            "updated_by": actor_id,
        });

        let path = format!("/rest/v1/doctor_schedules?id=eq.{}", schedule_id);
        let rows: Vec<DoctorSchedule> = self
            .db
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::representation_headers()),
            )
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(DoctorError::ScheduleNotFound(schedule_id))
    }

    pub async fn get_schedule(
        &self,
        schedule_id: Uuid,
        auth_token: &str,
    ) -> Result<DoctorSchedule, DoctorError> {
        let path = format!("/rest/v1/doctor_schedules?id=eq.{}&limit=1", schedule_id);
        let rows: Vec<DoctorSchedule> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(DoctorError::ScheduleNotFound(schedule_id))
    }

    /// Two active blocks on the same weekday must not intersect; the
    /// boards they generate would double-offer the shared window.
    async fn ensure_no_overlap(
        &self,
        doctor_id: Uuid,
        day_of_week: i32,
        start_time: chrono::NaiveTime,
        end_time: chrono::NaiveTime,
        exclude: Option<Uuid>,
        auth_token: &str,
    ) -> Result<(), DoctorError> {
        let mut path = format!(
            "/rest/v1/doctor_schedules?doctor_id=eq.{}&day_of_week=eq.{}&is_active=eq.true",
            doctor_id, day_of_week
        );
        if let Some(id) = exclude {
            path.push_str(&format!("&id=neq.{}", id));
        }

        let rows: Vec<DoctorSchedule> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        for row in &rows {
            if start_time < row.end_time && row.start_time < end_time {
                return Err(DoctorError::ScheduleOverlap(format!(
                    "{} - {} intersects existing block {} - {}",
                    start_time.format("%H:%M"),
                    end_time.format("%H:%M"),
                    row.start_time.format("%H:%M"),
                    row.end_time.format("%H:%M"),
                )));
            }
        }
        Ok(())
    }
}

fn validate_template(
    day_of_week: i32,
    start_time: chrono::NaiveTime,
    end_time: chrono::NaiveTime,
    slot_minutes: i32,
) -> Result<(), DoctorError> {
    if !(1..=7).contains(&day_of_week) {
        return Err(DoctorError::ValidationError(format!(
            "day_of_week must be 1 (Monday) through 7 (Sunday), got {}",
            day_of_week
        )));
    }
    if start_time >= end_time {
        return Err(DoctorError::InvalidTimeRange(format!(
            "start {} must come before end {}",
            start_time.format("%H:%M"),
            end_time.format("%H:%M"),
        )));
    }
    if slot_minutes <= 0 {
        return Err(DoctorError::ValidationError(format!(
            "slot_minutes must be positive, got {}",
            slot_minutes
        )));
    }
    Ok(())
}
