use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::meta::RecordMeta;

#[derive(Error, Debug)]
pub enum DoctorError {
    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Specialty not found: {0}")]
    SpecialtyNotFound(Uuid),

    #[error("Schedule entry not found: {0}")]
    ScheduleNotFound(Uuid),

    #[error("Invalid time range: {0}")]
    InvalidTimeRange(String),

    #[error("Schedule overlaps an existing block: {0}")]
    ScheduleOverlap(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Doctors share their id with the corresponding user account, so
/// "doctor themselves" checks compare against the authenticated user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub license_number: Option<String>,
    pub is_active: bool,
}

impl Doctor {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Specialty {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub consultation_price: f64,
    pub is_active: bool,
}

/// One recurring working block for (doctor, weekday), 1 = Monday ..
/// 7 = Sunday. A doctor may hold several rows per weekday (morning and
/// afternoon blocks). `slot_minutes` is the single source of truth for
/// slot length within the block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorSchedule {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub doctor_id: Uuid,
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: i32,
    pub is_active: bool,
}

/// Blocking interval pulled from the appointments table (status
/// scheduled/confirmed) when computing a day's slots.
#[derive(Debug, Clone, Deserialize)]
pub struct BookedInterval {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Derived, never persisted.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct TimeSlot {
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub duration_minutes: i32,
    pub available: bool,
    pub label: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateScheduleRequest {
    pub day_of_week: i32,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub slot_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateScheduleRequest {
    pub start_time: Option<NaiveTime>,
    pub end_time: Option<NaiveTime>,
    pub slot_minutes: Option<i32>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize)]
pub struct AvailableSlotsQuery {
    pub date: NaiveDate,
    pub specialty_id: Option<Uuid>,
}
