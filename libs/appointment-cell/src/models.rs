use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::meta::RecordMeta;

#[derive(Error, Debug)]
pub enum AppointmentError {
    #[error("Appointment not found: {0}")]
    NotFound(Uuid),

    #[error("Doctor not found: {0}")]
    DoctorNotFound(Uuid),

    #[error("Specialty not found: {0}")]
    SpecialtyNotFound(Uuid),

    #[error("Doctor {doctor_id} does not offer specialty {specialty_id}")]
    SpecialtyMismatch { doctor_id: Uuid, specialty_id: Uuid },

    #[error("No bookable slot at {0}")]
    SlotNotBookable(String),

    #[error("Slot already taken: {0}")]
    SlotTaken(String),

    #[error("Cannot {action} an appointment in status {current}")]
    InvalidTransition {
        current: AppointmentStatus,
        action: &'static str,
    },

    #[error("Cannot mark no-show before the appointment time has passed")]
    NoShowTooEarly,

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Closed status set; rows carrying anything else fail deserialization
/// at the persistence boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    /// Scheduled or confirmed: still occupies its slot and can still move.
    pub fn is_pending(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled | AppointmentStatus::Confirmed)
    }

    pub fn is_terminal(&self) -> bool {
        !self.is_pending()
    }

    pub fn can_confirm(&self) -> bool {
        matches!(self, AppointmentStatus::Scheduled)
    }

    pub fn can_cancel(&self) -> bool {
        self.is_pending()
    }

    /// Completion requires prior confirmation; scheduled never jumps
    /// straight to completed.
    pub fn can_complete(&self) -> bool {
        matches!(self, AppointmentStatus::Confirmed)
    }

    pub fn can_reschedule(&self) -> bool {
        self.is_pending()
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            AppointmentStatus::Scheduled => "scheduled",
            AppointmentStatus::Confirmed => "confirmed",
            AppointmentStatus::Completed => "completed",
            AppointmentStatus::Cancelled => "cancelled",
            AppointmentStatus::NoShow => "no_show",
        };
        write!(f, "{}", label)
    }
}

/// One booked consultation. `end_time` is pinned from the schedule
/// template's slot duration at booking time, so conflict checks and
/// display always agree with slot generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
    pub reason: String,
    pub price: f64,
    pub status: AppointmentStatus,
    pub cancellation_reason: Option<String>,
    pub follow_up_appointment_id: Option<Uuid>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub doctor_id: Uuid,
    pub specialty_id: Uuid,
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: String,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleAppointmentRequest {
    pub new_date: NaiveDate,
    pub new_start_time: NaiveTime,
}

/// Follow-up consultations reuse the original's doctor, patient and
/// specialty; only the moment and reason are chosen anew.
#[derive(Debug, Deserialize)]
pub struct FollowUpRequest {
    pub appointment_date: NaiveDate,
    pub start_time: NaiveTime,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct AppointmentSearchQuery {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        let status: AppointmentStatus = serde_json::from_str("\"no_show\"").unwrap();
        assert_eq!(status, AppointmentStatus::NoShow);
        assert_eq!(serde_json::to_string(&status).unwrap(), "\"no_show\"");
    }

    #[test]
    fn test_unknown_status_rejected() {
        assert!(serde_json::from_str::<AppointmentStatus>("\"in_progress\"").is_err());
    }

    #[test]
    fn test_pending_predicate() {
        assert!(AppointmentStatus::Scheduled.is_pending());
        assert!(AppointmentStatus::Confirmed.is_pending());
        assert!(!AppointmentStatus::Completed.is_pending());
        assert!(!AppointmentStatus::Cancelled.is_pending());
        assert!(!AppointmentStatus::NoShow.is_pending());
    }

    #[test]
    fn test_completion_requires_confirmation() {
        assert!(!AppointmentStatus::Scheduled.can_complete());
        assert!(AppointmentStatus::Confirmed.can_complete());
    }
}
