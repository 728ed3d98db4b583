use chrono::{NaiveDate, NaiveTime};
use tracing::{debug, warn};

use shared_utils::clock::ClinicClock;

use crate::models::{AppointmentError, AppointmentStatus};

/// The appointment state machine, kept free of I/O so the transition
/// table is testable in isolation. Scheduled and confirmed are the only
/// live states; completed, cancelled and no_show are terminal.
pub struct AppointmentLifecycle;

impl AppointmentLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn valid_transitions(&self, current: &AppointmentStatus) -> Vec<AppointmentStatus> {
        match current {
            AppointmentStatus::Scheduled => vec![
                AppointmentStatus::Confirmed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Confirmed => vec![
                AppointmentStatus::Completed,
                AppointmentStatus::Cancelled,
                AppointmentStatus::NoShow,
            ],
            AppointmentStatus::Completed
            | AppointmentStatus::Cancelled
            | AppointmentStatus::NoShow => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: &AppointmentStatus,
        target: &AppointmentStatus,
        action: &'static str,
    ) -> Result<(), AppointmentError> {
        debug!(%current, %target, action, "Validating status transition");

        if !self.valid_transitions(current).contains(target) {
            warn!(%current, %target, action, "Rejected status transition");
            return Err(AppointmentError::InvalidTransition {
                current: *current,
                action,
            });
        }
        Ok(())
    }

    /// No-show is an operator call, legal only once the booked moment is
    /// behind the clinic clock and the appointment is still pending.
    pub fn validate_no_show(
        &self,
        current: &AppointmentStatus,
        date: NaiveDate,
        start_time: NaiveTime,
        clock: &ClinicClock,
    ) -> Result<(), AppointmentError> {
        self.validate_transition(current, &AppointmentStatus::NoShow, "mark no-show on")?;

        if !clock.has_passed(date, start_time) {
            return Err(AppointmentError::NoShowTooEarly);
        }
        Ok(())
    }

    pub fn validate_reschedule(
        &self,
        current: &AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        if !current.can_reschedule() {
            warn!(%current, "Rejected reschedule");
            return Err(AppointmentError::InvalidTransition {
                current: *current,
                action: "reschedule",
            });
        }
        Ok(())
    }
}

impl Default for AppointmentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
