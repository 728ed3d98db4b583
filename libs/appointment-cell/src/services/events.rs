use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::Appointment;

/// Notification triggers emitted after an appointment write commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentEvent {
    Booked,
    Cancelled,
    Completed,
}

impl AppointmentEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            AppointmentEvent::Booked => "appointment_booked",
            AppointmentEvent::Cancelled => "appointment_cancelled",
            AppointmentEvent::Completed => "appointment_completed",
        }
    }

    fn message(&self, appointment: &Appointment) -> String {
        match self {
            AppointmentEvent::Booked => format!(
                "Appointment booked for {} at {}",
                appointment.appointment_date,
                appointment.start_time.format("%H:%M"),
            ),
            AppointmentEvent::Cancelled => format!(
                "Appointment on {} at {} was cancelled",
                appointment.appointment_date,
                appointment.start_time.format("%H:%M"),
            ),
            AppointmentEvent::Completed => format!(
                "Appointment on {} was completed",
                appointment.appointment_date,
            ),
        }
    }
}

/// Queues a notification row without awaiting the write. Delivery is a
/// decoupled collaborator; a failed insert is logged and never fails the
/// request that triggered it.
pub fn publish_event(
    config: &AppConfig,
    auth_token: &str,
    event: AppointmentEvent,
    appointment: &Appointment,
) {
    let config = config.clone();
    let token = auth_token.to_string();
    let appointment = appointment.clone();

    tokio::spawn(async move {
        let db = PostgrestClient::new(&config);
        let body = json!({
            "event_type": event.event_type(),
            "appointment_id": appointment.meta.id,
            "patient_id": appointment.patient_id,
            "doctor_id": appointment.doctor_id,
            "message": event.message(&appointment),
        });

        let result: Result<Vec<Value>, _> = db
            .request_with_headers(
                Method::POST,
                "/rest/v1/notifications",
                Some(&token),
                Some(body),
                Some(PostgrestClient::representation_headers()),
            )
            .await;

        match result {
            Ok(_) => debug!(
                appointment_id = %appointment.meta.id,
                event = event.event_type(),
                "Notification queued"
            ),
            Err(e) => warn!(
                appointment_id = %appointment.meta.id,
                event = event.event_type(),
                "Failed to queue notification: {}",
                e
            ),
        }
    });
}
