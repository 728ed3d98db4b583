use reqwest::Method;
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::PostgrestClient;

use crate::models::{Doctor, DoctorError, Specialty};

/// Read access to doctor and specialty reference data. Doctor profiles are
/// managed elsewhere; booking and availability only need lookups plus the
/// doctor ↔ specialty link check.
pub struct DoctorService {
    db: PostgrestClient,
}

impl DoctorService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
        }
    }

    pub async fn get_doctor(&self, doctor_id: Uuid, auth_token: &str) -> Result<Doctor, DoctorError> {
        debug!(%doctor_id, "Fetching doctor");

        let path = format!("/rest/v1/doctors?id=eq.{}&limit=1", doctor_id);
        let rows: Vec<Doctor> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(DoctorError::DoctorNotFound(doctor_id))
    }

    /// Inactive specialties are hidden from booking rather than reported as
    /// a distinct case.
    pub async fn get_specialty(
        &self,
        specialty_id: Uuid,
        auth_token: &str,
    ) -> Result<Specialty, DoctorError> {
        debug!(%specialty_id, "Fetching specialty");

        let path = format!(
            "/rest/v1/specialties?id=eq.{}&is_active=eq.true&limit=1",
            specialty_id
        );
        let rows: Vec<Specialty> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        rows.into_iter()
            .next()
            .ok_or(DoctorError::SpecialtyNotFound(specialty_id))
    }

    /// Whether the doctor carries the specialty, via the `doctor_specialties`
    /// join table. Booking rejects requests for specialties the doctor does
    /// not hold.
    pub async fn doctor_has_specialty(
        &self,
        doctor_id: Uuid,
        specialty_id: Uuid,
        auth_token: &str,
    ) -> Result<bool, DoctorError> {
        let path = format!(
            "/rest/v1/doctor_specialties?doctor_id=eq.{}&specialty_id=eq.{}&select=doctor_id",
            doctor_id, specialty_id
        );
        let rows: Vec<serde_json::Value> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(|e| DoctorError::DatabaseError(e.to_string()))?;

        Ok(!rows.is_empty())
    }
}
