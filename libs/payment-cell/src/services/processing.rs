use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{DbError, PostgrestClient};
use shared_models::auth::AuthenticatedUser;
use shared_utils::clock::ClinicClock;

use crate::models::{
    BillableAppointment, CreatePaymentRequest, Payment, PaymentError, PaymentMethod, PaymentStatus,
};
use crate::services::lifecycle::PaymentLifecycle;

/// Creates payments and drives them through settlement. The unique
/// index on `payments.appointment_id` backstops the duplicate
/// pre-check, so a lost create race surfaces as a duplicate payment
/// rather than a second row.
pub struct PaymentProcessingService {
    db: PostgrestClient,
    lifecycle: PaymentLifecycle,
    clock: ClinicClock,
}

impl PaymentProcessingService {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            db: PostgrestClient::new(config),
            lifecycle: PaymentLifecycle::new(),
            clock: ClinicClock::from_config(config),
        }
    }

    /// Opens a pending payment for an appointment. The amount is the
    /// appointment's price; the fee comes from the method's percentage,
    /// rounded to cents; the total is written alongside both so the
    /// stored row never disagrees with `amount + fee`.
    pub async fn create_payment(
        &self,
        request: CreatePaymentRequest,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Payment, PaymentError> {
        if request.payer_name.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "payer name is required".to_string(),
            ));
        }
        if !request.payer_email.contains('@') {
            return Err(PaymentError::ValidationError(format!(
                "payer email {} is not an email address",
                request.payer_email
            )));
        }

        let appointment = self
            .get_billable_appointment(request.appointment_id, auth_token)
            .await?;
        self.ensure_no_existing_payment(request.appointment_id, auth_token)
            .await?;
        let method = self
            .get_method(request.payment_method_id, auth_token)
            .await?;

        let amount = appointment.price;
        let processing_fee = round_cents(amount * method.processing_fee_percent / 100.0);
        let total_amount = round_cents(amount + processing_fee);

        let body = json!({
            "appointment_id": appointment.id,
            "payment_method_id": method.meta.id,
            "amount": amount,
            "processing_fee": processing_fee,
            "total_amount": total_amount,
            "status": PaymentStatus::Pending,
            "receipt_number": receipt_number(&self.clock),
            "payer_name": request.payer_name.trim(),
            "payer_email": request.payer_email.trim(),
            "created_by": actor.id,
        });

        debug!(
            appointment_id = %appointment.id,
            method = %method.name,
            amount,
            processing_fee,
            "Creating payment"
        );

        let rows: Vec<Payment> = self
            .db
            .request_with_headers(
                Method::POST,
                "/rest/v1/payments",
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::representation_headers()),
            )
            .await
            .map_err(|e| match e {
                DbError::UniqueViolation(_) => {
                    PaymentError::DuplicatePayment(request.appointment_id)
                }
                other => PaymentError::DatabaseError(other.to_string()),
            })?;

        let payment = rows
            .into_iter()
            .next()
            .ok_or_else(|| PaymentError::DatabaseError("insert returned no row".into()))?;

        info!(
            payment_id = %payment.meta.id,
            receipt = %payment.receipt_number,
            "Payment created"
        );
        Ok(payment)
    }

    pub async fn get_payment(
        &self,
        payment_id: Uuid,
        auth_token: &str,
    ) -> Result<Payment, PaymentError> {
        let path = format!("/rest/v1/payments?id=eq.{}&limit=1", payment_id);
        let rows: Vec<Payment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        rows.into_iter()
            .next()
            .ok_or(PaymentError::NotFound(payment_id))
    }

    pub async fn get_billable_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<BillableAppointment, PaymentError> {
        let path = format!(
            "/rest/v1/appointments?id=eq.{}&select=id,patient_id,price&limit=1",
            appointment_id
        );
        let rows: Vec<BillableAppointment> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        rows.into_iter()
            .next()
            .ok_or(PaymentError::AppointmentNotFound(appointment_id))
    }

    /// Settlement callback or manual reception validation: records the
    /// gateway reference and stamps the payment date.
    pub async fn mark_as_paid(
        &self,
        payment_id: Uuid,
        transaction_reference: &str,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Payment, PaymentError> {
        if transaction_reference.trim().is_empty() {
            return Err(PaymentError::ValidationError(
                "transaction reference is required".to_string(),
            ));
        }

        let payment = self.get_payment(payment_id, auth_token).await?;
        self.lifecycle
            .validate_transition(&payment.status, &PaymentStatus::Completed, "settle")?;

        let paid = self
            .patch_payment(
                payment_id,
                json!({
                    "status": PaymentStatus::Completed,
                    "transaction_reference": transaction_reference.trim(),
                    "payment_date": Utc::now(),
                    "updated_at": Utc::now(),
                    "updated_by": actor.id,
                }),
                auth_token,
            )
            .await?;

        info!(payment_id = %payment_id, "Payment settled");
        Ok(paid)
    }

    pub async fn mark_as_failed(
        &self,
        payment_id: Uuid,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Payment, PaymentError> {
        let payment = self.get_payment(payment_id, auth_token).await?;
        self.lifecycle
            .validate_transition(&payment.status, &PaymentStatus::Failed, "fail")?;

        self.patch_payment(
            payment_id,
            json!({
                "status": PaymentStatus::Failed,
                "payment_date": Utc::now(),
                "updated_at": Utc::now(),
                "updated_by": actor.id,
            }),
            auth_token,
        )
        .await
    }

    /// The original payment date is kept; only the status moves.
    pub async fn mark_as_refunded(
        &self,
        payment_id: Uuid,
        actor: &AuthenticatedUser,
        auth_token: &str,
    ) -> Result<Payment, PaymentError> {
        let payment = self.get_payment(payment_id, auth_token).await?;
        self.lifecycle
            .validate_transition(&payment.status, &PaymentStatus::Refunded, "refund")?;

        let refunded = self
            .patch_payment(
                payment_id,
                json!({
                    "status": PaymentStatus::Refunded,
                    "updated_at": Utc::now(),
                    "updated_by": actor.id,
                }),
                auth_token,
            )
            .await?;

        info!(payment_id = %payment_id, "Payment refunded");
        Ok(refunded)
    }

    async fn ensure_no_existing_payment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<(), PaymentError> {
        let path = format!(
            "/rest/v1/payments?appointment_id=eq.{}&select=id&limit=1",
            appointment_id
        );
        let rows: Vec<Value> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        if !rows.is_empty() {
            return Err(PaymentError::DuplicatePayment(appointment_id));
        }
        Ok(())
    }

    async fn get_method(
        &self,
        method_id: Uuid,
        auth_token: &str,
    ) -> Result<PaymentMethod, PaymentError> {
        let path = format!("/rest/v1/payment_methods?id=eq.{}&limit=1", method_id);
        let rows: Vec<PaymentMethod> = self
            .db
            .request(Method::GET, &path, Some(auth_token), None)
            .await
            .map_err(map_db_error)?;

        let method = rows
            .into_iter()
            .next()
            .ok_or(PaymentError::MethodNotFound(method_id))?;

        if !method.is_active {
            return Err(PaymentError::MethodInactive(method.name));
        }
        Ok(method)
    }

    async fn patch_payment(
        &self,
        payment_id: Uuid,
        body: Value,
        auth_token: &str,
    ) -> Result<Payment, PaymentError> {
        let path = format!("/rest/v1/payments?id=eq.{}", payment_id);
        let rows: Vec<Payment> = self
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
            .ok_or(PaymentError::NotFound(payment_id))
    }
}

fn map_db_error(err: DbError) -> PaymentError {
    PaymentError::DatabaseError(err.to_string())
}

/// Money stays in cents precision end to end.
pub(crate) fn round_cents(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// `REC-` + clinic-time timestamp + 4 random alphanumerics, e.g.
/// `REC-20260825143000-7QK2`.
fn receipt_number(clock: &ClinicClock) -> String {
    format!("REC-{}-{}", clock.timestamp_token(), receipt_suffix(4))
}

fn receipt_suffix(len: usize) -> String {
    use rand::Rng;

    const ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..len)
        .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_cents() {
        assert_eq!(round_cents(2.5), 2.5);
        assert_eq!(round_cents(3.14159), 3.14);
        assert_eq!(round_cents(0.999), 1.0);
        assert_eq!(round_cents(0.0), 0.0);
    }

    #[test]
    fn test_fee_is_percentage_of_amount() {
        assert_eq!(round_cents(100.0 * 2.5 / 100.0), 2.5);
        // Zero-fee methods leave the total equal to the amount.
        assert_eq!(round_cents(85.5 * 0.0 / 100.0), 0.0);
    }

    #[test]
    fn test_receipt_number_shape() {
        let receipt = receipt_number(&ClinicClock::new(-5));

        assert!(receipt.starts_with("REC-"));
        assert_eq!(receipt.len(), "REC-".len() + 14 + 1 + 4);

        let suffix = receipt.rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 4);
        assert!(suffix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
