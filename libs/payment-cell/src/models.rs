use std::fmt;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use shared_models::meta::RecordMeta;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Payment not found: {0}")]
    NotFound(Uuid),

    #[error("Appointment not found: {0}")]
    AppointmentNotFound(Uuid),

    #[error("Payment method not found: {0}")]
    MethodNotFound(Uuid),

    #[error("Payment method {0} is not accepting payments")]
    MethodInactive(String),

    #[error("Appointment {0} already has a payment")]
    DuplicatePayment(Uuid),

    #[error("Cannot {action} a payment in status {current}")]
    InvalidTransition {
        current: PaymentStatus,
        action: &'static str,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Closed status set; rows carrying anything else fail deserialization
/// at the persistence boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
    Refunded,
}

impl PaymentStatus {
    pub fn is_pending(&self) -> bool {
        matches!(self, PaymentStatus::Pending)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, PaymentStatus::Completed)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, PaymentStatus::Failed)
    }

    /// Only settled money can come back out.
    pub fn can_refund(&self) -> bool {
        self.is_completed()
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Completed => "completed",
            PaymentStatus::Failed => "failed",
            PaymentStatus::Refunded => "refunded",
        };
        write!(f, "{}", label)
    }
}

/// One payment, tied 1:1 to an appointment by a unique foreign key.
/// `total_amount` always equals `amount + processing_fee`; both are
/// written together in every mutation so the column is never stale.
/// `transaction_reference` and `payment_date` stay null until settled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Payment {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub appointment_id: Uuid,
    pub payment_method_id: Uuid,
    pub amount: f64,
    pub processing_fee: f64,
    pub total_amount: f64,
    pub transaction_reference: Option<String>,
    pub payment_date: Option<DateTime<Utc>>,
    pub status: PaymentStatus,
    pub receipt_number: String,
    pub payer_name: String,
    pub payer_email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentMethod {
    #[serde(flatten)]
    pub meta: RecordMeta,
    pub name: String,
    pub method_type: String,
    pub processing_fee_percent: f64,
    pub is_active: bool,
}

/// The slice of an appointment the payment workflow needs: its price
/// becomes the payment amount, its patient gates who may pay. Loaded
/// explicitly instead of holding a reference to the full record.
#[derive(Debug, Clone, Deserialize)]
pub struct BillableAppointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub price: f64,
}

#[derive(Debug, Deserialize)]
pub struct CreatePaymentRequest {
    pub appointment_id: Uuid,
    pub payment_method_id: Uuid,
    pub payer_name: String,
    pub payer_email: String,
}

#[derive(Debug, Deserialize)]
pub struct ConfirmPaymentRequest {
    pub transaction_reference: String,
}

/// Both bounds are inclusive calendar dates in clinic time.
#[derive(Debug, Deserialize)]
pub struct RevenueQuery {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct RevenueSummary {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
    pub total_collected: f64,
    pub total_fees: f64,
    pub net_revenue: f64,
    pub counts: StatusCounts,
    pub by_method: Vec<MethodRevenue>,
}

#[derive(Debug, Default, PartialEq, Serialize)]
pub struct StatusCounts {
    pub pending: usize,
    pub completed: usize,
    pub failed: usize,
    pub refunded: usize,
}

#[derive(Debug, PartialEq, Serialize)]
pub struct MethodRevenue {
    pub method_type: String,
    pub count: usize,
    pub total: f64,
}
