use tracing::{debug, warn};

use crate::models::{PaymentError, PaymentStatus};

/// The payment state machine, free of I/O. Pending is the only state
/// with a choice of exits; completed can still be refunded; failed and
/// refunded are dead ends.
pub struct PaymentLifecycle;

impl PaymentLifecycle {
    pub fn new() -> Self {
        Self
    }

    pub fn valid_transitions(&self, current: &PaymentStatus) -> Vec<PaymentStatus> {
        match current {
            PaymentStatus::Pending => vec![PaymentStatus::Completed, PaymentStatus::Failed],
            PaymentStatus::Completed => vec![PaymentStatus::Refunded],
            PaymentStatus::Failed | PaymentStatus::Refunded => vec![],
        }
    }

    pub fn validate_transition(
        &self,
        current: &PaymentStatus,
        target: &PaymentStatus,
        action: &'static str,
    ) -> Result<(), PaymentError> {
        debug!(%current, %target, action, "Validating payment transition");

        if !self.valid_transitions(current).contains(target) {
            warn!(%current, %target, action, "Rejected payment transition");
            return Err(PaymentError::InvalidTransition {
                current: *current,
                action,
            });
        }
        Ok(())
    }
}

impl Default for PaymentLifecycle {
    fn default() -> Self {
        Self::new()
    }
}
