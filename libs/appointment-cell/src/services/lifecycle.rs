use tracing::{debug, warn};

use crate::models::{AppointmentError, AppointmentStatus};

/// Appointment status state machine. There are no automatic transitions;
/// every move is an explicit request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        Ok(())
    }

    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        use AppointmentStatus::*;

        match current_status {
            Pending => vec![Approved, Cancelled],
            Approved => vec![Confirmed, Cancelled, Rescheduled],
            Confirmed => vec![Completed, NoShow, Cancelled, Rescheduled],
            Rescheduled => vec![Approved, Cancelled],
            // Terminal states
            Completed | Cancelled | NoShow => vec![],
        }
    }
}
