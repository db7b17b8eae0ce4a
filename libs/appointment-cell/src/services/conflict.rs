use std::sync::Arc;

use chrono::NaiveTime;
use tracing::{debug, warn};
use uuid::Uuid;

use shared_database::{decode_all, tables, DocumentStore, Query};
use shared_utils::validation::parse_time_of_day;
use shared_utils::AppState;

use crate::models::{Appointment, AppointmentError};

pub struct ConflictDetectionService {
    store: Arc<dyn DocumentStore>,
}

impl ConflictDetectionService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
        }
    }

    /// Returns the first active appointment of the staff member on `date`
    /// whose window overlaps `[start, end)`.
    pub async fn find_conflict(
        &self,
        staff_id: Uuid,
        date: &str,
        start: NaiveTime,
        end: NaiveTime,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<Option<Appointment>, AppointmentError> {
        debug!("Checking conflicts for staff {} on {} from {} to {}", staff_id, date, start, end);

        let query = Query::new()
            .eq("staffId", staff_id.to_string())
            .eq("date", date);
        let existing: Vec<Appointment> =
            decode_all(self.store.find(tables::APPOINTMENTS, &query).await?)?;

        for appointment in existing {
            if Some(appointment.id) == exclude_appointment_id || !appointment.status.is_active() {
                continue;
            }

            let other_start = parse_time_of_day("startTime", &appointment.start_time)?;
            let other_end = parse_time_of_day("endTime", &appointment.end_time)?;
            if appointments_overlap(start, end, other_start, other_end) {
                warn!("Conflict detected for staff {} with appointment {}", staff_id, appointment.id);
                return Ok(Some(appointment));
            }
        }

        Ok(None)
    }
}

/// Half-open intervals; back-to-back windows do not overlap.
pub fn appointments_overlap(
    start1: NaiveTime,
    end1: NaiveTime,
    start2: NaiveTime,
    end2: NaiveTime,
) -> bool {
    start1 < end2 && start2 < end1
}
