use std::sync::Arc;

use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{decode, decode_all, tables, DocumentStore, Query, StoreError};
use shared_models::auth::{Actor, Capability};
use shared_models::error::{PermissionDenied, ValidationFailure};
use shared_utils::validation::{parse_date, parse_time_range};
use shared_utils::{AppState, Clock};
use staff_cell::{AvailabilityService, StaffProfileService};

use crate::models::{
    Appointment, AppointmentError, AppointmentListQuery, AppointmentStatus, CreateAppointmentRequest,
    RescheduleRequest, TransitionRequest,
};
use crate::services::conflict::ConflictDetectionService;
use crate::services::lifecycle::AppointmentLifecycleService;

pub struct AppointmentBookingService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
    profiles: StaffProfileService,
    availability: AvailabilityService,
    conflicts: ConflictDetectionService,
    lifecycle: AppointmentLifecycleService,
}

impl AppointmentBookingService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
            profiles: StaffProfileService::new(state),
            availability: AvailabilityService::new(state),
            conflicts: ConflictDetectionService::new(state),
            lifecycle: AppointmentLifecycleService::new(),
        }
    }

    /// Books a pending appointment inside one of the staff member's slots.
    pub async fn request_appointment(
        &self,
        actor: &Actor,
        request: CreateAppointmentRequest,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Patient {} requesting appointment with staff {}", actor.user_id, request.staff_id);
        actor.require(Capability::RequestAppointments)?;

        if request.staff_id == actor.user_id {
            return Err(ValidationFailure("Cannot book an appointment with yourself".to_string()).into());
        }

        let profile = self.profiles.get_profile_for_user(request.staff_id).await?;
        if !profile.is_available {
            return Err(AppointmentError::SlotNotAvailable(format!(
                "Staff {} is not accepting appointments",
                request.staff_id
            )));
        }

        let date = self
            .check_window(
                request.staff_id,
                &request.date,
                &request.start_time,
                &request.end_time,
                None,
            )
            .await?;

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: actor.user_id,
            staff_id: request.staff_id,
            date,
            start_time: request.start_time.trim().to_string(),
            end_time: request.end_time.trim().to_string(),
            reason: request.reason.map(|r| r.trim().to_string()).filter(|r| !r.is_empty()),
            status: AppointmentStatus::Pending,
            notes: None,
            created_at: self.clock.now(),
            updated_at: None,
        };

        let stored = self
            .store
            .insert(
                tables::APPOINTMENTS,
                serde_json::to_value(&appointment).map_err(StoreError::from)?,
            )
            .await?;

        let appointment: Appointment = decode(stored)?;
        info!(
            "Appointment {} requested by {} with {} on {} {}-{}",
            appointment.id,
            appointment.patient_id,
            appointment.staff_id,
            appointment.date,
            appointment.start_time,
            appointment.end_time
        );
        Ok(appointment)
    }

    /// Appointments visible to the caller, in chronological order.
    pub async fn list_for_actor(
        &self,
        actor: &Actor,
        filter: AppointmentListQuery,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for {}", actor.user_id);

        let mut query = if actor.can(Capability::ViewAllAppointments) {
            Query::new()
        } else if actor.role.is_staff() {
            Query::new().eq("staffId", actor.user_id.to_string())
        } else {
            Query::new().eq("patientId", actor.user_id.to_string())
        };
        if let Some(status) = filter.status {
            query = query.eq("status", status.to_string());
        }

        let mut appointments: Vec<Appointment> =
            decode_all(self.store.find(tables::APPOINTMENTS, &query).await?)?;
        appointments.sort_by(|a, b| (&a.date, &a.start_time).cmp(&(&b.date, &b.start_time)));
        Ok(appointments)
    }

    pub async fn get_appointment(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;

        let visible = appointment.patient_id == actor.user_id
            || appointment.staff_id == actor.user_id
            || actor.can(Capability::ViewAllAppointments);
        if !visible {
            return Err(PermissionDenied("Not a party to this appointment".to_string()).into());
        }

        Ok(appointment)
    }

    /// Moves the appointment through the state machine. The assigned staff
    /// member or an admin may make any valid move; the patient may only
    /// cancel their own booking.
    pub async fn transition(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: TransitionRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;

        let is_assigned_staff =
            appointment.staff_id == actor.user_id && actor.can(Capability::ManageAppointments);
        let is_admin = actor.can(Capability::ViewAllAppointments) && actor.can(Capability::ManageAppointments);
        let is_patient_cancelling =
            appointment.patient_id == actor.user_id && request.status == AppointmentStatus::Cancelled;

        if !(is_assigned_staff || is_admin || is_patient_cancelling) {
            warn!("User {} may not move appointment {} to {}", actor.user_id, appointment_id, request.status);
            return Err(PermissionDenied("Not allowed to change this appointment".to_string()).into());
        }
        if request.status == AppointmentStatus::Rescheduled {
            return Err(ValidationFailure("Use the reschedule operation to pick a new time".to_string()).into());
        }

        self.lifecycle
            .validate_status_transition(appointment.status, request.status)?;

        let mut patch = Map::new();
        patch.insert("status".to_string(), json!(request.status));
        if let Some(notes) = request.notes {
            let notes = notes.trim();
            patch.insert(
                "notes".to_string(),
                if notes.is_empty() { Value::Null } else { json!(notes) },
            );
        }

        let updated = self.apply_patch(appointment_id, patch).await?;
        info!("Appointment {} moved from {} to {}", appointment_id, appointment.status, updated.status);
        Ok(updated)
    }

    /// Moves an approved or confirmed appointment to a new window. The
    /// appointment lands in `rescheduled` and needs approval again.
    pub async fn reschedule(
        &self,
        actor: &Actor,
        appointment_id: Uuid,
        request: RescheduleRequest,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.load(appointment_id).await?;

        let is_party = appointment.patient_id == actor.user_id || appointment.staff_id == actor.user_id;
        if !is_party && !actor.can(Capability::ViewAllAppointments) {
            return Err(PermissionDenied("Not a party to this appointment".to_string()).into());
        }

        self.lifecycle
            .validate_status_transition(appointment.status, AppointmentStatus::Rescheduled)?;

        let date = self
            .check_window(
                appointment.staff_id,
                &request.date,
                &request.start_time,
                &request.end_time,
                Some(appointment_id),
            )
            .await?;

        let mut patch = Map::new();
        patch.insert("date".to_string(), json!(date));
        patch.insert("startTime".to_string(), json!(request.start_time.trim()));
        patch.insert("endTime".to_string(), json!(request.end_time.trim()));
        patch.insert("status".to_string(), json!(AppointmentStatus::Rescheduled));

        let updated = self.apply_patch(appointment_id, patch).await?;
        info!(
            "Appointment {} rescheduled to {} {}-{}",
            appointment_id, updated.date, updated.start_time, updated.end_time
        );
        Ok(updated)
    }

    /// Validates the window, requires a covering slot and rejects overlaps.
    /// Returns the normalized date.
    async fn check_window(
        &self,
        staff_id: Uuid,
        date: &str,
        start_time: &str,
        end_time: &str,
        exclude_appointment_id: Option<Uuid>,
    ) -> Result<String, AppointmentError> {
        let day = parse_date("date", date)?;
        let (start, end) = parse_time_range(start_time, end_time)?;

        if day < self.clock.now().date_naive() {
            return Err(ValidationFailure("Appointments cannot be booked in the past".to_string()).into());
        }

        if self
            .availability
            .find_covering_slot(staff_id, day, start, end)
            .await?
            .is_none()
        {
            return Err(AppointmentError::SlotNotAvailable(format!(
                "{} {}-{} is outside the staff member's availability",
                date, start_time, end_time
            )));
        }

        let date = day.format("%Y-%m-%d").to_string();
        if let Some(existing) = self
            .conflicts
            .find_conflict(staff_id, &date, start, end, exclude_appointment_id)
            .await?
        {
            return Err(AppointmentError::ConflictDetected(existing.id));
        }

        Ok(date)
    }

    async fn load(&self, appointment_id: Uuid) -> Result<Appointment, AppointmentError> {
        self.store
            .get(tables::APPOINTMENTS, &appointment_id.to_string())
            .await?
            .map(decode)
            .transpose()?
            .ok_or_else(|| AppointmentError::NotFound(appointment_id.to_string()))
    }

    async fn apply_patch(
        &self,
        appointment_id: Uuid,
        mut patch: Map<String, Value>,
    ) -> Result<Appointment, AppointmentError> {
        patch.insert("updatedAt".to_string(), json!(self.clock.now().timestamp_millis()));

        let updated = self
            .store
            .update(tables::APPOINTMENTS, &appointment_id.to_string(), Value::Object(patch))
            .await?
            .ok_or_else(|| AppointmentError::NotFound(appointment_id.to_string()))?;

        Ok(decode(updated)?)
    }
}
