use std::sync::Arc;

use chrono::{Datelike, NaiveDate, NaiveTime};
use serde_json::{json, Map, Value};
use tracing::{debug, info};
use uuid::Uuid;

use shared_database::{decode, decode_all, tables, DocumentStore, Query, SortOrder, StoreError};
use shared_models::auth::{Actor, Capability};
use shared_models::error::{PermissionDenied, ValidationFailure};
use shared_utils::validation::{parse_date, parse_time_of_day, parse_time_range};
use shared_utils::{AppState, Clock};

use crate::models::{AvailableTime, CreateAvailabilityRequest, StaffError, UpdateAvailabilityRequest};

pub struct AvailabilityService {
    store: Arc<dyn DocumentStore>,
    clock: Arc<dyn Clock>,
}

impl AvailabilityService {
    pub fn new(state: &AppState) -> Self {
        Self {
            store: state.store.clone(),
            clock: state.clock.clone(),
        }
    }

    pub async fn add_slot(
        &self,
        actor: &Actor,
        request: CreateAvailabilityRequest,
    ) -> Result<AvailableTime, StaffError> {
        debug!("Adding availability slot for staff {}", actor.user_id);
        actor.require(Capability::ManageAvailability)?;

        let date = match (request.day_of_week, request.date.as_deref()) {
            (Some(day), None) if day <= 6 => None,
            (Some(day), None) => {
                return Err(ValidationFailure(format!("dayOfWeek must be 0-6, got {}", day)).into())
            }
            (None, Some(date)) => Some(parse_date("date", date)?.format("%Y-%m-%d").to_string()),
            _ => {
                return Err(ValidationFailure(
                    "Exactly one of dayOfWeek or date is required".to_string(),
                )
                .into())
            }
        };
        parse_time_range(&request.start_time, &request.end_time)?;

        let slot = AvailableTime {
            id: Uuid::new_v4(),
            staff_user_id: actor.user_id,
            day_of_week: request.day_of_week,
            is_recurring: request.day_of_week.is_some(),
            date,
            start_time: request.start_time.trim().to_string(),
            end_time: request.end_time.trim().to_string(),
            created_at: self.clock.now(),
            updated_at: None,
        };

        let stored = self
            .store
            .insert(
                tables::AVAILABLE_TIMES,
                serde_json::to_value(&slot).map_err(StoreError::from)?,
            )
            .await?;

        let slot: AvailableTime = decode(stored)?;
        info!("Availability slot {} added for staff {}", slot.id, slot.staff_user_id);
        Ok(slot)
    }

    pub async fn list_for_staff(&self, staff_user_id: Uuid) -> Result<Vec<AvailableTime>, StaffError> {
        debug!("Listing availability for staff {}", staff_user_id);

        let query = Query::new()
            .eq("staffUserId", staff_user_id.to_string())
            .order_by("startTime", SortOrder::Asc);
        let mut slots: Vec<AvailableTime> =
            decode_all(self.store.find(tables::AVAILABLE_TIMES, &query).await?)?;

        slots.sort_by(|a, b| {
            (a.day_of_week, &a.date, &a.start_time).cmp(&(b.day_of_week, &b.date, &b.start_time))
        });
        Ok(slots)
    }

    pub async fn get_slot(&self, slot_id: Uuid) -> Result<AvailableTime, StaffError> {
        self.store
            .get(tables::AVAILABLE_TIMES, &slot_id.to_string())
            .await?
            .map(decode)
            .transpose()?
            .ok_or_else(|| StaffError::NotFound(format!("Availability slot {} not found", slot_id)))
    }

    pub async fn update_slot(
        &self,
        actor: &Actor,
        slot_id: Uuid,
        request: UpdateAvailabilityRequest,
    ) -> Result<AvailableTime, StaffError> {
        let slot = self.get_slot(slot_id).await?;
        ensure_owner(actor, &slot)?;

        let start = request.start_time.unwrap_or(slot.start_time);
        let end = request.end_time.unwrap_or(slot.end_time);
        parse_time_range(&start, &end)?;

        let mut patch = Map::new();
        patch.insert("startTime".to_string(), json!(start.trim()));
        patch.insert("endTime".to_string(), json!(end.trim()));
        patch.insert("updatedAt".to_string(), json!(self.clock.now().timestamp_millis()));

        let updated = self
            .store
            .update(tables::AVAILABLE_TIMES, &slot_id.to_string(), Value::Object(patch))
            .await?
            .ok_or_else(|| StaffError::NotFound(format!("Availability slot {} not found", slot_id)))?;

        Ok(decode(updated)?)
    }

    pub async fn delete_slot(&self, actor: &Actor, slot_id: Uuid) -> Result<(), StaffError> {
        let slot = self.get_slot(slot_id).await?;
        ensure_owner(actor, &slot)?;

        self.store
            .delete_where(tables::AVAILABLE_TIMES, &Query::new().eq("id", slot_id.to_string()))
            .await?;

        info!("Availability slot {} deleted by {}", slot_id, actor.user_id);
        Ok(())
    }

    /// Finds a slot of the staff member that fully contains the window on
    /// the given date. One-off slots match by date, weekly ones by weekday.
    pub async fn find_covering_slot(
        &self,
        staff_user_id: Uuid,
        date: NaiveDate,
        start: NaiveTime,
        end: NaiveTime,
    ) -> Result<Option<AvailableTime>, StaffError> {
        let weekday = date.weekday().num_days_from_sunday() as u8;
        let date_text = date.format("%Y-%m-%d").to_string();

        for slot in self.list_for_staff(staff_user_id).await? {
            let applies = match (slot.day_of_week, slot.date.as_deref()) {
                (_, Some(slot_date)) => slot_date == date_text,
                (Some(day), None) => day == weekday,
                (None, None) => false,
            };
            if !applies {
                continue;
            }

            let slot_start = parse_time_of_day("startTime", &slot.start_time)?;
            let slot_end = parse_time_of_day("endTime", &slot.end_time)?;
            if slot_start <= start && end <= slot_end {
                return Ok(Some(slot));
            }
        }

        Ok(None)
    }
}

fn ensure_owner(actor: &Actor, slot: &AvailableTime) -> Result<(), PermissionDenied> {
    if slot.staff_user_id == actor.user_id || actor.role.is_admin() {
        Ok(())
    } else {
        Err(PermissionDenied("Only the owner can change this slot".to_string()))
    }
}
