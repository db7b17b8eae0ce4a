use std::collections::{BTreeSet, HashMap};

use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use shared_database::{decode, decode_all, tables, Query, StoreError};
use shared_models::error::ValidationFailure;
use shared_utils::validation::non_empty_trimmed;
use staff_cell::StaffProfileService;
use user_cell::UserService;

use crate::models::{room_key, MessagingError, Room, RoomSummary, RoomType};
use crate::services::realtime::RealtimeEvent;
use crate::services::unread::UnreadAggregator;
use crate::state::MessagingState;

pub struct RoomDirectory {
    state: MessagingState,
    users: UserService,
    profiles: StaffProfileService,
}

impl RoomDirectory {
    pub fn new(state: &MessagingState) -> Self {
        Self {
            users: UserService::new(&state.app),
            profiles: StaffProfileService::new(&state.app),
            state: state.clone(),
        }
    }

    pub async fn get_room(&self, room_id: Uuid) -> Result<Room, MessagingError> {
        self.state
            .app
            .store
            .get(tables::ROOMS, &room_id.to_string())
            .await?
            .map(decode)
            .transpose()?
            .ok_or(MessagingError::RoomNotFound(room_id))
    }

    /// Loads the room and checks that `user_id` takes part in it.
    pub async fn get_room_for_participant(
        &self,
        room_id: Uuid,
        user_id: Uuid,
    ) -> Result<Room, MessagingError> {
        let room = self.get_room(room_id).await?;
        require_participant(&room, user_id)?;
        Ok(room)
    }

    /// Returns the room for the unordered pair and type, creating it if
    /// needed. Symmetric in its arguments and safe under concurrent calls.
    pub async fn create_or_get_room(
        &self,
        user_a: Uuid,
        user_b: Uuid,
        room_type: RoomType,
    ) -> Result<Room, MessagingError> {
        debug!("Create-or-get {} room for {} and {}", room_type, user_a, user_b);

        if !room_type.is_paired() {
            return Err(ValidationFailure("Group rooms are created with a name and members".to_string()).into());
        }
        if user_a == user_b {
            return Err(ValidationFailure("A room needs two different participants".to_string()).into());
        }
        self.require_user(user_a).await?;
        self.require_user(user_b).await?;

        let (first, second) = if user_a <= user_b {
            (user_a, user_b)
        } else {
            (user_b, user_a)
        };
        // Imported rooms may predate `roomKey`; they still own the pair.
        if let Some(existing) = self.find_paired_room(first, second, room_type).await? {
            debug!("Reusing {} room {} for {} and {}", room_type, existing.id, first, second);
            return Ok(existing);
        }

        let now = self.state.app.clock.now().timestamp_millis();
        let document = json!({
            "userIds": [first, second],
            "type": room_type,
            "roomKey": room_key(first, second, room_type),
            "createdAt": now,
            "updatedAt": now,
        });

        let inserted = self
            .state
            .app
            .store
            .insert_if_absent(tables::ROOMS, "roomKey", document)
            .await?;
        let room: Room = decode(inserted.document)?;

        if inserted.created {
            info!("Created {} room {} for {} and {}", room.room_type, room.id, first, second);
            self.notify(&room, RealtimeEvent::RoomsChanged { room_id: room.id }).await;
        }
        Ok(room)
    }

    /// Opens a support room between the patient and the owner of the staff
    /// profile.
    pub async fn create_or_get_room_with_staff_profile(
        &self,
        patient_user_id: Uuid,
        staff_profile_id: Uuid,
    ) -> Result<Room, MessagingError> {
        let profile = self
            .profiles
            .find_by_id(staff_profile_id)
            .await?
            .ok_or(MessagingError::StaffProfileNotFound(staff_profile_id))?;

        self.create_or_get_room(patient_user_id, profile.user_id, RoomType::Support)
            .await
    }

    pub async fn create_group_room(
        &self,
        creator_id: Uuid,
        name: &str,
        member_ids: &[Uuid],
    ) -> Result<Room, MessagingError> {
        let name = non_empty_trimmed("name", name)?;
        let others: BTreeSet<Uuid> = member_ids
            .iter()
            .copied()
            .filter(|id| *id != creator_id)
            .collect();
        if others.len() < 2 {
            return Err(ValidationFailure("A group needs at least two other members".to_string()).into());
        }

        self.require_user(creator_id).await?;
        for member in &others {
            self.require_user(*member).await?;
        }

        let mut user_ids: Vec<Uuid> = others.into_iter().collect();
        user_ids.push(creator_id);
        user_ids.sort();

        let now = self.state.app.clock.now().timestamp_millis();
        let stored = self
            .state
            .app
            .store
            .insert(
                tables::ROOMS,
                json!({
                    "userIds": user_ids,
                    "type": RoomType::Group,
                    "name": name,
                    "createdAt": now,
                    "updatedAt": now,
                }),
            )
            .await?;

        let room: Room = decode(stored)?;
        info!("Created group room {} '{}' with {} members", room.id, name, room.user_ids.len());
        self.notify(&room, RealtimeEvent::RoomsChanged { room_id: room.id }).await;
        Ok(room)
    }

    pub async fn rename_room(
        &self,
        room_id: Uuid,
        user_id: Uuid,
        name: &str,
    ) -> Result<Room, MessagingError> {
        self.get_room_for_participant(room_id, user_id).await?;
        let name = non_empty_trimmed("name", name)?;

        let updated = self
            .state
            .app
            .store
            .update(
                tables::ROOMS,
                &room_id.to_string(),
                json!({
                    "name": name,
                    "updatedAt": self.state.app.clock.now().timestamp_millis(),
                }),
            )
            .await?
            .ok_or(MessagingError::RoomNotFound(room_id))?;

        let room: Room = decode(updated)?;
        self.notify(&room, RealtimeEvent::RoomsChanged { room_id }).await;
        Ok(room)
    }

    /// Summaries of every room the user takes part in, most recently active
    /// first.
    pub async fn list_rooms_for_user(&self, user_id: Uuid) -> Result<Vec<RoomSummary>, MessagingError> {
        debug!("Listing rooms for user {}", user_id);

        let rooms: Vec<Room> = decode_all(
            self.state
                .app
                .store
                .find(tables::ROOMS, &Query::new().contains("userIds", user_id.to_string()))
                .await?,
        )?;

        let participant_ids: Vec<Uuid> = rooms
            .iter()
            .flat_map(|room| room.user_ids.iter().copied())
            .collect();
        let snapshots = self.users.snapshots(&participant_ids).await?;
        let aggregator = UnreadAggregator::new(&self.state);

        let mut summaries = Vec::with_capacity(rooms.len());
        for room in rooms {
            let other_id = room.other_participant(user_id);
            let other_staff_profile = match other_id {
                Some(other) => self.profiles.find_by_user(other).await?,
                None => None,
            };

            summaries.push(RoomSummary {
                other_participant: other_id.and_then(|id| snapshots.get(&id).cloned()),
                other_staff_profile,
                participants: room
                    .user_ids
                    .iter()
                    .filter_map(|id| snapshots.get(id).cloned())
                    .collect(),
                latest_message: aggregator.latest_message_for_room(room.id).await?,
                unread_count: aggregator.count_unread(room.id, user_id).await?,
                room,
            });
        }

        summaries.sort_by(|a, b| b.activity_at().cmp(&a.activity_at()));
        Ok(summaries)
    }

    /// Deletes the room with its messages and typing entries.
    pub async fn delete_room(&self, room_id: Uuid, user_id: Uuid) -> Result<(), MessagingError> {
        let room = self.get_room_for_participant(room_id, user_id).await?;
        self.cascade_delete(&room).await?;

        info!("Room {} deleted by {}", room_id, user_id);
        self.notify(&room, RealtimeEvent::RoomsChanged { room_id }).await;
        Ok(())
    }

    /// Collapses two-party rooms that share a pair and type onto the oldest
    /// one. Returns the number of rooms removed.
    pub async fn cleanup_duplicate_rooms(&self) -> Result<usize, MessagingError> {
        let rooms: Vec<Room> = decode_all(self.state.app.store.find(tables::ROOMS, &Query::new()).await?)?;

        let mut groups: HashMap<String, Vec<Room>> = HashMap::new();
        for room in rooms.into_iter().filter(|room| room.user_ids.len() == 2) {
            let key = room_key(room.user_ids[0], room.user_ids[1], room.room_type);
            groups.entry(key).or_default().push(room);
        }

        let mut removed = 0;
        for (key, mut group) in groups {
            group.sort_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id)));

            if group.len() > 1 {
                warn!("Found {} rooms for {}, keeping {}", group.len(), key, group[0].id);
                for duplicate in group.iter().skip(1) {
                    self.cascade_delete(duplicate).await?;
                    self.notify(duplicate, RealtimeEvent::RoomsChanged { room_id: duplicate.id })
                        .await;
                    removed += 1;
                }
            }

            // Duplicates are gone, so the survivor can take the unique key.
            let survivor = &group[0];
            if survivor.room_type.is_paired() && survivor.room_key.as_deref() != Some(key.as_str()) {
                self.state
                    .app
                    .store
                    .update(tables::ROOMS, &survivor.id.to_string(), json!({ "roomKey": key }))
                    .await?;
                debug!("Backfilled room key on {}", survivor.id);
            }
        }

        if removed > 0 {
            info!("Removed {} duplicate rooms", removed);
        }
        Ok(removed)
    }

    /// Oldest two-party room of `room_type` for the pair, keyed or not.
    async fn find_paired_room(
        &self,
        first: Uuid,
        second: Uuid,
        room_type: RoomType,
    ) -> Result<Option<Room>, MessagingError> {
        let query = Query::new()
            .contains("userIds", first.to_string())
            .contains("userIds", second.to_string());
        let rooms: Vec<Room> = decode_all(self.state.app.store.find(tables::ROOMS, &query).await?)?;

        Ok(rooms
            .into_iter()
            .filter(|room| room.room_type == room_type && room.user_ids.len() == 2)
            .min_by(|a, b| (a.created_at, a.id).cmp(&(b.created_at, b.id))))
    }

    async fn cascade_delete(&self, room: &Room) -> Result<(), StoreError> {
        let store = &self.state.app.store;

        let messages = store
            .delete_where(tables::MESSAGES, &Query::new().eq("roomId", room.id.to_string()))
            .await?;
        let typing = self.state.typing.clear_room(room.id).await;
        store
            .delete_where(tables::ROOMS, &Query::new().eq("id", room.id.to_string()))
            .await?;

        debug!("Deleted room {} with {} messages and {} typing entries", room.id, messages, typing);
        Ok(())
    }

    async fn require_user(&self, user_id: Uuid) -> Result<(), MessagingError> {
        match self.users.find_by_id(user_id).await? {
            Some(_) => Ok(()),
            None => Err(MessagingError::UserNotFound(user_id)),
        }
    }

    async fn notify(&self, room: &Room, event: RealtimeEvent) {
        self.state.realtime.publish(&room.user_ids, event).await;
    }
}

pub(crate) fn require_participant(room: &Room, user_id: Uuid) -> Result<(), MessagingError> {
    if room.has_participant(user_id) {
        Ok(())
    } else {
        Err(MessagingError::NotParticipant {
            room_id: room.id,
            user_id,
        })
    }
}
