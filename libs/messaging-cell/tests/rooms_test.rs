mod common;

use assert_matches::assert_matches;
use chrono::Duration;
use futures::future::join_all;
use serde_json::json;
use uuid::Uuid;

use common::Fixture;
use messaging_cell::{room_key, MessageLog, MessagingError, RoomDirectory, RoomType, SendMessageRequest};
use shared_database::{tables, Query};
use shared_utils::Clock;

fn text(content: &str) -> SendMessageRequest {
    SendMessageRequest {
        content: content.to_string(),
        ..Default::default()
    }
}

#[tokio::test]
async fn create_or_get_is_symmetric_in_its_participants() {
    let fx = Fixture::new().await;
    let rooms = RoomDirectory::new(&fx.state);

    let first = rooms
        .create_or_get_room(fx.patient.user_id, fx.doctor.user_id, RoomType::Direct)
        .await
        .unwrap();
    let second = rooms
        .create_or_get_room(fx.doctor.user_id, fx.patient.user_id, RoomType::Direct)
        .await
        .unwrap();

    assert_eq!(first.id, second.id);
    let mut sorted = vec![fx.patient.user_id, fx.doctor.user_id];
    sorted.sort();
    assert_eq!(first.user_ids, sorted);

    // Same pair, different type is a different room.
    let support = rooms
        .create_or_get_room(fx.patient.user_id, fx.doctor.user_id, RoomType::Support)
        .await
        .unwrap();
    assert_ne!(support.id, first.id);
}

#[tokio::test]
async fn concurrent_creates_converge_on_one_room() {
    let fx = Fixture::new().await;

    let attempts = (0..10).map(|i| {
        let state = fx.state.clone();
        let (a, b) = if i % 2 == 0 {
            (fx.patient.user_id, fx.doctor.user_id)
        } else {
            (fx.doctor.user_id, fx.patient.user_id)
        };
        async move {
            RoomDirectory::new(&state)
                .create_or_get_room(a, b, RoomType::Direct)
                .await
                .unwrap()
                .id
        }
    });
    let ids = join_all(attempts).await;

    assert!(ids.iter().all(|id| *id == ids[0]));
    let stored = fx
        .state
        .app
        .store
        .count(tables::ROOMS, &Query::new())
        .await
        .unwrap();
    assert_eq!(stored, 1);
}

#[tokio::test]
async fn rooms_need_two_distinct_existing_users() {
    let fx = Fixture::new().await;
    let rooms = RoomDirectory::new(&fx.state);

    let own = rooms
        .create_or_get_room(fx.patient.user_id, fx.patient.user_id, RoomType::Direct)
        .await;
    assert_matches!(own, Err(MessagingError::Validation(_)));

    let ghost = Uuid::new_v4();
    let missing = rooms
        .create_or_get_room(fx.patient.user_id, ghost, RoomType::Direct)
        .await;
    assert_matches!(missing, Err(MessagingError::UserNotFound(id)) if id == ghost);

    let group = rooms
        .create_or_get_room(fx.patient.user_id, fx.doctor.user_id, RoomType::Group)
        .await;
    assert_matches!(group, Err(MessagingError::Validation(_)));
}

#[tokio::test]
async fn patient_opens_support_room_from_staff_profile() {
    let fx = Fixture::new().await;
    let rooms = RoomDirectory::new(&fx.state);

    let room = rooms
        .create_or_get_room_with_staff_profile(fx.patient.user_id, fx.doctor_profile.id)
        .await
        .unwrap();
    assert_eq!(room.room_type, RoomType::Support);
    assert!(room.has_participant(fx.doctor.user_id));

    MessageLog::new(&fx.state)
        .send_message(room.id, &fx.patient, text("Is my prescription ready?"))
        .await
        .unwrap();

    let listed = rooms.list_rooms_for_user(fx.doctor.user_id).await.unwrap();
    assert_eq!(listed.len(), 1);
    let summary = &listed[0];
    assert_eq!(summary.unread_count, 1);
    assert_eq!(
        summary.other_participant.as_ref().map(|u| u.id),
        Some(fx.patient.user_id)
    );
    assert_eq!(
        summary.latest_message.as_ref().map(|m| m.message.content.as_str()),
        Some("Is my prescription ready?")
    );

    let from_patient = rooms.list_rooms_for_user(fx.patient.user_id).await.unwrap();
    assert_eq!(from_patient[0].unread_count, 0);
    assert_eq!(
        from_patient[0].other_staff_profile.as_ref().map(|p| p.id),
        Some(fx.doctor_profile.id)
    );

    let unknown = rooms
        .create_or_get_room_with_staff_profile(fx.patient.user_id, Uuid::new_v4())
        .await;
    assert_matches!(unknown, Err(MessagingError::StaffProfileNotFound(_)));
}

#[tokio::test]
async fn listing_orders_rooms_by_latest_activity() {
    let fx = Fixture::new().await;
    let rooms = RoomDirectory::new(&fx.state);
    let log = MessageLog::new(&fx.state);

    let with_doctor = rooms
        .create_or_get_room(fx.patient.user_id, fx.doctor.user_id, RoomType::Direct)
        .await
        .unwrap();
    fx.clock.advance(Duration::seconds(5));
    let with_quinn = rooms
        .create_or_get_room(fx.patient.user_id, fx.other_patient.user_id, RoomType::Direct)
        .await
        .unwrap();

    let listed = rooms.list_rooms_for_user(fx.patient.user_id).await.unwrap();
    assert_eq!(listed[0].room.id, with_quinn.id);

    fx.clock.advance(Duration::seconds(5));
    log.send_message(with_doctor.id, &fx.doctor, text("Results are in"))
        .await
        .unwrap();

    let listed = rooms.list_rooms_for_user(fx.patient.user_id).await.unwrap();
    let order: Vec<Uuid> = listed.iter().map(|s| s.room.id).collect();
    assert_eq!(order, vec![with_doctor.id, with_quinn.id]);
}

#[tokio::test]
async fn group_rooms_need_a_name_and_two_other_members() {
    let fx = Fixture::new().await;
    let rooms = RoomDirectory::new(&fx.state);

    let too_small = rooms
        .create_group_room(fx.doctor.user_id, "Ward 3", &[fx.patient.user_id, fx.doctor.user_id])
        .await;
    assert_matches!(too_small, Err(MessagingError::Validation(_)));

    let unnamed = rooms
        .create_group_room(
            fx.doctor.user_id,
            "   ",
            &[fx.patient.user_id, fx.other_patient.user_id],
        )
        .await;
    assert_matches!(unnamed, Err(MessagingError::Validation(_)));

    let group = rooms
        .create_group_room(
            fx.doctor.user_id,
            " Ward 3 ",
            &[fx.patient.user_id, fx.other_patient.user_id],
        )
        .await
        .unwrap();
    assert_eq!(group.room_type, RoomType::Group);
    assert_eq!(group.user_ids.len(), 3);
    assert_eq!(group.name.as_deref(), Some("Ward 3"));
    assert!(group.room_key.is_none());

    let renamed = rooms
        .rename_room(group.id, fx.patient.user_id, "Ward 3 follow-up")
        .await
        .unwrap();
    assert_eq!(renamed.name.as_deref(), Some("Ward 3 follow-up"));

    let outsider = rooms.rename_room(group.id, fx.admin.user_id, "Nope").await;
    assert_matches!(outsider, Err(MessagingError::NotParticipant { .. }));
}

#[tokio::test]
async fn deleting_a_room_removes_its_messages_and_typing() {
    let fx = Fixture::new().await;
    let rooms = RoomDirectory::new(&fx.state);

    let room = rooms
        .create_or_get_room(fx.patient.user_id, fx.doctor.user_id, RoomType::Direct)
        .await
        .unwrap();
    MessageLog::new(&fx.state)
        .send_message(room.id, &fx.patient, text("hello"))
        .await
        .unwrap();
    fx.state.typing.set(room.id, fx.doctor.user_id, true).await;

    let outsider = rooms.delete_room(room.id, fx.other_patient.user_id).await;
    assert_matches!(outsider, Err(MessagingError::NotParticipant { .. }));

    rooms.delete_room(room.id, fx.patient.user_id).await.unwrap();

    assert_matches!(rooms.get_room(room.id).await, Err(MessagingError::RoomNotFound(_)));
    let remaining = fx
        .state
        .app
        .store
        .count(tables::MESSAGES, &Query::new().eq("roomId", room.id.to_string()))
        .await
        .unwrap();
    assert_eq!(remaining, 0);
    assert!(fx.state.typing.is_empty().await);
}

#[tokio::test]
async fn cleanup_keeps_the_oldest_duplicate() {
    let fx = Fixture::new().await;
    let store = &fx.state.app.store;
    let now = fx.clock.now().timestamp_millis();

    // Duplicates as left behind by racing clients before the unique key existed.
    let mut pair = vec![fx.patient.user_id, fx.doctor.user_id];
    pair.sort();
    let older = Uuid::new_v4();
    let newer = Uuid::new_v4();
    for (id, created_at) in [(newer, now + 1_000), (older, now)] {
        store
            .insert(
                tables::ROOMS,
                json!({
                    "id": id,
                    "userIds": pair,
                    "type": "direct",
                    "createdAt": created_at,
                }),
            )
            .await
            .unwrap();
    }
    store
        .insert(
            tables::MESSAGES,
            json!({
                "roomId": newer,
                "senderId": fx.patient.user_id,
                "content": "lost in the duplicate",
                "createdAt": now + 2_000,
            }),
        )
        .await
        .unwrap();

    fx.state.typing.set(newer, fx.doctor.user_id, true).await;
    fx.state.typing.set(older, fx.patient.user_id, true).await;

    let rooms = RoomDirectory::new(&fx.state);
    assert_eq!(rooms.cleanup_duplicate_rooms().await.unwrap(), 1);
    assert_eq!(rooms.cleanup_duplicate_rooms().await.unwrap(), 0);

    assert!(rooms.get_room(older).await.is_ok());
    assert_matches!(rooms.get_room(newer).await, Err(MessagingError::RoomNotFound(_)));
    let orphaned = store
        .count(tables::MESSAGES, &Query::new().eq("roomId", newer.to_string()))
        .await
        .unwrap();
    assert_eq!(orphaned, 0);

    assert!(fx.state.typing.typing_in_room(newer, None).await.is_empty());
    assert_eq!(fx.state.typing.typing_in_room(older, None).await.len(), 1);
    assert_eq!(fx.state.typing.len().await, 1);
}

#[tokio::test]
async fn imported_room_without_key_is_reused_and_backfilled() {
    let fx = Fixture::new().await;
    let store = &fx.state.app.store;

    let mut pair = vec![fx.patient.user_id, fx.doctor.user_id];
    pair.sort();
    let imported = Uuid::new_v4();
    store
        .insert(
            tables::ROOMS,
            json!({
                "id": imported,
                "userIds": pair,
                "type": "direct",
                "createdAt": fx.clock.now().timestamp_millis(),
            }),
        )
        .await
        .unwrap();

    let rooms = RoomDirectory::new(&fx.state);
    let found = rooms
        .create_or_get_room(fx.doctor.user_id, fx.patient.user_id, RoomType::Direct)
        .await
        .unwrap();
    assert_eq!(found.id, imported);

    let direct_rooms = store
        .count(tables::ROOMS, &Query::new().eq("type", "direct"))
        .await
        .unwrap();
    assert_eq!(direct_rooms, 1);

    // A support room for the same pair is still its own room.
    let support = rooms
        .create_or_get_room(fx.patient.user_id, fx.doctor.user_id, RoomType::Support)
        .await
        .unwrap();
    assert_ne!(support.id, imported);

    assert_eq!(rooms.cleanup_duplicate_rooms().await.unwrap(), 0);
    let backfilled = rooms.get_room(imported).await.unwrap();
    assert_eq!(
        backfilled.room_key,
        Some(room_key(fx.patient.user_id, fx.doctor.user_id, RoomType::Direct))
    );
}

#[tokio::test]
async fn cleanup_keeps_imported_room_over_newer_keyed_one() {
    let fx = Fixture::new().await;
    let store = &fx.state.app.store;
    let now = fx.clock.now().timestamp_millis();

    let mut pair = vec![fx.patient.user_id, fx.doctor.user_id];
    pair.sort();
    let imported = Uuid::new_v4();
    let keyed = Uuid::new_v4();
    store
        .insert(
            tables::ROOMS,
            json!({
                "id": imported,
                "userIds": pair,
                "type": "direct",
                "createdAt": now,
            }),
        )
        .await
        .unwrap();
    store
        .insert(
            tables::ROOMS,
            json!({
                "id": keyed,
                "userIds": pair,
                "type": "direct",
                "roomKey": room_key(pair[0], pair[1], RoomType::Direct),
                "createdAt": now + 1_000,
            }),
        )
        .await
        .unwrap();

    let rooms = RoomDirectory::new(&fx.state);
    assert_eq!(rooms.cleanup_duplicate_rooms().await.unwrap(), 1);
    assert_matches!(rooms.get_room(keyed).await, Err(MessagingError::RoomNotFound(_)));

    let again = rooms
        .create_or_get_room(fx.patient.user_id, fx.doctor.user_id, RoomType::Direct)
        .await
        .unwrap();
    assert_eq!(again.id, imported);
    assert!(again.room_key.is_some());
    assert_eq!(rooms.cleanup_duplicate_rooms().await.unwrap(), 0);
}
