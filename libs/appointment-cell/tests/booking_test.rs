use assert_matches::assert_matches;

use appointment_cell::{
    AppointmentBookingService, AppointmentError, AppointmentListQuery, AppointmentStatus,
    CreateAppointmentRequest, RescheduleRequest, TransitionRequest,
};
use shared_models::auth::{Actor, UserRole};
use shared_utils::test_utils::{TestConfig, TestUser};
use shared_utils::AppState;
use staff_cell::{AvailabilityService, CreateAvailabilityRequest, CreateStaffProfileRequest, StaffProfileService};
use user_cell::{UpdateRoleRequest, UserService};

// 2099-06-01 is a Monday.
const MONDAY: &str = "2099-06-01";

struct Fixture {
    state: AppState,
    doctor: Actor,
    patient: Actor,
    admin: Actor,
}

async fn fixture() -> Fixture {
    let (state, _clock) = TestConfig::default().to_state();
    let users = UserService::new(&state);

    let doctor_user = users
        .ensure_user(&TestUser::staff("doc@example.com").to_user())
        .await
        .unwrap();
    let doctor = users
        .set_role(doctor_user.id, UpdateRoleRequest { role: UserRole::Doctor, sub_role: None })
        .await
        .unwrap()
        .to_actor();
    let patient = users
        .ensure_user(&TestUser::patient("p@example.com").to_user())
        .await
        .unwrap()
        .to_actor();
    let admin = users
        .ensure_user(&TestUser::admin().to_user())
        .await
        .unwrap()
        .to_actor();

    StaffProfileService::new(&state)
        .create_profile(&doctor, CreateStaffProfileRequest::default())
        .await
        .unwrap();
    AvailabilityService::new(&state)
        .add_slot(
            &doctor,
            CreateAvailabilityRequest {
                day_of_week: Some(1),
                start_time: "09:00".to_string(),
                end_time: "12:00".to_string(),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    Fixture { state, doctor, patient, admin }
}

fn request(fx: &Fixture, start: &str, end: &str) -> CreateAppointmentRequest {
    CreateAppointmentRequest {
        staff_id: fx.doctor.user_id,
        date: MONDAY.to_string(),
        start_time: start.to_string(),
        end_time: end.to_string(),
        reason: Some("Checkup".to_string()),
    }
}

fn move_to(status: AppointmentStatus) -> TransitionRequest {
    TransitionRequest { status, notes: None }
}

#[tokio::test]
async fn request_must_fit_a_slot() {
    let fx = fixture().await;
    let service = AppointmentBookingService::new(&fx.state);

    let outside = service
        .request_appointment(&fx.patient, request(&fx, "12:00", "12:30"))
        .await;
    assert_matches!(outside, Err(AppointmentError::SlotNotAvailable(_)));

    let booked = service
        .request_appointment(&fx.patient, request(&fx, "09:00", "09:30"))
        .await
        .unwrap();
    assert_eq!(booked.status, AppointmentStatus::Pending);
    assert_eq!(booked.patient_id, fx.patient.user_id);
}

#[tokio::test]
async fn overlapping_active_appointments_conflict_until_cancelled() {
    let fx = fixture().await;
    let service = AppointmentBookingService::new(&fx.state);

    let first = service
        .request_appointment(&fx.patient, request(&fx, "10:00", "10:30"))
        .await
        .unwrap();

    let overlapping = service
        .request_appointment(&fx.patient, request(&fx, "10:15", "10:45"))
        .await;
    assert_matches!(overlapping, Err(AppointmentError::ConflictDetected(id)) if id == first.id);

    service
        .request_appointment(&fx.patient, request(&fx, "10:30", "11:00"))
        .await
        .unwrap();

    service
        .transition(&fx.patient, first.id, move_to(AppointmentStatus::Cancelled))
        .await
        .unwrap();
    service
        .request_appointment(&fx.patient, request(&fx, "10:00", "10:30"))
        .await
        .unwrap();
}

#[tokio::test]
async fn assigned_staff_drives_the_state_machine() {
    let fx = fixture().await;
    let service = AppointmentBookingService::new(&fx.state);
    let appointment = service
        .request_appointment(&fx.patient, request(&fx, "09:00", "09:30"))
        .await
        .unwrap();

    assert_matches!(
        service
            .transition(&fx.patient, appointment.id, move_to(AppointmentStatus::Approved))
            .await,
        Err(AppointmentError::Permission(_))
    );
    assert_matches!(
        service
            .transition(&fx.doctor, appointment.id, move_to(AppointmentStatus::Confirmed))
            .await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );

    for status in [AppointmentStatus::Approved, AppointmentStatus::Confirmed, AppointmentStatus::Completed] {
        let moved = service
            .transition(&fx.doctor, appointment.id, move_to(status))
            .await
            .unwrap();
        assert_eq!(moved.status, status);
    }

    assert_matches!(
        service
            .transition(&fx.admin, appointment.id, move_to(AppointmentStatus::Cancelled))
            .await,
        Err(AppointmentError::InvalidStatusTransition { .. })
    );
}

#[tokio::test]
async fn reschedule_requires_reapproval_and_skips_own_window() {
    let fx = fixture().await;
    let service = AppointmentBookingService::new(&fx.state);
    let appointment = service
        .request_appointment(&fx.patient, request(&fx, "09:00", "09:30"))
        .await
        .unwrap();

    let early = service
        .reschedule(
            &fx.patient,
            appointment.id,
            RescheduleRequest {
                date: MONDAY.to_string(),
                start_time: "09:15".to_string(),
                end_time: "09:45".to_string(),
            },
        )
        .await;
    assert_matches!(early, Err(AppointmentError::InvalidStatusTransition { .. }));

    service
        .transition(&fx.doctor, appointment.id, move_to(AppointmentStatus::Approved))
        .await
        .unwrap();

    let moved = service
        .reschedule(
            &fx.patient,
            appointment.id,
            RescheduleRequest {
                date: MONDAY.to_string(),
                start_time: "09:15".to_string(),
                end_time: "09:45".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(moved.status, AppointmentStatus::Rescheduled);
    assert_eq!(moved.start_time, "09:15");

    let approved = service
        .transition(&fx.doctor, appointment.id, move_to(AppointmentStatus::Approved))
        .await
        .unwrap();
    assert_eq!(approved.status, AppointmentStatus::Approved);
}

#[tokio::test]
async fn listings_are_scoped_to_the_caller() {
    let fx = fixture().await;
    let service = AppointmentBookingService::new(&fx.state);
    let other_patient = UserService::new(&fx.state)
        .ensure_user(&TestUser::patient("other@example.com").to_user())
        .await
        .unwrap()
        .to_actor();

    let mine = service
        .request_appointment(&fx.patient, request(&fx, "09:00", "09:30"))
        .await
        .unwrap();
    service
        .request_appointment(&other_patient, request(&fx, "11:00", "11:30"))
        .await
        .unwrap();

    let patient_view = service
        .list_for_actor(&fx.patient, AppointmentListQuery::default())
        .await
        .unwrap();
    assert_eq!(patient_view.len(), 1);
    assert_eq!(patient_view[0].id, mine.id);

    assert_eq!(
        service
            .list_for_actor(&fx.doctor, AppointmentListQuery::default())
            .await
            .unwrap()
            .len(),
        2
    );

    assert_matches!(
        service.get_appointment(&other_patient, mine.id).await,
        Err(AppointmentError::Permission(_))
    );
    assert!(service.get_appointment(&fx.admin, mine.id).await.is_ok());
}
