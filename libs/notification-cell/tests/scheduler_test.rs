use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use uuid::Uuid;

use notification_cell::models::{
    AppointmentRef, LifecycleEvent, NewNotificationTask, NotificationError, NotificationKind,
    NotificationTask,
};
use notification_cell::services::scheduler::NotificationScheduler;
use notification_cell::services::store::{InMemoryNotificationStore, NotificationStore};

fn fixed_time(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

fn appointment_ref(start_time: DateTime<Utc>) -> AppointmentRef {
    AppointmentRef {
        id: Uuid::new_v4(),
        patient_id: Uuid::new_v4(),
        practitioner_id: Uuid::new_v4(),
        therapy: "physiotherapy".to_string(),
        start_time,
    }
}

fn scheduler_with_memory() -> (NotificationScheduler, Arc<InMemoryNotificationStore>) {
    let store = InMemoryNotificationStore::shared();
    let scheduler = NotificationScheduler::new(Arc::clone(&store) as Arc<dyn NotificationStore>);
    (scheduler, store)
}

// ==============================================================================
// OFFSET TABLE
// ==============================================================================

#[test]
fn booked_event_produces_confirmation_reminder_and_instructions() {
    let (scheduler, _) = scheduler_with_memory();

    // Booked on the 10th for a session on the 15th at 10:00.
    let start = fixed_time(2024, 1, 15, 10, 0);
    let now = fixed_time(2024, 1, 10, 9, 30);
    let appointment = appointment_ref(start);

    let planned = scheduler.plan(
        &LifecycleEvent::Booked { appointment: appointment.clone() },
        now,
    );
    assert_eq!(planned.len(), 3);

    let find = |kind: NotificationKind| planned.iter().find(|t| t.kind == kind).unwrap();

    let confirmation = find(NotificationKind::AppointmentConfirmation);
    assert_eq!(confirmation.deliver_after, now);

    let reminder = find(NotificationKind::Reminder);
    assert_eq!(reminder.deliver_after, fixed_time(2024, 1, 15, 8, 0));

    let pre = find(NotificationKind::PreProcedure);
    assert_eq!(pre.deliver_after, now + Duration::hours(24));

    assert!(planned.iter().all(|t| t.user_id == appointment.patient_id));
    assert!(planned.iter().all(|t| t.appointment_id == Some(appointment.id)));
}

#[test]
fn pre_procedure_never_lands_after_the_session() {
    let (scheduler, _) = scheduler_with_memory();

    // Booked only three hours ahead: N + 24h is capped at T.
    let start = fixed_time(2024, 1, 15, 10, 0);
    let now = fixed_time(2024, 1, 15, 7, 0);

    let planned = scheduler.plan(
        &LifecycleEvent::Booked { appointment: appointment_ref(start) },
        now,
    );

    let pre = planned
        .iter()
        .find(|t| t.kind == NotificationKind::PreProcedure)
        .unwrap();
    assert_eq!(pre.deliver_after, start);
}

#[test]
fn completed_event_schedules_post_procedure_then_feedback() {
    let (scheduler, _) = scheduler_with_memory();

    let now = fixed_time(2024, 1, 15, 11, 0);
    let planned = scheduler.plan(
        &LifecycleEvent::Completed {
            appointment: appointment_ref(fixed_time(2024, 1, 15, 10, 0)),
        },
        now,
    );
    assert_eq!(planned.len(), 2);

    let post = planned
        .iter()
        .find(|t| t.kind == NotificationKind::PostProcedure)
        .unwrap();
    assert_eq!(post.deliver_after, now + Duration::hours(1));

    let feedback = planned
        .iter()
        .find(|t| t.kind == NotificationKind::FeedbackRequest)
        .unwrap();
    assert_eq!(feedback.deliver_after, now + Duration::hours(2));
}

#[test]
fn cancelled_event_notifies_immediately_with_the_reason() {
    let (scheduler, _) = scheduler_with_memory();

    let now = fixed_time(2024, 1, 12, 16, 45);
    let planned = scheduler.plan(
        &LifecycleEvent::Cancelled {
            appointment: appointment_ref(fixed_time(2024, 1, 15, 10, 0)),
            reason: Some("practitioner unavailable".to_string()),
        },
        now,
    );

    assert_eq!(planned.len(), 1);
    let task = &planned[0];
    assert_eq!(task.kind, NotificationKind::AppointmentCancellation);
    assert_eq!(task.deliver_after, now);
    assert!(task.message.contains("practitioner unavailable"));
}

#[test]
fn milestone_event_notifies_the_patient_immediately() {
    let (scheduler, _) = scheduler_with_memory();

    let patient_id = Uuid::new_v4();
    let now = fixed_time(2024, 3, 1, 12, 0);
    let planned = scheduler.plan(
        &LifecycleEvent::MilestoneReached {
            patient_id,
            therapy: "hydrotherapy".to_string(),
            milestone: "full range of motion".to_string(),
        },
        now,
    );

    assert_eq!(planned.len(), 1);
    let task = &planned[0];
    assert_eq!(task.kind, NotificationKind::TherapyProgress);
    assert_eq!(task.user_id, patient_id);
    assert_eq!(task.deliver_after, now);
    assert!(task.message.contains("full range of motion"));
}

#[test]
fn planning_is_deterministic_for_fixed_inputs() {
    let (scheduler, _) = scheduler_with_memory();

    let appointment = appointment_ref(fixed_time(2024, 1, 15, 10, 0));
    let now = fixed_time(2024, 1, 10, 9, 30);
    let event = LifecycleEvent::Booked { appointment };

    let first = scheduler.plan(&event, now);
    let second = scheduler.plan(&event, now);

    assert_eq!(first.len(), second.len());
    for (a, b) in first.iter().zip(second.iter()) {
        assert_eq!(a.kind, b.kind);
        assert_eq!(a.deliver_after, b.deliver_after);
        assert_eq!(a.title, b.title);
        assert_eq!(a.message, b.message);
        assert_eq!(a.channels, b.channels);
    }
}

// ==============================================================================
// DISPATCH
// ==============================================================================

#[tokio::test]
async fn dispatch_persists_every_planned_task() {
    let (scheduler, store) = scheduler_with_memory();

    let appointment = appointment_ref(Utc::now() + Duration::days(5));
    let created = scheduler
        .dispatch(
            &LifecycleEvent::Booked { appointment: appointment.clone() },
            Utc::now(),
            "token",
        )
        .await;

    assert_eq!(created.len(), 3);
    assert_eq!(store.tasks_for_appointment(appointment.id).len(), 3);
}

struct UnavailableStore;

#[async_trait]
impl NotificationStore for UnavailableStore {
    async fn insert(
        &self,
        _task: NewNotificationTask,
        _auth_token: &str,
    ) -> Result<NotificationTask, NotificationError> {
        Err(NotificationError::Store("store unavailable".to_string()))
    }

    async fn list_for_user(
        &self,
        _user_id: Uuid,
        _auth_token: &str,
    ) -> Result<Vec<NotificationTask>, NotificationError> {
        Err(NotificationError::Store("store unavailable".to_string()))
    }

    async fn mark_read(
        &self,
        _id: Uuid,
        _user_id: Uuid,
        _auth_token: &str,
    ) -> Result<NotificationTask, NotificationError> {
        Err(NotificationError::Store("store unavailable".to_string()))
    }

    async fn suppress_pending(
        &self,
        _appointment_id: Uuid,
        _auth_token: &str,
    ) -> Result<u32, NotificationError> {
        Err(NotificationError::Store("store unavailable".to_string()))
    }
}

#[tokio::test]
async fn dispatch_swallows_store_failures() {
    // A dead task store must never panic or propagate: the appointment
    // mutation that raised the event already succeeded.
    let scheduler = NotificationScheduler::new(Arc::new(UnavailableStore));

    let created = scheduler
        .dispatch(
            &LifecycleEvent::Cancelled {
                appointment: appointment_ref(Utc::now() + Duration::days(2)),
                reason: None,
            },
            Utc::now(),
            "token",
        )
        .await;

    assert!(created.is_empty());
}

#[tokio::test]
async fn read_flag_is_per_recipient() {
    let (scheduler, store) = scheduler_with_memory();

    let appointment = appointment_ref(Utc::now() + Duration::days(5));
    let created = scheduler
        .dispatch(
            &LifecycleEvent::Booked { appointment: appointment.clone() },
            Utc::now(),
            "token",
        )
        .await;

    let task = &created[0];

    // A different user cannot acknowledge the patient's notification.
    let stranger = Uuid::new_v4();
    let result = store.mark_read(task.id, stranger, "token").await;
    assert!(matches!(result, Err(NotificationError::Unauthorized)));

    let updated = store
        .mark_read(task.id, appointment.patient_id, "token")
        .await
        .unwrap();
    assert!(updated.read);
}
