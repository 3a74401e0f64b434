// libs/notification-cell/src/services/scheduler.rs
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info, warn};

use crate::models::{
    AppointmentRef, ChannelFlags, LifecycleEvent, NewNotificationTask, NotificationKind,
    NotificationTask,
};
use crate::services::store::NotificationStore;
use crate::templates;

const CATEGORY_APPOINTMENTS: &str = "appointments";
const CATEGORY_INSTRUCTIONS: &str = "instructions";
const CATEGORY_FEEDBACK: &str = "feedback";
const CATEGORY_PROGRESS: &str = "progress";

/// Derives notification tasks from appointment lifecycle events.
///
/// Planning is a pure function of (event, now); persistence is best-effort
/// and must never fail the mutation that raised the event.
#[derive(Clone)]
pub struct NotificationScheduler {
    store: Arc<dyn NotificationStore>,
}

impl NotificationScheduler {
    pub fn new(store: Arc<dyn NotificationStore>) -> Self {
        Self { store }
    }

    /// The deterministic offset table. `T` is the appointment start, `N` the
    /// event time; deliver times are derived here and nowhere else.
    pub fn plan(&self, event: &LifecycleEvent, now: DateTime<Utc>) -> Vec<NewNotificationTask> {
        match event {
            LifecycleEvent::Booked { appointment } => vec![
                self.confirmation_task(appointment, now),
                self.reminder_task(appointment),
                self.pre_procedure_task(appointment, now),
            ],
            LifecycleEvent::Cancelled { appointment, reason } => {
                vec![self.cancellation_task(appointment, reason.as_deref(), now)]
            }
            LifecycleEvent::Completed { appointment } => vec![
                self.post_procedure_task(appointment, now),
                self.feedback_request_task(appointment, now),
            ],
            LifecycleEvent::MilestoneReached { patient_id, therapy, milestone } => {
                vec![NewNotificationTask {
                    user_id: *patient_id,
                    kind: NotificationKind::TherapyProgress,
                    appointment_id: None,
                    title: templates::progress_title(therapy),
                    message: templates::progress_message(therapy, milestone),
                    category: CATEGORY_PROGRESS.to_string(),
                    deliver_after: now,
                    channels: ChannelFlags::in_app_only(),
                }]
            }
        }
    }

    /// Plans and persists the event's tasks. Store failures are logged and
    /// swallowed; the triggering appointment mutation has already succeeded
    /// and must stay that way.
    pub async fn dispatch(
        &self,
        event: &LifecycleEvent,
        now: DateTime<Utc>,
        auth_token: &str,
    ) -> Vec<NotificationTask> {
        if let LifecycleEvent::Cancelled { appointment, .. } = event {
            match self.store.suppress_pending(appointment.id, auth_token).await {
                Ok(affected) if affected > 0 => {
                    info!(
                        "Suppressed {} pending notifications for cancelled appointment {}",
                        affected, appointment.id
                    );
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(
                        "Notification delivery deferred: failed to suppress tasks for appointment {}: {}",
                        appointment.id, e
                    );
                }
            }
        }

        let planned = self.plan(event, now);
        let mut created = Vec::with_capacity(planned.len());

        for task in planned {
            let kind = task.kind.clone();
            match self.store.insert(task, auth_token).await {
                Ok(stored) => {
                    debug!("Scheduled {} notification {}", kind, stored.id);
                    created.push(stored);
                }
                Err(e) => {
                    warn!("Notification delivery deferred: failed to create {} task: {}", kind, e);
                }
            }
        }

        created
    }

    fn confirmation_task(&self, appointment: &AppointmentRef, now: DateTime<Utc>) -> NewNotificationTask {
        NewNotificationTask {
            user_id: appointment.patient_id,
            kind: NotificationKind::AppointmentConfirmation,
            appointment_id: Some(appointment.id),
            title: templates::confirmation_title(&appointment.therapy),
            message: templates::confirmation_message(&appointment.therapy, appointment.start_time),
            category: CATEGORY_APPOINTMENTS.to_string(),
            deliver_after: now,
            channels: ChannelFlags::email_and_in_app(),
        }
    }

    fn reminder_task(&self, appointment: &AppointmentRef) -> NewNotificationTask {
        NewNotificationTask {
            user_id: appointment.patient_id,
            kind: NotificationKind::Reminder,
            appointment_id: Some(appointment.id),
            title: templates::reminder_title(&appointment.therapy),
            message: templates::reminder_message(&appointment.therapy, appointment.start_time),
            category: CATEGORY_APPOINTMENTS.to_string(),
            deliver_after: appointment.start_time - Duration::hours(2),
            channels: ChannelFlags::all(),
        }
    }

    fn pre_procedure_task(&self, appointment: &AppointmentRef, now: DateTime<Utc>) -> NewNotificationTask {
        // A day after booking, but never later than the session itself.
        let deliver_after = (now + Duration::hours(24)).min(appointment.start_time);

        NewNotificationTask {
            user_id: appointment.patient_id,
            kind: NotificationKind::PreProcedure,
            appointment_id: Some(appointment.id),
            title: templates::pre_procedure_title(&appointment.therapy),
            message: templates::pre_procedure_message(&appointment.therapy),
            category: CATEGORY_INSTRUCTIONS.to_string(),
            deliver_after,
            channels: ChannelFlags::email_and_in_app(),
        }
    }

    fn cancellation_task(
        &self,
        appointment: &AppointmentRef,
        reason: Option<&str>,
        now: DateTime<Utc>,
    ) -> NewNotificationTask {
        NewNotificationTask {
            user_id: appointment.patient_id,
            kind: NotificationKind::AppointmentCancellation,
            appointment_id: Some(appointment.id),
            title: templates::cancellation_title(&appointment.therapy),
            message: templates::cancellation_message(&appointment.therapy, appointment.start_time, reason),
            category: CATEGORY_APPOINTMENTS.to_string(),
            deliver_after: now,
            channels: ChannelFlags::email_and_in_app(),
        }
    }

    fn post_procedure_task(&self, appointment: &AppointmentRef, now: DateTime<Utc>) -> NewNotificationTask {
        NewNotificationTask {
            user_id: appointment.patient_id,
            kind: NotificationKind::PostProcedure,
            appointment_id: Some(appointment.id),
            title: templates::post_procedure_title(&appointment.therapy),
            message: templates::post_procedure_message(&appointment.therapy),
            category: CATEGORY_INSTRUCTIONS.to_string(),
            deliver_after: now + Duration::hours(1),
            channels: ChannelFlags::email_and_in_app(),
        }
    }

    fn feedback_request_task(&self, appointment: &AppointmentRef, now: DateTime<Utc>) -> NewNotificationTask {
        NewNotificationTask {
            user_id: appointment.patient_id,
            kind: NotificationKind::FeedbackRequest,
            appointment_id: Some(appointment.id),
            title: templates::feedback_request_title(),
            message: templates::feedback_request_message(&appointment.therapy),
            category: CATEGORY_FEEDBACK.to_string(),
            deliver_after: now + Duration::hours(2),
            channels: ChannelFlags::email_and_in_app(),
        }
    }
}
