// libs/appointment-cell/src/services/booking.rs
use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use notification_cell::models::{AppointmentRef, LifecycleEvent};
use notification_cell::services::scheduler::NotificationScheduler;
use shared_models::auth::{Role, User};

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentQuery, AppointmentStats,
    AppointmentStatus, BookAppointmentRequest, CompleteAppointmentRequest, NewAppointment,
};
use crate::services::lifecycle::AppointmentLifecycleService;
use crate::services::store::AppointmentStore;

/// Orchestrates appointment state: validate, write through the gateway, then
/// hand the lifecycle event to the notification scheduler. Holds no state of
/// its own; everything observable goes through the store or the scheduler.
pub struct BookingService {
    store: Arc<dyn AppointmentStore>,
    lifecycle: AppointmentLifecycleService,
    scheduler: NotificationScheduler,
}

impl BookingService {
    pub fn new(store: Arc<dyn AppointmentStore>, scheduler: NotificationScheduler) -> Self {
        Self {
            store,
            lifecycle: AppointmentLifecycleService::new(),
            scheduler,
        }
    }

    /// Book a new appointment. On success the confirmation, reminder and
    /// pre-procedure notifications are scheduled best-effort.
    pub async fn book(
        &self,
        request: BookAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        info!(
            "Booking {} appointment for patient {} with practitioner {}",
            request.therapy, request.patient_id, request.practitioner_id
        );

        let is_own_booking = request.patient_id.to_string() == user.id;
        if !is_own_booking && !user.is_admin() && !user.is_practitioner() {
            return Err(AppointmentError::Unauthorized);
        }

        let record = NewAppointment {
            patient_id: request.patient_id,
            practitioner_id: request.practitioner_id,
            therapy: request.therapy,
            start_time: request.start_time,
            duration_minutes: request.duration_minutes,
            patient_notes: request.patient_notes,
        };
        record.validate(Utc::now())?;

        let appointment = self.store.insert(record, auth_token).await?;

        let event = LifecycleEvent::Booked {
            appointment: event_ref(&appointment),
        };
        self.dispatch_event(&event, auth_token).await;

        info!("Appointment {} booked successfully", appointment.id);
        Ok(appointment)
    }

    pub async fn get(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let appointment = self.store.fetch(appointment_id, auth_token).await?;
        self.authorize_access(&appointment, user)?;
        Ok(appointment)
    }

    /// List appointments for a user, ordered by start time. The role decides
    /// which side of the booking the user id is matched against.
    pub async fn list_for(
        &self,
        user_id: Uuid,
        role: Role,
        query: &AppointmentQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        debug!("Listing appointments for {} as {:?}", user_id, role);
        self.store.list_for(user_id, role, query, auth_token).await
    }

    /// Patient confirms attendance: scheduled -> confirmed.
    pub async fn confirm(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.store.fetch(appointment_id, auth_token).await?;
        self.authorize_access(&current, user)?;

        self.transition(&current, AppointmentStatus::Confirmed, auth_token).await
    }

    /// Practitioner starts the session: scheduled|confirmed -> in_progress.
    pub async fn start(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.store.fetch(appointment_id, auth_token).await?;
        self.authorize_practitioner_action(&current, user)?;

        self.transition(&current, AppointmentStatus::InProgress, auth_token).await
    }

    /// Cancel an appointment and fire the cancellation notification.
    ///
    /// Cancelling an already-cancelled appointment is an idempotent no-op
    /// success; every other terminal state still rejects.
    pub async fn cancel(
        &self,
        appointment_id: Uuid,
        reason: Option<String>,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Cancelling appointment: {}", appointment_id);

        let current = self.store.fetch(appointment_id, auth_token).await?;
        self.authorize_access(&current, user)?;

        if current.status == AppointmentStatus::Cancelled {
            info!("Appointment {} is already cancelled, returning as-is", appointment_id);
            return Ok(current);
        }

        self.lifecycle
            .validate_status_transition(current.status, AppointmentStatus::Cancelled)?;

        let mut changes =
            AppointmentChanges::transition(current.status, AppointmentStatus::Cancelled);
        if let Some(reason_text) = &reason {
            changes.practitioner_notes =
                Some(format!("Cancelled: {}", reason_text));
        }

        let cancelled = self.store.update(appointment_id, changes, auth_token).await?;

        let event = LifecycleEvent::Cancelled {
            appointment: event_ref(&cancelled),
            reason,
        };
        self.dispatch_event(&event, auth_token).await;

        info!("Appointment {} cancelled", appointment_id);
        Ok(cancelled)
    }

    /// Complete a session, recording practitioner notes and firing the
    /// post-procedure and feedback-request notifications.
    ///
    /// Completion requires in_progress; called on a scheduled or confirmed
    /// appointment it first takes the legal edge into in_progress, so the
    /// stored history never skips a state.
    pub async fn complete(
        &self,
        appointment_id: Uuid,
        request: CompleteAppointmentRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Completing appointment: {}", appointment_id);

        let current = self.store.fetch(appointment_id, auth_token).await?;
        self.authorize_practitioner_action(&current, user)?;

        if !self.lifecycle.can_reach_completed(current.status) {
            return Err(AppointmentError::InvalidTransition {
                from: current.status,
                to: AppointmentStatus::Completed,
            });
        }

        let in_progress = if current.status == AppointmentStatus::InProgress {
            current
        } else {
            self.transition(&current, AppointmentStatus::InProgress, auth_token).await?
        };

        let mut changes = AppointmentChanges::transition(
            AppointmentStatus::InProgress,
            AppointmentStatus::Completed,
        );
        changes.practitioner_notes = request.practitioner_notes;
        changes.follow_up_required = request.follow_up_required;
        changes.follow_up_date = request.follow_up_date;

        let completed = self.store.update(in_progress.id, changes, auth_token).await?;

        let event = LifecycleEvent::Completed {
            appointment: event_ref(&completed),
        };
        self.dispatch_event(&event, auth_token).await;

        info!("Appointment {} completed", appointment_id);
        Ok(completed)
    }

    /// Mark a missed session: scheduled|confirmed -> no_show. No derived
    /// notification.
    pub async fn mark_no_show(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self.store.fetch(appointment_id, auth_token).await?;
        self.authorize_practitioner_action(&current, user)?;

        self.transition(&current, AppointmentStatus::NoShow, auth_token).await
    }

    /// Aggregate counts over the caller's appointments.
    pub async fn stats(
        &self,
        user_id: Uuid,
        role: Role,
        auth_token: &str,
    ) -> Result<AppointmentStats, AppointmentError> {
        let appointments = self
            .store
            .list_for(user_id, role, &AppointmentQuery::default(), auth_token)
            .await?;

        let count_status = |status: AppointmentStatus| {
            appointments.iter().filter(|apt| apt.status == status).count() as i32
        };

        let mut breakdown: Vec<(String, i32)> = Vec::new();
        for apt in &appointments {
            match breakdown.iter_mut().find(|(therapy, _)| therapy == &apt.therapy) {
                Some((_, count)) => *count += 1,
                None => breakdown.push((apt.therapy.clone(), 1)),
            }
        }
        breakdown.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(AppointmentStats {
            total_appointments: appointments.len() as i32,
            completed_appointments: count_status(AppointmentStatus::Completed),
            cancelled_appointments: count_status(AppointmentStatus::Cancelled),
            no_show_appointments: count_status(AppointmentStatus::NoShow),
            therapy_breakdown: breakdown,
        })
    }

    // ==============================================================================
    // PRIVATE HELPER METHODS
    // ==============================================================================

    /// One guarded edge through the state machine.
    async fn transition(
        &self,
        current: &Appointment,
        to: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        self.lifecycle.validate_status_transition(current.status, to)?;

        let changes = AppointmentChanges::transition(current.status, to);
        self.store.update(current.id, changes, auth_token).await
    }

    /// Notification scheduling is best-effort: the appointment mutation has
    /// already committed, so scheduler failures are logged, never surfaced.
    async fn dispatch_event(&self, event: &LifecycleEvent, auth_token: &str) {
        let created = self.scheduler.dispatch(event, Utc::now(), auth_token).await;
        if created.is_empty() {
            warn!("No notification tasks were created for lifecycle event");
        } else {
            debug!("Created {} notification tasks", created.len());
        }
    }

    fn authorize_access(&self, appointment: &Appointment, user: &User) -> Result<(), AppointmentError> {
        let is_patient = appointment.patient_id.to_string() == user.id;
        let is_practitioner = appointment.practitioner_id.to_string() == user.id;

        if !is_patient && !is_practitioner && !user.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(())
    }

    /// Status changes other than cancel belong to the assigned practitioner
    /// (or an admin).
    fn authorize_practitioner_action(
        &self,
        appointment: &Appointment,
        user: &User,
    ) -> Result<(), AppointmentError> {
        let is_assigned = appointment.practitioner_id.to_string() == user.id;

        if !is_assigned && !user.is_admin() {
            return Err(AppointmentError::Unauthorized);
        }
        Ok(())
    }
}

fn event_ref(appointment: &Appointment) -> AppointmentRef {
    AppointmentRef {
        id: appointment.id,
        patient_id: appointment.patient_id,
        practitioner_id: appointment.practitioner_id,
        therapy: appointment.therapy.clone(),
        start_time: appointment.start_time,
    }
}
