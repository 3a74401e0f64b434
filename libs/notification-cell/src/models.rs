// libs/notification-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// NOTIFICATION TASK MODELS
// ==============================================================================

/// One scheduled outbound message, produced by a lifecycle event and consumed
/// later by the delivery workers. The deliver time is fixed at creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationTask {
    pub id: Uuid,
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub appointment_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub category: String,
    pub deliver_after: DateTime<Utc>,
    #[serde(flatten)]
    pub channels: ChannelFlags,
    pub read: bool,
    pub email_sent: bool,
    pub sms_sent: bool,
    pub in_app_sent: bool,
    pub suppressed: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Reminder,
    PreProcedure,
    PostProcedure,
    AppointmentConfirmation,
    AppointmentCancellation,
    FeedbackRequest,
    TherapyProgress,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotificationKind::Reminder => write!(f, "reminder"),
            NotificationKind::PreProcedure => write!(f, "pre_procedure"),
            NotificationKind::PostProcedure => write!(f, "post_procedure"),
            NotificationKind::AppointmentConfirmation => write!(f, "appointment_confirmation"),
            NotificationKind::AppointmentCancellation => write!(f, "appointment_cancellation"),
            NotificationKind::FeedbackRequest => write!(f, "feedback_request"),
            NotificationKind::TherapyProgress => write!(f, "therapy_progress"),
        }
    }
}

/// Which delivery channels a task targets. Delivery itself happens out of
/// process; these flags only tell the workers where to send.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChannelFlags {
    pub email: bool,
    pub sms: bool,
    pub in_app: bool,
}

impl ChannelFlags {
    pub fn email_and_in_app() -> Self {
        Self { email: true, sms: false, in_app: true }
    }

    pub fn all() -> Self {
        Self { email: true, sms: true, in_app: true }
    }

    pub fn in_app_only() -> Self {
        Self { email: false, sms: false, in_app: true }
    }
}

/// A task as planned by the scheduler, before the store assigns identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotificationTask {
    pub user_id: Uuid,
    pub kind: NotificationKind,
    pub appointment_id: Option<Uuid>,
    pub title: String,
    pub message: String,
    pub category: String,
    pub deliver_after: DateTime<Utc>,
    #[serde(flatten)]
    pub channels: ChannelFlags,
}

// ==============================================================================
// LIFECYCLE EVENTS
// ==============================================================================

/// The appointment fields the scheduler needs; carried by value so this cell
/// does not depend on the appointment cell's full record type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentRef {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub therapy: String,
    pub start_time: DateTime<Utc>,
}

/// State-changing appointment actions that derive notifications.
#[derive(Debug, Clone)]
pub enum LifecycleEvent {
    Booked {
        appointment: AppointmentRef,
    },
    Cancelled {
        appointment: AppointmentRef,
        reason: Option<String>,
    },
    Completed {
        appointment: AppointmentRef,
    },
    /// External trigger, reported by a practitioner when a patient reaches a
    /// milestone in their therapy plan.
    MilestoneReached {
        patient_id: Uuid,
        therapy: String,
        milestone: String,
    },
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MilestoneRequest {
    pub patient_id: Uuid,
    pub therapy: String,
    pub milestone: String,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum NotificationError {
    #[error("Notification not found")]
    NotFound,

    #[error("Not authorized to access this notification")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(String),
}
