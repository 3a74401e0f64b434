// libs/feedback-cell/src/models.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Patient-submitted rating for one completed session. At most one per
/// appointment.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Feedback {
    pub id: Uuid,
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub rating: i16,
    pub tags: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubmitFeedbackRequest {
    pub appointment_id: Uuid,
    pub rating: i16,
    #[serde(default)]
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewFeedback {
    pub appointment_id: Uuid,
    pub patient_id: Uuid,
    pub rating: i16,
    pub tags: Vec<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedbackError {
    #[error("Appointment not found")]
    AppointmentNotFound,

    #[error("Feedback not found")]
    NotFound,

    #[error("Feedback is only accepted for completed appointments")]
    NotCompleted,

    #[error("Feedback was already submitted for this appointment")]
    AlreadySubmitted,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not authorized to access this feedback")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(String),
}
