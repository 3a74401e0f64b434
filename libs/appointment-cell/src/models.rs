// libs/appointment-cell/src/models.rs
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

/// One scheduled therapy session. Never deleted by normal flow; cancellation
/// is a status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub therapy: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub status: AppointmentStatus,
    pub patient_notes: Option<String>,
    pub practitioner_notes: Option<String>,
    pub follow_up_required: bool,
    pub follow_up_date: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }

    /// Whether this appointment still occupies its practitioner's calendar.
    pub fn blocks_calendar(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }

    pub fn overlaps(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        self.start_time < end && start < self.end_time()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AppointmentStatus {
    Scheduled,
    Confirmed,
    InProgress,
    Completed,
    Cancelled,
    NoShow,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            AppointmentStatus::Completed | AppointmentStatus::Cancelled | AppointmentStatus::NoShow
        )
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Scheduled => write!(f, "scheduled"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::InProgress => write!(f, "in_progress"),
            AppointmentStatus::Completed => write!(f, "completed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::NoShow => write!(f, "no_show"),
        }
    }
}

// ==============================================================================
// REQUEST/RESPONSE MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookAppointmentRequest {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub therapy: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub patient_notes: Option<String>,
}

/// A validated booking, ready for the store. Identity and timestamps are
/// assigned by the store.
#[derive(Debug, Clone)]
pub struct NewAppointment {
    pub patient_id: Uuid,
    pub practitioner_id: Uuid,
    pub therapy: String,
    pub start_time: DateTime<Utc>,
    pub duration_minutes: i32,
    pub patient_notes: Option<String>,
}

impl NewAppointment {
    pub fn end_time(&self) -> DateTime<Utc> {
        self.start_time + Duration::minutes(self.duration_minutes as i64)
    }

    /// Input checks that must reject before any write reaches the store.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), AppointmentError> {
        if self.patient_id.is_nil() || self.practitioner_id.is_nil() {
            return Err(AppointmentError::Validation(
                "Patient and practitioner references are required".to_string(),
            ));
        }
        if self.therapy.trim().is_empty() {
            return Err(AppointmentError::Validation("Therapy name is required".to_string()));
        }
        if self.duration_minutes <= 0 {
            return Err(AppointmentError::Validation(
                "Appointment duration must be positive".to_string(),
            ));
        }
        if self.start_time <= now {
            return Err(AppointmentError::Validation(
                "Appointment must be scheduled for a future time".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelAppointmentRequest {
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompleteAppointmentRequest {
    pub practitioner_notes: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentQuery {
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

/// Partial update applied by the store. When `expected_status` is set the
/// write is conditional on the row still holding that status, which is how a
/// lost transition race surfaces instead of silently clobbering.
#[derive(Debug, Clone, Default)]
pub struct AppointmentChanges {
    pub status: Option<AppointmentStatus>,
    pub expected_status: Option<AppointmentStatus>,
    pub patient_notes: Option<String>,
    pub practitioner_notes: Option<String>,
    pub follow_up_required: Option<bool>,
    pub follow_up_date: Option<NaiveDate>,
}

impl AppointmentChanges {
    pub fn transition(from: AppointmentStatus, to: AppointmentStatus) -> Self {
        Self {
            status: Some(to),
            expected_status: Some(from),
            ..Self::default()
        }
    }
}

// ==============================================================================
// STATISTICS MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppointmentStats {
    pub total_appointments: i32,
    pub completed_appointments: i32,
    pub cancelled_appointments: i32,
    pub no_show_appointments: i32,
    pub therapy_breakdown: Vec<(String, i32)>,
}

// ==============================================================================
// ERROR TYPES
// ==============================================================================

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Appointment conflicts with an existing booking")]
    Conflict,

    #[error("Illegal status transition: {from} -> {to}")]
    InvalidTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Unauthorized access to appointment")]
    Unauthorized,

    #[error("Store error: {0}")]
    Store(String),
}
