// libs/feedback-cell/src/services/feedback.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};
use uuid::Uuid;

use appointment_cell::models::{AppointmentError, AppointmentStatus};
use appointment_cell::services::store::AppointmentStore;
use shared_config::AppConfig;
use shared_database::{PostgrestClient, StoreError};
use shared_models::auth::User;

use crate::models::{Feedback, FeedbackError, NewFeedback, SubmitFeedbackRequest};

// ==============================================================================
// STORE SEAM
// ==============================================================================

#[async_trait]
pub trait FeedbackStore: Send + Sync {
    /// Insert, enforcing the one-per-appointment rule.
    async fn insert(&self, record: NewFeedback, auth_token: &str) -> Result<Feedback, FeedbackError>;

    async fn find_by_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Feedback>, FeedbackError>;
}

impl From<StoreError> for FeedbackError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(_) => FeedbackError::AlreadySubmitted,
            StoreError::Auth(_) => FeedbackError::Unauthorized,
            other => FeedbackError::Store(other.to_string()),
        }
    }
}

pub struct PostgrestFeedbackStore {
    client: PostgrestClient,
}

impl PostgrestFeedbackStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }
}

#[async_trait]
impl FeedbackStore for PostgrestFeedbackStore {
    async fn insert(&self, record: NewFeedback, auth_token: &str) -> Result<Feedback, FeedbackError> {
        let body = json!({
            "appointment_id": record.appointment_id,
            "patient_id": record.patient_id,
            "rating": record.rating,
            "tags": record.tags,
            "notes": record.notes,
            "created_at": Utc::now().to_rfc3339(),
        });

        // The table's unique index on appointment_id turns a duplicate
        // submission into an HTTP 409.
        let result: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/feedback",
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| FeedbackError::Store("Insert returned no row".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| FeedbackError::Store(format!("Failed to parse feedback: {}", e)))
    }

    async fn find_by_appointment(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<Option<Feedback>, FeedbackError> {
        let path = format!("/rest/v1/feedback?appointment_id=eq.{}", appointment_id);

        let result: Vec<Value> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        match result.into_iter().next() {
            Some(row) => serde_json::from_value(row)
                .map(Some)
                .map_err(|e| FeedbackError::Store(format!("Failed to parse feedback: {}", e))),
            None => Ok(None),
        }
    }
}

#[derive(Default)]
pub struct InMemoryFeedbackStore {
    by_appointment: Mutex<HashMap<Uuid, Feedback>>,
}

impl InMemoryFeedbackStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl FeedbackStore for InMemoryFeedbackStore {
    async fn insert(&self, record: NewFeedback, _auth_token: &str) -> Result<Feedback, FeedbackError> {
        let mut by_appointment = self.by_appointment.lock().unwrap();

        if by_appointment.contains_key(&record.appointment_id) {
            return Err(FeedbackError::AlreadySubmitted);
        }

        let feedback = Feedback {
            id: Uuid::new_v4(),
            appointment_id: record.appointment_id,
            patient_id: record.patient_id,
            rating: record.rating,
            tags: record.tags,
            notes: record.notes,
            created_at: Utc::now(),
        };

        by_appointment.insert(feedback.appointment_id, feedback.clone());
        Ok(feedback)
    }

    async fn find_by_appointment(
        &self,
        appointment_id: Uuid,
        _auth_token: &str,
    ) -> Result<Option<Feedback>, FeedbackError> {
        let by_appointment = self.by_appointment.lock().unwrap();
        Ok(by_appointment.get(&appointment_id).cloned())
    }
}

// ==============================================================================
// SERVICE
// ==============================================================================

/// Accepts feedback for completed sessions. The completed-status gate is what
/// makes collection legal; it is checked against the appointment store on
/// every submission.
pub struct FeedbackService {
    appointments: Arc<dyn AppointmentStore>,
    store: Arc<dyn FeedbackStore>,
}

impl FeedbackService {
    pub fn new(appointments: Arc<dyn AppointmentStore>, store: Arc<dyn FeedbackStore>) -> Self {
        Self { appointments, store }
    }

    pub async fn submit(
        &self,
        request: SubmitFeedbackRequest,
        user: &User,
        auth_token: &str,
    ) -> Result<Feedback, FeedbackError> {
        debug!("Submitting feedback for appointment {}", request.appointment_id);

        if !(1..=5).contains(&request.rating) {
            return Err(FeedbackError::Validation(
                "Rating must be between 1 and 5".to_string(),
            ));
        }

        let appointment = self
            .appointments
            .fetch(request.appointment_id, auth_token)
            .await
            .map_err(|e| match e {
                AppointmentError::NotFound => FeedbackError::AppointmentNotFound,
                AppointmentError::Unauthorized => FeedbackError::Unauthorized,
                other => FeedbackError::Store(other.to_string()),
            })?;

        if appointment.patient_id.to_string() != user.id && !user.is_admin() {
            return Err(FeedbackError::Unauthorized);
        }

        if appointment.status != AppointmentStatus::Completed {
            return Err(FeedbackError::NotCompleted);
        }

        if self
            .store
            .find_by_appointment(request.appointment_id, auth_token)
            .await?
            .is_some()
        {
            return Err(FeedbackError::AlreadySubmitted);
        }

        let record = NewFeedback {
            appointment_id: request.appointment_id,
            patient_id: appointment.patient_id,
            rating: request.rating,
            tags: request.tags,
            notes: request.notes,
        };

        let feedback = self.store.insert(record, auth_token).await?;
        info!("Feedback {} recorded for appointment {}", feedback.id, feedback.appointment_id);
        Ok(feedback)
    }

    pub async fn for_appointment(
        &self,
        appointment_id: Uuid,
        user: &User,
        auth_token: &str,
    ) -> Result<Feedback, FeedbackError> {
        let appointment = self
            .appointments
            .fetch(appointment_id, auth_token)
            .await
            .map_err(|e| match e {
                AppointmentError::NotFound => FeedbackError::AppointmentNotFound,
                AppointmentError::Unauthorized => FeedbackError::Unauthorized,
                other => FeedbackError::Store(other.to_string()),
            })?;

        let is_patient = appointment.patient_id.to_string() == user.id;
        let is_practitioner = appointment.practitioner_id.to_string() == user.id;
        if !is_patient && !is_practitioner && !user.is_admin() {
            return Err(FeedbackError::Unauthorized);
        }

        self.store
            .find_by_appointment(appointment_id, auth_token)
            .await?
            .ok_or(FeedbackError::NotFound)
    }
}
