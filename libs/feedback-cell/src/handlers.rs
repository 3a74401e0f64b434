// libs/feedback-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{FeedbackError, SubmitFeedbackRequest};
use crate::router::FeedbackCellState;

fn map_feedback_error(e: FeedbackError) -> AppError {
    match e {
        FeedbackError::AppointmentNotFound => AppError::NotFound("Appointment not found".to_string()),
        FeedbackError::NotFound => AppError::NotFound("Feedback not found".to_string()),
        FeedbackError::NotCompleted => {
            AppError::Conflict("Feedback is only accepted for completed appointments".to_string())
        }
        FeedbackError::AlreadySubmitted => {
            AppError::Conflict("Feedback was already submitted for this appointment".to_string())
        }
        FeedbackError::Validation(msg) => AppError::Validation(msg),
        FeedbackError::Unauthorized => AppError::Auth("Not authorized to access this feedback".to_string()),
        FeedbackError::Store(msg) => AppError::Database(msg),
    }
}

#[axum::debug_handler]
pub async fn submit_feedback(
    State(state): State<Arc<FeedbackCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<SubmitFeedbackRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let feedback = state
        .service
        .submit(request, &user, auth.token())
        .await
        .map_err(map_feedback_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "feedback": feedback
        })),
    ))
}

#[axum::debug_handler]
pub async fn get_feedback_for_appointment(
    State(state): State<Arc<FeedbackCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let feedback = state
        .service
        .for_appointment(appointment_id, &user, auth.token())
        .await
        .map_err(map_feedback_error)?;

    Ok(Json(json!(feedback)))
}
