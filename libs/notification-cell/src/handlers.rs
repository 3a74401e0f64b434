// libs/notification-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::Utc;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::User;
use shared_models::error::AppError;

use crate::models::{LifecycleEvent, MilestoneRequest, NotificationError};
use crate::router::NotificationCellState;

fn caller_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Caller id is not a valid UUID".to_string()))
}

fn map_notification_error(e: NotificationError) -> AppError {
    match e {
        NotificationError::NotFound => AppError::NotFound("Notification not found".to_string()),
        NotificationError::Unauthorized => {
            AppError::Auth("Not authorized to access this notification".to_string())
        }
        NotificationError::Store(msg) => AppError::Database(msg),
    }
}

/// The caller's pending and delivered notifications, soonest delivery first.
#[axum::debug_handler]
pub async fn list_notifications(
    State(state): State<Arc<NotificationCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_uuid(&user)?;

    let tasks = state
        .store
        .list_for_user(user_id, auth.token())
        .await
        .map_err(map_notification_error)?;

    let count = tasks.len();
    Ok(Json(json!({
        "notifications": tasks,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn mark_notification_read(
    State(state): State<Arc<NotificationCellState>>,
    Path(notification_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let user_id = caller_uuid(&user)?;

    let task = state
        .store
        .mark_read(notification_id, user_id, auth.token())
        .await
        .map_err(map_notification_error)?;

    Ok(Json(json!({
        "success": true,
        "notification": task
    })))
}

/// External trigger: a practitioner reports a therapy milestone, producing an
/// immediate progress notification for the patient.
#[axum::debug_handler]
pub async fn record_milestone(
    State(state): State<Arc<NotificationCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<MilestoneRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    if !user.is_practitioner() && !user.is_admin() {
        return Err(AppError::Auth(
            "Only practitioners can record therapy milestones".to_string(),
        ));
    }

    if request.milestone.trim().is_empty() {
        return Err(AppError::Validation("Milestone description is required".to_string()));
    }

    let event = LifecycleEvent::MilestoneReached {
        patient_id: request.patient_id,
        therapy: request.therapy,
        milestone: request.milestone,
    };

    let created = state.scheduler.dispatch(&event, Utc::now(), auth.token()).await;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "notifications": created
        })),
    ))
}
