// libs/appointment-cell/src/handlers.rs
use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    Json,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, NaiveDate, Utc};
use headers::{authorization::Bearer, Authorization};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;

use shared_models::auth::{Role, User};
use shared_models::error::AppError;

use crate::models::{
    AppointmentError, AppointmentQuery, AppointmentStatus, BookAppointmentRequest,
    CancelAppointmentRequest, CompleteAppointmentRequest,
};
use crate::router::AppointmentCellState;

// ==============================================================================
// QUERY PARAMETER STRUCTS
// ==============================================================================

#[derive(Debug, Deserialize)]
pub struct AppointmentQueryParams {
    pub patient_id: Option<Uuid>,
    pub practitioner_id: Option<Uuid>,
    pub status: Option<AppointmentStatus>,
    pub from_date: Option<DateTime<Utc>>,
    pub to_date: Option<DateTime<Utc>>,
    pub limit: Option<i32>,
    pub offset: Option<i32>,
}

#[derive(Debug, Deserialize)]
pub struct AvailabilityQuery {
    pub date: NaiveDate,
}

// ==============================================================================
// ERROR MAPPING
// ==============================================================================

fn map_appointment_error(e: AppointmentError) -> AppError {
    match e {
        AppointmentError::NotFound => AppError::NotFound("Appointment not found".to_string()),
        AppointmentError::Validation(msg) => AppError::Validation(msg),
        AppointmentError::Conflict => {
            AppError::Conflict("Appointment slot conflicts with an existing booking".to_string())
        }
        AppointmentError::InvalidTransition { from, to } => {
            AppError::InvalidTransition(format!("Cannot move appointment from {} to {}", from, to))
        }
        AppointmentError::Unauthorized => {
            AppError::Auth("Not authorized to access this appointment".to_string())
        }
        AppointmentError::Store(msg) => AppError::Database(msg),
    }
}

fn caller_uuid(user: &User) -> Result<Uuid, AppError> {
    Uuid::parse_str(&user.id)
        .map_err(|_| AppError::Auth("Caller id is not a valid UUID".to_string()))
}

/// Which (user, role) pair a listing or stats request is scoped to. Patients
/// and practitioners always see their own calendar; admins pick a target.
fn resolve_scope(
    user: &User,
    patient_id: Option<Uuid>,
    practitioner_id: Option<Uuid>,
) -> Result<(Uuid, Role), AppError> {
    match user.role() {
        Some(Role::Admin) => match (patient_id, practitioner_id) {
            (Some(id), _) => Ok((id, Role::Patient)),
            (None, Some(id)) => Ok((id, Role::Practitioner)),
            (None, None) => Err(AppError::Validation(
                "Admin queries must name a patient_id or practitioner_id".to_string(),
            )),
        },
        Some(role) => Ok((caller_uuid(user)?, role)),
        None => Err(AppError::Auth("Caller has no recognized role".to_string())),
    }
}

// ==============================================================================
// APPOINTMENT HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<BookAppointmentRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let appointment = state
        .booking
        .book(request, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "appointment": appointment,
            "message": "Appointment booked successfully"
        })),
    ))
}

#[axum::debug_handler]
pub async fn list_appointments(
    State(state): State<Arc<AppointmentCellState>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let (user_id, role) = resolve_scope(&user, params.patient_id, params.practitioner_id)?;

    let query = AppointmentQuery {
        status: params.status,
        from_date: params.from_date,
        to_date: params.to_date,
        limit: params.limit,
        offset: params.offset,
    };

    let appointments = state
        .booking
        .list_for(user_id, role, &query, auth.token())
        .await
        .map_err(map_appointment_error)?;

    let count = appointments.len();
    Ok(Json(json!({
        "appointments": appointments,
        "count": count
    })))
}

#[axum::debug_handler]
pub async fn get_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .get(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(appointment)))
}

#[axum::debug_handler]
pub async fn confirm_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .confirm(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn start_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .start(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn cancel_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CancelAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .cancel(appointment_id, request.reason, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment cancelled"
    })))
}

#[axum::debug_handler]
pub async fn complete_appointment(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
    Json(request): Json<CompleteAppointmentRequest>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .complete(appointment_id, request, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment,
        "message": "Appointment completed"
    })))
}

#[axum::debug_handler]
pub async fn mark_no_show(
    State(state): State<Arc<AppointmentCellState>>,
    Path(appointment_id): Path<Uuid>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let appointment = state
        .booking
        .mark_no_show(appointment_id, &user, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!({
        "success": true,
        "appointment": appointment
    })))
}

#[axum::debug_handler]
pub async fn get_appointment_stats(
    State(state): State<Arc<AppointmentCellState>>,
    Query(params): Query<AppointmentQueryParams>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
    Extension(user): Extension<User>,
) -> Result<Json<Value>, AppError> {
    let (user_id, role) = resolve_scope(&user, params.patient_id, params.practitioner_id)?;

    let stats = state
        .booking
        .stats(user_id, role, auth.token())
        .await
        .map_err(map_appointment_error)?;

    Ok(Json(json!(stats)))
}

// ==============================================================================
// AVAILABILITY HANDLERS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_availability(
    State(state): State<Arc<AppointmentCellState>>,
    Path(practitioner_id): Path<Uuid>,
    Query(query): Query<AvailabilityQuery>,
    TypedHeader(auth): TypedHeader<Authorization<Bearer>>,
) -> Result<Json<Value>, AppError> {
    let slots = state
        .slots
        .available_slots(practitioner_id, query.date, auth.token())
        .await
        .map_err(map_appointment_error)?;

    let formatted: Vec<String> = slots
        .iter()
        .map(|slot| slot.format("%H:%M").to_string())
        .collect();

    Ok(Json(json!({
        "practitioner_id": practitioner_id,
        "date": query.date,
        "available_slots": formatted
    })))
}
