// libs/appointment-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{PostgrestClient, StoreError};
use shared_models::auth::Role;

use crate::models::{
    Appointment, AppointmentChanges, AppointmentError, AppointmentQuery, AppointmentStatus,
    NewAppointment,
};

/// Typed CRUD surface over the appointment table.
///
/// `insert` carries the double-booking guarantee: two concurrent inserts for
/// the same practitioner and overlapping window must not both succeed. The
/// live implementation delegates that to a store-level exclusion constraint;
/// the in-memory one checks and inserts under a single lock.
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    async fn insert(
        &self,
        record: NewAppointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError>;

    async fn fetch(&self, id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError>;

    /// Appointments where the given user is the patient or the practitioner,
    /// ordered by start time ascending.
    async fn list_for(
        &self,
        user_id: Uuid,
        role: Role,
        query: &AppointmentQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    /// The slot calculator's read: everything on one practitioner's calendar
    /// for one date, cancelled rows included (the caller filters).
    async fn list_for_practitioner_on(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError>;

    async fn update(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError>;
}

impl From<StoreError> for AppointmentError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => AppointmentError::NotFound,
            StoreError::Conflict(_) => AppointmentError::Conflict,
            StoreError::Auth(_) => AppointmentError::Unauthorized,
            other => AppointmentError::Store(other.to_string()),
        }
    }
}

fn day_bounds(date: NaiveDate) -> (DateTime<Utc>, DateTime<Utc>) {
    let start = date.and_hms_opt(0, 0, 0).unwrap().and_utc();
    let end = date.and_hms_opt(23, 59, 59).unwrap().and_utc();
    (start, end)
}

// ==============================================================================
// LIVE STORE
// ==============================================================================

/// PostgREST-backed store. Alongside `start_time` the table keeps a computed
/// `end_time` column; the exclusion constraint on
/// (practitioner_id, tstzrange(start_time, end_time)) over non-cancelled rows
/// is what closes the booking race, surfaced here as an HTTP 409.
pub struct PostgrestAppointmentStore {
    client: PostgrestClient,
}

impl PostgrestAppointmentStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }

    async fn rows(&self, path: &str, auth_token: &str) -> Result<Vec<Appointment>, AppointmentError> {
        let result: Vec<Value> = self
            .client
            .request(Method::GET, path, Some(auth_token), None)
            .await?;

        result
            .into_iter()
            .map(serde_json::from_value)
            .collect::<Result<Vec<Appointment>, _>>()
            .map_err(|e| AppointmentError::Store(format!("Failed to parse appointments: {}", e)))
    }

    /// Advisory overlap pre-read. Catches the common conflict before the
    /// write so the caller gets the friendlier path; the exclusion constraint
    /// remains the guarantee when two inserts race past this check.
    async fn has_overlap(
        &self,
        record: &NewAppointment,
        auth_token: &str,
    ) -> Result<bool, AppointmentError> {
        let start_str = record.start_time.to_rfc3339();
        let end_str = record.end_time().to_rfc3339();
        let start = urlencoding::encode(&start_str);
        let end = urlencoding::encode(&end_str);

        let path = format!(
            "/rest/v1/appointments?practitioner_id=eq.{}&status=neq.cancelled&start_time=lt.{}&end_time=gt.{}",
            record.practitioner_id, end, start
        );

        let overlapping = self.rows(&path, auth_token).await?;
        Ok(!overlapping.is_empty())
    }
}

#[async_trait]
impl AppointmentStore for PostgrestAppointmentStore {
    async fn insert(
        &self,
        record: NewAppointment,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        record.validate(Utc::now())?;

        if self.has_overlap(&record, auth_token).await? {
            warn!(
                "Booking conflict for practitioner {} at {}",
                record.practitioner_id, record.start_time
            );
            return Err(AppointmentError::Conflict);
        }

        let now = Utc::now();
        let end_time = record.end_time();
        let body = json!({
            "patient_id": record.patient_id,
            "practitioner_id": record.practitioner_id,
            "therapy": record.therapy,
            "start_time": record.start_time.to_rfc3339(),
            "end_time": end_time.to_rfc3339(),
            "duration_minutes": record.duration_minutes,
            "status": AppointmentStatus::Scheduled,
            "patient_notes": record.patient_notes,
            "follow_up_required": false,
            "created_at": now.to_rfc3339(),
            "updated_at": now.to_rfc3339(),
        });

        let result: Vec<Value> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/appointments",
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        let row = result
            .into_iter()
            .next()
            .ok_or_else(|| AppointmentError::Store("Insert returned no row".to_string()))?;

        serde_json::from_value(row)
            .map_err(|e| AppointmentError::Store(format!("Failed to parse appointment: {}", e)))
    }

    async fn fetch(&self, id: Uuid, auth_token: &str) -> Result<Appointment, AppointmentError> {
        debug!("Fetching appointment: {}", id);

        let path = format!("/rest/v1/appointments?id=eq.{}", id);
        let rows = self.rows(&path, auth_token).await?;

        rows.into_iter().next().ok_or(AppointmentError::NotFound)
    }

    async fn list_for(
        &self,
        user_id: Uuid,
        role: Role,
        query: &AppointmentQuery,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let mut query_parts = vec![match role {
            Role::Practitioner => format!("practitioner_id=eq.{}", user_id),
            _ => format!("patient_id=eq.{}", user_id),
        }];

        if let Some(status) = query.status {
            query_parts.push(format!("status=eq.{}", status));
        }
        if let Some(from_date) = query.from_date {
            let date_str = from_date.to_rfc3339();
            query_parts.push(format!("start_time=gte.{}", urlencoding::encode(&date_str)));
        }
        if let Some(to_date) = query.to_date {
            let date_str = to_date.to_rfc3339();
            query_parts.push(format!("start_time=lte.{}", urlencoding::encode(&date_str)));
        }

        let mut path = format!(
            "/rest/v1/appointments?{}&order=start_time.asc",
            query_parts.join("&")
        );

        if let Some(limit) = query.limit {
            path.push_str(&format!("&limit={}", limit));
        }
        if let Some(offset) = query.offset {
            path.push_str(&format!("&offset={}", offset));
        }

        self.rows(&path, auth_token).await
    }

    async fn list_for_practitioner_on(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let (day_start, day_end) = day_bounds(date);
        let start_str = day_start.to_rfc3339();
        let end_str = day_end.to_rfc3339();
        let start = urlencoding::encode(&start_str);
        let end = urlencoding::encode(&end_str);

        let path = format!(
            "/rest/v1/appointments?practitioner_id=eq.{}&start_time=gte.{}&start_time=lte.{}&order=start_time.asc",
            practitioner_id, start, end
        );

        self.rows(&path, auth_token).await
    }

    async fn update(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        debug!("Updating appointment: {}", id);

        let mut body = serde_json::Map::new();
        if let Some(status) = changes.status {
            body.insert("status".to_string(), json!(status));
        }
        if let Some(notes) = &changes.patient_notes {
            body.insert("patient_notes".to_string(), json!(notes));
        }
        if let Some(notes) = &changes.practitioner_notes {
            body.insert("practitioner_notes".to_string(), json!(notes));
        }
        if let Some(required) = changes.follow_up_required {
            body.insert("follow_up_required".to_string(), json!(required));
        }
        if let Some(date) = changes.follow_up_date {
            body.insert("follow_up_date".to_string(), json!(date));
        }
        body.insert("updated_at".to_string(), json!(Utc::now().to_rfc3339()));

        let mut path = format!("/rest/v1/appointments?id=eq.{}", id);
        if let Some(expected) = changes.expected_status {
            path.push_str(&format!("&status=eq.{}", expected));
        }

        let result: Vec<Value> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(Value::Object(body)),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        if let Some(row) = result.into_iter().next() {
            return serde_json::from_value(row)
                .map_err(|e| AppointmentError::Store(format!("Failed to parse appointment: {}", e)));
        }

        // Nothing matched: either the row is gone or a concurrent transition
        // moved it off the expected status. Re-read to tell which.
        let current = self.fetch(id, auth_token).await?;
        match changes.status {
            Some(to) => Err(AppointmentError::InvalidTransition {
                from: current.status,
                to,
            }),
            None => Err(AppointmentError::NotFound),
        }
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

/// Test and demo-mode store. The overlap check and the insert happen under
/// one lock acquisition, matching the atomicity the live constraint provides.
#[derive(Default)]
pub struct InMemoryAppointmentStore {
    appointments: Mutex<HashMap<Uuid, Appointment>>,
}

impl InMemoryAppointmentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AppointmentStore for InMemoryAppointmentStore {
    async fn insert(
        &self,
        record: NewAppointment,
        _auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let now = Utc::now();
        record.validate(now)?;

        let mut appointments = self.appointments.lock().unwrap();

        let start = record.start_time;
        let end = record.end_time();
        let collision = appointments.values().any(|apt| {
            apt.practitioner_id == record.practitioner_id
                && apt.blocks_calendar()
                && apt.overlaps(start, end)
        });
        if collision {
            warn!(
                "Booking conflict for practitioner {} at {}",
                record.practitioner_id, record.start_time
            );
            return Err(AppointmentError::Conflict);
        }

        let appointment = Appointment {
            id: Uuid::new_v4(),
            patient_id: record.patient_id,
            practitioner_id: record.practitioner_id,
            therapy: record.therapy,
            start_time: record.start_time,
            duration_minutes: record.duration_minutes,
            status: AppointmentStatus::Scheduled,
            patient_notes: record.patient_notes,
            practitioner_notes: None,
            follow_up_required: false,
            follow_up_date: None,
            created_at: now,
            updated_at: now,
        };

        appointments.insert(appointment.id, appointment.clone());
        Ok(appointment)
    }

    async fn fetch(&self, id: Uuid, _auth_token: &str) -> Result<Appointment, AppointmentError> {
        let appointments = self.appointments.lock().unwrap();
        appointments.get(&id).cloned().ok_or(AppointmentError::NotFound)
    }

    async fn list_for(
        &self,
        user_id: Uuid,
        role: Role,
        query: &AppointmentQuery,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let appointments = self.appointments.lock().unwrap();

        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|apt| match role {
                Role::Practitioner => apt.practitioner_id == user_id,
                _ => apt.patient_id == user_id,
            })
            .filter(|apt| query.status.map_or(true, |s| apt.status == s))
            .filter(|apt| query.from_date.map_or(true, |from| apt.start_time >= from))
            .filter(|apt| query.to_date.map_or(true, |to| apt.start_time <= to))
            .cloned()
            .collect();

        found.sort_by_key(|apt| apt.start_time);

        if let Some(offset) = query.offset {
            found = found.into_iter().skip(offset.max(0) as usize).collect();
        }
        if let Some(limit) = query.limit {
            found.truncate(limit.max(0) as usize);
        }

        Ok(found)
    }

    async fn list_for_practitioner_on(
        &self,
        practitioner_id: Uuid,
        date: NaiveDate,
        _auth_token: &str,
    ) -> Result<Vec<Appointment>, AppointmentError> {
        let (day_start, day_end) = day_bounds(date);
        let appointments = self.appointments.lock().unwrap();

        let mut found: Vec<Appointment> = appointments
            .values()
            .filter(|apt| {
                apt.practitioner_id == practitioner_id
                    && apt.start_time >= day_start
                    && apt.start_time <= day_end
            })
            .cloned()
            .collect();

        found.sort_by_key(|apt| apt.start_time);
        Ok(found)
    }

    async fn update(
        &self,
        id: Uuid,
        changes: AppointmentChanges,
        _auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let mut appointments = self.appointments.lock().unwrap();
        let appointment = appointments.get_mut(&id).ok_or(AppointmentError::NotFound)?;

        if let Some(expected) = changes.expected_status {
            if appointment.status != expected {
                return Err(AppointmentError::InvalidTransition {
                    from: appointment.status,
                    to: changes.status.unwrap_or(appointment.status),
                });
            }
        }

        if let Some(status) = changes.status {
            appointment.status = status;
        }
        if let Some(notes) = changes.patient_notes {
            appointment.patient_notes = Some(notes);
        }
        if let Some(notes) = changes.practitioner_notes {
            appointment.practitioner_notes = Some(notes);
        }
        if let Some(required) = changes.follow_up_required {
            appointment.follow_up_required = required;
        }
        if let Some(date) = changes.follow_up_date {
            appointment.follow_up_date = Some(date);
        }
        appointment.updated_at = Utc::now();

        Ok(appointment.clone())
    }
}
