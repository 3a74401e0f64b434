// libs/notification-cell/src/services/store.rs
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use tracing::debug;
use uuid::Uuid;

use shared_config::AppConfig;
use shared_database::{PostgrestClient, StoreError};

use crate::models::{NewNotificationTask, NotificationError, NotificationTask};

/// Persistence seam for notification tasks. Two implementations: the hosted
/// PostgREST store and a mutex-guarded in-memory map for tests and demo mode.
#[async_trait]
pub trait NotificationStore: Send + Sync {
    async fn insert(
        &self,
        task: NewNotificationTask,
        auth_token: &str,
    ) -> Result<NotificationTask, NotificationError>;

    /// Tasks for one recipient, unsuppressed only, soonest delivery first.
    async fn list_for_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<NotificationTask>, NotificationError>;

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<NotificationTask, NotificationError>;

    /// Flags the appointment's pending, fully-unsent tasks as suppressed.
    /// Returns how many rows were affected.
    async fn suppress_pending(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<u32, NotificationError>;
}

impl From<StoreError> for NotificationError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(_) => NotificationError::NotFound,
            StoreError::Auth(_) => NotificationError::Unauthorized,
            other => NotificationError::Store(other.to_string()),
        }
    }
}

// ==============================================================================
// LIVE STORE
// ==============================================================================

pub struct PostgrestNotificationStore {
    client: PostgrestClient,
}

impl PostgrestNotificationStore {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: PostgrestClient::new(config),
        }
    }
}

#[async_trait]
impl NotificationStore for PostgrestNotificationStore {
    async fn insert(
        &self,
        task: NewNotificationTask,
        auth_token: &str,
    ) -> Result<NotificationTask, NotificationError> {
        debug!("Creating {} notification for user {}", task.kind, task.user_id);

        let mut body = serde_json::to_value(&task)
            .map_err(|e| NotificationError::Store(e.to_string()))?;
        if let Value::Object(map) = &mut body {
            map.insert("read".to_string(), json!(false));
            map.insert("email_sent".to_string(), json!(false));
            map.insert("sms_sent".to_string(), json!(false));
            map.insert("in_app_sent".to_string(), json!(false));
            map.insert("suppressed".to_string(), json!(false));
            map.insert("created_at".to_string(), json!(Utc::now().to_rfc3339()));
        }

        let result: Vec<NotificationTask> = self
            .client
            .request_with_headers(
                Method::POST,
                "/rest/v1/notification_tasks",
                Some(auth_token),
                Some(body),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        result
            .into_iter()
            .next()
            .ok_or_else(|| NotificationError::Store("Insert returned no row".to_string()))
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<Vec<NotificationTask>, NotificationError> {
        let path = format!(
            "/rest/v1/notification_tasks?user_id=eq.{}&suppressed=eq.false&order=deliver_after.asc",
            user_id
        );

        let tasks: Vec<NotificationTask> = self
            .client
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        Ok(tasks)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        auth_token: &str,
    ) -> Result<NotificationTask, NotificationError> {
        let path = format!(
            "/rest/v1/notification_tasks?id=eq.{}&user_id=eq.{}",
            id, user_id
        );

        let result: Vec<NotificationTask> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "read": true })),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        result.into_iter().next().ok_or(NotificationError::NotFound)
    }

    async fn suppress_pending(
        &self,
        appointment_id: Uuid,
        auth_token: &str,
    ) -> Result<u32, NotificationError> {
        let path = format!(
            "/rest/v1/notification_tasks?appointment_id=eq.{}&suppressed=eq.false\
             &email_sent=eq.false&sms_sent=eq.false&in_app_sent=eq.false",
            appointment_id
        );

        let result: Vec<NotificationTask> = self
            .client
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(json!({ "suppressed": true })),
                Some(PostgrestClient::return_representation()),
            )
            .await?;

        Ok(result.len() as u32)
    }
}

// ==============================================================================
// IN-MEMORY STORE
// ==============================================================================

#[derive(Default)]
pub struct InMemoryNotificationStore {
    tasks: Mutex<HashMap<Uuid, NotificationTask>>,
}

impl InMemoryNotificationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Test hook: every stored task for an appointment, suppressed included.
    pub fn tasks_for_appointment(&self, appointment_id: Uuid) -> Vec<NotificationTask> {
        let tasks = self.tasks.lock().unwrap();
        let mut found: Vec<NotificationTask> = tasks
            .values()
            .filter(|t| t.appointment_id == Some(appointment_id))
            .cloned()
            .collect();
        found.sort_by_key(|t| t.deliver_after);
        found
    }
}

#[async_trait]
impl NotificationStore for InMemoryNotificationStore {
    async fn insert(
        &self,
        task: NewNotificationTask,
        _auth_token: &str,
    ) -> Result<NotificationTask, NotificationError> {
        let stored = NotificationTask {
            id: Uuid::new_v4(),
            user_id: task.user_id,
            kind: task.kind,
            appointment_id: task.appointment_id,
            title: task.title,
            message: task.message,
            category: task.category,
            deliver_after: task.deliver_after,
            channels: task.channels,
            read: false,
            email_sent: false,
            sms_sent: false,
            in_app_sent: false,
            suppressed: false,
            created_at: Utc::now(),
        };

        let mut tasks = self.tasks.lock().unwrap();
        tasks.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn list_for_user(
        &self,
        user_id: Uuid,
        _auth_token: &str,
    ) -> Result<Vec<NotificationTask>, NotificationError> {
        let tasks = self.tasks.lock().unwrap();
        let mut found: Vec<NotificationTask> = tasks
            .values()
            .filter(|t| t.user_id == user_id && !t.suppressed)
            .cloned()
            .collect();
        found.sort_by_key(|t| t.deliver_after);
        Ok(found)
    }

    async fn mark_read(
        &self,
        id: Uuid,
        user_id: Uuid,
        _auth_token: &str,
    ) -> Result<NotificationTask, NotificationError> {
        let mut tasks = self.tasks.lock().unwrap();
        match tasks.get_mut(&id) {
            Some(task) if task.user_id == user_id => {
                task.read = true;
                Ok(task.clone())
            }
            Some(_) => Err(NotificationError::Unauthorized),
            None => Err(NotificationError::NotFound),
        }
    }

    async fn suppress_pending(
        &self,
        appointment_id: Uuid,
        _auth_token: &str,
    ) -> Result<u32, NotificationError> {
        let mut tasks = self.tasks.lock().unwrap();
        let mut affected = 0;
        for task in tasks.values_mut() {
            if task.appointment_id == Some(appointment_id)
                && !task.suppressed
                && !task.email_sent
                && !task.sms_sent
                && !task.in_app_sent
            {
                task.suppressed = true;
                affected += 1;
            }
        }
        Ok(affected)
    }
}
