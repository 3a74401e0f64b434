// libs/notification-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::{AppConfig, StoreBackend};
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::scheduler::NotificationScheduler;
use crate::services::store::{
    InMemoryNotificationStore, NotificationStore, PostgrestNotificationStore,
};

/// Wiring for the cell: the store backend is chosen once, here, from the
/// explicit configuration.
pub struct NotificationCellState {
    pub config: AppConfig,
    pub store: Arc<dyn NotificationStore>,
    pub scheduler: NotificationScheduler,
}

impl NotificationCellState {
    pub fn new(config: AppConfig) -> Self {
        let store: Arc<dyn NotificationStore> = match config.store_backend {
            StoreBackend::Live => Arc::new(PostgrestNotificationStore::new(&config)),
            StoreBackend::InMemory => Arc::new(InMemoryNotificationStore::new()),
        };
        Self::with_store(config, store)
    }

    pub fn with_store(config: AppConfig, store: Arc<dyn NotificationStore>) -> Self {
        let scheduler = NotificationScheduler::new(Arc::clone(&store));
        Self { config, store, scheduler }
    }
}

pub fn notification_routes(state: Arc<NotificationCellState>) -> Router {
    let auth_state = Arc::new(state.config.clone());

    let protected_routes = Router::new()
        .route("/", get(handlers::list_notifications))
        .route("/{notification_id}/read", patch(handlers::mark_notification_read))
        .route("/milestone", post(handlers::record_milestone))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
