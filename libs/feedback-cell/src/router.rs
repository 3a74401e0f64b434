// libs/feedback-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use appointment_cell::services::store::AppointmentStore;
use shared_config::{AppConfig, StoreBackend};
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::feedback::{
    FeedbackService, FeedbackStore, InMemoryFeedbackStore, PostgrestFeedbackStore,
};

pub struct FeedbackCellState {
    pub config: AppConfig,
    pub service: FeedbackService,
}

impl FeedbackCellState {
    /// The appointment store is shared with the appointment cell so the
    /// completed-status gate reads the same data the controller writes.
    pub fn new(config: AppConfig, appointments: Arc<dyn AppointmentStore>) -> Self {
        let store: Arc<dyn FeedbackStore> = match config.store_backend {
            StoreBackend::Live => Arc::new(PostgrestFeedbackStore::new(&config)),
            StoreBackend::InMemory => Arc::new(InMemoryFeedbackStore::new()),
        };
        Self::with_store(config, appointments, store)
    }

    pub fn with_store(
        config: AppConfig,
        appointments: Arc<dyn AppointmentStore>,
        store: Arc<dyn FeedbackStore>,
    ) -> Self {
        let service = FeedbackService::new(appointments, store);
        Self { config, service }
    }
}

pub fn feedback_routes(state: Arc<FeedbackCellState>) -> Router {
    let auth_state = Arc::new(state.config.clone());

    let protected_routes = Router::new()
        .route("/", post(handlers::submit_feedback))
        .route(
            "/appointment/{appointment_id}",
            get(handlers::get_feedback_for_appointment),
        )
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
