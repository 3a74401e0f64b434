// libs/appointment-cell/src/router.rs
use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use notification_cell::services::scheduler::NotificationScheduler;
use shared_config::{AppConfig, StoreBackend};
use shared_utils::extractor::auth_middleware;

use crate::handlers;
use crate::services::booking::BookingService;
use crate::services::slots::{SlotCalculatorService, SlotCatalog};
use crate::services::store::{
    AppointmentStore, InMemoryAppointmentStore, PostgrestAppointmentStore,
};

/// Wiring for the cell. The store backend is picked once from the explicit
/// configuration; the notification scheduler is shared with the notification
/// cell so both write the same task store.
pub struct AppointmentCellState {
    pub config: AppConfig,
    pub store: Arc<dyn AppointmentStore>,
    pub booking: BookingService,
    pub slots: SlotCalculatorService,
}

impl AppointmentCellState {
    pub fn new(config: AppConfig, scheduler: NotificationScheduler) -> Self {
        let store: Arc<dyn AppointmentStore> = match config.store_backend {
            StoreBackend::Live => Arc::new(PostgrestAppointmentStore::new(&config)),
            StoreBackend::InMemory => Arc::new(InMemoryAppointmentStore::new()),
        };
        Self::with_store(config, store, scheduler, SlotCatalog::default())
    }

    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn AppointmentStore>,
        scheduler: NotificationScheduler,
        catalog: SlotCatalog,
    ) -> Self {
        let booking = BookingService::new(Arc::clone(&store), scheduler);
        let slots = SlotCalculatorService::with_catalog(Arc::clone(&store), catalog);
        Self { config, store, booking, slots }
    }
}

/// Routes mounted under /appointments.
pub fn appointment_routes(state: Arc<AppointmentCellState>) -> Router {
    let auth_state = Arc::new(state.config.clone());

    let protected_routes = Router::new()
        .route("/", post(handlers::book_appointment))
        .route("/", get(handlers::list_appointments))
        .route("/stats", get(handlers::get_appointment_stats))
        .route("/{appointment_id}", get(handlers::get_appointment))
        .route("/{appointment_id}/confirm", patch(handlers::confirm_appointment))
        .route("/{appointment_id}/start", patch(handlers::start_appointment))
        .route("/{appointment_id}/cancel", patch(handlers::cancel_appointment))
        .route("/{appointment_id}/complete", patch(handlers::complete_appointment))
        .route("/{appointment_id}/no-show", patch(handlers::mark_no_show))
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}

/// Routes mounted under /practitioners.
pub fn practitioner_routes(state: Arc<AppointmentCellState>) -> Router {
    let auth_state = Arc::new(state.config.clone());

    let protected_routes = Router::new()
        .route(
            "/{practitioner_id}/availability",
            get(handlers::get_availability),
        )
        .layer(middleware::from_fn_with_state(auth_state, auth_middleware));

    Router::new().merge(protected_routes).with_state(state)
}
