use std::sync::Arc;

use axum::{routing::get, Router};

use appointment_cell::router::{
    appointment_routes, practitioner_routes, AppointmentCellState,
};
use feedback_cell::router::{feedback_routes, FeedbackCellState};
use notification_cell::router::{notification_routes, NotificationCellState};
use shared_config::AppConfig;

/// Wires the cells together: the appointment cell shares the notification
/// scheduler (so lifecycle events land in the same task store the
/// notification routes read) and the feedback cell shares the appointment
/// store (so its completed-status gate sees the controller's writes).
pub fn create_router(config: AppConfig) -> Router {
    let notifications = Arc::new(NotificationCellState::new(config.clone()));
    let appointments = Arc::new(AppointmentCellState::new(
        config.clone(),
        notifications.scheduler.clone(),
    ));
    let feedback = Arc::new(FeedbackCellState::new(
        config,
        Arc::clone(&appointments.store),
    ));

    Router::new()
        .route("/", get(|| async { "Therapy practice API is running!" }))
        .nest("/appointments", appointment_routes(Arc::clone(&appointments)))
        .nest("/practitioners", practitioner_routes(appointments))
        .nest("/notifications", notification_routes(notifications))
        .nest("/feedback", feedback_routes(feedback))
}
