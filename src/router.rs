use axum::routing::{get, patch, post};
use axum::{middleware, Extension, Router};

use crate::approval::EntityKind;
use crate::auth::{require_admin, require_scheduler_secret};
use crate::handlers::health_handler;
use crate::handlers::jobs::{
    claim_job_handler, complete_job_handler, fail_job_handler, list_jobs_handler,
    schedule_all_handler, schedule_job_handler,
};
use crate::handlers::moderation::{
    approve_all_handler, list_approved_handler, pending_handler, set_status_handler,
};
use crate::state::AppState;

fn moderation_routes(kind: EntityKind) -> Router<AppState> {
    Router::new()
        .route("/approve-all", post(approve_all_handler))
        .route("/pending", get(pending_handler))
        .route("/:id/status", patch(set_status_handler))
        .layer(Extension(kind))
}

pub fn app(state: AppState) -> Router {
    let scheduler_routes = Router::new()
        .route("/jobs/schedule", post(schedule_all_handler))
        .route("/jobs/schedule/:job_type", post(schedule_job_handler))
        .route("/jobs/claim", post(claim_job_handler))
        .route("/jobs/complete", post(complete_job_handler))
        .route("/jobs/fail", post(fail_job_handler))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_scheduler_secret,
        ));

    let admin_routes = Router::new()
        .route("/admin/jobs", get(list_jobs_handler))
        .route("/admin/jobs/schedule/:job_type", post(schedule_job_handler))
        .nest("/admin/clubs", moderation_routes(EntityKind::Club))
        .nest("/admin/events", moderation_routes(EntityKind::Event))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_admin));

    Router::new()
        .route("/health", get(health_handler))
        .route(
            "/clubs",
            get(list_approved_handler).layer(Extension(EntityKind::Club)),
        )
        .route(
            "/events",
            get(list_approved_handler).layer(Extension(EntityKind::Event)),
        )
        .merge(scheduler_routes)
        .merge(admin_routes)
        .with_state(state)
}
