//! LinkMe back-office HTTP API.
//!
//! Exposes [`workflow::ApprovalService`] over JSON:
//!
//! | Route | Auth | Operation |
//! |-------|------|-----------|
//! | `GET /healthz` | none | liveness |
//! | `GET /v1/orders` | admin | list, filtered by `status`, `channel`, `limit` |
//! | `POST /v1/orders` | admin | create |
//! | `GET /v1/orders/:id` | admin | order view with totals and anomalies |
//! | `GET /v1/orders/:id/history` | admin | status transitions |
//! | `POST /v1/orders/:id/approve` | admin | approve |
//! | `POST /v1/orders/:id/reject` | admin | reject with a reason |
//! | `POST /v1/orders/:id/request-info` | admin | open an info request |
//! | `POST /v1/pricing/quote` | admin | price lines without saving |
//! | `GET /v1/public/info-requests/:token` | link token | fields to complete |
//! | `POST /v1/public/info-requests/:token` | link token | submit details |
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** Routing, authentication, request decoding and error
//! rendering live here; every decision is delegated to the workflow.

use std::sync::Arc;

use axum::middleware::from_fn_with_state;
use axum::routing::{get, post};
use axum::Router;
use workflow::ApprovalService;

mod auth;
mod error;
mod routes;

pub use error::ApiError;
pub use routes::{ActorBody, PublicSubmitResponse, RejectBody, RequestInfoBody};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub service: ApprovalService,
    /// Bearer token required on staff routes.
    pub admin_token: Arc<str>,
}

impl AppState {
    pub fn new(service: ApprovalService, admin_token: impl Into<Arc<str>>) -> Self {
        Self {
            service,
            admin_token: admin_token.into(),
        }
    }
}

/// Builds the application router.
pub fn build_router(state: AppState) -> Router {
    let staff = Router::new()
        .route("/orders", get(routes::list_orders).post(routes::create_order))
        .route("/orders/:id", get(routes::get_order))
        .route("/orders/:id/history", get(routes::order_history))
        .route("/orders/:id/approve", post(routes::approve_order))
        .route("/orders/:id/reject", post(routes::reject_order))
        .route("/orders/:id/request-info", post(routes::request_info))
        .route("/pricing/quote", post(routes::quote))
        .route_layer(from_fn_with_state(state.clone(), auth::require_admin));

    let public = Router::new().route(
        "/public/info-requests/:token",
        get(routes::public_info_request).post(routes::submit_info),
    );

    Router::new()
        .route("/healthz", get(routes::healthz))
        .nest("/v1", staff.merge(public))
        .with_state(state)
}
