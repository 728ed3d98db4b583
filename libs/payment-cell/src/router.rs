use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::AppConfig;
use shared_utils::extractor::auth_middleware;

use crate::handlers;

pub fn payment_routes(state: Arc<AppConfig>) -> Router {
    Router::new()
        .route("/", post(handlers::create_payment))
        .route("/summary", get(handlers::revenue_summary))
        .route("/{payment_id}", get(handlers::get_payment))
        .route("/{payment_id}/confirm", patch(handlers::confirm_payment))
        .route("/{payment_id}/fail", patch(handlers::fail_payment))
        .route("/{payment_id}/refund", patch(handlers::refund_payment))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .with_state(state)
}
