pub mod health;

use axum::{routing::get, Router};

use crate::profile::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        .route(
            "/profile",
            get(handlers::handle_get_profile)
                .post(handlers::handle_create_profile)
                .put(handlers::handle_update_profile),
        )
        .route("/profile/exists", get(handlers::handle_profile_exists))
        .route(
            "/recommendations",
            get(handlers::handle_get_recommendations),
        )
        .with_state(state)
}
