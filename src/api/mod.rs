mod handlers;
pub mod middleware;

use std::sync::Arc;

use axum::{
    extract::FromRef,
    middleware::from_fn_with_state,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::db::Database;
use crate::tns::TnsRegistry;
use middleware::AccessConfig;

/// Shared state for every request.
#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub registry: Arc<dyn TnsRegistry>,
}

impl FromRef<AppState> for Database {
    fn from_ref(state: &AppState) -> Self {
        state.db.clone()
    }
}

pub fn create_router(
    db: Database,
    registry: Arc<dyn TnsRegistry>,
    access: AccessConfig,
) -> Router {
    let state = AppState { db, registry };

    let api = Router::new()
        // Targets
        .route("/targets", get(handlers::list_targets))
        .route("/targets", post(handlers::create_target))
        .route("/targets/{id}", get(handlers::get_target))
        // TNS reporting
        .route("/targets/{id}/tns", get(handlers::show_report_form))
        .route("/targets/{id}/tns/{form}", post(handlers::submit_report))
        .route_layer(from_fn_with_state(access, middleware::auth_middleware))
        // Health
        .route("/health", get(handlers::health));

    Router::new()
        .nest("/api/v1", api)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}
