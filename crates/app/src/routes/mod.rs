mod health;
mod history;
mod index;
mod query;
mod upload;

use crate::state::AppState;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    // Browser frontends call the API directly.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .merge(health::routes())
        .merge(history::routes())
        .merge(index::routes())
        .merge(query::routes())
        .merge(upload::routes())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
