//! REST backend for resource collections (`/tasks`, `/posts`).
//!
//! # Overview
//! One generic set of handlers serves every registered resource:
//! paginated listing with a `content-range` header, schema-validated create
//! and partial update, lookup, and delete. Rows live behind the `Repository`
//! trait; the default registry keeps them in memory.

pub mod config;
pub mod error;
pub mod handlers;
pub mod pagination;
pub mod repository;
pub mod resources;
pub mod validation;

use std::{future::Future, sync::Arc};

use axum::{
    http::{header, Method},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub use config::ServerConfig;
pub use error::{ErrorBody, ServerError};
pub use repository::{InMemoryRepository, Record, RecordId, Repository};
pub use resources::{Registry, Resource};

use handlers::{create_item, delete_item, get_item, list_items, update_item};

/// Router over the standard in-memory `tasks` and `posts` collections.
pub fn app() -> Router {
    app_with(Registry::standard())
}

pub fn app_with(registry: Registry) -> Router {
    Router::new()
        .route("/{resource}", get(list_items).post(create_item))
        .route(
            "/{resource}/{id}",
            get(get_item).patch(update_item).delete(delete_item),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_headers(Any)
                .allow_methods([
                    Method::GET,
                    Method::POST,
                    Method::PATCH,
                    Method::DELETE,
                    Method::OPTIONS,
                ])
                .expose_headers([header::CONTENT_RANGE]),
        )
        .with_state(Arc::new(registry))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Serve until `shutdown` resolves, then drain in-flight requests.
pub async fn run_until<F>(listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    axum::serve(listener, app())
        .with_graceful_shutdown(shutdown)
        .await
}
