//! Defines routes for the thumbnail service.
//!
//! ## Structure
//! - **Health**
//!   - `GET  /healthz`   liveness
//!   - `GET  /readyz`    object store reachability
//!
//! - **Thumbnails**
//!   - `GET  /scale?key=<id>/<size>`   gateway envelope as JSON
//!   - `POST /invoke`                  gateway proxy event in, envelope out
//!   - `GET  /media/{*key}`            thumbnail as a direct HTTP response
//!
//! The wildcard `*key` takes the `<id>/<size>` remainder of the path.

use crate::{
    handlers::{
        health_handlers::{healthz, readyz},
        scale_handlers::{invoke, media, scale},
    },
    services::pipeline::ThumbnailService,
};
use axum::{
    Router,
    routing::{get, post},
};

/// Build the router. State (`ThumbnailService`) is attached by the caller.
pub fn routes() -> Router<ThumbnailService> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/scale", get(scale))
        .route("/invoke", post(invoke))
        .route("/media/{*key}", get(media))
}
