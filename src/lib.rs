//! thumbd: on-demand thumbnail generation over an object store.
//!
//! A request names an original (`<id>/<size>`); the service fetches
//! `media/<id>`, scales raster images to the requested height (SVG passes
//! through), stores the result under `media/<id>/<size>`, and returns it.

pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod services;
pub mod store;

use axum::Router;
use services::pipeline::ThumbnailService;

/// The full application router with its state attached.
pub fn app(service: ThumbnailService) -> Router {
    routes::routes::routes().with_state(service)
}
