//! HTTP handlers for thumbnail requests.
//!
//! `/scale` and `/invoke` answer with the gateway envelope as JSON, for a
//! gateway to unwrap. `/media/{*key}` renders the envelope directly.

use crate::{models::envelope::ResponseEnvelope, services::pipeline::ThumbnailService};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::collections::HashMap;

/// Query params accepted by `GET /scale`. `object` is the older name for
/// `key`; `key` wins when both are present.
#[derive(Debug, Deserialize)]
pub struct ScaleQuery {
    pub key: Option<String>,
    pub object: Option<String>,
}

impl ScaleQuery {
    pub fn requested_key(&self) -> Option<&str> {
        self.key.as_deref().or(self.object.as_deref())
    }
}

/// The part of an HTTP gateway proxy event this service reads.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

/// `GET /scale?key=<id>/<size>`
pub async fn scale(
    State(service): State<ThumbnailService>,
    Query(q): Query<ScaleQuery>,
) -> Json<ResponseEnvelope> {
    Json(service.handle(q.requested_key()).await)
}

/// `POST /invoke` with a gateway proxy event body.
pub async fn invoke(State(service): State<ThumbnailService>, body: Bytes) -> Json<ResponseEnvelope> {
    let event: GatewayEvent = match serde_json::from_slice(&body) {
        Ok(event) => event,
        Err(err) => {
            tracing::error!("failed to parse request JSON: {}", err);
            return Json(ResponseEnvelope::error(
                500,
                &format!("Failed to parse request JSON: {}", err),
            ));
        }
    };

    let key = event.query_string_parameters.as_ref().and_then(|params| {
        params
            .get("key")
            .or_else(|| params.get("object"))
            .map(String::as_str)
    });
    Json(service.handle(key).await)
}

/// `GET /media/{*key}`: the thumbnail itself, as a plain HTTP response.
pub async fn media(
    State(service): State<ThumbnailService>,
    Path(key): Path<String>,
) -> Response {
    service.handle(Some(&key)).await.into_response()
}
