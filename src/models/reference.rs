//! Identifies an origin object and the thumbnail height requested for it.

use serde::Serialize;

/// Prefix under which both originals and derivatives live in the media bucket.
pub const MEDIA_PREFIX: &str = "media";

/// A validated `<id>/<size>` request.
///
/// Only the request parser constructs these, so `id` is always non-empty and
/// `requested_size` always lies inside the configured bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectReference {
    id: String,
    requested_size: u32,
}

impl ObjectReference {
    pub(crate) fn new(id: impl Into<String>, requested_size: u32) -> Self {
        Self {
            id: id.into(),
            requested_size,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn requested_size(&self) -> u32 {
        self.requested_size
    }

    /// Key of the original upload: `media/<id>`.
    pub fn origin_key(&self) -> String {
        format!("{}/{}", MEDIA_PREFIX, self.id)
    }

    /// Key the derivative is published under: `media/<id>/<size>`.
    pub fn derived_key(&self) -> String {
        format!("{}/{}/{}", MEDIA_PREFIX, self.id, self.requested_size)
    }
}
