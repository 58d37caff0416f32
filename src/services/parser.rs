//! Turns a raw `<id>/<size>` key into an [`ObjectReference`].

use crate::{
    config::SizeBounds,
    errors::{PipelineError, PipelineResult},
    models::reference::{MEDIA_PREFIX, ObjectReference},
};

/// Parse and validate a request key.
///
/// Accepts `<id>/<size>` and `media/<id>/<size>`; segments past the size are
/// ignored. A size that is not a base-10 integer reads as `0` and therefore
/// fails the range check.
pub fn parse(raw_key: &str, bounds: SizeBounds) -> PipelineResult<ObjectReference> {
    let mut parts: Vec<&str> = raw_key.split('/').filter(|s| !s.is_empty()).collect();

    if parts.len() >= 3 && parts[0] == MEDIA_PREFIX {
        parts.remove(0);
    }

    let &[id, size, ..] = parts.as_slice() else {
        return Err(PipelineError::BadRequest(
            "`key` should be `<object-id>/<scaled-size>`".into(),
        ));
    };

    let size = size.parse::<u32>().unwrap_or(0);
    if size < bounds.min || size > bounds.max {
        return Err(PipelineError::BadRequest(format!(
            "Requested scaled image size must be in the range {} to {}",
            bounds.min, bounds.max
        )));
    }

    Ok(ObjectReference::new(id, size))
}
