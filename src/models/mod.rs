//! Values that flow through the thumbnail pipeline.
//!
//! Each request builds its own instances of these types; none of them are
//! shared across requests.

pub mod envelope;
pub mod payload;
pub mod reference;
