//! Per-request diagnostics collected alongside the normal pipeline output.
//!
//! Recording is a no-op when disabled, and nothing in the pipeline ever
//! reads these values back, so they cannot change a request's outcome.

use serde_json::{Map, Value};

#[derive(Debug, Default)]
pub struct Diagnostics {
    enabled: bool,
    values: Map<String, Value>,
}

impl Diagnostics {
    pub fn new(enabled: bool) -> Self {
        Self {
            enabled,
            values: Map::new(),
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn record(&mut self, name: &str, value: impl Into<Value>) {
        if self.enabled {
            self.values.insert(name.to_string(), value.into());
        }
    }

    /// Like [`Diagnostics::record`], but only builds the value when enabled.
    pub fn record_with<V, F>(&mut self, name: &str, value: F)
    where
        V: Into<Value>,
        F: FnOnce() -> V,
    {
        if self.enabled {
            self.values.insert(name.to_string(), value().into());
        }
    }

    pub fn into_report(self) -> Value {
        Value::Object(self.values)
    }
}
