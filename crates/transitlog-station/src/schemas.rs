//! Arrival event schemas.

use transitlog_schema::{Schema, SchemaError, SchemaHandle, SchemaRegistry};

/// Schema of the arrival key: `{ timestamp }` in epoch milliseconds.
pub const ARRIVAL_KEY_SCHEMA: &str = include_str!("../schemas/arrival_key.json");

/// Schema of the arrival value.
pub const ARRIVAL_VALUE_SCHEMA: &str = include_str!("../schemas/arrival_value.json");

/// Registered arrival key and value schemas.
///
/// Registered once per process and cloned into every station.
#[derive(Debug, Clone)]
pub struct ArrivalSchemas {
    key: SchemaHandle,
    value: SchemaHandle,
}

impl ArrivalSchemas {
    /// Registers both bundled schemas under their record names.
    pub fn register<R: SchemaRegistry + ?Sized>(registry: &R) -> Result<Self, SchemaError> {
        let key = registry.register_schema(Schema::parse(ARRIVAL_KEY_SCHEMA)?)?;
        let value = registry.register_schema(Schema::parse(ARRIVAL_VALUE_SCHEMA)?)?;
        tracing::debug!(
            registry = registry.url(),
            key_id = %key.id(),
            value_id = %value.id(),
            "arrival schemas registered"
        );
        Ok(Self { key, value })
    }

    pub fn key(&self) -> &SchemaHandle {
        &self.key
    }

    pub fn value(&self) -> &SchemaHandle {
        &self.value
    }
}
