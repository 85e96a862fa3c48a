//! # transitlog-schema: Schema registry and checked serialization
//!
//! Producers never write free-form bytes: every key and value is checked
//! against a schema registered with a [`SchemaRegistry`] and framed with the
//! id it was registered under.
//!
//! Schemas are registered once at bootstrap and handed around as immutable
//! [`SchemaHandle`]s.
//!
//! # Wire Format
//!
//! ```text
//! [magic:u8 = 0][schema_id:u32 BE][payload: JSON document]
//! ```
//!
//! # Example
//!
//! ```
//! use transitlog_schema::{MemorySchemaRegistry, Schema, SchemaRegistry, decode, encode};
//!
//! let registry = MemorySchemaRegistry::new("http://localhost:8081");
//! let schema = Schema::parse(r#"{
//!     "type": "record", "name": "key", "namespace": "demo",
//!     "fields": [{"name": "timestamp", "type": "long"}]
//! }"#).unwrap();
//! let handle = registry.register_schema(schema).unwrap();
//!
//! let bytes = encode(&handle, &serde_json::json!({"timestamp": 1})).unwrap();
//! let (id, value) = decode(&registry, &bytes).unwrap();
//! assert_eq!(id, handle.id());
//! assert_eq!(value["timestamp"], 1);
//! ```

mod error;
mod registry;
mod schema;
mod wire;


pub use error::SchemaError;
pub use registry::{MemorySchemaRegistry, SchemaHandle, SchemaId, SchemaRegistry};
pub use schema::{Field, FieldType, Schema};
pub use wire::{MAGIC_BYTE, decode, decode_record, encode, encode_record};
