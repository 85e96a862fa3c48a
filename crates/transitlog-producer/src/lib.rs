//! # transitlog-producer: Topic provisioning and event production
//!
//! Two pieces every event source is built from:
//!
//! - [`TopicProvisioner`]: makes sure a topic exists before the first record
//!   targets it. Idempotent per [`ProvisionRegistry`], and a broker reporting
//!   the topic as already present is not an error.
//! - [`EventProducer`]: serializes keys and values against registered
//!   schemas and buffers them. Records reach the broker on [`EventProducer::poll`],
//!   when the linger threshold is crossed, or on the final flush.
//!
//! Every publish returns a [`DeliveryHandle`] that resolves once the record
//! was appended or rejected. Failures are also logged and counted, so a caller
//! that drops its handles still sees them in the [`FlushReport`].
//!
//! # Example
//!
//! ```
//! use serde_json::json;
//! use transitlog_log::{MemoryBroker, TopicSpec};
//! use transitlog_producer::{EventProducer, ProvisionRegistry, TopicProvisioner};
//! use transitlog_schema::{MemorySchemaRegistry, Schema, SchemaRegistry};
//!
//! let broker = MemoryBroker::new();
//! let registry = ProvisionRegistry::new();
//! let provisioner = TopicProvisioner::new(broker.clone())
//!     .with_propagation_delay(std::time::Duration::ZERO);
//! let spec = TopicSpec::new("demo.events", 2, 1);
//! provisioner.ensure_topic(&registry, &spec).unwrap();
//!
//! let schemas = MemorySchemaRegistry::new("http://localhost:8081");
//! let key_schema = schemas.register_schema(Schema::parse(r#"{
//!     "type": "record", "name": "key",
//!     "fields": [{"name": "timestamp", "type": "long"}]
//! }"#).unwrap()).unwrap();
//!
//! let mut producer = EventProducer::new(broker);
//! let handle = producer
//!     .publish(&spec.name, &json!({"timestamp": 1}), &json!({"timestamp": 2}), &key_schema, &key_schema)
//!     .unwrap();
//!
//! let report = producer.close();
//! assert!(report.is_complete());
//! assert!(handle.wait().is_ok());
//! ```

mod error;
mod producer;
mod provisioner;


pub use error::{DeliveryError, ProducerError, ProvisionError};
pub use producer::{
    DeliveryHandle, EventProducer, Flush, FlushReport, ProducerConfig, ProducerStats,
};
pub use transitlog_types::time_millis;
pub use provisioner::{
    DEFAULT_PROPAGATION_DELAY, ProvisionRegistry, Provisioned, TopicProvisioner,
};
