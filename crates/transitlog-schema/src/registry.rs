//! Schema registry client contract and an in-process implementation.

use std::collections::{BTreeMap, HashMap};
use std::fmt::Display;
use std::sync::{Arc, RwLock};

use serde::{Deserialize, Serialize};

use crate::{Schema, SchemaError};

/// Identifier the registry assigned to a schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaId(u32);

impl SchemaId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn as_u32(&self) -> u32 {
        self.0
    }
}

impl Display for SchemaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable reference to a registered schema.
///
/// Obtained once from [`SchemaRegistry::register`] and passed to every
/// serialization call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaHandle {
    id: SchemaId,
    subject: String,
    schema: Arc<Schema>,
}

impl SchemaHandle {
    pub fn id(&self) -> SchemaId {
        self.id
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

/// A registry resolving schemas by id and by subject.
pub trait SchemaRegistry: Send + Sync {
    /// Returns the URL identifying this registry.
    fn url(&self) -> &str;

    /// Registers `schema` under `subject`.
    ///
    /// Registering an identical schema again returns the same id.
    fn register(&self, subject: &str, schema: Schema) -> Result<SchemaHandle, SchemaError>;

    /// Looks up a schema by id.
    fn schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>, SchemaError>;

    /// Returns the most recently registered schema for `subject`.
    fn latest(&self, subject: &str) -> Result<SchemaHandle, SchemaError>;

    /// Registers `schema` under its full record name.
    fn register_schema(&self, schema: Schema) -> Result<SchemaHandle, SchemaError> {
        let subject = schema.full_name();
        self.register(&subject, schema)
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    by_id: BTreeMap<SchemaId, Arc<Schema>>,
    by_fingerprint: HashMap<[u8; 32], SchemaId>,
    /// Subject -> ids in registration order.
    subjects: HashMap<String, Vec<SchemaId>>,
    next_id: u32,
}

/// In-process schema registry.
///
/// Ids are allocated from 1 and shared across subjects: the same schema
/// registered under two subjects has one id.
#[derive(Debug, Clone)]
pub struct MemorySchemaRegistry {
    url: Arc<str>,
    state: Arc<RwLock<RegistryState>>,
}

impl MemorySchemaRegistry {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: Arc::from(url.into()),
            state: Arc::new(RwLock::new(RegistryState {
                next_id: 1,
                ..RegistryState::default()
            })),
        }
    }

    /// Returns the registered subjects, sorted.
    pub fn subjects(&self) -> Vec<String> {
        let Ok(state) = self.state.read() else {
            return Vec::new();
        };
        let mut subjects: Vec<String> = state.subjects.keys().cloned().collect();
        subjects.sort();
        subjects
    }
}

fn poisoned() -> SchemaError {
    SchemaError::Internal("lock poisoned".to_string())
}

impl SchemaRegistry for MemorySchemaRegistry {
    fn url(&self) -> &str {
        &self.url
    }

    fn register(&self, subject: &str, schema: Schema) -> Result<SchemaHandle, SchemaError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let fingerprint = schema.fingerprint();

        let (id, schema) = match state.by_fingerprint.get(&fingerprint).copied() {
            Some(id) => {
                let existing = Arc::clone(&state.by_id[&id]);
                (id, existing)
            }
            None => {
                let id = SchemaId::new(state.next_id);
                state.next_id += 1;
                let schema = Arc::new(schema);
                state.by_id.insert(id, Arc::clone(&schema));
                state.by_fingerprint.insert(fingerprint, id);
                tracing::debug!(%id, name = %schema.full_name(), "schema registered");
                (id, schema)
            }
        };

        let versions = state.subjects.entry(subject.to_string()).or_default();
        if !versions.contains(&id) {
            versions.push(id);
        }

        Ok(SchemaHandle {
            id,
            subject: subject.to_string(),
            schema,
        })
    }

    fn schema_by_id(&self, id: SchemaId) -> Result<Arc<Schema>, SchemaError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        state
            .by_id
            .get(&id)
            .cloned()
            .ok_or(SchemaError::NotFound(id))
    }

    fn latest(&self, subject: &str) -> Result<SchemaHandle, SchemaError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        let id = state
            .subjects
            .get(subject)
            .and_then(|ids| ids.last().copied())
            .ok_or_else(|| SchemaError::SubjectNotFound(subject.to_string()))?;
        let schema = state.by_id.get(&id).cloned().ok_or(SchemaError::NotFound(id))?;

        Ok(SchemaHandle {
            id,
            subject: subject.to_string(),
            schema,
        })
    }
}
