//! Idempotent topic provisioning.

use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use transitlog_log::{LogBroker, TopicSpec};
use transitlog_types::TopicName;

use crate::ProvisionError;

/// Pause after creating a topic, before the first record targets it.
pub const DEFAULT_PROPAGATION_DELAY: Duration = Duration::from_secs(1);

/// Set of topics provisioned by this process.
///
/// Clones share the same set. Create one at bootstrap and pass it to every
/// provisioning call; tests get an isolated registry by creating their own.
#[derive(Debug, Clone, Default)]
pub struct ProvisionRegistry {
    topics: Arc<RwLock<HashSet<TopicName>>>,
}

impl ProvisionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if `topic` was provisioned through this registry.
    pub fn contains(&self, topic: &TopicName) -> Result<bool, ProvisionError> {
        let topics = self.topics.read().map_err(|_| poisoned())?;
        Ok(topics.contains(topic))
    }

    /// Returns the provisioned topics, sorted.
    pub fn topics(&self) -> Vec<TopicName> {
        let Ok(topics) = self.topics.read() else {
            return Vec::new();
        };
        let mut names: Vec<TopicName> = topics.iter().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.topics.read().map_or(0, |topics| topics.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn record(&self, topic: TopicName) -> Result<(), ProvisionError> {
        let mut topics = self.topics.write().map_err(|_| poisoned())?;
        topics.insert(topic);
        Ok(())
    }
}

fn poisoned() -> ProvisionError {
    ProvisionError::Internal("lock poisoned".to_string())
}

/// How [`TopicProvisioner::ensure_topic`] satisfied a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provisioned {
    /// The registry already held the name; the broker was not contacted.
    AlreadyKnown,
    /// The topic was created by this call.
    Created,
    /// The broker already had the topic, typically from an earlier process.
    ExistedOnBroker,
}

/// Creates topics on a broker, at most once per registry.
#[derive(Debug, Clone)]
pub struct TopicProvisioner<B: LogBroker> {
    broker: B,
    propagation_delay: Duration,
}

impl<B: LogBroker> TopicProvisioner<B> {
    pub fn new(broker: B) -> Self {
        Self {
            broker,
            propagation_delay: DEFAULT_PROPAGATION_DELAY,
        }
    }

    /// Sets the pause taken after a successful creation.
    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.propagation_delay = delay;
        self
    }

    pub fn propagation_delay(&self) -> Duration {
        self.propagation_delay
    }

    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Ensures the topic described by `spec` exists.
    ///
    /// A name already in `registry` returns immediately. Otherwise the broker
    /// is asked to create the topic; "already exists" counts as success. On
    /// success the name is recorded, and after an actual creation the call
    /// blocks for the propagation delay. The wait is not retried: a topic that
    /// is still not ready shows up later as a delivery failure.
    ///
    /// # Errors
    ///
    /// Any other admin failure is returned and the name is not recorded, so a
    /// later call tries again.
    pub fn ensure_topic(
        &self,
        registry: &ProvisionRegistry,
        spec: &TopicSpec,
    ) -> Result<Provisioned, ProvisionError> {
        if registry.contains(&spec.name)? {
            tracing::debug!(topic = %spec.name, "topic already provisioned");
            return Ok(Provisioned::AlreadyKnown);
        }

        match self.broker.create_topic(spec) {
            Ok(()) => {
                registry.record(spec.name.clone())?;
                tracing::info!(
                    topic = %spec.name,
                    partitions = spec.partitions,
                    replication_factor = spec.replication_factor,
                    "created topic"
                );
                if !self.propagation_delay.is_zero() {
                    thread::sleep(self.propagation_delay);
                }
                Ok(Provisioned::Created)
            }
            Err(e) if e.is_already_exists() => {
                registry.record(spec.name.clone())?;
                tracing::debug!(topic = %spec.name, "topic already exists on broker");
                Ok(Provisioned::ExistedOnBroker)
            }
            Err(source) => {
                tracing::error!(topic = %spec.name, error = %source, "failed to create topic");
                Err(ProvisionError::Admin {
                    topic: spec.name.clone(),
                    source,
                })
            }
        }
    }
}
