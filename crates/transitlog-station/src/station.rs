//! The station entity.

use std::fmt::{self, Display};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use transitlog_log::LogBroker;
use transitlog_producer::{
    DeliveryHandle, EventProducer, Flush, FlushReport, ProducerConfig, ProducerStats,
    ProvisionRegistry, TopicProvisioner, time_millis,
};
use transitlog_types::{
    ArrivalKey, ArrivalValue, Direction, Line, PartitionId, StationId, TopicName, TrainStatus,
};

use crate::{ArrivalSchemas, ArrivalTopicPolicy, StationError};

/// A train as seen by a station.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Train {
    pub train_id: String,
    pub status: TrainStatus,
}

impl Train {
    pub fn new(train_id: impl Into<String>, status: TrainStatus) -> Self {
        Self {
            train_id: train_id.into(),
            status,
        }
    }
}

/// A neighboring station in one direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationLink {
    pub station_id: StationId,
    pub name: String,
}

impl StationLink {
    pub fn new(station_id: StationId, name: impl Into<String>) -> Self {
        Self {
            station_id,
            name: name.into(),
        }
    }
}

// ============================================================================
// Context
// ============================================================================

/// Process-wide state shared by every station.
///
/// Built once at bootstrap. Stations clone what they need out of it, so the
/// context can be dropped once the network is built.
#[derive(Debug, Clone)]
pub struct StationContext<B: LogBroker> {
    provisioner: TopicProvisioner<B>,
    registry: ProvisionRegistry,
    schemas: ArrivalSchemas,
    policy: ArrivalTopicPolicy,
    producer_config: ProducerConfig,
}

impl<B: LogBroker> StationContext<B> {
    pub fn new(broker: B, schemas: ArrivalSchemas) -> Self {
        Self {
            provisioner: TopicProvisioner::new(broker),
            registry: ProvisionRegistry::new(),
            schemas,
            policy: ArrivalTopicPolicy::default(),
            producer_config: ProducerConfig::default(),
        }
    }

    /// Shares an existing provisioning registry instead of a fresh one.
    pub fn with_registry(mut self, registry: ProvisionRegistry) -> Self {
        self.registry = registry;
        self
    }

    pub fn with_policy(mut self, policy: ArrivalTopicPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_producer_config(mut self, config: ProducerConfig) -> Self {
        self.producer_config = config;
        self
    }

    pub fn with_propagation_delay(mut self, delay: Duration) -> Self {
        self.provisioner = self.provisioner.with_propagation_delay(delay);
        self
    }

    pub fn broker(&self) -> &B {
        self.provisioner.broker()
    }

    pub fn registry(&self) -> &ProvisionRegistry {
        &self.registry
    }

    pub fn schemas(&self) -> &ArrivalSchemas {
        &self.schemas
    }

    pub fn policy(&self) -> &ArrivalTopicPolicy {
        &self.policy
    }
}

// ============================================================================
// Station
// ============================================================================

/// Flush outcome of a closed station.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StationCloseReport {
    /// The attached turnstile producer, if there was one.
    pub turnstile: Option<FlushReport>,
    pub arrivals: FlushReport,
}

impl StationCloseReport {
    pub fn is_complete(&self) -> bool {
        self.arrivals.is_complete() && self.turnstile.is_none_or(|r| r.is_complete())
    }
}

/// A rail station publishing an arrival event for every train that stops.
///
/// Driven by one caller. The `a` and `b` slots hold the last train seen in
/// each direction and are only written by the arrival methods.
pub struct Station<B: LogBroker> {
    station_id: StationId,
    name: String,
    color: Line,
    direction_a: Option<StationLink>,
    direction_b: Option<StationLink>,
    a_train: Option<Train>,
    b_train: Option<Train>,
    topic: TopicName,
    partition: Option<PartitionId>,
    schemas: ArrivalSchemas,
    producer: EventProducer<B>,
    turnstile: Option<Box<dyn Flush + Send>>,
}

impl<B: LogBroker> Station<B> {
    /// Builds a station and provisions its arrival topic.
    ///
    /// # Errors
    ///
    /// Returns [`StationError::Provision`] if the topic could not be created.
    pub fn new(
        ctx: &StationContext<B>,
        station_id: StationId,
        name: impl Into<String>,
        color: Line,
        direction_a: Option<StationLink>,
        direction_b: Option<StationLink>,
    ) -> Result<Self, StationError> {
        let name = name.into();

        let spec = ctx.policy.topic_spec(station_id, &name);
        ctx.provisioner.ensure_topic(&ctx.registry, &spec)?;

        Ok(Self {
            station_id,
            name,
            color,
            direction_a,
            direction_b,
            a_train: None,
            b_train: None,
            topic: spec.name,
            partition: ctx.policy.partition_for(station_id),
            schemas: ctx.schemas.clone(),
            producer: EventProducer::with_config(ctx.broker().clone(), ctx.producer_config),
            turnstile: None,
        })
    }

    /// Attaches the turnstile producer, closed together with the station.
    pub fn with_turnstile(mut self, turnstile: Box<dyn Flush + Send>) -> Self {
        self.turnstile = Some(turnstile);
        self
    }

    /// Records a train arriving in direction `a` and publishes the arrival.
    pub fn arrive_a(
        &mut self,
        train: Train,
        prev_station_id: Option<StationId>,
        prev_direction: Option<Direction>,
    ) -> Result<DeliveryHandle, StationError> {
        self.a_train = Some(train.clone());
        self.emit(&train, Direction::A, prev_station_id, prev_direction)
    }

    /// Records a train arriving in direction `b` and publishes the arrival.
    pub fn arrive_b(
        &mut self,
        train: Train,
        prev_station_id: Option<StationId>,
        prev_direction: Option<Direction>,
    ) -> Result<DeliveryHandle, StationError> {
        self.b_train = Some(train.clone());
        self.emit(&train, Direction::B, prev_station_id, prev_direction)
    }

    fn emit(
        &mut self,
        train: &Train,
        direction: Direction,
        prev_station_id: Option<StationId>,
        prev_direction: Option<Direction>,
    ) -> Result<DeliveryHandle, StationError> {
        let timestamp = time_millis();
        tracing::info!(
            train_id = %train.train_id,
            line = %self.color,
            station_id = %self.station_id,
            %direction,
            timestamp,
            "train arrived"
        );

        let key = ArrivalKey { timestamp };
        let value = ArrivalValue {
            station_id: self.station_id,
            train_id: train.train_id.clone(),
            direction,
            line: self.color,
            train_status: train.status,
            prev_station_id,
            prev_direction,
        };

        Ok(self.producer.publish_record(
            &self.topic,
            self.partition,
            &key,
            &value,
            self.schemas.key(),
            self.schemas.value(),
        )?)
    }

    /// Sends buffered arrivals to the broker.
    pub fn poll(&mut self) -> usize {
        self.producer.poll()
    }

    /// Closes the turnstile producer, then flushes this station's arrivals.
    pub fn close(mut self) -> StationCloseReport {
        let turnstile = self.turnstile.as_mut().map(|t| t.close_and_flush());
        let arrivals = self.producer.close_and_flush();
        if turnstile.is_some_and(|r| !r.is_complete()) || !arrivals.is_complete() {
            tracing::warn!(
                station_id = %self.station_id,
                topic = %self.topic,
                "station closed with undelivered events"
            );
        }
        StationCloseReport {
            turnstile,
            arrivals,
        }
    }

    pub fn station_id(&self) -> StationId {
        self.station_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn color(&self) -> Line {
        self.color
    }

    pub fn topic(&self) -> &TopicName {
        &self.topic
    }

    pub fn direction_a(&self) -> Option<&StationLink> {
        self.direction_a.as_ref()
    }

    pub fn direction_b(&self) -> Option<&StationLink> {
        self.direction_b.as_ref()
    }

    /// Last train that arrived in direction `a`.
    pub fn a_train(&self) -> Option<&Train> {
        self.a_train.as_ref()
    }

    /// Last train that arrived in direction `b`.
    pub fn b_train(&self) -> Option<&Train> {
        self.b_train.as_ref()
    }

    pub fn producer_stats(&self) -> ProducerStats {
        self.producer.stats()
    }
}

impl<B: LogBroker> Display for Station<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn train(t: &Option<Train>) -> &str {
            t.as_ref().map_or("---", |t| t.train_id.as_str())
        }
        fn link(l: &Option<StationLink>) -> &str {
            l.as_ref().map_or("---", |l| l.name.as_str())
        }
        write!(
            f,
            "Station | {:^5} | {:<30} | Direction A: | {:^5} | departing to {:<30} | Direction B: | {:^5} | departing to {:<30} | ",
            self.station_id.as_i64(),
            self.name,
            train(&self.a_train),
            link(&self.direction_a),
            train(&self.b_train),
            link(&self.direction_b),
        )
    }
}

impl<B: LogBroker> fmt::Debug for Station<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Station")
            .field("station_id", &self.station_id)
            .field("name", &self.name)
            .field("color", &self.color)
            .field("topic", &self.topic)
            .field("a_train", &self.a_train)
            .field("b_train", &self.b_train)
            .field("has_turnstile", &self.turnstile.is_some())
            .finish_non_exhaustive()
    }
}
