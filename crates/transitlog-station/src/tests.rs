//! Unit tests for transitlog-station

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use proptest::prelude::*;
use test_case::test_case;
use transitlog_log::{LogBroker, MemoryBroker};
use transitlog_producer::{Flush, FlushReport, ProducerConfig, ProvisionRegistry};
use transitlog_schema::{MemorySchemaRegistry, decode_record};
use transitlog_types::{
    ArrivalKey, ArrivalValue, Direction, Line, PartitionId, StationId, TopicName, TrainStatus,
};

use crate::{
    ArrivalPartitioning, ArrivalSchemas, ArrivalTopicPolicy, Station, StationContext,
    StationError, StationLink, Train, normalize_station_name,
};

struct Fixture {
    broker: MemoryBroker,
    schemas: MemorySchemaRegistry,
    ctx: StationContext<MemoryBroker>,
}

fn fixture() -> Fixture {
    fixture_with(ArrivalTopicPolicy::default())
}

fn fixture_with(policy: ArrivalTopicPolicy) -> Fixture {
    let broker = MemoryBroker::new();
    let schemas = MemorySchemaRegistry::new("http://localhost:8081");
    let arrival_schemas = ArrivalSchemas::register(&schemas).unwrap();
    let ctx = StationContext::new(broker.clone(), arrival_schemas)
        .with_policy(policy)
        .with_propagation_delay(Duration::ZERO)
        .with_producer_config(ProducerConfig { batch_size: 0 });
    Fixture {
        broker,
        schemas,
        ctx,
    }
}

fn austin(ctx: &StationContext<MemoryBroker>) -> Station<MemoryBroker> {
    Station::new(
        ctx,
        StationId::new(40380),
        "Austin",
        Line::Red,
        Some(StationLink::new(StationId::new(40390), "Oak Park")),
        None,
    )
    .unwrap()
}

fn t1() -> Train {
    Train::new("T1", TrainStatus::InService)
}

// ============================================================================
// Naming
// ============================================================================

#[test_case("Austin", "austin")]
#[test_case("Harlem-Lake", "harlem_lake")]
#[test_case("Washington/Wabash", "washington_and_wabash")]
#[test_case("O'Hare", "ohare")]
#[test_case("Conservatory-Central Park Drive", "conservatory_central_park_drive")]
#[test_case("Adams/Wabash", "adams_and_wabash")]
fn normalizes_station_names(name: &str, expected: &str) {
    assert_eq!(normalize_station_name(name), expected);
}

#[test]
fn per_station_topic_name() {
    let policy = ArrivalTopicPolicy::default();
    assert_eq!(
        policy.topic_name(StationId::new(40380), "Austin"),
        TopicName::new("org.chicago.cta.station.arrivals.40380-austin")
    );

    let spec = policy.topic_spec(StationId::new(40380), "Austin");
    assert_eq!(spec.partitions, 2);
    assert_eq!(spec.replication_factor, 1);
}

#[test]
fn shared_policy_ignores_station() {
    let policy = ArrivalTopicPolicy::shared("org.chicago.cta.arrivals");
    assert_eq!(
        policy.topic_name(StationId::new(1), "A"),
        policy.topic_name(StationId::new(2), "B")
    );
}

proptest! {
    #[test]
    fn normalized_names_are_topic_safe(name in "[A-Za-z0-9 /'-]{1,40}") {
        let normalized = normalize_station_name(&name);
        prop_assert!(normalized.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'));
    }

    #[test]
    fn by_station_pins_one_partition(id in any::<i64>(), partitions in 1u32..16) {
        let policy = ArrivalTopicPolicy::default()
            .with_partitions(partitions)
            .with_partitioning(ArrivalPartitioning::ByStation);
        let partition = policy.partition_for(StationId::new(id)).unwrap();
        prop_assert!(partition.as_u32() < partitions);
        prop_assert_eq!(Some(partition), policy.partition_for(StationId::new(id)));
    }
}

// ============================================================================
// Construction
// ============================================================================

#[test]
fn new_station_provisions_its_topic_once() {
    let fx = fixture();
    let first = austin(&fx.ctx);
    let second = austin(&fx.ctx);

    assert_eq!(first.topic(), second.topic());
    assert_eq!(fx.broker.create_topic_calls(), 1);
    let spec = fx.broker.describe_topic(first.topic()).unwrap();
    assert_eq!(spec.partitions, 2);
}

#[test]
fn provisioning_failure_fails_construction() {
    let fx = fixture();
    fx.broker
        .fail_topic_creation("org.chicago.cta.station.arrivals.40380-austin");

    let result = Station::new(&fx.ctx, StationId::new(40380), "Austin", Line::Red, None, None);

    assert!(matches!(result, Err(StationError::Provision(_))));
    assert!(fx.ctx.registry().is_empty());
}

#[test]
fn registry_is_shared_across_contexts() {
    let registry = ProvisionRegistry::new();
    let fx = fixture();
    let ctx = fx.ctx.clone().with_registry(registry.clone());

    austin(&ctx);

    assert_eq!(registry.len(), 1);
}

// ============================================================================
// Arrivals
// ============================================================================

#[test]
fn austin_arrival_event() {
    let fx = fixture();
    let mut station = austin(&fx.ctx);

    let handle = station
        .arrive_a(t1(), Some(StationId::new(40390)), Some(Direction::B))
        .unwrap();
    let report = station.close();

    assert!(report.is_complete());
    let metadata = handle.wait().unwrap();
    assert_eq!(
        metadata.topic,
        TopicName::new("org.chicago.cta.station.arrivals.40380-austin")
    );

    let records = fx.broker.all_records(&metadata.topic).unwrap();
    assert_eq!(records.len(), 1);

    let key: ArrivalKey =
        decode_record(&fx.schemas, records[0].key.as_ref().unwrap()).unwrap();
    assert!(key.timestamp > 0);

    let value: ArrivalValue = decode_record(&fx.schemas, &records[0].value).unwrap();
    assert_eq!(
        value,
        ArrivalValue {
            station_id: StationId::new(40380),
            train_id: "T1".to_string(),
            direction: Direction::A,
            line: Line::Red,
            train_status: TrainStatus::InService,
            prev_station_id: Some(StationId::new(40390)),
            prev_direction: Some(Direction::B),
        }
    );
}

#[test]
fn first_station_has_no_predecessor() {
    let fx = fixture();
    let mut station = austin(&fx.ctx);

    station.arrive_b(t1(), None, None).unwrap();
    station.poll();

    let records = fx.broker.all_records(station.topic()).unwrap();
    let value: serde_json::Value =
        serde_json::from_slice(&records[0].value[5..]).unwrap();
    assert!(value["prev_station_id"].is_null());
    assert!(value["prev_direction"].is_null());
    assert_eq!(value["direction"], "b");
}

#[test]
fn arrivals_fill_direction_slots() {
    let fx = fixture();
    let mut station = austin(&fx.ctx);
    assert!(station.a_train().is_none());

    station.arrive_a(t1(), None, None).unwrap();
    station
        .arrive_b(Train::new("T2", TrainStatus::BrokenDown), None, None)
        .unwrap();
    station
        .arrive_a(Train::new("T3", TrainStatus::InService), None, None)
        .unwrap();

    assert_eq!(station.a_train().unwrap().train_id, "T3");
    assert_eq!(station.b_train().unwrap().status, TrainStatus::BrokenDown);
    assert_eq!(station.producer_stats().enqueued, 3);
}

#[test]
fn by_station_partitioning_keeps_one_partition() {
    let fx = fixture_with(
        ArrivalTopicPolicy::default().with_partitioning(ArrivalPartitioning::ByStation),
    );
    let mut station = austin(&fx.ctx);

    for _ in 0..6 {
        station.arrive_a(t1(), None, None).unwrap();
    }
    station.close();

    let topic = fx.ctx.policy().topic_name(StationId::new(40380), "Austin");
    let p0 = fx.broker.records(&topic, PartitionId::new(0)).unwrap();
    let p1 = fx.broker.records(&topic, PartitionId::new(1)).unwrap();
    assert!(p0.is_empty() || p1.is_empty());
    assert_eq!(p0.len() + p1.len(), 6);
}

#[test]
fn shared_topic_is_provisioned_once() {
    let fx = fixture_with(ArrivalTopicPolicy::shared("org.chicago.cta.arrivals"));
    let mut austin = austin(&fx.ctx);
    let mut oak_park = Station::new(&fx.ctx, StationId::new(40390), "Oak Park", Line::Green, None, None).unwrap();

    austin.arrive_a(t1(), None, None).unwrap();
    oak_park.arrive_b(t1(), None, None).unwrap();
    austin.close();
    oak_park.close();

    assert_eq!(fx.broker.create_topic_calls(), 1);
    assert_eq!(
        fx.broker
            .all_records(&TopicName::new("org.chicago.cta.arrivals"))
            .unwrap()
            .len(),
        2
    );
}

#[test]
fn delivery_failure_is_isolated_per_station() {
    let fx = fixture();
    let mut austin = austin(&fx.ctx);
    let mut oak_park = Station::new(&fx.ctx, StationId::new(40390), "Oak Park", Line::Green, None, None).unwrap();
    fx.broker.fail_appends_to(austin.topic().clone());

    let failed = austin.arrive_a(t1(), None, None).unwrap();
    let delivered = oak_park.arrive_a(t1(), None, None).unwrap();

    assert!(!austin.close().is_complete());
    assert!(oak_park.close().is_complete());
    assert!(failed.wait().is_err());
    assert!(delivered.wait().is_ok());
}

// ============================================================================
// Close & Display
// ============================================================================

struct RecordingTurnstile {
    closed: Arc<AtomicBool>,
}

impl Flush for RecordingTurnstile {
    fn close_and_flush(&mut self) -> FlushReport {
        self.closed.store(true, Ordering::SeqCst);
        FlushReport {
            delivered: 4,
            ..FlushReport::default()
        }
    }
}

#[test]
fn close_flushes_turnstile() {
    let fx = fixture();
    let closed = Arc::new(AtomicBool::new(false));
    let station = austin(&fx.ctx).with_turnstile(Box::new(RecordingTurnstile {
        closed: Arc::clone(&closed),
    }));

    let report = station.close();

    assert!(closed.load(Ordering::SeqCst));
    assert_eq!(report.turnstile.unwrap().delivered, 4);
    assert!(report.is_complete());
}

#[test]
fn display_row() {
    let fx = fixture();
    let mut station = austin(&fx.ctx);

    let empty = station.to_string();
    assert!(empty.starts_with("Station | 40380 | Austin "));
    assert!(empty.contains("Direction A: |  ---  | departing to Oak Park"));
    assert!(empty.contains("Direction B: |  ---  | departing to ---"));

    station.arrive_a(t1(), None, None).unwrap();
    assert!(station.to_string().contains("Direction A: |  T1   | departing to Oak Park"));
}
