//! Unit tests for transitlog-stream

use std::thread;
use std::time::Duration;

use bytes::Bytes;
use proptest::prelude::*;
use test_case::test_case;
use transitlog_log::{FileBroker, LogBroker, MemoryBroker, TopicSpec};
use transitlog_types::{
    DerivedStationRecord, Line, Offset, PartitionId, RawStationRecord, StationId, TopicName,
    time_millis,
};

use crate::{
    ChangelogTable, DEFAULT_CHANGELOG_TOPIC, DEFAULT_OFFSETS_TOPIC, OffsetReset, OffsetStore,
    StationTransformer, StopSignal, StreamConsumer, StreamError, TransformerConfig,
};

fn raw(station_id: i64, name: &str, order: i64, flags: (bool, bool, bool)) -> RawStationRecord {
    RawStationRecord {
        stop_id: 30000 + station_id % 1000,
        direction_id: "E".to_string(),
        stop_name: format!("{name} (Forest Park-bound)"),
        station_name: name.to_string(),
        station_descriptive_name: format!("{name} (Red Line)"),
        station_id: StationId::new(station_id),
        order,
        red: flags.0,
        blue: flags.1,
        green: flags.2,
    }
}

fn derived(station_id: i64, name: &str, order: i64, line: Line) -> DerivedStationRecord {
    DerivedStationRecord {
        station_id: StationId::new(station_id),
        station_name: name.to_string(),
        order,
        line,
    }
}

fn config() -> TransformerConfig {
    TransformerConfig {
        idle_backoff: Duration::ZERO,
        ..TransformerConfig::default()
    }
}

fn source_topic(broker: &impl LogBroker, partitions: u32) -> TopicName {
    let spec = TopicSpec::new(config().source, partitions, 1);
    broker.create_topic(&spec).unwrap();
    spec.name
}

fn produce_raw(broker: &impl LogBroker, topic: &TopicName, record: &RawStationRecord) {
    let key = Bytes::from(record.station_id.to_string());
    let value = Bytes::from(serde_json::to_vec(record).unwrap());
    broker.append(topic, None, Some(key), value, 0).unwrap();
}

fn changelog(broker: &impl LogBroker) -> TopicName {
    let spec = TopicSpec::new("stations.changelog", 1, 1);
    broker.create_topic(&spec).unwrap();
    spec.name
}

// ============================================================================
// Changelog Table
// ============================================================================

#[test]
fn upsert_is_idempotent() {
    let broker = MemoryBroker::new();
    let topic = changelog(&broker);
    let mut table = ChangelogTable::open(broker, topic).unwrap();
    let record = derived(40380, "Austin", 1, Line::Red);

    table.upsert(record.station_id, record.clone()).unwrap();
    let once = table.snapshot();
    table.upsert(record.station_id, record.clone()).unwrap();

    assert_eq!(table.snapshot(), once);
    assert_eq!(table.len(), 1);
    assert_eq!(table.get(&StationId::new(40380)), Some(&record));
}

#[test]
fn upsert_stamps_wall_clock_time() {
    let broker = MemoryBroker::new();
    let topic = changelog(&broker);
    let mut table = ChangelogTable::open(broker.clone(), topic.clone()).unwrap();

    let before = time_millis();
    table
        .upsert(StationId::new(40380), derived(40380, "Austin", 1, Line::Red))
        .unwrap();
    let after = time_millis();

    let records = broker.all_records(&topic).unwrap();
    assert_eq!(records.len(), 1);
    assert!((before..=after).contains(&records[0].timestamp_ms));
}

#[test]
fn last_write_wins() {
    let broker = MemoryBroker::new();
    let topic = changelog(&broker);
    let mut table = ChangelogTable::open(broker, topic).unwrap();

    let first = table
        .upsert(StationId::new(1), derived(1, "Old", 1, Line::Blue))
        .unwrap();
    let second = table
        .upsert(StationId::new(1), derived(1, "New", 2, Line::Blue))
        .unwrap();

    assert_eq!(first, Offset::ZERO);
    assert_eq!(second, Offset::new(1));
    assert_eq!(table.get(&StationId::new(1)).unwrap().station_name, "New");
}

#[test]
fn changelog_keys_are_decimal_station_ids() {
    let broker = MemoryBroker::new();
    let topic = changelog(&broker);
    let mut table = ChangelogTable::open(broker.clone(), topic.clone()).unwrap();

    table
        .upsert(StationId::new(40380), derived(40380, "Austin", 1, Line::Red))
        .unwrap();

    let records = broker.all_records(&topic).unwrap();
    assert_eq!(records[0].key.as_deref(), Some(&b"40380"[..]));
    let value: serde_json::Value = serde_json::from_slice(&records[0].value).unwrap();
    assert_eq!(value["line"], "red");
}

#[test]
fn failed_append_leaves_table_unchanged() {
    let broker = MemoryBroker::new();
    let topic = changelog(&broker);
    let mut table = ChangelogTable::open(broker.clone(), topic.clone()).unwrap();
    table
        .upsert(StationId::new(1), derived(1, "Kept", 1, Line::Green))
        .unwrap();

    broker.fail_appends_to(topic);
    let result = table.upsert(StationId::new(1), derived(1, "Lost", 1, Line::Green));

    assert!(matches!(result, Err(StreamError::Log(_))));
    assert_eq!(table.get(&StationId::new(1)).unwrap().station_name, "Kept");
}

#[test]
fn multi_partition_changelog_rejected() {
    let broker = MemoryBroker::new();
    let spec = TopicSpec::new("wide", 3, 1);
    broker.create_topic(&spec).unwrap();

    let result = ChangelogTable::<StationId, DerivedStationRecord, _>::open(broker, spec.name);
    assert!(matches!(
        result,
        Err(StreamError::InvalidChangelog { partitions: 3, .. })
    ));
}

#[test]
fn recover_rejects_keyless_records() {
    let broker = MemoryBroker::new();
    let topic = changelog(&broker);
    broker
        .append(&topic, None, None, Bytes::from_static(b"{}"), 0)
        .unwrap();

    let mut table =
        ChangelogTable::<StationId, DerivedStationRecord, _>::open(broker, topic).unwrap();
    assert!(matches!(
        table.recover(),
        Err(StreamError::MissingKey { .. })
    ));
}

#[test]
fn replay_survives_file_broker_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let live = {
        let broker = FileBroker::open_with_fsync(dir.path(), false).unwrap();
        let topic = changelog(&broker);
        let mut table = ChangelogTable::open(broker, topic).unwrap();
        for (id, name, line) in [
            (40380, "Austin", Line::Red),
            (40390, "Oak Park", Line::Green),
            (40380, "Austin", Line::Blue),
        ] {
            table
                .upsert(StationId::new(id), derived(id, name, 1, line))
                .unwrap();
        }
        table.snapshot()
    };

    let broker = FileBroker::open(dir.path()).unwrap();
    let mut replayed = ChangelogTable::open(broker, TopicName::new("stations.changelog")).unwrap();

    assert_eq!(replayed.recover().unwrap(), 3);
    assert_eq!(replayed.snapshot(), live);
    assert_eq!(
        replayed.get(&StationId::new(40380)).unwrap().line,
        Line::Blue
    );
}

proptest! {
    /// Rebuilding from the changelog equals the live table, and applying the
    /// same writes again changes nothing.
    #[test]
    fn replay_matches_live_table(
        writes in prop::collection::vec((0i64..8, 0i64..100, 0usize..4), 0..60)
    ) {
        let lines = [Line::Red, Line::Blue, Line::Green, Line::Unknown];
        let broker = MemoryBroker::new();
        let topic = changelog(&broker);
        let mut live = ChangelogTable::open(broker.clone(), topic.clone()).unwrap();

        for (id, order, line) in &writes {
            live.upsert(StationId::new(*id), derived(*id, "S", *order, lines[*line])).unwrap();
        }
        let expected = live.snapshot();

        let mut replayed = ChangelogTable::open(broker, topic).unwrap();
        prop_assert_eq!(replayed.recover().unwrap(), writes.len());
        prop_assert_eq!(replayed.snapshot(), expected.clone());

        for (id, order, line) in &writes {
            replayed.upsert(StationId::new(*id), derived(*id, "S", *order, lines[*line])).unwrap();
        }
        prop_assert_eq!(replayed.snapshot(), expected);
    }
}

// ============================================================================
// Consumer
// ============================================================================

#[test]
fn consumer_preserves_partition_order() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 2);
    for i in 0..10u32 {
        broker
            .append(
                &topic,
                Some(PartitionId::new(i % 2)),
                None,
                Bytes::from(i.to_string()),
                0,
            )
            .unwrap();
    }

    let mut consumer = StreamConsumer::subscribe(broker, topic, OffsetReset::Earliest).unwrap();
    let mut seen = Vec::new();
    loop {
        let batch = consumer.poll(3).unwrap();
        if batch.is_empty() {
            break;
        }
        assert!(batch.len() <= 3);
        seen.extend(batch);
    }

    assert_eq!(seen.len(), 10);
    for p in 0..2 {
        let offsets: Vec<u64> = seen
            .iter()
            .filter(|r| r.partition == PartitionId::new(p))
            .map(|r| r.offset.as_u64())
            .collect();
        assert_eq!(offsets, vec![0, 1, 2, 3, 4]);
    }
    assert_eq!(consumer.lag().unwrap(), 0);
}

#[test_case(OffsetReset::Earliest, 2; "earliest")]
#[test_case(OffsetReset::Latest, 1; "latest")]
fn offset_reset_sets_start(reset: OffsetReset, expected: usize) {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 1);
    broker
        .append(&topic, None, None, Bytes::from_static(b"before"), 0)
        .unwrap();

    let mut consumer = StreamConsumer::subscribe(broker.clone(), topic.clone(), reset).unwrap();
    broker
        .append(&topic, None, None, Bytes::from_static(b"after"), 0)
        .unwrap();

    assert_eq!(consumer.poll(10).unwrap().len(), expected);
}

#[test_case("earliest", OffsetReset::Earliest)]
#[test_case(" Latest ", OffsetReset::Latest)]
fn offset_reset_parses(input: &str, expected: OffsetReset) {
    assert_eq!(input.parse::<OffsetReset>().unwrap(), expected);
}

// ============================================================================
// Transformer
// ============================================================================

#[test_case((true, false, false), Line::Red; "red only")]
#[test_case((false, true, true), Line::Blue; "blue beats green")]
#[test_case((true, true, true), Line::Red; "red beats all")]
#[test_case((false, false, true), Line::Green; "green only")]
#[test_case((false, false, false), Line::Unknown; "no flags")]
fn derives_line_by_priority(flags: (bool, bool, bool), expected: Line) {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 1);
    produce_raw(&broker, &topic, &raw(40380, "Austin", 3, flags));

    let mut transformer = StationTransformer::open(broker, config()).unwrap();
    transformer.run_once().unwrap();

    let entry = transformer.table().get(&StationId::new(40380)).unwrap();
    assert_eq!(entry.line, expected);
    assert_eq!(
        transformer.stats().unknown_line,
        u64::from(expected == Line::Unknown)
    );
}

#[test]
fn malformed_rows_are_skipped() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 1);
    produce_raw(&broker, &topic, &raw(1, "First", 1, (true, false, false)));
    broker
        .append(&topic, None, None, Bytes::from_static(b"not json"), 0)
        .unwrap();
    produce_raw(&broker, &topic, &raw(2, "Second", 2, (false, true, false)));

    let mut transformer = StationTransformer::open(broker, config()).unwrap();
    assert_eq!(transformer.run_once().unwrap(), 3);

    assert_eq!(transformer.stats().processed, 2);
    assert_eq!(transformer.stats().skipped, 1);
    assert_eq!(transformer.table().len(), 2);
}

#[test]
fn changelog_failure_rewinds_batch() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 1);
    for id in 0..3 {
        produce_raw(&broker, &topic, &raw(id, "S", id, (true, false, false)));
    }
    let mut transformer = StationTransformer::open(broker.clone(), config()).unwrap();

    broker.fail_appends_to(DEFAULT_CHANGELOG_TOPIC);
    assert!(transformer.run_once().is_err());
    assert_eq!(
        transformer.consumer().position(PartitionId::new(0)),
        Some(Offset::ZERO)
    );

    broker.clear_faults();
    assert_eq!(transformer.run_once().unwrap(), 3);
    assert_eq!(transformer.table().len(), 3);
}

#[test]
fn restart_recovers_table_from_changelog() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 2);
    produce_raw(&broker, &topic, &raw(40380, "Austin", 1, (true, false, false)));
    produce_raw(&broker, &topic, &raw(40390, "Oak Park", 2, (false, false, true)));

    let live = {
        let mut transformer = StationTransformer::open(broker.clone(), config()).unwrap();
        transformer.run_once().unwrap();
        transformer.table().snapshot()
    };

    let mut restarted = StationTransformer::open(broker, config()).unwrap();

    assert_eq!(restarted.table().snapshot(), live);
    assert_eq!(live.len(), 2);
    assert_eq!(restarted.run_once().unwrap(), 0);
}

#[test]
fn repeated_restarts_do_not_reprocess_source() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 2);
    produce_raw(&broker, &topic, &raw(40380, "Austin", 1, (true, false, false)));
    produce_raw(&broker, &topic, &raw(40390, "Oak Park", 2, (false, false, true)));
    produce_raw(&broker, &topic, &raw(40890, "O'Hare", 3, (false, true, false)));

    let changelog = TopicName::new(DEFAULT_CHANGELOG_TOPIC);
    for _ in 0..3 {
        let mut transformer = StationTransformer::open(broker.clone(), config()).unwrap();
        while transformer.run_once().unwrap() > 0 {}
        assert_eq!(transformer.table().len(), 3);
        assert_eq!(
            broker.end_offset(&changelog, PartitionId::new(0)).unwrap(),
            Offset::new(3)
        );
    }
}

#[test]
fn latest_restart_keeps_rows_produced_while_down() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 1);
    produce_raw(&broker, &topic, &raw(40380, "Austin", 1, (true, false, false)));

    let latest = TransformerConfig {
        offset_reset: OffsetReset::Latest,
        ..config()
    };
    {
        let mut transformer = StationTransformer::open(broker.clone(), config()).unwrap();
        assert_eq!(transformer.run_once().unwrap(), 1);
    }

    produce_raw(&broker, &topic, &raw(49999, "Howard", 2, (true, false, false)));

    let mut restarted = StationTransformer::open(broker, latest).unwrap();
    assert_eq!(restarted.run_once().unwrap(), 1);
    assert_eq!(
        restarted.table().get(&StationId::new(49999)),
        Some(&derived(49999, "Howard", 2, Line::Red))
    );
    assert_eq!(restarted.table().len(), 2);
}

#[test]
fn failed_batch_is_not_committed() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 1);
    produce_raw(&broker, &topic, &raw(40380, "Austin", 1, (true, false, false)));

    {
        let mut transformer = StationTransformer::open(broker.clone(), config()).unwrap();
        broker.fail_appends_to(DEFAULT_CHANGELOG_TOPIC);
        assert!(transformer.run_once().is_err());
        assert_eq!(
            transformer
                .offsets()
                .committed(&topic, PartitionId::new(0)),
            None
        );
    }

    broker.clear_faults();
    let mut restarted = StationTransformer::open(broker, config()).unwrap();
    assert_eq!(restarted.run_once().unwrap(), 1);
    assert_eq!(restarted.table().len(), 1);
}

// ============================================================================
// Offset Store
// ============================================================================

#[test]
fn committed_offsets_survive_reopen() {
    let broker = MemoryBroker::new();
    let offsets_topic = TopicName::new(DEFAULT_OFFSETS_TOPIC);
    let source = TopicName::new("raw.stations");

    {
        let mut store = OffsetStore::open(broker.clone(), offsets_topic.clone()).unwrap();
        assert!(store.commit(&source, PartitionId::new(0), Offset::new(4)).unwrap());
        assert!(store.commit(&source, PartitionId::new(1), Offset::new(2)).unwrap());
        assert!(store.commit(&source, PartitionId::new(0), Offset::new(7)).unwrap());
    }

    let store = OffsetStore::open(broker, offsets_topic).unwrap();
    assert_eq!(store.committed(&source, PartitionId::new(0)), Some(Offset::new(7)));
    assert_eq!(store.committed(&source, PartitionId::new(1)), Some(Offset::new(2)));
    assert_eq!(store.committed(&source, PartitionId::new(2)), None);
    assert_eq!(
        store.committed(&TopicName::new("other"), PartitionId::new(0)),
        None
    );
}

#[test]
fn unchanged_commit_writes_nothing() {
    let broker = MemoryBroker::new();
    let offsets_topic = TopicName::new(DEFAULT_OFFSETS_TOPIC);
    let source = TopicName::new("raw.stations");

    let mut store = OffsetStore::open(broker.clone(), offsets_topic.clone()).unwrap();
    assert!(store.commit(&source, PartitionId::new(0), Offset::new(3)).unwrap());
    assert!(!store.commit(&source, PartitionId::new(0), Offset::new(3)).unwrap());

    assert_eq!(
        broker.end_offset(&offsets_topic, PartitionId::new(0)).unwrap(),
        Offset::new(1)
    );
}

#[test]
fn run_returns_after_stop() {
    let broker = MemoryBroker::new();
    let topic = source_topic(&broker, 1);
    produce_raw(&broker, &topic, &raw(40380, "Austin", 1, (true, false, false)));

    let stop = StopSignal::new();
    let handle = {
        let stop = stop.clone();
        let broker = broker.clone();
        thread::spawn(move || {
            let mut transformer = StationTransformer::open(broker, config()).unwrap();
            transformer.run(&stop).unwrap()
        })
    };

    // The row is in the changelog once it has been processed.
    let changelog = TopicName::new(DEFAULT_CHANGELOG_TOPIC);
    while !broker.topic_exists(&changelog).unwrap()
        || broker.end_offset(&changelog, PartitionId::new(0)).unwrap() == Offset::ZERO
    {
        thread::sleep(Duration::from_millis(1));
    }
    stop.stop();

    let stats = handle.join().unwrap();
    assert_eq!(stats.processed, 1);
}

#[test]
fn stopped_signal_skips_loop() {
    let broker = MemoryBroker::new();
    source_topic(&broker, 1);
    let stop = StopSignal::new();
    stop.stop();

    let mut transformer = StationTransformer::open(broker, config()).unwrap();
    assert_eq!(transformer.run(&stop).unwrap().processed, 0);
    assert!(stop.flag().load(std::sync::atomic::Ordering::SeqCst));
}
