//! Unit tests for transitlog-types

use proptest::prelude::*;
use test_case::test_case;

use crate::{
    ArrivalValue, DerivedStationRecord, Direction, Line, Offset, RawStationRecord, StationId,
    TrainStatus, time_millis,
};

fn raw(red: bool, blue: bool, green: bool) -> RawStationRecord {
    RawStationRecord {
        stop_id: 30_001,
        direction_id: "E".to_string(),
        stop_name: "Austin (O'Hare-bound)".to_string(),
        station_name: "Austin".to_string(),
        station_descriptive_name: "Austin (Blue Line)".to_string(),
        station_id: StationId::new(40_010),
        order: 29,
        red,
        blue,
        green,
    }
}

// ============================================================================
// Line Derivation
// ============================================================================

#[test_case(true, false, false => Line::Red; "red only")]
#[test_case(false, true, false => Line::Blue; "blue only")]
#[test_case(false, false, true => Line::Green; "green only")]
#[test_case(true, true, false => Line::Red; "red beats blue")]
#[test_case(true, false, true => Line::Red; "red beats green")]
#[test_case(false, true, true => Line::Blue; "blue beats green")]
#[test_case(true, true, true => Line::Red; "all set")]
#[test_case(false, false, false => Line::Unknown; "none set")]
fn line_from_flags(red: bool, blue: bool, green: bool) -> Line {
    Line::from_flags(red, blue, green)
}

proptest! {
    #[test]
    fn derivation_is_total_and_follows_priority(red: bool, blue: bool, green: bool) {
        let line = Line::from_flags(red, blue, green);
        match line {
            Line::Red => prop_assert!(red),
            Line::Blue => prop_assert!(!red && blue),
            Line::Green => prop_assert!(!red && !blue && green),
            Line::Unknown => prop_assert!(!red && !blue && !green),
        }
    }
}

#[test]
fn derived_record_copies_fields_and_derives_line() {
    let derived = DerivedStationRecord::from_raw(&raw(false, true, false));

    assert_eq!(derived.station_id, StationId::new(40_010));
    assert_eq!(derived.station_name, "Austin");
    assert_eq!(derived.order, 29);
    assert_eq!(derived.line, Line::Blue);
}

#[test]
fn flag_count_counts_set_flags() {
    assert_eq!(raw(false, false, false).flag_count(), 0);
    assert_eq!(raw(true, false, false).flag_count(), 1);
    assert_eq!(raw(true, true, true).flag_count(), 3);
}

// ============================================================================
// Parsing & Serialization
// ============================================================================

#[test_case("red" => Ok(Line::Red))]
#[test_case("Blue" => Ok(Line::Blue))]
#[test_case(" green " => Ok(Line::Green))]
#[test_case("purple" => Err(()))]
fn line_from_str(input: &str) -> Result<Line, ()> {
    input.parse::<Line>().map_err(|_| ())
}

#[test]
fn direction_parses_both_cases() {
    assert_eq!("a".parse::<Direction>().unwrap(), Direction::A);
    assert_eq!("B".parse::<Direction>().unwrap(), Direction::B);
    assert!("c".parse::<Direction>().is_err());
}

#[test]
fn derived_record_serializes_line_lowercase() {
    let derived = DerivedStationRecord::from_raw(&raw(false, false, false));
    let json = serde_json::to_value(&derived).unwrap();

    assert_eq!(json["line"], "unknown");
    assert_eq!(json["station_id"], 40_010);
}

#[test]
fn raw_record_deserializes_from_connector_json() {
    let json = r#"{
        "stop_id": 30001,
        "direction_id": "E",
        "stop_name": "Austin (O'Hare-bound)",
        "station_name": "Austin",
        "station_descriptive_name": "Austin (Blue Line)",
        "station_id": 40010,
        "order": 29,
        "red": false,
        "blue": true,
        "green": false
    }"#;

    let record: RawStationRecord = serde_json::from_str(json).unwrap();
    assert_eq!(record, raw(false, true, false));
}

#[test]
fn arrival_value_wire_shape() {
    let value = ArrivalValue {
        station_id: StationId::new(40_380),
        train_id: "T1".to_string(),
        direction: Direction::A,
        line: Line::Red,
        train_status: TrainStatus::InService,
        prev_station_id: Some(StationId::new(40_390)),
        prev_direction: Some(Direction::B),
    };
    let json = serde_json::to_value(&value).unwrap();

    assert_eq!(
        json,
        serde_json::json!({
            "station_id": 40380,
            "train_id": "T1",
            "direction": "a",
            "line": "red",
            "train_status": "in_service",
            "prev_station_id": 40390,
            "prev_direction": "b",
        })
    );
}

#[test]
fn offset_next_advances_by_one() {
    assert_eq!(Offset::ZERO.next(), Offset::new(1));
    assert_eq!(Offset::new(41).next().as_u64(), 42);
}

#[test]
fn time_millis_is_current_and_monotone_enough() {
    let first = time_millis();
    let second = time_millis();

    // 2020-01-01T00:00:00Z
    assert!(first > 1_577_836_800_000);
    assert!(second >= first);
}
