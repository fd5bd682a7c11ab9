//! End-to-end write/query behavior of the persistence adapter.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, TimeZone, Utc};
use chronicle::{
    AdapterConfig, CompareOp, DuckConnector, FilterPredicate, MemoryConnector, NativeScalar,
    PersistenceAdapter, Record, SemanticValue, SortOrder, SourceState, StoredRecord, ValueKind,
    Connect, DocumentStore, QueryError,
};
use uuid::Uuid;

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
}

fn shared_adapter(
    connector: &MemoryConnector,
    kinds: &[(&str, ValueKind)],
) -> PersistenceAdapter<MemoryConnector> {
    let config = AdapterConfig {
        endpoint: "mem://local".to_string(),
        database: "telemetry".to_string(),
        collection: Some("readings".to_string()),
    };
    let catalog: HashMap<String, ValueKind> = kinds
        .iter()
        .map(|(name, kind)| (name.to_string(), *kind))
        .collect();
    PersistenceAdapter::new(config.validate().unwrap(), connector.clone(), Arc::new(catalog))
}

fn collect(adapter: &PersistenceAdapter<MemoryConnector>, predicate: &FilterPredicate) -> Vec<Record> {
    adapter
        .query(predicate)
        .unwrap()
        .collect::<Result<Vec<_>, _>>()
        .unwrap()
}

#[test]
fn write_then_query_returns_the_written_record() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("temp_sensor_1", ValueKind::Decimal)]);
    let t0 = base_time();

    adapter
        .write(
            "temp_sensor_1",
            None,
            SourceState::Known(SemanticValue::Decimal(21.5)),
            Some(t0),
        )
        .unwrap();

    let records = collect(&adapter, &FilterPredicate::for_source("temp_sensor_1"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, SemanticValue::Decimal(21.5));
    assert_eq!(records[0].timestamp, t0);
    assert_eq!(records[0].source_name, "temp_sensor_1");
    assert_eq!(records[0].display_name, "temp_sensor_1");
    assert_ne!(records[0].id, Uuid::nil());
}

#[test]
fn display_alias_is_stored_alongside_the_source_name() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("door_contact", ValueKind::Boolean)]);

    adapter
        .write(
            "door_contact",
            Some("Front Door"),
            SourceState::Known(SemanticValue::Boolean(true)),
            Some(base_time()),
        )
        .unwrap();

    let records = collect(&adapter, &FilterPredicate::for_source("door_contact"));
    assert_eq!(records[0].display_name, "Front Door");
    assert_eq!(records[0].value, SemanticValue::Boolean(true));
}

#[test]
fn results_are_ordered_by_timestamp_for_unsorted_inserts() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("s", ValueKind::Decimal)]);

    // Deliberately unsorted insertion order.
    for offset in [7i64, 1, 9, 3, 5] {
        adapter
            .write(
                "s",
                None,
                SourceState::Known(SemanticValue::Decimal(offset as f64)),
                Some(base_time() + Duration::minutes(offset)),
            )
            .unwrap();
    }

    let ascending = collect(
        &adapter,
        &FilterPredicate {
            ordering: SortOrder::Ascending,
            ..FilterPredicate::for_source("s")
        },
    );
    assert!(ascending
        .windows(2)
        .all(|pair| pair[0].timestamp < pair[1].timestamp));

    let descending = collect(
        &adapter,
        &FilterPredicate {
            ordering: SortOrder::Descending,
            ..FilterPredicate::for_source("s")
        },
    );
    assert!(descending
        .windows(2)
        .all(|pair| pair[0].timestamp > pair[1].timestamp));
}

#[test]
fn pagination_partitions_the_result_set() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("s", ValueKind::Decimal)]);

    for i in 0..10i64 {
        adapter
            .write(
                "s",
                None,
                SourceState::Known(SemanticValue::Decimal(i as f64)),
                Some(base_time() + Duration::minutes(i)),
            )
            .unwrap();
    }

    let unpaginated = collect(
        &adapter,
        &FilterPredicate {
            ordering: SortOrder::Ascending,
            page_size: 1000,
            ..FilterPredicate::for_source("s")
        },
    );
    assert_eq!(unpaginated.len(), 10);

    let mut paged = Vec::new();
    for offset in 0.. {
        let chunk = collect(
            &adapter,
            &FilterPredicate {
                ordering: SortOrder::Ascending,
                page_offset: offset,
                page_size: 3,
                ..FilterPredicate::for_source("s")
            },
        );
        if chunk.is_empty() {
            break;
        }
        assert!(chunk.len() <= 3);
        paged.extend(chunk);
    }
    assert_eq!(paged, unpaginated);
}

#[test]
fn time_range_bounds_are_inclusive() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("s", ValueKind::Decimal)]);

    for i in 0..5i64 {
        adapter
            .write(
                "s",
                None,
                SourceState::Known(SemanticValue::Decimal(i as f64)),
                Some(base_time() + Duration::minutes(i)),
            )
            .unwrap();
    }

    let records = collect(
        &adapter,
        &FilterPredicate {
            begin_time: Some(base_time() + Duration::minutes(1)),
            end_time: Some(base_time() + Duration::minutes(3)),
            ordering: SortOrder::Ascending,
            ..FilterPredicate::for_source("s")
        },
    );
    assert_eq!(records.len(), 3);
    assert_eq!(records[0].value, SemanticValue::Decimal(1.0));
    assert_eq!(records[2].value, SemanticValue::Decimal(3.0));
}

#[test]
fn value_comparison_filters_records() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("s", ValueKind::Decimal)]);

    for (i, v) in [10.0, 20.0, 30.0, 40.0].iter().enumerate() {
        adapter
            .write(
                "s",
                None,
                SourceState::Known(SemanticValue::Decimal(*v)),
                Some(base_time() + Duration::minutes(i as i64)),
            )
            .unwrap();
    }

    let records = collect(
        &adapter,
        &FilterPredicate {
            value_comparison: Some((CompareOp::Gt, SemanticValue::Decimal(20.0))),
            ordering: SortOrder::Ascending,
            ..FilterPredicate::for_source("s")
        },
    );
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].value, SemanticValue::Decimal(30.0));

    let records = collect(
        &adapter,
        &FilterPredicate {
            value_comparison: Some((CompareOp::Eq, SemanticValue::Decimal(20.0))),
            ..FilterPredicate::for_source("s")
        },
    );
    assert_eq!(records.len(), 1);
}

#[test]
fn undefined_readings_never_create_records() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("s", ValueKind::Decimal)]);

    adapter
        .write(
            "s",
            None,
            SourceState::Known(SemanticValue::Decimal(1.0)),
            Some(base_time()),
        )
        .unwrap();
    assert_eq!(connector.record_count(), 1);

    adapter
        .write("s", None, SourceState::Undefined, Some(base_time()))
        .unwrap();
    assert_eq!(connector.record_count(), 1);
}

#[test]
fn reconnect_after_disconnect_behaves_like_a_fresh_connect() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("s", ValueKind::Decimal)]);

    adapter
        .write(
            "s",
            None,
            SourceState::Known(SemanticValue::Decimal(1.0)),
            Some(base_time()),
        )
        .unwrap();
    assert!(adapter.is_connected());

    adapter.disconnect();
    assert!(!adapter.is_connected());

    adapter
        .write(
            "s",
            None,
            SourceState::Known(SemanticValue::Decimal(2.0)),
            Some(base_time() + Duration::minutes(1)),
        )
        .unwrap();
    assert!(adapter.is_connected());

    let records = collect(
        &adapter,
        &FilterPredicate {
            ordering: SortOrder::Ascending,
            ..FilterPredicate::for_source("s")
        },
    );
    assert_eq!(records.len(), 2);
}

#[test]
fn per_source_layout_partitions_by_source() {
    let connector = MemoryConnector::new();
    let config = AdapterConfig {
        endpoint: "mem://local".to_string(),
        database: "telemetry".to_string(),
        collection: None,
    };
    let mut kinds = HashMap::new();
    kinds.insert("temp_sensor_1".to_string(), ValueKind::Decimal);
    kinds.insert("door_contact".to_string(), ValueKind::Boolean);
    let adapter = PersistenceAdapter::new(
        config.validate().unwrap(),
        connector.clone(),
        Arc::new(kinds),
    );

    adapter
        .write(
            "temp_sensor_1",
            None,
            SourceState::Known(SemanticValue::Decimal(21.5)),
            Some(base_time()),
        )
        .unwrap();
    adapter
        .write(
            "door_contact",
            None,
            SourceState::Known(SemanticValue::Boolean(false)),
            Some(base_time()),
        )
        .unwrap();

    assert_eq!(
        connector.collection_names(),
        vec!["door_contact".to_string(), "temp_sensor_1".to_string()]
    );

    let records = collect(&adapter, &FilterPredicate::for_source("temp_sensor_1"));
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, SemanticValue::Decimal(21.5));
}

#[test]
fn all_value_kinds_survive_a_store_round_trip() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(
        &connector,
        &[
            ("switch", ValueKind::Boolean),
            ("dimmer", ValueKind::Percentage),
            ("temp", ValueKind::Decimal),
            ("note", ValueKind::Text),
            ("updated", ValueKind::Instant),
        ],
    );
    let t0 = base_time();
    let written = [
        ("switch", SemanticValue::Boolean(true)),
        ("dimmer", SemanticValue::Percentage(75.0)),
        ("temp", SemanticValue::Decimal(21.5)),
        ("note", SemanticValue::Text("vacation mode".to_string())),
        (
            "updated",
            SemanticValue::Instant(Utc.with_ymd_and_hms(2024, 4, 30, 8, 0, 0).unwrap()),
        ),
    ];

    for (source, value) in &written {
        adapter
            .write(source, None, SourceState::Known(value.clone()), Some(t0))
            .unwrap();
    }

    for (source, value) in &written {
        let records = collect(&adapter, &FilterPredicate::for_source(*source));
        assert_eq!(records.len(), 1, "one record for {source}");
        assert_eq!(&records[0].value, value);
    }
}

#[test]
fn unrecognized_stored_label_surfaces_as_an_error() {
    let connector = MemoryConnector::new();
    let adapter = shared_adapter(&connector, &[("door_contact", ValueKind::Boolean)]);

    // A record written by some other client with a label outside the set.
    let store = connector.connect("mem://local", "telemetry").unwrap();
    store.ensure_collection("readings").unwrap();
    store
        .insert(
            "readings",
            &StoredRecord {
                id: Uuid::new_v4(),
                source: "door_contact".to_string(),
                display: "door_contact".to_string(),
                ts: base_time(),
                value: NativeScalar::Text("AJAR".to_string()),
            },
        )
        .unwrap();

    let mut cursor = adapter
        .query(&FilterPredicate::for_source("door_contact"))
        .unwrap();
    let err = cursor.next().unwrap().unwrap_err();
    assert!(matches!(err, QueryError::Coercion(_)));
}

#[test]
fn duckdb_backend_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let config = AdapterConfig {
        endpoint: dir.path().to_str().unwrap().to_string(),
        database: "history".to_string(),
        collection: Some("readings".to_string()),
    };
    let mut kinds = HashMap::new();
    kinds.insert("temp_sensor_1".to_string(), ValueKind::Decimal);
    let adapter = PersistenceAdapter::new(
        config.validate().unwrap(),
        DuckConnector,
        Arc::new(kinds),
    );
    let t0 = base_time();

    adapter
        .write(
            "temp_sensor_1",
            None,
            SourceState::Known(SemanticValue::Decimal(21.5)),
            Some(t0),
        )
        .unwrap();

    let records: Vec<Record> = adapter
        .query(&FilterPredicate::for_source("temp_sensor_1"))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].value, SemanticValue::Decimal(21.5));
    assert_eq!(records[0].timestamp, t0);
}
