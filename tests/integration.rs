//! Integration tests for the tracker.

use loomtrack::{
    DateRange, DeliveryDraft, ProductionEntry, Settings, TakaRange, Tracker, TrackerConfig,
    TrackerError,
};
use chrono::NaiveDate;
use std::collections::HashSet;
use tempfile::TempDir;

fn open(path: std::path::PathBuf) -> Tracker {
    Tracker::open_or_create(TrackerConfig {
        path,
        create_if_missing: true,
    })
    .unwrap()
}

fn production(taka: &str, machine: &str, meter: &str, date: &str) -> ProductionEntry {
    ProductionEntry::new(taka, machine, meter, date).unwrap()
}

fn draft(taka: &str, meter: &str) -> DeliveryDraft {
    DeliveryDraft {
        party_name: "Patel & Sons".into(),
        lot_number: "L-3".into(),
        taka_number: taka.into(),
        meter: meter.into(),
        machine_number: None,
    }
}

// --- Realistic Workflow Tests ---

#[test]
fn test_production_to_delivery_workflow() {
    let dir = TempDir::new().unwrap();
    let tracker = open(dir.path().join("data"));

    // A day's production comes in.
    let added = tracker.add_production_entries(vec![
        production("2417", "10", "120", "15/8/25"),
        production("2418", "11", "95.50", "15/8/25"),
        production("2419", "10", "104.50", "16/8/25"),
    ]);
    assert_eq!(added, 3);

    // One taka ships.
    let entry = tracker.submit_delivery(draft("2418", "95.50"), None).unwrap();
    assert_eq!(entry.machine_number, "11");
    assert_eq!(entry.tp_number, None);

    // Stock reflects the shipment.
    let stock: HashSet<String> = tracker
        .stock()
        .into_iter()
        .map(|e| e.taka_number)
        .collect();
    assert_eq!(stock, HashSet::from(["2417".to_string(), "2419".to_string()]));

    // Deleting a production entry cascades to its delivery.
    tracker.delete_production_entry("2418").unwrap();
    assert!(tracker.state().delivery_entries.is_empty());
    assert!(tracker.taka_detail("2418").is_none());
}

#[test]
fn test_state_survives_reopen_with_set_equality() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data");

    let before: (HashSet<String>, HashSet<String>);
    {
        let tracker = open(path.clone());
        tracker.add_production_entries(vec![
            production("100", "1", "80", "1/8/25"),
            production("200", "2", "90", "2/8/25"),
            production("300", "3", "70", "3/8/25"),
        ]);
        tracker.submit_delivery(draft("200", "90"), None).unwrap();

        let mut settings = tracker.settings();
        settings.production_tables = 2;
        settings.remote_key = "transient-secret".into();
        tracker.update_settings(settings);

        let state = tracker.state();
        before = (
            state
                .production_entries
                .iter()
                .map(|e| e.taka_number.clone())
                .collect(),
            state.delivery_entries.iter().map(|e| e.id.clone()).collect(),
        );
    }

    let tracker = open(path);
    let state = tracker.state();

    let production_after: HashSet<String> = state
        .production_entries
        .iter()
        .map(|e| e.taka_number.clone())
        .collect();
    let delivery_after: HashSet<String> =
        state.delivery_entries.iter().map(|e| e.id.clone()).collect();

    assert_eq!(production_after, before.0);
    assert_eq!(delivery_after, before.1);
    assert_eq!(state.settings.production_tables, 2);
    // Credentials never round-trip through the snapshot.
    assert_eq!(state.settings.remote_key, "");
}

#[test]
fn test_second_instance_is_locked_out() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("data");
    let _first = open(path.clone());

    let second = Tracker::open_or_create(TrackerConfig {
        path,
        create_if_missing: true,
    });
    assert!(matches!(second, Err(TrackerError::Locked)));
}

// --- List Partitioning ---

#[test]
fn test_production_lists_partition_by_taka_range() {
    let dir = TempDir::new().unwrap();
    let tracker = open(dir.path().join("data"));

    let mut settings = Settings::default();
    settings.production_tables = 2;
    settings.list_taka_ranges.list1 = TakaRange {
        start: "1".into(),
        end: "1999".into(),
    };
    settings.list_taka_ranges.list2 = TakaRange {
        start: "2000".into(),
        end: "2999".into(),
    };
    tracker.update_settings(settings);

    tracker.add_production_entries(vec![
        production("1500", "1", "80", "1/8/25"),
        production("2417", "2", "90", "1/8/25"),
        production("2999", "3", "70", "1/8/25"),
    ]);

    assert_eq!(tracker.list_entries(1).len(), 1);
    assert_eq!(tracker.list_entries(2).len(), 2);

    // Validation against the active list only sees that list's entries.
    let err = tracker.submit_delivery(draft("1500", "80"), Some(2)).unwrap_err();
    assert!(matches!(err, TrackerError::Validation(_)));
    assert!(tracker.submit_delivery(draft("1500", "80"), Some(1)).is_ok());
}

// --- Reports ---

#[test]
fn test_date_range_reports() {
    let dir = TempDir::new().unwrap();
    let tracker = open(dir.path().join("data"));

    tracker.add_production_entries(vec![
        production("1", "1", "80", "15/8/25"),
        production("2", "2", "90", "20/8/25"),
        production("3", "3", "70", "5/9/25"),
    ]);

    let range = DateRange::new(
        NaiveDate::from_ymd_opt(2025, 8, 1).unwrap(),
        NaiveDate::from_ymd_opt(2025, 8, 31).unwrap(),
    );
    let august: Vec<String> = tracker
        .production_report(Some(range))
        .into_iter()
        .map(|e| e.taka_number)
        .collect();
    assert_eq!(august, vec!["1", "2"]);

    // Deliveries are stamped with today's date, so an all-time report
    // sees them and a range far in the past does not.
    tracker.submit_delivery(draft("1", "80"), None).unwrap();
    assert_eq!(tracker.delivery_report(None).len(), 1);

    let past = DateRange::new(
        NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(),
        NaiveDate::from_ymd_opt(2000, 12, 31).unwrap(),
    );
    assert!(tracker.delivery_report(Some(past)).is_empty());
}
