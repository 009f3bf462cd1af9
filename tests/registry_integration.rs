//! Registry integration tests.
//!
//! Exercises the public API against a file-backed `SQLite` store:
//! - Record creation with background match search
//! - Email notification through a stub transport
//! - Persistence across reopen
//! - Listing with textual filter groups

// Integration tests use expect/unwrap for simplicity - panics are acceptable in tests
#![allow(clippy::expect_used, clippy::unwrap_used)]

use chrono::{TimeZone, Utc};
use lettre::transport::stub::StubTransport;
use lostpets::query::parse_filter_group;
use lostpets::services::{MatchQueue, MatchSearchEngine, RegistryService};
use lostpets::storage::{RegistryStore, SqliteBackend};
use lostpets::{Pet, Posting, Report, Sighting, SmtpNotifier};
use std::sync::Arc;
use tempfile::TempDir;

// ============================================================================
// Test Helpers
// ============================================================================

fn report(location: &str, type_name: &str, color: &str, email: &str) -> Report {
    let mut report = Report::new(Utc.with_ymd_and_hms(2019, 3, 2, 15, 0, 0).unwrap());
    report.location = location.to_string();
    report.email = email.to_string();
    report.name = "Jordan".to_string();
    report.pet = Pet {
        name: format!("{color} {type_name}"),
        color: color.to_string(),
        marks: format!("{location} marks"),
        type_name: type_name.to_string(),
        breeds: vec!["Mixed".to_string()],
        ..Pet::default()
    };
    report
}

fn open(dir: &TempDir) -> Arc<SqliteBackend> {
    Arc::new(SqliteBackend::new(dir.path().join("registry.db")).expect("open store"))
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_new_sighting_notifies_submitter_once() {
    let dir = TempDir::new().unwrap();
    let store = open(&dir);
    let notifier = Arc::new(SmtpNotifier::with_transport(
        StubTransport::new_ok(),
        "Lost Pets <registry@example.com>".parse().unwrap(),
        "https://lostpets.example/sightings/",
    ));
    let store_dyn: Arc<dyn RegistryStore> = store.clone();
    let engine = MatchSearchEngine::new(Arc::clone(&store_dyn), notifier.clone());
    let service =
        RegistryService::new(store_dyn).with_match_queue(MatchQueue::start(Arc::new(engine), 1, 8));

    // Two lost dogs share the color; one lost cat shares nothing.
    let brown_a = RegistryService::new(store.clone())
        .add_posting(&Posting::new(report("North", "Dog", "Brown", "a@example.com")))
        .unwrap();
    let brown_b = RegistryService::new(store.clone())
        .add_posting(&Posting::new(report("East", "Dog", "brown", "b@example.com")))
        .unwrap();
    RegistryService::new(store.clone())
        .add_posting(&Posting::new(report("West", "Cat", "Grey", "c@example.com")))
        .unwrap();

    let sighting = service
        .add_sighting(&Sighting::new(
            report("South", "Other", "BROWN", "finder@example.com"),
            true,
        ))
        .unwrap();
    service.shutdown().await;

    let service = RegistryService::new(store);
    let mut matched: Vec<i64> = service
        .matching_postings(&sighting.report.guid)
        .unwrap()
        .into_iter()
        .map(|p| p.report.id)
        .collect();
    matched.sort_unstable();
    assert_eq!(matched, vec![brown_a.report.id, brown_b.report.id]);

    let messages = notifier.transport().messages();
    assert_eq!(messages.len(), 1);
    let (envelope, raw) = &messages[0];
    assert_eq!(envelope.to()[0].to_string(), "finder@example.com");
    assert!(raw.contains(&format!(
        "https://lostpets.example/sightings/{}",
        sighting.report.guid
    )));
}

#[test]
fn test_records_survive_reopen() {
    let dir = TempDir::new().unwrap();
    let posting = {
        let service = RegistryService::new(open(&dir));
        service
            .add_posting(&Posting::new(report("North", "Dog", "Brown", "a@example.com")))
            .unwrap()
    };

    let service = RegistryService::new(open(&dir));
    let found = service.posting_by_guid(&posting.report.guid).unwrap().unwrap();
    assert_eq!(found, posting);
    assert_eq!(service.pet_types().unwrap().len(), 3);
}

#[test]
fn test_textual_filters() {
    let dir = TempDir::new().unwrap();
    let service = RegistryService::new(open(&dir));
    for (location, type_name, color) in [
        ("North", "Dog", "Brown"),
        ("East", "Cat", "Black"),
        ("West", "Dog", "White"),
    ] {
        service
            .add_sighting(&Sighting::new(
                report(location, type_name, color, "f@example.com"),
                false,
            ))
            .unwrap();
    }

    let groups = [
        parse_filter_group("pettype=dog; petcolor in white,grey").unwrap(),
        parse_filter_group("location='east'").unwrap(),
    ];
    let locations: Vec<String> = service
        .list_sightings(&groups)
        .unwrap()
        .into_iter()
        .map(|s| s.report.location)
        .collect();
    assert_eq!(locations, vec!["East", "West"]);

    let dated = [parse_filter_group("date>=2019-03-02; date<2019-03-03").unwrap()];
    assert_eq!(service.list_sightings(&dated).unwrap().len(), 3);
    let before = [parse_filter_group("date<2019-03-01").unwrap()];
    assert!(service.list_sightings(&before).unwrap().is_empty());
}
