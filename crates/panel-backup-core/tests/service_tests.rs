mod common;

use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

use common::{creds_fleet, service_with, test_config, FakePanel};
use panel_backup_core::error::Error;
use panel_backup_core::runs::RunKey;
use panel_backup_core::{ScanStore, SilentReporter};

#[test]
fn test_scan_finds_root_and_subdirectory_matches() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(test_config(dir.path()), Arc::new(creds_fleet()));

    let record = service.start_scan(false, &SilentReporter).unwrap();

    assert_eq!(record.instance_count, 1);
    assert_eq!(record.matches.len(), 2);
    assert_eq!(record.matches[0].directory, "/");
    assert_eq!(record.matches[0].file_path, "creds.json");
    assert_eq!(record.matches[0].size, 120);
    assert_eq!(record.matches[1].directory, "/data");
    assert_eq!(record.matches[1].file_path, "data/creds.json");
    assert_eq!(record.matches[1].size, 80);
    assert_eq!(service.scan(&record.scan_id), Some(record));
}

#[test]
fn test_rescan_yields_same_matches_under_new_id() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(test_config(dir.path()), Arc::new(creds_fleet()));

    let first = service.start_scan(false, &SilentReporter).unwrap();
    let second = service.start_scan(true, &SilentReporter).unwrap();

    assert_ne!(first.scan_id, second.scan_id);
    assert_eq!(first.matches, second.matches);
    assert!(second.quick_mode);
    assert_eq!(service.cached_scan_count(), 2);
    assert_eq!(service.latest_scan_id(), Some(second.scan_id));
    assert_eq!(service.statistics().total_scans, 2);
}

#[test]
fn test_unreadable_instance_is_skipped() {
    let dir = tempdir().unwrap();
    let panel = creds_fleet()
        .instance("e5f6a7b8", "srv2")
        .file("e5f6a7b8", "/", "creds.json", b"{}")
        .unreachable_instance("00000000", "srv3");
    let (service, _) = service_with(test_config(dir.path()), Arc::new(panel));

    let record = service.start_scan(false, &SilentReporter).unwrap();

    assert_eq!(record.instance_count, 3);
    let names: Vec<_> = record.matches.iter().map(|m| m.instance_name.as_str()).collect();
    assert_eq!(names, vec!["srv1", "srv1", "srv2"]);
}

#[test]
fn test_empty_fleet_counts_attempt_but_stores_nothing() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(test_config(dir.path()), Arc::new(FakePanel::new()));

    let err = service.start_scan(false, &SilentReporter).unwrap_err();

    assert!(matches!(err, Error::NoInstances));
    assert_eq!(service.statistics().total_scans, 1);
    assert!(service.statistics().last_scan_at.is_some());
    assert_eq!(service.cached_scan_count(), 0);
}

#[test]
fn test_backup_requires_sink_and_known_scan() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(test_config(dir.path()), Arc::new(creds_fleet()));
    let record = service.start_scan(false, &SilentReporter).unwrap();

    let err = service
        .start_backup(&record.scan_id, &SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::SinkNotConfigured));

    service.set_sink("ops").unwrap();
    let err = service
        .start_backup("19700101_000000", &SilentReporter)
        .unwrap_err();
    assert!(matches!(err, Error::ScanNotFound(id) if id == "19700101_000000"));
}

#[test]
fn test_state_survives_restart() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let scan_id = {
        let (service, _) = service_with(config.clone(), Arc::new(creds_fleet()));
        service.set_sink("ops").unwrap();
        let record = service.start_scan(false, &SilentReporter).unwrap();
        service.start_backup(&record.scan_id, &SilentReporter).unwrap();
        record.scan_id
    };

    let store = ScanStore::open(&config.state_path).unwrap();
    let stats = store.statistics();
    assert_eq!(stats.total_scans, 1);
    assert_eq!(stats.total_backups, 2);
    assert_eq!(stats.total_deletions, 1);
    assert!(stats.last_backup_at.is_some());
    assert_eq!(store.sink_id().as_deref(), Some("ops"));
    assert!(store.scan(&scan_id).is_some());

    let (service, _) = service_with(config, Arc::new(creds_fleet()));
    assert!(service.is_sink_configured());
}

#[test]
fn test_clear_cache_keeps_statistics() {
    let dir = tempdir().unwrap();
    let (service, _) = service_with(test_config(dir.path()), Arc::new(creds_fleet()));
    service.start_scan(false, &SilentReporter).unwrap();
    service.start_scan(false, &SilentReporter).unwrap();

    assert_eq!(service.clear_cache().unwrap(), 2);
    assert_eq!(service.cached_scan_count(), 0);
    assert_eq!(service.statistics().total_scans, 2);
    assert_eq!(service.clear_cache().unwrap(), 0);
}

#[test]
fn test_concurrent_backup_of_same_scan_is_rejected() {
    let dir = tempdir().unwrap();
    let panel = Arc::new(
        FakePanel::new()
            .instance("a1b2c3d4", "srv1")
            .dir("a1b2c3d4", "/", "data")
            .file("a1b2c3d4", "/data", "creds.json", b"{}")
            .gated(),
    );
    let (service, _) = service_with(test_config(dir.path()), panel.clone());
    service.set_sink("ops").unwrap();
    let record = service.start_scan(false, &SilentReporter).unwrap();
    let key = RunKey::Backup(record.scan_id.clone());

    thread::scope(|s| {
        let running = s.spawn(|| service.start_backup(&record.scan_id, &SilentReporter));

        panel.wait_until_downloading();
        assert!(service.is_running(&key));
        let err = service
            .start_backup(&record.scan_id, &SilentReporter)
            .unwrap_err();
        assert!(matches!(err, Error::RunInProgress(_)));
        panel.release_download();

        let result = running.join().unwrap().unwrap();
        assert_eq!(result.success_count, 1);
    });

    assert!(!service.is_running(&key));
    assert_eq!(panel.deleted_dirs(), vec!["data".to_string()]);
}
