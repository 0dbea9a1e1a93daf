use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use super::*;
use crate::catalog::{AutodownloadLevel, Credentials, FileDescriptor};
use crate::control::ControlRequest;
use crate::job::JobOutcome;
use crate::parts::{plan_parts, Part};
use crate::queue::{Item, Quality, Recording, Reorder, Variant};
use crate::storage;

#[derive(Default)]
struct FakeCatalog {
    listing: Mutex<Vec<RecordingDescriptor>>,
    deletes: Mutex<Vec<RecordingId>>,
    list_calls: AtomicUsize,
    reject: bool,
}

impl FakeCatalog {
    fn with(listing: Vec<RecordingDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            listing: Mutex::new(listing),
            ..Self::default()
        })
    }

    fn deletes(&self) -> Vec<RecordingId> {
        self.deletes.lock().unwrap().clone()
    }
}

impl CatalogApi for FakeCatalog {
    fn list_recordings(&self, _creds: &Credentials) -> Result<Vec<RecordingDescriptor>, CatalogError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.reject {
            return Err(CatalogError::BadCredentials);
        }
        Ok(self.listing.lock().unwrap().clone())
    }

    fn delete_recording(&self, _creds: &Credentials, id: RecordingId) -> Result<(), CatalogError> {
        self.deletes.lock().unwrap().push(id);
        self.listing.lock().unwrap().retain(|d| d.id != id);
        Ok(())
    }
}

struct FixedProbe(Option<u64>);

impl SizeProbe for FixedProbe {
    fn probe_size(&self, _url: &str) -> anyhow::Result<u64> {
        self.0.ok_or_else(|| anyhow::anyhow!("connection refused"))
    }
}

fn descriptor(id: RecordingId, title: &str, qualities: &[&str]) -> RecordingDescriptor {
    RecordingDescriptor {
        id,
        title: title.to_string(),
        files: qualities
            .iter()
            .map(|q| FileDescriptor {
                quality: q.to_string(),
                url: format!("http://127.0.0.1:9/{}-{}.mp4", id, q),
            })
            .collect(),
    }
}

fn test_config(dir: &Path) -> MediaqConfig {
    let mut cfg = MediaqConfig::default();
    cfg.download_dir = Some(dir.to_path_buf());
    cfg.paused = true;
    cfg.catalog.base_url = Some("http://catalog.invalid".into());
    cfg.catalog.username = Some("alice".into());
    cfg.catalog.password = Some("secret".into());
    cfg
}

fn scheduler(cfg: MediaqConfig, state: QueueState, catalog: Option<Arc<FakeCatalog>>, size: Option<u64>) -> Scheduler {
    let catalog = catalog.map(|c| c as Arc<dyn CatalogApi>);
    Scheduler::new(cfg, state, catalog, Arc::new(FixedProbe(size)))
}

fn tick_until(s: &mut Scheduler, cond: impl Fn(&Scheduler) -> bool) -> bool {
    for _ in 0..200 {
        s.tick().unwrap();
        if cond(s) {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    false
}

fn one_recording_state(dir: &Path) -> QueueState {
    let mut state = QueueState::default();
    let mut variants = BTreeMap::new();
    variants.insert(Quality::Hq, Variant::new("http://127.0.0.1:9/show.mp4"));
    state.recordings.insert(
        1,
        Recording {
            id: 1,
            title: "Show".into(),
            first_seen: 0,
            marked_deleted: false,
            variants,
        },
    );
    state.add_item(1, Quality::Hq, dir.join("Show (HQ).mp4"));
    state
}

fn finished_parts(total: u64) -> Vec<Part> {
    let mut parts = plan_parts(total, 2);
    for p in &mut parts {
        p.advance_to(p.length);
    }
    parts
}

#[test]
fn missing_credentials_sets_state() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.catalog.password = None;
    let mut s = scheduler(cfg, QueueState::default(), Some(FakeCatalog::with(vec![])), None);
    s.tick().unwrap();
    assert_eq!(s.controller_state(), ControllerState::NoCredentials);
}

#[test]
fn rejected_credentials_wait_for_explicit_refresh() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = Arc::new(FakeCatalog {
        reject: true,
        ..FakeCatalog::default()
    });
    let mut cfg = test_config(dir.path());
    cfg.catalog_refresh_secs = 0;
    let mut s = scheduler(cfg, QueueState::default(), Some(catalog.clone()), None);
    assert!(tick_until(&mut s, |s| s.controller_state() == ControllerState::Error));
    for _ in 0..5 {
        s.tick().unwrap();
    }
    assert_eq!(catalog.list_calls.load(Ordering::SeqCst), 1);

    s.request_refresh();
    assert!(tick_until(&mut s, |_| catalog.list_calls.load(Ordering::SeqCst) == 2));
}

#[test]
fn autodownload_enqueues_each_variant_once() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::with(vec![
        descriptor(1, "News", &["HD", "HQ", "NQ"]),
        descriptor(2, "Film", &["NQ"]),
    ]);
    let mut cfg = test_config(dir.path());
    cfg.autodownload = AutodownloadLevel::HdOrHq;
    let mut s = scheduler(cfg, QueueState::default(), Some(catalog.clone()), None);

    assert!(tick_until(&mut s, |s| s.controller_state() == ControllerState::Connected));
    let items = &s.state().items;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].recording_id, 1);
    assert_eq!(items[0].quality, Quality::Hd);
    assert_eq!(items[0].target, dir.path().join("News (HD).mp4"));
    assert!(s.state().variant(1, Quality::Hd).unwrap().auto_enqueued);

    // The user removes the item; later refreshes must not bring it back.
    let id = items[0].id;
    s.remove_item(id).unwrap();
    s.request_refresh();
    assert!(tick_until(&mut s, |_| catalog.list_calls.load(Ordering::SeqCst) >= 2));
    for _ in 0..5 {
        s.tick().unwrap();
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(s.state().items.is_empty());
}

#[test]
fn marked_recording_deleted_once_after_items_done() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::with(vec![descriptor(1, "News", &["HQ"])]);
    let mut cfg = test_config(dir.path());
    cfg.autodownload = AutodownloadLevel::Hq;
    cfg.delete_after_download = true;
    cfg.delete_grace_period_secs = 0;
    let mut s = scheduler(cfg, QueueState::default(), Some(catalog.clone()), None);

    assert!(tick_until(&mut s, |s| !s.state().items.is_empty()));
    assert!(s.state().recordings[&1].marked_deleted);

    // Undownloaded item keeps the recording upstream.
    s.request_refresh();
    assert!(tick_until(&mut s, |_| catalog.list_calls.load(Ordering::SeqCst) >= 2));
    assert!(catalog.deletes().is_empty());

    let id = s.state().items[0].id;
    s.state.get_mut(id).unwrap().downloaded = true;
    s.request_refresh();
    assert!(tick_until(&mut s, |_| catalog.deletes().len() == 1));

    // The deletion triggers a refresh that drops the recording and its item.
    assert!(tick_until(&mut s, |s| s.state().recordings.is_empty()));
    assert!(s.state().items.is_empty());
    s.request_refresh();
    assert!(tick_until(&mut s, |_| catalog.list_calls.load(Ordering::SeqCst) >= 5));
    assert_eq!(catalog.deletes(), vec![1]);
}

#[test]
fn probe_fills_in_size() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = scheduler(
        test_config(dir.path()),
        one_recording_state(dir.path()),
        None,
        Some(4096),
    );
    assert!(tick_until(&mut s, |s| s.state().items[0].total_bytes == 4096));
    assert!(s.take_dirty());
}

#[test]
fn failed_probe_leaves_item_unadmitted() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.paused = false;
    let mut s = scheduler(cfg, one_recording_state(dir.path()), None, None);
    assert!(tick_until(&mut s, |s| s.state().items[0].last_error.is_some()));
    assert_eq!(s.state().items[0].total_bytes, 0);
    assert!(s.running_ids().is_empty());
}

#[test]
fn pause_admits_nothing_and_keeps_measurements() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.paused = false;
    let mut state = one_recording_state(dir.path());
    state.items[0].total_bytes = 1000;
    let mut s = scheduler(cfg, state, None, None);

    let guard = s.governor().register_transfer();
    s.governor().report_speed(50_000.0);
    let before = s.governor().aggregate_speed();
    assert!(before > 0.0);

    s.set_paused(true);
    assert!(s.config().paused);
    assert!(s.take_config_dirty());
    s.tick().unwrap();
    assert_eq!(s.effective_slots(), 0);
    assert!(s.running_ids().is_empty());
    assert_eq!(s.governor().aggregate_speed(), before);
    drop(guard);
    assert_eq!(s.governor().aggregate_speed(), 0.0);
}

#[test]
fn completed_report_finalizes_without_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = one_recording_state(dir.path());
    let target = state.items[0].target.clone();
    state.items[0].total_bytes = 10;
    state.items[0].parts = plan_parts(10, 2);
    std::fs::write(&target, b"existing").unwrap();
    std::fs::write(storage::temp_path(&target), b"0123456789").unwrap();
    state.variant_mut(1, Quality::Hq).unwrap().auto_enqueued = true;
    let mut s = scheduler(test_config(dir.path()), state, None, None);

    let report = JobReport {
        item_id: 1,
        outcome: JobOutcome::Completed,
        parts: finished_parts(10),
    };
    s.events_tx.send(SchedulerEvent::Job(report.clone())).unwrap();
    s.tick().unwrap();

    let item = s.state().get(1).unwrap();
    assert!(item.downloaded);
    assert!(item.downloaded_at.is_some());
    let renamed = dir.path().join("Show (HQ)(1).mp4");
    assert_eq!(item.target, renamed);
    assert_eq!(std::fs::read(&target).unwrap(), b"existing");
    assert_eq!(std::fs::read(&renamed).unwrap(), b"0123456789");
    assert!(s.state().variant(1, Quality::Hq).unwrap().auto_downloaded);

    // A second completion changes nothing.
    s.events_tx.send(SchedulerEvent::Job(report)).unwrap();
    s.tick().unwrap();
    assert_eq!(s.state().get(1).unwrap().target, renamed);
    assert!(!dir.path().join("Show (HQ)(2).mp4").exists());
}

#[test]
fn completed_report_with_missing_bytes_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = one_recording_state(dir.path());
    state.items[0].total_bytes = 10;
    state.items[0].parts = plan_parts(10, 2);
    let mut s = scheduler(test_config(dir.path()), state, None, None);

    let mut parts = plan_parts(10, 2);
    parts[0].advance_to(5);
    s.events_tx
        .send(SchedulerEvent::Job(JobReport {
            item_id: 1,
            outcome: JobOutcome::Completed,
            parts,
        }))
        .unwrap();
    assert!(matches!(s.tick(), Err(EngineError::Invariant(_))));
}

#[test]
fn failed_report_flags_item_and_unmarks_recording() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = one_recording_state(dir.path());
    state.items[0].total_bytes = 10;
    state.items[0].parts = plan_parts(10, 2);
    state.recordings.get_mut(&1).unwrap().marked_deleted = true;
    let mut s = scheduler(test_config(dir.path()), state, None, None);

    let mut parts = plan_parts(10, 2);
    parts[1].advance_to(3);
    s.events_tx
        .send(SchedulerEvent::Job(JobReport {
            item_id: 1,
            outcome: JobOutcome::Failed("Shutdown before file was finished".into()),
            parts,
        }))
        .unwrap();
    s.tick().unwrap();

    let item = s.state().get(1).unwrap();
    assert!(item.has_problem);
    assert!(!item.downloaded);
    assert_eq!(item.loaded_bytes(), 3);
    assert!(!s.state().recordings[&1].marked_deleted);
}

#[test]
fn finalize_is_repaired_on_tick() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = one_recording_state(dir.path());
    let target = state.items[0].target.clone();
    state.items[0].total_bytes = 3;
    state.items[0].parts = finished_parts(3);
    state.items[0].downloaded = true;
    std::fs::write(storage::temp_path(&target), b"abc").unwrap();
    let mut s = scheduler(test_config(dir.path()), state, None, None);
    s.tick().unwrap();
    assert_eq!(std::fs::read(&target).unwrap(), b"abc");
    assert!(!storage::temp_path(&target).exists());
}

#[test]
fn items_of_unlisted_recordings_are_removed() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = FakeCatalog::with(vec![descriptor(2, "Other", &["HQ"])]);
    let mut s = scheduler(
        test_config(dir.path()),
        one_recording_state(dir.path()),
        Some(catalog),
        None,
    );
    assert!(tick_until(&mut s, |s| s.state().items.is_empty()));
    assert!(s.state().recordings.contains_key(&2));
}

#[test]
fn dispatch_reports_errors_and_results() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = scheduler(test_config(dir.path()), one_recording_state(dir.path()), None, None);

    let r = s.dispatch(ControlRequest::Enqueue {
        recording_id: 1,
        quality: Quality::Hq,
    });
    assert!(r.ok);
    assert_eq!(r.result.unwrap()["item_id"], 2);
    assert_eq!(s.state().items[1].priority, 2);
    assert!(!s.state().variant(1, Quality::Hq).unwrap().auto_enqueued);

    let r = s.dispatch(ControlRequest::Enqueue {
        recording_id: 1,
        quality: Quality::Hd,
    });
    assert!(!r.ok);
    assert!(r.error.unwrap().contains("HD"));

    assert!(!s.dispatch(ControlRequest::Remove { item_id: 99 }).ok);
    assert!(!s.dispatch(ControlRequest::SetMaxConcurrent { slots: 0 }).ok);
    assert!(s.dispatch(ControlRequest::SetMaxConcurrent { slots: 3 }).ok);
    assert_eq!(s.status().max_concurrent, 3);

    assert!(s
        .dispatch(ControlRequest::Reorder {
            item_id: 2,
            change: Reorder::Up,
        })
        .ok);
    let order: Vec<_> = s.item_statuses().iter().map(|i| i.id).collect();
    assert_eq!(order, vec![2, 1]);

    assert!(s.dispatch(ControlRequest::SetSpeedLimit { bytes_per_sec: 1000 }).ok);
    assert_eq!(s.config().max_bytes_per_sec, Some(1000));
    assert_eq!(s.governor().ceiling(), 1000);

    let r = s.dispatch(ControlRequest::Recordings);
    let recordings: Vec<RecordingStatus> = serde_json::from_value(r.result.unwrap()).unwrap();
    assert_eq!(recordings[0].variants[0].queued, 2);

    assert!(s.dispatch(ControlRequest::Shutdown).ok);
    assert!(s.shutdown_requested());
}

#[test]
fn shutdown_without_jobs_returns_immediately() {
    let dir = tempfile::tempdir().unwrap();
    let mut s = scheduler(test_config(dir.path()), QueueState::default(), None, None);
    let start = Instant::now();
    assert!(s.shutdown(Duration::from_secs(5)));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn loaded_item_is_not_admitted_while_size_unknown() {
    let items = vec![Item::new(1, 1, 1, Quality::Hq, "/d/x".into())];
    assert!(admitted_ids(&items, 4).is_empty());
}

fn same_title_state(dir: &Path) -> QueueState {
    let mut state = QueueState::default();
    for id in [1, 2] {
        let mut variants = BTreeMap::new();
        variants.insert(Quality::Hq, Variant::new(format!("http://127.0.0.1:9/{}.mp4", id)));
        state.recordings.insert(
            id,
            Recording {
                id,
                title: "News".into(),
                first_seen: 0,
                marked_deleted: false,
                variants,
            },
        );
        state.add_item(id, Quality::Hq, dir.join("News (HQ).mp4"));
    }
    for item in &mut state.items {
        item.total_bytes = 1000;
    }
    state
}

#[test]
fn items_started_in_one_tick_get_distinct_files() {
    let dir = tempfile::tempdir().unwrap();
    let mut cfg = test_config(dir.path());
    cfg.paused = false;
    cfg.max_concurrent_downloads = 2;
    let mut s = scheduler(cfg, same_title_state(dir.path()), None, None);
    s.tick().unwrap();

    let mut running = s.running_ids();
    running.sort_unstable();
    assert_eq!(running, vec![1, 2]);
    let first = s.state().get(1).unwrap();
    let second = s.state().get(2).unwrap();
    assert_eq!(first.target, dir.path().join("News (HQ).mp4"));
    assert_eq!(second.target, dir.path().join("News (HQ)(1).mp4"));
    assert_ne!(first.temp_path(), second.temp_path());

    // A later start of the first item keeps its own name.
    assert!(s.shutdown(Duration::from_secs(5)));
    let mut s = scheduler(test_config(dir.path()), s.state().clone(), None, None);
    s.set_paused(false);
    s.tick().unwrap();
    assert_eq!(s.state().get(1).unwrap().target, dir.path().join("News (HQ).mp4"));
    assert_eq!(s.state().get(2).unwrap().target, dir.path().join("News (HQ)(1).mp4"));
    assert!(s.shutdown(Duration::from_secs(5)));
}

#[test]
fn failed_job_waits_for_retry_delay_before_restart() {
    let dir = tempfile::tempdir().unwrap();
    // A regular file where the download directory should be: the temp file
    // cannot be created, so every job fails before transferring.
    let blocked = dir.path().join("blocked");
    std::fs::write(&blocked, b"").unwrap();
    let mut state = one_recording_state(&blocked);
    state.items[0].total_bytes = 1000;
    let mut cfg = test_config(dir.path());
    cfg.paused = false;
    cfg.max_concurrent_downloads = 1;
    let delay = cfg.retry_delay();
    let mut s = scheduler(cfg, state, None, None);

    let t0 = Instant::now();
    s.tick_at(t0, 0).unwrap();
    assert_eq!(s.running_ids(), vec![1]);
    let mut drained = false;
    for _ in 0..200 {
        std::thread::sleep(Duration::from_millis(10));
        s.tick_at(t0, 0).unwrap();
        if s.running_ids().is_empty() {
            drained = true;
            break;
        }
    }
    assert!(drained, "failing job never reported");
    let item = s.state().get(1).unwrap();
    assert!(item.has_problem);
    assert!(item.last_error.is_some());

    // Within the delay the item is neither restarted nor gives up its slot.
    for ms in [0, 100, 1000] {
        s.tick_at(t0 + Duration::from_millis(ms), 0).unwrap();
        assert!(s.running_ids().is_empty());
    }

    s.tick_at(t0 + delay + Duration::from_millis(10), 0).unwrap();
    assert_eq!(s.running_ids(), vec![1]);
    assert!(s.shutdown(Duration::from_secs(5)));
}

#[test]
fn enqueue_names_target_from_configured_pattern() {
    let dir = tempfile::tempdir().unwrap();
    let mut state = QueueState::default();
    let mut variants = BTreeMap::new();
    variants.insert(Quality::Nq, Variant::new("http://127.0.0.1:9/late.MP4?token=x"));
    state.recordings.insert(
        7,
        Recording {
            id: 7,
            title: "Late: Show".into(),
            // 2024-03-01T12:00:00Z
            first_seen: 1_709_294_400,
            marked_deleted: false,
            variants,
        },
    );
    let mut cfg = test_config(dir.path());
    cfg.file_name_pattern = "{title}/{date} #{id} {quality}".into();
    let mut s = scheduler(cfg, state, None, None);

    let id = s.enqueue(7, Quality::Nq).unwrap();
    assert_eq!(
        s.state().get(id).unwrap().target,
        dir.path().join("Late_ Show").join("2024-03-01 #7 NQ.mp4")
    );
}
