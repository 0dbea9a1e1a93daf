//! Integration tests for a single range fetcher against a local range server.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use mediaq_core::fetcher::{FetchSettings, RangeFetcher};
use mediaq_core::governor::RateGovernor;
use mediaq_core::job::JobProgress;
use mediaq_core::parts::Part;
use mediaq_core::retry::{FetchError, RetryPolicy};
use mediaq_core::storage::StorageWriterBuilder;
use tempfile::tempdir;

fn body(len: usize) -> Vec<u8> {
    (0u8..251).cycle().take(len).collect()
}

fn settings(url: &str) -> FetchSettings {
    FetchSettings {
        url: url.to_string(),
        user_agent: "mediaq-test".into(),
        connect_timeout: Duration::from_secs(5),
        retry: RetryPolicy::fixed(Duration::from_millis(50)),
    }
}

fn fetcher(
    url: &str,
    part: Part,
    path: &std::path::Path,
    total: u64,
    governor: Arc<RateGovernor>,
    stop: Arc<AtomicBool>,
) -> (RangeFetcher, Arc<JobProgress>) {
    let mut builder = StorageWriterBuilder::create(path).unwrap();
    builder.preallocate(total).unwrap();
    let progress = Arc::new(JobProgress::new(&[part]));
    let f = RangeFetcher {
        item_id: 1,
        index: 0,
        part,
        settings: settings(url),
        governor,
        writer: builder.build(),
        progress: Arc::clone(&progress),
        stop,
    };
    (f, progress)
}

#[test]
fn resumes_at_offset_plus_loaded() {
    let data = body(10_000);
    let server = common::range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let path = dir.path().join("show.mp4.download");

    let part = Part {
        offset: 2000,
        length: 4000,
        loaded: 1500,
    };
    let (f, progress) = fetcher(
        &server.url,
        part,
        &path,
        10_000,
        Arc::new(RateGovernor::new(0)),
        Arc::new(AtomicBool::new(false)),
    );
    f.run().unwrap();

    assert_eq!(server.ranges(), vec![(3500, 5999)]);
    assert_eq!(progress.loaded(0), 4000);
    let written = std::fs::read(&path).unwrap();
    assert_eq!(&written[3500..6000], &data[3500..6000]);
    assert!(written[..3500].iter().all(|b| *b == 0));
}

#[test]
fn dropped_connection_is_retried_from_current_position() {
    let data = body(50_000);
    let server = common::range_server::start_with_options(
        data.clone(),
        common::range_server::RangeServerOptions {
            cut_after: 8_000,
            cut_responses: 1,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let path = dir.path().join("show.mp4.download");

    let (f, progress) = fetcher(
        &server.url,
        Part::new(0, 50_000),
        &path,
        50_000,
        Arc::new(RateGovernor::new(0)),
        Arc::new(AtomicBool::new(false)),
    );
    f.run().unwrap();

    let ranges = server.ranges();
    assert_eq!(ranges.len(), 2);
    assert_eq!(ranges[0], (0, 49_999));
    // The retry starts exactly where the cut connection left the part.
    assert_eq!(ranges[1].0, 8_000);
    assert_eq!(ranges[1].1, 49_999);
    assert_eq!(progress.loaded(0), 50_000);
    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[test]
fn ceiling_slows_the_transfer() {
    let data = body(200_000);
    let server = common::range_server::start(data.clone());
    let dir = tempdir().unwrap();
    let path = dir.path().join("show.mp4.download");

    let governor = Arc::new(RateGovernor::new(100_000));
    let (f, _progress) = fetcher(
        &server.url,
        Part::new(0, 200_000),
        &path,
        200_000,
        Arc::clone(&governor),
        Arc::new(AtomicBool::new(false)),
    );
    let start = Instant::now();
    f.run().unwrap();

    assert!(start.elapsed() >= Duration::from_millis(1200));
    assert_eq!(governor.active_transfers(), 0);
    assert_eq!(std::fs::read(&path).unwrap(), data);
}

#[test]
fn non_partial_response_is_a_problem_until_stopped() {
    let server = common::range_server::start_with_options(
        body(1000),
        common::range_server::RangeServerOptions {
            support_ranges: false,
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let path = dir.path().join("show.mp4.download");
    let stop = Arc::new(AtomicBool::new(false));

    let (f, progress) = fetcher(
        &server.url,
        Part::new(0, 1000),
        &path,
        1000,
        Arc::new(RateGovernor::new(0)),
        Arc::clone(&stop),
    );
    let stopper = {
        let stop = Arc::clone(&stop);
        std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(300));
            stop.store(true, Ordering::Relaxed);
        })
    };
    let result = f.run();
    stopper.join().unwrap();

    assert!(matches!(result, Err(FetchError::Stopped)));
    assert!(progress.has_problem());
    assert_eq!(progress.loaded(0), 0);
}

#[test]
fn stop_is_seen_while_server_is_silent() {
    let server = common::range_server::start_with_options(
        body(1000),
        common::range_server::RangeServerOptions {
            stall: Some(Duration::from_secs(10)),
            ..Default::default()
        },
    );
    let dir = tempdir().unwrap();
    let path = dir.path().join("show.mp4.download");
    let stop = Arc::new(AtomicBool::new(false));
    let governor = Arc::new(RateGovernor::new(0));

    let (f, progress) = fetcher(
        &server.url,
        Part::new(0, 1000),
        &path,
        1000,
        Arc::clone(&governor),
        Arc::clone(&stop),
    );
    let worker = std::thread::spawn(move || f.run());
    std::thread::sleep(Duration::from_millis(400));
    let stopped_at = Instant::now();
    stop.store(true, Ordering::Relaxed);
    let result = worker.join().unwrap();

    assert!(matches!(result, Err(FetchError::Stopped)));
    assert!(
        stopped_at.elapsed() < Duration::from_millis(500),
        "stop took {:?}",
        stopped_at.elapsed()
    );
    assert_eq!(progress.loaded(0), 0);
    assert_eq!(governor.active_transfers(), 0);
}
