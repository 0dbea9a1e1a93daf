//! A single connection attempt for a part.
//!
//! The attempt runs on a curl multi handle so the stop flag is polled every
//! `STOP_POLL`, including while the server is silent.

use curl::easy::{Easy2, Handler, WriteError};
use curl::multi::{Easy2Handle, Multi};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use super::throttle::Throttle;
use super::{RangeFetcher, STALL_TIMEOUT};
use crate::governor::{RateGovernor, TransferGuard};
use crate::job::JobProgress;
use crate::parts::Part;
use crate::retry::{sleep_unless_stopped, FetchError, STOP_POLL};
use crate::storage::StorageWriter;

/// Status code of an HTTP status line (`HTTP/1.1 206 Partial Content`).
pub fn parse_status_line(line: &[u8]) -> Option<u32> {
    let s = std::str::from_utf8(line).ok()?;
    if !s.starts_with("HTTP/") {
        return None;
    }
    s.split_whitespace().nth(1)?.parse().ok()
}

/// Easy2 handler for one part: checks for 206, writes at the part's absolute
/// offset, throttles and reports speed.
pub struct PartHandler {
    index: usize,
    offset: u64,
    length: u64,
    status: u32,
    failure: Option<FetchError>,
    guard: Option<TransferGuard>,
    throttle: Throttle,
    governor: Arc<RateGovernor>,
    progress: Arc<JobProgress>,
    writer: StorageWriter,
    stop: Arc<AtomicBool>,
}

impl PartHandler {
    fn fail(&mut self, e: FetchError) -> Result<usize, WriteError> {
        self.failure = Some(e);
        Ok(0)
    }
}

impl Handler for PartHandler {
    fn header(&mut self, data: &[u8]) -> bool {
        if let Some(code) = parse_status_line(data) {
            self.status = code;
        }
        true
    }

    fn write(&mut self, data: &[u8]) -> Result<usize, WriteError> {
        if self.stop.load(Ordering::Relaxed) {
            return self.fail(FetchError::Stopped);
        }
        if self.status != 206 {
            return self.fail(FetchError::Http(self.status));
        }
        if self.guard.is_none() {
            self.guard = Some(self.governor.register_transfer());
            self.progress.part_connected(self.index);
        }

        let loaded = self.progress.loaded(self.index);
        let take = self.length.saturating_sub(loaded).min(data.len() as u64);
        if take > 0 {
            if let Err(e) = self.writer.write_at(self.offset + loaded, &data[..take as usize]) {
                return self.fail(FetchError::Storage(e));
            }
            self.progress.advance(self.index, take);
        }

        let allowance = self.governor.per_slot_allowance();
        if let Some(delay) = self.throttle.record(take, allowance, Instant::now()) {
            if !sleep_unless_stopped(delay, &self.stop) {
                return self.fail(FetchError::Stopped);
            }
        }
        if let Some(speed) = self.throttle.speed_sample(Instant::now()) {
            self.governor.report_speed(speed);
        }
        Ok(data.len())
    }
}

/// Performs until the transfer finishes (`Some`) or `stop` is raised (`None`).
fn drive(
    multi: &Multi,
    handle: &Easy2Handle<PartHandler>,
    stop: &AtomicBool,
) -> Result<Option<Result<(), curl::Error>>, FetchError> {
    loop {
        let running = multi.perform().map_err(FetchError::Multi)?;
        let mut done = None;
        multi.messages(|msg| {
            if let Some(r) = msg.result_for2(handle) {
                done = Some(r);
            }
        });
        if done.is_some() {
            return Ok(done);
        }
        if running == 0 {
            return Ok(Some(Ok(())));
        }
        if stop.load(Ordering::Relaxed) {
            return Ok(None);
        }
        multi.wait(&mut [], STOP_POLL).map_err(FetchError::Multi)?;
    }
}

impl RangeFetcher {
    fn configure(&self, easy: &mut Easy2<PartHandler>, part: &Part) -> Result<(), curl::Error> {
        easy.url(&self.settings.url)?;
        easy.useragent(&self.settings.user_agent)?;
        easy.follow_location(true)?;
        easy.connect_timeout(self.settings.connect_timeout)?;
        easy.low_speed_limit(1)?;
        easy.low_speed_time(STALL_TIMEOUT)?;
        easy.range(&part.curl_range())?;
        Ok(())
    }

    pub(super) fn attempt(&self) -> Result<(), FetchError> {
        let length = self.part.length;
        let start_loaded = self.progress.loaded(self.index);
        if start_loaded >= length {
            return Ok(());
        }
        let mut part = self.part;
        part.loaded = start_loaded;

        let mut easy = Easy2::new(PartHandler {
            index: self.index,
            offset: self.part.offset,
            length,
            status: 0,
            failure: None,
            guard: None,
            throttle: Throttle::new(Instant::now()),
            governor: Arc::clone(&self.governor),
            progress: Arc::clone(&self.progress),
            writer: self.writer.clone(),
            stop: Arc::clone(&self.stop),
        });
        self.configure(&mut easy, &part).map_err(FetchError::Curl)?;
        tracing::debug!(item = self.item_id, part = self.index, range = %part.range_header_value(), "connecting");

        let multi = Multi::new();
        let handle = multi.add2(easy).map_err(FetchError::Multi)?;
        let outcome = drive(&multi, &handle, &self.stop);
        self.progress.part_disconnected(self.index);
        let mut easy = multi.remove2(handle).map_err(FetchError::Multi)?;
        let handler = easy.get_mut();
        handler.guard.take();
        let status = handler.status;

        if let Some(f) = handler.failure.take() {
            return Err(f);
        }
        match outcome? {
            None => return Err(FetchError::Stopped),
            Some(Err(e)) => {
                if self.stop.load(Ordering::Relaxed) {
                    return Err(FetchError::Stopped);
                }
                return Err(FetchError::Curl(e));
            }
            Some(Ok(())) => {}
        }
        if status != 206 {
            return Err(FetchError::Http(status));
        }
        let loaded = self.progress.loaded(self.index);
        if loaded < length {
            return Err(FetchError::ShortBody {
                expected: length - start_loaded,
                received: loaded - start_loaded,
            });
        }
        Ok(())
    }
}
