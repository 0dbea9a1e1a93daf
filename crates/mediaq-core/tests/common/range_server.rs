//! Minimal HTTP/1.1 server with HEAD and Range GET support for integration tests.
//!
//! Serves a single static body. HEAD answers with Content-Length; GET with a
//! Range answers 206 Partial Content. Every requested range is recorded, and
//! the first `cut_responses` GETs are cut off after `cut_after` body bytes to
//! simulate dropped connections. `stall` holds every GET silent after its
//! headers, to exercise stop requests while no data arrives.

#![allow(dead_code)]

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub struct RangeServerOptions {
    /// If false, GET ignores Range and returns 200 with the full body.
    pub support_ranges: bool,
    /// Body bytes sent before a cut connection is closed.
    pub cut_after: u64,
    /// How many GET responses are cut.
    pub cut_responses: usize,
    /// Silence between the GET headers and the body.
    pub stall: Option<Duration>,
}

impl Default for RangeServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            cut_after: 0,
            cut_responses: 0,
            stall: None,
        }
    }
}

pub struct RangeServer {
    pub url: String,
    ranges: Arc<Mutex<Vec<(u64, u64)>>>,
}

impl RangeServer {
    /// `(start, end_inclusive)` of every Range GET received so far.
    pub fn ranges(&self) -> Vec<(u64, u64)> {
        self.ranges.lock().unwrap().clone()
    }
}

pub fn start(body: Vec<u8>) -> RangeServer {
    start_with_options(body, RangeServerOptions::default())
}

/// Starts the server on a background thread. It runs until the process exits.
pub fn start_with_options(body: Vec<u8>, opts: RangeServerOptions) -> RangeServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let body = Arc::new(body);
    let ranges = Arc::new(Mutex::new(Vec::new()));
    let cuts_left = Arc::new(AtomicUsize::new(opts.cut_responses));
    {
        let ranges = Arc::clone(&ranges);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let body = Arc::clone(&body);
                let ranges = Arc::clone(&ranges);
                let cuts_left = Arc::clone(&cuts_left);
                thread::spawn(move || handle(stream, &body, opts, &ranges, &cuts_left));
            }
        });
    }
    RangeServer {
        url: format!("http://127.0.0.1:{}/show.mp4", port),
        ranges,
    }
}

fn handle(
    mut stream: std::net::TcpStream,
    body: &[u8],
    opts: RangeServerOptions,
    ranges: &Mutex<Vec<(u64, u64)>>,
    cuts_left: &AtomicUsize,
) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(5)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let (method, range) = parse_request(request);
    let total = body.len() as u64;

    if method.eq_ignore_ascii_case("HEAD") {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\nConnection: close\r\n\r\n",
            total
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nConnection: close\r\n\r\n");
        return;
    }

    let (status, slice) = match range {
        Some((start, end_incl)) if opts.support_ranges => {
            ranges.lock().unwrap().push((start, end_incl));
            let start = start.min(total) as usize;
            let end_excl = (end_incl.saturating_add(1)).min(total) as usize;
            ("206 Partial Content", body.get(start..end_excl).unwrap_or(&[]))
        }
        _ => ("200 OK", body),
    };
    let header = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        slice.len()
    );
    let _ = stream.write_all(header.as_bytes());
    if let Some(d) = opts.stall {
        let _ = stream.flush();
        thread::sleep(d);
    }

    let cut = cuts_left
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok();
    if cut {
        let keep = (opts.cut_after as usize).min(slice.len());
        let _ = stream.write_all(&slice[..keep]);
        let _ = stream.flush();
        let _ = stream.shutdown(std::net::Shutdown::Both);
        return;
    }
    let _ = stream.write_all(slice);
}

/// Returns (method, optional (start, end_inclusive) for `Range: bytes=X-Y`).
fn parse_request(request: &str) -> (&str, Option<(u64, u64)>) {
    let mut method = "";
    let mut range = None;
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if method.is_empty() {
            method = line.split_whitespace().next().unwrap_or("");
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if !name.trim().eq_ignore_ascii_case("range") {
                continue;
            }
            let value = value.trim();
            if let Some(spec) = value.strip_prefix("bytes=") {
                if let Some((a, b)) = spec.split_once('-') {
                    let start = a.trim().parse::<u64>().unwrap_or(0);
                    let end = b.trim();
                    let end_incl = if end.is_empty() {
                        u64::MAX
                    } else {
                        end.parse::<u64>().unwrap_or(0)
                    };
                    range = Some((start, end_incl));
                }
            }
        }
    }
    (method, range)
}
