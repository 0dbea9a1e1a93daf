//! Size probing for queued items.
//!
//! An item is admittable only once its total size is known. The scheduler
//! probes sizes off the tick thread through the `SizeProbe` trait; `CurlProbe`
//! issues a HEAD request and reads `Content-Length`.

mod parse;

use anyhow::{Context, Result};
use std::str;
use std::time::Duration;

pub use parse::{parse_headers, HeadInfo};

/// Determines the total byte size of a remote file.
pub trait SizeProbe: Send + Sync {
    fn probe_size(&self, url: &str) -> Result<u64>;
}

/// HEAD-based probe on a blocking curl handle.
#[derive(Debug, Clone)]
pub struct CurlProbe {
    user_agent: String,
    connect_timeout: Duration,
}

impl CurlProbe {
    pub fn new(user_agent: impl Into<String>, connect_timeout: Duration) -> Self {
        Self {
            user_agent: user_agent.into(),
            connect_timeout,
        }
    }

    /// Performs the HEAD request and returns the parsed headers of the final response.
    pub fn head(&self, url: &str) -> Result<HeadInfo> {
        let mut headers: Vec<String> = Vec::new();

        let mut easy = curl::easy::Easy::new();
        easy.url(url).context("invalid URL")?;
        easy.nobody(true)?;
        easy.follow_location(true)?;
        easy.useragent(&self.user_agent)?;
        easy.connect_timeout(self.connect_timeout)?;
        easy.timeout(self.connect_timeout * 3)?;

        {
            let mut transfer = easy.transfer();
            transfer.header_function(|data| {
                if let Ok(s) = str::from_utf8(data) {
                    let line = s.trim_end();
                    // A new status line starts a new response (redirect hop).
                    if line.starts_with("HTTP/") {
                        headers.clear();
                    }
                    headers.push(line.to_string());
                }
                true
            })?;
            transfer.perform().context("HEAD request failed")?;
        }

        let code = easy.response_code().context("no response code")?;
        if !(200..300).contains(&code) {
            anyhow::bail!("HEAD {} returned HTTP {}", url, code);
        }
        Ok(parse_headers(&headers))
    }
}

impl SizeProbe for CurlProbe {
    fn probe_size(&self, url: &str) -> Result<u64> {
        let info = self.head(url)?;
        match info.content_length {
            Some(n) if n > 0 => {
                if !info.accept_ranges {
                    tracing::debug!(url, "server did not advertise Accept-Ranges: bytes");
                }
                Ok(n)
            }
            _ => anyhow::bail!("no usable Content-Length for {}", url),
        }
    }
}
