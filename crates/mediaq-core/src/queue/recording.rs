//! Cached view of upstream recordings and their quality variants.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::types::RecordingId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Quality {
    Hd,
    Hq,
    Nq,
    Unknown,
}

impl Quality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Quality::Hd => "HD",
            Quality::Hq => "HQ",
            Quality::Nq => "NQ",
            Quality::Unknown => "UNKNOWN",
        }
    }

    /// Case-insensitive parse; anything unrecognised is `Unknown`.
    pub fn parse_lenient(s: &str) -> Self {
        s.parse().unwrap_or(Quality::Unknown)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Quality {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "HD" => Ok(Quality::Hd),
            "HQ" => Ok(Quality::Hq),
            "NQ" => Ok(Quality::Nq),
            "UNKNOWN" => Ok(Quality::Unknown),
            other => Err(format!("unknown quality: {}", other)),
        }
    }
}

/// One downloadable file of a recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variant {
    pub url: String,
    /// Set once the autodownload policy enqueued this variant; cleared by a manual enqueue.
    pub auto_enqueued: bool,
    /// Set when an auto-enqueued item of this variant completed.
    pub auto_downloaded: bool,
}

impl Variant {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            auto_enqueued: false,
            auto_downloaded: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recording {
    pub id: RecordingId,
    pub title: String,
    /// Unix seconds when this recording was first listed.
    pub first_seen: i64,
    /// Delete upstream once all its items are downloaded and the grace period passed.
    pub marked_deleted: bool,
    pub variants: BTreeMap<Quality, Variant>,
}

impl Recording {
    pub fn has_variant(&self, quality: Quality) -> bool {
        self.variants.contains_key(&quality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quality_parse_is_case_insensitive() {
        assert_eq!("hd".parse::<Quality>().unwrap(), Quality::Hd);
        assert_eq!(" Hq ".parse::<Quality>().unwrap(), Quality::Hq);
        assert_eq!(Quality::parse_lenient("mp3"), Quality::Unknown);
        assert!("x".parse::<Quality>().is_err());
    }

    #[test]
    fn quality_serde_uses_upper_case() {
        assert_eq!(serde_json::to_string(&Quality::Nq).unwrap(), "\"NQ\"");
        let q: Quality = serde_json::from_str("\"HD\"").unwrap();
        assert_eq!(q, Quality::Hd);
    }
}
