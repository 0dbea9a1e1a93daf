//! Which quality variants are enqueued automatically.
//!
//! A level is a list of rules evaluated against the variants a recording
//! actually has. `Or` picks the first listed quality that is present; `And`
//! picks every listed quality that is present.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::queue::{Quality, Recording};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutodownloadLevel {
    #[default]
    None,
    HdOrHqAndNq,
    HdOrHq,
    Hq,
    HqAndNq,
    Nq,
}

#[derive(Debug, Clone, Copy)]
enum Rule {
    Or(&'static [Quality]),
    And(&'static [Quality]),
}

impl AutodownloadLevel {
    pub const ALL: [AutodownloadLevel; 6] = [
        AutodownloadLevel::None,
        AutodownloadLevel::HdOrHqAndNq,
        AutodownloadLevel::HdOrHq,
        AutodownloadLevel::Hq,
        AutodownloadLevel::HqAndNq,
        AutodownloadLevel::Nq,
    ];

    fn rules(self) -> &'static [Rule] {
        use Quality::*;
        match self {
            AutodownloadLevel::None => &[],
            AutodownloadLevel::HdOrHqAndNq => &[Rule::Or(&[Hd, Hq]), Rule::And(&[Nq])],
            AutodownloadLevel::HdOrHq => &[Rule::Or(&[Hd, Hq])],
            AutodownloadLevel::Hq => &[Rule::And(&[Hq])],
            AutodownloadLevel::HqAndNq => &[Rule::And(&[Hq, Nq])],
            AutodownloadLevel::Nq => &[Rule::And(&[Nq])],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AutodownloadLevel::None => "none",
            AutodownloadLevel::HdOrHqAndNq => "hd_or_hq_and_nq",
            AutodownloadLevel::HdOrHq => "hd_or_hq",
            AutodownloadLevel::Hq => "hq",
            AutodownloadLevel::HqAndNq => "hq_and_nq",
            AutodownloadLevel::Nq => "nq",
        }
    }

    /// Qualities of `recording` this level wants, in rule order, without duplicates.
    pub fn select(self, recording: &Recording) -> Vec<Quality> {
        let mut out: Vec<Quality> = Vec::new();
        for rule in self.rules() {
            match rule {
                Rule::Or(qs) => {
                    if let Some(q) = qs.iter().find(|q| recording.has_variant(**q)) {
                        if !out.contains(q) {
                            out.push(*q);
                        }
                    }
                }
                Rule::And(qs) => {
                    for q in qs.iter().filter(|q| recording.has_variant(**q)) {
                        if !out.contains(q) {
                            out.push(*q);
                        }
                    }
                }
            }
        }
        out
    }
}

impl fmt::Display for AutodownloadLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AutodownloadLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        AutodownloadLevel::ALL
            .into_iter()
            .find(|l| l.as_str() == s)
            .ok_or_else(|| format!("unknown autodownload level: {}", s))
    }
}
