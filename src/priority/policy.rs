use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use thiserror::Error;

use crate::predict::Pass;
use crate::priority::parser::{parse_priorities, PriorityEntry, PriorityWarning};

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Priority class used as the primary sort key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, strum_macros::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Tier {
    Fallback,
    Explicit,
}

/// Two-tier score. `Greater` means preferred: any explicit entry beats any
/// fallback score, numbers only break ties inside a tier.
#[derive(Debug, Clone, Copy, Serialize)]
#[serde(tag = "tier", rename_all = "snake_case")]
pub enum Score {
    Explicit { weight: f64, rank: usize },
    Fallback { elevation: f64 },
}

impl Score {
    pub fn tier(&self) -> Tier {
        match self {
            Score::Explicit { .. } => Tier::Explicit,
            Score::Fallback { .. } => Tier::Fallback,
        }
    }

    pub fn value(&self) -> f64 {
        match self {
            Score::Explicit { weight, .. } => *weight,
            Score::Fallback { elevation } => *elevation,
        }
    }
}

impl Ord for Score {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (
                Score::Explicit { weight: a, rank: ra },
                Score::Explicit { weight: b, rank: rb },
            ) => a.total_cmp(b).then(rb.cmp(ra)),
            (Score::Explicit { .. }, Score::Fallback { .. }) => Ordering::Greater,
            (Score::Fallback { .. }, Score::Explicit { .. }) => Ordering::Less,
            (Score::Fallback { elevation: a }, Score::Fallback { elevation: b }) => a.total_cmp(b),
        }
    }
}

impl PartialOrd for Score {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Score {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Score {}

/// A pass with its score attached. The pass is moved in, so the score
/// cannot drift from the geometry it was computed for.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Candidate {
    #[serde(flatten)]
    pub pass: Pass,
    pub score: Score,
}

impl Candidate {
    pub fn weight(&self) -> f64 {
        self.score.value()
    }
}

/// Ordered priority list with culmination-altitude fallback.
#[derive(Debug, Clone, Default)]
pub struct PriorityPolicy {
    entries: Vec<PriorityEntry>,
    by_satellite: HashMap<u32, Vec<usize>>,
}

impl PriorityPolicy {
    pub fn from_entries(entries: Vec<PriorityEntry>) -> Self {
        let mut by_satellite: HashMap<u32, Vec<usize>> = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            by_satellite.entry(entry.norad_id).or_default().push(i);
        }
        Self {
            entries,
            by_satellite,
        }
    }

    pub fn parse(content: &str) -> (Self, Vec<PriorityWarning>) {
        let (entries, warnings) = parse_priorities(content);
        for warning in &warnings {
            log::warn!("Priority file {}", warning);
        }
        (Self::from_entries(entries), warnings)
    }

    /// A missing file is not fatal: every pass then falls back to its
    /// culmination altitude.
    pub fn from_file(path: &Path) -> Result<(Self, Vec<PriorityWarning>), PolicyError> {
        if !path.exists() {
            let warning = PriorityWarning {
                line: 0,
                message: format!("could not read priority file {}", path.display()),
            };
            log::warn!("{}", warning.message);
            return Ok((Self::default(), vec![warning]));
        }
        let content = std::fs::read_to_string(path)?;
        let (policy, warnings) = Self::parse(&content);
        log::info!(
            "Loaded {} priority entries from {}",
            policy.len(),
            path.display()
        );
        Ok((policy, warnings))
    }

    pub fn entries(&self) -> &[PriorityEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact `(norad_id, transmitter)` match, first in file order.
    pub fn lookup(&self, norad_id: u32, transmitter: Option<&str>) -> Option<&PriorityEntry> {
        let transmitter = transmitter?;
        self.by_satellite
            .get(&norad_id)?
            .iter()
            .map(|&i| &self.entries[i])
            .find(|e| e.transmitter == transmitter)
    }

    pub fn score(&self, pass: &Pass) -> Score {
        match self.lookup(pass.norad_id, pass.transmitter.as_deref()) {
            Some(entry) => Score::Explicit {
                weight: entry.weight,
                rank: entry.rank,
            },
            None => Score::Fallback {
                elevation: pass.max_elevation_deg,
            },
        }
    }

    pub fn assign(&self, pass: Pass) -> Candidate {
        let score = self.score(&pass);
        Candidate { pass, score }
    }
}
