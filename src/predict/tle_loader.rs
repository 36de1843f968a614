use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};

use crate::predict::error::{PredictError, PropagationError};
use crate::predict::propagation::Orbit;
use crate::predict::types::Satellite;

pub struct TleEntry {
    pub name: String,
    pub norad_id: u32,
    pub tle_source: String,
    pub orbit: Arc<Orbit>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Transmitter {
    pub id: String,
    pub mode: Option<String>,
    /// Share of successful observations, 0.0 - 1.0.
    pub success_rate: f64,
}

/// Orbital elements loaded from a directory of TLE files, owned by the
/// caller and reloaded only when older than `max_age`.
pub struct TleLoader {
    tle_dir: PathBuf,
    max_age: Duration,
    loaded_at: Option<DateTime<Utc>>,
    satellites: BTreeMap<u32, TleEntry>,
    transmitters: HashMap<u32, Vec<Transmitter>>,
    failures: Vec<PropagationError>,
}

impl TleLoader {
    pub fn new(tle_dir: PathBuf, max_age: Duration) -> Self {
        Self {
            tle_dir,
            max_age,
            loaded_at: None,
            satellites: BTreeMap::new(),
            transmitters: HashMap::new(),
            failures: Vec::new(),
        }
    }

    /// Load all TLE files from the directory
    pub fn load_all(&mut self) -> Result<(), PredictError> {
        if !self.tle_dir.exists() {
            return Err(PredictError::DirectoryNotFound(
                self.tle_dir.display().to_string(),
            ));
        }

        self.satellites.clear();
        self.failures.clear();

        let mut paths = Vec::new();
        for entry in fs::read_dir(&self.tle_dir)? {
            let path = entry?.path();
            let is_tle = path
                .extension()
                .map(|ext| ext == "tle" || ext == "txt")
                .unwrap_or(false);
            if path.is_file() && is_tle {
                paths.push(path);
            }
        }
        // Later files win on duplicate NORAD ids; keep that order stable.
        paths.sort();

        for path in paths {
            match parse_tle_file(&path) {
                Ok((entries, failures)) => {
                    self.failures.extend(failures);
                    for tle_entry in entries {
                        if let Some(previous) =
                            self.satellites.insert(tle_entry.norad_id, tle_entry)
                        {
                            log::debug!(
                                "Elements for {} from {} superseded by {}",
                                previous.norad_id,
                                previous.tle_source,
                                path.display()
                            );
                        }
                    }
                }
                Err(e) => {
                    log::warn!("Failed to parse TLE file {}: {}", path.display(), e);
                }
            }
        }

        self.loaded_at = Some(Utc::now());
        log::info!(
            "Loaded {} satellites from {}",
            self.satellites.len(),
            self.tle_dir.display()
        );
        Ok(())
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        match self.loaded_at {
            Some(loaded_at) => now - loaded_at > self.max_age,
            None => true,
        }
    }

    /// Reloads when the cached elements are older than `max_age`. Returns
    /// whether a reload happened.
    pub fn refresh_if_stale(&mut self, now: DateTime<Utc>) -> Result<bool, PredictError> {
        if !self.is_stale(now) {
            return Ok(false);
        }
        self.load_all()?;
        Ok(true)
    }

    /// Reads `norad_id uuid success_rate good_count data_count mode` lines
    /// and keeps transmitters whose success rate reaches `min_success_rate`.
    /// Malformed lines are skipped with a warning.
    pub fn load_transmitters(
        &mut self,
        path: &Path,
        min_success_rate: f64,
    ) -> Result<(), PredictError> {
        let content = fs::read_to_string(path)?;
        let mut transmitters = parse_transmitters(&content);
        let mut dropped = 0;
        for list in transmitters.values_mut() {
            let before = list.len();
            list.retain(|t| t.success_rate >= min_success_rate);
            dropped += before - list.len();
        }
        transmitters.retain(|_, list| !list.is_empty());
        if dropped > 0 {
            log::info!(
                "Skipped {} transmitters below success rate {:.2}",
                dropped,
                min_success_rate
            );
        }
        self.transmitters = transmitters;
        Ok(())
    }

    /// Element sets that were skipped during the last load.
    pub fn failures(&self) -> &[PropagationError] {
        &self.failures
    }

    /// Expands the loaded TLEs into schedulable satellites: one per
    /// transmitter listed for the object, or one untagged satellite when
    /// none is listed.
    pub fn satellites(&self) -> Vec<Satellite<Arc<Orbit>>> {
        let mut result = Vec::new();
        for entry in self.satellites.values() {
            match self.transmitters.get(&entry.norad_id) {
                Some(transmitters) if !transmitters.is_empty() => {
                    for transmitter in transmitters {
                        result.push(Satellite {
                            norad_id: entry.norad_id,
                            name: entry.name.clone(),
                            transmitter: Some(transmitter.id.clone()),
                            mode: transmitter.mode.clone(),
                            elements: entry.orbit.clone(),
                        });
                    }
                }
                _ => result.push(Satellite {
                    norad_id: entry.norad_id,
                    name: entry.name.clone(),
                    transmitter: None,
                    mode: None,
                    elements: entry.orbit.clone(),
                }),
            }
        }
        result
    }
}

type Parsed = (Vec<TleEntry>, Vec<PropagationError>);

/// Parse a single TLE file (may contain multiple satellites)
fn parse_tle_file(path: &Path) -> Result<Parsed, PredictError> {
    let content = fs::read_to_string(path)?;
    let filename = path
        .file_name()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();
    Ok(parse_tle_content(&content, &filename))
}

/// Bad element sets are reported per satellite; the rest of the file loads.
fn parse_tle_content(content: &str, filename: &str) -> Parsed {
    let mut results = Vec::new();
    let mut failures = Vec::new();

    for (name, line1, line2) in parse_multi_tle(content) {
        let orbit = match Orbit::from_tle(name.clone(), &line1, &line2) {
            Ok(orbit) => orbit,
            Err(e) => {
                let norad_id = line1
                    .get(2..7)
                    .and_then(|id| id.trim().parse().ok())
                    .unwrap_or(0);
                let failure = PropagationError {
                    norad_id,
                    satellite: name
                        .clone()
                        .unwrap_or_else(|| format!("NORAD {}", norad_id)),
                    message: format!("invalid elements in {}: {}", filename, e),
                };
                log::warn!("{}", failure);
                failures.push(failure);
                continue;
            }
        };
        let norad_id = orbit.elements.norad_id as u32;
        let sat_name = name
            .map(|n| n.trim_start_matches("0 ").to_string())
            .unwrap_or_else(|| format!("NORAD {}", norad_id));

        results.push(TleEntry {
            name: sat_name,
            norad_id,
            tle_source: filename.to_string(),
            orbit: Arc::new(orbit),
        });
    }

    (results, failures)
}

/// Parse multi-satellite TLE content
fn parse_multi_tle(content: &str) -> Vec<(Option<String>, String, String)> {
    let lines: Vec<&str> = content
        .lines()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .collect();

    let mut result = Vec::new();
    let mut i = 0;

    while i < lines.len() {
        if lines[i].starts_with("1 ") && i + 1 < lines.len() && lines[i + 1].starts_with("2 ") {
            // 2-line TLE (no name)
            result.push((None, lines[i].to_string(), lines[i + 1].to_string()));
            i += 2;
        } else if i + 2 < lines.len()
            && lines[i + 1].starts_with("1 ")
            && lines[i + 2].starts_with("2 ")
        {
            // 3-line TLE (with name)
            result.push((
                Some(lines[i].to_string()),
                lines[i + 1].to_string(),
                lines[i + 2].to_string(),
            ));
            i += 3;
        } else {
            i += 1; // Skip unknown line
        }
    }

    result
}

fn parse_transmitters(content: &str) -> HashMap<u32, Vec<Transmitter>> {
    let mut transmitters: HashMap<u32, Vec<Transmitter>> = HashMap::new();

    for (lineno, raw) in content.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split_whitespace().collect();
        let parsed = match fields.as_slice() {
            [norad_id, id, success_rate, good_count, data_count, mode] => {
                let counts_ok =
                    good_count.parse::<u32>().is_ok() && data_count.parse::<u32>().is_ok();
                match (norad_id.parse::<u32>(), success_rate.parse::<f64>()) {
                    (Ok(norad_id), Ok(rate)) if counts_ok && rate.is_finite() => Some((
                        norad_id,
                        Transmitter {
                            id: id.to_string(),
                            mode: Some(mode.to_string()),
                            success_rate: rate / 100.0,
                        },
                    )),
                    _ => None,
                }
            }
            _ => None,
        };
        match parsed {
            Some((norad_id, transmitter)) => {
                transmitters.entry(norad_id).or_default().push(transmitter)
            }
            None => log::warn!("Malformed transmitter line {}: {}", lineno + 1, raw),
        }
    }

    transmitters
}
