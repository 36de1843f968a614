use serde::Serialize;
use thiserror::Error;

/// One `norad_id weight transmitter` line of a priority file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PriorityEntry {
    pub norad_id: u32,
    pub weight: f64,
    pub transmitter: String,
    /// Position among accepted entries; lower is preferred on weight ties.
    pub rank: usize,
}

#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("line {line}: {message}")]
pub struct PriorityWarning {
    pub line: usize,
    pub message: String,
}

impl PriorityWarning {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Parses priority file content. Comments start with `#`; malformed lines
/// are skipped and reported instead of failing the whole file.
pub fn parse_priorities(content: &str) -> (Vec<PriorityEntry>, Vec<PriorityWarning>) {
    let mut entries: Vec<PriorityEntry> = Vec::new();
    let mut warnings = Vec::new();

    for (i, raw) in content.lines().enumerate() {
        let lineno = i + 1;
        let line = raw.split('#').next().unwrap_or_default().trim();
        if line.is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() != 3 {
            warnings.push(PriorityWarning::new(
                lineno,
                format!("expected 3 fields but found {}", fields.len()),
            ));
            continue;
        }

        let Ok(norad_id) = fields[0].parse::<u32>() else {
            warnings.push(PriorityWarning::new(
                lineno,
                format!("invalid satellite id '{}'", fields[0]),
            ));
            continue;
        };

        let weight = match fields[1].parse::<f64>() {
            Ok(w) if w.is_finite() => w,
            _ => {
                warnings.push(PriorityWarning::new(
                    lineno,
                    format!("invalid weight '{}'", fields[1]),
                ));
                continue;
            }
        };

        let transmitter = fields[2].to_string();
        if entries
            .iter()
            .any(|e| e.norad_id == norad_id && e.transmitter == transmitter)
        {
            warnings.push(PriorityWarning::new(
                lineno,
                format!(
                    "duplicate entry for {} {} is shadowed by an earlier line",
                    norad_id, transmitter
                ),
            ));
        }

        entries.push(PriorityEntry {
            norad_id,
            weight,
            transmitter,
            rank: entries.len(),
        });
    }

    (entries, warnings)
}
