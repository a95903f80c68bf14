//! Frame cache files.
//!
//! One entry per line, whitespace separated:
//!
//! ```text
//! H H1_R 1000000000 64 file://localhost/data/H-H1_R-1000000000-64.csv
//! ```
//!
//! Blank lines and lines starting with `#` are ignored. The location may be a plain
//! path or a `file://` URL with an optional `localhost` host.

use crate::error::{AppResult, ProfileError};
use std::path::{Path, PathBuf};

/// One frame file and the GPS span it covers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    /// Observatory tag
    pub observatory: String,
    /// Frame type description
    pub description: String,
    /// First GPS second covered
    pub start: i64,
    /// Seconds covered
    pub duration: i64,
    /// Frame file location
    pub path: PathBuf,
}

impl CacheEntry {
    /// Exclusive end of the covered span.
    pub fn end(&self) -> i64 {
        self.start.saturating_add(self.duration)
    }

    /// True if the entry covers any part of `[start, end)`.
    pub fn overlaps(&self, start: i64, end: i64) -> bool {
        self.start < end && start < self.end()
    }
}

/// Parsed frame cache, sorted by start time.
#[derive(Debug, Clone, Default)]
pub struct FrameCache {
    entries: Vec<CacheEntry>,
}

impl FrameCache {
    /// Read and parse a cache file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text, path)
    }

    /// Parse cache text. `origin` is only used in error messages.
    pub fn parse(text: &str, origin: &Path) -> AppResult<Self> {
        let mut entries = Vec::new();
        for (idx, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            entries.push(parse_entry(line).map_err(|message| ProfileError::Cache {
                path: origin.to_path_buf(),
                line: idx + 1,
                message,
            })?);
        }
        entries.sort_by_key(|e| e.start);
        Ok(Self { entries })
    }

    /// All entries, in start order.
    pub fn entries(&self) -> &[CacheEntry] {
        &self.entries
    }

    /// Entries overlapping `[start, end)`, failing if any part of the span is uncovered.
    pub fn covering(&self, start: i64, end: i64) -> AppResult<Vec<&CacheEntry>> {
        let selected: Vec<&CacheEntry> = self
            .entries
            .iter()
            .filter(|e| e.overlaps(start, end))
            .collect();

        let mut covered_to = start;
        for entry in &selected {
            if entry.start > covered_to {
                return Err(ProfileError::MissingData {
                    start: covered_to,
                    end: entry.start.min(end),
                });
            }
            covered_to = covered_to.max(entry.end());
        }
        if covered_to < end {
            return Err(ProfileError::MissingData {
                start: covered_to,
                end,
            });
        }
        Ok(selected)
    }
}

fn parse_entry(line: &str) -> Result<CacheEntry, String> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    let [observatory, description, start, duration, location] = fields[..] else {
        return Err(format!("expected 5 fields, found {}", fields.len()));
    };
    let start: i64 = start
        .parse()
        .map_err(|_| format!("invalid GPS start '{start}'"))?;
    let duration: i64 = duration
        .parse()
        .map_err(|_| format!("invalid duration '{duration}'"))?;
    if duration <= 0 {
        return Err(format!("duration must be positive, got {duration}"));
    }
    if start.checked_add(duration).is_none() {
        return Err(format!("span {start} + {duration} overflows GPS time"));
    }
    Ok(CacheEntry {
        observatory: observatory.to_string(),
        description: description.to_string(),
        start,
        duration,
        path: location_to_path(location),
    })
}

fn location_to_path(location: &str) -> PathBuf {
    let stripped = location
        .strip_prefix("file://localhost")
        .or_else(|| location.strip_prefix("file://"))
        .unwrap_or(location);
    PathBuf::from(stripped)
}
