//! In-memory history of fetched observations.
//!
//! The store is shared between concurrent fetch tasks. Every mutation goes
//! through one mutex, so the "is this city already recorded?" check and the
//! insert are a single atomic step.

use std::{
    collections::HashMap,
    fmt,
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::{
    csv,
    model::{ExportRow, Summary, WeatherRecord},
};

#[derive(Debug, Default)]
pub struct HistoryStore {
    records: Mutex<Vec<WeatherRecord>>,
}

impl HistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `record` unless a record for the same city (ignoring case) exists.
    /// The first observation for a city wins.
    pub fn record(&self, record: WeatherRecord) {
        let mut records = self.records.lock();

        if records.iter().any(|existing| existing.same_city(&record)) {
            debug!(city = record.city(), "City already recorded, keeping first observation");
            return;
        }

        info!(city = record.city(), "Adding record");
        records.push(record);
    }

    /// Snapshot in insertion order.
    pub fn list_all(&self) -> Vec<WeatherRecord> {
        self.records.lock().clone()
    }

    pub fn export_rows(&self) -> Vec<ExportRow> {
        self.records.lock().iter().map(WeatherRecord::to_export_row).collect()
    }

    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Statistics over the current contents, or `None` when nothing has been recorded.
    pub fn summarize(&self) -> Option<Summary> {
        let records = self.records.lock();
        let first = records.first()?;

        let mut min_temp = first.temperature_c();
        let mut max_temp = first.temperature_c();
        let mut total = 0.0;
        for r in records.iter() {
            min_temp = min_temp.min(r.temperature_c());
            max_temp = max_temp.max(r.temperature_c());
            total += r.temperature_c();
        }
        let average = total / records.len() as f64;

        Some(Summary {
            count: records.len(),
            average_temp: (average * 100.0).round() / 100.0,
            min_temp,
            max_temp,
            most_frequent_condition: most_frequent(records.iter().map(WeatherRecord::condition))
                .unwrap_or_default()
                .to_string(),
        })
    }

    /// Write the header and one row per record.
    pub fn write_csv<W: Write>(&self, out: &mut W) -> std::io::Result<()> {
        csv::write_record(out, ExportRow::HEADERS)?;
        for row in self.export_rows() {
            csv::write_record(out, row.values())?;
        }
        Ok(())
    }

    /// Export the history to `path`. Returns `None` without touching the
    /// filesystem when there is nothing to export.
    pub fn export_csv(&self, path: &Path) -> Result<Option<PathBuf>> {
        if self.is_empty() {
            warn!("No weather records to export");
            return Ok(None);
        }

        let file = File::create(path)
            .with_context(|| format!("Failed to create export file: {}", path.display()))?;
        let mut out = BufWriter::new(file);

        self.write_csv(&mut out)
            .and_then(|_| out.flush())
            .with_context(|| format!("Failed to write export file: {}", path.display()))?;

        let path = std::path::absolute(path).unwrap_or_else(|_| path.to_path_buf());
        info!(path = %path.display(), "Weather history exported");
        Ok(Some(path))
    }
}

impl fmt::Display for HistoryStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let records = self.records.lock();
        if records.is_empty() {
            return f.write_str("No weather records yet.");
        }

        const RULE: &str = "-----------------------------------------";
        writeln!(f, "{RULE}")?;
        for r in records.iter() {
            writeln!(
                f,
                "{}: {}°C, {}%, {}",
                r.city(),
                r.temperature_c(),
                r.humidity_pct(),
                r.condition()
            )?;
        }
        f.write_str(RULE)
    }
}

/// Mode of `values`; on a tie the value that reached the top count first wins.
fn most_frequent<'a>(values: impl Iterator<Item = &'a str>) -> Option<&'a str> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut best: Option<(&str, usize)> = None;

    for value in values {
        let count = counts.entry(value).or_default();
        *count += 1;
        if best.is_none_or(|(_, top)| *count > top) {
            best = Some((value, *count));
        }
    }

    best.map(|(value, _)| value)
}
