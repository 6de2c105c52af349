use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;

use crate::config::LogConfig;
use crate::error::LogError;
use crate::record::LogRecord;

const ISO_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    #[default]
    Csv,
    JsonLines,
}

impl LogFormat {
    pub fn extension(self) -> &'static str {
        match self {
            LogFormat::Csv => "csv",
            LogFormat::JsonLines => "jsonl",
        }
    }
}

/// Destination for log rows. Single writer, append only.
pub trait RecordSink {
    fn write(&mut self, record: &LogRecord) -> Result<(), LogError>;
    fn flush(&mut self) -> Result<(), LogError>;
}

/// Header row followed by one comma-separated row per record.
pub struct CsvSink<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> CsvSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(inner),
        }
    }
}

impl<W: Write> RecordSink for CsvSink<W> {
    fn write(&mut self, record: &LogRecord) -> Result<(), LogError> {
        self.writer.serialize(record)?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// One JSON object per line.
pub struct JsonLinesSink<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> JsonLinesSink<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::new(inner),
        }
    }
}

impl<W: Write> RecordSink for JsonLinesSink<W> {
    fn write(&mut self, record: &LogRecord) -> Result<(), LogError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogError> {
        self.writer.flush()?;
        Ok(())
    }
}

/// In-memory sink; clones share the same rows.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    rows: Arc<Mutex<Vec<LogRecord>>>,
    flushes: Arc<Mutex<usize>>,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rows(&self) -> Vec<LogRecord> {
        lock(&self.rows).clone()
    }

    pub fn flush_count(&self) -> usize {
        *lock(&self.flushes)
    }
}

impl RecordSink for MemorySink {
    fn write(&mut self, record: &LogRecord) -> Result<(), LogError> {
        lock(&self.rows).push(record.clone());
        Ok(())
    }

    fn flush(&mut self) -> Result<(), LogError> {
        *lock(&self.flushes) += 1;
        Ok(())
    }
}

/// Appends rows to a sink, stamping timestamps and flushing in fixed-size batches.
pub struct EventLogger {
    sink: Box<dyn RecordSink>,
    flush_every: usize,
    pending: usize,
    written: u64,
    start_iso: String,
    path: Option<PathBuf>,
}

impl EventLogger {
    pub fn new(sink: Box<dyn RecordSink>, flush_every: usize, start: DateTime<Local>) -> Self {
        Self {
            sink,
            flush_every: flush_every.max(1),
            pending: 0,
            written: 0,
            start_iso: start.format(ISO_FORMAT).to_string(),
            path: None,
        }
    }

    /// Creates `trial_log_<YYYYmmdd_HHMMSS>.<ext>` under the configured directory.
    pub fn open(config: &LogConfig, start: DateTime<Local>) -> Result<Self, LogError> {
        fs::create_dir_all(&config.out_dir).map_err(|source| LogError::CreateDir {
            path: config.out_dir.clone(),
            source,
        })?;
        let name = format!(
            "trial_log_{}.{}",
            start.format("%Y%m%d_%H%M%S"),
            config.format.extension()
        );
        let path = config.out_dir.join(name);
        let file = open_append(&path)?;
        let sink: Box<dyn RecordSink> = match config.format {
            LogFormat::Csv => Box::new(CsvSink::new(file)),
            LogFormat::JsonLines => Box::new(JsonLinesSink::new(file)),
        };
        debug!(path = %path.display(), "opened event log");
        let mut logger = Self::new(sink, config.flush_every, start);
        logger.path = Some(path);
        Ok(logger)
    }

    pub fn append(&mut self, mut record: LogRecord) -> Result<(), LogError> {
        record.start_iso.clone_from(&self.start_iso);
        record.iso = Local::now().format(ISO_FORMAT).to_string();
        self.sink.write(&record)?;
        self.written += 1;
        self.pending += 1;
        if self.pending >= self.flush_every {
            self.flush()?;
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<(), LogError> {
        self.pending = 0;
        self.sink.flush()
    }

    pub fn start_iso(&self) -> &str {
        &self.start_iso
    }

    /// File backing the log, if it was opened from a [`LogConfig`].
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl std::fmt::Debug for EventLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventLogger")
            .field("path", &self.path)
            .field("written", &self.written)
            .finish_non_exhaustive()
    }
}

fn open_append(path: &Path) -> Result<File, LogError> {
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::Create {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progression::SlidingWindow;
    use crate::record::{EventTag, Snapshot};
    use crate::trial::{CorrectionState, TrialCounters};
    use homecage_core::{Extent, GeometryLayout, LayoutConfig, StimulusSet, TrialState};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn record(event: EventTag) -> LogRecord {
        let layout = GeometryLayout::new(LayoutConfig::default())
            .unwrap()
            .place(Extent::new(1280, 720), &mut StdRng::seed_from_u64(0));
        let snap = Snapshot {
            elapsed_ns: 0,
            state: TrialState::Show,
            layout: &layout,
            hit_margin_px: 0,
            outside_in_trial: 0,
            max_outside_before_fail: 5,
            set: &StimulusSet::placeholder(1),
            set_position: 0,
            counters: &TrialCounters::default(),
            window: &SlidingWindow::new(20),
            correction_mode: false,
            correction: &CorrectionState::default(),
            dropped_events: 0,
        };
        LogRecord::capture(event, &snap)
    }

    #[test]
    fn flushes_in_batches() {
        let sink = MemorySink::new();
        let mut logger = EventLogger::new(Box::new(sink.clone()), 3, Local::now());
        for _ in 0..7 {
            logger.append(record(EventTag::TrialPlaced)).unwrap();
        }
        assert_eq!(sink.rows().len(), 7);
        assert_eq!(sink.flush_count(), 2);
        logger.flush().unwrap();
        assert_eq!(sink.flush_count(), 3);
        assert_eq!(logger.written(), 7);
    }

    #[test]
    fn rows_carry_start_and_event_time() {
        let sink = MemorySink::new();
        let mut logger = EventLogger::new(Box::new(sink.clone()), 64, Local::now());
        logger.append(record(EventTag::SessionStart)).unwrap();
        let row = &sink.rows()[0];
        assert_eq!(row.start_iso, logger.start_iso());
        assert_eq!(row.iso.len(), "2024-01-01T00:00:00.000".len());
    }

    #[test]
    fn csv_file_has_header_and_fixed_columns() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            out_dir: dir.path().join("logs"),
            ..LogConfig::default()
        };
        let mut logger = EventLogger::open(&config, Local::now()).unwrap();
        logger.append(record(EventTag::SessionStart)).unwrap();
        logger.append(record(EventTag::TrialPlaced)).unwrap();
        logger.flush().unwrap();

        let path = logger.path().unwrap().to_path_buf();
        assert_eq!(path.extension().and_then(|e| e.to_str()), Some("csv"));
        let mut reader = csv::Reader::from_path(&path).unwrap();
        let headers = reader.headers().unwrap().clone();
        assert_eq!(&headers[0], "start_iso");
        assert_eq!(&headers[24], "event");
        assert_eq!(&headers[42], "is_correction_trial");
        assert_eq!(&headers[headers.len() - 1], "dropped_events");
        let events: Vec<String> = reader
            .records()
            .map(|r| r.unwrap()[24].to_string())
            .collect();
        assert_eq!(events, vec!["SESSION_START", "TRIAL_PLACED"]);
    }

    #[test]
    fn json_lines_sink_writes_one_object_per_row() {
        let dir = tempfile::tempdir().unwrap();
        let config = LogConfig {
            out_dir: dir.path().to_path_buf(),
            format: LogFormat::JsonLines,
            flush_every: 1,
        };
        let mut logger = EventLogger::open(&config, Local::now()).unwrap();
        logger.append(record(EventTag::SessionStart)).unwrap();
        logger.append(record(EventTag::SessionEnd)).unwrap();

        let text = fs::read_to_string(logger.path().unwrap()).unwrap();
        let lines: Vec<serde_json::Value> = text
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["event"], "SESSION_END");
        assert_eq!(lines[0]["x"], -1);
    }
}
