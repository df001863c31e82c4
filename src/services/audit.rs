//! The two append-only audit streams.
//!
//! - Scan log: `<timestamp> [MOVE|SKIP] <path> <reason>` for every evaluated
//!   file, plus run header/footer notes.
//! - Move log: `<timestamp> <source> -> <destination>` for every successful
//!   real move.
//!
//! Paths and reasons are written through [`escape_field`]: `%`, `>`, CR and LF
//! become `%25`, `%3E`, `%0D` and `%0A`. Every record stays on one line,
//! `" -> "` only ever appears as the move-log separator, and
//! [`parse_move_line`] recovers the exact source and destination.
//!
//! Each stream is a single owned writer behind a mutex. A record is formatted
//! in full and written with one `write_all`, so concurrent root workers can
//! never interleave partial lines. Files are opened in append mode and never
//! truncated, so history accumulates across runs.

use crate::services::quarantine::QuarantineRecord;
use crate::services::retention::Verdict;
use camino::{Utf8Path, Utf8PathBuf};
use chrono::Local;
use std::borrow::Cow;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;
use thiserror::Error;

pub const SCAN_LOG_NAME: &str = "scan.log";
pub const MOVE_LOG_NAME: &str = "move.log";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
/// Width of a [`TIMESTAMP_FORMAT`] timestamp.
const TIMESTAMP_LEN: usize = 19;
const MOVE_SEPARATOR: &str = " -> ";

#[derive(Error, Debug)]
pub enum AuditError {
    #[error("Failed to open audit log {path}: {source}")]
    Open {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to write audit log {path}: {source}")]
    Write {
        path: Utf8PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Audit log {0} is poisoned by a panicked writer")]
    Poisoned(Utf8PathBuf),
}

/// One append-only line stream.
#[derive(Debug)]
pub struct AuditStream {
    path: Utf8PathBuf,
    file: Mutex<File>,
}

impl AuditStream {
    /// Open `path` for appending, creating it and its directory if needed.
    pub fn open(path: impl Into<Utf8PathBuf>) -> Result<Self, AuditError> {
        let path = path.into();
        let open_error = |source| AuditError::Open {
            path: path.clone(),
            source,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(open_error)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(open_error)?;

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Append one line. `line` must not contain a newline; one is added.
    pub fn append(&self, line: &str) -> Result<(), AuditError> {
        let mut record = String::with_capacity(line.len() + 1);
        record.push_str(line);
        record.push('\n');

        let mut file = self
            .file
            .lock()
            .map_err(|_| AuditError::Poisoned(self.path.clone()))?;
        file.write_all(record.as_bytes())
            .map_err(|source| AuditError::Write {
                path: self.path.clone(),
                source,
            })
    }

    /// Flush and sync to disk.
    pub fn flush(&self) -> Result<(), AuditError> {
        let mut file = self
            .file
            .lock()
            .map_err(|_| AuditError::Poisoned(self.path.clone()))?;
        file.flush()
            .and_then(|_| file.sync_all())
            .map_err(|source| AuditError::Write {
                path: self.path.clone(),
                source,
            })
    }
}

/// Scan log and move log for one run.
#[derive(Debug)]
pub struct AuditLogger {
    scan: AuditStream,
    moves: AuditStream,
}

impl AuditLogger {
    /// Open (or create) both logs inside `log_dir`.
    pub fn open(log_dir: &Utf8Path) -> Result<Self, AuditError> {
        Ok(Self {
            scan: AuditStream::open(log_dir.join(SCAN_LOG_NAME))?,
            moves: AuditStream::open(log_dir.join(MOVE_LOG_NAME))?,
        })
    }

    pub fn scan_log_path(&self) -> &Utf8Path {
        self.scan.path()
    }

    pub fn move_log_path(&self) -> &Utf8Path {
        self.moves.path()
    }

    /// Record the disposition of one evaluated entry.
    pub fn record_scan(
        &self,
        verdict: Verdict,
        path: &Utf8Path,
        reason: &str,
    ) -> Result<(), AuditError> {
        self.scan.append(&format!(
            "{} {} {} {}",
            timestamp(),
            verdict.tag(),
            escape_field(path.as_str()),
            escape_field(reason)
        ))
    }

    /// Record a successful real move. Failed and dry-run records are ignored.
    pub fn record_move(&self, record: &QuarantineRecord) -> Result<(), AuditError> {
        if !record.is_success() || record.dry_run {
            return Ok(());
        }
        self.moves.append(&format!(
            "{} {}{}{}",
            record.timestamp.format(TIMESTAMP_FORMAT),
            escape_field(record.source.as_str()),
            MOVE_SEPARATOR,
            escape_field(record.destination.as_str())
        ))
    }

    /// Free-form line in the scan log (run header, footer, disk usage).
    pub fn note(&self, message: &str) -> Result<(), AuditError> {
        self.scan
            .append(&format!("{} {}", timestamp(), escape_field(message)))
    }

    /// Durably flush both streams.
    pub fn flush(&self) -> Result<(), AuditError> {
        self.scan.flush()?;
        self.moves.flush()
    }
}

fn timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}

/// Escape one log field. Reversed by [`unescape_field`].
pub fn escape_field(text: &str) -> Cow<'_, str> {
    if !text.contains(['%', '>', '\n', '\r']) {
        return Cow::Borrowed(text);
    }
    let mut escaped = String::with_capacity(text.len() + 8);
    for c in text.chars() {
        match c {
            '%' => escaped.push_str("%25"),
            '>' => escaped.push_str("%3E"),
            '\n' => escaped.push_str("%0A"),
            '\r' => escaped.push_str("%0D"),
            c => escaped.push(c),
        }
    }
    Cow::Owned(escaped)
}

/// Undo [`escape_field`]. Unknown `%` sequences are kept literally.
pub fn unescape_field(text: &str) -> Cow<'_, str> {
    if !text.contains('%') {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('%') {
        out.push_str(&rest[..pos]);
        let decoded = match rest.get(pos + 1..pos + 3) {
            Some("25") => Some('%'),
            Some("3E") => Some('>'),
            Some("0A") => Some('\n'),
            Some("0D") => Some('\r'),
            _ => None,
        };
        match decoded {
            Some(c) => {
                out.push(c);
                rest = &rest[pos + 3..];
            }
            None => {
                out.push('%');
                rest = &rest[pos + 1..];
            }
        }
    }
    out.push_str(rest);
    Cow::Owned(out)
}

/// Source and destination of one move-log line.
pub fn parse_move_line(line: &str) -> Option<(Utf8PathBuf, Utf8PathBuf)> {
    let body = line.get(TIMESTAMP_LEN + 1..)?;
    let (source, destination) = body.split_once(MOVE_SEPARATOR)?;
    Some((
        Utf8PathBuf::from(unescape_field(source).into_owned()),
        Utf8PathBuf::from(unescape_field(destination).into_owned()),
    ))
}
