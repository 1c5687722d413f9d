use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use csv::{QuoteStyle, ReaderBuilder, StringRecord, Terminator, WriterBuilder};
use lendlog_types::{normalize_title, EventTime, LoanEvent, LoanKind};
use tracing::{debug, info, warn};

use crate::error::LedgerError;
use crate::traits::{LedgerReader, LedgerScan, LedgerWriter, SkippedRow};

/// Header row written to a fresh ledger file.
pub const LEDGER_HEADER: &str = "Student,Book,Action,Date";

/// Leading characters a spreadsheet would evaluate as a formula.
const FORMULA_TRIGGERS: [char; 4] = ['=', '+', '-', '@'];

/// Append-only CSV ledger.
///
/// On-disk format, one event per row after the header:
/// ```text
/// Student,Book,Action,Date
/// "Alice <alice@example.org>","Dune","Borrow","2025-03-01 09:15:00"
/// ```
///
/// Cells that a spreadsheet would evaluate as formulas, or that already
/// start with `'`, are stored with one extra leading `'`, which is removed
/// again on read, so in-memory values are the raw text. Appends terminate
/// a last row left without a newline. Rows with fewer than four cells or an unknown action are
/// skipped on read and reported through [`LedgerReader::scan`].
pub struct CsvLedger {
    path: PathBuf,
    append_lock: Mutex<()>,
}

impl CsvLedger {
    /// Open (or create) the ledger file at `path`.
    ///
    /// A missing or zero-length file gets the header row.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let needs_header = match fs::metadata(&path) {
            Ok(meta) => meta.len() == 0,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                    fs::create_dir_all(parent).map_err(|e| LedgerError::io(parent, e))?;
                }
                true
            }
            Err(e) => return Err(LedgerError::io(&path, e)),
        };
        if needs_header {
            fs::write(&path, format!("{LEDGER_HEADER}\n")).map_err(|e| LedgerError::io(&path, e))?;
            info!(path = %path.display(), "wrote ledger header");
        }
        Ok(Self {
            path,
            append_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn encode_row(event: &LoanEvent) -> Result<Vec<u8>, LedgerError> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .quote_style(QuoteStyle::Always)
            .terminator(Terminator::Any(b'\n'))
            .from_writer(Vec::new());
        writer.write_record([
            guard_formula(&event.borrower),
            guard_formula(&event.book),
            event.kind.as_str().to_string(),
            guard_formula(event.timestamp.as_str()),
        ])?;
        writer
            .into_inner()
            .map_err(|e| LedgerError::MalformedEvent(e.to_string()))
    }

    fn decode_row(record: &StringRecord) -> Result<LoanEvent, String> {
        if record.len() < 4 {
            return Err(format!("expected 4 fields, found {}", record.len()));
        }
        let cell = |i: usize| unguard_formula(record.get(i).unwrap_or_default());

        let kind = cell(2)
            .parse::<LoanKind>()
            .map_err(|e| e.to_string())?;
        let event = LoanEvent::new(
            normalize_title(&cell(0)),
            normalize_title(&cell(1)),
            kind,
            EventTime::new(cell(3)),
        );
        if !event.is_well_formed() {
            return Err("empty borrower or book".into());
        }
        Ok(event)
    }
}

impl LedgerWriter for CsvLedger {
    fn append(&self, event: &LoanEvent) -> Result<(), LedgerError> {
        if !event.is_well_formed() {
            return Err(LedgerError::MalformedEvent(
                "borrower and book must be non-empty".into(),
            ));
        }
        let row = Self::encode_row(event)?;

        let _guard = self.append_lock.lock().map_err(|_| LedgerError::LockPoisoned)?;
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| LedgerError::io(&self.path, e))?;

        let mut buf = Vec::with_capacity(LEDGER_HEADER.len() + row.len() + 2);
        match last_byte(&mut file).map_err(|e| LedgerError::io(&self.path, e))? {
            None => {
                buf.extend_from_slice(LEDGER_HEADER.as_bytes());
                buf.push(b'\n');
            }
            Some(b'\n') => {}
            Some(_) => {
                warn!(path = %self.path.display(), "ledger did not end with a newline; terminating last row");
                buf.push(b'\n');
            }
        }
        buf.extend_from_slice(&row);
        file.write_all(&buf).map_err(|e| LedgerError::io(&self.path, e))?;

        debug!(
            borrower = %event.borrower,
            book = %event.book,
            kind = %event.kind,
            "ledger append"
        );
        Ok(())
    }
}

impl LedgerReader for CsvLedger {
    fn read_all(&self) -> Result<Vec<LoanEvent>, LedgerError> {
        Ok(self.scan()?.events)
    }

    fn scan(&self) -> Result<LedgerScan, LedgerError> {
        let mut reader = match ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_path(&self.path)
        {
            Ok(reader) => reader,
            Err(e) if is_not_found(&e) => return Ok(LedgerScan::default()),
            Err(e) => return Err(e.into()),
        };

        let mut scan = LedgerScan::default();
        for result in reader.records() {
            match result {
                Ok(record) => {
                    let line = record.position().map(|p| p.line()).unwrap_or(0);
                    match Self::decode_row(&record) {
                        Ok(event) => scan.events.push(event),
                        Err(reason) => {
                            warn!(line, %reason, "skipping ledger row");
                            scan.skipped.push(SkippedRow { line, reason });
                        }
                    }
                }
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    warn!(line, error = %e, "unreadable ledger row");
                    scan.skipped.push(SkippedRow {
                        line,
                        reason: e.to_string(),
                    });
                    if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                        break;
                    }
                }
            }
        }

        debug!(
            events = scan.events.len(),
            skipped = scan.skipped.len(),
            "ledger scan complete"
        );
        Ok(scan)
    }
}

fn is_not_found(err: &csv::Error) -> bool {
    matches!(err.kind(), csv::ErrorKind::Io(io) if io.kind() == io::ErrorKind::NotFound)
}

/// `None` for an empty file.
fn last_byte(file: &mut File) -> io::Result<Option<u8>> {
    if file.metadata()?.len() == 0 {
        return Ok(None);
    }
    file.seek(SeekFrom::End(-1))?;
    let mut last = [0u8; 1];
    file.read_exact(&mut last)?;
    Ok(Some(last[0]))
}

fn needs_guard(cell: &str) -> bool {
    cell.starts_with(FORMULA_TRIGGERS) || cell.starts_with('\'')
}

fn guard_formula(cell: &str) -> String {
    if needs_guard(cell) {
        format!("'{cell}")
    } else {
        cell.to_string()
    }
}

fn unguard_formula(cell: &str) -> String {
    match cell.strip_prefix('\'') {
        Some(rest) if needs_guard(rest) => rest.to_string(),
        _ => cell.to_string(),
    }
}
