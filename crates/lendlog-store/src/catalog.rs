use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, StringRecord, Trim};
use lendlog_types::{normalize_title, BookRecord};
use tracing::{error, info, warn};

use crate::error::StoreResult;

/// Somewhere the static catalog can be (re)loaded from.
pub trait CatalogSource: Send + Sync {
    fn load(&self) -> StoreResult<Vec<BookRecord>>;

    /// Load, logging and swallowing any failure as an empty catalog.
    fn load_or_empty(&self) -> Vec<BookRecord> {
        match self.load() {
            Ok(books) => books,
            Err(e) => {
                error!(error = %e, "catalog unavailable; serving an empty catalog");
                Vec::new()
            }
        }
    }
}

impl CatalogSource for Vec<BookRecord> {
    fn load(&self) -> StoreResult<Vec<BookRecord>> {
        Ok(self.clone())
    }
}

/// Catalog exported from a spreadsheet.
///
/// Columns are positional: `id, name, category, shelf, copies`. The first
/// row is a header and is skipped. Rows with an empty id are ignored, and
/// unreadable rows are skipped with a warning.
#[derive(Clone, Debug)]
pub struct CsvCatalog {
    path: PathBuf,
}

impl CsvCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn parse_row(record: &StringRecord) -> Option<BookRecord> {
        let cell = |i: usize| record.get(i).map(str::trim).filter(|s| !s.is_empty());

        let id = cell(0)?;
        let name = cell(1).map(normalize_title);
        Some(BookRecord::new(
            id,
            name.filter(|n| !n.is_empty())
                .unwrap_or_else(|| BookRecord::DEFAULT_NAME.to_string()),
            cell(2).unwrap_or(BookRecord::DEFAULT_CATEGORY),
            cell(3).unwrap_or(BookRecord::DEFAULT_SHELF),
            BookRecord::parse_copies(record.get(4).unwrap_or_default()),
        ))
    }
}

impl CatalogSource for CsvCatalog {
    fn load(&self) -> StoreResult<Vec<BookRecord>> {
        let mut reader = match ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .trim(Trim::All)
            .from_path(&self.path)
        {
            Ok(reader) => reader,
            Err(e) if matches!(e.kind(), csv::ErrorKind::Io(err) if err.kind() == io::ErrorKind::NotFound) => {
                error!(path = %self.path.display(), "catalog file not found");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e.into()),
        };

        let mut books = Vec::new();
        for result in reader.records() {
            match result {
                Ok(record) => books.extend(Self::parse_row(&record)),
                Err(e) => {
                    let line = e.position().map(|p| p.line()).unwrap_or(0);
                    warn!(path = %self.path.display(), line, error = %e, "skipping catalog row");
                    if matches!(e.kind(), csv::ErrorKind::Io(_)) {
                        break;
                    }
                }
            }
        }
        info!(path = %self.path.display(), books = books.len(), "catalog loaded");
        Ok(books)
    }
}
