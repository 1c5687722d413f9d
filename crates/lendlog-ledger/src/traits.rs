use lendlog_types::LoanEvent;

use crate::error::LedgerError;

/// Write boundary for ledger appends.
///
/// The core only decides *what* event to append; implementations decide how.
pub trait LedgerWriter: Send + Sync {
    fn append(&self, event: &LoanEvent) -> Result<(), LedgerError>;
}

/// Read boundary for replay and history queries.
pub trait LedgerReader: Send + Sync {
    /// Every usable event, oldest first.
    fn read_all(&self) -> Result<Vec<LoanEvent>, LedgerError>;

    /// Events plus the rows that had to be dropped while reading.
    ///
    /// Backends without a lossy decoding step report no skipped rows.
    fn scan(&self) -> Result<LedgerScan, LedgerError> {
        Ok(LedgerScan {
            events: self.read_all()?,
            skipped: Vec::new(),
        })
    }

    fn event_count(&self) -> Result<u64, LedgerError> {
        Ok(self.read_all()?.len() as u64)
    }
}

/// Result of reading a ledger, including rows that could not be decoded.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LedgerScan {
    pub events: Vec<LoanEvent>,
    pub skipped: Vec<SkippedRow>,
}

/// A stored row that was dropped on read.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SkippedRow {
    /// 1-based line number in the backing file.
    pub line: u64,
    pub reason: String,
}
