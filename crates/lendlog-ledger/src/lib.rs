//! Append-only loan ledger for lendlog.
//!
//! This crate is the heart of lendlog. It provides:
//! - `LedgerWriter` / `LedgerReader` trait boundaries
//! - `InMemoryLedger` for tests and embedding, `CsvLedger` for the flat file
//! - Deterministic replay of borrow/return events into derived loan state
//! - Projection builders (catalog availability, active borrowers, borrower
//!   history, admin overdue view)
//! - A read-only auditor that reports data imperfections replay absorbs

pub mod audit;
pub mod clock;
pub mod csv_ledger;
pub mod error;
pub mod memory;
pub mod policy;
pub mod projection;
pub mod replay;
pub mod traits;

pub use audit::{AuditReport, Finding, FindingKind, LedgerAuditor};
pub use clock::{Clock, FixedClock, SystemClock};
pub use csv_ledger::{CsvLedger, LEDGER_HEADER};
pub use error::LedgerError;
pub use memory::InMemoryLedger;
pub use policy::LoanPolicy;
pub use projection::{
    AccountMatcher, ActiveBorrower, ActiveLoanView, BorrowerHistory, BorrowerMatcher,
    CatalogEntryView, CollateralLookup, NoCollateral, ProjectionBuilder,
};
pub use replay::{DerivedLoanState, LoanKey, ReplayEngine};
pub use traits::{LedgerReader, LedgerScan, LedgerWriter, SkippedRow};
