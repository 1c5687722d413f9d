//! Foundation types for lendlog.
//!
//! This crate provides the event, catalog, and identity types shared by the
//! ledger, the stores, and the HTTP service. Every other lendlog crate
//! depends on `lendlog-types`.
//!
//! # Key Types
//!
//! - [`LoanEvent`]: One immutable borrow/return line of the ledger
//! - [`LoanKind`]: Borrow or Return
//! - [`EventTime`]: Timestamp as written to the ledger, parsed lazily
//! - [`BookRecord`]: One row of the static catalog
//! - [`BorrowerId`]: Display name / email split of a free-text borrower

pub mod book;
pub mod borrower;
pub mod error;
pub mod event;
pub mod temporal;
pub mod title;

pub use book::BookRecord;
pub use borrower::{is_valid_email, normalize_email, BorrowerId};
pub use error::TypeError;
pub use event::{LoanEvent, LoanKind};
pub use temporal::EventTime;
pub use title::normalize_title;
