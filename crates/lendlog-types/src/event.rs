use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::temporal::EventTime;

/// Direction of a ledger event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoanKind {
    Borrow,
    Return,
}

impl LoanKind {
    /// The label written to the ledger's action column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Borrow => "Borrow",
            Self::Return => "Return",
        }
    }

    /// Contribution of this event to an open-loan balance.
    pub fn delta(&self) -> i64 {
        match self {
            Self::Borrow => 1,
            Self::Return => -1,
        }
    }
}

impl fmt::Display for LoanKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LoanKind {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("borrow") {
            Ok(Self::Borrow)
        } else if trimmed.eq_ignore_ascii_case("return") {
            Ok(Self::Return)
        } else {
            Err(TypeError::UnknownAction(trimmed.to_string()))
        }
    }
}

/// One line of the ledger.
///
/// Created once when a transaction is recorded and never edited. The ledger
/// is the sequence of these in append order, which is also replay order.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LoanEvent {
    /// Free-text borrower: a name, `"Name <email>"`, or a bare email.
    pub borrower: String,
    /// Book title, joined against the catalog by exact match.
    pub book: String,
    pub kind: LoanKind,
    pub timestamp: EventTime,
}

impl LoanEvent {
    pub fn new(
        borrower: impl Into<String>,
        book: impl Into<String>,
        kind: LoanKind,
        timestamp: impl Into<EventTime>,
    ) -> Self {
        Self {
            borrower: borrower.into(),
            book: book.into(),
            kind,
            timestamp: timestamp.into(),
        }
    }

    pub fn borrow(
        borrower: impl Into<String>,
        book: impl Into<String>,
        timestamp: impl Into<EventTime>,
    ) -> Self {
        Self::new(borrower, book, LoanKind::Borrow, timestamp)
    }

    pub fn returned(
        borrower: impl Into<String>,
        book: impl Into<String>,
        timestamp: impl Into<EventTime>,
    ) -> Self {
        Self::new(borrower, book, LoanKind::Return, timestamp)
    }

    /// An event with an empty borrower or book cannot be attributed to a loan.
    pub fn is_well_formed(&self) -> bool {
        !self.borrower.trim().is_empty() && !self.book.trim().is_empty()
    }
}
