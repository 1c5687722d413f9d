use serde::{Deserialize, Serialize};

/// One row of the static catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookRecord {
    /// Opaque external identifier; uniqueness is not enforced.
    pub id: String,
    /// Title; the join key against [`LoanEvent::book`](crate::LoanEvent).
    pub name: String,
    pub category: String,
    pub shelf: String,
    pub total_copies: u32,
}

impl BookRecord {
    pub const DEFAULT_NAME: &'static str = "Unknown";
    pub const DEFAULT_CATEGORY: &'static str = "Uncategorized";
    pub const DEFAULT_SHELF: &'static str = "?";

    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        category: impl Into<String>,
        shelf: impl Into<String>,
        total_copies: u32,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: category.into(),
            shelf: shelf.into(),
            total_copies,
        }
    }

    /// Interpret a spreadsheet "copies" cell.
    ///
    /// Empty or non-numeric cells (including negatives) mean one copy. An
    /// explicit `0` is honoured.
    pub fn parse_copies(raw: &str) -> u32 {
        raw.trim().parse::<u32>().unwrap_or(1)
    }
}
