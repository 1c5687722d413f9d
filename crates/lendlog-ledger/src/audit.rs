use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use lendlog_types::{BookRecord, LoanEvent, LoanKind};
use serde::Serialize;

use crate::traits::LedgerScan;

/// Result of auditing a ledger against the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AuditReport {
    pub event_count: u64,
    pub skipped_rows: u64,
    pub findings: Vec<Finding>,
}

impl AuditReport {
    /// Returns `true` if nothing was flagged.
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.skipped_rows == 0
    }

    pub fn count(&self, kind: FindingKind) -> usize {
        self.findings.iter().filter(|f| f.kind == kind).count()
    }
}

/// One data imperfection. Replay absorbs all of these; the audit only
/// makes them visible.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Finding {
    /// 1-based position of the event in the ledger (0 for catalog findings).
    pub position: u64,
    pub kind: FindingKind,
    pub description: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum FindingKind {
    /// A row dropped while reading the ledger file.
    UnreadableRow,
    /// Empty borrower or book.
    MalformedEvent,
    /// Timestamp that cannot be interpreted.
    UnparseableTimestamp,
    /// A return with no open borrow for the same pair.
    BareReturn,
    /// A borrow for a pair that is already open.
    DuplicateBorrow,
    /// An event for a title absent from the catalog.
    UnknownBook,
    /// Two catalog rows sharing a title, which the join cannot tell apart.
    DuplicateCatalogName,
}

impl fmt::Display for FindingKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::UnreadableRow => "unreadable-row",
            Self::MalformedEvent => "malformed-event",
            Self::UnparseableTimestamp => "unparseable-timestamp",
            Self::BareReturn => "bare-return",
            Self::DuplicateBorrow => "duplicate-borrow",
            Self::UnknownBook => "unknown-book",
            Self::DuplicateCatalogName => "duplicate-catalog-name",
        };
        f.write_str(label)
    }
}

/// Read-only ledger diagnostics.
pub struct LedgerAuditor;

impl LedgerAuditor {
    pub fn audit(scan: &LedgerScan, catalog: &[BookRecord]) -> AuditReport {
        let mut findings = Vec::new();

        let mut seen_names: HashMap<&str, &str> = HashMap::new();
        for book in catalog {
            if let Some(first_id) = seen_names.insert(book.name.as_str(), book.id.as_str()) {
                findings.push(Finding {
                    position: 0,
                    kind: FindingKind::DuplicateCatalogName,
                    description: format!(
                        "catalog ids {first_id:?} and {:?} share the title {:?}",
                        book.id, book.name
                    ),
                });
            }
        }

        for row in &scan.skipped {
            findings.push(Finding {
                position: 0,
                kind: FindingKind::UnreadableRow,
                description: format!("line {}: {}", row.line, row.reason),
            });
        }

        let titles: HashSet<&str> = catalog.iter().map(|b| b.name.as_str()).collect();
        let mut reported_unknown: HashSet<&str> = HashSet::new();
        let mut balances: BTreeMap<(&str, &str), i64> = BTreeMap::new();

        for (index, event) in scan.events.iter().enumerate() {
            let position = index as u64 + 1;
            if !event.is_well_formed() {
                findings.push(finding(position, FindingKind::MalformedEvent, event, "empty borrower or book"));
                continue;
            }
            if event.timestamp.parse().is_none() {
                findings.push(finding(
                    position,
                    FindingKind::UnparseableTimestamp,
                    event,
                    &format!("timestamp {:?}", event.timestamp.as_str()),
                ));
            }
            if !titles.contains(event.book.as_str()) && reported_unknown.insert(event.book.as_str()) {
                findings.push(finding(position, FindingKind::UnknownBook, event, "title not in catalog"));
            }

            let balance = balances
                .entry((event.borrower.as_str(), event.book.as_str()))
                .or_insert(0);
            match event.kind {
                LoanKind::Borrow if *balance > 0 => {
                    findings.push(finding(position, FindingKind::DuplicateBorrow, event, "pair already open"));
                }
                LoanKind::Return if *balance <= 0 => {
                    findings.push(finding(position, FindingKind::BareReturn, event, "no open borrow"));
                }
                _ => {}
            }
            *balance += event.kind.delta();
        }

        AuditReport {
            event_count: scan.events.len() as u64,
            skipped_rows: scan.skipped.len() as u64,
            findings,
        }
    }
}

fn finding(position: u64, kind: FindingKind, event: &LoanEvent, detail: &str) -> Finding {
    Finding {
        position,
        kind,
        description: format!("{} / {:?}: {detail}", event.borrower, event.book),
    }
}
