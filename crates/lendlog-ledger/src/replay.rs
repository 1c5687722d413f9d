use std::collections::{BTreeMap, BTreeSet};

use lendlog_types::{EventTime, LoanEvent, LoanKind};
use tracing::debug;

use crate::error::LedgerError;
use crate::traits::LedgerReader;

/// `(borrower, book)` pair identifying one borrower's holding of a title.
pub type LoanKey = (String, String);

/// Current loan state reconstructed from the full ledger.
///
/// Never persisted: it is recomputed on every query, so the ledger stays
/// the only source of truth.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DerivedLoanState {
    /// Open loans per title across all borrowers. Can be negative when the
    /// ledger holds returns without matching borrows.
    pub active_loan_count_by_book: BTreeMap<String, i64>,
    /// Titles each borrower currently holds (pair balance > 0).
    pub active_books_by_borrower: BTreeMap<String, BTreeSet<String>>,
    /// Timestamp of the latest borrow behind each still-open pair.
    pub open_loan_timestamp_by_borrower_book: BTreeMap<LoanKey, EventTime>,
    /// Borrow minus return count per pair, including non-positive balances.
    pub balance_by_borrower_book: BTreeMap<LoanKey, i64>,
    pub applied_events: u64,
    pub skipped_events: u64,
}

impl DerivedLoanState {
    /// Open loans recorded for `book`, zero when the title never appears.
    pub fn active_loans(&self, book: &str) -> i64 {
        self.active_loan_count_by_book.get(book).copied().unwrap_or(0)
    }

    /// Copies left on the shelf, clamped to `0..=total`.
    pub fn available(&self, book: &str, total: u32) -> u32 {
        let loans = self.active_loans(book).max(0);
        (i64::from(total) - loans).max(0) as u32
    }

    /// Whether `borrower` currently holds `book`.
    pub fn is_active(&self, borrower: &str, book: &str) -> bool {
        self.active_books_by_borrower
            .get(borrower)
            .is_some_and(|books| books.contains(book))
    }

    /// Borrow minus return count for a pair.
    pub fn balance(&self, borrower: &str, book: &str) -> i64 {
        self.balance_by_borrower_book
            .get(&(borrower.to_string(), book.to_string()))
            .copied()
            .unwrap_or(0)
    }

    /// Open pairs with the timestamp of the borrow that opened them.
    pub fn open_loans(&self) -> impl Iterator<Item = (&str, &str, &EventTime)> {
        self.open_loan_timestamp_by_borrower_book
            .iter()
            .map(|((borrower, book), at)| (borrower.as_str(), book.as_str(), at))
    }
}

/// Deterministic replay of a loan ledger.
pub struct ReplayEngine;

impl ReplayEngine {
    /// Fold events, oldest first, into derived state in a single pass.
    ///
    /// Events with an empty borrower or book are skipped and counted. A
    /// return without a prior borrow drives the counts negative; consumers
    /// clamp.
    pub fn replay(events: &[LoanEvent]) -> DerivedLoanState {
        let mut state = DerivedLoanState::default();
        let mut opened_at: BTreeMap<LoanKey, EventTime> = BTreeMap::new();

        for event in events {
            if !event.is_well_formed() {
                state.skipped_events += 1;
                debug!(borrower = %event.borrower, book = %event.book, "skipping malformed event");
                continue;
            }

            let key = (event.borrower.clone(), event.book.clone());
            *state
                .active_loan_count_by_book
                .entry(event.book.clone())
                .or_insert(0) += event.kind.delta();
            let balance = state.balance_by_borrower_book.entry(key.clone()).or_insert(0);
            *balance += event.kind.delta();

            match event.kind {
                LoanKind::Borrow => {
                    opened_at.insert(key, event.timestamp.clone());
                }
                LoanKind::Return => {
                    if *balance <= 0 {
                        opened_at.remove(&key);
                    }
                }
            }
            state.applied_events += 1;
        }

        for (key, at) in opened_at {
            if state.balance_by_borrower_book.get(&key).copied().unwrap_or(0) <= 0 {
                continue;
            }
            state
                .active_books_by_borrower
                .entry(key.0.clone())
                .or_default()
                .insert(key.1.clone());
            state.open_loan_timestamp_by_borrower_book.insert(key, at);
        }

        state
    }

    /// Read the whole ledger and replay it.
    pub fn replay_from<R: LedgerReader + ?Sized>(
        reader: &R,
    ) -> Result<DerivedLoanState, LedgerError> {
        let events = reader.read_all()?;
        Ok(Self::replay(&events))
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::memory::InMemoryLedger;
    use crate::traits::LedgerWriter;

    fn borrow(who: &str, book: &str, at: &str) -> LoanEvent {
        LoanEvent::borrow(who, book, at)
    }

    fn ret(who: &str, book: &str, at: &str) -> LoanEvent {
        LoanEvent::returned(who, book, at)
    }

    #[test]
    fn empty_ledger_yields_empty_state() {
        let state = ReplayEngine::replay(&[]);
        assert_eq!(state, DerivedLoanState::default());
    }

    #[test]
    fn two_borrowers_one_title() {
        let state = ReplayEngine::replay(&[
            borrow("Alice", "Dune", "2025-01-01 10:00:00"),
            borrow("Bob", "Dune", "2025-01-01 11:00:00"),
        ]);
        assert_eq!(state.active_loans("Dune"), 2);
        assert_eq!(state.available("Dune", 1), 0);
        assert!(state.is_active("Alice", "Dune"));
        assert!(state.is_active("Bob", "Dune"));
    }

    #[test]
    fn borrow_then_return_closes_loan() {
        let state = ReplayEngine::replay(&[
            borrow("Alice", "Dune", "2025-01-01 10:00:00"),
            ret("Alice", "Dune", "2025-01-03 10:00:00"),
        ]);
        assert!(!state.active_books_by_borrower.contains_key("Alice"));
        assert!(state.open_loan_timestamp_by_borrower_book.is_empty());
        assert_eq!(state.available("Dune", 3), 3);
    }

    #[test]
    fn bare_return_goes_negative_and_is_clamped() {
        let state = ReplayEngine::replay(&[ret("Carol", "Foo", "2025-01-01 10:00:00")]);
        assert_eq!(state.active_loans("Foo"), -1);
        assert_eq!(state.available("Foo", 2), 2);
        assert!(!state.active_books_by_borrower.contains_key("Carol"));
        assert_eq!(state.balance("Carol", "Foo"), -1);
    }

    #[test]
    fn double_borrow_survives_single_return() {
        let state = ReplayEngine::replay(&[
            borrow("Eve", "Emma", "2025-01-01 10:00:00"),
            borrow("Eve", "Emma", "2025-01-02 10:00:00"),
            ret("Eve", "Emma", "2025-01-03 10:00:00"),
        ]);
        assert_eq!(state.active_loans("Emma"), 1);
        assert!(state.is_active("Eve", "Emma"));
        let key = ("Eve".to_string(), "Emma".to_string());
        assert_eq!(
            state.open_loan_timestamp_by_borrower_book[&key].as_str(),
            "2025-01-02 10:00:00"
        );
    }

    #[test]
    fn bare_return_then_borrow_stays_inactive() {
        let state = ReplayEngine::replay(&[
            ret("Carol", "Foo", "2025-01-01 10:00:00"),
            borrow("Carol", "Foo", "2025-01-02 10:00:00"),
        ]);
        assert_eq!(state.balance("Carol", "Foo"), 0);
        assert!(!state.is_active("Carol", "Foo"));
        assert!(state.open_loan_timestamp_by_borrower_book.is_empty());
    }

    #[test]
    fn reborrow_after_return_uses_new_timestamp() {
        let state = ReplayEngine::replay(&[
            borrow("Alice", "Dune", "2025-01-01 10:00:00"),
            ret("Alice", "Dune", "2025-01-02 10:00:00"),
            borrow("Alice", "Dune", "2025-02-01 10:00:00"),
        ]);
        let opened: Vec<_> = state.open_loans().collect();
        assert_eq!(opened.len(), 1);
        assert_eq!(opened[0].2.as_str(), "2025-02-01 10:00:00");
    }

    #[test]
    fn malformed_events_are_skipped() {
        let state = ReplayEngine::replay(&[
            borrow("", "Dune", "2025-01-01 10:00:00"),
            borrow("Alice", "  ", "2025-01-01 10:00:00"),
            borrow("Alice", "Dune", "not a date"),
        ]);
        assert_eq!(state.skipped_events, 2);
        assert_eq!(state.applied_events, 1);
        assert_eq!(state.active_loans("Dune"), 1);
    }

    #[test]
    fn replay_from_reader() {
        let ledger = InMemoryLedger::new();
        ledger.append(&borrow("Alice", "Dune", "2025-01-01 10:00:00")).unwrap();
        let state = ReplayEngine::replay_from(&ledger).unwrap();
        assert_eq!(state.applied_events, 1);
        assert!(state.is_active("Alice", "Dune"));
    }

    fn arb_event() -> impl Strategy<Value = LoanEvent> {
        (
            prop::sample::select(vec!["Alice", "Bob", "Carol"]),
            prop::sample::select(vec!["Dune", "Emma", "Foo"]),
            any::<bool>(),
            0u32..28,
        )
            .prop_map(|(who, book, is_borrow, day)| {
                let at = format!("2025-02-{:02} 10:00:00", day + 1);
                if is_borrow {
                    LoanEvent::borrow(who, book, at.as_str())
                } else {
                    LoanEvent::returned(who, book, at.as_str())
                }
            })
    }

    proptest! {
        #[test]
        fn replay_is_idempotent(events in prop::collection::vec(arb_event(), 0..60)) {
            prop_assert_eq!(ReplayEngine::replay(&events), ReplayEngine::replay(&events));
        }

        #[test]
        fn membership_matches_positive_balance(events in prop::collection::vec(arb_event(), 0..60)) {
            let state = ReplayEngine::replay(&events);
            for who in ["Alice", "Bob", "Carol"] {
                for book in ["Dune", "Emma", "Foo"] {
                    let balance: i64 = events
                        .iter()
                        .filter(|e| e.borrower == who && e.book == book)
                        .map(|e| e.kind.delta())
                        .sum();
                    prop_assert_eq!(state.is_active(who, book), balance > 0);
                    prop_assert_eq!(
                        state.open_loan_timestamp_by_borrower_book
                            .contains_key(&(who.to_string(), book.to_string())),
                        balance > 0
                    );
                }
            }
        }

        #[test]
        fn availability_is_clamped(
            events in prop::collection::vec(arb_event(), 0..60),
            total in 0u32..5,
        ) {
            let state = ReplayEngine::replay(&events);
            for book in ["Dune", "Emma", "Foo", "Unknown"] {
                let available = state.available(book, total);
                prop_assert!(available <= total);
            }
        }
    }
}
