use std::collections::{BTreeMap, BTreeSet, HashSet};

use chrono::NaiveDateTime;
use lendlog_types::{normalize_email, BookRecord, BorrowerId, EventTime, LoanEvent};
use serde::Serialize;

use crate::policy::LoanPolicy;
use crate::replay::{DerivedLoanState, ReplayEngine};

/// A catalog row joined with current availability.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CatalogEntryView {
    pub id: String,
    pub name: String,
    pub category: String,
    pub shelf: String,
    pub total: u32,
    pub available: u32,
}

/// A borrower holding at least one title.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveBorrower {
    pub borrower: String,
    pub books: BTreeSet<String>,
}

/// One borrower's events, newest first, and what they still hold.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BorrowerHistory {
    pub history: Vec<LoanEvent>,
    pub active: BTreeSet<String>,
}

/// An open loan as shown on the admin desk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ActiveLoanView {
    /// Display name recovered from the ledger borrower string.
    pub borrower: String,
    pub email: Option<String>,
    pub book: String,
    pub borrowed_at: EventTime,
    pub days_held: i64,
    pub days_left: i64,
    pub is_overdue: bool,
    pub has_collateral: bool,
}

/// Decides which ledger borrower strings belong to one person.
pub trait BorrowerMatcher {
    fn matches(&self, borrower: &str) -> bool;
}

impl<F> BorrowerMatcher for F
where
    F: Fn(&str) -> bool,
{
    fn matches(&self, borrower: &str) -> bool {
        self(borrower)
    }
}

/// Case-insensitive containment of an account's email or name.
///
/// Ledger rows written before accounts existed carry only a display name,
/// later ones carry `"Name <email>"`; either form matches.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AccountMatcher {
    email: String,
    name: String,
}

impl AccountMatcher {
    pub fn new(email: &str, name: Option<&str>) -> Self {
        Self {
            email: normalize_email(email),
            name: name.map(|n| n.trim().to_lowercase()).unwrap_or_default(),
        }
    }
}

impl BorrowerMatcher for AccountMatcher {
    fn matches(&self, borrower: &str) -> bool {
        let haystack = borrower.to_lowercase();
        (!self.email.is_empty() && haystack.contains(&self.email))
            || (!self.name.is_empty() && haystack.contains(&self.name))
    }
}

/// Answers whether collateral is on file for an email.
pub trait CollateralLookup {
    fn has_collateral(&self, email: &str) -> bool;
}

/// Lookup for deployments that do not hold collateral.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCollateral;

impl CollateralLookup for NoCollateral {
    fn has_collateral(&self, _email: &str) -> bool {
        false
    }
}

impl CollateralLookup for BTreeSet<String> {
    fn has_collateral(&self, email: &str) -> bool {
        self.contains(email)
    }
}

impl CollateralLookup for HashSet<String> {
    fn has_collateral(&self, email: &str) -> bool {
        self.contains(email)
    }
}

/// Deterministic projection builders over a replayed ledger.
pub struct ProjectionBuilder;

impl ProjectionBuilder {
    /// Join the catalog with derived loan counts, preserving catalog order.
    pub fn catalog_view(catalog: &[BookRecord], state: &DerivedLoanState) -> Vec<CatalogEntryView> {
        catalog
            .iter()
            .map(|book| CatalogEntryView {
                id: book.id.clone(),
                name: book.name.clone(),
                category: book.category.clone(),
                shelf: book.shelf.clone(),
                total: book.total_copies,
                available: state.available(&book.name, book.total_copies),
            })
            .collect()
    }

    /// Replay `ledger` and join it with `catalog`.
    pub fn compute_catalog_view(catalog: &[BookRecord], ledger: &[LoanEvent]) -> Vec<CatalogEntryView> {
        Self::catalog_view(catalog, &ReplayEngine::replay(ledger))
    }

    pub fn active_borrowers(state: &DerivedLoanState) -> Vec<ActiveBorrower> {
        state
            .active_books_by_borrower
            .iter()
            .map(|(borrower, books)| ActiveBorrower {
                borrower: borrower.clone(),
                books: books.clone(),
            })
            .collect()
    }

    pub fn compute_active_borrowers(ledger: &[LoanEvent]) -> Vec<ActiveBorrower> {
        Self::active_borrowers(&ReplayEngine::replay(ledger))
    }

    /// Events matching `matcher`, newest first, plus titles still held.
    ///
    /// Balances are summed per title over every matching borrower string,
    /// so a person recorded under both a plain name and a composite is
    /// treated as one holder.
    pub fn compute_borrower_history<M: BorrowerMatcher + ?Sized>(
        ledger: &[LoanEvent],
        matcher: &M,
    ) -> BorrowerHistory {
        let mut balances: BTreeMap<&str, i64> = BTreeMap::new();
        let mut history = Vec::new();

        for event in ledger.iter().filter(|e| matcher.matches(&e.borrower)) {
            *balances.entry(event.book.as_str()).or_insert(0) += event.kind.delta();
            history.push(event.clone());
        }
        history.reverse();

        BorrowerHistory {
            history,
            active: balances
                .into_iter()
                .filter(|(_, balance)| *balance > 0)
                .map(|(book, _)| book.to_string())
                .collect(),
        }
    }

    /// Open loans with overdue status as of `now`.
    ///
    /// Timestamps that cannot be parsed are treated as "now", so such loans
    /// show zero days held rather than disappearing.
    pub fn admin_active_loans<C: CollateralLookup + ?Sized>(
        state: &DerivedLoanState,
        collateral: &C,
        policy: &LoanPolicy,
        now: NaiveDateTime,
    ) -> Vec<ActiveLoanView> {
        state
            .open_loans()
            .map(|(borrower, book, opened)| {
                let id = BorrowerId::parse(borrower);
                let days_held = LoanPolicy::days_held(opened.parse_or(now), now);
                let days_left = policy.days_left(days_held);
                let has_collateral = id
                    .email
                    .as_deref()
                    .is_some_and(|email| collateral.has_collateral(email));
                ActiveLoanView {
                    borrower: id.name,
                    email: id.email,
                    book: book.to_string(),
                    borrowed_at: opened.clone(),
                    days_held,
                    days_left,
                    is_overdue: days_left < 0,
                    has_collateral,
                }
            })
            .collect()
    }

    pub fn compute_admin_active_loans<C: CollateralLookup + ?Sized>(
        ledger: &[LoanEvent],
        collateral: &C,
        policy: &LoanPolicy,
        now: NaiveDateTime,
    ) -> Vec<ActiveLoanView> {
        Self::admin_active_loans(&ReplayEngine::replay(ledger), collateral, policy, now)
    }

    /// The whole ledger, newest first.
    pub fn full_history(ledger: &[LoanEvent]) -> Vec<LoanEvent> {
        ledger.iter().rev().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate};
    use proptest::prelude::*;

    use super::*;

    fn now() -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 3, 21)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn book(name: &str, copies: u32) -> BookRecord {
        BookRecord::new(format!("id-{name}"), name, "Fiction", "A1", copies)
    }

    #[test]
    fn scenario_overbooked_title_shows_zero() {
        let ledger = vec![
            LoanEvent::borrow("Alice", "Dune", "2025-03-01 10:00:00"),
            LoanEvent::borrow("Bob", "Dune", "2025-03-02 10:00:00"),
        ];
        let view = ProjectionBuilder::compute_catalog_view(&[book("Dune", 1)], &ledger);
        assert_eq!(view[0].available, 0);
        assert_eq!(view[0].total, 1);
    }

    #[test]
    fn scenario_returned_title_fully_available() {
        let ledger = vec![
            LoanEvent::borrow("Alice", "Dune", "2025-03-01 10:00:00"),
            LoanEvent::returned("Alice", "Dune", "2025-03-02 10:00:00"),
        ];
        let view = ProjectionBuilder::compute_catalog_view(&[book("Dune", 2)], &ledger);
        assert_eq!(view[0].available, 2);
        assert!(ProjectionBuilder::compute_active_borrowers(&ledger).is_empty());
    }

    #[test]
    fn scenario_bare_return_does_not_inflate_availability() {
        let ledger = vec![LoanEvent::returned("Carol", "Foo", "2025-03-01 10:00:00")];
        let view = ProjectionBuilder::compute_catalog_view(&[book("Foo", 3)], &ledger);
        assert_eq!(view[0].available, 3);
        assert!(ProjectionBuilder::compute_active_borrowers(&ledger).is_empty());
    }

    #[test]
    fn catalog_order_is_preserved_and_unknown_books_ignored() {
        let ledger = vec![
            LoanEvent::borrow("Alice", "Zebra", "2025-03-01 10:00:00"),
            LoanEvent::borrow("Alice", "Not In Catalog", "2025-03-01 10:00:00"),
        ];
        let catalog = [book("Zebra", 2), book("Apple", 1)];
        let view = ProjectionBuilder::compute_catalog_view(&catalog, &ledger);
        let names: Vec<_> = view.iter().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["Zebra", "Apple"]);
        assert_eq!(view[0].available, 1);
        assert_eq!(view[1].available, 1);
    }

    #[test]
    fn active_borrowers_group_titles() {
        let ledger = vec![
            LoanEvent::borrow("Alice", "Dune", "2025-03-01 10:00:00"),
            LoanEvent::borrow("Alice", "Emma", "2025-03-01 10:00:00"),
            LoanEvent::borrow("Bob", "Dune", "2025-03-01 10:00:00"),
            LoanEvent::returned("Bob", "Dune", "2025-03-02 10:00:00"),
        ];
        let active = ProjectionBuilder::compute_active_borrowers(&ledger);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].borrower, "Alice");
        assert_eq!(
            active[0].books,
            BTreeSet::from(["Dune".to_string(), "Emma".to_string()])
        );
    }

    #[test]
    fn history_matches_email_and_name_case_insensitively() {
        let ledger = vec![
            LoanEvent::borrow("Alice Smith", "Dune", "2025-03-01 10:00:00"),
            LoanEvent::borrow("Bob", "Dune", "2025-03-01 11:00:00"),
            LoanEvent::borrow("Alice Smith <ALICE@x.org>", "Emma", "2025-03-02 10:00:00"),
            LoanEvent::returned("alice smith", "Dune", "2025-03-03 10:00:00"),
        ];
        let matcher = AccountMatcher::new("alice@x.org", Some("Alice Smith"));
        let result = ProjectionBuilder::compute_borrower_history(&ledger, &matcher);

        let stamps: Vec<_> = result.history.iter().map(|e| e.timestamp.as_str()).collect();
        assert_eq!(
            stamps,
            vec!["2025-03-03 10:00:00", "2025-03-02 10:00:00", "2025-03-01 10:00:00"]
        );
        assert_eq!(result.active, BTreeSet::from(["Emma".to_string()]));
    }

    #[test]
    fn history_accepts_closure_matcher() {
        let ledger = vec![
            LoanEvent::borrow("alice@x.org", "Dune", "2025-03-01 10:00:00"),
            LoanEvent::borrow("bob@x.org", "Dune", "2025-03-01 10:00:00"),
        ];
        let exact = |b: &str| b == "bob@x.org";
        let result = ProjectionBuilder::compute_borrower_history(&ledger, &exact);
        assert_eq!(result.history.len(), 1);
        assert_eq!(result.history[0].borrower, "bob@x.org");
    }

    #[test]
    fn empty_matcher_matches_nothing() {
        let ledger = vec![LoanEvent::borrow("Alice", "Dune", "2025-03-01 10:00:00")];
        let matcher = AccountMatcher::new("", None);
        let result = ProjectionBuilder::compute_borrower_history(&ledger, &matcher);
        assert_eq!(result, BorrowerHistory::default());
    }

    #[test]
    fn scenario_overdue_after_twenty_days() {
        let borrowed = now() - Duration::days(20);
        let ledger = vec![LoanEvent::borrow("Dana <dana@x.org>", "Dune", borrowed)];
        let loans = ProjectionBuilder::compute_admin_active_loans(
            &ledger,
            &NoCollateral,
            &LoanPolicy::new(14),
            now(),
        );
        assert_eq!(loans.len(), 1);
        let loan = &loans[0];
        assert_eq!(loan.borrower, "Dana");
        assert_eq!(loan.email.as_deref(), Some("dana@x.org"));
        assert_eq!(loan.days_held, 20);
        assert_eq!(loan.days_left, -6);
        assert!(loan.is_overdue);
        assert!(!loan.has_collateral);
    }

    #[test]
    fn loan_due_today_is_not_overdue() {
        let borrowed = now() - Duration::days(14);
        let ledger = vec![LoanEvent::borrow("Dana", "Dune", borrowed)];
        let loans = ProjectionBuilder::compute_admin_active_loans(
            &ledger,
            &NoCollateral,
            &LoanPolicy::default(),
            now(),
        );
        assert_eq!(loans[0].days_left, 0);
        assert!(!loans[0].is_overdue);
        assert_eq!(loans[0].email, None);
    }

    #[test]
    fn unparseable_timestamp_counts_as_now() {
        let ledger = vec![LoanEvent::borrow("Dana", "Dune", "sometime")];
        let loans = ProjectionBuilder::compute_admin_active_loans(
            &ledger,
            &NoCollateral,
            &LoanPolicy::default(),
            now(),
        );
        assert_eq!(loans[0].days_held, 0);
        assert_eq!(loans[0].days_left, 14);
        assert_eq!(loans[0].borrowed_at.as_str(), "sometime");
    }

    #[test]
    fn collateral_flag_uses_parsed_email() {
        let ledger = vec![
            LoanEvent::borrow("Dana <Dana@X.org>", "Dune", "2025-03-20 12:00:00"),
            LoanEvent::borrow("Eli <eli@x.org>", "Dune", "2025-03-20 12:00:00"),
            LoanEvent::borrow("Fay", "Dune", "2025-03-20 12:00:00"),
        ];
        let on_file = BTreeSet::from(["dana@x.org".to_string()]);
        let loans = ProjectionBuilder::compute_admin_active_loans(
            &ledger,
            &on_file,
            &LoanPolicy::default(),
            now(),
        );
        let flags: BTreeMap<_, _> = loans
            .iter()
            .map(|l| (l.borrower.as_str(), l.has_collateral))
            .collect();
        assert!(flags["Dana"]);
        assert!(!flags["Eli"]);
        assert!(!flags["Fay"]);
    }

    #[test]
    fn full_history_is_reversed() {
        let ledger = vec![
            LoanEvent::borrow("A", "X", "1"),
            LoanEvent::borrow("B", "X", "2"),
            LoanEvent::returned("A", "X", "3"),
        ];
        let stamps: Vec<_> = ProjectionBuilder::full_history(&ledger)
            .into_iter()
            .map(|e| e.timestamp.to_string())
            .collect();
        assert_eq!(stamps, vec!["3", "2", "1"]);
    }

    proptest! {
        #[test]
        fn history_is_strict_reverse_of_matching_events(
            picks in prop::collection::vec((0usize..3, any::<bool>()), 0..40)
        ) {
            let names = ["alice", "bob", "alice <alice@x.org>"];
            let ledger: Vec<LoanEvent> = picks
                .iter()
                .enumerate()
                .map(|(i, (who, is_borrow))| {
                    let at = format!("{i:04}");
                    if *is_borrow {
                        LoanEvent::borrow(names[*who], "Dune", at.as_str())
                    } else {
                        LoanEvent::returned(names[*who], "Dune", at.as_str())
                    }
                })
                .collect();
            let matcher = AccountMatcher::new("alice@x.org", Some("alice"));
            let result = ProjectionBuilder::compute_borrower_history(&ledger, &matcher);

            let mut expected: Vec<LoanEvent> = ledger
                .iter()
                .filter(|e| e.borrower.contains("alice"))
                .cloned()
                .collect();
            expected.reverse();
            prop_assert_eq!(result.history, expected);
        }

        #[test]
        fn catalog_availability_never_negative_or_above_total(
            picks in prop::collection::vec((0usize..2, any::<bool>()), 0..40),
            total in 0u32..4,
        ) {
            let ledger: Vec<LoanEvent> = picks
                .iter()
                .map(|(who, is_borrow)| {
                    let who = ["Alice", "Bob"][*who];
                    if *is_borrow {
                        LoanEvent::borrow(who, "Dune", "2025-01-01")
                    } else {
                        LoanEvent::returned(who, "Dune", "2025-01-01")
                    }
                })
                .collect();
            let view = ProjectionBuilder::compute_catalog_view(&[book("Dune", total)], &ledger);
            prop_assert!(view[0].available <= view[0].total);
        }
    }
}
