use std::sync::RwLock;

use lendlog_types::LoanEvent;

use crate::error::LedgerError;
use crate::traits::{LedgerReader, LedgerWriter};

/// In-memory ledger for tests, local demos, and embedding.
#[derive(Default)]
pub struct InMemoryLedger {
    events: RwLock<Vec<LoanEvent>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ledger with existing events in append order.
    pub fn with_events(events: impl IntoIterator<Item = LoanEvent>) -> Self {
        Self {
            events: RwLock::new(events.into_iter().collect()),
        }
    }
}

impl LedgerWriter for InMemoryLedger {
    fn append(&self, event: &LoanEvent) -> Result<(), LedgerError> {
        if !event.is_well_formed() {
            return Err(LedgerError::MalformedEvent(
                "borrower and book must be non-empty".into(),
            ));
        }
        self.events
            .write()
            .map_err(|_| LedgerError::LockPoisoned)?
            .push(event.clone());
        Ok(())
    }
}

impl LedgerReader for InMemoryLedger {
    fn read_all(&self) -> Result<Vec<LoanEvent>, LedgerError> {
        Ok(self
            .events
            .read()
            .map_err(|_| LedgerError::LockPoisoned)?
            .clone())
    }

    fn event_count(&self) -> Result<u64, LedgerError> {
        Ok(self.events.read().map_err(|_| LedgerError::LockPoisoned)?.len() as u64)
    }
}
