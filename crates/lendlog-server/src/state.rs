use std::sync::{Arc, RwLock};

use lendlog_crypto::CollateralSealer;
use lendlog_ledger::{Clock, CsvLedger, LedgerReader, LedgerWriter, LoanPolicy, SystemClock};
use lendlog_store::{AccountStore, CatalogSource, CollateralVault, CsvCatalog};
use lendlog_types::{
    is_valid_email, normalize_email, normalize_title, BookRecord, BorrowerId, EventTime, LoanEvent,
    LoanKind,
};
use tracing::{info, warn};

use crate::auth::AdminGate;
use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::hooks::{NoOpHook, TransactionHook, TransactionNotice, WebhookHook};

/// A ledger the service can both append to and replay.
pub trait Ledger: LedgerReader + LedgerWriter {}

impl<T: LedgerReader + LedgerWriter> Ledger for T {}

pub type SharedState = Arc<AppState>;

/// Everything a request handler needs.
pub struct AppState {
    pub ledger: Arc<dyn Ledger>,
    pub accounts: AccountStore,
    pub collateral: CollateralVault,
    pub admin: AdminGate,
    pub policy: LoanPolicy,
    pub clock: Arc<dyn Clock>,
    pub hook: Arc<dyn TransactionHook>,
    catalog_source: Arc<dyn CatalogSource>,
    catalog: RwLock<Vec<BookRecord>>,
}

impl AppState {
    /// Assemble state from explicit parts; the catalog is loaded once here.
    pub fn new(
        ledger: Arc<dyn Ledger>,
        catalog_source: Arc<dyn CatalogSource>,
        accounts: AccountStore,
        collateral: CollateralVault,
    ) -> Self {
        let catalog = catalog_source.load_or_empty();
        Self {
            ledger,
            accounts,
            collateral,
            admin: AdminGate::default(),
            policy: LoanPolicy::default(),
            clock: Arc::new(SystemClock),
            hook: Arc::new(NoOpHook),
            catalog_source,
            catalog: RwLock::new(catalog),
        }
    }

    /// Open every file-backed store named in `config`.
    pub fn from_config(config: &ServerConfig) -> ServerResult<Self> {
        let ledger = CsvLedger::open(&config.ledger_path)?;
        let accounts = AccountStore::open(&config.users_path)?;

        let sealer = if config.encryption_secret.is_empty() {
            warn!("no encryption secret configured; collateral endpoints are disabled");
            None
        } else {
            Some(
                CollateralSealer::from_secret(&config.encryption_secret)
                    .map_err(|e| ServerError::Config(e.to_string()))?,
            )
        };
        let collateral = CollateralVault::open(&config.collateral_path, sealer)?;

        let hook: Arc<dyn TransactionHook> = match &config.webhook.url {
            Some(url) => Arc::new(WebhookHook::new(url, config.webhook.timeout())?),
            None => Arc::new(NoOpHook),
        };

        let state = Self::new(
            Arc::new(ledger),
            Arc::new(CsvCatalog::new(&config.catalog_path)),
            accounts,
            collateral,
        )
        .with_admin(AdminGate::new(&config.admin_password))
        .with_policy(config.policy())
        .with_hook(hook);
        info!(books = state.catalog_len(), "service state ready");
        Ok(state)
    }

    pub fn with_admin(mut self, admin: AdminGate) -> Self {
        self.admin = admin;
        self
    }

    pub fn with_policy(mut self, policy: LoanPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_hook(mut self, hook: Arc<dyn TransactionHook>) -> Self {
        self.hook = hook;
        self
    }

    pub fn into_shared(self) -> SharedState {
        Arc::new(self)
    }

    /// Snapshot of the catalog as last loaded.
    pub fn catalog(&self) -> Vec<BookRecord> {
        match self.catalog.read() {
            Ok(books) => books.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn catalog_len(&self) -> usize {
        match self.catalog.read() {
            Ok(books) => books.len(),
            Err(poisoned) => poisoned.into_inner().len(),
        }
    }

    /// Re-read the catalog source, replacing the in-memory copy.
    pub fn reload_catalog(&self) -> usize {
        let books = self.catalog_source.load_or_empty();
        let count = books.len();
        match self.catalog.write() {
            Ok(mut current) => *current = books,
            Err(poisoned) => *poisoned.into_inner() = books,
        }
        info!(books = count, "catalog reloaded");
        count
    }

    /// Validate and append one borrow/return.
    ///
    /// A `student` that is the email of a registered account is recorded as
    /// `"Name <email>"`; anything else is recorded verbatim.
    pub fn record(&self, student: &str, book: &str, action: &str) -> ServerResult<TransactionNotice> {
        let student = student.trim();
        let book = normalize_title(book);
        if student.is_empty() || book.is_empty() {
            return Err(ServerError::BadRequest("Missing fields".into()));
        }
        let kind: LoanKind = action.parse()?;

        let email = normalize_email(student);
        let (borrower, student_name, student_email) = if is_valid_email(&email) {
            match self.accounts.get(&email)? {
                Some(account) => (
                    BorrowerId::composite(&account.name, &email)?.to_ledger_string(),
                    account.name,
                    email,
                ),
                None => (normalize_title(student), student.to_string(), email),
            }
        } else {
            (normalize_title(student), student.to_string(), String::new())
        };

        let now = self.clock.now();
        let at = EventTime::from_naive(now);
        self.ledger
            .append(&LoanEvent::new(borrower.as_str(), book.as_str(), kind, at.clone()))?;
        info!(%borrower, %book, %kind, "transaction recorded");

        Ok(TransactionNotice {
            student_name,
            student_email,
            book_title: book,
            action: kind.as_str().to_string(),
            transaction_date: at.as_str().to_string(),
            due_date: self.policy.due_date(now).format("%Y-%m-%d").to_string(),
        })
    }
}
