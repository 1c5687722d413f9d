//! File-backed stores for lendlog.
//!
//! Everything here sits beside the ledger rather than inside it: the
//! catalog is a static CSV maintained by hand, accounts and collateral are
//! small JSON maps rewritten atomically on every change.

pub mod accounts;
pub mod catalog;
pub mod collateral;
pub mod error;
pub mod json_file;

pub use accounts::{Account, AccountStatus, AccountStore};
pub use catalog::{CatalogSource, CsvCatalog};
pub use collateral::{CollateralRecord, CollateralVault, RevealedCollateral};
pub use error::{StoreError, StoreResult};
