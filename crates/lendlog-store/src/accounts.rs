use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lendlog_crypto::{hash_password, verify_password};
use lendlog_types::{is_valid_email, normalize_email};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::json_file;

/// A registered borrower.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Argon2id PHC string.
    pub hash: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub student_id: String,
}

/// On-disk shape. Early registries stored the bare hash as the value.
#[derive(Deserialize)]
#[serde(untagged)]
enum StoredAccount {
    Full(Account),
    LegacyHash(String),
}

impl From<StoredAccount> for Account {
    fn from(stored: StoredAccount) -> Self {
        match stored {
            StoredAccount::Full(account) => account,
            StoredAccount::LegacyHash(hash) => Account {
                hash,
                name: "Unknown".to_string(),
                student_id: String::new(),
            },
        }
    }
}

/// Whether an email already has an account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum AccountStatus {
    Exists { name: String },
    New,
}

/// Registry of borrower accounts, keyed by lower-cased email, kept in a
/// single JSON file.
pub struct AccountStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl AccountStore {
    /// Open the registry at `path`, creating an empty one if needed.
    pub fn open(path: impl Into<PathBuf>) -> StoreResult<Self> {
        let path = path.into();
        json_file::ensure_exists(&path)?;
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> StoreResult<BTreeMap<String, Account>> {
        let stored: BTreeMap<String, StoredAccount> = json_file::load_map(&self.path)?;
        Ok(stored.into_iter().map(|(k, v)| (k, v.into())).collect())
    }

    fn save(&self, accounts: &BTreeMap<String, Account>) -> StoreResult<()> {
        json_file::save_map(&self.path, accounts)
    }

    pub fn get(&self, email: &str) -> StoreResult<Option<Account>> {
        Ok(self.load()?.remove(&normalize_email(email)))
    }

    pub fn status(&self, email: &str) -> StoreResult<AccountStatus> {
        Ok(match self.get(email)? {
            Some(account) => AccountStatus::Exists { name: account.name },
            None => AccountStatus::New,
        })
    }

    /// Create or replace the account for `email`.
    pub fn register(
        &self,
        email: &str,
        password: &str,
        name: &str,
        student_id: Option<&str>,
    ) -> StoreResult<()> {
        let email = normalize_email(email);
        let name = name.trim();
        if email.is_empty() {
            return Err(StoreError::MissingField("email"));
        }
        if password.is_empty() {
            return Err(StoreError::MissingField("password"));
        }
        if name.is_empty() {
            return Err(StoreError::MissingField("name"));
        }
        if !is_valid_email(&email) {
            return Err(StoreError::InvalidEmail(email));
        }

        let account = Account {
            hash: hash_password(password)?,
            name: name.to_string(),
            student_id: student_id.map(str::trim).unwrap_or_default().to_string(),
        };

        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut accounts = self.load()?;
        if accounts.insert(email.clone(), account).is_some() {
            warn!(%email, "account re-registered; previous entry replaced");
        } else {
            info!(%email, "account registered");
        }
        self.save(&accounts)
    }

    /// Check `password` against the stored hash.
    pub fn authenticate(&self, email: &str, password: &str) -> StoreResult<Account> {
        let email = normalize_email(email);
        let account = self
            .get(&email)?
            .ok_or_else(|| StoreError::UnknownAccount(email.clone()))?;
        if verify_password(password, &account.hash)? {
            Ok(account)
        } else {
            Err(StoreError::WrongPassword)
        }
    }

    /// Attach a student id card number. Returns `false` if no such account.
    pub fn link_student_id(&self, email: &str, student_id: &str) -> StoreResult<bool> {
        let email = normalize_email(email);
        let student_id = student_id.trim();
        if email.is_empty() {
            return Err(StoreError::MissingField("email"));
        }
        if student_id.is_empty() {
            return Err(StoreError::MissingField("student_id"));
        }

        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut accounts = self.load()?;
        let Some(account) = accounts.get_mut(&email) else {
            return Ok(false);
        };
        account.student_id = student_id.to_string();
        self.save(&accounts)?;
        Ok(true)
    }

    /// Find the account holding `student_id`, in email order.
    pub fn lookup_student_id(&self, student_id: &str) -> StoreResult<Option<(String, Account)>> {
        let student_id = student_id.trim();
        if student_id.is_empty() {
            return Ok(None);
        }
        Ok(self
            .load()?
            .into_iter()
            .find(|(_, account)| account.student_id == student_id))
    }
}
