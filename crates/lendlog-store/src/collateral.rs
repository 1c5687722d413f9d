use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use lendlog_crypto::CollateralSealer;
use lendlog_types::{normalize_email, EventTime};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{StoreError, StoreResult};
use crate::json_file;

/// A sealed collateral entry as stored on disk.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollateralRecord {
    /// `base64(nonce || ciphertext)`.
    pub data: String,
    pub updated: EventTime,
}

/// Decrypted collateral handed to an administrator.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RevealedCollateral {
    pub details: String,
    pub updated: EventTime,
}

/// Encrypted collateral (deposit card details) keyed by lower-cased email.
///
/// Without a sealer the vault can still answer which emails have
/// collateral on file, but refuses to save or reveal.
pub struct CollateralVault {
    path: PathBuf,
    sealer: Option<CollateralSealer>,
    write_lock: Mutex<()>,
}

impl CollateralVault {
    pub fn open(path: impl Into<PathBuf>, sealer: Option<CollateralSealer>) -> StoreResult<Self> {
        let path = path.into();
        json_file::ensure_exists(&path)?;
        if let Some(sealer) = &sealer {
            info!(path = %path.display(), key = %sealer.key_fingerprint(), "collateral vault opened");
        }
        Ok(Self {
            path,
            sealer,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_sealing_enabled(&self) -> bool {
        self.sealer.is_some()
    }

    fn sealer(&self) -> StoreResult<&CollateralSealer> {
        self.sealer.as_ref().ok_or(StoreError::SealingDisabled)
    }

    fn load(&self) -> StoreResult<BTreeMap<String, CollateralRecord>> {
        json_file::load_map(&self.path)
    }

    /// Seal `details` for `email`, replacing any previous entry.
    pub fn save(&self, email: &str, details: &str, at: EventTime) -> StoreResult<()> {
        let email = normalize_email(email);
        if email.is_empty() {
            return Err(StoreError::MissingField("email"));
        }
        if details.is_empty() {
            return Err(StoreError::MissingField("card_data"));
        }
        let record = CollateralRecord {
            data: self.sealer()?.seal(details)?,
            updated: at,
        };

        let _guard = self.write_lock.lock().map_err(|_| StoreError::LockPoisoned)?;
        let mut records = self.load()?;
        records.insert(email.clone(), record);
        json_file::save_map(&self.path, &records)?;
        info!(%email, "collateral saved");
        Ok(())
    }

    /// Decrypt the entry for `email`, if any.
    pub fn reveal(&self, email: &str) -> StoreResult<Option<RevealedCollateral>> {
        let sealer = self.sealer()?;
        let Some(record) = self.load()?.remove(&normalize_email(email)) else {
            return Ok(None);
        };
        Ok(Some(RevealedCollateral {
            details: sealer.open(&record.data)?,
            updated: record.updated,
        }))
    }

    /// Emails with collateral on file.
    pub fn index(&self) -> StoreResult<BTreeSet<String>> {
        Ok(self.load()?.into_keys().collect())
    }
}

#[cfg(test)]
mod tests {
    use lendlog_crypto::CryptoError;

    use super::*;

    fn vault(secret: Option<&str>) -> (tempfile::TempDir, CollateralVault) {
        let dir = tempfile::tempdir().unwrap();
        let sealer = secret.map(|s| CollateralSealer::from_secret(s).unwrap());
        let vault = CollateralVault::open(dir.path().join("collateral.json"), sealer).unwrap();
        (dir, vault)
    }

    #[test]
    fn save_then_reveal() {
        let (_dir, vault) = vault(Some("s3cret"));
        vault
            .save("Dana@Example.org", "4111 1111 1111 1111", EventTime::new("2025-03-01 10:00:00"))
            .unwrap();

        let revealed = vault.reveal("dana@example.org").unwrap().unwrap();
        assert_eq!(revealed.details, "4111 1111 1111 1111");
        assert_eq!(revealed.updated.as_str(), "2025-03-01 10:00:00");
        assert!(vault.reveal("nobody@example.org").unwrap().is_none());
    }

    #[test]
    fn plaintext_never_reaches_disk() {
        let (_dir, vault) = vault(Some("s3cret"));
        vault.save("dana@example.org", "4111-SECRET", EventTime::now()).unwrap();
        let raw = std::fs::read_to_string(vault.path()).unwrap();
        assert!(!raw.contains("4111-SECRET"));
    }

    #[test]
    fn index_lists_emails() {
        let (_dir, vault) = vault(Some("s3cret"));
        vault.save("a@example.org", "x", EventTime::now()).unwrap();
        vault.save("b@example.org", "y", EventTime::now()).unwrap();
        let index = vault.index().unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains("a@example.org"));
    }

    #[test]
    fn without_sealer_save_and_reveal_are_refused() {
        let (_dir, vault) = vault(None);
        assert!(!vault.is_sealing_enabled());
        assert!(matches!(
            vault.save("a@example.org", "x", EventTime::now()),
            Err(StoreError::SealingDisabled)
        ));
        assert!(matches!(vault.reveal("a@example.org"), Err(StoreError::SealingDisabled)));
        assert!(vault.index().unwrap().is_empty());
    }

    #[test]
    fn wrong_secret_cannot_reveal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("collateral.json");
        let writer =
            CollateralVault::open(&path, Some(CollateralSealer::from_secret("one").unwrap())).unwrap();
        writer.save("a@example.org", "x", EventTime::now()).unwrap();

        let reader =
            CollateralVault::open(&path, Some(CollateralSealer::from_secret("two").unwrap())).unwrap();
        assert!(matches!(
            reader.reveal("a@example.org"),
            Err(StoreError::Crypto(CryptoError::Unauthenticated))
        ));
    }

    #[test]
    fn missing_fields_are_rejected() {
        let (_dir, vault) = vault(Some("s3cret"));
        assert!(matches!(
            vault.save("", "x", EventTime::now()),
            Err(StoreError::MissingField("email"))
        ));
        assert!(matches!(
            vault.save("a@example.org", "", EventTime::now()),
            Err(StoreError::MissingField("card_data"))
        ));
    }
}
