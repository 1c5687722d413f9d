use lendlog_store::{Account, AccountStore};
use lendlog_types::normalize_email;

use crate::error::{ServerError, ServerResult};

/// Shared-password gate in front of the admin endpoints.
///
/// Only a BLAKE3 digest of the password is kept; comparing digests is
/// constant-time. An empty configured password locks the gate entirely.
#[derive(Clone)]
pub struct AdminGate {
    digest: Option<blake3::Hash>,
}

impl Default for AdminGate {
    fn default() -> Self {
        Self::new("1234")
    }
}

impl AdminGate {
    pub fn new(password: &str) -> Self {
        Self {
            digest: (!password.is_empty()).then(|| blake3::hash(password.as_bytes())),
        }
    }

    /// A gate that admits nobody.
    pub fn locked() -> Self {
        Self { digest: None }
    }

    pub fn is_admin(&self, supplied: &str) -> bool {
        self.digest
            .is_some_and(|digest| digest == blake3::hash(supplied.as_bytes()))
    }

    pub fn check(&self, supplied: &str) -> ServerResult<()> {
        if self.is_admin(supplied) {
            Ok(())
        } else {
            Err(ServerError::wrong_password())
        }
    }
}

impl std::fmt::Debug for AdminGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminGate")
            .field("locked", &self.digest.is_none())
            .finish()
    }
}

/// Who is asking for a borrower's history.
#[derive(Clone, Debug)]
pub enum HistoryAccess {
    /// The admin password was supplied; the account may not exist.
    Admin { email: String, account: Option<Account> },
    /// The account holder authenticated with their own password.
    Owner { email: String, account: Account },
}

impl HistoryAccess {
    /// Admin password first, then the account's own password.
    pub fn resolve(
        admin: &AdminGate,
        accounts: &AccountStore,
        email: &str,
        password: &str,
    ) -> ServerResult<Self> {
        let email = normalize_email(email);
        if admin.is_admin(password) {
            let account = accounts.get(&email)?;
            return Ok(Self::Admin { email, account });
        }
        let account = accounts.authenticate(&email, password)?;
        Ok(Self::Owner { email, account })
    }

    pub fn email(&self) -> &str {
        match self {
            Self::Admin { email, .. } | Self::Owner { email, .. } => email,
        }
    }

    pub fn account_name(&self) -> Option<&str> {
        match self {
            Self::Admin { account, .. } => account.as_ref().map(|a| a.name.as_str()),
            Self::Owner { account, .. } => Some(account.name.as_str()),
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;

    use super::*;

    #[test]
    fn gate_admits_only_matching_password() {
        let gate = AdminGate::new("desk");
        assert!(gate.is_admin("desk"));
        assert!(!gate.is_admin("Desk"));
        assert!(!gate.is_admin(""));
        assert_eq!(gate.check("nope").unwrap_err().status(), StatusCode::FORBIDDEN);
    }

    #[test]
    fn empty_password_locks_gate() {
        let gate = AdminGate::new("");
        assert!(!gate.is_admin(""));
        assert!(!AdminGate::locked().is_admin("1234"));
        assert!(AdminGate::default().is_admin("1234"));
    }

    #[test]
    fn debug_does_not_leak_digest() {
        assert_eq!(format!("{:?}", AdminGate::new("x")), "AdminGate { locked: false }");
    }

    #[test]
    fn history_access_paths() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = AccountStore::open(dir.path().join("users.json")).unwrap();
        accounts.register("ann@example.org", "pw", "Ann", None).unwrap();
        let gate = AdminGate::new("desk");

        let owner = HistoryAccess::resolve(&gate, &accounts, "Ann@example.org", "pw").unwrap();
        assert!(matches!(owner, HistoryAccess::Owner { .. }));
        assert_eq!(owner.account_name(), Some("Ann"));

        let admin = HistoryAccess::resolve(&gate, &accounts, "ghost@example.org", "desk").unwrap();
        assert_eq!(admin.email(), "ghost@example.org");
        assert_eq!(admin.account_name(), None);

        let unknown = HistoryAccess::resolve(&gate, &accounts, "ghost@example.org", "pw").unwrap_err();
        assert_eq!(unknown.status(), StatusCode::UNAUTHORIZED);
        let wrong = HistoryAccess::resolve(&gate, &accounts, "ann@example.org", "bad").unwrap_err();
        assert_eq!(wrong.status(), StatusCode::FORBIDDEN);
    }
}
