use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;
use crate::title::normalize_title;

/// Display name / email split of a free-text ledger borrower.
///
/// The ledger stores borrowers as opaque strings. Depending on which front
/// end recorded the event that string is a plain name, a `"Name <email>"`
/// composite or a bare email. `BorrowerId` recovers whatever structure is
/// present without asserting a canonical format.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BorrowerId {
    pub name: String,
    pub email: Option<String>,
}

impl BorrowerId {
    /// Split a raw borrower string.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();

        if let Some(inner) = trimmed.strip_suffix('>') {
            if let Some(open) = inner.rfind(" <") {
                let name = inner[..open].trim();
                let email = inner[open + 2..].trim();
                if !email.is_empty() {
                    return Self {
                        name: name.to_string(),
                        email: Some(normalize_email(email)),
                    };
                }
            }
        }

        if is_valid_email(trimmed) {
            return Self {
                name: trimmed.to_string(),
                email: Some(normalize_email(trimmed)),
            };
        }

        Self {
            name: trimmed.to_string(),
            email: None,
        }
    }

    /// Build the composite form recorded for registered accounts.
    ///
    /// The name is title-normalized so the ledger string reads back
    /// unchanged.
    pub fn composite(name: &str, email: &str) -> Result<Self, TypeError> {
        if !is_valid_email(email) {
            return Err(TypeError::InvalidEmail(email.to_string()));
        }
        Ok(Self {
            name: normalize_title(name),
            email: Some(normalize_email(email)),
        })
    }

    /// The string written to the ledger.
    pub fn to_ledger_string(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for BorrowerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.email {
            Some(email) if email != &normalize_email(&self.name) => {
                write!(f, "{} <{}>", self.name, email)
            }
            _ => f.write_str(&self.name),
        }
    }
}

/// Lower-case and trim an email address; account keys use this form.
pub fn normalize_email(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Conservative syntactic check: one `@`, a non-empty local part, a dotted
/// domain, and no whitespace or angle brackets.
pub fn is_valid_email(raw: &str) -> bool {
    let candidate = raw.trim();
    if candidate.is_empty()
        || candidate
            .chars()
            .any(|c| c.is_whitespace() || c == '<' || c == '>' || c == ',')
    {
        return false;
    }
    let mut parts = candidate.split('@');
    let (Some(local), Some(domain), None) = (parts.next(), parts.next(), parts.next()) else {
        return false;
    };
    !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..")
}
