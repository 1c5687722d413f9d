//! Cryptographic primitives for lendlog.
//!
//! Provides Argon2id password hashing for member accounts and authenticated
//! encryption for collateral records held against loans.
//!
//! All crypto operations wrap established libraries; no custom cryptography.

pub mod error;
pub mod password;
pub mod sealer;

pub use error::CryptoError;
pub use password::{hash_password, verify_password};
pub use sealer::CollateralSealer;
