//! Domain models
//!
//! Row types map 1:1 to the tables created by `migrations/`. Secrets
//! ([`StoredHash`], [`SessionToken`]) carry redacting `Debug` impls so they
//! never end up in logs.

use std::fmt;
use std::str::FromStr;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use rand::RngCore;
use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub type UserId = Uuid;

/// Number of random bytes behind a session token (256 bits)
pub const SESSION_TOKEN_BYTES: usize = 32;

/// Column widths from `migrations/0001_init.sql`, in characters
pub mod limits {
    pub const STUDENT_ID: usize = 32;
    pub const GRADE: usize = 32;
    pub const CLASS_GROUP: usize = 32;
    pub const PERSONAL_ID: usize = 64;
    /// Emails, names, business name and kind, product titles
    pub const TEXT: usize = 255;

    /// True when `value` is longer than `max` characters
    pub fn exceeds(value: &str, max: usize) -> bool {
        value.chars().count() > max
    }
}

// =============================================================================
// Secrets
// =============================================================================

/// PHC-formatted password hash as persisted in `users.password_hash`
#[derive(Clone, PartialEq, Eq, sqlx::Type)]
#[sqlx(transparent)]
pub struct StoredHash(String);

impl StoredHash {
    pub fn new(phc: impl Into<String>) -> Self {
        Self(phc.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for StoredHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("StoredHash(<redacted>)")
    }
}

/// Opaque session credential handed to the client in the `session` cookie
#[derive(Clone, PartialEq, Eq, Hash, sqlx::Type)]
#[sqlx(transparent)]
pub struct SessionToken(String);

impl SessionToken {
    /// Draw a fresh token from the thread-local CSPRNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        rand::rng().fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Short prefix that is safe to put in logs
    pub fn log_prefix(&self) -> &str {
        let end = self
            .0
            .char_indices()
            .nth(6)
            .map(|(idx, _)| idx)
            .unwrap_or(self.0.len());
        &self.0[..end]
    }
}

impl From<String> for SessionToken {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionToken {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SessionToken({}…)", self.log_prefix())
    }
}

// =============================================================================
// Users & students
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub given_names: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    /// Official id for external (non-student) collaborators
    pub personal_id: Option<String>,
    /// `None` for collaborator accounts, which cannot sign in
    pub password_hash: Option<StoredHash>,
    pub created_at: OffsetDateTime,
}

impl User {
    pub fn full_name(&self) -> String {
        [
            self.given_names.as_str(),
            self.paternal_surname.as_str(),
            self.maternal_surname.as_str(),
        ]
        .iter()
        .filter(|part| !part.is_empty())
        .copied()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewUser {
    pub email: String,
    pub given_names: String,
    pub paternal_surname: String,
    pub maternal_surname: String,
    pub personal_id: Option<String>,
    pub password_hash: Option<StoredHash>,
    /// Student row created in the same transaction as the user
    pub student: Option<NewStudent>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Student {
    pub id: String,
    pub grade: String,
    pub class_group: String,
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewStudent {
    pub id: String,
    pub grade: String,
    pub class_group: String,
}

// =============================================================================
// Sessions
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct Session {
    pub token: SessionToken,
    pub user_id: UserId,
    pub created_at: OffsetDateTime,
}

// =============================================================================
// Businesses, products, collaborators
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Business {
    pub id: Uuid,
    pub owner_student_id: String,
    pub name: String,
    pub kind: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBusiness {
    pub owner_student_id: String,
    pub name: String,
    pub kind: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub business_id: Uuid,
    pub title: String,
    #[sqlx(rename = "price_cents")]
    pub price: Price,
    pub stock: i32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewProduct {
    pub business_id: Uuid,
    pub title: String,
    pub price: Price,
    pub stock: i32,
}

/// A user linked to a business, with their student record when they are an
/// intern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Collaborator {
    pub user: User,
    pub student: Option<Student>,
}

impl Collaborator {
    pub fn is_intern(&self) -> bool {
        self.student.is_some()
    }
}

// =============================================================================
// Price
// =============================================================================

/// Non-negative money amount stored as integer cents
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, sqlx::Type, Serialize)]
#[sqlx(transparent)]
pub struct Price(i64);

impl Price {
    pub fn from_cents(cents: i64) -> Result<Self, ParsePriceError> {
        if cents < 0 {
            return Err(ParsePriceError::Negative);
        }
        Ok(Self(cents))
    }

    pub fn cents(&self) -> i64 {
        self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParsePriceError {
    #[error("price is required")]
    Empty,
    #[error("price must be a decimal number")]
    Invalid,
    #[error("price cannot be negative")]
    Negative,
    #[error("price supports at most two decimal places")]
    TooPrecise,
    #[error("price is too large")]
    Overflow,
}

impl FromStr for Price {
    type Err = ParsePriceError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParsePriceError::Empty);
        }
        if input.starts_with('-') {
            return Err(ParsePriceError::Negative);
        }

        let (whole, fraction) = match input.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (input, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(ParsePriceError::Invalid);
        }
        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(ParsePriceError::Invalid);
        }
        if fraction.len() > 2 {
            return Err(ParsePriceError::TooPrecise);
        }

        let whole: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| ParsePriceError::Overflow)?
        };
        let fraction: i64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<i64>().map_err(|_| ParsePriceError::Invalid)? * 10,
            _ => fraction.parse().map_err(|_| ParsePriceError::Invalid)?,
        };

        whole
            .checked_mul(100)
            .and_then(|cents| cents.checked_add(fraction))
            .map(Price)
            .ok_or(ParsePriceError::Overflow)
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_session_token_shape() {
        let token = SessionToken::generate();
        // 32 bytes, base64 without padding
        assert_eq!(token.as_str().len(), 43);
        assert!(token
            .as_str()
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_'));
    }

    #[test]
    fn test_session_tokens_are_unique() {
        let tokens: std::collections::HashSet<_> =
            (0..1_000).map(|_| SessionToken::generate()).collect();
        assert_eq!(tokens.len(), 1_000);
    }

    #[test]
    fn test_secrets_are_redacted_in_debug() {
        let token = SessionToken::from("abcdefghijklmnop");
        let debug = format!("{:?}", token);
        assert!(debug.contains("abcdef"));
        assert!(!debug.contains("ghijklmnop"));

        let hash = StoredHash::new("$argon2id$v=19$m=19456,t=2,p=1$salt$hash");
        assert_eq!(format!("{:?}", hash), "StoredHash(<redacted>)");
    }

    #[test]
    fn test_log_prefix_short_token() {
        let token = SessionToken::from("abc");
        assert_eq!(token.log_prefix(), "abc");
    }

    #[test]
    fn test_price_parsing() {
        assert_eq!("12".parse::<Price>().unwrap().cents(), 1200);
        assert_eq!("12.5".parse::<Price>().unwrap().cents(), 1250);
        assert_eq!("12.05".parse::<Price>().unwrap().cents(), 1205);
        assert_eq!(".99".parse::<Price>().unwrap().cents(), 99);
        assert_eq!(" 3. ".parse::<Price>().unwrap().cents(), 300);
    }

    #[test]
    fn test_price_rejects_bad_input() {
        assert_eq!("".parse::<Price>(), Err(ParsePriceError::Empty));
        assert_eq!("-1".parse::<Price>(), Err(ParsePriceError::Negative));
        assert_eq!("1.234".parse::<Price>(), Err(ParsePriceError::TooPrecise));
        assert_eq!("abc".parse::<Price>(), Err(ParsePriceError::Invalid));
        assert_eq!(".".parse::<Price>(), Err(ParsePriceError::Invalid));
        assert_eq!("1e5".parse::<Price>(), Err(ParsePriceError::Invalid));
        assert_eq!(
            "99999999999999999999".parse::<Price>(),
            Err(ParsePriceError::Overflow)
        );
    }

    #[test]
    fn test_price_display() {
        assert_eq!(Price::from_cents(1205).unwrap().to_string(), "12.05");
        assert_eq!(Price::from_cents(7).unwrap().to_string(), "0.07");
        assert!(Price::from_cents(-1).is_err());
    }

    #[test]
    fn test_limits_count_characters() {
        assert!(!limits::exceeds(&"A".repeat(32), limits::STUDENT_ID));
        assert!(limits::exceeds(&"A".repeat(33), limits::STUDENT_ID));
        // Multi-byte characters count once, like VARCHAR(n)
        assert!(!limits::exceeds(&"ñ".repeat(32), limits::STUDENT_ID));
    }

    #[test]
    fn test_full_name_skips_empty_parts() {
        let user = User {
            id: Uuid::new_v4(),
            email: "ana@example.com".to_string(),
            given_names: "Ana".to_string(),
            paternal_surname: "López".to_string(),
            maternal_surname: String::new(),
            personal_id: None,
            password_hash: None,
            created_at: OffsetDateTime::now_utc(),
        };
        assert_eq!(user.full_name(), "Ana López");
    }
}
