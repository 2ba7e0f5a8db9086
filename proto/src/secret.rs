//! The user's secret and the working alphabet it is drawn from.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

pub const DIGITS: &str = "0123456789";
pub const LETTERS: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Symbols in display order.
pub const SYMBOLS: &str = "!#$@";

/// Every character a secret may contain, in display layout order
/// (digits, letters, symbols).
pub const ALPHABET: &str = "0123456789ABCDEFGHIJKLMNOPQRSTUVWXYZ!#$@";

pub const MIN_SECRET_LEN: usize = 4;
pub const MAX_SECRET_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SecretError {
    #[error("Password can only contain letters (A-Z), numbers (0-9), and special characters (!, @, #, $)")]
    InvalidCharacter(char),

    #[error("Password must be at least {MIN_SECRET_LEN} characters long")]
    TooShort(usize),

    #[error("Password cannot be longer than {MAX_SECRET_LEN} characters")]
    TooLong(usize),
}

/// Whether `c` belongs to the working alphabet. Case-sensitive.
pub fn is_alphabet_char(c: char) -> bool {
    ALPHABET.contains(c)
}

/// A validated secret: 4-10 characters from [`ALPHABET`], upper-cased.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Secret(Zeroizing<String>);

impl Secret {
    /// Normalise to upper case, then check characters and length.
    pub fn parse(input: &str) -> Result<Self, SecretError> {
        let normalized = Zeroizing::new(input.to_uppercase());

        if let Some(bad) = normalized.chars().find(|c| !is_alphabet_char(*c)) {
            return Err(SecretError::InvalidCharacter(bad));
        }

        let len = normalized.chars().count();
        if len < MIN_SECRET_LEN {
            return Err(SecretError::TooShort(len));
        }
        if len > MAX_SECRET_LEN {
            return Err(SecretError::TooLong(len));
        }

        Ok(Self(normalized))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Number of characters, which is also the number of rounds a session runs.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Character at `position`, if any.
    pub fn char_at(&self, position: usize) -> Option<char> {
        self.0.chars().nth(position)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Secret").field(&"[redacted]").finish()
    }
}

impl TryFrom<String> for Secret {
    type Error = SecretError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = Zeroizing::new(value);
        Self::parse(&value)
    }
}

impl From<Secret> for String {
    fn from(secret: Secret) -> Self {
        secret.0.as_str().to_owned()
    }
}

/// `true` iff `input` would be accepted by [`Secret::parse`].
pub fn validate_secret(input: &str) -> bool {
    Secret::parse(input).is_ok()
}
