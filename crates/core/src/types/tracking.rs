//! Human-presentable order tracking identifiers.
//!
//! A tracking ID is `TRK` followed by 16 Crockford base32 characters
//! (80 bits of entropy), e.g. `TRK4F0QZ9M2XK7B3D1A`. The alphabet omits
//! `I`, `L`, `O` and `U` so IDs read back over the phone survive.
//!
//! This module only encodes and validates; the caller supplies the random
//! bytes so the core crate stays free of RNG state.

use core::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Crockford base32 alphabet.
const ALPHABET: &[u8; 32] = b"0123456789ABCDEFGHJKMNPQRSTVWXYZ";

/// Errors that can occur when parsing a [`TrackingId`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum TrackingIdError {
    /// Missing `TRK` prefix.
    #[error("tracking id must start with {prefix}")]
    MissingPrefix {
        /// Expected prefix.
        prefix: &'static str,
    },
    /// Wrong number of characters after the prefix.
    #[error("tracking id must have {expected} characters after the prefix")]
    WrongLength {
        /// Expected body length.
        expected: usize,
    },
    /// A character outside the alphabet.
    #[error("tracking id contains invalid character {0:?}")]
    InvalidCharacter(char),
}

/// Globally unique, externally shown order identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct TrackingId(String);

impl TrackingId {
    /// Fixed prefix.
    pub const PREFIX: &'static str = "TRK";
    /// Number of base32 characters after the prefix.
    pub const BODY_LENGTH: usize = 16;
    /// Total length; fits the `varchar(20)` column.
    pub const LENGTH: usize = Self::PREFIX.len() + Self::BODY_LENGTH;

    /// Encode 80 bits of entropy as a tracking ID.
    #[must_use]
    pub fn from_entropy(bytes: [u8; 10]) -> Self {
        let value = bytes
            .iter()
            .fold(0u128, |acc, &b| (acc << 8) | u128::from(b));

        let mut id = String::with_capacity(Self::LENGTH);
        id.push_str(Self::PREFIX);
        for group in (0..Self::BODY_LENGTH).rev() {
            #[allow(clippy::cast_possible_truncation)] // masked to 5 bits
            let index = ((value >> (group * 5)) & 0x1f) as usize;
            let symbol = ALPHABET.get(index).copied().unwrap_or(b'0');
            id.push(char::from(symbol));
        }
        Self(id)
    }

    /// Parse a tracking ID supplied by a client.
    ///
    /// Lowercase input is accepted and uppercased.
    ///
    /// # Errors
    ///
    /// Returns an error if the prefix, length or alphabet is wrong.
    pub fn parse(s: &str) -> Result<Self, TrackingIdError> {
        let upper = s.trim().to_ascii_uppercase();
        let body = upper
            .strip_prefix(Self::PREFIX)
            .ok_or(TrackingIdError::MissingPrefix {
                prefix: Self::PREFIX,
            })?;

        if body.chars().count() != Self::BODY_LENGTH {
            return Err(TrackingIdError::WrongLength {
                expected: Self::BODY_LENGTH,
            });
        }

        if let Some(bad) = body
            .chars()
            .find(|c| !c.is_ascii() || !ALPHABET.contains(&(*c as u8)))
        {
            return Err(TrackingIdError::InvalidCharacter(bad));
        }

        Ok(Self(upper))
    }

    /// Returns the tracking ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for TrackingId {
    type Err = TrackingIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for TrackingId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for TrackingId {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <String as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <String as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for TrackingId {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let s = <String as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self(s))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for TrackingId {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <String as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}
