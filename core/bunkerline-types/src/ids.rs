//! Client identity for a realtime session.
//!
//! A [`ClientId`] is minted once per hub and never persisted. It exists only
//! so a client can recognize its own messages when the relay reflects them
//! back; it carries no authority.

use crate::{Error, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Fixed tag prefixed to every generated client id.
pub const CLIENT_ID_TAG: &str = "client";

const BASE36: &[u8; 36] = b"0123456789abcdefghijklmnopqrstuvwxyz";
const FRAGMENT_LEN: usize = 9;

/// Opaque identifier of one connected client session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ClientId(String);

impl ClientId {
    /// Generates a fresh identity: `client_{base36 fragment}_{unix millis}`.
    #[must_use]
    pub fn generate() -> Self {
        let mut rng = rand::thread_rng();
        let fragment: String = (0..FRAGMENT_LEN)
            .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
            .collect();
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("{CLIENT_ID_TAG}_{fragment}_{millis}"))
    }

    /// Parses a client id received from the wire.
    ///
    /// Any non-empty string without whitespace is accepted; ids minted by
    /// other client implementations need not follow our format.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || s.chars().any(char::is_whitespace) {
            return Err(Error::InvalidClientId(s.to_string()));
        }
        Ok(Self(s.to_string()))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for ClientId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for ClientId {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<ClientId> for String {
    fn from(id: ClientId) -> Self {
        id.0
    }
}

impl AsRef<str> for ClientId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
