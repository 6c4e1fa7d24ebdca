//! Normalized chat identities.
//!
//! The archive consumes JIDs that the hosting server has already validated;
//! normalization here is the comparison contract only: identities that
//! differ in letter case, surrounding whitespace, or connected resource
//! must land in (and be retrievable from) the same archive partition.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ArchiveError;

/// A bare JID: `localpart@domain` (or a plain domain), case-folded.
///
/// Owners are always bare; peers are compared and indexed by their bare
/// form. Two `BareJid`s are the same identity iff they are `==`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BareJid(String);

impl BareJid {
    /// Normalize a JID string into a bare identity.
    ///
    /// Any resource suffix is dropped; localpart and domain are lowercased.
    pub fn new(raw: &str) -> Result<Self, ArchiveError> {
        let raw = raw.trim();
        let bare = raw.split('/').next().unwrap_or(raw);
        if bare.is_empty() {
            return Err(ArchiveError::Validation("empty jid".to_string()));
        }
        if bare.contains(char::is_whitespace) {
            return Err(ArchiveError::Validation(format!(
                "jid contains whitespace: {}",
                raw
            )));
        }
        Ok(Self(bare.to_lowercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Domain part of the identity; a domain-only JID is its own domain.
    pub fn domain(&self) -> &str {
        self.0
            .split_once('@')
            .map(|(_, domain)| domain)
            .unwrap_or(&self.0)
    }
}

impl fmt::Display for BareJid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for BareJid {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A possibly-full JID: a bare identity plus an optional resource.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Jid {
    bare: BareJid,
    resource: Option<String>,
}

impl Jid {
    pub fn new(raw: &str) -> Result<Self, ArchiveError> {
        let raw = raw.trim();
        let (bare_part, resource) = match raw.split_once('/') {
            Some((bare, res)) if !res.is_empty() => (bare, Some(res.to_string())),
            Some((bare, _)) => (bare, None),
            None => (raw, None),
        };
        Ok(Self {
            bare: BareJid::new(bare_part)?,
            resource,
        })
    }

    pub fn bare(&self) -> &BareJid {
        &self.bare
    }

    pub fn to_bare(&self) -> BareJid {
        self.bare.clone()
    }

    pub fn resource(&self) -> Option<&str> {
        self.resource.as_deref()
    }
}

impl From<BareJid> for Jid {
    fn from(bare: BareJid) -> Self {
        Self {
            bare,
            resource: None,
        }
    }
}

impl fmt::Display for Jid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.resource {
            Some(res) => write!(f, "{}/{}", self.bare, res),
            None => f.write_str(self.bare.as_str()),
        }
    }
}

impl FromStr for Jid {
    type Err = ArchiveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}
