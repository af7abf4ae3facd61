//! Member identity, snapshot entries and ledger records.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Stable opaque identifier of a group member.
///
/// Tags are the ledger's primary key. The only normalization applied is
/// trimming surrounding whitespace; the tag is otherwise compared verbatim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Tag(String);

impl Tag {
    /// Create a tag, rejecting empty values and embedded whitespace.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTag`] if the tag is empty or contains whitespace.
    pub fn new(tag: impl Into<String>) -> Result<Self> {
        let raw = tag.into();
        let trimmed = raw.trim();

        if trimmed.is_empty() {
            return Err(Error::invalid_tag(raw, "tag is empty"));
        }
        if trimmed.chars().any(char::is_whitespace) {
            return Err(Error::invalid_tag(raw, "tag contains whitespace"));
        }

        Ok(Self(trimmed.to_string()))
    }

    /// Borrow the tag as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

impl TryFrom<String> for Tag {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Rank of a member within the group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular member, the only rank eligible for promotion alerts
    #[default]
    Member,
    /// Elder (reported as `admin` by the roster service)
    Elder,
    /// Co-leader
    CoLeader,
    /// Leader
    Leader,
}

impl Role {
    /// Whether a member of this rank can be considered for promotion.
    #[must_use]
    pub const fn is_promotable(&self) -> bool {
        matches!(self, Self::Member)
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Member => write!(f, "member"),
            Self::Elder => write!(f, "elder"),
            Self::CoLeader => write!(f, "co-leader"),
            Self::Leader => write!(f, "leader"),
        }
    }
}

impl FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let folded: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();

        match folded.as_str() {
            "member" => Ok(Self::Member),
            "admin" | "elder" => Ok(Self::Elder),
            "coleader" => Ok(Self::CoLeader),
            "leader" => Ok(Self::Leader),
            _ => Err(Error::unknown_role(s)),
        }
    }
}

/// One member as reported by a single roster fetch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberSnapshotEntry {
    /// Stable member tag
    pub tag: Tag,
    /// Display name at fetch time
    pub name: String,
    /// Rank at fetch time
    pub role: Role,
    /// Contribution counter reported by the roster service
    pub contribution_count: u32,
}

impl MemberSnapshotEntry {
    /// Create a snapshot entry.
    #[must_use]
    pub fn new(tag: Tag, name: impl Into<String>, role: Role, contribution_count: u32) -> Self {
        Self {
            tag,
            name: name.into(),
            role,
            contribution_count,
        }
    }
}

/// Persistent per-tag membership record.
///
/// Records are never deleted; an exit is a soft state (`active = false`,
/// `exited_at` set) and a later sighting of the same tag is a rejoin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MemberLedgerRecord {
    /// Primary key
    pub tag: Tag,
    /// Last known display name
    pub name: String,
    /// Whether the tag was present in the latest reconciled snapshot
    pub active: bool,
    /// First sighting, set once
    pub joined_at: DateTime<Utc>,
    /// Last reconciliation in which the tag was present
    pub last_seen_at: DateTime<Utc>,
    /// When the member was first found absent; cleared on rejoin
    #[serde(default)]
    pub exited_at: Option<DateTime<Utc>>,
    /// Contribution counter as of the latest change
    pub current_contribution: u32,
    /// Contribution counter before the latest change
    pub previous_contribution: u32,
    /// When the contribution counter last changed
    #[serde(default)]
    pub last_contribution_change_at: Option<DateTime<Utc>>,
    /// One-shot promotion alert latch
    #[serde(default)]
    pub promotion_alert_sent: bool,
}

impl MemberLedgerRecord {
    /// Build the record for a tag seen for the first time.
    #[must_use]
    pub fn first_sighting(entry: &MemberSnapshotEntry, now: DateTime<Utc>) -> Self {
        Self {
            tag: entry.tag.clone(),
            name: entry.name.clone(),
            active: true,
            joined_at: now,
            last_seen_at: now,
            exited_at: None,
            current_contribution: entry.contribution_count,
            previous_contribution: entry.contribution_count,
            last_contribution_change_at: None,
            promotion_alert_sent: false,
        }
    }

    /// Whether the member has left the group.
    #[must_use]
    pub const fn has_exited(&self) -> bool {
        !self.active
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    #[test]
    fn test_tag_trims_and_rejects_empty() {
        let tag = Tag::new("  #ABC  ").unwrap();
        assert_eq!(tag.as_str(), "#ABC");

        assert!(Tag::new("   ").is_err());
        assert!(Tag::new("#A B").is_err());
    }

    #[test]
    fn test_tag_serde_validates() {
        let tag: Tag = serde_json::from_str("\"#Q2V\"").unwrap();
        assert_eq!(tag.to_string(), "#Q2V");

        let bad: std::result::Result<Tag, _> = serde_json::from_str("\"\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_role_parses_wire_names() {
        assert_eq!("member".parse::<Role>().unwrap(), Role::Member);
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Elder);
        assert_eq!("coLeader".parse::<Role>().unwrap(), Role::CoLeader);
        assert_eq!("co-leader".parse::<Role>().unwrap(), Role::CoLeader);
        assert_eq!("leader".parse::<Role>().unwrap(), Role::Leader);
        assert!("overlord".parse::<Role>().is_err());
    }

    #[test]
    fn test_only_members_are_promotable() {
        assert!(Role::Member.is_promotable());
        assert!(!Role::Elder.is_promotable());
        assert!(!Role::CoLeader.is_promotable());
        assert!(!Role::Leader.is_promotable());
    }

    #[test]
    fn test_first_sighting_record() {
        let now = Utc::now();
        let entry = MemberSnapshotEntry::new(Tag::new("#ABC").unwrap(), "Alice", Role::Member, 50);
        let record = MemberLedgerRecord::first_sighting(&entry, now);

        assert!(record.active);
        assert_eq!(record.joined_at, now);
        assert_eq!(record.exited_at, None);
        assert_eq!(record.current_contribution, 50);
        assert_eq!(record.previous_contribution, 50);
        assert!(!record.promotion_alert_sent);
    }
}
