//! Wire types for the roster API.
//!
//! Only the fields the reconciler needs are modelled; everything else the
//! service sends is ignored.

use clanwatch_core::{MemberSnapshotEntry, Role, Tag};
use serde::{Deserialize, Serialize};

use crate::error::FetchError;

/// Body of `GET /clans/{tag}/members`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemberList {
    #[serde(default)]
    pub items: Vec<WireMember>,
}

/// One roster member as sent by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireMember {
    pub tag: String,
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub donations: u32,
    #[serde(default)]
    pub donations_received: u32,
    #[serde(default)]
    pub exp_level: u32,
    #[serde(default)]
    pub trophies: u32,
    #[serde(default)]
    pub clan_rank: u32,
}

impl TryFrom<WireMember> for MemberSnapshotEntry {
    type Error = FetchError;

    fn try_from(member: WireMember) -> Result<Self, Self::Error> {
        let tag = Tag::new(member.tag)
            .map_err(|e| FetchError::transient(None, format!("invalid roster payload: {e}")))?;
        let role: Role = member
            .role
            .parse()
            .map_err(|e| FetchError::transient(None, format!("invalid roster payload: {e}")))?;

        Ok(Self::new(tag, member.name, role, member.donations))
    }
}

impl MemberList {
    /// Convert the wire payload into snapshot entries, in service order.
    ///
    /// # Errors
    ///
    /// Returns a transient error if any entry carries an unusable tag or role.
    pub fn into_snapshot(self) -> Result<Vec<MemberSnapshotEntry>, FetchError> {
        self.items
            .into_iter()
            .map(MemberSnapshotEntry::try_from)
            .collect()
    }
}

/// Body of `GET /clans/{tag}`, reduced to the summary fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSummary {
    pub tag: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub clan_level: u32,
    #[serde(default)]
    pub clan_points: u32,
    #[serde(default)]
    pub members: u32,
    #[serde(default)]
    pub war_wins: u32,
    #[serde(default, rename = "type")]
    pub kind: String,
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use crate::error::FetchErrorKind;

    #[test]
    fn test_member_list_decodes_and_ignores_extras() {
        let json = r##"{
            "items": [
                {"tag": "#ABC", "name": "Alice", "role": "member", "donations": 50,
                 "donationsReceived": 12, "expLevel": 90, "league": {"id": 1, "name": "Gold"}},
                {"tag": "#DEF", "name": "Bob", "role": "coLeader", "donations": 0}
            ],
            "paging": {"cursors": {}}
        }"##;

        let list: MemberList = serde_json::from_str(json).unwrap();
        let snapshot = list.into_snapshot().unwrap();

        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[0].tag.as_str(), "#ABC");
        assert_eq!(snapshot[0].contribution_count, 50);
        assert_eq!(snapshot[0].role, Role::Member);
        assert_eq!(snapshot[1].role, Role::CoLeader);
    }

    #[test]
    fn test_unknown_role_is_transient() {
        let list = MemberList {
            items: vec![WireMember {
                tag: "#ABC".to_string(),
                name: "Alice".to_string(),
                role: "overlord".to_string(),
                donations: 1,
                donations_received: 0,
                exp_level: 0,
                trophies: 0,
                clan_rank: 0,
            }],
        };

        let err = list.into_snapshot().unwrap_err();
        assert_eq!(err.kind(), FetchErrorKind::Transient);
    }

    #[test]
    fn test_group_summary_decodes() {
        let json = r##"{"tag": "#2PP", "name": "Sniffers", "clanLevel": 12,
                        "clanPoints": 30000, "members": 48, "type": "inviteOnly",
                        "memberList": []}"##;
        let summary: GroupSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.name, "Sniffers");
        assert_eq!(summary.members, 48);
        assert_eq!(summary.kind, "inviteOnly");
    }
}
