//! Maps inbound events and external target IDs to stable identity keys.

use herald_msteams::{TeamsActivity, TeamsChannelAccount};

use crate::{Error, Result};

/// Stable row key for an addressable user or channel.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdentityKey(pub(crate) String);

impl IdentityKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for IdentityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for IdentityKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What an identity is being resolved from.
#[derive(Debug, Clone, Copy)]
pub enum IdentitySource<'a> {
    /// Sender of a 1:1 message.
    PersonalMessage(&'a TeamsActivity),
    /// Channel a group message was posted in.
    ChannelMessage(&'a TeamsActivity),
    /// Member returned by a roster query.
    RosterMember(&'a TeamsChannelAccount),
    /// ID supplied by an external caller (notification request).
    External(&'a str),
}

/// Deterministic identity resolution.
///
/// Users are keyed by their AAD object ID, which is the same for every bot
/// and conversation; channels by the Teams channel ID.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityResolver;

impl IdentityResolver {
    pub fn new() -> Self {
        Self
    }

    pub fn resolve(&self, source: IdentitySource<'_>) -> Result<IdentityKey> {
        match source {
            IdentitySource::PersonalMessage(activity) => {
                let from = activity
                    .from
                    .as_ref()
                    .ok_or_else(|| Error::unresolvable("activity has no sender"))?;
                non_empty(from.aad_object_id.as_deref()).ok_or_else(|| {
                    Error::unresolvable(format!("sender {} has no AAD object id", from.id))
                })
            },
            IdentitySource::ChannelMessage(activity) => activity
                .teams_channel_id()
                .map(str::to_string)
                .or_else(|| activity.conversation_id().map(strip_message_suffix))
                .and_then(|id| non_empty(Some(id.as_str())))
                .ok_or_else(|| Error::unresolvable("channel activity has no channel id")),
            IdentitySource::RosterMember(member) => non_empty(member.aad_object_id.as_deref())
                .ok_or_else(|| {
                    Error::unresolvable(format!("member {} has no AAD object id", member.id))
                }),
            IdentitySource::External(id) => non_empty(Some(id))
                .ok_or_else(|| Error::unresolvable("empty target id")),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<IdentityKey> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(|v| IdentityKey(v.to_string()))
}

/// Channel conversation IDs look like `19:abc@thread.tacv2;messageid=123`;
/// the part before `;` names the channel.
fn strip_message_suffix(conversation_id: &str) -> String {
    conversation_id
        .split_once(';')
        .map_or(conversation_id, |(channel, _)| channel)
        .to_string()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn personal(from: serde_json::Value, text: &str) -> TeamsActivity {
        serde_json::from_value(serde_json::json!({
            "type": "message",
            "text": text,
            "from": from,
            "conversation": { "id": "a:1", "conversationType": "personal" }
        }))
        .unwrap()
    }

    #[test]
    fn same_sender_resolves_identically() {
        let resolver = IdentityResolver::new();
        let from = serde_json::json!({ "id": "29:u", "aadObjectId": "aad-u" });
        let first = personal(from.clone(), "hello");
        let second = personal(from, "something else entirely");

        let a = resolver
            .resolve(IdentitySource::PersonalMessage(&first))
            .unwrap();
        let b = resolver
            .resolve(IdentitySource::PersonalMessage(&second))
            .unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "aad-u");
    }

    #[rstest]
    #[case(serde_json::json!({ "id": "29:guest" }))]
    #[case(serde_json::json!({ "id": "29:guest", "aadObjectId": "  " }))]
    fn sender_without_object_id_is_unresolvable(#[case] from: serde_json::Value) {
        let activity = personal(from, "hi");
        let err = IdentityResolver::new()
            .resolve(IdentitySource::PersonalMessage(&activity))
            .unwrap_err();
        assert!(matches!(err, Error::UnresolvableIdentity { .. }));
    }

    #[test]
    fn missing_sender_is_unresolvable() {
        let activity: TeamsActivity =
            serde_json::from_value(serde_json::json!({ "type": "message" })).unwrap();
        assert!(
            IdentityResolver::new()
                .resolve(IdentitySource::PersonalMessage(&activity))
                .is_err()
        );
    }

    #[test]
    fn channel_prefers_channel_data() {
        let activity: TeamsActivity = serde_json::from_value(serde_json::json!({
            "type": "message",
            "conversation": { "id": "19:thread;messageid=42", "conversationType": "channel" },
            "channelData": { "channel": { "id": "19:chan@thread.tacv2" } }
        }))
        .unwrap();
        let key = IdentityResolver::new()
            .resolve(IdentitySource::ChannelMessage(&activity))
            .unwrap();
        assert_eq!(key.as_str(), "19:chan@thread.tacv2");
    }

    #[test]
    fn channel_falls_back_to_conversation_id() {
        let activity: TeamsActivity = serde_json::from_value(serde_json::json!({
            "type": "message",
            "conversation": { "id": "19:thread@thread.tacv2;messageid=42" }
        }))
        .unwrap();
        let key = IdentityResolver::new()
            .resolve(IdentitySource::ChannelMessage(&activity))
            .unwrap();
        assert_eq!(key.as_str(), "19:thread@thread.tacv2");
    }

    #[test]
    fn roster_member_uses_object_id() {
        let member = TeamsChannelAccount {
            id: "29:m".into(),
            aad_object_id: Some("aad-m".into()),
            ..Default::default()
        };
        let key = IdentityResolver::new()
            .resolve(IdentitySource::RosterMember(&member))
            .unwrap();
        assert_eq!(key.to_string(), "aad-m");
    }

    #[test]
    fn external_ids_are_trimmed() {
        let resolver = IdentityResolver::new();
        assert_eq!(
            resolver
                .resolve(IdentitySource::External(" aad-x "))
                .unwrap()
                .as_str(),
            "aad-x"
        );
        assert!(resolver.resolve(IdentitySource::External("")).is_err());
    }
}
