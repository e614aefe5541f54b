use serde::Deserialize;

use crate::types::{ChannelAccount, ConversationAccount};

/// Inbound activity delivered to the bot webhook.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TeamsActivity {
    #[serde(rename = "type")]
    pub activity_type: String,
    pub id: Option<String>,
    pub text: Option<String>,
    pub service_url: Option<String>,
    pub channel_id: Option<String>,
    pub locale: Option<String>,
    pub from: Option<ChannelAccount>,
    pub recipient: Option<ChannelAccount>,
    pub conversation: Option<ConversationAccount>,
    pub entities: Option<Vec<ActivityEntity>>,
    pub channel_data: Option<serde_json::Value>,
    pub members_added: Option<Vec<ChannelAccount>>,
    pub reactions_added: Option<Vec<MessageReaction>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ActivityEntity {
    #[serde(rename = "type")]
    pub entity_type: String,
    pub mentioned: Option<ChannelAccount>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MessageReaction {
    #[serde(rename = "type")]
    pub reaction_type: String,
}

impl TeamsActivity {
    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation
            .as_ref()
            .map(|c| c.id.as_str())
            .filter(|id| !id.is_empty())
    }

    pub fn conversation_type(&self) -> Option<&str> {
        self.conversation.as_ref()?.conversation_type.as_deref()
    }

    pub fn is_personal(&self) -> bool {
        self.conversation_type()
            .is_some_and(|t| t.eq_ignore_ascii_case("personal"))
    }

    pub fn sender_name(&self) -> Option<String> {
        self.from.as_ref().and_then(|from| from.name.clone())
    }

    /// Team the activity was posted in, from `channelData.team.id`.
    pub fn team_id(&self) -> Option<&str> {
        self.channel_data_id("team")
    }

    /// Teams channel the activity was posted in, from `channelData.channel.id`.
    pub fn teams_channel_id(&self) -> Option<&str> {
        self.channel_data_id("channel")
    }

    fn channel_data_id(&self, key: &str) -> Option<&str> {
        self.channel_data
            .as_ref()?
            .get(key)?
            .get("id")?
            .as_str()
            .filter(|id| !id.is_empty())
    }

    /// Mention entities addressed to the bot (the activity's recipient).
    fn recipient_mentions(&self) -> impl Iterator<Item = &ActivityEntity> {
        let recipient_id = self
            .recipient
            .as_ref()
            .map(|r| r.id.as_str())
            .filter(|id| !id.is_empty());
        self.entities.iter().flatten().filter(move |entity| {
            entity.entity_type.eq_ignore_ascii_case("mention")
                && entity
                    .mentioned
                    .as_ref()
                    .zip(recipient_id)
                    .is_some_and(|(m, recipient_id)| m.id == recipient_id)
        })
    }

    /// Whether the bot itself is among `membersAdded`.
    pub fn bot_was_added(&self) -> bool {
        let Some(recipient) = self.recipient.as_ref() else {
            return false;
        };
        self.members_added
            .as_ref()
            .is_some_and(|added| added.iter().any(|m| m.id == recipient.id))
    }

    /// Message text with the bot's own mentions removed and whitespace
    /// trimmed. Mentions of anyone else stay in the text. `None` when nothing
    /// is left.
    pub fn text_without_recipient_mention(&self) -> Option<String> {
        let mut text = self.text.clone()?;
        for mention in self.recipient_mentions() {
            if let Some(markup) = mention.text.as_deref().filter(|t| !t.is_empty()) {
                text = text.replace(markup, "");
            }
        }

        let text = text.trim().to_string();
        if text.is_empty() {
            None
        } else {
            Some(text)
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: serde_json::Value) -> TeamsActivity {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn parses_personal_message() {
        let activity = parse(serde_json::json!({
            "type": "message",
            "id": "1",
            "text": "get",
            "serviceUrl": "https://smba.example/",
            "channelId": "msteams",
            "from": { "id": "29:user", "name": "Megan", "aadObjectId": "aad-1" },
            "recipient": { "id": "28:bot", "name": "Herald" },
            "conversation": { "id": "a:1", "conversationType": "personal", "tenantId": "t-1" }
        }));
        assert!(activity.is_personal());
        assert_eq!(activity.conversation_id(), Some("a:1"));
        assert_eq!(activity.sender_name().as_deref(), Some("Megan"));
        assert_eq!(
            activity.from.as_ref().unwrap().aad_object_id.as_deref(),
            Some("aad-1")
        );
    }

    #[test]
    fn channel_message_strips_mention() {
        let activity = parse(serde_json::json!({
            "type": "message",
            "text": "<at>Herald</at>  Users ",
            "recipient": { "id": "28:bot" },
            "conversation": { "id": "19:c;messageid=1", "conversationType": "channel" },
            "channelData": { "team": { "id": "19:team" }, "channel": { "id": "19:chan" } },
            "entities": [{
                "type": "mention",
                "mentioned": { "id": "28:bot" },
                "text": "<at>Herald</at>"
            }]
        }));
        assert!(!activity.is_personal());
        assert_eq!(
            activity.text_without_recipient_mention().as_deref(),
            Some("Users")
        );
        assert_eq!(activity.team_id(), Some("19:team"));
        assert_eq!(activity.teams_channel_id(), Some("19:chan"));
    }

    #[test]
    fn mention_only_text_is_empty() {
        let activity = parse(serde_json::json!({
            "type": "message",
            "text": "<at>Herald</at>",
            "recipient": { "id": "28:bot" },
            "entities": [{
                "type": "mention",
                "mentioned": { "id": "28:bot" },
                "text": "<at>Herald</at>"
            }]
        }));
        assert_eq!(activity.text_without_recipient_mention(), None);
    }

    #[test]
    fn other_mentions_are_kept() {
        let activity = parse(serde_json::json!({
            "type": "message",
            "text": "<at>Herald</at> <at>Bob</at> users",
            "recipient": { "id": "28:bot" },
            "entities": [
                { "type": "mention", "mentioned": { "id": "28:bot" }, "text": "<at>Herald</at>" },
                { "type": "mention", "mentioned": { "id": "29:bob" }, "text": "<at>Bob</at>" }
            ]
        }));
        assert_eq!(
            activity.text_without_recipient_mention().as_deref(),
            Some("<at>Bob</at> users")
        );
    }

    #[test]
    fn mention_markup_without_entity_is_kept() {
        let activity = parse(serde_json::json!({
            "type": "message",
            "text": "<at>Herald</at> users",
            "recipient": { "id": "28:bot" }
        }));
        assert_eq!(
            activity.text_without_recipient_mention().as_deref(),
            Some("<at>Herald</at> users")
        );
    }

    #[test]
    fn detects_bot_added() {
        let activity = parse(serde_json::json!({
            "type": "conversationUpdate",
            "recipient": { "id": "28:bot" },
            "membersAdded": [{ "id": "29:someone" }, { "id": "28:bot" }]
        }));
        assert!(activity.bot_was_added());
    }

    #[test]
    fn other_member_added_is_not_bot() {
        let activity = parse(serde_json::json!({
            "type": "conversationUpdate",
            "recipient": { "id": "28:bot" },
            "membersAdded": [{ "id": "29:someone" }]
        }));
        assert!(!activity.bot_was_added());
    }

    #[test]
    fn parses_reactions() {
        let activity = parse(serde_json::json!({
            "type": "messageReaction",
            "reactionsAdded": [{ "type": "like" }]
        }));
        let reactions = activity.reactions_added.unwrap();
        assert_eq!(reactions[0].reaction_type, "like");
    }
}
