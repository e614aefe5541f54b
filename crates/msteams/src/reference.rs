//! Resumable conversation handle.

use serde::{Deserialize, Serialize};

use crate::{
    activity::TeamsActivity,
    types::{ChannelAccount, ConversationAccount, ConversationResourceResponse},
};

/// Everything needed to post into an existing conversation again: the
/// service endpoint, the conversation, and both parties.
///
/// Serialized as camelCase JSON so stored references stay compatible with
/// other Bot Framework SDKs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationReference {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub activity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<ChannelAccount>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot: Option<ChannelAccount>,
    pub conversation: ConversationAccount,
    pub channel_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    pub service_url: String,
}

impl ConversationReference {
    /// Capture the reference of an inbound activity. `None` if the activity
    /// lacks a conversation or service URL.
    pub fn from_activity(activity: &TeamsActivity) -> Option<Self> {
        let conversation = activity.conversation.clone().filter(|c| !c.id.is_empty())?;
        let service_url = activity.service_url.clone().filter(|u| !u.is_empty())?;
        Some(Self {
            activity_id: activity.id.clone(),
            user: activity.from.clone(),
            bot: activity.recipient.clone(),
            conversation,
            channel_id: activity
                .channel_id
                .clone()
                .unwrap_or_else(|| "msteams".into()),
            locale: activity.locale.clone(),
            service_url,
        })
    }

    /// Reference for a conversation the bot just created.
    pub fn from_created(
        response: &ConversationResourceResponse,
        service_url: &str,
        bot: Option<ChannelAccount>,
        user: Option<ChannelAccount>,
        tenant_id: Option<&str>,
        is_group: bool,
    ) -> Self {
        Self {
            activity_id: response.activity_id.clone(),
            user,
            bot,
            conversation: ConversationAccount {
                id: response.id.clone(),
                conversation_type: Some(if is_group { "channel" } else { "personal" }.into()),
                is_group: Some(is_group),
                tenant_id: tenant_id.map(str::to_string),
                name: None,
            },
            channel_id: "msteams".into(),
            locale: None,
            service_url: response
                .service_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| service_url.to_string()),
        }
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation.id
    }
}
