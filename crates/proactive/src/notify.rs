//! Externally invoked notification triggers.

use {herald_config::HeraldConfig, tracing::info};

use crate::{
    Error, Result,
    cache::RosterEntry,
    dispatch::{DispatchEngine, DispatchPath, DispatchTarget, Scope},
    identity::{IdentityKey, IdentityResolver, IdentitySource},
};

pub const USER_MESSAGE_TEXT: &str = "This is a user message 😀";
pub const MESSAGE_SENT: &str = "Message sent";
pub const CONVERSATION_CONTINUED: &str = "conversation continued";

/// Fixed targets the HTTP triggers send to.
#[derive(Debug, Clone, Default)]
pub struct NotificationTargets {
    /// Platform member ID (`29:...`) of the demo user.
    pub demo_member_id: Option<String>,
    pub demo_member_name: Option<String>,
    /// Teams channel receiving broadcast notifications.
    pub channel_id: Option<String>,
}

impl NotificationTargets {
    pub fn from_config(config: &HeraldConfig) -> Self {
        let non_empty = |s: &str| Some(s.trim().to_string()).filter(|s| !s.is_empty());
        Self {
            demo_member_id: non_empty(&config.proactive.demo_member_id),
            demo_member_name: config.proactive.demo_member_name.clone(),
            channel_id: non_empty(&config.teams.channel_id),
        }
    }
}

/// Turns notification requests into dispatches and returns the plain-text
/// response body.
#[derive(Clone)]
pub struct NotificationService {
    engine: DispatchEngine,
    resolver: IdentityResolver,
    targets: NotificationTargets,
}

impl NotificationService {
    pub fn new(engine: DispatchEngine, targets: NotificationTargets) -> Self {
        Self {
            engine,
            resolver: IdentityResolver::new(),
            targets,
        }
    }

    /// Personal send to the configured demo member.
    pub async fn send_demo(&self) -> Result<&'static str> {
        let member_id = self
            .targets
            .demo_member_id
            .as_deref()
            .ok_or_else(|| Error::not_configured("proactive.demo_member_id is empty"))?;
        let key = self.external(member_id)?;
        let entry = RosterEntry::new(key, self.targets.demo_member_name.clone(), member_id);
        self.engine
            .send_proactive(entry, USER_MESSAGE_TEXT, Scope::Personal)
            .await?;
        Ok(MESSAGE_SENT)
    }

    /// Channel broadcast naming the requester.
    pub async fn notify_channel(&self, name: &str) -> Result<&'static str> {
        let channel_id = self
            .targets
            .channel_id
            .as_deref()
            .ok_or_else(|| Error::not_configured("teams.channel_id is empty"))?;
        let channel = self.external(channel_id)?;
        let text = format!("This is the name of the request: {name}");
        self.engine
            .send_proactive(DispatchTarget::Identity(channel), &text, Scope::Channel)
            .await?;
        Ok(MESSAGE_SENT)
    }

    /// Continue the user's remembered conversation, or create and remember one.
    pub async fn create_user_conversation(&self, user_id: &str) -> Result<&'static str> {
        let key = self.external(user_id)?;
        let outcome = self.engine.send_to_user(&key, USER_MESSAGE_TEXT).await?;
        info!(key = %key, conversation_id = %outcome.conversation_id, "user notification sent");
        Ok(match outcome.path {
            DispatchPath::Resumed => CONVERSATION_CONTINUED,
            DispatchPath::Created => MESSAGE_SENT,
        })
    }

    fn external(&self, id: &str) -> Result<IdentityKey> {
        self.resolver.resolve(IdentitySource::External(id))
    }
}
