//! Inbound activity triggers.
//!
//! Each handler only extracts parameters from the activity and calls the
//! dispatch engine. Unresolvable senders are logged and dropped.

use std::sync::Arc;

use {
    async_trait::async_trait,
    herald_msteams::{ConversationReference, OutgoingActivity},
    tracing::{info, warn},
};

use crate::{
    Error, Result,
    cache::RosterEntry,
    context::TurnContext,
    dispatch::{DispatchEngine, DispatchTarget, Scope},
    identity::{IdentityKey, IdentityResolver, IdentitySource},
    router::{self, ActivityHandler, ActivityRouter},
};

pub const THANKS_REPLY: &str = "thanks for your message 😀";
pub const USER_PROACTIVE_TEXT: &str = "This is a proactive message";
pub const USER_SENT_REPLY: &str = "conversation sent to user";
pub const CHANNEL_FIRST_TEXT: &str = "This is the first channel message";
pub const CHANNEL_SECOND_TEXT: &str = "This is the second channel message";
pub const CHANNEL_SENT_REPLY: &str = "conversation sent to channel";

/// Router with the message, conversation update and reaction handlers.
pub fn build_router(engine: DispatchEngine, channel_id: Option<String>) -> ActivityRouter {
    ActivityRouter::new()
        .route(
            router::MESSAGE,
            Arc::new(MessageHandler::new(engine, channel_id)),
        )
        .route(router::CONVERSATION_UPDATE, Arc::new(ConversationUpdateHandler))
        .route(router::MESSAGE_REACTION, Arc::new(ReactionHandler))
}

/// Personal commands, personal reference capture and the channel roster
/// command.
pub struct MessageHandler {
    engine: DispatchEngine,
    resolver: IdentityResolver,
    channel: Option<IdentityKey>,
}

impl MessageHandler {
    pub fn new(engine: DispatchEngine, channel_id: Option<String>) -> Self {
        let resolver = IdentityResolver::new();
        let channel =
            channel_id.and_then(|id| resolver.resolve(IdentitySource::External(&id)).ok());
        Self {
            engine,
            resolver,
            channel,
        }
    }

    async fn on_personal(&self, ctx: &TurnContext) -> Result<()> {
        let activity = &ctx.activity;
        let key = match self.resolver.resolve(IdentitySource::PersonalMessage(activity)) {
            Ok(key) => key,
            Err(e) => {
                warn!(error = %e, "dropping personal message");
                return Ok(());
            },
        };
        match activity.text.as_deref().unwrap_or_default() {
            "get" => {
                let member_id = activity
                    .from
                    .as_ref()
                    .map(|from| from.id.clone())
                    .unwrap_or_default();
                let target = if member_id.is_empty() {
                    DispatchTarget::Identity(key)
                } else {
                    DispatchTarget::Roster(RosterEntry::new(
                        key,
                        activity.sender_name(),
                        member_id,
                    ))
                };
                self.engine
                    .send_proactive_via(
                        target,
                        USER_PROACTIVE_TEXT,
                        Scope::Personal,
                        ctx.service_url(),
                    )
                    .await?;
                ctx.reply(USER_SENT_REPLY).await?;
            },
            "channel" => {
                let channel = self
                    .channel
                    .clone()
                    .ok_or_else(|| Error::not_configured("teams.channel_id is empty"))?;
                let outcome = self
                    .engine
                    .send_proactive_via(
                        DispatchTarget::Identity(channel),
                        CHANNEL_FIRST_TEXT,
                        Scope::Channel,
                        ctx.service_url(),
                    )
                    .await?;
                ctx.reply(CHANNEL_SENT_REPLY).await?;
                self.engine.follow_up(&outcome, CHANNEL_SECOND_TEXT).await?;
            },
            _ => {
                let reference = ConversationReference::from_activity(activity).ok_or_else(|| {
                    Error::invalid_input("activity has no conversation reference")
                })?;
                self.engine
                    .capture(&key, &reference, activity.sender_name().as_deref())
                    .await?;
                info!(key = %key, "captured personal conversation reference");
                ctx.reply(THANKS_REPLY).await?;
            },
        }
        Ok(())
    }

    async fn on_channel(&self, ctx: &TurnContext) -> Result<()> {
        let channel = match self
            .resolver
            .resolve(IdentitySource::ChannelMessage(&ctx.activity))
        {
            Ok(channel) => channel,
            Err(e) => {
                warn!(error = %e, "dropping channel message");
                return Ok(());
            },
        };
        if channel_command(ctx) == "users" {
            self.snapshot_roster(ctx, &channel).await?;
        }
        ctx.reply(THANKS_REPLY).await?;
        Ok(())
    }

    async fn snapshot_roster(&self, ctx: &TurnContext, channel: &IdentityKey) -> Result<()> {
        let activity = &ctx.activity;
        let service_url = ctx
            .service_url()
            .ok_or_else(|| Error::invalid_input("activity has no serviceUrl"))?;
        let roster_id = activity
            .team_id()
            .or_else(|| activity.conversation_id())
            .ok_or_else(|| Error::invalid_input("activity has no team or conversation"))?;

        let members = ctx
            .connector()
            .get_conversation_members(service_url, roster_id)
            .await
            .map_err(Error::platform("list members"))?;

        let mut recorded = 0usize;
        for member in &members {
            let user = match self.resolver.resolve(IdentitySource::RosterMember(member)) {
                Ok(user) => user,
                Err(e) => {
                    warn!(member_id = %member.id, error = %e, "skipping roster member");
                    continue;
                },
            };
            let entry = RosterEntry::new(user, member.name.clone(), member.id.clone());
            self.engine.record_roster(&entry).await?;
            recorded += 1;
        }
        info!(
            channel = %channel,
            roster_id,
            recorded,
            total = members.len(),
            "recorded roster snapshot"
        );
        Ok(())
    }
}

#[async_trait]
impl ActivityHandler for MessageHandler {
    async fn handle(&self, ctx: &TurnContext) -> Result<()> {
        if ctx.activity.is_personal() {
            self.on_personal(ctx).await
        } else {
            self.on_channel(ctx).await
        }
    }
}

/// Welcomes the team when the bot is installed.
pub struct ConversationUpdateHandler;

#[async_trait]
impl ActivityHandler for ConversationUpdateHandler {
    async fn handle(&self, ctx: &TurnContext) -> Result<()> {
        if ctx.activity.bot_was_added() {
            ctx.reply(THANKS_REPLY).await?;
        }
        Ok(())
    }
}

/// Echoes the type of the first added reaction.
pub struct ReactionHandler;

#[async_trait]
impl ActivityHandler for ReactionHandler {
    async fn handle(&self, ctx: &TurnContext) -> Result<()> {
        let Some(reaction) = ctx
            .activity
            .reactions_added
            .as_ref()
            .and_then(|added| added.first())
        else {
            return Ok(());
        };
        let text = format!(
            "That was an interesting reaction (<b>{}</b>)",
            reaction.reaction_type
        );
        ctx.send_activity(OutgoingActivity::message(text).with_text_format("xml"))
            .await?;
        Ok(())
    }
}

/// Channel text with the bot's mention removed, trimmed and lowercased.
/// Personal commands are matched on the raw text instead.
fn channel_command(ctx: &TurnContext) -> String {
    ctx.activity
        .text_without_recipient_mention()
        .map(|text| text.to_lowercase())
        .unwrap_or_default()
}
