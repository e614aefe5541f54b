use std::{collections::HashMap, sync::Arc};

use {async_trait::async_trait, tracing::debug};

use crate::{Result, context::TurnContext};

pub const MESSAGE: &str = "message";
pub const CONVERSATION_UPDATE: &str = "conversationUpdate";
pub const MESSAGE_REACTION: &str = "messageReaction";

/// Handles one kind of inbound activity.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn handle(&self, ctx: &TurnContext) -> Result<()>;
}

/// Maps activity type tags to handlers. Types with no handler are ignored.
#[derive(Clone, Default)]
pub struct ActivityRouter {
    handlers: HashMap<String, Arc<dyn ActivityHandler>>,
}

impl ActivityRouter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for `tag`, replacing any previous one.
    pub fn register(&mut self, tag: impl Into<String>, handler: Arc<dyn ActivityHandler>) {
        self.handlers.insert(tag.into(), handler);
    }

    #[must_use]
    pub fn route(mut self, tag: impl Into<String>, handler: Arc<dyn ActivityHandler>) -> Self {
        self.register(tag, handler);
        self
    }

    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        tags.sort_unstable();
        tags
    }

    /// Run the handler for the activity's type. Returns `false` when no
    /// handler is registered for it.
    pub async fn dispatch(&self, ctx: &TurnContext) -> Result<bool> {
        let tag = ctx.activity.activity_type.as_str();
        let Some(handler) = self.handlers.get(tag) else {
            debug!(activity_type = tag, "no handler for activity type");
            return Ok(false);
        };
        handler.handle(ctx).await?;
        Ok(true)
    }
}
