//! Create-or-resume proactive dispatch.
//!
//! Personal scope walks `Unknown → Created → Cached`: a cached reference is
//! always resumed, otherwise a conversation is created, the message sent, and
//! only then the new reference stored. Channel scope never caches and creates
//! a fresh conversation per call.
//!
//! There is no locking across dispatches. Two first-contact sends for the
//! same key may both create a conversation; the later store wins and the
//! earlier conversation is left orphaned.

use std::sync::Arc;

use {
    herald_config::TeamsConfig,
    herald_msteams::{
        ChannelAccount, Connector, ConversationParameters, ConversationReference,
        OutgoingActivity, ResourceResponse,
    },
    tracing::{debug, info},
};

use crate::{
    Error, Result,
    cache::{ReferenceCache, RosterEntry},
    identity::IdentityKey,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// 1:1 with a user.
    Personal,
    /// A Teams channel.
    Channel,
}

impl std::fmt::Display for Scope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Personal => "personal",
            Self::Channel => "channel",
        })
    }
}

/// Who a dispatch is addressed to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchTarget {
    /// A bare identity key. For personal scope the member is looked up in
    /// the roster; for channel scope the key is the channel ID.
    Identity(IdentityKey),
    /// A member whose platform ID is already known.
    Roster(RosterEntry),
}

impl DispatchTarget {
    pub fn key(&self) -> &IdentityKey {
        match self {
            Self::Identity(key) => key,
            Self::Roster(entry) => &entry.user,
        }
    }
}

impl From<IdentityKey> for DispatchTarget {
    fn from(key: IdentityKey) -> Self {
        Self::Identity(key)
    }
}

impl From<RosterEntry> for DispatchTarget {
    fn from(entry: RosterEntry) -> Self {
        Self::Roster(entry)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchPath {
    Resumed,
    Created,
}

impl DispatchPath {
    fn as_str(self) -> &'static str {
        match self {
            Self::Resumed => "resumed",
            Self::Created => "created",
        }
    }
}

/// Where a message ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchOutcome {
    pub conversation_id: String,
    pub service_url: String,
    pub path: DispatchPath,
    /// Platform ID of the delivered activity, when reported.
    pub activity_id: Option<String>,
}

/// Static parameters for conversation creation.
#[derive(Debug, Clone, Default)]
pub struct DispatchSettings {
    pub tenant_id: String,
    pub bot: Option<ChannelAccount>,
    /// Used when the trigger does not carry a service URL of its own.
    pub service_url: String,
}

impl DispatchSettings {
    pub fn from_config(config: &TeamsConfig) -> Self {
        let bot = (!config.bot_id.trim().is_empty()).then(|| {
            ChannelAccount::new(
                config.bot_id.clone(),
                (!config.bot_name.is_empty()).then(|| config.bot_name.clone()),
            )
        });
        Self {
            tenant_id: config.tenant_id.clone(),
            bot,
            service_url: config.service_url.clone(),
        }
    }
}

#[derive(Clone)]
pub struct DispatchEngine {
    cache: ReferenceCache,
    connector: Arc<dyn Connector>,
    settings: DispatchSettings,
}

impl DispatchEngine {
    pub fn new(
        cache: ReferenceCache,
        connector: Arc<dyn Connector>,
        settings: DispatchSettings,
    ) -> Self {
        Self {
            cache,
            connector,
            settings,
        }
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    pub async fn send_proactive(
        &self,
        target: impl Into<DispatchTarget>,
        text: &str,
        scope: Scope,
    ) -> Result<DispatchOutcome> {
        self.send_proactive_via(target.into(), text, scope, None)
            .await
    }

    /// Like [`send_proactive`](Self::send_proactive), creating new
    /// conversations against `service_url` instead of the configured one.
    pub async fn send_proactive_via(
        &self,
        target: DispatchTarget,
        text: &str,
        scope: Scope,
        preferred_url: Option<&str>,
    ) -> Result<DispatchOutcome> {
        let key = target.key();
        let activity = OutgoingActivity::message(text);

        let outcome = match scope {
            Scope::Personal => match self.cache.lookup(key).await? {
                Some(reference) => self.resume(&reference, &activity).await?,
                None => {
                    let service_url = self.service_url(preferred_url)?;
                    let member = self.member_for(&target).await?;
                    let (reference, outcome) =
                        self.create_personal(&service_url, member, &activity).await?;
                    let name = reference.user.as_ref().and_then(|u| u.name.as_deref());
                    self.cache.store(key, &reference, name).await?;
                    outcome
                },
            },
            Scope::Channel => {
                let service_url = self.service_url(preferred_url)?;
                let params = ConversationParameters::channel(
                    self.settings.bot.clone(),
                    key.as_str(),
                    activity,
                );
                let created = self
                    .connector
                    .create_conversation(&service_url, &params)
                    .await
                    .map_err(Error::platform("create conversation"))?;
                DispatchOutcome {
                    service_url: created
                        .service_url
                        .filter(|u| !u.is_empty())
                        .unwrap_or(service_url),
                    conversation_id: created.id,
                    path: DispatchPath::Created,
                    activity_id: created.activity_id,
                }
            },
        };

        info!(
            key = %key,
            %scope,
            path = outcome.path.as_str(),
            conversation_id = %outcome.conversation_id,
            "proactive message sent"
        );
        Ok(outcome)
    }

    /// Post another message into a conversation a previous dispatch reached.
    pub async fn follow_up(
        &self,
        outcome: &DispatchOutcome,
        text: &str,
    ) -> Result<ResourceResponse> {
        self.connector
            .send_to_conversation(
                &outcome.service_url,
                &outcome.conversation_id,
                &OutgoingActivity::message(text),
            )
            .await
            .map_err(Error::platform("send"))
    }

    /// Send to a user addressed by an external ID, remembering the bare
    /// conversation ID rather than a full reference.
    pub async fn send_to_user(&self, key: &IdentityKey, text: &str) -> Result<DispatchOutcome> {
        let activity = OutgoingActivity::message(text);
        let service_url = self.service_url(None)?;

        if let Some(conversation_id) = self.cache.lookup_conversation_id(key).await? {
            let response = self
                .connector
                .send_to_conversation(&service_url, &conversation_id, &activity)
                .await
                .map_err(Error::platform("send"))?;
            info!(key = %key, %conversation_id, "continued user conversation");
            return Ok(DispatchOutcome {
                conversation_id,
                service_url,
                path: DispatchPath::Resumed,
                activity_id: response.id,
            });
        }

        let member = self.member_for(&DispatchTarget::Identity(key.clone())).await?;
        let (_, outcome) = self.create_personal(&service_url, member, &activity).await?;
        self.cache
            .store_conversation_id(key, &outcome.conversation_id)
            .await?;
        info!(key = %key, conversation_id = %outcome.conversation_id, "created user conversation");
        Ok(outcome)
    }

    /// Remember the conversation an inbound personal message arrived in.
    pub async fn capture(
        &self,
        key: &IdentityKey,
        reference: &ConversationReference,
        user_name: Option<&str>,
    ) -> Result<()> {
        self.cache.store(key, reference, user_name).await
    }

    pub async fn record_roster(&self, entry: &RosterEntry) -> Result<()> {
        self.cache.store_roster(entry).await
    }

    /// Platform account for a personal target. Identities without a roster
    /// entry are addressed by the key itself.
    pub async fn member_for(&self, target: &DispatchTarget) -> Result<ChannelAccount> {
        match target {
            DispatchTarget::Roster(entry) => Ok(entry.account()),
            DispatchTarget::Identity(key) => match self.cache.lookup_roster(key).await? {
                Some(entry) => Ok(entry.account()),
                None => {
                    debug!(key = %key, "no roster entry, using key as member id");
                    Ok(ChannelAccount::new(key.as_str(), None))
                },
            },
        }
    }

    async fn resume(
        &self,
        reference: &ConversationReference,
        activity: &OutgoingActivity,
    ) -> Result<DispatchOutcome> {
        let response = self
            .connector
            .continue_conversation(reference, activity)
            .await
            .map_err(Error::platform("continue conversation"))?;
        Ok(DispatchOutcome {
            conversation_id: reference.conversation_id().to_string(),
            service_url: reference.service_url.clone(),
            path: DispatchPath::Resumed,
            activity_id: response.id,
        })
    }

    /// Create a 1:1 conversation and send `activity` into it. Nothing is
    /// stored; a failed send leaves the new conversation unreferenced.
    async fn create_personal(
        &self,
        service_url: &str,
        member: ChannelAccount,
        activity: &OutgoingActivity,
    ) -> Result<(ConversationReference, DispatchOutcome)> {
        let params = ConversationParameters::personal(
            self.settings.bot.clone(),
            member.clone(),
            &self.settings.tenant_id,
        );
        let created = self
            .connector
            .create_conversation(service_url, &params)
            .await
            .map_err(Error::platform("create conversation"))?;
        let reference = ConversationReference::from_created(
            &created,
            service_url,
            self.settings.bot.clone(),
            Some(member),
            Some(self.settings.tenant_id.as_str()).filter(|t| !t.is_empty()),
            false,
        );
        let response = self
            .connector
            .continue_conversation(&reference, activity)
            .await
            .map_err(Error::platform("send"))?;
        let outcome = DispatchOutcome {
            conversation_id: reference.conversation_id().to_string(),
            service_url: reference.service_url.clone(),
            path: DispatchPath::Created,
            activity_id: response.id,
        };
        Ok((reference, outcome))
    }

    fn service_url(&self, preferred: Option<&str>) -> Result<String> {
        preferred
            .filter(|u| !u.trim().is_empty())
            .or(Some(self.settings.service_url.as_str()).filter(|u| !u.trim().is_empty()))
            .map(str::to_string)
            .ok_or_else(|| Error::not_configured("teams.service_url is empty"))
    }
}
