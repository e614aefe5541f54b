use std::sync::Arc;

use {
    herald_msteams::{Connector, OutgoingActivity, ResourceResponse, TeamsActivity},
    tracing::debug,
};

use crate::{Error, Result};

/// One inbound activity plus the means to answer it in place.
pub struct TurnContext {
    pub activity: TeamsActivity,
    connector: Arc<dyn Connector>,
}

impl TurnContext {
    pub fn new(activity: TeamsActivity, connector: Arc<dyn Connector>) -> Self {
        Self {
            activity,
            connector,
        }
    }

    pub fn connector(&self) -> &Arc<dyn Connector> {
        &self.connector
    }

    /// Service URL the activity arrived from.
    pub fn service_url(&self) -> Option<&str> {
        self.activity
            .service_url
            .as_deref()
            .filter(|u| !u.is_empty())
    }

    /// Text reply threaded under the inbound activity.
    pub async fn reply(&self, text: &str) -> Result<ResourceResponse> {
        self.send_activity(OutgoingActivity::message(text)).await
    }

    /// Post `activity` into the conversation the inbound activity came from.
    pub async fn send_activity(&self, activity: OutgoingActivity) -> Result<ResourceResponse> {
        let service_url = self
            .service_url()
            .ok_or_else(|| Error::invalid_input("activity has no serviceUrl"))?;
        let conversation_id = self
            .activity
            .conversation_id()
            .ok_or_else(|| Error::invalid_input("activity has no conversation"))?;
        let activity = activity.reply_to(self.activity.id.clone());
        debug!(conversation_id, "replying in turn context");
        self.connector
            .send_to_conversation(service_url, conversation_id, &activity)
            .await
            .map_err(Error::platform("reply"))
    }
}
