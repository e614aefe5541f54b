use {
    async_trait::async_trait, herald_config::TeamsConfig, secrecy::ExposeSecret, tracing::debug,
    url::Url,
};

use crate::{
    Error, Result,
    auth::TokenCache,
    reference::ConversationReference,
    types::{
        ConversationParameters, ConversationResourceResponse, OutgoingActivity, ResourceResponse,
        TeamsChannelAccount,
    },
};

/// Messaging platform operations the proactive engine depends on.
#[async_trait]
pub trait Connector: Send + Sync {
    /// `POST /v3/conversations`
    async fn create_conversation(
        &self,
        service_url: &str,
        params: &ConversationParameters,
    ) -> Result<ConversationResourceResponse>;

    /// `POST /v3/conversations/{id}/activities`
    async fn send_to_conversation(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> Result<ResourceResponse>;

    /// Post into the conversation captured by `reference`. Never creates one.
    async fn continue_conversation(
        &self,
        reference: &ConversationReference,
        activity: &OutgoingActivity,
    ) -> Result<ResourceResponse> {
        self.send_to_conversation(&reference.service_url, reference.conversation_id(), activity)
            .await
    }

    /// `GET /v3/conversations/{id}/members`; pass a team ID for the full roster.
    async fn get_conversation_members(
        &self,
        service_url: &str,
        conversation_id: &str,
    ) -> Result<Vec<TeamsChannelAccount>>;
}

/// Bot Framework connector over HTTPS.
pub struct ConnectorClient {
    http: reqwest::Client,
    config: TeamsConfig,
    tokens: TokenCache,
}

impl ConnectorClient {
    pub fn new(config: TeamsConfig) -> Self {
        Self::with_http(reqwest::Client::new(), config)
    }

    pub fn with_http(http: reqwest::Client, config: TeamsConfig) -> Self {
        Self {
            http,
            config,
            tokens: TokenCache::new(),
        }
    }

    fn endpoint(service_url: &str, path: &str) -> Result<Url> {
        let base = format!("{}/", service_url.trim_end_matches('/'));
        Url::parse(&base)
            .and_then(|base| base.join(path))
            .map_err(|source| Error::InvalidServiceUrl {
                url: service_url.to_string(),
                source,
            })
    }

    async fn post_json<B, R>(&self, operation: &'static str, url: Url, body: &B) -> Result<R>
    where
        B: serde::Serialize + Sync,
        R: serde::de::DeserializeOwned + Default,
    {
        let token = self.tokens.get(&self.http, &self.config).await?;
        let resp = self
            .http
            .post(url)
            .bearer_auth(token.expose_secret())
            .json(body)
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::api(operation, status, body));
        }
        let text = resp.text().await?;
        if text.trim().is_empty() {
            return Ok(R::default());
        }
        Ok(serde_json::from_str(&text)?)
    }
}

#[async_trait]
impl Connector for ConnectorClient {
    async fn create_conversation(
        &self,
        service_url: &str,
        params: &ConversationParameters,
    ) -> Result<ConversationResourceResponse> {
        let url = Self::endpoint(service_url, "v3/conversations")?;
        let response: ConversationResourceResponse =
            self.post_json("create conversation", url, params).await?;
        if response.id.is_empty() {
            return Err(Error::IncompleteResponse {
                operation: "create conversation",
                field: "conversation id",
            });
        }
        debug!(
            conversation_id = %response.id,
            is_group = params.is_group,
            "created Teams conversation"
        );
        Ok(response)
    }

    async fn send_to_conversation(
        &self,
        service_url: &str,
        conversation_id: &str,
        activity: &OutgoingActivity,
    ) -> Result<ResourceResponse> {
        let path = format!(
            "v3/conversations/{}/activities",
            urlencoding::encode(conversation_id)
        );
        let url = Self::endpoint(service_url, &path)?;
        self.post_json("send", url, activity).await
    }

    async fn get_conversation_members(
        &self,
        service_url: &str,
        conversation_id: &str,
    ) -> Result<Vec<TeamsChannelAccount>> {
        let path = format!(
            "v3/conversations/{}/members",
            urlencoding::encode(conversation_id)
        );
        let url = Self::endpoint(service_url, &path)?;
        let token = self.tokens.get(&self.http, &self.config).await?;
        let resp = self
            .http
            .get(url)
            .bearer_auth(token.expose_secret())
            .send()
            .await?;
        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::api("list members", status, body));
        }
        Ok(resp.json().await?)
    }
}
