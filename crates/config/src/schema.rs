/// Config schema types (server, teams bot registration, store, proactive demo).
use {
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    pub server: ServerConfig,
    pub teams: TeamsConfig,
    pub store: StoreConfig,
    pub proactive: ProactiveConfig,
}

/// Gateway server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on. Defaults to 3007.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3007,
        }
    }
}

/// Bot registration and tenant settings for Microsoft Teams.
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TeamsConfig {
    /// Microsoft App ID (bot registration client ID).
    pub app_id: String,

    /// Microsoft App Password (client secret).
    #[serde(serialize_with = "serialize_secret")]
    pub app_password: Secret<String>,

    /// AAD tenant the bot sends proactive messages into.
    pub tenant_id: String,

    /// Bot channel account ID (`28:<app id>`).
    pub bot_id: String,

    /// Bot display name.
    pub bot_name: String,

    /// Bot Framework service URL used when no inbound activity supplied one.
    pub service_url: String,

    /// Teams channel that receives channel-scope notifications.
    pub channel_id: String,

    /// OAuth tenant segment for Bot Framework token issuance.
    pub oauth_tenant: String,

    /// OAuth scope for Bot Framework connector API.
    pub oauth_scope: String,

    /// Full token endpoint, overriding the one derived from `oauth_tenant`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_url: Option<String>,

    /// Optional shared secret validated against `?secret=...` on webhook calls.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_option_secret"
    )]
    pub webhook_secret: Option<Secret<String>>,
}

impl TeamsConfig {
    /// Token endpoint for client-credential grants.
    pub fn token_endpoint(&self) -> String {
        self.token_url.clone().unwrap_or_else(|| {
            format!(
                "https://login.microsoftonline.com/{}/oauth2/v2.0/token",
                self.oauth_tenant
            )
        })
    }
}

impl std::fmt::Debug for TeamsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TeamsConfig")
            .field("app_id", &self.app_id)
            .field("app_password", &"[REDACTED]")
            .field("tenant_id", &self.tenant_id)
            .field("bot_id", &self.bot_id)
            .field("bot_name", &self.bot_name)
            .field("service_url", &self.service_url)
            .field("channel_id", &self.channel_id)
            .field("oauth_tenant", &self.oauth_tenant)
            .field("oauth_scope", &self.oauth_scope)
            .field("token_url", &self.token_url)
            .field(
                "webhook_secret",
                &self.webhook_secret.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

fn serialize_secret<S: serde::Serializer>(
    secret: &Secret<String>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(secret.expose_secret())
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

impl Default for TeamsConfig {
    fn default() -> Self {
        Self {
            app_id: String::new(),
            app_password: Secret::new(String::new()),
            tenant_id: String::new(),
            bot_id: String::new(),
            bot_name: String::new(),
            service_url: "https://smba.trafficmanager.net/emea/".into(),
            channel_id: String::new(),
            oauth_tenant: "botframework.com".into(),
            oauth_scope: "https://api.botframework.com/.default".into(),
            token_url: None,
            webhook_secret: None,
        }
    }
}

/// Durable reference store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// sqlx connection string.
    pub database_url: String,
    /// Collection holding every proactive partition.
    pub table: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://herald.db?mode=rwc".into(),
            table: "proactiveTable".into(),
        }
    }
}

/// Fixed demo target for `GET /api/proactive`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProactiveConfig {
    pub demo_member_id: String,
    pub demo_member_name: Option<String>,
}
