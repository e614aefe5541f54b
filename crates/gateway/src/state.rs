use std::sync::Arc;

use {
    herald_msteams::Connector,
    herald_proactive::{
        ActivityRouter, DispatchEngine, NotificationService, NotificationTargets, build_router,
    },
    secrecy::{ExposeSecret, Secret},
};

/// Shared gateway state.
pub struct GatewayState {
    /// Inbound activity handlers.
    pub router: ActivityRouter,
    /// HTTP-triggered notifications.
    pub notifications: NotificationService,
    /// Connector handed to each inbound turn for in-place replies.
    pub connector: Arc<dyn Connector>,
    /// Expected `?secret=` on `/api/messages`, if any.
    pub webhook_secret: Option<Secret<String>>,
    pub version: String,
}

impl GatewayState {
    /// Wire the router and notification service around one dispatch engine.
    pub fn new(
        engine: DispatchEngine,
        targets: NotificationTargets,
        webhook_secret: Option<Secret<String>>,
    ) -> Arc<Self> {
        let connector = Arc::clone(engine.connector());
        let router = build_router(engine.clone(), targets.channel_id.clone());
        Arc::new(Self {
            router,
            notifications: NotificationService::new(engine, targets),
            connector,
            webhook_secret,
            version: env!("CARGO_PKG_VERSION").to_string(),
        })
    }

    /// Whether `provided` satisfies the configured webhook secret.
    pub fn webhook_secret_matches(&self, provided: Option<&str>) -> bool {
        match self
            .webhook_secret
            .as_ref()
            .map(ExposeSecret::expose_secret)
            .filter(|s| !s.is_empty())
        {
            Some(expected) => provided == Some(expected.as_str()),
            None => true,
        }
    }
}
