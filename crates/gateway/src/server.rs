use std::{collections::HashMap, net::SocketAddr, sync::Arc};

use {
    axum::{
        Json, Router,
        body::Bytes,
        extract::{Query, State},
        http::StatusCode,
        response::IntoResponse,
        routing::{get, post},
    },
    serde::Deserialize,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{debug, info, warn},
};

use {
    herald_config::HeraldConfig,
    herald_msteams::{ConnectorClient, TeamsActivity},
    herald_proactive::{
        DispatchEngine, DispatchSettings, NotificationTargets, ReferenceCache, TurnContext,
    },
    herald_store::SqliteTableStore,
};

use crate::{error::ApiError, state::GatewayState};

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/messages", post(messages_handler))
        .route("/api/proactive", get(proactive_handler))
        .route("/api/notification", post(notification_handler))
        .route("/createUserConversation", post(create_user_conversation_handler))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Production dispatch engine: SQLite reference store plus the Bot
/// Framework connector.
pub async fn build_engine(config: &HeraldConfig) -> anyhow::Result<DispatchEngine> {
    let store = Arc::new(SqliteTableStore::connect(&config.store.database_url).await?);
    let cache = ReferenceCache::open(store, config.store.table.clone()).await?;
    let connector = Arc::new(ConnectorClient::new(config.teams.clone()));
    Ok(DispatchEngine::new(
        cache,
        connector,
        DispatchSettings::from_config(&config.teams),
    ))
}

pub async fn build_state(config: &HeraldConfig) -> anyhow::Result<Arc<GatewayState>> {
    let engine = build_engine(config).await?;
    Ok(GatewayState::new(
        engine,
        NotificationTargets::from_config(config),
        config.teams.webhook_secret.clone(),
    ))
}

/// Start the gateway HTTP server.
pub async fn start_gateway(config: HeraldConfig) -> anyhow::Result<()> {
    let validation = herald_config::validate(&config);
    for diagnostic in &validation.diagnostics {
        warn!(path = %diagnostic.path, "{}", diagnostic.message);
    }
    if validation.has_errors() {
        anyhow::bail!(
            "configuration has {} error(s); run `herald check` for details",
            validation.count(herald_config::Severity::Error)
        );
    }

    let state = build_state(&config).await?;
    let app = build_gateway_app(state);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, table = %config.store.table, "herald gateway listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn health_handler(State(state): State<Arc<GatewayState>>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "version": state.version,
        "routes": state.router.tags(),
    }))
}

/// Bot webhook. Once the activity parses, the answer is always 200: message
/// triggers log and drop their failures.
async fn messages_handler(
    State(state): State<Arc<GatewayState>>,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Result<StatusCode, ApiError> {
    if !state.webhook_secret_matches(params.get("secret").map(String::as_str)) {
        warn!("rejecting activity with invalid webhook secret");
        return Err(ApiError::unauthorized("invalid webhook secret"));
    }
    let activity: TeamsActivity = serde_json::from_slice(&body)
        .map_err(|e| ApiError::bad_request(format!("invalid activity: {e}")))?;

    let activity_type = activity.activity_type.clone();
    let ctx = TurnContext::new(activity, Arc::clone(&state.connector));
    match state.router.dispatch(&ctx).await {
        Ok(true) => debug!(%activity_type, "activity handled"),
        Ok(false) => {},
        Err(e) => warn!(%activity_type, error = %e, "activity handler failed"),
    }
    Ok(StatusCode::OK)
}

async fn proactive_handler(
    State(state): State<Arc<GatewayState>>,
) -> Result<&'static str, ApiError> {
    Ok(state.notifications.send_demo().await?)
}

#[derive(Debug, Deserialize)]
struct NotificationRequest {
    #[serde(default)]
    name: String,
}

async fn notification_handler(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let request: NotificationRequest = parse_json(&body)?;
    Ok(state.notifications.notify_channel(&request.name).await?)
}

#[derive(Debug, Deserialize)]
struct UserConversationRequest {
    #[serde(default)]
    userid: String,
}

async fn create_user_conversation_handler(
    State(state): State<Arc<GatewayState>>,
    body: Bytes,
) -> Result<&'static str, ApiError> {
    let request: UserConversationRequest = parse_json(&body)?;
    Ok(state
        .notifications
        .create_user_conversation(&request.userid)
        .await?)
}

fn parse_json<T: serde::de::DeserializeOwned>(body: &[u8]) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::bad_request(format!("invalid body: {e}")))
}
